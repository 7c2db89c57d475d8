// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules.
//
// Module responsibilities:
// - `config`: run settings loaded from `DATA_COLLECTION_*` variables.
// - `cli`: argument parsing and flag overrides on top of `config`.
// - `api`: the blocking multipart HTTP sender and the `Sender` seam.
// - `response`: validation of the server's JSON acknowledgement.
// - `error`: per-file error taxonomy and its severities.
// - `batch`: file discovery and the sequential upload loop.
pub mod api;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod response;

pub use batch::{run, BatchReport};
pub use config::UploaderConfig;
pub use error::{Severity, UploadError};
