// HTTP side of the uploader: a small blocking client that POSTs one archive
// at a time as multipart/form-data. The batch loop only talks to the
// `Sender` trait so it can be driven by a fake in tests.

use crate::config::UploaderConfig;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use reqwest::blocking::{multipart, Client};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::Proxy;
use std::fs::File;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Multipart form field the server reads the archive from.
pub const FILE_FIELD: &str = "file";
const ARCHIVE_MIME: &str = "application/gzip";

/// An opened archive, ready to be streamed as the `file` part.
#[derive(Debug)]
pub struct FilePart {
    pub path: PathBuf,
    pub file_name: String,
    pub file: File,
    pub len: u64,
}

impl FilePart {
    /// Open `path` for upload. Fails when the file vanished, cannot be read
    /// or is not a regular file.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            ));
        }
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.tgz")
            .to_string();
        Ok(FilePart {
            path: path.to_path_buf(),
            file_name,
            file,
            len: meta.len(),
        })
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

/// The request never produced a complete response (DNS, connect, TLS,
/// timeout, body read).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    pub kind: String,
    pub message: String,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_body() {
            "body"
        } else if err.is_decode() {
            "decode"
        } else if err.is_builder() {
            "builder"
        } else if err.is_request() {
            "request"
        } else {
            "transport"
        };

        // reqwest's top-level message is terse; the cause chain carries the
        // useful part (e.g. "Connection refused").
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = std::error::Error::source(cause);
        }

        TransportError {
            kind: kind.to_string(),
            message,
        }
    }
}

/// One upload request. Implementations must not retry.
pub trait Sender {
    fn send(&mut self, part: FilePart) -> std::result::Result<Reply, TransportError>;
}

/// Real sender backed by a reqwest blocking client. The client (and its
/// connection pool) lives as long as the sender and is reused for every
/// file of the batch.
pub struct HttpSender {
    client: Client,
    url: String,
}

impl HttpSender {
    /// Build the shared client: connect/total timeouts, certificate
    /// verification (reqwest's default), gzip/deflate decoding, shuffled DNS
    /// answers and the optional proxy.
    pub fn new(config: &UploaderConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .dns_resolver(Arc::new(ShuffledResolver));

        builder = match config.proxy() {
            Some(addr) => {
                let proxy = Proxy::all(proxy_url(addr))
                    .with_context(|| format!("Invalid proxy address {}", addr))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder.build().context("Failed to build HTTP client")?;
        log::debug!(
            "HTTP client ready: url={} connect_timeout={:?} timeout={:?} proxy={:?}",
            config.target_url,
            config.connect_timeout,
            config.timeout,
            config.proxy()
        );

        Ok(HttpSender {
            client,
            url: config.target_url.clone(),
        })
    }
}

impl Sender for HttpSender {
    fn send(&mut self, part: FilePart) -> std::result::Result<Reply, TransportError> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Uploading {}...", part.file_name));
        spinner.enable_steady_tick(Duration::from_millis(120));

        let started = Instant::now();
        let result = post_file(&self.client, &self.url, part);
        spinner.finish_and_clear();

        match &result {
            Ok(reply) => log::debug!(
                "POST {} -> {} ({} bytes) in {:?}",
                self.url,
                reply.status,
                reply.body.len(),
                started.elapsed()
            ),
            Err(err) => log::debug!("POST {} failed after {:?}: {}", self.url, started.elapsed(), err.message),
        }
        result
    }
}

fn post_file(client: &Client, url: &str, part: FilePart) -> std::result::Result<Reply, TransportError> {
    log::debug!("Streaming {} ({} bytes)", part.path.display(), part.len);
    let file_part = multipart::Part::reader_with_length(part.file, part.len)
        .file_name(part.file_name)
        .mime_str(ARCHIVE_MIME)?;
    let form = multipart::Form::new().part(FILE_FIELD, file_part);

    let res = client.post(url).multipart(form).send()?;
    let status = res.status().as_u16();
    let body = res.text()?;
    Ok(Reply { status, body })
}

/// Bare `host:port` proxies are plain HTTP; anything with a scheme is kept.
fn proxy_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}

/// System resolver whose answers are shuffled, so repeated runs spread
/// across every address a name resolves to.
struct ShuffledResolver;

impl Resolve for ShuffledResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let lookup_host = host.clone();
            let mut addrs: Vec<SocketAddr> = tokio::task::spawn_blocking(move || {
                (lookup_host.as_str(), 0)
                    .to_socket_addrs()
                    .map(|iter| iter.collect::<Vec<_>>())
            })
            .await??;
            addrs.shuffle(&mut rand::thread_rng());
            log::trace!("Resolved {} to {:?}", host, addrs);
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
