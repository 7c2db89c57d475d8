// Entrypoint for the uploader.
// - Keeps `main` small: parse arguments, build the config, hand off to `run`.
// - Exit status is 1 only when the batch was aborted.

use data_collection_uploader::batch::{run, say};
use data_collection_uploader::cli::{self, Invocation, USAGE_HINT};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = match cli::parse(std::env::args_os()) {
        Invocation::Run(cli) => cli,
        Invocation::Usage => {
            println!("{}", USAGE_HINT);
            return Ok(ExitCode::SUCCESS);
        }
        Invocation::Clap(err) => err.exit(),
    };

    let config = cli.into_config()?;
    let mut stdout = std::io::stdout().lock();
    say(&mut stdout, format_args!("Target URL [{}]", config.target_url));

    let report = run(&config, &mut stdout)?;
    log::info!(
        "Run finished: {} attempt(s), {} uploaded, {} skipped, aborted={}",
        report.attempts,
        report.uploaded.len(),
        report.skipped.len(),
        !report.is_complete()
    );

    if report.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
