//! Start-up shared by the command line tools.

use crate::config::Config;
use crate::rpc::{Ccdciel, HttpRemote, RemoteControl, SessionLog};
use crate::tasks::TaskResult;
use crate::util::{tool_dir, ExitStatus};
use clap::Parser;
use eyre::WrapErr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub const CONFIG_FILE: &str = "config.toml";

/// Arguments of the tools which take no options besides the configuration file
#[derive(Debug, Parser)]
#[command(version)]
pub struct ConfigArgs {
    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments of the tools which talk to the INDI server
#[derive(Debug, Parser)]
#[command(version)]
pub struct IndiArgs {
    /// INDI server port, overrides the configuration
    pub port: Option<u16>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn init_logging() {
    tracing_subscriber::fmt::init();
}

/// Parses the command line. Help and usage errors are printed here and turned
/// into the status the process should exit with.
pub fn parse_args<A: Parser>() -> Result<A, ExitStatus> {
    A::try_parse().map_err(|e| {
        let status = ExitStatus::from(&e);
        if let Err(print_error) = e.print() {
            tracing::error!("Couldn't print usage: {}", print_error);
        }
        status
    })
}

/// Loads `path`, or `config.toml` beside the executable. A missing file is
/// created with the default values.
pub fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => tool_dir()
            .wrap_err("Couldn't locate the executable")?
            .join(CONFIG_FILE),
    };
    let config: Config = confy::load_path(&path)
        .wrap_err_with(|| format!("Couldn't parse configuration {}", path.display()))?;
    config
        .validate()
        .wrap_err_with(|| format!("Invalid configuration {}", path.display()))?;
    Ok(config)
}

pub fn connect(config: &Config) -> eyre::Result<Ccdciel<HttpRemote>> {
    let remote = HttpRemote::new(&config.remote).wrap_err("Couldn't create the CCDciel client")?;
    tracing::info!("Using CCDciel at {}", config.remote.url());
    Ok(Ccdciel::new(remote))
}

/// Logs a failed task in the session log.
pub async fn finish<R: RemoteControl, T>(app: &Ccdciel<R>, result: TaskResult<T>) -> ExitStatus {
    match result {
        Ok(_) => ExitStatus::Success,
        Err(e) => {
            app.critical(&e.to_string()).await;
            ExitStatus::Fatal
        }
    }
}

/// Setup failures never reach the session log, only the console.
pub fn exit(result: eyre::Result<ExitStatus>) -> ExitCode {
    match result {
        Ok(status) => status.into(),
        Err(e) => {
            tracing::error!("{:?}", e);
            ExitStatus::Fatal.into()
        }
    }
}
