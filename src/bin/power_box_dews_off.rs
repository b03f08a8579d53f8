use ccdciel_scripts::config::Config;
use ccdciel_scripts::indi::IndiSession;
use ccdciel_scripts::rpc::{Ccdciel, RemoteControl};
use ccdciel_scripts::runner::{self, IndiArgs};
use ccdciel_scripts::tasks::{power_box, TaskResult};
use ccdciel_scripts::util::ExitStatus;
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    runner::init_logging();

    let args: IndiArgs = match runner::parse_args() {
        Ok(args) => args,
        Err(status) => return status.into(),
    };
    runner::exit(run(args).await)
}

async fn run(args: IndiArgs) -> eyre::Result<ExitStatus> {
    let config = runner::load_config(args.config.as_deref())?;
    let app = runner::connect(&config)?;

    let result = dews_off(&app, &config, args.port).await;
    Ok(runner::finish(&app, result).await)
}

async fn dews_off<R: RemoteControl>(
    app: &Ccdciel<R>,
    config: &Config,
    port: Option<u16>,
) -> TaskResult<()> {
    let mut session = IndiSession::connect_with(&config.indi, port).await?;
    let device_wait = Duration::from_secs(config.indi.device_wait_secs);
    power_box::dews_off(app, &mut session, &config.power_box, device_wait).await
}
