use ccdciel_scripts::runner::{self, ConfigArgs};
use ccdciel_scripts::tasks::camera;
use ccdciel_scripts::util::{ExitStatus, TokioClock};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    runner::init_logging();

    let args: ConfigArgs = match runner::parse_args() {
        Ok(args) => args,
        Err(status) => return status.into(),
    };
    runner::exit(run(args).await)
}

async fn run(args: ConfigArgs) -> eyre::Result<ExitStatus> {
    let config = runner::load_config(args.config.as_deref())?;
    let app = runner::connect(&config)?;
    let clock = TokioClock::new();

    let result = camera::warm_up(&app, &clock, &config.camera).await;
    Ok(runner::finish(&app, result).await)
}
