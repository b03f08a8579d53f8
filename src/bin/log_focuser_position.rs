use ccdciel_scripts::runner::{self, ConfigArgs};
use ccdciel_scripts::tasks::report;
use ccdciel_scripts::util::ExitStatus;
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

    let result = report::log_focuser_position(&app).await;
    Ok(runner::finish(&app, result).await)
}
