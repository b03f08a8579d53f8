use ccdciel_scripts::calibration::{Args, Calibrator, RunSettings};
use ccdciel_scripts::runner;
use ccdciel_scripts::util::{ExitStatus, TokioClock};
use eyre::WrapErr;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    runner::init_logging();

    let args: Args = match runner::parse_args() {
        Ok(args) => args,
        Err(status) => return status.into(),
    };
    runner::exit(run(args).await)
}

async fn run(args: Args) -> eyre::Result<ExitStatus> {
    let config = runner::load_config(args.config.as_deref())?;
    let settings = RunSettings::new(args, &config).wrap_err("Couldn't locate the database")?;
    tracing::info!("{} using {}", settings.mode, settings.database.display());

    let app = runner::connect(&config)?;
    let clock = TokioClock::new();
    Ok(Calibrator::new(&app, &clock, &config, &settings)
        .execute()
        .await)
}
