use ccdciel_scripts::indi::IndiSession;
use ccdciel_scripts::runner::{self, IndiArgs};
use ccdciel_scripts::tasks::end_session::end_session;
use ccdciel_scripts::util::{ExitStatus, TokioClock};
use std::process::ExitCode;

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
    let clock = TokioClock::new();

    let report = end_session(&app, &clock, &config, || {
        IndiSession::connect_with(&config.indi, args.port)
    })
    .await;
    tracing::info!("{:?}", report);

    if report.any_failed() {
        Ok(ExitStatus::Fatal)
    } else {
        Ok(ExitStatus::Success)
    }
}
