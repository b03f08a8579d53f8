use super::*;
use crate::config::Config;
use crate::indi::{IndiResult, IndiSession};
use crate::positioning::{drive_to, FocuserAxis, Settle, WheelAxis};
use crate::rpc::{Ccdciel, RemoteControl, SessionLog};
use crate::util::Clock;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Device not connected
    Skipped,
    TimedOut,
    Failed(String),
}

impl Display for StepOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("done"),
            StepOutcome::Skipped => f.write_str("skipped, not connected"),
            StepOutcome::TimedOut => f.write_str("timed out"),
            StepOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndSessionReport {
    pub focuser: StepOutcome,
    pub filter_wheel: StepOutcome,
    pub mount: StepOutcome,
}

impl EndSessionReport {
    pub fn any_failed(&self) -> bool {
        [&self.focuser, &self.filter_wheel, &self.mount]
            .iter()
            .any(|s| matches!(s, StepOutcome::Failed(_)))
    }
}

fn outcome(result: TaskResult<StepOutcome>) -> StepOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(TaskError::NotConnected(_)) => StepOutcome::Skipped,
        Err(e) => StepOutcome::Failed(e.to_string()),
    }
}

/// Focuser to 0, offsets cleared, first filter, mount home. Every step runs
/// whatever happened to the previous one.
pub async fn end_session<R, S, F, Fut>(
    app: &Ccdciel<R>,
    clock: &dyn Clock,
    config: &Config,
    connect: F,
) -> EndSessionReport
where
    R: RemoteControl,
    S: AsyncRead + AsyncWrite,
    F: FnOnce() -> Fut,
    Fut: Future<Output = IndiResult<IndiSession<S>>>,
{
    let focuser = outcome(focuser_to_zero(app, clock, config).await);
    app.info(&format!("Focuser to zero: {}", focuser)).await;

    let filter_wheel = outcome(wheel_to_first(app, clock, config).await);
    app.info(&format!("Filter wheel to first filter: {}", filter_wheel))
        .await;

    let mount = outcome(mount_home(app, clock, config, connect).await);
    app.info(&format!("Mount to home position: {}", mount))
        .await;

    EndSessionReport {
        focuser,
        filter_wheel,
        mount,
    }
}

async fn focuser_to_zero<R: RemoteControl>(
    app: &Ccdciel<R>,
    clock: &dyn Clock,
    config: &Config,
) -> TaskResult<StepOutcome> {
    if !app.focuser_connected().await? {
        return Err(TaskError::NotConnected("focuser"));
    }
    let before = app.focuser_position().await?;
    app.info(&format!("Focuser before setting to zero position={}", before))
        .await;

    let mut outcome = StepOutcome::Done;
    if before > 0 {
        let limits = config.focuser.limits();
        let settled = drive_to(
            &FocuserAxis::new(app),
            0,
            limits.normal,
            limits.poll_interval,
            clock,
            app,
        )
        .await?;
        if let Settle::TimedOut(p) = settled {
            app.warning(&format!(
                "Focuser not at 0 after {} s, it is at {}",
                limits.normal.as_secs(),
                p
            ))
            .await;
            outcome = StepOutcome::TimedOut;
        }
    }

    let after = app.focuser_position().await?;
    app.info(&format!("Focuser after setting to zero position={}", after))
        .await;
    Ok(outcome)
}

async fn wheel_to_first<R: RemoteControl>(
    app: &Ccdciel<R>,
    clock: &dyn Clock,
    config: &Config,
) -> TaskResult<StepOutcome> {
    if !app.wheel_connected().await? {
        return Err(TaskError::NotConnected("filter wheel"));
    }
    let filters = app.filter_names().await?;
    let name_of = |slot: u32| {
        (slot as usize)
            .checked_sub(1)
            .and_then(|i| filters.get(i))
            .cloned()
            .unwrap_or_else(|| format!("slot {}", slot))
    };
    app.info(&format!("Current filter is {}", name_of(app.wheel_slot().await?)))
        .await;

    for filter in &filters {
        if let Err(e) = app.set_filter_offset(filter, 0).await {
            app.warning(&format!("Cannot zero the offset of {}: {}", filter, e))
                .await;
        }
    }

    let limits = config.filter_wheel.limits();
    let settled = drive_to(
        &WheelAxis::new(app),
        1,
        limits.normal,
        limits.poll_interval,
        clock,
        app,
    )
    .await?;
    let outcome = match settled {
        Settle::Reached(_) => StepOutcome::Done,
        Settle::TimedOut(_) => {
            app.warning(&format!(
                "Filter wheel not at {} after {} s",
                name_of(1),
                limits.normal.as_secs()
            ))
            .await;
            StepOutcome::TimedOut
        }
    };

    app.info(&format!("Final filter is {}", name_of(app.wheel_slot().await?)))
        .await;
    Ok(outcome)
}

async fn mount_home<R, S, F, Fut>(
    app: &Ccdciel<R>,
    clock: &dyn Clock,
    config: &Config,
    connect: F,
) -> TaskResult<StepOutcome>
where
    R: RemoteControl,
    S: AsyncRead + AsyncWrite,
    F: FnOnce() -> Fut,
    Fut: Future<Output = IndiResult<IndiSession<S>>>,
{
    super::mount::prepare(app).await?;
    let mut session = connect().await?;
    let wait = Duration::from_secs(config.indi.device_wait_secs);
    super::mount::send_home(app, &mut session, &config.mount, wait).await?;

    app.info(&format!(
        "Waiting {} s for the mount to reach home",
        config.mount.settle_secs
    ))
    .await;
    clock
        .sleep(Duration::from_secs(config.mount.settle_secs))
        .await;
    Ok(StepOutcome::Done)
}
