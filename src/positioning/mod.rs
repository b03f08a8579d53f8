//! Bounded command-and-poll moves for the focuser and the filter wheel.
//!
//! A move that does not reach its target within the normal budget is undone by
//! driving the axis back to where it started. Only a failed undo is fatal.

pub use axes::*;

mod axes;

use crate::rpc::{RpcError, RpcResult, SessionLog};
use crate::util::Clock;
use async_trait::async_trait;
use std::fmt::{Debug, Display, Formatter};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MoveLimits {
    pub normal: Duration,
    pub restore: Duration,
    pub poll_interval: Duration,
}

/// Something which can be commanded to a value and polled for its current value.
#[async_trait]
pub trait Axis: Send + Sync {
    type Value: Copy + PartialEq + Display + Debug + Into<i64> + Send + Sync;

    fn device(&self) -> &str;
    async fn current(&self) -> RpcResult<Self::Value>;
    async fn command(&self, target: Self::Value) -> RpcResult<()>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Normal,
    RestorePending,
    Restoring,
    Done,
    RestoreFailed,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Normal => "normal",
            Phase::RestorePending => "restore pending",
            Phase::Restoring => "restoring",
            Phase::Done => "done",
            Phase::RestoreFailed => "restore failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveOutcome<V> {
    Reached(V),
    /// The target was missed and the axis is back where it started
    NotReachedButRestored { target: V, position: V },
}

impl<V> MoveOutcome<V> {
    pub fn reached(&self) -> bool {
        matches!(self, MoveOutcome::Reached(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Settle<V> {
    Reached(V),
    TimedOut(V),
}

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("{device} missed {target} and could not be restored to {origin}, it is at {position}")]
    CouldNotRestore {
        device: String,
        target: i64,
        origin: i64,
        position: i64,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub type MoveResult<T> = Result<T, MoveError>;

/// Drives one axis to one target, restoring the starting value on timeout.
pub struct Positioner<'a, A, L: ?Sized> {
    axis: &'a A,
    clock: &'a dyn Clock,
    log: &'a L,
    limits: MoveLimits,
    phase: Phase,
}

impl<'a, A, L> Positioner<'a, A, L>
where
    A: Axis,
    L: SessionLog + ?Sized,
{
    pub fn new(axis: &'a A, limits: MoveLimits, clock: &'a dyn Clock, log: &'a L) -> Self {
        Self {
            axis,
            clock,
            log,
            limits,
            phase: Phase::Normal,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    async fn enter(&mut self, next: Phase) {
        self.log
            .info(&format!(
                "{}: {} -> {}",
                self.axis.device(),
                self.phase,
                next
            ))
            .await;
        self.phase = next;
    }

    pub async fn run(&mut self, target: A::Value) -> MoveResult<MoveOutcome<A::Value>> {
        let device = self.axis.device().to_string();
        let origin = self.axis.current().await?;
        if origin == target {
            self.log
                .info(&format!("{} already at {}", device, target))
                .await;
            self.phase = Phase::Done;
            return Ok(MoveOutcome::Reached(target));
        }

        self.log
            .info(&format!("Moving {} from {} to {}", device, origin, target))
            .await;
        let settled = settle(
            self.axis,
            target,
            self.limits.normal,
            self.limits.poll_interval,
            self.clock,
            self.log,
        )
        .await?;

        let missed_at = match settled {
            Settle::Reached(v) => {
                self.enter(Phase::Done).await;
                return Ok(MoveOutcome::Reached(v));
            }
            Settle::TimedOut(v) => v,
        };

        self.log
            .warning(&format!(
                "{} did not reach {} within {} s, it is at {}",
                device,
                target,
                self.limits.normal.as_secs(),
                missed_at
            ))
            .await;
        self.enter(Phase::RestorePending).await;
        self.enter(Phase::Restoring).await;

        let restored = settle(
            self.axis,
            origin,
            self.limits.restore,
            self.limits.poll_interval,
            self.clock,
            self.log,
        )
        .await?;

        match restored {
            Settle::Reached(position) => {
                self.enter(Phase::Done).await;
                self.log
                    .warning(&format!("{} restored to {}", device, position))
                    .await;
                Ok(MoveOutcome::NotReachedButRestored { target, position })
            }
            Settle::TimedOut(position) => {
                self.enter(Phase::RestoreFailed).await;
                Err(MoveError::CouldNotRestore {
                    device,
                    target: target.into(),
                    origin: origin.into(),
                    position: position.into(),
                })
            }
        }
    }
}

/// Move with restore-on-timeout. See [`Positioner`].
pub async fn move_to<A, L>(
    axis: &A,
    target: A::Value,
    limits: MoveLimits,
    clock: &dyn Clock,
    log: &L,
) -> MoveResult<MoveOutcome<A::Value>>
where
    A: Axis,
    L: SessionLog + ?Sized,
{
    Positioner::new(axis, limits, clock, log).run(target).await
}

/// Command and wait at most `timeout`. No restore is attempted.
pub async fn drive_to<A, L>(
    axis: &A,
    target: A::Value,
    timeout: Duration,
    poll_interval: Duration,
    clock: &dyn Clock,
    log: &L,
) -> RpcResult<Settle<A::Value>>
where
    A: Axis,
    L: SessionLog + ?Sized,
{
    if axis.current().await? == target {
        return Ok(Settle::Reached(target));
    }
    settle(axis, target, timeout, poll_interval, clock, log).await
}

async fn settle<A, L>(
    axis: &A,
    target: A::Value,
    budget: Duration,
    poll_interval: Duration,
    clock: &dyn Clock,
    log: &L,
) -> RpcResult<Settle<A::Value>>
where
    A: Axis,
    L: SessionLog + ?Sized,
{
    axis.command(target).await?;
    let start = clock.now();

    loop {
        let position = axis.current().await?;
        log.debug(&format!(
            "{} at {}, target {}",
            axis.device(),
            position,
            target
        ))
        .await;

        if position == target {
            return Ok(Settle::Reached(position));
        }
        if clock.now().saturating_sub(start) >= budget {
            return Ok(Settle::TimedOut(position));
        }
        clock.sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::Severity;
    use crate::util::ManualClock;
    use std::sync::Mutex;

    /// Moves one step per poll toward the commanded value, unless frozen
    struct Stepper {
        state: Mutex<(i64, i64)>,
        step: i64,
        frozen: bool,
        commands: Mutex<Vec<i64>>,
    }

    impl Stepper {
        fn new(start: i64, step: i64) -> Self {
            Self {
                state: Mutex::new((start, start)),
                step,
                frozen: false,
                commands: Mutex::new(vec![]),
            }
        }

        fn frozen(start: i64) -> Self {
            Self {
                frozen: true,
                ..Self::new(start, 0)
            }
        }
    }

    #[async_trait]
    impl Axis for Stepper {
        type Value = i64;

        fn device(&self) -> &str {
            "stepper"
        }

        async fn current(&self) -> RpcResult<i64> {
            let mut s = self.state.lock().unwrap();
            if !self.frozen {
                let (pos, target) = *s;
                let delta = (target - pos).clamp(-self.step, self.step);
                s.0 = pos + delta;
            }
            Ok(s.0)
        }

        async fn command(&self, target: i64) -> RpcResult<()> {
            self.commands.lock().unwrap().push(target);
            self.state.lock().unwrap().1 = target;
            Ok(())
        }
    }

    /// Restores fine but never reaches anything else
    struct OneWay {
        origin: i64,
        position: Mutex<i64>,
    }

    #[async_trait]
    impl Axis for OneWay {
        type Value = i64;

        fn device(&self) -> &str {
            "one way"
        }

        async fn current(&self) -> RpcResult<i64> {
            Ok(*self.position.lock().unwrap())
        }

        async fn command(&self, target: i64) -> RpcResult<()> {
            if target == self.origin {
                *self.position.lock().unwrap() = target;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(Severity, String)>>);

    #[async_trait]
    impl SessionLog for Recorder {
        async fn log(&self, severity: Severity, message: &str) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    fn limits() -> MoveLimits {
        MoveLimits {
            normal: Duration::from_secs(120),
            restore: Duration::from_secs(240),
            poll_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_converges_before_timeout() {
        let axis = Stepper::new(0, 100);
        let clock = ManualClock::new();
        let log = Recorder::default();

        let mut positioner = Positioner::new(&axis, limits(), &clock, &log);
        let outcome = positioner.run(500).await.unwrap();

        assert_eq!(outcome, MoveOutcome::Reached(500));
        assert_eq!(positioner.phase(), Phase::Done);
        assert!(clock.sleeps() < 120);
        assert_eq!(clock.sleeps(), 4);
        assert_eq!(*axis.commands.lock().unwrap(), vec![500]);
    }

    #[tokio::test]
    async fn test_already_at_target_sends_nothing() {
        let axis = Stepper::new(42, 1);
        let clock = ManualClock::new();
        let log = Recorder::default();

        let outcome = move_to(&axis, 42, limits(), &clock, &log).await.unwrap();
        assert_eq!(outcome, MoveOutcome::Reached(42));
        assert!(axis.commands.lock().unwrap().is_empty());
        assert_eq!(clock.sleeps(), 0);
    }

    #[tokio::test]
    async fn test_frozen_axis_counts_as_restored() {
        let axis = Stepper::frozen(10);
        let clock = ManualClock::new();
        let log = Recorder::default();

        let mut positioner = Positioner::new(&axis, limits(), &clock, &log);
        let outcome = positioner.run(20).await.unwrap();

        assert_eq!(
            outcome,
            MoveOutcome::NotReachedButRestored {
                target: 20,
                position: 10
            }
        );
        assert_eq!(positioner.phase(), Phase::Done);
        assert_eq!(*axis.commands.lock().unwrap(), vec![20, 10]);
    }

    #[tokio::test]
    async fn test_never_converging_terminates_fatally() {
        // slips to slot 3 as soon as it is commanded anywhere
        struct Drifting {
            reads: Mutex<u32>,
        }

        #[async_trait]
        impl Axis for Drifting {
            type Value = u32;

            fn device(&self) -> &str {
                "wheel"
            }

            async fn current(&self) -> RpcResult<u32> {
                let mut reads = self.reads.lock().unwrap();
                *reads += 1;
                Ok(if *reads == 1 { 1 } else { 3 })
            }

            async fn command(&self, _: u32) -> RpcResult<()> {
                Ok(())
            }
        }

        let clock = ManualClock::new();
        let log = Recorder::default();
        let limits = MoveLimits {
            normal: Duration::from_secs(30),
            restore: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        };

        let axis = Drifting {
            reads: Mutex::new(0),
        };
        let err = move_to(&axis, 2, limits, &clock, &log).await.unwrap_err();
        match err {
            MoveError::CouldNotRestore {
                target,
                origin,
                position,
                ..
            } => {
                assert_eq!((target, origin, position), (2, 1, 3));
            }
            e => panic!("unexpected {:?}", e),
        }

        let total = clock.now();
        assert!(total >= Duration::from_secs(90));
        assert!(total <= Duration::from_secs(91));

        let log = log.0.lock().unwrap();
        assert!(log.iter().any(|(s, m)| *s == Severity::Info
            && m.contains("restoring -> restore failed")));
        assert!(log.iter().any(|(s, _)| *s == Severity::Debug));
    }

    #[tokio::test]
    async fn test_restore_after_missed_target() {
        let axis = OneWay {
            origin: 4,
            position: Mutex::new(4),
        };
        let clock = ManualClock::new();
        let log = Recorder::default();

        let outcome = move_to(&axis, 1, limits(), &clock, &log).await.unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::NotReachedButRestored {
                target: 1,
                position: 4
            }
        );
        assert!(!outcome.reached());
        assert!(clock.now() >= Duration::from_secs(120));
        assert!(clock.now() <= Duration::from_secs(121));
    }

    #[tokio::test]
    async fn test_drive_to_times_out_without_restore() {
        let axis = Stepper::frozen(0);
        let clock = ManualClock::new();
        let log = Recorder::default();

        let settled = drive_to(
            &axis,
            100,
            Duration::from_secs(30),
            Duration::from_secs(1),
            &clock,
            &log,
        )
        .await
        .unwrap();
        assert_eq!(settled, Settle::TimedOut(0));
        assert_eq!(*axis.commands.lock().unwrap(), vec![100]);
    }
}
