use super::*;
use crate::rpc::{Ccdciel, RemoteControl};

/// Absolute focuser position in steps
pub struct FocuserAxis<'a, R> {
    app: &'a Ccdciel<R>,
}

impl<'a, R: RemoteControl> FocuserAxis<'a, R> {
    pub fn new(app: &'a Ccdciel<R>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl<'a, R: RemoteControl> Axis for FocuserAxis<'a, R> {
    type Value = i64;

    fn device(&self) -> &str {
        "focuser"
    }

    async fn current(&self) -> RpcResult<i64> {
        self.app.focuser_position().await
    }

    async fn command(&self, target: i64) -> RpcResult<()> {
        self.app.set_focuser_position(target).await
    }
}

/// 1-based filter wheel slot
pub struct WheelAxis<'a, R> {
    app: &'a Ccdciel<R>,
}

impl<'a, R: RemoteControl> WheelAxis<'a, R> {
    pub fn new(app: &'a Ccdciel<R>) -> Self {
        Self { app }
    }
}

#[async_trait]
impl<'a, R: RemoteControl> Axis for WheelAxis<'a, R> {
    type Value = u32;

    fn device(&self) -> &str {
        "filter wheel"
    }

    async fn current(&self) -> RpcResult<u32> {
        self.app.wheel_slot().await
    }

    async fn command(&self, target: u32) -> RpcResult<()> {
        self.app.set_wheel_slot(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::SimulatedObservatory;
    use crate::util::ManualClock;

    fn limits() -> MoveLimits {
        MoveLimits {
            normal: Duration::from_secs(30),
            restore: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_wheel_moves_through_application() {
        let sim = SimulatedObservatory::new(&["L", "R", "G", "B"]);
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();

        let outcome = move_to(&WheelAxis::new(&app), 3, limits(), &clock, &app)
            .await
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Reached(3));
        assert_eq!(sim.snapshot().wheel_slot, 3);
        assert_eq!(sim.count("Wheel_setfilter"), 1);
        assert!(sim.log_contains("[DEBUG] filter wheel at 3, target 3"));
    }

    #[tokio::test]
    async fn test_stuck_focuser_is_restored() {
        let sim = SimulatedObservatory::new(&["L"]);
        sim.update(|s| s.focuser_stuck = true);
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();

        let outcome = move_to(&FocuserAxis::new(&app), 15000, limits(), &clock, &app)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            MoveOutcome::NotReachedButRestored {
                target: 15000,
                position: 10000
            }
        );
        assert!(sim.log_contains("[WARNING] focuser did not reach 15000"));
    }
}
