use super::*;
use crate::config::CameraSettings;
use crate::rpc::{Ccdciel, RemoteControl, SessionLog};
use crate::util::Clock;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum WarmUp {
    Reached(f64),
    /// Still below the set point when time ran out
    TimedOut(f64),
}

/// Raises the CCD set point and waits for the sensor to follow.
pub async fn warm_up<R: RemoteControl>(
    app: &Ccdciel<R>,
    clock: &dyn Clock,
    settings: &CameraSettings,
) -> TaskResult<WarmUp> {
    if !app.camera_connected().await? {
        return Err(TaskError::NotConnected("camera"));
    }

    let target = settings.warm_up_celsius;
    app.set_ccd_temperature(target).await?;
    app.info(&format!("Warming up the camera to {:.1} C", target))
        .await;

    let timeout = Duration::from_secs(settings.warm_up_timeout_secs);
    let start = clock.now();
    let outcome = loop {
        let temperature = app.ccd_temperature().await?;
        if temperature >= target {
            break WarmUp::Reached(temperature);
        }
        if clock.now().saturating_sub(start) > timeout {
            app.warning(&format!(
                "Timeout reached while warming up the camera, temperature {:.1} C",
                temperature
            ))
            .await;
            break WarmUp::TimedOut(temperature);
        }
        app.info(&format!("Camera temperature {:.1} C", temperature))
            .await;
        clock
            .sleep(Duration::from_secs(settings.poll_interval_secs))
            .await;
    };

    let temperature = app.ccd_temperature().await?;
    app.info(&format!(
        "Camera warm up completed, temperature {:.1} C",
        temperature
    ))
    .await;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::SimulatedObservatory;
    use crate::util::ManualClock;

    #[tokio::test]
    async fn test_warms_in_steps() {
        let sim = SimulatedObservatory::new(&["L"]);
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();

        let outcome = warm_up(&app, &clock, &CameraSettings::default())
            .await
            .unwrap();
        match outcome {
            WarmUp::Reached(t) => assert_float_absolute_eq!(t, 20.0, 1E-9),
            WarmUp::TimedOut(t) => panic!("timed out at {}", t),
        }
        // -5, 0, 5, 10, 15 are below the set point
        assert_eq!(clock.sleeps(), 5);
        assert_eq!(clock.now(), Duration::from_secs(25));
    }

    #[tokio::test]
    async fn test_timeout_is_not_fatal() {
        let sim = SimulatedObservatory::new(&["L"]);
        sim.update(|s| s.ccd_step = 0.1);
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();

        let outcome = warm_up(&app, &clock, &CameraSettings::default())
            .await
            .unwrap();
        assert!(matches!(outcome, WarmUp::TimedOut(t) if t < 0.0));
        assert!(clock.now() > Duration::from_secs(300));
        assert!(sim.log_contains("[WARNING] Timeout reached"));
    }

    #[tokio::test]
    async fn test_disconnected_camera() {
        let sim = SimulatedObservatory::new(&["L"]);
        sim.update(|s| s.camera_connected = false);
        let app = Ccdciel::new(&sim);
        let clock = ManualClock::new();

        let err = warm_up(&app, &clock, &CameraSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::NotConnected("camera")));
        assert_eq!(sim.count("Ccd_settemperature"), 0);
    }
}
