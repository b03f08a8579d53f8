use crate::positioning::MoveLimits;
use crate::util::AppVersion;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/* Config */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteSettings,
    pub indi: IndiSettings,
    #[serde(deserialize_with = "focuser_motion")]
    pub focuser: MotionSettings,
    #[serde(deserialize_with = "filter_wheel_motion")]
    pub filter_wheel: MotionSettings,
    pub calibration: CalibrationSettings,
    pub camera: CameraSettings,
    pub mount: MountSettings,
    pub power_box: PowerBoxSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteSettings::default(),
            indi: IndiSettings::default(),
            focuser: MotionSettings::focuser(),
            filter_wheel: MotionSettings::filter_wheel(),
            calibration: CalibrationSettings::default(),
            camera: CameraSettings::default(),
            mount: MountSettings::default(),
            power_box: PowerBoxSettings::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{section}.{field} must be greater than 0")]
    Zero {
        section: &'static str,
        field: &'static str,
    },
}

impl Config {
    /// Rejects values which would turn a wait loop into a busy loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let polls = [
            ("focuser", "poll_interval_millis", self.focuser.poll_interval_millis),
            ("filter_wheel", "poll_interval_millis", self.filter_wheel.poll_interval_millis),
            ("camera", "poll_interval_secs", self.camera.poll_interval_secs),
        ];
        match polls.iter().find(|(_, _, value)| *value == 0) {
            Some(&(section, field, _)) => Err(ConfigError::Zero { section, field }),
            None => Ok(()),
        }
    }
}

/* CCDciel JSON-RPC endpoint */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl RemoteSettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}/jsonrpc", self.host, self.port)
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3277,
            // autofocus runs inside a single call
            request_timeout_secs: 1800,
        }
    }
}

/* INDI server */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndiSettings {
    pub host: String,
    pub port: u16,
    pub device_wait_secs: u64,
}

impl Default for IndiSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7625,
            device_wait_secs: 30,
        }
    }
}

/* Focuser / filter wheel motion limits */
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct MotionSettings {
    pub move_timeout_secs: u64,
    pub restore_timeout_secs: u64,
    pub poll_interval_millis: u64,
}

impl MotionSettings {
    pub fn focuser() -> Self {
        Self {
            move_timeout_secs: 120,
            restore_timeout_secs: 240,
            poll_interval_millis: 1000,
        }
    }

    pub fn filter_wheel() -> Self {
        Self {
            move_timeout_secs: 30,
            restore_timeout_secs: 60,
            poll_interval_millis: 1000,
        }
    }

    pub fn limits(&self) -> MoveLimits {
        MoveLimits {
            normal: Duration::from_secs(self.move_timeout_secs),
            restore: Duration::from_secs(self.restore_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_millis),
        }
    }
}

/// A `[focuser]` or `[filter_wheel]` section; fields left out keep the device's defaults
#[derive(Deserialize)]
struct MotionOverrides {
    move_timeout_secs: Option<u64>,
    restore_timeout_secs: Option<u64>,
    poll_interval_millis: Option<u64>,
}

impl MotionOverrides {
    fn over(self, defaults: MotionSettings) -> MotionSettings {
        MotionSettings {
            move_timeout_secs: self.move_timeout_secs.unwrap_or(defaults.move_timeout_secs),
            restore_timeout_secs: self
                .restore_timeout_secs
                .unwrap_or(defaults.restore_timeout_secs),
            poll_interval_millis: self
                .poll_interval_millis
                .unwrap_or(defaults.poll_interval_millis),
        }
    }
}

fn focuser_motion<'de, D: Deserializer<'de>>(d: D) -> Result<MotionSettings, D::Error> {
    Ok(MotionOverrides::deserialize(d)?.over(MotionSettings::focuser()))
}

fn filter_wheel_motion<'de, D: Deserializer<'de>>(d: D) -> Result<MotionSettings, D::Error> {
    Ok(MotionOverrides::deserialize(d)?.over(MotionSettings::filter_wheel()))
}

/* Filter calibration */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSettings {
    /// Relative paths are taken from the directory holding the executable
    pub database: PathBuf,
    /// Oldest CCDciel accepting `Set_FilterOffset`
    pub min_offset_version: AppVersion,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("focuser_position_per_filter.db"),
            min_offset_version: AppVersion::new(&[0, 9, 92], 3829),
        }
    }
}

/* Camera warm up */
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub warm_up_celsius: f64,
    pub warm_up_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            warm_up_celsius: 20.0,
            warm_up_timeout_secs: 300,
            poll_interval_secs: 5,
        }
    }
}

/* Mount homing over INDI */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSettings {
    pub device: String,
    pub home_property: String,
    pub go_home_element: String,
    pub settle_secs: u64,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            device: "iEQ".to_string(),
            home_property: "HOME".to_string(),
            go_home_element: "GoToHome".to_string(),
            settle_secs: 60,
        }
    }
}

/* Power box dew heaters over INDI */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerBoxSettings {
    pub device: String,
    pub dew_auto_property: String,
    pub dew_auto_off_element: String,
    pub dew_power_property: String,
    pub dew_outputs: Vec<String>,
}

impl Default for PowerBoxSettings {
    fn default() -> Self {
        Self {
            device: "Pegasus SPB".to_string(),
            dew_auto_property: "DEWAUTO".to_string(),
            dew_auto_off_element: "INDI_DISABLED".to_string(),
            dew_power_property: "DEW_PWM".to_string(),
            dew_outputs: vec!["DEW_A".to_string(), "DEW_B".to_string()],
        }
    }
}
