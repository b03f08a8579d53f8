//! In-process stand-in for a running CCDciel. Public so the integration
//! tests under `tests/` can drive the tools without the application.

use super::*;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct SimState {
    pub version: [String; 3],

    pub focuser_connected: bool,
    pub focuser_position: i64,
    /// Commands are accepted but the focuser never moves
    pub focuser_stuck: bool,

    pub wheel_connected: bool,
    pub wheel_slot: u32,
    pub wheel_stuck: bool,
    /// Every command leaves the wheel on this slot instead of the one asked for
    pub wheel_lands_on: Option<u32>,
    pub filters: Vec<String>,
    pub offsets: BTreeMap<String, i64>,
    pub offsets_supported: bool,

    /// Position an autofocus run settles on, per filter name
    pub best_focus: HashMap<String, i64>,
    /// (method, filter) for every autofocus run
    pub autofocus_runs: Vec<(String, String)>,

    pub camera_connected: bool,
    pub ccd_temperature: f64,
    pub ccd_setpoint: Option<f64>,
    /// Degrees the sensor moves toward the set point on each reading
    pub ccd_step: f64,

    pub telescope_connected: bool,
    pub parked: bool,

    /// Methods that answer with a remote error
    pub failing: HashSet<String>,

    pub log: Vec<String>,
    pub calls: Vec<(String, Vec<Value>)>,
}

pub struct SimulatedObservatory {
    state: Mutex<SimState>,
}

impl SimulatedObservatory {
    pub fn new(filters: &[&str]) -> Self {
        let state = SimState {
            version: [
                "0.9.92".to_string(),
                "3829".to_string(),
                "3829-abcdef0".to_string(),
            ],
            focuser_connected: true,
            focuser_position: 10000,
            focuser_stuck: false,
            wheel_connected: true,
            wheel_slot: 1,
            wheel_stuck: false,
            wheel_lands_on: None,
            filters: filters.iter().map(|f| f.to_string()).collect(),
            offsets: BTreeMap::new(),
            offsets_supported: true,
            best_focus: HashMap::new(),
            autofocus_runs: Vec::new(),
            camera_connected: true,
            ccd_temperature: -10.0,
            ccd_setpoint: None,
            ccd_step: 5.0,
            telescope_connected: true,
            parked: false,
            failing: HashSet::new(),
            log: Vec::new(),
            calls: Vec::new(),
        };

        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // a panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update(&self, f: impl FnOnce(&mut SimState)) {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> SimState {
        self.lock().clone()
    }

    pub fn session_log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Names of the methods invoked so far, in order
    pub fn methods(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.lock().calls.iter().filter(|(m, _)| m == method).count()
    }

    pub fn log_contains(&self, needle: &str) -> bool {
        self.lock().log.iter().any(|l| l.contains(needle))
    }
}

fn not_found(method: &str) -> RpcError {
    RpcError::Remote {
        method: method.to_string(),
        code: -32601,
        message: "Method not found".to_string(),
    }
}

fn bad_params(method: &str, params: &[Value]) -> RpcError {
    RpcError::Remote {
        method: method.to_string(),
        code: -32602,
        message: format!("Invalid params: {:?}", params),
    }
}

#[async_trait]
impl RemoteControl for SimulatedObservatory {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        let mut s = self.lock();
        s.calls.push((method.to_string(), params.clone()));

        if s.failing.contains(method) {
            return Err(RpcError::Remote {
                method: method.to_string(),
                code: -32000,
                message: "simulated failure".to_string(),
            });
        }

        let result = match method {
            "CCDciel_Version" => json!(s.version),
            "LogMsg" => {
                let line = params.first().and_then(Value::as_str).unwrap_or_default();
                s.log.push(line.to_string());
                json!({"status": "OK"})
            }

            "Focuser_connected" => json!(s.focuser_connected),
            "FocuserPosition" => json!(s.focuser_position),
            "Focuser_setposition" => {
                let target = params
                    .first()
                    .and_then(Value::as_i64)
                    .ok_or_else(|| bad_params(method, &params))?;
                if !s.focuser_stuck {
                    s.focuser_position = target;
                }
                json!({"status": "OK"})
            }

            "Wheel_connected" => json!(s.wheel_connected),
            "Wheel_getfilter" => json!({"status": s.wheel_slot.to_string()}),
            "Wheel_setfilter" => {
                let slot = params
                    .first()
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .filter(|v| *v >= 1 && (*v as usize) <= s.filters.len())
                    .ok_or_else(|| bad_params(method, &params))?;
                if let Some(landed) = s.wheel_lands_on {
                    s.wheel_slot = landed;
                } else if !s.wheel_stuck {
                    s.wheel_slot = slot;
                }
                json!({"status": "OK"})
            }
            "Wheel_GetfiltersName" => json!(s.filters),
            "Set_FilterOffset" => {
                if !s.offsets_supported {
                    return Err(not_found(method));
                }
                match params.as_slice() {
                    [Value::String(name), offset] if offset.is_i64() => {
                        let offset = offset.as_i64().unwrap_or_default();
                        s.offsets.insert(name.clone(), offset);
                        json!({"status": "OK"})
                    }
                    _ => return Err(bad_params(method, &params)),
                }
            }

            "AutomaticAutofocus" | "Autofocus" => {
                let filter = (s.wheel_slot as usize)
                    .checked_sub(1)
                    .and_then(|i| s.filters.get(i))
                    .cloned()
                    .unwrap_or_default();
                s.autofocus_runs.push((method.to_string(), filter.clone()));
                if let Some(best) = s.best_focus.get(&filter).copied() {
                    s.focuser_position = best;
                }
                json!({"status": "OK"})
            }

            "Camera_connected" => json!(s.camera_connected),
            "CcdTemp" => {
                if let Some(target) = s.ccd_setpoint {
                    let delta = (target - s.ccd_temperature).clamp(-s.ccd_step, s.ccd_step);
                    s.ccd_temperature += delta;
                }
                json!(s.ccd_temperature)
            }
            "Ccd_settemperature" => {
                let target = params
                    .first()
                    .and_then(Value::as_f64)
                    .ok_or_else(|| bad_params(method, &params))?;
                s.ccd_setpoint = Some(target);
                json!({"status": "OK"})
            }

            "Telescope_Connected" => json!(s.telescope_connected),
            "Telescope_Parked" => json!(s.parked),
            "Telescope_Park" => {
                let park = params
                    .first()
                    .and_then(Value::as_bool)
                    .ok_or_else(|| bad_params(method, &params))?;
                s.parked = park;
                json!({"status": "OK"})
            }

            _ => return Err(not_found(method)),
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_method() {
        let sim = SimulatedObservatory::new(&["L"]);
        let err = sim.invoke("Nope", vec![]).await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_wheel_rejects_out_of_range_slot() {
        let sim = SimulatedObservatory::new(&["L", "R"]);
        assert!(sim.invoke("Wheel_setfilter", vec![json!(3)]).await.is_err());
        sim.invoke("Wheel_setfilter", vec![json!(2)]).await.unwrap();
        assert_eq!(sim.snapshot().wheel_slot, 2);
    }

    #[tokio::test]
    async fn test_camera_warms_in_steps() {
        let sim = SimulatedObservatory::new(&["L"]);
        sim.invoke("Ccd_settemperature", vec![json!(0.0)])
            .await
            .unwrap();
        let first = sim.invoke("CcdTemp", vec![]).await.unwrap();
        let second = sim.invoke("CcdTemp", vec![]).await.unwrap();
        assert_eq!(first.as_f64(), Some(-5.0));
        assert_eq!(second.as_f64(), Some(0.0));
    }
}
