use super::*;
use crate::util::AppVersion;
use serde_json::json;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    fn prefix(&self) -> &'static str {
        match self {
            Self::Debug => "[DEBUG] ",
            Self::Info => "",
            Self::Warning => "[WARNING] ",
            Self::Error => "[ERROR] ",
            Self::Critical => "[CRITICAL ERROR] ",
        }
    }
}

/// Messages the operator sees in the application's session log.
#[async_trait]
pub trait SessionLog: Send + Sync {
    async fn log(&self, severity: Severity, message: &str);

    async fn debug(&self, message: &str) {
        self.log(Severity::Debug, message).await
    }

    async fn info(&self, message: &str) {
        self.log(Severity::Info, message).await
    }

    async fn warning(&self, message: &str) {
        self.log(Severity::Warning, message).await
    }

    async fn error(&self, message: &str) {
        self.log(Severity::Error, message).await
    }

    async fn critical(&self, message: &str) {
        self.log(Severity::Critical, message).await
    }
}

/// Autofocus routine run by the application
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AutofocusKind {
    /// May slew to a bright star first
    #[default]
    Auto,
    /// Focus on the current field
    Inplace,
}

impl AutofocusKind {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Auto => "AutomaticAutofocus",
            Self::Inplace => "Autofocus",
        }
    }
}

impl Display for AutofocusKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => f.write_str("AUTO"),
            Self::Inplace => f.write_str("INPLACE"),
        }
    }
}

/// Typed access to the CCDciel methods used by the tools.
pub struct Ccdciel<R> {
    remote: R,
}

impl<R: RemoteControl> Ccdciel<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> RpcResult<Value> {
        self.remote.invoke(method, params).await
    }

    async fn call_bool(&self, method: &str) -> RpcResult<bool> {
        let result = self.call(method, vec![]).await?;
        result
            .as_bool()
            .ok_or_else(|| RpcError::unexpected(method, &result))
    }

    /* Application */

    pub async fn version(&self) -> RpcResult<AppVersion> {
        const METHOD: &str = "CCDciel_Version";
        let result = self.call(METHOD, vec![]).await?;
        let parts: Vec<&str> = result
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        match parts.as_slice() {
            [release, revision, ..] => AppVersion::from_parts(release, revision)
                .map_err(|_| RpcError::unexpected(METHOD, &result)),
            _ => Err(RpcError::unexpected(METHOD, &result)),
        }
    }

    /* Focuser */

    pub async fn focuser_connected(&self) -> RpcResult<bool> {
        self.call_bool("Focuser_connected").await
    }

    pub async fn focuser_position(&self) -> RpcResult<i64> {
        const METHOD: &str = "FocuserPosition";
        let result = self.call(METHOD, vec![]).await?;
        as_integer(&result).ok_or_else(|| RpcError::unexpected(METHOD, &result))
    }

    pub async fn set_focuser_position(&self, position: i64) -> RpcResult<()> {
        self.call("Focuser_setposition", vec![json!(position)])
            .await
            .map(|_| ())
    }

    /* Filter wheel */

    pub async fn wheel_connected(&self) -> RpcResult<bool> {
        self.call_bool("Wheel_connected").await
    }

    /// Current 1-based slot
    pub async fn wheel_slot(&self) -> RpcResult<u32> {
        const METHOD: &str = "Wheel_getfilter";
        let result = self.call(METHOD, vec![]).await?;
        // {"status": "3"} on current releases, a bare number on some older ones
        let slot = match &result {
            Value::Object(o) => o.get("status").and_then(as_integer),
            v => as_integer(v),
        };
        slot.and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| RpcError::unexpected(METHOD, &result))
    }

    pub async fn set_wheel_slot(&self, slot: u32) -> RpcResult<()> {
        self.call("Wheel_setfilter", vec![json!(slot)])
            .await
            .map(|_| ())
    }

    /// Names of the filters, index 0 is slot 1
    pub async fn filter_names(&self) -> RpcResult<Vec<String>> {
        const METHOD: &str = "Wheel_GetfiltersName";
        let result = self.call(METHOD, vec![]).await?;
        result
            .as_array()
            .map(|a| {
                a.iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .ok_or_else(|| RpcError::unexpected(METHOD, &result))
    }

    pub async fn set_filter_offset(&self, filter: &str, offset: i64) -> RpcResult<()> {
        self.call("Set_FilterOffset", vec![json!(filter), json!(offset)])
            .await
            .map(|_| ())
    }

    /// Blocks until the application finished focusing
    pub async fn autofocus(&self, kind: AutofocusKind) -> RpcResult<Value> {
        self.call(kind.method(), vec![]).await
    }

    /* Camera */

    pub async fn camera_connected(&self) -> RpcResult<bool> {
        self.call_bool("Camera_connected").await
    }

    pub async fn ccd_temperature(&self) -> RpcResult<f64> {
        const METHOD: &str = "CcdTemp";
        let result = self.call(METHOD, vec![]).await?;
        as_float(&result).ok_or_else(|| RpcError::unexpected(METHOD, &result))
    }

    pub async fn set_ccd_temperature(&self, celsius: f64) -> RpcResult<()> {
        self.call("Ccd_settemperature", vec![json!(celsius)])
            .await
            .map(|_| ())
    }

    /* Telescope */

    pub async fn telescope_connected(&self) -> RpcResult<bool> {
        self.call_bool("Telescope_Connected").await
    }

    pub async fn telescope_parked(&self) -> RpcResult<bool> {
        self.call_bool("Telescope_Parked").await
    }

    /// Returns the status reported by the application
    pub async fn telescope_park(&self, park: bool) -> RpcResult<String> {
        let result = self.call("Telescope_Park", vec![json!(park)]).await?;
        Ok(match result.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(v) => v.to_string(),
            None => result.to_string(),
        })
    }
}

#[async_trait]
impl<R: RemoteControl> SessionLog for Ccdciel<R> {
    async fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!("{}", message),
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error | Severity::Critical => tracing::error!("{}", message),
        }

        let line = format!("{}{}", severity.prefix(), message);
        if let Err(e) = self.call("LogMsg", vec![json!(line)]).await {
            tracing::warn!("Could not forward message to the session log: {}", e);
        }
    }
}

fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::SimulatedObservatory;

    #[test]
    fn test_loose_numbers() {
        assert_eq!(as_integer(&json!(12000)), Some(12000));
        assert_eq!(as_integer(&json!("3")), Some(3));
        assert_eq!(as_integer(&json!(41.6)), Some(42));
        assert_eq!(as_integer(&json!(null)), None);
        assert_eq!(as_float(&json!("-4.5")), Some(-4.5));
    }

    #[test]
    fn test_autofocus_methods() {
        assert_eq!(AutofocusKind::Auto.method(), "AutomaticAutofocus");
        assert_eq!(AutofocusKind::Inplace.method(), "Autofocus");
        assert_eq!(AutofocusKind::default(), AutofocusKind::Auto);
    }

    #[tokio::test]
    async fn test_log_prefixes() {
        let sim = SimulatedObservatory::new(&["L"]);
        let app = Ccdciel::new(&sim);
        app.info("plain").await;
        app.warning("careful").await;
        app.critical("stop").await;
        assert_eq!(
            sim.session_log(),
            vec!["plain", "[WARNING] careful", "[CRITICAL ERROR] stop"]
        );
    }

    #[tokio::test]
    async fn test_typed_queries() {
        let sim = SimulatedObservatory::new(&["L", "R", "G"]);
        sim.update(|s| {
            s.wheel_slot = 2;
            s.focuser_position = 7345;
        });
        let app = Ccdciel::new(&sim);
        assert_eq!(app.wheel_slot().await.unwrap(), 2);
        assert_eq!(app.focuser_position().await.unwrap(), 7345);
        assert_eq!(app.filter_names().await.unwrap(), vec!["L", "R", "G"]);
        assert_eq!(
            app.version().await.unwrap(),
            AppVersion::new(&[0, 9, 92], 3829)
        );
    }
}
