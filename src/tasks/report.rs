use super::*;
use crate::rpc::{Ccdciel, RemoteControl, SessionLog};

pub async fn log_focuser_position<R: RemoteControl>(app: &Ccdciel<R>) -> TaskResult<i64> {
    if !app.focuser_connected().await? {
        return Err(TaskError::NotConnected("focuser"));
    }
    let position = app.focuser_position().await?;
    app.info(&format!("Focuser position={}", position)).await;
    Ok(position)
}

/// Logs and returns the name of the filter in the light path.
pub async fn log_filter_wheel_position<R: RemoteControl>(app: &Ccdciel<R>) -> TaskResult<String> {
    if !app.wheel_connected().await? {
        return Err(TaskError::NotConnected("filter wheel"));
    }
    let filters = app.filter_names().await?;
    let slot = app.wheel_slot().await?;
    let name = (slot as usize)
        .checked_sub(1)
        .and_then(|i| filters.get(i))
        .cloned()
        .unwrap_or_else(|| format!("slot {}", slot));
    app.info(&format!("Current filter is {}", name)).await;
    Ok(name)
}
