use super::*;
use crate::config::MountSettings;
use crate::indi::IndiSession;
use crate::rpc::{Ccdciel, RemoteControl, SessionLog};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Checks the telescope through CCDciel and unparks it when needed.
pub async fn prepare<R: RemoteControl>(app: &Ccdciel<R>) -> TaskResult<()> {
    if !app.telescope_connected().await? {
        return Err(TaskError::NotConnected("telescope"));
    }
    if app.telescope_parked().await? {
        app.info("Unpark the telescope").await;
        let status = app.telescope_park(false).await?;
        app.info(&format!("Telescope park status {}", status)).await;
    }
    Ok(())
}

/// Switches the mount's go-home element on once the driver defines it.
pub async fn send_home<R, S>(
    app: &Ccdciel<R>,
    session: &mut IndiSession<S>,
    settings: &MountSettings,
    device_wait: Duration,
) -> TaskResult<()>
where
    R: RemoteControl,
    S: AsyncRead + AsyncWrite,
{
    let def = session
        .wait_for_property(&settings.device, &settings.home_property, device_wait)
        .await?;
    tracing::debug!("{} elements: {:?}", def.name, def.elements);

    app.info(&format!("INDI {} go to home position", settings.device))
        .await;
    session
        .set_switch(
            &settings.device,
            &settings.home_property,
            &settings.go_home_element,
            true,
        )
        .await?;
    Ok(())
}
