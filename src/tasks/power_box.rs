use super::*;
use crate::config::PowerBoxSettings;
use crate::indi::IndiSession;
use crate::rpc::{Ccdciel, RemoteControl, SessionLog};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Puts dew heater control in manual mode and turns every configured output off.
pub async fn dews_off<R, S>(
    app: &Ccdciel<R>,
    session: &mut IndiSession<S>,
    settings: &PowerBoxSettings,
    device_wait: Duration,
) -> TaskResult<()>
where
    R: RemoteControl,
    S: AsyncRead + AsyncWrite,
{
    session
        .wait_for_property(&settings.device, &settings.dew_auto_property, device_wait)
        .await?;
    session
        .set_switch(
            &settings.device,
            &settings.dew_auto_property,
            &settings.dew_auto_off_element,
            true,
        )
        .await?;
    app.info(&format!("{} dew automation disabled", settings.device))
        .await;

    session
        .wait_for_property(&settings.device, &settings.dew_power_property, device_wait)
        .await?;
    let values: Vec<(&str, f64)> = settings
        .dew_outputs
        .iter()
        .map(|output| (output.as_str(), 0.0))
        .collect();
    session
        .set_numbers(&settings.device, &settings.dew_power_property, &values)
        .await?;
    app.info(&format!(
        "{} dew outputs {} set to 0",
        settings.device,
        settings.dew_outputs.join(", ")
    ))
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indi::tests::read_available;
    use crate::indi::IndiError;
    use crate::rpc::mock::SimulatedObservatory;
    use tokio::io::AsyncWriteExt;

    const DEFINITIONS: &[u8] = br#"<defSwitchVector device="Pegasus SPB" name="DEWAUTO" perm="rw" rule="OneOfMany"><defSwitch name="INDI_ENABLED">On</defSwitch><defSwitch name="INDI_DISABLED">Off</defSwitch></defSwitchVector>
<defNumberVector device="Pegasus SPB" name="DEW_PWM" perm="rw"><defNumber name="DEW_A" min="0" max="100">40</defNumber><defNumber name="DEW_B" min="0" max="100">25</defNumber></defNumberVector>
"#;

    #[tokio::test]
    async fn test_dews_off() {
        let sim = SimulatedObservatory::new(&["L"]);
        let app = Ccdciel::new(&sim);
        let (client, mut server) = tokio::io::duplex(8192);
        let mut session = IndiSession::start(client).await.unwrap();
        read_available(&mut server).await;
        server.write_all(DEFINITIONS).await.unwrap();

        dews_off(
            &app,
            &mut session,
            &PowerBoxSettings::default(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let mut sent = String::new();
        while !sent.contains("</newNumberVector>") {
            sent.push_str(&read_available(&mut server).await);
        }
        assert!(sent.contains(r#"<oneSwitch name="INDI_DISABLED">On</oneSwitch>"#));
        assert!(sent.contains(
            r#"<oneNumber name="DEW_A">0</oneNumber><oneNumber name="DEW_B">0</oneNumber>"#
        ));
        assert!(sim.log_contains("dew outputs DEW_A, DEW_B set to 0"));
    }

    #[tokio::test]
    async fn test_unknown_output_is_rejected() {
        let sim = SimulatedObservatory::new(&["L"]);
        let app = Ccdciel::new(&sim);
        let (client, mut server) = tokio::io::duplex(8192);
        let mut session = IndiSession::start(client).await.unwrap();
        read_available(&mut server).await;
        server.write_all(DEFINITIONS).await.unwrap();

        let settings = PowerBoxSettings {
            dew_outputs: vec!["DEW_C".to_string()],
            ..PowerBoxSettings::default()
        };
        let err = dews_off(&app, &mut session, &settings, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TaskError::Indi(IndiError::UnknownElement { .. })
        ));
    }
}
