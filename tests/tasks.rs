use ccdciel_scripts::config::Config;
use ccdciel_scripts::indi::IndiSession;
use ccdciel_scripts::rpc::mock::SimulatedObservatory;
use ccdciel_scripts::tasks::end_session::{end_session, StepOutcome};
use ccdciel_scripts::tasks::{mount, power_box};
use ccdciel_scripts::util::ManualClock;
use ccdciel_scripts::Ccdciel;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// INDI server which sends `definitions` once the client asks for properties,
/// then hands back everything the client wrote.
async fn indi_server(definitions: &'static str) -> (u16, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut received = String::new();
        let mut buf = [0u8; 1024];
        let mut sent = false;
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.push_str(&String::from_utf8_lossy(&buf[..n]));
            if !sent && received.contains("<getProperties") {
                socket.write_all(definitions.as_bytes()).await.unwrap();
                sent = true;
            }
        }
        received
    });
    (port, handle)
}

#[tokio::test]
async fn test_mount_go_home_over_tcp() {
    let (port, server) = indi_server(
        r#"<defSwitchVector device="iEQ" name="HOME" perm="rw" rule="AtMostOne"><defSwitch name="GoToHome">Off</defSwitch></defSwitchVector>"#,
    )
    .await;
    let sim = SimulatedObservatory::new(&["L"]);
    sim.update(|s| s.parked = true);
    let app = Ccdciel::new(&sim);
    let config = Config::default();

    mount::prepare(&app).await.unwrap();
    let mut session = IndiSession::connect("127.0.0.1", port).await.unwrap();
    mount::send_home(&app, &mut session, &config.mount, Duration::from_secs(5))
        .await
        .unwrap();
    drop(session);

    let received = server.await.unwrap();
    assert!(received.contains(r#"<getProperties version="1.7"/>"#));
    assert!(received.contains(r#"<oneSwitch name="GoToHome">On</oneSwitch>"#));
    assert!(!sim.snapshot().parked);
}

#[tokio::test]
async fn test_dews_off_over_tcp() {
    let (port, server) = indi_server(
        r#"<defSwitchVector device="Pegasus SPB" name="DEWAUTO" perm="rw"><defSwitch name="INDI_ENABLED">On</defSwitch><defSwitch name="INDI_DISABLED">Off</defSwitch></defSwitchVector><defNumberVector device="Pegasus SPB" name="DEW_PWM" perm="rw"><defNumber name="DEW_A">50</defNumber><defNumber name="DEW_B">50</defNumber></defNumberVector>"#,
    )
    .await;
    let sim = SimulatedObservatory::new(&["L"]);
    let app = Ccdciel::new(&sim);
    let config = Config::default();

    let mut session = IndiSession::connect_with(&config.indi, Some(port))
        .await
        .unwrap();
    power_box::dews_off(&app, &mut session, &config.power_box, Duration::from_secs(5))
        .await
        .unwrap();
    drop(session);

    let received = server.await.unwrap();
    assert!(received.contains(r#"<oneSwitch name="INDI_DISABLED">On</oneSwitch>"#));
    assert!(received.contains(r#"<oneNumber name="DEW_B">0</oneNumber>"#));
}

#[tokio::test]
async fn test_missing_device_times_out() {
    let (port, _server) = indi_server(
        r#"<defSwitchVector device="Other" name="HOME" perm="rw"><defSwitch name="GoToHome">Off</defSwitch></defSwitchVector>"#,
    )
    .await;
    let sim = SimulatedObservatory::new(&["L"]);
    let app = Ccdciel::new(&sim);

    let mut session = IndiSession::connect("127.0.0.1", port).await.unwrap();
    let err = mount::send_home(
        &app,
        &mut session,
        &Config::default().mount,
        Duration::from_millis(200),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("iEQ"));
}

#[tokio::test]
async fn test_end_session_without_indi_server() {
    let sim = SimulatedObservatory::new(&["L", "R"]);
    sim.update(|s| {
        s.focuser_position = 8000;
        s.wheel_slot = 2;
    });
    let app = Ccdciel::new(&sim);
    let clock = ManualClock::new();
    let mut config = Config::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    config.indi.host = "127.0.0.1".to_string();
    config.indi.port = listener.local_addr().unwrap().port();
    drop(listener);

    let report = end_session(&app, &clock, &config, || {
        IndiSession::connect_with(&config.indi, None)
    })
    .await;

    assert_eq!(report.focuser, StepOutcome::Done);
    assert_eq!(report.filter_wheel, StepOutcome::Done);
    assert!(matches!(report.mount, StepOutcome::Failed(_)));
    assert_eq!(sim.snapshot().focuser_position, 0);
    assert_eq!(sim.snapshot().wheel_slot, 1);
    assert!(sim.log_contains("Mount to home position: failed"));
}
