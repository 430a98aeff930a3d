//! Integration tests for the register-protocol amplifier driver, run
//! against the scripted mock transport.

use std::time::Duration;

use ols_hal::{
    AbstractParameter, ConnectionCredentials, DeviceClass, DeviceIdentity, Direction, Driver,
    DriverOptions, HalError, LineDevice, LoginStyle, MockTransport, OmiAmplifier, OmiVariety,
    OperatingMode, OperationalTarget, ParamValue, Protocol, Session, Settings, Variety, Vendor,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    // The settle interval is a real-firmware constraint; keep tests fast.
    settings.omi.settle_interval = Duration::from_millis(1);
    settings.omi.inter_write_delay = Duration::from_millis(1);
    settings
}

fn identity(variety: Variety) -> DeviceIdentity {
    DeviceIdentity::new("edfa-a-1", Vendor::OmiClass, DeviceClass::Amplifier, variety)
}

fn credentials() -> ConnectionCredentials {
    ConnectionCredentials::new("10.0.0.5", 2001, "shelfadmin", "lineside1", Protocol::Omi)
}

/// Amplifier over a mock transport, logged in, with a handle for scripting.
async fn amplifier(variety: OmiVariety, direction: Direction) -> (OmiAmplifier, MockTransport) {
    init_logging();
    let transport = MockTransport::new();
    let handle = transport.clone();

    let session = Session::new(
        Box::new(transport),
        credentials(),
        LoginStyle::RawCarriageReturn,
    )
    .with_prompt_timeout(Duration::from_millis(50));

    let device_variety = match variety {
        OmiVariety::Edfa17 => Variety::Edfa17,
        OmiVariety::Edfa35 => Variety::Edfa35,
    };
    let mut amp = OmiAmplifier::with_session(
        identity(device_variety),
        session,
        variety,
        DriverOptions {
            direction,
            ..DriverOptions::default()
        },
        &test_settings(),
    );
    amp.login().await.unwrap();
    (amp, handle)
}

fn value_response(fields_echo: &str, value: i64) -> Vec<u8> {
    format!("{fields_echo}\n\rI32-Value is:{value}\n\rCompleted\n\r->").into_bytes()
}

const WRITE_ACK: &[u8] = b"\n\rCompleted\n\r->";

/// Login sends exactly the username and password, CR-terminated.
const LOGIN_FRAMES: usize = 2;

#[tokio::test]
async fn test_gain_uses_fixed_point_scaling() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa17, Direction::Side1).await;
    handle
        .push_response(value_response("omi_read(30, 1, 0)", 275))
        .await;

    let gain = amp.gain().await.unwrap();
    assert_eq!(gain, 27.5);

    let frames = handle.sent_frames().await;
    assert_eq!(frames[LOGIN_FRAMES], "omi_read(30, 1, 0)\r");
}

#[tokio::test]
async fn test_two_stage_card_addresses_gain_per_direction() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa35, Direction::Side2).await;
    handle
        .push_response(value_response("omi_read(27, 2, 0)", 182))
        .await;

    let gain = amp.gain().await.unwrap();
    assert_eq!(gain, 18.2);
    assert_eq!(
        handle.sent_frames().await[LOGIN_FRAMES],
        "omi_read(27, 2, 0)\r"
    );
}

#[tokio::test]
async fn test_tilt_round_trip_flips_sign_on_both_paths() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa35, Direction::Side1).await;

    // Caller sets +1.5 dB; the wire stores the negated tenths.
    handle.push_response(WRITE_ACK.to_vec()).await;
    amp.set_tilt(1.5).await.unwrap();
    assert_eq!(
        handle.sent_frames().await[LOGIN_FRAMES],
        "omi_write(28,1,1,1,-15)\r"
    );

    // The device reports the stored (negated) value; the caller reads back
    // what it set, within fixed-point tolerance.
    handle
        .push_response(value_response("omi_read(28, 1, 0)", -15))
        .await;
    let tilt = amp.tilt().await.unwrap();
    assert!((tilt - 1.5).abs() <= 0.1);
}

#[tokio::test]
async fn test_stale_bytes_are_drained_before_the_exchange() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa17, Direction::Side1).await;

    // A previous exchange left unread bytes buffered on the socket.
    handle.prebuffer(b"garbage".to_vec()).await;
    handle
        .push_response(value_response("omi_read(41, 1, 0)", -32))
        .await;

    let input_power = amp.input_power().await.unwrap();
    assert_eq!(input_power, -3.2);
}

#[tokio::test]
async fn test_insertion_loss_offsets_output_power() {
    init_logging();
    let transport = MockTransport::new();
    let handle = transport.clone();
    let session = Session::new(
        Box::new(transport),
        credentials(),
        LoginStyle::RawCarriageReturn,
    );
    let mut amp = OmiAmplifier::with_session(
        identity(Variety::Edfa17),
        session,
        OmiVariety::Edfa17,
        DriverOptions {
            insertion_loss_db: Some(0.8),
            ..DriverOptions::default()
        },
        &test_settings(),
    );
    amp.login().await.unwrap();

    handle
        .push_response(value_response("omi_read(42, 1, 0)", 143))
        .await;
    let output = amp.output_power().await.unwrap();
    assert!((output - 13.5).abs() < 1e-9);

    // On the set path the offset is added before scaling.
    handle.push_response(WRITE_ACK.to_vec()).await;
    amp.set_output_power(3.0).await.unwrap();
    assert_eq!(
        handle.sent_frames().await.last().unwrap().as_str(),
        "omi_write(42,2,1,1,38)\r"
    );
}

#[tokio::test]
async fn test_mode_read_is_closed_over_known_codes() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa17, Direction::Side1).await;

    handle
        .push_response(value_response("omi_read(21, 1, 1, 1, 0)", 2))
        .await;
    assert_eq!(amp.mode().await.unwrap(), OperatingMode::ConstantGain);

    handle
        .push_response(value_response("omi_read(21, 1, 1, 1, 0)", 7))
        .await;
    assert!(matches!(
        amp.mode().await,
        Err(HalError::UnrecognizedMode(_))
    ));
}

#[tokio::test]
async fn test_parse_error_is_surfaced_not_defaulted() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa17, Direction::Side1).await;
    handle
        .push_response(b"ERR: register unavailable\n\r->".to_vec())
        .await;

    assert!(matches!(amp.gain().await, Err(HalError::Parse(_))));
}

#[tokio::test]
async fn test_unsupported_parameter_is_an_error() {
    let (mut amp, _handle) = amplifier(OmiVariety::Edfa17, Direction::Side1).await;

    let result = amp
        .set(&[(AbstractParameter::OutputEnabled, ParamValue::Bool(true))])
        .await;
    assert!(matches!(
        result,
        Err(HalError::UnsupportedOperation { .. })
    ));

    let result = amp.get(&[AbstractParameter::GainRange]).await;
    assert!(matches!(
        result,
        Err(HalError::UnsupportedOperation { .. })
    ));
}

#[tokio::test]
async fn test_conflicting_targets_perform_zero_writes() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa35, Direction::Side1).await;

    let both = OperationalTarget {
        pout_target: Some(5.0),
        gain_target: Some(10.0),
        tilt_target: 0.0,
    };
    assert!(matches!(
        amp.configure_operational(&both).await,
        Err(HalError::ConflictingTargets(_))
    ));
    assert_eq!(handle.sent_count().await, LOGIN_FRAMES);

    let neither = OperationalTarget {
        pout_target: None,
        gain_target: None,
        tilt_target: 0.0,
    };
    assert!(matches!(
        amp.configure_operational(&neither).await,
        Err(HalError::InvalidParameter(_))
    ));
    assert_eq!(handle.sent_count().await, LOGIN_FRAMES);
}

#[tokio::test]
async fn test_configure_operational_orders_mode_before_setpoints() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa35, Direction::Side1).await;

    // One scripted response per exchange: mode write ack, mode read-back,
    // output power ack, tilt ack.
    handle.push_response(WRITE_ACK.to_vec()).await;
    handle
        .push_response(value_response("omi_read(21, 1, 1, 1, 0)", 1))
        .await;
    handle.push_response(WRITE_ACK.to_vec()).await;
    handle.push_response(WRITE_ACK.to_vec()).await;

    let target = OperationalTarget::constant_power(3.0, 0.5);
    amp.configure_operational(&target).await.unwrap();

    let frames = handle.sent_frames().await;
    assert_eq!(
        &frames[LOGIN_FRAMES..],
        &[
            "omi_write(21,1,1,1,1)\r".to_string(),
            "omi_read(21, 1, 1, 1, 0)\r".to_string(),
            "omi_write(42,2,1,1,30)\r".to_string(),
            "omi_write(28,1,1,1,-5)\r".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_configure_operational_requires_mode_confirmation() {
    let (mut amp, handle) = amplifier(OmiVariety::Edfa35, Direction::Side1).await;

    // The firmware keeps constant_current despite the requested transition.
    handle.push_response(WRITE_ACK.to_vec()).await;
    handle
        .push_response(value_response("omi_read(21, 1, 1, 1, 0)", 0))
        .await;

    let target = OperationalTarget::constant_gain(17.0, 0.0);
    assert!(matches!(
        amp.configure_operational(&target).await,
        Err(HalError::ModeNotConfirmed { .. })
    ));

    // No setpoint was written after the failed confirmation.
    let frames = handle.sent_frames().await;
    assert_eq!(frames.len(), LOGIN_FRAMES + 2);
}

#[tokio::test]
async fn test_driver_enum_resolves_and_reports_tl1() {
    init_logging();
    let settings = Settings::default();

    let driver = Driver::for_device(
        identity(Variety::Edfa17),
        credentials(),
        DriverOptions::default(),
        &settings,
    )
    .unwrap();
    assert_eq!(driver.identity().uid, "edfa-a-1");

    let tl1 = ConnectionCredentials::new("10.0.0.5", 2001, "user", "pw", Protocol::Tl1);
    assert!(matches!(
        Driver::for_device(
            identity(Variety::Edfa17),
            tl1,
            DriverOptions::default(),
            &settings
        ),
        Err(HalError::UnsupportedOperation { .. })
    ));
}
