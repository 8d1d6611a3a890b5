#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg(feature = "simulator")]

use moosicbox_lame::{
    ConfigOption, Error, ErrorKind, Session, SessionState, engine::simulator::SimulatedEngine,
};
use pretty_assertions::assert_eq;

fn initialized(engine: SimulatedEngine) -> Session<SimulatedEngine> {
    let mut session = Session::with_engine(engine);
    session.configure(ConfigOption::NumSamples, 10_000).unwrap();
    session.initialize().unwrap();
    session
}

fn silence(frames: usize) -> Vec<i16> {
    vec![0; frames * 2]
}

#[test_log::test]
fn test_lock_rejection_is_initialization_error() {
    let mut session = Session::with_engine(SimulatedEngine::new().with_lock_failure());
    session.configure(ConfigOption::Bitrate, 320).unwrap();

    let err = session.initialize().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Initialization);
    assert_eq!(session.state(), SessionState::Configured);
}

#[test_log::test]
fn test_inconsistent_configuration_fails_lock() {
    let mut session = Session::with_engine(SimulatedEngine::new());
    session.configure(ConfigOption::VbrMinBitrate, 256).unwrap();
    session.configure(ConfigOption::VbrMaxBitrate, 64).unwrap();

    let err = session.initialize().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Initialization);
}

#[test_log::test]
fn test_encode_status_codes_are_translated() {
    let cases = [
        (-1, ErrorKind::Internal),
        (-2, ErrorKind::OutOfMemory),
        (-3, ErrorKind::InvalidState),
        (-4, ErrorKind::Psychoacoustic),
        (-99, ErrorKind::UnknownCodec),
    ];

    for (status, kind) in cases {
        let mut session = initialized(SimulatedEngine::new().with_encode_status(0, status));

        let err = session.encode(&silence(2000)).unwrap_err();

        assert_eq!(err.kind(), kind, "status {status}");
    }
}

#[test_log::test]
fn test_unknown_status_is_preserved() {
    let mut session = initialized(SimulatedEngine::new().with_encode_status(0, -1234));

    let err = session.encode(&silence(10)).unwrap_err();

    assert!(matches!(err, Error::UnknownCodec { status: -1234 }), "{err}");
}

#[test_log::test]
fn test_failed_encode_keeps_session_usable() {
    let mut session = initialized(SimulatedEngine::new().with_encode_status(1, -4));
    session.encode(&silence(3000)).unwrap();
    let frames = session.frame_count().unwrap();
    let capacity = session.capacity();

    let err = session.encode(&silence(3000)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Psychoacoustic);
    assert_eq!(session.frame_count().unwrap(), frames);
    assert_eq!(session.capacity(), capacity);
    assert_eq!(session.state(), SessionState::Encoding);

    session.encode(&silence(3000)).unwrap();
    assert!(session.frame_count().unwrap() > frames);
}

#[test_log::test]
fn test_failed_first_encode_stays_initialized() {
    let mut session = initialized(SimulatedEngine::new().with_encode_status(0, -2));

    session.encode(&silence(10)).unwrap_err();

    assert_eq!(session.state(), SessionState::Initialized);
}

#[test_log::test]
fn test_failed_flush_consumes_flush() {
    let mut session = initialized(SimulatedEngine::new().with_flush_status(-4));
    session.encode(&silence(5000)).unwrap();

    let first = session.flush().unwrap_err();
    let second = session.flush().unwrap_err();

    assert_eq!(first.kind(), ErrorKind::Psychoacoustic);
    assert_eq!(second.kind(), ErrorKind::InvalidState);
    assert_eq!(session.state(), SessionState::Flushed);
}

#[test_log::test]
fn test_statistics_after_failed_flush() {
    let mut session = initialized(SimulatedEngine::new().with_flush_status(-2));
    session.encode(&silence(5000)).unwrap();
    let frames = session.frame_count().unwrap();

    session.flush().unwrap_err();

    assert_eq!(session.frame_count().unwrap(), frames);
}

#[test_log::test]
fn test_error_messages_carry_detail() {
    let mut session = initialized(SimulatedEngine::new().with_encode_status(0, -2));

    let err = session.encode(&silence(10)).unwrap_err();

    assert_eq!(err.to_string(), "Out of memory: codec failed to allocate memory");
}
