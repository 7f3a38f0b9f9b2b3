//! Device removal, wait failures and disconnect callbacks

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{wait_for, Rig, REPORT_LEN};
use hidlink_session::{
    DisconnectReason, HotplugEvent, IoError, ReadError, ReadTimeout, SessionState,
};

#[test]
fn removal_wakes_blocked_reader() {
    let rig = Rig::new();
    let monitor = rig.manager.spawn_monitor().unwrap();
    rig.backend.attach_feed(monitor.feed());
    let device = rig.device("/virtual/pad");
    let session = Arc::new(rig.manager.open("/virtual/pad").unwrap());

    let reader = {
        let session = session.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; REPORT_LEN];
            session.read_timeout(&mut buf, ReadTimeout::Infinite)
        })
    };
    std::thread::sleep(Duration::from_millis(30));

    device.unplug();
    assert_eq!(reader.join().unwrap(), Err(ReadError::Disconnected));
    assert!(session.is_disconnected());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(session.disconnect_reason(), Some(DisconnectReason::Removed));
}

#[test]
fn removal_wakes_every_blocked_reader() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = Arc::new(rig.manager.open("/virtual/pad").unwrap());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            std::thread::spawn(move || {
                let mut buf = [0u8; REPORT_LEN];
                session.read_timeout(&mut buf, ReadTimeout::Infinite)
            })
        })
        .collect();
    std::thread::sleep(Duration::from_millis(30));

    device.unplug();
    for reader in readers {
        assert_eq!(reader.join().unwrap(), Err(ReadError::Disconnected));
    }
}

#[test]
fn removal_without_monitor_is_seen_by_notification_thread() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    device.unplug();
    let mut buf = [0u8; REPORT_LEN];
    assert_eq!(
        session.read_timeout(&mut buf, ReadTimeout::Millis(2000)),
        Err(ReadError::Disconnected)
    );
}

#[test]
fn disconnect_callback_fires_once() {
    let rig = Rig::new();
    let monitor = rig.manager.spawn_monitor().unwrap();
    rig.backend.attach_feed(monitor.feed());
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    session.register_disconnected_callback(move || {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    });

    device.unplug();
    monitor.feed().publish(HotplugEvent::removed("/virtual/pad"));

    assert!(wait_for(Duration::from_secs(2), || fired.load(Ordering::SeqCst) == 1));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn late_disconnect_callback_fires_immediately() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    device.unplug();
    assert!(wait_for(Duration::from_secs(2), || session.is_disconnected()));

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_clone = fired.clone();
    session.register_disconnected_callback(move || {
        fired_clone.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn reports_captured_before_removal_are_still_readable() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    device.push_input(&[1]);
    device.push_input(&[2]);
    assert!(wait_for(Duration::from_secs(2), || session.pending_reports() == 2));

    device.unplug();
    assert!(wait_for(Duration::from_secs(2), || session.is_disconnected()));

    let mut buf = [0u8; REPORT_LEN];
    assert_eq!(session.read_timeout(&mut buf, ReadTimeout::Infinite), Ok(1));
    assert_eq!(buf[0], 1);
    assert_eq!(session.read_timeout(&mut buf, ReadTimeout::Infinite), Ok(1));
    assert_eq!(buf[0], 2);
    assert_eq!(
        session.read_timeout(&mut buf, ReadTimeout::Infinite),
        Err(ReadError::Disconnected)
    );
}

#[test]
fn wait_failure_surfaces_as_os_wait_failed() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    device.fail_next_wait("run loop stopped");
    let mut buf = [0u8; REPORT_LEN];
    match session.read_timeout(&mut buf, ReadTimeout::Millis(2000)) {
        Err(ReadError::OsWaitFailed(msg)) => assert!(msg.contains("run loop stopped")),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(session.is_disconnected());
    assert!(matches!(
        session.disconnect_reason(),
        Some(DisconnectReason::WaitFailed(_))
    ));
}

#[test]
fn removal_of_other_device_is_ignored() {
    let rig = Rig::new();
    let monitor = rig.manager.spawn_monitor().unwrap();
    rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    monitor.feed().publish(HotplugEvent::removed("/virtual/other"));
    std::thread::sleep(Duration::from_millis(50));
    assert!(!session.is_disconnected());
    assert_eq!(session.state(), SessionState::Open);
}

#[test]
fn monitor_removal_disconnects_every_session_on_path() {
    let rig = Rig::new();
    let monitor = rig.manager.spawn_monitor().unwrap();
    rig.device("/virtual/pad");
    let first = rig.manager.open("/virtual/pad").unwrap();
    let second = rig.manager.open("/virtual/pad").unwrap();

    monitor.feed().publish(HotplugEvent::removed("/virtual/pad"));
    assert!(wait_for(Duration::from_secs(2), || {
        first.is_disconnected() && second.is_disconnected()
    }));
}

#[test]
fn io_after_disconnect_fails_and_close_still_works() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = rig.manager.open("/virtual/pad").unwrap();

    device.unplug();
    assert!(wait_for(Duration::from_secs(2), || session.is_disconnected()));
    assert!(matches!(
        session.write_report(&[0, 1]),
        Err(IoError::Disconnected)
    ));

    session.close();
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(device.open_handles(), 0);
}

#[test]
fn disconnect_callback_may_close_its_own_session() {
    let rig = Rig::new();
    let device = rig.device("/virtual/pad");
    let session = Arc::new(rig.manager.open("/virtual/pad").unwrap());

    let weak = Arc::downgrade(&session);
    session.register_disconnected_callback(move || {
        if let Some(session) = weak.upgrade() {
            session.close();
        }
    });

    device.unplug();
    assert!(wait_for(Duration::from_secs(2), || {
        session.state() == SessionState::Closed
    }));
    assert_eq!(device.open_handles(), 0);
}
