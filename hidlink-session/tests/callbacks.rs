//! Callback-mode delivery

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_for, Rig, REPORT_LEN};
use hidlink_session::{ReadError, ReadTimeout};
use parking_lot::Mutex;

#[test]
fn callback_receives_reports_and_bypasses_queue() {
    let rig = Rig::new();
    let device = rig.device("/virtual/mouse");
    let session = rig.manager.open("/virtual/mouse").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    session.register_read_callback(move |data| seen_clone.lock().push(data.to_vec()));

    device.push_input(&[1, 10]);
    device.push_input(&[2, 20]);
    assert!(wait_for(Duration::from_secs(2), || seen.lock().len() == 2));

    assert_eq!(*seen.lock(), vec![vec![1, 10], vec![2, 20]]);
    assert_eq!(session.pending_reports(), 0);

    let mut buf = [0u8; REPORT_LEN];
    assert_eq!(
        session.read_timeout(&mut buf, ReadTimeout::NonBlocking),
        Err(ReadError::CallbackModeActive)
    );
}

#[test]
fn unregistering_returns_to_queued_delivery() {
    let rig = Rig::new();
    let device = rig.device("/virtual/mouse");
    let session = rig.manager.open("/virtual/mouse").unwrap();

    session.register_read_callback(|_| {});
    session.unregister_read_callback();

    device.push_input(&[7]);
    let mut buf = [0u8; REPORT_LEN];
    assert_eq!(
        session.read_timeout(&mut buf, ReadTimeout::Millis(1000)),
        Ok(1)
    );
    assert_eq!(buf[0], 7);
}

#[test]
fn queued_reports_survive_callback_mode() {
    let rig = Rig::new();
    let device = rig.device("/virtual/mouse");
    let session = rig.manager.open("/virtual/mouse").unwrap();

    device.push_input(&[1]);
    device.push_input(&[2]);
    assert!(wait_for(Duration::from_secs(2), || session.pending_reports() == 2));

    let calls = Arc::new(Mutex::new(0usize));
    let calls_clone = calls.clone();
    session.register_read_callback(move |_| *calls_clone.lock() += 1);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*calls.lock(), 0);
    assert_eq!(session.pending_reports(), 2);

    let mut buf = [0u8; REPORT_LEN];
    assert_eq!(
        session.read_timeout(&mut buf, ReadTimeout::NonBlocking),
        Err(ReadError::CallbackModeActive)
    );

    session.unregister_read_callback();
    assert_eq!(session.read(&mut buf), Ok(1));
    assert_eq!(buf[0], 1);
    assert_eq!(session.read(&mut buf), Ok(1));
    assert_eq!(buf[0], 2);
}

#[test]
fn registering_callback_releases_blocked_reader() {
    let rig = Rig::new();
    rig.device("/virtual/mouse");
    let session = Arc::new(rig.manager.open("/virtual/mouse").unwrap());

    let reader = {
        let session = session.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; REPORT_LEN];
            session.read_timeout(&mut buf, ReadTimeout::Infinite)
        })
    };
    std::thread::sleep(Duration::from_millis(30));

    session.register_read_callback(|_| {});
    assert_eq!(reader.join().unwrap(), Err(ReadError::CallbackModeActive));
}

#[test]
fn callback_can_write_back_to_session() {
    let rig = Rig::new();
    let device = rig.device("/virtual/mouse");
    let session = Arc::new(rig.manager.open("/virtual/mouse").unwrap());

    let weak = Arc::downgrade(&session);
    session.register_read_callback(move |data| {
        if let Some(session) = weak.upgrade() {
            let _ = session.write_report(data);
        }
    });

    device.push_input(&[0, 0x55]);
    assert!(wait_for(Duration::from_secs(2), || device.written().len() == 1));
    assert_eq!(device.written(), vec![vec![0, 0x55]]);
}
