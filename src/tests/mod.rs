//! Whole boot-and-capture runs against fake hardware.

pub mod fakes;

use crate::app::{Firmware, Settings};
use crate::button::ButtonWatcher;
use crate::capture::CaptureError;
use crate::config::BUTTON;
use crate::storage::host::HostStorage;
use crate::storage::StorageError;
use fakes::{FakeCamera, FakeDelay, FakePin, FakeStorage};

const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x02\x03\xff\xd9";

#[test]
fn boot_writes_one_image() {
    let dir = tempfile::tempdir().unwrap();
    let camera = FakeCamera::with_frames(&[JPEG, JPEG]);
    let mut fw = Firmware::new(
        camera,
        HostStorage::new(dir.path()),
        FakePin::default(),
        Settings::DEFAULT,
    );
    let mut delay = FakeDelay::default();

    let (report, saved) = fw.run_once(&mut delay);

    assert!(report.camera_ready);
    assert!(report.storage_mounted);
    assert!(report.indicator_ready);
    assert_eq!(report.tuning_applied, 5);
    assert_eq!(report.tuning_failed, 0);
    assert_eq!(delay.total_ms, 1000);

    let saved = saved.unwrap();
    assert_eq!(saved.path.as_str(), "/sdcard/image_000.jpg");

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let written = std::fs::read(dir.path().join("image_000.jpg")).unwrap();
    assert_eq!(written.len(), saved.len);
    assert_eq!(written, JPEG);
    assert_eq!(&written[..2], &[0xFF, 0xD8]);
    assert_eq!(&written[written.len() - 2..], &[0xFF, 0xD9]);

    // Probe frame plus the capture, each handed back once
    assert_eq!(fw.camera.acquired, 2);
    assert_eq!(fw.camera.released, 2);
    assert!(!fw.indicator.is_active());
}

#[test]
fn missing_card_does_not_halt_boot() {
    let dir = tempfile::tempdir().unwrap();
    let camera = FakeCamera::with_frames(&[JPEG, JPEG]);
    let mut fw = Firmware::new(
        camera,
        HostStorage::new(dir.path().join("no-card")),
        FakePin::default(),
        Settings::DEFAULT,
    );

    let (report, saved) = fw.run_once(&mut FakeDelay::default());

    assert!(!report.storage_mounted);
    // Tuning and the LED still come up
    assert_eq!(report.tuning_applied, 5);
    assert!(report.indicator_ready);
    assert_eq!(saved, Err(CaptureError::Open(StorageError::NotMounted)));
    assert_eq!(fw.camera.released, fw.camera.acquired);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn camera_init_failure_skips_tuning_but_still_tries() {
    let mut camera = FakeCamera::empty();
    camera.fail_init = true;
    let mut fw = Firmware::new(
        camera,
        FakeStorage::default(),
        FakePin::default(),
        Settings::DEFAULT,
    );

    let (report, saved) = fw.run_once(&mut FakeDelay::default());

    assert!(!report.camera_ready);
    assert!(report.storage_mounted);
    assert_eq!(report.tuning_applied, 0);
    assert_eq!(saved, Err(CaptureError::NoFrame));
    assert!(fw.storage.files.is_empty());
    assert_eq!(fw.camera.released, 0);
}

#[test]
fn settle_delay_comes_from_settings() {
    let settings = Settings {
        settle_delay_ms: 250,
        ..Settings::DEFAULT
    };
    let mut fw = Firmware::new(
        FakeCamera::with_frames(&[JPEG, JPEG]),
        FakeStorage::default(),
        FakePin::default(),
        settings,
    );
    let mut delay = FakeDelay::default();
    let (_, saved) = fw.run_once(&mut delay);
    assert!(saved.is_ok());
    assert_eq!(delay.total_ms, 250);
}

#[test]
fn button_release_triggers_capture() {
    let mut fw = Firmware::new(
        FakeCamera::with_frames(&[JPEG, JPEG]),
        FakeStorage::default(),
        FakePin::default(),
        Settings::DEFAULT,
    );
    fw.init();
    let mut button = ButtonWatcher::new(FakePin::default(), &BUTTON);
    let mut delay = FakeDelay::default();

    assert!(fw.button_step(&mut button, &mut delay).is_none());
    button.pin_mut().level = true;
    assert!(fw.button_step(&mut button, &mut delay).is_none());
    button.pin_mut().level = false;
    let saved = fw.button_step(&mut button, &mut delay).unwrap().unwrap();

    assert_eq!(saved.path.as_str(), "/sdcard/image_000.jpg");
    assert_eq!(fw.storage.files.len(), 1);
    assert_eq!(delay.total_ms, 30);
}
