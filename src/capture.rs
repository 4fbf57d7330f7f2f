//! Capture one frame and persist it to the card.

use crate::camera::{CameraDriver, Frame};
use crate::config::{CaptureConfig, PixelFormat};
use crate::indicator::StatusIndicator;
use crate::storage::Storage;
use core::fmt::{self, Write};
use embedded_hal::digital::v2::OutputPin;
use heapless::{consts, String};

/// Full path of an image file, e.g. `/sdcard/image_000.jpg`.
pub type ImagePath = String<consts::U64>;

/// Where a capture is. Only ever moves forward, then back to `Idle`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureState {
    Idle,
    /// LED on, no frame yet.
    Indicating,
    /// Waiting on the camera driver.
    Capturing,
    /// Frame held, file open.
    Writing,
}

/// A frame that made it to the card.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavedImage {
    pub path: ImagePath,
    pub len: usize,
    pub index: u16,
    pub width: u16,
    pub height: u16,
    pub format: PixelFormat,
}

/// Capture errors. `E` is the storage backend's error.
#[derive(Debug, Eq, PartialEq)]
pub enum CaptureError<E> {
    /// The driver had no frame.
    NoFrame,
    /// The driver handed out a frame with no payload.
    EmptyFrame,
    /// The file name doesn't fit in an `ImagePath`.
    Path,
    Open(E),
    Write(E),
    /// The backend accepted fewer bytes than the frame holds.
    ShortWrite { written: usize, expected: usize },
    Close(E),
}

/// Build `<base>/<prefix><index>.<extension>` with the index zero padded.
pub fn image_path(
    base: &str,
    config: &CaptureConfig,
    index: u16,
) -> Result<ImagePath, fmt::Error> {
    let mut path = ImagePath::new();
    write!(
        path,
        "{}/{}{:0width$}.{}",
        base,
        config.file_prefix,
        index,
        config.file_extension,
        width = config.index_width
    )?;
    Ok(path)
}

/// Owns the image index and runs the capture sequence.
pub struct CaptureTask {
    config: CaptureConfig,
    base_path: &'static str,
    index: u16,
    state: CaptureState,
}

impl CaptureTask {
    pub fn new(config: CaptureConfig, base_path: &'static str) -> Self {
        CaptureTask {
            index: config.first_index,
            config,
            base_path,
            state: CaptureState::Idle,
        }
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Path the next capture will write to.
    pub fn next_path(&self) -> Result<ImagePath, fmt::Error> {
        image_path(self.base_path, &self.config, self.index)
    }

    /// Light the LED, grab a frame, write it to the next image path and turn the LED off.
    ///
    /// The frame goes back to the driver exactly once on every path that acquired one. On
    /// failure the LED stays lit unless `restore_indicator_on_failure` is set.
    pub fn capture_and_save<C, S, P>(
        &mut self,
        camera: &mut C,
        storage: &mut S,
        indicator: &mut StatusIndicator<P>,
    ) -> Result<SavedImage, CaptureError<S::Error>>
    where
        C: CameraDriver,
        S: Storage,
        P: OutputPin,
        P::Error: fmt::Debug,
    {
        let result = self.run(camera, storage, indicator);
        self.state = CaptureState::Idle;

        match result {
            Ok(saved) => {
                self.indicate(indicator, false);
                if self.config.advance_index {
                    if self.index < self.config.max_index() {
                        self.index += 1;
                    } else {
                        log_warn!(
                            "Capture",
                            "Image index at its limit, the next capture rewrites {}",
                            saved.path
                        );
                    }
                }
                log_info!(
                    "Capture",
                    "Image saved to {} ({}x{} {:?}, {} bytes)",
                    saved.path,
                    saved.width,
                    saved.height,
                    saved.format,
                    saved.len
                );
                log_info!("Capture", "Full Capture Successful");
                Ok(saved)
            }
            Err(e) => {
                if self.config.restore_indicator_on_failure {
                    self.indicate(indicator, false);
                }
                Err(e)
            }
        }
    }

    fn run<C, S, P>(
        &mut self,
        camera: &mut C,
        storage: &mut S,
        indicator: &mut StatusIndicator<P>,
    ) -> Result<SavedImage, CaptureError<S::Error>>
    where
        C: CameraDriver,
        S: Storage,
        P: OutputPin,
        P::Error: fmt::Debug,
    {
        self.state = CaptureState::Indicating;
        self.indicate(indicator, true);

        self.state = CaptureState::Capturing;
        let frame = match camera.fb_get() {
            Some(frame) => frame,
            None => {
                log_error!("Capture", "Camera capture failed");
                return Err(CaptureError::NoFrame);
            }
        };
        if frame.is_empty() {
            log_error!("Capture", "Camera returned an empty frame");
            camera.fb_return(frame);
            return Err(CaptureError::EmptyFrame);
        }

        let path = match self.next_path() {
            Ok(path) => path,
            Err(_) => {
                log_error!("Capture", "Image path too long");
                camera.fb_return(frame);
                return Err(CaptureError::Path);
            }
        };

        let mut file = match storage.open_write(&path) {
            Ok(file) => file,
            Err(e) => {
                log_error!("Capture", "Failed to open file {} for writing ({:?})", path, e);
                camera.fb_return(frame);
                return Err(CaptureError::Open(e));
            }
        };

        self.state = CaptureState::Writing;
        let expected = frame.len();
        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        let written = storage.write(&mut file, frame.data());
        let closed = storage.close(file);
        camera.fb_return(frame);

        match written {
            Ok(n) if n == expected => {}
            Ok(n) => {
                log_error!("Capture", "Short write to {} ({} of {} bytes)", path, n, expected);
                return Err(CaptureError::ShortWrite {
                    written: n,
                    expected,
                });
            }
            Err(e) => {
                log_error!("Capture", "Failed to write {} ({:?})", path, e);
                return Err(CaptureError::Write(e));
            }
        }
        if let Err(e) = closed {
            log_error!("Capture", "Failed to close {} ({:?})", path, e);
            return Err(CaptureError::Close(e));
        }

        Ok(SavedImage {
            path,
            len: expected,
            index: self.index,
            width,
            height,
            format,
        })
    }

    /// LED failures are logged and otherwise ignored, the capture goes on without it.
    fn indicate<P>(&self, indicator: &mut StatusIndicator<P>, on: bool)
    where
        P: OutputPin,
        P::Error: fmt::Debug,
    {
        if let Err(e) = indicator.set_active(on) {
            log_warn!("Capture", "Failed to drive status LED ({:?})", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CAPTURE, INDICATOR, MOUNT};
    use crate::storage::StorageError;
    use crate::tests::fakes::{FakeCamera, FakePin, FakeStorage};

    const JPEG: &[u8] = b"\xff\xd8\x00\x11\x22\xff\xd9";

    fn setup() -> (CaptureTask, FakeStorage, StatusIndicator<FakePin>) {
        let mut storage = FakeStorage::default();
        storage.mounted = true;
        let mut led = StatusIndicator::new(FakePin::default(), &INDICATOR);
        led.reset().unwrap();
        (CaptureTask::new(CAPTURE, MOUNT.base_path), storage, led)
    }

    #[test]
    fn default_path() {
        assert_eq!(
            image_path("/sdcard", &CAPTURE, 0).unwrap().as_str(),
            "/sdcard/image_000.jpg"
        );
        assert_eq!(
            image_path("/sdcard", &CAPTURE, 42).unwrap().as_str(),
            "/sdcard/image_042.jpg"
        );
    }

    #[test]
    fn oversize_path_is_an_error() {
        let config = CaptureConfig {
            file_prefix: "a_very_long_prefix_that_keeps_going_and_going_and_going_",
            ..CAPTURE
        };
        assert!(image_path("/sdcard", &config, 0).is_err());
    }

    #[test]
    fn successful_capture() {
        let (mut task, mut storage, mut led) = setup();
        let mut camera = FakeCamera::with_frames(&[JPEG]);

        let saved = task
            .capture_and_save(&mut camera, &mut storage, &mut led)
            .unwrap();

        assert_eq!(saved.path.as_str(), "/sdcard/image_000.jpg");
        assert_eq!(saved.len, JPEG.len());
        assert_eq!((saved.width, saved.height), (800, 600));
        assert_eq!(saved.format, PixelFormat::Jpeg);
        assert_eq!(storage.files.len(), 1);
        assert_eq!(storage.files["/sdcard/image_000.jpg"], JPEG);
        assert_eq!(storage.open_files, 0);
        assert_eq!(camera.acquired, 1);
        assert_eq!(camera.released, 1);
        assert!(!led.is_active());
        assert_eq!(task.state(), CaptureState::Idle);
    }

    #[test]
    fn no_frame_leaves_led_on() {
        let (mut task, mut storage, mut led) = setup();
        let mut camera = FakeCamera::empty();

        assert_eq!(
            task.capture_and_save(&mut camera, &mut storage, &mut led),
            Err(CaptureError::NoFrame)
        );
        assert!(storage.files.is_empty());
        assert_eq!(camera.released, 0);
        assert!(led.is_active());
    }

    #[test]
    fn led_restored_on_failure_when_configured() {
        let mut storage = FakeStorage::default();
        let mut led = StatusIndicator::new(FakePin::default(), &INDICATOR);
        let config = CaptureConfig {
            restore_indicator_on_failure: true,
            ..CAPTURE
        };
        let mut task = CaptureTask::new(config, MOUNT.base_path);
        let mut camera = FakeCamera::empty();

        assert!(task
            .capture_and_save(&mut camera, &mut storage, &mut led)
            .is_err());
        assert!(!led.is_active());
    }

    #[test]
    fn empty_frame_is_released() {
        let (mut task, mut storage, mut led) = setup();
        let mut camera = FakeCamera::with_frames(&[b""]);

        assert_eq!(
            task.capture_and_save(&mut camera, &mut storage, &mut led),
            Err(CaptureError::EmptyFrame)
        );
        assert_eq!(camera.released, 1);
        assert!(storage.files.is_empty());
    }

    #[test]
    fn open_failure_releases_frame_once() {
        let (mut task, mut storage, mut led) = setup();
        storage.mounted = false;
        let mut camera = FakeCamera::with_frames(&[JPEG]);

        assert_eq!(
            task.capture_and_save(&mut camera, &mut storage, &mut led),
            Err(CaptureError::Open(StorageError::NotMounted))
        );
        assert_eq!(camera.acquired, 1);
        assert_eq!(camera.released, 1);
        assert!(storage.files.is_empty());
        assert!(led.is_active());
    }

    #[test]
    fn short_write_still_closes_and_releases() {
        let (mut task, mut storage, mut led) = setup();
        storage.write_limit = Some(3);
        let mut camera = FakeCamera::with_frames(&[JPEG]);

        assert_eq!(
            task.capture_and_save(&mut camera, &mut storage, &mut led),
            Err(CaptureError::ShortWrite {
                written: 3,
                expected: JPEG.len()
            })
        );
        assert_eq!(storage.open_files, 0);
        assert_eq!(camera.released, 1);
    }

    #[test]
    fn write_error_is_reported() {
        let (mut task, mut storage, mut led) = setup();
        storage.fail_write = true;
        let mut camera = FakeCamera::with_frames(&[JPEG]);

        assert_eq!(
            task.capture_and_save(&mut camera, &mut storage, &mut led),
            Err(CaptureError::Write(StorageError::Device(())))
        );
        assert_eq!(storage.open_files, 0);
        assert_eq!(camera.released, 1);
    }

    #[test]
    fn two_captures_overwrite_same_file() {
        let (mut task, mut storage, mut led) = setup();
        let first: &[u8] = b"\xff\xd8first\xff\xd9";
        let second: &[u8] = b"\xff\xd8second\xff\xd9";
        let mut camera = FakeCamera::with_frames(&[first, second]);

        task.capture_and_save(&mut camera, &mut storage, &mut led)
            .unwrap();
        task.capture_and_save(&mut camera, &mut storage, &mut led)
            .unwrap();

        assert_eq!(storage.files.len(), 1);
        assert_eq!(storage.files["/sdcard/image_000.jpg"], second);
        assert_eq!(task.index(), 0);
    }

    #[test]
    fn advancing_index_writes_new_files() {
        let mut storage = FakeStorage::default();
        storage.mounted = true;
        let mut led = StatusIndicator::new(FakePin::default(), &INDICATOR);
        let config = CaptureConfig {
            advance_index: true,
            ..CAPTURE
        };
        let mut task = CaptureTask::new(config, MOUNT.base_path);
        let mut camera = FakeCamera::with_frames(&[JPEG, JPEG]);

        task.capture_and_save(&mut camera, &mut storage, &mut led)
            .unwrap();
        let second = task
            .capture_and_save(&mut camera, &mut storage, &mut led)
            .unwrap();

        assert_eq!(second.path.as_str(), "/sdcard/image_001.jpg");
        assert_eq!(storage.files.len(), 2);
        assert_eq!(task.index(), 2);
    }

    #[test]
    fn index_stops_at_widest_name() {
        let mut storage = FakeStorage::default();
        storage.mounted = true;
        let mut led = StatusIndicator::new(FakePin::default(), &INDICATOR);
        let config = CaptureConfig {
            first_index: 998,
            advance_index: true,
            ..CAPTURE
        };
        assert_eq!(config.max_index(), 999);
        let mut task = CaptureTask::new(config, MOUNT.base_path);
        let mut camera = FakeCamera::with_frames(&[JPEG, JPEG, JPEG]);

        for _ in 0..3 {
            task.capture_and_save(&mut camera, &mut storage, &mut led)
                .unwrap();
        }

        assert_eq!(task.index(), 999);
        assert_eq!(task.next_path().unwrap().as_str(), "/sdcard/image_999.jpg");
        let names: Vec<&str> = storage.files.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["/sdcard/image_998.jpg", "/sdcard/image_999.jpg"]);
    }

    #[test]
    fn broken_led_does_not_stop_capture() {
        let mut storage = FakeStorage::default();
        storage.mounted = true;
        let mut pin = FakePin::default();
        pin.fail = true;
        let mut led = StatusIndicator::new(pin, &INDICATOR);
        let mut task = CaptureTask::new(CAPTURE, MOUNT.base_path);
        let mut camera = FakeCamera::with_frames(&[JPEG]);

        assert!(task
            .capture_and_save(&mut camera, &mut storage, &mut led)
            .is_ok());
        assert_eq!(storage.files.len(), 1);
    }
}
