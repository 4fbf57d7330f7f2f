//! Camera driver contract and bring-up.
//!
//! A driver owns its frame buffers. `fb_get` lends one out as a `Frame` and `fb_return`
//! takes it back by value, so a frame can only be released once.

use crate::config::{CameraConfig, PixelFormat, JPEG_QUALITY_MAX};
use crate::sensor::Sensor;
use core::fmt;

/// A captured image held by the program until it is handed back to the driver.
pub trait Frame {
    /// Encoded image bytes.
    fn data(&self) -> &[u8];

    fn width(&self) -> u16;

    fn height(&self) -> u16;

    fn format(&self) -> PixelFormat;

    /// Payload length in bytes.
    fn len(&self) -> usize {
        self.data().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Any camera that implements this trait can be driven by the capture routine.
pub trait CameraDriver {
    type Error: fmt::Debug;
    type Frame: Frame;
    type Sensor: Sensor;

    /// Bring up the sensor and the pixel bus with `config`.
    fn init(&mut self, config: &CameraConfig) -> Result<(), Self::Error>;

    /// Acquire a frame, `None` if the driver could not produce one.
    fn fb_get(&mut self) -> Option<Self::Frame>;

    /// Hand a frame back so its buffer can be filled again.
    fn fb_return(&mut self, frame: Self::Frame);

    /// The sensor control handle, `None` before a successful init.
    fn sensor(&mut self) -> Option<&mut Self::Sensor>;
}

/// Camera bring-up errors.
#[derive(Debug, Eq, PartialEq)]
pub enum CameraError<E> {
    /// Configuration record rejected before reaching the driver.
    InvalidConfig(&'static str),
    /// Driver init call failed.
    Init(E),
    /// Init passed but the first frame never arrived or was empty.
    Probe,
}

/// Check a configuration record before handing it to a driver.
pub fn validate(config: &CameraConfig) -> Result<(), &'static str> {
    if config.jpeg_quality > JPEG_QUALITY_MAX {
        return Err("jpeg_quality must be 0..=63");
    }
    if config.fb_count == 0 {
        return Err("fb_count must be at least 1");
    }
    if config.xclk_freq_hz == 0 {
        return Err("xclk_freq_hz must be non-zero");
    }
    Ok(())
}

/// Initialize the camera and grab one frame to see that it is alive. The probe runs even
/// when the driver reports an init error, and the frame goes straight back to the driver.
/// Both failures are logged here. An init error takes precedence over a failed probe.
pub fn init_camera<C: CameraDriver>(
    camera: &mut C,
    config: &CameraConfig,
) -> Result<(), CameraError<C::Error>> {
    if let Err(reason) = validate(config) {
        log_error!("Camera", "Invalid camera configuration ({})", reason);
        return Err(CameraError::InvalidConfig(reason));
    }

    let init = camera.init(config);
    if let Err(e) = &init {
        log_error!("Camera", "Camera init failed with error {:?}", e);
    }

    let alive = match camera.fb_get() {
        Some(frame) => {
            let empty = frame.is_empty();
            camera.fb_return(frame);
            !empty
        }
        None => false,
    };
    if !alive {
        log_error!("Camera", "Camera capture failed");
    }

    init.map_err(CameraError::Init)?;
    if alive {
        Ok(())
    } else {
        Err(CameraError::Probe)
    }
}

/// Length of the JPEG stream at the start of `data`: everything up to and including the
/// last EOI marker. `None` if the data doesn't start with SOI or never ends.
pub fn jpeg_len(data: &[u8]) -> Option<usize> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    data.windows(2)
        .rposition(|w| w == [0xFF, 0xD9])
        .map(|pos| pos + 2)
}
