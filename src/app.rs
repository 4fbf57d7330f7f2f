//! Boot sequence: camera, card, sensor tuning and LED, a settle delay, then one capture.
//!
//! Every step logs its own failure and the sequence carries on, so a broken camera or a
//! missing card shows up as log lines and a missing file, never as a halt.

use crate::button::ButtonWatcher;
use crate::camera::{init_camera, CameraDriver};
use crate::capture::{CaptureError, CaptureTask, SavedImage};
use crate::config::{
    CameraConfig, CaptureConfig, IndicatorConfig, MountConfig, SdHostConfig, SdSlotConfig,
    SensorSettings, BUTTON_POLL_MS, CAMERA, CAPTURE, INDICATOR, MOUNT, SD_HOST, SD_SLOT, SENSOR,
    SETTLE_DELAY_MS,
};
use crate::indicator::StatusIndicator;
use crate::sensor::apply_settings;
use crate::storage::{mount_storage, Storage};
use core::fmt;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

/// Everything the boot sequence reads. `DEFAULT` is the board configuration.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    pub camera: CameraConfig,
    pub sd_host: SdHostConfig,
    pub sd_slot: SdSlotConfig,
    pub mount: MountConfig,
    pub sensor: SensorSettings,
    pub indicator: IndicatorConfig,
    pub capture: CaptureConfig,
    pub settle_delay_ms: u32,
}

impl Settings {
    pub const DEFAULT: Settings = Settings {
        camera: CAMERA,
        sd_host: SD_HOST,
        sd_slot: SD_SLOT,
        mount: MOUNT,
        sensor: SENSOR,
        indicator: INDICATOR,
        capture: CAPTURE,
        settle_delay_ms: SETTLE_DELAY_MS,
    };
}

/// What went right during `init`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BootReport {
    pub camera_ready: bool,
    pub storage_mounted: bool,
    /// Sensor controls written successfully.
    pub tuning_applied: usize,
    /// Sensor controls that failed or aren't supported.
    pub tuning_failed: usize,
    pub indicator_ready: bool,
}

/// The firmware's three devices plus the capture state.
pub struct Firmware<C, S, P> {
    pub camera: C,
    pub storage: S,
    pub indicator: StatusIndicator<P>,
    capture: CaptureTask,
    settings: Settings,
}

impl<C, S, P> Firmware<C, S, P>
where
    C: CameraDriver,
    S: Storage,
    P: OutputPin,
    P::Error: fmt::Debug,
{
    pub fn new(camera: C, storage: S, led: P, settings: Settings) -> Self {
        Firmware {
            camera,
            storage,
            indicator: StatusIndicator::new(led, &settings.indicator),
            capture: CaptureTask::new(settings.capture, settings.mount.base_path),
            settings,
        }
    }

    pub fn capture_task(&self) -> &CaptureTask {
        &self.capture
    }

    /// Bring up the camera, the card, the sensor settings and the LED, in that order.
    pub fn init(&mut self) -> BootReport {
        let mut report = BootReport::default();

        // Failures are logged by `init_camera`
        report.camera_ready = init_camera(&mut self.camera, &self.settings.camera).is_ok();

        report.storage_mounted = mount_storage(
            &mut self.storage,
            &self.settings.sd_host,
            &self.settings.sd_slot,
            &self.settings.mount,
        )
        .is_ok();

        match self.camera.sensor() {
            Some(sensor) => {
                let tuning = apply_settings(sensor, &self.settings.sensor);
                for (param, e) in tuning.failures.iter() {
                    log_warn!("Camera", "Sensor setting {:?} not applied ({:?})", param, e);
                }
                report.tuning_applied = tuning.applied;
                report.tuning_failed = tuning.failures.len();
            }
            None => log_warn!("Camera", "No sensor handle, skipping tuning"),
        }

        match self.indicator.reset() {
            Ok(()) => report.indicator_ready = true,
            Err(e) => log_warn!("LED", "Failed to reset status LED ({:?})", e),
        }

        log_info!("Main", "All initialized");
        report
    }

    /// One capture-and-persist pass.
    pub fn capture(&mut self) -> Result<SavedImage, CaptureError<S::Error>> {
        let result =
            self.capture
                .capture_and_save(&mut self.camera, &mut self.storage, &mut self.indicator);
        log_info!("Main", "capture_and_save returned to Main");
        result
    }

    /// Boot and take exactly one picture after the settle delay.
    pub fn run_once<D: DelayMs<u32>>(
        &mut self,
        delay: &mut D,
    ) -> (BootReport, Result<SavedImage, CaptureError<S::Error>>) {
        let report = self.init();

        // Let automatic white balance converge
        delay.delay_ms(self.settings.settle_delay_ms);

        (report, self.capture())
    }

    /// One iteration of the button loop: sample, capture on release, then wait out the poll
    /// period. `None` when nothing was captured.
    pub fn button_step<B, D>(
        &mut self,
        button: &mut ButtonWatcher<B>,
        delay: &mut D,
    ) -> Option<Result<SavedImage, CaptureError<S::Error>>>
    where
        B: InputPin,
        B::Error: fmt::Debug,
        D: DelayMs<u32>,
    {
        let result = match button.poll() {
            Ok(true) => Some(self.capture()),
            Ok(false) => None,
            Err(e) => {
                log_warn!("Button", "Failed to read button ({:?})", e);
                None
            }
        };

        delay.delay_ms(BUTTON_POLL_MS);
        result
    }
}
