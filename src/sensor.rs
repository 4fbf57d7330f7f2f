//! Sensor tuning. Every setter reports its own result and `apply_settings` collects the
//! failures, so the caller decides whether a bad write matters.

use crate::config::{Level, SensorSettings, SpecialEffect, WbMode};
use core::fmt;
use heapless::{consts, Vec};

/// Sensor setter errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SensorError<E> {
    /// Bus error while writing the sensor registers.
    Bus(E),
    /// Value outside the range the setter accepts.
    OutOfRange,
    /// The sensor has no such control.
    Unsupported,
}

/// Named image quality controls of an image sensor. Only the five controls used at boot are
/// required, the rest default to `Unsupported`.
pub trait Sensor {
    type Error: fmt::Debug;

    /// -2..=2
    fn set_brightness(&mut self, level: Level) -> Result<(), SensorError<Self::Error>>;

    /// -2..=2
    fn set_contrast(&mut self, level: Level) -> Result<(), SensorError<Self::Error>>;

    /// -2..=2
    fn set_saturation(&mut self, level: Level) -> Result<(), SensorError<Self::Error>>;

    fn set_special_effect(&mut self, effect: SpecialEffect)
        -> Result<(), SensorError<Self::Error>>;

    /// Automatic white balance.
    fn set_whitebal(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>>;

    fn set_awb_gain(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_wb_mode(&mut self, _mode: WbMode) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_exposure_ctrl(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_aec2(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_ae_level(&mut self, _level: Level) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_aec_value(&mut self, _value: u16) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_gain_ctrl(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_agc_gain(&mut self, _gain: u8) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_gainceiling(&mut self, _ceiling: u8) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_bpc(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_wpc(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_raw_gma(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_lenc(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_hmirror(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_vflip(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_dcw(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }

    fn set_colorbar(&mut self, _enable: bool) -> Result<(), SensorError<Self::Error>> {
        Err(SensorError::Unsupported)
    }
}

/// Check `value` lies in `min..=max`.
pub fn check_range<E>(value: i32, min: i32, max: i32) -> Result<(), SensorError<E>> {
    if value < min || value > max {
        Err(SensorError::OutOfRange)
    } else {
        Ok(())
    }
}

/// Identifies one control in a `TuningReport`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SensorParam {
    Brightness,
    Contrast,
    Saturation,
    SpecialEffect,
    Whitebal,
    AwbGain,
    WbMode,
    ExposureCtrl,
    Aec2,
    AeLevel,
    AecValue,
    GainCtrl,
    AgcGain,
    Gainceiling,
    Bpc,
    Wpc,
    RawGma,
    Lenc,
    Hmirror,
    Vflip,
    Dcw,
    Colorbar,
}

/// Outcome of `apply_settings`: how many writes went through and which ones failed.
#[derive(Debug)]
pub struct TuningReport<E> {
    pub applied: usize,
    pub failures: Vec<(SensorParam, SensorError<E>), consts::U24>,
}

impl<E> TuningReport<E> {
    fn new() -> Self {
        TuningReport {
            applied: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, param: SensorParam, result: Result<(), SensorError<E>>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(e) => {
                // One slot per control, the push can't overflow
                let _ = self.failures.push((param, e));
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Push `settings` to the sensor one control at a time. Every control is attempted even
/// after a failure.
pub fn apply_settings<S: Sensor>(
    sensor: &mut S,
    settings: &SensorSettings,
) -> TuningReport<S::Error> {
    let mut report = TuningReport::new();

    report.record(
        SensorParam::Brightness,
        sensor.set_brightness(settings.brightness),
    );
    report.record(SensorParam::Contrast, sensor.set_contrast(settings.contrast));
    report.record(
        SensorParam::Saturation,
        sensor.set_saturation(settings.saturation),
    );
    report.record(
        SensorParam::SpecialEffect,
        sensor.set_special_effect(settings.special_effect),
    );
    report.record(SensorParam::Whitebal, sensor.set_whitebal(settings.whitebal));

    if let Some(v) = settings.awb_gain {
        report.record(SensorParam::AwbGain, sensor.set_awb_gain(v));
    }
    if let Some(v) = settings.wb_mode {
        report.record(SensorParam::WbMode, sensor.set_wb_mode(v));
    }
    if let Some(v) = settings.exposure_ctrl {
        report.record(SensorParam::ExposureCtrl, sensor.set_exposure_ctrl(v));
    }
    if let Some(v) = settings.aec2 {
        report.record(SensorParam::Aec2, sensor.set_aec2(v));
    }
    if let Some(v) = settings.ae_level {
        report.record(SensorParam::AeLevel, sensor.set_ae_level(v));
    }
    if let Some(v) = settings.aec_value {
        report.record(SensorParam::AecValue, sensor.set_aec_value(v));
    }
    if let Some(v) = settings.gain_ctrl {
        report.record(SensorParam::GainCtrl, sensor.set_gain_ctrl(v));
    }
    if let Some(v) = settings.agc_gain {
        report.record(SensorParam::AgcGain, sensor.set_agc_gain(v));
    }
    if let Some(v) = settings.gainceiling {
        report.record(SensorParam::Gainceiling, sensor.set_gainceiling(v));
    }
    if let Some(v) = settings.bpc {
        report.record(SensorParam::Bpc, sensor.set_bpc(v));
    }
    if let Some(v) = settings.wpc {
        report.record(SensorParam::Wpc, sensor.set_wpc(v));
    }
    if let Some(v) = settings.raw_gma {
        report.record(SensorParam::RawGma, sensor.set_raw_gma(v));
    }
    if let Some(v) = settings.lenc {
        report.record(SensorParam::Lenc, sensor.set_lenc(v));
    }
    if let Some(v) = settings.hmirror {
        report.record(SensorParam::Hmirror, sensor.set_hmirror(v));
    }
    if let Some(v) = settings.vflip {
        report.record(SensorParam::Vflip, sensor.set_vflip(v));
    }
    if let Some(v) = settings.dcw {
        report.record(SensorParam::Dcw, sensor.set_dcw(v));
    }
    if let Some(v) = settings.colorbar {
        report.record(SensorParam::Colorbar, sensor.set_colorbar(v));
    }

    report
}
