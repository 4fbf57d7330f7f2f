//! OV2640 device driver.
//! * Configures the sensor for JPEG output over the SCCB (I2C) port.
//! * Implements the `Sensor` controls used for tuning after init.
//! * The parallel pixel bus is board specific and lives in `board::dcmi`.

mod regs;
pub mod sccb;

use crate::config::{CameraConfig, FrameSize, Level, PixelFormat, SpecialEffect, WbMode};
use crate::sensor::{check_range, Sensor, SensorError};
use core::fmt;
use embedded_hal::blocking::{delay::DelayMs, i2c};
use sccb::{Bank, Register, SccbError, SCCB};

/// OV2640 errors.
#[derive(Debug, Eq, PartialEq)]
pub enum Ov2640Error<E> {
    /// SCCB transaction failed.
    Sccb(SccbError<E>),
    /// The driver only has register tables for JPEG output.
    Format(PixelFormat),
}

impl<E> From<SccbError<E>> for Ov2640Error<E> {
    fn from(e: SccbError<E>) -> Self {
        Ov2640Error::Sccb(e)
    }
}

/// `(ZMOW, ZMOH, ZMHH)` for a DSP output size. Width and height are programmed in units of
/// four pixels, with the overflow bits packed into ZMHH.
pub fn output_size_regs(width: u16, height: u16) -> [(u8, u8); 3] {
    let zmow = (width >> 2) as u8;
    let zmoh = (height >> 2) as u8;
    let zmhh = (((height >> 8) & 0x04) | ((width >> 10) & 0x03)) as u8;
    [
        (Register::ZMOW, zmow),
        (Register::ZMOH, zmoh),
        (Register::ZMHH, zmhh),
    ]
}

/// Handle for the OV2640.
pub struct Ov2640<I2C> {
    i2c: I2C,
    sccb: SCCB<I2C>,
}

impl<I2C, E> Ov2640<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    E: fmt::Debug,
{
    pub fn new(i2c: I2C) -> Self {
        let sccb = SCCB::new(&i2c);
        Ov2640 { i2c, sccb }
    }

    /// Give the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Reset the sensor, check its ID and load the JPEG configuration for `config`.
    pub fn init<D: DelayMs<u32>>(
        &mut self,
        config: &CameraConfig,
        delay: &mut D,
    ) -> Result<(), Ov2640Error<E>> {
        if config.pixel_format != PixelFormat::Jpeg {
            return Err(Ov2640Error::Format(config.pixel_format));
        }

        // Establish communication with the OV2640
        self.sccb.reset(&mut self.i2c)?;
        delay.delay_ms(10);
        self.sccb.check_id(&mut self.i2c)?;

        self.sccb
            .apply_config(&mut self.i2c, regs::COMMON_INIT, false)?;

        let window = match config.frame_size {
            FrameSize::Uxga | FrameSize::Sxga | FrameSize::Xga => regs::UXGA_WINDOW,
            _ => regs::SVGA_WINDOW,
        };
        self.sccb.apply_config(&mut self.i2c, window, false)?;

        let (width, height) = config.frame_size.dimensions();
        for &(reg, val) in output_size_regs(width, height).iter() {
            self.sccb
                .write_register(&mut self.i2c, Bank::Dsp, reg, val)?;
        }

        // Release the DVP from reset with the new size latched
        self.sccb
            .write_register(&mut self.i2c, Bank::Dsp, Register::RESET, 0x00)?;

        self.sccb
            .apply_config(&mut self.i2c, regs::JPEG_OUTPUT, false)?;
        self.set_quality(config.jpeg_quality)?;

        Ok(())
    }

    /// JPEG quantization scale, 0..=63 with lower meaning higher quality.
    pub fn set_quality(&mut self, quality: u8) -> Result<(), SccbError<E>> {
        self.sccb
            .write_register(&mut self.i2c, Bank::Dsp, Register::QS, quality)
    }

    /// Write one row of an SDE table through the BPADDR/BPDATA window.
    fn write_row(&mut self, header: &[u8], row: &[u8]) -> Result<(), SensorError<SccbError<E>>> {
        for (&reg, &val) in header.iter().zip(row.iter()) {
            self.sccb
                .write_register(&mut self.i2c, Bank::Dsp, reg, val)
                .map_err(SensorError::Bus)?;
        }
        Ok(())
    }

    /// Set or clear `mask` in one register.
    fn set_bits(
        &mut self,
        bank: Bank,
        reg: u8,
        mask: u8,
        enable: bool,
    ) -> Result<(), SensorError<SccbError<E>>> {
        let bits = if enable { mask } else { 0 };
        self.sccb
            .update_bits(&mut self.i2c, bank, reg, mask, bits)
            .map_err(SensorError::Bus)
    }
}

/// Table row for a -2..=2 level.
fn level_index<E>(level: Level) -> Result<usize, SensorError<E>> {
    check_range::<E>(level.into(), -2, 2)?;
    Ok((level + 2) as usize)
}

// CTRL1 bits
const CTRL1_AWB: u8 = 0x08;
const CTRL1_AWB_GAIN: u8 = 0x04;
const CTRL1_LENC: u8 = 0x02;
const CTRL1_RAW_GMA: u8 = 0x20;

// CTRL0, CTRL2 and CTRL3 bits
const CTRL0_AEC_SEL: u8 = 0x40;
const CTRL2_DCW: u8 = 0x20;
const CTRL3_BPC: u8 = 0x80;
const CTRL3_WPC: u8 = 0x40;

// Sensor bank bits
const COM8_AEC: u8 = 0x01;
const COM8_AGC: u8 = 0x04;
const COM7_COLORBAR: u8 = 0x02;
const REG04_HFLIP: u8 = 0x80;
const REG04_VFLIP: u8 = 0x40;
const COM9_GAINCEILING: u8 = 0xE0;

impl<I2C, E> Sensor for Ov2640<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    E: fmt::Debug,
{
    type Error = SccbError<E>;

    fn set_brightness(&mut self, level: Level) -> Result<(), SensorError<Self::Error>> {
        let row = regs::BRIGHTNESS[level_index::<Self::Error>(level)?];
        self.write_row(&regs::SDE_HEADER_5, &row)
    }

    fn set_contrast(&mut self, level: Level) -> Result<(), SensorError<Self::Error>> {
        let row = regs::CONTRAST[level_index::<Self::Error>(level)?];
        self.write_row(&regs::SDE_HEADER_7, &row)
    }

    fn set_saturation(&mut self, level: Level) -> Result<(), SensorError<Self::Error>> {
        let row = regs::SATURATION[level_index::<Self::Error>(level)?];
        self.write_row(&regs::SDE_HEADER_5, &row)
    }

    fn set_special_effect(
        &mut self,
        effect: SpecialEffect,
    ) -> Result<(), SensorError<Self::Error>> {
        let row = regs::SPECIAL_EFFECT[effect as usize];
        self.write_row(&regs::SDE_HEADER_5, &row)
    }

    fn set_whitebal(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_AWB, enable)
    }

    fn set_awb_gain(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_AWB_GAIN, enable)
    }

    fn set_wb_mode(&mut self, mode: WbMode) -> Result<(), SensorError<Self::Error>> {
        // Auto hands control back to the AWB block, presets disable it and fix the gains
        let gains = match mode {
            WbMode::Auto => return self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_AWB, true),
            WbMode::Sunny => regs::WB_GAINS[0],
            WbMode::Cloudy => regs::WB_GAINS[1],
            WbMode::Office => regs::WB_GAINS[2],
            WbMode::Home => regs::WB_GAINS[3],
        };
        self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_AWB, false)?;
        let header = [
            Register::AWB_GAIN_R,
            Register::AWB_GAIN_G,
            Register::AWB_GAIN_B,
        ];
        self.write_row(&header, &gains)
    }

    fn set_exposure_ctrl(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Sensor, Register::COM8, COM8_AEC, enable)
    }

    fn set_aec2(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL0, CTRL0_AEC_SEL, enable)
    }

    fn set_ae_level(&mut self, level: Level) -> Result<(), SensorError<Self::Error>> {
        let row = regs::AE_LEVEL[level_index::<Self::Error>(level)?];
        for (&reg, &val) in [Register::AEW, Register::AEB, Register::VV]
            .iter()
            .zip(row.iter())
        {
            self.sccb
                .write_register(&mut self.i2c, Bank::Sensor, reg, val)
                .map_err(SensorError::Bus)?;
        }
        Ok(())
    }

    fn set_aec_value(&mut self, value: u16) -> Result<(), SensorError<Self::Error>> {
        check_range::<Self::Error>(value.into(), 0, 1200)?;

        // Exposure is spread over REG04[1:0], AEC[7:0] and REG45[5:0]
        let low = (value & 0x03) as u8;
        let mid = ((value >> 2) & 0xFF) as u8;
        let high = ((value >> 10) & 0x3F) as u8;
        self.sccb
            .update_bits(&mut self.i2c, Bank::Sensor, Register::REG04, 0x03, low)
            .map_err(SensorError::Bus)?;
        self.sccb
            .write_register(&mut self.i2c, Bank::Sensor, Register::AEC, mid)
            .map_err(SensorError::Bus)?;
        self.sccb
            .update_bits(&mut self.i2c, Bank::Sensor, Register::REG45, 0x3F, high)
            .map_err(SensorError::Bus)
    }

    fn set_gain_ctrl(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Sensor, Register::COM8, COM8_AGC, enable)
    }

    fn set_agc_gain(&mut self, gain: u8) -> Result<(), SensorError<Self::Error>> {
        check_range::<Self::Error>(gain.into(), 0, 30)?;
        self.sccb
            .write_register(
                &mut self.i2c,
                Bank::Sensor,
                Register::GAIN,
                regs::AGC_GAIN[gain as usize],
            )
            .map_err(SensorError::Bus)
    }

    fn set_gainceiling(&mut self, ceiling: u8) -> Result<(), SensorError<Self::Error>> {
        check_range::<Self::Error>(ceiling.into(), 0, 6)?;
        self.sccb
            .update_bits(
                &mut self.i2c,
                Bank::Sensor,
                Register::COM9,
                COM9_GAINCEILING,
                ceiling << 5,
            )
            .map_err(SensorError::Bus)
    }

    fn set_bpc(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL3, CTRL3_BPC, enable)
    }

    fn set_wpc(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL3, CTRL3_WPC, enable)
    }

    fn set_raw_gma(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_RAW_GMA, enable)
    }

    fn set_lenc(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL1, CTRL1_LENC, enable)
    }

    fn set_hmirror(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Sensor, Register::REG04, REG04_HFLIP, enable)
    }

    fn set_vflip(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Sensor, Register::REG04, REG04_VFLIP, enable)
    }

    fn set_dcw(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Dsp, Register::CTRL2, CTRL2_DCW, enable)
    }

    fn set_colorbar(&mut self, enable: bool) -> Result<(), SensorError<Self::Error>> {
        self.set_bits(Bank::Sensor, Register::COM7, COM7_COLORBAR, enable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CAMERA;
    use crate::tests::fakes::{FakeDelay, FakeI2c};

    #[test]
    fn output_size_packs_high_bits() {
        assert_eq!(
            output_size_regs(800, 600),
            [(0x5A, 200), (0x5B, 150), (0x5C, 0x00)]
        );
        // 1600 / 4 = 400 and 1200 / 4 = 300 overflow a byte
        assert_eq!(
            output_size_regs(1600, 1200),
            [(0x5A, 0x90), (0x5B, 0x2C), (0x5C, 0x05)]
        );
    }

    #[test]
    fn init_loads_jpeg_configuration() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        let mut delay = FakeDelay::default();
        assert_eq!(cam.init(&CAMERA, &mut delay), Ok(()));
        assert_eq!(delay.total_ms, 10);

        let i2c = cam.release();
        assert_eq!(i2c.dsp[Register::QS as usize], CAMERA.jpeg_quality);
        assert_eq!(i2c.dsp[Register::ZMOW as usize], 200);
        assert_eq!(i2c.dsp[Register::ZMOH as usize], 150);
        assert_eq!(i2c.dsp[Register::IMAGE_MODE as usize], 0x10);
        assert_eq!(i2c.dsp[Register::RESET as usize], 0x00);
    }

    #[test]
    fn init_rejects_raw_formats() {
        let mut config = CAMERA;
        config.pixel_format = PixelFormat::Rgb565;
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        assert_eq!(
            cam.init(&config, &mut FakeDelay::default()),
            Err(Ov2640Error::Format(PixelFormat::Rgb565))
        );
        assert!(cam.release().writes.is_empty());
    }

    #[test]
    fn init_fails_on_wrong_chip() {
        let mut i2c = FakeI2c::ov2640();
        i2c.sensor[Register::MIDL as usize] = 0x00;
        let mut cam = Ov2640::new(i2c);
        assert_eq!(
            cam.init(&CAMERA, &mut FakeDelay::default()),
            Err(Ov2640Error::Sccb(SccbError::ReadManfId))
        );
    }

    #[test]
    fn brightness_goes_through_sde_window() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        cam.set_brightness(2).unwrap();
        let i2c = cam.release();
        let sde: Vec<_> = i2c
            .writes
            .iter()
            .filter(|w| w.len() == 2 && w[0] != Register::BANK_SEL)
            .map(|w| (w[0], w[1]))
            .collect();
        assert_eq!(
            sde,
            vec![(0x7C, 0x00), (0x7D, 0x04), (0x7C, 0x09), (0x7D, 0x40), (0x7D, 0x00)]
        );
    }

    #[test]
    fn level_out_of_range_writes_nothing() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        assert_eq!(cam.set_saturation(-3), Err(SensorError::OutOfRange));
        assert!(cam.release().writes.is_empty());
    }

    #[test]
    fn whitebal_toggles_ctrl1_bit() {
        let mut i2c = FakeI2c::ov2640();
        i2c.dsp[Register::CTRL1 as usize] = 0xED;
        let mut cam = Ov2640::new(i2c);
        cam.set_whitebal(false).unwrap();
        cam.set_lenc(false).unwrap();
        let i2c = cam.release();
        assert_eq!(i2c.dsp[Register::CTRL1 as usize], 0xED & !0x08 & !0x02);
    }

    #[test]
    fn aec_value_is_split_over_three_registers() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        cam.set_aec_value(1200).unwrap();
        assert_eq!(cam.set_aec_value(1201), Err(SensorError::OutOfRange));
        let i2c = cam.release();
        assert_eq!(i2c.sensor[Register::REG04 as usize] & 0x03, 0x00);
        assert_eq!(i2c.sensor[Register::AEC as usize], 0x2C);
        assert_eq!(i2c.sensor[Register::REG45 as usize] & 0x3F, 0x01);
    }

    #[test]
    fn agc_gain_writes_gain_table_value() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        cam.set_agc_gain(10).unwrap();
        assert_eq!(cam.set_agc_gain(31), Err(SensorError::OutOfRange));
        let i2c = cam.release();
        assert_eq!(i2c.sensor[Register::GAIN as usize], 0x76);
        assert_eq!(i2c.dsp[Register::GAIN as usize], 0x00);
    }

    #[test]
    fn tuning_with_agc_gain_has_no_failures() {
        use crate::config::{SensorSettings, SENSOR};
        use crate::sensor::apply_settings;

        let mut cam = Ov2640::new(FakeI2c::ov2640());
        let base = apply_settings(&mut cam, &SENSOR);
        let settings = SensorSettings {
            agc_gain: Some(10),
            ..SENSOR
        };
        let report = apply_settings(&mut cam, &settings);
        assert!(report.failures.is_empty());
        assert_eq!(report.applied, base.applied + 1);
    }

    #[test]
    fn gainceiling_is_range_checked() {
        let mut cam = Ov2640::new(FakeI2c::ov2640());
        cam.set_gainceiling(6).unwrap();
        assert_eq!(cam.set_gainceiling(7), Err(SensorError::OutOfRange));
        let i2c = cam.release();
        assert_eq!(i2c.sensor[Register::COM9 as usize] & 0xE0, 0xC0);
    }

    #[test]
    fn wb_preset_disables_awb() {
        let mut i2c = FakeI2c::ov2640();
        i2c.dsp[Register::CTRL1 as usize] = 0xFF;
        let mut cam = Ov2640::new(i2c);
        cam.set_wb_mode(WbMode::Cloudy).unwrap();
        let i2c = cam.release();
        assert_eq!(i2c.dsp[Register::CTRL1 as usize] & 0x08, 0);
        assert_eq!(i2c.dsp[Register::AWB_GAIN_R as usize], 0x65);
        assert_eq!(i2c.dsp[Register::AWB_GAIN_B as usize], 0x4F);
    }
}
