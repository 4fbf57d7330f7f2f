//! A generic driver for the Serial Camera Control Bus on the OV2640 image sensor. Works on any
//! microcontroller implementing the embedded-hal I2C interface.
//!
//! The OV2640 splits its registers into two banks (DSP and sensor) selected through register
//! 0xFF, so the driver remembers the active bank and only writes the select register when it
//! changes.

use core::marker::PhantomData;
use embedded_hal::blocking::i2c;

/// A register table entry: `(address, value)`. Address 0xFF selects the bank.
pub type RegTable = [(u8, u8)];

/// SCCB driver.
pub struct SCCB<I2C> {
    /// Marker to ensure the same I2C type is used in all calls.
    i2c: PhantomData<I2C>,
    /// Device I2C address.
    address: u8,
    /// Bank currently selected on the device, unknown after power up.
    bank: Option<Bank>,
}

/// Register bank.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bank {
    Dsp = 0x00,
    Sensor = 0x01,
}

/// SCCB errors.
#[derive(Debug, Eq, PartialEq)]
pub enum SccbError<E> {
    /// I2C write error.
    I2cWrite(E),
    /// I2C read error.
    I2cRead(E),
    /// Manufacturer ID mismatch.
    ReadManfId,
    /// Product ID mismatch.
    ReadProdId,
    /// Register write-readback mismatch.
    RegMismatch((u8, u8)),
}

impl<I2C, E> SCCB<I2C>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
{
    /// Creates a new SCCB driver associated with an I2C peripheral.
    pub fn new(_i2c: &I2C) -> Self {
        SCCB {
            i2c: PhantomData,
            address: OV2640_ADDRESS,
            bank: None,
        }
    }

    /// I2C read wrapper for mapping `E --> SccbError`.
    fn i2c_read(&self, i2c: &mut I2C, buf: &mut [u8]) -> Result<(), SccbError<E>> {
        i2c.read(self.address, buf).map_err(SccbError::I2cRead)
    }

    /// I2C write wrapper for mapping `E --> SccbError`.
    fn i2c_write(&self, i2c: &mut I2C, buf: &[u8]) -> Result<(), SccbError<E>> {
        i2c.write(self.address, buf).map_err(SccbError::I2cWrite)
    }

    /// Read a register, must be two seperate transactions and we can't use `WriteRead`.
    fn read_raw(&self, i2c: &mut I2C, reg: u8) -> Result<u8, SccbError<E>> {
        // Write the address
        self.i2c_write(i2c, &[reg])?;

        // Read the value
        let mut buf = [0x00];
        self.i2c_read(i2c, &mut buf)?;

        Ok(buf[0])
    }

    /// Write a register in whatever bank is selected.
    fn write_raw(&mut self, i2c: &mut I2C, reg: u8, val: u8) -> Result<(), SccbError<E>> {
        self.i2c_write(i2c, &[reg, val])?;
        if reg == Register::BANK_SEL {
            self.bank = match val & 0x01 {
                0 => Some(Bank::Dsp),
                _ => Some(Bank::Sensor),
            };
        }
        Ok(())
    }

    /// Switch to `bank` if it is not already selected.
    pub fn select_bank(&mut self, i2c: &mut I2C, bank: Bank) -> Result<(), SccbError<E>> {
        if self.bank != Some(bank) {
            self.write_raw(i2c, Register::BANK_SEL, bank as u8)?;
        }
        Ok(())
    }

    /// Read a register in `bank`.
    pub fn read_register(
        &mut self,
        i2c: &mut I2C,
        bank: Bank,
        reg: u8,
    ) -> Result<u8, SccbError<E>> {
        self.select_bank(i2c, bank)?;
        self.read_raw(i2c, reg)
    }

    /// Write a register in `bank`.
    pub fn write_register(
        &mut self,
        i2c: &mut I2C,
        bank: Bank,
        reg: u8,
        val: u8,
    ) -> Result<(), SccbError<E>> {
        self.select_bank(i2c, bank)?;
        self.write_raw(i2c, reg, val)
    }

    /// Read-modify-write the bits selected by `mask` in one register.
    pub fn update_bits(
        &mut self,
        i2c: &mut I2C,
        bank: Bank,
        reg: u8,
        mask: u8,
        bits: u8,
    ) -> Result<(), SccbError<E>> {
        let old = self.read_register(i2c, bank, reg)?;
        let new = (old & !mask) | (bits & mask);
        self.write_raw(i2c, reg, new)
    }

    /// Reset all registers to their default values.
    pub fn reset(&mut self, i2c: &mut I2C) -> Result<(), SccbError<E>> {
        // Setting the upper bit of COM7 in the sensor bank resets all the registers
        self.write_register(i2c, Bank::Sensor, Register::COM7, 0x80)?;

        // The reset puts the device back in the DSP bank
        self.bank = None;
        Ok(())
    }

    /// Check the device ID matches the expected value.
    pub fn check_id(&mut self, i2c: &mut I2C) -> Result<(), SccbError<E>> {
        // Manf ID
        let manf_id_msb: u16 = self.read_register(i2c, Bank::Sensor, Register::MIDH)?.into();
        let manf_id_lsb: u16 = self.read_register(i2c, Bank::Sensor, Register::MIDL)?.into();
        let manf_id: u16 = (manf_id_msb << 8) | manf_id_lsb;
        if manf_id != OV2640_MANF_ID {
            return Err(SccbError::ReadManfId);
        }

        // Product ID, the version byte varies between silicon revisions
        let product_id = self.read_register(i2c, Bank::Sensor, Register::PID)?;
        if product_id != OV2640_PROD_ID {
            return Err(SccbError::ReadProdId);
        }

        Ok(())
    }

    /// Apply a register table in order. Bank select entries switch banks on the way.
    pub fn apply_config(
        &mut self,
        i2c: &mut I2C,
        table: &RegTable,
        do_readback: bool,
    ) -> Result<(), SccbError<E>> {
        for &(reg, val) in table.iter() {
            // Write the register
            self.write_raw(i2c, reg, val)?;

            // Readback to check the write register worked
            if do_readback && reg != Register::BANK_SEL {
                let readback = self.read_raw(i2c, reg)?;
                if readback != val {
                    return Err(SccbError::RegMismatch((reg, readback)));
                }
            }
        }

        Ok(())
    }
}

/// Device address is 0x60, however the I2C driver will left-shift the provided address by 1
pub const OV2640_ADDRESS: u8 = 0x30;

/// Expected manufacturer ID (same OmniVision ID as the OV9655)
const OV2640_MANF_ID: u16 = 0x7FA2;

/// Expected product ID
const OV2640_PROD_ID: u8 = 0x26;

/// Device register addresses.
pub struct Register;

impl Register {
    /// Bank select, present in both banks.
    pub const BANK_SEL: u8 = 0xFF;

    // Sensor bank
    pub const GAIN: u8 = 0x00;
    pub const REG04: u8 = 0x04;
    pub const PID: u8 = 0x0A;
    pub const AEC: u8 = 0x10;
    pub const COM7: u8 = 0x12;
    pub const COM8: u8 = 0x13;
    pub const COM9: u8 = 0x14;
    pub const MIDH: u8 = 0x1C;
    pub const MIDL: u8 = 0x1D;
    pub const AEW: u8 = 0x24;
    pub const AEB: u8 = 0x25;
    pub const VV: u8 = 0x26;
    pub const REG45: u8 = 0x45;

    // DSP bank
    pub const QS: u8 = 0x44;
    pub const ZMOW: u8 = 0x5A;
    pub const ZMOH: u8 = 0x5B;
    pub const ZMHH: u8 = 0x5C;
    pub const BPADDR: u8 = 0x7C;
    pub const BPDATA: u8 = 0x7D;
    pub const CTRL2: u8 = 0x86;
    pub const CTRL3: u8 = 0x87;
    pub const CTRL0: u8 = 0xC2;
    pub const CTRL1: u8 = 0xC3;
    pub const AWB_GAIN_R: u8 = 0xCC;
    pub const AWB_GAIN_G: u8 = 0xCD;
    pub const AWB_GAIN_B: u8 = 0xCE;
    pub const IMAGE_MODE: u8 = 0xDA;
    pub const RESET: u8 = 0xE0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::FakeI2c;

    #[test]
    fn check_id_reads_sensor_bank() {
        let mut i2c = FakeI2c::ov2640();
        let mut sccb = SCCB::new(&i2c);
        assert_eq!(sccb.check_id(&mut i2c), Ok(()));
        assert_eq!(i2c.bank, 1);
    }

    #[test]
    fn wrong_product_id() {
        let mut i2c = FakeI2c::ov2640();
        i2c.sensor[Register::PID as usize] = 0x96;
        let mut sccb = SCCB::new(&i2c);
        assert_eq!(sccb.check_id(&mut i2c), Err(SccbError::ReadProdId));
    }

    #[test]
    fn bank_select_is_cached() {
        let mut i2c = FakeI2c::ov2640();
        let mut sccb = SCCB::new(&i2c);
        sccb.write_register(&mut i2c, Bank::Dsp, Register::QS, 0x0C)
            .unwrap();
        sccb.write_register(&mut i2c, Bank::Dsp, Register::QS, 0x02)
            .unwrap();
        let bank_writes = i2c
            .writes
            .iter()
            .filter(|w| w[0] == Register::BANK_SEL)
            .count();
        assert_eq!(bank_writes, 1);
        assert_eq!(i2c.dsp[Register::QS as usize], 0x02);
    }

    #[test]
    fn table_bank_switches_are_tracked() {
        let mut i2c = FakeI2c::ov2640();
        let mut sccb = SCCB::new(&i2c);
        let table = [(0xFF, 0x01), (0x11, 0x01), (0xFF, 0x00), (0x44, 0x0C)];
        sccb.apply_config(&mut i2c, &table, true).unwrap();
        assert_eq!(i2c.sensor[0x11], 0x01);
        assert_eq!(i2c.dsp[0x44], 0x0C);

        // DSP already selected by the table
        i2c.writes.clear();
        sccb.write_register(&mut i2c, Bank::Dsp, 0x44, 0x04).unwrap();
        assert_eq!(i2c.writes, vec![vec![0x44, 0x04]]);
    }

    #[test]
    fn update_bits_preserves_other_bits() {
        let mut i2c = FakeI2c::ov2640();
        i2c.dsp[Register::CTRL1 as usize] = 0xF0;
        let mut sccb = SCCB::new(&i2c);
        sccb.update_bits(&mut i2c, Bank::Dsp, Register::CTRL1, 0x08, 0x00)
            .unwrap();
        assert_eq!(i2c.dsp[Register::CTRL1 as usize], 0xF0 & !0x08);
    }

    #[test]
    fn i2c_errors_are_wrapped() {
        let mut i2c = FakeI2c::ov2640();
        i2c.nack = true;
        let mut sccb = SCCB::new(&i2c);
        assert_eq!(sccb.reset(&mut i2c), Err(SccbError::I2cWrite(())));
    }
}
