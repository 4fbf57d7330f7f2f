//! SD card driver for the microSD slot on the STM32F746G Discovery Board, using the SDMMC1
//! peripheral in polling mode. Only CK, CMD and D0 are used, so the bus runs 1 bit wide.
//!
//! Pin configuration:
//!
//!     SDMMC1 CK:  PC12 --> card CLK
//!     SDMMC1 CMD: PD2 <--> card CMD
//!     SDMMC1 D0:  PC8 <--> card DAT0

use crate::config::{BusWidth, SdHostConfig};
use crate::storage::sd_clock::{bus_khz, clock_divider, pll48_freq};
use crate::storage::{CardInfo, CardKind};
use embedded_sdmmc::{Block, BlockCount, BlockDevice, BlockIdx};
use heapless::String;
use stm32f7xx_hal::{
    gpio::{GpioExt, Speed},
    pac::{self, RCC, SDMMC1},
};

/// SDMMC errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SdmmcError {
    /// No response to a command (index attached). Usually means no card.
    CmdTimeout(u8),
    /// Response CRC check failed.
    CmdCrc(u8),
    /// The card never left the busy state during power up.
    PowerUpTimeout,
    /// The card rejected the 3.3 V check pattern.
    BadVoltage,
    /// Data phase timed out.
    DataTimeout,
    /// Data CRC check failed.
    DataCrc,
    /// Receive FIFO overrun.
    RxOverrun,
    /// Transmit FIFO underrun.
    TxUnderrun,
    /// The card stayed in the programming state too long.
    BusyTimeout,
    /// Block operation before a successful `init`.
    NotInitialized,
}

/// Response type expected from a command.
#[derive(Clone, Copy, PartialEq)]
enum Response {
    None,
    Short,
    /// Short response without a valid CRC (R3).
    ShortNoCrc,
    Long,
}

/// SD commands used by the driver.
struct Cmd;

impl Cmd {
    pub const GO_IDLE_STATE: u8 = 0;
    pub const ALL_SEND_CID: u8 = 2;
    pub const SEND_RELATIVE_ADDR: u8 = 3;
    pub const SET_BUS_WIDTH: u8 = 6;
    pub const SELECT_CARD: u8 = 7;
    pub const SEND_IF_COND: u8 = 8;
    pub const SEND_CSD: u8 = 9;
    pub const SEND_STATUS: u8 = 13;
    pub const SET_BLOCKLEN: u8 = 16;
    pub const READ_SINGLE_BLOCK: u8 = 17;
    pub const WRITE_BLOCK: u8 = 24;
    pub const SD_SEND_OP_COND: u8 = 41;
    pub const APP_CMD: u8 = 55;
}

// CMD register
const CMD_WAITRESP_SHORT: u32 = 0b01 << 6;
const CMD_WAITRESP_LONG: u32 = 0b11 << 6;
const CMD_CPSMEN: u32 = 1 << 10;

// STA and ICR bits
const STA_CCRCFAIL: u32 = 1 << 0;
const STA_DCRCFAIL: u32 = 1 << 1;
const STA_CTIMEOUT: u32 = 1 << 2;
const STA_DTIMEOUT: u32 = 1 << 3;
const STA_TXUNDERR: u32 = 1 << 4;
const STA_RXOVERR: u32 = 1 << 5;
const STA_CMDREND: u32 = 1 << 6;
const STA_CMDSENT: u32 = 1 << 7;
const STA_DBCKEND: u32 = 1 << 10;
const STA_TXFIFOHE: u32 = 1 << 14;
const STA_RXDAVL: u32 = 1 << 21;
const ICR_STATIC: u32 = 0x05FF;

// CLKCR bits
const CLKCR_CLKEN: u32 = 1 << 8;
const CLKCR_WIDBUS_4: u32 = 0b01 << 11;

// DCTRL bits, 512 byte blocks
const DCTRL_DTEN: u32 = 1 << 0;
const DCTRL_DTDIR_READ: u32 = 1 << 1;
const DCTRL_BLOCK_512: u32 = 9 << 4;

// RCC DCKCFGR2 clock selection
const DCKCFGR2_CK48MSEL: u32 = 1 << 27;
const DCKCFGR2_SDMMC1SEL: u32 = 1 << 28;

// OCR bits
const OCR_BUSY: u32 = 1 << 31;
const OCR_HCS: u32 = 1 << 30;
const OCR_VOLTAGE_WINDOW: u32 = 0x0010_0000;

/// `tran` in the CURRENT_STATE field of an R1 status.
const R1_STATE_TRAN: u32 = 4;

const BLOCK_SIZE: u32 = 512;
const CMD_TIMEOUT: u32 = 100_000;
const DATA_TIMEOUT: u32 = 10_000_000;
const POWER_UP_TRIES: u32 = 1000;
const BUSY_TRIES: u32 = 100_000;

/// Handle for the SD card driver.
pub struct SdmmcDriver {
    /// SDMMC peripheral registers.
    sdmmc: SDMMC1,
    /// Kernel clock feeding the SDMMC clock divider.
    kernel_hz: u32,
    /// Core cycles per millisecond, for busy waits.
    cycles_per_ms: u32,
    /// Relative card address, assigned by the card during `init`.
    rca: u16,
    /// Block addressed (SDHC/SDXC) or byte addressed (SDSC).
    block_addressed: bool,
    num_blocks: u32,
    initialized: bool,
}

impl SdmmcDriver {
    /// Configure the SD pins and SDMMC1, leaving the bus powered off. The pins get no bias
    /// here, see `board::set_pull`. Peripherals are stolen, so this should only be done
    /// during init!
    pub fn new(sdmmc: SDMMC1, hse_hz: u32, sysclk_hz: u32) -> Self {
        let pac_periph = unsafe { pac::Peripherals::steal() };
        let rcc_regs = unsafe { &(*RCC::ptr()) };

        let gpioc = pac_periph.GPIOC.split();
        let gpiod = pac_periph.GPIOD.split();

        let _sd_ck = gpioc
            .pc12
            .into_alternate_af12()
            .set_speed(Speed::VeryHigh);

        let _sd_cmd = gpiod
            .pd2
            .into_alternate_af12()
            .set_speed(Speed::VeryHigh);

        let _sd_d0 = gpioc
            .pc8
            .into_alternate_af12()
            .set_speed(Speed::VeryHigh);

        // Enable peripheral clock
        rcc_regs.apb2enr.modify(|_, w| w.sdmmc1en().set_bit());

        // Prefer the 48 MHz PLL output, the divider can't bring SYSCLK down to 400 kHz
        let pll48_hz = pll48_freq(rcc_regs.pllcfgr.read().bits(), hse_hz);
        let kernel_hz = if pll48_hz == 48_000_000 {
            rcc_regs.dckcfgr2.modify(|r, w| unsafe {
                w.bits(r.bits() & !(DCKCFGR2_CK48MSEL | DCKCFGR2_SDMMC1SEL))
            });
            pll48_hz
        } else {
            log_warn!(
                "SD Card",
                "PLL48 runs at {} Hz, clocking SDMMC1 from SYSCLK",
                pll48_hz
            );
            rcc_regs
                .dckcfgr2
                .modify(|r, w| unsafe { w.bits(r.bits() | DCKCFGR2_SDMMC1SEL) });
            sysclk_hz
        };

        unsafe {
            sdmmc.power.write(|w| w.bits(0));
            sdmmc.clkcr.write(|w| w.bits(0));
            sdmmc.mask.write(|w| w.bits(0));
            sdmmc.icr.write(|w| w.bits(ICR_STATIC));
        }

        SdmmcDriver {
            sdmmc,
            kernel_hz,
            cycles_per_ms: sysclk_hz / 1000,
            rca: 0,
            block_addressed: false,
            num_blocks: 0,
            initialized: false,
        }
    }

    /// Power the card up, identify it, select it and switch to the transfer clock.
    pub fn init(&mut self, host: &SdHostConfig) -> Result<CardInfo, SdmmcError> {
        self.initialized = false;

        let id_khz = self.set_clock(host.init_freq_khz, BusWidth::One);
        if id_khz > host.init_freq_khz {
            log_warn!(
                "SD Card",
                "Identification clock is {} kHz, above {} kHz",
                id_khz,
                host.init_freq_khz
            );
        }
        unsafe {
            // Power on
            self.sdmmc.power.write(|w| w.bits(0b11));
        }
        // The card needs 74 clocks before the first command
        cortex_m::asm::delay(2 * self.cycles_per_ms);

        self.send_cmd(Cmd::GO_IDLE_STATE, 0, Response::None)?;

        // Version 2 cards echo the check pattern, version 1 cards don't answer
        let v2 = match self.send_cmd(Cmd::SEND_IF_COND, 0x1AA, Response::Short) {
            Ok(r7) if r7 & 0xFFF == 0x1AA => true,
            Ok(_) => return Err(SdmmcError::BadVoltage),
            Err(SdmmcError::CmdTimeout(_)) => false,
            Err(e) => return Err(e),
        };

        let hcs = if v2 { OCR_HCS } else { 0 };
        let mut ocr = 0;
        for _ in 0..POWER_UP_TRIES {
            self.send_cmd(Cmd::APP_CMD, 0, Response::Short)?;
            ocr = self.send_cmd(
                Cmd::SD_SEND_OP_COND,
                OCR_VOLTAGE_WINDOW | hcs,
                Response::ShortNoCrc,
            )?;
            if ocr & OCR_BUSY != 0 {
                break;
            }
            cortex_m::asm::delay(self.cycles_per_ms);
        }
        if ocr & OCR_BUSY == 0 {
            return Err(SdmmcError::PowerUpTimeout);
        }
        self.block_addressed = ocr & OCR_HCS != 0;

        self.send_cmd(Cmd::ALL_SEND_CID, 0, Response::Long)?;
        let cid = self.long_response();

        let r6 = self.send_cmd(Cmd::SEND_RELATIVE_ADDR, 0, Response::Short)?;
        self.rca = (r6 >> 16) as u16;
        let rca_arg = u32::from(self.rca) << 16;

        self.send_cmd(Cmd::SEND_CSD, rca_arg, Response::Long)?;
        let csd = self.long_response();
        let capacity = csd_capacity(&csd);
        self.num_blocks = (capacity / u64::from(BLOCK_SIZE)) as u32;

        self.send_cmd(Cmd::SELECT_CARD, rca_arg, Response::Short)?;
        self.wait_ready()?;

        if !self.block_addressed {
            self.send_cmd(Cmd::SET_BLOCKLEN, BLOCK_SIZE, Response::Short)?;
        }

        if host.bus_width == BusWidth::Four {
            self.send_cmd(Cmd::APP_CMD, rca_arg, Response::Short)?;
            self.send_cmd(Cmd::SET_BUS_WIDTH, 0b10, Response::Short)?;
        }

        let freq_khz = self.set_clock(host.max_freq_khz, host.bus_width);
        self.initialized = true;

        Ok(CardInfo {
            name: cid_name(&cid),
            kind: if self.block_addressed {
                CardKind::Sdhc
            } else {
                CardKind::Sdsc
            },
            capacity_bytes: capacity,
            bus_width: host.bus_width,
            freq_khz,
        })
    }

    /// Program the clock divider for at most `khz`, returns the frequency actually used.
    fn set_clock(&self, khz: u32, width: BusWidth) -> u32 {
        let div = clock_divider(self.kernel_hz, khz);
        let widbus = match width {
            BusWidth::One => 0,
            BusWidth::Four => CLKCR_WIDBUS_4,
        };
        unsafe {
            self.sdmmc
                .clkcr
                .write(|w| w.bits(u32::from(div) | CLKCR_CLKEN | widbus));
        }
        bus_khz(self.kernel_hz, div)
    }

    /// Send a command and wait for its response. Returns RESP1 (zero for no response).
    fn send_cmd(&self, index: u8, arg: u32, response: Response) -> Result<u32, SdmmcError> {
        let waitresp = match response {
            Response::None => 0,
            Response::Short | Response::ShortNoCrc => CMD_WAITRESP_SHORT,
            Response::Long => CMD_WAITRESP_LONG,
        };

        unsafe {
            self.sdmmc.icr.write(|w| w.bits(ICR_STATIC));
            self.sdmmc.arg.write(|w| w.bits(arg));
            self.sdmmc
                .cmd
                .write(|w| w.bits(u32::from(index) | waitresp | CMD_CPSMEN));
        }

        let done = match response {
            Response::None => STA_CMDSENT,
            _ => STA_CMDREND | STA_CCRCFAIL | STA_CTIMEOUT,
        };

        let mut cnt = 0;
        let status = loop {
            let status = self.sdmmc.sta.read().bits();
            if status & done != 0 {
                break status;
            }
            cnt += 1;
            if cnt == CMD_TIMEOUT {
                return Err(SdmmcError::CmdTimeout(index));
            }
        };

        unsafe {
            self.sdmmc.icr.write(|w| w.bits(ICR_STATIC));
        }

        if status & STA_CTIMEOUT != 0 {
            return Err(SdmmcError::CmdTimeout(index));
        }
        if status & STA_CCRCFAIL != 0 && response != Response::ShortNoCrc {
            return Err(SdmmcError::CmdCrc(index));
        }

        Ok(self.sdmmc.resp1.read().bits())
    }

    /// The four response words of the last long response, most significant first.
    fn long_response(&self) -> [u32; 4] {
        [
            self.sdmmc.resp1.read().bits(),
            self.sdmmc.resp2.read().bits(),
            self.sdmmc.resp3.read().bits(),
            self.sdmmc.resp4.read().bits(),
        ]
    }

    /// Poll CMD13 until the card is back in the transfer state.
    fn wait_ready(&self) -> Result<(), SdmmcError> {
        let rca_arg = u32::from(self.rca) << 16;
        for _ in 0..BUSY_TRIES {
            let status = self.send_cmd(Cmd::SEND_STATUS, rca_arg, Response::Short)?;
            if (status >> 9) & 0xF == R1_STATE_TRAN {
                return Ok(());
            }
        }
        Err(SdmmcError::BusyTimeout)
    }

    /// Card address of block `lba`.
    fn address(&self, lba: u32) -> u32 {
        if self.block_addressed {
            lba
        } else {
            lba * BLOCK_SIZE
        }
    }

    fn setup_data(&self, read: bool) {
        let dir = if read { DCTRL_DTDIR_READ } else { 0 };
        unsafe {
            self.sdmmc.dtimer.write(|w| w.bits(0xFFFF_FFFF));
            self.sdmmc.dlen.write(|w| w.bits(BLOCK_SIZE));
            self.sdmmc
                .dctrl
                .write(|w| w.bits(DCTRL_DTEN | dir | DCTRL_BLOCK_512));
        }
    }

    fn data_error(status: u32) -> Option<SdmmcError> {
        if status & STA_DTIMEOUT != 0 {
            Some(SdmmcError::DataTimeout)
        } else if status & STA_DCRCFAIL != 0 {
            Some(SdmmcError::DataCrc)
        } else if status & STA_RXOVERR != 0 {
            Some(SdmmcError::RxOverrun)
        } else if status & STA_TXUNDERR != 0 {
            Some(SdmmcError::TxUnderrun)
        } else {
            None
        }
    }

    /// Polling single block read.
    fn read_block(&self, lba: u32, buf: &mut [u8; 512]) -> Result<(), SdmmcError> {
        self.setup_data(true);
        self.send_cmd(Cmd::READ_SINGLE_BLOCK, self.address(lba), Response::Short)?;

        let mut idx = 0;
        let mut cnt = 0;
        loop {
            let status = self.sdmmc.sta.read().bits();
            if let Some(e) = Self::data_error(status) {
                return Err(e);
            }
            if status & STA_RXDAVL != 0 && idx < buf.len() {
                // Unpack the word
                let word = self.sdmmc.fifo.read().bits();
                buf[idx..idx + 4].copy_from_slice(&word.to_le_bytes());
                idx += 4;
            } else if status & STA_DBCKEND != 0 && idx == buf.len() {
                break;
            } else {
                cnt += 1;
                if cnt == DATA_TIMEOUT {
                    return Err(SdmmcError::DataTimeout);
                }
            }
        }

        unsafe {
            self.sdmmc.icr.write(|w| w.bits(ICR_STATIC));
        }
        Ok(())
    }

    /// Polling single block write, waits for the card to finish programming.
    fn write_block(&self, lba: u32, buf: &[u8; 512]) -> Result<(), SdmmcError> {
        self.send_cmd(Cmd::WRITE_BLOCK, self.address(lba), Response::Short)?;
        self.setup_data(false);

        let mut idx = 0;
        let mut cnt = 0;
        loop {
            let status = self.sdmmc.sta.read().bits();
            if let Some(e) = Self::data_error(status) {
                return Err(e);
            }
            if status & STA_TXFIFOHE != 0 && idx < buf.len() {
                // Half of the FIFO is 8 words
                for _ in 0..8 {
                    let mut word = [0u8; 4];
                    word.copy_from_slice(&buf[idx..idx + 4]);
                    unsafe {
                        self.sdmmc
                            .fifo
                            .write(|w| w.bits(u32::from_le_bytes(word)));
                    }
                    idx += 4;
                }
            } else if status & STA_DBCKEND != 0 {
                break;
            } else {
                cnt += 1;
                if cnt == DATA_TIMEOUT {
                    return Err(SdmmcError::DataTimeout);
                }
            }
        }

        unsafe {
            self.sdmmc.icr.write(|w| w.bits(ICR_STATIC));
        }
        self.wait_ready()
    }
}

impl BlockDevice for SdmmcDriver {
    type Error = SdmmcError;

    fn read(
        &self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        _reason: &str,
    ) -> Result<(), SdmmcError> {
        if !self.initialized {
            return Err(SdmmcError::NotInitialized);
        }
        for (i, block) in blocks.iter_mut().enumerate() {
            self.read_block(start_block_idx.0 + i as u32, &mut block.contents)?;
        }
        Ok(())
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), SdmmcError> {
        if !self.initialized {
            return Err(SdmmcError::NotInitialized);
        }
        for (i, block) in blocks.iter().enumerate() {
            self.write_block(start_block_idx.0 + i as u32, &block.contents)?;
        }
        Ok(())
    }

    fn num_blocks(&self) -> Result<BlockCount, SdmmcError> {
        Ok(BlockCount(self.num_blocks))
    }
}

/// Product name (PNM) from the CID register.
fn cid_name(cid: &[u32; 4]) -> String<heapless::consts::U8> {
    let bytes = [
        cid[0] as u8,
        (cid[1] >> 24) as u8,
        (cid[1] >> 16) as u8,
        (cid[1] >> 8) as u8,
        cid[1] as u8,
    ];
    let mut name = String::new();
    for &b in bytes.iter().filter(|b| b.is_ascii_graphic()) {
        let _ = name.push(b as char);
    }
    name
}

/// Card capacity in bytes from the CSD register, version 1 and 2 layouts.
fn csd_capacity(csd: &[u32; 4]) -> u64 {
    match csd[0] >> 30 {
        // CSD 2.0: C_SIZE [69:48], (C_SIZE + 1) * 512 KiB
        1 => {
            let c_size = ((csd[1] & 0x3F) << 16) | (csd[2] >> 16);
            (u64::from(c_size) + 1) * 512 * 1024
        }
        // CSD 1.0: C_SIZE [73:62], C_SIZE_MULT [49:47], READ_BL_LEN [83:80]
        _ => {
            let read_bl_len = (csd[1] >> 16) & 0xF;
            let c_size = ((csd[1] & 0x3FF) << 2) | (csd[2] >> 30);
            let c_size_mult = (csd[2] >> 15) & 0x7;
            (u64::from(c_size) + 1) << (c_size_mult + 2 + read_bl_len)
        }
    }
}
