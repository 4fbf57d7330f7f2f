//! `CameraDriver` for the OV2640 on the camera connector: SCCB control over I2C1, pixels over
//! DCMI, frame buffers in SDRAM.

use super::dcmi::{self, DcmiError};
use crate::camera::{jpeg_len, CameraDriver, Frame};
use crate::config::{CameraConfig, FrameBufferLocation, GrabMode, PixelFormat};
use crate::frame_pool::{FramePool, PoolError};
use crate::ov2640::{Ov2640, Ov2640Error};
use core::fmt;
use embedded_hal::blocking::{delay::DelayMs, i2c};

/// Polling iterations before a snapshot counts as lost. About a second at 216 MHz.
const FRAME_TIMEOUT: u32 = 20_000_000;

/// Board camera errors.
#[derive(Debug)]
pub enum BoardCameraError<E> {
    Sensor(Ov2640Error<E>),
    Pool(PoolError),
    /// Frame buffers only fit in external SDRAM on this board.
    FbLocation(FrameBufferLocation),
}

impl<E> From<Ov2640Error<E>> for BoardCameraError<E> {
    fn from(e: Ov2640Error<E>) -> Self {
        BoardCameraError::Sensor(e)
    }
}

impl<E> From<PoolError> for BoardCameraError<E> {
    fn from(e: PoolError) -> Self {
        BoardCameraError::Pool(e)
    }
}

/// A JPEG frame sitting in an SDRAM slot.
pub struct SdramFrame {
    slot: usize,
    data: &'static [u8],
    width: u16,
    height: u16,
}

impl Frame for SdramFrame {
    fn data(&self) -> &[u8] {
        self.data
    }

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Jpeg
    }
}

/// Handle for the camera.
pub struct BoardCamera<I2C, D> {
    sensor: Ov2640<I2C>,
    delay: D,
    /// SDRAM region handed over by `sdram::init`.
    ram_base: u32,
    ram_size: usize,
    pool: Option<FramePool>,
    grab_mode: GrabMode,
    dimensions: (u16, u16),
}

impl<I2C, D, E> BoardCamera<I2C, D>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    E: fmt::Debug,
    D: DelayMs<u32>,
{
    pub fn new(i2c: I2C, delay: D, ram_base: *mut u32, ram_size: usize) -> Self {
        BoardCamera {
            sensor: Ov2640::new(i2c),
            delay,
            ram_base: ram_base as u32,
            ram_size,
            pool: None,
            grab_mode: GrabMode::Latest,
            dimensions: (0, 0),
        }
    }

    /// Snapshot one frame into a free slot and mark it filled.
    fn fill_slot(&mut self, pool: &mut FramePool) -> Result<(), DcmiError> {
        let slot = pool
            .next_slot(self.grab_mode)
            .ok_or(DcmiError::BufferFull)?;
        let words = (pool.slot_size() / 4).min(dcmi::MAX_WORDS) as u16;

        dcmi::start_snapshot(pool.addr(slot), words);
        let bytes = dcmi::wait_frame(words, FRAME_TIMEOUT)?;

        // The DMA moves whole words, trim back to the end of the JPEG stream
        let raw = unsafe { core::slice::from_raw_parts(pool.addr(slot) as *const u8, bytes) };
        let len = jpeg_len(raw).unwrap_or(0);

        // Only fails for a lent slot, which `next_slot` never returns
        let _ = pool.mark_filled(slot, len);
        Ok(())
    }
}

impl<I2C, D, E> CameraDriver for BoardCamera<I2C, D>
where
    I2C: i2c::Read<Error = E> + i2c::Write<Error = E>,
    E: fmt::Debug,
    D: DelayMs<u32>,
{
    type Error = BoardCameraError<E>;
    type Frame = SdramFrame;
    type Sensor = Ov2640<I2C>;

    fn init(&mut self, config: &CameraConfig) -> Result<(), Self::Error> {
        self.pool = None;

        if config.fb_location != FrameBufferLocation::External {
            return Err(BoardCameraError::FbLocation(config.fb_location));
        }

        let slot_size = (self.ram_size / config.fb_count).min(dcmi::MAX_WORDS * 4) & !0x3;
        let pool = FramePool::new(self.ram_base, self.ram_size, slot_size, config.fb_count)?;

        self.sensor.init(config, &mut self.delay)?;
        dcmi::setup();

        self.grab_mode = config.grab_mode;
        self.dimensions = config.frame_size.dimensions();
        self.pool = Some(pool);
        Ok(())
    }

    fn fb_get(&mut self) -> Option<SdramFrame> {
        let mut pool = self.pool.take()?;

        let result = match self.fill_slot(&mut pool) {
            Ok(()) => pool.take(self.grab_mode),
            Err(e) => {
                log_error!("Camera", "Frame capture failed ({:?})", e);
                None
            }
        };

        let frame = result.map(|(slot, len)| SdramFrame {
            slot,
            data: unsafe { core::slice::from_raw_parts(pool.addr(slot) as *const u8, len) },
            width: self.dimensions.0,
            height: self.dimensions.1,
        });

        self.pool = Some(pool);
        frame
    }

    fn fb_return(&mut self, frame: SdramFrame) {
        if let Some(pool) = self.pool.as_mut() {
            if let Err(e) = pool.give_back(frame.slot) {
                log_warn!("Camera", "Frame buffer {} returned twice ({:?})", frame.slot, e);
            }
        }
    }

    fn sensor(&mut self) -> Option<&mut Ov2640<I2C>> {
        if self.pool.is_some() {
            Some(&mut self.sensor)
        } else {
            None
        }
    }
}
