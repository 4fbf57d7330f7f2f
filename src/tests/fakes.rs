//! In-memory stand-ins for the hardware, with switches to make each one fail.

use crate::camera::{CameraDriver, Frame};
use crate::config::{
    CameraConfig, Level, MountConfig, PinId, PixelFormat, Pull, SdHostConfig, SdSlotConfig,
    SpecialEffect,
};
use crate::sensor::{check_range, Sensor, SensorError};
use crate::storage::{CardInfo, CardKind, Storage, StorageError};
use embedded_hal::blocking::{delay::DelayMs, i2c};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use std::collections::{BTreeMap, VecDeque};
use std::string::String;
use std::vec::Vec;

/// Register file of an OV2640 behind an I2C bus. A one byte write sets the read pointer, a
/// two byte write stores a value in the selected bank, and writing 0xFF switches banks.
pub struct FakeI2c {
    pub dsp: [u8; 256],
    pub sensor: [u8; 256],
    /// 0 = DSP, 1 = sensor
    pub bank: u8,
    pointer: u8,
    /// Every write, in order.
    pub writes: Vec<Vec<u8>>,
    /// Fail every transaction.
    pub nack: bool,
}

impl FakeI2c {
    pub fn ov2640() -> Self {
        let mut sensor = [0u8; 256];
        sensor[0x1C] = 0x7F;
        sensor[0x1D] = 0xA2;
        sensor[0x0A] = 0x26;
        FakeI2c {
            dsp: [0; 256],
            sensor,
            bank: 0,
            pointer: 0,
            writes: Vec::new(),
            nack: false,
        }
    }

    fn selected(&mut self) -> &mut [u8; 256] {
        if self.bank == 0 {
            &mut self.dsp
        } else {
            &mut self.sensor
        }
    }
}

impl i2c::Write for FakeI2c {
    type Error = ();

    fn write(&mut self, _address: u8, bytes: &[u8]) -> Result<(), ()> {
        if self.nack {
            return Err(());
        }
        self.writes.push(bytes.to_vec());
        match *bytes {
            [reg] => self.pointer = reg,
            [0xFF, val] => self.bank = val & 0x01,
            [reg, val] => {
                self.pointer = reg;
                self.selected()[reg as usize] = val;
            }
            _ => return Err(()),
        }
        Ok(())
    }
}

impl i2c::Read for FakeI2c {
    type Error = ();

    fn read(&mut self, _address: u8, buffer: &mut [u8]) -> Result<(), ()> {
        if self.nack {
            return Err(());
        }
        let pointer = self.pointer as usize;
        let value = self.selected()[pointer];
        for b in buffer.iter_mut() {
            *b = value;
        }
        Ok(())
    }
}

/// Delay that only adds up how long it was asked to wait.
#[derive(Default)]
pub struct FakeDelay {
    pub total_ms: u32,
}

impl DelayMs<u32> for FakeDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

/// Sensor that remembers the last value of each required control.
#[derive(Default)]
pub struct FakeSensor {
    pub brightness: Option<Level>,
    pub contrast: Option<Level>,
    pub saturation: Option<Level>,
    pub effect: Option<SpecialEffect>,
    pub whitebal: Option<bool>,
    pub hmirror: Option<bool>,
    pub fail_contrast: bool,
}

fn level(value: Level) -> Result<Option<Level>, SensorError<()>> {
    check_range::<()>(value.into(), -2, 2)?;
    Ok(Some(value))
}

impl Sensor for FakeSensor {
    type Error = ();

    fn set_brightness(&mut self, value: Level) -> Result<(), SensorError<()>> {
        self.brightness = level(value)?;
        Ok(())
    }

    fn set_contrast(&mut self, value: Level) -> Result<(), SensorError<()>> {
        if self.fail_contrast {
            return Err(SensorError::Bus(()));
        }
        self.contrast = level(value)?;
        Ok(())
    }

    fn set_saturation(&mut self, value: Level) -> Result<(), SensorError<()>> {
        self.saturation = level(value)?;
        Ok(())
    }

    fn set_special_effect(&mut self, effect: SpecialEffect) -> Result<(), SensorError<()>> {
        self.effect = Some(effect);
        Ok(())
    }

    fn set_whitebal(&mut self, enable: bool) -> Result<(), SensorError<()>> {
        self.whitebal = Some(enable);
        Ok(())
    }

    fn set_hmirror(&mut self, enable: bool) -> Result<(), SensorError<()>> {
        self.hmirror = Some(enable);
        Ok(())
    }
}

pub struct FakeFrame(Vec<u8>);

impl Frame for FakeFrame {
    fn data(&self) -> &[u8] {
        &self.0
    }

    fn width(&self) -> u16 {
        800
    }

    fn height(&self) -> u16 {
        600
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Jpeg
    }
}

/// Camera that hands out a queue of canned frames and counts acquire/release calls.
pub struct FakeCamera {
    frames: VecDeque<Vec<u8>>,
    initialized: bool,
    pub sensor: FakeSensor,
    pub init_calls: usize,
    pub fail_init: bool,
    pub acquired: usize,
    pub released: usize,
}

impl FakeCamera {
    pub fn with_frames<T: AsRef<[u8]>>(frames: &[T]) -> Self {
        FakeCamera {
            frames: frames.iter().map(|f| f.as_ref().to_vec()).collect(),
            initialized: false,
            sensor: FakeSensor::default(),
            init_calls: 0,
            fail_init: false,
            acquired: 0,
            released: 0,
        }
    }

    pub fn empty() -> Self {
        Self::with_frames::<&[u8]>(&[])
    }
}

impl CameraDriver for FakeCamera {
    type Error = i32;
    type Frame = FakeFrame;
    type Sensor = FakeSensor;

    fn init(&mut self, _config: &CameraConfig) -> Result<(), i32> {
        self.init_calls += 1;
        if self.fail_init {
            return Err(0x105);
        }
        self.initialized = true;
        Ok(())
    }

    fn fb_get(&mut self) -> Option<FakeFrame> {
        let data = self.frames.pop_front()?;
        self.acquired += 1;
        Some(FakeFrame(data))
    }

    fn fb_return(&mut self, _frame: FakeFrame) {
        self.released += 1;
    }

    fn sensor(&mut self) -> Option<&mut FakeSensor> {
        if self.initialized {
            Some(&mut self.sensor)
        } else {
            None
        }
    }
}

/// Card and filesystem kept in a map from path to contents.
#[derive(Default)]
pub struct FakeStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    pub pulls: Vec<(PinId, Pull)>,
    pub mounted: bool,
    pub mount_calls: usize,
    pub open_files: usize,
    pub fail_mount: bool,
    pub fail_write: bool,
    /// Accept at most this many bytes per write.
    pub write_limit: Option<usize>,
}

pub struct FakeFile(String);

impl Storage for FakeStorage {
    type Error = StorageError<()>;
    type File = FakeFile;

    fn set_pull(&mut self, pin: PinId, pull: Pull) -> Result<(), Self::Error> {
        self.pulls.push((pin, pull));
        Ok(())
    }

    fn mount(
        &mut self,
        host: &SdHostConfig,
        _slot: &SdSlotConfig,
        _mount: &MountConfig,
    ) -> Result<CardInfo, Self::Error> {
        self.mount_calls += 1;
        if self.fail_mount {
            return Err(StorageError::NoCard);
        }
        self.mounted = true;
        Ok(CardInfo {
            name: heapless::String::from("FAKE"),
            kind: CardKind::Sdhc,
            capacity_bytes: 1 << 30,
            bus_width: host.bus_width,
            freq_khz: host.max_freq_khz,
        })
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn open_write(&mut self, path: &str) -> Result<FakeFile, Self::Error> {
        if !self.mounted {
            return Err(StorageError::NotMounted);
        }
        self.files.insert(path.to_string(), Vec::new());
        self.open_files += 1;
        Ok(FakeFile(path.to_string()))
    }

    fn write(&mut self, file: &mut FakeFile, data: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_write {
            return Err(StorageError::Device(()));
        }
        let n = self.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.files
            .get_mut(&file.0)
            .ok_or(StorageError::BadPath)?
            .extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn close(&mut self, _file: FakeFile) -> Result<(), Self::Error> {
        self.open_files -= 1;
        Ok(())
    }
}

/// GPIO pin for both directions. Output writes land in `history`, input reads `level`.
#[derive(Default)]
pub struct FakePin {
    pub level: bool,
    pub history: Vec<bool>,
    pub fail: bool,
}

impl FakePin {
    fn drive(&mut self, high: bool) -> Result<(), ()> {
        if self.fail {
            return Err(());
        }
        self.level = high;
        self.history.push(high);
        Ok(())
    }
}

impl OutputPin for FakePin {
    type Error = ();

    fn set_low(&mut self) -> Result<(), ()> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), ()> {
        self.drive(true)
    }
}

impl InputPin for FakePin {
    type Error = ();

    fn is_high(&self) -> Result<bool, ()> {
        if self.fail {
            Err(())
        } else {
            Ok(self.level)
        }
    }

    fn is_low(&self) -> Result<bool, ()> {
        self.is_high().map(|high| !high)
    }
}
