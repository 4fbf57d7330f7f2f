//! Compile-time configuration for the camera, the SD card, the sensor and the status LED.
//!
//! Nothing here changes at runtime. The records are `const` values that get passed by
//! reference into the init calls, so tests can build their own variants.

use core::fmt;

/// A GPIO pin identified by port letter and pin number, e.g. `PinId::new('C', 8)` is PC8.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PinId {
    pub port: char,
    pub pin: u8,
}

impl PinId {
    pub const fn new(port: char, pin: u8) -> Self {
        PinId { port, pin }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port, self.pin)
    }
}

/// Pixel encoding produced by the image sensor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Jpeg,
    Rgb565,
    Yuv422,
    Grayscale,
}

/// Output resolution class.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameSize {
    /// 160x120
    Qqvga,
    /// 320x240
    Qvga,
    /// 400x296
    Cif,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
}

impl FrameSize {
    /// Width and height in pixels.
    pub const fn dimensions(self) -> (u16, u16) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
        }
    }
}

/// Where the camera driver allocates its frame buffers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FrameBufferLocation {
    /// On-chip SRAM
    Internal,
    /// External RAM (SDRAM on this board)
    External,
}

/// Which frame the driver hands out when more than one buffer is filled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrabMode {
    /// Fill a buffer only when one is free, hand out the oldest.
    WhenEmpty,
    /// Always hand out the most recently filled buffer.
    Latest,
}

/// Camera connector wiring. Pins that are not wired (power down, reset) are `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CameraPins {
    pub pwdn: Option<PinId>,
    pub reset: Option<PinId>,
    /// `None` when XCLK comes from an oscillator rather than an MCU pin.
    pub xclk: Option<PinId>,
    pub sccb_sda: PinId,
    pub sccb_scl: PinId,
    /// DCMI data lines D0..D7 (sensor Y2..Y9).
    pub data: [PinId; 8],
    pub vsync: PinId,
    pub href: PinId,
    pub pclk: PinId,
}

/// Everything the camera driver needs to bring up the sensor and the pixel bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CameraConfig {
    pub pins: CameraPins,
    pub xclk_freq_hz: u32,
    pub pixel_format: PixelFormat,
    pub frame_size: FrameSize,
    /// 0..=63, lower means higher quality.
    pub jpeg_quality: u8,
    pub fb_count: usize,
    pub fb_location: FrameBufferLocation,
    pub grab_mode: GrabMode,
}

/// Highest JPEG quality value the sensor accepts.
pub const JPEG_QUALITY_MAX: u8 = 63;

/// SD bus width.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BusWidth {
    One,
    Four,
}

impl BusWidth {
    pub const fn lines(self) -> u8 {
        match self {
            BusWidth::One => 1,
            BusWidth::Four => 4,
        }
    }
}

/// SD host controller settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SdHostConfig {
    pub bus_width: BusWidth,
    /// Clock used during card identification.
    pub init_freq_khz: u32,
    /// Clock used for data transfer once the card is selected.
    pub max_freq_khz: u32,
}

/// Internal bias applied to a signal line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// SD slot wiring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SdSlotConfig {
    pub width: BusWidth,
    pub clk: PinId,
    pub cmd: PinId,
    pub d0: PinId,
    /// Bias for CLK, CMD and D0. The lines float without it and the card glitches.
    pub pull: Pull,
}

impl SdSlotConfig {
    /// The three signal lines that get the pull configuration.
    pub const fn signal_pins(&self) -> [PinId; 3] {
        [self.clk, self.cmd, self.d0]
    }
}

/// FAT mount settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MountConfig {
    /// Path prefix every file path must start with, e.g. `/sdcard`.
    pub base_path: &'static str,
    /// Never format a card that fails to mount.
    pub format_if_mount_failed: bool,
    /// Ceiling on simultaneously open files.
    pub max_files: usize,
    /// Cluster size used if the card ever gets formatted.
    pub allocation_unit_size: u32,
}

/// Brightness, contrast and saturation level (-2..=2).
pub type Level = i8;

/// Colour effect applied by the sensor DSP.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SpecialEffect {
    None,
    Negative,
    Grayscale,
    RedTint,
    GreenTint,
    BlueTint,
    Sepia,
}

/// Manual white balance preset, only used when AWB gain is enabled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WbMode {
    Auto,
    Sunny,
    Cloudy,
    Office,
    Home,
}

/// Image quality parameters pushed to the sensor after init. The first five are always
/// written, the rest only when `Some`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorSettings {
    pub brightness: Level,
    pub contrast: Level,
    pub saturation: Level,
    pub special_effect: SpecialEffect,
    pub whitebal: bool,

    pub awb_gain: Option<bool>,
    pub wb_mode: Option<WbMode>,
    pub exposure_ctrl: Option<bool>,
    pub aec2: Option<bool>,
    /// -2..=2
    pub ae_level: Option<Level>,
    /// 0..=1200
    pub aec_value: Option<u16>,
    pub gain_ctrl: Option<bool>,
    /// 0..=30
    pub agc_gain: Option<u8>,
    /// 0..=6, i.e. 2x..128x
    pub gainceiling: Option<u8>,
    pub bpc: Option<bool>,
    pub wpc: Option<bool>,
    pub raw_gma: Option<bool>,
    pub lenc: Option<bool>,
    pub hmirror: Option<bool>,
    pub vflip: Option<bool>,
    pub dcw: Option<bool>,
    pub colorbar: Option<bool>,
}

impl SensorSettings {
    /// Neutral image, no effect, automatic white balance on.
    pub const fn neutral() -> Self {
        SensorSettings {
            brightness: 0,
            contrast: 0,
            saturation: 0,
            special_effect: SpecialEffect::None,
            whitebal: true,
            awb_gain: None,
            wb_mode: None,
            exposure_ctrl: None,
            aec2: None,
            ae_level: None,
            aec_value: None,
            gain_ctrl: None,
            agc_gain: None,
            gainceiling: None,
            bpc: None,
            wpc: None,
            raw_gma: None,
            lenc: None,
            hmirror: None,
            vflip: None,
            dcw: None,
            colorbar: None,
        }
    }
}

/// Status LED wiring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndicatorConfig {
    pub pin: PinId,
    /// Drive high to light the LED.
    pub active_high: bool,
}

/// Capture button wiring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ButtonConfig {
    pub pin: PinId,
    /// Pressed reads low.
    pub active_low: bool,
}

/// Output naming and failure behaviour of the capture routine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    pub file_prefix: &'static str,
    pub file_extension: &'static str,
    /// Zero padded width of the index in the file name.
    pub index_width: usize,
    pub first_index: u16,
    /// Bump the index after every saved image. Off: every capture rewrites the same file.
    /// The index stops at the largest value that fits in `index_width` digits and the last
    /// file is rewritten from then on.
    pub advance_index: bool,
    /// Turn the LED off again when a capture fails part way.
    pub restore_indicator_on_failure: bool,
}

/// Pin assignments for the OV2640 on the STM32F746G Discovery Board camera connector.
pub const CAMERA_PINS: CameraPins = CameraPins {
    pwdn: None,
    reset: None,
    xclk: None,
    sccb_sda: PinId::new('B', 9),
    sccb_scl: PinId::new('B', 8),
    data: [
        PinId::new('H', 9),
        PinId::new('H', 10),
        PinId::new('H', 11),
        PinId::new('H', 12),
        PinId::new('H', 14),
        PinId::new('D', 3),
        PinId::new('E', 5),
        PinId::new('E', 6),
    ],
    vsync: PinId::new('G', 9),
    href: PinId::new('A', 4),
    pclk: PinId::new('A', 6),
};

#[cfg(feature = "uxga")]
const FRAME_SIZE: FrameSize = FrameSize::Uxga;

#[cfg(all(feature = "vga", not(feature = "uxga")))]
const FRAME_SIZE: FrameSize = FrameSize::Vga;

#[cfg(feature = "svga")]
const FRAME_SIZE: FrameSize = FrameSize::Svga;

pub const CAMERA: CameraConfig = CameraConfig {
    pins: CAMERA_PINS,
    // On-board 24 MHz oscillator
    xclk_freq_hz: 24_000_000,
    pixel_format: PixelFormat::Jpeg,
    frame_size: FRAME_SIZE,
    jpeg_quality: 2,
    fb_count: 2,
    fb_location: FrameBufferLocation::External,
    grab_mode: GrabMode::Latest,
};

/// Only three SD lines are routed, so the bus runs 1 bit wide.
pub const SD_HOST: SdHostConfig = SdHostConfig {
    bus_width: BusWidth::One,
    init_freq_khz: 400,
    max_freq_khz: 24_000,
};

pub const SD_SLOT: SdSlotConfig = SdSlotConfig {
    width: BusWidth::One,
    clk: PinId::new('C', 12),
    cmd: PinId::new('D', 2),
    d0: PinId::new('C', 8),
    pull: Pull::Up,
};

pub const MOUNT: MountConfig = MountConfig {
    base_path: "/sdcard",
    format_if_mount_failed: false,
    max_files: 5,
    allocation_unit_size: 100 * 1024 * 1024,
};

pub const SENSOR: SensorSettings = SensorSettings::neutral();

/// User LED LD1
pub const INDICATOR: IndicatorConfig = IndicatorConfig {
    pin: PinId::new('I', 1),
    active_high: true,
};

/// User push button B1
pub const BUTTON: ButtonConfig = ButtonConfig {
    pin: PinId::new('I', 11),
    active_low: false,
};

impl CaptureConfig {
    /// Largest index that still fits in `index_width` digits.
    pub fn max_index(&self) -> u16 {
        let limit = 10u32.saturating_pow(self.index_width as u32).saturating_sub(1);
        limit.min(u32::from(u16::MAX)) as u16
    }
}

pub const CAPTURE: CaptureConfig = CaptureConfig {
    file_prefix: "image_",
    file_extension: "jpg",
    index_width: 3,
    first_index: 0,
    advance_index: false,
    restore_indicator_on_failure: false,
};

/// Time given to automatic white balance before the first capture.
pub const SETTLE_DELAY_MS: u32 = 1000;

/// Button sampling period in continuous mode.
pub const BUTTON_POLL_MS: u32 = 10;
