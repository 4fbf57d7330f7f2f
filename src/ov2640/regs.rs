//! OV2640 register tables. Values come from the OmniVision application notes and the
//! register dumps used by common OV2640 JPEG modules.

use super::sccb::{RegTable, Register};

/// Common sensor and DSP setup, leaves the DSP bank selected.
pub const COMMON_INIT: &RegTable = &[
    (0xFF, 0x00),
    (0x2C, 0xFF),
    (0x2E, 0xDF),
    (0xFF, 0x01),
    (0x3C, 0x32),
    // Clock prescaler off, PCLK = XCLK
    (0x11, 0x00),
    // Output drive 2x
    (0x09, 0x02),
    (0x04, 0x28),
    // AGC, AEC and banding filter on
    (0x13, 0xE5),
    (0x14, 0x48),
    (0x2C, 0x0C),
    (0x33, 0x78),
    (0x3A, 0x33),
    (0x3B, 0xFB),
    (0x3E, 0x00),
    (0x43, 0x11),
    (0x16, 0x10),
    (0x39, 0x92),
    (0x35, 0xDA),
    (0x22, 0x1A),
    (0x37, 0xC3),
    (0x23, 0x00),
    (0x34, 0xC0),
    (0x36, 0x1A),
    (0x06, 0x88),
    (0x07, 0xC0),
    (0x0D, 0x87),
    (0x0E, 0x41),
    (0x4C, 0x00),
    (0x48, 0x00),
    (0x5B, 0x00),
    (0x42, 0x03),
    (0x4A, 0x81),
    (0x21, 0x99),
    // AEC window
    (0x24, 0x48),
    (0x25, 0x40),
    (0x26, 0x81),
    (0x5C, 0x00),
    (0x63, 0x00),
    (0x61, 0x70),
    (0x62, 0x80),
    (0x7C, 0x05),
    (0x20, 0x80),
    (0x28, 0x30),
    (0x6C, 0x00),
    (0x6D, 0x80),
    (0x6E, 0x00),
    (0x70, 0x02),
    (0x71, 0x94),
    (0x73, 0xC1),
    (0x3D, 0x34),
    (0x5A, 0x57),
    (0x4F, 0xBB),
    (0x50, 0x9C),
    (0xFF, 0x00),
    (0xE5, 0x7F),
    (0xF9, 0xC0),
    (0x41, 0x24),
    // Hold DVP and JPEG blocks in reset while the DSP is set up
    (0xE0, 0x14),
    (0x76, 0xFF),
    (0x33, 0xA0),
    (0x42, 0x20),
    (0x43, 0x18),
    (0x4C, 0x00),
    // CTRL3: BPC and WPC on
    (0x87, 0xD5),
    (0x88, 0x3F),
    (0xD7, 0x03),
    (0xD9, 0x10),
    (0xD3, 0x82),
    (0xC8, 0x08),
    (0xC9, 0x80),
    // Special digital effects block
    (0x7C, 0x00),
    (0x7D, 0x00),
    (0x7C, 0x03),
    (0x7D, 0x48),
    (0x7D, 0x48),
    (0x7C, 0x08),
    (0x7D, 0x20),
    (0x7D, 0x10),
    (0x7D, 0x0E),
    // Gamma curve
    (0x90, 0x00),
    (0x91, 0x0E),
    (0x91, 0x1A),
    (0x91, 0x31),
    (0x91, 0x5A),
    (0x91, 0x69),
    (0x91, 0x75),
    (0x91, 0x7E),
    (0x91, 0x88),
    (0x91, 0x8F),
    (0x91, 0x96),
    (0x91, 0xA3),
    (0x91, 0xAF),
    (0x91, 0xC4),
    (0x91, 0xD7),
    (0x91, 0xE8),
    (0x91, 0x20),
    // Colour matrix
    (0x92, 0x00),
    (0x93, 0x06),
    (0x93, 0xE3),
    (0x93, 0x05),
    (0x93, 0x05),
    (0x93, 0x00),
    (0x93, 0x04),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x93, 0x00),
    (0x96, 0x00),
    (0x97, 0x08),
    (0x97, 0x19),
    (0x97, 0x02),
    (0x97, 0x0C),
    (0x97, 0x24),
    (0x97, 0x30),
    (0x97, 0x28),
    (0x97, 0x26),
    (0x97, 0x02),
    (0x97, 0x98),
    (0x97, 0x80),
    (0x97, 0x00),
    (0x97, 0x00),
    // CTRL1: AWB, AWB gain, lens correction, raw gamma on
    (0xC3, 0xED),
    (0xA4, 0x00),
    (0xA8, 0x00),
    // AWB tuning
    (0xC5, 0x11),
    (0xC6, 0x51),
    (0xBF, 0x80),
    (0xC7, 0x10),
    (0xB6, 0x66),
    (0xB8, 0xA5),
    (0xB7, 0x64),
    (0xB9, 0x7C),
    (0xB3, 0xAF),
    (0xB4, 0x97),
    (0xB5, 0xFF),
    (0xB0, 0xC5),
    (0xB1, 0x94),
    (0xB2, 0x0F),
    (0xC4, 0x5C),
    (0xA6, 0x00),
    (0xA7, 0x20),
    (0xA7, 0xD8),
    (0xA7, 0x1B),
    (0xA7, 0x31),
    (0xA7, 0x00),
    (0xA7, 0x18),
    (0xA7, 0x20),
    (0xA7, 0xD8),
    (0xA7, 0x19),
    (0xA7, 0x31),
    (0xA7, 0x00),
    (0xA7, 0x18),
    (0xA7, 0x20),
    (0xA7, 0xD8),
    (0xA7, 0x19),
    (0xA7, 0x31),
    (0xA7, 0x00),
    (0xA7, 0x18),
    (0x7F, 0x00),
    (0xE5, 0x1F),
    (0xE1, 0x77),
    (0xDD, 0x7F),
    // Release the DSP reset
    (0xE0, 0x00),
];

/// Sensor window for UXGA (1600x1200 native).
pub const UXGA_WINDOW: &RegTable = &[
    (0xFF, 0x01),
    (0x12, 0x00),
    (0x03, 0x0F),
    (0x17, 0x11),
    (0x18, 0x75),
    (0x19, 0x01),
    (0x1A, 0x97),
    (0x32, 0x36),
    (0x37, 0x40),
    (0x4F, 0xBB),
    (0x50, 0x9C),
    (0x5A, 0x57),
    (0x6D, 0x80),
    (0x3D, 0x34),
    (0x39, 0x02),
    (0x35, 0x88),
    (0x22, 0x0A),
    (0x34, 0xA0),
    (0x06, 0x02),
    (0x0D, 0xB7),
    (0x0E, 0x01),
    (0xFF, 0x00),
    (0xE0, 0x04),
    (0xC0, 0xC8),
    (0xC1, 0x96),
    (0x86, 0x3D),
    (0x50, 0x00),
    (0x51, 0x90),
    (0x52, 0x2C),
    (0x53, 0x00),
    (0x54, 0x00),
    (0x55, 0x88),
    (0x57, 0x00),
    (0xD3, 0x02),
];

/// Sensor window for SVGA (800x600 native) and everything below.
pub const SVGA_WINDOW: &RegTable = &[
    (0xFF, 0x01),
    (0x12, 0x40),
    (0x03, 0x0A),
    (0x17, 0x11),
    (0x18, 0x43),
    (0x19, 0x00),
    (0x1A, 0x4B),
    (0x32, 0x09),
    (0x37, 0xC0),
    (0x4F, 0xCA),
    (0x50, 0xA8),
    (0x5A, 0x23),
    (0x6D, 0x00),
    (0x3D, 0x38),
    (0x39, 0x92),
    (0x35, 0xDA),
    (0x22, 0x1A),
    (0x37, 0xC3),
    (0x23, 0x00),
    (0x34, 0xC0),
    (0x36, 0x1A),
    (0x06, 0x88),
    (0x07, 0xC0),
    (0x0D, 0x87),
    (0x0E, 0x41),
    (0xFF, 0x00),
    (0xE0, 0x04),
    (0xC0, 0x64),
    (0xC1, 0x4B),
    (0x86, 0x35),
    (0x50, 0x89),
    (0x51, 0xC8),
    (0x52, 0x96),
    (0x53, 0x00),
    (0x54, 0x00),
    (0x55, 0x00),
    (0x57, 0x00),
    (0xD3, 0x02),
];

/// Switch the DVP output to JPEG.
pub const JPEG_OUTPUT: &RegTable = &[
    (0xFF, 0x00),
    (0xE0, 0x04),
    (0xDA, 0x10),
    (0xD7, 0x03),
    (0xDF, 0x00),
    (0x33, 0x80),
    (0x3C, 0x40),
    (0xE1, 0x77),
    (0x00, 0x00),
    (0xE0, 0x00),
];

/// Register addresses shared by every row of the SDE tables below.
const BPADDR: u8 = Register::BPADDR;
const BPDATA: u8 = Register::BPDATA;

pub const SDE_HEADER_5: [u8; 5] = [BPADDR, BPDATA, BPADDR, BPDATA, BPDATA];
pub const SDE_HEADER_7: [u8; 7] = [BPADDR, BPDATA, BPADDR, BPDATA, BPDATA, BPDATA, BPDATA];

/// Brightness -2..=2.
pub const BRIGHTNESS: [[u8; 5]; 5] = [
    [0x00, 0x04, 0x09, 0x00, 0x00],
    [0x00, 0x04, 0x09, 0x10, 0x00],
    [0x00, 0x04, 0x09, 0x20, 0x00],
    [0x00, 0x04, 0x09, 0x30, 0x00],
    [0x00, 0x04, 0x09, 0x40, 0x00],
];

/// Contrast -2..=2.
pub const CONTRAST: [[u8; 7]; 5] = [
    [0x00, 0x04, 0x07, 0x20, 0x18, 0x34, 0x06],
    [0x00, 0x04, 0x07, 0x20, 0x1C, 0x2A, 0x06],
    [0x00, 0x04, 0x07, 0x20, 0x20, 0x20, 0x06],
    [0x00, 0x04, 0x07, 0x20, 0x24, 0x16, 0x06],
    [0x00, 0x04, 0x07, 0x20, 0x28, 0x0C, 0x06],
];

/// Saturation -2..=2.
pub const SATURATION: [[u8; 5]; 5] = [
    [0x00, 0x02, 0x03, 0x28, 0x28],
    [0x00, 0x02, 0x03, 0x38, 0x38],
    [0x00, 0x02, 0x03, 0x48, 0x48],
    [0x00, 0x02, 0x03, 0x58, 0x58],
    [0x00, 0x02, 0x03, 0x68, 0x68],
];

/// Special effects in `SpecialEffect` order.
pub const SPECIAL_EFFECT: [[u8; 5]; 7] = [
    [0x00, 0x00, 0x05, 0x80, 0x80],
    [0x00, 0x40, 0x05, 0x80, 0x80],
    [0x00, 0x18, 0x05, 0x80, 0x80],
    [0x00, 0x18, 0x05, 0x40, 0xC0],
    [0x00, 0x18, 0x05, 0x40, 0x40],
    [0x00, 0x18, 0x05, 0xA0, 0x40],
    [0x00, 0x18, 0x05, 0x40, 0xA6],
];

/// AEW, AEB, VV for AE level -2..=2.
pub const AE_LEVEL: [[u8; 3]; 5] = [
    [0x20, 0x18, 0x60],
    [0x34, 0x1C, 0x00],
    [0x3E, 0x38, 0x81],
    [0x48, 0x40, 0x81],
    [0x58, 0x50, 0x92],
];

/// Manual R, G, B gains for the non-auto `WbMode`s (sunny, cloudy, office, home).
pub const WB_GAINS: [[u8; 3]; 4] = [
    [0x5E, 0x41, 0x54],
    [0x65, 0x41, 0x4F],
    [0x52, 0x41, 0x66],
    [0x42, 0x3F, 0x71],
];

/// GAIN register value for AGC gain 0..=30 (1x up to 32x).
pub const AGC_GAIN: [u8; 31] = [
    0x00, 0x10, 0x18, 0x30, 0x34, 0x38, 0x3C, 0x70, 0x72, 0x74, 0x76, 0x78, 0x7A, 0x7C, 0x7E,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE,
    0xFF,
];
