//! External SDRAM (IS42S32400F-6BL) that holds the camera frame buffers. Only 16 of the 32
//! data lines are wired on this board, and `stm32-fmc` has no IS42S32400F, so the close enough
//! IS42S16400J timings are used.

use stm32_fmc::devices::is42s16400j_7;
use stm32f7xx_hal::{
    delay::Delay,
    fmc::FmcExt,
    gpio::{GpioExt, Speed},
    pac,
    rcc::Clocks,
};

/// Half of the 16 MB part is reachable over a 16-bit bus.
const SDRAM_BYTES: usize = (16 * 1024 * 1024) / 2;

/// FMC pins: very high speed, AF12, pulled up.
macro_rules! fmc_pins {
    ($($pin:expr),*) => {
        (
            $(
                $pin.into_push_pull_output()
                    .set_speed(Speed::VeryHigh)
                    .into_alternate_af12()
                    .internal_pull_up(true)
            ),*
        )
    };
}

/// Bring up the FMC SDRAM controller and return the base of the frame buffer region and its
/// size in bytes. Peripherals are stolen, so this should only be done during init!
pub fn init(clocks: &Clocks, delay: &mut Delay) -> (*mut u32, usize) {
    let pac_periph = unsafe { pac::Peripherals::steal() };

    let gpioc = pac_periph.GPIOC.split();
    let gpiod = pac_periph.GPIOD.split();
    let gpioe = pac_periph.GPIOE.split();
    let gpiof = pac_periph.GPIOF.split();
    let gpiog = pac_periph.GPIOG.split();
    let gpioh = pac_periph.GPIOH.split();

    let fmc_io = fmc_pins! {
        gpiof.pf0,  // A0
        gpiof.pf1,  // A1
        gpiof.pf2,  // A2
        gpiof.pf3,  // A3
        gpiof.pf4,  // A4
        gpiof.pf5,  // A5
        gpiof.pf12, // A6
        gpiof.pf13, // A7
        gpiof.pf14, // A8
        gpiof.pf15, // A9
        gpiog.pg0,  // A10
        gpiog.pg1,  // A11
        gpiog.pg4,  // BA0
        gpiog.pg5,  // BA1
        gpiod.pd14, // D0
        gpiod.pd15, // D1
        gpiod.pd0,  // D2
        gpiod.pd1,  // D3
        gpioe.pe7,  // D4
        gpioe.pe8,  // D5
        gpioe.pe9,  // D6
        gpioe.pe10, // D7
        gpioe.pe11, // D8
        gpioe.pe12, // D9
        gpioe.pe13, // D10
        gpioe.pe14, // D11
        gpioe.pe15, // D12
        gpiod.pd8,  // D13
        gpiod.pd9,  // D14
        gpiod.pd10, // D15
        gpioe.pe0,  // NBL0
        gpioe.pe1,  // NBL1
        gpioc.pc3,  // SDCKEn
        gpiog.pg8,  // SDCLK
        gpiog.pg15, // SDNCAS
        gpioh.ph3,  // SDNEn
        gpiof.pf11, // SDNRAS
        gpioh.ph5   // SDNWE
    };

    let mut sdram = pac_periph
        .FMC
        .sdram(fmc_io, is42s16400j_7::Is42s16400j {}, clocks);

    (sdram.init(delay), SDRAM_BYTES)
}
