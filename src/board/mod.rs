//! STM32F746G Discovery board support: pins, clocks and the off-chip devices the firmware
//! drives (OV2640 on the camera connector, microSD slot, SDRAM).

pub mod camera;
pub mod dcmi;
pub mod sd_storage;
pub mod sdmmc;
pub mod sdram;

use crate::config::{PinId, Pull};
use embedded_hal::blocking::delay::DelayMs;
use stm32f7xx_hal::{
    gpio::{gpiob, gpioi, Alternate, Floating, GpioExt, Input, Output, PushPull, Speed, AF4},
    pac,
    time::{MegaHertz, U32Ext},
};

/// Type alias for the status LED pin.
pub type LedPin = gpioi::PI1<Output<PushPull>>;

/// Type alias for the push button GPIO pin.
pub type ButtonPin = gpioi::PI11<Input<Floating>>;

/// 25 MHz external oscillator (X2) is the HSE clock source.
pub fn get_xtal() -> MegaHertz {
    25.mhz()
}

/// Configure the camera connector GPIOs and return the I2C pins for the SCCB driver. The
/// peripherals are stolen, so this should only be done during init.
///
/// Pin configuration:
///
///     I2C1 SCL:   PB8  --> OV2640 SIOC
///     I2C1 SDA:   PB9 <--> OV2640 SIOD
///     (HW OSC 24M)     --> OV2640 XCLK
///     DCMI PCLK:  PA6  <-- OV2640 PCLK
///     DCMI HSYNC: PA4  <-- OV2640 HREF
///     DCMI VSYNC: PG9  <-- OV2640 VSYNC
///     DCMI D0:    PH9  <-- OV2640 Y2
///     DCMI D1:    PH10 <-- OV2640 Y3
///     DCMI D2:    PH11 <-- OV2640 Y4
///     DCMI D3:    PH12 <-- OV2640 Y5
///     DCMI D4:    PH14 <-- OV2640 Y6
///     DCMI D5:    PD3  <-- OV2640 Y7
///     DCMI D6:    PE5  <-- OV2640 Y8
///     DCMI D7:    PE6  <-- OV2640 Y9
pub fn configure_camera_pins() -> (gpiob::PB8<Alternate<AF4>>, gpiob::PB9<Alternate<AF4>>) {
    let pac_periph = unsafe { pac::Peripherals::steal() };
    let gpioa = pac_periph.GPIOA.split();
    let gpiob = pac_periph.GPIOB.split();
    let gpiod = pac_periph.GPIOD.split();
    let gpioe = pac_periph.GPIOE.split();
    let gpiog = pac_periph.GPIOG.split();
    let gpioh = pac_periph.GPIOH.split();

    let scl = gpiob
        .pb8
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();
    let sda = gpiob
        .pb9
        .into_alternate_af4()
        .internal_pull_up(true)
        .set_open_drain();

    macro_rules! dcmi_pins {
        ($($pin:expr),*) => {
            $(
                let _ = $pin
                    .into_alternate_af13()
                    .internal_pull_up(true)
                    .set_speed(Speed::VeryHigh);
            )*
        };
    }

    dcmi_pins!(
        gpioa.pa6,  // PCLK
        gpioa.pa4,  // HSYNC
        gpiog.pg9,  // VSYNC
        gpioh.ph9,  // D0
        gpioh.ph10, // D1
        gpioh.ph11, // D2
        gpioh.ph12, // D3
        gpioh.ph14, // D4
        gpiod.pd3,  // D5
        gpioe.pe5,  // D6
        gpioe.pe6   // D7
    );

    (scl, sda)
}

/// Green user LED (LD1).
pub fn led_pin() -> LedPin {
    let pac_periph = unsafe { pac::Peripherals::steal() };
    pac_periph.GPIOI.split().pi1.into_push_pull_output()
}

/// Blue USER button (B1), reads high while pressed.
pub fn button_pin() -> ButtonPin {
    let pac_periph = unsafe { pac::Peripherals::steal() };
    pac_periph.GPIOI.split().pi11.into_floating_input()
}

/// Set the internal bias of any GPIO by port letter and number. Leaves the pin mode alone, so
/// it works on pins a driver already owns.
pub fn set_pull(pin: PinId, pull: Pull) -> Result<(), ()> {
    const GPIOA_BASE: u32 = 0x4002_0000;
    const PORT_STRIDE: u32 = 0x400;
    const PUPDR_OFFSET: u32 = 0x0C;

    let port = match pin.port {
        'A'..='K' => pin.port as u32 - 'A' as u32,
        _ => return Err(()),
    };
    if pin.pin > 15 {
        return Err(());
    }

    let bits = match pull {
        Pull::None => 0b00,
        Pull::Up => 0b01,
        Pull::Down => 0b10,
    };
    let shift = u32::from(pin.pin) * 2;
    let pupdr = (GPIOA_BASE + port * PORT_STRIDE + PUPDR_OFFSET) as *mut u32;

    cortex_m::interrupt::free(|_| unsafe {
        let value = core::ptr::read_volatile(pupdr);
        core::ptr::write_volatile(pupdr, (value & !(0b11 << shift)) | (bits << shift));
    });
    Ok(())
}

/// Busy-wait delay. The SysTick `Delay` goes to the SDRAM init, the camera gets this one.
pub struct CycleDelay {
    cycles_per_ms: u32,
}

impl CycleDelay {
    pub fn new(sysclk_hz: u32) -> Self {
        CycleDelay {
            cycles_per_ms: sysclk_hz / 1000,
        }
    }
}

impl DelayMs<u32> for CycleDelay {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            cortex_m::asm::delay(self.cycles_per_ms);
        }
    }
}
