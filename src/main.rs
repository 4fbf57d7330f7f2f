//! Camera firmware entry point: boot, settle, then save one JPEG to the SD card.

#![cfg_attr(target_arch = "arm", no_main)]
#![cfg_attr(target_arch = "arm", no_std)]

#[cfg(target_arch = "arm")]
mod firmware {
    use core::panic::PanicInfo;
    use cortex_m_rt::entry;
    use rtt_target::{rprintln, rtt_init, set_print_channel};
    use snapcam::app::{Firmware, Settings};
    use snapcam::board::{
        self, camera::BoardCamera, sd_storage::SdStorage, sdmmc::SdmmcDriver, sdram, CycleDelay,
    };
    use stm32f7xx_hal::{
        delay::Delay,
        i2c::{BlockingI2c, Mode},
        pac,
        prelude::*,
        rcc::{HSEClock, HSEClockMode},
    };

    #[entry]
    fn main() -> ! {
        // Setup RTT for logging
        let channels = rtt_init! {
            up: {
                0: {
                    size: 4096
                    mode: BlockIfFull
                    name: "Terminal"
                }
            }
        };

        set_print_channel(channels.up.0);

        // Get peripherals
        let pac_periph = pac::Peripherals::take().unwrap();
        let cm_periph = cortex_m::Peripherals::take().unwrap();

        // HSE = 25 MHz, SYSCLK = 216 MHz
        let mut rcc = pac_periph.RCC.constrain();
        let hse_cfg = HSEClock::new(board::get_xtal(), HSEClockMode::Oscillator);
        let clocks = rcc.cfgr.hse(hse_cfg).sysclk(216.mhz()).freeze();
        let mut delay = Delay::new(cm_periph.SYST, clocks);

        // Frame buffers live in SDRAM
        let (ram_ptr, ram_size) = sdram::init(&clocks, &mut delay);

        let i2c = BlockingI2c::i2c1(
            pac_periph.I2C1,
            board::configure_camera_pins(),
            Mode::standard(100.khz()),
            clocks,
            &mut rcc.apb1,
            10000,
        );

        let camera = BoardCamera::new(i2c, CycleDelay::new(clocks.sysclk().0), ram_ptr, ram_size);
        let sd = SdmmcDriver::new(
            pac_periph.SDMMC1,
            board::get_xtal().0 * 1_000_000,
            clocks.sysclk().0,
        );
        let mut firmware = Firmware::new(
            camera,
            SdStorage::new(sd),
            board::led_pin(),
            Settings::DEFAULT,
        );

        #[cfg(not(feature = "button-capture"))]
        {
            let _ = firmware.run_once(&mut delay);
            loop {
                cortex_m::asm::wfi();
            }
        }

        #[cfg(feature = "button-capture")]
        {
            use snapcam::{button::ButtonWatcher, config::BUTTON};

            let mut button = ButtonWatcher::new(board::button_pin(), &BUTTON);
            let _ = firmware.init();
            loop {
                let _ = firmware.button_step(&mut button, &mut delay);
            }
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        rprintln!("Panicked!");
        rprintln!("{:?}", info);
        loop {}
    }
}

#[cfg(not(target_arch = "arm"))]
fn main() {}
