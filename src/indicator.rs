//! Status LED shown while a capture is in progress.

use crate::config::IndicatorConfig;
use embedded_hal::digital::v2::OutputPin;

/// Drives one LED. Knows its own polarity, so callers only say on or off.
pub struct StatusIndicator<P> {
    pin: P,
    active_high: bool,
    active: bool,
}

impl<P, E> StatusIndicator<P>
where
    P: OutputPin<Error = E>,
{
    pub fn new(pin: P, config: &IndicatorConfig) -> Self {
        StatusIndicator {
            pin,
            active_high: config.active_high,
            active: false,
        }
    }

    /// Put the pin in a known state: configured as output and driven inactive.
    pub fn reset(&mut self) -> Result<(), E> {
        self.set_active(false)
    }

    pub fn set_active(&mut self, on: bool) -> Result<(), E> {
        if on == self.active_high {
            self.pin.set_high()?;
        } else {
            self.pin.set_low()?;
        }
        self.active = on;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn release(self) -> P {
        self.pin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INDICATOR;
    use crate::tests::fakes::FakePin;

    #[test]
    fn active_high_led() {
        let mut led = StatusIndicator::new(FakePin::default(), &INDICATOR);
        led.reset().unwrap();
        assert!(!led.is_active());
        led.set_active(true).unwrap();
        assert!(led.is_active());
        assert_eq!(led.release().history, vec![false, true]);
    }

    #[test]
    fn active_low_led() {
        let config = IndicatorConfig {
            active_high: false,
            ..INDICATOR
        };
        let mut led = StatusIndicator::new(FakePin::default(), &config);
        led.reset().unwrap();
        led.set_active(true).unwrap();
        assert_eq!(led.release().history, vec![true, false]);
    }

    #[test]
    fn failed_write_keeps_state() {
        let mut pin = FakePin::default();
        pin.fail = true;
        let mut led = StatusIndicator::new(pin, &INDICATOR);
        assert!(led.set_active(true).is_err());
        assert!(!led.is_active());
    }
}
