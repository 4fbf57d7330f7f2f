//! Capture button, sampled by polling.

use crate::config::ButtonConfig;
use embedded_hal::digital::v2::InputPin;

/// Turns pressed/not-pressed samples into release events.
#[derive(Clone, Copy, Debug, Default)]
pub struct EdgeDetector {
    was_pressed: bool,
}

impl EdgeDetector {
    /// Feed one sample, returns `true` on the sample where the button is let go.
    pub fn update(&mut self, pressed: bool) -> bool {
        let released = self.was_pressed && !pressed;
        self.was_pressed = pressed;
        released
    }
}

pub struct ButtonWatcher<P> {
    pin: P,
    active_low: bool,
    edges: EdgeDetector,
}

impl<P, E> ButtonWatcher<P>
where
    P: InputPin<Error = E>,
{
    pub fn new(pin: P, config: &ButtonConfig) -> Self {
        ButtonWatcher {
            pin,
            active_low: config.active_low,
            edges: EdgeDetector::default(),
        }
    }

    pub fn is_pressed(&self) -> Result<bool, E> {
        if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        }
    }

    /// Sample the button once. `true` means a press just completed.
    pub fn poll(&mut self) -> Result<bool, E> {
        let pressed = self.is_pressed()?;
        Ok(self.edges.update(pressed))
    }

    #[cfg(test)]
    pub(crate) fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}
