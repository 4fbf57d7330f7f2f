//! Single-shot JPEG camera firmware for the STM32F746G Discovery Board.
//!
//! The capture flow is written against small traits (`CameraDriver`, `Sensor`, `Storage`)
//! and embedded-hal pins, so everything outside `board` also builds and tests on a host.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(target_arch = "arm")]
#[doc(hidden)]
pub use rtt_target;

#[macro_use]
mod log;

pub mod app;
pub mod button;
pub mod camera;
pub mod capture;
pub mod config;
pub mod frame_pool;
pub mod indicator;
pub mod ov2640;
pub mod sensor;
pub mod storage;

/// Board support for the STM32F746G Discovery Board.
#[cfg(target_arch = "arm")]
pub mod board;

#[cfg(test)]
mod tests;
