//! Touchscreen input: debounced finger events and 5-point calibration
//!
//! A polling loop reads one [TouchSample] per tick from a [TouchSensor] and
//! feeds it to a [TouchTracker], which emits at most one [TouchEvent]. Raw
//! event positions are then mapped into screen space by a [Calibration].
//!
//! ```no_run
//! use tsinput::{Calibration, CalibrationConfig, Rotation, TouchSample, TouchTracker};
//!
//! let mut tracker = TouchTracker::default();
//! let calibration = Calibration::new(
//!     CalibrationConfig::new(240, 320).with_rotation(Rotation::Rot90),
//! );
//!
//! if let Some(event) = tracker.update(TouchSample::capacitive(true, 812, 1033)) {
//!     let (x, y) = calibration.apply(event.x as i32, event.y as i32);
//!     // hand (x, y) to the UI
//! }
//! ```
//!
//! Drivers for the FT6206 (capacitive, I²C) and TSC2046 (resistive, SPI)
//! controllers are provided in [ft6206] and [tsc2046].

#![cfg_attr(not(test), no_std)]

use core::array::TryFromSliceError;

pub mod calibration;
pub mod ft6206;
pub mod session;
pub mod tracker;
pub mod tsc2046;

pub use crate::{
    calibration::{
        Calibration,
        CalibrationConfig,
        CalibrationError,
        CalibrationPoint,
        Coefficients,
        Rotation,
    },
    session::{CalibrationSession, SessionStatus},
    tracker::{
        EventKind,
        EventSink,
        Presence,
        TouchDevice,
        TouchEvent,
        TouchSample,
        TouchTracker,
        TrackerState,
    },
};

/// Any type of error which may occur while interacting with a sensor
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// Some error originating from the communication bus
    BusError(E),
    /// Driving the chip select pin resulted in an error
    PinError,
    /// The device did not identify as a supported controller
    UnsupportedDevice { vendor: u8, chip: u8 },
    /// Error converting a slice to an array
    TryFromSliceError,
}

impl<E> From<TryFromSliceError> for Error<E> {
    fn from(_: TryFromSliceError) -> Self {
        Self::TryFromSliceError
    }
}

/// A source of raw touch samples, read once per poll tick
///
/// Implementations must not return a sample for a failed read.
pub trait TouchSensor {
    type Error;

    fn sample(&mut self) -> Result<TouchSample, Self::Error>;
}
