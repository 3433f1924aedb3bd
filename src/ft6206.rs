//! FT6206 capacitive touch controller
//!
//! Only the first touch point is read; the controller's second point is
//! ignored.

use core::fmt::Debug;

use bondrewd::Bitfields;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::{tracker::TouchSample, Error, TouchSensor};

/// Default I²C address for the FT6206
pub const I2C_ADDR: u8 = 0x38;

/// Default touch detection threshold
pub const DEFAULT_THRESHOLD: u8 = 128;

const REG_THRESHOLD: u8 = 0x80;
const REG_CHIP_ID: u8 = 0xA3;
const REG_VENDOR_ID: u8 = 0xA8;

const VENDOR_ID: u8 = 0x11;
const CHIP_ID: u8 = 0x06;

// Registers read per sample, starting at 0x00
const FRAME_LEN: usize = 16;
// Registers covered by a TouchFrame
const HEADER_LEN: usize = 7;

/// Leading registers `0x00..=0x06` of a sample: status and the first point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Bitfields)]
#[bondrewd(default_endianness = "be")]
pub struct TouchFrame {
    /// Device mode
    pub dev_mode: u8,
    /// Gesture ID
    pub gesture_id: u8,
    #[bondrewd(bit_length = 4)]
    padding0: u8,
    /// Number of touch points; only bit 0 is used
    #[bondrewd(bit_length = 4)]
    pub touch_count: u8,
    /// 0 = down, 1 = up, 2 = contact
    #[bondrewd(bit_length = 2)]
    pub event_flag: u8,
    #[bondrewd(bit_length = 2)]
    padding1: u8,
    #[bondrewd(bit_length = 12)]
    pub x: u16,
    #[bondrewd(bit_length = 4)]
    pub touch_id: u8,
    #[bondrewd(bit_length = 12)]
    pub y: u16,
}

impl TouchFrame {
    pub fn is_touched(&self) -> bool {
        self.touch_count & 0x01 != 0
    }
}

impl From<TouchFrame> for TouchSample {
    fn from(frame: TouchFrame) -> Self {
        TouchSample::capacitive(frame.is_touched(), frame.x, frame.y)
    }
}

/// FT6206 driver
pub struct Ft6206<I2C> {
    /// Underlying I²C peripheral
    i2c: I2C,
    /// Device address
    address: u8,
}

impl<I2C, E> Ft6206<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    /// Create a new instance of the driver at the default address
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, I2C_ADDR)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        debug_assert!(address > 0);

        Self { i2c, address }
    }

    /// Identify the device and program its touch threshold
    pub fn init(&mut self, threshold: u8) -> Result<(), Error<E>> {
        let vendor = self.read_register(REG_VENDOR_ID)?;
        let chip = self.read_register(REG_CHIP_ID)?;

        self.i2c
            .write(self.address, &[REG_THRESHOLD, threshold])
            .map_err(Error::BusError)?;

        if vendor == VENDOR_ID && chip == CHIP_ID {
            log::info!("detected FT6206 device");
            Ok(())
        } else {
            log::warn!("unsupported device 0x{:02X}{:02X}", vendor, chip);
            Err(Error::UnsupportedDevice { vendor, chip })
        }
    }

    /// Read the touch status registers
    pub fn frame(&mut self) -> Result<TouchFrame, Error<E>> {
        let mut data = [0u8; FRAME_LEN];
        self.i2c
            .write_read(self.address, &[0x00], &mut data)
            .map_err(Error::BusError)?;

        let frame = data[0..][..HEADER_LEN].try_into()?;

        Ok(TouchFrame::from_bytes(frame))
    }

    /// Give back the underlying I²C peripheral
    pub fn release(self) -> I2C {
        self.i2c
    }

    // -----------------------------------------------------------------------
    // PRIVATE

    fn read_register(&mut self, register: u8) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buffer)
            .map_err(Error::BusError)?;

        Ok(buffer[0])
    }
}

impl<I2C, E> TouchSensor for Ft6206<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    type Error = Error<E>;

    fn sample(&mut self) -> Result<TouchSample, Self::Error> {
        self.frame().map(TouchSample::from)
    }
}
