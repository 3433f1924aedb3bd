//! TSC2046 resistive touch controller
//!
//! Every sample is a single SPI transfer of twelve 3-byte conversions: three
//! each for Z1, Z2, X and Y. The first two conversions of a channel let the
//! plates settle and only the last one is used.

use core::fmt::Debug;

use bondrewd::Bitfields;
use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};

use crate::{tracker::TouchSample, Error, TouchSensor};

// Control bytes; bit 0 keeps the reference powered between conversions
const CMD_Z1: u8 = 0xB1;
const CMD_Z2: u8 = 0xC1;
const CMD_X: u8 = 0x91;
const CMD_Y: u8 = 0xD1;
const CMD_Y_POWER_DOWN: u8 = 0xD0;

const CONVERSION_LEN: usize = 3;
const CONVERSIONS_PER_CHANNEL: usize = 3;
const TRANSFER_LEN: usize = 4 * CONVERSIONS_PER_CHANNEL * CONVERSION_LEN;

/// One conversion: the control byte slot followed by the 12-bit result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Bitfields)]
#[bondrewd(default_endianness = "be")]
pub struct Conversion {
    command: u8,
    #[bondrewd(bit_length = 1)]
    busy: u8,
    /// 12-bit ADC result
    #[bondrewd(bit_length = 12)]
    pub value: u16,
    #[bondrewd(bit_length = 3)]
    padding0: u8,
}

/// Raw channel readings of one sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawReading {
    pub z1: u16,
    pub z2: u16,
    pub x: u16,
    pub y: u16,
}

impl From<RawReading> for TouchSample {
    fn from(reading: RawReading) -> Self {
        TouchSample::resistive(reading.z1, reading.z2, reading.x, reading.y)
    }
}

/// TSC2046 driver
pub struct Tsc2046<SPI, CS> {
    /// Underlying SPI peripheral
    spi: SPI,
    /// Chip select, active low
    cs: CS,
}

impl<SPI, CS, E> Tsc2046<SPI, CS>
where
    SPI: Transfer<u8, Error = E>,
    CS: OutputPin,
    E: Debug,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self { spi, cs }
    }

    /// Perform a dummy conversion to check the device responds
    pub fn init(&mut self) -> Result<(), Error<E>> {
        let mut buffer = [CMD_Z1, 0, 0];
        self.transfer(&mut buffer)
    }

    /// Read all four channels
    pub fn reading(&mut self) -> Result<RawReading, Error<E>> {
        let mut buffer = [0u8; TRANSFER_LEN];
        let commands = [CMD_Z1, CMD_Z2, CMD_X, CMD_Y];
        for (channel, command) in commands.iter().enumerate() {
            for n in 0..CONVERSIONS_PER_CHANNEL {
                buffer[slot(channel, n)] = *command;
            }
        }
        buffer[slot(3, CONVERSIONS_PER_CHANNEL - 1)] = CMD_Y_POWER_DOWN;

        self.transfer(&mut buffer)?;

        Ok(RawReading {
            z1: last_conversion(&buffer, 0)?,
            z2: last_conversion(&buffer, 1)?,
            x: last_conversion(&buffer, 2)?,
            y: last_conversion(&buffer, 3)?,
        })
    }

    /// Give back the SPI peripheral and chip select pin
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    // -----------------------------------------------------------------------
    // PRIVATE

    fn transfer(&mut self, buffer: &mut [u8]) -> Result<(), Error<E>> {
        self.cs.set_low().map_err(|_| Error::PinError)?;
        let result = self.spi.transfer(buffer).map(|_| ());
        self.cs.set_high().map_err(|_| Error::PinError)?;

        result.map_err(|e| {
            log::error!("SPI write/read error: {:?}", e);
            Error::BusError(e)
        })
    }
}

impl<SPI, CS, E> TouchSensor for Tsc2046<SPI, CS>
where
    SPI: Transfer<u8, Error = E>,
    CS: OutputPin,
    E: Debug,
{
    type Error = Error<E>;

    fn sample(&mut self) -> Result<TouchSample, Self::Error> {
        self.reading().map(TouchSample::from)
    }
}

fn slot(channel: usize, n: usize) -> usize {
    (channel * CONVERSIONS_PER_CHANNEL + n) * CONVERSION_LEN
}

fn last_conversion<E>(buffer: &[u8], channel: usize) -> Result<u16, Error<E>> {
    let start = slot(channel, CONVERSIONS_PER_CHANNEL - 1);
    let conversion = buffer[start..][..CONVERSION_LEN].try_into()?;

    Ok(Conversion::from_bytes(conversion).value)
}
