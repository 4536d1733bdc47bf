//! The processor's external bus contract.
//!
//! Every memory access the core performs is a blocking call through [`Bus`].
//! Word and long accesses are split into 16-bit data cycles by the core; a
//! bus implementation only ever sees one address phase followed by one data
//! phase.

use std::{fmt, io};

use thiserror::Error;

use crate::cpu::Vector;

/// Which half of the 16-bit data bus a cycle drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataStrobe {
    Upper = 1, // bits 8..16, even byte
    Lower = 2, // bits 0..8, odd byte
    Both = 3,
}

impl DataStrobe {
    /// Strobe selecting the byte at `address`.
    pub fn for_byte(address: u32) -> Self {
        if address & 1 == 1 {
            DataStrobe::Lower
        } else {
            DataStrobe::Upper
        }
    }

    /// Bit position of the strobed byte within the data word.
    pub fn byte_shift(self) -> u32 {
        match self {
            DataStrobe::Upper => 8,
            DataStrobe::Lower | DataStrobe::Both => 0,
        }
    }
}

impl TryFrom<u8> for DataStrobe {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DataStrobe::Upper),
            2 => Ok(DataStrobe::Lower),
            3 => Ok(DataStrobe::Both),
            other => Err(other),
        }
    }
}

/// Processor function code lines FC0..FC2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCode(u8);

impl FunctionCode {
    pub const DATA: u8 = 0b001;
    pub const PROGRAM: u8 = 0b010;
    pub const SUPERVISOR: u8 = 0b100;

    pub fn new(supervisor: bool, program: bool) -> Self {
        let space = if program { Self::PROGRAM } else { Self::DATA };
        let mode = if supervisor { Self::SUPERVISOR } else { 0 };
        FunctionCode(space | mode)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Something the core could not complete a bus access against.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no device responded at {address:#08x}")]
    NoDevice { address: u32 },

    #[error("write to read-only memory at {address:#08x}")]
    WriteProtected { address: u32 },

    #[error("bus transport failed: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected reply byte {got:#04x}")]
    UnexpectedReply { got: u8 },

    #[error("collaborator rejected {event} event")]
    Rejected { event: BusEvent },
}

impl BusError {
    /// Device faults are raised to the program as a bus error exception;
    /// everything else ends the session.
    pub fn is_device_fault(&self) -> bool {
        matches!(
            self,
            BusError::NoDevice { .. } | BusError::WriteProtected { .. }
        )
    }
}

/// Non-cycle notifications a bus may refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Reset,
    TraceExec,
    TraceException,
    TraceMemoryException,
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BusEvent::Reset => "reset",
            BusEvent::TraceExec => "trace-exec",
            BusEvent::TraceException => "trace-exception",
            BusEvent::TraceMemoryException => "trace-memory-exception",
        };
        f.write_str(s)
    }
}

pub trait Bus {
    /// Starts a bus cycle. `address` is already masked to 24 bits and even.
    fn assert_address(&mut self, address: u32) -> Result<(), BusError>;

    fn read_bus(&mut self, strobe: DataStrobe) -> Result<u16, BusError>;

    fn write_bus(&mut self, strobe: DataStrobe, value: u16) -> Result<(), BusError>;

    /// The RESET instruction pulsed the reset line.
    fn reset_asserted(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    fn trace_exec(&mut self, _pc: u32, _ir: u16, _text: &str) -> Result<(), BusError> {
        Ok(())
    }

    fn trace_exception(&mut self, _vector: Vector, _pc: u32) -> Result<(), BusError> {
        Ok(())
    }

    fn trace_memory_exception(
        &mut self,
        _vector: Vector,
        _pc: u32,
        _ir: u16,
        _address: u32,
        _status: u8,
    ) -> Result<(), BusError> {
        Ok(())
    }
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn assert_address(&mut self, address: u32) -> Result<(), BusError> {
        (**self).assert_address(address)
    }

    fn read_bus(&mut self, strobe: DataStrobe) -> Result<u16, BusError> {
        (**self).read_bus(strobe)
    }

    fn write_bus(&mut self, strobe: DataStrobe, value: u16) -> Result<(), BusError> {
        (**self).write_bus(strobe, value)
    }

    fn reset_asserted(&mut self) -> Result<(), BusError> {
        (**self).reset_asserted()
    }

    fn trace_exec(&mut self, pc: u32, ir: u16, text: &str) -> Result<(), BusError> {
        (**self).trace_exec(pc, ir, text)
    }

    fn trace_exception(&mut self, vector: Vector, pc: u32) -> Result<(), BusError> {
        (**self).trace_exception(vector, pc)
    }

    fn trace_memory_exception(
        &mut self,
        vector: Vector,
        pc: u32,
        ir: u16,
        address: u32,
        status: u8,
    ) -> Result<(), BusError> {
        (**self).trace_memory_exception(vector, pc, ir, address, status)
    }
}
