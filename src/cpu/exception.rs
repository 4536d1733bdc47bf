use std::fmt;

use thiserror::Error;
use tracing::{debug, error};

use super::{Cpu, SR_INT_MASK, SR_S, SR_T};
use crate::bus::{Bus, BusError};

/// Index into the exception vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vector(pub u8);

impl Vector {
    pub const RESET_SSP: Vector = Vector(0x00); // initial SSP, not an exception
    pub const RESET_PC: Vector = Vector(0x01); // initial PC, not an exception
    pub const BUS_ERROR: Vector = Vector(0x02);
    pub const ADDRESS_ERROR: Vector = Vector(0x03);
    pub const ILLEGAL_INSTRUCTION: Vector = Vector(0x04);
    pub const ZERO_DIVIDE: Vector = Vector(0x05);
    pub const CHK: Vector = Vector(0x06);
    pub const TRAPV: Vector = Vector(0x07);
    pub const PRIVILEGE_VIOLATION: Vector = Vector(0x08);
    pub const TRACE: Vector = Vector(0x09);
    pub const LINE_A: Vector = Vector(0x0A);
    pub const LINE_F: Vector = Vector(0x0B);
    pub const SPURIOUS: Vector = Vector(0x18);
    pub const TRAP_BASE: Vector = Vector(0x20);

    /// Vector of `TRAP #n`.
    pub fn trap(n: u8) -> Vector {
        Vector(Self::TRAP_BASE.0 + (n & 0xF))
    }

    /// Address of the vector's entry in the table.
    pub fn address(self) -> u32 {
        self.0 as u32 * 4
    }

    pub fn is_group0_or_1(self) -> bool {
        matches!(
            self,
            Vector::ZERO_DIVIDE | Vector::CHK | Vector::TRAPV | Vector::TRACE
        ) || self >= Vector::TRAP_BASE
    }

    /// Bus and address errors stack the long access-fault frame.
    pub fn is_access_fault(self) -> bool {
        matches!(self, Vector::BUS_ERROR | Vector::ADDRESS_ERROR)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Vector::RESET_SSP => f.write_str("reset ssp"),
            Vector::RESET_PC => f.write_str("reset pc"),
            Vector::BUS_ERROR => f.write_str("bus error"),
            Vector::ADDRESS_ERROR => f.write_str("address error"),
            Vector::ILLEGAL_INSTRUCTION => f.write_str("illegal instruction"),
            Vector::ZERO_DIVIDE => f.write_str("zero divide"),
            Vector::CHK => f.write_str("chk"),
            Vector::TRAPV => f.write_str("trapv"),
            Vector::PRIVILEGE_VIOLATION => f.write_str("privilege violation"),
            Vector::TRACE => f.write_str("trace"),
            Vector::LINE_A => f.write_str("line a"),
            Vector::LINE_F => f.write_str("line f"),
            Vector::SPURIOUS => f.write_str("spurious interrupt"),
            Vector(n @ 0x19..=0x1F) => write!(f, "level {} autovector", n - 0x18),
            Vector(n @ 0x20..=0x2F) => write!(f, "trap #{}", n - 0x20),
            Vector(n) => write!(f, "vector {n:#04x}"),
        }
    }
}

/// Address and status word of a bus or address error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFault {
    pub address: u32,
    /// Bits 0..3 function code, bit 3 I/N, bit 4 R/W (set for reads).
    pub status: u8,
}

/// A processor exception waiting to be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub vector: Vector,
    pub ir: u16,
    pub access: Option<AccessFault>,
}

impl Fault {
    pub fn new(vector: Vector) -> Self {
        Self {
            vector,
            ir: 0,
            access: None,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vector)?;
        if let Some(access) = self.access {
            write!(
                f,
                " at {:#010x} (status {:#04x})",
                access.address, access.status
            )?;
        }
        Ok(())
    }
}

/// Why one instruction did not complete.
#[derive(Debug)]
pub(crate) enum ExecError {
    Exception(Fault),
    Bus(BusError),
}

impl From<Fault> for ExecError {
    fn from(fault: Fault) -> Self {
        ExecError::Exception(fault)
    }
}

// Only used for non-cycle calls (trace sinks, reset line). Bus cycles map
// device faults to a bus error exception themselves.
impl From<BusError> for ExecError {
    fn from(err: BusError) -> Self {
        ExecError::Bus(err)
    }
}

pub(crate) type Exec<T> = Result<T, ExecError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The processor is stopped and did nothing.
    Halted,
    Executed,
    /// The instruction raised an exception and control is now at its handler.
    Exception(Vector),
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("double fault: {0}")]
    DoubleFault(Fault),

    #[error("reset vector fetch failed: {0}")]
    ResetFault(Fault),

    #[error(transparent)]
    Bus(#[from] BusError),
}

impl<B: Bus> Cpu<B> {
    /// Loads SSP and PC from the reset vectors and enters supervisor mode
    /// with interrupts masked.
    pub fn reset(&mut self) -> Result<(), StepError> {
        self.sr = (self.sr | SR_S | SR_INT_MASK) & !SR_T;
        self.in_group0_or_1 = false;
        let ssp = self.reset_vector(Vector::RESET_SSP)?;
        let pc = self.reset_vector(Vector::RESET_PC)?;

        self.ssp = ssp;
        self.pc = pc;
        self.halted = false;
        debug!(ssp = format_args!("{ssp:#010x}"), pc = format_args!("{pc:#010x}"), "reset");
        Ok(())
    }

    fn reset_vector(&mut self, vector: Vector) -> Result<u32, StepError> {
        let fc = self.function_code(true);
        self.read_long(vector.address(), fc).map_err(|err| match err {
            ExecError::Exception(fault) => StepError::ResetFault(fault),
            ExecError::Bus(err) => StepError::Bus(err),
        })
    }

    /// Dispatches `fault`, chaining any fault raised while stacking it.
    /// Returns the vector whose handler is now in control.
    pub(super) fn begin_exception(&mut self, fault: Fault) -> Result<Vector, StepError> {
        let mut current = fault;

        loop {
            self.in_group0_or_1 = current.vector.is_group0_or_1();
            debug!(fault = %current, pc = format_args!("{:#010x}", self.pc), "entering exception");

            match self.handle_exception(current) {
                Ok(new_pc) => {
                    self.in_group0_or_1 = false;
                    self.pc = new_pc;
                    return Ok(current.vector);
                }
                Err(ExecError::Exception(next))
                    if next.vector.is_access_fault() && next.vector == current.vector =>
                {
                    error!(fault = %next, while_handling = %current, "double fault, halting");
                    let access = next.access.unwrap_or(AccessFault {
                        address: 0,
                        status: 0,
                    });
                    self.bus.trace_memory_exception(
                        next.vector,
                        self.pc,
                        next.ir,
                        access.address,
                        access.status,
                    )?;
                    self.halted = true;
                    return Err(StepError::DoubleFault(next));
                }
                Err(ExecError::Exception(next)) => {
                    debug!(fault = %next, while_handling = %current, "fault while stacking exception");
                    current = next;
                }
                Err(ExecError::Bus(err)) => return Err(err.into()),
            }
        }
    }

    /// Stacks the exception frame for `fault` and returns the handler address.
    fn handle_exception(&mut self, fault: Fault) -> Exec<u32> {
        let pc = self.pc;
        if self.trace_exceptions {
            match fault.access {
                Some(access) => self.bus.trace_memory_exception(
                    fault.vector,
                    pc,
                    fault.ir,
                    access.address,
                    access.status,
                )?,
                None => self.bus.trace_exception(fault.vector, pc)?,
            }
        }

        let old_sr = self.sr;
        self.sr = (self.sr | SR_S) & !SR_T;

        let fc = self.function_code(true);
        let new_pc = self.read_long(fault.vector.address(), fc)?;

        self.push_long(pc)?;
        self.push_word(old_sr)?;
        if let Some(access) = fault.access {
            self.push_word(fault.ir)?;
            self.push_long(access.address)?;
            self.push_word((fault.ir & !0x1F) | (access.status as u16 & 0x1F))?;
        }
        Ok(new_pc)
    }
}
