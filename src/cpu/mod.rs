//! The 68000 execution core: register file, status word, single-step loop.

use std::fmt;

use tracing::trace;

use crate::bus::Bus;
use crate::decoder::{self, AddrReg, DataReg, Instruction};

mod ea;
mod exception;
mod execute;
mod memory;

pub use exception::{AccessFault, Fault, StepError, StepOutcome, Vector};
pub(crate) use exception::{Exec, ExecError};

pub(crate) const FLAG_C: u16 = 0x0001;
pub(crate) const FLAG_V: u16 = 0x0002;
pub(crate) const FLAG_Z: u16 = 0x0004;
pub(crate) const FLAG_N: u16 = 0x0008;
pub(crate) const FLAG_X: u16 = 0x0010;
pub(crate) const SR_INT_MASK: u16 = 0x0700;
pub(crate) const SR_S: u16 = 0x2000;
pub(crate) const SR_T: u16 = 0x8000;

/// Bits of the status register that exist on the 68000.
pub const SR_MASK: u16 = SR_T | SR_S | SR_INT_MASK | CCR_MASK;
const CCR_MASK: u16 = FLAG_X | FLAG_N | FLAG_Z | FLAG_V | FLAG_C;

pub struct Cpu<B: Bus> {
    data_regs: [u32; 8],
    // A0..A6; A7 is whichever of `ssp`/`usp` the S bit selects.
    addr_regs: [u32; 7],
    ssp: u32,
    usp: u32,
    pc: u32,
    sr: u16,
    // Opcode word of the instruction being executed. Access fault frames
    // report it.
    ir: u16,
    halted: bool,
    in_group0_or_1: bool,
    trace_exec: bool,
    trace_exceptions: bool,
    bus: B,
}

impl<B: Bus> Cpu<B> {
    /// A processor in supervisor mode with all interrupts masked and every
    /// register cleared. Call [`Cpu::reset`] to load the reset vectors.
    pub fn new(bus: B) -> Self {
        Self {
            data_regs: [0; 8],
            addr_regs: [0; 7],
            ssp: 0,
            usp: 0,
            pc: 0,
            sr: SR_S | SR_INT_MASK,
            ir: 0,
            halted: false,
            in_group0_or_1: false,
            trace_exec: false,
            trace_exceptions: false,
            bus,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    pub fn data_reg(&self, reg: DataReg) -> u32 {
        self.data_regs[reg as usize]
    }

    pub fn set_data_reg(&mut self, reg: DataReg, value: u32) {
        self.data_regs[reg as usize] = value;
    }

    /// Reads An. A7 is the active stack pointer.
    pub fn addr_reg(&self, reg: AddrReg) -> u32 {
        match reg {
            AddrReg::A7 => self.sp(),
            other => self.addr_regs[other as usize],
        }
    }

    pub fn set_addr_reg(&mut self, reg: AddrReg, value: u32) {
        match reg {
            AddrReg::A7 => self.set_sp(value),
            other => self.addr_regs[other as usize] = value,
        }
    }

    pub fn ssp(&self) -> u32 {
        self.ssp
    }

    pub fn set_ssp(&mut self, value: u32) {
        self.ssp = value;
    }

    pub fn usp(&self) -> u32 {
        self.usp
    }

    pub fn set_usp(&mut self, value: u32) {
        self.usp = value;
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, value: u32) {
        self.pc = value;
    }

    pub fn sr(&self) -> u16 {
        self.sr
    }

    /// Undefined bits are dropped.
    pub fn set_sr(&mut self, value: u16) {
        self.sr = value & SR_MASK;
    }

    pub fn ccr(&self) -> u8 {
        (self.sr & CCR_MASK) as u8
    }

    pub fn set_ccr(&mut self, value: u8) {
        self.sr = (self.sr & !CCR_MASK) | (value as u16 & CCR_MASK);
    }

    pub fn is_supervisor(&self) -> bool {
        self.sr & SR_S != 0
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    pub fn set_trace_exec(&mut self, enabled: bool) {
        self.trace_exec = enabled;
    }

    pub fn set_trace_exceptions(&mut self, enabled: bool) {
        self.trace_exceptions = enabled;
    }

    /// Opcode word of the most recently fetched instruction.
    pub fn ir(&self) -> u16 {
        self.ir
    }

    pub fn registers(&self) -> Registers {
        let mut a = [0; 8];
        for reg in AddrReg::ALL {
            a[reg as usize] = self.addr_reg(reg);
        }
        Registers {
            d: self.data_regs,
            a,
            ssp: self.ssp,
            usp: self.usp,
            pc: self.pc,
            sr: self.sr,
        }
    }

    /// Executes one instruction, dispatching any exception it raises.
    ///
    /// Processor exceptions are absorbed here and reported through
    /// [`StepOutcome::Exception`]; only double faults and transport failures
    /// surface as errors.
    pub fn step(&mut self) -> Result<StepOutcome, StepError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }

        let instr_pc = self.pc;
        self.ir = 0;

        let result = match self.fetch_and_decode(instr_pc) {
            Ok(instruction) => {
                let result = self.execute(&instruction);
                // A privilege violation retries the instruction on return
                // from the handler; every other outcome keeps the PC the
                // instruction left.
                if let Err(ExecError::Exception(Fault {
                    vector: Vector::PRIVILEGE_VIOLATION,
                    ..
                })) = result
                {
                    self.pc = instr_pc;
                }
                result
            }
            Err(err) => {
                self.pc = instr_pc;
                Err(err)
            }
        };

        match result {
            Ok(()) => Ok(StepOutcome::Executed),
            Err(ExecError::Exception(fault)) => {
                let vector = self.begin_exception(fault)?;
                Ok(StepOutcome::Exception(vector))
            }
            Err(ExecError::Bus(err)) => Err(StepError::Bus(err)),
        }
    }

    fn fetch_and_decode(&mut self, instr_pc: u32) -> Exec<Instruction> {
        let opcode = self.fetch_word()?;
        self.ir = opcode;

        match opcode >> 12 {
            0xA => return Err(Fault::new(Vector::LINE_A).into()),
            0xF => return Err(Fault::new(Vector::LINE_F).into()),
            _ => {}
        }

        let Some(instruction) = decoder::decode(&mut InstructionStream(self), instr_pc, opcode)? else {
            return Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into());
        };

        if self.trace_exec {
            let text = instruction.disassembly().to_string();
            trace!("{instr_pc:#010x}: {text}");
            self.bus.trace_exec(instr_pc, opcode, &text)?;
        }
        Ok(instruction)
    }

    fn sp(&self) -> u32 {
        if self.is_supervisor() {
            self.ssp
        } else {
            self.usp
        }
    }

    fn set_sp(&mut self, value: u32) {
        if self.is_supervisor() {
            self.ssp = value;
        } else {
            self.usp = value;
        }
    }

    fn get_flag(&self, mask: u16) -> bool {
        (self.sr & mask) != 0
    }

    fn set_flag(&mut self, mask: u16, set: bool) {
        if set {
            self.sr |= mask;
        } else {
            self.sr &= !mask;
        }
    }
}

/// Extension words come from the program space at PC.
struct InstructionStream<'a, B: Bus>(&'a mut Cpu<B>);

impl<B: Bus> decoder::ExtensionWords for InstructionStream<'_, B> {
    type Error = ExecError;

    fn next_word(&mut self) -> Exec<u16> {
        self.0.fetch_word()
    }

    fn pc(&self) -> u32 {
        self.0.pc
    }
}

/// Snapshot of the programmer-visible registers. `a[7]` is the active stack
/// pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub d: [u32; 8],
    pub a: [u32; 8],
    pub ssp: u32,
    pub usp: u32,
    pub pc: u32,
    pub sr: u16,
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.d.iter().enumerate() {
            let sep = if i % 4 == 3 { "\n" } else { " " };
            write!(f, "D{i}={value:08X}{sep}")?;
        }
        for (i, value) in self.a.iter().enumerate() {
            let sep = if i % 4 == 3 { "\n" } else { " " };
            write!(f, "A{i}={value:08X}{sep}")?;
        }
        let flag = |mask: u16, c: char| if self.sr & mask != 0 { c } else { '-' };
        write!(
            f,
            "PC={:08X} SR={:04X} SSP={:08X} USP={:08X} {}{}{}{}{}{}",
            self.pc,
            self.sr,
            self.ssp,
            self.usp,
            flag(SR_S, 'S'),
            flag(FLAG_X, 'X'),
            flag(FLAG_N, 'N'),
            flag(FLAG_Z, 'Z'),
            flag(FLAG_V, 'V'),
            flag(FLAG_C, 'C'),
        )
    }
}
