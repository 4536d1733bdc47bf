//! Bus cycles as the processor drives them: alignment checks, strobe
//! selection, function codes and the stack.

use super::{AccessFault, Cpu, Exec, ExecError, Fault, Vector};
use crate::bus::{Bus, BusError, DataStrobe, Direction, FunctionCode};
use crate::decoder::{AddrReg, Size};

/// The 68000 drives 24 address lines.
const ADDRESS_MASK: u32 = 0x00FF_FFFF;

impl<B: Bus> Cpu<B> {
    pub(super) fn function_code(&self, program: bool) -> FunctionCode {
        FunctionCode::new(self.is_supervisor(), program)
    }

    /// Builds a bus or address error record for an access to `address`.
    pub(super) fn access_fault(
        &self,
        vector: Vector,
        address: u32,
        fc: FunctionCode,
        direction: Direction,
    ) -> Fault {
        let mut status = fc.bits();
        if self.in_group0_or_1 {
            status |= 1 << 3; // I/N
        }
        if direction == Direction::Read {
            status |= 1 << 4; // R/W
        }
        Fault {
            vector,
            ir: self.ir,
            access: Some(AccessFault { address, status }),
        }
    }

    /// Address error for a control transfer to an odd `target`.
    pub(super) fn program_address_error(&self, target: u32) -> ExecError {
        self.access_fault(
            Vector::ADDRESS_ERROR,
            target,
            self.function_code(true),
            Direction::Read,
        )
        .into()
    }

    fn cycle_error(
        &self,
        err: BusError,
        address: u32,
        fc: FunctionCode,
        direction: Direction,
    ) -> ExecError {
        if err.is_device_fault() {
            self.access_fault(Vector::BUS_ERROR, address, fc, direction)
                .into()
        } else {
            ExecError::Bus(err)
        }
    }

    fn read_bus(&mut self, address: u32, strobe: DataStrobe, fc: FunctionCode) -> Exec<u16> {
        if address & 1 != 0 {
            return Err(self
                .access_fault(Vector::ADDRESS_ERROR, address, fc, Direction::Read)
                .into());
        }
        let result = match self.bus.assert_address(address & ADDRESS_MASK) {
            Ok(()) => self.bus.read_bus(strobe),
            Err(err) => Err(err),
        };
        result.map_err(|err| self.cycle_error(err, address, fc, Direction::Read))
    }

    fn write_bus(
        &mut self,
        address: u32,
        strobe: DataStrobe,
        fc: FunctionCode,
        value: u16,
    ) -> Exec<()> {
        if address & 1 != 0 {
            return Err(self
                .access_fault(Vector::ADDRESS_ERROR, address, fc, Direction::Write)
                .into());
        }
        let result = match self.bus.assert_address(address & ADDRESS_MASK) {
            Ok(()) => self.bus.write_bus(strobe, value),
            Err(err) => Err(err),
        };
        result.map_err(|err| self.cycle_error(err, address, fc, Direction::Write))
    }

    pub(super) fn read_byte(&mut self, address: u32, fc: FunctionCode) -> Exec<u8> {
        let strobe = DataStrobe::for_byte(address);
        let word = self.read_bus(address & !1, strobe, fc)?;
        Ok((word >> strobe.byte_shift()) as u8)
    }

    pub(super) fn read_word(&mut self, address: u32, fc: FunctionCode) -> Exec<u16> {
        self.read_bus(address, DataStrobe::Both, fc)
    }

    pub(super) fn read_long(&mut self, address: u32, fc: FunctionCode) -> Exec<u32> {
        let hi = self.read_bus(address, DataStrobe::Both, fc)?;
        let lo = self.read_bus(address.wrapping_add(2), DataStrobe::Both, fc)?;
        Ok((hi as u32) << 16 | lo as u32)
    }

    pub(super) fn read_sized(&mut self, address: u32, fc: FunctionCode, size: Size) -> Exec<u32> {
        match size {
            Size::Byte => self.read_byte(address, fc).map(u32::from),
            Size::Word => self.read_word(address, fc).map(u32::from),
            Size::Long => self.read_long(address, fc),
        }
    }

    pub(super) fn write_byte(&mut self, address: u32, fc: FunctionCode, value: u8) -> Exec<()> {
        let strobe = DataStrobe::for_byte(address);
        self.write_bus(
            address & !1,
            strobe,
            fc,
            (value as u16) << strobe.byte_shift(),
        )
    }

    pub(super) fn write_word(&mut self, address: u32, fc: FunctionCode, value: u16) -> Exec<()> {
        self.write_bus(address, DataStrobe::Both, fc, value)
    }

    pub(super) fn write_long(&mut self, address: u32, fc: FunctionCode, value: u32) -> Exec<()> {
        self.write_bus(address, DataStrobe::Both, fc, (value >> 16) as u16)?;
        self.write_bus(address.wrapping_add(2), DataStrobe::Both, fc, value as u16)
    }

    pub(super) fn write_sized(
        &mut self,
        address: u32,
        fc: FunctionCode,
        size: Size,
        value: u32,
    ) -> Exec<()> {
        match size {
            Size::Byte => self.write_byte(address, fc, value as u8),
            Size::Word => self.write_word(address, fc, value as u16),
            Size::Long => self.write_long(address, fc, value),
        }
    }

    /// Reads the word at PC with the program function code and advances PC.
    pub(super) fn fetch_word(&mut self) -> Exec<u16> {
        let fc = self.function_code(true);
        let word = self.read_word(self.pc, fc)?;
        self.pc = self.pc.wrapping_add(2);
        Ok(word)
    }

    // The stack pointer moves before a push is written, even if the write
    // faults; a pop only moves it once the read succeeded.

    pub(super) fn push_word(&mut self, value: u16) -> Exec<()> {
        let fc = self.function_code(false);
        let sp = self.addr_reg(AddrReg::A7).wrapping_sub(2);
        self.set_addr_reg(AddrReg::A7, sp);
        self.write_word(sp, fc, value)
    }

    pub(super) fn push_long(&mut self, value: u32) -> Exec<()> {
        let fc = self.function_code(false);
        let sp = self.addr_reg(AddrReg::A7).wrapping_sub(4);
        self.set_addr_reg(AddrReg::A7, sp);
        self.write_long(sp, fc, value)
    }

    pub(super) fn pop_word(&mut self) -> Exec<u16> {
        let fc = self.function_code(false);
        let sp = self.addr_reg(AddrReg::A7);
        let value = self.read_word(sp, fc)?;
        self.set_addr_reg(AddrReg::A7, sp.wrapping_add(2));
        Ok(value)
    }

    pub(super) fn pop_long(&mut self) -> Exec<u32> {
        let fc = self.function_code(false);
        let sp = self.addr_reg(AddrReg::A7);
        let value = self.read_long(sp, fc)?;
        self.set_addr_reg(AddrReg::A7, sp.wrapping_add(4));
        Ok(value)
    }
}
