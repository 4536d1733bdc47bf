//! Operand access through a materialised effective address.

use super::{Cpu, Exec, Fault, Vector};
use crate::bus::Bus;
use crate::decoder::{AddrReg, EffectiveAddress, IndexRegister, ModeSet, Register, Size};

impl<B: Bus> Cpu<B> {
    /// Postincrement/predecrement step. A7 stays word aligned.
    fn ea_step(size: Size, is_a7: bool) -> u32 {
        match size {
            Size::Byte if is_a7 => 2,
            _ => size.bytes(),
        }
    }

    fn index_value(&self, index: IndexRegister) -> u32 {
        let value = match index.reg {
            Register::Data(reg) => self.data_reg(reg),
            Register::Address(reg) => self.addr_reg(reg),
        };
        match index.size {
            Size::Word => value as u16 as i16 as i32 as u32,
            _ => value,
        }
    }

    /// Address a memory operand refers to. Postincrement and predecrement
    /// update their register as a side effect.
    pub(super) fn operand_address(&mut self, ea: &EffectiveAddress, size: Size) -> Exec<u32> {
        let addr = match *ea {
            EffectiveAddress::Addr(reg) => self.addr_reg(reg),
            EffectiveAddress::AddrPostIncr(reg) => {
                let addr = self.addr_reg(reg);
                let step = Self::ea_step(size, reg == AddrReg::A7);
                self.set_addr_reg(reg, addr.wrapping_add(step));
                addr
            }
            EffectiveAddress::AddrPreDecr(reg) => {
                let step = Self::ea_step(size, reg == AddrReg::A7);
                let addr = self.addr_reg(reg).wrapping_sub(step);
                self.set_addr_reg(reg, addr);
                addr
            }
            EffectiveAddress::AddrDisplace { reg, displacement } => {
                self.addr_reg(reg).wrapping_add(displacement as u32)
            }
            EffectiveAddress::AddrIndex {
                reg,
                displacement,
                index,
            } => self
                .addr_reg(reg)
                .wrapping_add(displacement as u32)
                .wrapping_add(self.index_value(index)),
            EffectiveAddress::AbsShort(addr) | EffectiveAddress::AbsLong(addr) => addr,
            EffectiveAddress::PCDisplace { base, displacement } => {
                base.wrapping_add(displacement as u32)
            }
            EffectiveAddress::PCIndex {
                base,
                displacement,
                index,
            } => base
                .wrapping_add(displacement as u32)
                .wrapping_add(self.index_value(index)),
            EffectiveAddress::Dr(_) | EffectiveAddress::Ar(_) | EffectiveAddress::Immediate(_) => {
                return Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into());
            }
        };
        Ok(addr)
    }

    /// Address of a control operand (LEA, PEA, JMP, JSR). Never touches
    /// memory.
    pub(super) fn control_address(&mut self, ea: &EffectiveAddress) -> Exec<u32> {
        if !ModeSet::CONTROL.contains(ea.mode()) {
            return Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into());
        }
        self.operand_address(ea, Size::Long)
    }

    pub(super) fn read_ea(&mut self, ea: &EffectiveAddress, size: Size) -> Exec<u32> {
        match *ea {
            EffectiveAddress::Dr(reg) => Ok(self.data_reg(reg) & size.mask()),
            EffectiveAddress::Ar(reg) => Ok(self.addr_reg(reg) & size.mask()),
            EffectiveAddress::Immediate(value) => Ok(value & size.mask()),
            _ => {
                let addr = self.operand_address(ea, size)?;
                let fc = self.function_code(false);
                self.read_sized(addr, fc, size)
            }
        }
    }

    pub(super) fn write_ea(&mut self, ea: &EffectiveAddress, size: Size, value: u32) -> Exec<()> {
        match *ea {
            EffectiveAddress::Dr(reg) => {
                let merged = write_sized_data_reg(self.data_reg(reg), value, size);
                self.set_data_reg(reg, merged);
                Ok(())
            }
            EffectiveAddress::Ar(reg) => {
                let value = match size {
                    Size::Byte => return Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into()),
                    Size::Word => value as u16 as i16 as i32 as u32,
                    Size::Long => value,
                };
                self.set_addr_reg(reg, value);
                Ok(())
            }
            EffectiveAddress::Immediate(_)
            | EffectiveAddress::PCDisplace { .. }
            | EffectiveAddress::PCIndex { .. } => {
                Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into())
            }
            _ => {
                let addr = self.operand_address(ea, size)?;
                let fc = self.function_code(false);
                self.write_sized(addr, fc, size, value)
            }
        }
    }
}

fn write_sized_data_reg(orig: u32, value: u32, size: Size) -> u32 {
    match size {
        Size::Byte => (orig & 0xFFFF_FF00) | (value & 0xFF),
        Size::Word => (orig & 0xFFFF_0000) | (value & 0xFFFF),
        Size::Long => value,
    }
}
