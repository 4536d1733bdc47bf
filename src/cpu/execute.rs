use super::{Cpu, Exec, FLAG_C, FLAG_N, FLAG_V, FLAG_Z, Fault, Vector};
use crate::bus::{Bus, Direction};
use crate::decoder::{
    AddrReg, Condition, DataReg, EffectiveAddress, Exg, ExtMode, Instruction, InstructionKind,
    Size, UspDirection,
};

impl<B: Bus> Cpu<B> {
    pub(super) fn execute(&mut self, inst: &Instruction) -> Exec<()> {
        match inst.kind {
            InstructionKind::Nop => Ok(()),
            InstructionKind::MoveB { src, dst } => self.exec_move_b(&src, &dst),
            InstructionKind::Bra { .. } => self.exec_bra(inst),
            InstructionKind::Bsr { .. } => self.exec_bsr(inst),
            InstructionKind::Bcc { condition, .. } => self.exec_bcc(inst, condition),
            InstructionKind::DBcc {
                condition,
                data_reg,
                ..
            } => self.exec_dbcc(inst, condition, data_reg),
            InstructionKind::Lea { src, dst } => self.exec_lea(&src, dst),
            InstructionKind::Pea { mode } => self.exec_pea(&mode),
            InstructionKind::Jmp { mode } => self.exec_jmp(inst, &mode),
            InstructionKind::Jsr { mode } => self.exec_jsr(&mode),
            InstructionKind::Link {
                addr_reg,
                displacement,
            } => self.exec_link(addr_reg, displacement),
            InstructionKind::Unlk { addr_reg } => self.exec_unlk(addr_reg),
            InstructionKind::Swap { data_reg } => {
                self.exec_swap(data_reg);
                Ok(())
            }
            InstructionKind::Ext { data_reg, mode } => {
                self.exec_ext(data_reg, mode);
                Ok(())
            }
            InstructionKind::MoveUsp {
                addr_reg,
                direction,
            } => self.exec_move_usp(addr_reg, direction),
            InstructionKind::Exg(exg) => {
                self.exec_exg(exg);
                Ok(())
            }
            InstructionKind::Trap { vector } => Err(Fault::new(Vector::trap(vector)).into()),
            InstructionKind::TrapV => self.exec_trapv(),
            InstructionKind::Rts => self.exec_rts(),
            InstructionKind::Rtr => self.exec_rtr(),
            InstructionKind::Rte => self.exec_rte(),
            InstructionKind::Illegal => Err(Fault::new(Vector::ILLEGAL_INSTRUCTION).into()),
            InstructionKind::Reset => self.exec_reset(),
            InstructionKind::Stop { sr } => self.exec_stop(sr),
        }
    }

    fn require_supervisor(&self) -> Exec<()> {
        if self.is_supervisor() {
            Ok(())
        } else {
            Err(Fault::new(Vector::PRIVILEGE_VIOLATION).into())
        }
    }

    fn test_condition(&self, condition: Condition) -> bool {
        let n = self.get_flag(FLAG_N);
        let z = self.get_flag(FLAG_Z);
        let v = self.get_flag(FLAG_V);
        let c = self.get_flag(FLAG_C);

        match condition {
            Condition::True => true,
            Condition::False => false,
            Condition::Higher => !c && !z,            // HI: !C && !Z
            Condition::LowerOrSame => c || z,         // LS: C || Z
            Condition::CarryClear => !c,              // CC: !C
            Condition::CarrySet => c,                 // CS: C
            Condition::NotEqual => !z,                // NE: !Z
            Condition::Equal => z,                    // EQ: Z
            Condition::OverflowClear => !v,           // VC: !V
            Condition::OverflowSet => v,              // VS: V
            Condition::Plus => !n,                    // PL: !N
            Condition::Minus => n,                    // MI: N
            Condition::GreaterOrEqual => n == v,      // GE: N == V
            Condition::LessThan => n != v,            // LT: N != V
            Condition::GreaterThan => !z && (n == v), // GT: !Z && (N == V)
            Condition::LessOrEqual => z || (n != v),  // LE: Z || (N != V)
        }
    }

    fn update_nz_flags_sized(&mut self, value: u32, size: Size) {
        self.set_flag(FLAG_Z, value & size.mask() == 0);
        self.set_flag(FLAG_N, value & size.sign_bit() != 0);
    }

    /// Sets N/Z from `value` and clears V/C.
    fn set_logic_flags(&mut self, value: u32, size: Size) {
        self.update_nz_flags_sized(value, size);
        self.set_flag(FLAG_V, false);
        self.set_flag(FLAG_C, false);
    }

    /// Takes a PC-relative branch. An odd target leaves PC just past the
    /// opcode word and raises an address error.
    fn jump_from(&mut self, inst: &Instruction, target: u32) -> Exec<()> {
        if target & 1 != 0 {
            self.pc = inst.address.wrapping_add(2);
            return Err(self.program_address_error(target));
        }
        self.pc = target;
        Ok(())
    }

    fn return_to(&mut self, target: u32) -> Exec<()> {
        if target & 1 != 0 {
            return Err(self.program_address_error(target));
        }
        self.pc = target;
        Ok(())
    }

    fn branch_target(inst: &Instruction) -> Exec<u32> {
        inst.branch_target()
            .ok_or_else(|| Fault::new(Vector::ILLEGAL_INSTRUCTION).into())
    }

    // MOVE.B - Move Byte
    fn exec_move_b(&mut self, src: &EffectiveAddress, dst: &EffectiveAddress) -> Exec<()> {
        let value = self.read_ea(src, Size::Byte)?;
        self.write_ea(dst, Size::Byte, value)?;
        self.set_logic_flags(value, Size::Byte);
        Ok(())
    }

    // BRA - Branch Always
    fn exec_bra(&mut self, inst: &Instruction) -> Exec<()> {
        let target = Self::branch_target(inst)?;
        self.jump_from(inst, target)
    }

    // BSR - Branch to Subroutine
    fn exec_bsr(&mut self, inst: &Instruction) -> Exec<()> {
        let target = Self::branch_target(inst)?;
        self.push_long(self.pc)?;
        // The return address is already stacked; the fault reports the target.
        self.pc = target;
        if target & 1 != 0 {
            return Err(self.program_address_error(target));
        }
        Ok(())
    }

    // Bcc - Branch Conditionally
    fn exec_bcc(&mut self, inst: &Instruction, condition: Condition) -> Exec<()> {
        if !self.test_condition(condition) {
            return Ok(());
        }
        let target = Self::branch_target(inst)?;
        self.jump_from(inst, target)
    }

    // DBcc - Decrement and Branch on Condition
    fn exec_dbcc(&mut self, inst: &Instruction, condition: Condition, data_reg: DataReg) -> Exec<()> {
        if self.test_condition(condition) {
            return Ok(());
        }
        let target = Self::branch_target(inst)?;
        if target & 1 != 0 {
            return Err(self.program_address_error(target));
        }

        let value = self.data_reg(data_reg);
        let low_word = (value as u16).wrapping_sub(1);
        self.set_data_reg(data_reg, (value & 0xFFFF_0000) | low_word as u32);
        // Dn == -1 terminates the loop
        if low_word != 0xFFFF {
            self.pc = target;
        }
        Ok(())
    }

    // LEA - Load Effective Address
    fn exec_lea(&mut self, src: &EffectiveAddress, dst: AddrReg) -> Exec<()> {
        let addr = self.control_address(src)?;
        self.set_addr_reg(dst, addr);
        Ok(())
    }

    // PEA - Push Effective Address
    fn exec_pea(&mut self, mode: &EffectiveAddress) -> Exec<()> {
        let addr = self.control_address(mode)?;
        self.push_long(addr)
    }

    // JMP - Jump
    fn exec_jmp(&mut self, inst: &Instruction, mode: &EffectiveAddress) -> Exec<()> {
        let target = self.control_address(mode)?;
        self.jump_from(inst, target)
    }

    // JSR - Jump to Subroutine
    fn exec_jsr(&mut self, mode: &EffectiveAddress) -> Exec<()> {
        let target = self.control_address(mode)?;
        if target & 1 != 0 {
            return Err(self.program_address_error(target));
        }
        self.push_long(self.pc)?;
        self.pc = target;
        Ok(())
    }

    // LINK - Link and Allocate
    fn exec_link(&mut self, addr_reg: AddrReg, displacement: i16) -> Exec<()> {
        self.push_long(self.addr_reg(addr_reg))?;
        let sp = self.addr_reg(AddrReg::A7);
        self.set_addr_reg(addr_reg, sp);
        self.set_addr_reg(AddrReg::A7, sp.wrapping_add(displacement as i32 as u32));
        Ok(())
    }

    // UNLK - Unlink
    fn exec_unlk(&mut self, addr_reg: AddrReg) -> Exec<()> {
        let frame = self.addr_reg(addr_reg);
        if frame & 1 != 0 {
            self.pc = self.pc.wrapping_add(2);
            let fc = self.function_code(false);
            return Err(self
                .access_fault(Vector::ADDRESS_ERROR, frame, fc, Direction::Read)
                .into());
        }
        self.set_addr_reg(AddrReg::A7, frame);
        let saved = self.pop_long()?;
        self.set_addr_reg(addr_reg, saved);
        Ok(())
    }

    // SWAP - Swap Register Halves
    fn exec_swap(&mut self, data_reg: DataReg) {
        let result = self.data_reg(data_reg).rotate_left(16);
        self.set_data_reg(data_reg, result);
        self.set_logic_flags(result, Size::Long);
    }

    // EXT - Sign Extend
    fn exec_ext(&mut self, data_reg: DataReg, mode: ExtMode) {
        let value = self.data_reg(data_reg);
        let (result, size) = match mode {
            ExtMode::ByteToWord => {
                let extended = value as i8 as i16 as u16;
                ((value & 0xFFFF_0000) | extended as u32, Size::Word)
            }
            ExtMode::WordToLong => (value as i16 as i32 as u32, Size::Long),
        };
        self.set_data_reg(data_reg, result);
        self.set_logic_flags(result, size);
    }

    // MOVE USP - Move User Stack Pointer
    fn exec_move_usp(&mut self, addr_reg: AddrReg, direction: UspDirection) -> Exec<()> {
        self.require_supervisor()?;
        match direction {
            UspDirection::RegToUsp => self.usp = self.addr_reg(addr_reg),
            UspDirection::UspToReg => self.set_addr_reg(addr_reg, self.usp),
        }
        Ok(())
    }

    // EXG - Exchange Registers
    fn exec_exg(&mut self, exg: Exg) {
        match exg {
            Exg::DataData { rx, ry } => {
                let (x, y) = (self.data_reg(rx), self.data_reg(ry));
                self.set_data_reg(rx, y);
                self.set_data_reg(ry, x);
            }
            Exg::AddrAddr { rx, ry } => {
                let (x, y) = (self.addr_reg(rx), self.addr_reg(ry));
                self.set_addr_reg(rx, y);
                self.set_addr_reg(ry, x);
            }
            Exg::DataAddr { data, addr } => {
                let (x, y) = (self.data_reg(data), self.addr_reg(addr));
                self.set_data_reg(data, y);
                self.set_addr_reg(addr, x);
            }
        }
    }

    // TRAPV - Trap on Overflow
    fn exec_trapv(&mut self) -> Exec<()> {
        if self.get_flag(FLAG_V) {
            return Err(Fault::new(Vector::TRAPV).into());
        }
        Ok(())
    }

    // RTS - Return from Subroutine
    fn exec_rts(&mut self) -> Exec<()> {
        let target = self.pop_long()?;
        self.return_to(target)
    }

    // RTR - Return and Restore Condition Codes
    fn exec_rtr(&mut self) -> Exec<()> {
        let ccr = self.pop_word()?;
        self.set_ccr(ccr as u8);
        self.exec_rts()
    }

    // RTE - Return from Exception
    fn exec_rte(&mut self) -> Exec<()> {
        self.require_supervisor()?;
        let sr = self.pop_word()?;
        let target = self.pop_long()?;
        self.set_sr(sr);
        self.return_to(target)
    }

    // RESET - Reset External Devices
    fn exec_reset(&mut self) -> Exec<()> {
        self.require_supervisor()?;
        self.bus.reset_asserted()?;
        Ok(())
    }

    // STOP - Load Status Register and Stop
    fn exec_stop(&mut self, sr: u16) -> Exec<()> {
        self.require_supervisor()?;
        self.set_sr(sr);
        self.halted = true;
        Ok(())
    }
}
