use super::{
    AddrReg, Condition, DataReg, EffectiveAddress, Exg, ExtMode, IndexRegister, Instruction,
    InstructionKind, Register, Size, UspDirection,
};
use std::fmt;

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Condition::True => "t",
            Condition::False => "f",
            Condition::Higher => "hi",
            Condition::LowerOrSame => "ls",
            Condition::CarryClear => "cc",
            Condition::CarrySet => "cs",
            Condition::NotEqual => "ne",
            Condition::Equal => "eq",
            Condition::OverflowClear => "vc",
            Condition::OverflowSet => "vs",
            Condition::Plus => "pl",
            Condition::Minus => "mi",
            Condition::GreaterOrEqual => "ge",
            Condition::LessThan => "lt",
            Condition::GreaterThan => "gt",
            Condition::LessOrEqual => "le",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Data(reg) => write!(f, "{reg}"),
            Register::Address(reg) => write!(f, "{reg}"),
        }
    }
}

/// An instruction rendered as assembly. Branches show their resolved target.
pub struct Disassembly<'a>(pub(super) &'a Instruction);

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inst = self.0;
        match &inst.kind {
            InstructionKind::Reset => write!(f, "reset"),
            InstructionKind::Nop => write!(f, "nop"),
            InstructionKind::Illegal => write!(f, "illegal"),
            InstructionKind::Rte => write!(f, "rte"),
            InstructionKind::Rts => write!(f, "rts"),
            InstructionKind::Rtr => write!(f, "rtr"),
            InstructionKind::TrapV => write!(f, "trapv"),
            InstructionKind::Trap { vector } => write!(f, "trap #{vector}"),
            InstructionKind::Stop { sr } => write!(f, "stop #0x{sr:04x}"),
            InstructionKind::MoveB { src, dst } => write!(f, "move.b {src}, {dst}"),
            InstructionKind::Jsr { mode } => write!(f, "jsr {mode}"),
            InstructionKind::Jmp { mode } => write!(f, "jmp {mode}"),
            InstructionKind::Pea { mode } => write!(f, "pea {mode}"),
            InstructionKind::Lea { src, dst } => write!(f, "lea {src}, {dst}"),
            InstructionKind::Bra { displacement } => {
                write!(f, "bra {:#x}", inst.relative_target(*displacement))
            }
            InstructionKind::Bsr { displacement } => {
                write!(f, "bsr {:#x}", inst.relative_target(*displacement))
            }
            InstructionKind::Bcc {
                condition,
                displacement,
            } => {
                let target = inst.relative_target(*displacement);
                write!(f, "b{condition} {target:#x}")
            }
            InstructionKind::DBcc {
                condition,
                data_reg,
                displacement,
            } => {
                let target = inst.relative_target(*displacement as i32);
                write!(f, "db{condition} {data_reg}, {target:#x}")
            }
            InstructionKind::Link {
                addr_reg,
                displacement,
            } => {
                write!(
                    f,
                    "link {}, #{}",
                    addr_reg,
                    format_signed_hex(*displacement as i32)
                )
            }
            InstructionKind::Unlk { addr_reg } => write!(f, "unlk {addr_reg}"),
            InstructionKind::Swap { data_reg } => write!(f, "swap {data_reg}"),
            InstructionKind::Ext { data_reg, mode } => match mode {
                ExtMode::ByteToWord => write!(f, "ext.w {data_reg}"),
                ExtMode::WordToLong => write!(f, "ext.l {data_reg}"),
            },
            InstructionKind::MoveUsp {
                addr_reg,
                direction,
            } => match direction {
                UspDirection::RegToUsp => write!(f, "move.l {addr_reg}, %usp"),
                UspDirection::UspToReg => write!(f, "move.l %usp, {addr_reg}"),
            },
            InstructionKind::Exg(exg) => match exg {
                Exg::DataData { rx, ry } => write!(f, "exg {rx}, {ry}"),
                Exg::AddrAddr { rx, ry } => write!(f, "exg {rx}, {ry}"),
                Exg::DataAddr { data, addr } => write!(f, "exg {data}, {addr}"),
            },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}: {}", self.address, self.disassembly())
    }
}

impl fmt::Display for DataReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%d{}", self.number())
    }
}

impl fmt::Display for AddrReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%a{}", self.number())
    }
}

impl fmt::Display for EffectiveAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EffectiveAddress::Dr(reg) => write!(f, "{reg}"),
            EffectiveAddress::Ar(reg) => write!(f, "{reg}"),
            EffectiveAddress::Addr(reg) => write!(f, "({reg})"),
            EffectiveAddress::AddrPostIncr(reg) => write!(f, "({reg})+"),
            EffectiveAddress::AddrPreDecr(reg) => write!(f, "-({reg})"),
            EffectiveAddress::AddrDisplace { reg, displacement } => {
                write!(f, "{}({reg})", format_signed_hex(displacement))
            }
            EffectiveAddress::AddrIndex {
                reg,
                displacement,
                index,
            } => f.write_str(&format_index_operand(&reg.to_string(), displacement, index)),
            EffectiveAddress::PCDisplace { displacement, .. } => {
                write!(f, "{}(%pc)", format_signed_hex(displacement))
            }
            EffectiveAddress::PCIndex {
                displacement,
                index,
                ..
            } => f.write_str(&format_index_operand("%pc", displacement, index)),
            EffectiveAddress::AbsShort(value) => write!(f, "0x{:04x}.w", value as u16),
            EffectiveAddress::AbsLong(value) => write!(f, "0x{value:08x}.l"),
            EffectiveAddress::Immediate(value) => write!(f, "#0x{value:x}"),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self {
            Size::Byte => ".b",
            Size::Word => ".w",
            Size::Long => ".l",
        };
        f.write_str(suffix)
    }
}

// Negative values are prefixed with a '-'.
pub fn format_signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-0x{:x}", (value as i64).unsigned_abs())
    } else {
        format!("0x{:x}", value)
    }
}

fn format_index_operand(base_reg: &str, displacement: i32, index: IndexRegister) -> String {
    let size_suffix = match index.size {
        Size::Long => ".l",
        _ => ".w",
    };
    if displacement == 0 {
        format!("({base_reg},{}{size_suffix})", index.reg)
    } else {
        format!(
            "{}({base_reg},{}{size_suffix})",
            format_signed_hex(displacement),
            index.reg
        )
    }
}
