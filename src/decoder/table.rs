//! Declarative instruction pattern table and the generic matcher over it.

use super::ea::{EaMode, EffectiveAddress, IndexRegister, ModeSet, check_ea_modes, decode_ea_field};
use super::{
    AddrReg, Condition, DataReg, Exg, ExtMode, ExtensionWords, InstructionKind, Size,
    UspDirection, fields,
};

/// Opcode fields a pattern pulls out of the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Cond,
    /// Condition of a Bcc, which may not be T or F.
    BranchCond,
    RegX,
    RegY,
    Vector,
    /// Mode-Y/register-Y operand.
    Ea1,
    /// Mode-X/register-X operand.
    Ea2,
}

/// Extension word consumed right after the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtWord {
    /// Inline 8-bit offset if nonzero, else a following 16-bit word.
    BranchOffset,
    Imm16,
    Imm32,
}

/// Values extracted while matching one instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct Operands {
    pub condition: Option<Condition>,
    pub reg_x: u8,
    pub reg_y: u8,
    pub vector: u8,
    pub ea: [Option<EffectiveAddress>; 2],
    /// Branch offsets are stored sign-extended.
    pub ext: u32,
}

pub struct Pattern {
    pub name: &'static str,
    pub mask: u16,
    pub value: u16,
    pub fields: &'static [Field],
    pub ext: Option<ExtWord>,
    pub modes: [ModeSet; 2],
    /// Operand size governing immediates.
    pub size: Size,
    builder: fn(&Operands) -> Option<InstructionKind>,
}

impl Pattern {
    /// Static check of the opcode word alone: fixed bits, field validity and
    /// addressing mode legality.
    pub fn accepts(&self, word: u16) -> bool {
        if word & self.mask != self.value {
            return false;
        }
        let mut slots = [None, None];
        for field in self.fields {
            match field {
                Field::BranchCond if fields::cond(word) < 2 => return false,
                Field::Ea1 => match decode_ea_field(fields::mode_y(word), fields::reg_y(word)) {
                    Some(mode) => slots[0] = Some(mode),
                    None => return false,
                },
                Field::Ea2 => match decode_ea_field(fields::mode_x(word), fields::reg_x(word)) {
                    Some(mode) => slots[1] = Some(mode),
                    None => return false,
                },
                _ => {}
            }
        }
        check_ea_modes(slots, self.modes)
    }

    /// Extracts fields, then consumes the extension word, then materialises
    /// EA1 and EA2 in that order.
    pub(super) fn operands<S: ExtensionWords + ?Sized>(
        &self,
        stream: &mut S,
        word: u16,
    ) -> Result<Operands, S::Error> {
        let mut ops = Operands::default();
        let mut slots: [Option<(EaMode, u8)>; 2] = [None, None];

        for field in self.fields {
            match field {
                Field::Cond | Field::BranchCond => {
                    ops.condition = Some(Condition::from(fields::cond(word)))
                }
                Field::RegX => ops.reg_x = fields::reg_x(word),
                Field::RegY => ops.reg_y = fields::reg_y(word),
                Field::Vector => ops.vector = fields::vector(word),
                Field::Ea1 => {
                    let reg = fields::reg_y(word);
                    slots[0] = decode_ea_field(fields::mode_y(word), reg).map(|mode| (mode, reg));
                }
                Field::Ea2 => {
                    let reg = fields::reg_x(word);
                    slots[1] = decode_ea_field(fields::mode_x(word), reg).map(|mode| (mode, reg));
                }
            }
        }

        if let Some(ext) = self.ext {
            ops.ext = match ext {
                ExtWord::BranchOffset => match fields::imm8(word) {
                    0 => stream.next_word()? as i16 as i32 as u32,
                    offset => offset as i8 as i32 as u32,
                },
                ExtWord::Imm16 => stream.next_word()? as u32,
                ExtWord::Imm32 => stream.next_long()?,
            };
        }

        for (slot, ea) in slots.into_iter().zip(ops.ea.iter_mut()) {
            if let Some((mode, reg)) = slot {
                *ea = Some(materialize(stream, mode, reg, self.size)?);
            }
        }
        Ok(ops)
    }

    pub(super) fn build(&self, ops: &Operands) -> Option<InstructionKind> {
        (self.builder)(ops)
    }
}

/// Second decode pass for one operand: reads whatever extension words its
/// mode needs.
pub fn materialize<S: ExtensionWords + ?Sized>(
    stream: &mut S,
    mode: EaMode,
    reg: u8,
    size: Size,
) -> Result<EffectiveAddress, S::Error> {
    let an = AddrReg::from_bits(reg);
    Ok(match mode {
        EaMode::Dreg => EffectiveAddress::Dr(DataReg::from_bits(reg)),
        EaMode::Areg => EffectiveAddress::Ar(an),
        EaMode::AregInd => EffectiveAddress::Addr(an),
        EaMode::Postinc => EffectiveAddress::AddrPostIncr(an),
        EaMode::Predec => EffectiveAddress::AddrPreDecr(an),
        EaMode::Disp => EffectiveAddress::AddrDisplace {
            reg: an,
            displacement: stream.next_word()? as i16 as i32,
        },
        EaMode::Index => {
            let (index, displacement) = IndexRegister::from_extension(stream.next_word()?);
            EffectiveAddress::AddrIndex {
                reg: an,
                displacement,
                index,
            }
        }
        EaMode::AbsW => EffectiveAddress::AbsShort(stream.next_word()? as i16 as i32 as u32),
        EaMode::AbsL => EffectiveAddress::AbsLong(stream.next_long()?),
        EaMode::PcDisp => {
            let base = stream.pc();
            EffectiveAddress::PCDisplace {
                base,
                displacement: stream.next_word()? as i16 as i32,
            }
        }
        EaMode::PcIndex => {
            let base = stream.pc();
            let (index, displacement) = IndexRegister::from_extension(stream.next_word()?);
            EffectiveAddress::PCIndex {
                base,
                displacement,
                index,
            }
        }
        EaMode::Imm => EffectiveAddress::Immediate(match size {
            // Byte immediates still occupy a full word.
            Size::Byte => stream.next_word()? as u32 & 0xFF,
            Size::Word => stream.next_word()? as u32,
            Size::Long => stream.next_long()?,
        }),
    })
}

/// Turns a 16 character template of `0`, `1` and field letters into a
/// mask/value pair.
const fn template(bits: &str) -> (u16, u16) {
    let bytes = bits.as_bytes();
    assert!(bytes.len() == 16, "pattern template must be 16 characters");
    let mut mask = 0u16;
    let mut value = 0u16;
    let mut i = 0;
    while i < 16 {
        let bit = 1u16 << (15 - i);
        match bytes[i] {
            b'0' => mask |= bit,
            b'1' => {
                mask |= bit;
                value |= bit;
            }
            _ => {}
        }
        i += 1;
    }
    (mask, value)
}

const fn pattern(
    name: &'static str,
    bits: &str,
    fields: &'static [Field],
    ext: Option<ExtWord>,
    modes: [ModeSet; 2],
    size: Size,
    builder: fn(&Operands) -> Option<InstructionKind>,
) -> Pattern {
    let (mask, value) = template(bits);
    Pattern {
        name,
        mask,
        value,
        fields,
        ext,
        modes,
        size,
        builder,
    }
}

const NO_EA: [ModeSet; 2] = [ModeSet::NONE, ModeSet::NONE];
const CONTROL_EA: [ModeSet; 2] = [ModeSet::CONTROL, ModeSet::NONE];

fn dn_y(ops: &Operands) -> DataReg {
    DataReg::from_bits(ops.reg_y)
}

fn an_y(ops: &Operands) -> AddrReg {
    AddrReg::from_bits(ops.reg_y)
}

/// Priority-ordered; the first pattern that accepts a word decodes it.
pub static PATTERNS: &[Pattern] = &[
    // Branch
    pattern("bra", "01100000bbbbbbbb", &[], Some(ExtWord::BranchOffset), NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Bra { displacement: ops.ext as i32 })
    }),
    pattern("bsr", "01100001bbbbbbbb", &[], Some(ExtWord::BranchOffset), NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Bsr { displacement: ops.ext as i32 })
    }),
    pattern(
        "bcc",
        "0110aaaabbbbbbbb",
        &[Field::BranchCond],
        Some(ExtWord::BranchOffset),
        NO_EA,
        Size::Word,
        |ops| {
            Some(InstructionKind::Bcc {
                condition: ops.condition?,
                displacement: ops.ext as i32,
            })
        },
    ),
    pattern(
        "dbcc",
        "0101aaaa11001bbb",
        &[Field::Cond, Field::RegY],
        Some(ExtWord::Imm16),
        NO_EA,
        Size::Word,
        |ops| {
            Some(InstructionKind::DBcc {
                condition: ops.condition?,
                data_reg: dn_y(ops),
                displacement: ops.ext as u16 as i16,
            })
        },
    ),
    // Misc (0100)
    pattern("lea", "0100aaa111bbbbbb", &[Field::RegX, Field::Ea1], None, CONTROL_EA, Size::Long, |ops| {
        Some(InstructionKind::Lea {
            src: ops.ea[0]?,
            dst: AddrReg::from_bits(ops.reg_x),
        })
    }),
    pattern("pea", "0100100001aaaaaa", &[Field::Ea1], None, CONTROL_EA, Size::Long, |ops| {
        Some(InstructionKind::Pea { mode: ops.ea[0]? })
    }),
    pattern("jmp", "0100111011aaaaaa", &[Field::Ea1], None, CONTROL_EA, Size::Long, |ops| {
        Some(InstructionKind::Jmp { mode: ops.ea[0]? })
    }),
    pattern("jsr", "0100111010aaaaaa", &[Field::Ea1], None, CONTROL_EA, Size::Long, |ops| {
        Some(InstructionKind::Jsr { mode: ops.ea[0]? })
    }),
    pattern("link", "0100111001010aaa", &[Field::RegY], Some(ExtWord::Imm16), NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Link {
            addr_reg: an_y(ops),
            displacement: ops.ext as u16 as i16,
        })
    }),
    pattern("unlk", "0100111001011aaa", &[Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Unlk { addr_reg: an_y(ops) })
    }),
    pattern("swap", "0100100001000aaa", &[Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Swap { data_reg: dn_y(ops) })
    }),
    pattern("move to usp", "0100111001100aaa", &[Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::MoveUsp {
            addr_reg: an_y(ops),
            direction: UspDirection::RegToUsp,
        })
    }),
    pattern("move from usp", "0100111001101aaa", &[Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::MoveUsp {
            addr_reg: an_y(ops),
            direction: UspDirection::UspToReg,
        })
    }),
    pattern("ext.w", "0100100010000bbb", &[Field::RegY], None, NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Ext {
            data_reg: dn_y(ops),
            mode: ExtMode::ByteToWord,
        })
    }),
    pattern("ext.l", "0100100011000bbb", &[Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Ext {
            data_reg: dn_y(ops),
            mode: ExtMode::WordToLong,
        })
    }),
    pattern("trap", "010011100100aaaa", &[Field::Vector], None, NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Trap { vector: ops.vector })
    }),
    pattern("trapv", "0100111001110110", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::TrapV)),
    // Exchange
    pattern("exg dd", "1100aaa101000ccc", &[Field::RegX, Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Exg(Exg::DataData {
            rx: DataReg::from_bits(ops.reg_x),
            ry: dn_y(ops),
        }))
    }),
    pattern("exg aa", "1100aaa101001ccc", &[Field::RegX, Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Exg(Exg::AddrAddr {
            rx: AddrReg::from_bits(ops.reg_x),
            ry: an_y(ops),
        }))
    }),
    pattern("exg da", "1100aaa110001ccc", &[Field::RegX, Field::RegY], None, NO_EA, Size::Long, |ops| {
        Some(InstructionKind::Exg(Exg::DataAddr {
            data: DataReg::from_bits(ops.reg_x),
            addr: an_y(ops),
        }))
    }),
    // No fields
    pattern("illegal", "0100101011111100", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Illegal)),
    pattern("nop", "0100111001110001", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Nop)),
    pattern("rts", "0100111001110101", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Rts)),
    pattern("rtr", "0100111001110111", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Rtr)),
    pattern("reset", "0100111001110000", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Reset)),
    pattern("rte", "0100111001110011", &[], None, NO_EA, Size::Word, |_| Some(InstructionKind::Rte)),
    pattern("stop", "0100111001110010", &[], Some(ExtWord::Imm16), NO_EA, Size::Word, |ops| {
        Some(InstructionKind::Stop { sr: ops.ext as u16 })
    }),
    // Data movement
    pattern(
        "move.b",
        "0001aaaaaabbbbbb",
        &[Field::Ea2, Field::Ea1],
        None,
        [ModeSet::DATA, ModeSet::DATA_ALTERABLE],
        Size::Byte,
        |ops| {
            Some(InstructionKind::MoveB {
                src: ops.ea[0]?,
                dst: ops.ea[1]?,
            })
        },
    ),
];
