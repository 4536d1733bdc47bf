use thiserror::Error;

mod display;
pub mod ea;
pub mod fields;
mod table;

pub use display::Disassembly;
pub use ea::{EaMode, EffectiveAddress, IndexRegister, ModeSet, Register};
pub use table::{ExtWord, Field, PATTERNS, Pattern};

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Copy)]
pub enum InstructionKind {
    MoveB {
        src: EffectiveAddress,
        dst: EffectiveAddress,
    },
    Bra {
        displacement: i32,
    },
    Bsr {
        displacement: i32,
    },
    Bcc {
        condition: Condition,
        displacement: i32,
    },
    DBcc {
        condition: Condition,
        data_reg: DataReg,
        displacement: i16,
    },
    Lea {
        src: EffectiveAddress,
        dst: AddrReg,
    },
    Pea {
        mode: EffectiveAddress,
    },
    Jmp {
        mode: EffectiveAddress,
    },
    Jsr {
        mode: EffectiveAddress,
    },
    Link {
        addr_reg: AddrReg,
        displacement: i16,
    },
    Unlk {
        addr_reg: AddrReg,
    },
    Swap {
        data_reg: DataReg,
    },
    Ext {
        data_reg: DataReg,
        mode: ExtMode,
    },
    MoveUsp {
        addr_reg: AddrReg,
        direction: UspDirection,
    },
    Exg(Exg),
    Trap {
        vector: u8,
    },
    TrapV,
    Rts,
    Rtr,
    Rte,
    Nop,
    Illegal,
    Reset,
    Stop {
        sr: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UspDirection {
    RegToUsp, // MOVE An, USP
    UspToReg, // MOVE USP, An
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtMode {
    ByteToWord,
    WordToLong,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exg {
    DataData { rx: DataReg, ry: DataReg },
    AddrAddr { rx: AddrReg, ry: AddrReg },
    DataAddr { data: DataReg, addr: AddrReg },
}

/// One decoded instruction. `address` is where the opcode word was fetched
/// from; branch targets and several fault reports are relative to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub address: u32,
    pub opcode: u16,
    pub kind: InstructionKind,
}

impl Instruction {
    /// Branch target for the PC-relative control transfers.
    pub fn branch_target(&self) -> Option<u32> {
        let displacement = match self.kind {
            InstructionKind::Bra { displacement }
            | InstructionKind::Bsr { displacement }
            | InstructionKind::Bcc { displacement, .. } => displacement,
            InstructionKind::DBcc { displacement, .. } => displacement as i32,
            _ => return None,
        };
        Some(self.relative_target(displacement))
    }

    // Branch displacements count from the word after the opcode.
    fn relative_target(&self, displacement: i32) -> u32 {
        self.address
            .wrapping_add(2)
            .wrapping_add(displacement as u32)
    }

    /// Assembly text without the address prefix, as trace events carry it.
    pub fn disassembly(&self) -> Disassembly<'_> {
        Disassembly(self)
    }
}

/// Source of extension words following the opcode.
pub trait ExtensionWords {
    type Error;

    fn next_word(&mut self) -> Result<u16, Self::Error>;

    /// Address the next extension word will be read from.
    fn pc(&self) -> u32;

    fn next_long(&mut self) -> Result<u32, Self::Error> {
        let hi = self.next_word()?;
        let lo = self.next_word()?;
        Ok((hi as u32) << 16 | lo as u32)
    }
}

/// Decodes the instruction whose opcode word was fetched from `address`.
///
/// Returns `Ok(None)` when no pattern accepts the word. Errors come only from
/// the extension word source and are never treated as a pattern mismatch.
pub fn decode<S: ExtensionWords + ?Sized>(
    stream: &mut S,
    address: u32,
    opcode: u16,
) -> Result<Option<Instruction>, S::Error> {
    let Some(pattern) = PATTERNS.iter().find(|pattern| pattern.accepts(opcode)) else {
        return Ok(None);
    };
    let operands = pattern.operands(stream, opcode)?;
    Ok(pattern.build(&operands).map(|kind| Instruction {
        address,
        opcode,
        kind,
    }))
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataReg {
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
}

impl DataReg {
    pub const ALL: [DataReg; 8] = [
        DataReg::D0,
        DataReg::D1,
        DataReg::D2,
        DataReg::D3,
        DataReg::D4,
        DataReg::D5,
        DataReg::D6,
        DataReg::D7,
    ];

    /// Uses the low three bits of `value`.
    pub fn from_bits(value: u8) -> Self {
        Self::ALL[(value & 0b111) as usize]
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AddrReg {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
    A7,
}

impl AddrReg {
    pub const ALL: [AddrReg; 8] = [
        AddrReg::A0,
        AddrReg::A1,
        AddrReg::A2,
        AddrReg::A3,
        AddrReg::A4,
        AddrReg::A5,
        AddrReg::A6,
        AddrReg::A7,
    ];

    /// Uses the low three bits of `value`.
    pub fn from_bits(value: u8) -> Self {
        Self::ALL[(value & 0b111) as usize]
    }

    pub fn number(self) -> u8 {
        self as u8
    }
}

/// Register number outside `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid register number {0}")]
pub struct InvalidRegister(pub u8);

impl TryFrom<u8> for DataReg {
    type Error = InvalidRegister;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Self::from_bits(value)),
            _ => Err(InvalidRegister(value)),
        }
    }
}

impl TryFrom<u8> for AddrReg {
    type Error = InvalidRegister;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Self::from_bits(value)),
            _ => Err(InvalidRegister(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum Size {
    Byte, // .b
    Word, // .w
    Long, // .l
}

impl Size {
    pub fn bytes(self) -> u32 {
        match self {
            Size::Byte => 1,
            Size::Word => 2,
            Size::Long => 4,
        }
    }

    pub fn mask(self) -> u32 {
        match self {
            Size::Byte => 0xFF,
            Size::Word => 0xFFFF,
            Size::Long => 0xFFFF_FFFF,
        }
    }

    pub fn sign_bit(self) -> u32 {
        match self {
            Size::Byte => 0x80,
            Size::Word => 0x8000,
            Size::Long => 0x8000_0000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    True,           // T   b0000
    False,          // F   b0001
    Higher,         // HI  b0010
    LowerOrSame,    // LS  b0011
    CarryClear,     // CC  b0100
    CarrySet,       // CS  b0101
    NotEqual,       // NE  b0110
    Equal,          // EQ  b0111
    OverflowClear,  // VC  b1000
    OverflowSet,    // VS  b1001
    Plus,           // PL  b1010
    Minus,          // MI  b1011
    GreaterOrEqual, // GE  b1100
    LessThan,       // LT  b1101
    GreaterThan,    // GT  b1110
    LessOrEqual,    // LE  b1111
}

impl From<u8> for Condition {
    fn from(value: u8) -> Self {
        match value & 0xF {
            0b0000 => Self::True,
            0b0001 => Self::False,
            0b0010 => Self::Higher,
            0b0011 => Self::LowerOrSame,
            0b0100 => Self::CarryClear,
            0b0101 => Self::CarrySet,
            0b0110 => Self::NotEqual,
            0b0111 => Self::Equal,
            0b1000 => Self::OverflowClear,
            0b1001 => Self::OverflowSet,
            0b1010 => Self::Plus,
            0b1011 => Self::Minus,
            0b1100 => Self::GreaterOrEqual,
            0b1101 => Self::LessThan,
            0b1110 => Self::GreaterThan,
            0b1111 => Self::LessOrEqual,
            _ => unreachable!(),
        }
    }
}
