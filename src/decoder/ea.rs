use super::{AddrReg, DataReg, Size};

/// The twelve 68000 addressing modes, before any extension word is read.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EaMode {
    Dreg,    // Dn            b000 reg
    Areg,    // An            b001 reg
    AregInd, // (An)          b010 reg
    Postinc, // (An)+         b011 reg
    Predec,  // -(An)         b100 reg
    Disp,    // (d16, An)     b101 reg
    Index,   // (d8, An, Xn)  b110 reg
    AbsW,    // (xxx).W       b111 b000
    AbsL,    // (xxx).L       b111 b001
    PcDisp,  // (d16, PC)     b111 b010
    PcIndex, // (d8, PC, Xn)  b111 b011
    Imm,     // #imm          b111 b100
}

impl EaMode {
    fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Maps the 3-bit mode and register fields to an addressing mode.
pub fn decode_ea_field(mode: u8, reg: u8) -> Option<EaMode> {
    match (mode & 0b111, reg & 0b111) {
        (0b000, _) => Some(EaMode::Dreg),
        (0b001, _) => Some(EaMode::Areg),
        (0b010, _) => Some(EaMode::AregInd),
        (0b011, _) => Some(EaMode::Postinc),
        (0b100, _) => Some(EaMode::Predec),
        (0b101, _) => Some(EaMode::Disp),
        (0b110, _) => Some(EaMode::Index),
        (0b111, 0b000) => Some(EaMode::AbsW),
        (0b111, 0b001) => Some(EaMode::AbsL),
        (0b111, 0b010) => Some(EaMode::PcDisp),
        (0b111, 0b011) => Some(EaMode::PcIndex),
        (0b111, 0b100) => Some(EaMode::Imm),
        _ => None,
    }
}

/// A set of addressing modes an instruction slot accepts.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ModeSet(u16);

impl ModeSet {
    pub const NONE: ModeSet = ModeSet(0);
    pub const ALL: ModeSet = ModeSet(0x0FFF);

    pub const DATA: ModeSet = ModeSet(Self::ALL.0 & !(1 << EaMode::Areg as u16));
    pub const CONTROL: ModeSet = ModeSet(
        1 << EaMode::AregInd as u16
            | 1 << EaMode::Disp as u16
            | 1 << EaMode::Index as u16
            | 1 << EaMode::PcDisp as u16
            | 1 << EaMode::PcIndex as u16
            | 1 << EaMode::AbsW as u16
            | 1 << EaMode::AbsL as u16,
    );
    pub const ALTERABLE: ModeSet = ModeSet(
        Self::ALL.0
            & !(1 << EaMode::PcDisp as u16)
            & !(1 << EaMode::PcIndex as u16)
            & !(1 << EaMode::Imm as u16),
    );
    pub const DATA_ALTERABLE: ModeSet = ModeSet(Self::DATA.0 & Self::ALTERABLE.0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, mode: EaMode) -> bool {
        self.0 & mode.bit() != 0
    }
}

/// Checks each present slot against its legal set. An empty set means the
/// instruction has no operand in that slot.
pub fn check_ea_modes(slots: [Option<EaMode>; 2], allowed: [ModeSet; 2]) -> bool {
    slots.iter().zip(allowed).all(|(slot, set)| {
        if set.is_empty() {
            return true;
        }
        slot.is_some_and(|mode| set.contains(mode))
    })
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Register {
    Data(DataReg),
    Address(AddrReg),
}

/// Index register of a `(d8, An, Xn)` or `(d8, PC, Xn)` operand.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct IndexRegister {
    pub reg: Register,
    pub size: Size, // Word (sign-extended) or Long
}

impl IndexRegister {
    /// Decodes a brief extension word. Returns the index register and the
    /// sign-extended 8-bit displacement held in the low byte.
    pub fn from_extension(word: u16) -> (Self, i32) {
        let number = super::fields::bit_range(word, 12, 15);
        let reg = if word & 0x8000 != 0 {
            Register::Address(AddrReg::from_bits(number))
        } else {
            Register::Data(DataReg::from_bits(number))
        };
        let size = if word & 0x0800 != 0 {
            Size::Long
        } else {
            Size::Word
        };
        (IndexRegister { reg, size }, word as u8 as i8 as i32)
    }
}

/// A fully materialised operand. Displacements are stored sign-extended and
/// PC-relative forms carry the PC value at their extension word.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EffectiveAddress {
    Dr(DataReg),
    Ar(AddrReg),
    Addr(AddrReg),
    AddrPostIncr(AddrReg),
    AddrPreDecr(AddrReg),
    AddrDisplace {
        reg: AddrReg,
        displacement: i32,
    },
    AddrIndex {
        reg: AddrReg,
        displacement: i32,
        index: IndexRegister,
    },
    AbsShort(u32),
    AbsLong(u32),
    PCDisplace {
        base: u32,
        displacement: i32,
    },
    PCIndex {
        base: u32,
        displacement: i32,
        index: IndexRegister,
    },
    Immediate(u32),
}

impl EffectiveAddress {
    pub fn mode(&self) -> EaMode {
        match self {
            EffectiveAddress::Dr(_) => EaMode::Dreg,
            EffectiveAddress::Ar(_) => EaMode::Areg,
            EffectiveAddress::Addr(_) => EaMode::AregInd,
            EffectiveAddress::AddrPostIncr(_) => EaMode::Postinc,
            EffectiveAddress::AddrPreDecr(_) => EaMode::Predec,
            EffectiveAddress::AddrDisplace { .. } => EaMode::Disp,
            EffectiveAddress::AddrIndex { .. } => EaMode::Index,
            EffectiveAddress::AbsShort(_) => EaMode::AbsW,
            EffectiveAddress::AbsLong(_) => EaMode::AbsL,
            EffectiveAddress::PCDisplace { .. } => EaMode::PcDisp,
            EffectiveAddress::PCIndex { .. } => EaMode::PcIndex,
            EffectiveAddress::Immediate(_) => EaMode::Imm,
        }
    }
}
