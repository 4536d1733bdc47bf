//! Fixed-position field extractors over an instruction word.

/// Extracts bits `start..end` of `word`.
pub fn bit_range(word: u16, start: u8, end: u8) -> u8 {
    assert!(
        start <= end && end <= 16,
        "opcode field {start}..{end} does not fit in 16 bits"
    );
    let width = end - start;

    let mask = if width == 16 {
        0xFFFF
    } else {
        (1 << width) - 1
    };

    ((word >> start) & mask) as u8
}

pub fn cond(word: u16) -> u8 {
    bit_range(word, 8, 12) // ....XXXX........
}

pub fn reg_x(word: u16) -> u8 {
    bit_range(word, 9, 12) // ....XXX.........
}

pub fn reg_y(word: u16) -> u8 {
    bit_range(word, 0, 3) // .............XXX
}

pub fn mode_x(word: u16) -> u8 {
    bit_range(word, 6, 9) // .......XXX......
}

pub fn mode_y(word: u16) -> u8 {
    bit_range(word, 3, 6) // ..........XXX...
}

pub fn vector(word: u16) -> u8 {
    bit_range(word, 0, 4) // ............XXXX
}

pub fn imm8(word: u16) -> u8 {
    bit_range(word, 0, 8) // ........XXXXXXXX
}
