//! Helpers for extracting data from opcodes.

/// Operand fields of a single two byte instruction.
///
/// Every field is extracted up front. Which of them are meaningful depends
/// on the opcode family in the upper nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    /// The whole big-endian instruction word.
    pub word: u16,
    /// Opcode family.
    pub op: u8, // 0xF000
    /// Register VX.
    pub x: u8, // 0x0F00
    /// Register VY, or sub-opcode.
    pub y: u8, // 0x00F0
    pub n: u8, // 0x000F
    pub nn: u8, // 0x00FF
    pub nnn: u16, // 0x0FFF
}

impl Opcode {
    /// Decode the two instruction bytes as they are laid out in memory.
    #[inline(always)]
    pub fn decode([a, b]: [u8; 2]) -> Self {
        Self {
            word: u16::from_be_bytes([a, b]),
            op: a >> 4,
            x: a & 0xF,
            y: b >> 4,
            n: b & 0xF,
            nn: b,
            nnn: ((a as u16 & 0xF) << 8) | b as u16,
        }
    }

    #[inline(always)]
    pub fn from_word(word: u16) -> Self {
        Self::decode(word.to_be_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_nibbles() {
        let op = Opcode::decode([0xD1, 0x2F]);
        assert_eq!(op.word, 0xD12F);
        assert_eq!(op.op, 0xD);
        assert_eq!(op.x, 0x1);
        assert_eq!(op.y, 0x2);
        assert_eq!(op.n, 0xF);
        assert_eq!(op.nn, 0x2F);
        assert_eq!(op.nnn, 0x12F);
    }

    #[test]
    fn test_from_word() {
        assert_eq!(Opcode::from_word(0xA2F0), Opcode::decode([0xA2, 0xF0]));
        assert_eq!(Opcode::from_word(0xA2F0).nnn, 0x2F0);
    }
}
