//! Disassembler.
use std::fmt::{self, Display, Formatter, Write as FmtWrite};

use crate::{bytecode::Opcode, constants::MEM_START};

/// Human readable mnemonic of a single instruction.
///
/// Words that don't decode to an instruction are shown as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr(pub Opcode);

impl Display for Instr {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Opcode { word, op, x, y, n, nn, nnn } = self.0;

        match (op, n) {
            (0x0, _) if word == 0x00E0 => write!(f, "CLS"),
            (0x0, _) if word == 0x00EE => write!(f, "RET"),
            (0x1, _) => write!(f, "JP 0x{nnn:03X}"),
            (0x2, _) => write!(f, "CALL 0x{nnn:03X}"),
            (0x3, _) => write!(f, "SE V{x:X}, 0x{nn:02X}"),
            (0x4, _) => write!(f, "SNE V{x:X}, 0x{nn:02X}"),
            (0x5, 0x0) => write!(f, "SE V{x:X}, V{y:X}"),
            (0x6, _) => write!(f, "LD V{x:X}, 0x{nn:02X}"),
            (0x7, _) => write!(f, "ADD V{x:X}, 0x{nn:02X}"),
            (0x8, 0x0) => write!(f, "LD V{x:X}, V{y:X}"),
            (0x8, 0x1) => write!(f, "OR V{x:X}, V{y:X}"),
            (0x8, 0x2) => write!(f, "AND V{x:X}, V{y:X}"),
            (0x8, 0x3) => write!(f, "XOR V{x:X}, V{y:X}"),
            (0x8, 0x4) => write!(f, "ADD V{x:X}, V{y:X}"),
            (0x8, 0x5) => write!(f, "SUB V{x:X}, V{y:X}"),
            (0x8, 0x6) => write!(f, "SHR V{x:X}, V{y:X}"),
            (0x8, 0x7) => write!(f, "SUBN V{x:X}, V{y:X}"),
            (0x8, 0xE) => write!(f, "SHL V{x:X}, V{y:X}"),
            (0x9, 0x0) => write!(f, "SNE V{x:X}, V{y:X}"),
            (0xA, _) => write!(f, "LD I, 0x{nnn:03X}"),
            (0xB, _) => write!(f, "JP V0, 0x{nnn:03X}"),
            (0xC, _) => write!(f, "RND V{x:X}, 0x{nn:02X}"),
            (0xD, _) => write!(f, "DRW V{x:X}, V{y:X}, {n}"),
            (0xE, _) if nn == 0x9E => write!(f, "SKP V{x:X}"),
            (0xE, _) if nn == 0xA1 => write!(f, "SKNP V{x:X}"),
            (0xF, _) => match nn {
                0x07 => write!(f, "LD V{x:X}, DT"),
                0x0A => write!(f, "LD V{x:X}, K"),
                0x15 => write!(f, "LD DT, V{x:X}"),
                0x18 => write!(f, "LD ST, V{x:X}"),
                0x1E => write!(f, "ADD I, V{x:X}"),
                0x29 => write!(f, "LD F, V{x:X}"),
                0x33 => write!(f, "LD B, V{x:X}"),
                0x55 => write!(f, "LD [I], V{x:X}"),
                0x65 => write!(f, "LD V{x:X}, [I]"),
                _    => write!(f, "DW 0x{word:04X}"),
            },
            _ => write!(f, "DW 0x{word:04X}"),
        }
    }
}

/// Listing of a program, one instruction word per line, addressed as it would be loaded.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self { bytecode }
    }

    /// Write the whole listing to the given writer.
    ///
    /// Programs interleave code and sprite data, so every word is decoded
    /// as an instruction. An odd trailing byte is shown as a data byte.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for (i, chunk) in self.bytecode.chunks(2).enumerate() {
            let offset = MEM_START + i * 2;
            match *chunk {
                [a, b] => {
                    let instr = Instr(Opcode::decode([a, b]));
                    writeln!(w, "0x{offset:04X} {a:02X}{b:02X} {instr}")?;
                }
                [a] => writeln!(w, "0x{offset:04X} {a:02X}   DB 0x{a:02X}")?,
                _ => unreachable!("chunks are never empty"),
            }
        }

        Ok(())
    }

    pub fn to_listing(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        self.disassemble(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mnemonic(word: u16) -> String {
        Instr(Opcode::from_word(word)).to_string()
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(mnemonic(0x00E0), "CLS");
        assert_eq!(mnemonic(0x00EE), "RET");
        assert_eq!(mnemonic(0x1228), "JP 0x228");
        assert_eq!(mnemonic(0x6A0A), "LD VA, 0x0A");
        assert_eq!(mnemonic(0x8014), "ADD V0, V1");
        assert_eq!(mnemonic(0x812E), "SHL V1, V2");
        assert_eq!(mnemonic(0xB300), "JP V0, 0x300");
        assert_eq!(mnemonic(0xD015), "DRW V0, V1, 5");
        assert_eq!(mnemonic(0xE3A1), "SKNP V3");
        assert_eq!(mnemonic(0xF40A), "LD V4, K");
        assert_eq!(mnemonic(0xF265), "LD V2, [I]");
    }

    #[test]
    fn test_unknown_words_are_data() {
        assert_eq!(mnemonic(0x0000), "DW 0x0000");
        assert_eq!(mnemonic(0x5121), "DW 0x5121");
        assert_eq!(mnemonic(0x800F), "DW 0x800F");
        assert_eq!(mnemonic(0xE19F), "DW 0xE19F");
        assert_eq!(mnemonic(0xF1FF), "DW 0xF1FF");
    }

    #[test]
    fn test_listing() {
        let listing = Disassembler::new(&[0x60, 0x0A, 0x80, 0x14, 0xF0])
            .to_listing()
            .unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0x0200 600A LD V0, 0x0A",
                "0x0202 8014 ADD V0, V1",
                "0x0204 F0   DB 0xF0",
            ]
        );
    }
}
