//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::MAX_PROGRAM_SIZE;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chip8Error {
    /// Instruction word that doesn't decode to any known operation.
    UnknownOpcode { opcode: u16, address: usize },
    /// Return instruction executed with an empty call stack.
    StackUnderflow { address: usize },
    /// Memory address or register index outside of its domain.
    OutOfRange { kind: RangeKind, index: usize },
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram { size: usize },
    /// The VM was ticked before a program was loaded.
    NoProgram,
    Fmt(fmt::Error),
}

/// Which address space an out of range access targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Memory,
    Register,
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { opcode, address } => {
                write!(f, "unknown opcode {opcode:04X} at {address:04X}")
            }
            Self::StackUnderflow { address } => {
                write!(f, "call stack underflow at {address:04X}")
            }
            Self::OutOfRange { kind, index } => match kind {
                RangeKind::Memory => write!(f, "memory address {index:04X} out of range"),
                RangeKind::Register => write!(f, "register V{index:X} out of range"),
            },
            Self::LargeProgram { size } => write!(
                f,
                "program of {size} bytes too large for VM memory, limit is {MAX_PROGRAM_SIZE}"
            ),
            Self::NoProgram => write!(f, "no program loaded"),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

impl Chip8Error {
    /// Whether the error ends the session, as opposed to being a load problem
    /// the host can recover from by loading another program.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownOpcode { .. } | Self::StackUnderflow { .. } | Self::OutOfRange { .. }
        )
    }

    pub(crate) fn memory(address: usize) -> Self {
        Self::OutOfRange {
            kind: RangeKind::Memory,
            index: address,
        }
    }

    pub(crate) fn register(index: usize) -> Self {
        Self::OutOfRange {
            kind: RangeKind::Register,
            index,
        }
    }
}
