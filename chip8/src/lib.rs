mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod display;
mod error;
mod vm;

pub use self::{
    bytecode::Opcode,
    clock::{Hz, Schedule, Scheduler},
    devices::{InvalidKeyCode, KeyCode, KeyMap},
    disasm::{Disassembler, Instr},
    display::{compose, Color, FrameBuffer, Palette, Surface},
    error::{Chip8Error, Chip8Result, RangeKind},
};

/// Version of this implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read-only view of the display buffer, one `bool` per pixel, row by row.
pub type Chip8DisplayBuffer<'a> = &'a [bool; constants::DISPLAY_BUFFER_SIZE];

pub mod prelude {
    pub use super::{
        cpu::Chip8Cpu,
        disasm::Disassembler,
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow, Quirks},
        Palette, Surface,
    };
}
