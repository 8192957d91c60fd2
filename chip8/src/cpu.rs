//! CPU and memory state.
use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Core state for a chip8 interpreter.
///
/// One instance holds everything a running program can observe or mutate.
/// Nothing is shared between instances, so loading a new program never
/// sees state from a previous session.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: usize,
    /// Address just past the last byte of the loaded program.
    ///
    /// Execution halts when the program counter reaches it.
    pub(crate) end: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,
    /// Set when a display refresh is due, consumed by the sprite draw instruction.
    pub(crate) draw_ready: bool,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Vec<Address>,
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,

    // ------------------------------------------------------------------------
    // Control
    /// Whether a program has been loaded.
    pub(crate) loaded: bool,
    /// Fatal error that stopped the machine.
    pub(crate) fault: Option<Chip8Error>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        Self {
            pc: MEM_START,
            end: MEM_START,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_state: 0,
            draw_ready: false,

            ram: Box::new([0; MEM_SIZE]),
            stack: Vec::new(),
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),

            loaded: false,
            fault: None,
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Return the machine to its power-on state, then load the font and the given program.
    ///
    /// A program that doesn't fit in memory leaves the machine blank and unloaded.
    pub fn reset(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        // Start with clean memory to avoid leaking previous program.
        self.clear_memory();
        self.pc = MEM_START;
        self.end = MEM_START;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_state = 0;
        self.draw_ready = false;
        self.loaded = false;
        self.fault = None;

        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
            });
        }

        let font = FONTSET_START as usize;
        self.ram[font..font + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
        self.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        self.end = MEM_START + bytecode.len();
        self.loaded = true;

        Ok(())
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.clear();
        self.display.fill(false);
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    // ------------------------------------------------------------------------
    // Bounded access

    #[inline]
    pub fn read_byte(&self, address: usize) -> Chip8Result<u8> {
        self.ram
            .get(address)
            .copied()
            .ok_or_else(|| Chip8Error::memory(address))
    }

    #[inline]
    pub fn write_byte(&mut self, address: usize, value: u8) -> Chip8Result<()> {
        match self.ram.get_mut(address) {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(Chip8Error::memory(address)),
        }
    }

    #[inline]
    pub fn register(&self, index: usize) -> Chip8Result<u8> {
        self.registers
            .get(index)
            .copied()
            .ok_or_else(|| Chip8Error::register(index))
    }

    #[inline]
    pub fn set_register(&mut self, index: usize, value: u8) -> Chip8Result<()> {
        match self.registers.get_mut(index) {
            Some(register) => {
                *register = value;
                Ok(())
            }
            None => Err(Chip8Error::register(index)),
        }
    }

    /// Extract the instruction at the current program counter.
    #[inline]
    pub fn fetch(&self) -> Chip8Result<[u8; 2]> {
        Ok([self.read_byte(self.pc)?, self.read_byte(self.pc + 1)?])
    }

    /// Set the VF flag register to 1 or 0.
    #[inline(always)]
    pub(crate) fn set_flag(&mut self, flag: bool) {
        self.registers[FLAG_REGISTER] = flag as u8;
    }

    // ------------------------------------------------------------------------
    // Observers

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Address just past the end of the loaded program.
    pub fn program_end(&self) -> usize {
        self.end
    }

    /// Value of the address register I.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn draw_ready(&self) -> bool {
        self.draw_ready
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_halted(&self) -> bool {
        self.pc >= self.end
    }

    pub fn display(&self) -> &[bool; DISPLAY_BUFFER_SIZE] {
        &self.display
    }

    /// Pixel at the given display coordinate. Out of bounds pixels are off.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        x < DISPLAY_WIDTH && y < DISPLAY_HEIGHT && self.display[x + y * DISPLAY_WIDTH]
    }

    // ------------------------------------------------------------------------
    // Keyboard

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            for k in 0..KEY_COUNT {
                if self.key_state(k) {
                    return Some(k);
                }
            }
        }
        None
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    // ------------------------------------------------------------------------
    // Timers

    /// Count down both timers, stopping at zero.
    #[inline]
    pub(crate) fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut cpu = Chip8Cpu::default();

        cpu.set_key_state(0, true);
        assert_eq!(cpu.key_state, 0b00000000_00000001);
        assert!(cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(!cpu.key_state(7));

        cpu.set_key_state(7, true);
        assert_eq!(cpu.key_state, 0b00000000_10000001);
        assert_eq!(cpu.first_key(), Some(0));

        cpu.set_key_state(0, false);
        assert_eq!(cpu.key_state, 0b00000000_10000000);
        assert_eq!(cpu.first_key(), Some(7));

        cpu.set_key_state(15, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(cpu.key_state(15));

        // Out of range keys are ignored.
        cpu.set_key_state(16, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(!cpu.key_state(16));

        cpu.clear_keys();
        assert_eq!(cpu.first_key(), None);
    }

    #[test]
    fn test_reset_loads_font_and_program() {
        let mut cpu = Chip8Cpu::new();
        cpu.reset(&[0x12, 0x34, 0x56]).unwrap();

        assert_eq!(cpu.pc(), MEM_START);
        assert_eq!(cpu.program_end(), MEM_START + 3);
        assert_eq!(cpu.read_byte(MEM_START).unwrap(), 0x12);
        assert_eq!(cpu.read_byte(MEM_START + 2).unwrap(), 0x56);
        assert_eq!(cpu.read_byte(0x050).unwrap(), 0xF0); // glyph 0
        assert_eq!(cpu.read_byte(0x09F).unwrap(), 0x80); // last row of glyph F
        assert_eq!(cpu.read_byte(0x0A0).unwrap(), 0x00);
        assert!(cpu.is_loaded());
    }

    #[test]
    fn test_reset_forgets_previous_session() {
        let mut cpu = Chip8Cpu::new();
        cpu.reset(&[0xAA; 16]).unwrap();
        cpu.registers[3] = 7;
        cpu.address = 0x300;
        cpu.delay_timer = 10;
        cpu.sound_timer = 10;
        cpu.stack.push(0x204);
        cpu.display[100] = true;
        cpu.set_key_state(4, true);
        cpu.draw_ready = true;
        cpu.pc = 0x208;

        cpu.reset(&[0x00, 0xE0]).unwrap();

        assert_eq!(cpu.registers, [0; REGISTER_COUNT]);
        assert_eq!(cpu.address(), 0);
        assert_eq!(cpu.delay_timer(), 0);
        assert_eq!(cpu.sound_timer(), 0);
        assert_eq!(cpu.stack_depth(), 0);
        assert!(cpu.display().iter().all(|px| !px));
        assert!(!cpu.any_key());
        assert!(!cpu.draw_ready());
        assert_eq!(cpu.pc(), MEM_START);
        assert_eq!(cpu.program_end(), MEM_START + 2);
        // Bytes of the larger previous program are gone.
        assert_eq!(cpu.read_byte(MEM_START + 2).unwrap(), 0);
    }

    #[test]
    fn test_reset_rejects_large_program() {
        let mut cpu = Chip8Cpu::new();
        cpu.reset(&[0xAA; 4]).unwrap();

        let program = vec![0; MAX_PROGRAM_SIZE + 1];
        assert_eq!(
            cpu.reset(&program),
            Err(Chip8Error::LargeProgram {
                size: MAX_PROGRAM_SIZE + 1
            })
        );
        assert!(!cpu.is_loaded());
        assert_eq!(cpu.read_byte(MEM_START).unwrap(), 0);

        // Exactly filling memory is fine.
        let program = vec![0; MAX_PROGRAM_SIZE];
        cpu.reset(&program).unwrap();
        assert_eq!(cpu.program_end(), MEM_SIZE);
    }

    #[test]
    fn test_bounded_access() {
        let mut cpu = Chip8Cpu::new();

        cpu.write_byte(0xFFF, 1).unwrap();
        assert_eq!(cpu.read_byte(0xFFF).unwrap(), 1);
        assert_eq!(cpu.read_byte(0x1000), Err(Chip8Error::memory(0x1000)));
        assert_eq!(cpu.write_byte(0x1000, 1), Err(Chip8Error::memory(0x1000)));

        cpu.set_register(0xF, 9).unwrap();
        assert_eq!(cpu.register(0xF).unwrap(), 9);
        assert_eq!(cpu.register(16), Err(Chip8Error::register(16)));
        assert_eq!(cpu.set_register(16, 0), Err(Chip8Error::register(16)));
    }

    #[test]
    fn test_timers_floor_at_zero() {
        let mut cpu = Chip8Cpu::new();
        cpu.delay_timer = 2;
        cpu.sound_timer = 1;

        cpu.tick_timers();
        assert_eq!((cpu.delay_timer(), cpu.sound_timer()), (1, 0));
        cpu.tick_timers();
        assert_eq!((cpu.delay_timer(), cpu.sound_timer()), (0, 0));
        cpu.tick_timers();
        assert_eq!((cpu.delay_timer(), cpu.sound_timer()), (0, 0));
    }
}
