//! Virtual machine.
use std::fmt::{self, Write};

use rand::prelude::*;

use crate::{
    bytecode::Opcode,
    constants::*,
    cpu::Chip8Cpu,
    devices::KeyCode,
    display::{compose, Palette, Surface},
    error::{Chip8Error, Chip8Result},
    Chip8DisplayBuffer,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    conf: Chip8Conf,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng,
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Reset the machine and load the program at the start of program memory.
    ///
    /// Can be called again to switch programs. Nothing from the previous
    /// session survives, including a latched fault.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        log::debug!("load program: {} bytes", bytecode.len());

        if let Err(err) = self.cpu.reset(bytecode) {
            log::error!("failed to load program: {err}");
            return Err(err);
        }

        Ok(())
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }

    /// The program counter has reached the end of the loaded program.
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// The buzzer sounds while the sound timer is counting down.
    pub fn is_buzzing(&self) -> bool {
        self.cpu.sound_timer > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// A sprite was drawn to the display buffer.
    Draw,
    /// Sprite draw is waiting for the next render pass.
    ///
    /// The program counter was rewound so the draw is retried on the next tick.
    DrawWait,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed, and loads the key value into `Vx`.
    KeyWait,
    /// The program counter is past the end of the program. Nothing was executed.
    Halted,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
pub struct Chip8Conf {
    pub quirks: Quirks,
    /// Seed for the random number generator used by `Cxnn`.
    ///
    /// When unset the generator is seeded from system entropy.
    pub rng_seed: Option<u64>,
}

/// Points where Chip8 implementations historically disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Quirks {
    /// `8xy6` and `8xyE` copy VY into VX before shifting.
    pub shift_copy: bool,
    /// `Fx55` and `Fx65` leave I pointing past the last register transferred.
    pub store_load_increment: bool,
    /// Sprites are clipped at the display edges instead of wrapping around.
    pub clipping: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            shift_copy: true,
            store_load_increment: true,
            clipping: true,
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Execute one instruction.
    ///
    /// A fatal error stops the machine. Every following tick returns the
    /// same error until a program is loaded again.
    pub fn tick(&mut self) -> Chip8Result<Flow> {
        if let Some(err) = &self.cpu.fault {
            return Err(err.clone());
        }

        if !self.cpu.loaded {
            return Err(Chip8Error::NoProgram);
        }

        match self.step() {
            Ok(flow) => Ok(flow),
            Err(err) => {
                log::error!("machine stopped: {err}");
                self.cpu.fault = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Execute up to the given number of instructions, stopping early when the program halts.
    ///
    /// Returns the control flow of the last executed instruction.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.tick()?;
            if flow == Flow::Halted {
                break;
            }
        }

        Ok(flow)
    }

    /// Perform a render pass.
    ///
    /// Signals that sprites may be drawn again, counts down the delay and
    /// sound timers, and draws the display buffer to the surface.
    pub fn render<S>(&mut self, palette: &Palette, surface: &mut S)
    where
        S: Surface + ?Sized,
    {
        self.cpu.draw_ready = true;
        self.cpu.tick_timers();
        compose(&self.cpu.display, palette, surface);
    }

    fn step(&mut self) -> Chip8Result<Flow> {
        if self.cpu.is_halted() {
            return Ok(Flow::Halted);
        }

        let address = self.cpu.pc;
        let op = Opcode::decode(self.cpu.fetch()?);
        op_trace(address, op);

        // Skips compose with the already advanced counter.
        self.cpu.pc += 2;

        let (vx, vy) = (op.x as usize, op.y as usize);
        let mut control_flow = Flow::Ok;

        match op.op {
            // Miscellaneous instructions identified by nn
            0x0 | 0xE | 0xF => control_flow = self.exec_misc(op, address)?,
            // 1nnn (JP addr)
            //
            // Jump to address.
            0x1 => {
                self.cpu.pc = op.nnn as usize;
                control_flow = Flow::Jump;
            }
            // 2nnn (CALL addr)
            //
            // Call subroutine at NNN.
            0x2 => {
                self.cpu.stack.push(self.cpu.pc as Address);
                self.cpu.pc = op.nnn as usize;
                control_flow = Flow::Jump;
            }
            // 3xnn (SE Vx, byte)
            //
            // Skip the next instruction if register VX equals value NN.
            0x3 => {
                if self.cpu.registers[vx] == op.nn {
                    self.cpu.pc += 2;
                }
            }
            // 4xnn (SNE Vx, byte)
            //
            // Skip the next instruction if register VX does not equal value NN.
            0x4 => {
                if self.cpu.registers[vx] != op.nn {
                    self.cpu.pc += 2;
                }
            }
            // 5xy0 (SE Vx, Vy)
            //
            // Skip the next instruction if register VX equals value VY.
            0x5 if op.n == 0 => {
                if self.cpu.registers[vx] == self.cpu.registers[vy] {
                    self.cpu.pc += 2;
                }
            }
            // 6xnn (LD Vx, byte)
            //
            // Set register VX to value NN.
            0x6 => {
                self.cpu.registers[vx] = op.nn;
            }
            // 7xnn (ADD Vx, byte)
            //
            // Add value NN to register VX. Carry flag is not set.
            0x7 => {
                self.cpu.registers[vx] = self.cpu.registers[vx].wrapping_add(op.nn);
            }
            // Arithmetic instructions indentified by n
            0x8 => control_flow = self.exec_math(op, address)?,
            // 9xy0 (SNE Vx, Vy)
            //
            // Skip next instruction if Vx != Vy.
            0x9 if op.n == 0 => {
                if self.cpu.registers[vx] != self.cpu.registers[vy] {
                    self.cpu.pc += 2;
                }
            }
            // Annn (LD I, addr)
            //
            // Set address register I to value NNN.
            0xA => {
                self.cpu.address = op.nnn;
            }
            // Bnnn (JP V0, addr)
            //
            // Jump to address NNN offset by register V0.
            0xB => {
                self.cpu.pc = op.nnn as usize + self.cpu.registers[0] as usize;
                control_flow = Flow::Jump;
            }
            // Cxnn (RND Vx, byte)
            //
            // Set register VX to the result of bitwise AND between a random number and NN.
            0xC => {
                self.cpu.registers[vx] = op.nn & self.rng.gen::<u8>();
            }
            // Dxyn (DRW Vx, Vy, nibble)
            0xD => control_flow = self.exec_draw(op)?,
            // Unsupported operation.
            _ => return Err(unknown(op, address)),
        }

        Ok(control_flow)
    }

    /// Execute an arithmetic instruction
    #[inline]
    fn exec_math(&mut self, op: Opcode, address: usize) -> Chip8Result<Flow> {
        debug_assert_eq!(op.op, 0x8);

        let (vx, vy) = (op.x as usize, op.y as usize);
        let (x, y) = (self.cpu.registers[vx], self.cpu.registers[vy]);

        // Results are written before VF, so the flag wins when VX is VF.
        match op.n {
            // 8xy0 (LD Vx, Vy)
            //
            // Store the value of register VY in register VX.
            0x0 => {
                self.cpu.registers[vx] = y;
            }
            // 8xy1 (OR Vx, Vy)
            //
            // Bitwise OR of VX and VY, stored in VX. VF is reset.
            0x1 => {
                self.cpu.registers[vx] = x | y;
                self.cpu.set_flag(false);
            }
            // 8xy2 (AND Vx, Vy)
            0x2 => {
                self.cpu.registers[vx] = x & y;
                self.cpu.set_flag(false);
            }
            // 8xy3 (XOR Vx, Vy)
            0x3 => {
                self.cpu.registers[vx] = x ^ y;
                self.cpu.set_flag(false);
            }
            // 8xy4 (ADD Vx, Vy)
            //
            // ADDs VX to VY, and stores the result in VX.
            // Overflow is wrapped.
            // If overflow, set VF to 1, else 0.
            0x4 => {
                let (result, carry) = x.overflowing_add(y);
                self.cpu.registers[vx] = result;
                self.cpu.set_flag(carry);
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // Subtracts VY from VX, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x5 => {
                self.cpu.registers[vx] = x.wrapping_sub(y);
                self.cpu.set_flag(x >= y);
            }
            // 8xy6 (SHR Vx, Vy)
            //
            // Shift right by 1, VF is set to the bit shifted out.
            0x6 => {
                let value = if self.conf.quirks.shift_copy { y } else { x };
                self.cpu.registers[vx] = value >> 1;
                self.cpu.set_flag(value & 1 == 1);
            }
            // 8xy7 (SUBN Vx, Vy)
            //
            // Subtracts VX from VY, and stores the result in VX.
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            0x7 => {
                self.cpu.registers[vx] = y.wrapping_sub(x);
                self.cpu.set_flag(y >= x);
            }
            // 8xyE (SHL Vx, Vy)
            //
            // Shift left by 1, VF is set to the bit shifted out.
            0xE => {
                let value = if self.conf.quirks.shift_copy { y } else { x };
                self.cpu.registers[vx] = value << 1;
                self.cpu.set_flag(value >> 7 == 1);
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return Err(unknown(op, address)),
        }

        Ok(Flow::Ok)
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// Drawing waits for the render pass to signal that a display refresh is due.
    ///
    /// Pixels past the display edge are dropped when clipping, otherwise they wrap
    /// around to the other side.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn exec_draw(&mut self, op: Opcode) -> Chip8Result<Flow> {
        if !self.cpu.draw_ready {
            // rewind the program counter to retry on the next tick
            self.cpu.pc -= 2;
            return Ok(Flow::DrawWait);
        }
        self.cpu.draw_ready = false;

        let x = self.cpu.registers[op.x as usize] as usize % DISPLAY_WIDTH;
        let y = self.cpu.registers[op.y as usize] as usize % DISPLAY_HEIGHT;
        let clipping = self.conf.quirks.clipping;
        let mut is_erased = false;

        for r in 0..op.n as usize {
            let py = y + r;
            if clipping && py >= DISPLAY_HEIGHT {
                break;
            }
            let py = py % DISPLAY_HEIGHT;

            // Each row is 8 bits representing the 8 pixels of the sprite.
            let row = self.cpu.read_byte(self.cpu.address as usize + r)?;

            for c in 0..SPRITE_WIDTH {
                let px = x + c;
                if clipping && px >= DISPLAY_WIDTH {
                    break;
                }

                if (row >> (7 - c)) & 1 == 1 {
                    let d = (px % DISPLAY_WIDTH) + py * DISPLAY_WIDTH;

                    // XOR erases a pixel when both the old and new values are both 1.
                    is_erased |= self.cpu.display[d];
                    self.cpu.display[d] ^= true;
                }
            }
        }

        // If a pixel was erased, then a collision occurred.
        self.cpu.set_flag(is_erased);

        Ok(Flow::Draw)
    }

    /// Execute a miscellaneous instruction
    #[inline]
    fn exec_misc(&mut self, op: Opcode, address: usize) -> Chip8Result<Flow> {
        let vx = op.x as usize;
        let mut control_flow = Flow::Ok;

        match (op.op, op.nn) {
            // ----------------------------------------------------------------
            // 00E0 (CLS)
            //
            // Clear display
            (0x0, 0xE0) if op.x == 0 => {
                self.cpu.clear_display();
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Set the program counter to the value at the top of the stack.
            (0x0, 0xEE) if op.x == 0 => match self.cpu.stack.pop() {
                Some(return_address) => {
                    self.cpu.pc = return_address as usize;
                    control_flow = Flow::Jump;
                }
                None => return Err(Chip8Error::StackUnderflow { address }),
            },
            // ----------------------------------------------------------------
            // Ex9E (SKP Vx)
            //
            // Skip the next instruction if the key with the value of Vx is pressed.
            (0xE, 0x9E) => {
                if self.cpu.key_state(self.cpu.registers[vx]) {
                    self.cpu.pc += 2;
                }
            }
            // ExA1 (SKNP Vx)
            (0xE, 0xA1) => {
                if !self.cpu.key_state(self.cpu.registers[vx]) {
                    self.cpu.pc += 2;
                }
            }
            // ----------------------------------------------------------------
            // Fx07 (LD Vx, DT)
            //
            // The value of DT is placed into Vx.
            (0xF, 0x07) => {
                self.cpu.registers[vx] = self.cpu.delay_timer;
            }
            // Fx0A (LD Vx, K)
            //
            // Wait for a key press, store the value of the key in Vx.
            // All execution stops until a key is pressed, then the value of that key is stored in Vx.
            (0xF, 0x0A) => {
                if let Some(k) = self.cpu.first_key() {
                    self.cpu.registers[vx] = k;
                } else {
                    // rewind the program counter to stall the machine
                    self.cpu.pc -= 2;
                    control_flow = Flow::KeyWait;
                }
            }
            // Fx15 (LD DT, Vx)
            (0xF, 0x15) => {
                self.cpu.delay_timer = self.cpu.registers[vx];
            }
            // Fx18 (LD ST, Vx)
            (0xF, 0x18) => {
                self.cpu.sound_timer = self.cpu.registers[vx];
                control_flow = Flow::Sound;
            }
            // Fx1E (ADD I, Vx)
            //
            // Add Vx to I. VF is set when the result leaves the 12-bit address space.
            (0xF, 0x1E) => {
                let result = self.cpu.address as u32 + self.cpu.registers[vx] as u32;
                // I is 16 bits wide, so sums past 0xFFFF wrap around.
                self.cpu.address = result as Address;
                self.cpu.set_flag(result > ADDRESS_MASK as u32);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            (0xF, 0x29) => {
                let x = self.cpu.registers[vx] as Address;
                self.cpu.address = FONTSET_START + x * FONTSET_HEIGHT as Address;
            }
            // Fx33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            (0xF, 0x33) => {
                let addr = self.cpu.address as usize;
                let x = self.cpu.registers[vx];
                self.cpu.write_byte(addr,     x / 100)?;
                self.cpu.write_byte(addr + 1, x / 10 % 10)?;
                self.cpu.write_byte(addr + 2, x % 10)?;
            }
            // Fx55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I.
            (0xF, 0x55) => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx {
                    self.cpu.write_byte(addr + v, self.cpu.registers[v])?;
                }
                if self.conf.quirks.store_load_increment {
                    self.cpu.address = (addr + vx + 1) as Address;
                }
            }
            // Fx65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I.
            (0xF, 0x65) => {
                let addr = self.cpu.address as usize;
                for v in 0..=vx {
                    self.cpu.registers[v] = self.cpu.read_byte(addr + v)?;
                }
                if self.conf.quirks.store_load_increment {
                    self.cpu.address = (addr + vx + 1) as Address;
                }
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            _ => return Err(unknown(op, address)),
        }

        Ok(control_flow)
    }
}

#[inline]
fn unknown(op: Opcode, address: usize) -> Chip8Error {
    Chip8Error::UnknownOpcode {
        opcode: op.word,
        address,
    }
}

/// Troubleshooting
#[doc(hidden)]
impl Chip8Vm {
    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys:")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, " k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(address: usize, op: Opcode) {
    log::trace!("{:04X}: {}", address, crate::disasm::Instr(op));
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: usize, _: Opcode) {}
