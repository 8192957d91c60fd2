//! Real time driver for the virtual machine.
use std::{
    io::{self, Write},
    thread,
    time::{Duration, Instant},
};

use chip8::{prelude::*, KeyCode, KeyMap, Scheduler};
use log::{debug, info};

use crate::{
    config::AppConfig,
    error::AppError,
    term::{KeyAction, KeyLatch, TermInput, TermSurface},
};

/// Pause between host iterations, leaving the CPU to other processes.
const IDLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

#[derive(Debug, Default)]
pub struct RunOptions {
    /// Stop after this many render passes.
    pub frames: Option<u64>,
    /// Redraw the terminal on every frame and read the keyboard.
    pub live: bool,
}

pub struct Host {
    vm: Chip8Vm,
    scheduler: Scheduler,
    palette: Palette,
    surface: TermSurface,
    keymap: KeyMap,
    latch: KeyLatch,
    /// Keys pressed for the whole run, which the keyboard never releases.
    held: Vec<KeyCode>,
    buzzing: bool,
    frames: u64,
}

impl Host {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            vm: Chip8Vm::new(config.vm_conf()),
            scheduler: Scheduler::new(config.tick_rate, config.frame_rate),
            palette: config.palette,
            surface: TermSurface::new(),
            keymap: config.keymap(),
            latch: KeyLatch::default(),
            held: vec![],
            buzzing: false,
            frames: 0,
        }
    }

    pub fn load_rom(&mut self, filepath: &str) -> Result<(), AppError> {
        let bytecode = std::fs::read(filepath)?;
        info!("loading {filepath} ({} bytes)", bytecode.len());
        self.load_bytecode(&bytecode)
    }

    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Result<(), AppError> {
        self.vm.load_bytecode(bytecode)?;
        self.scheduler.reset();
        self.buzzing = false;
        self.frames = 0;
        Ok(())
    }

    /// Keep the given keys pressed for the whole run.
    pub fn hold_keys(&mut self, keys: impl IntoIterator<Item = KeyCode>) {
        for key in keys {
            debug!("holding {key}");
            self.vm.set_key(key, true);
            self.held.push(key);
        }
    }

    pub fn keymap(&self) -> &KeyMap {
        &self.keymap
    }

    /// Press a key from the keyboard. It is released again once the hold runs out.
    pub fn press_key(&mut self, key: KeyCode, now: Instant) {
        self.vm.set_key(key, true);
        self.latch.press(key, now);
    }

    pub fn release_keys(&mut self, now: Instant) {
        for key in self.latch.release_due(now) {
            if !self.held.contains(&key) {
                self.vm.set_key(key, false);
            }
        }
    }

    pub fn vm(&self) -> &Chip8Vm {
        &self.vm
    }

    pub fn surface(&self) -> &TermSurface {
        &self.surface
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_buzzing(&self) -> bool {
        self.buzzing
    }

    /// Advance the machine by the elapsed wall time.
    pub fn step(&mut self, elapsed: Duration) -> Result<Status, AppError> {
        let schedule = self.scheduler.advance(elapsed);

        for _ in 0..schedule.ticks {
            if self.vm.tick()? == Flow::Halted {
                return Ok(Status::Halted);
            }
        }

        if schedule.frame {
            self.vm.render(&self.palette, &mut self.surface);
            self.frames += 1;

            let buzzing = self.vm.is_buzzing();
            if buzzing != self.buzzing {
                info!("buzzer {}", if buzzing { "on" } else { "off" });
                self.buzzing = buzzing;
            }
        }

        Ok(Status::Running)
    }

    pub fn run(&mut self, options: &RunOptions) -> Result<(), AppError> {
        let mut stdout = io::stdout();
        let mut input = match options.live {
            true => Some(TermInput::new()?),
            false => None,
        };
        if options.live {
            TermSurface::clear_screen(&mut stdout)?;
        }

        let mut last = Instant::now();
        let mut drawn = self.frames;

        loop {
            thread::sleep(IDLE);
            let now = Instant::now();

            if let Some(input) = input.as_mut() {
                let mut quit = false;
                for action in input.read_actions(&self.keymap)? {
                    match action {
                        KeyAction::Press(key) => self.press_key(key, now),
                        KeyAction::Quit => quit = true,
                    }
                }
                if quit {
                    break;
                }
            }
            self.release_keys(now);

            let status = self.step(now.duration_since(last))?;
            last = now;

            if options.live && self.frames != drawn {
                drawn = self.frames;
                self.draw(&mut stdout, true)?;
            }

            if status == Status::Halted {
                break;
            }

            if let Some(limit) = options.frames {
                if self.frames >= limit {
                    break;
                }
            }
        }

        // Leave raw mode before anything else is printed.
        drop(input);

        info!("stopped after {} frames", self.frames);
        if !options.live {
            self.draw(&mut stdout, false)?;
        }

        Ok(())
    }

    fn draw(&self, out: &mut impl Write, home: bool) -> Result<(), AppError> {
        if home {
            TermSurface::home(out)?;
        }
        self.surface.write_to(out)?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::ErrorKind, term::KEY_HOLD};

    const FRAME: Duration = Duration::from_millis(20);

    fn host() -> Host {
        Host::new(&AppConfig::default())
    }

    #[test]
    fn test_halts_at_program_end() {
        let mut host = host();
        host.load_bytecode(&[0x60, 0x01]).unwrap();
        assert_eq!(host.step(FRAME).unwrap(), Status::Halted);
        assert_eq!(host.vm().cpu().registers()[0], 1);
    }

    #[test]
    fn test_frames_render_display() {
        let mut host = host();
        // LD I, 0x050 (glyph 0); DRW V0, V0, 5; JP 0x204
        host.load_bytecode(&[0xA0, 0x50, 0xD0, 0x05, 0x12, 0x04])
            .unwrap();

        assert_eq!(host.step(FRAME).unwrap(), Status::Running);
        assert_eq!(host.step(FRAME).unwrap(), Status::Running);
        assert_eq!(host.frames(), 2);
        assert!(host.vm().cpu().pixel(0, 0));
        assert!(crate::term::to_text(host.surface()).starts_with("\x1b[38;2;255;255;255m"));
    }

    #[test]
    fn test_buzzer_follows_sound_timer() {
        let mut host = host();
        // LD V0, 0x02; LD ST, V0; JP 0x204
        host.load_bytecode(&[0x60, 0x02, 0xF0, 0x18, 0x12, 0x04])
            .unwrap();

        host.step(FRAME).unwrap();
        assert!(host.is_buzzing());
        host.step(FRAME).unwrap();
        assert!(!host.is_buzzing());
    }

    #[test]
    fn test_held_keys() {
        let mut host = host();
        // LD V1, K; JP 0x202
        host.load_bytecode(&[0xF1, 0x0A, 0x12, 0x02]).unwrap();
        host.hold_keys([KeyCode::Key7]);

        host.step(FRAME).unwrap();
        assert_eq!(host.vm().cpu().registers()[1], 7);
    }

    #[test]
    fn test_keyboard_press_is_released_after_hold() {
        let start = Instant::now();
        let mut host = host();
        // LD V1, K; JP 0x202
        host.load_bytecode(&[0xF1, 0x0A, 0x12, 0x02]).unwrap();

        let key = host.keymap().map('s').unwrap();
        assert_eq!(key, KeyCode::Key8);
        host.press_key(key, start);
        host.step(FRAME).unwrap();
        assert_eq!(host.vm().cpu().registers()[1], 8);

        host.release_keys(start + KEY_HOLD / 2);
        assert!(host.vm().cpu().key_state(8));
        host.release_keys(start + KEY_HOLD);
        assert!(!host.vm().cpu().any_key());
    }

    #[test]
    fn test_held_keys_outlast_keyboard() {
        let start = Instant::now();
        let mut host = host();
        host.load_bytecode(&[0x12, 0x00]).unwrap();
        host.hold_keys([KeyCode::Key7]);

        host.press_key(KeyCode::Key7, start);
        host.press_key(KeyCode::Key2, start);
        host.release_keys(start + KEY_HOLD);

        assert!(host.vm().cpu().key_state(7));
        assert!(!host.vm().cpu().key_state(2));
    }

    #[test]
    fn test_fault_stops_host() {
        let mut host = host();
        host.load_bytecode(&[0xFF, 0xFF]).unwrap();

        let err = host.step(FRAME).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::Chip8(Chip8Error::UnknownOpcode { opcode: 0xFFFF, address: 0x200 })
        ));
    }

    #[test]
    fn test_missing_rom() {
        let mut host = host();
        let err = host.load_rom("does/not/exist.ch8").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Io(_)));
    }
}
