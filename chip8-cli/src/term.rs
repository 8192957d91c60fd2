//! Terminal display output.
use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use chip8::{constants::*, Color, KeyCode, KeyMap, Surface};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyEvent, KeyModifiers},
    execute, queue,
    style::{self, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

/// How long a key stays down after the terminal reports it.
///
/// Terminals only report presses, so releases are inferred. Holding a key
/// down keeps it pressed through the keyboard's auto repeat.
pub const KEY_HOLD: Duration = Duration::from_millis(200);

/// Display surface drawn with true color escapes.
///
/// Two display rows share one line of text using the upper half block,
/// so the 64x32 display fits a 64x16 character area.
pub struct TermSurface {
    cells: Box<[Color; DISPLAY_BUFFER_SIZE]>,
}

impl Default for TermSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl TermSurface {
    pub fn new() -> Self {
        Self {
            cells: Box::new([Color::BLACK; DISPLAY_BUFFER_SIZE]),
        }
    }

    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        for y in (0..DISPLAY_HEIGHT).step_by(2) {
            for x in 0..DISPLAY_WIDTH {
                let top = self.cells[y * DISPLAY_WIDTH + x];
                let bottom = self.cells[(y + 1) * DISPLAY_WIDTH + x];
                queue!(
                    w,
                    SetForegroundColor(term_color(top)),
                    SetBackgroundColor(term_color(bottom)),
                    Print('\u{2580}')
                )?;
            }
            // Raw mode needs the explicit carriage return.
            queue!(w, ResetColor, Print("\r\n"))?;
        }
        Ok(())
    }

    /// Move the cursor back to the top left, so the next frame overwrites the previous one.
    pub fn home(w: &mut impl Write) -> io::Result<()> {
        queue!(w, MoveTo(0, 0))
    }

    pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
        queue!(w, Clear(ClearType::All), MoveTo(0, 0))
    }
}

impl Surface for TermSurface {
    fn draw_pixel(&mut self, x: usize, y: usize, color: Color) {
        self.cells[y * DISPLAY_WIDTH + x] = color;
    }
}

/// Host reaction to a terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(KeyCode),
    Quit,
}

/// Translate a terminal event through the key map.
///
/// `Esc` and `Ctrl+C` quit, since raw mode swallows the interrupt signal.
pub fn key_action(evt: &Event, keymap: &KeyMap) -> Option<KeyAction> {
    match evt {
        Event::Key(KeyEvent {
            code: event::KeyCode::Esc,
            ..
        }) => Some(KeyAction::Quit),
        Event::Key(KeyEvent {
            code: event::KeyCode::Char(c),
            modifiers,
        }) => {
            if modifiers.contains(KeyModifiers::CONTROL) {
                (*c == 'c').then_some(KeyAction::Quit)
            } else {
                keymap.map(*c).map(KeyAction::Press)
            }
        }
        _ => None,
    }
}

/// Release deadlines of the keys pressed from the terminal.
#[derive(Debug, Default)]
pub struct KeyLatch {
    deadlines: [Option<Instant>; KEY_COUNT as usize],
}

impl KeyLatch {
    /// Press the key, or extend the hold when it is already down.
    pub fn press(&mut self, key: KeyCode, now: Instant) {
        self.deadlines[key.as_u8() as usize] = Some(now + KEY_HOLD);
    }

    /// Keys whose hold has run out. They are forgotten by the latch.
    pub fn release_due(&mut self, now: Instant) -> Vec<KeyCode> {
        let mut released = vec![];
        for key in KeyCode::ALL {
            let deadline = &mut self.deadlines[key.as_u8() as usize];
            if matches!(deadline, Some(at) if *at <= now) {
                *deadline = None;
                released.push(key);
            }
        }
        released
    }
}

/// Keyboard reader for a live session.
///
/// Puts the terminal in raw mode with a hidden cursor for as long as it
/// lives, and restores it when dropped.
pub struct TermInput {
    _private: (),
}

impl TermInput {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let input = Self { _private: () };
        execute!(io::stdout(), Hide)?;
        Ok(input)
    }

    /// Drain the pending terminal events without blocking.
    pub fn read_actions(&mut self, keymap: &KeyMap) -> io::Result<Vec<KeyAction>> {
        let mut actions = vec![];
        while event::poll(Duration::ZERO)? {
            let evt = event::read()?;
            match key_action(&evt, keymap) {
                Some(action) => actions.push(action),
                None => log::trace!("ignored terminal event: {evt:?}"),
            }
        }
        Ok(actions)
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        if let Err(err) = execute!(io::stdout(), ResetColor, Show) {
            log::warn!("failed to restore cursor: {err}");
        }
        if let Err(err) = terminal::disable_raw_mode() {
            log::warn!("failed to leave raw mode: {err}");
        }
    }
}

fn term_color(color: Color) -> style::Color {
    style::Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

#[cfg(test)]
pub(crate) fn to_text(surface: &TermSurface) -> String {
    let mut buf = Vec::new();
    surface.write_to(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}
