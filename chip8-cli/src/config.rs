//! Host configuration file.
use chip8::{constants::*, prelude::*, Hz, KeyCode, KeyMap};
use serde::Deserialize;

use crate::error::AppError;

/// Settings loaded from a YAML file. Every field is optional.
///
/// ```yaml
/// quirks:
///   shift_copy: false
/// palette:
///   foreground: { r: 255, g: 176, b: 0 }
/// tick_rate: 1000
/// keys:
///   - { host: "p", chip8: 15 }
/// ```
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub quirks: Quirks,
    pub palette: Palette,
    /// Instructions executed per second.
    pub tick_rate: Hz,
    /// Render passes per second.
    pub frame_rate: Hz,
    pub rng_seed: Option<u64>,
    /// Bindings added on top of the default keypad layout.
    pub keys: Vec<KeyBinding>,
}

#[derive(Debug, Deserialize)]
pub struct KeyBinding {
    pub host: char,
    pub chip8: KeyCode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            quirks: Quirks::default(),
            palette: Palette::default(),
            tick_rate: Hz(TICK_RATE),
            frame_rate: Hz(FRAME_RATE),
            rng_seed: None,
            keys: vec![],
        }
    }
}

impl AppConfig {
    pub fn from_file(filepath: &str) -> Result<Self, AppError> {
        let file = std::fs::File::open(filepath)?;
        let config: AppConfig = serde_yaml::from_reader(file)?;
        log::debug!("loaded config: {:#?}", config);
        Ok(config)
    }

    pub fn vm_conf(&self) -> Chip8Conf {
        Chip8Conf {
            quirks: self.quirks,
            rng_seed: self.rng_seed,
        }
    }

    pub fn keymap(&self) -> KeyMap {
        let mut keymap = KeyMap::default();
        for binding in &self.keys {
            keymap.bind(binding.host, binding.chip8);
        }
        keymap
    }
}
