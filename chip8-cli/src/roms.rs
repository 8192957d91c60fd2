//! ROM discovery.
use std::{fs, io, path::Path};

/// File extension of program images.
pub const ROM_EXTENSION: &str = "ch8";

/// Names of the ROM files in the directory, without extension, sorted.
///
/// Subdirectories are not searched.
pub fn find_roms(dir: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let mut names = vec![];

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let is_rom = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(ROM_EXTENSION))
            .unwrap_or(false);
        if !is_rom {
            continue;
        }

        if let Some(stem) = path.file_stem() {
            names.push(stem.to_string_lossy().into_owned());
        }
    }

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_find_roms() {
        let dir = std::env::temp_dir().join(format!("chip8-roms-{}", std::process::id()));
        fs::create_dir_all(dir.join("nested.ch8")).unwrap();
        for name in ["pong.ch8", "breakout.ch8", "notes.txt", "maze.CH8"] {
            fs::write(dir.join(name), [0x00, 0xE0]).unwrap();
        }

        let names = find_roms(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(names, vec!["breakout", "maze", "pong"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = std::env::temp_dir().join("chip8-roms-does-not-exist");
        assert!(find_roms(dir).is_err());
    }
}
