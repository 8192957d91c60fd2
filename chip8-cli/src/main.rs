//! Entrypoint for CLI
use std::{env, fs};

use chip8::{prelude::*, IMPL_VERSION};
use log::{error, info, LevelFilter};

mod config;
mod error;
mod host;
mod roms;
mod term;

use self::{
    config::AppConfig,
    error::AppError,
    host::{Host, RunOptions},
};

static USAGE: &str = r#"
usage: chip8 CMD [ARGS]

commands:
    run ROM     Run the target ROM file
    dis ROM     Disassemble the target ROM into readable assembly
    roms DIR    List the ROM files in a directory

run options:
    --config FILE   YAML file with quirks, palette, rates and key bindings
    --frames N      Stop after N frames
    --hold KEYS     Keep the keys pressed, using the keyboard layout (eg. "qe")
    --live          Redraw the display in place every frame and play with the
                    keyboard (1234/qwer/asdf/zxcv), Esc quits

examples:
    chip8 run breakout.ch8 --frames 120
    chip8 run pong.ch8 --live --hold 1
    chip8 dis breakout.ch8
    chip8 roms ./roms
"#;

fn run_rom(filepath: &str, args: &RunArgs) -> Result<(), AppError> {
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    let mut host = Host::new(&config);
    host.load_rom(filepath)?;

    if let Some(keys) = &args.hold {
        let held = host.keymap().map_str(keys).collect::<Vec<_>>();
        host.hold_keys(held);
    }

    let options = RunOptions {
        frames: args.frames,
        live: args.live,
    };
    info!(
        "running at {} Hz, {} frames per second",
        config.tick_rate.0, config.frame_rate.0
    );
    host.run(&options)
}

fn run_disassembler(filepath: &str) -> Result<(), AppError> {
    let bytecode = fs::read(filepath)?;
    let listing = Disassembler::new(&bytecode)
        .to_listing()
        .map_err(Chip8Error::from)?;
    print!("{listing}");
    Ok(())
}

fn list_roms(dirpath: &str) -> Result<(), AppError> {
    for name in roms::find_roms(dirpath)? {
        println!("{name}");
    }
    Ok(())
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
    {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args(env::args().skip(1)) {
        Ok(Cmd::Run { filepath, args }) => run_rom(&filepath, &args),
        Ok(Cmd::Dis { filepath }) => run_disassembler(&filepath),
        Ok(Cmd::Roms { dirpath }) => list_roms(&dirpath),
        Err(err) => {
            error!("{err}");
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1)
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Cmd, AppError> {
    let cmd = args
        .next()
        .ok_or_else(|| AppError::usage("missing command"))?;

    // don't format me T.T
    match cmd.as_str() {
        "run" => Ok(Cmd::Run {
            filepath: consume_arg(&mut args, "ROM")?,
            args: parse_run_args(args)?,
        }),
        "dis" => Ok(Cmd::Dis {
            filepath: consume_arg(&mut args, "ROM")?,
        }),
        "roms" => Ok(Cmd::Roms {
            dirpath: consume_arg(&mut args, "DIR")?,
        }),
        _ => Err(AppError::usage(format!("unknown command: {cmd}"))),
    }
}

fn parse_run_args(mut args: impl Iterator<Item = String>) -> Result<RunArgs, AppError> {
    let mut run_args = RunArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => run_args.config = Some(consume_arg(&mut args, "FILE")?),
            "--hold" => run_args.hold = Some(consume_arg(&mut args, "KEYS")?),
            "--live" => run_args.live = true,
            "--frames" => {
                let count = consume_arg(&mut args, "N")?;
                let count = count
                    .parse()
                    .map_err(|_| AppError::usage(format!("invalid frame count: {count}")))?;
                run_args.frames = Some(count);
            }
            _ => return Err(AppError::usage(format!("unknown option: {arg}"))),
        }
    }

    Ok(run_args)
}

/// Consumes the next argument, failing with a usage error if it doesn't exist.
fn consume_arg(args: &mut impl Iterator<Item = String>, name: &str) -> Result<String, AppError> {
    args.next()
        .ok_or_else(|| AppError::usage(format!("missing argument {name}")))
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug)]
enum Cmd {
    /// Run ROM
    Run { filepath: String, args: RunArgs },
    /// Disassemble ROM
    Dis { filepath: String },
    /// List ROMs in directory
    Roms { dirpath: String },
}

#[derive(Debug, Default)]
struct RunArgs {
    config: Option<String>,
    frames: Option<u64>,
    hold: Option<String>,
    live: bool,
}
