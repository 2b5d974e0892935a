use std::path::PathBuf;

use clap::Parser;

use chip8_core::constants::DEFAULT_IPS;
use chip8_display::DEFAULT_SCALE;

mod keymap;
mod run;

/// Run a Chip-8 ROM in an SDL2 window.
///
/// Keys 1-4, Q-R, A-F and Z-V form the hex keypad. Hold Space to fast-forward,
/// press Escape to quit.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the ROM file to run
    rom: PathBuf,

    /// Instructions per second
    #[arg(long, default_value_t = DEFAULT_IPS)]
    ips: u32,

    /// Size multiplier for each pixel of the window
    #[arg(long, default_value_t = DEFAULT_SCALE)]
    scale: u32,

    /// Log every instruction and register dump
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "trace" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    run::run(
        &args.rom,
        run::Settings {
            ips: args.ips,
            scale: args.scale,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["chip8", "pong.ch8"]).unwrap();
        assert_eq!(args.rom, PathBuf::from("pong.ch8"));
        assert_eq!(args.ips, 700);
        assert_eq!(args.scale, 10);
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_overrides() {
        let args =
            Args::try_parse_from(["chip8", "pong.ch8", "--ips", "1000", "--scale", "4", "-v"])
                .unwrap();
        assert_eq!(args.ips, 1000);
        assert_eq!(args.scale, 4);
        assert!(args.verbose);
    }

    #[test]
    fn test_args_require_rom() {
        assert!(Args::try_parse_from(["chip8"]).is_err());
    }
}
