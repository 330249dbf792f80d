//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use hexdrop_core::disk::DEFAULT_CAPACITY;
use std::path::PathBuf;

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "hexdrop")]
#[command(author, version, about = "Drag-and-drop Intel HEX loader for ICSP targets", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a device profile file or directory (contains .ron files)
    /// Defaults to looking in ./devices/ and /usr/share/hexdrop/devices/
    #[arg(long, global = true)]
    pub device_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program an Intel HEX file into the target
    Program {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Target device profile
        #[arg(short, long)]
        device: String,

        /// Intel HEX file
        #[arg(short, long)]
        input: PathBuf,

        /// Size of the virtual volume's data area in sectors
        #[arg(long, default_value_t = DEFAULT_CAPACITY)]
        capacity: u32,
    },

    /// Bulk erase the target
    Erase {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Target device profile
        #[arg(short, long)]
        device: String,
    },

    /// Read the device and revision IDs
    Info {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Target device profile
        #[arg(short, long)]
        device: String,
    },

    /// List known device profiles
    ListDevices,

    /// List available programmers
    ListProgrammers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_program_defaults() {
        let cli = Cli::parse_from([
            "hexdrop", "program", "-p", "dummy", "-d", "pic16f1", "-i", "app.hex",
        ]);
        match cli.command {
            Commands::Program {
                programmer,
                capacity,
                ..
            } => {
                assert_eq!(programmer, "dummy");
                assert_eq!(capacity, DEFAULT_CAPACITY);
            }
            _ => panic!("expected program"),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "hexdrop",
            "list-devices",
            "-vv",
            "--device-db",
            "devices",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.device_db, Some(PathBuf::from("devices")));
    }
}
