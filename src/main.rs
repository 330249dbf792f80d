//! hexdrop - Drag-and-drop Intel HEX loader for ICSP targets
//!
//! The loader presents itself as a small removable disk. Whatever HEX file
//! lands in its data sectors is decoded on the fly and programmed into the
//! attached PIC or dsPIC over ICSP, one flash row at a time.
//!
//! The command line tool drives the same pipeline from a file on disk, so a
//! HEX image can be programmed through a GPIO adapter or tried against the
//! emulated target without any USB hardware.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use hexdrop_core::device::ProfileDatabase;
use std::path::{Path, PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_device_database(cli.device_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load device database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} device profiles", db.len());

    match cli.command {
        Commands::Program {
            programmer,
            device,
            input,
            capacity,
        } => commands::program::run(&db, &programmer, &device, &input, capacity),
        Commands::Erase { programmer, device } => commands::erase::run(&db, &programmer, &device),
        Commands::Info { programmer, device } => commands::info::run(&db, &programmer, &device),
        Commands::ListDevices => {
            commands::list::list_devices(&db);
            Ok(())
        }
        Commands::ListProgrammers => {
            commands::list::list_programmers();
            Ok(())
        }
    }
}

/// Load device profiles from the given path or the default locations
fn load_device_database(path: Option<&Path>) -> Result<ProfileDatabase, Box<dyn std::error::Error>> {
    let mut db = ProfileDatabase::new();

    if let Some(path) = path {
        if path.is_dir() {
            db.load_dir(path)?;
        } else if path.is_file() {
            db.load_file(path)?;
        } else {
            return Err(format!("Device database path not found: {}", path.display()).into());
        }
    } else {
        let default_paths = [
            PathBuf::from("devices"),
            PathBuf::from("/usr/share/hexdrop/devices"),
            PathBuf::from("/usr/local/share/hexdrop/devices"),
        ];

        for dir in &default_paths {
            if dir.is_dir() {
                match db.load_dir(dir) {
                    Ok(count) => log::debug!("Loaded {} profiles from {}", count, dir.display()),
                    Err(e) => log::warn!("Failed to load profiles from {}: {}", dir.display(), e),
                }
            }
        }
    }

    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_bundled_profiles() {
        let db = load_device_database(Some(Path::new("devices"))).unwrap();
        assert_eq!(db.len(), 5);
        assert!(db.find("pic18f47q10").is_some());
        assert!(db.find("pic16f1").is_some());
    }

    #[test]
    fn test_missing_database_path() {
        assert!(load_device_database(Some(Path::new("no/such/dir"))).is_err());
    }
}
