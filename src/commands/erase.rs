//! Erase command

use super::{create_spinner, open_backend, resolve_device, CommandError};
use hexdrop_core::device::ProfileDatabase;
use hexdrop_core::icsp::ProgrammingBackend;

/// Enter programming mode, bulk erase and release the target
pub fn erase<B: ProgrammingBackend>(backend: &mut B) -> Result<(), CommandError> {
    backend.enter()?;
    let erased = backend.bulk_erase();
    backend.exit()?;
    erased?;
    Ok(())
}

/// Run the erase command
pub fn run(
    db: &ProfileDatabase,
    programmer: &str,
    device: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = resolve_device(db, device)?;
    let mut backend = open_backend(programmer, profile)?;

    let spinner = create_spinner("Erasing...")?;
    let result = erase(&mut backend);
    spinner.finish_and_clear();
    result?;

    println!("Erase complete.");
    Ok(())
}
