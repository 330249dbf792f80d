//! Info command

use super::{create_spinner, list::family, open_backend, resolve_device, CommandError};
use hexdrop_core::device::{Capabilities, DeviceProfile, ProfileDatabase};
use hexdrop_core::icsp::ProgrammingBackend;
use hexdrop_core::pipeline::{DeviceInfo, Loader};

/// Read the identification words through a loader
pub fn read_info<B: ProgrammingBackend>(backend: B) -> Result<DeviceInfo, CommandError> {
    if !backend.profile().supports(Capabilities::READ_ID) {
        return Err(CommandError::Unsupported("reading device IDs"));
    }
    let mut loader = Loader::new(backend)?;
    Ok(loader.read_device_info()?)
}

fn format_id(id: Option<u16>) -> String {
    match id {
        Some(v) => format!("0x{:04X}", v),
        None => "n/a".to_string(),
    }
}

fn print_profile(profile: &DeviceProfile) {
    println!("Family:         {}", family(profile));
    println!("Row size:       {} words", profile.row_words);
    println!(
        "Config words:   {} at 0x{:06X}",
        profile.config_words, profile.config_address
    );
    if let Some(addr) = profile.user_id_address {
        println!("User IDs:       {} at 0x{:06X}", profile.user_id_words, addr);
    }
    if let Some(addr) = profile.eeprom_address {
        println!("EEPROM:         0x{:06X}", addr);
    }
}

/// Run the info command
pub fn run(
    db: &ProfileDatabase,
    programmer: &str,
    device: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = resolve_device(db, device)?;
    let backend = open_backend(programmer, profile)?;

    let spinner = create_spinner("Reading device IDs...")?;
    let result = read_info(backend);
    spinner.finish_and_clear();
    let info = result?;

    println!("Device ID:      {}", format_id(info.device_id));
    println!("Revision ID:    {}", format_id(info.revision_id));
    print_profile(&profile);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexdrop_core::device::builtin;
    use hexdrop_core::icsp::IcspBackend;
    use hexdrop_dummy::{SimConfig, SimTarget};

    #[test]
    fn test_read_info_from_sim() {
        let config = SimConfig {
            device_id: 0x30C2,
            ..SimConfig::default()
        };
        let backend = IcspBackend::new(SimTarget::new(builtin::PIC16F1, config), builtin::PIC16F1);
        let info = read_info(backend).unwrap();
        assert_eq!(info.device_id, Some(0x30C2));
        assert_eq!(format_id(info.device_id), "0x30C2");
    }

    #[test]
    fn test_read_info_unsupported() {
        let mut profile = builtin::PIC16F1;
        profile.capabilities = Capabilities::empty();
        let backend = IcspBackend::new(SimTarget::new_default(profile), profile);
        assert!(matches!(
            read_info(backend),
            Err(CommandError::Unsupported(_))
        ));
    }

    #[test]
    fn test_format_missing_id() {
        assert_eq!(format_id(None), "n/a");
    }
}
