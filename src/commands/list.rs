//! List commands implementation

use crate::programmers;
use hexdrop_core::device::{builtin, CommandSet, DeviceProfile, ProfileDatabase};

/// List all available programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        if p.aliases.is_empty() {
            println!("  {:12} - {}", p.name, p.description);
        } else {
            println!(
                "  {:12} - {} (aliases: {})",
                p.name,
                p.description,
                p.aliases.join(", ")
            );
        }
    }
}

/// List built-in profiles followed by those loaded from the database
pub fn list_devices(db: &ProfileDatabase) {
    println!("Device profiles:");
    println!();
    println!("{:<16} {:<10} {:>9}  {}", "Name", "Family", "Row", "Description");
    println!("{}", "-".repeat(72));

    for p in builtin::PROFILES {
        println!(
            "{:<16} {:<10} {:>9}  {}",
            p.name,
            family(&p.profile),
            format_row(&p.profile),
            p.description
        );
    }

    for entry in db.entries() {
        println!(
            "{:<16} {:<10} {:>9}  {} (based on {})",
            entry.name,
            family(&entry.profile),
            format_row(&entry.profile),
            entry.description,
            entry.base
        );
    }
}

/// Short name of the command set a profile uses
pub fn family(profile: &DeviceProfile) -> &'static str {
    match profile.commands {
        CommandSet::Midrange(_) => "pic16f1",
        CommandSet::Pic18(_) => "pic18",
        CommandSet::Dspic(_) => "dspic33",
    }
}

fn format_row(profile: &DeviceProfile) -> String {
    format!("{} words", profile.row_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names() {
        assert_eq!(family(&builtin::PIC16F1), "pic16f1");
        assert_eq!(family(&builtin::PIC18FQ10), "pic18");
        assert_eq!(family(&builtin::PIC18FK42), "pic18");
        assert_eq!(family(&builtin::DSPIC33CK), "dspic33");
    }

    #[test]
    fn test_format_row() {
        assert_eq!(format_row(&builtin::PIC16F1), "32 words");
    }
}
