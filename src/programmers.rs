//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all line drivers, with
//! support for feature-gated inclusion and dynamic help text generation.

use hexdrop_core::device::DeviceProfile;
use hexdrop_core::icsp::IcspLines;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Emulated target for testing (device_id=<hex>,revision_id=<hex>)",
    });

    #[cfg(feature = "linux-gpio")]
    programmers.push(ProgrammerInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpio"],
        description: "Linux GPIO bitbang (dev=/dev/gpiochipN,clk=<n>,dat=<n>,mclr=<n>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");
    for p in &programmers {
        help.push_str(&format!("  {:12} - {}\n", p.name, p.description));
    }
    help
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Resolve an alias to the primary programmer name
fn canonical_name(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Parse a programmer string of the form `name:key=value,key=value`
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the ICSP lines for a programmer string
///
/// The profile is only used by the emulated target, which needs to know the
/// command set it should answer to.
#[allow(unused_variables)]
pub fn open_lines(
    programmer: &str,
    profile: &DeviceProfile,
) -> Result<Box<dyn IcspLines + Send>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    match canonical_name(name) {
        #[cfg(feature = "dummy")]
        Some("dummy") => open_dummy(&options, profile),
        #[cfg(feature = "linux-gpio")]
        Some("linux_gpio") => hexdrop_linux_gpio::open_linux_gpio(&options),
        _ => Err(unknown_programmer_error(name)),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(
    options: &[(&str, &str)],
    profile: &DeviceProfile,
) -> Result<Box<dyn IcspLines + Send>, Box<dyn std::error::Error>> {
    use hexdrop_dummy::{SimConfig, SimTarget};

    let mut config = SimConfig::default();
    for (key, value) in options {
        match *key {
            "device_id" => config.device_id = parse_hex_u16(value)?,
            "revision_id" => config.revision_id = parse_hex_u16(value)?,
            "visi" => config.visi = parse_hex_u16(value)?,
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }
    log::info!("Using emulated target");
    Ok(Box::new(SimTarget::new(*profile, config)))
}

/// Parse a string as a hex (with or without 0x) 16-bit word
#[cfg(feature = "dummy")]
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("Invalid hex value '{}': {}", s, e))
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'hexdrop list-programmers' for more details");
    msg.into()
}
