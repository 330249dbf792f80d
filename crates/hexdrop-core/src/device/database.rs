//! Profile database for runtime loading and lookup
//!
//! Device variants that share a family protocol with one of the built-in
//! profiles can be described in RON files. Every entry names a `base`
//! built-in profile and overrides its memory map, timing or capabilities.

use alloc::{format, string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use ron::extensions::Extensions;

use super::builtin;
use super::profile::{Capabilities, DeviceProfile};

/// Error type for profile database operations
#[derive(Debug)]
pub enum ProfileDbError {
    /// I/O error reading files
    Io(io::Error),
    /// RON parsing error
    Parse(ron::error::SpannedError),
    /// Validation error
    Validation(String),
    /// The `base` field names no built-in profile
    UnknownBase(String),
}

impl From<io::Error> for ProfileDbError {
    fn from(e: io::Error) -> Self {
        ProfileDbError::Io(e)
    }
}

impl From<ron::error::SpannedError> for ProfileDbError {
    fn from(e: ron::error::SpannedError) -> Self {
        ProfileDbError::Parse(e)
    }
}

impl std::fmt::Display for ProfileDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileDbError::Io(e) => write!(f, "I/O error: {}", e),
            ProfileDbError::Parse(e) => write!(f, "Parse error: {}", e),
            ProfileDbError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ProfileDbError::UnknownBase(name) => write!(f, "Unknown base profile: {}", name),
        }
    }
}

impl std::error::Error for ProfileDbError {}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct TimingDef {
    reset_hold_ms: Option<u32>,
    entry_settle_ms: Option<u32>,
    bulk_erase_ms: Option<u32>,
    write_us: Option<u32>,
    config_write_us: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
struct CapabilitiesDef {
    config_write: bool,
    user_id_write: bool,
    read_id: bool,
}

impl From<CapabilitiesDef> for Capabilities {
    fn from(def: CapabilitiesDef) -> Self {
        let mut c = Capabilities::empty();
        if def.config_write {
            c |= Capabilities::CONFIG_WRITE;
        }
        if def.user_id_write {
            c |= Capabilities::USER_ID_WRITE;
        }
        if def.read_id {
            c |= Capabilities::READ_ID;
        }
        c
    }
}

/// Single device definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct DeviceDef {
    name: String,
    base: String,
    #[serde(default)]
    description: String,
    row_words: Option<u16>,
    config_address: Option<u32>,
    config_offset: Option<u16>,
    config_words: Option<u16>,
    user_id_address: Option<u32>,
    user_id_words: Option<u16>,
    eeprom_address: Option<u32>,
    device_id_address: Option<u32>,
    revision_id_address: Option<u32>,
    #[serde(default)]
    timing: TimingDef,
    capabilities: Option<CapabilitiesDef>,
}

/// File level container
#[derive(Debug, Clone, serde::Deserialize)]
struct ProfileFileDef {
    devices: Vec<DeviceDef>,
}

impl DeviceDef {
    fn apply(&self, mut p: DeviceProfile) -> DeviceProfile {
        if let Some(v) = self.row_words {
            p.row_words = v;
        }
        if let Some(v) = self.config_address {
            p.config_address = v;
        }
        if let Some(v) = self.config_offset {
            p.config_offset = v;
        }
        if let Some(v) = self.config_words {
            p.config_words = v;
        }
        if let Some(v) = self.user_id_address {
            p.user_id_address = Some(v);
        }
        if let Some(v) = self.user_id_words {
            p.user_id_words = v;
        }
        if let Some(v) = self.eeprom_address {
            p.eeprom_address = Some(v);
        }
        if let Some(v) = self.device_id_address {
            p.device_id_address = Some(v);
        }
        if let Some(v) = self.revision_id_address {
            p.revision_id_address = Some(v);
        }

        let t = &self.timing;
        p.timing.reset_hold_ms = t.reset_hold_ms.unwrap_or(p.timing.reset_hold_ms);
        p.timing.entry_settle_ms = t.entry_settle_ms.unwrap_or(p.timing.entry_settle_ms);
        p.timing.bulk_erase_ms = t.bulk_erase_ms.unwrap_or(p.timing.bulk_erase_ms);
        p.timing.write_us = t.write_us.unwrap_or(p.timing.write_us);
        p.timing.config_write_us = t.config_write_us.unwrap_or(p.timing.config_write_us);

        if let Some(caps) = self.capabilities {
            p.capabilities = caps.into();
        }
        p
    }
}

// ============================================================================
// Profile database
// ============================================================================

/// A device profile loaded from a RON file
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    /// Device name
    pub name: String,
    /// Name of the built-in profile this entry derives from
    pub base: &'static str,
    /// Human readable description
    pub description: String,
    /// The resolved profile
    pub profile: DeviceProfile,
}

/// Runtime profile database
///
/// Lookups search loaded entries first, then the built-in profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileDatabase {
    entries: Vec<ProfileEntry>,
}

impl ProfileDatabase {
    /// Create an empty profile database
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Load profile definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ProfileDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load profile definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ProfileDbError> {
        let file: ProfileFileDef = ron::Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(content)?;
        let count = file.devices.len();

        for def in file.devices {
            let base =
                builtin::find(&def.base).ok_or_else(|| ProfileDbError::UnknownBase(def.base.clone()))?;
            let profile = def.apply(base.profile);
            profile
                .validate()
                .map_err(|e| ProfileDbError::Validation(format!("{}: {}", def.name, e)))?;

            log::debug!("Loaded profile {} (base {})", def.name, base.name);
            self.entries.push(ProfileEntry {
                name: def.name,
                base: base.name,
                description: def.description,
                profile,
            });
        }

        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ProfileDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all loaded entries
    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    /// Get the number of loaded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entries were loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a profile by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<DeviceProfile> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .map(|e| e.profile)
            .or_else(|| builtin::find(name).map(|b| b.profile))
    }
}
