//! Virtual mass-storage volume
//!
//! The loader shows up on the host as a small FAT volume. The boot, FAT and
//! root directory sectors belong to a filesystem emulator behind
//! [`FilesystemTables`]; every other sector the host writes is treated as
//! part of a HEX file and streamed into the [`Loader`] one character at a
//! time. The host transfers sectors in 64-byte segments.
//!
//! | sector | content |
//! |--------|---------|
//! | 0 | master boot record |
//! | 1 | volume boot record |
//! | 2 | FAT |
//! | 3 | root directory |
//! | 4 | informational page |
//! | 5.. | file data |

use crate::error::{Error, Result};
use crate::icsp::ProgrammingBackend;
use crate::pipeline::Loader;

/// Bytes per sector
pub const SECTOR_SIZE: usize = 512;
/// Bytes per host transfer
pub const SEGMENT_SIZE: usize = 64;
/// Segments making up one sector
pub const SEGMENTS_PER_SECTOR: u8 = (SECTOR_SIZE / SEGMENT_SIZE) as u8;

/// Master boot record sector
pub const MBR_SECTOR: u32 = 0;
/// Volume boot record sector
pub const VBR_SECTOR: u32 = 1;
/// File allocation table sector
pub const FAT_SECTOR: u32 = 2;
/// Root directory sector
pub const ROOT_SECTOR: u32 = 3;
/// Informational page sector
pub const INFO_SECTOR: u32 = 4;
/// First sector that carries file data
pub const FIRST_IMAGE_SECTOR: u32 = 5;

/// Sectors in front of the data area
pub const OVERHEAD_SECTORS: u32 = 4;
/// Default size of the data area in sectors
pub const DEFAULT_CAPACITY: u32 = 4096;

/// One 64-byte transfer unit
pub type Segment = [u8; SEGMENT_SIZE];

/// Filesystem emulator owning the boot, FAT and root directory sectors
pub trait FilesystemTables {
    /// Fill `buf` with segment `index` of `sector`
    fn read_segment(&mut self, sector: u32, index: u8, buf: &mut Segment);

    /// Record the host's update of segment `index` of `sector`
    fn write_segment(&mut self, sector: u32, index: u8, data: &Segment) -> Result<()>;
}

/// Tables that read as zeros and accept FAT and directory updates silently
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTables;

impl FilesystemTables for NullTables {
    fn read_segment(&mut self, _sector: u32, _index: u8, buf: &mut Segment) {
        buf.fill(0);
    }

    fn write_segment(&mut self, sector: u32, _index: u8, _data: &Segment) -> Result<()> {
        match sector {
            MBR_SECTOR | VBR_SECTOR => Err(Error::ReadOnlySector),
            _ => Ok(()),
        }
    }
}

/// Volume geometry and content
#[derive(Debug, Clone, Copy)]
pub struct DiskConfig<'a> {
    /// Size of the data area in sectors
    pub capacity: u32,
    /// Served from the informational sector, truncated to one sector
    pub info_page: &'a [u8],
}

impl Default for DiskConfig<'_> {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            info_page: &[],
        }
    }
}

impl DiskConfig<'_> {
    /// Total number of sectors reported to the host
    pub fn total_sectors(&self) -> u32 {
        OVERHEAD_SECTORS + self.capacity
    }
}

/// Sector-level front end of the loader
pub struct VirtualDisk<'a, B, T = NullTables> {
    loader: Loader<B>,
    tables: T,
    config: DiskConfig<'a>,
}

impl<'a, B: ProgrammingBackend, T: FilesystemTables> VirtualDisk<'a, B, T> {
    /// Create a volume in front of `loader`
    pub fn new(loader: Loader<B>, tables: T, config: DiskConfig<'a>) -> Self {
        Self {
            loader,
            tables,
            config,
        }
    }

    /// Handle a host write of segment `index` of `sector`
    pub fn write_segment(&mut self, sector: u32, data: &Segment, index: u8) -> Result<()> {
        self.check(sector, index)?;
        match sector {
            MBR_SECTOR..=ROOT_SECTOR => self.tables.write_segment(sector, index, data),
            INFO_SECTOR => Ok(()),
            _ => {
                log::trace!("Sector {} segment {}", sector, index);
                self.loader.feed_bytes(data)
            }
        }
    }

    /// Handle a host read of segment `index` of `sector`
    pub fn read_segment(&mut self, sector: u32, index: u8, buf: &mut Segment) -> Result<()> {
        self.check(sector, index)?;
        match sector {
            MBR_SECTOR..=ROOT_SECTOR => self.tables.read_segment(sector, index, buf),
            INFO_SECTOR => {
                buf.fill(0);
                let page = &self.config.info_page[..self.config.info_page.len().min(SECTOR_SIZE)];
                let start = index as usize * SEGMENT_SIZE;
                if let Some(slice) = page.get(start..) {
                    let n = slice.len().min(SEGMENT_SIZE);
                    buf[..n].copy_from_slice(&slice[..n]);
                }
            }
            _ => buf.fill(0),
        }
        Ok(())
    }

    /// Total number of sectors reported to the host
    pub fn total_sectors(&self) -> u32 {
        self.config.total_sectors()
    }

    /// The loader behind the data sectors
    pub fn loader(&self) -> &Loader<B> {
        &self.loader
    }

    /// Mutable access to the loader
    pub fn loader_mut(&mut self) -> &mut Loader<B> {
        &mut self.loader
    }

    /// The filesystem tables
    pub fn tables(&self) -> &T {
        &self.tables
    }

    /// Consume the volume and return the loader
    pub fn into_loader(self) -> Loader<B> {
        self.loader
    }

    fn check(&self, sector: u32, index: u8) -> Result<()> {
        if index >= SEGMENTS_PER_SECTOR {
            return Err(Error::SegmentOutOfRange);
        }
        if sector >= self.total_sectors() {
            return Err(Error::SectorOutOfRange);
        }
        Ok(())
    }
}
