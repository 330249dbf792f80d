//! Program command
//!
//! Copies a HEX file into the virtual volume the way a host would after a
//! drag-and-drop: sector by sector, 64 bytes at a time, starting at the first
//! data sector.

use super::{create_progress_bar, open_backend, resolve_device, CommandError};
use hexdrop_core::device::ProfileDatabase;
use hexdrop_core::disk::{
    DiskConfig, NullTables, Segment, VirtualDisk, FIRST_IMAGE_SECTOR, SECTOR_SIZE, SEGMENT_SIZE,
};
use hexdrop_core::icsp::ProgrammingBackend;
use hexdrop_core::pipeline::{Loader, LoaderStats};
use std::path::Path;

/// Bytes the data area of a volume with `capacity` sectors can hold
pub fn image_capacity(capacity: u32) -> u64 {
    let data_sectors = DiskConfig {
        capacity,
        info_page: &[],
    }
    .total_sectors()
    .saturating_sub(FIRST_IMAGE_SECTOR);
    data_sectors as u64 * SECTOR_SIZE as u64
}

/// Feed `image` into `disk` as consecutive data sectors
///
/// The tail of the last sector is zero filled, as the host does.
pub fn copy_image<B: ProgrammingBackend>(
    disk: &mut VirtualDisk<'_, B>,
    image: &[u8],
    mut on_segment: impl FnMut(usize),
) -> Result<(), CommandError> {
    for (n, chunk) in image.chunks(SEGMENT_SIZE).enumerate() {
        let mut segment: Segment = [0; SEGMENT_SIZE];
        segment[..chunk.len()].copy_from_slice(chunk);

        let sector = FIRST_IMAGE_SECTOR + (n * SEGMENT_SIZE / SECTOR_SIZE) as u32;
        let index = (n % (SECTOR_SIZE / SEGMENT_SIZE)) as u8;
        disk.write_segment(sector, &segment, index)?;
        on_segment(chunk.len());
    }

    // Pad out the last sector
    let written = image.len().div_ceil(SEGMENT_SIZE);
    let padded = image.len().div_ceil(SECTOR_SIZE) * (SECTOR_SIZE / SEGMENT_SIZE);
    let zeros: Segment = [0; SEGMENT_SIZE];
    for n in written..padded {
        let sector = FIRST_IMAGE_SECTOR + (n * SEGMENT_SIZE / SECTOR_SIZE) as u32;
        let index = (n % (SECTOR_SIZE / SEGMENT_SIZE)) as u8;
        disk.write_segment(sector, &zeros, index)?;
    }
    Ok(())
}

/// Release the target if the file had no end record
///
/// The open row of an unterminated file is never committed.
pub fn finish<B: ProgrammingBackend>(loader: &mut Loader<B>) -> Result<(), CommandError> {
    if loader.stats().end_of_file == 0 {
        log::warn!("No end-of-file record found");
        if loader.backend().in_progress() {
            loader.backend_mut().exit()?;
        }
    }
    Ok(())
}

/// Print a summary of the stream
pub fn print_summary(stats: &LoaderStats) {
    println!(
        "Decoded {} data records ({} address, {} end-of-file)",
        stats.data_records, stats.address_records, stats.end_of_file
    );
    println!(
        "Programmed {} rows and {} configuration rows in {} session(s)",
        stats.packer.rows_written, stats.packer.config_rows_written, stats.packer.sessions
    );
    if stats.decode_errors > 0 {
        println!("Discarded {} malformed records", stats.decode_errors);
    }
    if stats.stray_bytes > 0 {
        log::debug!("{} stray bytes ignored", stats.stray_bytes);
    }
}

/// Run the program command
pub fn run(
    db: &ProfileDatabase,
    programmer: &str,
    device: &str,
    input: &Path,
    capacity: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let profile = resolve_device(db, device)?;
    let image = std::fs::read(input)?;

    let limit = image_capacity(capacity);
    if image.len() as u64 > limit {
        return Err(CommandError::ImageTooLarge {
            size: image.len() as u64,
            capacity: limit,
        }
        .into());
    }

    log::info!("Programming {} ({} bytes)", input.display(), image.len());

    let backend = open_backend(programmer, profile)?;
    let loader = Loader::new(backend)?;
    let mut disk = VirtualDisk::new(
        loader,
        NullTables,
        DiskConfig {
            capacity,
            info_page: &[],
        },
    );

    let pb = create_progress_bar(image.len() as u64)?;
    let copied = copy_image(&mut disk, &image, |n| pb.inc(n as u64));
    pb.finish_and_clear();

    let mut loader = disk.into_loader();
    let result = copied.and_then(|()| finish(&mut loader));
    print_summary(&loader.stats());
    result?;

    println!("Done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexdrop_core::device::builtin;
    use hexdrop_core::disk::DEFAULT_CAPACITY;
    use hexdrop_core::icsp::IcspBackend;
    use hexdrop_dummy::SimTarget;

    const IMAGE: &[u8] = b":04000000003001309B\r\n:00000001FF\r\n";

    fn sim_disk(capacity: u32) -> VirtualDisk<'static, IcspBackend<SimTarget>> {
        let sim = SimTarget::new_default(builtin::PIC16F1);
        let loader = Loader::new(IcspBackend::new(sim, builtin::PIC16F1)).unwrap();
        VirtualDisk::new(
            loader,
            NullTables,
            DiskConfig {
                capacity,
                info_page: &[],
            },
        )
    }

    #[test]
    fn test_image_capacity() {
        assert_eq!(image_capacity(DEFAULT_CAPACITY), 4095 * 512);
        assert_eq!(image_capacity(1), 0);
    }

    #[test]
    fn test_copy_image_programs_target() {
        let mut disk = sim_disk(DEFAULT_CAPACITY);
        let mut total = 0;
        copy_image(&mut disk, IMAGE, |n| total += n).unwrap();
        assert_eq!(total, IMAGE.len());

        let mut loader = disk.into_loader();
        finish(&mut loader).unwrap();
        let stats = loader.stats();
        assert_eq!(stats.data_records, 1);
        assert_eq!(stats.end_of_file, 1);
        assert_eq!(stats.packer.rows_written, 1);

        let sim = loader.backend().lines();
        assert_eq!(sim.word(0), Some(0x3000));
        assert_eq!(sim.word(1), Some(0x3001));
        assert!(!loader.backend().in_progress());
    }

    #[test]
    fn test_image_spanning_sectors() {
        // padding pushes the end record into the second sector
        let mut image = b":04000000003001309B\r\n".to_vec();
        image.extend(std::iter::repeat_n(b'\n', 600));
        image.extend_from_slice(b":00000001FF\r\n");

        let mut disk = sim_disk(8);
        copy_image(&mut disk, &image, |_| {}).unwrap();
        let loader = disk.into_loader();
        assert_eq!(loader.stats().end_of_file, 1);
        assert_eq!(loader.stats().decode_errors, 0);
        assert_eq!(loader.stats().bytes, 1024);
    }

    #[test]
    fn test_missing_end_record_releases_target() {
        let mut disk = sim_disk(DEFAULT_CAPACITY);
        copy_image(&mut disk, b":04000000003001309B\r\n", |_| {}).unwrap();

        let mut loader = disk.into_loader();
        assert!(loader.backend().in_progress());
        finish(&mut loader).unwrap();
        assert!(!loader.backend().in_progress());
    }

    #[test]
    fn test_image_overflowing_volume() {
        let mut disk = sim_disk(2);
        let image = vec![b'\n'; SECTOR_SIZE + 1];
        assert!(matches!(
            copy_image(&mut disk, &image, |_| {}),
            Err(CommandError::Core(hexdrop_core::Error::SectorOutOfRange))
        ));
    }
}
