//! Enhanced mid-range (PIC16F1) command encoding
//!
//! 6-bit commands and 16-bit payloads, both LSB first. A 14-bit data word is
//! framed between a start and a stop bit. There is no load-address command:
//! the pointer is moved with increment and reset-address commands, so the
//! backend tracks it to avoid needless resets.

use super::{IcspBackend, IcspLines};
use crate::device::MidrangeOpcodes;

fn frame(word: u32) -> u32 {
    (word << 1) & 0x7FFE
}

fn increment<L: IcspLines>(b: &mut IcspBackend<L>, ops: &MidrangeOpcodes) {
    b.command(ops.increment_address);
    b.session.address += 1;
}

/// Move the address pointer to `address`
pub(super) fn address_load<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &MidrangeOpcodes,
    address: u32,
) {
    let config = b.profile.config_address;
    if address >= config {
        b.command(ops.load_config);
        b.payload(frame(config));
        b.session.address = config;
    }
    if address < b.session.address {
        b.command(ops.reset_address);
        b.session.address = 0;
    }
    log::trace!(
        "Skipping from 0x{:04X} to 0x{:04X}",
        b.session.address,
        address
    );
    while b.session.address < address {
        increment(b, ops);
    }
}

pub(super) fn bulk_erase<L: IcspLines>(b: &mut IcspBackend<L>, ops: &MidrangeOpcodes) {
    let config = b.profile.config_address;
    b.command(ops.load_config);
    b.payload(frame(config));
    b.command(ops.bulk_erase);
    b.lines.delay_ms(b.profile.timing.bulk_erase_ms);
    b.session.address = config;
}

/// Latch n-1 words with increments, then latch the last one and program
pub(super) fn write_row<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &MidrangeOpcodes,
    word_address: u32,
    words: &[u16],
) {
    address_load(b, ops, word_address);

    let (last, head) = match words.split_last() {
        Some(split) => split,
        None => return,
    };
    for &word in head {
        b.command(ops.load_data);
        b.payload(frame(word as u32));
        increment(b, ops);
    }
    b.command(ops.load_data);
    b.payload(frame(*last as u32));
    b.command(ops.begin_programming);
    b.lines.delay_us(b.profile.timing.write_us);
    // increment only after the begin command
    increment(b, ops);
}

pub(super) fn write_config<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &MidrangeOpcodes,
    words: &[u16],
) {
    let first = b.profile.config_address + b.profile.config_offset as u32;
    address_load(b, ops, first);
    for &word in words {
        b.command(ops.load_data);
        b.payload(frame(word as u32));
        b.command(ops.begin_programming);
        b.lines.delay_us(b.profile.timing.config_write_us);
        increment(b, ops);
    }
}

pub(super) fn read_word<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &MidrangeOpcodes,
    address: u32,
) -> u16 {
    address_load(b, ops, address);
    b.command(ops.read_data);
    let raw = b.read_payload(16);
    increment(b, ops);
    ((raw >> 1) & 0x3FFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::builtin;
    use crate::icsp::testing::RecordingLines;
    use crate::icsp::ProgrammingBackend;
    use std::vec;
    use std::vec::Vec;

    const INC: u32 = 0x06;
    const LATCH: u32 = 0x02;
    const BEGIN: u32 = 0x08;

    /// Decode the recorded stream after entry into (command, payload) pairs
    fn decode(lines: &RecordingLines, mut pos: usize) -> Vec<(u32, Option<u32>)> {
        let mut out = Vec::new();
        while pos < lines.bits.len() {
            let cmd = lines.take_lsb(&mut pos, 6);
            let payload = match cmd {
                0x00 | 0x02 => Some(lines.take_lsb(&mut pos, 16)),
                _ => None,
            };
            out.push((cmd, payload));
        }
        out
    }

    fn entered() -> (IcspBackend<RecordingLines>, usize) {
        let mut b = IcspBackend::new(RecordingLines::new(), builtin::PIC16F1);
        b.enter().unwrap();
        let start = b.lines().bits.len();
        (b, start)
    }

    #[test]
    fn test_frame() {
        assert_eq!(frame(0x3FFF), 0x7FFE);
        assert_eq!(frame(0xFFFF), 0x7FFE);
        assert_eq!(frame(0x0001), 0x0002);
    }

    #[test]
    fn test_bulk_erase_sequence() {
        let (mut b, start) = entered();
        b.bulk_erase().unwrap();
        let cmds = decode(b.lines(), start);
        assert_eq!(cmds, vec![(0x00, Some(frame(0x8000))), (0x09, None)]);
        assert_eq!(b.session().address, 0x8000);
    }

    #[test]
    fn test_row_write_sequence() {
        let (mut b, start) = entered();
        let words: Vec<u16> = (0..32).collect();
        b.write_row(0x0040, &words).unwrap();

        let cmds = decode(b.lines(), start);
        // 0x40 increments to reach the row
        assert!(cmds[..0x40].iter().all(|&c| c == (INC, None)));
        let body = &cmds[0x40..];
        for (i, pair) in body[..62].chunks(2).enumerate() {
            assert_eq!(pair[0], (LATCH, Some(frame(i as u32))));
            assert_eq!(pair[1], (INC, None));
        }
        assert_eq!(body[62], (LATCH, Some(frame(31))));
        assert_eq!(body[63], (BEGIN, None));
        assert_eq!(body[64], (INC, None));
        assert_eq!(body.len(), 65);
        assert_eq!(b.session().address, 0x60);
    }

    #[test]
    fn test_consecutive_rows_do_not_reset() {
        let (mut b, _) = entered();
        let words = vec![0u16; 32];
        b.write_row(0x0000, &words).unwrap();
        let start = b.lines().bits.len();
        b.write_row(0x0020, &words).unwrap();
        let cmds = decode(b.lines(), start);
        assert_eq!(cmds[0], (LATCH, Some(0)));
    }

    #[test]
    fn test_backwards_move_resets_address() {
        let (mut b, _) = entered();
        let words = vec![0u16; 32];
        b.write_row(0x0040, &words).unwrap();
        let start = b.lines().bits.len();
        b.write_row(0x0020, &words).unwrap();
        let cmds = decode(b.lines(), start);
        assert_eq!(cmds[0], (0x16, None));
        assert_eq!(cmds[1..0x21].len(), 0x20);
        assert!(cmds[1..0x21].iter().all(|&c| c == (INC, None)));
    }

    #[test]
    fn test_config_write_sequence() {
        let (mut b, start) = entered();
        let mut row = vec![0xFFFFu16; 32];
        row[7..12].copy_from_slice(&[0x3FE4, 0x3FFF, 0x3FFC, 0x3FFF, 0x3FFE]);
        b.write_config_row(&row).unwrap();

        let cmds = decode(b.lines(), start);
        assert_eq!(cmds[0], (0x00, Some(frame(0x8000))));
        assert!(cmds[1..8].iter().all(|&c| c == (INC, None)));
        let body = &cmds[8..];
        assert_eq!(body.len(), 15);
        assert_eq!(body[0], (LATCH, Some(frame(0x3FE4))));
        assert_eq!(body[1], (BEGIN, None));
        assert_eq!(body[2], (INC, None));
        assert_eq!(body[12], (LATCH, Some(frame(0x3FFE))));
        assert_eq!(b.session().address, 0x800C);
    }

    #[test]
    fn test_read_word() {
        let (mut b, _) = entered();
        // device ID 0x3074, framed and sent LSB first
        let raw = 0x3074u32 << 1;
        b.lines_mut().input = (0..16).map(|i| (raw >> i) & 1 != 0).collect();
        assert_eq!(b.read_word(0x8006).unwrap(), 0x3074);
        assert_eq!(b.session().address, 0x8007);
    }
}
