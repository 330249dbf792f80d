//! PIC18 command encoding
//!
//! 8-bit commands and 24-bit payloads, MSB first. Addresses and data are
//! framed between a start and a stop bit. Q10 parts program one word per
//! command; K42 parts latch a whole row and program it with one begin.

use super::{IcspBackend, IcspLines};
use crate::device::{CommitMode, Pic18Opcodes};

fn frame(value: u32) -> u32 {
    (value << 1) & 0x7F_FFFE
}

fn increment<L: IcspLines>(b: &mut IcspBackend<L>, ops: &Pic18Opcodes) {
    b.command(ops.increment_address);
    b.session.address += 2;
}

pub(super) fn address_load<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &Pic18Opcodes,
    address: u32,
) {
    log::trace!("Loading address 0x{:06X}", address);
    b.command(ops.load_address);
    b.payload(frame(address));
    b.session.address = address;
}

pub(super) fn bulk_erase<L: IcspLines>(b: &mut IcspBackend<L>, ops: &Pic18Opcodes) {
    // pointing at the config area erases config words too
    let config = b.profile.config_address;
    address_load(b, ops, config);
    b.command(ops.bulk_erase);
    b.lines.delay_ms(b.profile.timing.bulk_erase_ms);
}

pub(super) fn write_row<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &Pic18Opcodes,
    word_address: u32,
    words: &[u16],
) {
    let address = b.profile.device_address(word_address);
    address_load(b, ops, address);
    let write_us = b.profile.timing.write_us;

    match b.profile.commit {
        CommitMode::PerWord => {
            for &word in words {
                b.command(ops.program_data);
                b.payload(frame(word as u32));
                b.lines.delay_us(write_us);
                increment(b, ops);
            }
        }
        CommitMode::PerRow => {
            let (last, head) = match words.split_last() {
                Some(split) => split,
                None => return,
            };
            for &word in head {
                b.command(ops.load_latch_increment);
                b.payload(frame(word as u32));
                b.session.address += 2;
            }
            b.command(ops.load_latch);
            b.payload(frame(*last as u32));
            b.command(ops.begin_programming);
            b.lines.delay_us(write_us);
            increment(b, ops);
        }
    }
}

pub(super) fn write_config<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &Pic18Opcodes,
    words: &[u16],
) {
    let first = b.profile.config_address + 2 * b.profile.config_offset as u32;
    address_load(b, ops, first);
    let config_us = b.profile.timing.config_write_us;

    for &word in words {
        match b.profile.commit {
            CommitMode::PerWord => {
                b.command(ops.program_data);
                b.payload(frame(word as u32));
            }
            CommitMode::PerRow => {
                b.command(ops.load_latch);
                b.payload(frame(word as u32));
                b.command(ops.begin_programming);
            }
        }
        b.lines.delay_us(config_us);
        increment(b, ops);
    }
}

pub(super) fn read_word<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &Pic18Opcodes,
    address: u32,
) -> u16 {
    address_load(b, ops, address);
    b.command(ops.read_data_increment);
    let raw = b.read_payload(24);
    b.session.address += 2;
    ((raw >> 1) & 0xFFFF) as u16
}
