//! dsPIC33 command encoding
//!
//! The target CPU executes instructions shifted in with the SIX control
//! code (4-bit code, 24-bit opcode, both LSB first). Results come back
//! through the VISI register with REGOUT.

use super::bitbang::{self, HALF_PERIOD_US};
use super::{IcspBackend, IcspLines};
use crate::device::{BitOrder, DspicOpcodes};

const NOP: u32 = 0x00_0000;
const GOTO_0X200: u32 = 0x04_0200;

fn six<L: IcspLines>(b: &mut IcspBackend<L>, ops: &DspicOpcodes, instruction: u32) {
    b.command(ops.six);
    b.payload(instruction);
    b.lines.delay_us(HALF_PERIOD_US);
}

fn nops<L: IcspLines>(b: &mut IcspBackend<L>, ops: &DspicOpcodes, count: usize) {
    for _ in 0..count {
        six(b, ops, NOP);
    }
}

/// `MOV #lit16, Wn`
fn mov_literal(literal: u16, register: u8) -> u32 {
    0x20_0000 | (literal as u32) << 4 | (register & 0x0F) as u32
}

fn exit_reset_vector<L: IcspLines>(b: &mut IcspBackend<L>, ops: &DspicOpcodes) {
    nops(b, ops, 3);
    six(b, ops, GOTO_0X200);
    nops(b, ops, 3);
}

/// Write the NVMKEY sequence and set NVMCON.WR
fn unlock_write<L: IcspLines>(b: &mut IcspBackend<L>, ops: &DspicOpcodes) {
    for instruction in [0x20_0551, 0x88_3971, 0x20_0AA1, 0x88_3971, 0xA8_E729] {
        six(b, ops, instruction);
    }
    nops(b, ops, 3);
}

pub(super) fn bulk_erase<L: IcspLines>(b: &mut IcspBackend<L>, ops: &DspicOpcodes) {
    exit_reset_vector(b, ops);
    six(b, ops, 0x24_00EA); // mov #0x400E, W10
    six(b, ops, 0x88_394A); // mov W10, NVMCON
    nops(b, ops, 2);
    unlock_write(b, ops);
    b.lines.delay_ms(b.profile.timing.bulk_erase_ms);
}

/// Point NVMADR/NVMADRU at `address` and select the double-word program
pub(super) fn address_load<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &DspicOpcodes,
    address: u32,
) {
    log::trace!("Loading address 0x{:06X}", address);
    exit_reset_vector(b, ops);
    // TBLPAG = 0xFA, the write latches
    six(b, ops, 0x20_0FAC);
    six(b, ops, 0x88_3B0A);
    six(b, ops, mov_literal(address as u16, 3));
    six(b, ops, mov_literal((address >> 16) as u16 & 0xFF, 4));
    six(b, ops, 0x88_3953); // mov W3, NVMADR
    six(b, ops, 0x88_3964); // mov W4, NVMADRU
    six(b, ops, 0x24_001A);
    nops(b, ops, 1);
    six(b, ops, 0x88_3B0A);
    nops(b, ops, 2);
    b.session.address = address;
}

/// Load the row into the write latches, two instructions per group of
/// four words, then start the write
pub(super) fn write_row<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &DspicOpcodes,
    word_address: u32,
    words: &[u16],
) {
    let address = b.profile.device_address(word_address);
    address_load(b, ops, address);

    six(b, ops, 0xEB_0380); // clr W7
    nops(b, ops, 1);
    for group in words.chunks_exact(4) {
        let (lsw0, msb0, lsw1, msb1) = (group[0], group[1], group[2], group[3]);
        six(b, ops, mov_literal(lsw0, 0));
        six(b, ops, mov_literal((msb1 & 0xFF) << 8 | (msb0 & 0xFF), 1));
        six(b, ops, mov_literal(lsw1, 2));

        six(b, ops, 0xEB_0300); // clr W6
        nops(b, ops, 1);
        six(b, ops, 0xBB_0BB6); // tblwtl [W6++], [W7]
        nops(b, ops, 2);
        six(b, ops, 0xBB_DBB6); // tblwth.b [W6++], [W7++]
        nops(b, ops, 2);
        six(b, ops, 0xBB_EBB6); // tblwth.b [W6++], [++W7]
        nops(b, ops, 2);
        six(b, ops, 0xBB_1BB6); // tblwtl [W6++], [W7++]
        nops(b, ops, 2);
    }
    unlock_write(b, ops);
    b.lines.delay_us(b.profile.timing.write_us);
}

/// Read the low word at `address` through VISI
pub(super) fn read_word<L: IcspLines>(
    b: &mut IcspBackend<L>,
    ops: &DspicOpcodes,
    address: u32,
) -> u16 {
    exit_reset_vector(b, ops);
    six(b, ops, mov_literal((address >> 16) as u16, 0));
    six(b, ops, 0x20_F887); // mov #VISI, W7
    six(b, ops, 0x88_02A0); // mov W0, TBLPAG
    six(b, ops, mov_literal(address as u16, 6));
    nops(b, ops, 1);
    six(b, ops, 0xBA_0B96); // tblrdl [W6], [W7]
    nops(b, ops, 5);

    b.command(ops.regout);
    bitbang::clock_pulses(&mut b.lines, 8);
    bitbang::read_bits(&mut b.lines, 16, BitOrder::LsbFirst) as u16
}
