//! hexdrop-core - Core library for drag-and-drop ICSP programming
//!
//! This crate turns a stream of Intel HEX characters into flash rows and
//! writes them into a target microcontroller over a bit-banged in-circuit
//! serial programming (ICSP) link. It is designed to be `no_std` compatible
//! so the same pipeline can run on the loader MCU itself or on a host.
//!
//! The pipeline, leaf first:
//!
//! - [`icsp`] - line abstraction, bit-level helpers and the per-family
//!   programming backends
//! - [`packer`] - aligns decoded byte runs into device-sized flash rows
//! - [`hex`] - character-at-a-time Intel HEX state machine
//! - [`pipeline`] - ties the decoder to the packer
//! - [`disk`] - the sector-write boundary of the virtual mass-storage volume
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, RON device database)
//! - `alloc` - Enable boxed line drivers
//!
//! # Example
//!
//! ```ignore
//! use hexdrop_core::device::builtin;
//! use hexdrop_core::icsp::IcspBackend;
//! use hexdrop_core::pipeline::Loader;
//!
//! let backend = IcspBackend::new(lines, builtin::PIC16F1);
//! let mut loader = Loader::new(backend)?;
//! loader.feed_bytes(b":00000001FF\r\n")?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod device;
pub mod disk;
pub mod error;
pub mod hex;
pub mod icsp;
pub mod packer;
pub mod pipeline;

pub use error::{Error, Result};
