//! Error kinds surfaced by configuration, image loading, and probing.
//!
//! The hot-path access primitives (`read`, `write`, `fetch`, `poke`,
//! `check_write`) deliberately do **not** return [`MemError`] — they return
//! a plain `bool`/`Option` per call, matching the access-primitive table in
//! the external-interfaces contract. `MemError` exists for the
//! configuration and image-loading surfaces, where a caller benefits from
//! knowing *why* a call failed.

use std::io;

/// Errors produced by region/CCM/MMR configuration and by the image loaders.
#[derive(Debug, thiserror::Error)]
pub enum MemError {
	/// An address (or address range) fell outside `0..size`.
	#[error("address {0:#x} is out of bounds")]
	OutOfBounds(u64),

	/// A read, write, or fetch was attempted against a page lacking the
	/// required permission.
	#[error("{op} denied at {addr:#x}")]
	AttributeDenied {
		/// The operation that was denied (`"read"`, `"write"`, `"exec"`, `"poke"`).
		op:   &'static str,
		/// The address at which the access was attempted.
		addr: u64,
	},

	/// A misaligned access straddled a page boundary where the two pages
	/// disagree on DCCM, ICCM, or memory-mapped-register membership.
	#[error("misaligned access at {addr:#x} crosses a {boundary} boundary")]
	BoundaryViolation {
		/// The address at which the access was attempted.
		addr:     u64,
		/// Which boundary kind was crossed (`"dccm"`, `"iccm"`, `"mmr"`).
		boundary: &'static str,
	},

	/// A non-word-sized access was attempted against a memory-mapped
	/// register page.
	#[error("non-word access to memory-mapped register at {0:#x}")]
	MmrSizeViolation(u64),

	/// A word-sized access to a memory-mapped register page was not
	/// 4-byte aligned.
	#[error("unaligned word access to memory-mapped register at {0:#x}")]
	MmrAlignment(u64),

	/// An ICCM/DCCM/MMR definition claimed one or more pages already
	/// claimed by another definition.
	#[error("region definition overlaps an existing ICCM/DCCM/MMR definition")]
	OverlapDefinition,

	/// The image file could not be parsed.
	#[error("malformed image: {0}")]
	MalformedImage(String),

	/// A loaded image byte landed on a page with no mapped permissions.
	#[error("image byte at {0:#x} falls on an unmapped page")]
	UnmappedImageByte(u64),

	/// The ELF file's class (32/64-bit) did not match the requested
	/// register width.
	#[error("ELF class mismatch: file is {found}, expected {expected}")]
	ClassMismatch {
		/// The class found in the file (`"ELF32"` or `"ELF64"`).
		found:    &'static str,
		/// The class requested by the caller.
		expected: &'static str,
	},

	/// A hart index was out of range for the configured hart count.
	#[error("invalid hart index {0}")]
	InvalidHartIndex(usize),

	/// Underlying I/O failure while reading an image file.
	#[error(transparent)]
	Io(#[from] io::Error),
}
