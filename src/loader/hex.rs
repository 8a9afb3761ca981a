//! Intel-hex-style image loader.
//!
//! Input is a sequence of text lines, each either `@<hex-address>` (sets
//! the write cursor) or whitespace-separated two-hex-digit byte tokens
//! (written sequentially from the cursor, advancing it). Blank lines are
//! tolerated as a formatting nicety; anything else is a malformed line.

use std::fs;
use std::path::Path;

use crate::error::MemError;
use crate::memory::Memory;

/// Loads a hex image from `path` into `mem`, writing bytes via
/// [`Memory::write_byte_no_access_check`] (bypassing the `write`
/// permission bit, as image loads must be able to populate exec-only ICCM
/// pages) but still bounds- and MMR-checked.
pub fn load_hex_file(mem: &mut Memory, path: impl AsRef<Path>) -> Result<(), MemError> {
	let text = fs::read_to_string(path)?;
	let mut cursor: u64 = 0;

	for (lineno, raw_line) in text.lines().enumerate() {
		let line = raw_line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(hex_addr) = line.strip_prefix('@') {
			cursor = u64::from_str_radix(hex_addr.trim(), 16)
				.map_err(|_| malformed(lineno, "bad @address"))?;
			continue;
		}

		for token in line.split_whitespace() {
			if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
				return Err(malformed(lineno, "expected two-hex-digit byte token"));
			}
			let byte = u8::from_str_radix(token, 16).map_err(|_| malformed(lineno, "bad byte token"))?;
			if !mem.write_byte_no_access_check(cursor, byte) {
				return Err(MemError::OutOfBounds(cursor));
			}
			cursor += 1;
		}
	}

	Ok(())
}

fn malformed(lineno: usize, why: &str) -> MemError {
	MemError::MalformedImage(format!("hex image, line {}: {why}", lineno + 1))
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use tempfile::NamedTempFile;

	use super::*;
	use crate::memory::MemoryConfig;

	#[test]
	fn loads_sequential_bytes_from_cursor() {
		let mut f = NamedTempFile::new().unwrap();
		writeln!(f, "@00000010").unwrap();
		writeln!(f, "DE AD BE EF").unwrap();

		let mut m = Memory::new(MemoryConfig::new(4096).with_hart_count(1)).unwrap();
		m.define_dccm(0, 0, 4096).unwrap();
		load_hex_file(&mut m, f.path()).unwrap();

		assert_eq!(m.read::<u8>(0x10), Some(0xDE));
		assert_eq!(m.read::<u8>(0x13), Some(0xEF));
	}

	#[test]
	fn unknown_line_fails() {
		let mut f = NamedTempFile::new().unwrap();
		writeln!(f, "not a hex record").unwrap();

		let mut m = Memory::new(MemoryConfig::new(4096).with_hart_count(1)).unwrap();
		m.define_dccm(0, 0, 4096).unwrap();
		assert!(load_hex_file(&mut m, f.path()).is_err());
	}
}
