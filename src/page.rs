//! Per-page attribute records.
//!
//! One [`PageAttributes`] byte is kept per page, regardless of page size,
//! so that shrinking `page_size` down towards the smallest realistic value
//! does not blow up the attribute table's memory footprint.

/// Readable.
const READ: u8 = 1 << 0;
/// Writable.
const WRITE: u8 = 1 << 1;
/// Executable.
const EXEC: u8 = 1 << 2;
/// Belongs to an Instruction Closely-Coupled Memory region.
const ICCM: u8 = 1 << 3;
/// Belongs to a Data Closely-Coupled Memory region.
const DCCM: u8 = 1 << 4;
/// Contains memory-mapped registers (PIC).
const MMR: u8 = 1 << 5;

/// A bit-packed set of access attributes for a single page.
///
/// Six named bits fit comfortably in one byte, which keeps the attribute
/// table's density at one byte per page even when `page_size` is tiny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageAttributes(u8);

impl PageAttributes {
	/// The all-zero (unmapped, plain RAM) attribute set.
	pub const UNMAPPED: Self = Self(0);

	/// Returns `true` if the page is readable.
	#[inline]
	pub const fn read(self) -> bool {
		self.0 & READ != 0
	}

	/// Returns `true` if the page is writable.
	#[inline]
	pub const fn write(self) -> bool {
		self.0 & WRITE != 0
	}

	/// Returns `true` if the page is executable.
	#[inline]
	pub const fn exec(self) -> bool {
		self.0 & EXEC != 0
	}

	/// Returns `true` if the page belongs to an ICCM region.
	#[inline]
	pub const fn iccm(self) -> bool {
		self.0 & ICCM != 0
	}

	/// Returns `true` if the page belongs to a DCCM region.
	#[inline]
	pub const fn dccm(self) -> bool {
		self.0 & DCCM != 0
	}

	/// Returns `true` if the page holds memory-mapped registers.
	#[inline]
	pub const fn mem_mapped_reg(self) -> bool {
		self.0 & MMR != 0
	}

	/// `read || write || exec`.
	#[inline]
	pub const fn mapped(self) -> bool {
		self.read() || self.write() || self.exec()
	}

	/// `!dccm && !mem_mapped_reg` — ordinary, externally-backed RAM.
	#[inline]
	pub const fn external(self) -> bool {
		!self.dccm() && !self.mem_mapped_reg()
	}

	/// Builds an ICCM page: `iccm = exec = read = true`, `dccm = mmr = false`.
	#[must_use]
	pub const fn iccm_page() -> Self {
		Self(READ | EXEC | ICCM)
	}

	/// Builds a DCCM page: `dccm = read = write = true`, `iccm = exec = false`.
	#[must_use]
	pub const fn dccm_page() -> Self {
		Self(READ | WRITE | DCCM)
	}

	/// Builds a memory-mapped-register page: `mmr = read = write = true`, `exec = false`.
	#[must_use]
	pub const fn mmr_page() -> Self {
		Self(READ | WRITE | MMR)
	}

	/// Returns a copy with the `read` bit set to `enabled`.
	#[must_use]
	pub const fn with_read(self, enabled: bool) -> Self {
		if enabled { Self(self.0 | READ) } else { Self(self.0 & !READ) }
	}

	/// Returns a copy with the `write` bit set to `enabled`.
	#[must_use]
	pub const fn with_write(self, enabled: bool) -> Self {
		if enabled { Self(self.0 | WRITE) } else { Self(self.0 & !WRITE) }
	}

	/// Returns a copy with the `exec` bit set to `enabled`.
	#[must_use]
	pub const fn with_exec(self, enabled: bool) -> Self {
		if enabled { Self(self.0 | EXEC) } else { Self(self.0 & !EXEC) }
	}

	/// Returns `true` if any of the ICCM/DCCM/MMR bits are set.
	#[inline]
	pub const fn is_special(self) -> bool {
		self.0 & (ICCM | DCCM | MMR) != 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn iccm_page_is_exec_read_not_dccm_not_mmr() {
		let p = PageAttributes::iccm_page();
		assert!(p.iccm());
		assert!(p.read());
		assert!(p.exec());
		assert!(!p.write());
		assert!(!p.dccm());
		assert!(!p.mem_mapped_reg());
	}

	#[test]
	fn dccm_page_is_read_write_not_iccm_not_exec() {
		let p = PageAttributes::dccm_page();
		assert!(p.dccm());
		assert!(p.read());
		assert!(p.write());
		assert!(!p.exec());
		assert!(!p.iccm());
	}

	#[test]
	fn mmr_page_is_read_write_not_exec() {
		let p = PageAttributes::mmr_page();
		assert!(p.mem_mapped_reg());
		assert!(p.read());
		assert!(p.write());
		assert!(!p.exec());
	}

	#[test]
	fn mapped_and_external_predicates() {
		assert!(!PageAttributes::UNMAPPED.mapped());
		assert!(PageAttributes::dccm_page().mapped());
		assert!(!PageAttributes::dccm_page().external());
		assert!(!PageAttributes::mmr_page().external());
		assert!(PageAttributes::iccm_page().external());
	}

	#[test]
	fn with_write_toggles_only_write_bit() {
		let p = PageAttributes::iccm_page().with_write(true);
		assert!(p.write());
		assert!(p.exec());
		assert!(p.iccm());
		let p = p.with_write(false);
		assert!(!p.write());
	}
}
