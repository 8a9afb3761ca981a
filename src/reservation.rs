//! LR/SC reservation tracking, partitioned by hart.
//!
//! Each hart's slot is guarded by its own [`Mutex`] (the hosted counterpart
//! of the teacher's kernel-side cross-core synchronization primitives) so
//! that `invalidate_other_hart_lr` is sound even if an embedder steps harts
//! on separate OS threads; a single-threaded embedder only pays uncontended
//! lock overhead.

use std::sync::Mutex;

/// A hart's current load-reserved record.
#[derive(Debug, Clone, Copy, Default)]
struct Reservation {
	addr:  u64,
	size:  u32,
	valid: bool,
}

impl Reservation {
	/// Byte range `[addr, addr + size)`, or `None` if not valid.
	fn range(&self) -> Option<(u64, u64)> {
		self.valid.then(|| (self.addr, self.addr + u64::from(self.size)))
	}
}

/// Per-hart table of LR/SC reservations.
pub struct ReservationTable {
	harts: Vec<Mutex<Reservation>>,
}

/// Returns `true` if byte ranges `[a0, a1)` and `[b0, b1)` overlap
/// (inclusive of either endpoint lying within the other range).
fn ranges_overlap(a0: u64, a1: u64, b0: u64, b1: u64) -> bool {
	a0 < b1 && b0 < a1
}

impl ReservationTable {
	/// Builds a table with `hart_count` empty (invalid) reservations.
	pub fn new(hart_count: usize) -> Self {
		Self {
			harts: (0..hart_count).map(|_| Mutex::new(Reservation::default())).collect(),
		}
	}

	/// The number of hart slots.
	#[inline]
	pub fn hart_count(&self) -> usize {
		self.harts.len()
	}

	/// Records a new reservation `{addr, size, valid = true}` for `hart`.
	pub fn make_lr(&self, hart: usize, addr: u64, size: u32) {
		if let Some(slot) = self.harts.get(hart) {
			let mut r = slot.lock().unwrap();
			*r = Reservation { addr, size, valid: true };
		}
	}

	/// Invalidates `hart`'s reservation, if any.
	pub fn invalidate_lr(&self, hart: usize) {
		if let Some(slot) = self.harts.get(hart) {
			slot.lock().unwrap().valid = false;
		}
	}

	/// `true` if `hart` holds a valid reservation whose address equals `addr`.
	pub fn has_lr(&self, hart: usize, addr: u64) -> bool {
		self.harts
			.get(hart)
			.is_some_and(|slot| {
				let r = slot.lock().unwrap();
				r.valid && r.addr == addr
			})
	}

	/// Invalidates every *other* hart's reservation whose range overlaps
	/// the store range `[addr, addr + store_size)`. Must be called after a
	/// committed write or AMO; the writing hart's own reservation is left
	/// untouched (a hart's store to its own reserved range does not
	/// self-invalidate).
	pub fn invalidate_other_hart_lr(&self, hart: usize, addr: u64, store_size: u32) {
		let store_end = addr + u64::from(store_size);
		for (i, slot) in self.harts.iter().enumerate() {
			if i == hart {
				continue;
			}
			let mut r = slot.lock().unwrap();
			if let Some((r0, r1)) = r.range() {
				if ranges_overlap(r0, r1, addr, store_end) {
					r.valid = false;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cross_hart_overlapping_store_invalidates() {
		let t = ReservationTable::new(2);
		t.make_lr(0, 0x10010, 4);
		t.invalidate_other_hart_lr(1, 0x10010, 4);
		assert!(!t.has_lr(0, 0x10010));
	}

	#[test]
	fn own_hart_store_does_not_self_invalidate() {
		let t = ReservationTable::new(2);
		t.make_lr(0, 0x10010, 4);
		t.invalidate_other_hart_lr(0, 0x10010, 4);
		assert!(t.has_lr(0, 0x10010));
	}

	#[test]
	fn non_overlapping_store_leaves_reservation_valid() {
		let t = ReservationTable::new(2);
		t.make_lr(0, 0x10010, 4);
		t.invalidate_other_hart_lr(1, 0x20000, 4);
		assert!(t.has_lr(0, 0x10010));
	}

	#[test]
	fn partial_overlap_at_either_end_invalidates() {
		let t = ReservationTable::new(2);
		t.make_lr(0, 0x1000, 4); // [0x1000, 0x1004)
		t.invalidate_other_hart_lr(1, 0x1002, 4); // [0x1002, 0x1006)
		assert!(!t.has_lr(0, 0x1000));
	}

	#[test]
	fn invalidate_lr_clears_reservation() {
		let t = ReservationTable::new(1);
		t.make_lr(0, 0x10, 4);
		t.invalidate_lr(0);
		assert!(!t.has_lr(0, 0x10));
	}
}
