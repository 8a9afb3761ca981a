//! Per-hart last-write record, for rollback and tracing.
//!
//! This is a single slot per hart, not a log: each successful write
//! overwrites the previous record. `size == 0` encodes "no tracked write
//! since construction or the last [`WriteJournal::clear`]".

use std::sync::Mutex;

/// One hart's most recent committed write.
#[derive(Debug, Clone, Copy, Default)]
struct LastWrite {
	addr:     u64,
	size:     u8,
	new:      u64,
	previous: u64,
}

/// Per-hart table of last-write records.
pub struct WriteJournal {
	harts: Vec<Mutex<LastWrite>>,
}

impl WriteJournal {
	/// Builds a journal with `hart_count` empty (size-0) slots.
	pub fn new(hart_count: usize) -> Self {
		Self {
			harts: (0..hart_count).map(|_| Mutex::new(LastWrite::default())).collect(),
		}
	}

	/// Records a committed write for `hart`. `size` must be one of
	/// `{1, 2, 4, 8}`.
	pub fn record(&self, hart: usize, addr: u64, size: u8, new: u64, previous: u64) {
		if let Some(slot) = self.harts.get(hart) {
			*slot.lock().unwrap() = LastWrite { addr, size, new, previous };
		}
	}

	/// `(addr, new_value, size)` for the most recent write, or `size == 0`
	/// if none since construction or the last [`Self::clear`].
	pub fn last_write_new(&self, hart: usize) -> (u64, u64, u8) {
		self.harts
			.get(hart)
			.map(|slot| {
				let w = slot.lock().unwrap();
				(w.addr, w.new, w.size)
			})
			.unwrap_or((0, 0, 0))
	}

	/// `(addr, previous_value, size)` for the most recent write, or
	/// `size == 0` if none since construction or the last [`Self::clear`].
	pub fn last_write_old(&self, hart: usize) -> (u64, u64, u8) {
		self.harts
			.get(hart)
			.map(|slot| {
				let w = slot.lock().unwrap();
				(w.addr, w.previous, w.size)
			})
			.unwrap_or((0, 0, 0))
	}

	/// Clears `hart`'s record (`size` becomes `0`).
	pub fn clear(&self, hart: usize) {
		if let Some(slot) = self.harts.get(hart) {
			slot.lock().unwrap().size = 0;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_journal_reports_size_zero() {
		let j = WriteJournal::new(1);
		assert_eq!(j.last_write_new(0), (0, 0, 0));
		assert_eq!(j.last_write_old(0), (0, 0, 0));
	}

	#[test]
	fn record_then_read_round_trips() {
		let j = WriteJournal::new(1);
		j.record(0, 0x10000, 4, 0xdead_beef, 0x1111_1111);
		assert_eq!(j.last_write_new(0), (0x10000, 0xdead_beef, 4));
		assert_eq!(j.last_write_old(0), (0x10000, 0x1111_1111, 4));
	}

	#[test]
	fn clear_resets_size_only() {
		let j = WriteJournal::new(1);
		j.record(0, 0x10000, 4, 1, 2);
		j.clear(0);
		assert_eq!(j.last_write_new(0).2, 0);
	}

	#[test]
	fn harts_are_independent() {
		let j = WriteJournal::new(2);
		j.record(0, 0x10000, 4, 1, 0);
		assert_eq!(j.last_write_new(1), (0, 0, 0));
	}
}
