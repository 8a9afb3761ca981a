//! The memory engine: the facade tying the backing store, attribute table,
//! MMR mask table, reservation tracker, and write journal together behind
//! the primitive surface an execution engine actually calls.
//!
//! `Memory` plays the role the Design Notes call out explicitly: rather
//! than granting an execution-engine crate "friend" access to internals,
//! it implements [`ExecutionMemoryAccess`], a narrow trait carrying exactly
//! the primitives table from the external-interfaces contract.

use crate::error::MemError;
use crate::journal::WriteJournal;
use crate::loader::elf::SymbolTable;
use crate::mmr::MmrMaskTable;
use crate::page::PageAttributes;
use crate::region::{RegionKind, RegionTable};
use crate::reservation::ReservationTable;
use crate::width::Width;

/// Default page size: 4 KiB.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;
/// Default region size: 256 MiB.
pub const DEFAULT_REGION_SIZE: u64 = 256 * 1024 * 1024;

/// Construction parameters for a [`Memory`].
#[derive(Debug, Clone)]
pub struct MemoryConfig {
	/// Total address space size in bytes. Truncated down to a multiple of
	/// 4 at construction.
	pub size:        u64,
	/// Page size in bytes; must be a power of two.
	pub page_size:   u64,
	/// Region size in bytes; must be a power of two and `>= page_size`.
	pub region_size: u64,
	/// Number of harts; reservation and write-journal tables are sized to
	/// this at construction (not lazily via a later call).
	pub hart_count:  usize,
}

impl MemoryConfig {
	/// Builds a config for `size` bytes using the documented defaults
	/// (4 KiB pages, 256 MiB regions, a single hart).
	#[must_use]
	pub const fn new(size: u64) -> Self {
		Self {
			size,
			page_size: DEFAULT_PAGE_SIZE,
			region_size: DEFAULT_REGION_SIZE,
			hart_count: 1,
		}
	}

	/// Overrides the hart count.
	#[must_use]
	pub const fn with_hart_count(mut self, hart_count: usize) -> Self {
		self.hart_count = hart_count;
		self
	}

	/// Overrides the page and region sizes.
	#[must_use]
	pub const fn with_geometry(mut self, page_size: u64, region_size: u64) -> Self {
		self.page_size = page_size;
		self.region_size = region_size;
		self
	}
}

/// Which access primitive is being checked; drives the permission
/// predicate, the crossing-check substitution, and the MMR write rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessOp {
	Read,
	Write,
	Exec,
	Poke,
}

impl AccessOp {
	const fn predicate(self, a: PageAttributes) -> bool {
		match self {
			Self::Read => a.read(),
			Self::Write => a.write(),
			Self::Exec => a.exec(),
			Self::Poke => a.mapped(),
		}
	}

	const fn name(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
			Self::Exec => "exec",
			Self::Poke => "poke",
		}
	}

	/// `true` for the two ops that commit new bytes (used to decide the
	/// MMR word-alignment and masking rule).
	const fn commits(self) -> bool {
		matches!(self, Self::Write | Self::Poke)
	}

	/// The crossing-check field: ICCM for fetch, DCCM for everything else.
	const fn crossing_field(self, a: PageAttributes) -> bool {
		match self {
			Self::Exec => a.iccm(),
			_ => a.dccm(),
		}
	}

	const fn crossing_name(self) -> &'static str {
		match self {
			Self::Exec => "iccm",
			_ => "dccm",
		}
	}
}

/// The physical memory subsystem.
pub struct Memory {
	size:             u64,
	page_size:        u64,
	page_shift:       u32,
	region_size:      u64,
	store:            Vec<u8>,
	pages:            Vec<PageAttributes>,
	regions:          RegionTable,
	mmr:              MmrMaskTable,
	mmr_pages:        Vec<u32>,
	reservations:     ReservationTable,
	journal:          WriteJournal,
	symbols:          SymbolTable,
	check_unmapped_elf: bool,
}

impl Memory {
	/// Builds a new subsystem. `config.page_size` and `config.region_size`
	/// must be powers of two with `region_size >= page_size`; `config.size`
	/// is truncated down to a multiple of 4.
	pub fn new(config: MemoryConfig) -> Result<Self, MemError> {
		if !config.page_size.is_power_of_two() || !config.region_size.is_power_of_two() {
			return Err(MemError::MalformedImage(
				"page_size and region_size must be powers of two".to_owned(),
			));
		}
		if config.region_size < config.page_size {
			return Err(MemError::MalformedImage(
				"region_size must be >= page_size".to_owned(),
			));
		}

		let size = config.size & !0x3;
		let page_count = size.div_ceil(config.page_size) as usize;

		Ok(Self {
			size,
			page_size: config.page_size,
			page_shift: config.page_size.trailing_zeros(),
			region_size: config.region_size,
			store: vec![0u8; size as usize],
			pages: vec![PageAttributes::UNMAPPED; page_count],
			regions: RegionTable::new(size, config.region_size),
			mmr: MmrMaskTable::new(config.page_size),
			mmr_pages: Vec::new(),
			reservations: ReservationTable::new(config.hart_count),
			journal: WriteJournal::new(config.hart_count),
			symbols: SymbolTable::default(),
			check_unmapped_elf: false,
		})
	}

	/// Total address space size in bytes.
	#[inline]
	pub const fn size(&self) -> u64 {
		self.size
	}

	/// Configured page size in bytes.
	#[inline]
	pub const fn page_size(&self) -> u64 {
		self.page_size
	}

	/// Configured region size in bytes.
	#[inline]
	pub const fn region_size(&self) -> u64 {
		self.region_size
	}

	/// Number of hart slots in the reservation and write-journal tables.
	#[inline]
	pub fn hart_count(&self) -> usize {
		self.reservations.hart_count()
	}

	/// Enables or disables the "any loaded ELF byte must land on a mapped
	/// page" check performed by [`Self::load_elf_file`].
	pub fn set_check_unmapped_elf(&mut self, enabled: bool) {
		self.check_unmapped_elf = enabled;
	}

	pub(crate) const fn check_unmapped_elf(&self) -> bool {
		self.check_unmapped_elf
	}

	#[inline]
	const fn page_index(&self, addr: u64) -> u64 {
		addr >> self.page_shift
	}

	#[inline]
	const fn page_start(&self, addr: u64) -> u64 {
		(addr >> self.page_shift) << self.page_shift
	}

	fn attrs(&self, addr: u64) -> Option<PageAttributes> {
		if addr >= self.size {
			return None;
		}
		self.pages.get(self.page_index(addr) as usize).copied()
	}

	/// `true` if `addr` is in bounds and its page attributes are anything
	/// other than [`PageAttributes::UNMAPPED`]. Used by the ELF loader's
	/// optional unmapped-byte check.
	pub(crate) fn page_is_mapped(&self, addr: u64) -> bool {
		self.attrs(addr).is_some_and(|a| a.mapped())
	}

	/// Runs the common access contract (§ permission fetch, boundary
	/// crossing check, MMR size/alignment rule) for an access of `size`
	/// bytes at `addr`. Returns the attributes of the page the access
	/// starts on.
	fn check_access(&self, addr: u64, size: u64, op: AccessOp) -> Result<PageAttributes, MemError> {
		let a1 = self.attrs(addr).ok_or(MemError::OutOfBounds(addr))?;
		if !op.predicate(a1) {
			return Err(MemError::AttributeDenied { op: op.name(), addr });
		}

		if size > 1 && addr % size != 0 {
			// Corrected per the Open Question: check the last byte actually
			// touched by the access, not one byte past it, to avoid
			// spuriously requiring an (out-of-bounds) extra page to exist
			// at the very top of the address space.
			let last = addr + size - 1;
			if self.page_start(addr) != self.page_start(last) {
				let a2 = self.attrs(last).ok_or(MemError::OutOfBounds(last))?;
				if !op.predicate(a2) {
					return Err(MemError::AttributeDenied { op: op.name(), addr: last });
				}
				if op.crossing_field(a1) != op.crossing_field(a2) {
					return Err(MemError::BoundaryViolation { addr, boundary: op.crossing_name() });
				}
				if a1.mem_mapped_reg() != a2.mem_mapped_reg() {
					return Err(MemError::BoundaryViolation { addr, boundary: "mmr" });
				}
			}
		}

		if a1.mem_mapped_reg() {
			if size != 4 {
				return Err(MemError::MmrSizeViolation(addr));
			}
			if op.commits() && addr % 4 != 0 {
				return Err(MemError::MmrAlignment(addr));
			}
		}

		Ok(a1)
	}

	fn mmr_mask_for(&self, addr: u64) -> u32 {
		let page_index = self.page_index(addr) as u32;
		let word_index = ((addr - self.page_start(addr)) / 4) as usize;
		self.mmr.mask_at(page_index, word_index)
	}

	fn load_raw<T: Width>(&self, addr: u64) -> T {
		let start = addr as usize;
		T::from_le_bytes(&self.store[start..start + T::SIZE as usize])
	}

	fn store_raw<T: Width>(&mut self, addr: u64, value: T) {
		let start = addr as usize;
		let mut bytes = Vec::with_capacity(T::SIZE as usize);
		value.write_le_bytes(&mut bytes);
		self.store[start..start + T::SIZE as usize].copy_from_slice(&bytes);
	}

	/// Typed read. `T` is one of `u8`/`u16`/`u32`/`u64`.
	pub fn read<T: Width>(&self, addr: u64) -> Option<T> {
		match self.check_access(addr, T::SIZE, AccessOp::Read) {
			Ok(_) => Some(self.load_raw(addr)),
			Err(e) => {
				log::debug!("read denied at {addr:#x}: {e}");
				None
			}
		}
	}

	/// Byte-sized specialization of [`Self::read`]. Equivalent to
	/// `read::<u8>`; byte accesses already fail unconditionally on a
	/// memory-mapped-register page via the MMR word-size rule.
	pub fn read_byte(&self, addr: u64) -> Option<u8> {
		self.read::<u8>(addr)
	}

	fn fetch<T: Width>(&self, addr: u64) -> Option<T> {
		match self.check_access(addr, T::SIZE, AccessOp::Exec) {
			Ok(_) => Some(self.load_raw(addr)),
			Err(e) => {
				log::debug!("fetch denied at {addr:#x}: {e}");
				None
			}
		}
	}

	/// Instruction-fetch half-word read (requires `exec`).
	pub fn read_inst_half_word(&self, addr: u64) -> Option<u16> {
		self.fetch(addr)
	}

	/// Instruction-fetch word read (requires `exec`).
	pub fn read_inst_word(&self, addr: u64) -> Option<u32> {
		self.fetch(addr)
	}

	/// Typed write, journaled for `hart` and followed by cross-hart
	/// reservation invalidation.
	pub fn write<T: Width>(&mut self, hart: usize, addr: u64, value: T) -> bool {
		let a1 = match self.check_access(addr, T::SIZE, AccessOp::Write) {
			Ok(a1) => a1,
			Err(e) => {
				log::debug!("write denied at {addr:#x}: {e}");
				return false;
			}
		};

		let previous: T = self.load_raw(addr);
		let committed = if a1.mem_mapped_reg() {
			T::from_u64(value.to_u64() & u64::from(self.mmr_mask_for(addr)))
		} else {
			value
		};
		self.store_raw(addr, committed);
		self.journal.record(hart, addr, T::SIZE as u8, committed.to_u64(), previous.to_u64());
		self.reservations.invalidate_other_hart_lr(hart, addr, T::SIZE as u32);
		true
	}

	/// Byte-sized specialization of [`Self::write`].
	pub fn write_byte(&mut self, hart: usize, addr: u64, value: u8) -> bool {
		self.write::<u8>(hart, addr, value)
	}

	/// Untracked write: succeeds on any `mapped` page regardless of the
	/// `write` attribute, does not touch the write journal, and does not
	/// invalidate other harts' reservations.
	pub fn poke<T: Width>(&mut self, addr: u64, value: T) -> bool {
		let a1 = match self.check_access(addr, T::SIZE, AccessOp::Poke) {
			Ok(a1) => a1,
			Err(e) => {
				log::debug!("poke denied at {addr:#x}: {e}");
				return false;
			}
		};
		let committed = if a1.mem_mapped_reg() {
			T::from_u64(value.to_u64() & u64::from(self.mmr_mask_for(addr)))
		} else {
			value
		};
		self.store_raw(addr, committed);
		true
	}

	/// Dry-run of [`Self::write`]: runs the same checks and, if the target
	/// is a memory-mapped register, rewrites `*value` to the masked result
	/// that a real write would commit. Never mutates memory or the journal.
	pub fn check_write<T: Width>(&self, addr: u64, value: &mut T) -> bool {
		match self.check_access(addr, T::SIZE, AccessOp::Write) {
			Ok(a1) => {
				if a1.mem_mapped_reg() {
					*value = T::from_u64(value.to_u64() & u64::from(self.mmr_mask_for(addr)));
				}
				true
			}
			Err(e) => {
				log::debug!("check_write denied at {addr:#x}: {e}");
				false
			}
		}
	}

	/// Writes a single byte without checking the `write` permission bit.
	/// Still bounds-checked and still forbidden on memory-mapped-register
	/// pages (which accept only word-sized accesses). Used by the image
	/// loaders to populate ICCM (exec-only) and plain RAM pages.
	pub fn write_byte_no_access_check(&mut self, addr: u64, value: u8) -> bool {
		let Some(a1) = self.attrs(addr) else {
			log::debug!("write_byte_no_access_check out of bounds at {addr:#x}");
			return false;
		};
		if a1.mem_mapped_reg() {
			log::debug!("write_byte_no_access_check denied: {addr:#x} is a memory-mapped register");
			return false;
		}
		self.store[addr as usize] = value;
		true
	}

	// -- Reservation tracker --------------------------------------------

	/// Records a new LR reservation for `hart`.
	pub fn make_lr(&self, hart: usize, addr: u64, size: u32) {
		self.reservations.make_lr(hart, addr, size);
	}

	/// Invalidates `hart`'s reservation.
	pub fn invalidate_lr(&self, hart: usize) {
		self.reservations.invalidate_lr(hart);
	}

	/// `true` if `hart` holds a valid reservation at exactly `addr`.
	pub fn has_lr(&self, hart: usize, addr: u64) -> bool {
		self.reservations.has_lr(hart, addr)
	}

	/// Invalidates every other hart's reservation overlapping the given
	/// store range. Called automatically by [`Self::write`] and should be
	/// called explicitly by an execution engine after committing an AMO.
	pub fn invalidate_other_hart_lr(&self, hart: usize, addr: u64, store_size: u32) {
		self.reservations.invalidate_other_hart_lr(hart, addr, store_size);
	}

	// -- Write journal ----------------------------------------------------

	/// `(addr, new_value, size)` of `hart`'s most recent write; `size == 0`
	/// if none since construction or the last [`Self::clear_last_write`].
	pub fn last_write_new(&self, hart: usize) -> (u64, u64, u8) {
		self.journal.last_write_new(hart)
	}

	/// `(addr, previous_value, size)` of `hart`'s most recent write.
	pub fn last_write_old(&self, hart: usize) -> (u64, u64, u8) {
		self.journal.last_write_old(hart)
	}

	/// Clears `hart`'s write-journal record.
	pub fn clear_last_write(&self, hart: usize) {
		self.journal.clear(hart);
	}

	// -- Region / CCM / MMR configuration ---------------------------------

	fn resolve_region_range(&self, region: u32, offset: u64, size: u64) -> Result<(u64, u64), MemError> {
		if region as usize >= self.regions.len() {
			return Err(MemError::OutOfBounds(region as u64 * self.region_size));
		}
		if size == 0 || offset % self.page_size != 0 || size % self.page_size != 0 {
			return Err(MemError::MalformedImage("CCM/MMR range must be page-aligned".to_owned()));
		}
		if offset + size > self.region_size {
			return Err(MemError::OutOfBounds(u64::from(region) * self.region_size + offset + size));
		}
		let start = u64::from(region) * self.region_size + offset;
		let end = start + size;
		if end > self.size {
			return Err(MemError::OutOfBounds(end));
		}
		Ok((start, end))
	}

	fn pages_in_range(&self, start: u64, end: u64) -> std::ops::Range<usize> {
		(self.page_index(start) as usize)..(self.page_index(end - 1) as usize + 1)
	}

	fn check_no_overlap(&self, pages: std::ops::Range<usize>) -> Result<(), MemError> {
		if pages.clone().any(|i| self.pages[i].is_special()) {
			return Err(MemError::OverlapDefinition);
		}
		Ok(())
	}

	/// Marks `[offset, offset + size)` within `region` as ICCM:
	/// `iccm = exec = read = true`, `dccm = mem_mapped_reg = false`.
	pub fn define_iccm(&mut self, region: u32, offset: u64, size: u64) -> Result<(), MemError> {
		let (start, end) = self.resolve_region_range(region, offset, size)?;
		let pages = self.pages_in_range(start, end);
		self.check_no_overlap(pages.clone())?;
		for i in pages {
			self.pages[i] = PageAttributes::iccm_page();
		}
		self.regions.mark(region as usize, RegionKind::Iccm);
		Ok(())
	}

	/// Marks `[offset, offset + size)` within `region` as DCCM:
	/// `dccm = read = write = true`, `iccm = exec = false`.
	pub fn define_dccm(&mut self, region: u32, offset: u64, size: u64) -> Result<(), MemError> {
		let (start, end) = self.resolve_region_range(region, offset, size)?;
		let pages = self.pages_in_range(start, end);
		self.check_no_overlap(pages.clone())?;
		for i in pages {
			self.pages[i] = PageAttributes::dccm_page();
		}
		self.regions.mark(region as usize, RegionKind::Dccm);
		Ok(())
	}

	/// Marks `[offset, offset + size)` within `region` as memory-mapped
	/// registers: `mem_mapped_reg = read = write = true`, `exec = false`;
	/// each page's mask vector starts all-ones.
	pub fn define_mem_mapped_register_region(&mut self, region: u32, offset: u64, size: u64) -> Result<(), MemError> {
		let (start, end) = self.resolve_region_range(region, offset, size)?;
		let pages = self.pages_in_range(start, end);
		self.check_no_overlap(pages.clone())?;
		for i in pages {
			self.pages[i] = PageAttributes::mmr_page();
			self.mmr.init_page(i as u32);
		}
		self.regions.mark(region as usize, RegionKind::MemMappedReg);
		Ok(())
	}

	/// Overrides the write mask for the word at
	/// `region · region_size + region_offset + register_block_offset + register_ix · 4`.
	pub fn define_mem_mapped_register_write_mask(
		&mut self,
		region: u32,
		region_offset: u64,
		register_block_offset: u64,
		register_ix: u64,
		mask: u32,
	) -> Result<(), MemError> {
		let addr = u64::from(region) * self.region_size + region_offset + register_block_offset + register_ix * 4;
		let attrs = self.attrs(addr).ok_or(MemError::OutOfBounds(addr))?;
		if !attrs.mem_mapped_reg() {
			return Err(MemError::AttributeDenied { op: "mmr-mask", addr });
		}
		let page_index = self.page_index(addr) as u32;
		let word_index = ((addr - self.page_start(addr)) / 4) as usize;
		self.mmr.set_mask(page_index, word_index, mask);
		Ok(())
	}

	/// Recomputes derived indices after all ICCM/DCCM/MMR definitions have
	/// been made. Must be called once before execution begins.
	pub fn finish_ccm_config(&mut self) {
		self.mmr_pages = (0..self.pages.len() as u32)
			.filter(|&i| self.pages[i as usize].mem_mapped_reg())
			.collect();
	}

	/// Zeros every word on every memory-mapped-register page.
	pub fn reset_mem_mapped_registers(&mut self) {
		let page_size = self.page_size as usize;
		for page_index in self.mmr_pages.clone() {
			let start = page_index as usize * page_size;
			self.store[start..start + page_size].fill(0);
		}
	}

	/// Page-granular override of the `read` attribute at `addr`.
	pub fn set_read_access(&mut self, addr: u64, enabled: bool) -> bool {
		self.set_page_attr(addr, |a| a.with_read(enabled))
	}

	/// Page-granular override of the `write` attribute at `addr`.
	pub fn set_write_access(&mut self, addr: u64, enabled: bool) -> bool {
		self.set_page_attr(addr, |a| a.with_write(enabled))
	}

	/// Page-granular override of the `exec` attribute at `addr`.
	pub fn set_exec_access(&mut self, addr: u64, enabled: bool) -> bool {
		self.set_page_attr(addr, |a| a.with_exec(enabled))
	}

	fn set_page_attr(&mut self, addr: u64, f: impl FnOnce(PageAttributes) -> PageAttributes) -> bool {
		if addr >= self.size {
			return false;
		}
		let idx = self.page_index(addr) as usize;
		self.pages[idx] = f(self.pages[idx]);
		true
	}

	// -- Image loader glue -------------------------------------------------

	pub(crate) fn symbols_mut(&mut self) -> &mut SymbolTable {
		&mut self.symbols
	}

	/// Looks up a symbol by name (populated by [`Self::load_elf_file`]).
	pub fn find_symbol(&self, name: &str) -> Option<&crate::loader::elf::ElfSymbol> {
		self.symbols.find(name)
	}

	/// Finds the function/object symbol whose `[addr, addr + size)` range
	/// contains `addr`. If more than one matches, the smallest is returned.
	pub fn find_function(&self, addr: u64) -> Option<(&str, &crate::loader::elf::ElfSymbol)> {
		self.symbols.find_containing(addr)
	}

	/// Logs every known symbol, sorted by address, at `info` level.
	pub fn print_symbols(&self) {
		self.symbols.print();
	}
}

/// The primitive surface an execution engine calls. Carried as a trait
/// rather than granting the engine direct field access, per the Design
/// Notes' "friendship" note — the mechanism is ordinary trait dispatch,
/// not a special-cased coupling.
pub trait ExecutionMemoryAccess {
	/// See [`Memory::read`].
	fn read<T: Width>(&self, addr: u64) -> Option<T>;
	/// See [`Memory::read_inst_half_word`].
	fn read_inst_half_word(&self, addr: u64) -> Option<u16>;
	/// See [`Memory::read_inst_word`].
	fn read_inst_word(&self, addr: u64) -> Option<u32>;
	/// See [`Memory::write`].
	fn write<T: Width>(&mut self, hart: usize, addr: u64, value: T) -> bool;
	/// See [`Memory::poke`].
	fn poke<T: Width>(&mut self, addr: u64, value: T) -> bool;
	/// See [`Memory::check_write`].
	fn check_write<T: Width>(&self, addr: u64, value: &mut T) -> bool;
	/// See [`Memory::make_lr`].
	fn make_lr(&self, hart: usize, addr: u64, size: u32);
	/// See [`Memory::invalidate_lr`].
	fn invalidate_lr(&self, hart: usize);
	/// See [`Memory::has_lr`].
	fn has_lr(&self, hart: usize, addr: u64) -> bool;
	/// See [`Memory::invalidate_other_hart_lr`].
	fn invalidate_other_hart_lr(&self, hart: usize, addr: u64, store_size: u32);
	/// See [`Memory::last_write_new`].
	fn last_write_new(&self, hart: usize) -> (u64, u64, u8);
	/// See [`Memory::last_write_old`].
	fn last_write_old(&self, hart: usize) -> (u64, u64, u8);
	/// See [`Memory::clear_last_write`].
	fn clear_last_write(&self, hart: usize);
}

impl ExecutionMemoryAccess for Memory {
	fn read<T: Width>(&self, addr: u64) -> Option<T> {
		Memory::read(self, addr)
	}

	fn read_inst_half_word(&self, addr: u64) -> Option<u16> {
		Memory::read_inst_half_word(self, addr)
	}

	fn read_inst_word(&self, addr: u64) -> Option<u32> {
		Memory::read_inst_word(self, addr)
	}

	fn write<T: Width>(&mut self, hart: usize, addr: u64, value: T) -> bool {
		Memory::write(self, hart, addr, value)
	}

	fn poke<T: Width>(&mut self, addr: u64, value: T) -> bool {
		Memory::poke(self, addr, value)
	}

	fn check_write<T: Width>(&self, addr: u64, value: &mut T) -> bool {
		Memory::check_write(self, addr, value)
	}

	fn make_lr(&self, hart: usize, addr: u64, size: u32) {
		Memory::make_lr(self, hart, addr, size);
	}

	fn invalidate_lr(&self, hart: usize) {
		Memory::invalidate_lr(self, hart);
	}

	fn has_lr(&self, hart: usize, addr: u64) -> bool {
		Memory::has_lr(self, hart, addr)
	}

	fn invalidate_other_hart_lr(&self, hart: usize, addr: u64, store_size: u32) {
		Memory::invalidate_other_hart_lr(self, hart, addr, store_size);
	}

	fn last_write_new(&self, hart: usize) -> (u64, u64, u8) {
		Memory::last_write_new(self, hart)
	}

	fn last_write_old(&self, hart: usize) -> (u64, u64, u8) {
		Memory::last_write_old(self, hart)
	}

	fn clear_last_write(&self, hart: usize) {
		Memory::clear_last_write(self, hart);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn mem(size: u64) -> Memory {
		Memory::new(MemoryConfig::new(size).with_hart_count(2)).unwrap()
	}

	/// S1 — Aligned word RMW.
	#[test]
	fn s1_aligned_word_rmw() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_dccm(0, 0x10000, 0x10000).unwrap();
		assert!(m.write::<u32>(0, 0x10000, 0xdead_beef));
		assert_eq!(m.read::<u32>(0x10000), Some(0xdead_beef));
		assert_eq!(m.last_write_new(0), (0x10000, 0xdead_beef, 4));
	}

	/// S2 — DCCM boundary crossing: writing across a DCCM/unmapped
	/// boundary fails.
	#[test]
	fn s2_dccm_boundary_crossing_fails() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_dccm(0, 0x10000, 0x1000).unwrap();
		assert!(!m.write::<u32>(0, 0x10ffe, 0x1122_3344));
	}

	/// S3 — MMR masked write.
	#[test]
	fn s3_mmr_masked_write() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_mem_mapped_register_region(0, 0x20000, 0x1000).unwrap();
		m.define_mem_mapped_register_write_mask(0, 0x20000, 0, 0, 0x0000_FFFF).unwrap();
		assert!(m.write::<u32>(0, 0x20000, 0xAAAA_BBBB));
		assert_eq!(m.read::<u32>(0x20000), Some(0x0000_BBBB));
	}

	/// S4 — MMR bad size / alignment.
	#[test]
	fn s4_mmr_bad_size_and_alignment() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_mem_mapped_register_region(0, 0x20000, 0x1000).unwrap();
		m.define_mem_mapped_register_write_mask(0, 0x20000, 0, 0, 0x0000_FFFF).unwrap();
		assert!(m.read::<u8>(0x20000).is_none());
		assert!(!m.write::<u16>(0, 0x20000, 0x1234));
		assert!(!m.write::<u32>(0, 0x20002, 0x1));
	}

	/// S5 — Cross-hart LR invalidation; own-hart store does not self-invalidate.
	#[test]
	fn s5_cross_hart_lr_invalidation() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_dccm(0, 0x10000, 0x10000).unwrap();
		m.make_lr(0, 0x10010, 4);
		assert!(m.write::<u32>(1, 0x10010, 0));
		assert!(!m.has_lr(0, 0x10010));

		m.make_lr(0, 0x10010, 4);
		assert!(m.write::<u32>(0, 0x10010, 0));
		assert!(m.has_lr(0, 0x10010));
	}

	#[test]
	fn poke_ignores_write_attribute_and_skips_journal() {
		let mut m = mem(4096 * 4);
		m.define_iccm(0, 0, 4096).unwrap(); // exec/read only, no write
		assert!(m.poke::<u32>(0, 0x1234_5678));
		assert_eq!(m.read::<u32>(0), Some(0x1234_5678));
		assert_eq!(m.last_write_new(0).2, 0);
	}

	#[test]
	fn write_fails_on_read_only_page() {
		let mut m = mem(4096 * 4);
		m.define_iccm(0, 0, 4096).unwrap();
		assert!(!m.write::<u32>(0, 0, 1));
	}

	#[test]
	fn overlap_definition_is_rejected() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_dccm(0, 0x10000, 0x1000).unwrap();
		assert!(m.define_iccm(0, 0x10000, 0x1000).is_err());
	}

	#[test]
	fn open_question_fix_does_not_overread_at_top_of_memory() {
		// A misaligned 8-byte access whose *last touched byte* (addr +
		// size - 1) lands on `size - 1`, the final valid byte of the
		// address space, must succeed when both pages it straddles are
		// DCCM. The source's literal behavior probes `addr + size` (one
		// byte *past* the access) for the crossing page, which here is
		// `== size` and therefore spuriously out of bounds; the corrected
		// check (`addr + size - 1`) probes the last byte actually touched,
		// which is in bounds and on a compatible DCCM page.
		let mut m = Memory::new(
			MemoryConfig::new(12).with_geometry(4, 16).with_hart_count(1),
		)
		.unwrap();
		m.define_dccm(0, 0, 12).unwrap();
		assert!(m.write::<u64>(0, 4, 0x1122_3344_5566_7788));
		assert_eq!(m.read::<u64>(4), Some(0x1122_3344_5566_7788));
	}

	#[test]
	fn reset_mem_mapped_registers_zeroes_all_words() {
		let mut m = mem(8 * 1024 * 1024);
		m.define_mem_mapped_register_region(0, 0x20000, 0x1000).unwrap();
		m.finish_ccm_config();
		assert!(m.write::<u32>(0, 0x20000, 0xffff_ffff));
		m.reset_mem_mapped_registers();
		assert_eq!(m.read::<u32>(0x20000), Some(0));
	}
}
