//! RISC-V ELF32/ELF64 loader and symbol table.
//!
//! Grounded on the teacher's hand-rolled ELF parser (no `goblin`/`object`
//! dependency, same header-struct-and-iterator shape), generalized from
//! in-memory pointer casts over an already-mapped image to explicit
//! little-endian field extraction over a file loaded into a `Vec<u8>` —
//! the "portable rewrite" the Design Notes call for.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::MemError;
use crate::memory::Memory;

const EI_MAG: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_RISCV: u16 = 0xF3;
const PT_LOAD: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;

/// A symbol's address and size, as recorded in an ELF symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfSymbol {
	/// The symbol's address.
	pub addr: u64,
	/// The symbol's size in bytes (may be `0` for symbols without a known size).
	pub size: u64,
}

/// Name → `{addr, size}` table populated by [`load_elf_file`].
#[derive(Default)]
pub struct SymbolTable {
	by_name: HashMap<String, ElfSymbol>,
}

impl SymbolTable {
	fn insert(&mut self, name: String, sym: ElfSymbol) {
		self.by_name.insert(name, sym);
	}

	/// Looks up a symbol by exact name.
	pub fn find(&self, name: &str) -> Option<&ElfSymbol> {
		self.by_name.get(name)
	}

	/// Finds the symbol whose `[addr, addr + size)` range contains `query`.
	/// If more than one matches, the smallest-sized one is returned.
	pub fn find_containing(&self, query: u64) -> Option<(&str, &ElfSymbol)> {
		self.by_name
			.iter()
			.filter(|(_, s)| query >= s.addr && query < s.addr + s.size.max(1))
			.min_by_key(|(_, s)| s.size)
			.map(|(name, sym)| (name.as_str(), sym))
	}

	/// Logs every symbol, sorted by address, at `info` level.
	pub fn print(&self) {
		let mut entries: Vec<_> = self.by_name.iter().collect();
		entries.sort_by_key(|(_, s)| s.addr);
		for (name, sym) in entries {
			log::info!("{:#010x} {:>8} {name}", sym.addr, sym.size);
		}
	}
}

fn u16_le(b: &[u8], at: usize) -> Result<u16, MemError> {
	b.get(at..at + 2)
		.map(|s| u16::from_le_bytes([s[0], s[1]]))
		.ok_or_else(|| malformed("truncated ELF header"))
}

fn u32_le(b: &[u8], at: usize) -> Result<u32, MemError> {
	b.get(at..at + 4)
		.map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
		.ok_or_else(|| malformed("truncated ELF header"))
}

fn u64_le(b: &[u8], at: usize) -> Result<u64, MemError> {
	b.get(at..at + 8)
		.map(|s| u64::from_le_bytes(s.try_into().unwrap()))
		.ok_or_else(|| malformed("truncated ELF header"))
}

fn malformed(why: &str) -> MemError {
	MemError::MalformedImage(why.to_owned())
}

/// A parsed ELF identification + file header, class-generic over the
/// offsets that differ between ELF32 and ELF64.
struct ElfHeader {
	is64:       bool,
	entry:      u64,
	ph_off:     u64,
	ph_entsize: u16,
	ph_num:     u16,
	sh_off:     u64,
	sh_entsize: u16,
	sh_num:     u16,
	sh_strndx:  u16,
}

fn parse_header(bytes: &[u8]) -> Result<ElfHeader, MemError> {
	if bytes.len() < 20 || bytes[0..4] != EI_MAG {
		return Err(malformed("bad ELF magic"));
	}
	let class = bytes[4];
	if class != ELFCLASS32 && class != ELFCLASS64 {
		return Err(malformed("invalid EI_CLASS"));
	}
	if bytes[5] != ELFDATA2LSB {
		return Err(malformed("only little-endian ELF files are supported"));
	}

	let is64 = class == ELFCLASS64;
	let e_type = u16_le(bytes, 16)?;
	if e_type != ET_EXEC {
		return Err(malformed("only statically-linked (ET_EXEC) ELF files are supported"));
	}
	let e_machine = u16_le(bytes, 18)?;
	if e_machine != EM_RISCV {
		return Err(malformed("not a RISC-V ELF file"));
	}

	if is64 {
		Ok(ElfHeader {
			is64,
			entry: u64_le(bytes, 24)?,
			ph_off: u64_le(bytes, 32)?,
			sh_off: u64_le(bytes, 40)?,
			ph_entsize: u16_le(bytes, 54)?,
			ph_num: u16_le(bytes, 56)?,
			sh_entsize: u16_le(bytes, 58)?,
			sh_num: u16_le(bytes, 60)?,
			sh_strndx: u16_le(bytes, 62)?,
		})
	} else {
		Ok(ElfHeader {
			is64,
			entry: u64::from(u32_le(bytes, 24)?),
			ph_off: u64::from(u32_le(bytes, 28)?),
			sh_off: u64::from(u32_le(bytes, 32)?),
			ph_entsize: u16_le(bytes, 42)?,
			ph_num: u16_le(bytes, 44)?,
			sh_entsize: u16_le(bytes, 46)?,
			sh_num: u16_le(bytes, 48)?,
			sh_strndx: u16_le(bytes, 50)?,
		})
	}
}

/// One program-header entry, normalized to 64-bit fields.
struct ProgHeader {
	ty:        u32,
	offset:    u64,
	paddr:     u64,
	file_size: u64,
	mem_size:  u64,
}

fn program_headers(bytes: &[u8], hdr: &ElfHeader) -> Result<Vec<ProgHeader>, MemError> {
	let mut out = Vec::with_capacity(hdr.ph_num as usize);
	for i in 0..hdr.ph_num {
		let base = hdr.ph_off as usize + usize::from(i) * usize::from(hdr.ph_entsize);
		let entry = if hdr.is64 {
			ProgHeader {
				ty:        u32_le(bytes, base)?,
				offset:    u64_le(bytes, base + 8)?,
				paddr:     u64_le(bytes, base + 24)?,
				file_size: u64_le(bytes, base + 32)?,
				mem_size:  u64_le(bytes, base + 40)?,
			}
		} else {
			ProgHeader {
				ty:        u32_le(bytes, base)?,
				offset:    u64::from(u32_le(bytes, base + 4)?),
				paddr:     u64::from(u32_le(bytes, base + 12)?),
				file_size: u64::from(u32_le(bytes, base + 16)?),
				mem_size:  u64::from(u32_le(bytes, base + 20)?),
			}
		};
		out.push(entry);
	}
	Ok(out)
}

struct SectionHeader {
	name_off: u32,
	ty:       u32,
	offset:   u64,
	size:     u64,
	link:     u32,
	entsize:  u64,
}

fn section_headers(bytes: &[u8], hdr: &ElfHeader) -> Result<Vec<SectionHeader>, MemError> {
	let mut out = Vec::with_capacity(hdr.sh_num as usize);
	for i in 0..hdr.sh_num {
		let base = hdr.sh_off as usize + usize::from(i) * usize::from(hdr.sh_entsize);
		let entry = if hdr.is64 {
			SectionHeader {
				name_off: u32_le(bytes, base)?,
				ty:       u32_le(bytes, base + 4)?,
				offset:   u64_le(bytes, base + 24)?,
				size:     u64_le(bytes, base + 32)?,
				link:     u32_le(bytes, base + 40)?,
				entsize:  u64_le(bytes, base + 56)?,
			}
		} else {
			SectionHeader {
				name_off: u32_le(bytes, base)?,
				ty:       u32_le(bytes, base + 4)?,
				offset:   u64::from(u32_le(bytes, base + 16)?),
				size:     u64::from(u32_le(bytes, base + 20)?),
				link:     u32_le(bytes, base + 24)?,
				entsize:  u64::from(u32_le(bytes, base + 36)?),
			}
		};
		out.push(entry);
	}
	Ok(out)
}

/// One symbol-table entry, normalized to 64-bit fields.
struct Sym {
	name_off: u32,
	value:    u64,
	size:     u64,
	sym_type: u8,
}

fn symtab_entries(bytes: &[u8], hdr: &ElfHeader, sh: &SectionHeader) -> Result<Vec<Sym>, MemError> {
	let entsize = if hdr.is64 { 24 } else { 16 } as u64;
	let entsize = if sh.entsize != 0 { sh.entsize } else { entsize };
	let count = (sh.size / entsize.max(1)) as usize;
	let mut out = Vec::with_capacity(count);
	for i in 0..count {
		let base = sh.offset as usize + i * entsize as usize;
		let entry = if hdr.is64 {
			Sym {
				name_off: u32_le(bytes, base)?,
				sym_type: bytes.get(base + 4).copied().ok_or_else(|| malformed("truncated symtab"))? & 0xF,
				value:    u64_le(bytes, base + 8)?,
				size:     u64_le(bytes, base + 16)?,
			}
		} else {
			Sym {
				name_off: u32_le(bytes, base)?,
				value:    u64::from(u32_le(bytes, base + 4)?),
				size:     u64::from(u32_le(bytes, base + 8)?),
				sym_type: bytes.get(base + 12).copied().ok_or_else(|| malformed("truncated symtab"))? & 0xF,
			}
		};
		out.push(entry);
	}
	Ok(out)
}

fn c_str_at(bytes: &[u8], offset: usize) -> String {
	let end = bytes[offset..].iter().position(|&b| b == 0).map_or(bytes.len(), |p| offset + p);
	String::from_utf8_lossy(&bytes[offset..end]).into_owned()
}

/// Loads a RISC-V ELF executable from `path` into `mem`.
///
/// `register_width` must be `32` or `64`; a mismatch against the file's
/// actual class is reported as [`MemError::ClassMismatch`]. Every
/// `PT_LOAD` segment's file bytes are copied to its physical address
/// (`p_paddr`) via [`Memory::write_byte_no_access_check`], zero-extended to
/// `p_memsz`. If [`Memory::set_check_unmapped_elf`] is enabled, any segment
/// byte landing on an unmapped page is an error. Function and object
/// symbols are extracted into the memory's symbol table.
///
/// Returns `(entry_point, end)` where `end` is the exclusive upper bound of
/// the highest address written.
pub fn load_elf_file(mem: &mut Memory, path: impl AsRef<Path>, register_width: u8) -> Result<(u64, u64), MemError> {
	let bytes = fs::read(path)?;
	let hdr = parse_header(&bytes)?;

	let expected64 = match register_width {
		32 => false,
		64 => true,
		_ => return Err(malformed("register_width must be 32 or 64")),
	};
	if hdr.is64 != expected64 {
		return Err(MemError::ClassMismatch {
			found:    if hdr.is64 { "ELF64" } else { "ELF32" },
			expected: if expected64 { "ELF64" } else { "ELF32" },
		});
	}

	let mut end = 0u64;
	for ph in program_headers(&bytes, &hdr)? {
		if ph.ty != PT_LOAD {
			continue;
		}
		let file_bytes = bytes
			.get(ph.offset as usize..(ph.offset + ph.file_size) as usize)
			.ok_or_else(|| malformed("segment extends past end of file"))?;

		for (i, &b) in file_bytes.iter().enumerate() {
			let addr = ph.paddr + i as u64;
			if mem.check_unmapped_elf() && !mem.page_is_mapped(addr) {
				return Err(MemError::UnmappedImageByte(addr));
			}
			if !mem.write_byte_no_access_check(addr, b) {
				return Err(MemError::OutOfBounds(addr));
			}
		}
		for i in ph.file_size..ph.mem_size {
			let addr = ph.paddr + i;
			if mem.check_unmapped_elf() && !mem.page_is_mapped(addr) {
				return Err(MemError::UnmappedImageByte(addr));
			}
			if !mem.write_byte_no_access_check(addr, 0) {
				return Err(MemError::OutOfBounds(addr));
			}
		}

		end = end.max(ph.paddr + ph.mem_size);
	}

	load_symbols(&bytes, &hdr, mem.symbols_mut())?;

	Ok((hdr.entry, end))
}

fn load_symbols(bytes: &[u8], hdr: &ElfHeader, symbols: &mut SymbolTable) -> Result<(), MemError> {
	let sections = section_headers(bytes, hdr)?;

	for sh in sections.iter().filter(|s| s.ty == SHT_SYMTAB) {
		let strtab = sections
			.get(sh.link as usize)
			.filter(|s| s.ty == SHT_STRTAB)
			.ok_or_else(|| malformed("symtab references non-strtab section"))?;

		for sym in symtab_entries(bytes, hdr, sh)? {
			if sym.sym_type != STT_FUNC && sym.sym_type != STT_OBJECT {
				continue;
			}
			if sym.name_off == 0 {
				continue;
			}
			let name = c_str_at(bytes, strtab.offset as usize + sym.name_off as usize);
			if name.is_empty() {
				continue;
			}
			symbols.insert(name, ElfSymbol { addr: sym.value, size: sym.size });
		}
	}

	Ok(())
}

/// Static probe: the `[min, max)` physical address bounds spanned by every
/// `PT_LOAD` segment, without touching any memory.
pub fn get_elf_file_address_bounds(path: impl AsRef<Path>) -> Result<(u64, u64), MemError> {
	let bytes = fs::read(path)?;
	let hdr = parse_header(&bytes)?;
	let mut min = u64::MAX;
	let mut max = 0u64;
	for ph in program_headers(&bytes, &hdr)?.into_iter().filter(|p| p.ty == PT_LOAD) {
		min = min.min(ph.paddr);
		max = max.max(ph.paddr + ph.mem_size);
	}
	if min > max {
		min = 0;
	}
	Ok((min, max))
}

/// Static probe: `(is32, is64, is_riscv)` read from the ELF identification
/// header only.
pub fn check_elf_file(path: impl AsRef<Path>) -> Result<(bool, bool, bool), MemError> {
	let bytes = fs::read(path)?;
	if bytes.len() < 20 || bytes[0..4] != EI_MAG {
		return Err(malformed("bad ELF magic"));
	}
	let is32 = bytes[4] == ELFCLASS32;
	let is64 = bytes[4] == ELFCLASS64;
	let is_riscv = u16_le(&bytes, 18)? == EM_RISCV;
	Ok((is32, is64, is_riscv))
}

/// Static probe: scans the symbol table for `name` without mutating any
/// subsystem state.
pub fn is_symbol_in_elf_file(path: impl AsRef<Path>, name: &str) -> Result<bool, MemError> {
	let bytes = fs::read(path)?;
	let hdr = parse_header(&bytes)?;
	let mut symbols = SymbolTable::default();
	load_symbols(&bytes, &hdr, &mut symbols)?;
	Ok(symbols.find(name).is_some())
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use tempfile::NamedTempFile;

	use super::*;
	use crate::memory::MemoryConfig;

	/// Builds a minimal ET_EXEC/EM_RISCV ELF64 image with a single
	/// `PT_LOAD` segment containing one NOP instruction at `entry`, plus a
	/// `.symtab`/`.strtab` pair defining `_start`.
	fn build_tiny_elf64(entry: u64) -> Vec<u8> {
		let mut buf = vec![0u8; 64]; // ELF64 header
		buf[0..4].copy_from_slice(&EI_MAG);
		buf[4] = ELFCLASS64;
		buf[5] = ELFDATA2LSB;
		buf[6] = 1; // EI_VERSION
		buf[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
		buf[18..20].copy_from_slice(&EM_RISCV.to_le_bytes());
		buf[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
		buf[24..32].copy_from_slice(&entry.to_le_bytes()); // e_entry
		buf[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
		buf[54..56].copy_from_slice(&56u16.to_le_bytes()); // e_phentsize

		// One PT_LOAD program header, right after the ELF header.
		let ph_off = buf.len() as u64;
		buf[32..40].copy_from_slice(&ph_off.to_le_bytes());
		buf[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
		buf[58..60].copy_from_slice(&64u16.to_le_bytes()); // e_shentsize

		let code = 0x0000_0013u32.to_le_bytes(); // addi x0, x0, 0 (NOP)
		let seg_offset = ph_off + 56;
		let mut ph = vec![0u8; 56];
		ph[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
		ph[8..16].copy_from_slice(&seg_offset.to_le_bytes());
		ph[24..32].copy_from_slice(&entry.to_le_bytes()); // p_paddr
		ph[32..40].copy_from_slice(&4u64.to_le_bytes()); // p_filesz
		ph[40..48].copy_from_slice(&4u64.to_le_bytes()); // p_memsz
		buf.extend_from_slice(&ph);
		buf.extend_from_slice(&code);

		// String table: "\0_start\0"
		let strtab_off = buf.len() as u64;
		buf.extend_from_slice(b"\0_start\0");
		let strtab_size = 8u64;

		// Symbol table: one STT_FUNC symbol named "_start" at `entry`.
		let symtab_off = buf.len() as u64;
		let mut sym = vec![0u8; 24];
		sym[0..4].copy_from_slice(&1u32.to_le_bytes()); // st_name (offset 1 -> "_start")
		sym[4] = STT_FUNC; // st_info (local bind, FUNC type)
		sym[8..10].copy_from_slice(&1u16.to_le_bytes()); // st_shndx (nonzero == defined)
		sym[8 + 2..8 + 10].copy_from_slice(&entry.to_le_bytes()); // st_value
		sym[16..24].copy_from_slice(&4u64.to_le_bytes()); // st_size
		buf.extend_from_slice(&sym);
		let symtab_size = sym.len() as u64;

		// Section headers: [NULL, .strtab, .symtab]
		let sh_off = buf.len() as u64;
		buf[40..48].copy_from_slice(&sh_off.to_le_bytes());
		buf[60..62].copy_from_slice(&3u16.to_le_bytes()); // e_shnum
		buf[62..64].copy_from_slice(&0u16.to_le_bytes()); // e_shstrndx (unused by this loader)

		buf.extend_from_slice(&[0u8; 64]); // NULL section

		let mut strtab_sh = vec![0u8; 64];
		strtab_sh[4..8].copy_from_slice(&SHT_STRTAB.to_le_bytes());
		strtab_sh[24..32].copy_from_slice(&strtab_off.to_le_bytes());
		strtab_sh[32..40].copy_from_slice(&strtab_size.to_le_bytes());
		buf.extend_from_slice(&strtab_sh);

		let mut symtab_sh = vec![0u8; 64];
		symtab_sh[4..8].copy_from_slice(&SHT_SYMTAB.to_le_bytes());
		symtab_sh[24..32].copy_from_slice(&symtab_off.to_le_bytes());
		symtab_sh[32..40].copy_from_slice(&symtab_size.to_le_bytes());
		symtab_sh[40..44].copy_from_slice(&1u32.to_le_bytes()); // sh_link -> .strtab (index 1)
		symtab_sh[56..64].copy_from_slice(&24u64.to_le_bytes()); // sh_entsize
		buf.extend_from_slice(&symtab_sh);

		buf
	}

	/// S6 — ELF load and fetch.
	#[test]
	fn s6_elf_load_and_fetch() {
		let entry = 0x0000_1000u64;
		let image = build_tiny_elf64(entry);

		let mut f = NamedTempFile::new().unwrap();
		f.write_all(&image).unwrap();

		let mut m = Memory::new(MemoryConfig::new(8 * 1024 * 1024).with_hart_count(1)).unwrap();
		m.define_iccm(0, 0x1000, 0x1000).unwrap();

		let (loaded_entry, _end) = load_elf_file(&mut m, f.path(), 64).unwrap();
		assert_eq!(loaded_entry, entry);
		assert_eq!(m.read_inst_word(entry), Some(0x0000_0013));

		let sym = m.find_symbol("_start").unwrap();
		assert_eq!(sym.addr, entry);
		assert_eq!(sym.size, 4);
	}

	#[test]
	fn class_mismatch_is_reported() {
		let image = build_tiny_elf64(0x1000);
		let mut f = NamedTempFile::new().unwrap();
		f.write_all(&image).unwrap();

		let mut m = Memory::new(MemoryConfig::new(8 * 1024 * 1024).with_hart_count(1)).unwrap();
		let err = load_elf_file(&mut m, f.path(), 32).unwrap_err();
		assert!(matches!(err, MemError::ClassMismatch { .. }));
	}

	#[test]
	fn address_bounds_probe_matches_segment() {
		let entry = 0x2000u64;
		let image = build_tiny_elf64(entry);
		let mut f = NamedTempFile::new().unwrap();
		f.write_all(&image).unwrap();

		let (min, max) = get_elf_file_address_bounds(f.path()).unwrap();
		assert_eq!(min, entry);
		assert_eq!(max, entry + 4);
	}
}
