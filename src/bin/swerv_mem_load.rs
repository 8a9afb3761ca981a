//! Command-line front-end: builds a [`Memory`] from a small region/CCM
//! layout description, loads an Intel-hex or ELF image into it, and reports
//! the entry point and symbol table. Exists mainly to exercise the library
//! end to end; an execution engine would build its own [`Memory`] directly.

use std::path::PathBuf;
use std::process::ExitCode;

use swerv_mem::loader::{elf, hex};
use swerv_mem::{Memory, MemoryConfig};

struct Args {
	image:    PathBuf,
	size:     u64,
	iccm:     Option<(u32, u64, u64)>,
	dccm:     Option<(u32, u64, u64)>,
	is_elf:   bool,
	register_width: u8,
}

fn usage() -> ! {
	eprintln!(
		"usage: swerv-mem-load --image <path> [--elf | --hex] [--size BYTES] \
		 [--iccm REGION,OFFSET,SIZE] [--dccm REGION,OFFSET,SIZE] [--xlen 32|64]"
	);
	std::process::exit(2);
}

fn parse_triple(s: &str) -> (u32, u64, u64) {
	let mut parts = s.split(',');
	let region = parts.next().and_then(|p| p.parse().ok());
	let offset = parts.next().and_then(|p| u64::from_str_radix(p.trim_start_matches("0x"), 16).ok());
	let size = parts.next().and_then(|p| u64::from_str_radix(p.trim_start_matches("0x"), 16).ok());
	match (region, offset, size) {
		(Some(r), Some(o), Some(s)) => (r, o, s),
		_ => usage(),
	}
}

fn parse_args() -> Args {
	let mut image = None;
	let mut size = 8 * 1024 * 1024;
	let mut iccm = None;
	let mut dccm = None;
	let mut is_elf = true;
	let mut register_width = 64;

	let mut args = std::env::args().skip(1);
	while let Some(arg) = args.next() {
		match arg.as_str() {
			"--image" => image = args.next().map(PathBuf::from),
			"--size" => size = args.next().and_then(|s| s.parse().ok()).unwrap_or_else(usage),
			"--iccm" => iccm = Some(parse_triple(&args.next().unwrap_or_else(|| usage()))),
			"--dccm" => dccm = Some(parse_triple(&args.next().unwrap_or_else(|| usage()))),
			"--elf" => is_elf = true,
			"--hex" => is_elf = false,
			"--xlen" => {
				register_width = args.next().and_then(|s| s.parse().ok()).unwrap_or_else(usage);
			}
			_ => usage(),
		}
	}

	Args {
		image: image.unwrap_or_else(usage),
		size,
		iccm,
		dccm,
		is_elf,
		register_width,
	}
}

fn main() -> ExitCode {
	env_logger::init();
	let args = parse_args();

	let mut mem = match Memory::new(MemoryConfig::new(args.size)) {
		Ok(m) => m,
		Err(e) => {
			log::error!("failed to construct memory: {e}");
			return ExitCode::FAILURE;
		}
	};

	if let Some((region, offset, size)) = args.iccm {
		if let Err(e) = mem.define_iccm(region, offset, size) {
			log::error!("failed to define ICCM region: {e}");
			return ExitCode::FAILURE;
		}
	}
	if let Some((region, offset, size)) = args.dccm {
		if let Err(e) = mem.define_dccm(region, offset, size) {
			log::error!("failed to define DCCM region: {e}");
			return ExitCode::FAILURE;
		}
	}
	mem.finish_ccm_config();

	let result = if args.is_elf {
		elf::load_elf_file(&mut mem, &args.image, args.register_width).map(|(entry, end)| {
			log::info!("loaded ELF image, entry {entry:#x}, end {end:#x}");
		})
	} else {
		hex::load_hex_file(&mut mem, &args.image)
	};

	if let Err(e) = result {
		log::error!("failed to load {}: {e}", args.image.display());
		return ExitCode::FAILURE;
	}

	mem.print_symbols();
	ExitCode::SUCCESS
}
