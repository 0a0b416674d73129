//! Raw ROM images from linked executables.

use std::fs;
use std::io::Write;
use std::path::Path;

use elf::ElfBytes;
use elf::endian::AnyEndian;
use tracing::info;

use crate::error::{BuildError, Result};

/// Smallest GBA image emulators accept without complaint.
pub const GBA_MIN_ROM_SIZE: u64 = 2 * 1024 * 1024;

/// Size of the GBA cartridge address space.
pub const GBA_MAX_ROM_SIZE: u64 = 32 * 1024 * 1024;

const PT_LOAD: u32 = 1;
const SHT_NOBITS: u32 = 8;
const SHF_ALLOC: u64 = 0x2;

fn parse_error(path: &Path, e: impl std::fmt::Display) -> BuildError {
    BuildError::io(
        format!("failed to parse ELF {}", path.display()),
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
    )
}

/// Flattens the loadable sections of an ELF file the way `objcopy -O binary`
/// does: each section is placed at its load address relative to the lowest
/// one, and gaps are zero filled. Images larger than [`GBA_MAX_ROM_SIZE`]
/// are rejected.
pub fn extract_binary(elf_path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(elf_path).map_err(|e| BuildError::io_path("read", elf_path, e))?;
    let file = ElfBytes::<AnyEndian>::minimal_parse(&data).map_err(|e| parse_error(elf_path, e))?;

    let segments: Vec<_> = file
        .segments()
        .map(|table| table.iter().filter(|p| p.p_type == PT_LOAD).collect())
        .unwrap_or_default();
    let Some(headers) = file.section_headers() else {
        return Ok(Vec::new());
    };

    let mut placed = Vec::new();
    for header in headers.iter() {
        if header.sh_flags & SHF_ALLOC == 0 || header.sh_type == SHT_NOBITS || header.sh_size == 0 {
            continue;
        }
        let section_end = header
            .sh_offset
            .checked_add(header.sh_size)
            .ok_or_else(|| parse_error(elf_path, "section extends past the end of the address space"))?;
        // Load address: where the segment holding the section sits in ROM.
        let load = match segments.iter().find(|p| {
            header.sh_offset >= p.p_offset
                && p.p_offset.checked_add(p.p_filesz).is_some_and(|end| section_end <= end)
        }) {
            Some(p) => p
                .p_paddr
                .checked_add(header.sh_offset - p.p_offset)
                .ok_or_else(|| parse_error(elf_path, "segment load address overflows"))?,
            None => header.sh_addr,
        };
        let (bytes, _) = file.section_data(&header).map_err(|e| parse_error(elf_path, e))?;
        let end = load
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| parse_error(elf_path, "section load address overflows"))?;
        placed.push((load, end, bytes));
    }

    let Some(base) = placed.iter().map(|(load, _, _)| *load).min() else {
        return Ok(Vec::new());
    };
    let end = placed.iter().map(|(_, end, _)| *end).max().unwrap_or(base);
    let size = end - base;
    if size > GBA_MAX_ROM_SIZE {
        return Err(parse_error(
            elf_path,
            format!("image spans {} bytes, more than the {} byte cartridge limit", size, GBA_MAX_ROM_SIZE),
        ));
    }
    let mut image = vec![0u8; size as usize];
    for (load, _, bytes) in placed {
        let start = (load - base) as usize;
        image[start..start + bytes.len()].copy_from_slice(bytes);
    }
    Ok(image)
}

/// Pads `rom` with `0xFF` up to `min_size`. Returns the original size when
/// padding was added.
pub fn pad_rom(rom: &Path, min_size: u64) -> Result<Option<u64>> {
    let size = fs::metadata(rom)
        .map_err(|e| BuildError::io_path("read", rom, e))?
        .len();
    if size >= min_size {
        return Ok(None);
    }
    let padding = vec![0xFFu8; (min_size - size) as usize];
    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(rom)
        .map_err(|e| BuildError::io_path("open", rom, e))?;
    file.write_all(&padding)
        .map_err(|e| BuildError::io_path("pad", rom, e))?;
    info!("Padded ROM from {} to {} bytes", size, min_size);
    Ok(Some(size))
}
