use anyhow::{Result, bail};

use goblin::elf::{Elf, header, program_header};

use crate::memory::{MemoryImage, MemorySegment};

/// A program image ready to run.
#[derive(Debug)]
pub struct LoadedImage {
    pub memory: MemoryImage,
    /// ELF entry point. Raw images start through the reset vectors instead.
    pub entry: Option<u32>,
}

/// Loads a 68k ELF executable, or a raw binary placed at `load_address`.
pub fn load_image(data: &[u8], load_address: u32) -> Result<LoadedImage> {
    if data.starts_with(header::ELFMAG) {
        let elf = Elf::parse(data)?;
        return load_elf(&elf, data);
    }

    if data.is_empty() {
        bail!("image is empty");
    }
    if load_address as u64 + data.len() as u64 > 1 << 32 {
        bail!(
            "image of {} bytes does not fit at {:#x}",
            data.len(),
            load_address
        );
    }
    let memory = MemoryImage::new(vec![MemorySegment::new(
        load_address,
        data.to_vec(),
        false,
    )]);
    Ok(LoadedImage {
        memory,
        entry: None,
    })
}

pub fn load_elf(elf: &Elf, file_bytes: &[u8]) -> Result<LoadedImage> {
    if elf.header.e_machine != header::EM_68K {
        bail!(
            "not a 68k executable (e_machine {})",
            elf.header.e_machine
        );
    }
    if elf.little_endian {
        bail!("68k executables must be big-endian");
    }

    let mut segments = Vec::new();

    for ph in &elf.program_headers {
        if ph.p_type != program_header::PT_LOAD || ph.p_memsz == 0 {
            continue;
        }

        if ph.p_memsz < ph.p_filesz {
            bail!(
                "Segment memsz ({}) smaller than filesz ({}) at vaddr {:#x}",
                ph.p_memsz,
                ph.p_filesz,
                ph.p_vaddr
            );
        }
        if ph.p_vaddr.saturating_add(ph.p_memsz) > 1 << 32 {
            bail!("Segment at vaddr {:#x} exceeds the address space", ph.p_vaddr);
        }

        let offset = ph.p_offset as usize;
        let file_size = ph.p_filesz as usize;

        if offset
            .checked_add(file_size)
            .is_none_or(|end| end > file_bytes.len())
        {
            bail!(
                "Segment at offset {:#x} with size {:#x} exceeds file ({} bytes)",
                ph.p_offset,
                ph.p_filesz,
                file_bytes.len()
            );
        }

        let mut data = vec![0u8; ph.p_memsz as usize];
        data[..file_size].copy_from_slice(&file_bytes[offset..offset + file_size]);

        segments.push(MemorySegment::new(
            ph.p_vaddr as u32,
            data,
            ph.p_flags & program_header::PF_W != 0,
        ));
    }

    if segments.is_empty() {
        bail!("ELF file has no loadable segments");
    }

    Ok(LoadedImage {
        memory: MemoryImage::new(segments),
        entry: Some(elf.entry as u32),
    })
}

/// Maps a zeroed RAM segment, refusing to shadow anything already loaded.
pub fn map_ram(memory: &mut MemoryImage, base: u32, size: u32) -> Result<()> {
    let end = base as u64 + size as u64;
    if size == 0 || end > 1 << 32 {
        bail!("RAM of {size:#x} bytes at {base:#x} is outside the address space");
    }
    if let Some(seg) = memory
        .segments()
        .iter()
        .find(|s| (s.base as u64) < end && (base as u64) < s.base as u64 + s.len() as u64)
    {
        bail!(
            "RAM at {base:#x}..{end:#x} overlaps the segment at {:#x}",
            seg.base
        );
    }
    memory.add_segment(MemorySegment::ram(base, size as usize));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elf_with_segment(vaddr: u32, payload: &[u8], memsz: u32, flags: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 2, 1, 0]);
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&2u16.to_be_bytes()); // ET_EXEC
        out.extend_from_slice(&4u16.to_be_bytes()); // EM_68K
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(&vaddr.to_be_bytes()); // e_entry
        out.extend_from_slice(&52u32.to_be_bytes()); // e_phoff
        out.extend_from_slice(&0u32.to_be_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_be_bytes()); // e_flags
        out.extend_from_slice(&52u16.to_be_bytes());
        out.extend_from_slice(&32u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&40u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        assert_eq!(out.len(), 52);

        for word in [
            program_header::PT_LOAD,
            84,
            vaddr,
            vaddr,
            payload.len() as u32,
            memsz,
            flags,
            2,
        ] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn loads_elf_segments_and_entry() {
        let bytes = elf_with_segment(
            0x4000,
            &[0x4E, 0x71, 0x4E, 0x75],
            8,
            program_header::PF_R | program_header::PF_X,
        );
        let image = load_image(&bytes, 0).unwrap();
        assert_eq!(image.entry, Some(0x4000));
        assert_eq!(image.memory.read_long(0x4000), Ok(0x4E71_4E75));
        // bss tail is zero filled
        assert_eq!(image.memory.read_long(0x4004), Ok(0));
        assert!(!image.memory.segments()[0].writable);
    }

    #[test]
    fn rejects_truncated_segments() {
        let mut bytes = elf_with_segment(0x4000, &[0x4E, 0x71], 2, program_header::PF_R);
        bytes.truncate(bytes.len() - 1);
        assert!(load_image(&bytes, 0).is_err());
    }

    #[test]
    fn raw_images_load_read_only_at_base() {
        let image = load_image(&[0x00, 0x01, 0x00, 0x00], 0x100).unwrap();
        assert_eq!(image.entry, None);
        assert_eq!(image.memory.read_long(0x100), Ok(0x0001_0000));
        assert!(!image.memory.segments()[0].writable);
    }

    #[test]
    fn ram_may_not_overlap_the_image() {
        let mut image = load_image(&[0; 16], 0x0).unwrap().memory;
        assert!(map_ram(&mut image, 0x8, 0x100).is_err());
        map_ram(&mut image, 0x10, 0x100).unwrap();
        assert!(image.covers_range(0x10, 0x100));
    }
}
