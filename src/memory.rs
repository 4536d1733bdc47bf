use thiserror::Error;
use tracing::{debug, info, trace};

use crate::bus::{Bus, BusError, DataStrobe};
use crate::cpu::Vector;

#[derive(Debug, Clone)]
pub struct MemorySegment {
    pub base: u32,
    pub data: Vec<u8>,
    pub writable: bool,
}

impl MemorySegment {
    pub fn new(base: u32, data: Vec<u8>, writable: bool) -> Self {
        Self {
            base,
            data,
            writable,
        }
    }

    /// Zero-filled writable segment.
    pub fn ram(base: u32, size: usize) -> Self {
        Self::new(base, vec![0; size], true)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn end(&self) -> u64 {
        self.base as u64 + self.data.len() as u64
    }
}

/// A local, segment-mapped memory that answers bus cycles directly.
///
/// Unmapped accesses answer with [`BusError::NoDevice`] and writes to
/// read-only segments with [`BusError::WriteProtected`], so a program running
/// against an image sees the same bus error exceptions a remote device would
/// produce.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    segments: Vec<MemorySegment>,
    latched: Option<u32>,
    resets: usize,
}

impl MemoryImage {
    pub fn new(mut segments: Vec<MemorySegment>) -> Self {
        segments.sort_by_key(|s| s.base);
        Self {
            segments,
            latched: None,
            resets: 0,
        }
    }

    pub fn segments(&self) -> &[MemorySegment] {
        &self.segments
    }

    pub fn add_segment(&mut self, segment: MemorySegment) {
        self.segments.push(segment);
        self.segments.sort_by_key(|s| s.base);
    }

    /// Number of times the RESET instruction has reached this image.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    pub fn read_byte(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.read_range(addr, 1)?[0])
    }

    pub fn read_word(&self, addr: u32) -> Result<u16, MemoryError> {
        let bytes = self.read_range(addr, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_long(&self, addr: u32) -> Result<u32, MemoryError> {
        let bytes = self.read_range(addr, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_data(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let size = data.len();
        if size == 0 {
            return Ok(());
        }
        let segment = self
            .segment_containing_mut(addr, size)?
            .ok_or(MemoryError::Unmapped { addr, size })?;

        if !segment.writable {
            return Err(MemoryError::ReadOnly { addr });
        }

        let offset = (addr - segment.base) as usize;
        segment.data[offset..offset + size].copy_from_slice(data);
        Ok(())
    }

    /// Copies `data` in regardless of segment permissions. Used to seed
    /// images and test fixtures.
    pub fn load(&mut self, addr: u32, data: &[u8]) -> Result<(), MemoryError> {
        let size = data.len();
        let segment = self
            .segment_containing_mut(addr, size)?
            .ok_or(MemoryError::Unmapped { addr, size })?;
        let offset = (addr - segment.base) as usize;
        segment.data[offset..offset + size].copy_from_slice(data);
        Ok(())
    }

    /// Return true if any segment fully covers the given address range.
    pub fn covers_range(&self, addr: u32, size: usize) -> bool {
        matches!(self.segment_containing(addr, size), Ok(Some(_)))
    }

    fn read_range(&self, addr: u32, size: usize) -> Result<&[u8], MemoryError> {
        let segment = self
            .segment_containing(addr, size)?
            .ok_or(MemoryError::Unmapped { addr, size })?;
        let offset = (addr - segment.base) as usize;
        Ok(&segment.data[offset..offset + size])
    }

    fn segment_containing(
        &self,
        addr: u32,
        size: usize,
    ) -> Result<Option<&MemorySegment>, MemoryError> {
        let end = range_end(addr, size)?;
        Ok(self
            .segments
            .iter()
            .find(|s| addr >= s.base && end <= s.end()))
    }

    fn segment_containing_mut(
        &mut self,
        addr: u32,
        size: usize,
    ) -> Result<Option<&mut MemorySegment>, MemoryError> {
        let end = range_end(addr, size)?;
        Ok(self
            .segments
            .iter_mut()
            .find(|s| addr >= s.base && end <= s.end()))
    }

    fn latched(&self) -> Result<u32, BusError> {
        self.latched.ok_or(BusError::NoDevice { address: 0 })
    }
}

fn range_end(addr: u32, size: usize) -> Result<u64, MemoryError> {
    let end = addr as u64 + size as u64;
    if end > u32::MAX as u64 + 1 {
        return Err(MemoryError::AddressOverflow { addr, size });
    }
    Ok(end)
}

impl Bus for MemoryImage {
    fn assert_address(&mut self, address: u32) -> Result<(), BusError> {
        self.latched = Some(address);
        Ok(())
    }

    fn read_bus(&mut self, strobe: DataStrobe) -> Result<u16, BusError> {
        let address = self.latched()?;
        let value = match strobe {
            DataStrobe::Both => self.read_word(address)?,
            DataStrobe::Upper => (self.read_byte(address)? as u16) << 8,
            DataStrobe::Lower => self.read_byte(address.wrapping_add(1))? as u16,
        };
        Ok(value)
    }

    fn write_bus(&mut self, strobe: DataStrobe, value: u16) -> Result<(), BusError> {
        let address = self.latched()?;
        match strobe {
            DataStrobe::Both => self.write_data(address, &value.to_be_bytes())?,
            DataStrobe::Upper => self.write_data(address, &[(value >> 8) as u8])?,
            DataStrobe::Lower => self.write_data(address.wrapping_add(1), &[value as u8])?,
        }
        Ok(())
    }

    fn reset_asserted(&mut self) -> Result<(), BusError> {
        self.resets += 1;
        info!(count = self.resets, "reset line asserted");
        Ok(())
    }

    fn trace_exec(&mut self, pc: u32, ir: u16, text: &str) -> Result<(), BusError> {
        trace!("{pc:#010x} {ir:04x}  {text}");
        Ok(())
    }

    fn trace_exception(&mut self, vector: Vector, pc: u32) -> Result<(), BusError> {
        debug!(%vector, pc = format_args!("{pc:#010x}"), "exception");
        Ok(())
    }

    fn trace_memory_exception(
        &mut self,
        vector: Vector,
        pc: u32,
        ir: u16,
        address: u32,
        status: u8,
    ) -> Result<(), BusError> {
        debug!(
            %vector,
            pc = format_args!("{pc:#010x}"),
            ir = format_args!("{ir:#06x}"),
            address = format_args!("{address:#010x}"),
            status = format_args!("{status:#04x}"),
            "access fault"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address overflow at {addr:#x} (size {size})")]
    AddressOverflow { addr: u32, size: usize },

    #[error("no segment covers {size} bytes at {addr:#x}")]
    Unmapped { addr: u32, size: usize },

    #[error("segment at {addr:#x} is read-only")]
    ReadOnly { addr: u32 },
}

impl From<MemoryError> for BusError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::AddressOverflow { addr, .. } | MemoryError::Unmapped { addr, .. } => {
                BusError::NoDevice { address: addr }
            }
            MemoryError::ReadOnly { addr } => BusError::WriteProtected { address: addr },
        }
    }
}
