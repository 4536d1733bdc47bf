#![allow(dead_code)]

use m68k_busd::bus::{Bus, BusError, DataStrobe};
use m68k_busd::cpu::{Cpu, Vector};
use m68k_busd::memory::{MemoryImage, MemorySegment};

pub const RAM_SIZE: usize = 0x1_0000;
pub const CODE: u32 = 0x1000;
pub const STACK_TOP: u32 = 0x8000;

/// Handler address installed for every vector.
pub fn handler(vector: Vector) -> u32 {
    0x4000 + vector.0 as u32 * 0x10
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Read {
        address: u32,
        strobe: DataStrobe,
        value: u16,
    },
    Write {
        address: u32,
        strobe: DataStrobe,
        value: u16,
    },
    Reset,
    TraceExec {
        pc: u32,
        ir: u16,
        text: String,
    },
    TraceException {
        vector: Vector,
        pc: u32,
    },
    TraceMemoryException {
        vector: Vector,
        pc: u32,
        ir: u16,
        address: u32,
        status: u8,
    },
}

/// RAM that remembers every cycle and notification it sees.
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub memory: MemoryImage,
    pub events: Vec<Event>,
    latched: u32,
}

impl RecordingBus {
    pub fn new(memory: MemoryImage) -> Self {
        Self {
            memory,
            events: Vec::new(),
            latched: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Write { .. }))
            .count()
    }
}

impl Bus for RecordingBus {
    fn assert_address(&mut self, address: u32) -> Result<(), BusError> {
        self.latched = address;
        self.memory.assert_address(address)
    }

    fn read_bus(&mut self, strobe: DataStrobe) -> Result<u16, BusError> {
        let value = self.memory.read_bus(strobe)?;
        self.events.push(Event::Read {
            address: self.latched,
            strobe,
            value,
        });
        Ok(value)
    }

    fn write_bus(&mut self, strobe: DataStrobe, value: u16) -> Result<(), BusError> {
        self.memory.write_bus(strobe, value)?;
        self.events.push(Event::Write {
            address: self.latched,
            strobe,
            value,
        });
        Ok(())
    }

    fn reset_asserted(&mut self) -> Result<(), BusError> {
        self.events.push(Event::Reset);
        self.memory.reset_asserted()
    }

    fn trace_exec(&mut self, pc: u32, ir: u16, text: &str) -> Result<(), BusError> {
        self.events.push(Event::TraceExec {
            pc,
            ir,
            text: text.to_string(),
        });
        Ok(())
    }

    fn trace_exception(&mut self, vector: Vector, pc: u32) -> Result<(), BusError> {
        self.events.push(Event::TraceException { vector, pc });
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
        self.events.push(Event::TraceMemoryException {
            vector,
            pc,
            ir,
            address,
            status,
        });
        Ok(())
    }
}

/// 64 KiB of RAM with a vector table pointing at [`handler`].
pub fn ram() -> MemoryImage {
    let mut memory = MemoryImage::new(vec![MemorySegment::ram(0, RAM_SIZE)]);
    memory.load(0, &STACK_TOP.to_be_bytes()).unwrap();
    memory.load(4, &CODE.to_be_bytes()).unwrap();
    for vector in 2..=0x2F {
        let entry = handler(Vector(vector)).to_be_bytes();
        memory.load(vector as u32 * 4, &entry).unwrap();
    }
    memory
}

pub fn load_words(memory: &mut MemoryImage, address: u32, words: &[u16]) {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    memory.load(address, &bytes).unwrap();
}

/// A reset processor about to execute `program` at [`CODE`].
pub fn machine(program: &[u16]) -> Cpu<RecordingBus> {
    let mut memory = ram();
    load_words(&mut memory, CODE, program);
    let mut cpu = Cpu::new(RecordingBus::new(memory));
    cpu.reset().unwrap();
    cpu.bus_mut().events.clear();
    cpu
}

pub fn read_word(cpu: &Cpu<RecordingBus>, address: u32) -> u16 {
    cpu.bus().memory.read_word(address).unwrap()
}

pub fn read_long(cpu: &Cpu<RecordingBus>, address: u32) -> u32 {
    cpu.bus().memory.read_long(address).unwrap()
}
