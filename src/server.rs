//! TCP front end: a remote client drives the core with commands and answers
//! every bus cycle the core performs while ticking.
//!
//! All values are big-endian. Commands are one opcode byte followed by their
//! operands; the server answers ACK (plus payload) or FAIL. During `Tick` the
//! server sends events of its own (0x8x) which the client must answer before
//! the tick can finish.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::ops::ControlFlow;

use tracing::{debug, info, warn};

use crate::bus::{Bus, BusError, BusEvent, DataStrobe};
use crate::cpu::{Cpu, StepError, Vector};
use crate::decoder::{AddrReg, DataReg};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:6800";

pub mod opcode {
    pub const ACK: u8 = 0x00;
    pub const FAIL: u8 = 0x01;

    pub const BYE: u8 = 0x10;
    pub const UNSTOP: u8 = 0x11;
    pub const IS_STOPPED: u8 = 0x12;
    pub const TRACE_EXEC_ON: u8 = 0x13;
    pub const TRACE_EXEC_OFF: u8 = 0x14;
    pub const TRACE_EXC_ON: u8 = 0x15;
    pub const TRACE_EXC_OFF: u8 = 0x16;
    pub const TICK: u8 = 0x1F;

    pub const DREG_WRITE: u8 = 0x20;
    pub const DREG_READ: u8 = 0x21;
    pub const AREG_WRITE: u8 = 0x22;
    pub const AREG_READ: u8 = 0x23;
    pub const SSP_WRITE: u8 = 0x24;
    pub const SSP_READ: u8 = 0x25;
    pub const USP_WRITE: u8 = 0x26;
    pub const USP_READ: u8 = 0x27;
    pub const PC_WRITE: u8 = 0x28;
    pub const PC_READ: u8 = 0x29;
    pub const SR_WRITE: u8 = 0x2A;
    pub const SR_READ: u8 = 0x2B;

    pub const EVENT_ADDR_ASSERTED: u8 = 0x80;
    pub const EVENT_READ_BUS: u8 = 0x81;
    pub const EVENT_WRITE_BUS: u8 = 0x82;
    pub const EVENT_RESET: u8 = 0x83;
    pub const EVENT_TRACE_EXEC: u8 = 0x84;
    pub const EVENT_TRACE_EXC: u8 = 0x85;
    pub const EVENT_TRACE_EXC_MEM: u8 = 0x86;
}

/// Longest disassembly a trace event can carry.
const MAX_TRACE_TEXT: usize = 255;

/// The client side of the bus: every cycle becomes an event round trip.
pub struct Connection<S> {
    stream: S,
    latched: u32,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream, latched: 0 }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn in_b(&mut self) -> io::Result<u8> {
        let mut buf = [0; 1];
        self.stream.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn in_w(&mut self) -> io::Result<u16> {
        let mut buf = [0; 2];
        self.stream.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn in_l(&mut self) -> io::Result<u32> {
        let mut buf = [0; 4];
        self.stream.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn out(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    fn ack(&mut self, payload: &[u8]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(1 + payload.len());
        buf.push(opcode::ACK);
        buf.extend_from_slice(payload);
        self.out(&buf)
    }

    fn fail(&mut self) -> io::Result<()> {
        self.out(&[opcode::FAIL])
    }

    /// Reads the client's verdict on a bus cycle. FAIL means nothing answered
    /// at the latched address.
    fn expect_cycle_ack(&mut self) -> Result<(), BusError> {
        match self.in_b()? {
            opcode::ACK => Ok(()),
            opcode::FAIL => Err(BusError::NoDevice {
                address: self.latched,
            }),
            got => Err(BusError::UnexpectedReply { got }),
        }
    }

    fn expect_event_ack(&mut self, event: BusEvent) -> Result<(), BusError> {
        match self.in_b()? {
            opcode::ACK => Ok(()),
            opcode::FAIL => Err(BusError::Rejected { event }),
            got => Err(BusError::UnexpectedReply { got }),
        }
    }
}

impl<S: Read + Write> Bus for Connection<S> {
    fn assert_address(&mut self, address: u32) -> Result<(), BusError> {
        self.latched = address;
        let mut buf = vec![opcode::EVENT_ADDR_ASSERTED];
        buf.extend_from_slice(&address.to_be_bytes());
        self.out(&buf)?;
        self.expect_cycle_ack()
    }

    fn read_bus(&mut self, strobe: DataStrobe) -> Result<u16, BusError> {
        self.out(&[opcode::EVENT_READ_BUS, strobe as u8])?;
        self.expect_cycle_ack()?;
        Ok(self.in_w()?)
    }

    fn write_bus(&mut self, strobe: DataStrobe, value: u16) -> Result<(), BusError> {
        let [hi, lo] = value.to_be_bytes();
        self.out(&[opcode::EVENT_WRITE_BUS, strobe as u8, hi, lo])?;
        self.expect_cycle_ack()
    }

    fn reset_asserted(&mut self) -> Result<(), BusError> {
        self.out(&[opcode::EVENT_RESET])?;
        self.expect_event_ack(BusEvent::Reset)
    }

    fn trace_exec(&mut self, pc: u32, ir: u16, text: &str) -> Result<(), BusError> {
        let text = &text.as_bytes()[..text.len().min(MAX_TRACE_TEXT)];
        let mut buf = Vec::with_capacity(8 + text.len());
        buf.push(opcode::EVENT_TRACE_EXEC);
        buf.extend_from_slice(&pc.to_be_bytes());
        buf.extend_from_slice(&ir.to_be_bytes());
        buf.push(text.len() as u8);
        buf.extend_from_slice(text);
        self.out(&buf)?;
        self.expect_event_ack(BusEvent::TraceExec)
    }

    fn trace_exception(&mut self, vector: Vector, pc: u32) -> Result<(), BusError> {
        let mut buf = vec![opcode::EVENT_TRACE_EXC, vector.0];
        buf.extend_from_slice(&pc.to_be_bytes());
        self.out(&buf)?;
        self.expect_event_ack(BusEvent::TraceException)
    }

    fn trace_memory_exception(
        &mut self,
        vector: Vector,
        pc: u32,
        ir: u16,
        address: u32,
        status: u8,
    ) -> Result<(), BusError> {
        let mut buf = vec![opcode::EVENT_TRACE_EXC_MEM, vector.0];
        buf.extend_from_slice(&pc.to_be_bytes());
        buf.extend_from_slice(&ir.to_be_bytes());
        buf.extend_from_slice(&address.to_be_bytes());
        buf.push(status);
        self.out(&buf)?;
        self.expect_event_ack(BusEvent::TraceMemoryException)
    }
}

/// One client's processor and the connection it runs against.
pub struct Session<S: Read + Write> {
    cpu: Cpu<Connection<S>>,
}

impl<S: Read + Write> Session<S> {
    pub fn new(stream: S) -> Self {
        Self {
            cpu: Cpu::new(Connection::new(stream)),
        }
    }

    pub fn cpu(&self) -> &Cpu<Connection<S>> {
        &self.cpu
    }

    /// Serves commands until the client says goodbye or the transport fails.
    pub fn run(&mut self) -> Result<(), BusError> {
        while self.serve_next_command()?.is_continue() {}
        Ok(())
    }

    fn conn(&mut self) -> &mut Connection<S> {
        self.cpu.bus_mut()
    }

    pub fn serve_next_command(&mut self) -> Result<ControlFlow<()>, BusError> {
        let op = self.conn().in_b()?;
        match op {
            opcode::BYE => {
                debug!("bye");
                return Ok(ControlFlow::Break(()));
            }
            opcode::UNSTOP => {
                self.cpu.set_halted(false);
                self.conn().ack(&[])?;
            }
            opcode::IS_STOPPED => {
                let stopped = self.cpu.is_halted() as u8;
                self.conn().ack(&[stopped])?;
            }
            opcode::TRACE_EXEC_ON | opcode::TRACE_EXEC_OFF => {
                self.cpu.set_trace_exec(op == opcode::TRACE_EXEC_ON);
                self.conn().ack(&[])?;
            }
            opcode::TRACE_EXC_ON | opcode::TRACE_EXC_OFF => {
                self.cpu.set_trace_exceptions(op == opcode::TRACE_EXC_ON);
                self.conn().ack(&[])?;
            }
            opcode::TICK => self.tick()?,

            opcode::DREG_WRITE => {
                let reg = self.conn().in_b()?;
                let value = self.conn().in_l()?;
                match DataReg::try_from(reg) {
                    Ok(reg) => {
                        self.cpu.set_data_reg(reg, value);
                        self.conn().ack(&[])?;
                    }
                    Err(_) => self.conn().fail()?,
                }
            }
            opcode::DREG_READ => {
                let reg = self.conn().in_b()?;
                match DataReg::try_from(reg) {
                    Ok(reg) => {
                        let value = self.cpu.data_reg(reg);
                        self.conn().ack(&value.to_be_bytes())?;
                    }
                    Err(_) => self.conn().fail()?,
                }
            }
            opcode::AREG_WRITE => {
                let reg = self.conn().in_b()?;
                let value = self.conn().in_l()?;
                match AddrReg::try_from(reg) {
                    Ok(reg) => {
                        self.cpu.set_addr_reg(reg, value);
                        self.conn().ack(&[])?;
                    }
                    Err(_) => self.conn().fail()?,
                }
            }
            opcode::AREG_READ => {
                let reg = self.conn().in_b()?;
                match AddrReg::try_from(reg) {
                    Ok(reg) => {
                        let value = self.cpu.addr_reg(reg);
                        self.conn().ack(&value.to_be_bytes())?;
                    }
                    Err(_) => self.conn().fail()?,
                }
            }
            opcode::SSP_WRITE => {
                let value = self.conn().in_l()?;
                self.cpu.set_ssp(value);
                self.conn().ack(&[])?;
            }
            opcode::SSP_READ => {
                let value = self.cpu.ssp();
                self.conn().ack(&value.to_be_bytes())?;
            }
            opcode::USP_WRITE => {
                let value = self.conn().in_l()?;
                self.cpu.set_usp(value);
                self.conn().ack(&[])?;
            }
            opcode::USP_READ => {
                let value = self.cpu.usp();
                self.conn().ack(&value.to_be_bytes())?;
            }
            opcode::PC_WRITE => {
                let value = self.conn().in_l()?;
                self.cpu.set_pc(value);
                self.conn().ack(&[])?;
            }
            opcode::PC_READ => {
                let value = self.cpu.pc();
                self.conn().ack(&value.to_be_bytes())?;
            }
            opcode::SR_WRITE => {
                let value = self.conn().in_w()?;
                self.cpu.set_sr(value);
                self.conn().ack(&[])?;
            }
            opcode::SR_READ => {
                let value = self.cpu.sr();
                self.conn().ack(&value.to_be_bytes())?;
            }
            other => {
                warn!(opcode = format_args!("{other:#04x}"), "unrecognized command");
                self.conn().fail()?;
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn tick(&mut self) -> Result<(), BusError> {
        match self.cpu.step() {
            Ok(_) => self.conn().ack(&[])?,
            Err(StepError::Bus(err)) => return Err(err),
            Err(err) => {
                warn!(%err, "tick failed");
                self.conn().fail()?;
            }
        }
        Ok(())
    }
}

/// Accepts clients one at a time, each with a freshly reset processor.
pub fn serve(listener: TcpListener) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "listening");
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => handle_client(stream),
            Err(err) => warn!(%err, "failed to accept connection"),
        }
    }
    Ok(())
}

fn handle_client(stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(%peer, "client connected");
    if let Err(err) = stream.set_nodelay(true) {
        warn!(%peer, %err, "could not disable Nagle's algorithm");
    }

    let mut session = Session::new(stream);
    match session.run() {
        Ok(()) => info!(%peer, "client said bye"),
        Err(err) => info!(%peer, %err, "closing client connection"),
    }
}
