//! A Motorola 68000 execution core whose memory lives behind a pluggable
//! bus, with a TCP front end that lets a remote client play the bus.

pub mod bus;
pub mod cpu;
pub mod decoder;
pub mod loader;
pub mod memory;
pub mod server;
