use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use m68k_busd::cpu::{Cpu, StepOutcome};
use m68k_busd::loader::{load_image, map_ram};
use m68k_busd::memory::MemoryImage;
use m68k_busd::server::{self, DEFAULT_LISTEN};

#[derive(Parser, Debug)]
#[command(author, version, about = "68000 core driven over a remote bus")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the bus protocol to one client at a time
    Serve {
        #[arg(short, long, default_value = DEFAULT_LISTEN)]
        listen: String,
    },
    /// Run a raw binary or 68k ELF executable against local memory
    Run {
        image: PathBuf,

        /// Where a raw binary is placed. Ignored for ELF files.
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        load_address: u32,

        #[arg(long, default_value = "0x100000", value_parser = parse_u32)]
        ram_base: u32,

        /// 0 maps no RAM
        #[arg(long, default_value = "0x100000", value_parser = parse_u32)]
        ram_size: u32,

        #[arg(long, default_value_t = 1_000_000)]
        steps: u64,

        #[arg(long)]
        trace_exec: bool,

        #[arg(long)]
        trace_exceptions: bool,
    },
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("invalid number {s:?}: {err}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Serve { listen } => {
            let listener =
                TcpListener::bind(&listen).with_context(|| format!("failed to listen on {listen}"))?;
            server::serve(listener)?;
        }
        Command::Run {
            image,
            load_address,
            ram_base,
            ram_size,
            steps,
            trace_exec,
            trace_exceptions,
        } => {
            let data =
                fs::read(&image).with_context(|| format!("failed to read {}", image.display()))?;
            let loaded = load_image(&data, load_address)?;
            let mut memory = loaded.memory;
            if ram_size > 0 {
                map_ram(&mut memory, ram_base, ram_size)?;
            }

            let mut cpu = Cpu::new(memory);
            cpu.set_trace_exec(trace_exec);
            cpu.set_trace_exceptions(trace_exceptions);
            match loaded.entry {
                Some(entry) => {
                    cpu.set_pc(entry);
                    cpu.set_ssp(ram_base.wrapping_add(ram_size));
                }
                None => cpu.reset().context("reset failed")?,
            }

            let result = run_steps(&mut cpu, steps);
            println!("{}", cpu.registers());
            result?;
        }
    }
    Ok(())
}

fn run_steps(cpu: &mut Cpu<MemoryImage>, steps: u64) -> Result<()> {
    for executed in 0..steps {
        if cpu.step()? == StepOutcome::Halted {
            info!(steps = executed, "processor stopped");
            return Ok(());
        }
    }
    info!(steps, "step limit reached");
    Ok(())
}
