//! # An Altair 8800 style microcomputer emulator written in Rust.
//!
//! An Intel 8080 interpreter connected through an S-100 style backplane to a
//! configurable population of memory and I/O cards, including a 6850 ACIA
//! bridged to a host pseudo-terminal. A TOML file describes the card
//! population; binary images and their load addresses come from the command
//! line:
//! ```
//! cargo run -- --config system.toml cpudiag.bin 0x100
//! ```
//! The first image pair doubles as the cold-start entry point: a JMP to its
//! load address is written over the reset vector at 0x0000.
//!
//! Help for command line options is available using -h or --help.
#[macro_use]
mod macros;
mod bus;
mod card;
mod config;
mod cpu;
mod error;
mod instructions;
mod pty;
mod registers;
mod serial;
mod system;
use std::fs;
pub(crate) use crate::error::*;

/// Documented "bad byte" sentinel for a read that no card claims.
pub(crate) const BAD_U8: u8 = 0xff;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::init();
    if let Err(e) = run() {
        println!("{}", e);
        return Err(Box::new(e));
    }
    Ok(())
}

/// run drives the top level functionality of the emulator: read the system
/// description, build the machine, load the images, then step the CPU until
/// it halts, delivering any raised interrupts after each step.
fn run() -> Result<(), Error> {
    let images = config::image_pairs()?;
    let system = system::SystemConfig::from_file(config::ARGS.config.as_str())?;
    let mut cpu = cpu::Cpu::new();
    cpu.do_pseudo_bdos(system.pseudo_bdos_enabled());
    if let Some(path) = config::ARGS.print_file.as_ref() {
        cpu.set_pseudo_bdos_redirect(path)?;
    }

    for (i, (path, addr)) in images.iter().enumerate() {
        let bytes = fs::read(path).map_err(|e| general_err!("cannot open '{}': {}", path, e))?;
        let entry = i == 0 && system.start_with_pc_at().is_none();
        system.bus.load(&bytes, *addr, entry)?;
        info!("Loaded {} bytes from {} at {:04x}", bytes.len(), path, addr);
    }
    if let Some(pc) = system.start_with_pc_at() {
        cpu.state.set_pc(pc);
        info!("Starting with PC at {:04x}", pc);
    }

    // the bus map names the serial slave device, so a user can attach to it
    print!("{}", system.bus.map_description());

    while !cpu.is_halted() {
        cpu.step(&system.bus)?;
        while system.bus.is_irq() {
            let vector = system.bus.get_irq()?;
            cpu.interrupt(vector, &system.bus)?;
        }
    }
    info!("CPU halted at {:04x}", cpu.state.pc());
    Ok(())
}
