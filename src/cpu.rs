#![allow(dead_code)]
/// The Intel 8080 interpreter: fetch pipeline, step loop, interrupt entry
/// and the pseudo-BDOS console shim. The opcode decode and the instruction
/// implementations live in instructions.rs.
use super::*;
use crate::bus::Bus;
use crate::registers::State;
use std::fs::File;
use std::io::{self, Write};

/// Write-only byte consumer for the pseudo-BDOS console services. Prints to
/// stdout unless redirected to a file.
#[derive(Default)]
pub struct Printer {
    file_redirect: Option<File>,
}

impl Printer {
    /// Set a redirection to file.
    pub fn set(&mut self, filename: &str) -> Result<(), Error> {
        self.file_redirect = Some(File::create(filename)?);
        Ok(())
    }
    /// Reset and fall back to stdout.
    pub fn reset(&mut self) {
        if let Some(mut file) = self.file_redirect.take() {
            let _ = file.flush();
        }
    }
    /// Print one byte to the current destination.
    pub fn put(&mut self, byte: u8) -> Result<(), Error> {
        match self.file_redirect.as_mut() {
            Some(file) => file.write_all(&[byte])?,
            None => {
                let mut out = io::stdout();
                out.write_all(&[byte])?;
                out.flush()?;
            }
        }
        Ok(())
    }
}

/// Where instruction bytes come from. During interrupt acknowledgment the
/// requesting device supplies the instruction on the data bus, so fetches are
/// redirected to a small external operand buffer instead of program memory.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FetchSource {
    Bus,
    External,
}

pub struct Cpu {
    pub state: State,
    pub(crate) halted: bool,
    pub(crate) interrupts_enabled: bool,
    just_booted: bool,
    handle_bdos_enabled: bool,
    fetch_source: FetchSource,
    ext_op: [u8; 2],
    ext_op_idx: bool,
    printer: Printer,
}

impl Default for Cpu {
    fn default() -> Cpu { Cpu::new() }
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            state: State::new(),
            halted: false,
            interrupts_enabled: true,
            just_booted: true,
            handle_bdos_enabled: false,
            fetch_source: FetchSource::Bus,
            ext_op: [0; 2],
            ext_op_idx: false,
            printer: Printer::default(),
        }
    }

    pub fn is_halted(&self) -> bool { self.halted }

    /// Resets the CPU: fresh registers, not halted, boot flag set. Bus state
    /// is cleared separately by whoever owns the bus.
    pub fn clear(&mut self) {
        self.state = State::new();
        self.just_booted = true;
        self.halted = false;
    }

    /// Enables pseudo BDOS handling. Diagnostic programs expect the system to
    /// be able to print messages through the CP/M console services.
    pub fn do_pseudo_bdos(&mut self, should: bool) { self.handle_bdos_enabled = should; }

    /// Redirect pseudo BDOS print routines to a file.
    pub fn set_pseudo_bdos_redirect(&mut self, filename: &str) -> Result<(), Error> { self.printer.set(filename) }

    /// Redirect pseudo BDOS print routines back to stdout.
    pub fn reset_pseudo_bdos_redirect(&mut self) { self.printer.reset(); }

    pub(crate) fn fetch(&mut self, bus: &Bus) -> Result<u8, Error> {
        match self.fetch_source {
            FetchSource::Bus => {
                let pc = self.state.get_then_inc16(crate::registers::Reg16::PC);
                bus.read(pc, false)
            }
            FetchSource::External => {
                let idx = self.ext_op_idx;
                self.ext_op_idx = !idx;
                Ok(self.ext_op[idx as usize])
            }
        }
    }

    pub(crate) fn fetch2(&mut self, bus: &Bus) -> Result<u16, Error> {
        let lo = self.fetch(bus)? as u16;
        let hi = self.fetch(bus)? as u16;
        Ok((hi << 8) | lo)
    }

    /// Steps the CPU by one instruction (and its operands). Returns
    /// immediately while halted. Each instruction fetches its own operands,
    /// so one step is a full instruction.
    pub fn step(&mut self, bus: &Bus) -> Result<(), Error> {
        if self.halted {
            return Ok(());
        }
        if self.handle_bdos_enabled {
            self.handle_bdos(bus)?;
        }
        let pc = self.state.pc();
        let opcode = self.fetch(bus)?;
        if config::trace() {
            println!("{:04x}    {:02x}\t {}", pc, opcode, instructions::mnemonic(opcode));
        }
        self.execute(opcode, bus)?;
        if config::trace() && config::ARGS.verbose {
            println!("{}", self.state);
        }
        Ok(())
    }

    /// Executes a single opcode whose operands were supplied out of band,
    /// typically placed on the bus by the device that raised an interrupt.
    pub fn execute_with_operands(&mut self, opcode: u8, operand1: u8, operand2: u8, bus: &Bus) -> Result<(), Error> {
        self.ext_op = [operand1, operand2];
        self.ext_op_idx = false;
        self.fetch_source = FetchSource::External;
        let result = self.execute(opcode, bus);
        self.fetch_source = FetchSource::Bus;
        result
    }

    /// Acknowledges an interrupt: pushes PC, disables further interrupts and
    /// executes the supplied instruction out of the normal stream. Silently
    /// ignored while interrupts are disabled. Re-enabling is the service
    /// routine's business (EI).
    pub fn interrupt(&mut self, inst: [u8; 3], bus: &Bus) -> Result<(), Error> {
        if !self.interrupts_enabled {
            return Ok(());
        }
        self.interrupts_enabled = false;
        let pc = self.state.pc();
        self.push_word(pc, bus)?;
        self.execute_with_operands(inst[0], inst[1], inst[2], bus)
    }

    /// The pseudo BDOS hook, consulted before each fetch while enabled.
    ///
    /// PC 0x0000 is the CP/M warm boot entry: the first visit after reset is
    /// the reset vector itself and is let through; any later visit plants a
    /// HLT in the zero page so the next step stops the machine. PC 0x0005 is
    /// the BDOS entry: console output calls are serviced from register C and
    /// a RET is synthesized in place of the routine.
    fn handle_bdos(&mut self, bus: &Bus) -> Result<(), Error> {
        if self.state.pc() == 0x0000 {
            if self.just_booted {
                self.just_booted = false;
                return Ok(());
            }
            bus.write(0, 0b0111_0110, false)?;
        }

        if self.state.pc() == 0x0005 {
            let c = self.state.c();
            match c {
                0x02 => self.printer.put(self.state.e())?,
                0x09 => {
                    let mut de = self.state.de();
                    loop {
                        let byte = bus.read(de, false)?;
                        if byte == b'$' {
                            break;
                        }
                        self.printer.put(byte)?;
                        de = de.wrapping_add(1);
                    }
                }
                _ => {
                    return Err(runtime_err!(
                        Some(self.state),
                        "unknown BDOS 0x0005 call with C={:02x} at PC={:04x}",
                        c,
                        self.state.pc()
                    ))
                }
            }
            // the caller got here via CALL; eat one byte and synthesize the RET
            self.fetch(bus)?;
            self.ret(bus)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::card::DataCard;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn machine() -> (Cpu, Bus) {
        let mut bus = Bus::new();
        bus.insert(Rc::new(RefCell::new(DataCard::ram(0x0000, 65536))), 0, false)
            .unwrap();
        (Cpu::new(), bus)
    }

    fn print_capture_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("altair8080_{}_{}", std::process::id(), name));
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn bdos_lets_the_reset_vector_through_once_then_halts() {
        let (mut cpu, bus) = machine();
        cpu.do_pseudo_bdos(true);
        bus.load(&[0x76], 0x0100, true).unwrap();

        // first visit to 0x0000 is the cold start; the JMP must execute
        cpu.step(&bus).unwrap();
        assert_eq!(cpu.state.pc(), 0x0100);
        assert!(!cpu.is_halted());

        // a warm boot plants HLT over the vector
        cpu.state.set_pc(0x0000);
        cpu.step(&bus).unwrap();
        assert_eq!(bus.read(0x0000, false).unwrap(), 0x76);
        assert!(cpu.is_halted());
    }

    #[test]
    fn bdos_prints_a_character_and_a_string() {
        let (mut cpu, bus) = machine();
        cpu.do_pseudo_bdos(true);
        let capture = print_capture_path("bdos_print");
        cpu.set_pseudo_bdos_redirect(&capture).unwrap();

        // MVI C,02; MVI E,'A'; CALL 0005; MVI C,09; LXI D,msg; CALL 0005; HLT
        bus.load(
            &[
                0x0e, 0x02, 0x1e, b'A', 0xcd, 0x05, 0x00, 0x0e, 0x09, 0x11, 0x20, 0x01, 0xcd, 0x05, 0x00, 0x76,
            ],
            0x0100,
            true,
        )
        .unwrap();
        bus.load(b"BC DE HL SP PC$", 0x0120, false).unwrap();
        cpu.state.set_sp(0xff00);

        while !cpu.is_halted() {
            cpu.step(&bus).unwrap();
        }
        cpu.reset_pseudo_bdos_redirect();

        let output = std::fs::read(&capture).unwrap();
        std::fs::remove_file(&capture).ok();
        assert_eq!(output, b"ABC DE HL SP PC");
    }

    #[test]
    fn bdos_rejects_unknown_service_calls() {
        let (mut cpu, bus) = machine();
        cpu.do_pseudo_bdos(true);
        cpu.just_booted = false;
        cpu.state.set_sp(0xff00);
        cpu.state.set8(crate::registers::Reg8::C, 0x0b);
        cpu.state.set_pc(0x0005);

        let err = cpu.step(&bus).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Runtime);
        assert!(err.msg.contains("BDOS"));
    }

    #[test]
    fn interrupts_are_ignored_while_disabled() {
        let (mut cpu, bus) = machine();
        cpu.state.set_sp(0xff00);
        cpu.state.set_pc(0x1234);

        cpu.interrupt([0xcd, 0x30, 0x00], &bus).unwrap(); // first one lands
        assert_eq!(cpu.state.pc(), 0x0030);
        cpu.interrupt([0xcd, 0x40, 0x00], &bus).unwrap(); // second is dropped
        assert_eq!(cpu.state.pc(), 0x0030);
    }

    #[test]
    fn clear_restores_the_boot_state() {
        let (mut cpu, bus) = machine();
        bus.load(&[0x76], 0x0100, false).unwrap();
        cpu.state.set_pc(0x0100);
        cpu.step(&bus).unwrap();
        assert!(cpu.is_halted());

        cpu.clear();
        assert!(!cpu.is_halted());
        assert_eq!(cpu.state.pc(), 0x0000);
        assert_eq!(cpu.state.get16(crate::registers::Reg16::AF), 0x0002);
        assert!(cpu.just_booted);
    }
}
