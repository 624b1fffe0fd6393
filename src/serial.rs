#![allow(dead_code)]
/// A 6850 ACIA (UART) card bridging the bus to a host pseudo-terminal.
use super::*;
use crate::card::{Card, CardIdentify};
use crate::pty::{Parity, Pty};

// status register bits
const RDRF: u8 = 0x01; // receive data register full
const TDRE: u8 = 0x02; // transmit data register empty
const DCD: u8 = 0x04; // data carrier detect
const CTS: u8 = 0x08; // clear to send
const FE: u8 = 0x10; // framing error
const OVRN: u8 = 0x20; // receiver overrun
const PE: u8 = 0x40; // parity error
const IRQ: u8 = 0x80; // interrupt request

/// The number of I/O addresses occupied by the card.
pub const SERIAL_IO_ADDRESSES: u16 = 2;

/// The base clock of the UART; the control register divides it further.
pub const SERIAL_BASE_CLOCK: u32 = 19200;

/// The ACIA occupies two consecutive ports: `start` is STATUS (read) /
/// CONTROL (write), `start + 1` is RX_DATA (read) / TX_DATA (write). Since
/// IN/OUT duplicate the port byte on both halves of the address bus and the
/// decoder only looks at the low 8 bits, the card appears mirrored across
/// the high byte. That is faithful to the partial address decode of the
/// original hardware.
pub struct SerialCard {
    start_adr: u16,
    base_clock: u32,
    serial: Pty,
    tx_data: u8,
    rx_data: u8,
    control: u8,
    status: u8,
    divide_by: u32,
    rts: bool,
}

impl SerialCard {
    pub fn new(start_adr: u16) -> Result<SerialCard, Error> {
        let mut card = SerialCard {
            start_adr,
            base_clock: SERIAL_BASE_CLOCK,
            serial: Pty::open()?,
            tx_data: 0,
            rx_data: 0,
            control: 0,
            status: 0,
            divide_by: 0,
            rts: false,
        };
        card.reset()?;
        Ok(card)
    }

    /// Master reset: documented post-reset register values, divide-by 4.
    fn reset(&mut self) -> Result<(), Error> {
        self.tx_data = 0;
        self.rx_data = 0;
        self.status = 0;
        self.divide_by = 4;
        self.serial.set_baud(self.base_clock >> self.divide_by)?;
        self.control = 0b1001_0101;
        self.set_status(TDRE, true);
        self.rts = true;
        Ok(())
    }

    fn set_status(&mut self, bit: u8, value: bool) {
        if value {
            self.status |= bit;
        } else {
            self.status &= !bit;
        }
    }

    /// Latches a pending host byte into RX_DATA, unless one is already there.
    fn poll_receiver(&mut self) -> Result<(), Error> {
        if self.status & RDRF == 0 && self.serial.poll()? {
            self.rx_data = self.serial.getch()?;
            self.set_status(RDRF, true);
        }
        Ok(())
    }

    fn write_control(&mut self, byte: u8) -> Result<(), Error> {
        // counter divide select bits (..DD); 11 is master reset
        match byte & 0b0000_0011 {
            0b00 => self.divide_by = 1,
            0b01 => self.divide_by = 4,
            0b10 => self.divide_by = 6,
            _ => return self.reset(),
        }
        self.serial.set_baud(self.base_clock >> self.divide_by)?;

        // word select bits (.WWW.)
        match byte & 0b0001_1100 {
            0b0000_0000 => self.serial.configure(7, Parity::Even, 2)?,
            0b0000_0100 => self.serial.configure(7, Parity::Odd, 2)?,
            0b0000_1000 => self.serial.configure(7, Parity::Even, 1)?,
            0b0000_1100 => self.serial.configure(7, Parity::Odd, 1)?,
            0b0001_0000 => self.serial.configure(8, Parity::None, 2)?,
            0b0001_0100 => self.serial.configure(8, Parity::None, 1)?,
            0b0001_1000 => self.serial.configure(8, Parity::Even, 1)?,
            _ => self.serial.configure(8, Parity::Odd, 1)?,
        }

        // transmit control bits (CC...)
        match byte & 0b0110_0000 {
            0b0000_0000 | 0b0010_0000 => self.rts = true,
            0b0100_0000 => self.rts = false,
            _ => {
                self.rts = true;
                self.serial.send_break()?;
            }
        }

        // receive interrupt enable bit (I.......)
        self.set_status(IRQ, byte & 0b1000_0000 != 0);

        self.control = byte;
        Ok(())
    }

    fn write_tx_data(&mut self, byte: u8) -> Result<(), Error> {
        self.tx_data = byte;
        self.set_status(TDRE, false);
        self.serial.putch(self.tx_data)?;
        self.set_status(TDRE, true);
        Ok(())
    }
}

impl Card for SerialCard {
    fn in_range(&self, adr: u16) -> bool {
        (adr & 0xff) >= self.start_adr && (adr & 0xff) < self.start_adr + SERIAL_IO_ADDRESSES
    }

    fn identify(&self) -> CardIdentify {
        CardIdentify {
            start_adr: self.start_adr,
            adr_range: SERIAL_IO_ADDRESSES as usize,
            name: "serial uart",
            detail: format!(
                "baud: {}, ctrl: 0x{:02x}, pty: '{}'",
                self.base_clock >> self.divide_by,
                self.control,
                self.serial.name()
            ),
        }
    }

    fn read(&mut self, adr: u16) -> Result<u8, Error> {
        self.poll_receiver()?;

        if (adr & 0xff) == self.start_adr {
            Ok(self.status)
        } else {
            // reading the receive register clears RDRF, as on the real 6850
            self.set_status(RDRF, false);
            Ok(self.rx_data)
        }
    }

    fn write(&mut self, adr: u16, byte: u8) -> Result<(), Error> {
        if (adr & 0xff) == self.start_adr {
            self.write_control(byte)
        } else {
            self.write_tx_data(byte)
        }
    }

    fn write_force(&mut self, adr: u16, byte: u8) -> Result<(), Error> { self.write(adr, byte) }

    fn is_io(&self) -> bool { true }

    fn clear(&mut self) {
        if let Err(e) = self.reset() {
            warn!("serial card reset failed: {}", e);
        }
    }
}
