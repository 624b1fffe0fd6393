#![allow(dead_code)]
/// The card interface and the two data-holding card kinds (RAM and ROM).
use super::*;

/// Holds information that can be used to identify a card on the bus map.
pub struct CardIdentify {
    pub start_adr: u16,
    pub adr_range: usize,
    pub name: &'static str,
    pub detail: String,
}

/// Interface every card plugged into the bus implements.
///
/// `in_range` must be checked by the bus before `read`/`write` are called;
/// the cards themselves do not re-check, to avoid decoding twice. Memory
/// cards decode the full 16 bit address; I/O cards only the low 8 bits.
pub trait Card {
    /// Check if an address on the bus is in the card's range.
    fn in_range(&self, adr: u16) -> bool;
    /// Get information about the card.
    fn identify(&self) -> CardIdentify;
    /// Read a byte from the card.
    fn read(&mut self, adr: u16) -> Result<u8, Error>;
    /// Write a byte to the card.
    fn write(&mut self, adr: u16, byte: u8) -> Result<(), Error>;
    /// Write a byte to the card regardless of write lock.
    fn write_force(&mut self, adr: u16, byte: u8) -> Result<(), Error>;
    /// False on a memory card, true on an I/O card.
    fn is_io(&self) -> bool;
    /// Check if the card has an interrupt request pending.
    fn is_irq(&self) -> bool { false }
    /// Get the IRQ instruction (and possible operands).
    fn get_irq(&mut self) -> [u8; 3] { [BAD_U8; 3] }
    /// Clear the card data or configuration.
    fn clear(&mut self);
}

/// A card that holds a fixed amount of data, usable as RAM or (when
/// constructed write-locked) as ROM. Write locking can be toggled at any
/// time; `write_force` bypasses it and is reserved for the program loader.
#[derive(Debug)]
pub struct DataCard {
    start_adr: u16,
    capacity: usize,
    data: Vec<u8>,
    write_locked: bool,
}

impl DataCard {
    fn with_fill(start_adr: u16, capacity: usize, fill: u8, lock: bool) -> DataCard {
        DataCard {
            start_adr,
            capacity,
            data: vec![fill; capacity],
            write_locked: lock,
        }
    }

    fn from_bytes(start_adr: u16, bytes: &[u8], capacity: usize, lock: bool) -> Result<DataCard, Error> {
        let capacity = if capacity == 0 { bytes.len() } else { capacity };
        if bytes.len() > capacity {
            return Err(config_err!(
                "binary data ({} bytes) exceeds card capacity ({} bytes)",
                bytes.len(),
                capacity
            ));
        }
        let mut data = vec![BAD_U8; capacity];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(DataCard {
            start_adr,
            capacity,
            data,
            write_locked: lock,
        })
    }

    /// A zero-filled read/write card.
    pub fn ram(start_adr: u16, capacity: usize) -> DataCard { Self::with_fill(start_adr, capacity, 0x00, false) }

    /// A write-locked card holding `capacity` copies of `fill`.
    pub fn rom(start_adr: u16, capacity: usize, fill: u8) -> DataCard {
        Self::with_fill(start_adr, capacity, fill, true)
    }

    /// A read/write card preloaded with `bytes` (capacity 0 = autodetect).
    pub fn ram_from_bytes(start_adr: u16, bytes: &[u8], capacity: usize) -> Result<DataCard, Error> {
        Self::from_bytes(start_adr, bytes, capacity, false)
    }

    /// A write-locked card preloaded with `bytes` (capacity 0 = autodetect).
    pub fn rom_from_bytes(start_adr: u16, bytes: &[u8], capacity: usize) -> Result<DataCard, Error> {
        Self::from_bytes(start_adr, bytes, capacity, true)
    }

    pub fn is_w_locked(&self) -> bool { self.write_locked }
    pub fn w_lock(&mut self) { self.write_locked = true; }
    pub fn w_unlock(&mut self) { self.write_locked = false; }
}

impl Card for DataCard {
    fn in_range(&self, adr: u16) -> bool {
        adr >= self.start_adr && (adr as usize) < self.start_adr as usize + self.capacity
    }

    fn identify(&self) -> CardIdentify {
        CardIdentify {
            start_adr: self.start_adr,
            adr_range: self.capacity,
            name: if self.write_locked { "rom area" } else { "ram area" },
            detail: String::new(),
        }
    }

    fn read(&mut self, adr: u16) -> Result<u8, Error> { Ok(self.data[(adr - self.start_adr) as usize]) }

    fn write(&mut self, adr: u16, byte: u8) -> Result<(), Error> {
        if !self.write_locked {
            self.data[(adr - self.start_adr) as usize] = byte;
        }
        Ok(())
    }

    fn write_force(&mut self, adr: u16, byte: u8) -> Result<(), Error> {
        self.data[(adr - self.start_adr) as usize] = byte;
        Ok(())
    }

    fn is_io(&self) -> bool { false }

    fn clear(&mut self) {
        if !self.write_locked {
            self.data.fill(0x00);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_reads_back_what_was_written() {
        let mut ram = DataCard::ram(0x4000, 1024);
        assert!(ram.in_range(0x4000));
        assert!(ram.in_range(0x43ff));
        assert!(!ram.in_range(0x3fff));
        assert!(!ram.in_range(0x4400));

        assert_eq!(ram.read(0x4000).unwrap(), 0x00);
        ram.write(0x4123, 0x99).unwrap();
        assert_eq!(ram.read(0x4123).unwrap(), 0x99);
        ram.clear();
        assert_eq!(ram.read(0x4123).unwrap(), 0x00);
    }

    #[test]
    fn rom_ignores_normal_writes_but_not_forced_ones() {
        let mut rom = DataCard::rom(0x0000, 1024, 0x5a);
        assert_eq!(rom.read(0x0010).unwrap(), 0x5a);
        rom.write(0x0010, 0x99).unwrap();
        assert_eq!(rom.read(0x0010).unwrap(), 0x5a);
        rom.write_force(0x0010, 0x99).unwrap();
        assert_eq!(rom.read(0x0010).unwrap(), 0x99);

        // clear is a no-op while the lock is held
        rom.clear();
        assert_eq!(rom.read(0x0000).unwrap(), 0x5a);
        rom.w_unlock();
        rom.clear();
        assert_eq!(rom.read(0x0000).unwrap(), 0x00);
    }

    #[test]
    fn lock_toggling_changes_identity_and_behavior() {
        let mut card = DataCard::ram(0x0000, 16);
        assert_eq!(card.identify().name, "ram area");
        card.w_lock();
        assert!(card.is_w_locked());
        assert_eq!(card.identify().name, "rom area");
        card.write(0x0000, 0x11).unwrap();
        assert_eq!(card.read(0x0000).unwrap(), 0x00);
        card.w_unlock();
        card.write(0x0000, 0x11).unwrap();
        assert_eq!(card.read(0x0000).unwrap(), 0x11);
    }

    #[test]
    fn preloaded_cards_respect_their_capacity() {
        let rom = DataCard::rom_from_bytes(0x0100, &[1, 2, 3], 0).unwrap();
        assert_eq!(rom.identify().adr_range, 3);

        let mut rom = DataCard::rom_from_bytes(0x0100, &[1, 2, 3], 8).unwrap();
        assert_eq!(rom.identify().adr_range, 8);
        assert_eq!(rom.read(0x0102).unwrap(), 3);
        // fill beyond the data is the bad-byte sentinel
        assert_eq!(rom.read(0x0107).unwrap(), BAD_U8);

        let err = DataCard::ram_from_bytes(0x0100, &[0; 16], 8).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn default_irq_surface_is_inert() {
        let mut ram = DataCard::ram(0, 16);
        assert!(!ram.is_irq());
        assert_eq!(ram.get_irq(), [BAD_U8; 3]);
    }
}
