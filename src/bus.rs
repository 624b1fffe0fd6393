#![allow(dead_code)]
/// The S-100 style backplane: an address-decoded dispatcher between the CPU
/// and whatever assortment of cards is plugged into the slots.
use super::*;
use crate::card::Card;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

/// Hard limit on the number of slots on the backplane.
pub const MAX_BUS_CARDS: usize = 18;

/// Cards are created by the configuration layer and shared into bus slots.
pub type CardHandle = Rc<RefCell<dyn Card>>;

struct Slot {
    card: CardHandle,
    ignore_conflicts: bool,
}

/// Memory and I/O live in disjoint address spaces selected by the `is_io`
/// signal, so a memory card and an I/O card may legally use the same numeric
/// addresses. Within one space, overlapping ranges are a conflict unless both
/// parties opted in; where a permitted conflict exists, reads resolve to the
/// first card in slot order while writes fan out to every card in range.
pub struct Bus {
    slots: [Option<Slot>; MAX_BUS_CARDS],
}

impl Default for Bus {
    fn default() -> Bus { Bus::new() }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("occupied_slots", &self.slots.iter().filter(|s| s.is_some()).count())
            .finish()
    }
}

impl Bus {
    pub fn new() -> Bus {
        Bus {
            slots: std::array::from_fn(|_| None),
        }
    }

    fn conflicts_with_occupant(&self, card: &CardHandle) -> bool {
        let card = card.borrow();
        for slot in self.slots.iter().flatten() {
            if slot.ignore_conflicts {
                continue;
            }
            let other = slot.card.borrow();
            if other.is_io() == card.is_io()
                && (other.in_range(card.identify().start_adr) || card.in_range(other.identify().start_adr))
            {
                return true;
            }
        }
        false
    }

    /// Inserts a card into a slot, checking for address conflicts unless the
    /// caller explicitly allows them.
    pub fn insert(&mut self, card: CardHandle, slot: usize, allow_conflict: bool) -> Result<(), Error> {
        if slot >= MAX_BUS_CARDS {
            return Err(config_err!("slot {} out of range", slot));
        }
        if self.slots[slot].is_some() {
            return Err(config_err!("slot {} already occupied", slot));
        }
        if !allow_conflict && self.conflicts_with_occupant(&card) {
            return Err(config_err!("bus conflict detected inserting into slot {}", slot));
        }
        self.slots[slot] = Some(Slot {
            card,
            ignore_conflicts: allow_conflict,
        });
        Ok(())
    }

    /// Removes whatever card occupies the slot.
    pub fn remove(&mut self, slot: usize) -> Result<(), Error> {
        if slot >= MAX_BUS_CARDS {
            return Err(config_err!("slot {} out of range", slot));
        }
        self.slots[slot] = None;
        Ok(())
    }

    /// The number of addressable locations on the bus, not the card count.
    pub fn size(&self) -> usize { 65536 }

    /// Reads a byte from the first card in slot order claiming the address;
    /// an unclaimed address yields the bad-byte sentinel.
    pub fn read(&self, adr: u16, is_io: bool) -> Result<u8, Error> {
        for slot in self.slots.iter().flatten() {
            let mut card = slot.card.borrow_mut();
            if card.is_io() == is_io && card.in_range(adr) {
                return card.read(adr);
            }
        }
        Ok(BAD_U8)
    }

    /// Writes a byte to every card in range of the address.
    pub fn write(&self, adr: u16, byte: u8, is_io: bool) -> Result<(), Error> {
        for slot in self.slots.iter().flatten() {
            let mut card = slot.card.borrow_mut();
            if card.is_io() == is_io && card.in_range(adr) {
                card.write(adr, byte)?;
            }
        }
        Ok(())
    }

    /// Writes a byte to every card in range, bypassing write locks.
    pub fn write_force(&self, adr: u16, byte: u8, is_io: bool) -> Result<(), Error> {
        for slot in self.slots.iter().flatten() {
            let mut card = slot.card.borrow_mut();
            if card.is_io() == is_io && card.in_range(adr) {
                card.write_force(adr, byte)?;
            }
        }
        Ok(())
    }

    /// Checks if any card has an interrupt request pending. Meant as the loop
    /// condition at the end of an emulation cycle so that concurrent requests
    /// are all serviced.
    pub fn is_irq(&self) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|slot| slot.card.borrow().is_irq())
    }

    /// Gets the interrupt instruction (and possible operands) from the first
    /// requesting card in slot order, matching the daisy-chained priority of
    /// S-100 backplanes. RST style vectors leave the trailing operand bytes
    /// unused; a CALL vector uses all three.
    pub fn get_irq(&self) -> Result<[u8; 3], Error> {
        for slot in self.slots.iter().flatten() {
            if slot.card.borrow().is_irq() {
                return Ok(slot.card.borrow_mut().get_irq());
            }
        }
        Err(general_err!("tried get_irq() while none was raised"))
    }

    /// Gets the slot closest to the backplane origin that claims the address.
    pub fn slot_by_adr(&self, adr: u16) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(s) if s.card.borrow().in_range(adr)))
    }

    /// Copies a binary image into the address space through `write_force`, so
    /// system ROMs can be populated too. With `auto_reset_vector` the zero
    /// page is pointed at the image with a JMP.
    pub fn load(&self, bytes: &[u8], offset: u16, auto_reset_vector: bool) -> Result<(), Error> {
        if bytes.len() > self.size() - offset as usize {
            return Err(Error::new(
                ErrorKind::Memory,
                None,
                format!(
                    "image of {} bytes at {:04x} overflows the address space",
                    bytes.len(),
                    offset
                )
                .as_str(),
            ));
        }
        for (i, byte) in bytes.iter().enumerate() {
            self.write_force(offset + i as u16, *byte, false)?;
        }
        if auto_reset_vector {
            if offset <= 2 {
                return Err(Error::new(
                    ErrorKind::Memory,
                    None,
                    "first image bytes would be overwritten by the reset vector",
                ));
            }
            self.write_force(0, 0xc3, false)?;
            self.write_force(1, (offset & 0xff) as u8, false)?;
            self.write_force(2, (offset >> 8) as u8, false)?;
        }
        Ok(())
    }

    /// Clears all cards on the bus; what clearing means is up to each card.
    pub fn clear(&self) {
        for slot in self.slots.iter().flatten() {
            slot.card.borrow_mut().clear();
        }
    }

    /// Human readable address map of the populated slots.
    pub fn map_description(&self) -> String {
        const PAD_ADR_RANGE_SLEN: usize = 12;
        let mut out = String::new();
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                let card = slot.card.borrow();
                let ident = card.identify();
                let mut adr_range = if card.is_io() {
                    format!("0x{:02x}/{}", ident.start_adr, ident.adr_range)
                } else {
                    format!("0x{:04x}/{}", ident.start_adr, ident.adr_range)
                };
                while adr_range.len() < PAD_ADR_RANGE_SLEN {
                    adr_range.push(' ');
                }
                let _ = writeln!(
                    out,
                    "Slot {:2}: {} {}: \x1b[01m{}\x1b[0m{}{}",
                    i,
                    if card.is_io() {
                        "\x1b[45;01mI/O\x1b[0m"
                    } else {
                        "\x1b[47;01mMEM\x1b[0m"
                    },
                    adr_range,
                    ident.name,
                    if ident.detail.is_empty() { "" } else { ", " },
                    ident.detail
                );
            }
        }
        out
    }
}
