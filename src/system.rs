#![allow(dead_code)]
/// Builds the machine out of the TOML system description: creates the card
/// population, plugs it into the bus and keeps ownership of the lot.
use super::*;
use crate::bus::{Bus, CardHandle};
use crate::card::DataCard;
use crate::serial::SerialCard;
use serde::Deserialize;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

#[derive(Debug, Deserialize)]
struct ConfigFile {
    emulator: EmulatorTable,
    #[serde(default)]
    card: Vec<CardTable>,
}

#[derive(Debug, Deserialize)]
struct EmulatorTable {
    #[serde(default)]
    pseudo_bdos_enabled: bool,
    start_with_pc_at: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct CardTable {
    slot: usize,
    #[serde(rename = "type")]
    kind: String,
    at: u16,
    range: Option<usize>,
    load: Option<String>,
    #[serde(default)]
    let_collide: bool,
}

/// The configured system: a populated bus plus the emulator-level switches.
/// Card instances are created here and shared into the bus slots; they live
/// for the life of the process and are cleared, not re-created, on a reset.
pub struct SystemConfig {
    pub bus: Bus,
    cards: Vec<CardHandle>,
    pseudo_bdos_enabled: bool,
    start_with_pc_at: Option<u16>,
}

impl std::fmt::Debug for SystemConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemConfig")
            .field("bus", &self.bus)
            .field("cards", &self.cards.len())
            .field("pseudo_bdos_enabled", &self.pseudo_bdos_enabled)
            .field("start_with_pc_at", &self.start_with_pc_at)
            .finish()
    }
}

impl SystemConfig {
    pub fn from_file(path: &str) -> Result<SystemConfig, Error> {
        let text = fs::read_to_string(path).map_err(|e| config_err!("cannot read '{}': {}", path, e))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<SystemConfig, Error> {
        let parsed: ConfigFile = toml::from_str(text).map_err(|e| config_err!("{}", e))?;

        let mut bus = Bus::new();
        let mut cards = Vec::new();
        for table in &parsed.card {
            let card = Self::create_card(table)?;
            bus.insert(Rc::clone(&card), table.slot, table.let_collide)?;
            cards.push(card);
        }

        Ok(SystemConfig {
            bus,
            cards,
            pseudo_bdos_enabled: parsed.emulator.pseudo_bdos_enabled,
            // zero means "use the reset vector" and is treated as absent
            start_with_pc_at: parsed.emulator.start_with_pc_at.filter(|&pc| pc != 0),
        })
    }

    fn create_card(table: &CardTable) -> Result<CardHandle, Error> {
        match table.kind.as_str() {
            "ram" | "rom" => {
                let locked = table.kind == "rom";
                let card = match (&table.load, table.range) {
                    (Some(path), range) => {
                        let bytes = fs::read(path).map_err(|e| config_err!("cannot load '{}': {}", path, e))?;
                        if locked {
                            DataCard::rom_from_bytes(table.at, &bytes, range.unwrap_or(0))?
                        } else {
                            DataCard::ram_from_bytes(table.at, &bytes, range.unwrap_or(0))?
                        }
                    }
                    (None, Some(range)) => {
                        if locked {
                            DataCard::rom(table.at, range, BAD_U8)
                        } else {
                            DataCard::ram(table.at, range)
                        }
                    }
                    (None, None) => {
                        return Err(config_err!(
                            "card in slot {} needs at least one of 'range' and 'load'",
                            table.slot
                        ))
                    }
                };
                Ok(Rc::new(RefCell::new(card)))
            }
            "serial" => Ok(Rc::new(RefCell::new(SerialCard::new(table.at)?))),
            other => Err(config_err!("config has unknown card type: {}", other)),
        }
    }

    pub fn cards(&self) -> &[CardHandle] { &self.cards }
    pub fn pseudo_bdos_enabled(&self) -> bool { self.pseudo_bdos_enabled }
    pub fn start_with_pc_at(&self) -> Option<u16> { self.start_with_pc_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_full_machine_description_parses() {
        let system = SystemConfig::from_toml(
            r#"
            [emulator]
            pseudo_bdos_enabled = true

            [[card]]
            slot = 0
            type = "rom"
            at = 0x0000
            range = 0x0800

            [[card]]
            slot = 1
            type = "ram"
            at = 0x0800
            range = 0xf800

            [[card]]
            slot = 2
            type = "serial"
            at = 0x10
            "#,
        )
        .unwrap();

        assert_eq!(system.cards().len(), 3);
        assert!(system.pseudo_bdos_enabled());
        assert_eq!(system.start_with_pc_at(), None);

        let map = system.bus.map_description();
        assert!(map.contains("rom area"));
        assert!(map.contains("ram area"));
        assert!(map.contains("serial uart"));

        // the serial card sits in I/O space, the RAM in memory space
        assert_eq!(system.bus.read(0x0810, false).unwrap(), 0x00);
        assert_eq!(system.bus.read(0x0010, true).unwrap(), 0x02);
    }

    #[test]
    fn start_with_pc_at_zero_counts_as_absent() {
        let toml = |pc: &str| {
            format!(
                "[emulator]\nstart_with_pc_at = {}\n\n[[card]]\nslot = 0\ntype = \"ram\"\nat = 0\nrange = 256\n",
                pc
            )
        };
        assert_eq!(SystemConfig::from_toml(&toml("0")).unwrap().start_with_pc_at(), None);
        assert_eq!(
            SystemConfig::from_toml(&toml("0x0100")).unwrap().start_with_pc_at(),
            Some(0x0100)
        );
    }

    #[test]
    fn cards_can_be_preloaded_from_a_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("altair8080_sysconf_{}.bin", std::process::id()));
        std::fs::write(&path, [0xc3, 0x00, 0x01]).unwrap();

        let system = SystemConfig::from_toml(&format!(
            "[emulator]\n\n[[card]]\nslot = 0\ntype = \"rom\"\nat = 0\nrange = 1024\nload = \"{}\"\n",
            path.display()
        ))
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(system.bus.read(0x0000, false).unwrap(), 0xc3);
        assert_eq!(system.bus.read(0x0002, false).unwrap(), 0x01);
        // the tail of the declared range carries the fill byte
        assert_eq!(system.bus.read(0x0003, false).unwrap(), BAD_U8);
        // and the rom lock holds
        system.bus.write(0x0000, 0x00, false).unwrap();
        assert_eq!(system.bus.read(0x0000, false).unwrap(), 0xc3);
    }

    #[test]
    fn validation_failures_are_config_errors() {
        let cases = [
            // data card without range or load
            "[emulator]\n[[card]]\nslot = 0\ntype = \"ram\"\nat = 0\n",
            // unknown card type
            "[emulator]\n[[card]]\nslot = 0\ntype = \"tape\"\nat = 0\nrange = 16\n",
            // slot out of range
            "[emulator]\n[[card]]\nslot = 18\ntype = \"ram\"\nat = 0\nrange = 16\n",
            // overlapping ranges without let_collide
            "[emulator]\n[[card]]\nslot = 0\ntype = \"ram\"\nat = 0\nrange = 256\n\n[[card]]\nslot = 1\ntype = \"ram\"\nat = 128\nrange = 256\n",
            // double occupancy of one slot
            "[emulator]\n[[card]]\nslot = 3\ntype = \"ram\"\nat = 0\nrange = 16\n\n[[card]]\nslot = 3\ntype = \"ram\"\nat = 0x1000\nrange = 16\n",
            // missing [emulator] table entirely
            "[[card]]\nslot = 0\ntype = \"ram\"\nat = 0\nrange = 16\n",
        ];
        for toml in cases {
            let err = SystemConfig::from_toml(toml).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Config, "expected config error for: {}", toml);
        }
    }

    #[test]
    fn overlap_is_tolerated_with_let_collide() {
        let system = SystemConfig::from_toml(
            "[emulator]\n[[card]]\nslot = 0\ntype = \"ram\"\nat = 0\nrange = 256\n\n[[card]]\nslot = 1\ntype = \"rom\"\nat = 128\nrange = 256\nlet_collide = true\n",
        )
        .unwrap();
        assert_eq!(system.cards().len(), 2);
    }
}
