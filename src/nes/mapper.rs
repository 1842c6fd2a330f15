use serde::{Deserialize, Serialize};

use super::cartridge::Cartridge;
use super::error::{MapperError, StateError};

mod mapper222;
mod mmc3;

pub use mapper222::{MAPPER222_IRQ, Mapper222};
pub use mmc3::{MMC3_IRQ, Mmc3, Mmc3Revision};

pub const PRG_BANK_SIZE: usize = 0x2000;
pub const CHR_BANK_SIZE: usize = 0x0400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    OneScreenLower,
    OneScreenUpper,
    FourScreen,
}

// Prg answers in 8 KiB banks for $8000-$FFFF, Chr in 1 KiB banks for $0000-$1FFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankRegion {
    Prg,
    Chr,
}

pub trait Mapper {
    fn name(&self) -> &'static str;
    fn cpu_read(&mut self, addr: u16) -> u8;
    fn cpu_write(&mut self, addr: u16, value: u8);
    fn ppu_read(&mut self, addr: u16) -> u8;
    fn ppu_write(&mut self, addr: u16, value: u8);
    fn mirroring(&self) -> Mirroring;
    fn query_bank(&self, region: BankRegion, addr: u16) -> Option<usize>;
    // Every PPU bus cycle, with the address on the bus.
    fn notify_address_line(&mut self, addr: u16, cycle: u64);
    fn irq_pending(&self) -> bool;
    fn reset(&mut self, hard: bool);
    fn save_state(&self) -> Result<Vec<u8>, StateError>;
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError>;
    fn bank_registers(&self) -> Vec<u8>;
    fn irq_counter(&self) -> u16;
    fn debug_state(&self) -> String {
        String::new()
    }
}

pub fn is_supported(mapper_id: u16) -> bool {
    matches!(mapper_id, 4 | 222)
}

pub fn mapper_name(mapper_id: u16) -> &'static str {
    match mapper_id {
        4 => "MMC3",
        222 => "Mapper 222",
        _ => "Unsupported",
    }
}

pub fn create_mapper(cart: Cartridge) -> Result<Box<dyn Mapper>, MapperError> {
    let len = cart.prg_rom.len();
    if len == 0 || len % PRG_BANK_SIZE != 0 {
        return Err(MapperError::InvalidPrgSize { len });
    }
    let chr_len = cart.chr_data.len();
    if chr_len == 0 || chr_len % CHR_BANK_SIZE != 0 {
        return Err(MapperError::InvalidChrSize { len: chr_len });
    }

    let mapper: Box<dyn Mapper> = match cart.mapper_id {
        4 => Box::new(Mmc3::new(cart)),
        222 => Box::new(Mapper222::new(cart)),
        id => return Err(MapperError::UnsupportedMapper { id }),
    };
    log::info!(
        "created {} ({} KiB PRG, {} KiB CHR)",
        mapper.name(),
        len / 1024,
        chr_len / 1024
    );
    Ok(mapper)
}

#[derive(Debug, Clone)]
pub(crate) struct CartMemory {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
}

impl CartMemory {
    pub(crate) fn new(prg_rom: Vec<u8>, chr: Vec<u8>, chr_is_ram: bool, prg_ram_size: usize) -> Self {
        Self {
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; prg_ram_size],
        }
    }

    pub(crate) fn prg_bank_count(&self) -> usize {
        (self.prg_rom.len() / PRG_BANK_SIZE).max(1)
    }

    pub(crate) fn chr_bank_count(&self) -> usize {
        (self.chr.len() / CHR_BANK_SIZE).max(1)
    }

    pub(crate) fn read_prg(&self, bank: usize, offset: usize) -> u8 {
        let bank = bank % self.prg_bank_count();
        self.prg_rom[(bank * PRG_BANK_SIZE + offset) % self.prg_rom.len()]
    }

    fn chr_index(&self, bank: usize, offset: usize) -> usize {
        let bank = bank % self.chr_bank_count();
        (bank * CHR_BANK_SIZE + offset) % self.chr.len()
    }

    pub(crate) fn read_chr(&self, bank: usize, offset: usize) -> u8 {
        self.chr[self.chr_index(bank, offset)]
    }

    pub(crate) fn write_chr(&mut self, bank: usize, offset: usize, value: u8) {
        if self.chr_is_ram {
            let idx = self.chr_index(bank, offset);
            self.chr[idx] = value;
        }
    }

    pub(crate) fn read_prg_ram(&self, addr: u16) -> u8 {
        if self.prg_ram.is_empty() {
            return 0;
        }
        self.prg_ram[(addr as usize - 0x6000) % self.prg_ram.len()]
    }

    pub(crate) fn write_prg_ram(&mut self, addr: u16, value: u8) {
        if self.prg_ram.is_empty() {
            return;
        }
        let idx = (addr as usize - 0x6000) % self.prg_ram.len();
        self.prg_ram[idx] = value;
    }
}
