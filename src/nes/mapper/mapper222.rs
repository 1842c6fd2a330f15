// Mapper 222, the Dragon Ninja pirate board. The IRQ counter runs upward
// from the $F000 value and halts once it reaches 240.

use super::{BankRegion, CartMemory, Mapper, Mirroring};
use crate::nes::a12::DEFAULT_FILTER_WINDOW;
use crate::nes::cartridge::Cartridge;
use crate::nes::error::StateError;
use crate::nes::irq::{A12Irq, Direction, IrqConfig, OnTrigger, ReloadTiming};
use crate::nes::savestate::MapperState;

const NAME: &str = "Mapper 222";

pub const MAPPER222_IRQ: IrqConfig = IrqConfig {
    direction: Direction::Up { target: 240 },
    on_trigger: OnTrigger::Halt,
    reload_timing: ReloadTiming::Immediate,
    zero_reload_triggers: false,
};

const POWER_ON_CHR: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

pub struct Mapper222 {
    memory: CartMemory,
    prg: [u8; 2],
    chr: [u8; 8],
    base_mirroring: Mirroring,
    mirroring: Mirroring,
    irq: A12Irq,
}

impl Mapper222 {
    pub(crate) fn new(cart: Cartridge) -> Self {
        Self {
            memory: CartMemory::new(cart.prg_rom, cart.chr_data, cart.chr_is_ram, 0),
            prg: [0, 1],
            chr: POWER_ON_CHR,
            base_mirroring: cart.mirroring,
            mirroring: cart.mirroring,
            irq: A12Irq::new(DEFAULT_FILTER_WINDOW, MAPPER222_IRQ),
        }
    }

    fn prg_bank(&self, addr: u16) -> usize {
        let count = self.memory.prg_bank_count();
        match addr {
            0x8000..=0x9FFF => self.prg[0] as usize,
            0xA000..=0xBFFF => self.prg[1] as usize,
            0xC000..=0xDFFF => count.saturating_sub(2),
            _ => count - 1,
        }
    }

    fn chr_bank(&self, addr: u16) -> usize {
        self.chr[(addr as usize & 0x1FFF) / 0x0400] as usize
    }

    fn chr_slot(addr: u16) -> Option<usize> {
        match addr & 0xF003 {
            0xB000 => Some(0),
            0xB002 => Some(1),
            0xC000 => Some(2),
            0xC002 => Some(3),
            0xD000 => Some(4),
            0xD002 => Some(5),
            0xE000 => Some(6),
            0xE002 => Some(7),
            _ => None,
        }
    }

    fn capture(&self) -> MapperState {
        let (irq, a12) = self.irq.snapshot();
        MapperState {
            chip: NAME.to_string(),
            irq,
            a12,
            bank_registers: self.bank_registers(),
            control: Vec::new(),
            mirroring: self.mirroring,
        }
    }
}

impl Mapper for Mapper222 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x8000..=0xFFFF => self.memory.read_prg(self.prg_bank(addr), addr as usize & 0x1FFF),
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr < 0x8000 {
            log::trace!("{NAME} ignored write ${addr:04X} = ${value:02X}");
            return;
        }

        if let Some(slot) = Self::chr_slot(addr) {
            self.chr[slot] = value;
            return;
        }

        match addr & 0xF003 {
            0x8000 => self.prg[0] = value,
            0xA000 => self.prg[1] = value,
            0x9000 => {
                self.mirroring = if (value & 1) == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
            }
            0xF000 => {
                let counter = &mut self.irq.counter;
                counter.set_reload(value as u16);
                counter.set_enabled(value != 0);
                counter.acknowledge();
            }
            _ => log::trace!("{NAME} ignored write ${addr:04X} = ${value:02X}"),
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.memory.read_chr(self.chr_bank(addr), addr as usize & 0x03FF)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        let bank = self.chr_bank(addr);
        self.memory.write_chr(bank, addr as usize & 0x03FF, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn query_bank(&self, region: BankRegion, addr: u16) -> Option<usize> {
        match region {
            BankRegion::Prg if addr >= 0x8000 => {
                Some(self.prg_bank(addr) % self.memory.prg_bank_count())
            }
            BankRegion::Chr if addr < 0x2000 => {
                Some(self.chr_bank(addr) % self.memory.chr_bank_count())
            }
            _ => None,
        }
    }

    fn notify_address_line(&mut self, addr: u16, cycle: u64) {
        self.irq.notify(addr, cycle);
    }

    fn irq_pending(&self) -> bool {
        self.irq.pending()
    }

    fn reset(&mut self, hard: bool) {
        if hard {
            self.prg = [0, 1];
            self.chr = POWER_ON_CHR;
            self.mirroring = self.base_mirroring;
        }
        self.irq.reset(hard);
        log::debug!("{NAME} {} reset", if hard { "hard" } else { "soft" });
    }

    fn save_state(&self) -> Result<Vec<u8>, StateError> {
        self.capture().encode()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let state = MapperState::decode(bytes)
            .and_then(|state| {
                state.expect_layout(NAME, self.prg.len() + self.chr.len(), 0)?;
                Ok(state)
            })
            .inspect_err(|err| log::warn!("{NAME} state rejected: {err}"))?;

        let (prg, chr) = state.bank_registers.split_at(self.prg.len());
        self.prg.copy_from_slice(prg);
        self.chr.copy_from_slice(chr);
        self.mirroring = state.mirroring;
        self.irq.restore(state.irq, state.a12);
        log::debug!("{NAME} state restored");
        Ok(())
    }

    fn bank_registers(&self) -> Vec<u8> {
        self.prg.iter().chain(self.chr.iter()).copied().collect()
    }

    fn irq_counter(&self) -> u16 {
        self.irq.counter.count()
    }

    fn debug_state(&self) -> String {
        format!(
            "{NAME} prg=[{:02X},{:02X}] chr=[{:02X},{:02X},{:02X},{:02X},{:02X},{:02X},{:02X},{:02X}] mirroring={:?} irq_count={} en={} pending={} a12_clocks={}",
            self.prg[0],
            self.prg[1],
            self.chr[0],
            self.chr[1],
            self.chr[2],
            self.chr[3],
            self.chr[4],
            self.chr[5],
            self.chr[6],
            self.chr[7],
            self.mirroring,
            self.irq.counter.count(),
            self.irq.counter.enabled(),
            self.irq.pending(),
            self.irq.clocks()
        )
    }
}
