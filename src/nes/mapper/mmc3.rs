use super::{BankRegion, CartMemory, Mapper, Mirroring};
use crate::nes::a12::DEFAULT_FILTER_WINDOW;
use crate::nes::cartridge::Cartridge;
use crate::nes::error::StateError;
use crate::nes::irq::{A12Irq, Direction, IrqConfig, OnTrigger, ReloadTiming};
use crate::nes::savestate::MapperState;

const NAME: &str = "MMC3";
const CONTROL_LEN: usize = 3;

pub const MMC3_IRQ: IrqConfig = IrqConfig {
    direction: Direction::Down,
    on_trigger: OnTrigger::HoldAtZero,
    reload_timing: ReloadTiming::NextReload,
    zero_reload_triggers: true,
};

// The revisions differ only in whether a latch of zero keeps firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mmc3Revision {
    Sharp,
    // MMC3A: reloading zero asserts only after a $C001 write.
    Nec,
}

impl Mmc3Revision {
    // NES 2.0 submapper 4 marks boards with the NEC part.
    pub fn from_submapper(submapper_id: u8) -> Self {
        if submapper_id == 4 {
            Self::Nec
        } else {
            Self::Sharp
        }
    }

    pub fn irq_config(self) -> IrqConfig {
        match self {
            Self::Sharp => MMC3_IRQ,
            Self::Nec => IrqConfig {
                zero_reload_triggers: false,
                ..MMC3_IRQ
            },
        }
    }
}

pub struct Mmc3 {
    memory: CartMemory,
    revision: Mmc3Revision,
    bank_select: u8,
    bank_regs: [u8; 8],
    base_mirroring: Mirroring,
    mirroring: Mirroring,
    four_screen: bool,
    prg_ram_enabled: bool,
    prg_ram_write_protect: bool,
    irq: A12Irq,
}

impl Mmc3 {
    pub(crate) fn new(cart: Cartridge) -> Self {
        let revision = Mmc3Revision::from_submapper(cart.submapper_id);
        Self {
            memory: CartMemory::new(
                cart.prg_rom,
                cart.chr_data,
                cart.chr_is_ram,
                cart.prg_ram_size.max(8 * 1024),
            ),
            revision,
            bank_select: 0,
            bank_regs: [0; 8],
            base_mirroring: cart.mirroring,
            mirroring: cart.mirroring,
            four_screen: cart.mirroring == Mirroring::FourScreen,
            prg_ram_enabled: true,
            prg_ram_write_protect: false,
            irq: A12Irq::new(DEFAULT_FILTER_WINDOW, revision.irq_config()),
        }
    }

    pub fn revision(&self) -> Mmc3Revision {
        self.revision
    }

    fn prg_bank(&self, addr: u16) -> usize {
        let second_last = self.memory.prg_bank_count().saturating_sub(2);
        let last = self.memory.prg_bank_count() - 1;
        let swapped = (self.bank_select & 0x40) != 0;

        match addr {
            0x8000..=0x9FFF if swapped => second_last,
            0x8000..=0x9FFF => self.bank_regs[6] as usize,
            0xA000..=0xBFFF => self.bank_regs[7] as usize,
            0xC000..=0xDFFF if swapped => self.bank_regs[6] as usize,
            0xC000..=0xDFFF => second_last,
            _ => last,
        }
    }

    fn chr_bank(&self, addr: u16) -> usize {
        let r0 = self.bank_regs[0] & 0xFE;
        let r1 = self.bank_regs[1] & 0xFE;
        let r2 = self.bank_regs[2];
        let r3 = self.bank_regs[3];
        let r4 = self.bank_regs[4];
        let r5 = self.bank_regs[5];

        let banks = if (self.bank_select & 0x80) == 0 {
            [r0, r0 | 1, r1, r1 | 1, r2, r3, r4, r5]
        } else {
            [r2, r3, r4, r5, r0, r0 | 1, r1, r1 | 1]
        };

        let slot = (addr as usize & 0x1FFF) / 0x0400;
        banks[slot] as usize
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        match addr & 0xE001 {
            0x8000 => self.bank_select = value,
            0x8001 => {
                let target = (self.bank_select & 0x07) as usize;
                self.bank_regs[target] = if target <= 1 { value & 0xFE } else { value };
            }
            0xA000 => {
                if !self.four_screen {
                    self.mirroring = if (value & 1) == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    };
                }
            }
            0xA001 => {
                self.prg_ram_enabled = (value & 0x80) != 0;
                self.prg_ram_write_protect = (value & 0x40) != 0;
            }
            0xC000 => self.irq.counter.set_reload(value as u16),
            0xC001 => {
                self.irq.counter.load(0);
                self.irq.counter.force_reload();
            }
            0xE000 => {
                self.irq.counter.set_enabled(false);
                self.irq.counter.acknowledge();
            }
            _ => self.irq.counter.set_enabled(true),
        }
    }

    fn capture(&self) -> MapperState {
        let (irq, a12) = self.irq.snapshot();
        MapperState {
            chip: NAME.to_string(),
            irq,
            a12,
            bank_registers: self.bank_regs.to_vec(),
            control: vec![
                self.bank_select,
                self.prg_ram_enabled as u8,
                self.prg_ram_write_protect as u8,
            ],
            mirroring: self.mirroring,
        }
    }
}

impl Mapper for Mmc3 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled => self.memory.read_prg_ram(addr),
            0x8000..=0xFFFF => self.memory.read_prg(self.prg_bank(addr), addr as usize & 0x1FFF),
            _ => 0,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled && !self.prg_ram_write_protect {
                    self.memory.write_prg_ram(addr, value);
                }
            }
            0x8000..=0xFFFF => self.write_register(addr, value),
            _ => log::trace!("MMC3 ignored write ${addr:04X} = ${value:02X}"),
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
        if self.four_screen {
            Mirroring::FourScreen
        } else {
            self.mirroring
        }
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
        // The MMC3 has no reset input; a console reset only drops the IRQ line.
        if hard {
            self.bank_select = 0;
            self.bank_regs = [0; 8];
            self.mirroring = self.base_mirroring;
            self.prg_ram_enabled = true;
            self.prg_ram_write_protect = false;
        }
        self.irq.reset(hard);
        log::debug!("MMC3 {} reset", if hard { "hard" } else { "soft" });
    }

    fn save_state(&self) -> Result<Vec<u8>, StateError> {
        self.capture().encode()
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        let state = MapperState::decode(bytes)
            .inspect_err(|err| log::warn!("MMC3 state rejected: {err}"))?;
        state
            .expect_layout(NAME, self.bank_regs.len(), CONTROL_LEN)
            .inspect_err(|err| log::warn!("MMC3 state rejected: {err}"))?;

        self.bank_regs.copy_from_slice(&state.bank_registers);
        self.bank_select = state.control[0];
        self.prg_ram_enabled = state.control[1] != 0;
        self.prg_ram_write_protect = state.control[2] != 0;
        self.mirroring = state.mirroring;
        self.irq.restore(state.irq, state.a12);
        log::debug!("MMC3 state restored");
        Ok(())
    }

    fn bank_registers(&self) -> Vec<u8> {
        self.bank_regs.to_vec()
    }

    fn irq_counter(&self) -> u16 {
        self.irq.counter.count()
    }

    fn debug_state(&self) -> String {
        let irq = self.irq.counter.snapshot();
        format!(
            "MMC3 ({:?}) bank_select=${:02X} prg=[{:02X},{:02X}] chr=[{:02X},{:02X},{:02X},{:02X},{:02X},{:02X}] irq_latch=${:02X} irq_counter=${:02X} reload_pending={} en={} pending={} a12_clocks={}",
            self.revision,
            self.bank_select,
            self.bank_regs[6],
            self.bank_regs[7],
            self.bank_regs[0],
            self.bank_regs[1],
            self.bank_regs[2],
            self.bank_regs[3],
            self.bank_regs[4],
            self.bank_regs[5],
            irq.reload,
            irq.count,
            irq.reload_pending,
            irq.enabled,
            irq.pending,
            self.irq.clocks()
        )
    }
}
