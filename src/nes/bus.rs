use super::mapper::Mapper;

pub const DOTS_PER_SCANLINE: u64 = 341;
pub const SCANLINES_PER_FRAME: u64 = 262;
pub const VISIBLE_SCANLINES: u64 = 240;
pub const CYCLES_PER_FRAME: u64 = DOTS_PER_SCANLINE * SCANLINES_PER_FRAME;

const POLL_DOT: u64 = 340;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    CpuWrite { addr: u16, value: u8 },
    PpuFetch { addr: u16 },
    PollIrq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub cycle: u64,
    pub event: BusEvent,
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Vec<TimedEvent>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    // Same-cycle events keep the order they were pushed in.
    pub fn push(&mut self, cycle: u64, event: BusEvent) {
        let at = self.events.partition_point(|e| e.cycle <= cycle);
        self.events.insert(at, TimedEvent { cycle, event });
    }

    pub fn push_write(&mut self, cycle: u64, addr: u16, value: u8) {
        self.push(cycle, BusEvent::CpuWrite { addr, value });
    }

    pub fn push_fetches(&mut self, fetches: impl IntoIterator<Item = (u64, u16)>) {
        for (cycle, addr) in fetches {
            self.push(cycle, BusEvent::PpuFetch { addr });
        }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// Pattern fetches only; nametable and attribute reads never reach A12 here.
// BG tiles at dots 1-256 and 321-336, sprites at 257-320.
pub fn render_scanline(line_start: u64, bg_table: u16, sprite_table: u16) -> Vec<(u64, u16)> {
    let mut fetches = Vec::with_capacity(2 * (32 + 8 + 2));
    let mut tile = |base_dot: u64, table: u16, index: u16| {
        let addr = table | (index << 4);
        fetches.push((line_start + base_dot + 4, addr));
        fetches.push((line_start + base_dot + 6, addr | 0x0008));
    };

    for index in 0..32u16 {
        tile(1 + index as u64 * 8, bg_table, index);
    }
    for sprite in 0..8u16 {
        tile(257 + sprite as u64 * 8, sprite_table, 0xFF);
    }
    for index in 0..2u16 {
        tile(321 + index as u64 * 8, bg_table, index);
    }
    fetches
}

// Pre-render line then the visible lines, each ending in an IRQ poll.
pub fn frame_timeline(frame_start: u64, bg_table: u16, sprite_table: u16) -> Timeline {
    let mut timeline = Timeline::new();
    for line in 0..=VISIBLE_SCANLINES {
        let line_start = frame_start + line * DOTS_PER_SCANLINE;
        timeline.push_fetches(render_scanline(line_start, bg_table, sprite_table));
        timeline.push(line_start + POLL_DOT, BusEvent::PollIrq);
    }
    timeline
}

pub fn scanline_of(cycle: u64, frame_start: u64) -> i64 {
    (cycle.saturating_sub(frame_start) / DOTS_PER_SCANLINE) as i64 - 1
}

pub struct CartridgeBus {
    mapper: Box<dyn Mapper>,
    irq_line: bool,
    irq_rises: Vec<u64>,
    irq_handler: Vec<(u16, u8)>,
    frame: u64,
    bg_table: u16,
    sprite_table: u16,
}

impl CartridgeBus {
    pub fn new(mapper: Box<dyn Mapper>) -> Self {
        Self {
            mapper,
            irq_line: false,
            irq_rises: Vec::new(),
            irq_handler: Vec::new(),
            frame: 0,
            bg_table: 0x0000,
            sprite_table: 0x1000,
        }
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> &mut dyn Mapper {
        self.mapper.as_mut()
    }

    pub fn set_pattern_tables(&mut self, bg_table: u16, sprite_table: u16) {
        self.bg_table = bg_table & 0x1000;
        self.sprite_table = sprite_table & 0x1000;
    }

    pub fn set_irq_handler(&mut self, writes: Vec<(u16, u8)>) {
        self.irq_handler = writes;
    }

    pub fn cpu_read(&mut self, addr: u16) -> u8 {
        if addr >= 0x4020 {
            self.mapper.cpu_read(addr)
        } else {
            0
        }
    }

    pub fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr >= 0x4020 {
            self.mapper.cpu_write(addr, value);
        } else {
            log::trace!("bus dropped write ${addr:04X} = ${value:02X}");
        }
    }

    pub fn ppu_fetch(&mut self, addr: u16, cycle: u64) -> u8 {
        self.mapper.notify_address_line(addr, cycle);
        if addr < 0x2000 {
            self.mapper.ppu_read(addr)
        } else {
            0
        }
    }

    pub fn poll_irq(&mut self, cycle: u64) -> bool {
        let level = self.mapper.irq_pending();
        if level && !self.irq_line {
            self.irq_rises.push(cycle);
            log::debug!("IRQ rose at cycle {cycle}");
            for (addr, value) in self.irq_handler.clone() {
                self.cpu_write(addr, value);
            }
        }
        self.irq_line = self.mapper.irq_pending();
        level
    }

    pub fn apply(&mut self, event: &TimedEvent) {
        match event.event {
            BusEvent::CpuWrite { addr, value } => self.cpu_write(addr, value),
            BusEvent::PpuFetch { addr } => {
                self.ppu_fetch(addr, event.cycle);
            }
            BusEvent::PollIrq => {
                self.poll_irq(event.cycle);
            }
        }
    }

    pub fn replay(&mut self, timeline: &Timeline) {
        for event in timeline.events() {
            self.apply(event);
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frame_start(&self) -> u64 {
        self.frame * CYCLES_PER_FRAME
    }

    // Scanlines (-1 = pre-render) on which the IRQ line rose.
    pub fn run_frame(&mut self) -> Vec<i64> {
        let start = self.frame_start();
        let first_rise = self.irq_rises.len();
        let timeline = frame_timeline(start, self.bg_table, self.sprite_table);
        self.replay(&timeline);
        self.frame += 1;

        self.irq_rises[first_rise..]
            .iter()
            .map(|&cycle| scanline_of(cycle, start))
            .collect()
    }

    pub fn irq_rises(&self) -> &[u64] {
        &self.irq_rises
    }

    pub fn reset(&mut self, hard: bool) {
        self.mapper.reset(hard);
        self.irq_line = false;
        if hard {
            self.irq_rises.clear();
            self.frame = 0;
        }
    }
}
