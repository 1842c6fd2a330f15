use serde::{Deserialize, Serialize};

use super::a12::{A12Snapshot, A12Watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up { target: u16 },
}

// What the counter does on the clock that asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTrigger {
    HoldAtZero,
    ReloadImmediately,
    // Count cleared and counting stopped until rearmed.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadTiming {
    NextReload,
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqConfig {
    pub direction: Direction,
    pub on_trigger: OnTrigger,
    pub reload_timing: ReloadTiming,
    pub zero_reload_triggers: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqSnapshot {
    pub count: u16,
    pub reload: u16,
    pub enabled: bool,
    pub reload_pending: bool,
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqCounter {
    config: IrqConfig,
    count: u16,
    reload: u16,
    enabled: bool,
    reload_pending: bool,
    pending: bool,
}

impl IrqCounter {
    pub fn new(config: IrqConfig) -> Self {
        Self {
            config,
            count: 0,
            reload: 0,
            enabled: false,
            reload_pending: false,
            pending: false,
        }
    }

    pub fn config(&self) -> IrqConfig {
        self.config
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn reload_value(&self) -> u16 {
        self.reload
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    // Soft reset only drops the IRQ output.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.count = 0;
            self.reload = 0;
            self.enabled = false;
            self.reload_pending = false;
        }
        self.pending = false;
    }

    pub fn set_reload(&mut self, value: u16) {
        self.reload = value;
        if self.config.reload_timing == ReloadTiming::Immediate {
            self.count = value;
        }
    }

    pub fn force_reload(&mut self) {
        self.reload_pending = true;
    }

    pub fn load(&mut self, value: u16) {
        self.count = value;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn acknowledge(&mut self) {
        self.pending = false;
    }

    pub fn clock(&mut self) -> bool {
        let asserted = match self.config.direction {
            Direction::Down => self.clock_down(),
            Direction::Up { target } => self.clock_up(target),
        };
        if asserted {
            self.pending = true;
        }
        asserted
    }

    fn clock_down(&mut self) -> bool {
        let forced = self.reload_pending;
        let reloaded = self.count == 0 || forced;
        if reloaded {
            self.count = self.reload;
            self.reload_pending = false;
        } else {
            self.count -= 1;
        }

        if self.count != 0 {
            return false;
        }

        let triggers = !reloaded || forced || self.config.zero_reload_triggers;
        if !reloaded && self.config.on_trigger == OnTrigger::ReloadImmediately {
            self.count = self.reload;
        }
        triggers && self.enabled
    }

    fn clock_up(&mut self, target: u16) -> bool {
        if !self.enabled {
            return false;
        }
        self.count = self.count.wrapping_add(1);
        if self.count < target {
            return false;
        }

        match self.config.on_trigger {
            OnTrigger::Halt => {
                self.count = 0;
                self.enabled = false;
            }
            OnTrigger::ReloadImmediately => self.count = self.reload,
            OnTrigger::HoldAtZero => self.count = 0,
        }
        true
    }

    pub fn snapshot(&self) -> IrqSnapshot {
        IrqSnapshot {
            count: self.count,
            reload: self.reload,
            enabled: self.enabled,
            reload_pending: self.reload_pending,
            pending: self.pending,
        }
    }

    pub fn restore(&mut self, snapshot: IrqSnapshot) {
        self.count = snapshot.count;
        self.reload = snapshot.reload;
        self.enabled = snapshot.enabled;
        self.reload_pending = snapshot.reload_pending;
        self.pending = snapshot.pending;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A12Irq {
    watcher: A12Watcher,
    pub counter: IrqCounter,
}

impl A12Irq {
    pub fn new(window: u64, config: IrqConfig) -> Self {
        Self {
            watcher: A12Watcher::new(window),
            counter: IrqCounter::new(config),
        }
    }

    pub fn notify(&mut self, addr: u16, cycle: u64) -> bool {
        if !self.watcher.update(addr, cycle) {
            return false;
        }
        let asserted = self.counter.clock();
        if asserted {
            log::trace!(
                "A12 IRQ asserted at cycle {cycle}, clock #{}",
                self.watcher.clean_edges()
            );
        }
        asserted
    }

    // A soft reset leaves the bus alone, so the line level and filter
    // reference carry over.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.watcher.reset();
        }
        self.counter.reset(hard);
    }

    pub fn pending(&self) -> bool {
        self.counter.pending()
    }

    pub fn clocks(&self) -> u64 {
        self.watcher.clean_edges()
    }

    pub fn watcher(&self) -> &A12Watcher {
        &self.watcher
    }

    pub fn snapshot(&self) -> (IrqSnapshot, A12Snapshot) {
        (self.counter.snapshot(), self.watcher.snapshot())
    }

    pub fn restore(&mut self, irq: IrqSnapshot, a12: A12Snapshot) {
        self.counter.restore(irq);
        self.watcher.restore(a12);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELOADING_DOWN: IrqConfig = IrqConfig {
        direction: Direction::Down,
        on_trigger: OnTrigger::ReloadImmediately,
        reload_timing: ReloadTiming::NextReload,
        zero_reload_triggers: true,
    };

    const HOLDING_DOWN: IrqConfig = IrqConfig {
        on_trigger: OnTrigger::HoldAtZero,
        ..RELOADING_DOWN
    };

    const HALTING_UP: IrqConfig = IrqConfig {
        direction: Direction::Up { target: 240 },
        on_trigger: OnTrigger::Halt,
        reload_timing: ReloadTiming::Immediate,
        zero_reload_triggers: false,
    };

    fn clock_n(counter: &mut IrqCounter, n: usize) -> Vec<usize> {
        (1..=n).filter(|_| counter.clock()).collect()
    }

    #[test]
    fn reload_seven_asserts_on_eighth_edge_and_reloads() {
        let mut counter = IrqCounter::new(RELOADING_DOWN);
        counter.set_reload(7);
        counter.set_enabled(true);
        counter.reset(true);
        counter.set_reload(7);
        counter.set_enabled(true);

        let asserted = clock_n(&mut counter, 8);
        assert_eq!(asserted, vec![8]);
        assert_eq!(counter.count(), 7);
        assert!(counter.pending());
    }

    #[test]
    fn r_plus_one_edges_from_fresh_reload_give_one_irq() {
        for policy in [RELOADING_DOWN, HOLDING_DOWN] {
            for reload in [0u16, 1, 5, 255] {
                let mut counter = IrqCounter::new(policy);
                counter.set_reload(reload);
                counter.set_enabled(true);
                counter.force_reload();
                let asserted = clock_n(&mut counter, reload as usize + 1);
                assert_eq!(asserted.len(), 1, "policy {policy:?} reload {reload}");
            }
        }
    }

    #[test]
    fn hold_at_zero_reloads_on_following_clock() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_reload(2);
        counter.set_enabled(true);

        assert_eq!(clock_n(&mut counter, 3), vec![3]);
        assert_eq!(counter.count(), 0);
        assert!(!counter.clock());
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn disabled_counter_counts_without_asserting() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_reload(1);
        assert!(clock_n(&mut counter, 4).is_empty());
        assert!(!counter.pending());
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn next_reload_write_does_not_disturb_running_count() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_reload(10);
        counter.clock();
        counter.clock();
        assert_eq!(counter.count(), 9);

        counter.set_reload(3);
        assert_eq!(counter.count(), 9);
        counter.force_reload();
        counter.clock();
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn immediate_reload_write_sets_count() {
        let mut counter = IrqCounter::new(HALTING_UP);
        counter.set_reload(200);
        assert_eq!(counter.count(), 200);
    }

    #[test]
    fn zero_reload_trigger_depends_on_revision() {
        let strict = IrqConfig {
            zero_reload_triggers: false,
            ..HOLDING_DOWN
        };

        let mut counter = IrqCounter::new(strict);
        counter.set_enabled(true);
        assert!(!counter.clock());
        counter.force_reload();
        assert!(counter.clock());

        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_enabled(true);
        assert!(counter.clock());
        assert!(counter.clock());
    }

    #[test]
    fn up_counter_halts_at_target() {
        let mut counter = IrqCounter::new(HALTING_UP);
        counter.set_reload(1);
        counter.set_enabled(true);

        assert_eq!(clock_n(&mut counter, 239), vec![239]);
        assert_eq!(counter.count(), 0);
        assert!(!counter.enabled());
        assert!(clock_n(&mut counter, 500).is_empty());
    }

    #[test]
    fn hard_reset_restores_power_on_state() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_reload(4);
        counter.set_enabled(true);
        counter.force_reload();
        counter.clock();
        counter.load(1);
        counter.clock();
        assert!(counter.pending());

        counter.reset(true);
        assert_eq!(counter, IrqCounter::new(HOLDING_DOWN));
    }

    #[test]
    fn soft_reset_keeps_reload_and_clears_pending() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_reload(9);
        counter.set_enabled(true);
        counter.load(1);
        assert!(counter.clock());

        counter.reset(false);
        assert!(!counter.pending());
        assert_eq!(counter.reload_value(), 9);
        assert!(counter.enabled());
    }

    #[test]
    fn acknowledge_clears_pending_only() {
        let mut counter = IrqCounter::new(HOLDING_DOWN);
        counter.set_enabled(true);
        counter.load(1);
        counter.clock();
        counter.acknowledge();
        assert!(!counter.pending());
        assert!(counter.enabled());
    }

    #[test]
    fn a12_irq_filters_then_clocks() {
        let mut irq = A12Irq::new(16, HOLDING_DOWN);
        irq.counter.set_reload(1);
        irq.counter.set_enabled(true);

        // Rising at 0 reloads to 1; the bounce at 3 is dropped.
        irq.notify(0x1000, 0);
        irq.notify(0x0000, 1);
        irq.notify(0x1000, 3);
        assert_eq!(irq.clocks(), 1);
        assert!(!irq.pending());

        irq.notify(0x0000, 10);
        assert!(irq.notify(0x1000, 40));
        assert!(irq.pending());
        assert_eq!(irq.clocks(), 2);

        irq.reset(true);
        assert_eq!(irq.clocks(), 0);
        assert!(!irq.pending());
    }

    #[test]
    fn soft_reset_with_a12_held_high_does_not_clock() {
        let mut irq = A12Irq::new(16, HOLDING_DOWN);
        irq.counter.set_reload(5);
        irq.notify(0x1000, 0);
        irq.notify(0x1000, 100);
        assert_eq!(irq.counter.count(), 5);

        irq.reset(false);
        irq.notify(0x1000, 200);
        assert_eq!(irq.counter.count(), 5);
        assert_eq!(irq.clocks(), 1);

        irq.notify(0x0000, 210);
        irq.notify(0x1000, 220);
        assert_eq!(irq.counter.count(), 4);
    }

    #[test]
    fn only_hard_reset_clears_filter_reference() {
        let mut irq = A12Irq::new(16, HOLDING_DOWN);
        irq.counter.set_reload(5);
        irq.notify(0x1000, 100);
        irq.notify(0x0000, 101);

        // Still inside the window of the edge at 100.
        irq.reset(false);
        assert_eq!(irq.watcher().filter().last_edge(), Some(100));
        irq.notify(0x1000, 105);
        assert_eq!(irq.clocks(), 1);

        irq.notify(0x0000, 106);
        irq.reset(true);
        assert_eq!(irq.watcher().filter().last_edge(), None);
        irq.notify(0x1000, 107);
        assert_eq!(irq.clocks(), 1);
        assert_eq!(irq.counter.count(), 0);
    }
}
