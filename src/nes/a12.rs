use serde::{Deserialize, Serialize};

pub const A12_MASK: u16 = 0x1000;

// In PPU cycles.
pub const DEFAULT_FILTER_WINDOW: u64 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct A12Line {
    high: bool,
}

impl A12Line {
    pub fn observe(&mut self, addr: u16) -> bool {
        let high = (addr & A12_MASK) != 0;
        let rose = high && !self.high;
        self.high = high;
        rose
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    pub fn reset(&mut self) {
        self.high = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A12EdgeFilter {
    window: u64,
    last_edge: Option<u64>,
}

impl A12EdgeFilter {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            last_edge: None,
        }
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn last_edge(&self) -> Option<u64> {
        self.last_edge
    }

    pub fn clock(&mut self, now: u64) -> bool {
        let accepted = match self.last_edge {
            None => true,
            // Cycle counter restarted under us: take the edge and re-anchor.
            Some(last) if now < last => true,
            Some(last) => now - last >= self.window,
        };
        // Rejected edges leave the reference alone.
        if accepted {
            self.last_edge = Some(now);
        }
        accepted
    }

    pub fn reset(&mut self) {
        self.last_edge = None;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct A12Snapshot {
    pub line_high: bool,
    pub last_edge: Option<u64>,
    pub clean_edges: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A12Watcher {
    line: A12Line,
    filter: A12EdgeFilter,
    clean_edges: u64,
}

impl A12Watcher {
    pub fn new(window: u64) -> Self {
        Self {
            line: A12Line::default(),
            filter: A12EdgeFilter::new(window),
            clean_edges: 0,
        }
    }

    pub fn update(&mut self, addr: u16, cycle: u64) -> bool {
        let clean = self.line.observe(addr) && self.filter.clock(cycle);
        if clean {
            self.clean_edges = self.clean_edges.wrapping_add(1);
        }
        clean
    }

    pub fn clean_edges(&self) -> u64 {
        self.clean_edges
    }

    pub fn reset(&mut self) {
        self.line.reset();
        self.filter.reset();
        self.clean_edges = 0;
    }

    pub fn snapshot(&self) -> A12Snapshot {
        A12Snapshot {
            line_high: self.line.is_high(),
            last_edge: self.filter.last_edge(),
            clean_edges: self.clean_edges,
        }
    }

    pub fn restore(&mut self, snapshot: A12Snapshot) {
        self.line = A12Line {
            high: snapshot.line_high,
        };
        self.filter.last_edge = snapshot.last_edge;
        self.clean_edges = snapshot.clean_edges;
    }

    pub fn filter(&self) -> &A12EdgeFilter {
        &self.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_edge_after_reset_is_accepted() {
        let mut filter = A12EdgeFilter::new(16);
        assert!(filter.clock(5));

        filter.reset();
        assert!(filter.clock(6));
    }

    #[test]
    fn edges_three_cycles_apart_clock_once() {
        let mut filter = A12EdgeFilter::new(16);
        assert!(filter.clock(100));
        assert!(!filter.clock(103));
        assert_eq!(filter.last_edge(), Some(100));
    }

    #[test]
    fn edge_exactly_one_window_later_is_accepted() {
        let mut filter = A12EdgeFilter::new(16);
        assert!(filter.clock(0));
        assert!(!filter.clock(15));
        assert!(filter.clock(16));
    }

    #[test]
    fn rejected_edges_do_not_move_reference() {
        // Rising edges every 8 cycles, as sprite fetches from $1000 produce.
        let mut filter = A12EdgeFilter::new(16);
        let accepted = (0..8u64).filter(|i| filter.clock(i * 8)).count();
        // 0, 16, 32, 48 are each a full window after the last accepted edge.
        assert_eq!(accepted, 4);
    }

    #[test]
    fn noisy_sequence_counts_only_spaced_edges() {
        let times = [0u64, 2, 5, 20, 21, 35, 36, 60, 61, 62, 100];
        let mut filter = A12EdgeFilter::new(16);
        let accepted: Vec<u64> = times.iter().copied().filter(|&t| filter.clock(t)).collect();
        assert_eq!(accepted, vec![0, 20, 36, 60, 100]);
        for pair in accepted.windows(2) {
            assert!(pair[1] - pair[0] >= 16);
        }
    }

    #[test]
    fn counter_restart_re_anchors() {
        let mut filter = A12EdgeFilter::new(16);
        assert!(filter.clock(1_000));
        assert!(filter.clock(3));
        assert!(!filter.clock(10));
    }

    #[test]
    fn line_reports_only_rising_transitions() {
        let mut line = A12Line::default();
        assert!(!line.observe(0x0FF0));
        assert!(line.observe(0x1000));
        assert!(!line.observe(0x1FF8));
        assert!(!line.observe(0x2000));
        assert!(line.observe(0x3000));
    }

    #[test]
    fn watcher_combines_line_and_filter() {
        let mut watcher = A12Watcher::new(16);
        assert!(watcher.update(0x1000, 10));
        assert!(!watcher.update(0x0000, 11));
        assert!(!watcher.update(0x1000, 13));
        assert!(!watcher.update(0x0000, 20));
        assert!(watcher.update(0x1000, 30));

        let snap = watcher.snapshot();
        let mut copy = A12Watcher::new(16);
        copy.restore(snap);
        assert_eq!(copy, watcher);
    }

    #[test]
    fn watcher_counts_clean_edges_until_reset() {
        let mut watcher = A12Watcher::new(16);
        watcher.update(0x1000, 0);
        watcher.update(0x0000, 1);
        watcher.update(0x1000, 4);
        watcher.update(0x0000, 30);
        watcher.update(0x1000, 40);
        assert_eq!(watcher.clean_edges(), 2);
        assert_eq!(watcher.snapshot().clean_edges, 2);

        watcher.reset();
        assert_eq!(watcher.clean_edges(), 0);
        assert!(!watcher.snapshot().line_high);
        assert_eq!(watcher.filter().last_edge(), None);
    }

    #[test]
    fn high_level_after_reset_needs_a_low_first() {
        let mut watcher = A12Watcher::new(16);
        watcher.update(0x1000, 0);
        let held = watcher.snapshot();

        // Without a reset a held-high line never produces another edge.
        assert!(!watcher.update(0x1000, 500));
        assert!(!watcher.update(0x1FFF, 900));
        assert_eq!(watcher.snapshot().clean_edges, held.clean_edges);

        // A full reset forgets the level, so the next high fetch is an edge.
        watcher.reset();
        assert!(watcher.update(0x1000, 1_000));
    }
}
