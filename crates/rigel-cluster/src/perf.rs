//! Performance instrumentation
//!
//! The counter surface mirrors the silicon programming model: configure a
//! mask, reset, start, run, stop, read. [`measure`] wraps that sequence in
//! the warm-up + measured iteration discipline every benchmark here uses.
//!
//! # What the software cluster can and cannot count
//!
//! The software cluster has no instruction stream, so its bank derives what
//! it can from what actually happens:
//!
//! | Event | Source |
//! |-------|--------|
//! | `Cycles` | wall time inside start/stop at the nominal clock |
//! | `ActiveCycles` | `Cycles` minus `LoadStalls` |
//! | `Loads` / `Stores` | words moved by on-chip copies and kernel touches |
//! | `LoadStalls` | wall time blocked in `Transfer::wait` |
//! | `Instructions`, `IcacheMisses` | always 0 |
//!
//! The two zero counters stay in the report so the reading layout matches
//! the full seven-event bank.

use rigel_soc::cluster::nanos_to_cycles;
use rigel_soc::perf::{event, event_bit, EVENT_COUNT};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One countable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfEvent {
    /// Total cycles in the measurement window.
    Cycles,
    /// Instructions retired.
    Instructions,
    /// Cycles the cores were doing work rather than stalling.
    ActiveCycles,
    /// Load words.
    Loads,
    /// Store words.
    Stores,
    /// Cycles stalled waiting for staged data.
    LoadStalls,
    /// Instruction-cache misses.
    IcacheMisses,
}

impl PerfEvent {
    /// Every event, in raw-index order.
    pub const ALL: [PerfEvent; EVENT_COUNT] = [
        PerfEvent::Cycles,
        PerfEvent::Instructions,
        PerfEvent::ActiveCycles,
        PerfEvent::Loads,
        PerfEvent::Stores,
        PerfEvent::LoadStalls,
        PerfEvent::IcacheMisses,
    ];

    /// Raw event index from the silicon model.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            PerfEvent::Cycles => event::CYCLES,
            PerfEvent::Instructions => event::INSTR,
            PerfEvent::ActiveCycles => event::ACTIVE,
            PerfEvent::Loads => event::LD,
            PerfEvent::Stores => event::ST,
            PerfEvent::LoadStalls => event::LD_STALL,
            PerfEvent::IcacheMisses => event::IMISS,
        }
    }

    /// Position of this event in reading arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self.code() as usize
    }

    /// Short report label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PerfEvent::Cycles => "cycles",
            PerfEvent::Instructions => "instr",
            PerfEvent::ActiveCycles => "active",
            PerfEvent::Loads => "loads",
            PerfEvent::Stores => "stores",
            PerfEvent::LoadStalls => "ldstall",
            PerfEvent::IcacheMisses => "imiss",
        }
    }
}

/// Set of events a bank is configured to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMask(u32);

impl EventMask {
    /// No events.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// All seven events.
    #[must_use]
    pub const fn all() -> Self {
        Self((1 << EVENT_COUNT) - 1)
    }

    /// This mask plus one event.
    #[must_use]
    pub const fn with(self, event: PerfEvent) -> Self {
        Self(self.0 | event_bit(event.code()))
    }

    /// Whether an event is in the mask.
    #[must_use]
    pub const fn contains(self, event: PerfEvent) -> bool {
        self.0 & event_bit(event.code()) != 0
    }

    /// Raw mask bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// The counter programming surface.
///
/// `configure` then `reset` then `start`, run the body, `stop`, `read`.
/// Events outside the configured mask read 0.
pub trait CounterBank {
    /// Select which events count.
    fn configure(&mut self, mask: EventMask);
    /// Zero all accumulators.
    fn reset(&mut self);
    /// Open the counting window.
    fn start(&mut self);
    /// Close the counting window.
    fn stop(&mut self);
    /// Read one event's accumulated value.
    fn read(&self, event: PerfEvent) -> u64;
}

/// Shared counter state for one powered cluster.
///
/// Cores and the transfer engine feed it; [`ClusterCounters`] reads it out.
#[derive(Debug)]
pub(crate) struct PerfState {
    counting: AtomicBool,
    mask: AtomicU32,
    load_words: AtomicU64,
    store_words: AtomicU64,
    stall_nanos: AtomicU64,
    window_nanos: AtomicU64,
    window_open: Mutex<Option<Instant>>,
}

impl PerfState {
    pub(crate) fn new() -> Self {
        Self {
            counting: AtomicBool::new(false),
            mask: AtomicU32::new(EventMask::all().bits()),
            load_words: AtomicU64::new(0),
            store_words: AtomicU64::new(0),
            stall_nanos: AtomicU64::new(0),
            window_nanos: AtomicU64::new(0),
            window_open: Mutex::new(None),
        }
    }

    /// An on-chip copy of `bytes`: one load and one store per word.
    pub(crate) fn record_onchip(&self, bytes: usize) {
        if self.counting.load(Ordering::SeqCst) {
            let words = bytes.div_ceil(4) as u64;
            self.load_words.fetch_add(words, Ordering::SeqCst);
            self.store_words.fetch_add(words, Ordering::SeqCst);
        }
    }

    /// A kernel pass over `bytes` resident in scratch: read + write per word.
    pub(crate) fn record_touch(&self, bytes: usize) {
        self.record_onchip(bytes);
    }

    /// Wall time a core spent blocked in `Transfer::wait`.
    pub(crate) fn record_stall(&self, blocked: Duration) {
        if self.counting.load(Ordering::SeqCst) {
            let nanos = u64::try_from(blocked.as_nanos()).unwrap_or(u64::MAX);
            self.stall_nanos.fetch_add(nanos, Ordering::SeqCst);
        }
    }
}

/// The software cluster's counter bank.
///
/// Cheap to clone; every clone reads the same underlying state.
#[derive(Debug, Clone)]
pub struct ClusterCounters {
    state: Arc<PerfState>,
}

impl ClusterCounters {
    pub(crate) fn new(state: Arc<PerfState>) -> Self {
        Self { state }
    }
}

impl CounterBank for ClusterCounters {
    fn configure(&mut self, mask: EventMask) {
        self.state.mask.store(mask.bits(), Ordering::SeqCst);
    }

    fn reset(&mut self) {
        self.state.load_words.store(0, Ordering::SeqCst);
        self.state.store_words.store(0, Ordering::SeqCst);
        self.state.stall_nanos.store(0, Ordering::SeqCst);
        self.state.window_nanos.store(0, Ordering::SeqCst);
        *self.state.window_open.lock().unwrap() = None;
    }

    fn start(&mut self) {
        *self.state.window_open.lock().unwrap() = Some(Instant::now());
        self.state.counting.store(true, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.state.counting.store(false, Ordering::SeqCst);
        if let Some(opened) = self.state.window_open.lock().unwrap().take() {
            let nanos = u64::try_from(opened.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.state.window_nanos.fetch_add(nanos, Ordering::SeqCst);
        }
    }

    fn read(&self, event: PerfEvent) -> u64 {
        let mask = EventMask(self.state.mask.load(Ordering::SeqCst));
        if !mask.contains(event) {
            return 0;
        }
        let cycles = nanos_to_cycles(self.state.window_nanos.load(Ordering::SeqCst));
        let stalls = nanos_to_cycles(self.state.stall_nanos.load(Ordering::SeqCst));
        match event {
            PerfEvent::Cycles => cycles,
            PerfEvent::ActiveCycles => cycles.saturating_sub(stalls),
            PerfEvent::Loads => self.state.load_words.load(Ordering::SeqCst),
            PerfEvent::Stores => self.state.store_words.load(Ordering::SeqCst),
            PerfEvent::LoadStalls => stalls,
            // No instruction stream to count in the software cluster.
            PerfEvent::Instructions | PerfEvent::IcacheMisses => 0,
        }
    }
}

/// Iteration discipline for one measurement.
#[derive(Debug, Clone, Copy)]
pub struct MeasureSpec {
    /// Unmeasured priming passes before readings accumulate.
    pub warmup: u32,
    /// Measured passes; the report averages over these.
    pub repeat: u32,
    /// Events to configure for every pass.
    pub events: EventMask,
}

impl Default for MeasureSpec {
    /// One warm-up pass, three measured passes, all events.
    fn default() -> Self {
        Self {
            warmup: 1,
            repeat: 3,
            events: EventMask::all(),
        }
    }
}

/// Averaged readings from one measurement.
#[derive(Debug, Clone)]
pub struct PerfReport {
    averages: [u64; EVENT_COUNT],
    /// Warm-up passes that ran before readings counted.
    pub warmup: u32,
    /// Measured passes behind each average.
    pub repeat: u32,
}

impl PerfReport {
    /// Average reading for one event across the measured passes.
    #[must_use]
    pub const fn average(&self, event: PerfEvent) -> u64 {
        self.averages[event.index()]
    }
}

/// Run `body` `warmup + repeat` times under the counter discipline.
///
/// Every pass reprograms the bank (configure, reset, start, stop), exactly
/// as the silicon sequence would; readings accumulate only once the warm-up
/// passes have elapsed, and the report divides by `repeat`.
///
/// # Panics
///
/// Panics if `spec.repeat` is zero.
pub fn measure<B, F>(bank: &mut B, spec: &MeasureSpec, mut body: F) -> PerfReport
where
    B: CounterBank,
    F: FnMut(),
{
    assert!(spec.repeat > 0, "measurement needs at least one measured pass");
    let mut totals = [0u64; EVENT_COUNT];
    for pass in 0..(spec.warmup + spec.repeat) {
        bank.configure(spec.events);
        bank.reset();
        bank.start();
        body();
        bank.stop();
        if pass >= spec.warmup {
            for event in PerfEvent::ALL {
                totals[event.index()] += bank.read(event);
            }
        }
    }
    let repeat = u64::from(spec.repeat);
    let mut averages = [0u64; EVENT_COUNT];
    for (avg, total) in averages.iter_mut().zip(totals) {
        *avg = total / repeat;
    }
    PerfReport {
        averages,
        warmup: spec.warmup,
        repeat: spec.repeat,
    }
}
