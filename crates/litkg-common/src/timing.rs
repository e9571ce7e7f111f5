//! Phase timings for the extraction loop.
//!
//! A `PhaseTimings` value is owned by whoever runs a batch and handed to the
//! code that needs to record into it. Nothing here is global.

use std::time::{Duration, Instant};

/// The measured stages of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Fetching document content from the store.
    Query,
    /// Waiting on the annotation queue for the next finished document.
    Annotate,
    /// Entity linking.
    Ner,
    /// Alignment, filtering and row construction.
    Triples,
    /// Waiting on the previous batch's writes and issuing this batch's.
    Insert,
    /// The whole batch.
    Batch,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Query,
        Phase::Annotate,
        Phase::Ner,
        Phase::Triples,
        Phase::Insert,
        Phase::Batch,
    ];

    fn slot(self) -> usize {
        match self {
            Phase::Query    => 0,
            Phase::Annotate => 1,
            Phase::Ner      => 2,
            Phase::Triples  => 3,
            Phase::Insert   => 4,
            Phase::Batch    => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Query    => "query",
            Phase::Annotate => "annotate",
            Phase::Ner      => "ner",
            Phase::Triples  => "triples",
            Phase::Insert   => "insert",
            Phase::Batch    => "batch",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PhaseStat {
    total: Duration,
    count: u32,
}

/// Accumulated durations per phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimings {
    stats: [PhaseStat; 6],
}

impl PhaseTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, recording its wall-clock time under `phase`.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        let t0 = Instant::now();
        let out = f();
        self.record(phase, t0.elapsed());
        out
    }

    pub fn record(&mut self, phase: Phase, elapsed: Duration) {
        let stat = &mut self.stats[phase.slot()];
        stat.total += elapsed;
        stat.count += 1;
    }

    /// Sum of all measurements since the last reset.
    pub fn total(&self, phase: Phase) -> Duration {
        self.stats[phase.slot()].total
    }

    pub fn count(&self, phase: Phase) -> u32 {
        self.stats[phase.slot()].count
    }

    /// Clear every phase.
    pub fn reset(&mut self) {
        self.stats = Default::default();
    }

    /// One-line `phase=duration` summary of the summed times.
    pub fn summary(&self) -> String {
        Phase::ALL
            .iter()
            .filter(|p| self.count(**p) > 0)
            .map(|p| format!("{}={}", p.as_str(), format_duration(self.total(*p))))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Seconds with millisecond precision below a minute, `h:mm:ss` above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.3}s", d.as_secs_f64())
    } else {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
