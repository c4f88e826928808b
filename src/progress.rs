/// Number of fixed work units after file ingestion: merged write, backfill,
/// address extract, column fit. Reported even on a run with zero source
/// files.
pub const TRAILING_UNITS: usize = 4;

/// Caller-supplied channel consuming completion fractions in `[0, 1]`.
pub trait ProgressSink {
    fn update(&mut self, fraction: f64);
}

/// Sink for callers that do not track progress.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&mut self, _fraction: f64) {}
}

/// Emits a completion fraction after each discrete unit of work.
///
/// Fractions are monotonically non-decreasing across the run and reach 1.0
/// exactly once, at the final unit; calls past the final unit are ignored.
pub struct ProgressReporter<'a> {
    sink: &'a mut dyn ProgressSink,
    total: usize,
    completed: usize,
    last: f64,
}

impl<'a> ProgressReporter<'a> {
    /// One unit per source file plus the fixed trailing units.
    pub fn new(sink: &'a mut dyn ProgressSink, file_count: usize) -> Self {
        Self {
            sink,
            total: file_count + TRAILING_UNITS,
            completed: 0,
            last: 0.0,
        }
    }

    /// Announces the start of the run with a zero fraction.
    pub fn begin(&mut self) {
        self.sink.update(0.0);
    }

    /// Marks one unit of work complete and pushes the new fraction.
    pub fn complete_unit(&mut self) {
        if self.completed == self.total {
            return;
        }
        self.completed += 1;
        let fraction = (self.completed as f64 / self.total as f64).max(self.last);
        self.last = fraction;
        self.sink.update(fraction);
    }
}
