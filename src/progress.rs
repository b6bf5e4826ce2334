//! Progress reporting for a run.
//!
//! A run has `groups + 1` units of work: the summary fetch and one
//! membership check per group. [`ProgressTracker`] maps completed units onto
//! a 0-100 scale and forwards each value to a [`ProgressSink`]. Reported
//! values never decrease and `100` is reported exactly once.

/// Receives progress percentages in `0.0..=100.0`.
pub trait ProgressSink {
    fn report(&self, percent: f64);
}

impl<F: Fn(f64)> ProgressSink for F {
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Sink that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64) {}
}

pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    current: f64,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            current: 0.0,
            finished: false,
        }
    }

    /// Reports 0.
    pub fn start(&mut self) {
        self.emit(0.0);
    }

    /// Reports `completed / total` of the run and returns the current percent.
    pub fn advance(&mut self, completed: usize, total: usize) -> f64 {
        let percent = if total == 0 {
            100.0
        } else {
            completed as f64 * 100.0 / total as f64
        };
        self.emit(percent);
        self.current
    }

    /// Reports 100 unless it has been reported already.
    pub fn finish(&mut self) {
        self.emit(100.0);
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    fn emit(&mut self, percent: f64) {
        if self.finished {
            return;
        }
        let percent = if percent.is_nan() {
            self.current
        } else {
            percent.clamp(0.0, 100.0).max(self.current)
        };
        self.current = percent;
        self.finished = percent >= 100.0;
        self.sink.report(percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_progress_sequence_for_three_units() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: f64| seen.borrow_mut().push(p);
        let mut tracker = ProgressTracker::new(&sink);

        tracker.start();
        tracker.advance(1, 4);
        tracker.advance(2, 4);
        tracker.advance(3, 4);
        tracker.advance(4, 4);
        tracker.finish();

        assert_eq!(*seen.borrow(), vec![0.0, 25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_values_are_clamped_and_monotonic() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: f64| seen.borrow_mut().push(p);
        let mut tracker = ProgressTracker::new(&sink);

        tracker.start();
        assert_eq!(tracker.advance(3, 4), 75.0);
        assert_eq!(tracker.advance(1, 4), 75.0);
        tracker.advance(9, 4);

        assert_eq!(*seen.borrow(), vec![0.0, 75.0, 75.0, 100.0]);
    }

    #[test]
    fn test_hundred_is_reported_once() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: f64| seen.borrow_mut().push(p);
        let mut tracker = ProgressTracker::new(&sink);

        tracker.start();
        tracker.advance(1, 1);
        tracker.finish();
        tracker.finish();

        assert_eq!(*seen.borrow(), vec![0.0, 100.0]);
    }

    #[test]
    fn test_zero_total_counts_as_done() {
        let seen = RefCell::new(Vec::new());
        let sink = |p: f64| seen.borrow_mut().push(p);
        let mut tracker = ProgressTracker::new(&sink);
        tracker.advance(0, 0);
        assert_eq!(tracker.current(), 100.0);
    }

    #[test]
    fn test_no_progress_sink() {
        let mut tracker = ProgressTracker::new(&NoProgress);
        tracker.start();
        tracker.finish();
        assert_eq!(tracker.current(), 100.0);
    }
}
