use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ferry_protocol::{UploadProgress, UploadSession};

use crate::ChunkPlan;

/// Computes progress for `session` from the bytes its completed parts cover.
///
/// `current_part` is the part the update refers to.
pub fn progress_for(session: &UploadSession, plan: &ChunkPlan, current_part: u32) -> UploadProgress {
    let covered = plan.bytes_covered(session.completed_parts().iter().map(|p| p.part_number));
    UploadProgress::new(current_part, plan.total_parts(), covered, plan.file_size())
}

/// Throughput meter over a trailing time window.
///
/// Fed with byte deltas; samples older than the window or beyond the sample
/// cap are dropped.
pub struct SpeedCalculator {
    window: Duration,
    capacity: usize,
    samples: Mutex<Window>,
}

#[derive(Default)]
struct Window {
    entries: VecDeque<(Instant, u64)>,
    /// Bytes of every entry except the oldest.
    bytes_after_first: u64,
}

impl Window {
    fn push(&mut self, at: Instant, bytes: u64) {
        if !self.entries.is_empty() {
            self.bytes_after_first += bytes;
        }
        self.entries.push_back((at, bytes));
    }

    fn pop_oldest(&mut self) {
        self.entries.pop_front();
        if let Some((_, bytes)) = self.entries.front() {
            self.bytes_after_first -= bytes;
        } else {
            self.bytes_after_first = 0;
        }
    }
}

impl SpeedCalculator {
    /// `window` defaults to 10 s and `capacity` to 100 samples.
    pub fn new(window: Option<Duration>, capacity: Option<usize>) -> Self {
        Self {
            window: window.unwrap_or(Duration::from_secs(10)),
            capacity: capacity.unwrap_or(100).max(2),
            samples: Mutex::new(Window::default()),
        }
    }

    /// Records `bytes` transferred since the previous sample.
    pub fn add_sample(&self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&self, bytes: u64, now: Instant) {
        let mut w = self.samples.lock().unwrap();
        w.push(now, bytes);
        while let Some(&(at, _)) = w.entries.front() {
            let expired = now.duration_since(at) > self.window;
            if expired || w.entries.len() > self.capacity {
                w.pop_oldest();
            } else {
                break;
            }
        }
    }

    /// Bytes per second across the window; 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let w = self.samples.lock().unwrap();
        let (Some(&(first, _)), Some(&(last, _))) = (w.entries.front(), w.entries.back()) else {
            return 0.0;
        };
        let elapsed = last.duration_since(first).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        w.bytes_after_first as f64 / elapsed
    }

    /// Time left for `remaining_bytes` at the current rate.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        match self.bytes_per_second() {
            rate if rate > 0.0 => Some(Duration::from_secs_f64(remaining_bytes as f64 / rate)),
            _ => None,
        }
    }

    pub fn reset(&self) {
        *self.samples.lock().unwrap() = Window::default();
    }

    #[cfg(test)]
    fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().entries.len()
    }
}
