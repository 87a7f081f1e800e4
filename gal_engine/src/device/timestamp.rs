/// GPU timestamp bookkeeping
///
/// Timestamps are allocated per frame and kept in a ring of
/// `timestamp_history` frames. A frame's ticks are read back from the backend
/// once the GPU completed it; after `timestamp_history` further frames its
/// entry is overwritten and every handle pointing at it becomes invalid.

use std::time::Duration;
use crate::handle::TimestampHandle;

/// Outcome of a timestamp lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampResult {
    /// GPU clock at the time the timestamp was written
    Ready(Duration),
    /// The frame has not completed on the GPU yet
    Pending,
    /// Too old, from the future, never written, or not a handle of this device
    Invalid,
}

impl TimestampResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, TimestampResult::Ready(_))
    }

    /// GPU time elapsed between two ready timestamps
    pub fn elapsed(start: TimestampResult, end: TimestampResult) -> Option<Duration> {
        match (start, end) {
            (TimestampResult::Ready(a), TimestampResult::Ready(b)) => Some(b.saturating_sub(a)),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct FrameTimestamps {
    frame: u64,
    count: u32,
    ticks: Option<Vec<Option<u64>>>,
}

/// Ring of per-frame timestamp slots
#[derive(Debug)]
pub(crate) struct TimestampPool {
    max_per_frame: u32,
    frames: Vec<Option<FrameTimestamps>>,
}

impl TimestampPool {
    pub(crate) fn new(history: u32, max_per_frame: u32) -> Self {
        Self {
            max_per_frame,
            frames: (0..history.max(1)).map(|_| None).collect(),
        }
    }

    fn index(&self, frame: u64) -> usize {
        (frame % self.frames.len() as u64) as usize
    }

    fn entry(&self, frame: u64) -> Option<&FrameTimestamps> {
        self.frames[self.index(frame)].as_ref().filter(|e| e.frame == frame)
    }

    /// Start a frame, discarding the frame that used its slot `history` frames ago
    pub(crate) fn begin_frame(&mut self, frame: u64) {
        let index = self.index(frame);
        self.frames[index] = Some(FrameTimestamps { frame, count: 0, ticks: None });
    }

    /// Reserve the next slot of `frame`
    pub(crate) fn allocate(&mut self, frame: u64) -> Option<u32> {
        let max = self.max_per_frame;
        let index = self.index(frame);
        let entry = self.frames[index].as_mut().filter(|e| e.frame == frame)?;
        if entry.count >= max {
            return None;
        }
        entry.count += 1;
        Some(entry.count - 1)
    }

    /// Number of slots allocated in `frame`
    pub(crate) fn count(&self, frame: u64) -> u32 {
        self.entry(frame).map_or(0, |e| e.count)
    }

    /// Frames up to `completed` whose ticks still have to be read back
    pub(crate) fn unresolved(&self, completed: u64) -> Vec<(u64, u32)> {
        let mut frames: Vec<(u64, u32)> = self
            .frames
            .iter()
            .flatten()
            .filter(|e| e.frame <= completed && e.count > 0 && e.ticks.is_none())
            .map(|e| (e.frame, e.count))
            .collect();
        frames.sort_unstable();
        frames
    }

    /// Store the ticks read back for `frame`
    pub(crate) fn resolve(&mut self, frame: u64, ticks: Vec<Option<u64>>) {
        let index = self.index(frame);
        if let Some(entry) = self.frames[index].as_mut().filter(|e| e.frame == frame) {
            entry.ticks = Some(ticks);
        }
    }

    /// Look a handle up
    ///
    /// # Arguments
    ///
    /// * `handle` - Timestamp to resolve
    /// * `completed` - Last frame the GPU finished
    /// * `period_ns` - Nanoseconds per tick
    pub(crate) fn lookup(&self, handle: TimestampHandle, completed: Option<u64>, period_ns: f64) -> TimestampResult {
        let entry = match self.entry(handle.frame) {
            Some(entry) => entry,
            None => return TimestampResult::Invalid,
        };
        if handle.slot >= entry.count {
            return TimestampResult::Invalid;
        }
        if completed.map_or(true, |done| done < handle.frame) {
            return TimestampResult::Pending;
        }
        match &entry.ticks {
            None => TimestampResult::Pending,
            Some(ticks) => match ticks.get(handle.slot as usize).copied().flatten() {
                Some(tick) => TimestampResult::Ready(Duration::from_nanos((tick as f64 * period_ns) as u64)),
                None => TimestampResult::Invalid,
            },
        }
    }
}

#[cfg(test)]
#[path = "timestamp_tests.rs"]
mod tests;
