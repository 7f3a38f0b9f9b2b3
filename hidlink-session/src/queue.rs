//! Capped FIFO of captured input reports
//!
//! The queue keeps the most recent [`MAX_QUEUED_REPORTS`] reports so an idle
//! reader cannot make it grow without bound. It is not synchronized itself;
//! the owning session guards it with its mutex.

use std::collections::VecDeque;

/// Maximum number of input reports buffered per session
pub const MAX_QUEUED_REPORTS: usize = 30;

/// One input report captured by the notification thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    data: Vec<u8>,
}

impl InputReport {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy as much of the report as fits into `buf`, returning the count
    pub fn copy_into(&self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.data.len());
        buf[..len].copy_from_slice(&self.data[..len]);
        len
    }
}

/// Bounded report queue; the oldest entry is evicted on overflow
#[derive(Debug, Default)]
pub struct ReportQueue {
    reports: VecDeque<InputReport>,
    dropped: u64,
}

impl ReportQueue {
    pub fn new() -> Self {
        Self {
            reports: VecDeque::with_capacity(MAX_QUEUED_REPORTS),
            dropped: 0,
        }
    }

    /// Append a report, evicting the oldest one first if the queue is full
    pub fn push(&mut self, report: InputReport) {
        if self.reports.len() >= MAX_QUEUED_REPORTS {
            self.reports.pop_front();
            self.dropped += 1;
        }
        self.reports.push_back(report);
    }

    pub fn pop_front(&mut self) -> Option<InputReport> {
        self.reports.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Number of reports evicted because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Remove and release every queued report, returning how many there were
    pub fn drain(&mut self) -> usize {
        let count = self.reports.len();
        self.reports.clear();
        count
    }
}
