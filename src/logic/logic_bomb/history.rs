//! Execution History
//!
//! Per-executable ring buffer of minute-of-day launch times. When the buffer
//! is full and the spread of samples fits inside the variance threshold, the
//! executable is launching at a consistent time of day - a recurring-trigger
//! signature.

use std::collections::VecDeque;

// ============================================================================
// RING BUFFER
// ============================================================================

/// Fixed-capacity launch-minute history for one executable name
#[derive(Debug)]
pub struct ExecutionHistory {
    samples: VecDeque<u32>,
    capacity: usize,
    variance: u32,
    dedup: bool,
    alerted: bool,
    since_alert: usize,
}

/// Emitted when a consistent execution pattern is detected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternFinding {
    pub spread: u32,
    pub samples: Vec<u32>,
}

impl ExecutionHistory {
    pub fn new(capacity: usize, variance: u32, dedup: bool) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            variance,
            dedup,
            alerted: false,
            since_alert: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    /// Record one launch minute. Returns a finding when the full buffer sits
    /// inside the variance threshold.
    ///
    /// With de-duplication on, a finding latches until the buffer has fully
    /// turned over (capacity new samples); with it off, the finding
    /// re-evaluates on every sample once the buffer is full.
    pub fn push(&mut self, minute: u32) -> Option<PatternFinding> {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(minute);
        if self.alerted {
            self.since_alert += 1;
        }

        if self.samples.len() < self.capacity {
            return None;
        }

        let max = *self.samples.iter().max()?;
        let min = *self.samples.iter().min()?;
        let spread = max - min;
        if spread > self.variance {
            return None;
        }

        if self.dedup && self.alerted && self.since_alert < self.capacity {
            return None;
        }

        self.alerted = true;
        self.since_alert = 0;
        Some(PatternFinding {
            spread,
            samples: self.samples.iter().copied().collect(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(history: &mut ExecutionHistory, minutes: &[u32]) -> Vec<PatternFinding> {
        minutes.iter().filter_map(|&m| history.push(m)).collect()
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut history = ExecutionHistory::new(3, 2, true);
        fill(&mut history, &[10, 20, 30, 40]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.samples, VecDeque::from(vec![20, 30, 40]));
    }

    #[test]
    fn test_no_finding_before_full() {
        let mut history = ExecutionHistory::new(7, 2, true);
        let findings = fill(&mut history, &[100, 100, 100, 100, 100, 100]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_finding_on_fill_within_variance() {
        let mut history = ExecutionHistory::new(7, 2, true);
        let findings = fill(&mut history, &[120, 121, 120, 122, 121, 120, 121]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].spread, 2);
        assert_eq!(findings[0].samples.len(), 7);
    }

    #[test]
    fn test_no_finding_when_spread_exceeds_variance() {
        let mut history = ExecutionHistory::new(7, 2, true);
        let findings = fill(&mut history, &[120, 125, 120, 122, 121, 120, 121]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_dedup_requires_full_turnover() {
        let mut history = ExecutionHistory::new(3, 2, true);
        let findings = fill(&mut history, &[60, 60, 60]);
        assert_eq!(findings.len(), 1);

        // Two more matching samples: still latched
        assert!(history.push(61).is_none());
        assert!(history.push(61).is_none());
        // Third sample completes the turnover
        assert!(history.push(61).is_some());
    }

    #[test]
    fn test_without_dedup_refires_each_sample() {
        let mut history = ExecutionHistory::new(3, 2, false);
        let findings = fill(&mut history, &[60, 60, 60, 61, 61]);
        assert_eq!(findings.len(), 3);
    }
}
