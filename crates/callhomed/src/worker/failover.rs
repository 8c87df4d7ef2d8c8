//! Retry/failover schedule for a worker's connect attempts
//!
//! Tracks which server index is being attempted and how many retries it has
//! consumed. The attempt contract is one initial attempt plus up to
//! `max_retries` retries per server; exhausting a server advances to the
//! next index, wrapping past the end, with the retry counter reset and no
//! inter-server wait. The schedule never gives up.

/// What to do after a failed connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverStep {
    /// Retry the same server after the policy's retry interval
    Retry,
    /// Server exhausted; the schedule has advanced — reattempt immediately
    Advance,
}

/// Per-server attempt counting with round-robin failover
#[derive(Debug)]
pub struct FailoverSchedule {
    num_servers: usize,
    max_retries: u32,
    idx: usize,
    retries: u32,
}

impl FailoverSchedule {
    /// Create a schedule starting at `start_idx`.
    ///
    /// `num_servers` must be non-zero (validation rejects empty lists).
    pub fn new(start_idx: usize, num_servers: usize, max_retries: u32) -> Self {
        debug_assert!(num_servers > 0);
        debug_assert!(start_idx < num_servers);
        Self {
            num_servers,
            max_retries,
            idx: start_idx,
            retries: 0,
        }
    }

    /// Index of the server to attempt next
    pub fn current(&self) -> usize {
        self.idx
    }

    /// Record a failed attempt against the current server
    pub fn on_failure(&mut self) -> FailoverStep {
        if self.retries < self.max_retries {
            self.retries += 1;
            FailoverStep::Retry
        } else {
            self.idx = (self.idx + 1) % self.num_servers;
            self.retries = 0;
            FailoverStep::Advance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_attempt_plus_max_retries() {
        // max_retries = 2 means three attempts against the same server
        let mut schedule = FailoverSchedule::new(0, 3, 2);

        assert_eq!(schedule.current(), 0);
        assert_eq!(schedule.on_failure(), FailoverStep::Retry); // attempt 2
        assert_eq!(schedule.current(), 0);
        assert_eq!(schedule.on_failure(), FailoverStep::Retry); // attempt 3
        assert_eq!(schedule.current(), 0);
        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
        assert_eq!(schedule.current(), 1);
    }

    #[test]
    fn test_advance_resets_retry_counter() {
        let mut schedule = FailoverSchedule::new(0, 2, 1);

        assert_eq!(schedule.on_failure(), FailoverStep::Retry);
        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
        assert_eq!(schedule.current(), 1);

        // full retry budget available again on the new server
        assert_eq!(schedule.on_failure(), FailoverStep::Retry);
        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
    }

    #[test]
    fn test_wraps_past_end_of_list() {
        let mut schedule = FailoverSchedule::new(2, 3, 0);

        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
        assert_eq!(schedule.current(), 0);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let mut schedule = FailoverSchedule::new(0, 2, 0);
        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
        assert_eq!(schedule.current(), 1);
    }

    #[test]
    fn test_single_server_wraps_to_itself() {
        let mut schedule = FailoverSchedule::new(0, 1, 1);
        assert_eq!(schedule.on_failure(), FailoverStep::Retry);
        assert_eq!(schedule.on_failure(), FailoverStep::Advance);
        assert_eq!(schedule.current(), 0);
    }
}
