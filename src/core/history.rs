use std::collections::VecDeque;

pub const DEFAULT_HISTORY: usize = 60;

/// Rolling window of a host's recent online flags, newest last.
#[derive(Debug, Clone)]
pub struct HostHistory {
    checks: VecDeque<bool>,
    max: usize,
}

impl Default for HostHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl HostHistory {
    pub fn new(max: usize) -> HostHistory {
        HostHistory {
            checks: VecDeque::with_capacity(max),
            max: max.max(1),
        }
    }

    pub fn add(&mut self, online: bool) {
        self.checks.push_back(online);
        while self.checks.len() > self.max {
            self.checks.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Share of recorded checks that were online, 0 when nothing is recorded.
    pub fn uptime_percent(&self) -> f64 {
        if self.checks.is_empty() {
            return 0.0;
        }
        let up = self.checks.iter().filter(|c| **c).count();
        up as f64 / self.checks.len() as f64 * 100.0
    }

    /// `█` per online check, `░` per offline one.
    pub fn sparkline(&self) -> String {
        self.checks
            .iter()
            .map(|up| if *up { '█' } else { '░' })
            .collect()
    }
}
