use super::ent::{HostState, HostStatus, Transition};
use crate::config::HostConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Receives state transitions. Implementations must not block the caller.
pub trait Notify: Send + Sync {
    fn notify(&self, host: &HostConfig, state: HostState);
}

/// Remembers each host's last online flag and reports flips.
///
/// Owned by a single poll loop; not shared across tasks.
pub struct StateTracker {
    prev: HashMap<String, bool>, // host -> was online
    notifier: Arc<dyn Notify>,
}

impl StateTracker {
    pub fn new(notifier: Arc<dyn Notify>) -> StateTracker {
        StateTracker {
            prev: HashMap::new(),
            notifier,
        }
    }

    /// Compares a batch against the previous one. A host seen for the first
    /// time is recorded silently.
    pub fn update(&mut self, results: &[HostStatus]) -> Vec<Transition> {
        let mut transitions = Vec::new();
        for r in results {
            let key = &r.config.host;
            let was_online = self.prev.insert(key.clone(), r.online);
            let Some(was_online) = was_online else {
                continue;
            };
            if was_online == r.online {
                continue;
            }
            let t = Transition {
                host: r.config.host.clone(),
                label: r.config.label.clone(),
                state: r.state(),
            };
            tracing::info!("{}", t);
            self.notifier.notify(&r.config, t.state);
            transitions.push(t);
        }
        transitions
    }

    pub fn last_seen(&self, host: &str) -> Option<HostState> {
        self.prev.get(host).copied().map(HostState::from)
    }
}
