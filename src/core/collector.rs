use super::doctor::HealthChecker;
use super::ent::HostStatus;
use super::session::Connector;
use crate::config::HostConfig;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Checks every host concurrently and returns the results in `hosts` order.
///
/// One worker is started per host. With `limit` set, at most that many
/// checks run at a time; the rest wait their turn. A host can never fail the
/// batch: a worker that dies reports its host as offline.
pub async fn check_all<C>(
    checker: Arc<HealthChecker<C>>,
    hosts: &[HostConfig],
    limit: Option<usize>,
) -> Vec<HostStatus>
where
    C: Connector + 'static,
{
    let permits = limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
    let (tx, mut rx) = mpsc::channel(hosts.len().max(1));

    for (idx, hc) in hosts.iter().cloned().enumerate() {
        let tx = tx.clone();
        let checker = checker.clone();
        let permits = permits.clone();
        tokio::spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            let started = Utc::now();
            let fallback = hc.clone();
            let status = tokio::task::spawn_blocking(move || checker.check(&hc))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("check of {} aborted: {}", fallback.name, e);
                    HostStatus::offline(fallback, started, format!("check aborted: {}", e))
                });
            let _ = tx.send((idx, status)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<HostStatus>> = vec![None; hosts.len()];
    while let Some((idx, status)) = rx.recv().await {
        slots[idx] = Some(status);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SessionError;
    use crate::core::session::RemoteShell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullShell;

    impl RemoteShell for NullShell {
        fn exec(&mut self, _command: &str) -> Result<String, SessionError> {
            Err(SessionError::Command(1))
        }
    }

    /// Sleeps for `port` milliseconds so later hosts can finish first.
    /// `down-*` hosts refuse, `panic-*` hosts panic.
    #[derive(Default)]
    struct SlowConnector {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Connector for SlowConnector {
        type Shell = NullShell;

        fn connect(&self, hc: &HostConfig) -> Result<NullShell, SessionError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(hc.port as u64));
            self.running.fetch_sub(1, Ordering::SeqCst);
            if hc.name.starts_with("down-") {
                return Err(SessionError::Dial("refused".to_string()));
            }
            if hc.name.starts_with("panic-") {
                panic!("connector blew up");
            }
            Ok(NullShell)
        }
    }

    fn hosts(layout: &[(&str, u16)]) -> Vec<HostConfig> {
        layout
            .iter()
            .map(|(name, delay)| {
                let mut hc = HostConfig::new(name, &format!("{}.lan", name), "ops");
                hc.port = *delay;
                hc
            })
            .collect()
    }

    #[tokio::test]
    async fn results_keep_configuration_order() {
        let hs = hosts(&[("a", 80), ("down-b", 5), ("c", 40), ("d", 1), ("down-e", 60)]);
        let checker = Arc::new(HealthChecker::new(SlowConnector::default()));
        let results = check_all(checker, &hs, None).await;

        assert_eq!(results.len(), hs.len());
        let names: Vec<_> = results.iter().map(|r| r.config.name.as_str()).collect();
        assert_eq!(names, vec!["a", "down-b", "c", "d", "down-e"]);
        let online: Vec<_> = results.iter().map(|r| r.online).collect();
        assert_eq!(online, vec![true, false, true, true, false]);
    }

    #[tokio::test]
    async fn empty_host_list() {
        let checker = Arc::new(HealthChecker::new(SlowConnector::default()));
        assert!(check_all(checker, &[], None).await.is_empty());
    }

    #[tokio::test]
    async fn limit_bounds_parallel_checks() {
        let hs = hosts(&[("a", 30), ("b", 30), ("c", 30), ("d", 30), ("e", 30), ("f", 30)]);
        let checker = Arc::new(HealthChecker::new(SlowConnector::default()));
        let results = check_all(checker.clone(), &hs, Some(2)).await;
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.online));
        let names: Vec<_> = results.iter().map(|r| r.config.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e", "f"]);
        assert!(checker.connector().peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_check_reports_offline() {
        let hs = hosts(&[("a", 1), ("panic-b", 1), ("c", 1)]);
        let checker = Arc::new(HealthChecker::new(SlowConnector::default()));
        let results = check_all(checker, &hs, None).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].online && results[2].online);
        assert!(!results[1].online);
        assert!(results[1].error.as_deref().unwrap().starts_with("check aborted"));
    }
}
