use super::error::{SessionError, StoreError};
use super::persist::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::info;

#[derive(Serialize, Deserialize, Default)]
struct Fingerprints {
    hosts: BTreeMap<String, String>,
}

/// Trust-on-first-use record of host key fingerprints, keyed by `host:port`.
pub struct KnownHosts {
    path: PathBuf,
    inner: RwLock<Fingerprints>,
}

impl KnownHosts {
    pub fn load(path: &Path) -> Result<KnownHosts, StoreError> {
        let inner = match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data).map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Fingerprints::default(),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(KnownHosts {
            path: path.to_path_buf(),
            inner: RwLock::new(inner),
        })
    }

    pub fn get(&self, addr: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.hosts.get(addr).cloned()
    }

    /// Accepts `fingerprint` if it matches the pinned one, pins it if `addr`
    /// has never been seen, rejects it otherwise.
    pub fn verify(&self, addr: &str, fingerprint: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match inner.hosts.get(addr) {
            Some(expected) if expected == fingerprint => Ok(()),
            Some(expected) => Err(SessionError::HostKeyMismatch {
                addr: addr.to_string(),
                expected: expected.clone(),
                actual: fingerprint.to_string(),
            }),
            None => {
                // memory only takes the pin once it is on disk
                let mut pinned = Fingerprints {
                    hosts: inner.hosts.clone(),
                };
                pinned.hosts.insert(addr.to_string(), fingerprint.to_string());
                let data = serde_json::to_vec_pretty(&pinned).map_err(StoreError::from)?;
                write_atomic(&self.path, &data)?;
                *inner = pinned;
                info!("pinned host key {} for {}", fingerprint, addr);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_contact_pins_then_mismatch_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts.json");
        let kh = KnownHosts::load(&path).unwrap();
        kh.verify("10.0.0.5:22", "SHA256:aa").unwrap();
        kh.verify("10.0.0.5:22", "SHA256:aa").unwrap();
        let err = kh.verify("10.0.0.5:22", "SHA256:bb").unwrap_err();
        assert!(matches!(err, SessionError::HostKeyMismatch { .. }));
        assert!(err.to_string().contains("expected SHA256:aa"));

        let reloaded = KnownHosts::load(&path).unwrap();
        assert_eq!(reloaded.get("10.0.0.5:22").as_deref(), Some("SHA256:aa"));
        assert_eq!(reloaded.get("10.0.0.6:22"), None);
    }

    #[test]
    fn failed_save_does_not_pin() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        let kh = KnownHosts::load(&blocker.join("known_hosts.json")).unwrap();
        std::fs::write(&blocker, "not a directory").unwrap();

        assert!(kh.verify("10.0.0.5:22", "SHA256:aa").is_err());
        assert!(kh.verify("10.0.0.5:22", "SHA256:aa").is_err());
        assert_eq!(kh.get("10.0.0.5:22"), None);

        std::fs::remove_file(&blocker).unwrap();
        kh.verify("10.0.0.5:22", "SHA256:aa").unwrap();
        let reloaded = KnownHosts::load(&blocker.join("known_hosts.json")).unwrap();
        assert_eq!(reloaded.get("10.0.0.5:22").as_deref(), Some("SHA256:aa"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(KnownHosts::load(&path), Err(StoreError::Parse { .. })));
    }
}
