use std::fs;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

/// Answers "is the machine online right now?". Consulted while the
/// scheduler lock is held, so implementations must stay bounded.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Answers "has this user registered a world account?".
pub trait IdentityProbe: Send + Sync {
    fn is_registered(&self) -> bool;
}

/// Connectivity by a single bounded TCP connect against a well-known
/// endpoint. No payload is exchanged; a completed handshake is enough.
#[derive(Clone, Debug)]
pub struct TcpConnectivityProbe {
    addr: String,
    timeout: Duration,
}

impl TcpConnectivityProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

impl ConnectivityProbe for TcpConnectivityProbe {
    fn is_online(&self) -> bool {
        let Ok(mut addrs) = self.addr.to_socket_addrs() else {
            debug!(addr = %self.addr, "connectivity probe address did not resolve");
            return false;
        };
        let Some(addr) = addrs.next() else {
            return false;
        };
        match TcpStream::connect_timeout(&addr, self.timeout) {
            Ok(_) => true,
            Err(err) => {
                debug!(addr = %self.addr, error = %err, "connectivity probe failed");
                false
            }
        }
    }
}

/// Registration status from the profile service's JSON file: registered
/// means a non-empty `world_id` string. Any read or parse failure counts
/// as unregistered.
#[derive(Clone, Debug)]
pub struct ProfileIdentityProbe {
    profile_path: PathBuf,
}

impl ProfileIdentityProbe {
    pub fn new(profile_path: impl Into<PathBuf>) -> Self {
        Self {
            profile_path: profile_path.into(),
        }
    }
}

impl IdentityProbe for ProfileIdentityProbe {
    fn is_registered(&self) -> bool {
        let raw = match fs::read_to_string(&self.profile_path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(
                    path = %self.profile_path.display(),
                    error = %err,
                    "profile not readable; treating user as unregistered"
                );
                return false;
            }
        };
        let Ok(root) = serde_json::from_str::<Value>(&raw) else {
            return false;
        };
        root.get("world_id")
            .and_then(Value::as_str)
            .is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::{IdentityProbe, ProfileIdentityProbe};

    fn probe_for(body: Option<&str>) -> (tempfile::TempDir, ProfileIdentityProbe) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        if let Some(body) = body {
            std::fs::write(&path, body).unwrap();
        }
        (dir, ProfileIdentityProbe::new(path))
    }

    #[test]
    fn registered_when_world_id_present() {
        let (_dir, probe) = probe_for(Some(r#"{"world_id": "abc123", "level": 4}"#));
        assert!(probe.is_registered());
    }

    #[test]
    fn unregistered_when_world_id_empty_or_absent() {
        let (_dir, probe) = probe_for(Some(r#"{"world_id": ""}"#));
        assert!(!probe.is_registered());

        let (_dir, probe) = probe_for(Some(r#"{"level": 4}"#));
        assert!(!probe.is_registered());
    }

    #[test]
    fn unregistered_when_profile_missing_or_malformed() {
        let (_dir, probe) = probe_for(None);
        assert!(!probe.is_registered());

        let (_dir, probe) = probe_for(Some("]["));
        assert!(!probe.is_registered());
    }
}
