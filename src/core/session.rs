use super::auth::{AuthMethod, AuthResolver};
use super::error::SessionError;
use super::known_hosts::KnownHosts;
use crate::config::HostConfig;
use ssh2::{ExtendedData, HashType, Session};
use std::ffi::OsStr;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// An open, authenticated shell on a remote host. Dropping it closes the
/// connection.
pub trait RemoteShell {
    /// Runs `command` and returns its combined stdout and stderr. A non-zero
    /// exit status is an error.
    fn exec(&mut self, command: &str) -> Result<String, SessionError>;
}

/// Opens sessions. Implementations block; callers run them off the async
/// executor.
pub trait Connector: Send + Sync {
    type Shell: RemoteShell;

    fn connect(&self, hc: &HostConfig) -> Result<Self::Shell, SessionError>;
}

pub struct SshConnector {
    resolver: AuthResolver,
    command_timeout: Duration,
    known_hosts: Option<Arc<KnownHosts>>,
}

impl SshConnector {
    pub fn new(resolver: AuthResolver, command_timeout: Duration) -> SshConnector {
        SshConnector {
            resolver,
            command_timeout,
            known_hosts: None,
        }
    }

    /// Pins host keys on first contact instead of accepting any key.
    pub fn with_known_hosts(mut self, known_hosts: Arc<KnownHosts>) -> SshConnector {
        self.known_hosts = Some(known_hosts);
        self
    }

    fn verify_host_key(&self, session: &Session, addr: &str) -> Result<(), SessionError> {
        let Some(known_hosts) = self.known_hosts.as_ref() else {
            debug!("{}: accepting host key without verification", addr);
            return Ok(());
        };
        let hash = session
            .host_key_hash(HashType::Sha256)
            .ok_or_else(|| SessionError::Handshake("no host key presented".to_string()))?;
        known_hosts.verify(addr, &format!("SHA256:{}", hex::encode(hash)))
    }
}

impl Connector for SshConnector {
    type Shell = SshSession;

    fn connect(&self, hc: &HostConfig) -> Result<SshSession, SessionError> {
        let methods = self.resolver.resolve(hc)?;
        let addr = hc.addr();
        let tcp = dial(&addr)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_ms(DIAL_TIMEOUT));
        session
            .handshake()
            .map_err(|e| SessionError::Handshake(e.message().to_string()))?;
        // From here on the session is released by SshSession's Drop.
        let shell = SshSession { session };

        self.verify_host_key(&shell.session, &addr)?;
        authenticate(&shell.session, &hc.user, &methods)?;
        shell.session.set_timeout(timeout_ms(self.command_timeout));
        debug!("{}: session open", hc.name);
        Ok(shell)
    }
}

/// libssh2 takes milliseconds as a `u32`; longer durations saturate.
fn timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn dial(addr: &str) -> Result<TcpStream, SessionError> {
    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| SessionError::Dial(format!("{}: {}", addr, e)))?;
    dial_within(addr, candidates, DIAL_TIMEOUT)
}

/// Tries each address in turn. `budget` bounds the whole attempt, not each
/// address.
fn dial_within(
    addr: &str,
    candidates: impl IntoIterator<Item = SocketAddr>,
    budget: Duration,
) -> Result<TcpStream, SessionError> {
    let deadline = Instant::now() + budget;
    let mut last_err = format!("{}: no addresses", addr);
    for sock_addr in candidates {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            last_err = format!("{}: timed out after {:?}", addr, budget);
            break;
        }
        match TcpStream::connect_timeout(&sock_addr, remaining) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => last_err = format!("tcp {}: {}", sock_addr, e),
        }
    }
    Err(SessionError::Dial(last_err))
}

/// libssh2 always talks to the agent named by `SSH_AUTH_SOCK`, so an agent
/// found anywhere else cannot be used.
fn agent_in_use(sock: &Path, env_sock: Option<&OsStr>) -> bool {
    env_sock.is_some_and(|env| Path::new(env) == sock)
}

/// Tries each method in order until the server accepts one.
fn authenticate(session: &Session, user: &str, methods: &[AuthMethod]) -> Result<(), SessionError> {
    for method in methods {
        let attempt = match method {
            AuthMethod::Agent(sock) => {
                if !agent_in_use(sock, std::env::var_os("SSH_AUTH_SOCK").as_deref()) {
                    debug!("agent {} is not SSH_AUTH_SOCK, skipping", sock.display());
                    continue;
                }
                session.userauth_agent(user)
            }
            AuthMethod::Key(path) => session.userauth_pubkey_file(user, None, path, None),
            AuthMethod::Password(password) => session.userauth_password(user, password),
        };
        match attempt {
            Ok(()) if session.authenticated() => return Ok(()),
            Ok(()) => debug!("{} auth incomplete for {}", method.kind(), user),
            Err(e) => debug!("{} auth rejected for {}: {}", method.kind(), user, e),
        }
    }
    Err(SessionError::Auth {
        user: user.to_string(),
    })
}

pub struct SshSession {
    session: Session,
}

impl RemoteShell for SshSession {
    fn exec(&mut self, command: &str) -> Result<String, SessionError> {
        let mut channel = self.session.channel_session()?;
        channel.handle_extended_data(ExtendedData::Merge)?;
        channel.exec(command)?;
        let mut out = String::new();
        channel.read_to_string(&mut out)?;
        channel.wait_close()?;
        match channel.exit_status()? {
            0 => Ok(out),
            status => Err(SessionError::Command(status)),
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        let _ = self.session.disconnect(None, "check complete", None);
    }
}
