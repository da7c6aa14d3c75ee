pub mod alarm;
pub mod auth;
pub mod collector;
pub mod dispatch;
pub mod doctor;
pub mod ent;
pub mod error;
pub mod history;
pub mod known_hosts;
pub mod persist;
pub mod session;
pub mod tracker;
pub use alarm::Notifier;
pub use auth::{AuthMethod, AuthResolver};
pub use collector::check_all;
pub use dispatch::{Assignment, DispatchStore, Status};
pub use doctor::HealthChecker;
pub use ent::*;
pub use error::{SessionError, StoreError};
pub use history::HostHistory;
pub use known_hosts::KnownHosts;
pub use session::{Connector, RemoteShell, SshConnector, SshSession};
pub use tracker::{Notify, StateTracker};
