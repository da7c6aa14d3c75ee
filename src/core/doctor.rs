use super::ent::HostStatus;
use super::session::{Connector, RemoteShell};
use crate::config::HostConfig;
use chrono::Utc;
use tracing::debug;

pub const LOAD_CMD: &str = "cat /proc/loadavg 2>/dev/null || sysctl -n vm.loadavg 2>/dev/null";
/// Linux `free`, else macOS paging statistics against total physical memory.
pub const MEMORY_CMD: &str = r#"free -h 2>/dev/null | awk '/^Mem:/{print $3"/"$2}' | grep . || echo $(( $(vm_stat 2>/dev/null | awk '/Pages active|Pages wired/{gsub(/\./,"",$NF);s+=$NF}END{print s}') * 4096 / 1048576 ))Mi/$(( $(sysctl -n hw.memsize 2>/dev/null) / 1048576 ))Mi"#;
pub const DISK_CMD: &str = "df -h / 2>/dev/null | awk 'NR==2{print $5}'";
pub const UPTIME_CMD: &str = "uptime -p 2>/dev/null || uptime | sed 's/.*up //' | sed 's/,.*//'";

/// Decides whether a host is up by opening a session to it, then collects
/// whatever diagnostics the remote OS can provide.
///
/// Health is binary: a session opened or it didn't. Metrics are best effort
/// and a failed metric never marks the host offline.
pub struct HealthChecker<C> {
    connector: C,
}

impl<C: Connector> HealthChecker<C> {
    pub fn new(connector: C) -> HealthChecker<C> {
        HealthChecker { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn check(&self, hc: &HostConfig) -> HostStatus {
        let started = Utc::now();
        let mut shell = match self.connector.connect(hc) {
            Ok(shell) => shell,
            Err(e) => {
                debug!("{} offline: {}", hc.name, e);
                return HostStatus::offline(hc.clone(), started, e.to_string());
            }
        };

        let cpu = probe(&mut shell, hc, LOAD_CMD, parse_load);
        let memory = probe(&mut shell, hc, MEMORY_CMD, parse_memory);
        let disk = probe(&mut shell, hc, DISK_CMD, parse_disk);
        let uptime = probe(&mut shell, hc, UPTIME_CMD, parse_uptime);
        drop(shell);

        HostStatus {
            config: hc.clone(),
            online: true,
            cpu,
            memory,
            disk,
            uptime,
            last_check: started,
            error: None,
        }
    }
}

fn probe<S: RemoteShell>(
    shell: &mut S,
    hc: &HostConfig,
    command: &str,
    parse: fn(&str) -> Option<String>,
) -> Option<String> {
    match shell.exec(command) {
        Ok(out) => parse(&out),
        Err(e) => {
            debug!("{}: `{}` failed: {}", hc.name, command, e);
            None
        }
    }
}

fn non_empty(out: &str) -> Option<String> {
    let trimmed = out.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// First three load averages. BSD `sysctl` wraps them in braces.
pub fn parse_load(out: &str) -> Option<String> {
    let parts: Vec<&str> = out
        .trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .split_whitespace()
        .collect();
    (parts.len() >= 3).then(|| parts[..3].join(" "))
}

pub fn parse_memory(out: &str) -> Option<String> {
    non_empty(out).filter(|m| !m.contains("error"))
}

pub fn parse_disk(out: &str) -> Option<String> {
    non_empty(out)
}

/// Drops the trailing load-average clause some `uptime` builds still print.
pub fn parse_uptime(out: &str) -> Option<String> {
    let up = non_empty(out)?;
    if up.contains("load") {
        return up.split(',').next().and_then(non_empty);
    }
    Some(up)
}
