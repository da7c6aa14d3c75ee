//! Pulse host monitor.
//!
//! Run with
//!
//! ```not_rust
//! pulse --init            # write a sample config
//! pulse --once            # check every host once
//! pulse --watch --json    # check every `interval` seconds, JSON output
//! ```

use clap::Parser;
use pulse::config::{self, Config, HostKeyPolicy};
use pulse::core::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pulse", about = "Checks hosts over SSH and reports up/down transitions")]
struct Args {
    /// config file path
    #[arg(long, default_value_os_t = config::default_config_path())]
    config: PathBuf,
    /// check once and exit (wins over --watch)
    #[arg(long)]
    once: bool,
    /// check repeatedly (default)
    #[arg(long)]
    watch: bool,
    /// output as JSON
    #[arg(long)]
    json: bool,
    /// create sample config file
    #[arg(long)]
    init: bool,
}

impl Args {
    fn single_pass(&self) -> bool {
        self.once
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if args.init {
        return match config::write_default_config(&args.config) {
            Ok(()) => {
                println!("Created sample config at {}", args.config.display());
                println!("Edit it with your hosts, then run: pulse");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let cfg = match config::load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            if e.is_missing() {
                eprintln!("Run 'pulse --init' to create a sample config.");
            }
            return ExitCode::FAILURE;
        }
    };
    if cfg.hosts.is_empty() {
        eprintln!("No hosts configured. Edit your config file.");
        return ExitCode::FAILURE;
    }

    match run(cfg, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config, args: &Args) -> Result<(), StoreError> {
    let mut connector = SshConnector::new(
        AuthResolver::from_env(),
        Duration::from_secs(cfg.command_timeout),
    );
    if cfg.host_key_policy == HostKeyPolicy::Tofu {
        let known_hosts = KnownHosts::load(&cfg.known_hosts_path())?;
        connector = connector.with_known_hosts(Arc::new(known_hosts));
    }
    let checker = Arc::new(HealthChecker::new(connector));
    let store = match DispatchStore::load(cfg.dispatch_path()) {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("dispatch store unavailable: {}", e);
            None
        }
    };

    let mut tracker = StateTracker::new(Arc::new(Notifier::new(cfg.notify.clone())));
    let mut history: HashMap<String, HostHistory> = HashMap::new();
    loop {
        let results = check_all(checker.clone(), &cfg.hosts, cfg.max_concurrency).await;
        let transitions = tracker.update(&results);
        for r in &results {
            history.entry(r.config.name.clone()).or_default().add(r.online);
        }

        if args.json {
            print_json(&results, &history);
        } else {
            print_table(&results, store.as_ref());
        }
        for t in &transitions {
            eprintln!("⚠ {}", t);
        }

        if args.single_pass() {
            // let spawned notifications go out before the runtime shuts down
            if !transitions.is_empty() {
                time::sleep(Duration::from_secs(1)).await;
            }
            return Ok(());
        }
        time::sleep(Duration::from_secs(cfg.interval)).await;
    }
}

fn print_table(results: &[HostStatus], store: Option<&DispatchStore>) {
    for r in results {
        let (state, detail) = if r.online {
            let parts: Vec<String> = [
                ("load", &r.cpu),
                ("mem", &r.memory),
                ("disk", &r.disk),
                ("up", &r.uptime),
            ]
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| format!("{}:{}", k, v)))
            .collect();
            ("UP", parts.join(" | "))
        } else {
            ("DOWN", r.error.clone().unwrap_or_default())
        };
        println!("{:<5} {:<20} {}", state, r.config.label, detail);
        if let Some(store) = store {
            for a in store.for_target(&r.config.label) {
                println!("      ↳ {} [{}] {}", a.issue_key, a.status, a.summary);
            }
        }
    }
}

#[derive(Serialize)]
struct JsonResult<'a> {
    name: &'a str,
    host: &'a str,
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uptime: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sparkline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uptime_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    check_count: Option<usize>,
}

fn print_json(results: &[HostStatus], history: &HashMap<String, HostHistory>) {
    let out: Vec<JsonResult> = results
        .iter()
        .map(|r| {
            let h = history.get(&r.config.name).filter(|h| !h.is_empty());
            JsonResult {
                name: &r.config.label,
                host: &r.config.host,
                online: r.online,
                cpu: r.cpu.as_deref(),
                memory: r.memory.as_deref(),
                disk: r.disk.as_deref(),
                uptime: r.uptime.as_deref(),
                error: r.error.as_deref(),
                checked_at: r.last_check.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                sparkline: h.map(HostHistory::sparkline),
                uptime_percent: h.map(HostHistory::uptime_percent),
                check_count: h.map(HostHistory::len),
            }
        })
        .collect();
    match serde_json::to_string_pretty(&out) {
        Ok(text) => println!("{}", text),
        Err(e) => tracing::error!("encode results: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_stops_after_one_pass_even_with_watch() {
        assert!(Args::parse_from(["pulse", "--once"]).single_pass());
        assert!(Args::parse_from(["pulse", "--once", "--watch"]).single_pass());
        assert!(!Args::parse_from(["pulse", "--watch"]).single_pass());
        assert!(!Args::parse_from(["pulse"]).single_pass());
    }
}
