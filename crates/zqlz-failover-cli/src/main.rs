//! zqlz-ha - failover drill tool
//!
//! Opens a failover connection described by a TOML file and keeps running a
//! query against it, so a host can be stopped or promoted while the loop is
//! watched.
//!
//! ```text
//! zqlz-ha --config cluster.toml --query "SELECT @@hostname" --repeat 0
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zqlz_failover::{FailoverConfig, FailoverConnection, MySqlConnector, QueryResult};

#[derive(Parser, Debug)]
#[command(
    name = "zqlz-ha",
    about = "Run a query in a loop over a failover connection"
)]
struct Args {
    /// TOML file with the failover settings
    #[arg(short, long, env = "ZQLZ_HA_CONFIG")]
    config: PathBuf,

    /// Statement to run on every iteration
    #[arg(short, long, default_value = "SELECT 1")]
    query: String,

    /// Number of iterations (0 runs until interrupted)
    #[arg(short, long, default_value_t = 0)]
    repeat: u64,

    /// Pause between iterations in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Print failover events as JSON lines
    #[arg(long, default_value_t = false)]
    events: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zqlz_failover=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn render(result: &QueryResult) -> String {
    match result.first_value() {
        Some(value) => format!("{:?}", value),
        None => format!("{} row(s) affected", result.affected_rows),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let config = FailoverConfig::from_toml_str(&text)
        .with_context(|| format!("parsing {}", args.config.display()))?;

    let conn = FailoverConnection::open(config, Arc::new(MySqlConnector))
        .await
        .context("opening failover connection")?;
    info!(host = %conn.current_host(), "connected");

    if args.events {
        let mut events = conn.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!(error = %e, "unprintable event"),
                    },
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let mut iteration = 0u64;
    loop {
        iteration += 1;
        match conn.query(args.query.clone()).await {
            Ok(result) => println!(
                "#{iteration} {} host={} phase={}",
                render(&result),
                conn.current_host(),
                conn.phase()
            ),
            Err(e) if e.is_terminal() => {
                conn.close().await.ok();
                return Err(e).context("failover gave up");
            }
            Err(e) => println!(
                "#{iteration} error: {} phase={} attempts={}",
                e,
                conn.phase(),
                conn.attempt_count()
            ),
        }

        if args.repeat != 0 && iteration >= args.repeat {
            break;
        }
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    conn.close().await.context("closing connection")?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["zqlz-ha", "--config", "cluster.toml"]).unwrap();

        assert_eq!(args.config, PathBuf::from("cluster.toml"));
        assert_eq!(args.query, "SELECT 1");
        assert_eq!(args.repeat, 0);
        assert_eq!(args.interval_ms, 1000);
        assert!(!args.events);
    }

    #[test]
    fn test_drill_flags() {
        let args = Args::try_parse_from([
            "zqlz-ha",
            "-c",
            "ha.toml",
            "-q",
            "SELECT @@hostname",
            "--repeat",
            "20",
            "--interval-ms",
            "250",
            "--events",
        ])
        .unwrap();

        assert_eq!(args.query, "SELECT @@hostname");
        assert_eq!(args.repeat, 20);
        assert_eq!(args.interval_ms, 250);
        assert!(args.events);
    }

    #[test]
    fn test_rejects_bad_repeat() {
        assert!(
            Args::try_parse_from(["zqlz-ha", "--config", "c.toml", "--repeat", "many"]).is_err()
        );
    }

    #[test]
    fn test_render_affected_rows() {
        assert_eq!(render(&QueryResult::affected(3)), "3 row(s) affected");
    }
}
