//! Configuration for the scheduler daemon.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::catalog::{Catalog, ContainerType};
use crate::scheduler::SchedulerConfig;

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Memory capacity in MB of each node to register at startup.
    pub nodes: Vec<u64>,

    /// Container types and their footprints.
    pub catalog: Catalog,

    /// Waiting-queue poll interval.
    pub scan_interval: Duration,

    /// Simulated execution time of each task.
    pub task_duration: Duration,

    /// Types the static predictor reports as needed soon.
    pub forecast: Vec<ContainerType>,

    /// Random tasks to submit at startup.
    pub synthetic_tasks: usize,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nodes = match lookup("FCAS_NODES") {
            Some(raw) => parse_nodes(&raw).context("invalid FCAS_NODES")?,
            None => vec![16384; 3],
        };

        let catalog = match lookup("FCAS_CATALOG") {
            Some(raw) => parse_catalog(&raw).context("invalid FCAS_CATALOG")?,
            None => Catalog::default(),
        };

        let scan_interval_ms = parse_or("FCAS_SCAN_INTERVAL_MS", &lookup, 500)?;
        let task_duration_ms = parse_or("FCAS_TASK_DURATION_MS", &lookup, 200)?;
        let synthetic_tasks = parse_or("FCAS_SYNTHETIC_TASKS", &lookup, 0)?;

        let forecast = match lookup("FCAS_FORECAST") {
            Some(raw) => split_list(&raw)
                .map(|s| s.parse().map(ContainerType::new))
                .collect::<Result<Vec<_>, _>>()
                .context("invalid FCAS_FORECAST")?,
            None => Vec::new(),
        };

        let log_level = lookup("FCAS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        if scan_interval_ms == 0 {
            bail!("FCAS_SCAN_INTERVAL_MS must be positive");
        }

        Ok(Self {
            nodes,
            catalog,
            scan_interval: Duration::from_millis(scan_interval_ms),
            task_duration: Duration::from_millis(task_duration_ms),
            forecast,
            synthetic_tasks,
            log_level,
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            scan_interval: self.scan_interval,
        }
    }
}

fn parse_or<T>(key: &str, lookup: impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_nodes(raw: &str) -> Result<Vec<u64>> {
    let nodes = split_list(raw)
        .map(|s| s.parse::<u64>().with_context(|| format!("bad capacity {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    if nodes.is_empty() {
        bail!("no nodes given");
    }
    Ok(nodes)
}

/// `type=footprint` pairs, e.g. `0=1024,1=2048`.
fn parse_catalog(raw: &str) -> Result<Catalog> {
    let entries = split_list(raw)
        .map(|pair| {
            let (ty, footprint) = pair
                .split_once('=')
                .with_context(|| format!("expected type=footprint, got {pair:?}"))?;
            let ty = ty.trim().parse::<u64>().with_context(|| format!("bad type {ty:?}"))?;
            let footprint = footprint
                .trim()
                .parse::<u64>()
                .with_context(|| format!("bad footprint {footprint:?}"))?;
            Ok((ContainerType::new(ty), footprint))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Catalog::new(entries)?)
}
