use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::broadcast::DEFAULT_QUEUE_CAPACITY;
use crate::pipeline::PipelineSettings;
use crate::track::TrackerConfig;
use crate::worker::WorkerSettings;
use crate::SourceId;

const DEFAULT_DB_PATH: &str = "sentinel.db";
const DEFAULT_ALERT_ADDR: &str = "127.0.0.1:8765";
const DEFAULT_SOURCE_ID: &str = "camera-1";
const DEFAULT_SOURCE_URL: &str = "stub://nursery";
const DEFAULT_LOOP_INTERVAL_MS: u64 = 100;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 200;
const DEFAULT_COOLDOWN_SECS: f64 = 5.0;
const DEFAULT_NO_FACE_DANGER_SECS: f64 = 10.0;
const DEFAULT_FALL_MARGIN: f32 = 0.05;

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    db_path: Option<String>,
    alerts: Option<AlertsConfigFile>,
    worker: Option<WorkerConfigFile>,
    tracker: Option<TrackerConfig>,
    sources: Option<Vec<SourceConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsConfigFile {
    addr: Option<String>,
    queue_capacity: Option<usize>,
    cooldown_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkerConfigFile {
    loop_interval_ms: Option<u64>,
    frame_interval_ms: Option<u64>,
    no_face_danger_secs: Option<f64>,
    fall_margin: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct SourceConfigFile {
    id: String,
    url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub id: SourceId,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub db_path: String,
    pub alert_addr: String,
    pub queue_capacity: usize,
    pub cooldown: Duration,
    pub loop_interval: Duration,
    /// Minimum spacing between frames produced by synthetic sources.
    pub frame_interval: Duration,
    pub no_face_danger_after: Duration,
    pub fall_margin: f32,
    pub tracker: TrackerConfig,
    pub sources: Vec<SourceSettings>,
}

impl SentinelConfig {
    /// Read `SENTINEL_CONFIG` (JSON, or TOML for `*.toml`), then apply
    /// `SENTINEL_*` overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Result<Self> {
        let alerts = file.alerts.unwrap_or_default();
        let worker = file.worker.unwrap_or_default();
        let sources = match file.sources {
            Some(sources) => sources
                .into_iter()
                .map(|s| SourceSettings {
                    id: SourceId::from(s.id),
                    url: s.url,
                })
                .collect(),
            None => vec![SourceSettings {
                id: SourceId::from(DEFAULT_SOURCE_ID),
                url: DEFAULT_SOURCE_URL.to_string(),
            }],
        };

        Ok(Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            alert_addr: alerts
                .addr
                .unwrap_or_else(|| DEFAULT_ALERT_ADDR.to_string()),
            queue_capacity: alerts.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            cooldown: secs(alerts.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS), "cooldown_secs")?,
            loop_interval: Duration::from_millis(
                worker.loop_interval_ms.unwrap_or(DEFAULT_LOOP_INTERVAL_MS),
            ),
            frame_interval: Duration::from_millis(
                worker.frame_interval_ms.unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
            no_face_danger_after: secs(
                worker
                    .no_face_danger_secs
                    .unwrap_or(DEFAULT_NO_FACE_DANGER_SECS),
                "no_face_danger_secs",
            )?,
            fall_margin: worker.fall_margin.unwrap_or(DEFAULT_FALL_MARGIN),
            tracker: file.tracker.unwrap_or_default(),
            sources,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTINEL_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(addr) = std::env::var("SENTINEL_ALERT_ADDR") {
            if !addr.trim().is_empty() {
                self.alert_addr = addr;
            }
        }
        if let Ok(sources) = std::env::var("SENTINEL_SOURCES") {
            let parsed = split_csv(&sources)
                .iter()
                .map(|entry| parse_source(entry))
                .collect::<Result<Vec<_>>>()?;
            if !parsed.is_empty() {
                self.sources = parsed;
            }
        }
        if let Ok(cooldown) = std::env::var("SENTINEL_COOLDOWN_SECS") {
            let seconds: f64 = cooldown
                .trim()
                .parse()
                .map_err(|_| anyhow!("SENTINEL_COOLDOWN_SECS must be a number of seconds"))?;
            self.cooldown = secs(seconds, "SENTINEL_COOLDOWN_SECS")?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        self.alert_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("invalid alert address '{}': {}", self.alert_addr, e))?;
        if self.queue_capacity == 0 {
            return Err(anyhow!("alert queue capacity must be greater than zero"));
        }
        if self.loop_interval.is_zero() {
            return Err(anyhow!("loop_interval_ms must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.tracker.iou_threshold) {
            return Err(anyhow!("tracker iou_threshold must be within [0, 1]"));
        }
        if self.tracker.max_age == 0 {
            return Err(anyhow!("tracker max_age must be greater than zero"));
        }
        if !(0.0..1.0).contains(&self.fall_margin) {
            return Err(anyhow!("fall_margin must be within [0, 1)"));
        }

        let mut seen = BTreeSet::new();
        for source in &self.sources {
            if source.id.as_str().trim().is_empty() {
                return Err(anyhow!("source id must not be empty"));
            }
            if source.url.trim().is_empty() {
                return Err(anyhow!("source {} has an empty url", source.id));
            }
            if !seen.insert(source.id.clone()) {
                return Err(anyhow!("duplicate source id '{}'", source.id));
            }
        }
        Ok(())
    }

    /// Replace the configured sources (command-line `--source` flags).
    pub fn override_sources(&mut self, entries: &[String]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.sources = entries
            .iter()
            .map(|entry| parse_source(entry))
            .collect::<Result<Vec<_>>>()?;
        self.validate()
    }

    /// Replace the database path (command-line `--db-path`).
    pub fn override_db_path(&mut self, db_path: Option<String>) -> Result<()> {
        match db_path {
            Some(path) => {
                self.db_path = path;
                self.validate()
            }
            None => Ok(()),
        }
    }

    pub fn source_urls(&self) -> BTreeMap<SourceId, String> {
        self.sources
            .iter()
            .map(|s| (s.id.clone(), s.url.clone()))
            .collect()
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            tracker: self.tracker.clone(),
            cooldown: self.cooldown,
            no_face_danger_after: self.no_face_danger_after,
            fall_margin: self.fall_margin,
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            pipeline: self.pipeline_settings(),
            loop_interval: self.loop_interval,
        }
    }
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_source(entry: &str) -> Result<SourceSettings> {
    let (id, url) = entry
        .split_once('=')
        .ok_or_else(|| anyhow!("source '{}' must be written as id=url", entry))?;
    let (id, url) = (id.trim(), url.trim());
    if id.is_empty() || url.is_empty() {
        return Err(anyhow!("source '{}' must be written as id=url", entry));
    }
    Ok(SourceSettings {
        id: SourceId::from(id),
        url: url.to_string(),
    })
}

fn secs(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| anyhow!("{} must be a non-negative number", name))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
