//! YAML config loading: env-var expansion, typed parsing, validation, and
//! defaulting (spec.md §6).

mod env_expand;
mod receiver;

pub use receiver::Receiver;

use crate::route::Route;
use serde::Deserialize;
use snafu::Snafu;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::warn;

const DEFAULT_CACHE_SIZE: u32 = 1024;
const DEFAULT_KUBE_QPS: f64 = 5.0;
const DEFAULT_KUBE_BURST: u32 = 10;
const DEFAULT_METRICS_NAME_PREFIX: &str = "kubesee_";
const DEFAULT_MAX_EVENT_AGE_SECONDS: u64 = 5;
const DEFAULT_MAX_QUEUE_SIZE: u32 = 1000;
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("could not read config file {}: {source}", path.display()))]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("could not parse config YAML: {source}"))]
    Yaml { source: serde_yaml::Error },
    #[snafu(display("receiver is missing a `name`"))]
    MissingReceiverName,
    #[snafu(display("receiver `{receiver}` has no sink-type key"))]
    NoSinkKey { receiver: String },
    #[snafu(display("receiver `{receiver}` has more than one sink-type key: {keys:?}"))]
    MultipleSinkKeys { receiver: String, keys: Vec<String> },
    #[snafu(display("receiver `{receiver}` has an unknown sink-type key `{key}`"))]
    UnknownSinkKey { receiver: String, key: String },
    #[snafu(display("duplicate receiver name `{name}`"))]
    DuplicateReceiverName { name: String },
    #[snafu(display("`throttlePeriod` and `maxEventAgeSeconds` cannot both be set"))]
    ThrottleAndMaxAgeBothSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LeaderElectionRaw {
    enabled: bool,
    leader_election_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LeaderElection {
    pub enabled: bool,
    pub leader_election_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigRaw {
    log_level: Option<String>,
    log_format: Option<String>,
    max_event_age_seconds: Option<u64>,
    throttle_period: Option<u64>,
    cluster_name: String,
    namespace: Option<String>,
    kube_qps: Option<f64>,
    kube_burst: Option<u32>,
    metrics_name_prefix: Option<String>,
    omit_lookup: bool,
    cache_size: Option<u32>,
    max_queue_size: Option<u32>,
    drain_timeout_ms: Option<u64>,
    leader_election: LeaderElectionRaw,
    route: Route,
    receivers: Vec<receiver::ReceiverRaw>,
}

impl Default for ConfigRaw {
    fn default() -> Self {
        Self {
            log_level: None,
            log_format: None,
            max_event_age_seconds: None,
            throttle_period: None,
            cluster_name: String::new(),
            namespace: None,
            kube_qps: None,
            kube_burst: None,
            metrics_name_prefix: None,
            omit_lookup: false,
            cache_size: None,
            max_queue_size: None,
            drain_timeout_ms: None,
            leader_election: LeaderElectionRaw::default(),
            route: Route::default(),
            receivers: Vec::new(),
        }
    }
}

/// The fully loaded, validated, defaulted configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub max_event_age_seconds: u64,
    pub cluster_name: String,
    pub namespace: Option<String>,
    pub kube_qps: f64,
    pub kube_burst: u32,
    pub metrics_name_prefix: String,
    pub omit_lookup: bool,
    pub cache_size: u32,
    pub max_queue_size: u32,
    pub drain_timeout_ms: u64,
    pub leader_election: LeaderElection,
    pub route: Route,
    pub receivers: Vec<Receiver>,
}

impl Config {
    /// Loads config from `path`: reads the file, expands `$VAR`/`${VAR}`
    /// references, parses YAML, validates, and applies defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw_text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&raw_text)
    }

    /// Parses already-read config text; split out from [`Config::load`] so
    /// tests can exercise parsing without touching the filesystem.
    pub fn parse(raw_text: &str) -> Result<Self, ConfigError> {
        let expanded = env_expand::expand(raw_text);
        let raw: ConfigRaw = serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Yaml { source })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: ConfigRaw) -> Result<Self, ConfigError> {
        let throttle_period = raw.throttle_period.unwrap_or(0);
        let max_event_age_seconds = raw.max_event_age_seconds.unwrap_or(0);
        if throttle_period != 0 && max_event_age_seconds != 0 {
            return Err(ConfigError::ThrottleAndMaxAgeBothSet);
        }
        let max_event_age_seconds = if throttle_period == 0 && max_event_age_seconds == 0 {
            DEFAULT_MAX_EVENT_AGE_SECONDS
        } else if max_event_age_seconds != 0 {
            max_event_age_seconds
        } else {
            throttle_period
        };

        let mut receivers = Vec::with_capacity(raw.receivers.len());
        let mut seen_names = HashSet::new();
        for receiver_raw in raw.receivers {
            let receiver = receiver::parse(receiver_raw)?;
            if !seen_names.insert(receiver.name.clone()) {
                return Err(ConfigError::DuplicateReceiverName { name: receiver.name });
            }
            receivers.push(receiver);
        }

        let config = Config {
            log_level: raw.log_level,
            log_format: raw.log_format,
            max_event_age_seconds,
            cluster_name: raw.cluster_name,
            namespace: raw.namespace,
            kube_qps: raw.kube_qps.unwrap_or(DEFAULT_KUBE_QPS),
            kube_burst: raw.kube_burst.unwrap_or(DEFAULT_KUBE_BURST),
            metrics_name_prefix: raw
                .metrics_name_prefix
                .unwrap_or_else(|| DEFAULT_METRICS_NAME_PREFIX.to_owned()),
            omit_lookup: raw.omit_lookup,
            cache_size: raw.cache_size.unwrap_or(DEFAULT_CACHE_SIZE),
            max_queue_size: raw.max_queue_size.unwrap_or(DEFAULT_MAX_QUEUE_SIZE),
            drain_timeout_ms: raw.drain_timeout_ms.unwrap_or(DEFAULT_DRAIN_TIMEOUT_MS),
            leader_election: LeaderElection {
                enabled: raw.leader_election.enabled,
                leader_election_id: raw.leader_election.leader_election_id,
            },
            route: raw.route,
            receivers,
        };

        config.warn_on_unknown_receiver_references();
        Ok(config)
    }

    /// Soft invariant (spec.md §3): a `receiver` name referenced by a rule
    /// that doesn't match any configured receiver is not a config error —
    /// routes may be authored before receivers — but it's worth a startup
    /// warning.
    fn warn_on_unknown_receiver_references(&self) {
        let known: BTreeSet<&str> = self.receivers.iter().map(|r| r.name.as_str()).collect();
        for name in referenced_receivers(&self.route) {
            if !known.contains(name.as_str()) {
                warn!(message = "route references a receiver that is not configured", receiver = %name);
            }
        }
    }
}

fn referenced_receivers(route: &Route) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_referenced_receivers(route, &mut out);
    out
}

fn collect_referenced_receivers(route: &Route, out: &mut BTreeSet<String>) {
    for rule in route.drop.iter().chain(route.match_.iter()) {
        if let Some(receiver) = &rule.receiver {
            out.insert(receiver.clone());
        }
    }
    for child in &route.routes {
        collect_referenced_receivers(child, out);
    }
}
