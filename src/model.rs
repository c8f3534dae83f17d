//! Subset of the OTG data model that the run loop interprets.
//!
//! Only the fields needed to compute targets and judge completion are typed.
//! Everything else in a config is kept in `extra` maps so that it can be
//! submitted without losing information. Metrics keep the JSON document as
//! received next to their typed view.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// An OTG traffic configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<Flow>,
    /// Ports, devices, layer1, ... passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single flow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<FlowRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<FlowDuration>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Flow {
    /// Number of packets the flow sends, 0 when no fixed packet count is set.
    pub fn packet_count(&self) -> u64 {
        self.duration
            .as_ref()
            .and_then(|d| d.fixed_packets.as_ref())
            .and_then(|fp| fp.packets)
            .unwrap_or(0)
    }

    /// Transmission rate in packets per second, 0 when unset.
    pub fn rate_pps(&self) -> u64 {
        self.rate.as_ref().and_then(|r| r.pps).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRate {
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub pps: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_packets: Option<FixedPackets>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedPackets {
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub packets: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// Requested transmit state for all configured flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transmit {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmitState {
    pub state: Transmit,
}

impl TransmitState {
    pub fn new(state: Transmit) -> Self {
        Self { state }
    }
}

/// Non-fatal warnings returned by the server on a successful call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseWarning {
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Which kind of metrics a run polls. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsMode {
    /// Per-port counters (frames_tx)
    #[default]
    Port,
    /// Per-flow transmit state
    Flow,
}

impl fmt::Display for MetricsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsMode::Port => write!(f, "port"),
            MetricsMode::Flow => write!(f, "flow"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsRequest {
    pub choice: MetricsMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortMetricsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowMetricsRequest>,
}

impl MetricsRequest {
    /// Request metrics of every port or every flow, depending on `mode`.
    pub fn new(mode: MetricsMode) -> Self {
        match mode {
            MetricsMode::Port => Self {
                choice: mode,
                port: Some(PortMetricsRequest::default()),
                flow: None,
            },
            MetricsMode::Flow => Self {
                choice: mode,
                port: None,
                flow: Some(FlowMetricsRequest::default()),
            },
        }
    }
}

/// Empty selector: metrics of every port.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortMetricsRequest {}

/// Empty selector: metrics of every flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowMetricsRequest {}

/// A metrics response as received, plus the typed view the policy reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub raw: Value,
    pub metrics: MetricsResponse,
}

impl MetricsSnapshot {
    pub fn from_raw(raw: Value) -> Result<Self, serde_json::Error> {
        let metrics = MetricsResponse::deserialize(&raw)?;
        Ok(Self { raw, metrics })
    }
}

/// Typed view of one metrics response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub port_metrics: Vec<PortMetric>,
    #[serde(default)]
    pub flow_metrics: Vec<FlowMetric>,
}

impl MetricsResponse {
    /// Whether this snapshot carries the kind of metrics `mode` asks for.
    /// Servers that omit `choice` are trusted.
    pub fn matches(&self, mode: MetricsMode) -> bool {
        match self.choice.as_deref() {
            None => true,
            Some("port_metrics") => mode == MetricsMode::Port,
            Some("flow_metrics") => mode == MetricsMode::Flow,
            Some(_) => false,
        }
    }

    /// Sum of transmitted frames across all ports.
    pub fn total_frames_tx(&self) -> u64 {
        self.port_metrics
            .iter()
            .fold(0u64, |acc, pm| acc.saturating_add(pm.frames_tx))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PortMetric {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub frames_tx: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowTransmit {
    Started,
    Stopped,
    Paused,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FlowMetric {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub transmit: Option<FlowTransmit>,
}

impl FlowMetric {
    pub fn is_stopped(&self) -> bool {
        self.transmit == Some(FlowTransmit::Stopped)
    }
}

/// A successful server response, dispatched by kind.
#[derive(Debug, Clone, Copy)]
pub enum ApiResponse<'a> {
    Metrics(&'a MetricsSnapshot),
    Warning(&'a ResponseWarning),
}

// ---------------------------------------------------------------------------
// Lenient integers
// ---------------------------------------------------------------------------

// 64-bit integers show up either as JSON numbers or as decimal strings
// depending on the server's encoder. Negative values degrade to zero.
#[derive(Deserialize)]
#[serde(untagged)]
enum Count {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl Count {
    fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            Count::Unsigned(n) => Ok(n),
            Count::Signed(n) => Ok(u64::try_from(n).unwrap_or(0)),
            Count::Text(s) => {
                let s = s.trim();
                if s.starts_with('-') {
                    return s.parse::<i64>().map(|_| 0).map_err(E::custom);
                }
                s.parse::<u64>().map_err(E::custom)
            }
        }
    }
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Count>::deserialize(deserializer)?
        .map(Count::into_u64::<D::Error>)
        .transpose()
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.unwrap_or(0))
}
