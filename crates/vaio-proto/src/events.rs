//! Socket channel protocol.
//!
//! Events travel as `{"event": "<name>", "payload": {...}}` JSON text
//! frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ModuleType, PaneId};

/// Payload of pane and layout events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneEventPayload {
    /// Affected pane.
    #[serde(rename = "paneId", default, skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    /// Affected module type.
    #[serde(rename = "moduleType", default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    /// Instance tokens touched by the event.
    #[serde(rename = "instanceIds", default)]
    pub instance_ids: Vec<String>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl PaneEventPayload {
    /// Payload describing one pane.
    #[must_use]
    pub fn for_pane(pane_id: &PaneId) -> Self {
        Self {
            pane_id: Some(pane_id.to_string()),
            module_type: Some(pane_id.module_type()),
            instance_ids: pane_id
                .instance_id()
                .map(|id| vec![id.to_string()])
                .unwrap_or_default(),
            timestamp: Utc::now(),
        }
    }

    /// Payload with only a timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self {
            pane_id: None,
            module_type: None,
            instance_ids: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Metrics stream namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsNamespace {
    /// CPU usage.
    Cpu,
    /// Memory usage.
    Memory,
    /// GPU usage.
    Gpu,
    /// Disk usage.
    Disk,
    /// Network throughput.
    Network,
}

impl MetricsNamespace {
    /// All namespaces.
    pub const ALL: [Self; 5] = [Self::Cpu, Self::Memory, Self::Gpu, Self::Disk, Self::Network];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Gpu => "gpu",
            Self::Disk => "disk",
            Self::Network => "network",
        }
    }

    /// Parse a namespace, accepting socket-style `/gpu` paths.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim_start_matches('/');
        Self::ALL.into_iter().find(|ns| ns.as_str().eq_ignore_ascii_case(name))
    }
}

/// A raw metrics snapshot from one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    /// Source namespace.
    pub namespace: MetricsNamespace,
    /// Snapshot object as produced by the backend.
    pub data: Value,
}

/// Application-level socket event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum SocketEvent {
    /// A pane was launched somewhere.
    #[serde(rename = "pane:launched")]
    PaneLaunched(PaneEventPayload),
    /// A pane was removed by a user.
    #[serde(rename = "pane:removed")]
    PaneRemoved(PaneEventPayload),
    /// A pane was closed by its view.
    #[serde(rename = "pane:closed")]
    PaneClosed(PaneEventPayload),
    /// The grid layout changed.
    #[serde(rename = "layouts:updated")]
    LayoutsUpdated(PaneEventPayload),
    /// A metrics snapshot.
    #[serde(rename = "metrics_update")]
    MetricsUpdate(MetricsUpdate),
}

impl SocketEvent {
    /// Wire event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PaneLaunched(_) => "pane:launched",
            Self::PaneRemoved(_) => "pane:removed",
            Self::PaneClosed(_) => "pane:closed",
            Self::LayoutsUpdated(_) => "layouts:updated",
            Self::MetricsUpdate(_) => "metrics_update",
        }
    }

    /// Whether receivers should re-pull the session.
    #[must_use]
    pub const fn triggers_resync(&self) -> bool {
        !matches!(self, Self::MetricsUpdate(_))
    }
}
