//! Process-wide health for the three pipeline stages.
//!
//! Each stage owner flips its own flag: the binary wires `store` and `hub`
//! at boot, the relay start/stop path owns `relay`. The REST layer only
//! reads. Liveness needs no flag here; a process that answers the probe is
//! alive by definition.

use std::sync::LazyLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// What one stage currently reports about itself.
#[derive(Debug, Clone, Default)]
enum StageState {
    /// Not wired up yet (process still booting)
    #[default]
    Starting,
    Up,
    Down(String),
}

/// One pipeline stage's health flag.
#[derive(Debug, Default)]
pub struct Stage {
    state: RwLock<StageState>,
}

impl Stage {
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(StageState::Starting),
        }
    }

    pub fn set_healthy(&self) {
        *self.state.write() = StageState::Up;
    }

    pub fn set_unhealthy(&self, reason: impl Into<String>) {
        *self.state.write() = StageState::Down(reason.into());
    }

    pub fn is_healthy(&self) -> bool {
        matches!(&*self.state.read(), StageState::Up)
    }

    /// The failure reason, when the stage is down.
    pub fn reason(&self) -> Option<String> {
        match &*self.state.read() {
            StageState::Down(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

/// Aggregate status over the stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// The stages the pipeline is made of.
#[derive(Debug, Default)]
pub struct PipelineHealth {
    pub store: Stage,
    pub relay: Stage,
    pub hub: Stage,
}

impl PipelineHealth {
    pub const fn new() -> Self {
        Self {
            store: Stage::new(),
            relay: Stage::new(),
            hub: Stage::new(),
        }
    }

    pub fn status(&self) -> ServiceStatus {
        let up = [&self.store, &self.relay, &self.hub]
            .into_iter()
            .filter(|s| s.is_healthy())
            .count();
        match up {
            3 => ServiceStatus::Healthy,
            0 => ServiceStatus::Unhealthy,
            _ => ServiceStatus::Degraded,
        }
    }

    /// Traffic-readiness gates on the store only; a reopening relay or an
    /// idle hub degrade the report but keep REST serving.
    pub fn is_ready(&self) -> bool {
        self.store.is_healthy()
    }
}

static HEALTH: LazyLock<PipelineHealth> = LazyLock::new(PipelineHealth::new);

/// The process-wide health registry.
pub fn health() -> &'static PipelineHealth {
    &HEALTH
}
