use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::render::{AnimatorSettings, LayoutSettings, Point3};
use crate::sync::{derive_stream_url, PollerSettings, ReconcilerSettings};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    pub backend: BackendConfig,
    #[validate(nested)]
    pub poller: PollerConfig,
    pub stream: StreamConfig,
    #[validate(nested)]
    pub layout: LayoutConfig,
    #[validate(nested)]
    pub animator: AnimatorConfig,
    #[validate(nested)]
    pub interaction: InteractionConfig,
    #[validate(nested)]
    pub render: RenderConfig,
    #[validate(nested)]
    pub state: StateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    #[validate(url)]
    pub base_url: String,
    /// Defaults to the base URL with a ws/wss scheme and `/ws/simulation`
    pub stream_url: Option<String>,
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            stream_url: None,
            user_agent: "open-energy-dashboard/0.1".into(),
        }
    }
}

impl BackendConfig {
    pub fn stream_url(&self) -> Result<String> {
        match &self.stream_url {
            Some(url) => Ok(url.clone()),
            None => derive_stream_url(&self.base_url).context("cannot derive stream URL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PollerConfig {
    #[validate(range(min = 1))]
    pub interval_seconds: u64,
    #[validate(range(min = 100))]
    pub resource_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            resource_timeout_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub enabled: bool,
    /// 0 disables reconnection
    pub reconnect_after_seconds: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_after_seconds: 0,
        }
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Option<Duration> {
        (self.reconnect_after_seconds > 0).then(|| Duration::from_secs(self.reconnect_after_seconds))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LayoutConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub spacing: f64,
    /// Height of node anchors in the 3-D scene
    pub elevation: f64,
    #[validate(range(min = 0.0))]
    pub padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            spacing: 3.0,
            elevation: 1.5,
            padding: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnimatorConfig {
    /// Progress per second for each kWh of flow
    #[validate(range(exclusive_min = 0.0))]
    pub speed_per_kwh: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub max_speed: f64,
    pub marker_lift: f64,
    pub grid_anchor: [f64; 3],
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            speed_per_kwh: 0.15,
            max_speed: 2.0,
            marker_lift: 0.5,
            grid_anchor: [0.0, 8.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InteractionConfig {
    #[validate(range(exclusive_min = 0.0))]
    pub hit_radius: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self { hit_radius: 1.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RenderConfig {
    #[validate(range(min = 1, max = 240))]
    pub frames_per_second: u32,
    /// Log a scene summary every N frames (0 = never)
    pub summary_every_frames: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
            summary_every_frames: 300,
        }
    }
}

impl RenderConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frames_per_second.max(1)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StateConfig {
    #[validate(range(min = 1))]
    pub decision_log_capacity: usize,
    #[validate(range(exclusive_min = 0.0))]
    pub default_battery_capacity: f64,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            decision_log_capacity: 50,
            default_battery_capacity: 10.0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("DASH__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("invalid configuration")?;
        cfg.validate().context("configuration failed validation")?;
        Ok(cfg)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            interval: Duration::from_secs(self.poller.interval_seconds),
            resource_timeout: Duration::from_millis(self.poller.resource_timeout_ms),
        }
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            decision_log_capacity: self.state.decision_log_capacity,
            default_battery_capacity: self.state.default_battery_capacity,
        }
    }

    pub fn layout_settings(&self) -> LayoutSettings {
        LayoutSettings {
            spacing: self.layout.spacing,
            elevation: self.layout.elevation,
            padding: self.layout.padding,
        }
    }

    pub fn animator_settings(&self) -> AnimatorSettings {
        let [x, y, z] = self.animator.grid_anchor;
        AnimatorSettings {
            speed_per_kwh: self.animator.speed_per_kwh,
            max_speed: self.animator.max_speed,
            marker_lift: self.animator.marker_lift,
            grid_anchor: Point3::new(x, y, z),
        }
    }
}
