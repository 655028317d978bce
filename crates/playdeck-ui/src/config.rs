use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use playdeck_input::{KeypadConfig, RotaryConfig};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "deck_conf.json";

/// Tuning shared by every interactive control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlTuning {
    /// Press duration at or beyond which a release reports a long press.
    #[serde(default = "default_long_press_ms")]
    pub long_press_ms: u64,
    /// Interval between synthesized pairs while a key is held.
    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,
    /// Inset applied when deriving exit landing points from neighbor bounds.
    #[serde(default = "default_exit_margin_px")]
    pub exit_margin_px: u32,
}

fn default_long_press_ms() -> u64 {
    600
}

fn default_repeat_interval_ms() -> u64 {
    250
}

fn default_exit_margin_px() -> u32 {
    4
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            long_press_ms: default_long_press_ms(),
            repeat_interval_ms: default_repeat_interval_ms(),
            exit_margin_px: default_exit_margin_px(),
        }
    }
}

impl ControlTuning {
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms)
    }
}

/// Persisted front-end configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub keypad: KeypadConfig,
    #[serde(default)]
    pub rotary: RotaryConfig,
    #[serde(default)]
    pub control: ControlTuning,
}

impl UiConfig {
    /// Load from `root`, creating and persisting defaults when the file is
    /// missing. Out-of-range values are repaired and the repair persisted.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            let default = UiConfig::default();
            default.save(&path)?;
            return Ok(default);
        }

        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut config: UiConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        if config.normalize() {
            tracing::info!("repaired out-of-range values in {}", path.display());
            config.save(&path)?;
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|dur| dur.as_nanos())
            .unwrap_or(0);
        let tmp = path.with_extension(format!("tmp.{}.{now_ns}", std::process::id()));
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("moving {} into place", tmp.display()))?;
        Ok(())
    }

    /// Clamp nonsensical values back to workable ones. Returns whether
    /// anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.rotary.jitter_tolerance == 0 {
            self.rotary.jitter_tolerance = 1;
            changed = true;
        }
        if self.rotary.emit_gap_ms == 0 {
            self.rotary.emit_gap_ms = RotaryConfig::default().emit_gap_ms;
            changed = true;
        }
        if self.control.long_press_ms == 0 {
            self.control.long_press_ms = default_long_press_ms();
            changed = true;
        }
        if self.control.repeat_interval_ms == 0 {
            self.control.repeat_interval_ms = default_repeat_interval_ms();
            changed = true;
        }
        changed
    }
}
