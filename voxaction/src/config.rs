//! Engine configuration: timing, retry bound, alias tables and id prefixes.
//!
//! Everything the resolver and the verification loop treat as tunable lives
//! here and is injected at construction; nothing is read from globals.

use crate::duration_parser::{self, parse_duration};
use crate::executor::DEFAULT_MENU_OPEN_DELAY;
use crate::selector::ElementKind;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "VOXACTION_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimingConfig {
    /// Wait between running a primitive and re-sampling the tree
    #[serde(with = "duration_parser::human")]
    pub stabilization: Duration,
    /// Wait for a menu to render its items after activation
    #[serde(with = "duration_parser::human")]
    pub menu_open_delay: Duration,
    /// Workflow settle delay after a navigate step
    #[serde(with = "duration_parser::human")]
    pub navigation_settle: Duration,
    /// Workflow settle delay after any other step
    #[serde(with = "duration_parser::human")]
    pub step_settle: Duration,
    #[serde(with = "duration_parser::human")]
    pub idempotency_ttl: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stabilization: Duration::from_millis(200),
            menu_open_delay: DEFAULT_MENU_OPEN_DELAY,
            navigation_settle: Duration::from_millis(800),
            step_settle: Duration::from_millis(300),
            idempotency_ttl: Duration::from_secs(5),
        }
    }
}

/// Per-class alias tables: spoken synonym -> canonical stable id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub tab: HashMap<String, String>,
    pub button: HashMap<String, String>,
    pub input: HashMap<String, String>,
    pub dropdown: HashMap<String, String>,
}

impl AliasConfig {
    pub fn table_for(&self, kind: ElementKind) -> Option<&HashMap<String, String>> {
        match kind {
            ElementKind::Tab => Some(&self.tab),
            ElementKind::Button => Some(&self.button),
            ElementKind::Input => Some(&self.input),
            ElementKind::Dropdown => Some(&self.dropdown),
            _ => None,
        }
    }

    fn table_for_mut(&mut self, kind: ElementKind) -> Option<&mut HashMap<String, String>> {
        match kind {
            ElementKind::Tab => Some(&mut self.tab),
            ElementKind::Button => Some(&mut self.button),
            ElementKind::Input => Some(&mut self.input),
            ElementKind::Dropdown => Some(&mut self.dropdown),
            _ => None,
        }
    }

    /// Register `alias` for `kind`. Kinds without an alias table are rejected.
    pub fn insert(&mut self, kind: ElementKind, alias: &str, canonical: &str) -> Result<()> {
        let table = self
            .table_for_mut(kind)
            .ok_or_else(|| anyhow!("{kind} targets have no alias table"))?;
        table.insert(normalize_alias(alias), canonical.trim().to_string());
        Ok(())
    }

    /// Lowercase and trim every alias key so lookups match normalized targets.
    pub fn normalize(&mut self) {
        for table in [
            &mut self.tab,
            &mut self.button,
            &mut self.input,
            &mut self.dropdown,
        ] {
            *table = table
                .drain()
                .map(|(alias, canonical)| (normalize_alias(&alias), canonical))
                .collect();
        }
    }
}

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}

/// Per-class stable-id prefix conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefixConfig {
    pub tab: String,
    pub button: String,
    pub input: String,
    pub dropdown: String,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            tab: "tab-".to_string(),
            button: "btn-".to_string(),
            input: "input-".to_string(),
            dropdown: "dropdown-".to_string(),
        }
    }
}

impl PrefixConfig {
    pub fn prefix_for(&self, kind: ElementKind) -> Option<&str> {
        let prefix = match kind {
            ElementKind::Tab => &self.tab,
            ElementKind::Button => &self.button,
            ElementKind::Input => &self.input,
            ElementKind::Dropdown => &self.dropdown,
            _ => return None,
        };
        Some(prefix.as_str()).filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub timing: TimingConfig,
    /// Full verification retries after the first attempt
    pub max_retries: u32,
    /// Pixels scrolled for up/down when the action names no amount
    pub default_scroll_amount: u32,
    pub aliases: AliasConfig,
    pub prefixes: PrefixConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            max_retries: 1,
            default_scroll_amount: 300,
            aliases: AliasConfig::default(),
            prefixes: PrefixConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let config = match ext.as_deref() {
            Some("json") => Self::from_json_str(&content),
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content).or_else(|_| Self::from_yaml_str(&content)),
        }
        .with_context(|| format!("Invalid config file {}", path.display()))?;

        debug!("loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_json::from_str(content).context("Failed to parse JSON config")?;
        config.aliases.normalize();
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: Self =
            serde_yaml::from_str(content).context("Failed to parse YAML config")?;
        config.aliases.normalize();
        Ok(config)
    }

    /// Apply `VOXACTION_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment, a test map).
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let durations: [(&str, &mut Duration); 5] = [
            ("STABILIZATION", &mut self.timing.stabilization),
            ("MENU_OPEN_DELAY", &mut self.timing.menu_open_delay),
            ("NAVIGATION_SETTLE", &mut self.timing.navigation_settle),
            ("STEP_SETTLE", &mut self.timing.step_settle),
            ("IDEMPOTENCY_TTL", &mut self.timing.idempotency_ttl),
        ];
        for (name, slot) in durations {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&key) {
                *slot = parse_duration(&raw).with_context(|| format!("Invalid {key}"))?;
                debug!("{} overridden to {:?}", key, slot);
            }
        }

        let counts: [(&str, &mut u32); 2] = [
            ("MAX_RETRIES", &mut self.max_retries),
            ("SCROLL_AMOUNT", &mut self.default_scroll_amount),
        ];
        for (name, slot) in counts {
            let key = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&key) {
                *slot = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid {key}: {raw}"))?;
            }
        }
        Ok(())
    }

    /// Builder-style alias registration.
    pub fn with_alias(mut self, kind: ElementKind, alias: &str, canonical: &str) -> Result<Self> {
        self.aliases.insert(kind, alias, canonical)?;
        Ok(self)
    }

    /// All waits set to zero, keeping the idempotency window. Meant for
    /// headless trees that settle synchronously.
    pub fn zero_delays(mut self) -> Self {
        self.timing.stabilization = Duration::ZERO;
        self.timing.menu_open_delay = Duration::ZERO;
        self.timing.navigation_settle = Duration::ZERO;
        self.timing.step_settle = Duration::ZERO;
        self
    }
}
