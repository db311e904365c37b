//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/topicmap/topicmap.toml`
//! 3. Local config: `<project_dir>/.topicmap.toml`
//! 4. Environment variables: `TOPICMAP_*` prefix

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ExportOptions, FileNaming};
use crate::domain::rules::DEFAULT_MAX_DEPTH;
use crate::domain::MergeRules;

/// Merge rule configuration.
///
/// Exclusions are keyed by heading level as a string, since TOML table keys
/// are always strings: `exclude = { "3" = ["Note"] }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    /// Deepest heading level that still starts its own topic
    pub max_depth: u8,
    /// Remove single-child containers after merging
    pub consolidate: bool,
    /// Heading level -> paragraph styles merged regardless of depth
    pub exclude: BTreeMap<String, Vec<String>>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: BTreeMap::new(),
            consolidate: true,
        }
    }
}

/// Raw rules config for intermediate parsing (options detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRulesConfig {
    pub max_depth: Option<u8>,
    pub exclude: Option<BTreeMap<String, Vec<String>>>,
    pub consolidate: Option<bool>,
}

impl RulesConfig {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["Note", "Tip"], &["Warning"])  // → ["Note", "Tip", "Warning"]
    /// merge_array(&["Note", "Tip"], &["!Note"])    // → ["Tip"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: BTreeSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        result.into_iter().collect()
    }

    /// Merge overlay config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Exclusions: per-level union with negation support; levels left empty are dropped
    pub fn merge(&self, overlay: &RawRulesConfig) -> Self {
        let mut exclude = self.exclude.clone();
        for (level, styles) in overlay.exclude.iter().flatten() {
            let merged = Self::merge_array(
                exclude.get(level).map(Vec::as_slice).unwrap_or_default(),
                styles,
            );
            if merged.is_empty() {
                exclude.remove(level);
            } else {
                exclude.insert(level.clone(), merged);
            }
        }
        Self {
            max_depth: overlay.max_depth.unwrap_or(self.max_depth),
            exclude,
            consolidate: overlay.consolidate.unwrap_or(self.consolidate),
        }
    }

    /// Apply global config onto defaults.
    ///
    /// Unlike `merge()`, an exclusion table given here REPLACES the base one.
    pub fn apply_global(&self, global: &RawRulesConfig) -> Self {
        Self {
            max_depth: global.max_depth.unwrap_or(self.max_depth),
            exclude: global
                .exclude
                .clone()
                .unwrap_or_else(|| self.exclude.clone()),
            consolidate: global.consolidate.unwrap_or(self.consolidate),
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    /// Render navigation titles upper-case
    pub uppercase_titles: bool,
    /// Topic file naming scheme: "hashed" or "slug"
    pub file_naming: FileNaming,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            uppercase_titles: true,
            file_naming: FileNaming::Hashed,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawExportConfig {
    pub uppercase_titles: Option<bool>,
    pub file_naming: Option<FileNaming>,
}

impl ExportConfig {
    fn overlay(&self, raw: &RawExportConfig) -> Self {
        Self {
            uppercase_titles: raw.uppercase_titles.unwrap_or(self.uppercase_titles),
            file_naming: raw.file_naming.unwrap_or(self.file_naming),
        }
    }
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub rules: RawRulesConfig,
    pub export: RawExportConfig,
}

/// Unified configuration for topicmap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub rules: RulesConfig,
    pub export: ExportConfig,
}

/// Get the XDG config directory for topicmap.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "topicmap").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("topicmap.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".topicmap.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            rules: self.rules.merge(&overlay.rules),
            export: self.export.overlay(&overlay.export),
        }
    }

    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            rules: self.rules.apply_global(&global.rules),
            export: self.export.overlay(&global.export),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory holding `.topicmap.toml`
    ///
    /// # Exclusion Merge Semantics
    /// - Defaults → Global: REPLACE (global defines the real baseline)
    /// - Global → Local: UNION per level, `!Style` removes an inherited entry
    /// - Any → Env vars: REPLACE (explicit user override)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_layers(global_config_path().as_deref(), project_dir)
    }

    /// Load settings from an explicit global config path instead of the XDG location.
    pub fn load_layers(
        global_path: Option<&Path>,
        project_dir: Option<&Path>,
    ) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config (REPLACES defaults)
        if let Some(global_path) = global_path {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.apply_global(&raw);
            }
        }

        // 3. Local config (UNION with global)
        if let Some(project) = project_dir {
            let local_path = local_config_path(project);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables (replace)
        current = Self::apply_env_overrides(current)?;

        current.to_merge_rules()?;
        Ok(current)
    }

    /// Apply TOPICMAP_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("TOPICMAP")
                .separator("__")
                .list_separator(","),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_int("rules.max_depth") {
            settings.rules.max_depth = u8::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("TOPICMAP_RULES__MAX_DEPTH out of range: {val}"),
            })?;
        }
        if let Ok(val) = config.get_bool("rules.consolidate") {
            settings.rules.consolidate = val;
        }
        if let Ok(val) = config.get_bool("export.uppercase_titles") {
            settings.export.uppercase_titles = val;
        }
        if let Ok(val) = config.get_string("export.file_naming") {
            settings.export.file_naming = match val.as_str() {
                "hashed" => FileNaming::Hashed,
                "slug" => FileNaming::Slug,
                other => {
                    return Err(ApplicationError::Config {
                        message: format!("unknown file naming '{other}' (hashed|slug)"),
                    })
                }
            };
        }

        Ok(settings)
    }

    /// Validate and convert the rule settings.
    pub fn to_merge_rules(&self) -> Result<MergeRules, ApplicationError> {
        let mut rules = MergeRules::new(self.rules.max_depth)?;
        rules.consolidate = self.rules.consolidate;
        for (level, styles) in &self.rules.exclude {
            let level: u8 = level.trim().parse().map_err(|_| ApplicationError::Config {
                message: format!("exclusion level '{level}' is not a number"),
            })?;
            for style in styles {
                rules = rules.exclude_style(level, style.clone())?;
            }
        }
        Ok(rules)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            uppercase_titles: self.export.uppercase_titles,
            file_naming: self.export.file_naming,
        }
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# topicmap configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/topicmap/topicmap.toml  (defines your baseline)
#   Local:  <project_dir>/.topicmap.toml      (project-specific additions)
#   Env:    TOPICMAP_* environment variables  (explicit overrides)
#
# Exclusion Merge Semantics:
#   Global config REPLACES compiled defaults.
#   Local config UNIONS with global, per heading level.
#   Use "!Style" in local config to REMOVE an inherited style:
#     exclude = { "3" = ["Tip", "!Note"] }  # adds Tip, removes Note at level 3

[rules]
# Deepest heading level that still starts its own topic (1-9)
# max_depth = 3

# Heading level -> paragraph styles always merged into the preceding topic
# exclude = { "2" = ["Note"], "3" = ["Note", "Warning"] }

# Remove containers that hold a single child
# consolidate = true

[export]
# Render navigation titles upper-case
# uppercase_titles = true

# Topic file names: "hashed" (topic_<10 hex>.dita) or "slug" (from the title)
# file_naming = "hashed"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
