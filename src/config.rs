use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "feedbackd.toml";

/// Workspace configuration. Every field has a default so a partial (or
/// missing) `feedbackd.toml` is fine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub scope: ScopeLimits,
    pub samples: SampleConfig,
    pub layout: PageGeometry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// How long a statement waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScopeLimits {
    pub min_year: i64,
    pub max_year: i64,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            min_year: 2000,
            max_year: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub default_size: usize,
    pub max_size: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            default_size: 5,
            max_size: 50,
        }
    }
}

/// Page geometry in points. Defaults are A4 portrait.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub margin_right: f64,
    pub header_band_height: f64,
    pub metadata_height: f64,
    pub table_header_height: f64,
    pub row_height: f64,
    pub signature_height: f64,
    pub course_column_width: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin_top: 40.0,
            margin_bottom: 40.0,
            margin_left: 40.0,
            margin_right: 40.0,
            header_band_height: 60.0,
            metadata_height: 50.0,
            table_header_height: 28.0,
            row_height: 32.0,
            signature_height: 80.0,
            course_column_width: 150.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f64 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Lowest y a block may reach before it has to move to the next page.
    pub fn content_bottom(&self) -> f64 {
        self.page_height - self.margin_bottom
    }
}

impl ServiceConfig {
    /// Reads `feedbackd.toml` from the workspace if present, then applies
    /// environment overrides.
    pub fn load(workspace: &Path) -> anyhow::Result<Self> {
        let path = workspace.join(CONFIG_FILE_NAME);
        let base = if path.is_file() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
            Self::from_toml_str(&text)
                .with_context(|| format!("failed to parse {}", path.to_string_lossy()))?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("FEEDBACKD_BUSY_TIMEOUT_MS") {
            self.storage.busy_timeout_ms = v;
        }
        if let Some(v) = env_parse("FEEDBACKD_SAMPLE_DEFAULT") {
            self.samples.default_size = v;
        }
        if let Some(v) = env_parse("FEEDBACKD_SAMPLE_MAX") {
            self.samples.max_size = v;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
