use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::aggregate::Granularity;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SALES_DASH_CONFIG";
const CONFIG_FILE: &str = "sales-dash.toml";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub dashboard: DashboardConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Dataset opened at startup.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Entries shown in the top-N charts.
    pub top_n: usize,
    /// Initial trend granularity.
    pub granularity: Granularity,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub file_stem: String,
    pub sheet_name: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("pharma_data_altibajos.csv"),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            granularity: Granularity::Day,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_stem: "datos_farmaceuticos".to_string(),
            sheet_name: "DatosFarmaceuticos".to_string(),
        }
    }
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[data]
path = "pharma_data_altibajos.csv"

[dashboard]
top_n = 10
granularity = "day"

[export]
file_stem = "datos_farmaceuticos"
sheet_name = "DatosFarmaceuticos"
"#;

/// Load configuration.
///
/// Search order:
/// 1. `$SALES_DASH_CONFIG`
/// 2. `sales-dash.toml` in the working directory
/// 3. `sales-dash.toml` next to the executable
/// 4. Falls back to embedded default config
pub fn load_config() -> Result<Config> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV) {
        return load_from(Path::new(&explicit));
    }

    let mut candidates = vec![PathBuf::from(CONFIG_FILE)];
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join(CONFIG_FILE));
        }
    }

    for path in candidates {
        if path.exists() {
            return load_from(&path);
        }
    }

    log::info!("Using default embedded configuration");
    parse(DEFAULT_CONFIG)
}

/// Read one config file.
pub fn load_from(path: &Path) -> Result<Config> {
    log::info!("Loading config from: {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    parse(&contents).with_context(|| format!("in {}", path.display()))
}

fn parse(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).context("parsing config TOML")?;
    if config.dashboard.top_n == 0 {
        anyhow::bail!("dashboard.top_n must be at least 1");
    }
    Ok(config)
}
