use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[ledger]
path = ".skillforge/ledger.db"  # Set via SKILLFORGE_LEDGER env var
window = 500  # Most recent samples per skill used for aggregation

[profiling]
iterations = 5
concurrency = 4  # Skills profiled at the same time
execution_timeout_secs = 30

[simulation]
min_latency_ms = 200
max_latency_ms = 1000
failure_rate = 0.05

[validation]
iterations = 3

[export]
dir = ".skillforge/export"

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # or "json"
"#;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: String,
    pub window: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: ".skillforge/ledger.db".to_string(),
            window: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProfilingConfig {
    pub iterations: usize,
    pub concurrency: usize,
    pub execution_timeout_secs: u64,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            concurrency: 4,
            execution_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 200,
            max_latency_ms: 1000,
            failure_rate: 0.05,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub iterations: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { iterations: 3 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: ".skillforge/export".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub profiling: ProfilingConfig,
    pub simulation: SimulationConfig,
    pub validation: ValidationConfig,
    pub export: ExportConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.skillforge/skillforge.toml
    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".skillforge").join("skillforge.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<Option<PathBuf>> {
        let Some(config_path) = Self::global_config_path() else {
            return Ok(None);
        };

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
        }

        Ok(Some(config_path))
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.skillforge/skillforge.toml (auto-created if missing)
    /// 2. Local override: ./skillforge.toml (optional)
    /// 3. Environment variables: SKILLFORGE__SECTION__KEY
    /// 4. Convenience overrides: SKILLFORGE_LEDGER, SKILLFORGE_LOG_LEVEL
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config_builder = config::Config::builder();

        if let Some(global_config_path) = Self::ensure_global_config()? {
            config_builder = config_builder.add_source(config::File::from(global_config_path));
        }

        config_builder = config_builder
            .add_source(config::File::with_name("skillforge").required(false))
            .add_source(
                config::Environment::with_prefix("SKILLFORGE")
                    .prefix_separator("__")
                    .separator("__"),
            );

        if let Ok(path) = env::var("SKILLFORGE_LEDGER") {
            config_builder = config_builder.set_override("ledger.path", path)?;
        }

        if let Ok(level) = env::var("SKILLFORGE_LOG_LEVEL") {
            config_builder = config_builder.set_override("logging.level", level)?;
        }

        let config: Self = config_builder.build()?.try_deserialize()?;
        Ok(config)
    }
}
