use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub health: HealthConfig,
    pub gateway: GatewayConfig,
    pub hub: HubConfig,
    pub cors: CorsConfig,
    pub app: AppInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub enabled: bool,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
}

/// Budgets and thresholds for the health aggregation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Wall-clock budget for the parallel probe phase.
    pub probe_budget_ms: u64,
    /// Wall-clock budget for the system metrics and persisted-state phase.
    pub metrics_budget_ms: u64,
    /// Window between the two CPU samples used to compute usage.
    pub cpu_sample_window_ms: u64,
    pub cpu_critical_percent: f64,
    pub memory_critical_percent: f64,
    pub disk_critical_percent: f64,
    /// Tables whose row counts are reported under `database_health`.
    pub tracked_entities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub secret: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub environment: String,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            health: HealthConfig::default(),
            gateway: GatewayConfig::default(),
            hub: HubConfig::default(),
            cors: CorsConfig::default(),
            app: AppInfo::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "sqlite:./data.db".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_seconds: 30,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_budget_ms: 1000,
            metrics_budget_ms: 500,
            cpu_sample_window_ms: 200,
            cpu_critical_percent: 90.0,
            memory_critical_percent: 95.0,
            disk_critical_percent: 95.0,
            tracked_entities: vec![
                "users".to_string(),
                "active_calls".to_string(),
                "call_logs".to_string(),
            ],
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5038,
            username: String::new(),
            secret: String::new(),
            connect_timeout_ms: 2000,
            command_timeout_ms: 800,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl HealthConfig {
    pub fn probe_budget(&self) -> Duration {
        Duration::from_millis(self.probe_budget_ms)
    }

    pub fn metrics_budget(&self) -> Duration {
        Duration::from_millis(self.metrics_budget_ms)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }
}

impl GatewayConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.database.enabled && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "Database URL cannot be empty".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max connections must be greater than 0".to_string(),
            ));
        }

        if self.health.probe_budget_ms == 0 || self.health.metrics_budget_ms == 0 {
            return Err(ConfigError::Message(
                "Health check budgets must be greater than 0".to_string(),
            ));
        }

        for (name, value) in [
            ("cpu", self.health.cpu_critical_percent),
            ("memory", self.health.memory_critical_percent),
            ("disk", self.health.disk_critical_percent),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(ConfigError::Message(format!(
                    "{} critical threshold must be within (0, 100], got {}",
                    name, value
                )));
            }
        }

        if self.health.metrics_budget_ms > self.health.probe_budget_ms {
            tracing::warn!(
                "Metrics budget ({} ms) exceeds the probe budget ({} ms)",
                self.health.metrics_budget_ms,
                self.health.probe_budget_ms
            );
        }

        if self.health.cpu_sample_window_ms >= self.health.metrics_budget_ms {
            tracing::warn!(
                "CPU sample window ({} ms) does not fit the metrics budget ({} ms); system metrics will be reported as zero on the full path",
                self.health.cpu_sample_window_ms,
                self.health.metrics_budget_ms
            );
        }

        if self.gateway.enabled && self.gateway.port == 0 {
            return Err(ConfigError::Message("Gateway port cannot be 0".to_string()));
        }

        if self.hub.max_connections == 0 {
            return Err(ConfigError::Message(
                "Hub max connections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
