pub mod settings;

pub use settings::{
    AppConfig, AppInfo, CorsConfig, DatabaseConfig, GatewayConfig, HealthConfig, HubConfig,
    ServerConfig,
};
