// Configuration module
// Public interface for configuration loading

mod loader;
mod settings;

pub use loader::{load_config, load_from_file, ENV_BIND, ENV_LOG, ENV_MODEL, LOCAL_CONFIG_FILE};
pub use settings::{
    Config, DriftConfig, LoggingConfig, ModelConfig, PredictionsConfig, ServerConfig,
};
