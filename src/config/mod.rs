// Configuration management module
// Environment-provided settings plus the optional TOML tuning file

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, DEFAULT_GPT_MODEL, OpenAiConfig, Settings};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
