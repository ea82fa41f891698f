// Configuration management module
// TOML settings stored under the Lorekeeper base directory

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GenerationConfig, HOME_ENV_VAR, OllamaConfig, RetrievalConfig,
    VaultConfig,
};

/// Resolve the base directory, preferring an explicit override
#[inline]
pub fn resolve_base_dir(
    override_dir: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir),
        None => Config::default_dir(),
    }
}
