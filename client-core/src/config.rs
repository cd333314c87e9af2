use crate::error::CoreError;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Environment prefix shared by every client binary (`APP__API__BASE_URL`).
pub const ENV_PREFIX: &str = "APP";

/// Resolves the `config/` directory of a crate, whether the process was
/// started from the workspace root or from the crate directory itself.
pub fn configuration_directory(base_path: &Path, crate_dir: &str) -> PathBuf {
    if base_path.ends_with(crate_dir) {
        base_path.join("config")
    } else {
        base_path.join(crate_dir).join("config")
    }
}

/// Load layered settings: defaults, then `config/base.yaml` if present, then
/// `APP__*` environment variables.
pub fn load<T, F>(crate_dir: &str, defaults: F) -> Result<T, CoreError>
where
    T: DeserializeOwned,
    F: FnOnce(ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>, ConfigError>,
{
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    let directory = configuration_directory(&base_path, crate_dir);

    let settings = defaults(Config::builder())?
        .add_source(File::from(directory.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
