//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// Project-level config file names, checked in order.
const PROJECT_FILES: [&str; 2] = ["chorus.toml", ".chorus.toml"];

/// Prefix of environment overrides (`CHORUS_BACKEND__BASE_URL`).
const ENV_PREFIX: &str = "CHORUS_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. Explicit config path (if provided)
    /// 2. Project root: `./chorus.toml` or `./.chorus.toml`
    /// 3. XDG config: `$XDG_CONFIG_HOME/chorus/config.toml`
    /// 4. `CHORUS_`-prefixed environment variables, `__` separating sections
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path, Self::global_config_path(), Self::project_config_path())
            .extract()
            .map_err(Box::new)
    }

    fn figment(
        explicit: Option<&Path>,
        global: Option<PathBuf>,
        project: Option<PathBuf>,
    ) -> Figment {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(FileConfig::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(global) = global
            && global.exists()
        {
            figment = figment.merge(Toml::file(global));
        }

        if let Some(project) = project {
            figment = figment.merge(Toml::file(project));
        }

        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns `$XDG_CONFIG_HOME/chorus/config.toml` if set, otherwise the
    /// platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("chorus").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(explicit: Option<&Path>) {
        println!("Configuration sources (in priority order):");

        if let Some(path) = explicit {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{mark:^7}] Explicit: {}", path.display());
        }

        match Self::project_config_path() {
            Some(path) => println!("  [ FOUND ] Project:  {}", path.display()),
            None => println!("  [       ] Project:  ./chorus.toml or ./.chorus.toml"),
        }

        if let Some(path) = Self::global_config_path() {
            let mark = if path.exists() { "FOUND" } else { "" };
            println!("  [{mark:^7}] Global:   {}", path.display());
        }

        println!("  [       ] Env:      {ENV_PREFIX}<SECTION>__<KEY>");
        println!("  [       ] Default:  built-in defaults");
    }
}
