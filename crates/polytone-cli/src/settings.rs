//! Engine settings file.
//!
//! ```toml
//! [engine]
//! tick-period = 0.01
//! crossfade = 0.05
//!
//! [[routes]]
//! source = "env1"
//! target = "unison-voices"
//! amount = 0.75
//! ```

use polytone_synth::{EngineConfig, ModRoute, ModSource, ModTarget};
use serde::Deserialize;
use std::path::Path;

use crate::error::CliError;

/// Contents of an engine settings file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Timing configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Modulation routes
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One `[[routes]]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub source: ModSource,
    pub target: ModTarget,
    pub amount: f32,
    #[serde(default)]
    pub bipolar: bool,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl From<&RouteConfig> for ModRoute {
    fn from(config: &RouteConfig) -> Self {
        let route = if config.bipolar {
            ModRoute::bipolar(config.source, config.target, config.amount)
        } else {
            ModRoute::new(config.source, config.target, config.amount)
        };
        route.with_enabled(config.enabled)
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Routes as engine values.
    pub fn mod_routes(&self) -> Vec<ModRoute> {
        self.routes.iter().map(ModRoute::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_settings_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [engine]
            crossfade = 0.05

            [[routes]]
            source = "lfo1"
            target = "unison-detune-cents"
            amount = 0.5
            bipolar = true
            "#,
        )
        .unwrap();
        assert!((settings.engine.crossfade - 0.05).abs() < 1e-12);
        assert!((settings.engine.tick_period - 0.016).abs() < 1e-12);

        let routes = settings.mod_routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].source, ModSource::Lfo1);
        assert!(routes[0].bipolar);
        assert!(routes[0].enabled);
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.engine, EngineConfig::default());
        assert!(settings.routes.is_empty());
    }

    #[test]
    fn test_bad_toml_is_reported() {
        assert!(matches!(
            Settings::from_toml("[engine]\ncrossfade = \"soon\""),
            Err(CliError::TomlParse(_))
        ));
        assert!(Settings::from_toml("[[routes]]\nsource = \"env9\"\ntarget = \"unison-voices\"\namount = 1").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ntick-period = 0.01").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert!((settings.engine.tick_period - 0.01).abs() < 1e-12);

        let missing = Settings::load(Path::new("/nonexistent/polytone.toml"));
        assert!(matches!(missing, Err(CliError::ReadFile { .. })));
    }
}
