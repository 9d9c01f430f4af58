use std::path::{Path, PathBuf};

use client_core::TourOverrides;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Extra message route: flow `kind` handled by a builtin translator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteSetting {
    pub kind: String,
    pub translator: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub ws_url: Option<String>,
    /// Sent as `?username=` when requesting socket tokens.
    pub username: Option<String>,
    pub max_retries: Option<u32>,
    pub offline: bool,
    pub tour_file: Option<PathBuf>,
    pub routes: Vec<RouteSetting>,
    pub tour: TourOverrides,
    /// Selectors the headless renderer treats as absent from the page.
    pub missing_selectors: Vec<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4000".into(),
            ws_url: None,
            username: None,
            max_retries: None,
            offline: false,
            tour_file: None,
            routes: Vec::new(),
            tour: TourOverrides::default(),
            missing_selectors: Vec::new(),
            log_filter: "info".into(),
        }
    }
}

/// Optional TOML file at `path`, then `APP__*` environment variables
/// (`APP__SERVER_URL`, `APP__TOUR__SHOW_SKIP_BUTTON`, ...).
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_settings(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("shell_settings_test_{suffix}.toml"));
        fs::write(&path, contents).expect("write settings");
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            load_settings(Path::new("/nonexistent/shell.toml")).expect("settings");
        assert_eq!(settings.server_url, "http://127.0.0.1:4000");
        assert!(settings.routes.is_empty());
        assert_eq!(settings.tour, TourOverrides::default());
    }

    #[test]
    fn reads_routes_and_tour_overrides_from_file() {
        let path = temp_settings(
            r##"
server_url = "http://localhost:5000"
missing_selectors = ["#tab-models"]

[tour]
show_skip_button = false

[[routes]]
kind = "cesium/FETCH_FEATURESETS"
translator = "refresh_featuresets"
"##,
        );
        let settings = load_settings(&path).expect("settings");
        fs::remove_file(&path).expect("cleanup");

        assert_eq!(settings.server_url, "http://localhost:5000");
        assert_eq!(settings.tour.show_skip_button, Some(false));
        assert_eq!(settings.tour.running, None);
        assert_eq!(
            settings.routes,
            vec![RouteSetting {
                kind: "cesium/FETCH_FEATURESETS".into(),
                translator: "refresh_featuresets".into(),
            }]
        );
        assert_eq!(settings.missing_selectors, vec!["#tab-models".to_string()]);
    }
}
