//! CLI configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use proof_service::ProofConfig;

/// File names searched for, in order, from the working directory upwards.
pub const CONFIG_NAMES: [&str; 3] = ["proof.toml", ".proof.toml", "proof.json"];

/// Load and validate config from a TOML or JSON file.
pub fn load(path: &Path) -> Result<ProofConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: ProofConfig = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?
    };

    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}

/// Render a config as TOML, or JSON when `json` is set.
pub fn render(config: &ProofConfig, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(toml::to_string_pretty(config)?)
    }
}

/// Generate a commented default proof.toml.
pub fn generate_default_config() -> String {
    r#"# Social proof widget configuration

[attribution]
# Days after a click during which a purchase can be credited to the widget.
window_days = 10
# Lifetime of the click cookie. Keep it at least as long as the window.
cookie_lifetime_days = 30
cookie_prefix = "_social_proof_"

[context]
recent_sale_lookback_hours = 48
recent_sales_window_hours = 24

[counters]
max_attempts = 3
backoff_base_ms = 25
backoff_max_ms = 250

[logging]
level = "info"
format = "json"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config_parses_to_defaults() {
        let config: ProofConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config, ProofConfig::default());
    }

    #[test]
    fn test_load_toml_and_json() {
        let (_dir, path) = write_config("proof.toml", "[attribution]\nwindow_days = 7\n");
        assert_eq!(load(&path).unwrap().attribution.window_days, 7);

        let (_dir, path) = write_config("proof.json", r#"{"counters": {"max_attempts": 5}}"#);
        let config = load(&path).unwrap();
        assert_eq!(config.counters.max_attempts, 5);
        assert_eq!(config.attribution.window_days, 10);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let (_dir, path) = write_config("proof.toml", "[attribution]\nwindow_days = 0\n");
        let err = load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("window_days"));
    }
}
