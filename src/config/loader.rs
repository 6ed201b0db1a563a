//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{BackendKind, GateConfig, GeoConfig};
use crate::config::validation::{validate_config, validate_geo_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, overlay the process environment, and validate.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let config = read_config(Some(path))?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load only the geo section, validating nothing else.
///
/// Offline territory checks need no backend or listener settings.
pub fn load_geo_config(path: Option<&Path>) -> Result<GeoConfig, ConfigError> {
    let config = read_config(path)?;
    validate_geo_config(&config.geo).map_err(ConfigError::Validation)?;
    Ok(config.geo)
}

fn read_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config: GateConfig = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GateConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Build a configuration from defaults and the process environment only.
pub fn load_from_env() -> Result<GateConfig, ConfigError> {
    let config = read_config(None)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay the recognized environment variables onto `config`.
///
/// `lookup` abstracts `std::env::var` so the overlay can be exercised
/// without touching the process environment.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(list) = lookup("ALLOWED_COUNTRIES") {
        config.geo.allowed_countries = split_list(&list);
    }
    if let Some(list) = lookup("IP_WHITELIST") {
        config.geo.ip_whitelist = split_list(&list);
    }
    if let Some(list) = lookup("IP_WHITELIST_DEV") {
        config.geo.ip_whitelist_dev = split_list(&list);
    }

    let env_name = lookup("APP_ENV").or_else(|| lookup("NODE_ENV"));
    if let Some(env_name) = env_name {
        config.geo.development_mode = env_name.trim().eq_ignore_ascii_case("development");
    }
    if let Some(flag) = lookup("ALLOW_LOCALHOST") {
        config.geo.allow_localhost = parse_flag(&flag);
    }

    if let Some(url) = lookup("SUPABASE_URL") {
        config.backend.url = url;
        config.backend.kind = BackendKind::Rest;
    }
    if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
        config.backend.service_key = key;
    }
    if let Some(url) = lookup("UPSTREAM_URL") {
        config.upstream.url = url;
    }
    if let Some(secret) = lookup("ADMIN_SESSION_SECRET") {
        let secret = secret.trim().to_string();
        config.auth.admin_session_secret = (!secret.is_empty()).then_some(secret);
    }
}

/// Split a comma-separated environment value, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(vars: &[(&str, &str)]) -> GateConfig {
        let env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).cloned());
        config
    }

    #[test]
    fn test_geo_load_ignores_backend_settings() {
        let path = std::env::temp_dir().join(format!("gate-geo-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[geo]\ndesignated_country = \"MR\"\n\n[backend]\nkind = \"rest\"\n",
        )
        .unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
        let geo = load_geo_config(Some(&path)).unwrap();
        assert_eq!(geo.designated_country, "MR");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" SN, ML ,,"), vec!["SN", "ML"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_env_overlay_lists() {
        let config = overlay(&[
            ("ALLOWED_COUNTRIES", "SN,ML"),
            ("IP_WHITELIST", "1.2.3.4"),
            ("IP_WHITELIST_DEV", "5.6.7.8, 9.9.9.9"),
        ]);
        assert_eq!(config.geo.allowed_countries, vec!["SN", "ML"]);
        assert_eq!(config.geo.ip_whitelist, vec!["1.2.3.4"]);
        assert_eq!(config.geo.ip_whitelist_dev, vec!["5.6.7.8", "9.9.9.9"]);
    }

    #[test]
    fn test_development_requires_both_flags() {
        let only_dev = overlay(&[("NODE_ENV", "development")]);
        assert!(only_dev.geo.development_mode);
        assert!(!only_dev.geo.local_override());

        let both = overlay(&[("APP_ENV", "development"), ("ALLOW_LOCALHOST", "true")]);
        assert!(both.geo.local_override());

        let prod = overlay(&[("APP_ENV", "production"), ("ALLOW_LOCALHOST", "true")]);
        assert!(!prod.geo.local_override());
    }

    #[test]
    fn test_empty_secret_is_ignored() {
        let config = overlay(&[("ADMIN_SESSION_SECRET", "  ")]);
        assert!(config.auth.admin_session_secret.is_none());
    }
}
