//! Pipeline configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File-backed defaults for the `sharelink` binary.
///
/// Every field is optional; command-line flags win over file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory of `.rhai` resolver scripts loaded at startup.
    pub script_dir: Option<PathBuf>,
    /// Wall-clock limit for one script invocation (1..=600).
    pub script_timeout_secs: Option<u64>,
    /// Operation budget for one script invocation.
    pub script_max_operations: Option<u64>,
    pub http_connect_timeout_secs: Option<u64>,
    pub http_read_timeout_secs: Option<u64>,
    /// Lifetime of cached links when the provider reports no expiry.
    pub cache_ttl_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl PipelineConfig {
    /// Validates values against the ranges the CLI accepts.
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.script_timeout_secs
            && !(1..=600).contains(&timeout)
        {
            bail!("Invalid config value for `script_timeout_secs`: {timeout}. Expected range: 1..=600");
        }
        if let Some(operations) = self.script_max_operations
            && operations == 0
        {
            bail!("Invalid config value for `script_max_operations`: 0. Expected a positive integer");
        }
        validate_timeout_secs("http_connect_timeout_secs", self.http_connect_timeout_secs)?;
        validate_timeout_secs("http_read_timeout_secs", self.http_read_timeout_secs)?;
        if let Some(ttl) = self.cache_ttl_secs
            && ttl > 86_400
        {
            bail!("Invalid config value for `cache_ttl_secs`: {ttl}. Expected range: 0..=86400");
        }
        if let Some(user_agent) = &self.user_agent
            && user_agent.contains(['\r', '\n'])
        {
            bail!("Invalid config value for `user_agent`: must be a single line");
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    pub config: Option<PipelineConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/sharelink/config.toml`
/// 2. `$HOME/.config/sharelink/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("sharelink")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("sharelink")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if a file exists there.
pub fn load_default_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_config_file(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates an explicit config file.
pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<PipelineConfig> {
    let mut cfg = PipelineConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "script_dir" => {
                cfg.script_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "script_timeout_secs" => {
                cfg.script_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "script_max_operations" => {
                cfg.script_max_operations = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "http_connect_timeout_secs" => {
                cfg.http_connect_timeout_secs =
                    Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "http_read_timeout_secs" => {
                cfg.http_read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "cache_ttl_secs" => {
                cfg.cache_ttl_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "user_agent" => {
                cfg.user_agent = Some(parse_string_literal(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}
