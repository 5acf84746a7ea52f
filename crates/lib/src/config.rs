//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.balas/config.json`) and environment.
//! Every credential can also come from the environment, which wins over the file.
//! A missing credential is not a startup error: the gateway call that needs it fails instead.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API settings (webhook secret and Graph API credentials).
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Gemini generateContent settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Webhook retry deduplication.
    #[serde(default)]
    pub dedupe: DedupeConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Listen port (default 3000). Overridden by PORT env or `--port`.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the webhook must be reachable by Meta).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Timeout for outbound HTTP calls (Gemini, Graph API), in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Largest webhook body read, in bytes (default 2 MiB). Larger deliveries are
    /// acknowledged and dropped.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// WhatsApp Cloud API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Secret entered in the Meta dashboard for the webhook handshake. Overridden by VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Business phone number id used as the sender. Overridden by WA_PHONE_NUMBER_ID env.
    pub phone_number_id: Option<String>,
    /// Graph API access token. Overridden by WA_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Graph API version segment, e.g. "v20.0". Overridden by GRAPH_API_VERSION env.
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
    /// Graph API base URL (tests point this at a local server).
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    /// Prompt sent to the model when the user sends a non-text message. `{kind}` is replaced by the message type.
    #[serde(default = "default_unsupported_notice")]
    pub unsupported_notice: String,
}

fn default_graph_api_version() -> String {
    "v20.0".to_string()
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_unsupported_notice() -> String {
    "User mengirim {kind}. (Bot ini sementara hanya balas text)".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            phone_number_id: None,
            access_token: None,
            graph_api_version: default_graph_api_version(),
            graph_api_base: default_graph_api_base(),
            unsupported_notice: default_unsupported_notice(),
        }
    }
}

/// Gemini config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env.
    pub api_key: Option<String>,
    /// Model name, e.g. "gemini-2.5-flash". Overridden by GEMINI_MODEL env.
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// API base URL (tests point this at a local server).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    /// Reply used when the model answers with no usable text.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_output_tokens() -> u32 {
    512
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_fallback_reply() -> String {
    "Maaf, aku belum bisa menjawab itu.".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            base_url: default_gemini_base_url(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

/// Dedupe window and optional capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupeConfig {
    /// How long a seen message id counts as a duplicate (default 300 = 5 minutes).
    #[serde(default = "default_dedupe_window_secs")]
    pub window_secs: u64,
    /// Upper bound on remembered ids; 0 means unbounded.
    #[serde(default)]
    pub max_entries: usize,
}

fn default_dedupe_window_secs() -> u64 {
    300
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            window_secs: default_dedupe_window_secs(),
            max_entries: 0,
        }
    }
}

/// Non-empty trimmed env var.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Trimmed config value, None when absent or blank.
fn config_value(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the webhook verify token: env VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_value("VERIFY_TOKEN").or_else(|| config_value(config.whatsapp.verify_token.as_ref()))
}

/// Resolve the WhatsApp phone number id: env WA_PHONE_NUMBER_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    env_value("WA_PHONE_NUMBER_ID")
        .or_else(|| config_value(config.whatsapp.phone_number_id.as_ref()))
}

/// Resolve the Graph API access token: env WA_ACCESS_TOKEN overrides config.
pub fn resolve_access_token(config: &Config) -> Option<String> {
    env_value("WA_ACCESS_TOKEN").or_else(|| config_value(config.whatsapp.access_token.as_ref()))
}

/// Resolve the Graph API version: env GRAPH_API_VERSION overrides config.
pub fn resolve_graph_api_version(config: &Config) -> String {
    env_value("GRAPH_API_VERSION")
        .or_else(|| config_value(Some(&config.whatsapp.graph_api_version)))
        .unwrap_or_else(default_graph_api_version)
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    env_value("GEMINI_API_KEY").or_else(|| config_value(config.gemini.api_key.as_ref()))
}

/// Resolve the Gemini model: env GEMINI_MODEL overrides config.
pub fn resolve_gemini_model(config: &Config) -> String {
    env_value("GEMINI_MODEL")
        .or_else(|| config_value(Some(&config.gemini.model)))
        .unwrap_or_else(default_gemini_model)
}

/// Resolve the listen port: explicit flag, then PORT env, then config.
pub fn resolve_port(config: &Config, flag: Option<u16>) -> u16 {
    flag.or_else(|| env_value("PORT").and_then(|p| p.parse().ok()))
        .unwrap_or(config.gateway.port)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BALAS_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".balas").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, BALAS_CONFIG_PATH or the default path. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write the default config to `path` unless a file already exists there. Returns true if written.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        log::debug!("config already exists at {}, skipping", path.display());
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;
    }
    let body = serde_json::to_string_pretty(&Config::default())
        .context("serializing default config")?;
    std::fs::write(path, body)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("balas-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn defaults_match_cloud_api_setup() {
        let c = Config::default();
        assert_eq!(c.gateway.port, 3000);
        assert_eq!(c.gateway.bind, "0.0.0.0");
        assert_eq!(c.gateway.max_body_bytes, 2 * 1024 * 1024);
        assert_eq!(c.whatsapp.graph_api_version, "v20.0");
        assert_eq!(c.gemini.model, "gemini-2.5-flash");
        assert_eq!(c.gemini.max_output_tokens, 512);
        assert_eq!(c.dedupe.window_secs, 300);
        assert_eq!(c.dedupe.max_entries, 0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let c: Config = serde_json::from_str(
            r#"{"gemini":{"apiKey":"k","model":"gemini-pro"},"dedupe":{"maxEntries":100}}"#,
        )
        .unwrap();
        assert_eq!(c.gemini.api_key.as_deref(), Some("k"));
        assert_eq!(c.gemini.model, "gemini-pro");
        assert_eq!(c.gemini.temperature, 0.7);
        assert_eq!(c.dedupe.max_entries, 100);
        assert_eq!(c.dedupe.window_secs, 300);
        assert_eq!(c.whatsapp.graph_api_base, "https://graph.facebook.com");
    }

    #[test]
    fn blank_config_values_resolve_to_none() {
        assert_eq!(config_value(Some(&"  ".to_string())), None);
        assert_eq!(config_value(Some(&" abc ".to_string())), Some("abc".to_string()));
        assert_eq!(config_value(None), None);
    }

    #[test]
    fn port_flag_wins() {
        let c = Config::default();
        assert_eq!(resolve_port(&c, Some(8080)), 8080);
    }

    /// Env is process-wide; tests that set it run one at a time.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    /// Run `f` with `vars` set (None removes), restoring previous values afterwards.
    fn with_env<T>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved: Vec<(String, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
            .collect();
        for (k, v) in vars {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
        let out = f();
        for (k, v) in saved {
            match v {
                Some(v) => std::env::set_var(&k, v),
                None => std::env::remove_var(&k),
            }
        }
        out
    }

    fn configured() -> Config {
        serde_json::from_str(
            r#"{"gateway":{"port":4000},
                "whatsapp":{"verifyToken":"cfg-verify","graphApiVersion":"v19.0"},
                "gemini":{"apiKey":"cfg-key"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn env_overrides_config_credentials() {
        let c = configured();
        with_env(
            &[
                ("VERIFY_TOKEN", Some(" env-verify ")),
                ("GEMINI_API_KEY", Some("env-key")),
                ("GRAPH_API_VERSION", Some("v21.0")),
            ],
            || {
                assert_eq!(resolve_verify_token(&c).as_deref(), Some("env-verify"));
                assert_eq!(resolve_gemini_api_key(&c).as_deref(), Some("env-key"));
                assert_eq!(resolve_graph_api_version(&c), "v21.0");
            },
        );
    }

    #[test]
    fn blank_or_unset_env_falls_back_to_config() {
        let c = configured();
        with_env(
            &[
                ("VERIFY_TOKEN", Some("   ")),
                ("GEMINI_API_KEY", Some("")),
                ("GRAPH_API_VERSION", None),
            ],
            || {
                assert_eq!(resolve_verify_token(&c).as_deref(), Some("cfg-verify"));
                assert_eq!(resolve_gemini_api_key(&c).as_deref(), Some("cfg-key"));
                assert_eq!(resolve_graph_api_version(&c), "v19.0");
            },
        );
        with_env(&[("VERIFY_TOKEN", None)], || {
            assert_eq!(resolve_verify_token(&Config::default()), None);
        });
    }

    #[test]
    fn port_resolution_order() {
        let c = configured();
        with_env(&[("PORT", Some("5000"))], || {
            assert_eq!(resolve_port(&c, None), 5000);
            assert_eq!(resolve_port(&c, Some(8080)), 8080);
        });
        with_env(&[("PORT", Some("not-a-port"))], || {
            assert_eq!(resolve_port(&c, None), 4000);
        });
        with_env(&[("PORT", None)], || {
            assert_eq!(resolve_port(&c, None), 4000);
        });
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let path = temp_path();
        let (c, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(c.gateway.port, 3000);
    }

    #[test]
    fn write_default_then_load_roundtrips() {
        let path = temp_path();
        assert!(write_default_config(&path).unwrap());
        assert!(!write_default_config(&path).unwrap());
        let (c, _) = load_config(Some(path.clone())).unwrap();
        assert_eq!(c.gemini.fallback_reply, "Maaf, aku belum bisa menjawab itu.");
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        let err = load_config(Some(path.clone())).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
