//! Configuration Vault – reads/writes `~/.mudgate/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

use mudgate_middleware::telnet::DEFAULT_SEND_INTERVAL;
use mudgate_runtime::oracle::{ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL, system_prompt};
use mudgate_runtime::{AnthropicOracle, OpenAiCompatOracle, Oracle, RetryPolicy, SessionConfig};
use mudgate_types::MudError;

/// Supported oracle providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Anthropic,
    Ollama,
    OpenAI,
}

impl AiProvider {
    /// Parse a provider name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(AiProvider::Anthropic),
            "ollama" => Some(AiProvider::Ollama),
            "openai" => Some(AiProvider::OpenAI),
            _ => None,
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::Anthropic => write!(f, "anthropic"),
            AiProvider::Ollama => write!(f, "ollama"),
            AiProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Character credentials handed to the oracle in login mode.
///
/// Wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub name_prefix: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("name_prefix", &self.name_prefix)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Persisted user configuration stored in `~/.mudgate/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// MUD server host name.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Chosen oracle provider.
    #[serde(default)]
    pub ai_provider: AiProvider,

    /// Model name (e.g. "claude-3-opus-20240229", "llama3").
    #[serde(default = "default_model")]
    pub active_model: String,

    #[serde(default = "default_anthropic_url")]
    pub anthropic_url: String,

    #[serde(default = "default_openai_url")]
    pub openai_url: String,

    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Anthropic API key.  Falls back to `ANTHROPIC_API_KEY` when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub anthropic_api_key: String,

    /// OpenAI API key.  Falls back to `OPENAI_API_KEY` when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,

    /// Minimum seconds between two oracle calls.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: f64,

    #[serde(default = "default_loop_repeat_threshold")]
    pub loop_repeat_threshold: usize,

    /// Characters of trailing game text sent to the oracle.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Minimum milliseconds between two outbound lines.  `0` disables pacing.
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    /// Let the oracle create or log into a character.
    #[serde(default)]
    pub login: bool,

    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Character password, required when `login` is set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ai_provider", &self.ai_provider)
            .field("active_model", &self.active_model)
            .field("anthropic_url", &self.anthropic_url)
            .field("openai_url", &self.openai_url)
            .field("ollama_url", &self.ollama_url)
            .field("anthropic_api_key", redacted(&self.anthropic_api_key))
            .field("openai_api_key", redacted(&self.openai_api_key))
            .field("min_interval_secs", &self.min_interval_secs)
            .field("loop_repeat_threshold", &self.loop_repeat_threshold)
            .field("context_chars", &self.context_chars)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("send_interval_ms", &self.send_interval_ms)
            .field("login", &self.login)
            .field("name_prefix", &self.name_prefix)
            .field("password", redacted(&self.password))
            .finish()
    }
}

fn redacted(secret: &str) -> &'static dyn std::fmt::Debug {
    if secret.is_empty() { &"<not set>" } else { &"<redacted>" }
}

impl Drop for Config {
    fn drop(&mut self) {
        self.anthropic_api_key.zeroize();
        self.openai_api_key.zeroize();
        self.password.zeroize();
    }
}

fn default_host() -> String {
    "batmud.bat.org".to_string()
}
fn default_port() -> u16 {
    2023
}
fn default_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.to_string()
}
fn default_anthropic_url() -> String {
    ANTHROPIC_BASE_URL.to_string()
}
fn default_openai_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_min_interval_secs() -> f64 {
    2.0
}
fn default_loop_repeat_threshold() -> usize {
    2
}
fn default_context_chars() -> usize {
    2000
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_send_interval_ms() -> u64 {
    DEFAULT_SEND_INTERVAL.as_millis() as u64
}
fn default_name_prefix() -> String {
    "claude".to_string()
}

/// Zero read timeouts or backoffs would make the session spin.
fn nonzero_or(value: u64, default: u64) -> u64 {
    if value == 0 { default } else { value }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ai_provider: AiProvider::default(),
            active_model: default_model(),
            anthropic_url: default_anthropic_url(),
            openai_url: default_openai_url(),
            ollama_url: default_ollama_url(),
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            min_interval_secs: default_min_interval_secs(),
            loop_repeat_threshold: default_loop_repeat_threshold(),
            context_chars: default_context_chars(),
            read_timeout_ms: default_read_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            send_interval_ms: default_send_interval_ms(),
            login: false,
            name_prefix: default_name_prefix(),
            password: String::new(),
        }
    }
}

impl Config {
    /// The login credential, if login mode is on.
    ///
    /// # Errors
    ///
    /// [`MudError::Config`] when login mode is on but no password is set.
    pub fn credentials(&self) -> Result<Option<Credentials>, MudError> {
        if !self.login {
            return Ok(None);
        }
        if self.password.trim().is_empty() {
            return Err(MudError::Config(
                "login mode requires a password (set `password` in the config or MUDGATE_PASSWORD)".into(),
            ));
        }
        Ok(Some(Credentials {
            name_prefix: self.name_prefix.clone(),
            password: self.password.clone(),
        }))
    }

    /// Session tuning derived from this config.
    pub fn session_config(&self, credentials: Option<&Credentials>) -> SessionConfig {
        let min_interval = Duration::try_from_secs_f64(self.min_interval_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_min_interval_secs()));
        let prompt = match credentials {
            Some(c) => system_prompt(&c.name_prefix, Some(&c.password)),
            None => system_prompt(&self.name_prefix, None),
        };
        SessionConfig {
            min_interval,
            loop_repeat_threshold: self.loop_repeat_threshold,
            context_chars: self.context_chars,
            read_timeout: Duration::from_millis(nonzero_or(self.read_timeout_ms, default_read_timeout_ms())),
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                backoff: Duration::from_millis(nonzero_or(self.retry_backoff_ms, default_retry_backoff_ms())),
            },
            system_prompt: prompt,
        }
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Build the oracle driver for the configured provider.
    ///
    /// # Errors
    ///
    /// [`MudError::Config`] when a cloud provider is selected without an API
    /// key.
    pub fn build_oracle(&self) -> Result<Box<dyn Oracle>, MudError> {
        match self.ai_provider {
            AiProvider::Anthropic => {
                if self.anthropic_api_key.is_empty() {
                    return Err(MudError::Config(
                        "the anthropic provider needs an API key (ANTHROPIC_API_KEY)".into(),
                    ));
                }
                Ok(Box::new(AnthropicOracle::new(
                    self.anthropic_url.clone(),
                    self.active_model.clone(),
                    self.anthropic_api_key.clone(),
                )))
            }
            AiProvider::OpenAI => {
                if self.openai_api_key.is_empty() {
                    return Err(MudError::Config(
                        "the openai provider needs an API key (OPENAI_API_KEY)".into(),
                    ));
                }
                Ok(Box::new(OpenAiCompatOracle::new(
                    self.openai_url.clone(),
                    self.active_model.clone(),
                    Some(self.openai_api_key.clone()),
                )))
            }
            AiProvider::Ollama => Ok(Box::new(OpenAiCompatOracle::new(
                self.ollama_url.clone(),
                self.active_model.clone(),
                None,
            ))),
        }
    }
}

/// Return the path to `~/.mudgate/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".mudgate").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns `None`
/// if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MUDGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `MUDGATE_HOST` | `host` |
/// | `MUDGATE_PORT` | `port` |
/// | `MUDGATE_PROVIDER` | `ai_provider` |
/// | `MUDGATE_MODEL` | `active_model` |
/// | `MUDGATE_OLLAMA_URL` | `ollama_url` |
/// | `MUDGATE_MIN_INTERVAL` | `min_interval_secs` |
/// | `MUDGATE_LOGIN` | `login` (`1`/`true`/`yes`) |
/// | `MUDGATE_NAME_PREFIX` | `name_prefix` |
/// | `MUDGATE_PASSWORD` | `password` |
/// | `ANTHROPIC_API_KEY` | `anthropic_api_key`, only when empty |
/// | `OPENAI_API_KEY` | `openai_api_key`, only when empty |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MUDGATE_HOST") {
        cfg.host = v;
    }
    if let Ok(v) = std::env::var("MUDGATE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Ok(v) = std::env::var("MUDGATE_PROVIDER")
        && let Some(provider) = AiProvider::parse(&v)
    {
        cfg.ai_provider = provider;
    }
    if let Ok(v) = std::env::var("MUDGATE_MODEL") {
        cfg.active_model = v;
    }
    if let Ok(v) = std::env::var("MUDGATE_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Ok(v) = std::env::var("MUDGATE_MIN_INTERVAL")
        && let Ok(secs) = v.parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        cfg.min_interval_secs = secs;
    }
    if let Ok(v) = std::env::var("MUDGATE_LOGIN") {
        cfg.login = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(v) = std::env::var("MUDGATE_NAME_PREFIX")
        && !v.trim().is_empty()
    {
        cfg.name_prefix = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("MUDGATE_PASSWORD") {
        cfg.password = v;
    }
    if cfg.anthropic_api_key.is_empty()
        && let Ok(v) = std::env::var("ANTHROPIC_API_KEY")
    {
        cfg.anthropic_api_key = v;
    }
    if cfg.openai_api_key.is_empty()
        && let Ok(v) = std::env::var("OPENAI_API_KEY")
    {
        cfg.openai_api_key = v;
    }
}

/// Save the config to disk, creating `~/.mudgate/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only file (rw-------) on Unix; it may hold API keys and a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_secrets() {
        let mut cfg = Config::default();
        cfg.anthropic_api_key = "ant-super-secret".to_string();
        cfg.password = "hunter2".to_string();
        let debug_str = format!("{:?}", cfg);
        assert!(!debug_str.contains("ant-super-secret"));
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("<redacted>"));
        assert!(debug_str.contains("<not set>"), "unset openai key shows <not set>");
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            name_prefix: "claude".into(),
            password: "hunter2".into(),
        };
        let debug_str = format!("{:?}", creds);
        assert!(debug_str.contains("claude"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.host, "batmud.bat.org");
        assert_eq!(loaded.port, 2023);
        assert_eq!(loaded.ai_provider, AiProvider::Anthropic);
        assert_eq!(loaded.active_model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(loaded.context_chars, 2000);
        assert!(!loaded.login);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "ai_provider = \"ollama\"\nactive_model = \"llama3\"\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ai_provider, AiProvider::Ollama);
        assert_eq!(loaded.active_model, "llama3");
        assert_eq!(loaded.port, 2023);
        assert_eq!(loaded.send_interval_ms, 500);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let err = load_from(&path).expect_err("parse error");
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn empty_secrets_are_not_written() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("password"));
        assert!(!raw.contains("api_key"));
    }

    #[test]
    fn config_path_points_to_mudgate_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".mudgate"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn login_without_password_is_a_config_error() {
        let mut cfg = Config::default();
        cfg.login = true;
        assert!(matches!(cfg.credentials(), Err(MudError::Config(_))));
    }

    #[test]
    fn credentials_only_in_login_mode() {
        let mut cfg = Config::default();
        cfg.password = "hunter2".into();
        assert!(cfg.credentials().unwrap().is_none());

        cfg.login = true;
        let creds = cfg.credentials().unwrap().expect("credentials");
        assert_eq!(creds.name_prefix, "claude");
        assert_eq!(creds.password, "hunter2");
    }

    #[test]
    fn session_config_carries_password_only_with_credentials() {
        let mut cfg = Config::default();
        cfg.login = true;
        cfg.password = "hunter2".into();

        let guest = cfg.session_config(None);
        assert!(!guest.system_prompt.contains("hunter2"));

        let creds = cfg.credentials().unwrap();
        let login = cfg.session_config(creds.as_ref());
        assert!(login.system_prompt.contains("hunter2"));
        assert_eq!(login.min_interval, Duration::from_secs(2));
        assert_eq!(login.retry.attempts, 3);
        assert_eq!(login.read_timeout, Duration::from_millis(100));
    }

    #[test]
    fn negative_interval_falls_back_to_default() {
        let mut cfg = Config::default();
        cfg.min_interval_secs = -1.0;
        assert_eq!(cfg.session_config(None).min_interval, Duration::from_secs(2));
    }

    #[test]
    fn zero_timings_fall_back_to_defaults() {
        let mut cfg = Config::default();
        cfg.read_timeout_ms = 0;
        cfg.retry_backoff_ms = 0;
        let session = cfg.session_config(None);
        assert_eq!(session.read_timeout, Duration::from_millis(100));
        assert_eq!(session.retry.backoff, Duration::from_millis(1000));

        cfg.read_timeout_ms = 250;
        assert_eq!(cfg.session_config(None).read_timeout, Duration::from_millis(250));
    }

    #[test]
    fn cloud_provider_without_key_is_rejected() {
        let mut cfg = Config::default();
        cfg.ai_provider = AiProvider::OpenAI;
        assert!(matches!(cfg.build_oracle(), Err(MudError::Config(_))));

        cfg.openai_api_key = "sk-test".into();
        let oracle = cfg.build_oracle().expect("oracle");
        assert!(oracle.describe().contains(&cfg.active_model));
    }

    #[test]
    fn ollama_needs_no_key() {
        let mut cfg = Config::default();
        cfg.ai_provider = AiProvider::Ollama;
        cfg.active_model = "llama3".into();
        let oracle = cfg.build_oracle().expect("oracle");
        assert_eq!(oracle.describe(), "openai-compat:llama3");
    }

    #[test]
    fn provider_parse_is_case_insensitive() {
        assert_eq!(AiProvider::parse("Ollama"), Some(AiProvider::Ollama));
        assert_eq!(AiProvider::parse(" openai "), Some(AiProvider::OpenAI));
        assert_eq!(AiProvider::parse("bard"), None);
    }

    #[test]
    fn apply_env_overrides_changes_host() {
        // SAFETY: single-threaded test; no other test reads this variable.
        unsafe { std::env::set_var("MUDGATE_HOST", "localhost") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.host, "localhost");
        unsafe { std::env::remove_var("MUDGATE_HOST") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_port() {
        // SAFETY: single-threaded test; no other test reads this variable.
        unsafe { std::env::set_var("MUDGATE_PORT", "not-a-port") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.port, 2023);
        unsafe { std::env::remove_var("MUDGATE_PORT") };
    }

    #[test]
    fn apply_env_overrides_enables_login() {
        // SAFETY: single-threaded test; no other test reads these variables.
        unsafe {
            std::env::set_var("MUDGATE_LOGIN", "true");
            std::env::set_var("MUDGATE_PASSWORD", "from-env");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert!(cfg.login);
        assert_eq!(cfg.password, "from-env");
        unsafe {
            std::env::remove_var("MUDGATE_LOGIN");
            std::env::remove_var("MUDGATE_PASSWORD");
        }
    }

    #[test]
    fn api_key_fallback_does_not_replace_configured_key() {
        // SAFETY: single-threaded test; no other test reads this variable.
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-from-env") };
        let mut cfg = Config::default();
        cfg.openai_api_key = "sk-from-file".into();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.openai_api_key, "sk-from-file");

        let mut empty = Config::default();
        apply_env_overrides(&mut empty);
        assert_eq!(empty.openai_api_key, "sk-from-env");
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
    }
}
