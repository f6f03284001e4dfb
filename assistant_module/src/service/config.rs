use std::env;
use std::io;
use std::path::PathBuf;

use classify_module::LlmConfig;

use super::BoxError;

pub const DEFAULT_BODY_MAX_BYTES: usize = 1024 * 1024;

const DEFAULT_PORT: u16 = 9400;
const DEFAULT_MAX_EMAILS: u32 = 20;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub state_dir: PathBuf,
    pub emails_db_path: PathBuf,
    pub senders_db_path: PathBuf,
    pub categories_db_path: PathBuf,
    pub settings_db_path: PathBuf,
    pub actions_db_path: PathBuf,
    pub declutter_db_path: PathBuf,
    pub llm: LlmConfig,
    /// Selects the tiered sender-context classification path.
    pub enhanced_classification: bool,
    /// Default scan size when a request does not override it.
    pub max_emails: u32,
    pub body_max_bytes: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, BoxError> {
        dotenvy::dotenv().ok();

        let host = env::var("ZENO_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("ZENO_SERVICE_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let state_dir = resolve_path(env::var("ZENO_STATE_DIR").unwrap_or_else(|_| {
            default_state_dir()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_else(|_| ".zeno-state".to_string())
        }))?;

        let llm = LlmConfig::from_env()?;
        let enhanced_classification = env_flag("ZENO_ENHANCED_CLASSIFICATION", true);
        let max_emails = env::var("ZENO_MAX_EMAILS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_EMAILS);
        let body_max_bytes = env::var("ZENO_MAX_BODY_BYTES")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_BODY_MAX_BYTES);

        Ok(Self {
            host,
            port,
            emails_db_path: state_dir.join("emails.db"),
            senders_db_path: state_dir.join("senders.db"),
            categories_db_path: state_dir.join("categories.db"),
            settings_db_path: state_dir.join("settings.db"),
            actions_db_path: state_dir.join("actions.db"),
            declutter_db_path: state_dir.join("declutter.db"),
            state_dir,
            llm,
            enhanced_classification,
            max_emails,
            body_max_bytes,
        })
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        Err(_) => default,
    }
}

fn default_state_dir() -> Result<PathBuf, io::Error> {
    let home =
        env::var("HOME").map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".zeno").join("service"))
}

fn resolve_path(raw: String) -> Result<PathBuf, io::Error> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = env::current_dir()?;
        Ok(cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        key: String,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let previous = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                previous,
            }
        }

        fn unset(key: &str) -> Self {
            let previous = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                previous,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => env::set_var(&self.key, value),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn from_env_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _key = EnvGuard::set("ANTHROPIC_API_KEY", "test-key");
        let _host = EnvGuard::unset("ZENO_SERVICE_HOST");
        let _port = EnvGuard::unset("ZENO_SERVICE_PORT");
        let _max = EnvGuard::unset("ZENO_MAX_EMAILS");
        let _enhanced = EnvGuard::unset("ZENO_ENHANCED_CLASSIFICATION");
        let _state = EnvGuard::set("ZENO_STATE_DIR", "/tmp/zeno-config-test");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.max_emails, DEFAULT_MAX_EMAILS);
        assert!(config.enhanced_classification);
        assert_eq!(
            config.emails_db_path,
            PathBuf::from("/tmp/zeno-config-test/emails.db")
        );
        assert_eq!(
            config.declutter_db_path,
            PathBuf::from("/tmp/zeno-config-test/declutter.db")
        );
    }

    #[test]
    fn from_env_honors_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _key = EnvGuard::set("ANTHROPIC_API_KEY", "test-key");
        let _host = EnvGuard::set("ZENO_SERVICE_HOST", "127.0.0.1");
        let _port = EnvGuard::set("ZENO_SERVICE_PORT", "9999");
        let _max = EnvGuard::set("ZENO_MAX_EMAILS", "7");
        let _enhanced = EnvGuard::set("ZENO_ENHANCED_CLASSIFICATION", "false");
        let _state = EnvGuard::set("ZENO_STATE_DIR", "/tmp/zeno-config-test");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9999);
        assert_eq!(config.max_emails, 7);
        assert!(!config.enhanced_classification);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _key = EnvGuard::unset("ANTHROPIC_API_KEY");
        let _state = EnvGuard::set("ZENO_STATE_DIR", "/tmp/zeno-config-test");

        assert!(ServiceConfig::from_env().is_err());
    }
}
