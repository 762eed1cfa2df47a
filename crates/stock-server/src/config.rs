use std::{
    env, fmt,
    net::{AddrParseError, SocketAddr},
    time::Duration,
};

use stock_core::FreshnessPolicy;

const DEFAULT_LISTEN_PORT: u16 = 3000;
const DEFAULT_PROVIDERS_FILE: &str = "providers.json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_FRESHNESS_ENABLED: bool = true;
const DEFAULT_FRESH_MINUTE_STEP: u8 = 5;
const DEFAULT_FRESH_MAX_SECOND: u8 = 30;

const ENV_ADDR: &str = "STOCK_SERVER_ADDR";
const ENV_PROVIDERS_FILE: &str = "STOCK_PROVIDERS_FILE";
const ENV_POLL_INTERVAL_MS: &str = "STOCK_POLL_INTERVAL_MS";
const ENV_FETCH_TIMEOUT_MS: &str = "STOCK_FETCH_TIMEOUT_MS";
const ENV_HTTP_PROXY: &str = "STOCK_HTTP_PROXY";
const ENV_FRESHNESS_ENABLED: &str = "STOCK_FRESHNESS_ENABLED";
const ENV_FRESH_MINUTE_STEP: &str = "STOCK_FRESH_MINUTE_STEP";
const ENV_FRESH_MAX_SECOND: &str = "STOCK_FRESH_MAX_SECOND";

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub providers_file: String,
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
    pub http_proxy: Option<String>,
    pub freshness: FreshnessPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidListenAddr(AddrParseError),
    InvalidProvidersFile,
    InvalidPollInterval,
    InvalidFetchTimeout,
    InvalidHttpProxy,
    InvalidFreshnessEnabled,
    InvalidFreshMinuteStep,
    InvalidFreshMaxSecond,
    NonUnicode(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidListenAddr(err) => {
                write!(f, "{ENV_ADDR} is not a valid socket address: {err}")
            }
            Self::InvalidProvidersFile => {
                write!(f, "{ENV_PROVIDERS_FILE} must not be empty or whitespace")
            }
            Self::InvalidPollInterval => {
                write!(f, "{ENV_POLL_INTERVAL_MS} must be a positive number of milliseconds")
            }
            Self::InvalidFetchTimeout => {
                write!(f, "{ENV_FETCH_TIMEOUT_MS} must be a positive number of milliseconds")
            }
            Self::InvalidHttpProxy => {
                write!(f, "{ENV_HTTP_PROXY} must be an http(s) URL when set")
            }
            Self::InvalidFreshnessEnabled => {
                write!(f, "{ENV_FRESHNESS_ENABLED} must be true or false")
            }
            Self::InvalidFreshMinuteStep => {
                write!(f, "{ENV_FRESH_MINUTE_STEP} must be an integer between 1 and 60")
            }
            Self::InvalidFreshMaxSecond => {
                write!(f, "{ENV_FRESH_MAX_SECOND} must be an integer between 0 and 59")
            }
            Self::NonUnicode(key) => write!(f, "{key} contains non-unicode data"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidListenAddr(err) => Some(err),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = match read_env(ENV_ADDR)? {
            Some(value) => value.parse().map_err(ConfigError::InvalidListenAddr)?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
        };

        let providers_file = match read_env(ENV_PROVIDERS_FILE)? {
            Some(value) => {
                if value.trim().is_empty() {
                    return Err(ConfigError::InvalidProvidersFile);
                }
                value
            }
            None => DEFAULT_PROVIDERS_FILE.to_owned(),
        };

        let poll_interval = parse_millis_env(
            ENV_POLL_INTERVAL_MS,
            DEFAULT_POLL_INTERVAL_MS,
            ConfigError::InvalidPollInterval,
        )?;

        let fetch_timeout = parse_millis_env(
            ENV_FETCH_TIMEOUT_MS,
            DEFAULT_FETCH_TIMEOUT_MS,
            ConfigError::InvalidFetchTimeout,
        )?;

        let http_proxy = match read_env(ENV_HTTP_PROXY)? {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => {
                let value = value.trim().to_owned();
                if !is_proxy_url(&value) {
                    return Err(ConfigError::InvalidHttpProxy);
                }
                Some(value)
            }
            None => None,
        };

        let freshness_enabled = match read_env(ENV_FRESHNESS_ENABLED)? {
            Some(value) => {
                parse_bool(value.trim()).ok_or(ConfigError::InvalidFreshnessEnabled)?
            }
            None => DEFAULT_FRESHNESS_ENABLED,
        };

        let minute_step = parse_u8_env(
            ENV_FRESH_MINUTE_STEP,
            DEFAULT_FRESH_MINUTE_STEP,
            ConfigError::InvalidFreshMinuteStep,
        )?;
        let max_second = parse_u8_env(
            ENV_FRESH_MAX_SECOND,
            DEFAULT_FRESH_MAX_SECOND,
            ConfigError::InvalidFreshMaxSecond,
        )?;

        let freshness = FreshnessPolicy::new(minute_step, max_second)
            .map_err(|err| match err {
                stock_core::FreshnessPolicyError::InvalidMinuteStep => {
                    ConfigError::InvalidFreshMinuteStep
                }
                stock_core::FreshnessPolicyError::InvalidMaxSecond => {
                    ConfigError::InvalidFreshMaxSecond
                }
            })?
            .with_enabled(freshness_enabled);

        Ok(Self {
            listen_addr,
            providers_file,
            poll_interval,
            fetch_timeout,
            http_proxy,
            freshness,
        })
    }
}

fn read_env(key: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NonUnicode(key)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn is_proxy_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme) && value.len() > scheme.len())
}

fn parse_millis_env(
    key: &'static str,
    default_ms: u64,
    invalid_error: ConfigError,
) -> Result<Duration, ConfigError> {
    match read_env(key)? {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
            _ => Err(invalid_error),
        },
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn parse_u8_env(
    key: &'static str,
    default_value: u8,
    invalid_error: ConfigError,
) -> Result<u8, ConfigError> {
    match read_env(key)? {
        Some(value) => value.trim().parse::<u8>().map_err(|_| invalid_error),
        None => Ok(default_value),
    }
}

#[cfg(test)]
mod tests {
    use std::{env, sync::Mutex, time::Duration};

    use super::{
        Config, ConfigError, ENV_ADDR, ENV_FETCH_TIMEOUT_MS, ENV_FRESHNESS_ENABLED,
        ENV_FRESH_MAX_SECOND, ENV_FRESH_MINUTE_STEP, ENV_HTTP_PROXY, ENV_POLL_INTERVAL_MS,
        ENV_PROVIDERS_FILE,
    };

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_KEYS: [&str; 8] = [
        ENV_ADDR,
        ENV_PROVIDERS_FILE,
        ENV_POLL_INTERVAL_MS,
        ENV_FETCH_TIMEOUT_MS,
        ENV_HTTP_PROXY,
        ENV_FRESHNESS_ENABLED,
        ENV_FRESH_MINUTE_STEP,
        ENV_FRESH_MAX_SECOND,
    ];

    struct EnvVarGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var_os(key);
            env::remove_var(key);
            Self { key, previous }
        }

        #[cfg(unix)]
        fn set_os(key: &'static str, value: std::ffi::OsString) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn reset_config_env_baseline() -> Vec<EnvVarGuard> {
        ALL_KEYS.into_iter().map(EnvVarGuard::unset).collect()
    }

    #[test]
    fn defaults_apply_when_env_is_unset() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.providers_file, "providers.json");
        assert_eq!(config.poll_interval, Duration::from_millis(5_000));
        assert_eq!(config.fetch_timeout, Duration::from_millis(15_000));
        assert_eq!(config.http_proxy, None);
        assert!(config.freshness.enabled());
        assert_eq!(config.freshness.minute_step(), 5);
        assert_eq!(config.freshness.max_second(), 30);
    }

    #[test]
    fn uses_overrides_from_env() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _addr = EnvVarGuard::set(ENV_ADDR, "127.0.0.1:9090");
        let _file = EnvVarGuard::set(ENV_PROVIDERS_FILE, "config/providers.json");
        let _interval = EnvVarGuard::set(ENV_POLL_INTERVAL_MS, "2500");
        let _timeout = EnvVarGuard::set(ENV_FETCH_TIMEOUT_MS, "800");
        let _proxy = EnvVarGuard::set(ENV_HTTP_PROXY, "http://proxy.local:3128");
        let _fresh = EnvVarGuard::set(ENV_FRESHNESS_ENABLED, "false");
        let _step = EnvVarGuard::set(ENV_FRESH_MINUTE_STEP, "15");
        let _second = EnvVarGuard::set(ENV_FRESH_MAX_SECOND, "10");

        let config = Config::from_env().unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.providers_file, "config/providers.json");
        assert_eq!(config.poll_interval, Duration::from_millis(2_500));
        assert_eq!(config.fetch_timeout, Duration::from_millis(800));
        assert_eq!(config.http_proxy.as_deref(), Some("http://proxy.local:3128"));
        assert!(!config.freshness.enabled());
        assert_eq!(config.freshness.minute_step(), 15);
        assert_eq!(config.freshness.max_second(), 10);
    }

    #[test]
    fn blank_proxy_means_no_proxy() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_HTTP_PROXY, "   ");

        let config = Config::from_env().unwrap();

        assert_eq!(config.http_proxy, None);
    }

    #[test]
    fn returns_error_for_invalid_listen_address_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_ADDR, "not-an-addr");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidListenAddr(_)));
    }

    #[test]
    fn returns_error_for_zero_or_garbage_durations() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        {
            let _guard = EnvVarGuard::set(ENV_POLL_INTERVAL_MS, "0");
            assert!(matches!(
                Config::from_env().unwrap_err(),
                ConfigError::InvalidPollInterval
            ));
        }

        let _guard = EnvVarGuard::set(ENV_FETCH_TIMEOUT_MS, "soon");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidFetchTimeout
        ));
    }

    #[test]
    fn returns_error_for_malformed_proxy() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_HTTP_PROXY, "proxy.local:3128");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidHttpProxy));
    }

    #[test]
    fn returns_error_for_out_of_range_freshness_params() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();

        {
            let _guard = EnvVarGuard::set(ENV_FRESH_MINUTE_STEP, "0");
            assert!(matches!(
                Config::from_env().unwrap_err(),
                ConfigError::InvalidFreshMinuteStep
            ));
        }

        let _guard = EnvVarGuard::set(ENV_FRESH_MAX_SECOND, "75");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidFreshMaxSecond
        ));
    }

    #[test]
    fn returns_error_for_invalid_freshness_toggle() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_FRESHNESS_ENABLED, "yes");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidFreshnessEnabled));
    }

    #[test]
    fn returns_error_for_whitespace_providers_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set(ENV_PROVIDERS_FILE, "   ");

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::InvalidProvidersFile));
    }

    #[cfg(unix)]
    #[test]
    fn returns_error_for_non_unicode_env_var() {
        use std::os::unix::ffi::OsStringExt;

        let _lock = ENV_LOCK.lock().unwrap();
        let _baseline = reset_config_env_baseline();
        let _guard = EnvVarGuard::set_os(
            ENV_POLL_INTERVAL_MS,
            std::ffi::OsString::from_vec(vec![0x66, 0x6f, 0x80]),
        );

        let err = Config::from_env().unwrap_err();

        assert!(matches!(err, ConfigError::NonUnicode(ENV_POLL_INTERVAL_MS)));
        assert_eq!(
            err.to_string(),
            "STOCK_POLL_INTERVAL_MS contains non-unicode data"
        );
    }
}
