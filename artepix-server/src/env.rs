use artepix_common::otp::OtpSettings;

use lettre::message::Mailbox;
use once_cell::sync::Lazy;
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroize;

pub static CONF: Lazy<Config> = Lazy::new(|| match Config::from_env() {
    Ok(c) => c,
    Err(e) => {
        eprintln!("ERROR: Failed to load config: {e}");
        std::process::exit(1);
    }
});

const OTP_CODE_LENGTH_VAR: &str = "ARTEPIX_OTP_CODE_LENGTH";
const OTP_LIFETIME_MINS_VAR: &str = "ARTEPIX_OTP_LIFETIME_MINS";
const OTP_MAX_ATTEMPTS_VAR: &str = "ARTEPIX_OTP_MAX_ATTEMPTS";
const OTP_STALE_RETENTION_MINS_VAR: &str = "ARTEPIX_OTP_STALE_RETENTION_MINS";

const EMAIL_ENABLED_VAR: &str = "ARTEPIX_EMAIL_ENABLED";
const EMAIL_FROM_ADDR_VAR: &str = "ARTEPIX_EMAIL_FROM_ADDR";
const EMAIL_REPLY_TO_ADDR_VAR: &str = "ARTEPIX_EMAIL_REPLY_TO_ADDR";
const SMTP_ADDRESS_VAR: &str = "ARTEPIX_SMTP_ADDRESS";
const SMTP_PORT_VAR: &str = "ARTEPIX_SMTP_PORT";
const SMTP_USERNAME_VAR: &str = "ARTEPIX_SMTP_USERNAME";
const SMTP_PASSWORD_VAR: &str = "ARTEPIX_SMTP_PASSWORD";
const MAX_SMTP_CONNECTIONS_VAR: &str = "ARTEPIX_MAX_SMTP_CONNECTIONS";
const SMTP_IDLE_TIMEOUT_SECS_VAR: &str = "ARTEPIX_SMTP_IDLE_TIMEOUT_SECS";

const CORS_ALLOWED_ORIGINS_VAR: &str = "ARTEPIX_CORS_ALLOWED_ORIGINS";
const ACTIX_WORKER_COUNT_VAR: &str = "ARTEPIX_ACTIX_WORKER_COUNT";
const LOG_LEVEL_VAR: &str = "ARTEPIX_LOG_LEVEL";

const MAX_OTP_CODE_LENGTH: usize = 16;
const MAX_OTP_LIFETIME_MINS: u64 = 24 * 60;

#[derive(Zeroize)]
pub struct ConfigInner {
    #[zeroize(skip)]
    pub otp_code_length: usize,
    #[zeroize(skip)]
    pub otp_lifetime: Duration,
    #[zeroize(skip)]
    pub otp_max_attempts: u32,
    #[zeroize(skip)]
    pub otp_stale_retention: Duration,

    pub email_enabled: bool,
    #[zeroize(skip)]
    pub email_from_address: Mailbox,
    #[zeroize(skip)]
    pub email_reply_to_address: Mailbox,
    pub smtp_address: String,
    #[zeroize(skip)]
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    #[zeroize(skip)]
    pub max_smtp_connections: u32,
    #[zeroize(skip)]
    pub smtp_idle_timeout: Duration,

    #[zeroize(skip)]
    pub cors_allowed_origins: Vec<String>,
    #[zeroize(skip)]
    pub actix_worker_count: usize,
    #[zeroize(skip)]
    pub log_level: String,
}

pub struct Config {
    inner: UnsafeCell<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        // Safe as long as `unsafe Config::zeroize()` hasn't been called
        unsafe { &*self.inner.get() }
    }
}

// Safe to be shared across threads as long as `unsafe Config::zeroize()` hasn't been called
unsafe impl Sync for Config {}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let otp_code_length = env_var_or(OTP_CODE_LENGTH_VAR, 6usize);
        if otp_code_length == 0 || otp_code_length > MAX_OTP_CODE_LENGTH {
            return Err(ConfigError::invalid(OTP_CODE_LENGTH_VAR));
        }

        let otp_lifetime_mins = env_var_or(OTP_LIFETIME_MINS_VAR, 5u64);
        if otp_lifetime_mins > MAX_OTP_LIFETIME_MINS {
            return Err(ConfigError::invalid(OTP_LIFETIME_MINS_VAR));
        }

        let otp_max_attempts = env_var_or(OTP_MAX_ATTEMPTS_VAR, 5u32);
        if otp_max_attempts == 0 {
            return Err(ConfigError::invalid(OTP_MAX_ATTEMPTS_VAR));
        }

        let email_from_address: Mailbox = env_var(EMAIL_FROM_ADDR_VAR)?;
        let email_reply_to_address = match std::env::var(EMAIL_REPLY_TO_ADDR_VAR) {
            Ok(addr) => addr
                .parse()
                .map_err(|_| ConfigError::invalid(EMAIL_REPLY_TO_ADDR_VAR))?,
            Err(_) => email_from_address.clone(),
        };

        let default_smtp_connections = u32::try_from(2 * num_cpus::get()).unwrap_or(u32::MAX);

        let inner = ConfigInner {
            otp_code_length,
            otp_lifetime: Duration::from_secs(otp_lifetime_mins * 60),
            otp_max_attempts,
            otp_stale_retention: Duration::from_secs(
                env_var_or(OTP_STALE_RETENTION_MINS_VAR, 60u64) * 60,
            ),

            email_enabled: env_var(EMAIL_ENABLED_VAR)?,
            email_from_address,
            email_reply_to_address,
            smtp_address: env_var(SMTP_ADDRESS_VAR)?,
            smtp_port: env_var_or(SMTP_PORT_VAR, 465),
            smtp_username: env_var(SMTP_USERNAME_VAR)?,
            smtp_password: env_var(SMTP_PASSWORD_VAR)?,
            max_smtp_connections: env_var_or(MAX_SMTP_CONNECTIONS_VAR, default_smtp_connections),
            smtp_idle_timeout: Duration::from_secs(env_var_or(SMTP_IDLE_TIMEOUT_SECS_VAR, 60)),

            cors_allowed_origins: parse_origins(
                &std::env::var(CORS_ALLOWED_ORIGINS_VAR).unwrap_or_default(),
            ),
            actix_worker_count: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get()),
            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info")),
        };

        Ok(Config {
            inner: UnsafeCell::new(inner),
        })
    }

    pub fn otp_settings(&self) -> OtpSettings {
        OtpSettings {
            code_length: self.otp_code_length,
            lifetime: self.otp_lifetime,
            max_attempts: self.otp_max_attempts,
            stale_retention: self.otp_stale_retention,
        }
    }

    /// # Safety
    ///
    /// Safe only if the Config isn't being used by other threads or across an async
    /// boundary. Generally, this should only be used at the end of the main function once
    /// the server has stopped.
    pub unsafe fn zeroize(&self) {
        unsafe {
            (*self.inner.get()).zeroize();
        }
    }
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = std::env::var(key).map_err(|_| ConfigError::missing(key))?;
    let var: T = var.parse().map_err(|_| ConfigError::invalid(key))?;
    Ok(var)
}

fn env_var_or<T: FromStr>(key: &'static str, default: T) -> T {
    let Ok(var) = std::env::var(key) else {
        return default;
    };

    var.parse().unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl ConfigError {
    fn missing(var_name: &'static str) -> Self {
        Self::MissingVar(var_name)
    }

    fn invalid(var_name: &'static str) -> Self {
        Self::InvalidVar(var_name)
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{}'", key),
            Self::InvalidVar(key) => write!(f, "Environment variable '{}' is invalid", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert!(parse_origins("").is_empty());
        assert!(parse_origins(" , ,").is_empty());

        assert_eq!(
            parse_origins("https://artepix.co.id, https://app.artepix.co.id/,,"),
            vec!["https://artepix.co.id", "https://app.artepix.co.id"],
        );
    }

    #[test]
    fn test_env_var_or_falls_back_to_default() {
        assert_eq!(env_var_or("ARTEPIX_TEST_SURELY_UNSET_VAR", 42u32), 42);
    }

    #[test]
    fn test_env_var_reports_missing_key() {
        match env_var::<String>("ARTEPIX_TEST_SURELY_UNSET_VAR") {
            Err(ConfigError::MissingVar(key)) => assert_eq!(key, "ARTEPIX_TEST_SURELY_UNSET_VAR"),
            _ => panic!("Expected a missing variable error"),
        }
    }
}
