use crate::error::{Result, SwitchError};
use crate::probe::ProbeConfig;
use crate::sink::EngineConfig;
use crate::switcher::SwitcherConfig;
use clap::{arg, value_parser, ArgMatches, Command};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Daemon configuration loaded from environment variables, then command-line flags
#[derive(Debug, Clone)]
pub struct Config {
    /// Subscription source
    pub subscription: SubscriptionConfig,
    /// Selection loop timing and eviction
    pub switcher: SwitcherSettings,
    /// Latency probing
    pub probe: ProbeSettings,
    /// Proxy engine process and config file
    pub engine: EngineSettings,
    /// Post-activation reachability check
    pub check: CheckConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Subscription URL or a single share link; unset leaves the daemon in its error state
    pub url: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct SwitcherSettings {
    /// Seconds slept at each sleep point (default: 10)
    pub interval: u64,
    /// Consecutive failures before a proxy leaves the pool (default: 1)
    pub evict_after_failures: u32,
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Connect timeout in seconds (default: 10)
    pub timeout: u64,
    /// Concurrent probes, 0 for one per proxy (default: 0)
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Engine executable (default: v2ray)
    pub binary: String,
    /// Config directory (default: /etc/v2fly/)
    pub config_dir: PathBuf,
    /// Config file name (default: config.json)
    pub config_file: String,
    /// Local HTTP inbound port (default: 1080)
    pub http_port: u16,
    /// Local SOCKS inbound port (default: 1081)
    pub socks_port: u16,
}

#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// URL fetched through the activated proxy
    pub url: String,
    /// Attempts before the proxy is rejected (default: 5)
    pub attempts: u32,
    /// Per-attempt timeout in seconds (default: 10)
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config {
            subscription: SubscriptionConfig {
                url: env::var("SUBSCRIBE_URL")
                    .ok()
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty()),
                timeout: parse_env("SUBSCRIBE_TIMEOUT", "30")?,
            },
            switcher: SwitcherSettings {
                interval: parse_env("REFRESH_INTERVAL", "10")?,
                evict_after_failures: parse_env("EVICT_AFTER_FAILURES", "1")?,
            },
            probe: ProbeSettings {
                timeout: parse_env("PROBE_TIMEOUT", "10")?,
                workers: parse_env("PROBE_WORKERS", "0")?,
            },
            engine: EngineSettings {
                binary: get_env_or("V2RAY_BIN", "v2ray"),
                config_dir: PathBuf::from(get_env_or("V2RAY_CONFIG_DIR", "/etc/v2fly/")),
                config_file: get_env_or("V2RAY_CONFIG_FILE", "config.json"),
                http_port: get_env_or("PROXY_HTTP_PORT", "1080").parse().map_err(|_| {
                    SwitchError::InvalidConfig("PROXY_HTTP_PORT must be a valid port number".into())
                })?,
                socks_port: get_env_or("PROXY_SOCKS_PORT", "1081").parse().map_err(|_| {
                    SwitchError::InvalidConfig(
                        "PROXY_SOCKS_PORT must be a valid port number".into(),
                    )
                })?,
            },
            check: CheckConfig {
                url: get_env_or("CHECK_URL", "https://api.openai.com"),
                attempts: parse_env("CHECK_ATTEMPTS", "5")?,
                timeout: parse_env("CHECK_TIMEOUT", "10")?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the environment
    pub fn apply_args(&mut self, args: &ArgMatches) -> Result<()> {
        if let Some(url) = args.get_one::<String>("url") {
            self.subscription.url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
        }
        if let Some(interval) = args.get_one::<u64>("interval") {
            self.switcher.interval = *interval;
        }
        if let Some(port) = args.get_one::<u16>("http-port") {
            self.engine.http_port = *port;
        }
        if let Some(port) = args.get_one::<u16>("socks-port") {
            self.engine.socks_port = *port;
        }
        if let Some(dir) = args.get_one::<PathBuf>("config-dir") {
            self.engine.config_dir = dir.clone();
        }
        if let Some(file) = args.get_one::<String>("config-file") {
            self.engine.config_file = file.clone();
        }
        if let Some(url) = args.get_one::<String>("check-url") {
            self.check.url = url.clone();
        }
        if args.get_flag("verbose") {
            self.log.level = "debug".to_string();
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.engine.http_port == self.engine.socks_port {
            return Err(SwitchError::InvalidConfig(format!(
                "HTTP and SOCKS inbounds cannot share port {}",
                self.engine.http_port
            )));
        }
        if self.check.attempts == 0 {
            return Err(SwitchError::InvalidConfig(
                "CHECK_ATTEMPTS must be at least 1".into(),
            ));
        }

        let url = Url::parse(&self.check.url).map_err(|e| {
            SwitchError::InvalidConfig(format!("CHECK_URL must be a valid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SwitchError::InvalidConfig(format!(
                "CHECK_URL has unsupported scheme: {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    pub fn switcher_config(&self) -> SwitcherConfig {
        SwitcherConfig {
            subscribe_url: self.subscription.url.clone(),
            interval: Duration::from_secs(self.switcher.interval),
            check_attempts: self.check.attempts,
            max_consecutive_failures: self.switcher.evict_after_failures,
        }
    }

    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(self.probe.timeout),
            max_concurrency: self.probe.workers,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            binary: self.engine.binary.clone(),
            config_dir: self.engine.config_dir.clone(),
            config_file: self.engine.config_file.clone(),
            http_port: self.engine.http_port,
            socks_port: self.engine.socks_port,
            ..EngineConfig::default()
        }
    }
}

/// Command-line interface; every flag overrides its environment variable
pub fn cli() -> Command {
    clap::command!()
        .arg(arg!(-u --url <URL> "Subscription URL or a single ss:// / vmess:// link").required(false))
        .arg(
            arg!(-i --interval <SECONDS> "Seconds to sleep between selection cycles")
                .value_parser(value_parser!(u64))
                .required(false),
        )
        .arg(
            arg!(--"http-port" <PORT> "Local HTTP proxy port")
                .value_parser(value_parser!(u16))
                .required(false),
        )
        .arg(
            arg!(--"socks-port" <PORT> "Local SOCKS proxy port")
                .value_parser(value_parser!(u16))
                .required(false),
        )
        .arg(
            arg!(--"config-dir" <DIR> "Directory the engine config is written to")
                .value_parser(value_parser!(PathBuf))
                .required(false),
        )
        .arg(arg!(--"config-file" <NAME> "Engine config file name").required(false))
        .arg(arg!(--"check-url" <URL> "URL fetched through the proxy to verify it").required(false))
        .arg(arg!(-v --verbose "Turn on debug logging").required(false))
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| SwitchError::InvalidConfig(format!("{} must be a valid number", key)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
