use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::{HubOptions, OverflowPolicy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Number of undelivered messages each SSE subscriber may have queued
    #[arg(long, env, default_value_t = sse::hub::DEFAULT_SUBSCRIBER_BUFFER,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    pub sse_subscriber_buffer: usize,

    /// What to do with an SSE subscriber whose queue is full: drop the message or disconnect it
    #[arg(
        long,
        env,
        default_value_t = OverflowPolicy::Disconnect,
        value_parser = clap::builder::PossibleValuesParser::new([
            "DROP", "DISCONNECT", "drop", "disconnect"
        ])
            .map(|s| s.parse::<OverflowPolicy>().unwrap()),
    )]
    pub sse_overflow_policy: OverflowPolicy,

    /// Seconds between heartbeat frames on an idle SSE connection (0 disables heartbeats)
    #[arg(long, env, default_value_t = 15)]
    pub sse_heartbeat_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.sse_heartbeat_secs > 0).then(|| Duration::from_secs(self.sse_heartbeat_secs))
    }

    pub fn hub_options(&self) -> HubOptions {
        HubOptions {
            subscriber_buffer: self.sse_subscriber_buffer,
            overflow_policy: self.sse_overflow_policy,
            heartbeat_interval: self.heartbeat_interval(),
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["sse_hub"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_hub_defaults() {
        let config = parse(&[]);

        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.hub_options(), HubOptions::default());
        assert!(!config.is_production());
    }

    #[test]
    fn zero_heartbeat_disables_heartbeats() {
        let config = parse(&["--sse-heartbeat-secs", "0"]);
        assert_eq!(config.hub_options().heartbeat_interval, None);
    }

    #[test]
    fn overflow_policy_accepts_either_case() {
        assert_eq!(
            parse(&["--sse-overflow-policy", "DROP"]).sse_overflow_policy,
            OverflowPolicy::Drop
        );
        assert_eq!(
            parse(&["--sse-overflow-policy", "disconnect"]).sse_overflow_policy,
            OverflowPolicy::Disconnect
        );
    }

    #[test]
    fn rejects_unknown_overflow_policy_and_empty_buffer() {
        assert!(Config::try_parse_from(["sse_hub", "--sse-overflow-policy", "block"]).is_err());
        assert!(Config::try_parse_from(["sse_hub", "--sse-subscriber-buffer", "0"]).is_err());
    }

    #[test]
    fn allowed_origins_are_comma_separated() {
        let config = parse(&["--allowed-origins", "https://a.example,https://b.example"]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn runtime_env_parses_case_insensitively() {
        assert_eq!("PRODUCTION".parse(), Ok(RustEnv::Production));
        assert_eq!("staging".parse(), Ok(RustEnv::Staging));
        assert_eq!("qa".parse::<RustEnv>(), Err(RustEnvParseError));
        assert!(parse(&["--runtime-env", "production"]).is_production());
    }
}
