use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{ClientConfig, ConfigError};
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "codebox",
    about = "📦 Run code and manage files on a codebox sandbox server",
    author,
    version
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "WebSocket endpoint of the sandbox server [env: CODEBOX_ENDPOINT]"
    )]
    pub endpoint: Option<String>,

    #[arg(
        long = "connect-timeout-ms",
        global = true,
        value_name = "MS",
        help = "Give up if the connection is not open after this long \
                [env: CODEBOX_CONNECT_TIMEOUT_MS]"
    )]
    pub connect_timeout_ms: Option<u64>,

    #[arg(
        long = "request-timeout-ms",
        global = true,
        value_name = "MS",
        help = "Roll back runs and saves the server has not answered after this long \
                [env: CODEBOX_REQUEST_TIMEOUT_MS]"
    )]
    pub request_timeout_ms: Option<u64>,

    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        global = true,
        env = "CODEBOX_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        global = true,
        env = "CODEBOX_LOG_FILE",
        help = "Write structured logs to the specified file"
    )]
    pub file: Option<PathBuf>,
}

impl Cli {
    /// Environment configuration with any command-line flags applied on top.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint)?;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.request_timeout_ms {
            config = config.with_request_timeout(Some(Duration::from_millis(ms)));
        }
        Ok(config)
    }
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a local file as a snippet and stream its output
    Exec(ExecArgs),
    /// Interactive session: log in, browse and edit remote files, run them
    Shell,
}

#[derive(Args, Debug, Clone)]
pub struct ExecArgs {
    #[arg(value_name = "FILE", help = "Source file to send")]
    pub file: PathBuf,
}
