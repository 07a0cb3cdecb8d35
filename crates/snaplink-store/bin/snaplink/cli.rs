use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const BACKEND_ENV: &str = "SNAPLINK_BACKEND";
pub const LOG_PATH_ENV: &str = "SNAPLINK_LOG_PATH";
pub const MYSQL_DSN_ENV: &str = "SNAPLINK_MYSQL_DSN";
pub const ID_LENGTH_ENV: &str = "SNAPLINK_ID_LENGTH";
pub const MAX_ATTEMPTS_ENV: &str = "SNAPLINK_MAX_ATTEMPTS";
pub const BASE_URL_ENV: &str = "SNAPLINK_BASE_URL";
pub const JSON_LOGS_ENV: &str = "SNAPLINK_JSON_LOGS";

pub const DEFAULT_LOG_PATH: &str = "snaplink.tsv";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "file-log")]
    FileLog,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for BackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendArg::Memory => write!(f, "memory"),
            BackendArg::FileLog => write!(f, "file-log"),
            BackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snaplink", about = "Shorten URLs and resolve short codes")]
pub struct CLI {
    #[arg(
        long,
        env = BACKEND_ENV,
        value_enum,
        default_value_t = BackendArg::FileLog
    )]
    pub backend: BackendArg,

    #[arg(long, env = LOG_PATH_ENV, default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    #[arg(
        long,
        env = MYSQL_DSN_ENV,
        required_if_eq("backend", "mysql")
    )]
    pub mysql_dsn: Option<String>,

    #[arg(long, env = ID_LENGTH_ENV, default_value_t = 6)]
    pub id_length: usize,

    #[arg(long, env = MAX_ATTEMPTS_ENV, default_value_t = 5)]
    pub max_attempts: u32,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = JSON_LOGS_ENV)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store each URL under a new short code.
    Shorten {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Print the URL stored under a short code.
    Resolve { code: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        CLI::command().debug_assert();
    }

    #[test]
    fn defaults_to_file_log() {
        let cli = CLI::try_parse_from(["snaplink", "shorten", "https://example.com"]).unwrap();
        assert_eq!(cli.backend, BackendArg::FileLog);
        assert_eq!(cli.log_path, PathBuf::from(DEFAULT_LOG_PATH));
        assert_eq!(cli.id_length, 6);
        assert_eq!(cli.max_attempts, 5);
        assert!(matches!(cli.command, Command::Shorten { urls } if urls.len() == 1));
    }

    #[test]
    fn mysql_requires_dsn() {
        let err = CLI::try_parse_from(["snaplink", "--backend", "mysql", "resolve", "abc123"]);
        assert!(err.is_err());

        let cli = CLI::try_parse_from([
            "snaplink",
            "--backend",
            "mysql",
            "--mysql-dsn",
            "mysql://u:p@localhost/db",
            "resolve",
            "abc123",
        ])
        .unwrap();
        assert_eq!(cli.backend, BackendArg::Mysql);
    }

    #[test]
    fn shorten_needs_a_url() {
        assert!(CLI::try_parse_from(["snaplink", "shorten"]).is_err());
    }
}
