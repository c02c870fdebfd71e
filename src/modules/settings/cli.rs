// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use clap::{builder::ValueParser, Parser, Subcommand, ValueEnum};
use std::{collections::HashSet, fmt, sync::LazyLock};

#[cfg(not(test))]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::parse);

#[cfg(test)]
pub static SETTINGS: LazyLock<Settings> = LazyLock::new(Settings::new_for_test);

#[derive(Debug, Parser)]
#[clap(
    name = "holdmail",
    about = "An SMTP server that holds every mail it receives,
    exposes the held mails over REST and forwards them to real recipients on demand.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Settings {
    /// holdmail log level (default: "info")
    #[clap(
        long,
        default_value = "info",
        env,
        help = "Set the log level for holdmail"
    )]
    pub holdmail_log_level: String,

    /// Enable ANSI logs (default: true)
    #[clap(long, default_value = "true", env, help = "Enable ANSI formatted logs")]
    pub holdmail_ansi_logs: bool,

    /// Enable log file output (default: false)
    /// If false, logs will be printed to stdout
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable log file output (otherwise logs go to stdout)"
    )]
    pub holdmail_log_to_file: bool,

    /// Enable JSON logs (default: false)
    #[clap(
        long,
        default_value = "false",
        env,
        help = "Enable JSON formatted logs"
    )]
    pub holdmail_json_logs: bool,

    /// Maximum number of log files (default: 5)
    #[clap(
        long,
        default_value = "5",
        env,
        help = "Set the maximum number of server log files"
    )]
    pub holdmail_max_server_log_files: usize,

    #[clap(
        long,
        env,
        default_value = "./holdmail_data",
        help = "Set the directory holding the holdmail database and log files"
    )]
    pub holdmail_root_dir: String,

    #[clap(
        long,
        env,
        default_value = "false",
        help = "Keep held mails in memory only; they are lost on restart"
    )]
    pub holdmail_memory_mode_enabled: bool,

    /// The IP address both listeners bind to, in IPv4 format (e.g., 192.168.1.1).
    #[clap(
        long,
        env,
        default_value = "0.0.0.0",
        help = "The IP address that the HTTP and SMTP listeners bind to, in IPv4 format",
        value_parser = ValueParser::new(|s: &str| {
            if s.parse::<std::net::Ipv4Addr>().is_err() {
                return Err("The bind IP address must be a valid IPv4 address.".to_string());
            }
            Ok(s.to_string())
        })
    )]
    pub holdmail_bind_ip: Option<String>,

    /// holdmail HTTP port (default: 8080)
    #[clap(
        long,
        default_value = "8080",
        env,
        help = "Set the HTTP port for holdmail"
    )]
    pub holdmail_http_port: u16,

    /// holdmail SMTP port (default: 25000)
    #[clap(
        long,
        default_value = "25000",
        env,
        help = "Set the SMTP port mails are received on"
    )]
    pub holdmail_smtp_port: u16,

    /// CORS allowed origins (default: "*")
    #[clap(
        long,
        default_value = "*",
        env,
        help = "Set the allowed CORS origins (comma-separated list, e.g., \"https://example.com, https://another.com\")",
        value_parser = ValueParser::new(|s: &str| -> Result<HashSet<String>, String> {
            let set: HashSet<String> = s.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
            Ok(set)
        })
    )]
    pub holdmail_cors_origins: HashSet<String>,

    /// CORS max age in seconds (default: 86400)
    #[clap(
        long,
        default_value = "86400",
        env,
        help = "Set the CORS max age in seconds"
    )]
    pub holdmail_cors_max_age: i32,

    #[clap(
        long,
        default_value = "true",
        env,
        help = "Enable compression for the REST server"
    )]
    pub holdmail_http_compression_enabled: bool,

    #[clap(
        long,
        default_value = "20971520",
        env,
        help = "Maximum size in bytes of a single received mail (default: 20 MiB)",
        value_parser = clap::value_parser!(u64).range(1024..)
    )]
    pub holdmail_max_message_size: u64,

    #[clap(
        long,
        default_value = "150",
        env,
        help = "Maximum number of mails returned by the message list",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub holdmail_list_limit: u64,

    #[clap(
        long,
        default_value = "localhost",
        env,
        help = "Host of the outgoing SMTP relay used to forward mails"
    )]
    pub holdmail_outgoing_smtp_host: String,

    #[clap(
        long,
        default_value = "25",
        env,
        help = "Port of the outgoing SMTP relay used to forward mails"
    )]
    pub holdmail_outgoing_smtp_port: u16,

    #[clap(
        long,
        default_value = "none",
        env,
        help = "Encryption of the outgoing SMTP relay connection (options: none, starttls, ssl)"
    )]
    pub holdmail_outgoing_smtp_encryption: RelayEncryption,

    #[clap(long, env, help = "Username for the outgoing SMTP relay")]
    pub holdmail_outgoing_smtp_username: Option<String>,

    #[clap(long, env, help = "Password for the outgoing SMTP relay")]
    pub holdmail_outgoing_smtp_password: Option<String>,

    #[clap(
        long,
        default_value = "holdmail@localhost",
        env,
        help = "Envelope sender used when forwarding a held mail",
        value_parser = ValueParser::new(|s: &str| -> Result<String, String> {
            crate::modules::utils::validate_email(s).map_err(|e| e.to_string())?;
            Ok(s.to_string())
        })
    )]
    pub holdmail_forward_sender: String,

    /// Runs a one-shot client command instead of the server.
    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Forward one held mail through a running HoldMail server and exit
    Forward {
        #[clap(
            long,
            default_value = "http://localhost:8080",
            help = "Base URL of the HoldMail server"
        )]
        server: String,
        #[clap(long, help = "Id of the held mail to forward")]
        message_id: u64,
        #[clap(long, help = "Address the held mail is forwarded to")]
        recipient: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RelayEncryption {
    #[clap(name = "none")]
    None,
    #[clap(name = "starttls")]
    StartTls,
    #[clap(name = "ssl")]
    Ssl,
}

impl fmt::Display for RelayEncryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEncryption::None => write!(f, "none"),
            RelayEncryption::StartTls => write!(f, "starttls"),
            RelayEncryption::Ssl => write!(f, "ssl"),
        }
    }
}

impl Settings {
    #[cfg(test)]
    fn new_for_test() -> Self {
        Self {
            holdmail_log_level: "info".to_string(),
            holdmail_ansi_logs: false,
            holdmail_log_to_file: false,
            holdmail_json_logs: false,
            holdmail_max_server_log_files: 5,
            holdmail_root_dir: std::env::temp_dir()
                .join("holdmail_test_data")
                .to_string_lossy()
                .into_owned(),
            holdmail_memory_mode_enabled: true,
            holdmail_bind_ip: Some("127.0.0.1".into()),
            holdmail_http_port: 18080,
            holdmail_smtp_port: 25025,
            holdmail_cors_origins: Default::default(),
            holdmail_cors_max_age: 86400,
            holdmail_http_compression_enabled: false,
            holdmail_max_message_size: 64 * 1024,
            holdmail_list_limit: 150,
            holdmail_outgoing_smtp_host: "127.0.0.1".into(),
            // Nothing is expected to listen here; forwarding in tests uses an explicit relay.
            holdmail_outgoing_smtp_port: 1,
            holdmail_outgoing_smtp_encryption: RelayEncryption::None,
            holdmail_outgoing_smtp_username: None,
            holdmail_outgoing_smtp_password: None,
            holdmail_forward_sender: "holdmail@localhost".into(),
            command: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_subcommand_is_parsed() {
        let settings = Settings::try_parse_from([
            "holdmail",
            "forward",
            "--server",
            "http://127.0.0.1:9000",
            "--message-id",
            "42",
            "--recipient",
            "alice@example.com",
        ])
        .unwrap();
        assert_eq!(
            settings.command,
            Some(Command::Forward {
                server: "http://127.0.0.1:9000".into(),
                message_id: 42,
                recipient: "alice@example.com".into(),
            })
        );
    }

    #[test]
    fn no_subcommand_runs_the_server() {
        let settings = Settings::try_parse_from(["holdmail"]).unwrap();
        assert_eq!(settings.command, None);
    }
}
