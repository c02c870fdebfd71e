use crate::modules::error::code::ErrorCode;
use crate::modules::error::HoldMailResult;
use crate::modules::settings::cli::{RelayEncryption, SETTINGS};
use crate::raise_error;
use mail_send::smtp::message::{IntoMessage, Message};
use mail_send::{Credentials, SmtpClient, SmtpClientBuilder};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Where forwarded mails are handed over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub encryption: RelayEncryption,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn from_settings() -> Self {
        Self {
            host: SETTINGS.holdmail_outgoing_smtp_host.clone(),
            port: SETTINGS.holdmail_outgoing_smtp_port,
            encryption: SETTINGS.holdmail_outgoing_smtp_encryption,
            username: SETTINGS.holdmail_outgoing_smtp_username.clone(),
            password: SETTINGS.holdmail_outgoing_smtp_password.clone(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
impl RelayConfig {
    /// An unauthenticated plain relay on the loopback interface.
    pub fn local(port: u16) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port,
            encryption: RelayEncryption::None,
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
        }
    }
}

pub enum RelayClient {
    Plain(SmtpClient<TcpStream>),
    Tls(SmtpClient<TlsStream<TcpStream>>),
}

impl RelayClient {
    pub async fn connect(config: &RelayConfig) -> HoldMailResult<RelayClient> {
        debug!(
            host = %config.host,
            port = config.port,
            encryption = %config.encryption,
            "Connecting to outgoing SMTP relay"
        );
        let mut builder =
            SmtpClientBuilder::new(config.host.clone(), config.port).timeout(config.timeout);
        if let Some(username) = &config.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        let client = match config.encryption {
            RelayEncryption::Ssl => {
                let client = builder.implicit_tls(true).connect().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                RelayClient::Tls(client)
            }
            RelayEncryption::StartTls => {
                let client = builder.implicit_tls(false).connect().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                RelayClient::Tls(client)
            }
            RelayEncryption::None => {
                let client = builder.connect_plain().await.map_err(|e| {
                    raise_error!(format!("{:#?}", e), ErrorCode::SmtpConnectionFailed)
                })?;
                RelayClient::Plain(client)
            }
        };
        Ok(client)
    }

    pub async fn send_email<'x>(&mut self, message: impl IntoMessage<'x>) -> HoldMailResult<()> {
        match self {
            RelayClient::Plain(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
            RelayClient::Tls(smtp_client) => smtp_client
                .send(message)
                .await
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::SmtpCommandFailed)),
        }
    }

    /// Sends `raw` unchanged, with a fresh envelope.
    pub async fn send_raw(&mut self, mail_from: &str, rcpt_to: &str, raw: &[u8]) -> HoldMailResult<()> {
        let message = Message::empty()
            .from(mail_from.to_string())
            .to(rcpt_to.to_string())
            .body(raw);
        self.send_email(message).await
    }

    pub async fn quit(self) {
        let result = match self {
            RelayClient::Plain(smtp_client) => smtp_client.quit().await,
            RelayClient::Tls(smtp_client) => smtp_client.quit().await,
        };
        if let Err(e) = result {
            debug!("QUIT to outgoing SMTP relay failed: {:#?}", e);
        }
    }
}
