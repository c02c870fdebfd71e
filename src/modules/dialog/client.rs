// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};
use url::Url;

use crate::modules::dialog::controller::ForwardMailDialog;
use crate::modules::dialog::{
    DialogMessage, ForwardOutcome, MessageAccess, ModalHost, Notifier, NotifyOptions,
};
use crate::modules::error::{code::ErrorCode, HoldMailResult};
use crate::{holdmail_version, raise_error};

#[derive(Serialize)]
struct ForwardBody<'a> {
    recipient: &'a str,
}

/// [`MessageAccess`] over the HTTP API of a running HoldMail server.
pub struct RestMessageAccess {
    base_url: Url,
    client: reqwest::Client,
}

impl RestMessageAccess {
    pub fn new(base_url: &str) -> HoldMailResult<Self> {
        // `Url::join` drops the last segment unless the base ends with a slash.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            raise_error!(
                format!("Invalid HoldMail base url '{}': {}", base_url, e),
                ErrorCode::InvalidParameter
            )
        })?;

        let client = reqwest::ClientBuilder::new()
            .user_agent(format!("HoldMail/{}", holdmail_version!()))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                raise_error!(
                    format!("Failed to build HTTP client: {:#?}", e),
                    ErrorCode::InternalError
                )
            })?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> HoldMailResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
    }
}

impl MessageAccess for RestMessageAccess {
    fn get_message_html_uri(&self, message_id: u64) -> String {
        format!("rest/messages/{}/html", message_id)
    }

    async fn forward_message(&self, message_id: u64, recipient: &str) -> HoldMailResult<()> {
        let url = self.endpoint(&format!("rest/messages/{}/forward", message_id))?;
        let response = self
            .client
            .post(url)
            .json(&ForwardBody { recipient })
            .send()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!(
                    "Forward of message {} was refused with {}: {}",
                    message_id, status, body
                ),
                ErrorCode::HttpResponseError
            ));
        }
        Ok(())
    }
}

/// Reports notifications as log events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, text: &str, _options: &NotifyOptions) {
        info!(notification = text, "success");
    }

    fn error(&self, text: &str, _options: &NotifyOptions) {
        error!(notification = text, "error");
    }
}

/// A host with a fixed message and no screen to dismiss.
#[derive(Clone, Debug)]
pub struct HeadlessHost {
    message: DialogMessage,
}

impl HeadlessHost {
    pub fn new(message: DialogMessage) -> Self {
        Self { message }
    }
}

impl ModalHost for HeadlessHost {
    fn bound_message(&self) -> Option<DialogMessage> {
        Some(self.message.clone())
    }

    fn close(&self) {
        debug!(message_id = ?self.message.message_id, "Forward dialog closed");
    }
}

/// Runs the forward dialog once against the HoldMail server at `server`.
pub async fn forward_with_dialog(
    server: &str,
    message_id: u64,
    recipient: &str,
) -> HoldMailResult<()> {
    let host = HeadlessHost::new(DialogMessage {
        message_id: Some(message_id),
        ..Default::default()
    });
    let dialog = ForwardMailDialog::open(host, TracingNotifier, RestMessageAccess::new(server)?)?;
    dialog.set_forward_recipient(recipient);
    debug!(
        message_id = ?dialog.message().message_id,
        html = dialog.message_html_uri(),
        recipient = %dialog.forward_recipient(),
        "Forward dialog opened"
    );

    let outcome = dialog.forward_current().await;
    dialog.close();
    match outcome {
        ForwardOutcome::Sent => Ok(()),
        ForwardOutcome::Rejected => Err(raise_error!(
            format!(
                "Forward of message {} to {} was rejected by {}",
                message_id, recipient, server
            ),
            ErrorCode::HttpResponseError
        )),
    }
}
