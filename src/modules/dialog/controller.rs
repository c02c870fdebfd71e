// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::RwLock;

use tracing::{info, warn};

use crate::modules::dialog::{
    DialogMessage, ForwardOutcome, MessageAccess, ModalHost, Notifier, NotifyOptions,
};
use crate::modules::error::{code::ErrorCode, HoldMailResult};
use crate::raise_error;

pub const FORWARD_REJECTED: &str = "The server rejected the request (it probably didn't like that email address - see the logs for more info).";

fn forward_succeeded(message_id: u64, recipient: &str) -> String {
    format!(
        "Mail {} successfully sent to <b>{}</b>",
        message_id,
        html_escape::encode_text(recipient)
    )
}

/// Shows one held mail and lets the user forward it to another address.
///
/// Lives from [`ForwardMailDialog::open`] until the host discards it. A forward
/// still in flight when the dialog is closed is not aborted.
pub struct ForwardMailDialog<H, N, M> {
    host: H,
    notifier: N,
    messages: M,
    message: DialogMessage,
    message_id: u64,
    message_html_uri: String,
    forward_recipient: RwLock<String>,
}

impl<H, N, M> ForwardMailDialog<H, N, M>
where
    H: ModalHost,
    N: Notifier,
    M: MessageAccess,
{
    /// Binds the host's message. A message without an id is rejected.
    pub fn open(host: H, notifier: N, messages: M) -> HoldMailResult<Self> {
        let message = host.bound_message().ok_or_else(|| {
            raise_error!(
                "Forward dialog opened without a message".into(),
                ErrorCode::InvalidParameter
            )
        })?;
        let message_id = message.message_id.ok_or_else(|| {
            raise_error!(
                format!(
                    "Forward dialog opened for a message without id (subject: {:?})",
                    message.subject
                ),
                ErrorCode::InvalidParameter
            )
        })?;
        let message_html_uri = messages.get_message_html_uri(message_id);

        Ok(Self {
            host,
            notifier,
            messages,
            message,
            message_id,
            message_html_uri,
            forward_recipient: RwLock::new(String::new()),
        })
    }

    pub fn message(&self) -> &DialogMessage {
        &self.message
    }

    pub fn message_html_uri(&self) -> &str {
        &self.message_html_uri
    }

    pub fn forward_recipient(&self) -> String {
        self.forward_recipient
            .read()
            .map(|value| value.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Recipient input binding.
    pub fn set_forward_recipient(&self, recipient: impl Into<String>) {
        let recipient = recipient.into();
        match self.forward_recipient.write() {
            Ok(mut value) => *value = recipient,
            Err(poisoned) => *poisoned.into_inner() = recipient,
        }
    }

    pub fn close(&self) {
        self.host.close();
    }

    /// Forwards to whatever the recipient input holds right now.
    pub async fn forward_current(&self) -> ForwardOutcome {
        let recipient = self.forward_recipient();
        self.forward_mail(&recipient).await
    }

    /// Issues one forward request and reports its outcome with one notification.
    ///
    /// The recipient is passed on as typed; checking it is up to the server.
    pub async fn forward_mail(&self, recipient: &str) -> ForwardOutcome {
        let message_id = self.message_id;
        let options = NotifyOptions::default();

        match self.messages.forward_message(message_id, recipient).await {
            Ok(()) => {
                info!(message_id, recipient, "Forward request accepted");
                self.notifier
                    .success(&forward_succeeded(message_id, recipient), &options);
                ForwardOutcome::Sent
            }
            Err(e) => {
                warn!(message_id, recipient, error = %e, "Forward request rejected");
                self.notifier.error(FORWARD_REJECTED, &options);
                ForwardOutcome::Rejected
            }
        }
    }
}
