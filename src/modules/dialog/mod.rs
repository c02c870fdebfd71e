// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::future::Future;

use crate::modules::error::HoldMailResult;
use crate::modules::message::list::MessageListItem;

pub mod client;
pub mod controller;

/// The mail a dialog is opened for, as supplied by its host.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DialogMessage {
    /// `None` means the host handed over a mail it could not identify.
    pub message_id: Option<u64>,
    pub sender_email: String,
    pub recipient_email: String,
    pub subject: String,
}

impl From<&MessageListItem> for DialogMessage {
    fn from(item: &MessageListItem) -> Self {
        Self {
            message_id: Some(item.message_id),
            sender_email: item.sender_email.clone(),
            recipient_email: item.recipient_email.clone(),
            subject: item.subject.clone(),
        }
    }
}

/// Display options passed along with every notification. Currently carries nothing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NotifyOptions {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ForwardOutcome {
    Sent,
    Rejected,
}

/// The surface that shows the dialog.
pub trait ModalHost {
    fn bound_message(&self) -> Option<DialogMessage>;
    fn close(&self);
}

/// Transient user notifications. Fire and forget.
pub trait Notifier {
    fn success(&self, text: &str, options: &NotifyOptions);
    fn error(&self, text: &str, options: &NotifyOptions);
}

/// Access to held mails on the server side.
pub trait MessageAccess {
    /// Pure: the same id always maps to the same location.
    fn get_message_html_uri(&self, message_id: u64) -> String;

    fn forward_message(
        &self,
        message_id: u64,
        recipient: &str,
    ) -> impl Future<Output = HoldMailResult<()>> + Send;
}
