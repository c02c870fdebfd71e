// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::HoldMailResult;
use crate::modules::message::entity::StoredMessage;
use crate::modules::settings::cli::SETTINGS;
use crate::utc_now;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Object)]
pub struct MessageListItem {
    pub message_id: u64,
    /// Timestamp (Unix epoch milliseconds) when the mail was received.
    pub received_at: i64,
    pub sender_email: String,
    /// Envelope recipients joined with `", "`.
    pub recipient_email: String,
    pub subject: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Object)]
pub struct MessageList {
    /// Newest first.
    pub messages: Vec<MessageListItem>,
}

impl MessageListItem {
    pub fn new(
        message_id: u64,
        received_at: i64,
        sender_email: impl Into<String>,
        recipient_email: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            message_id,
            received_at,
            sender_email: sender_email.into(),
            recipient_email: recipient_email.into(),
            subject: subject.into(),
        }
    }
}

impl From<&StoredMessage> for MessageListItem {
    fn from(message: &StoredMessage) -> Self {
        MessageListItem::new(
            message.id,
            message.received_at,
            message.sender_email.as_str(),
            join_recipients(&message.recipients),
            message.subject.as_str(),
        )
    }
}

pub fn join_recipients(recipients: &[String]) -> String {
    recipients.join(", ")
}

/// Lists held mails, newest first, optionally only those addressed to `recipient`.
pub async fn find_messages(recipient: Option<&str>) -> HoldMailResult<MessageList> {
    let messages = StoredMessage::list_all()
        .await?
        .iter()
        .filter(|m| recipient.map_or(true, |r| m.is_addressed_to(r)))
        .map(MessageListItem::from)
        .collect();
    Ok(cap_message_list(
        MessageList { messages },
        SETTINGS.holdmail_list_limit as usize,
        utc_now!(),
    ))
}

/// No pagination yet: lists longer than `limit` are cut and end with a marker item from "system".
pub fn cap_message_list(mut list: MessageList, limit: usize, now: i64) -> MessageList {
    if list.messages.len() > limit {
        list.messages.truncate(limit);
        list.messages.push(MessageListItem::new(
            0,
            now,
            "system",
            "system",
            format!("hold-mail return max {} mails (for now)", limit),
        ));
    }
    list
}
