// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::database::manager::DB_MANAGER;
use crate::modules::database::{async_find_impl, list_all_impl, write_impl};
use crate::modules::error::{code::ErrorCode, HoldMailError, HoldMailResult};
use crate::{raise_error, utc_now};
use mail_parser::MessageParser;
use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Envelope and header data of a held mail. The content lives in [`MessageBody`]
/// so listing never has to load it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct StoredMessage {
    /// Assigned in arrival order, starting at 1.
    #[primary_key]
    pub id: u64,
    /// The `Message-ID` header, empty when the mail carried none.
    pub identifier: String,
    /// Timestamp (Unix epoch milliseconds) when the mail was received.
    pub received_at: i64,
    /// Envelope sender (`MAIL FROM`).
    pub sender_email: String,
    /// Address of the peer that delivered the mail.
    pub sender_host: String,
    pub subject: String,
    /// Envelope recipients (`RCPT TO`).
    pub recipients: Vec<String>,
    pub size: u64,
}

/// The complete RFC 5322 bytes after dot-unstuffing, keyed like its [`StoredMessage`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct MessageBody {
    #[primary_key]
    pub id: u64,
    pub raw: Vec<u8>,
}

/// A held mail together with its content.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HeldMessage {
    pub message: StoredMessage,
    pub raw: Vec<u8>,
}

/// Envelope and content of a mail that has just completed `DATA`.
#[derive(Clone, Debug, Default)]
pub struct IncomingMessage {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub sender_host: String,
    pub raw: Vec<u8>,
}

impl StoredMessage {
    pub async fn save(incoming: IncomingMessage) -> HoldMailResult<u64> {
        let (identifier, subject) = Self::extract_headers(&incoming.raw);
        let received_at = utc_now!();
        write_impl(DB_MANAGER.message_db(), move |rw| {
            let scan = rw
                .scan()
                .primary::<StoredMessage>()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            let last = scan
                .all()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?
                .next_back()
                .transpose()
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            let id = last.map(|m| m.id + 1).unwrap_or(1);
            let message = StoredMessage {
                id,
                identifier,
                received_at,
                sender_email: incoming.mail_from,
                sender_host: incoming.sender_host,
                subject,
                recipients: incoming.rcpt_to,
                size: incoming.raw.len() as u64,
            };
            rw.insert(message)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            rw.insert(MessageBody {
                id,
                raw: incoming.raw,
            })
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
            Ok(id)
        })
        .await
    }

    pub async fn find(id: u64) -> HoldMailResult<Option<StoredMessage>> {
        async_find_impl(DB_MANAGER.message_db(), id).await
    }

    pub async fn get(id: u64) -> HoldMailResult<StoredMessage> {
        Self::find(id).await?.ok_or_else(|| not_found(id))
    }

    /// Every held mail, newest first.
    pub async fn list_all() -> HoldMailResult<Vec<StoredMessage>> {
        list_all_impl(DB_MANAGER.message_db(), true).await
    }

    pub fn is_addressed_to(&self, recipient: &str) -> bool {
        self.recipients
            .iter()
            .any(|r| r.eq_ignore_ascii_case(recipient))
    }

    fn extract_headers(raw: &[u8]) -> (String, String) {
        match MessageParser::default().parse(raw) {
            Some(parsed) => (
                parsed.message_id().map(String::from).unwrap_or_default(),
                parsed.subject().map(String::from).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        }
    }
}

fn not_found(id: u64) -> HoldMailError {
    raise_error!(
        format!("Message with id={} not found", id),
        ErrorCode::ResourceNotFound
    )
}

impl HeldMessage {
    pub async fn get(id: u64) -> HoldMailResult<HeldMessage> {
        let message = StoredMessage::get(id).await?;
        let body: MessageBody = async_find_impl(DB_MANAGER.message_db(), id)
            .await?
            .ok_or_else(|| not_found(id))?;
        Ok(HeldMessage {
            message,
            raw: body.raw,
        })
    }
}
