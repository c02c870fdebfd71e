// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::{code::ErrorCode, HoldMailResult};
use crate::modules::message::entity::HeldMessage;
use crate::modules::message::list::join_recipients;
use crate::raise_error;
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Object)]
pub struct MessageHeader {
    pub name: String,
    pub value: String,
}

/// A MIME part that can be fetched on its own, typically an inline image referenced by `cid:`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Object)]
pub struct MessageContentPart {
    /// Content-ID without the surrounding angle brackets.
    pub content_id: String,
    pub content_type: String,
    pub filename: Option<String>,
    pub size: u64,
}

/// Decoded view of a held mail.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Object)]
pub struct MessageSummary {
    pub message_id: u64,
    pub identifier: String,
    pub received_at: i64,
    pub sender_email: String,
    pub sender_host: String,
    pub recipient_email: String,
    pub subject: String,
    pub message_size: u64,
    pub headers: Vec<MessageHeader>,
    /// `None` when the mail has no `text/plain` part.
    pub message_body_text: Option<String>,
    /// `None` when the mail has no `text/html` part.
    pub message_body_html: Option<String>,
    pub content_parts: Vec<MessageContentPart>,
}

/// Raw bytes of one MIME part together with its declared type.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentBody {
    pub content_type: String,
    pub data: Vec<u8>,
}

fn parse(held: &HeldMessage) -> HoldMailResult<Message<'_>> {
    MessageParser::default().parse(&held.raw).ok_or_else(|| {
        raise_error!(
            format!(
                "Message with id={} could not be parsed as RFC 5322",
                held.message.id
            ),
            ErrorCode::EmlFileParseError
        )
    })
}

fn content_type_of(part: &mail_parser::MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match &ct.c_subtype {
            Some(subtype) => format!("{}/{}", ct.c_type, subtype),
            None => ct.c_type.to_string(),
        },
        None => "application/octet-stream".to_string(),
    }
}

fn normalize_content_id(cid: &str) -> &str {
    cid.trim().trim_start_matches('<').trim_end_matches('>')
}

impl MessageSummary {
    pub fn from_held(held: &HeldMessage) -> HoldMailResult<MessageSummary> {
        let parsed = parse(held)?;
        let stored = &held.message;

        let raw = parsed.raw_message();
        let headers = parsed
            .headers()
            .iter()
            .map(|header| {
                let start = (header.offset_start as usize).min(raw.len());
                let end = (header.offset_end as usize).clamp(start, raw.len());
                MessageHeader {
                    name: header.name().to_string(),
                    value: String::from_utf8_lossy(&raw[start..end]).trim().to_string(),
                }
            })
            .collect();

        let message_body_text = parsed.text_part(0).and_then(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        });
        let message_body_html = parsed.html_part(0).and_then(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        });

        let content_parts = parsed
            .parts
            .iter()
            .filter_map(|part| {
                let cid = part.content_id()?;
                Some(MessageContentPart {
                    content_id: normalize_content_id(cid).to_string(),
                    content_type: content_type_of(part),
                    filename: part.attachment_name().map(String::from),
                    size: part.contents().len() as u64,
                })
            })
            .collect();

        Ok(MessageSummary {
            message_id: stored.id,
            identifier: stored.identifier.clone(),
            received_at: stored.received_at,
            sender_email: stored.sender_email.clone(),
            sender_host: stored.sender_host.clone(),
            recipient_email: join_recipients(&stored.recipients),
            subject: stored.subject.clone(),
            message_size: stored.size,
            headers,
            message_body_text,
            message_body_html,
            content_parts,
        })
    }
}

/// Looks up the part whose Content-ID equals `content_id`, brackets optional on either side.
pub fn find_content(held: &HeldMessage, content_id: &str) -> HoldMailResult<ContentBody> {
    let parsed = parse(held)?;
    let wanted = normalize_content_id(content_id);
    parsed
        .parts
        .iter()
        .find(|part| {
            part.content_id()
                .is_some_and(|cid| normalize_content_id(cid) == wanted)
        })
        .map(|part| ContentBody {
            content_type: content_type_of(part),
            data: part.contents().to_vec(),
        })
        .ok_or_else(|| {
            raise_error!(
                format!(
                    "Content '{}' not found in message with id={}",
                    wanted, held.message.id
                ),
                ErrorCode::ResourceNotFound
            )
        })
}
