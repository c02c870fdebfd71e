// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::message::cid::replace_with_rest_path;
use crate::modules::message::entity::HeldMessage;
use crate::modules::message::forward::{forward_message, MessageForwardCommand};
use crate::modules::message::list::{find_messages, MessageList};
use crate::modules::message::summary::MessageSummary;
use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::settings::cli::SETTINGS;
use crate::modules::smtp::client::RelayConfig;
use crate::{raise_error, validate_email};
use poem_openapi::param::{Path, Query};
use poem::web::Data;
use poem_openapi::payload::{Binary, Html, Json, PlainText};
use poem_openapi::{ApiResponse, OpenApi};

pub struct MessageApi;

#[derive(ApiResponse)]
pub enum ForwardResponse {
    /// The mail was handed over to the outgoing relay.
    #[oai(status = 202)]
    Accepted,
}

#[derive(ApiResponse)]
pub enum RawResponse {
    /// The mail source, byte for byte.
    #[oai(status = 200, content_type = "text/plain")]
    Ok(Binary<Vec<u8>>),
}

#[OpenApi(prefix_path = "/rest", tag = "ApiTags::Message")]
impl MessageApi {
    /// Lists held mails, newest first.
    #[oai(path = "/messages", method = "get", operation_id = "list_messages")]
    async fn list_messages(
        &self,
        /// Only return mails with this address among their recipients.
        recipient: Query<Option<String>>,
    ) -> ApiResult<Json<MessageList>> {
        let recipient = recipient.0;
        if let Some(recipient) = recipient.as_deref() {
            validate_email!(recipient)?;
        }
        Ok(Json(find_messages(recipient.as_deref()).await?))
    }

    /// Returns the decoded view of one held mail.
    #[oai(
        path = "/messages/:message_id",
        method = "get",
        operation_id = "get_message"
    )]
    async fn get_message(&self, message_id: Path<u64>) -> ApiResult<Json<MessageSummary>> {
        let held = HeldMessage::get(message_id.0).await?;
        Ok(Json(MessageSummary::from_held(&held)?))
    }

    /// Returns the HTML body with `cid:` references pointing back at this API.
    #[oai(
        path = "/messages/:message_id/html",
        method = "get",
        operation_id = "get_message_html"
    )]
    async fn get_message_html(&self, message_id: Path<u64>) -> ApiResult<Html<String>> {
        let message_id = message_id.0;
        let held = HeldMessage::get(message_id).await?;
        let html = MessageSummary::from_held(&held)?
            .message_body_html
            .ok_or_else(|| {
                raise_error!(
                    format!("Message with id={} has no HTML part", message_id),
                    ErrorCode::ResourceNotFound
                )
            })?;
        Ok(Html(replace_with_rest_path(message_id, &html)))
    }

    #[oai(
        path = "/messages/:message_id/text",
        method = "get",
        operation_id = "get_message_text"
    )]
    async fn get_message_text(&self, message_id: Path<u64>) -> ApiResult<PlainText<String>> {
        let message_id = message_id.0;
        let held = HeldMessage::get(message_id).await?;
        let text = MessageSummary::from_held(&held)?
            .message_body_text
            .ok_or_else(|| {
                raise_error!(
                    format!("Message with id={} has no text part", message_id),
                    ErrorCode::ResourceNotFound
                )
            })?;
        Ok(PlainText(text))
    }

    /// Returns the mail exactly as it was received.
    #[oai(
        path = "/messages/:message_id/raw",
        method = "get",
        operation_id = "get_message_raw"
    )]
    async fn get_message_raw(&self, message_id: Path<u64>) -> ApiResult<RawResponse> {
        let held = HeldMessage::get(message_id.0).await?;
        Ok(RawResponse::Ok(Binary(held.raw)))
    }

    /// Re-sends a held mail to the given recipient through the outgoing relay.
    #[oai(
        path = "/messages/:message_id/forward",
        method = "post",
        operation_id = "forward_message"
    )]
    async fn forward_message(
        &self,
        message_id: Path<u64>,
        payload: Json<MessageForwardCommand>,
        relay: Data<&RelayConfig>,
    ) -> ApiResult<ForwardResponse> {
        forward_message(
            relay.0,
            &SETTINGS.holdmail_forward_sender,
            message_id.0,
            &payload.0.recipient,
        )
        .await?;
        Ok(ForwardResponse::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use crate::modules::common::rustls::install_test_crypto_provider;
    use crate::modules::error::code::ErrorCode;
    use crate::modules::message::entity::{HeldMessage, IncomingMessage, StoredMessage};
    use crate::modules::message::list::find_messages;
    use crate::modules::rest::build_routes;
    use crate::modules::smtp::client::RelayConfig;
    use crate::modules::smtp::receiver::serve;
    use crate::modules::utils::shutdown::ShutdownHandle;
    use poem::http::StatusCode;
    use poem::test::TestClient;
    use poem::Endpoint;
    use serde_json::json;
    use tokio::net::TcpListener;

    const NEWSLETTER: &str = "From: news@example.com\r\n\
To: rest-api@example.com\r\n\
Subject: Newsletter\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/related; boundary=\"rel\"\r\n\
\r\n\
--rel\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<img src=\"cid:banner@news\">\r\n\
--rel\r\n\
Content-Type: image/png\r\n\
Content-ID: <banner@news>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8=\r\n\
--rel--\r\n";

    async fn hold_newsletter() -> u64 {
        StoredMessage::save(IncomingMessage {
            mail_from: "news@example.com".into(),
            rcpt_to: vec!["rest-api@example.com".into()],
            sender_host: "127.0.0.1".into(),
            raw: NEWSLETTER.as_bytes().to_vec(),
        })
        .await
        .unwrap()
    }

    async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn routes() -> impl Endpoint {
        build_routes(RelayConfig::local(unused_port().await))
    }

    #[tokio::test]
    async fn unknown_message_is_404_with_error_body() {
        let cli = TestClient::new(routes().await);
        let resp = cli.get(format!("/rest/messages/{}", u64::MAX)).send().await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.json()
            .await
            .value()
            .object()
            .get("code")
            .assert_i64(ErrorCode::ResourceNotFound as i64);
    }

    #[tokio::test]
    async fn list_rejects_invalid_recipient_filter() {
        let cli = TestClient::new(routes().await);
        let resp = cli
            .get("/rest/messages")
            .query("recipient", &"not-an-address")
            .send()
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters_by_recipient() {
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);
        let resp = cli
            .get("/rest/messages")
            .query("recipient", &"rest-api@example.com")
            .send()
            .await;
        resp.assert_status_is_ok();
        let json = resp.json().await;
        let messages = json.value().object().get("messages").object_array();
        assert!(messages
            .iter()
            .any(|m| m.get("message_id").i64() == id as i64));
        for message in messages {
            message.get("subject").assert_string("Newsletter");
        }
    }

    #[tokio::test]
    async fn html_points_cid_images_at_the_content_endpoint() {
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);

        let resp = cli.get(format!("/rest/messages/{}/html", id)).send().await;
        resp.assert_status_is_ok();
        resp.assert_content_type("text/html; charset=utf-8");
        let html = resp.0.into_body().into_string().await.unwrap();
        assert!(html.contains(&format!(
            "<img src=\"/rest/messages/{}/content/banner@news\">",
            id
        )));
        assert!(!html.contains("cid:"));

        let resp = cli
            .get(format!("/rest/messages/{}/content/banner@news", id))
            .send()
            .await;
        resp.assert_status_is_ok();
        resp.assert_content_type("image/png");
        resp.assert_bytes(b"hello").await;
    }

    #[tokio::test]
    async fn missing_parts_are_404() {
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);
        cli.get(format!("/rest/messages/{}/text", id))
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
        cli.get(format!("/rest/messages/{}/content/nothing@here", id))
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn raw_is_returned_unchanged() {
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);
        let resp = cli.get(format!("/rest/messages/{}/raw", id)).send().await;
        resp.assert_status_is_ok();
        resp.assert_content_type("text/plain");
        resp.assert_bytes(NEWSLETTER.as_bytes()).await;
    }

    #[tokio::test]
    async fn raw_keeps_eight_bit_bytes() {
        let mut raw = b"Subject: raw latin1\r\n\r\ncaf".to_vec();
        raw.extend_from_slice(&[0xE9, b'\r', b'\n']);
        let id = StoredMessage::save(IncomingMessage {
            mail_from: "news@example.com".into(),
            rcpt_to: vec!["rest-raw@example.com".into()],
            sender_host: "127.0.0.1".into(),
            raw: raw.clone(),
        })
        .await
        .unwrap();

        let cli = TestClient::new(routes().await);
        let resp = cli.get(format!("/rest/messages/{}/raw", id)).send().await;
        resp.assert_status_is_ok();
        resp.assert_bytes(raw).await;
    }

    #[tokio::test]
    async fn forward_is_accepted_and_reaches_the_relay() {
        install_test_crypto_provider();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (stop, shutdown) = ShutdownHandle::manual();
        let server = tokio::spawn(serve(listener, shutdown, 64 * 1024));

        let id = hold_newsletter().await;
        let cli = TestClient::new(build_routes(RelayConfig::local(port)));
        let resp = cli
            .post(format!("/rest/messages/{}/forward", id))
            .body_json(&json!({ "recipient": "rest-forward-target@example.com" }))
            .send()
            .await;
        resp.assert_status(StatusCode::ACCEPTED);

        let arrived = find_messages(Some("rest-forward-target@example.com"))
            .await
            .unwrap();
        assert_eq!(arrived.messages.len(), 1);
        let copy = HeldMessage::get(arrived.messages[0].message_id)
            .await
            .unwrap();
        assert_eq!(copy.message.subject, "Newsletter");
        assert!(copy.raw.starts_with(NEWSLETTER.as_bytes()));

        stop.send(true).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn forward_validates_before_relaying() {
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);

        cli.post(format!("/rest/messages/{}/forward", id))
            .body_json(&json!({ "recipient": "nope" }))
            .send()
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        cli.post(format!("/rest/messages/{}/forward", u64::MAX))
            .body_json(&json!({ "recipient": "someone@example.com" }))
            .send()
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn relay_failure_is_a_server_error() {
        install_test_crypto_provider();
        let id = hold_newsletter().await;
        let cli = TestClient::new(routes().await);
        let resp = cli
            .post(format!("/rest/messages/{}/forward", id))
            .body_json(&json!({ "recipient": "someone@example.com" }))
            .send()
            .await;
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        resp.json()
            .await
            .value()
            .object()
            .get("code")
            .assert_i64(ErrorCode::SmtpConnectionFailed as i64);
    }
}
