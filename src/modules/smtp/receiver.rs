// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::HoldMailResult;
use crate::modules::message::entity::{IncomingMessage, StoredMessage};
use crate::modules::settings::cli::SETTINGS;
use crate::modules::smtp::session::{Action, DataProgress, SmtpSession};
use crate::modules::utils::shutdown::ShutdownHandle;
use crate::raise_error;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Instrument};

const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const HOSTNAME: &str = "holdmail";

pub async fn start_smtp_server(shutdown: ShutdownHandle) -> HoldMailResult<()> {
    let bind_ip = SETTINGS
        .holdmail_bind_ip
        .clone()
        .unwrap_or("0.0.0.0".into());
    let listener = TcpListener::bind((bind_ip.as_str(), SETTINGS.holdmail_smtp_port))
        .await
        .map_err(|e| {
            raise_error!(
                format!(
                    "Failed to bind SMTP listener on {}:{}: {:#?}",
                    bind_ip, SETTINGS.holdmail_smtp_port, e
                ),
                ErrorCode::InternalError
            )
        })?;
    println!(
        "HoldMail SMTP Service is now listening on port {}.",
        SETTINGS.holdmail_smtp_port
    );
    serve(listener, shutdown, SETTINGS.holdmail_max_message_size).await
}

/// Accepts connections until `shutdown` fires. Each connection gets its own task.
pub async fn serve(
    listener: TcpListener,
    mut shutdown: ShutdownHandle,
    max_message_size: u64,
) -> HoldMailResult<()> {
    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("SMTP listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let span = tracing::info_span!("smtp", peer = %peer);
                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, peer, max_message_size).await {
                                warn!("SMTP session ended with error: {}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => warn!("Failed to accept SMTP connection: {:#?}", e),
            }
        }
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &str) -> HoldMailResult<()> {
    writer
        .write_all(format!("{}\r\n", reply).as_bytes())
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;
    writer
        .flush()
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    while let Some((last, rest)) = line.split_last() {
        if *last != b'\n' && *last != b'\r' {
            break;
        }
        line = rest;
    }
    line
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    max_message_size: u64,
) -> HoldMailResult<()> {
    debug!("SMTP connection opened");
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut session = SmtpSession::new(HOSTNAME, max_message_size);
    // A single line never needs to be longer than a whole message.
    let max_line = max_message_size + 2;

    write_reply(&mut writer, &session.greeting()).await?;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::time::timeout(
            IDLE_TIMEOUT,
            (&mut reader).take(max_line).read_until(b'\n', &mut buf),
        )
        .await;
        let n = match read {
            Ok(result) => {
                result.map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?
            }
            Err(_) => {
                let _ = write_reply(&mut writer, "421 4.4.2 Idle timeout, closing connection").await;
                return Ok(());
            }
        };
        if n == 0 {
            debug!("SMTP client closed the connection");
            return Ok(());
        }

        let line = trim_line_ending(&buf);

        if session.in_data() {
            match session.push_data_line(line) {
                DataProgress::More => {}
                DataProgress::TooLarge => {
                    write_reply(&mut writer, "552 5.3.4 Message size exceeds fixed maximum").await?;
                }
                DataProgress::Complete(transaction) => {
                    let incoming = IncomingMessage {
                        mail_from: transaction.mail_from.unwrap_or_default(),
                        rcpt_to: transaction.rcpt_to,
                        sender_host: peer.ip().to_string(),
                        raw: transaction.data,
                    };
                    match StoredMessage::save(incoming).await {
                        Ok(id) => {
                            info!(message_id = id, "Held new message");
                            write_reply(&mut writer, &format!("250 2.0.0 OK: queued as {}", id))
                                .await?;
                        }
                        Err(e) => {
                            error!("Failed to store received message: {}", e);
                            write_reply(&mut writer, "451 4.3.0 Failed to store message").await?;
                        }
                    }
                }
            }
            continue;
        }

        match session.handle_command(&String::from_utf8_lossy(line)) {
            Action::Reply(reply) => write_reply(&mut writer, &reply).await?,
            Action::BeginData => {
                write_reply(&mut writer, "354 End data with <CR><LF>.<CR><LF>").await?
            }
            Action::Quit => {
                write_reply(&mut writer, "221 2.0.0 Bye").await?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::message::entity::HeldMessage;
    use crate::modules::message::list::find_messages;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::tcp::OwnedWriteHalf;

    async fn expect_code<R: tokio::io::AsyncBufRead + Unpin>(reader: &mut R, code: &str) {
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert!(line.starts_with(code), "expected {} got {:?}", code, line);
            // Multi-line replies continue with "<code>-".
            if line.as_bytes().get(3) != Some(&b'-') {
                return;
            }
        }
    }

    #[tokio::test]
    async fn receives_and_stores_a_mail_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, shutdown) = ShutdownHandle::manual();
        let server = tokio::spawn(serve(listener, shutdown, 64 * 1024));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        expect_code(&mut reader, "220").await;
        for (command, code) in [
            ("EHLO tester", "250"),
            ("MAIL FROM:<tcp-sender@example.com>", "250"),
            ("RCPT TO:<tcp-receiver@example.com>", "250"),
            ("DATA", "354"),
        ] {
            write_half
                .write_all(format!("{}\r\n", command).as_bytes())
                .await
                .unwrap();
            expect_code(&mut reader, code).await;
        }
        write_half
            .write_all(b"Subject: over tcp\r\n\r\n..hidden dot\r\n.\r\n")
            .await
            .unwrap();
        expect_code(&mut reader, "250").await;
        write_half.write_all(b"QUIT\r\n").await.unwrap();
        expect_code(&mut reader, "221").await;

        let list = find_messages(Some("tcp-receiver@example.com")).await.unwrap();
        assert_eq!(list.messages.len(), 1);
        let stored = StoredMessage::get(list.messages[0].message_id).await.unwrap();
        assert_eq!(stored.subject, "over tcp");
        assert_eq!(stored.sender_email, "tcp-sender@example.com");
        assert_eq!(stored.sender_host, "127.0.0.1");
        let held = HeldMessage::get(stored.id).await.unwrap();
        assert!(held.raw.ends_with(b"\r\n.hidden dot\r\n"));

        stop.send(true).unwrap();
        server.await.unwrap().unwrap();
    }

    async fn send_envelope<R: tokio::io::AsyncBufRead + Unpin>(
        reader: &mut R,
        writer: &mut OwnedWriteHalf,
        recipient: &str,
    ) {
        expect_code(reader, "220").await;
        for (command, code) in [
            ("EHLO tester".to_string(), "250"),
            ("MAIL FROM:<latin1-sender@example.com>".to_string(), "250"),
            (format!("RCPT TO:<{}>", recipient), "250"),
            ("DATA".to_string(), "354"),
        ] {
            writer
                .write_all(format!("{}\r\n", command).as_bytes())
                .await
                .unwrap();
            expect_code(reader, code).await;
        }
    }

    #[tokio::test]
    async fn eight_bit_body_is_stored_byte_for_byte() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, shutdown) = ShutdownHandle::manual();
        let server = tokio::spawn(serve(listener, shutdown, 64 * 1024));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        send_envelope(&mut reader, &mut write_half, "latin1-tcp@example.com").await;

        let mut data = b"Subject: latin1\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\r\ncaf"
            .to_vec();
        data.extend_from_slice(&[0xE9]);
        data.extend_from_slice(b"\r\n.\r\n");
        write_half.write_all(&data).await.unwrap();
        expect_code(&mut reader, "250").await;
        write_half.write_all(b"QUIT\r\n").await.unwrap();
        expect_code(&mut reader, "221").await;

        let list = find_messages(Some("latin1-tcp@example.com")).await.unwrap();
        assert_eq!(list.messages.len(), 1);
        let held = HeldMessage::get(list.messages[0].message_id).await.unwrap();
        assert!(held.raw.ends_with(&[b'c', b'a', b'f', 0xE9, b'\r', b'\n']));
        assert_eq!(held.message.subject, "latin1");
        assert_eq!(held.message.size, held.raw.len() as u64);

        stop.send(true).unwrap();
        server.await.unwrap().unwrap();
    }

    #[test]
    fn line_endings_are_trimmed_as_bytes() {
        assert_eq!(trim_line_ending(b"caf\xe9\r\n"), b"caf\xe9");
        assert_eq!(trim_line_ending(b".\n"), b".");
        assert_eq!(trim_line_ending(b"\r\n"), b"");
    }
}
