// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

/// RFC 5321 requires accepting at least 100 recipients per transaction.
pub const MAX_RECIPIENTS: usize = 100;

/// Envelope and data collected between `MAIL FROM` and the end of `DATA`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailTransaction {
    /// Reverse path, empty for the null sender `<>`.
    pub mail_from: Option<String>,
    pub rcpt_to: Vec<String>,
    pub data: Vec<u8>,
}

impl MailTransaction {
    pub fn reset(&mut self) {
        self.mail_from = None;
        self.rcpt_to.clear();
        self.data.clear();
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Reply(String),
    /// Answer 354 and switch to reading message data.
    BeginData,
    /// Answer 221 and close the connection.
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DataProgress {
    More,
    Complete(MailTransaction),
    TooLarge,
}

/// Protocol state of one inbound SMTP connection. I/O lives in the receiver.
pub struct SmtpSession {
    hostname: String,
    max_message_size: u64,
    greeted: bool,
    in_data: bool,
    oversized: bool,
    transaction: MailTransaction,
}

fn reply(line: &str) -> Action {
    Action::Reply(line.to_string())
}

/// Extracts the address of `FROM:<addr> params` / `TO:<addr> params`.
fn parse_path(argument: &str, keyword: &str) -> Option<String> {
    let head = argument.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = argument[keyword.len()..].trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    if let Some(bracketed) = rest.strip_prefix('<') {
        let end = bracketed.find('>')?;
        Some(bracketed[..end].trim().to_string())
    } else {
        let address = rest.split_whitespace().next()?;
        Some(address.to_string())
    }
}

impl SmtpSession {
    pub fn new(hostname: impl Into<String>, max_message_size: u64) -> Self {
        Self {
            hostname: hostname.into(),
            max_message_size,
            greeted: false,
            in_data: false,
            oversized: false,
            transaction: MailTransaction::default(),
        }
    }

    pub fn greeting(&self) -> String {
        format!("220 {} HoldMail ESMTP ready", self.hostname)
    }

    pub fn in_data(&self) -> bool {
        self.in_data
    }

    pub fn handle_command(&mut self, line: &str) -> Action {
        let line = line.trim();
        let (verb, argument) = match line.split_once(' ') {
            Some((verb, argument)) => (verb, argument.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_uppercase().as_str() {
            "HELO" | "EHLO" if argument.is_empty() => {
                reply("501 5.5.4 Syntax: HELO/EHLO hostname")
            }
            "HELO" => {
                self.greeted = true;
                self.transaction.reset();
                Action::Reply(format!("250 {}", self.hostname))
            }
            "EHLO" => {
                self.greeted = true;
                self.transaction.reset();
                Action::Reply(format!(
                    "250-{}\r\n250-SIZE {}\r\n250-8BITMIME\r\n250 HELP",
                    self.hostname, self.max_message_size
                ))
            }
            "MAIL" => {
                if !self.greeted {
                    return reply("503 5.5.1 Send HELO/EHLO first");
                }
                if self.transaction.mail_from.is_some() {
                    return reply("503 5.5.1 Nested MAIL command");
                }
                match parse_path(argument, "FROM") {
                    Some(address) => {
                        self.transaction.mail_from = Some(address);
                        reply("250 2.1.0 OK")
                    }
                    None => reply("501 5.5.4 Syntax: MAIL FROM:<address>"),
                }
            }
            "RCPT" => {
                if self.transaction.mail_from.is_none() {
                    return reply("503 5.5.1 Need MAIL before RCPT");
                }
                match parse_path(argument, "TO") {
                    Some(address) if !address.is_empty() => {
                        if self.transaction.rcpt_to.len() >= MAX_RECIPIENTS {
                            return reply("452 4.5.3 Too many recipients");
                        }
                        self.transaction.rcpt_to.push(address);
                        reply("250 2.1.5 OK")
                    }
                    _ => reply("501 5.5.4 Syntax: RCPT TO:<address>"),
                }
            }
            "DATA" => {
                if self.transaction.rcpt_to.is_empty() {
                    return reply("503 5.5.1 Need RCPT before DATA");
                }
                self.in_data = true;
                self.oversized = false;
                self.transaction.data.clear();
                Action::BeginData
            }
            "RSET" => {
                self.transaction.reset();
                reply("250 2.0.0 OK")
            }
            "NOOP" => reply("250 2.0.0 OK"),
            "QUIT" => Action::Quit,
            _ => reply("502 5.5.2 Command not recognized"),
        }
    }

    /// Feeds one line of message data, without its line terminator.
    pub fn push_data_line(&mut self, line: &[u8]) -> DataProgress {
        if line == b"." {
            self.in_data = false;
            if self.oversized {
                self.oversized = false;
                self.transaction.reset();
                return DataProgress::TooLarge;
            }
            let completed = std::mem::take(&mut self.transaction);
            return DataProgress::Complete(completed);
        }
        if self.oversized {
            return DataProgress::More;
        }

        let content = line.strip_prefix(b".").unwrap_or(line);
        let projected = self.transaction.data.len() + content.len() + 2;
        if projected as u64 > self.max_message_size {
            self.oversized = true;
            self.transaction.data.clear();
            return DataProgress::More;
        }
        self.transaction.data.extend_from_slice(content);
        self.transaction.data.extend_from_slice(b"\r\n");
        DataProgress::More
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_for_data(session: &mut SmtpSession) {
        assert!(matches!(session.handle_command("EHLO client.test"), Action::Reply(r) if r.starts_with("250-")));
        assert_eq!(
            session.handle_command("MAIL FROM:<sender@example.com> SIZE=100"),
            Action::Reply("250 2.1.0 OK".into())
        );
        assert_eq!(
            session.handle_command("rcpt to: <rcpt@example.com>"),
            Action::Reply("250 2.1.5 OK".into())
        );
        assert_eq!(session.handle_command("DATA"), Action::BeginData);
        assert!(session.in_data());
    }

    #[test]
    fn full_transaction_with_dot_unstuffing() {
        let mut session = SmtpSession::new("holdmail.test", 1024);
        ready_for_data(&mut session);

        for line in ["Subject: dots", "", "..leading dot", "body"] {
            assert_eq!(session.push_data_line(line.as_bytes()), DataProgress::More);
        }
        match session.push_data_line(b".") {
            DataProgress::Complete(tx) => {
                assert_eq!(tx.mail_from.as_deref(), Some("sender@example.com"));
                assert_eq!(tx.rcpt_to, vec!["rcpt@example.com".to_string()]);
                assert_eq!(tx.data, b"Subject: dots\r\n\r\n.leading dot\r\nbody\r\n");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!session.in_data());

        // The session stays greeted and accepts a second mail.
        assert_eq!(
            session.handle_command("MAIL FROM:<>"),
            Action::Reply("250 2.1.0 OK".into())
        );
    }

    #[test]
    fn commands_out_of_sequence_are_rejected() {
        let mut session = SmtpSession::new("holdmail.test", 1024);
        assert_eq!(
            session.handle_command("MAIL FROM:<a@example.com>"),
            Action::Reply("503 5.5.1 Send HELO/EHLO first".into())
        );
        session.handle_command("HELO client");
        assert_eq!(
            session.handle_command("RCPT TO:<a@example.com>"),
            Action::Reply("503 5.5.1 Need MAIL before RCPT".into())
        );
        session.handle_command("MAIL FROM:<a@example.com>");
        assert_eq!(
            session.handle_command("DATA"),
            Action::Reply("503 5.5.1 Need RCPT before DATA".into())
        );
        assert_eq!(
            session.handle_command("MAIL FROM:<b@example.com>"),
            Action::Reply("503 5.5.1 Nested MAIL command".into())
        );
        assert_eq!(
            session.handle_command("RSET"),
            Action::Reply("250 2.0.0 OK".into())
        );
        assert_eq!(
            session.handle_command("MAIL FROM:<b@example.com>"),
            Action::Reply("250 2.1.0 OK".into())
        );
    }

    #[test]
    fn malformed_and_unknown_commands() {
        let mut session = SmtpSession::new("holdmail.test", 1024);
        assert_eq!(
            session.handle_command("EHLO"),
            Action::Reply("501 5.5.4 Syntax: HELO/EHLO hostname".into())
        );
        session.handle_command("HELO client");
        assert_eq!(
            session.handle_command("MAIL TO:<a@example.com>"),
            Action::Reply("501 5.5.4 Syntax: MAIL FROM:<address>".into())
        );
        session.handle_command("MAIL FROM:<a@example.com>");
        assert_eq!(
            session.handle_command("RCPT TO:<>"),
            Action::Reply("501 5.5.4 Syntax: RCPT TO:<address>".into())
        );
        assert_eq!(
            session.handle_command("VRFY alice"),
            Action::Reply("502 5.5.2 Command not recognized".into())
        );
        assert_eq!(session.handle_command("quit"), Action::Quit);
    }

    #[test]
    fn oversized_data_is_discarded() {
        let mut session = SmtpSession::new("holdmail.test", 16);
        ready_for_data(&mut session);
        assert_eq!(session.push_data_line(b"0123456789"), DataProgress::More);
        assert_eq!(session.push_data_line(b"0123456789"), DataProgress::More);
        assert_eq!(session.push_data_line(b"."), DataProgress::TooLarge);
        assert!(!session.in_data());
        assert_eq!(
            session.handle_command("DATA"),
            Action::Reply("503 5.5.1 Need RCPT before DATA".into())
        );
    }

    #[test]
    fn non_utf8_data_is_kept_as_is() {
        let mut session = SmtpSession::new("holdmail.test", 1024);
        ready_for_data(&mut session);
        session.push_data_line(b"Content-Transfer-Encoding: 8bit");
        session.push_data_line(b"");
        session.push_data_line(&[b'c', b'a', b'f', 0xE9]);
        match session.push_data_line(b".") {
            DataProgress::Complete(tx) => {
                assert!(tx.data.ends_with(&[b'f', 0xE9, b'\r', b'\n']));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn recipients_are_capped_per_transaction() {
        let mut session = SmtpSession::new("holdmail.test", 1024);
        session.handle_command("HELO client");
        session.handle_command("MAIL FROM:<a@example.com>");
        for n in 0..MAX_RECIPIENTS {
            assert_eq!(
                session.handle_command(&format!("RCPT TO:<r{}@example.com>", n)),
                Action::Reply("250 2.1.5 OK".into())
            );
        }
        assert_eq!(
            session.handle_command("RCPT TO:<one-more@example.com>"),
            Action::Reply("452 4.5.3 Too many recipients".into())
        );
        assert_eq!(session.handle_command("DATA"), Action::BeginData);
        session.push_data_line(b"Subject: many");
        match session.push_data_line(b".") {
            DataProgress::Complete(tx) => assert_eq!(tx.rcpt_to.len(), MAX_RECIPIENTS),
            other => panic!("unexpected {:?}", other),
        }

        // A fresh transaction starts with an empty list again.
        session.handle_command("MAIL FROM:<a@example.com>");
        assert_eq!(
            session.handle_command("RCPT TO:<again@example.com>"),
            Action::Reply("250 2.1.5 OK".into())
        );
    }
}
