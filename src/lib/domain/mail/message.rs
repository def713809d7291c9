//! Message and file value types

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of an encoded line, excluding the CRLF (RFC 2045 §6.8).
const ENCODED_LINE_LENGTH: usize = 76;

/// A file carried by a [`Message`], either inline or as an attachment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// The file name announced in `Content-Type` and `Content-Disposition`
    pub name: String,

    /// The MIME type, e.g. `image/png`
    #[serde(rename = "type")]
    pub content_type: String,

    /// The file content, already base64 encoded
    pub content: String,
}

impl File {
    /// Create a file from content that is already base64 encoded.
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// Create a file from raw bytes.
    ///
    /// The bytes are base64 encoded and broken into 76 column lines joined by CRLF,
    /// so the result can be placed on the wire as is.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl AsRef<[u8]>,
    ) -> Self {
        let encoded = STANDARD.encode(bytes);

        let lines: Vec<&str> = encoded
            .as_bytes()
            .chunks(ENCODED_LINE_LENGTH)
            // base64 output is always ASCII
            .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
            .collect();

        Self::new(name, content_type, lines.join("\r\n"))
    }
}

/// An e-mail message ready to be rendered and submitted.
///
/// Empty strings in the optional fields are treated the same as [`None`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// The value of the `Message-ID` header
    pub id: String,

    /// The sender mailbox, e.g. `Jane <jane@example.com>`
    pub from: String,

    /// Comma separated recipient mailboxes
    pub to: String,

    /// Comma separated carbon copy mailboxes
    pub cc: Option<String>,

    /// The subject line
    pub subject: String,

    /// The plain text body, preferred over [`Message::body_html`] when both are set
    pub body_text: Option<String>,

    /// The HTML body
    pub body_html: Option<String>,

    /// Files shown inline, rendered in order before the attachments
    pub inlines: Vec<File>,

    /// Files attached to the message, rendered in order
    pub attachments: Vec<File>,
}

impl Message {
    /// Create a message with a sender and recipients and nothing else.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    /// Generate a fresh message id of the form `<uuid@domain>`.
    pub fn generate_id(domain: &str) -> String {
        format!("<{}@{}>", Uuid::now_v7(), domain)
    }

    /// The carbon copy list, if there is one.
    pub fn cc(&self) -> Option<&str> {
        non_empty(self.cc.as_deref())
    }

    /// The body that gets rendered along with its MIME type.
    ///
    /// The text body wins when both bodies are set; the HTML body is then dropped.
    pub fn body(&self) -> Option<(&str, &'static str)> {
        non_empty(self.body_text.as_deref())
            .map(|text| (text, "text/plain"))
            .or_else(|| non_empty(self.body_html.as_deref()).map(|html| (html, "text/html")))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn test_text_body_wins_over_html() {
        let message = Message {
            body_text: Some("hello".to_string()),
            body_html: Some("<p>hello</p>".to_string()),
            ..Default::default()
        };

        assert_eq!(message.body(), Some(("hello", "text/plain")));
    }

    #[test]
    fn test_empty_text_body_falls_back_to_html() {
        let message = Message {
            body_text: Some(String::new()),
            body_html: Some("<p>hello</p>".to_string()),
            ..Default::default()
        };

        assert_eq!(message.body(), Some(("<p>hello</p>", "text/html")));
    }

    #[test]
    fn test_no_body() {
        assert_eq!(Message::new("a@x.com", "b@x.com").body(), None);
    }

    #[test]
    fn test_empty_cc_is_absent() {
        let message = Message {
            cc: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(message.cc(), None);
    }

    #[test]
    fn test_generated_id_is_bracketed_and_unique() {
        let first = Message::generate_id("example.com");
        let second = Message::generate_id("example.com");

        assert!(first.starts_with('<'));
        assert!(first.ends_with("@example.com>"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_file_from_bytes_wraps_lines() {
        let file = File::from_bytes("data.bin", "application/octet-stream", vec![0u8; 120]);

        let lines: Vec<&str> = file.content.split("\r\n").collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 76);
        assert_eq!(lines[2].len(), 8);
    }

    #[test]
    fn test_file_from_bytes_short_content() {
        let file = File::from_bytes("hello.txt", "text/plain", "hello");

        assert_eq!(file.content, "aGVsbG8=");
    }

    #[test]
    fn test_message_from_json() -> TestResult {
        let message: Message = serde_json::from_str(
            r#"{
                "id": "<1@example.com>",
                "from": "a@x.com",
                "to": "b@x.com",
                "subject": "Hi",
                "body_text": "hello",
                "attachments": [{ "name": "a.txt", "type": "text/plain", "content": "YQ==" }]
            }"#,
        )?;

        assert_eq!(message.subject, "Hi");
        assert_eq!(message.cc, None);
        assert!(message.inlines.is_empty());
        assert_eq!(
            message.attachments,
            vec![File::new("a.txt", "text/plain", "YQ==")]
        );

        Ok(())
    }
}
