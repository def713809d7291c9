//! MIME multipart/mixed rendering

use std::fmt;

use chrono::{DateTime, Utc};

use super::{BoundaryGenerator, ExtraHeaders, File, Message, RandomBoundary};

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 +0000`
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

const CRLF: &str = "\r\n";

/// Renders [`Message`]s into multipart/mixed byte streams with CRLF line endings.
///
/// Rendering never fails. Header values, extra headers, file names and file types
/// are written verbatim; nothing is escaped or re-encoded.
#[derive(Clone, Default)]
pub struct MessageWriter<G = RandomBoundary> {
    boundaries: G,
}

impl<G> fmt::Debug for MessageWriter<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageWriter").finish_non_exhaustive()
    }
}

impl MessageWriter {
    /// Create a writer using random boundary tokens
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: BoundaryGenerator> MessageWriter<G> {
    /// Create a writer drawing boundary tokens from `boundaries`
    pub fn with_boundaries(boundaries: G) -> Self {
        Self { boundaries }
    }

    /// Render a message dated now.
    pub fn render(&self, message: &Message, extra_headers: &ExtraHeaders) -> Vec<u8> {
        self.render_at(message, extra_headers, Utc::now())
    }

    /// Render a message with the given `Date` header.
    ///
    /// A new boundary token is drawn on every call.
    pub fn render_at(
        &self,
        message: &Message,
        extra_headers: &ExtraHeaders,
        date: DateTime<Utc>,
    ) -> Vec<u8> {
        let mut part = Part {
            buffer: String::with_capacity(256),
            boundary: self.boundaries.generate(),
        };

        part.header("MIME-Version", "1.0");
        part.header("Message-ID", &message.id);
        part.header("Date", &date.format(DATE_FORMAT).to_string());
        part.header("From", &message.from);
        part.header("To", &message.to);
        if let Some(cc) = message.cc() {
            part.header("CC", cc);
        }
        if !message.subject.is_empty() {
            part.header("Subject", &message.subject);
        }
        for (name, value) in extra_headers.iter() {
            part.header(name, value);
        }
        let content_type = format!("multipart/mixed; boundary={}", part.boundary);
        part.header("Content-Type", &content_type);
        part.buffer.push_str(CRLF);

        match message.body() {
            Some((content, mime_type)) => part.text(content, mime_type),
            None => part.boundary(),
        }

        for file in &message.inlines {
            part.file(file, "inline");
        }
        for file in &message.attachments {
            part.file(file, "attachment");
        }

        part.close()
    }
}

/// Scratch state for one rendering pass
struct Part {
    buffer: String,
    boundary: String,
}

impl Part {
    fn header(&mut self, name: &str, value: &str) {
        self.buffer.push_str(name);
        self.buffer.push_str(": ");
        self.buffer.push_str(value);
        self.buffer.push_str(CRLF);
    }

    fn boundary(&mut self) {
        self.buffer.push_str("--");
        self.buffer.push_str(&self.boundary);
        self.buffer.push_str(CRLF);
    }

    fn content(&mut self, content: &str) {
        self.buffer.push_str(CRLF);
        self.buffer.push_str(content);
        self.buffer.push_str(CRLF);
        self.buffer.push_str(CRLF);
    }

    fn text(&mut self, content: &str, mime_type: &str) {
        self.boundary();
        self.header("Content-Type", &format!("{mime_type}; charset=UTF-8"));
        self.content(content);
    }

    fn file(&mut self, file: &File, disposition: &str) {
        self.boundary();
        self.header(
            "Content-Type",
            &format!("{}; name=\"{}\"", file.content_type, file.name),
        );
        self.header(
            "Content-Disposition",
            &format!("{}; filename=\"{}\"", disposition, file.name),
        );
        self.header("Content-Transfer-Encoding", "base64");
        self.content(&file.content);
    }

    fn close(mut self) -> Vec<u8> {
        self.buffer.push_str("--");
        self.buffer.push_str(&self.boundary);
        self.buffer.push_str("--");

        self.buffer.into_bytes()
    }
}
