//! The frame: one discrete protocol message.
//!
//! A frame is a command line, a set of `key:value` headers, and an optional
//! text body. On the wire it looks like this (`^@` is the NUL terminator):
//!
//! ```text
//! SEND
//! destination:/topic/news
//! receipt:7
//!
//! hello world^@
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The command that opens every frame.
///
/// Commands the server does not know decode into [`Command::Unknown`]
/// rather than failing: an unrecognised command is a protocol violation the
/// engine answers with an ERROR frame, not a framing error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
    /// Anything else, carried verbatim.
    Unknown(String),
}

impl Command {
    /// Returns the wire spelling of the command.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns `true` for commands only the server may send.
    pub fn is_server_only(&self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Message | Self::Receipt | Self::Error
        )
    }
}

impl From<&str> for Command {
    fn from(raw: &str) -> Self {
        match raw {
            "CONNECT" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A single protocol frame.
///
/// Headers are kept in insertion order so encoding is deterministic.
/// Setting a header that already exists replaces its value in place
/// (last write wins). An empty body and an absent body are the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Vec<(String, String)>,
    body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder-style [`set_header`](Self::set_header).
    pub fn with_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_header(key, value);
        self
    }

    /// Builder-style [`set_body`](Self::set_body).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Looks up a header by its exact (case-sensitive) name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Like [`header`](Self::header), but treats an empty value as absent.
    pub fn non_empty_header(&self, key: &str) -> Option<&str> {
        self.header(key).filter(|v| !v.is_empty())
    }

    /// Sets a header, replacing any existing value for the same key.
    pub fn set_header(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.headers.push((key, value)),
        }
    }

    /// Iterates over headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Serializes the frame to its wire text, without the NUL terminator.
    ///
    /// This is also the "verbatim serialization" quoted inside ERROR
    /// frame bodies.
    pub fn to_wire_string(&self) -> String {
        let mut out = String::with_capacity(
            self.command.as_str().len() + self.body.len() + 64,
        );
        out.push_str(self.command.as_str());
        out.push('\n');
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }

    /// Parses the text of one frame (everything before the terminator).
    ///
    /// Returns `None` for input with no content at all, such as the bare
    /// newlines clients send as keepalives.
    ///
    /// Parsing is lenient the way deployed clients expect: header lines
    /// without a colon are skipped, and only the first colon splits key
    /// from value.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines: Vec<&str> = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        let (first, rest) = lines.split_first()?;

        let mut frame = Frame::new(Command::from(first.trim()));

        let mut i = 0;
        while i < rest.len() && !rest[i].is_empty() {
            match rest[i].split_once(':') {
                Some((key, value)) => {
                    frame.set_header(key.trim(), value.trim());
                }
                None => {
                    tracing::debug!(
                        line = rest[i],
                        "skipping header line without a colon"
                    );
                }
            }
            i += 1;
        }

        // Skip the blank separator; whatever follows is the body.
        if i < rest.len() {
            frame.body = rest[i + 1..].join("\n");
        }

        Some(frame)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}
