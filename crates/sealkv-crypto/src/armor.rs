//! ASCII armor for binary crypto output.
//!
//! ```text
//! -----BEGIN SEALKV MESSAGE-----
//! Content-Type: text/plain;charset=us-ascii
//!
//! <base64, 64 columns>
//! -----END SEALKV MESSAGE-----
//! ```

use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

const PREFIX_BEGIN: &str = "-----BEGIN SEALKV ";
const PREFIX_END: &str = "-----END SEALKV ";
const SUFFIX: &str = "-----";
/// Raw bytes per armored line (encodes to exactly 64 base64 characters).
const LINE_BYTES: usize = 48;

pub const DEFAULT_HEADERS: &[(&str, &str)] = &[("Content-Type", "text/plain;charset=us-ascii")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    Message,
    Signature,
}

impl ArmorKind {
    fn label(self) -> &'static str {
        match self {
            ArmorKind::Message => "MESSAGE",
            ArmorKind::Signature => "SIGNATURE",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "MESSAGE" => Some(ArmorKind::Message),
            "SIGNATURE" => Some(ArmorKind::Signature),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArmorError {
    #[error("armor is not valid utf-8")]
    NotText,
    #[error("missing armor header line")]
    MissingBegin,
    #[error("unknown armor type: {0}")]
    UnknownKind(String),
    #[error("malformed armor header: {0}")]
    Header(String),
    #[error("missing armor footer for {0}")]
    MissingEnd(&'static str),
    #[error("armor footer {found} does not match {expected}")]
    MismatchedEnd { expected: &'static str, found: String },
    #[error("invalid armor body: {0}")]
    Body(String),
}

/// Decoded armor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Armored {
    pub kind: ArmorKind,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Streaming armor encoder. Bytes written are base64-encoded line by line;
/// [`ArmorWriter::finish`] flushes the last partial line and writes the footer.
pub struct ArmorWriter<W: Write> {
    inner: W,
    kind: ArmorKind,
    pending: Vec<u8>,
}

impl<W: Write> ArmorWriter<W> {
    pub fn new(inner: W, kind: ArmorKind) -> io::Result<Self> {
        Self::with_headers(inner, kind, DEFAULT_HEADERS)
    }

    pub fn with_headers(
        mut inner: W,
        kind: ArmorKind,
        headers: &[(&str, &str)],
    ) -> io::Result<Self> {
        writeln!(inner, "{PREFIX_BEGIN}{}{SUFFIX}", kind.label())?;
        for (name, value) in headers {
            writeln!(inner, "{name}: {value}")?;
        }
        writeln!(inner)?;
        Ok(Self {
            inner,
            kind,
            pending: Vec::with_capacity(LINE_BYTES),
        })
    }

    pub fn finish(mut self) -> io::Result<W> {
        if !self.pending.is_empty() {
            let line = STANDARD.encode(&self.pending);
            writeln!(self.inner, "{line}")?;
            self.pending.clear();
        }
        writeln!(self.inner, "{PREFIX_END}{}{SUFFIX}", self.kind.label())?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn drain_full_lines(&mut self) -> io::Result<()> {
        while self.pending.len() >= LINE_BYTES {
            let line = STANDARD.encode(&self.pending[..LINE_BYTES]);
            writeln!(self.inner, "{line}")?;
            self.pending.drain(..LINE_BYTES);
        }
        Ok(())
    }
}

impl<W: Write> Write for ArmorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_full_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Armor `data` in one call.
pub fn encode(kind: ArmorKind, data: &[u8]) -> io::Result<Vec<u8>> {
    let mut writer = ArmorWriter::new(Vec::new(), kind)?;
    writer.write_all(data)?;
    writer.finish()
}

/// Parse one armor block. Leading blank lines are ignored; anything after
/// the footer is ignored.
pub fn decode(input: &[u8]) -> Result<Armored, ArmorError> {
    let text = std::str::from_utf8(input).map_err(|_| ArmorError::NotText)?;
    let mut lines = text.lines().map(|l| l.trim_end_matches('\r'));

    let begin = lines
        .by_ref()
        .find(|l| !l.trim().is_empty())
        .ok_or(ArmorError::MissingBegin)?;
    let label = begin
        .strip_prefix(PREFIX_BEGIN)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .ok_or(ArmorError::MissingBegin)?;
    let kind =
        ArmorKind::from_label(label).ok_or_else(|| ArmorError::UnknownKind(label.to_string()))?;

    let mut headers = Vec::new();
    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(": ")
            .ok_or_else(|| ArmorError::Header(line.to_string()))?;
        headers.push((name.to_string(), value.to_string()));
    }

    let mut encoded = String::new();
    let mut closed = false;
    for line in lines {
        if let Some(rest) = line.strip_prefix(PREFIX_END) {
            let found = rest.strip_suffix(SUFFIX).unwrap_or(rest);
            if found != kind.label() {
                return Err(ArmorError::MismatchedEnd {
                    expected: kind.label(),
                    found: found.to_string(),
                });
            }
            closed = true;
            break;
        }
        encoded.push_str(line.trim());
    }
    if !closed {
        return Err(ArmorError::MissingEnd(kind.label()));
    }

    let body = STANDARD
        .decode(encoded)
        .map_err(|e| ArmorError::Body(e.to_string()))?;
    Ok(Armored {
        kind,
        headers,
        body,
    })
}
