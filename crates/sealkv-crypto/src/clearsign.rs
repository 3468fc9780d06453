//! Clear-signed message framing.
//!
//! The cleartext stays readable: lines beginning with `-` are escaped as
//! `- -...`, then a newline and an armored signature block follow. Encoding
//! and decoding are exact inverses on arbitrary bytes.

use std::io::{self, Write};

use crate::{
    armor::{self, ArmorKind, ArmorWriter},
    error::ProviderError,
};

const BEGIN_SIGNED: &[u8] = b"-----BEGIN SEALKV SIGNED MESSAGE-----\n";
const SIGNATURE_MARKER: &[u8] = b"\n-----BEGIN SEALKV SIGNATURE-----";
const ESCAPE: &[u8] = b"- ";

/// A parsed clear-signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearSigned {
    pub cleartext: Vec<u8>,
    pub signature: Vec<u8>,
}

pub fn encode(sink: &mut dyn Write, cleartext: &[u8], signature: &[u8]) -> io::Result<()> {
    sink.write_all(BEGIN_SIGNED)?;
    for (i, line) in cleartext.split(|b| *b == b'\n').enumerate() {
        if i > 0 {
            sink.write_all(b"\n")?;
        }
        if line.first() == Some(&b'-') {
            sink.write_all(ESCAPE)?;
        }
        sink.write_all(line)?;
    }
    sink.write_all(b"\n")?;

    let mut armor = ArmorWriter::new(sink, ArmorKind::Signature)?;
    armor.write_all(signature)?;
    armor.finish()?;
    Ok(())
}

pub fn decode(message: &[u8]) -> Result<ClearSigned, ProviderError> {
    let rest = message
        .strip_prefix(BEGIN_SIGNED)
        .ok_or_else(|| malformed("missing signed message header"))?;
    let split = find(rest, SIGNATURE_MARKER).ok_or_else(|| malformed("missing signature block"))?;
    let (escaped, block) = (&rest[..split], &rest[split + 1..]);

    let mut cleartext = Vec::with_capacity(escaped.len());
    for (i, line) in escaped.split(|b| *b == b'\n').enumerate() {
        if i > 0 {
            cleartext.push(b'\n');
        }
        match line.strip_prefix(ESCAPE) {
            Some(unescaped) => cleartext.extend_from_slice(unescaped),
            None if line.first() == Some(&b'-') => {
                return Err(malformed("unescaped dash line in cleartext"))
            }
            None => cleartext.extend_from_slice(line),
        }
    }

    let armored = armor::decode(block).map_err(|e| malformed(e.to_string()))?;
    if armored.kind != ArmorKind::Signature {
        return Err(malformed("trailing block is not a signature"));
    }
    Ok(ClearSigned {
        cleartext,
        signature: armored.body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn malformed(reason: impl Into<String>) -> ProviderError {
    ProviderError::MalformedSignedMessage(reason.into())
}
