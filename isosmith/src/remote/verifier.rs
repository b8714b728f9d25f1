//! Content validators applied before any bytes are trusted.

use std::io::{self, Read, Seek, SeekFrom};

use super::stream::{self, DigestKind, DigestSink};
use crate::error::{FetchError, FetchResult, VerificationError};

/// Decides whether a stream's content can be trusted.
///
/// Verification never moves the stream: on every outcome it is left at the
/// start, ready to be read or verified again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verifier {
    /// Accepts any non-empty stream.
    ContentPresence,

    /// Accepts a stream whose digest equals `expected` (lower-case hex,
    /// compared case-sensitively).
    ChecksumMatch { kind: DigestKind, expected: String },
}

impl Default for Verifier {
    fn default() -> Self {
        Self::ContentPresence
    }
}

impl Verifier {
    /// Verifier that only requires content to be present.
    pub fn content() -> Self {
        Self::ContentPresence
    }

    /// MD5 verifier.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MissingChecksum`] if `expected` is empty. This is
    /// a construction error, not a verification failure, so it is never retried.
    pub fn md5(expected: impl Into<String>) -> FetchResult<Self> {
        Self::checksum(DigestKind::Md5, expected)
    }

    /// SHA-256 verifier. Fails like [`Verifier::md5`] on an empty digest.
    pub fn sha256(expected: impl Into<String>) -> FetchResult<Self> {
        Self::checksum(DigestKind::Sha256, expected)
    }

    fn checksum(kind: DigestKind, expected: impl Into<String>) -> FetchResult<Self> {
        let expected = expected.into();
        let expected = expected.trim();
        if expected.is_empty() {
            return Err(FetchError::MissingChecksum);
        }
        Ok(Self::ChecksumMatch {
            kind,
            expected: expected.to_string(),
        })
    }

    /// The digest this verifier expects, if it checks one.
    pub fn expected_checksum(&self) -> Option<&str> {
        match self {
            Self::ContentPresence => None,
            Self::ChecksumMatch { expected, .. } => Some(expected),
        }
    }

    /// Check `stream`, restoring its position to the start afterwards.
    pub fn verify<S>(&self, stream: &mut S) -> FetchResult<()>
    where
        S: Read + Seek + ?Sized,
    {
        match self {
            Self::ContentPresence => verify_presence(stream),
            Self::ChecksumMatch { kind, expected } => verify_digest(stream, *kind, expected),
        }
    }
}

fn verify_presence<S>(stream: &mut S) -> FetchResult<()>
where
    S: Read + Seek + ?Sized,
{
    let mut first = [0u8; 1];
    let read = read_first_byte(stream, &mut first);
    stream.seek(SeekFrom::Start(0))?;

    if read? == 0 {
        return Err(VerificationError::NoContent.into());
    }
    Ok(())
}

fn read_first_byte<S>(stream: &mut S, first: &mut [u8]) -> io::Result<usize>
where
    S: Read + ?Sized,
{
    loop {
        match stream.read(first) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn verify_digest<S>(stream: &mut S, kind: DigestKind, expected: &str) -> FetchResult<()>
where
    S: Read + Seek + ?Sized,
{
    let mut sink = DigestSink::new(kind);
    stream::copy(stream, &mut sink)?;
    let actual = sink.hex_digest();

    if actual != expected {
        return Err(VerificationError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}
