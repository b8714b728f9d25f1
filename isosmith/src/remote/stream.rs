//! Chunked stream copying with truncate/rewind discipline.
//!
//! Every copy leaves both ends positioned at their start, whether it succeeds
//! or not, so the same stream can be verified, populated and read again
//! without the caller tracking offsets.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

use md5::Md5;
use sha2::{Digest, Sha256};

/// Chunk size used for all stream transfers (16 KiB).
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Destination of a [`copy`].
///
/// Destinations that can shrink or seek override the hooks; write-only sinks
/// such as digests keep the no-op defaults.
pub trait CopyTarget: Write {
    /// Discard any existing content before a copy begins.
    fn truncate_target(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Reposition at the start once a copy ends.
    fn rewind_target(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CopyTarget for File {
    fn truncate_target(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(io::SeekFrom::Start(0)).map(|_| ())
    }

    fn rewind_target(&mut self) -> io::Result<()> {
        self.flush()?;
        self.seek(io::SeekFrom::Start(0)).map(|_| ())
    }
}

impl CopyTarget for Cursor<Vec<u8>> {
    fn truncate_target(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }

    fn rewind_target(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }
}

/// Copy all of `from` into `to` in [`CHUNK_SIZE`] chunks.
///
/// `to` is truncated first, so a shorter payload never leaves stale trailing
/// bytes behind. Both streams are rewound afterwards; if the transfer failed,
/// its error wins over any rewind error.
pub fn copy<R, W>(from: &mut R, to: &mut W) -> io::Result<()>
where
    R: Read + Seek + ?Sized,
    W: CopyTarget + ?Sized,
{
    let transferred = transfer(from, to);
    let rewound = from
        .seek(io::SeekFrom::Start(0))
        .and_then(|_| to.rewind_target());
    transferred.and(rewound)
}

fn transfer<R, W>(from: &mut R, to: &mut W) -> io::Result<()>
where
    R: Read + ?Sized,
    W: CopyTarget + ?Sized,
{
    to.truncate_target()?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = match from.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        to.write_all(&buffer[..bytes_read])?;
    }

    Ok(())
}

/// Supported content digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    /// MD5, as listed in Release, MD5SUMS and Packages indices.
    Md5,
    /// SHA-256.
    Sha256,
}

impl DigestKind {
    /// Human-readable algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
        }
    }
}

/// Write-only sink that hashes everything written to it.
pub struct DigestSink {
    state: DigestState,
}

enum DigestState {
    Md5(Md5),
    Sha256(Sha256),
}

impl DigestSink {
    /// Create an empty sink for the given algorithm.
    pub fn new(kind: DigestKind) -> Self {
        let state = match kind {
            DigestKind::Md5 => DigestState::Md5(Md5::new()),
            DigestKind::Sha256 => DigestState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    /// Lower-case hex digest of everything written so far.
    pub fn hex_digest(self) -> String {
        match self.state {
            DigestState::Md5(hasher) => format!("{:x}", hasher.finalize()),
            DigestState::Sha256(hasher) => format!("{:x}", hasher.finalize()),
        }
    }
}

impl Write for DigestSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.state {
            DigestState::Md5(hasher) => hasher.update(buf),
            DigestState::Sha256(hasher) => hasher.update(buf),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CopyTarget for DigestSink {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    /// Reader that fails after handing out a fixed number of bytes.
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        fail_after: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inner.position() >= self.fail_after {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_copy_rewinds_both_ends() {
        let mut from = Cursor::new(b"hello world".to_vec());
        let mut to = Cursor::new(Vec::new());

        copy(&mut from, &mut to).unwrap();

        assert_eq!(from.position(), 0);
        assert_eq!(to.position(), 0);
        assert_eq!(to.get_ref().as_slice(), b"hello world");
    }

    #[test]
    fn test_copy_truncates_longer_previous_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("entry");
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        file.write_all(b"a much longer previous payload").unwrap();

        let mut from = Cursor::new(b"short".to_vec());
        copy(&mut from, &mut file).unwrap();

        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "short");
    }

    #[test]
    fn test_copy_spans_multiple_chunks() {
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let mut from = Cursor::new(data.clone());
        let mut to = Cursor::new(Vec::new());

        copy(&mut from, &mut to).unwrap();

        assert_eq!(to.into_inner(), data);
    }

    #[test]
    fn test_copy_failure_still_rewinds_source() {
        let mut from = FailingReader {
            inner: Cursor::new(vec![7u8; CHUNK_SIZE * 2]),
            fail_after: CHUNK_SIZE as u64,
        };
        let mut to = Cursor::new(Vec::new());

        let err = copy(&mut from, &mut to).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(from.inner.position(), 0);
        assert_eq!(to.position(), 0);
    }

    #[test]
    fn test_digest_sink_md5() {
        let mut from = Cursor::new(Vec::new());
        let mut sink = DigestSink::new(DigestKind::Md5);
        copy(&mut from, &mut sink).unwrap();

        // MD5 of the empty string
        assert_eq!(sink.hex_digest(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_digest_sink_sha256() {
        let mut from = Cursor::new(b"hello world".to_vec());
        let mut sink = DigestSink::new(DigestKind::Sha256);
        copy(&mut from, &mut sink).unwrap();

        assert_eq!(
            sink.hex_digest(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    proptest! {
        #[test]
        fn prop_copy_reproduces_source(
            data in proptest::collection::vec(any::<u8>(), 0..(CHUNK_SIZE * 2)),
            stale in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let mut from = Cursor::new(data.clone());
            let mut to = Cursor::new(stale);
            to.set_position(to.get_ref().len() as u64);

            copy(&mut from, &mut to).unwrap();

            prop_assert_eq!(to.get_ref(), &data);
            prop_assert_eq!(from.position(), 0);
        }
    }
}
