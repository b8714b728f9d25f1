//! Transparent gzip decoding for compressed archive indices.

use std::io::BufReader;

use flate2::read::GzDecoder;

use super::resource::{LineSource, Lines, RemoteResource};
use crate::error::FetchResult;

/// A [`RemoteResource`] whose verified bytes are a gzip stream.
///
/// Verification applies to the compressed bytes, exactly as the archive
/// lists them; decoding happens while lines are consumed. A corrupt payload
/// therefore surfaces as a [`FetchError::Decompression`] from the iterator
/// once consumption reaches the bad data, not when the stream is opened.
///
/// [`FetchError::Decompression`]: crate::error::FetchError::Decompression
#[derive(Debug, Clone)]
pub struct Gunzipped {
    resource: RemoteResource,
}

impl Gunzipped {
    /// Wrap `resource`.
    pub fn new(resource: RemoteResource) -> Self {
        Self { resource }
    }

    /// The wrapped resource.
    pub fn resource(&self) -> &RemoteResource {
        &self.resource
    }

    /// Decompressed lines, without line terminators.
    pub fn each_line(&self) -> FetchResult<Lines> {
        let entry = self.resource.open_stream()?;
        let decoder = GzDecoder::new(entry);
        Ok(Lines::new(
            BufReader::new(decoder),
            LineSource::Gzip {
                url: self.resource.uri().to_string(),
            },
        ))
    }
}
