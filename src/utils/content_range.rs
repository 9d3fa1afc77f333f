use crate::services::error::{UploadError, UploadResult};
use std::fmt;
use std::str::FromStr;

/// One chunk delivery as announced by a `Content-Range: bytes start-stop/length` header.
///
/// `stop` is inclusive, as in HTTP. `length` is `None` when the client sent `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadRange {
    pub start: u64,
    pub stop: u64,
    pub length: Option<u64>,
}

impl UploadRange {
    /// Number of bytes the chunk is expected to carry
    pub fn chunk_len(&self) -> u64 {
        self.stop - self.start + 1
    }

    /// Rejects payloads whose size contradicts the announced range
    pub fn check_payload(&self, payload_len: usize) -> UploadResult<()> {
        if payload_len as u64 != self.chunk_len() {
            return Err(UploadError::malformed(format!(
                "Content-Range announces {} bytes but the chunk carries {}",
                self.chunk_len(),
                payload_len
            )));
        }
        Ok(())
    }
}

impl FromStr for UploadRange {
    type Err = UploadError;

    fn from_str(header: &str) -> UploadResult<Self> {
        let malformed = || UploadError::malformed(format!("Malformed Content-Range: {}", header));

        let body = header
            .trim()
            .strip_prefix("bytes ")
            .ok_or_else(malformed)?
            .trim();
        let (span, length) = body.split_once('/').ok_or_else(malformed)?;
        let (start, stop) = span.split_once('-').ok_or_else(malformed)?;

        let start: u64 = start.trim().parse().map_err(|_| malformed())?;
        let stop: u64 = stop.trim().parse().map_err(|_| malformed())?;
        let length = match length.trim() {
            "*" => None,
            value => Some(value.parse::<u64>().map_err(|_| malformed())?),
        };

        // stop + 1 must fit in u64
        if stop < start || stop == u64::MAX {
            return Err(malformed());
        }
        if let Some(total) = length {
            if stop >= total {
                return Err(malformed());
            }
        }

        Ok(Self {
            start,
            stop,
            length,
        })
    }
}

impl fmt::Display for UploadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            Some(total) => write!(f, "bytes {}-{}/{}", self.start, self.stop, total),
            None => write!(f, "bytes {}-{}/*", self.start, self.stop),
        }
    }
}
