//! Draining request bodies into memory.

use bytes::Bytes;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::{BoxError, DecodeError, EncodeError};

/// Why a body could not be drained.
#[derive(Debug)]
pub(crate) enum ReadError {
    TooLarge { limit: usize },
    Failed(BoxError),
}

impl From<ReadError> for EncodeError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::TooLarge { limit } => EncodeError::BodyTooLarge { limit },
            ReadError::Failed(source) => EncodeError::BodyRead(source),
        }
    }
}

impl From<ReadError> for DecodeError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::TooLarge { limit } => DecodeError::BodyTooLarge { limit },
            ReadError::Failed(source) => DecodeError::BodyRead(source),
        }
    }
}

/// Read a body to the end, all or nothing.
///
/// A frame error anywhere in the stream fails the whole read; the bytes
/// collected so far are discarded.
pub(crate) async fn read_body<B>(body: B, limit: Option<usize>) -> Result<Bytes, ReadError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match limit {
        None => body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| ReadError::Failed(e.into())),
        Some(limit) => Limited::new(body, limit)
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    ReadError::TooLarge { limit }
                } else {
                    ReadError::Failed(e)
                }
            }),
    }
}
