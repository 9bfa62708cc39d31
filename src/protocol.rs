//! Query wire protocol: length-prefixed JSON messages over TCP.
//!
//! Every frame is `[i32 payload_len BE][payload]`. A connection carries exactly one request frame
//! followed by one response frame.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Location;
use crate::ordering::{Ordering, Rule};
use crate::ranking::DishHit;

/// Largest payload either side accepts (16 MB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A location as carried on the wire; unknown coordinates are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireLocation {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Location> for WireLocation {
    fn from(location: &Location) -> Self {
        let known = |value: f64| (!value.is_nan()).then_some(value);
        Self {
            lat: known(location.lat),
            lon: known(location.lon),
            description: location.description.clone(),
        }
    }
}

impl From<WireLocation> for Location {
    fn from(wire: WireLocation) -> Self {
        match (wire.lat, wire.lon) {
            (Some(lat), Some(lon)) => Location::new(lat, lon).with_description(wire.description),
            _ => Location::NONE.with_description(wire.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Free-form client name, only logged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub query: String,
    pub location: WireLocation,
    #[serde(default)]
    pub ordering: Ordering,
    #[serde(default)]
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Request {
    pub fn new(query: impl Into<String>, location: &Location) -> Self {
        Self {
            name: None,
            query: query.into(),
            location: location.into(),
            ordering: Ordering::default(),
            rule: Rule::default(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRestaurant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location: WireLocation,
}

/// One dish in a successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub description: String,
    pub price: Option<f64>,
    pub rank: f64,
    pub restaurant: WireRestaurant,
}

impl From<&DishHit<'_>> for ResultRecord {
    fn from(hit: &DishHit<'_>) -> Self {
        Self {
            description: hit.dish.description.clone(),
            price: hit.dish.has_price().then_some(hit.dish.price),
            rank: hit.rank,
            restaurant: WireRestaurant {
                name: hit.restaurant.name.clone(),
                description: hit.restaurant.description.clone(),
                location: hit.location().into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Absent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ResultRecord>>,
}

/// Returned by [`Response::data`] for failure responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failure response carries no data: {0}")]
pub struct FailedResponse(pub String);

impl Response {
    pub fn success(data: Vec<ResultRecord>) -> Self {
        Self {
            status: Status::Success,
            message: None,
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failure,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn data(&self) -> Result<&[ResultRecord], FailedResponse> {
        match (&self.status, &self.data) {
            (Status::Success, Some(data)) => Ok(data),
            (Status::Success, None) => Ok(&[]),
            (Status::Failure, _) => Err(FailedResponse(self.message.clone().unwrap_or_default())),
        }
    }
}

#[cfg(feature = "server")]
pub use framing::*;

#[cfg(feature = "server")]
mod framing {
    use std::io;

    use serde::Serialize;
    use serde::de::DeserializeOwned;
    use thiserror::Error;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::MAX_FRAME_LEN;

    #[derive(Debug, Error)]
    pub enum FrameError {
        /// The peer sent bytes that do not form a valid message.
        #[error("Query format mismatch: {0}")]
        Malformed(String),
        #[error("Query format mismatch: invalid JSON payload: {0}")]
        Json(#[from] serde_json::Error),
        #[error("connection error: {0}")]
        Io(#[from] io::Error),
    }

    impl FrameError {
        /// Whether the peer, not the transport, is to blame.
        pub fn is_user_caused(&self) -> bool {
            !matches!(self, FrameError::Io(_))
        }
    }

    fn premature_eof(err: io::Error, what: &str) -> FrameError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::Malformed(format!("premature end of stream while reading {what}"))
        } else {
            FrameError::Io(err)
        }
    }

    /// Writes `[len i32 BE][payload]` and flushes.
    pub async fn write_frame<W: AsyncWrite + Unpin>(
        writer: &mut W,
        payload: &[u8],
    ) -> Result<(), FrameError> {
        if payload.is_empty() || payload.len() > MAX_FRAME_LEN {
            return Err(FrameError::Malformed(format!(
                "refusing to send a {} byte payload",
                payload.len()
            )));
        }
        writer.write_all(&(payload.len() as i32).to_be_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Reads one frame. Non-positive or oversized lengths and truncated streams are malformed.
    pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
        let mut header = [0u8; 4];
        reader
            .read_exact(&mut header)
            .await
            .map_err(|err| premature_eof(err, "frame header"))?;
        let len = i32::from_be_bytes(header);
        if len <= 0 {
            return Err(FrameError::Malformed(format!("invalid frame length {len}")));
        }
        let len = len as usize;
        if len > MAX_FRAME_LEN {
            return Err(FrameError::Malformed(format!(
                "frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"
            )));
        }
        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .await
            .map_err(|err| premature_eof(err, "frame payload"))?;
        Ok(payload)
    }

    pub fn encode_message<T: Serialize>(value: &T) -> Result<Vec<u8>, FrameError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub fn decode_message<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FrameError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub async fn send<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
        T: Serialize,
    {
        write_frame(writer, &encode_message(value)?).await
    }

    pub async fn receive<R, T>(reader: &mut R) -> Result<T, FrameError>
    where
        R: AsyncRead + Unpin,
        T: DeserializeOwned,
    {
        decode_message(&read_frame(reader).await?)
    }
}
