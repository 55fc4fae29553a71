//! Wire format for calls and replies.
//!
//! Every frame is a single contiguous buffer with a fixed 15-byte big-endian
//! header followed by a variable header tail and the payload:
//!
//! ```text
//! [0:4)   header length (u32)   - offset of the payload within the frame
//! [4:8)   body length   (u32)   - payload byte count
//! [8:12)  request id    (u32)
//! [12]    version       (u8)
//! [13]    compressor    (u8)    - reserved
//! [14]    serializer    (u8)    - code of the payload encoding
//! ...     header tail           - names and meta (request), error text (reply)
//! ...     payload               - opaque serialized bytes
//! ```
//!
//! A request's header tail is `service\n`, `method\n`, then one `key\rvalue\n`
//! per meta entry. A response's header tail is the raw error text. The payload
//! is addressed purely by the length fields and is never separator-scanned, so
//! it may contain any bytes. Names and meta are not length-delimited: a `\n`
//! or `\r` inside them corrupts framing, which is why [`validate_identifier`]
//! and [`validate_meta`] reject the separator bytes before they reach the wire.

use std::collections::HashMap;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::Error;

/// Byte size of the fixed portion of every frame header.
pub const FIXED_HEADER_LENGTH: usize = 15;

/// Version byte stamped on outbound requests.
pub const PROTOCOL_VERSION: u8 = 1;

const NAME_SEPARATOR: u8 = b'\n';
const META_SEPARATOR: u8 = b'\r';

/// Why an inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The buffer is shorter than its declared header and body lengths.
    #[error("frame is shorter than its declared lengths")]
    Truncated,
    /// The header tail is missing a separator or holds non-utf8 names.
    #[error("frame header is malformed")]
    MalformedHeader,
}

/// One rpc call unit. Built by the client per call, decoded and discarded
/// per call on the server.
///
/// `header_length` and `body_length` are derived fields: [`Request::encode`]
/// recomputes them from the current contents immediately before writing, so
/// they are never set independently.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Request {
    /// Byte size of the header segment, including the fixed 15 bytes.
    pub header_length: u32,
    /// Byte size of the payload.
    pub body_length: u32,
    /// Correlation id. Carried on the wire but unused for matching: one
    /// connection serves one in-flight call at a time.
    pub request_id: u32,
    /// Protocol version.
    pub version: u8,
    /// Compression codec id. Reserved.
    pub compressor: u8,
    /// Code of the serializer that produced `data`.
    pub serializer_code: u8,
    /// Name of the target service. Must not contain `\n` or `\r`.
    pub service_name: String,
    /// Name of the target method. Must not contain `\n` or `\r`.
    pub method_name: String,
    /// Cross-cutting call metadata, e.g. the deadline and oneway markers.
    pub meta: HashMap<String, String>,
    /// Opaque serialized argument bytes.
    pub data: Vec<u8>,
}

impl Request {
    /// Recompute the derived length fields from the current contents.
    pub fn compute_lengths(&mut self) {
        let mut header_length =
            FIXED_HEADER_LENGTH + self.service_name.len() + 1 + self.method_name.len() + 1;
        for (key, value) in &self.meta {
            header_length += key.len() + 1 + value.len() + 1;
        }
        self.header_length = header_length as u32;
        self.body_length = self.data.len() as u32;
    }

    /// Encode into a single contiguous frame, recomputing the length fields
    /// first.
    pub fn encode(&mut self) -> BytesMut {
        self.compute_lengths();
        let mut frame =
            BytesMut::with_capacity(self.header_length as usize + self.body_length as usize);
        self.put_fixed_header(&mut frame);
        frame.put_slice(self.service_name.as_bytes());
        frame.put_u8(NAME_SEPARATOR);
        frame.put_slice(self.method_name.as_bytes());
        frame.put_u8(NAME_SEPARATOR);
        for (key, value) in &self.meta {
            frame.put_slice(key.as_bytes());
            frame.put_u8(META_SEPARATOR);
            frame.put_slice(value.as_bytes());
            frame.put_u8(NAME_SEPARATOR);
        }
        frame.put_slice(&self.data);
        frame
    }

    /// Decode a whole frame, the structural inverse of [`Request::encode`].
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let fixed = FixedHeader::parse(frame)?;
        let header_end = fixed.header_length as usize;

        let mut tail = &frame[FIXED_HEADER_LENGTH..header_end];
        let (service_name, rest) =
            split_once(tail, NAME_SEPARATOR).ok_or(DecodeError::MalformedHeader)?;
        let (method_name, rest) =
            split_once(rest, NAME_SEPARATOR).ok_or(DecodeError::MalformedHeader)?;
        tail = rest;

        let mut meta = HashMap::new();
        while let Some((pair, rest)) = split_once(tail, NAME_SEPARATOR) {
            let (key, value) =
                split_once(pair, META_SEPARATOR).ok_or(DecodeError::MalformedHeader)?;
            meta.insert(utf8(key)?, utf8(value)?);
            tail = rest;
        }

        Ok(Self {
            header_length: fixed.header_length,
            body_length: fixed.body_length,
            request_id: fixed.request_id,
            version: fixed.version,
            compressor: fixed.compressor,
            serializer_code: fixed.serializer_code,
            service_name: utf8(service_name)?,
            method_name: utf8(method_name)?,
            meta,
            data: fixed.body(frame),
        })
    }

    fn put_fixed_header(&self, frame: &mut BytesMut) {
        frame.put_u32(self.header_length);
        frame.put_u32(self.body_length);
        frame.put_u32(self.request_id);
        frame.put_u8(self.version);
        frame.put_u8(self.compressor);
        frame.put_u8(self.serializer_code);
    }
}

/// One rpc reply unit. Built by the server dispatch path per call, decoded
/// and discarded by the client.
///
/// `error` and `data` are independent: the common case populates exactly one,
/// but a method may return a partial result alongside a business error and
/// the codec preserves both.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Response {
    /// Byte size of the header segment, including the fixed 15 bytes.
    pub header_length: u32,
    /// Byte size of the payload.
    pub body_length: u32,
    /// Correlation id echoed from the request.
    pub request_id: u32,
    /// Protocol version.
    pub version: u8,
    /// Compression codec id. Reserved.
    pub compressor: u8,
    /// Code of the serializer that produced `data`.
    pub serializer_code: u8,
    /// Utf-8 business error text. Empty when the call succeeded.
    pub error: Vec<u8>,
    /// Opaque serialized result bytes. Empty when the call produced no result.
    pub data: Vec<u8>,
}

impl Response {
    /// Recompute the derived length fields from the current contents.
    pub fn compute_lengths(&mut self) {
        self.header_length = (FIXED_HEADER_LENGTH + self.error.len()) as u32;
        self.body_length = self.data.len() as u32;
    }

    /// Encode into a single contiguous frame, recomputing the length fields
    /// first.
    pub fn encode(&mut self) -> BytesMut {
        self.compute_lengths();
        let mut frame =
            BytesMut::with_capacity(self.header_length as usize + self.body_length as usize);
        self.put_fixed_header(&mut frame);
        frame.put_slice(&self.error);
        frame.put_slice(&self.data);
        frame
    }

    /// Decode a whole frame, the structural inverse of [`Response::encode`].
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let fixed = FixedHeader::parse(frame)?;
        let header_end = fixed.header_length as usize;
        Ok(Self {
            header_length: fixed.header_length,
            body_length: fixed.body_length,
            request_id: fixed.request_id,
            version: fixed.version,
            compressor: fixed.compressor,
            serializer_code: fixed.serializer_code,
            error: frame[FIXED_HEADER_LENGTH..header_end].to_vec(),
            data: fixed.body(frame),
        })
    }

    fn put_fixed_header(&self, frame: &mut BytesMut) {
        frame.put_u32(self.header_length);
        frame.put_u32(self.body_length);
        frame.put_u32(self.request_id);
        frame.put_u8(self.version);
        frame.put_u8(self.compressor);
        frame.put_u8(self.serializer_code);
    }
}

struct FixedHeader {
    header_length: u32,
    body_length: u32,
    request_id: u32,
    version: u8,
    compressor: u8,
    serializer_code: u8,
}

impl FixedHeader {
    fn parse(frame: &[u8]) -> Result<Self, DecodeError> {
        if frame.len() < FIXED_HEADER_LENGTH {
            return Err(DecodeError::Truncated);
        }
        let mut fixed = &frame[..FIXED_HEADER_LENGTH];
        let header = Self {
            header_length: fixed.get_u32(),
            body_length: fixed.get_u32(),
            request_id: fixed.get_u32(),
            version: fixed.get_u8(),
            compressor: fixed.get_u8(),
            serializer_code: fixed.get_u8(),
        };
        if (header.header_length as usize) < FIXED_HEADER_LENGTH {
            return Err(DecodeError::MalformedHeader);
        }
        if frame.len() < header.header_length as usize + header.body_length as usize {
            return Err(DecodeError::Truncated);
        }
        Ok(header)
    }

    fn body(&self, frame: &[u8]) -> Vec<u8> {
        if self.body_length == 0 {
            return Vec::new();
        }
        let start = self.header_length as usize;
        frame[start..start + self.body_length as usize].to_vec()
    }
}

fn split_once(segment: &[u8], separator: u8) -> Option<(&[u8], &[u8])> {
    segment
        .iter()
        .position(|&byte| byte == separator)
        .map(|at| (&segment[..at], &segment[at + 1..]))
}

fn utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::MalformedHeader)
}

/// Check that a service or method name is usable on the wire: non-empty and
/// free of the separator bytes.
pub(crate) fn validate_identifier(kind: &str, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::Validation(format!("{kind} name must not be empty")));
    }
    if name.bytes().any(|byte| byte == NAME_SEPARATOR || byte == META_SEPARATOR) {
        return Err(Error::Validation(format!(
            "{kind} name {name:?} contains a wire separator byte"
        )));
    }
    Ok(())
}

/// Check that meta keys and values are free of the separator bytes.
pub(crate) fn validate_meta(meta: &HashMap<String, String>) -> Result<(), Error> {
    for (key, value) in meta {
        for text in [key, value] {
            if text
                .bytes()
                .any(|byte| byte == NAME_SEPARATOR || byte == META_SEPARATOR)
            {
                return Err(Error::Validation(format!(
                    "meta entry {key:?} contains a wire separator byte"
                )));
            }
        }
    }
    Ok(())
}
