// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame codec for the wire protocol: a 32-bit big-endian payload length
//! followed by a UTF-8 JSON object.

use std::io;
use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Maximum frame payload, guarding against a peer claiming an absurd length
/// prefix before any bytes have arrived.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Length-delimited JSON framing, generic over the message type so the
/// session layer can decode `ClientMessage` while encoding `ServerMessage`
/// through the same underlying stream.
pub struct FrameCodec<D> {
    inner: LengthDelimitedCodec,
    _decoded: PhantomData<D>,
}

impl<D> Default for FrameCodec<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> FrameCodec<D> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LEN)
                .length_field_length(4)
                .big_endian()
                .new_codec(),
            _decoded: PhantomData,
        }
    }
}

impl<D: DeserializeOwned> Decoder for FrameCodec<D> {
    type Item = D;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.inner.decode(src)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&frame)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(Some(value))
    }
}

impl<D, E: Serialize> Encoder<E> for FrameCodec<D> {
    type Error = io::Error;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.inner.encode(Bytes::from(payload), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        n: i64,
    }

    #[test]
    fn round_trips_through_the_codec() {
        let mut encoder: FrameCodec<Ping> = FrameCodec::new();
        let mut buf = BytesMut::new();
        Encoder::encode(&mut encoder, Ping { n: 42 }, &mut buf).unwrap_or_else(|e| panic!("{e}"));

        let mut decoder: FrameCodec<Ping> = FrameCodec::new();
        let decoded = decoder.decode(&mut buf).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(decoded, Some(Ping { n: 42 }));
    }

    #[test]
    fn decode_waits_for_a_full_frame() {
        let mut encoder: FrameCodec<Ping> = FrameCodec::new();
        let mut full = BytesMut::new();
        Encoder::encode(&mut encoder, Ping { n: 1 }, &mut full).unwrap_or_else(|e| panic!("{e}"));

        let mut partial = full.split_to(full.len() - 1);
        let mut decoder: FrameCodec<Ping> = FrameCodec::new();
        assert!(decoder.decode(&mut partial).unwrap_or_else(|e| panic!("{e}")).is_none());
    }
}
