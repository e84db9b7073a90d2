// Copyright 2022 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Pure decode of the container daemon's multiplexed exec stream.
//!
//! Bollard's `LogOutput` already performs this demultiplexing for us on a
//! live attach (see [`crate::docker::exec`]), but the wire format is simple enough,
//! and load-bearing enough, to own and test independently: an 8-byte header
//! `[stream_id:1][0:3][size:4-BE]` followed by `size` bytes of payload, with
//! `stream_id` 1 for stdout and 2 for stderr.

use bytes::{Buf, Bytes, BytesMut};

const HEADER_LEN: usize = 8;
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Demuxed {
    pub stdout: BytesMut,
    pub stderr: BytesMut,
}

/// Decodes a complete multiplexed stream into its stdout/stderr components.
///
/// Returns an error if a frame header claims more payload bytes than remain
/// in the buffer, or if an unrecognised stream id is encountered.
pub fn demux(mut mux_stream: Bytes) -> Result<Demuxed, String> {
    let mut out = Demuxed::default();
    while mux_stream.has_remaining() {
        if mux_stream.remaining() < HEADER_LEN {
            return Err(format!(
                "truncated mux frame header: {} bytes remaining, need {HEADER_LEN}",
                mux_stream.remaining()
            ));
        }
        let stream_id = mux_stream[0];
        let size = u32::from_be_bytes([
            mux_stream[4],
            mux_stream[5],
            mux_stream[6],
            mux_stream[7],
        ]) as usize;
        mux_stream.advance(HEADER_LEN);

        if mux_stream.remaining() < size {
            return Err(format!(
                "truncated mux frame payload: header claims {size} bytes but only {} remain",
                mux_stream.remaining()
            ));
        }
        let payload = mux_stream.split_to(size);
        match stream_id {
            STREAM_STDOUT => out.stdout.extend_from_slice(&payload),
            STREAM_STDERR => out.stderr.extend_from_slice(&payload),
            other => return Err(format!("unrecognised mux stream id: {other}")),
        }
    }
    Ok(out)
}

/// Test helper mirroring the daemon's own framing, used to build synthetic
/// mux streams for the demux unit tests.
#[cfg(test)]
fn frame(stream_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + payload.len());
    framed.push(stream_id);
    framed.extend_from_slice(&[0, 0, 0]);
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}
