//! Message framing over a streaming transport.
//!
//! Frames are `mtype:u8 | len:u32 | payload`, where `len` covers itself but
//! not the tag byte. The read buffer grows monotonically and the framer
//! slices complete frames off its front; server log messages are delivered
//! to the logging facade and never surfaced to callers.

use std::convert::TryInto;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use edgeline_protocol::client_message::ClientMessage;
use edgeline_protocol::encoding::{Input, Output};
use edgeline_protocol::features::ProtocolVersion;
use edgeline_protocol::server_message::{LogMessage, MessageSeverity, ServerMessage};

use crate::errors::{ClientConnectionEosError, ClientConnectionError};
use crate::errors::{ClientConnectionTimeoutError, ClientEncodingError};
use crate::errors::{Error, ErrorKind, ProtocolEncodingError, ProtocolError};

const BUFFER_SIZE: usize = 8192;
/// Ceiling for a single frame, and for a single socket read
pub(crate) const MAX_FRAME: usize = 64 * 1024 * 1024;

/// Read the next message, transparently consuming server log frames
pub(crate) async fn wait_message<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    call_timeout: Duration,
    proto: &ProtocolVersion,
) -> Result<ServerMessage, Error>
where
    S: AsyncRead + Unpin,
{
    loop {
        let msg = wait_frame(stream, buf, call_timeout, proto).await?;
        log::debug!(target: "edgeline::incoming::frame", "Frame contents: {:#?}", msg);
        if let ServerMessage::LogMessage(msg) = msg {
            forward_log(msg);
            continue;
        }
        return Ok(msg);
    }
}

async fn wait_frame<S>(
    stream: &mut S,
    buf: &mut BytesMut,
    call_timeout: Duration,
    proto: &ProtocolVersion,
) -> Result<ServerMessage, Error>
where
    S: AsyncRead + Unpin,
{
    loop {
        let mut next_read = BUFFER_SIZE;
        if buf.len() >= 5 {
            let declared = u32::from_be_bytes(
                buf[1..5].try_into().expect("slice of four bytes"),
            ) as usize;
            // rejected before any buffer of that size exists
            if declared + 1 > MAX_FRAME {
                return Err(ProtocolError::with_message(format!(
                    "frame of {} bytes exceeds the 64MiB frame limit",
                    declared + 1,
                )));
            }
            if buf.len() >= declared + 1 {
                let frame = buf.split_to(declared + 1).freeze();
                return ServerMessage::decode(&mut Input::new(proto.clone(), frame))
                    .map_err(ProtocolEncodingError::with_source);
            }
            next_read = (declared + 1 - buf.len()).clamp(BUFFER_SIZE, MAX_FRAME);
        }

        buf.reserve(next_read);
        let read = timeout(call_timeout, stream.read_buf(&mut (&mut *buf).limit(next_read)))
            .await
            .map_err(|_| {
                ClientConnectionTimeoutError::with_message(format!(
                    "no message received within {:?}",
                    call_timeout,
                ))
            })?
            .map_err(ClientConnectionError::with_source)?;
        if read == 0 {
            return Err(ClientConnectionEosError::with_message(
                "connection closed by server",
            ));
        }
    }
}

/// Send a batch of messages as one network write, so a multi-frame exchange
/// is never interleaved mid-sequence
pub(crate) async fn send_messages<'x, S>(
    stream: &mut S,
    buf: &mut BytesMut,
    proto: &ProtocolVersion,
    messages: impl IntoIterator<Item = &'x ClientMessage>,
) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    buf.truncate(0);
    for msg in messages {
        log::debug!(target: "edgeline::outgoing::frame", "Frame contents: {:#?}", msg);
        msg.encode(&mut Output::new(proto, buf))
            .map_err(ClientEncodingError::with_source)?;
    }
    stream
        .write_all(&buf[..])
        .await
        .map_err(ClientConnectionError::with_source)?;
    stream
        .flush()
        .await
        .map_err(ClientConnectionError::with_source)?;
    Ok(())
}

fn forward_log(msg: LogMessage) {
    use MessageSeverity::*;
    let level = match msg.severity {
        Debug => log::Level::Debug,
        Info | Notice => log::Level::Info,
        Warning | Unknown(_) => log::Level::Warn,
    };
    log::log!(target: "edgeline::server", level, "[{:#x}] {}", msg.code, msg.text);
}
