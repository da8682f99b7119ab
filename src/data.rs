//! FTP data channel: a short-lived byte pipe for payloads and listings
//!
//! A data stream exists only while one transfer is in flight; it carries the
//! capacity-1 transfer permit, so dropping or finishing it releases the data
//! channel for the next transfer.

use crate::control::{ControlStream, WireStream};
use crate::error::Result;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, trace, warn};

/// One transfer's worth of data connection
///
/// Reads propagate server bytes (RETR, listings); writes propagate payload
/// (STOR). Call [`finish`](Self::finish) when done: it closes the socket and
/// consumes the terminal reply (typically 226) from the control channel.
///
/// Dropping the stream without `finish` closes the socket but leaves the
/// terminal reply unread; the control stream discards it as stale input
/// before its next command.
pub struct DataStream {
    stream: WireStream,
    control: Arc<ControlStream>,
    _permit: OwnedSemaphorePermit,
    finished: bool,
}

impl DataStream {
    pub(crate) fn new(
        stream: WireStream,
        control: Arc<ControlStream>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            stream,
            control,
            _permit: permit,
            finished: false,
        }
    }

    /// Close the data connection and consume the transfer's terminal reply
    ///
    /// The payload is already delivered by the time this runs, so a failure
    /// while reading the terminal reply is logged and swallowed rather than
    /// failing a transfer that, on the wire, completed.
    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.stream.shutdown().await {
            debug!("Data socket shutdown: {}", e);
        }

        match self.control.read_reply().await {
            Ok(reply) if reply.is_success() => {
                trace!("Transfer closed: {} {}", reply.code, reply.message);
            }
            Ok(reply) => {
                warn!(
                    "Transfer close reply was negative: {} {}",
                    reply.code, reply.message
                );
            }
            Err(e) => {
                warn!("Failed reading transfer close reply: {}", e);
            }
        }
        Ok(())
    }
}

impl Drop for DataStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Data stream dropped without finish(); terminal reply left for stale drain");
        }
    }
}

impl AsyncRead for DataStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for DataStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}
