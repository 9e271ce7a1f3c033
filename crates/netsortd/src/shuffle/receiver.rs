//! Inbound side of the shuffle.
//!
//! Accepts one TCP connection per peer and runs an independent read loop
//! for each. A handler that fails only ends its own connection.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;

use netsort_core::{Endpoint, Frame, FrameCodec};

use super::{Ingest, IngestTx};
use crate::error::{Result, ShuffleError};

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct ShuffleReceiver {
    listener: TcpListener,
    codec: FrameCodec,
    queue: IngestTx,
}

impl ShuffleReceiver {
    /// Bind the node's configured endpoint.
    pub async fn bind(endpoint: &Endpoint) -> Result<TcpListener> {
        TcpListener::bind((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| ShuffleError::Bind {
                addr: endpoint.to_string(),
                source,
            })
    }

    pub fn new(listener: TcpListener, codec: FrameCodec, queue: IngestTx) -> Self {
        Self {
            listener,
            codec,
            queue,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept peers until the task is torn down.
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "shuffle receiver listening");
        }

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    continue;
                }
            };
            tracing::debug!(%peer_addr, "peer connected");

            let codec = self.codec;
            let queue = self.queue.clone();
            tokio::spawn(async move {
                match read_frames(BufReader::new(stream), codec, queue).await {
                    Ok(frames) => tracing::debug!(%peer_addr, frames, "peer connection closed"),
                    Err(e) => tracing::warn!(%peer_addr, error = %e, "peer connection failed"),
                }
            });
        }
    }
}

/// Read frames until clean EOF, pushing each onto the queue in order.
/// Returns the number of frames read.
pub async fn read_frames<R>(
    mut reader: R,
    codec: FrameCodec,
    queue: IngestTx,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; codec.frame_len()];
    let mut frames = 0u64;

    while read_frame(&mut reader, &mut buf).await? {
        let item = match codec.decode(&buf).context("undecodable frame")? {
            Frame::Data(record) => Ingest::Received(record),
            Frame::Done(sender) => {
                tracing::debug!(sender, frames, "done signal received");
                Ingest::PeerDone(sender)
            }
        };
        frames += 1;

        if queue.send(item).await.is_err() {
            tracing::debug!("ingest queue closed, dropping connection");
            break;
        }
    }

    Ok(frames)
}

/// Fill `buf` with exactly one frame.
/// `Ok(false)` means the peer closed cleanly on a frame boundary.
async fn read_frame<R>(reader: &mut R, buf: &mut [u8]) -> anyhow::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read(&mut buf[..1]).await.context("read failed")?;
    if n == 0 {
        return Ok(false);
    }
    if let Err(e) = reader.read_exact(&mut buf[1..]).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            bail!("connection closed mid-frame");
        }
        return Err(e).context("read failed");
    }
    Ok(true)
}
