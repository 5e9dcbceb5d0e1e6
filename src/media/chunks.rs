use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;

/// Bytes per emitted chunk. Only the last chunk of a file may be shorter.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Frames buffered between the reader task and the consumer.
const QUEUE_DEPTH: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read failed on {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("byte producer stopped without finishing the stream")]
    Interrupted,
}

/// Part of one file to stream. `len: None` means "to end of file".
#[derive(Debug, Clone)]
struct Segment {
    path: PathBuf,
    start: u64,
    len: Option<u64>,
}

enum Frame {
    Chunk(Bytes),
    Failed(StreamError),
    End,
}

/// Lazy, finite, non-restartable sequence of file chunks.
///
/// A single reader task walks the files strictly in order, holding at most
/// one file open, and hands fixed-size chunks over a bounded queue. The
/// stream ends with `None` after the last chunk; a read failure is yielded
/// once as `Err` and then the stream ends. If the reader vanishes without
/// signalling either, the consumer sees [`StreamError::Interrupted`].
pub struct ChunkStream {
    rx: mpsc::Receiver<Frame>,
    done: bool,
}

impl ChunkStream {
    /// Stream every file in `paths`, in order, with the default chunk size.
    pub fn spawn(paths: Vec<PathBuf>) -> Self {
        Self::with_chunk_size(paths, CHUNK_SIZE)
    }

    pub fn with_chunk_size(paths: Vec<PathBuf>, chunk_size: usize) -> Self {
        let segments = paths
            .into_iter()
            .map(|path| Segment {
                path,
                start: 0,
                len: None,
            })
            .collect();
        Self::start(segments, chunk_size)
    }

    /// Stream `len` bytes of `path` starting at byte `start`.
    pub fn range(path: PathBuf, start: u64, len: u64) -> Self {
        Self::start(
            vec![Segment {
                path,
                start,
                len: Some(len),
            }],
            CHUNK_SIZE,
        )
    }

    fn start(segments: Vec<Segment>, chunk_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(produce(segments, chunk_size.max(1), tx));
        Self { rx, done: false }
    }

    /// Next chunk, `Some(Err(_))` once on failure, `None` when finished.
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, StreamError>> {
        if self.done {
            return None;
        }
        let frame = self.rx.recv().await;
        self.settle(frame)
    }

    fn settle(&mut self, frame: Option<Frame>) -> Option<Result<Bytes, StreamError>> {
        match frame {
            Some(Frame::Chunk(bytes)) => Some(Ok(bytes)),
            Some(Frame::End) => {
                self.done = true;
                None
            }
            Some(Frame::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                Some(Err(StreamError::Interrupted))
            }
        }
    }
}

impl Stream for ChunkStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(frame) => Poll::Ready(this.settle(frame)),
        }
    }
}

async fn produce(segments: Vec<Segment>, chunk_size: usize, tx: mpsc::Sender<Frame>) {
    for segment in segments {
        match stream_segment(&segment, chunk_size, &tx).await {
            Ok(true) => {}
            // Consumer went away; nobody left to tell.
            Ok(false) => {
                tracing::debug!("Stream consumer dropped during {}", segment.path.display());
                return;
            }
            Err(e) => {
                tracing::warn!("Aborting stream: {}", e);
                let _ = tx.send(Frame::Failed(e)).await;
                return;
            }
        }
    }
    let _ = tx.send(Frame::End).await;
}

/// Returns `Ok(false)` when the consumer has hung up.
async fn stream_segment(
    segment: &Segment,
    chunk_size: usize,
    tx: &mpsc::Sender<Frame>,
) -> Result<bool, StreamError> {
    let open_err = |source| StreamError::Open {
        path: segment.path.clone(),
        source,
    };
    let read_err = |source| StreamError::Read {
        path: segment.path.clone(),
        source,
    };

    let mut file = tokio::fs::File::open(&segment.path).await.map_err(open_err)?;
    if segment.start > 0 {
        file.seek(std::io::SeekFrom::Start(segment.start))
            .await
            .map_err(read_err)?;
    }
    let mut remaining = segment.len;

    loop {
        let want = match remaining {
            Some(0) => break,
            Some(left) => chunk_size.min(usize::try_from(left).unwrap_or(usize::MAX)),
            None => chunk_size,
        };
        let chunk = read_chunk(&mut file, want).await.map_err(read_err)?;
        if chunk.is_empty() {
            break;
        }
        let short = chunk.len() < want;
        if let Some(left) = remaining.as_mut() {
            *left -= chunk.len() as u64;
        }
        if tx.send(Frame::Chunk(chunk)).await.is_err() {
            return Ok(false);
        }
        if short {
            break;
        }
    }
    Ok(true)
}

/// Read until `want` bytes are buffered or the file ends.
async fn read_chunk(file: &mut tokio::fs::File, want: usize) -> std::io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(want);
    while buf.len() < want {
        let n = (&mut *file).take((want - buf.len()) as u64).read_buf(&mut buf).await?;
        if n == 0 {
            break;
        }
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vanished_producer_is_interrupted_once() {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let mut stream = ChunkStream { rx, done: false };

        assert!(tx.send(Frame::Chunk(Bytes::from_static(b"partial"))).await.is_ok());
        drop(tx);

        assert_eq!(stream.next_chunk().await.unwrap().unwrap().to_vec(), b"partial".to_vec());
        assert!(matches!(
            stream.next_chunk().await,
            Some(Err(StreamError::Interrupted))
        ));
        assert!(stream.next_chunk().await.is_none());
        assert!(stream.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn end_frame_finishes_cleanly() {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let mut stream = ChunkStream { rx, done: false };

        assert!(tx.send(Frame::End).await.is_ok());
        drop(tx);

        assert!(stream.next_chunk().await.is_none());
    }
}
