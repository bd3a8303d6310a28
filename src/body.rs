//! Response body delivery.
//!
//! A spawned task pumps the transport's byte stream into a bounded channel
//! and the materializer pulls decoded chunks from the other end. The channel
//! closing is the completion signal; a transport error is forwarded as the
//! last item.

use std::io::Write;

use bytes::Bytes;
use flate2::write::MultiGzDecoder;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

pub const BODY_CHANNEL_CAPACITY: usize = 16;

pub struct BodyReader {
    rx: mpsc::Receiver<Result<Bytes>>,
    decoder: Option<MultiGzDecoder<Vec<u8>>>,
    compressed: u64,
    done: bool,
}

impl BodyReader {
    /// Start pumping `stream`. With `gzip` set, chunks are decompressed
    /// before they are handed out; concatenated gzip members are decoded
    /// one after another.
    pub fn spawn<S, E>(stream: S, gzip: bool) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        tokio::spawn(pump(stream, tx));

        BodyReader {
            rx,
            decoder: gzip.then(|| MultiGzDecoder::new(Vec::new())),
            compressed: 0,
            done: false,
        }
    }

    /// Next decoded chunk, `None` once the body is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        while !self.done {
            let Some(chunk) = self.rx.recv().await else {
                self.done = true;
                return self.finish_decoder();
            };
            let chunk = chunk?;

            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(Some(chunk));
            };
            self.compressed += chunk.len() as u64;
            decoder.write_all(&chunk).map_err(Error::Decode)?;
            let decoded = std::mem::take(decoder.get_mut());
            if !decoded.is_empty() {
                return Ok(Some(Bytes::from(decoded)));
            }
        }
        Ok(None)
    }

    pub async fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }

    fn finish_decoder(&mut self) -> Result<Option<Bytes>> {
        let Some(decoder) = self.decoder.take() else {
            return Ok(None);
        };
        // a gzip-labelled body with no bytes at all decodes to nothing
        if self.compressed == 0 {
            return Ok(None);
        }
        let rest = decoder.finish().map_err(Error::Decode)?;
        Ok((!rest.is_empty()).then(|| Bytes::from(rest)))
    }
}

async fn pump<S, E>(stream: S, tx: mpsc::Sender<Result<Bytes>>)
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let mut stream = Box::pin(stream);
    while let Some(item) = stream.next().await {
        let failed = item.is_err();
        // receiver gone means the consumer bailed out
        if tx.send(item.map_err(Into::into)).await.is_err() || failed {
            break;
        }
    }
}
