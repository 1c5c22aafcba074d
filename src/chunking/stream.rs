use crate::chunking::cut::Cutter;
use crate::chunking::detector::BoundaryDetector;
use crate::chunking::{Chunk, Chunker};
use crate::error::{Error, Result};
use futures::Stream;
use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};
use tokio::io::AsyncBufRead;

impl Chunker {
    ///
    /// Creates a stream that yields chunks from the provided async reader.
    ///
    /// Produces exactly the chunks `chunk_reader` produces for the same bytes.
    ///
    /// ## Arguments
    ///
    /// * `reader`: The source to read data from (must implement `AsyncBufRead`).
    /// * `size`: Number of bytes to chunk, must be positive.
    ///
    pub fn chunk_stream<R>(&self, reader: R, size: u64) -> Result<ChunkStream<'_, R>>
    where
        R: AsyncBufRead + Unpin,
    {
        if size == 0 {
            return Err(Error::config("the declared size must be positive"));
        }

        Ok(ChunkStream {
            chunker: self,
            reader,
            size,
            processed: 0,
            cutter: None,
            failed: false,
        })
    }
}

/// A stream that yields `Chunk`s from an `AsyncBufRead` source of declared size.
pub struct ChunkStream<'a, R>
where
    R: AsyncBufRead + Unpin,
{
    chunker: &'a Chunker,
    reader: R,
    size: u64,
    processed: u64,
    cutter: Option<Cutter>,
    failed: bool,
}

impl<R> ChunkStream<'_, R>
where
    R: AsyncBufRead + Unpin,
{
    fn fail(&mut self, e: Error) -> Poll<Option<Result<Chunk>>> {
        self.failed = true;
        self.cutter = None;
        Poll::Ready(Some(Err(e)))
    }
}

impl<R> Stream for ChunkStream<'_, R>
where
    R: AsyncBufRead + Unpin,
{
    type Item = Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.failed || this.processed >= this.size {
                return Poll::Ready(None);
            }

            let chunker = this.chunker;
            let detector = chunker.detector();
            let remaining = this.size - this.processed;
            let cutter = this
                .cutter
                .get_or_insert_with(|| Cutter::new(detector.plan(remaining)));

            // Resume the chunk under construction with whatever the reader has buffered.
            let available = match ready!(Pin::new(&mut this.reader).poll_fill_buf(cx)) {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return this.fail(e.into()),
            };

            if available.is_empty() {
                let delivered = this.processed + cutter.len() as u64;
                let declared = this.size;
                return this.fail(Error::StreamExhausted {
                    declared,
                    delivered,
                });
            }

            let (used, complete) = cutter.feed(detector, available);
            Pin::new(&mut this.reader).consume(used);

            if complete {
                if let Some(cutter) = this.cutter.take() {
                    let chunk = match chunker.make_chunk(cutter.finish(), this.processed) {
                        Ok(chunk) => chunk,
                        Err(e) => return this.fail(e),
                    };
                    this.processed += u64::from(chunk.length());
                    return Poll::Ready(Some(Ok(chunk)));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/stream_tests.rs"]
mod tests;
