//! Chunk sources feeding the [`Sender`](crate::Sender).
//!
//! A source hands out one payload per pacing tick. Neither implementation
//! demuxes a container: [`ReaderChunkSource`] cuts the input into
//! fixed-size pieces, and [`AnnexBChunkSource`] splits a raw H.264 Annex B
//! stream at its start codes.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::media::h264::extract_nal_units;

/// Default size of a chunk read by [`ReaderChunkSource`].
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Supplier of payload chunks, one per packet.
///
/// - `Ok(Some(bytes))`: the next chunk.
/// - `Ok(None)`: end of input. The sender stops.
/// - `Err(_)`: a transient read failure. The sender skips the tick.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Sequential fixed-size reader over any byte source.
///
/// Each call performs one `read` into a buffer of `chunk_size` bytes and
/// returns what it got, so a chunk may be shorter than `chunk_size`.
pub struct ReaderChunkSource<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl ReaderChunkSource<File> {
    /// Open a file for chunked reading.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), chunk_size, "chunk source opened");
        Ok(Self::new(file, chunk_size))
    }
}

impl<R: Read> ReaderChunkSource<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buffer: vec![0u8; chunk_size.max(1)],
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }
}

impl<R: Read> ChunkSource for ReaderChunkSource<R> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let n = self.reader.read(&mut self.buffer)?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(self.buffer[..n].to_vec()))
    }
}

/// One NAL unit per chunk, start codes stripped.
///
/// The whole stream is split up front.
#[derive(Debug)]
pub struct AnnexBChunkSource {
    nal_units: VecDeque<Vec<u8>>,
}

impl AnnexBChunkSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let source = Self::from_bytes(&data);
        tracing::debug!(
            path = %path.as_ref().display(),
            bytes = data.len(),
            nal_units = source.remaining(),
            "Annex B source opened"
        );
        Ok(source)
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            nal_units: extract_nal_units(data).into(),
        }
    }

    /// NAL units not yet handed out.
    pub fn remaining(&self) -> usize {
        self.nal_units.len()
    }
}

impl ChunkSource for AnnexBChunkSource {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.nal_units.pop_front())
    }
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).next_chunk()
    }
}
