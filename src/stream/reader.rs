//! Scanline reader

use super::StreamState;
use super::header::{self, read_field, swap_byte_order};
use crate::error::{MdaError, Result};
use crate::types::{ByteOrder, StreamHeader};
use std::fs::File;
use std::io::{self, BufReader, Read, StdinLock};
use std::path::Path;

/// Reads an MDA stream one scanline at a time
///
/// ```text
/// new() -> Disconnected --connect--> HeaderPending --read_header--> Streaming
///       --(last scanline | disconnect)--> Closed
/// ```
///
/// Scanlines are handed out in native byte order whatever order the
/// stream declares.
#[derive(Debug)]
pub struct MdaReader<R> {
    stream: Option<R>,
    state: StreamState,
    header: Option<StreamHeader>,
    scanline_size: usize,
    remaining: usize,
    buffer: Vec<u8>,
}

impl<R> Default for MdaReader<R> {
    fn default() -> Self {
        Self {
            stream: None,
            state: StreamState::Disconnected,
            header: None,
            scanline_size: 0,
            remaining: 0,
            buffer: Vec::new(),
        }
    }
}

impl MdaReader<BufReader<File>> {
    /// Connected reader over a file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        log::debug!("reading MDA stream from {}", path.display());
        let mut reader = Self::new();
        reader.connect(BufReader::new(file));
        Ok(reader)
    }
}

impl MdaReader<StdinLock<'static>> {
    /// Connected reader over standard input
    pub fn stdin() -> Self {
        let mut reader = Self::new();
        reader.connect(io::stdin().lock());
        reader
    }
}

impl<R: Read> MdaReader<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `stream`, dropping any previous one, and wait for a header
    pub fn connect(&mut self, stream: R) {
        if self.stream.is_some() {
            log::debug!("reader rebound while {:?}", self.state);
        }
        *self = Self {
            stream: Some(stream),
            state: StreamState::HeaderPending,
            ..Self::default()
        };
    }

    /// Parse the header and enter [`StreamState::Streaming`]
    ///
    /// On malformed input the reader stays in `HeaderPending` and reports
    /// [`MdaError::MalformedStream`].
    pub fn read_header(&mut self) -> Result<&StreamHeader> {
        if self.state != StreamState::HeaderPending {
            return Err(MdaError::protocol(format!(
                "cannot read a header while {:?}",
                self.state
            )));
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MdaError::protocol("reader is not connected"))?;

        let parsed = header::read_header(stream).inspect_err(|e| {
            log::warn!("rejected MDA header: {e}");
        })?;
        let (scanline_size, num_scanlines) = parsed.validate()?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(scanline_size)
            .map_err(|_| MdaError::Allocation {
                bytes: scanline_size,
            })?;
        buffer.resize(scanline_size, 0);

        log::debug!(
            "read header: shape {}, {} channel(s) of {}, {num_scanlines} scanline(s) of {scanline_size} bytes",
            parsed.shape,
            parsed.channels,
            parsed.dtype
        );
        self.buffer = buffer;
        self.scanline_size = scanline_size;
        self.remaining = num_scanlines;
        self.state = StreamState::Streaming;
        Ok(self.header.insert(parsed))
    }

    /// Read the next scanline into the internal buffer
    fn fill_buffer(&mut self) -> Result<()> {
        if self.state != StreamState::Streaming {
            return Err(MdaError::protocol(format!(
                "cannot read a scanline while {:?}",
                self.state
            )));
        }
        if self.remaining == 0 {
            return Err(MdaError::protocol("no scanlines left"));
        }
        let (Some(stream), Some(header)) = (self.stream.as_mut(), self.header.as_ref()) else {
            return Err(MdaError::protocol("reader is not connected"));
        };

        if let Err(e) = read_field(stream, &mut self.buffer, "scanline") {
            log::warn!("{e} with {} scanline(s) left", self.remaining);
            // the position in the stream is lost
            self.state = StreamState::Closed;
            return Err(e);
        }
        if header.byte_order != ByteOrder::native() {
            swap_byte_order(&mut self.buffer, header.dtype.element_size());
        }

        self.remaining -= 1;
        log::trace!("read scanline, {} left", self.remaining);
        if self.remaining == 0 {
            self.state = StreamState::Closed;
            log::debug!("input stream complete");
        }
        Ok(())
    }

    /// Next scanline in native byte order
    ///
    /// The slice is valid until the next call on this reader.
    pub fn read_scanline(&mut self) -> Result<&[u8]> {
        self.fill_buffer()?;
        Ok(&self.buffer)
    }

    /// Next scanline copied into `out`, which must be exactly one scanline long
    ///
    /// `out` is left untouched if the read fails.
    pub fn read_scanline_into(&mut self, out: &mut [u8]) -> Result<()> {
        if self.state == StreamState::Streaming && out.len() != self.scanline_size {
            return Err(MdaError::mismatch(self.scanline_size, out.len()));
        }
        self.fill_buffer()?;
        out.copy_from_slice(&self.buffer);
        Ok(())
    }

    /// Consume the next scanline without looking at it
    pub fn skip_scanline(&mut self) -> Result<()> {
        self.fill_buffer()
    }

    /// Release the stream; no further reads are possible
    pub fn disconnect(&mut self) -> Option<R> {
        if self.state == StreamState::Streaming {
            log::debug!("reader released with {} scanline(s) unread", self.remaining);
        }
        if self.state != StreamState::Disconnected {
            self.state = StreamState::Closed;
        }
        self.buffer = Vec::new();
        self.stream.take()
    }

    /// Bytes per scanline; 0 until the header has been read
    pub fn scanline_size(&self) -> usize {
        self.scanline_size
    }

    pub fn num_scanlines_left(&self) -> usize {
        self.remaining
    }

    pub fn header(&self) -> Option<&StreamHeader> {
        self.header.as_ref()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }
}
