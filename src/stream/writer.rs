//! Scanline writer

use super::StreamState;
use super::header::{self, swap_byte_order};
use crate::error::{MdaError, Result};
use crate::types::{ByteOrder, Coords, DType, StreamHeader};
use std::fs::File;
use std::io::{self, BufWriter, StdoutLock, Write};
use std::path::Path;

/// Writes an MDA stream one scanline at a time
///
/// Follows the same states as [`super::MdaReader`]. Scanlines are accepted
/// in native byte order and swapped on the way out if the header asked for
/// the other order. Use [`MdaWriter::finish`] to flush and check that every
/// declared scanline was written; dropping a writer early only logs a warning.
///
/// A failed write may leave part of a header or scanline on the wire, so any
/// I/O error closes the writer and makes [`MdaWriter::finish`] fail.
#[derive(Debug)]
pub struct MdaWriter<W: Write> {
    stream: Option<W>,
    state: StreamState,
    header: Option<StreamHeader>,
    scanline_size: usize,
    remaining: usize,
    swap_buffer: Vec<u8>,
    broken: bool,
}

impl MdaWriter<BufWriter<File>> {
    /// Connected writer creating (or truncating) a file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        log::debug!("writing MDA stream to {}", path.display());
        let mut writer = Self::new();
        writer.connect(BufWriter::new(file));
        Ok(writer)
    }
}

impl MdaWriter<StdoutLock<'static>> {
    /// Connected writer over standard output
    pub fn stdout() -> Self {
        let mut writer = Self::new();
        writer.connect(io::stdout().lock());
        writer
    }
}

impl<W: Write> Default for MdaWriter<W> {
    fn default() -> Self {
        Self {
            stream: None,
            state: StreamState::Disconnected,
            header: None,
            scanline_size: 0,
            remaining: 0,
            swap_buffer: Vec::new(),
            broken: false,
        }
    }
}

impl<W: Write> MdaWriter<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `stream` and wait for a header
    ///
    /// A previously bound stream is released as by [`MdaWriter::disconnect`].
    pub fn connect(&mut self, stream: W) {
        if self.stream.is_some() {
            log::debug!("writer rebound while {:?}", self.state);
            if let Err(e) = self.disconnect() {
                log::warn!("flushing the previous stream failed: {e}");
            }
        }
        self.stream = Some(stream);
        self.state = StreamState::HeaderPending;
        self.header = None;
        self.scanline_size = 0;
        self.remaining = 0;
        self.swap_buffer = Vec::new();
        self.broken = false;
    }

    /// Emit a header with samples in native byte order
    pub fn write_header(&mut self, shape: &Coords, channels: usize, dtype: DType) -> Result<()> {
        self.write_header_with_order(shape, channels, dtype, ByteOrder::native())
    }

    /// Emit a header declaring `byte_order` for the body
    pub fn write_header_with_order(
        &mut self,
        shape: &Coords,
        channels: usize,
        dtype: DType,
        byte_order: ByteOrder,
    ) -> Result<()> {
        self.write_stream_header(StreamHeader {
            shape: shape.clone(),
            channels,
            dtype,
            byte_order,
        })
    }

    /// Emit `header` and enter [`StreamState::Streaming`]
    pub fn write_stream_header(&mut self, header: StreamHeader) -> Result<()> {
        if self.state != StreamState::HeaderPending {
            return Err(MdaError::protocol(format!(
                "cannot write a header while {:?}",
                self.state
            )));
        }
        let (scanline_size, num_scanlines) = header.validate()?;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MdaError::protocol("writer is not connected"))?;
        let encoded = header::encode_header(&header)?;
        if let Err(e) = stream.write_all(&encoded) {
            return Err(self.fail(e));
        }

        log::debug!(
            "wrote header: shape {}, {} channel(s) of {}, {num_scanlines} scanline(s) of {scanline_size} bytes",
            header.shape,
            header.channels,
            header.dtype
        );
        if header.byte_order != ByteOrder::native() && header.dtype.element_size() > 1 {
            self.swap_buffer = vec![0u8; scanline_size];
        }
        self.scanline_size = scanline_size;
        self.remaining = num_scanlines;
        self.header = Some(header);
        self.state = StreamState::Streaming;
        Ok(())
    }

    /// Emit exactly one scanline of native-order samples
    pub fn write_scanline(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state != StreamState::Streaming {
            return Err(MdaError::protocol(format!(
                "cannot write a scanline while {:?}",
                self.state
            )));
        }
        if self.remaining == 0 {
            return Err(MdaError::protocol("no scanlines left"));
        }
        if bytes.len() != self.scanline_size {
            return Err(MdaError::mismatch(self.scanline_size, bytes.len()));
        }
        let (Some(stream), Some(header)) = (self.stream.as_mut(), self.header.as_ref()) else {
            return Err(MdaError::protocol("writer is not connected"));
        };

        let written = if self.swap_buffer.is_empty() {
            stream.write_all(bytes)
        } else {
            self.swap_buffer.copy_from_slice(bytes);
            swap_byte_order(&mut self.swap_buffer, header.dtype.element_size());
            stream.write_all(&self.swap_buffer)
        };
        let last = self.remaining == 1;
        if let Err(e) = written.and_then(|()| if last { stream.flush() } else { Ok(()) }) {
            return Err(self.fail(e));
        }

        self.remaining -= 1;
        log::trace!("wrote scanline, {} left", self.remaining);
        if last {
            self.state = StreamState::Closed;
            log::debug!("output stream complete");
        }
        Ok(())
    }

    /// Close after an I/O error; the framing on the wire can no longer be trusted
    fn fail(&mut self, error: io::Error) -> MdaError {
        log::warn!(
            "MDA output failed with {} scanline(s) left: {error}",
            self.remaining
        );
        self.state = StreamState::Closed;
        self.broken = true;
        self.swap_buffer = Vec::new();
        MdaError::Io(error)
    }

    /// Flush and release the stream; no further writes are possible
    ///
    /// Returns `None` if nothing was bound. Missing scanlines are logged,
    /// not reported; use [`MdaWriter::finish`] for a checked close.
    pub fn disconnect(&mut self) -> Result<Option<W>> {
        if self.state == StreamState::Streaming {
            log::warn!(
                "output stream released with {} scanline(s) missing",
                self.remaining
            );
        }
        if self.state != StreamState::Disconnected {
            self.state = StreamState::Closed;
        }
        self.swap_buffer = Vec::new();
        match self.stream.take() {
            Some(mut stream) => {
                stream.flush()?;
                Ok(Some(stream))
            }
            None => Ok(None),
        }
    }

    /// Flush and hand back the stream once every scanline has been written
    pub fn finish(mut self) -> Result<W> {
        let missing = match self.state {
            StreamState::Closed if self.broken => {
                Some("stream is incomplete after a failed write".to_string())
            }
            StreamState::Closed => None,
            StreamState::Streaming => Some(format!(
                "{} scanline(s) still expected",
                self.remaining
            )),
            state => Some(format!("cannot finish a writer while {state:?}")),
        };
        if let Some(message) = missing {
            // report once here rather than again on drop
            self.state = StreamState::Closed;
            return Err(MdaError::protocol(message));
        }
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| MdaError::protocol("stream already released"))?;
        stream.flush()?;
        Ok(stream)
    }

    /// Bytes per scanline; 0 until the header has been written
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

impl<W: Write> Drop for MdaWriter<W> {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            log::warn!(
                "MDA writer dropped with {} scanline(s) missing",
                self.remaining
            );
        }
        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.flush() {
                log::warn!("flushing MDA output on drop failed: {e}");
            }
        }
    }
}
