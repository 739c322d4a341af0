//! Multi-channel N-dimensional arrays

use super::coords::{self, Coords};
use super::{DType, Element, MemoryObject, convert};
use crate::error::{MdaError, Result};
use crate::stream::{MdaReader, MdaWriter, StreamState};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A typed view of a shared sample buffer
///
/// Samples are stored with axis 0 fastest and channels interleaved per
/// sample: element `(p, c)` lives at `linear_offset(shape, p) * channels + c`.
/// Several arrays may view the same [`MemoryObject`] (see [`Array::share`]);
/// writes through any of them are visible to all.
#[derive(Debug)]
pub struct Array {
    shape: Coords,
    channels: usize,
    dtype: DType,
    memory: MemoryObject,
}

impl Array {
    /// Zero-filled array
    pub fn new(shape: impl Into<Coords>, channels: usize, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        let byte_len = Self::byte_len_for(&shape, channels, dtype)?;
        let memory = MemoryObject::allocate(dtype, byte_len)?;
        Ok(Self {
            shape,
            channels,
            dtype,
            memory,
        })
    }

    /// Wrap existing native-order bytes; the length must match exactly
    pub fn from_bytes(
        shape: impl Into<Coords>,
        channels: usize,
        dtype: DType,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let shape = shape.into();
        let byte_len = Self::byte_len_for(&shape, channels, dtype)?;
        if bytes.len() != byte_len {
            return Err(MdaError::mismatch(byte_len, bytes.len()));
        }
        Ok(Self {
            shape,
            channels,
            dtype,
            memory: MemoryObject::from_bytes(dtype, bytes)?,
        })
    }

    /// Build from typed, channel-interleaved values
    pub fn from_values<T: Element>(
        shape: impl Into<Coords>,
        channels: usize,
        values: &[T],
    ) -> Result<Self> {
        Self::from_bytes(shape, channels, T::DTYPE, convert::to_bytes(values))
    }

    fn byte_len_for(shape: &Coords, channels: usize, dtype: DType) -> Result<usize> {
        if !shape.is_valid_shape() {
            return Err(MdaError::InvalidShape {
                shape: shape.as_slice().to_vec(),
            });
        }
        shape
            .num_elements()?
            .checked_mul(channels)
            .and_then(|n| n.checked_mul(dtype.element_size()))
            .ok_or(MdaError::Overflow)
    }

    pub fn shape(&self) -> &Coords {
        &self.shape
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn memory(&self) -> &MemoryObject {
        &self.memory
    }

    /// Number of sample positions (product of the shape)
    pub fn num_samples(&self) -> usize {
        // validated against overflow at construction
        self.shape.iter().product()
    }

    pub fn num_scanlines(&self) -> usize {
        self.num_samples() / self.shape[0]
    }

    /// Elements in one interleaved scanline
    pub fn scanline_len(&self) -> usize {
        self.shape[0] * self.channels
    }

    /// Bytes in one interleaved scanline
    pub fn scanline_size(&self) -> usize {
        self.scanline_len() * self.dtype.element_size()
    }

    /// Another view of the same buffer
    pub fn share(&self) -> Array {
        Array {
            shape: self.shape.clone(),
            channels: self.channels,
            dtype: self.dtype,
            memory: self.memory.share(),
        }
    }

    /// Deep copy into a new buffer
    pub fn duplicate(&self) -> Result<Array> {
        Array::from_bytes(
            self.shape.clone(),
            self.channels,
            self.dtype,
            self.memory.borrow().clone(),
        )
    }

    /// Deep copy converted to another data type, mapping range onto range
    pub fn convert(&self, dtype: DType) -> Result<Array> {
        let bytes = convert::convert_vec(&self.memory.borrow(), self.dtype, dtype)?;
        Array::from_bytes(self.shape.clone(), self.channels, dtype, bytes)
    }

    fn element_index(&self, position: &Coords, channel: usize) -> Result<usize> {
        self.check_channel(channel)?;
        Ok(coords::linear_offset(&self.shape, position)? * self.channels + channel)
    }

    fn check_type<T: Element>(&self) -> Result<()> {
        if T::DTYPE != self.dtype {
            return Err(MdaError::TypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(())
    }

    /// Typed read of one element; `T` must be the stored type
    pub fn get<T: Element>(&self, position: &Coords, channel: usize) -> Result<T> {
        self.check_type::<T>()?;
        let size = std::mem::size_of::<T>();
        let start = self.element_index(position, channel)? * size;
        Ok(T::read_ne(&self.memory.borrow()[start..start + size]))
    }

    /// Typed write of one element; `T` must be the stored type
    pub fn set<T: Element>(&mut self, position: &Coords, channel: usize, value: T) -> Result<()> {
        self.check_type::<T>()?;
        let size = std::mem::size_of::<T>();
        let start = self.element_index(position, channel)? * size;
        value.write_ne(&mut self.memory.borrow_mut()[start..start + size]);
        Ok(())
    }

    /// Read one element as `f64`, whatever the stored type
    pub fn get_f64(&self, position: &Coords, channel: usize) -> Result<f64> {
        let index = self.element_index(position, channel)?;
        Ok(self.element_as::<f64>(index))
    }

    /// Write one element from `f64`, saturating to the stored type
    pub fn set_f64(&mut self, position: &Coords, channel: usize, value: f64) -> Result<()> {
        let index = self.element_index(position, channel)?;
        let size = self.dtype.element_size();
        convert::write_f64(
            value,
            &mut self.memory.borrow_mut()[index * size..(index + 1) * size],
            self.dtype,
        );
        Ok(())
    }

    /// Element at a raw element index, converted to `T`; the index must be valid
    pub(crate) fn element_as<T: Element>(&self, index: usize) -> T {
        let size = self.dtype.element_size();
        let memory = self.memory.borrow();
        T::from_f64(convert::read_f64(
            &memory[index * size..(index + 1) * size],
            self.dtype,
        ))
    }

    fn scanline_range(&self, index: usize) -> Result<std::ops::Range<usize>> {
        let count = self.num_scanlines();
        if index >= count {
            return Err(MdaError::OutOfRange {
                index,
                extent: count,
            });
        }
        let size = self.scanline_size();
        Ok(index * size..(index + 1) * size)
    }

    /// Copy of one interleaved scanline in the stored type
    pub fn scanline(&self, index: usize) -> Result<Vec<u8>> {
        let range = self.scanline_range(index)?;
        Ok(self.memory.borrow()[range].to_vec())
    }

    /// Overwrite one interleaved scanline
    pub fn update_scanline(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let range = self.scanline_range(index)?;
        if bytes.len() != range.len() {
            return Err(MdaError::mismatch(range.len(), bytes.len()));
        }
        self.memory.borrow_mut()[range].copy_from_slice(bytes);
        Ok(())
    }

    /// One channel of one scanline, converted to `T`
    pub fn channel_line<T: Element>(&self, index: usize, channel: usize) -> Result<Vec<T>> {
        self.check_channel(channel)?;
        let range = self.scanline_range(index)?;
        let size = self.dtype.element_size();
        let first = range.start / size + channel;
        Ok((0..self.shape[0])
            .map(|x| self.element_as::<T>(first + x * self.channels))
            .collect())
    }

    /// Typed copy of the whole buffer; `T` must be the stored type
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.check_type::<T>()?;
        Ok(convert::from_bytes(&self.memory.borrow()))
    }

    /// Append one zero channel and return its index
    ///
    /// The buffer is reallocated and re-interleaved; existing values keep
    /// their `(position, channel)` coordinates. Views obtained from
    /// [`Array::share`] before this call keep the old buffer and no longer
    /// alias this array. The same holds for every channel operation below.
    pub fn add_channel(&mut self) -> Result<usize> {
        self.add_channel_with(0.0)
    }

    /// Append one channel initialized to `fill`, converted like [`Array::set_f64`]
    pub fn add_channel_with(&mut self, fill: f64) -> Result<usize> {
        let old = self.channels;
        let channels = old.checked_add(1).ok_or(MdaError::Overflow)?;
        let mut fill_bytes = vec![0u8; self.dtype.element_size()];
        convert::write_f64(fill, &mut fill_bytes, self.dtype);
        self.rebuild(channels, |c| (c < old).then_some(c), &fill_bytes)?;
        log::trace!("added channel {old} to {} array", self.shape);
        Ok(old)
    }

    /// Remove channel `index`; later channels move down by one
    pub fn delete_channel(&mut self, index: usize) -> Result<()> {
        self.check_channel(index)?;
        self.rebuild(
            self.channels - 1,
            |c| Some(if c < index { c } else { c + 1 }),
            &[],
        )?;
        log::trace!("deleted channel {index} of {} array", self.shape);
        Ok(())
    }

    /// Exchange the contents of channels `a` and `b`
    pub fn swap_channels(&mut self, a: usize, b: usize) -> Result<()> {
        self.check_channel(a)?;
        self.check_channel(b)?;
        if a == b {
            return Ok(());
        }
        self.rebuild(
            self.channels,
            |c| {
                Some(match c {
                    c if c == a => b,
                    c if c == b => a,
                    c => c,
                })
            },
            &[],
        )
    }

    fn check_channel(&self, channel: usize) -> Result<()> {
        if channel >= self.channels {
            return Err(MdaError::OutOfRange {
                index: channel,
                extent: self.channels,
            });
        }
        Ok(())
    }

    /// Re-interleave into a fresh buffer of `channels` channels
    ///
    /// New channel `c` copies old channel `source(c)`, or holds `fill` (one
    /// element of the stored type) when `source` returns `None`.
    fn rebuild(
        &mut self,
        channels: usize,
        source: impl Fn(usize) -> Option<usize>,
        fill: &[u8],
    ) -> Result<()> {
        let size = self.dtype.element_size();
        let old_stride = self.channels * size;
        let new_stride = channels.checked_mul(size).ok_or(MdaError::Overflow)?;
        let samples = self.shape.num_elements()?;
        let byte_len = samples.checked_mul(new_stride).ok_or(MdaError::Overflow)?;
        let memory = MemoryObject::allocate(self.dtype, byte_len)?;

        if new_stride > 0 {
            let old = self.memory.borrow();
            let mut new = memory.borrow_mut();
            for (sample, dst) in new.chunks_exact_mut(new_stride).enumerate() {
                let src = &old[sample * old_stride..(sample + 1) * old_stride];
                for (c, element) in dst.chunks_exact_mut(size).enumerate() {
                    match source(c) {
                        Some(from) => {
                            element.copy_from_slice(&src[from * size..(from + 1) * size])
                        }
                        None => element.copy_from_slice(fill),
                    }
                }
            }
        }

        self.memory = memory;
        self.channels = channels;
        Ok(())
    }

    /// Materialize an array from a reader
    ///
    /// Reads the header first if the reader has not done so yet. The reader
    /// must not have consumed any scanline.
    pub fn read_from<R: Read>(reader: &mut MdaReader<R>) -> Result<Array> {
        if reader.state() == StreamState::HeaderPending {
            reader.read_header()?;
        }
        let header = reader
            .header()
            .cloned()
            .ok_or_else(|| MdaError::protocol("no header has been read"))?;
        if reader.num_scanlines_left() != header.num_scanlines()? {
            return Err(MdaError::protocol(
                "reader has already consumed scanlines",
            ));
        }

        let array = Array::new(header.shape.clone(), header.channels, header.dtype)?;
        {
            let size = array.scanline_size();
            let mut memory = array.memory.borrow_mut();
            for line in memory.chunks_exact_mut(size) {
                reader.read_scanline_into(line)?;
            }
        }
        log::debug!(
            "read {} array, {} channel(s) of {}",
            array.shape,
            array.channels,
            array.dtype
        );
        Ok(array)
    }

    /// Read a whole array from an MDA byte stream
    pub fn read_stream<R: Read>(stream: R) -> Result<Array> {
        let mut reader = MdaReader::new();
        reader.connect(stream);
        Array::read_from(&mut reader)
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Array> {
        Array::read_stream(BufReader::new(File::open(path)?))
    }

    /// Emit the whole array as an MDA stream, optionally converting to `out_type`
    ///
    /// Returns the stream after flushing it.
    pub fn write_stream<W: Write>(&self, stream: W, out_type: Option<DType>) -> Result<W> {
        let out_type = out_type.unwrap_or(self.dtype);
        let mut writer = MdaWriter::new();
        writer.connect(stream);
        writer.write_header(&self.shape, self.channels, out_type)?;

        let count = self.scanline_len();
        let size = self.scanline_size();
        let mut converted = vec![0u8; writer.scanline_size()];
        {
            let memory = self.memory.borrow();
            for line in memory.chunks_exact(size) {
                convert::convert_elements(line, self.dtype, &mut converted, out_type, count)?;
                writer.write_scanline(&converted)?;
            }
        }
        log::debug!("wrote {} array as {}", self.shape, out_type);
        writer.finish()
    }

    pub fn write_file(&self, path: impl AsRef<Path>, out_type: Option<DType>) -> Result<()> {
        let stream = self.write_stream(BufWriter::new(File::create(path)?), out_type)?;
        stream.into_inner().map_err(|e| MdaError::Io(e.into_error()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(shape: [usize; 2], channels: usize) -> Array {
        let n = shape[0] * shape[1] * channels;
        let values: Vec<u16> = (0..n as u16).collect();
        Array::from_values(shape, channels, &values).unwrap()
    }

    #[test]
    fn test_new_zeroed() {
        let a = Array::new([3, 2], 2, DType::F32).unwrap();
        assert_eq!(a.num_samples(), 6);
        assert_eq!(a.num_scanlines(), 2);
        assert_eq!(a.scanline_size(), 3 * 2 * 4);
        assert_eq!(a.memory().byte_len(), 48);
        assert_eq!(a.get::<f32>(&Coords::from([2, 1]), 1).unwrap(), 0.0);
    }

    #[test]
    fn test_invalid_shape() {
        assert!(matches!(
            Array::new([3, 0], 1, DType::U8),
            Err(MdaError::InvalidShape { .. })
        ));
        assert!(Array::new(Vec::<usize>::new(), 1, DType::U8).is_err());
        assert!(Array::from_bytes([2, 2], 1, DType::U8, vec![0; 3]).is_err());
    }

    #[test]
    fn test_interleaved_layout() {
        let a = ramp([3, 2], 2);
        // element (p, c) = linear_offset(p) * channels + c
        assert_eq!(a.get::<u16>(&Coords::from([0, 0]), 1).unwrap(), 1);
        assert_eq!(a.get::<u16>(&Coords::from([1, 0]), 0).unwrap(), 2);
        assert_eq!(a.get::<u16>(&Coords::from([0, 1]), 0).unwrap(), 6);
        assert_eq!(a.get::<u16>(&Coords::from([2, 1]), 1).unwrap(), 11);
    }

    #[test]
    fn test_access_checks() {
        let mut a = ramp([3, 2], 2);
        assert!(matches!(
            a.get::<u16>(&Coords::from([3, 0]), 0),
            Err(MdaError::OutOfRange {
                index: 3,
                extent: 3
            })
        ));
        assert!(matches!(
            a.get::<u16>(&Coords::from([0, 0]), 2),
            Err(MdaError::OutOfRange {
                index: 2,
                extent: 2
            })
        ));
        assert!(matches!(
            a.get::<f32>(&Coords::from([0, 0]), 0),
            Err(MdaError::TypeMismatch { .. })
        ));
        assert!(a.set(&Coords::from([0, 0, 0]), 0, 1u16).is_err());
    }

    #[test]
    fn test_f64_access_converts() {
        let mut a = Array::new([2], 1, DType::U8).unwrap();
        a.set_f64(&Coords::from([0]), 0, 300.0).unwrap();
        a.set_f64(&Coords::from([1]), 0, 41.6).unwrap();
        assert_eq!(a.get::<u8>(&Coords::from([0]), 0).unwrap(), 255);
        assert_eq!(a.get_f64(&Coords::from([1]), 0).unwrap(), 42.0);
    }

    #[test]
    fn test_share_aliases() {
        let mut a = ramp([3, 2], 1);
        let b = a.share();
        assert!(a.memory().ptr_eq(b.memory()));
        a.set(&Coords::from([1, 1]), 0, 999u16).unwrap();
        assert_eq!(b.get::<u16>(&Coords::from([1, 1]), 0).unwrap(), 999);

        let c = a.duplicate().unwrap();
        a.set(&Coords::from([1, 1]), 0, 5u16).unwrap();
        assert_eq!(c.get::<u16>(&Coords::from([1, 1]), 0).unwrap(), 999);
    }

    #[test]
    fn test_add_channel_preserves_values() {
        let mut a = ramp([3, 2], 2);
        let before = a.duplicate().unwrap();
        let alias = a.share();

        assert_eq!(a.add_channel().unwrap(), 2);
        assert_eq!(a.channels(), 3);
        assert_eq!(a.memory().byte_len(), 3 * 2 * 3 * 2);

        for y in 0..2 {
            for x in 0..3 {
                let p = Coords::from([x, y]);
                for c in 0..2 {
                    assert_eq!(
                        a.get::<u16>(&p, c).unwrap(),
                        before.get::<u16>(&p, c).unwrap()
                    );
                }
                assert_eq!(a.get::<u16>(&p, 2).unwrap(), 0);
            }
        }

        // old views keep the old buffer
        assert!(!a.memory().ptr_eq(alias.memory()));
        assert_eq!(alias.channels(), 2);
    }

    #[test]
    fn test_add_channel_from_empty() {
        let mut a = Array::new([4, 4], 0, DType::F64).unwrap();
        assert_eq!(a.memory().byte_len(), 0);
        assert_eq!(a.add_channel().unwrap(), 0);
        assert_eq!(a.add_channel().unwrap(), 1);
        a.set(&Coords::from([3, 3]), 1, 2.5f64).unwrap();
        assert_eq!(a.get::<f64>(&Coords::from([3, 3]), 1).unwrap(), 2.5);
    }

    #[test]
    fn test_add_channel_with_fill() {
        let mut a = ramp([2, 2], 1);
        assert_eq!(a.add_channel_with(7.0).unwrap(), 1);
        assert_eq!(a.add_channel_with(1e9).unwrap(), 2);
        assert_eq!(
            a.to_vec::<u16>().unwrap(),
            vec![0, 7, 65535, 1, 7, 65535, 2, 7, 65535, 3, 7, 65535]
        );
    }

    #[test]
    fn test_delete_channel() {
        let mut a = ramp([3, 2], 3);
        let alias = a.share();
        a.delete_channel(1).unwrap();
        assert_eq!(a.channels(), 2);
        assert_eq!(a.memory().byte_len(), 3 * 2 * 2 * 2);
        for y in 0..2 {
            for x in 0..3 {
                let p = Coords::from([x, y]);
                assert_eq!(a.get::<u16>(&p, 0).unwrap(), alias.get::<u16>(&p, 0).unwrap());
                assert_eq!(a.get::<u16>(&p, 1).unwrap(), alias.get::<u16>(&p, 2).unwrap());
            }
        }
        assert_eq!(alias.channels(), 3);

        assert!(matches!(
            a.delete_channel(2),
            Err(MdaError::OutOfRange {
                index: 2,
                extent: 2
            })
        ));
        a.delete_channel(1).unwrap();
        a.delete_channel(0).unwrap();
        assert_eq!(a.channels(), 0);
        assert_eq!(a.memory().byte_len(), 0);
    }

    #[test]
    fn test_swap_channels() {
        let mut a = Array::from_values([2, 1], 3, &[1i8, 2, 3, 4, 5, 6]).unwrap();
        let alias = a.share();
        a.swap_channels(0, 2).unwrap();
        assert_eq!(a.to_vec::<i8>().unwrap(), vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(alias.to_vec::<i8>().unwrap(), vec![1, 2, 3, 4, 5, 6]);

        a.swap_channels(1, 1).unwrap();
        assert_eq!(a.to_vec::<i8>().unwrap(), vec![3, 2, 1, 6, 5, 4]);
        assert!(a.swap_channels(0, 3).is_err());
    }

    #[test]
    fn test_scanlines() {
        let mut a = ramp([3, 2], 2);
        let line = a.scanline(1).unwrap();
        assert_eq!(convert::from_bytes::<u16>(&line), vec![6, 7, 8, 9, 10, 11]);
        assert_eq!(a.channel_line::<f32>(1, 1).unwrap(), vec![7.0, 9.0, 11.0]);

        a.update_scanline(0, &convert::to_bytes(&[1u16; 6])).unwrap();
        assert_eq!(a.get::<u16>(&Coords::from([2, 0]), 1).unwrap(), 1);
        assert!(a.update_scanline(0, &[0u8; 3]).is_err());
        assert!(a.scanline(2).is_err());
    }

    #[test]
    fn test_convert() {
        let a = Array::from_values([3], 1, &[-1.0f32, 0.5, 1000.0]).unwrap();
        let b = a.convert(DType::U8).unwrap();
        assert_eq!(b.to_vec::<u8>().unwrap(), vec![0, 128, 255]);
        let c = b.convert(DType::F64).unwrap();
        assert_eq!(c.to_vec::<f64>().unwrap(), vec![0.0, 128.0 / 255.0, 1.0]);
        assert!(b.to_vec::<i8>().is_err());
    }
}
