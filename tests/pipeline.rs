//! Tool-chain style tests: each stage reads an MDA stream and writes another
//!
//! Stages here run one after another on in-memory buffers, standing in for
//! processes connected by pipes.

use mdastream::types::convert;
use mdastream::{
    Array, Boundary, Coords, DType, MdaReader, MdaWriter, Neighborhood, PaddedChannelTraverser,
    StreamState, transcode,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Source tool: a ramp image with `channels` channels
fn source(width: usize, height: usize, channels: usize) -> Vec<u8> {
    let mut writer = MdaWriter::new();
    writer.connect(Vec::new());
    writer
        .write_header(&Coords::from([width, height]), channels, DType::U8)
        .unwrap();
    for y in 0..height {
        let line: Vec<u8> = (0..width)
            .flat_map(|x| (0..channels).map(move |c| (10 * y + x + c) as u8))
            .collect();
        writer.write_scanline(&line).unwrap();
    }
    writer.finish().unwrap()
}

/// Streaming tool: inverts every sample, holding one scanline at a time
fn invert(input: &[u8]) -> Vec<u8> {
    let mut reader = MdaReader::new();
    reader.connect(input);
    let header = reader.read_header().unwrap().clone();

    let mut writer = MdaWriter::new();
    writer.connect(Vec::new());
    writer
        .write_header(&header.shape, header.channels, header.dtype)
        .unwrap();
    while reader.num_scanlines_left() > 0 {
        let line: Vec<u8> = reader.read_scanline().unwrap().iter().map(|v| 255 - v).collect();
        writer.write_scanline(&line).unwrap();
    }
    assert_eq!(reader.state(), StreamState::Closed);
    writer.finish().unwrap()
}

/// Materializing tool: horizontal 3-tap box filter of every channel
fn box_filter(input: &[u8]) -> Vec<u8> {
    let array = Array::read_stream(input).unwrap();
    let mut out = Array::new(array.shape().clone(), array.channels(), DType::F32).unwrap();
    for channel in 0..array.channels() {
        let traverser = PaddedChannelTraverser::<f32>::new(&array, channel, 1, Boundary::Clamp).unwrap();
        for line in traverser {
            for x in 0..array.shape()[0] {
                let sum: f32 = line.samples[x..x + 3].iter().sum();
                let mut position = vec![x];
                position.extend(&line.outer);
                out.set(&Coords::new(position), channel, sum / 3.0).unwrap();
            }
        }
    }
    out.write_stream(Vec::new(), None).unwrap()
}

#[test]
fn chain_of_streaming_stages() {
    init_logging();
    let stage1 = source(4, 3, 2);
    let stage2 = invert(&stage1);
    let stage3 = invert(&stage2);
    assert_eq!(stage1, stage3);

    let inverted = Array::read_stream(stage2.as_slice()).unwrap();
    assert_eq!(inverted.get::<u8>(&Coords::from([3, 2]), 1).unwrap(), 255 - 24);
}

#[test]
fn chain_with_materializing_stage() {
    init_logging();
    let filtered = box_filter(&source(3, 2, 1));
    let array = Array::read_stream(filtered.as_slice()).unwrap();
    assert_eq!(array.dtype(), DType::F32);
    // row 0 is 0 1 2, clamped: (0+0+1)/3, (0+1+2)/3, (1+2+2)/3
    let row0 = array.channel_line::<f32>(0, 0).unwrap();
    let expected = [1.0 / 3.0, 1.0, 5.0 / 3.0];
    for (got, want) in row0.iter().zip(expected) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn transcode_between_stages() {
    init_logging();
    let stage1 = source(5, 4, 3);

    let mut reader = MdaReader::new();
    reader.connect(stage1.as_slice());
    let mut writer = MdaWriter::new();
    writer.connect(Vec::new());
    assert_eq!(transcode(&mut reader, &mut writer, Some(DType::F64)).unwrap(), 4);
    let wide = writer.finish().unwrap();

    let mut reader = MdaReader::new();
    reader.connect(wide.as_slice());
    let mut writer = MdaWriter::new();
    writer.connect(Vec::new());
    transcode(&mut reader, &mut writer, Some(DType::U8)).unwrap();
    assert_eq!(writer.finish().unwrap(), stage1);
}

#[test]
fn neighborhood_stage_over_materialized_input() {
    let array = Array::read_stream(source(4, 4, 1).as_slice()).unwrap();
    let cross = Neighborhood::star(2, 1, Boundary::Mirror).unwrap();

    // local maximum over the 4-neighborhood of every pixel
    let mut out = Array::new([4, 4], 1, DType::U8).unwrap();
    for y in 0..4 {
        for x in 0..4 {
            let center = Coords::from([x, y]);
            let values = cross.resolve::<u8>(&center, &array, 0).unwrap();
            out.set(&center, 0, values.into_iter().max().unwrap()).unwrap();
        }
    }
    let bytes = out.write_stream(Vec::new(), None).unwrap();
    let back = Array::read_stream(bytes.as_slice()).unwrap();
    let values = back.to_vec::<u8>().unwrap();
    // the ramp grows fastest along y, so the maximum is the sample below
    // except on the last row, where mirroring repeats the row itself
    assert_eq!(values[0], 10);
    assert_eq!(values[3], 13);
    assert_eq!(values[15], 33);
    assert_eq!(convert::from_bytes::<u8>(&back.scanline(1).unwrap()), vec![20, 21, 22, 23]);
}
