//! Encoding-guide vectors through every backend.

use pbwire::codec::{
    NullWriter, ProtoReader, ProtoWriter, Result, SliceReader, SliceWriter, WireMessage,
};

const TEST1: &[u8] = &[0x08, 0x96, 0x01];
const TEST2: &[u8] = &[0x12, 0x07, b't', b'e', b's', b't', b'i', b'n', b'g'];
const TEST3: &[u8] = &[0x1a, 0x03, 0x08, 0x96, 0x01];

#[derive(Debug, Default, PartialEq)]
struct Sample {
    a: Option<i32>,
    b: Option<String>,
    c: Option<i32>,
}

/// Nested payload of field 3.
struct Inner {
    a: i32,
}

impl WireMessage for Inner {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_int32(1, self.a).await?;
        Ok(())
    }
}

impl WireMessage for Sample {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        if let Some(a) = self.a {
            writer.write_int32(1, a).await?;
        }
        if let Some(b) = &self.b {
            writer.write_string(2, b).await?;
        }
        if let Some(c) = self.c {
            writer.write_sub_object(3, &Inner { a: c }).await?;
        }
        Ok(())
    }
}

async fn decode<R: ProtoReader>(reader: &mut R) -> Result<Sample> {
    let mut sample = Sample::default();
    while reader.read_next_field().await? {
        match reader.field_number() {
            1 => sample.a = Some(reader.read_int32().await?),
            2 => sample.b = Some(reader.read_string().await?),
            3 => {
                let token = reader.begin_sub_object().await?;
                while reader.read_next_field().await? {
                    match reader.field_number() {
                        1 => sample.c = Some(reader.read_int32().await?),
                        _ => reader.skip_field().await?,
                    }
                }
                reader.end_sub_object(token)?;
            }
            _ => reader.skip_field().await?,
        }
    }
    Ok(sample)
}

fn samples() -> [(Sample, &'static [u8]); 3] {
    [
        (
            Sample {
                a: Some(150),
                ..Sample::default()
            },
            TEST1,
        ),
        (
            Sample {
                b: Some("testing".to_string()),
                ..Sample::default()
            },
            TEST2,
        ),
        (
            Sample {
                c: Some(150),
                ..Sample::default()
            },
            TEST3,
        ),
    ]
}

#[tokio::test]
async fn flat_writer_produces_known_bytes() {
    for (sample, expected) in samples() {
        let len = sample.encoded_len().await.unwrap();
        assert_eq!(len, expected.len() as u64);

        let mut buf = vec![0u8; len as usize];
        let mut writer = SliceWriter::new(&mut buf);
        sample.encode(&mut writer).await.unwrap();
        writer.flush(true).await.unwrap();
        assert_eq!(buf, expected);
    }
}

#[tokio::test]
async fn flat_reader_decodes_known_bytes() {
    for (sample, bytes) in samples() {
        let decoded = decode(&mut SliceReader::new(bytes)).await.unwrap();
        assert_eq!(decoded, sample);
    }
}

#[tokio::test]
async fn null_writer_counts_known_bytes() {
    for (sample, bytes) in samples() {
        let mut null = NullWriter::new();
        sample.encode(&mut null).await.unwrap();
        assert_eq!(null.position(), bytes.len() as u64);
    }
}

#[cfg(feature = "async")]
mod stream {
    use std::io;

    use bytes::Bytes;
    use futures_util::stream;
    use pbwire::codec::{StreamReader, StreamWriter};

    use super::*;

    #[tokio::test]
    async fn stream_writer_produces_known_bytes() {
        for (sample, expected) in samples() {
            let mut writer = StreamWriter::new(Vec::new());
            sample.encode(&mut writer).await.unwrap();
            assert_eq!(writer.close().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn stream_reader_decodes_known_bytes_split_anywhere() {
        for (sample, bytes) in samples() {
            for split in 0..=bytes.len() {
                let (head, tail) = bytes.split_at(split);
                let chunks: Vec<io::Result<Bytes>> = vec![
                    Ok(Bytes::copy_from_slice(head)),
                    Ok(Bytes::copy_from_slice(tail)),
                ];
                let mut reader = StreamReader::new(stream::iter(chunks));
                assert_eq!(decode(&mut reader).await.unwrap(), sample);
            }
        }
    }
}
