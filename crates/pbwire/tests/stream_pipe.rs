#![cfg(feature = "async")]

use pbwire::codec::{
    CodecConfig, CodecError, ProtoReader, ProtoWriter, Result, StreamReader, StreamWriter,
    WireMessage,
};
use pbwire::encoding::WireType;

/// A record with every scalar kind, a repeated nested message and a blob.
#[derive(Debug, Clone, PartialEq)]
struct Record {
    id: u64,
    delta: i64,
    ratio: f64,
    weight: f32,
    flag: bool,
    checksum: u32,
    name: String,
    children: Vec<Child>,
    blob: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
struct Child {
    index: i32,
    label: String,
}

impl WireMessage for Child {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_sint32(1, self.index).await?;
        writer.write_string(2, &self.label).await?;
        Ok(())
    }
}

impl WireMessage for Record {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_uint64(1, self.id).await?;
        writer.write_sint64(2, self.delta).await?;
        writer.write_double(3, self.ratio).await?;
        writer.write_float(4, self.weight).await?;
        writer.write_bool(5, self.flag).await?;
        writer.write_fixed32(6, self.checksum).await?;
        writer.write_string(7, &self.name).await?;
        for child in &self.children {
            writer.write_sub_object(8, child).await?;
        }
        writer.write_bytes(9, &self.blob).await?;
        Ok(())
    }
}

async fn read_child<R: ProtoReader>(reader: &mut R) -> Result<Child> {
    let token = reader.begin_sub_object().await?;
    let mut child = Child {
        index: 0,
        label: String::new(),
    };
    while reader.read_next_field().await? {
        match reader.field_number() {
            1 => child.index = reader.read_sint32().await?,
            2 => child.label = reader.read_string().await?,
            _ => reader.skip_field().await?,
        }
    }
    reader.end_sub_object(token)?;
    Ok(child)
}

async fn read_record<R: ProtoReader>(reader: &mut R) -> Result<Record> {
    let mut record = Record {
        id: 0,
        delta: 0,
        ratio: 0.0,
        weight: 0.0,
        flag: false,
        checksum: 0,
        name: String::new(),
        children: Vec::new(),
        blob: Vec::new(),
    };
    while reader.read_next_field().await? {
        match reader.field_number() {
            1 => record.id = reader.read_uint64().await?,
            2 => record.delta = reader.read_sint64().await?,
            3 => record.ratio = reader.read_double().await?,
            4 => record.weight = reader.read_float().await?,
            5 => record.flag = reader.read_bool().await?,
            6 => record.checksum = reader.read_fixed32().await?,
            7 => record.name = reader.read_string().await?,
            8 => record.children.push(read_child(reader).await?),
            9 => record.blob = reader.read_bytes().await?.to_vec(),
            _ => reader.skip_field().await?,
        }
    }
    Ok(record)
}

fn sample_record() -> Record {
    Record {
        id: u64::MAX - 1,
        delta: -123_456_789,
        ratio: 0.125,
        weight: -2.5,
        flag: true,
        checksum: 0xdead_beef,
        name: "ünïcödé ".repeat(40),
        children: (0..20)
            .map(|i| Child {
                index: i - 10,
                label: format!("child-{i}"),
            })
            .collect(),
        blob: (0..=255u8).cycle().take(5000).collect(),
    }
}

#[tokio::test]
async fn writer_to_reader_over_small_pipe() {
    let config = CodecConfig {
        buffer_capacity: 64,
        ..CodecConfig::default()
    };
    let (client, server) = tokio::io::duplex(32);
    let record = sample_record();

    let send = async {
        let mut writer = StreamWriter::with_config(client, &config);
        record.encode(&mut writer).await?;
        writer.close().await.map(drop)
    };
    let receive = async {
        let mut reader = StreamReader::from_async_read_with_config(server, &config);
        read_record(&mut reader).await
    };

    let (sent, received) = tokio::join!(send, receive);
    sent.unwrap();
    assert_eq!(received.unwrap(), record);
}

#[tokio::test]
async fn encoded_len_matches_stream_output() {
    let record = sample_record();
    let expected = record.encoded_len().await.unwrap();

    let mut writer = StreamWriter::new(Vec::new());
    record.encode(&mut writer).await.unwrap();
    assert_eq!(writer.position(), expected);
    assert_eq!(writer.close().await.unwrap().len() as u64, expected);
}

#[tokio::test]
async fn unknown_fields_and_groups_are_skipped_across_chunks() {
    let mut writer = StreamWriter::new(Vec::new());
    writer.write_uint64(1, 42).await.unwrap();
    // Unknown group 50 containing a nested group and a string.
    writer
        .write_field_header(50, WireType::StartGroup)
        .await
        .unwrap();
    writer
        .write_field_header(51, WireType::StartGroup)
        .await
        .unwrap();
    writer.write_fixed64(1, 7).await.unwrap();
    writer
        .write_field_header(51, WireType::EndGroup)
        .await
        .unwrap();
    writer.write_string(2, "inside").await.unwrap();
    writer
        .write_field_header(50, WireType::EndGroup)
        .await
        .unwrap();
    writer.write_string(7, "after").await.unwrap();
    let bytes = writer.close().await.unwrap();

    let (mut client, server) = tokio::io::duplex(4);
    let feed = async {
        tokio::io::AsyncWriteExt::write_all(&mut client, &bytes).await?;
        drop(client);
        Ok::<_, std::io::Error>(())
    };
    let decode = async {
        let mut reader = StreamReader::from_async_read(server);
        read_record(&mut reader).await
    };

    let (fed, decoded) = tokio::join!(feed, decode);
    fed.unwrap();
    let decoded = decoded.unwrap();
    assert_eq!(decoded.id, 42);
    assert_eq!(decoded.name, "after");
}

#[tokio::test]
async fn truncated_stream_reports_end_of_stream() {
    let mut writer = StreamWriter::new(Vec::new());
    sample_record().encode(&mut writer).await.unwrap();
    let mut bytes = writer.close().await.unwrap();
    bytes.truncate(bytes.len() - 3);

    let mut reader = StreamReader::from_async_read(bytes.as_slice());
    assert!(matches!(
        read_record(&mut reader).await,
        Err(CodecError::EndOfStream)
    ));
}
