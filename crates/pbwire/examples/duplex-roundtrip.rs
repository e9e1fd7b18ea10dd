//! Writes a small message through an in-memory pipe and reads it back.
//!
//! Run with:
//!   cargo run --example duplex-roundtrip
//!
//! The writer and reader share one task; debug-level codec logs go to stderr.

use pbwire::codec::{ProtoReader, ProtoWriter, StreamReader, StreamWriter, WireMessage};
use pbwire::codec::{CodecConfig, CodecError, Result};

struct Greeting {
    id: u64,
    text: String,
    tags: Vec<String>,
}

impl WireMessage for Greeting {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_uint64(1, self.id).await?;
        writer.write_string(2, &self.text).await?;
        for tag in &self.tags {
            writer.write_string(3, tag).await?;
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .init();

    let config = CodecConfig {
        buffer_capacity: 32,
        ..CodecConfig::default()
    };
    let (client, server) = tokio::io::duplex(16);

    let greeting = Greeting {
        id: 7,
        text: "hello over the wire".to_string(),
        tags: vec!["demo".to_string(), "pbwire".to_string()],
    };
    eprintln!("Encoded size: {} bytes", greeting.encoded_len().await?);

    let send = async {
        let mut writer = StreamWriter::with_config(client, &config);
        writer.write_sub_object(1, &greeting).await?;
        writer.close().await.map(drop)
    };

    let receive = async {
        let mut reader = StreamReader::from_async_read_with_config(server, &config);
        while reader.read_next_field().await? {
            if reader.field_number() != 1 {
                reader.skip_field().await?;
                continue;
            }

            let token = reader.begin_sub_object().await?;
            while reader.read_next_field().await? {
                match reader.field_number() {
                    1 => eprintln!("id   = {}", reader.read_uint64().await?),
                    2 => eprintln!("text = {}", reader.read_string().await?),
                    3 => eprintln!("tag  = {}", reader.read_string().await?),
                    _ => reader.skip_field().await?,
                }
            }
            reader.end_sub_object(token)?;
        }
        Ok::<_, CodecError>(())
    };

    let (sent, received) = tokio::join!(send, receive);
    sent?;
    received?;
    Ok(())
}
