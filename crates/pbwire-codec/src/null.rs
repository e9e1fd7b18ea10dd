use pbwire_encoding::{varint_len, FieldHeader, WireType};

use crate::error::Result;
use crate::writer::{ProtoWriter, WireMessage};

/// A writer that produces no bytes, only counts them.
///
/// Used to size length prefixes for nested messages and to pre-size flat
/// destination buffers.
#[derive(Debug, Default, Clone)]
pub struct NullWriter {
    position: u64,
}

impl NullWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn count(&mut self, n: usize) -> usize {
        self.position += n as u64;
        n
    }
}

impl ProtoWriter for NullWriter {
    fn position(&self) -> u64 {
        self.position
    }

    async fn write_raw_varint(&mut self, value: u64) -> Result<usize> {
        Ok(self.count(varint_len(value)))
    }

    async fn write_raw(&mut self, bytes: &[u8]) -> Result<usize> {
        Ok(self.count(bytes.len()))
    }

    async fn flush(&mut self, _is_final: bool) -> Result<()> {
        Ok(())
    }

    async fn write_str_payload(&mut self, value: &str) -> Result<usize> {
        Ok(self.count(varint_len(value.len() as u64) + value.len()))
    }

    /// Nested messages are measured in place: there is nothing to
    /// materialize, so one pass is enough.
    async fn write_sub_object<M: WireMessage>(&mut self, field_number: u32, value: &M) -> Result<usize> {
        let header = FieldHeader::new(field_number, WireType::String)?;
        let header_len = self.count(header.encoded_len());

        let start = self.position;
        value.encode(self).await?;
        let payload_len = self.position - start;
        let prefix_len = self.count(varint_len(payload_len));

        Ok(header_len + prefix_len + payload_len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::SliceWriter;
    use crate::test_util::{Test1, Test2, Test3};

    #[tokio::test]
    async fn counts_scalars() {
        let mut null = NullWriter::new();
        assert_eq!(null.write_varint_field(1, 150).await.unwrap(), 3);
        assert_eq!(null.write_int32(1, -1).await.unwrap(), 11);
        assert_eq!(null.write_fixed32(1, 7).await.unwrap(), 5);
        assert_eq!(null.write_double(1, 0.5).await.unwrap(), 9);
        assert_eq!(null.write_bytes(1, &[0; 200]).await.unwrap(), 203);
        assert_eq!(null.position(), 3 + 11 + 5 + 9 + 203);
    }

    #[tokio::test]
    async fn counts_known_vectors() {
        assert_eq!(Test1 { a: 150 }.encoded_len().await.unwrap(), 3);
        assert_eq!(
            Test2 {
                b: "testing".to_string()
            }
            .encoded_len()
            .await
            .unwrap(),
            9
        );
        assert_eq!(
            Test3 {
                c: Test1 { a: 150 }
            }
            .encoded_len()
            .await
            .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn agrees_with_real_writer() {
        for b in [String::new(), "é".repeat(64), "x".repeat(300)] {
            let message = Test2 { b };
            let mut null = NullWriter::new();
            let measured = null.write_sub_object(5, &message).await.unwrap();

            let mut buf = vec![0u8; measured];
            let mut writer = SliceWriter::new(&mut buf);
            let written = writer.write_sub_object(5, &message).await.unwrap();

            assert_eq!(written, measured);
            assert_eq!(writer.written(), measured);
        }
    }

    #[tokio::test]
    async fn nested_sub_objects_count_every_prefix() {
        let mut null = NullWriter::new();
        let written = null
            .write_sub_object(
                3,
                &Test3 {
                    c: Test1 { a: 150 },
                },
            )
            .await
            .unwrap();
        // header + prefix + (header + prefix + (header + 2-byte varint))
        assert_eq!(written, 1 + 1 + 5);
        assert_eq!(null.position(), 7);
    }
}
