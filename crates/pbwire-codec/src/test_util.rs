//! Messages from the protobuf encoding guide, shared by the unit tests.

use crate::error::Result;
use crate::writer::{ProtoWriter, WireMessage};

/// `message Test1 { int32 a = 1; }`
#[derive(Debug, Clone, PartialEq)]
pub struct Test1 {
    pub a: i32,
}

/// `message Test2 { string b = 2; }`
#[derive(Debug, Clone, PartialEq)]
pub struct Test2 {
    pub b: String,
}

/// `message Test3 { Test1 c = 3; }`
#[derive(Debug, Clone, PartialEq)]
pub struct Test3 {
    pub c: Test1,
}

impl WireMessage for Test1 {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_int32(1, self.a).await?;
        Ok(())
    }
}

impl WireMessage for Test2 {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_string(2, &self.b).await?;
        Ok(())
    }
}

impl WireMessage for Test3 {
    async fn encode<W: ProtoWriter>(&self, writer: &mut W) -> Result<()> {
        writer.write_sub_object(3, &self.c).await?;
        Ok(())
    }
}
