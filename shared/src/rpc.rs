use haze_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr, UnsignedInteger};

use crate::{
    error::RpcError,
    types::{PeerId, Position},
};

/// The declared type of one RPC parameter
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RpcType {
    Bool,
    I32,
    I64,
    F32,
    String,
    Position,
    Bytes,
    /// Filled in by the receiving node with a `MessageInfo`, never sent
    Info,
}

/// Where an RPC came from.
///
/// `source_id` created the call; `sender_id` is the neighbor that handed it
/// to us. They differ when the call was forwarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageInfo {
    pub source_id: PeerId,
    pub sender_id: PeerId,
}

/// One RPC argument
#[derive(Clone, Debug, PartialEq)]
pub enum RpcValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    String(String),
    Position(Position),
    Bytes(Vec<u8>),
    Info(MessageInfo),
}

impl RpcValue {
    pub fn rpc_type(&self) -> RpcType {
        match self {
            RpcValue::Bool(_) => RpcType::Bool,
            RpcValue::I32(_) => RpcType::I32,
            RpcValue::I64(_) => RpcType::I64,
            RpcValue::F32(_) => RpcType::F32,
            RpcValue::String(_) => RpcType::String,
            RpcValue::Position(_) => RpcType::Position,
            RpcValue::Bytes(_) => RpcType::Bytes,
            RpcValue::Info(_) => RpcType::Info,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RpcValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            RpcValue::I32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RpcValue::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            RpcValue::F32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RpcValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_position(&self) -> Option<Position> {
        match self {
            RpcValue::Position(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RpcValue::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_info(&self) -> Option<&MessageInfo> {
        match self {
            RpcValue::Info(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for RpcValue {
    fn from(value: bool) -> Self {
        RpcValue::Bool(value)
    }
}

impl From<i32> for RpcValue {
    fn from(value: i32) -> Self {
        RpcValue::I32(value)
    }
}

impl From<i64> for RpcValue {
    fn from(value: i64) -> Self {
        RpcValue::I64(value)
    }
}

impl From<f32> for RpcValue {
    fn from(value: f32) -> Self {
        RpcValue::F32(value)
    }
}

impl From<&str> for RpcValue {
    fn from(value: &str) -> Self {
        RpcValue::String(value.to_string())
    }
}

impl From<String> for RpcValue {
    fn from(value: String) -> Self {
        RpcValue::String(value)
    }
}

impl From<Position> for RpcValue {
    fn from(value: Position) -> Self {
        RpcValue::Position(value)
    }
}

impl From<Vec<u8>> for RpcValue {
    fn from(value: Vec<u8>) -> Self {
        RpcValue::Bytes(value)
    }
}

impl Serde for RpcValue {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let tag: u8 = match self {
            RpcValue::Bool(_) => 0,
            RpcValue::I32(_) => 1,
            RpcValue::I64(_) => 2,
            RpcValue::F32(_) => 3,
            RpcValue::String(_) => 4,
            RpcValue::Position(_) => 5,
            RpcValue::Bytes(_) => 6,
            RpcValue::Info(_) => 7,
        };
        UnsignedInteger::<3>::new(tag).ser(writer);

        match self {
            RpcValue::Bool(value) => value.ser(writer),
            RpcValue::I32(value) => value.ser(writer),
            RpcValue::I64(value) => value.ser(writer),
            RpcValue::F32(value) => value.ser(writer),
            RpcValue::String(value) => value.ser(writer),
            RpcValue::Position(value) => value.ser(writer),
            RpcValue::Bytes(value) => value.ser(writer),
            RpcValue::Info(info) => {
                info.source_id.ser(writer);
                info.sender_id.ser(writer);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<3>::de(reader)?.get() {
            0 => Ok(RpcValue::Bool(bool::de(reader)?)),
            1 => Ok(RpcValue::I32(i32::de(reader)?)),
            2 => Ok(RpcValue::I64(i64::de(reader)?)),
            3 => Ok(RpcValue::F32(f32::de(reader)?)),
            4 => Ok(RpcValue::String(String::de(reader)?)),
            5 => Ok(RpcValue::Position(Position::de(reader)?)),
            6 => Ok(RpcValue::Bytes(Vec::<u8>::de(reader)?)),
            _ => {
                let source_id = PeerId::de(reader)?;
                let sender_id = PeerId::de(reader)?;
                Ok(RpcValue::Info(MessageInfo {
                    source_id,
                    sender_id,
                }))
            }
        }
    }
}

/// The payload of a `MessageType::Rpc` envelope
#[derive(Clone, Debug, PartialEq)]
pub struct RpcMessage {
    pub method_key: String,
    pub args: Vec<RpcValue>,
}

impl RpcMessage {
    pub fn new(method_key: impl Into<String>, args: Vec<RpcValue>) -> Self {
        Self {
            method_key: method_key.into(),
            args,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BitWriter::new();
        self.ser(&mut writer);
        writer.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerdeErr> {
        let mut reader = BitReader::new(bytes);
        Self::de(&mut reader)
    }
}

impl Serde for RpcMessage {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.method_key.ser(writer);
        self.args.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let method_key = String::de(reader)?;
        let args = Vec::<RpcValue>::de(reader)?;
        Ok(Self { method_key, args })
    }
}

/// The parameter list a handler declares when it is registered.
///
/// ```
/// use haze_shared::{RpcSignature, RpcType};
///
/// let signature = RpcSignature::new()
///     .param(RpcType::String)
///     .param(RpcType::Position)
///     .with_info();
/// assert_eq!(signature.params().len(), 3);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RpcSignature {
    params: Vec<RpcType>,
}

impl RpcSignature {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    pub fn param(mut self, rpc_type: RpcType) -> Self {
        self.params.push(rpc_type);
        self
    }

    /// Declares a trailing `MessageInfo` parameter
    pub fn with_info(self) -> Self {
        self.param(RpcType::Info)
    }

    pub fn params(&self) -> &[RpcType] {
        &self.params
    }

    fn takes_info(&self) -> bool {
        self.params.last() == Some(&RpcType::Info)
    }

    /// Checks received arguments against this signature, appending `info`
    /// when exactly the trailing `Info` parameter is missing.
    pub fn prepare(
        &self,
        key: &str,
        mut args: Vec<RpcValue>,
        info: MessageInfo,
    ) -> Result<Vec<RpcValue>, RpcError> {
        if let Some(index) = args.iter().position(|arg| arg.as_info().is_some()) {
            return Err(RpcError::ForgedInfo {
                key: key.to_string(),
                index,
            });
        }

        if args.len() + 1 == self.params.len() && self.takes_info() {
            args.push(RpcValue::Info(info));
        }

        if args.len() < self.params.len() {
            return Err(RpcError::MissingArguments {
                key: key.to_string(),
                expected: self.params.len(),
                received: args.len(),
            });
        }
        if args.len() > self.params.len() {
            return Err(RpcError::UnexpectedArguments {
                key: key.to_string(),
                expected: self.params.len(),
                received: args.len(),
            });
        }

        for (index, (arg, expected)) in args.iter().zip(self.params.iter()).enumerate() {
            let found = arg.rpc_type();
            if found != *expected {
                return Err(RpcError::ArgumentMismatch {
                    key: key.to_string(),
                    index,
                    expected: *expected,
                    found,
                });
            }
        }

        Ok(args)
    }
}
