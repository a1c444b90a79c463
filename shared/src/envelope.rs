use haze_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr};

use crate::{message_type::MessageType, types::PeerId};

/// The routed wrapper around every overlay message.
///
/// `sender_id` is the node that created the envelope, not the neighbor that
/// last relayed it. An envelope is never modified after it is first sent.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub sender_id: PeerId,
    pub target_id: PeerId,
    pub kind: MessageType,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(sender_id: PeerId, target_id: PeerId, kind: MessageType, payload: Vec<u8>) -> Self {
        Self {
            sender_id,
            target_id,
            kind,
            payload,
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

impl Serde for Envelope {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.kind.ser(writer);
        self.target_id.ser(writer);
        self.sender_id.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let kind = MessageType::de(reader)?;
        let target_id = PeerId::de(reader)?;
        let sender_id = PeerId::de(reader)?;
        let payload = Vec::<u8>::de(reader)?;
        Ok(Self {
            sender_id,
            target_id,
            kind,
            payload,
        })
    }
}
