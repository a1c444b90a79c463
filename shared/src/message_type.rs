// The kinds of payload an overlay envelope can carry

use haze_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

#[derive(Copy, Debug, Clone, Eq, PartialEq, Hash)]
pub enum MessageType {
    // A remote procedure call, see `RpcMessage`
    Rpc,
    // A gossiped `PeerDescriptor`
    PeerData,
    // An offer, answer or candidate batch relayed over the overlay
    Signaling,
    // Sent by a node which just acted as topology leader
    LeaderNotify,
    // Asks the smaller-id side of a pair to open a connection
    ConnectRequest,
    // Asks the smaller-id side of a pair to close a connection
    DisconnectRequest,
    // Anything the host application defines
    Application(u16),
}

impl MessageType {
    /// Whether this kind is handled by the overlay itself
    pub fn is_internal(&self) -> bool {
        !matches!(self, MessageType::Application(_))
    }
}

// Most envelopes carry application state, so that kind gets the short path
impl Serde for MessageType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index: u8 = match self {
            MessageType::Application(id) => {
                true.ser(writer);
                id.ser(writer);
                return;
            }
            MessageType::Rpc => 0,
            MessageType::PeerData => 1,
            MessageType::Signaling => 2,
            MessageType::LeaderNotify => 3,
            MessageType::ConnectRequest => 4,
            MessageType::DisconnectRequest => 5,
        };

        false.ser(writer);
        UnsignedInteger::<3>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let is_application = bool::de(reader)?;
        if is_application {
            return Ok(MessageType::Application(u16::de(reader)?));
        }

        match UnsignedInteger::<3>::de(reader)?.get() {
            0 => Ok(MessageType::Rpc),
            1 => Ok(MessageType::PeerData),
            2 => Ok(MessageType::Signaling),
            3 => Ok(MessageType::LeaderNotify),
            4 => Ok(MessageType::ConnectRequest),
            5 => Ok(MessageType::DisconnectRequest),
            _ => Err(SerdeErr),
        }
    }

    fn bit_length(&self) -> u32 {
        let mut output = 1;

        if matches!(self, MessageType::Application(_)) {
            output += <u16 as ConstBitLength>::const_bit_length();
        } else {
            output += <UnsignedInteger<3> as ConstBitLength>::const_bit_length();
        }

        output
    }
}
