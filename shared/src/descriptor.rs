use haze_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr, UnsignedVariableInteger};

use crate::types::{PeerId, Position};

/// What a node tells the swarm about itself: where it is, how many links it
/// holds, and the bounds it keeps its degree within.
///
/// `seq` grows by one with every self-broadcast so receivers can tell a
/// fresh descriptor from a re-gossiped stale one.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerDescriptor {
    pub id: PeerId,
    pub position: Position,
    pub current_degree: u32,
    pub min_degree: u32,
    pub soft_limit: u32,
    pub hard_cap: u32,
    pub seq: u64,
}

impl PeerDescriptor {
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

fn ser_count(value: u32, writer: &mut dyn BitWrite) {
    UnsignedVariableInteger::<5>::new(value).ser(writer);
}

fn de_count(reader: &mut BitReader) -> Result<u32, SerdeErr> {
    let value = UnsignedVariableInteger::<5>::de(reader)?.get();
    u32::try_from(value).map_err(|_| SerdeErr)
}

impl Serde for PeerDescriptor {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.id.ser(writer);
        self.position.ser(writer);
        ser_count(self.current_degree, writer);
        ser_count(self.min_degree, writer);
        ser_count(self.soft_limit, writer);
        ser_count(self.hard_cap, writer);
        UnsignedVariableInteger::<7>::new(self.seq).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let id = PeerId::de(reader)?;
        let position = Position::de(reader)?;
        let current_degree = de_count(reader)?;
        let min_degree = de_count(reader)?;
        let soft_limit = de_count(reader)?;
        let hard_cap = de_count(reader)?;
        let seq = UnsignedVariableInteger::<7>::de(reader)?.get();
        Ok(Self {
            id,
            position,
            current_degree,
            min_degree,
            soft_limit,
            hard_cap,
            seq,
        })
    }
}
