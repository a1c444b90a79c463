use std::fmt;

use haze_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};
use serde::{Deserialize, Serialize};

/// Identifies one overlay node for the lifetime of its process.
///
/// Ids are 32 lowercase hex characters. Their lexicographic order is what
/// decides which side of a pair acts in a tie-break.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id
    pub fn generate() -> Self {
        Self(format!("{:032x}", fastrand::u128(..)))
    }

    /// A fresh id drawn from the given generator, for reproducible swarms
    pub fn generate_with(rng: &fastrand::Rng) -> Self {
        Self(format!("{:032x}", rng.u128(..)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serde for PeerId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(String::de(reader)?))
    }
}

/// A point in the shared world space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Serde for Position {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.x.ser(writer);
        self.y.ser(writer);
        self.z.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let x = f32::de(reader)?;
        let y = f32::de(reader)?;
        let z = f32::de(reader)?;
        Ok(Self { x, y, z })
    }
}

impl ConstBitLength for Position {
    fn const_bit_length() -> u32 {
        3 * <f32 as ConstBitLength>::const_bit_length()
    }
}
