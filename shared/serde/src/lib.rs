//! # Haze Serde
//! Bit-level serialization for the haze overlay wire format.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bit_counter;
mod bit_reader;
mod bit_writer;
mod error;
mod impls;
mod integer;
mod serde;

pub use bit_counter::BitCounter;
pub use bit_reader::BitReader;
pub use bit_writer::{BitWrite, BitWriter};
pub use error::SerdeErr;
pub use integer::{SerdeInteger, UnsignedInteger, UnsignedVariableInteger};
pub use serde::{ConstBitLength, Serde};
