use crate::{
    bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, integer::UnsignedVariableInteger,
    serde::Serde, ConstBitLength,
};

// Unit

impl Serde for () {
    fn ser(&self, _: &mut dyn BitWrite) {}

    fn de(_: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(())
    }
}

impl ConstBitLength for () {
    fn const_bit_length() -> u32 {
        0
    }
}

// Boolean

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

// Fixed-width numbers, written as little-endian bytes

macro_rules! impl_serde_for_le_bytes {
    ($impl_type:ty, $byte_count:expr) => {
        impl Serde for $impl_type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                for byte in self.to_le_bytes() {
                    writer.write_byte(byte);
                }
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                let mut bytes = [0_u8; $byte_count];
                for byte in bytes.iter_mut() {
                    *byte = reader.read_byte()?;
                }
                Ok(<$impl_type>::from_le_bytes(bytes))
            }
        }

        impl ConstBitLength for $impl_type {
            fn const_bit_length() -> u32 {
                $byte_count * 8
            }
        }
    };
}

impl_serde_for_le_bytes!(u8, 1);
impl_serde_for_le_bytes!(u16, 2);
impl_serde_for_le_bytes!(u32, 4);
impl_serde_for_le_bytes!(u64, 8);
impl_serde_for_le_bytes!(i32, 4);
impl_serde_for_le_bytes!(i64, 8);
impl_serde_for_le_bytes!(f32, 4);

// Containers

fn ser_length(length: usize, writer: &mut dyn BitWrite) {
    UnsignedVariableInteger::<7>::new(length as u64).ser(writer);
}

fn de_length(reader: &mut BitReader) -> Result<usize, SerdeErr> {
    let length = UnsignedVariableInteger::<7>::de(reader)?.get();
    usize::try_from(length).map_err(|_| SerdeErr)
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_length(self.len(), writer);
        for byte in self.as_bytes() {
            writer.write_byte(*byte);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = de_length(reader)?;
        // every byte needs a whole byte of input, so a longer claim is garbage
        if length > reader.bytes_remaining() + 1 {
            return Err(SerdeErr);
        }
        let mut bytes = Vec::with_capacity(length);
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }
        String::from_utf8(bytes).map_err(|_| SerdeErr)
    }
}

impl<T: Serde> Serde for Vec<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_length(self.len(), writer);
        for item in self {
            item.ser(writer);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = de_length(reader)?;
        let mut output = Vec::with_capacity(length.min(reader.bytes_remaining() + 1));
        for _ in 0..length {
            output.push(T::de(reader)?);
        }
        Ok(output)
    }
}

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => writer.write_bit(false),
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }
}
