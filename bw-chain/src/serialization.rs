//! Bit-exact serialization primitives.
//!
//! This module contains the `BitcoinSerialize`/`BitcoinDeserialize` traits,
//! analogs of the Serde `Serialize`/`Deserialize` traits but intended for the
//! byte-exact transaction digests this core has to reproduce precisely.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::varint::CompactInt;

/// A serialization/parse error.
#[derive(Error, Debug)]
pub enum SerializationError {
    /// An io error that prevented (de)serialization.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The data to be deserialized was malformed.
    #[error("parse error: {0}")]
    Parse(&'static str),
}

pub trait BitcoinSerialize {
    fn bitcoin_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error>;

    fn bitcoin_serialize_to_vec(&self) -> Result<Vec<u8>, io::Error> {
        let mut data = Vec::new();
        self.bitcoin_serialize(&mut data)?;
        Ok(data)
    }
}

pub trait BitcoinDeserialize: Sized {
    fn bitcoin_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError>;
}

/// Convenience extension for running `BitcoinDeserialize` over a byte slice.
pub trait BitcoinDeserializeInto {
    fn bitcoin_deserialize_into<T: BitcoinDeserialize>(&self) -> Result<T, SerializationError>;
}

impl BitcoinDeserializeInto for [u8] {
    fn bitcoin_deserialize_into<T: BitcoinDeserialize>(&self) -> Result<T, SerializationError> {
        T::bitcoin_deserialize(self)
    }
}

impl BitcoinSerialize for bool {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        target.write_all(&[*self as u8])
    }
}
impl BitcoinDeserialize for bool {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(reader.read_u8()? != 0)
    }
}

impl BitcoinSerialize for u8 {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        target.write_all(&[*self])
    }
}
impl BitcoinDeserialize for u8 {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(reader.read_u8()?)
    }
}

macro_rules! impl_le_int {
    ($ty:ty, $write:ident, $read:ident) => {
        impl BitcoinSerialize for $ty {
            fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
                target.$write::<LittleEndian>(*self)
            }
        }
        impl BitcoinDeserialize for $ty {
            fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
                Ok(reader.$read::<LittleEndian>()?)
            }
        }
    };
}

impl_le_int!(u16, write_u16, read_u16);
impl_le_int!(u32, write_u32, read_u32);
impl_le_int!(u64, write_u64, read_u64);
impl_le_int!(i32, write_i32, read_i32);
impl_le_int!(i64, write_i64, read_i64);

impl BitcoinSerialize for [u8; 32] {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        target.write_all(self)
    }
}
impl BitcoinDeserialize for [u8; 32] {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut bytes = [0u8; 32];
        reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }
}

impl BitcoinSerialize for Vec<u8> {
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        CompactInt::from(self.len()).bitcoin_serialize(&mut target)?;
        target.write_all(self)
    }
}
impl BitcoinDeserialize for Vec<u8> {
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::bitcoin_deserialize(&mut reader)?.value();
        let mut bytes = Vec::new();
        reader.take(len).read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl<T> BitcoinSerialize for Vec<T>
where
    T: BitcoinSerialize,
{
    fn bitcoin_serialize<W: io::Write>(&self, mut target: W) -> Result<(), io::Error> {
        CompactInt::from(self.len()).bitcoin_serialize(&mut target)?;
        for item in self.iter() {
            item.bitcoin_serialize(&mut target)?;
        }
        Ok(())
    }
}

impl<T> BitcoinDeserialize for Vec<T>
where
    T: BitcoinDeserialize,
{
    fn bitcoin_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let len = CompactInt::bitcoin_deserialize(&mut reader)?.value();
        let mut items = Vec::with_capacity(len.min(1_000_000) as usize);
        for _ in 0..len {
            items.push(T::bitcoin_deserialize(&mut reader)?);
        }
        Ok(items)
    }
}
