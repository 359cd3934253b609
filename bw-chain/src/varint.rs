//! Bitcoin's variable-length integer ("varint"/`CompactSize`) encoding.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::serialization::{BitcoinDeserialize, BitcoinSerialize, SerializationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The number of bytes this value would occupy once encoded.
    pub fn size(value: usize) -> usize {
        if value < 253 {
            1
        } else if value <= std::u16::MAX as usize {
            3
        } else if value <= std::u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl BitcoinSerialize for CompactInt {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        if self.0 < 253 {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= std::u16::MAX as u64 {
            target.write_all(&[253])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= std::u32::MAX as u64 {
            target.write_all(&[254])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[255])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl BitcoinDeserialize for CompactInt {
    fn bitcoin_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let first = u8::bitcoin_deserialize(&mut reader)?;
        if first < 253 {
            Ok(CompactInt(first as u64))
        } else if first == 253 {
            Ok(CompactInt(u16::bitcoin_deserialize(&mut reader)? as u64))
        } else if first == 254 {
            Ok(CompactInt(u32::bitcoin_deserialize(&mut reader)? as u64))
        } else {
            Ok(CompactInt(u64::bitcoin_deserialize(&mut reader)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_small() {
        bw_test::init();
        for v in [0usize, 1, 100, 252] {
            let mut buf = Vec::new();
            CompactInt::from(v).bitcoin_serialize(&mut buf).unwrap();
            assert_eq!(buf.len(), CompactInt::size(v));
            let parsed = CompactInt::bitcoin_deserialize(Cursor::new(buf)).unwrap();
            assert_eq!(parsed.value(), v as u64);
        }
    }

    #[test]
    fn roundtrip_boundaries() {
        bw_test::init();
        for v in [253usize, 254, 255, 65535, 65536, 1 << 20] {
            let mut buf = Vec::new();
            CompactInt::from(v).bitcoin_serialize(&mut buf).unwrap();
            assert_eq!(buf.len(), CompactInt::size(v));
            let parsed = CompactInt::bitcoin_deserialize(Cursor::new(buf)).unwrap();
            assert_eq!(parsed.value(), v as u64);
        }
    }
}
