use anyhow::{ensure, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::convert::TryInto;
use primitive_types::{H160, H256};

pub trait Encoder: Sized + Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| e.into())
    }
}

pub trait Decoder: Sized + Serialize + DeserializeOwned {
    fn decode(buf: &[u8]) -> Result<Self> {
        bincode::deserialize(buf).map_err(|e| e.into())
    }
}

pub trait Codec: Encoder + Decoder {}

impl<T> Codec for T where T: Encoder + Decoder {}

#[macro_export]
macro_rules! impl_codec {
    ($type : ty) => {
        impl $crate::Encoder for $type {}
        impl $crate::Decoder for $type {}
    };
}

macro_rules! impl_codec_primitives {
    ($type : ty => $path : path) => {
        impl Encoder for $type {
            fn encode(&self) -> Result<Vec<u8>> {
                Ok(self.to_be_bytes().to_vec())
            }
        }

        impl Decoder for $type {
            fn decode(buf: &[u8]) -> Result<$type> {
                Ok($path(buf.try_into()?))
            }
        }
    };
}

impl_codec_primitives!(u8 => u8::from_be_bytes);
impl_codec_primitives!(u16 => u16::from_be_bytes);
impl_codec_primitives!(u32 => u32::from_be_bytes);
impl_codec_primitives!(u64 => u64::from_be_bytes);
impl_codec_primitives!(u128 => u128::from_be_bytes);

impl Encoder for String {}

impl Decoder for String {}

impl<T: Codec> Encoder for Vec<T> {}

impl<T: Codec> Decoder for Vec<T> {}

impl Encoder for H160 {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decoder for H160 {
    fn decode(buf: &[u8]) -> Result<Self> {
        ensure!(buf.len() == 20, "invalid H160 length {}", buf.len());
        Ok(H160::from_slice(buf))
    }
}

impl Encoder for H256 {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decoder for H256 {
    fn decode(buf: &[u8]) -> Result<Self> {
        ensure!(buf.len() == 32, "invalid H256 length {}", buf.len());
        Ok(H256::from_slice(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_keys_sort_by_height() {
        let low = 9_u64.encode().unwrap();
        let high = 10_u64.encode().unwrap();
        assert!(low < high);
        assert_eq!(u64::decode(&high).unwrap(), 10);
    }

    #[test]
    fn hash_codec_rejects_short_buffers() {
        assert!(H256::decode(&[0; 31]).is_err());
        let hash = H256::repeat_byte(7);
        assert_eq!(H256::decode(&hash.encode().unwrap()).unwrap(), hash);
    }
}
