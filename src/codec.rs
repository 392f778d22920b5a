//! Value codecs.
//!
//! Members are compared by the store on their encoded bytes, so a codec must
//! be deterministic: equal values have to encode to equal bytes.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub trait Codec<V>: Send + Sync {
    fn encode(&self, value: &V) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<V>;
}

/// UTF-8 text members.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(Error::encoding)
    }
}

/// Raw byte members, passed through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl Codec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Any serde type, stored in bincode's compact form.
pub struct BincodeCodec<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> BincodeCodec<V> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<V> Default for BincodeCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for BincodeCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for BincodeCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<V: Serialize + DeserializeOwned> Codec<V> for BincodeCodec<V> {
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(Error::encoding)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        bincode::deserialize(bytes).map_err(Error::encoding)
    }
}
