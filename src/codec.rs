//! JSON boundary between typed records and raw storage strings.
//!
//! Decoding never fails: absent input, malformed JSON, a value of the wrong
//! shape, or a record that parses but breaks [`Validate`] all yield the
//! caller's fallback.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreResult;

/// Record-level checks applied after a successful parse.
pub trait Validate {
    fn is_valid(&self) -> bool {
        true
    }
}

impl Validate for String {}

impl<T: Validate> Validate for Vec<T> {
    fn is_valid(&self) -> bool {
        self.iter().all(Validate::is_valid)
    }
}

impl<T: Validate> Validate for Option<T> {
    fn is_valid(&self) -> bool {
        self.as_ref().map_or(true, Validate::is_valid)
    }
}

impl<K, V: Validate> Validate for BTreeMap<K, V> {
    fn is_valid(&self) -> bool {
        self.values().all(Validate::is_valid)
    }
}

impl<K, V: Validate, S> Validate for HashMap<K, V, S> {
    fn is_valid(&self) -> bool {
        self.values().all(Validate::is_valid)
    }
}

pub fn decode<T>(raw: Option<&str>, fallback: T) -> T
where
    T: DeserializeOwned + Validate,
{
    let Some(raw) = raw else {
        debug!("decode: no stored value, using fallback");
        return fallback;
    };
    match serde_json::from_str::<T>(raw) {
        Ok(v) if v.is_valid() => v,
        Ok(_) => {
            warn!("decode: stored value failed validation, using fallback");
            metrics::increment_counter!("classroom_store_decode_fallbacks_total");
            fallback
        }
        Err(e) => {
            warn!("decode: {e}, using fallback");
            metrics::increment_counter!("classroom_store_decode_fallbacks_total");
            fallback
        }
    }
}

pub fn decode_or_default<T>(raw: Option<&str>) -> T
where
    T: DeserializeOwned + Validate + Default,
{
    decode(raw, T::default())
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}
