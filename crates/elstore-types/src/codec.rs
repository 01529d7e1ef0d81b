//! serde helpers for writing [`Element`](crate::Element) implementations.
//!
//! Most elements are plain serde types; these functions let their
//! `load`/`store` bodies be one line while mapping codec failures onto
//! [`ElementError`].

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ElementError;

/// Encode `value` as JSON.
pub fn write_json<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), ElementError> {
    serde_json::to_writer(writer, value).map_err(|e| ElementError::Encode(e.to_string()))
}

/// Decode a JSON value.
pub fn read_json<T: DeserializeOwned>(reader: &mut dyn Read) -> Result<T, ElementError> {
    serde_json::from_reader(reader).map_err(|e| ElementError::Decode(e.to_string()))
}

/// Encode `value` with bincode.
pub fn write_bincode<T: Serialize + ?Sized>(
    writer: &mut dyn Write,
    value: &T,
) -> Result<(), ElementError> {
    bincode::serialize_into(writer, value).map_err(|e| ElementError::Encode(e.to_string()))
}

/// Decode a bincode value.
pub fn read_bincode<T: DeserializeOwned>(reader: &mut dyn Read) -> Result<T, ElementError> {
    bincode::deserialize_from(reader).map_err(|e| ElementError::Decode(e.to_string()))
}
