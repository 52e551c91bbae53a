//! Face descriptors and their storage encoding.
//!
//! Enrolled descriptors are persisted as a JSON object keyed by the decimal
//! index of each component (`{"0": 0.12, "1": -0.03, ...}`). Object key order
//! carries no meaning, so decoding sorts keys numerically before rebuilding
//! the vector. Lexical order would put "10" before "2".

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use thiserror::Error;

/// Number of components in a face descriptor.
pub const DESCRIPTOR_DIM: usize = 128;

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("invalid descriptor dimension: {0} (expected {DESCRIPTOR_DIM})")]
    InvalidDimension(usize),
    #[error("invalid descriptor value (NaN/Inf) at index {0}")]
    InvalidValue(usize),
    #[error("descriptor key is not a component index: {0:?}")]
    InvalidKey(String),
    #[error("descriptor index {0} appears more than once")]
    DuplicateIndex(usize),
    #[error("descriptor index {0} is missing")]
    MissingIndex(usize),
    #[error("malformed descriptor encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fixed-length face descriptor produced by the external recognizer.
///
/// Always [`DESCRIPTOR_DIM`] finite values; construction validates both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Descriptor {
    values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Result<Self, DescriptorError> {
        if values.len() != DESCRIPTOR_DIM {
            return Err(DescriptorError::InvalidDimension(values.len()));
        }
        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(DescriptorError::InvalidValue(idx));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean distance over every component, unweighted.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Encode as the index-keyed JSON object used for persisted enrollments.
    pub fn to_storage_json(&self) -> Result<String, DescriptorError> {
        Ok(serde_json::to_string(&IndexedComponents(&self.values))?)
    }

    /// Decode the index-keyed JSON object written by [`to_storage_json`](Self::to_storage_json).
    pub fn from_storage_json(json: &str) -> Result<Self, DescriptorError> {
        let map: HashMap<String, f32> = serde_json::from_str(json)?;
        Self::from_storage_map(map)
    }

    /// Rebuild a descriptor from `(index key, value)` pairs in any order.
    pub fn from_storage_map<I, K>(entries: I) -> Result<Self, DescriptorError>
    where
        I: IntoIterator<Item = (K, f32)>,
        K: AsRef<str>,
    {
        let mut indexed = entries
            .into_iter()
            .map(|(key, value)| {
                let key = key.as_ref();
                key.parse::<usize>()
                    .map(|idx| (idx, value))
                    .map_err(|_| DescriptorError::InvalidKey(key.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        indexed.sort_by_key(|&(idx, _)| idx);

        let mut prev = None;
        for (position, &(idx, _)) in indexed.iter().enumerate() {
            if prev == Some(idx) {
                return Err(DescriptorError::DuplicateIndex(idx));
            }
            // Sorted and distinct so far: the first index past its slot marks a gap.
            if idx != position {
                return Err(DescriptorError::MissingIndex(position));
            }
            prev = Some(idx);
        }

        Self::new(indexed.into_iter().map(|(_, value)| value).collect())
    }
}

impl TryFrom<Vec<f32>> for Descriptor {
    type Error = DescriptorError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Descriptor> for Vec<f32> {
    fn from(descriptor: Descriptor) -> Self {
        descriptor.values
    }
}

/// Serializes components as an index-keyed map, written in index order.
struct IndexedComponents<'a>(&'a [f32]);

impl Serialize for IndexedComponents<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (idx, value) in self.0.iter().enumerate() {
            map.serialize_entry(&idx.to_string(), value)?;
        }
        map.end()
    }
}

/// `#[serde(with = "clockface_core::descriptor::storage")]` support for fields
/// holding a descriptor in its index-keyed storage form.
pub mod storage {
    use super::{Descriptor, IndexedComponents};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(
        descriptor: &Descriptor,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        IndexedComponents(descriptor.values()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Descriptor, D::Error> {
        let map = HashMap::<String, f32>::deserialize(deserializer)?;
        Descriptor::from_storage_map(map).map_err(D::Error::custom)
    }
}
