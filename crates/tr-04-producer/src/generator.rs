//! Synthetic records and batches.

use crate::error::ProducerError;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use shared_crypto::{encrypt_record, seal, SecretKey};
use shared_types::{join_batch, Record};
use std::path::Path;

const BUILTIN_NAMES: &[&str] = &[
    "John Doe", "Jane Smith", "Ali Khan", "Mei Chen", "Lucas Silva", "Amara Okafor",
    "Sofia Rossi", "Ivan Petrov", "Priya Sharma", "Noah Müller",
];

const BUILTIN_CITIES: &[&str] = &[
    "New York", "Los Angeles", "London", "Tokyo", "Mumbai", "São Paulo", "Lagos",
    "Berlin", "Sydney", "Toronto",
];

/// Pools the generator picks from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SampleData {
    pub names: Vec<String>,
    pub cities: Vec<String>,
}

impl Default for SampleData {
    fn default() -> Self {
        Self {
            names: BUILTIN_NAMES.iter().map(|s| s.to_string()).collect(),
            cities: BUILTIN_CITIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl SampleData {
    /// Read `{"names": [...], "cities": [...]}` from disk.
    pub fn load(path: &Path) -> Result<Self, ProducerError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProducerError::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
        let data: Self =
            serde_json::from_str(&raw).map_err(|e| ProducerError::DataFormat(e.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    fn validate(&self) -> Result<(), ProducerError> {
        if self.names.is_empty() {
            return Err(ProducerError::DataFormat("`names` is empty".into()));
        }
        if self.cities.is_empty() {
            return Err(ProducerError::DataFormat("`cities` is empty".into()));
        }
        Ok(())
    }
}

fn pick<R: Rng>(pool: &[String], rng: &mut R) -> String {
    pool.choose(rng).cloned().unwrap_or_default()
}

/// One encrypted batch ready for `dataStream`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub payload: String,
    pub count: usize,
}

/// Builds sealed, encrypted batches of random size.
pub struct BatchBuilder {
    key: SecretKey,
    data: SampleData,
    min_messages: usize,
    max_messages: usize,
}

impl BatchBuilder {
    /// `data` must be non-empty and `min_messages <= max_messages`.
    pub fn new(
        key: SecretKey,
        data: SampleData,
        min_messages: usize,
        max_messages: usize,
    ) -> Result<Self, ProducerError> {
        data.validate()?;
        if min_messages > max_messages {
            return Err(ProducerError::Config(format!(
                "batch size range {min_messages}..={max_messages} is empty"
            )));
        }
        Ok(Self {
            key,
            data,
            min_messages,
            max_messages,
        })
    }

    /// Random name, origin and destination (origin may equal destination),
    /// sealed with its integrity tag.
    pub fn record<R: Rng>(&self, rng: &mut R) -> Record {
        let name = pick(&self.data.names, rng);
        let origin = pick(&self.data.cities, rng);
        let destination = pick(&self.data.cities, rng);
        seal(&name, &origin, &destination)
    }

    pub fn build<R: Rng>(&self, rng: &mut R) -> Result<Batch, ProducerError> {
        let count = rng.gen_range(self.min_messages..=self.max_messages);
        let envelopes = (0..count)
            .map(|_| encrypt_record(&self.key, &self.record(rng)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch {
            payload: join_batch(&envelopes),
            count,
        })
    }
}
