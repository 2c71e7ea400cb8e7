use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::PipelineError;

/// Processor-assigned event identifier. Opaque: the processor's docs show it
/// as both a string and a number depending on schema version, so we accept
/// either on the wire and canonicalize to a string. Never used for
/// idempotency — dedup keys on the semantic operation instead.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PipelineError::Validation("empty event id".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Str(String),
            Num(u64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Str(s) => s,
            Raw::Num(n) => n.to_string(),
        };
        EventId::new(raw).map_err(serde::de::Error::custom)
    }
}

/// External payment identifier assigned by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PipelineError::Validation("empty payment id".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque handle for a payable profile, minted at request time before any
/// payment exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PipelineError::Validation("empty profile id".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
