//! Strongly-typed identifiers.
//!
//! Caller-chosen ids are validated at construction time; run ids are generated
//! from UUIDs so that every attempt inside a pipeline run is unique.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// The `named` flag adds `From<&str>` and `From<String>` for ids chosen by the embedding application.
macro_rules! define_id {
    ($name:ident, named) => {
        define_id!($name);

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(PipelineId, named);
define_id!(AgentId, named);
define_id!(AgentRunId);
define_id!(PipelineRunId);

impl AgentRunId {
    /// Generate a fresh id for one agent attempt.
    pub fn generate() -> Self {
        Self(format!("run_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl PipelineRunId {
    /// Derive a run id from the pipeline id plus a random suffix.
    pub fn generate(pipeline_id: &PipelineId) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", pipeline_id, &suffix[..16]))
    }
}
