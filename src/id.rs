//! Prefixed ULID newtypes for type-safe entity IDs.
//!
//! - `TaskId`: `task_01ARZ3NDEKTSV4RRFFQ69G5FAV`
//! - `ContainerId`: `ctr_01ARZ3NDEKTSV4RRFFQ69G5FAV`
//! - `DependencyId`: `dep_01ARZ3NDEKTSV4RRFFQ69G5FAV`

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdParseError {
    #[error("Invalid ULID format: {0}")]
    InvalidUlid(String),
    #[error("Missing prefix: expected '{expected}', got '{actual}'")]
    MissingPrefix {
        expected: &'static str,
        actual: String,
    },
}

fn validate_ulid(s: &str) -> Result<(), IdParseError> {
    ulid::Ulid::from_string(s)
        .map(|_| ())
        .map_err(|_| IdParseError::InvalidUlid(s.to_string()))
}

/// Generates a prefixed-ULID id type. All three entity ids share the same
/// storage and parsing rules; only the prefix differs.
macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new id with a fresh ULID
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, ulid::Ulid::new()))
            }

            /// Extract the ULID part (without prefix)
            pub fn ulid_part(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
            }

            /// Full string representation (with prefix)
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = s
                    .strip_prefix(Self::PREFIX)
                    .ok_or_else(|| IdParseError::MissingPrefix {
                        expected: Self::PREFIX,
                        actual: s.to_string(),
                    })?;
                validate_ulid(ulid)?;
                Ok(Self(s.to_string()))
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                // Stored with prefix so raw SQL rows stay self-describing
                Ok(ToSqlOutput::from(self.0.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                Ok(Self(value.as_str()?.to_string()))
            }
        }
    };
}

prefixed_id!(
    /// Identifies a task. Immutable for the lifetime of the record.
    TaskId,
    "task_"
);

prefixed_id!(
    /// Identifies a container (project/workspace) scoping tasks and edges.
    ContainerId,
    "ctr_"
);

prefixed_id!(
    /// Identifies a single dependency edge.
    DependencyId,
    "dep_"
);
