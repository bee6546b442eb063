//! Object identifier generation for build manifests.
//!
//! Manifest nodes are keyed by 24-character uppercase hexadecimal identifiers.
//! Fresh identifiers are drawn from random UUIDs and checked against every
//! identifier already present in the manifest, so a generator seeded from a
//! parsed document can never hand out a colliding id.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// A 24-character uppercase hex identifier naming one manifest object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid object identifier: {0:?}")]
pub struct InvalidObjectId(pub String);

impl ObjectId {
    /// Check whether a string has the identifier shape (24 uppercase hex chars).
    pub fn is_valid(s: &str) -> bool {
        s.len() == 24 && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    }

    /// Parse a string known to come from a manifest into an identifier.
    pub fn parse(s: &str) -> Result<Self, InvalidObjectId> {
        if Self::is_valid(s) {
            Ok(ObjectId(s.to_string()))
        } else {
            Err(InvalidObjectId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse(s)
    }
}

/// Generator of fresh, collision-free object identifiers.
///
/// Seed it with every identifier the manifest already mentions (definitions
/// and references alike), then call [`next_id`](Self::next_id) once per new
/// node. Each result is recorded, so one generator can serve a whole batch
/// of insertions.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seen: HashSet<ObjectId>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a generator that refuses every identifier in `ids`.
    pub fn with_seen(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self {
            seen: ids.into_iter().collect(),
        }
    }

    /// Record an externally chosen identifier as taken.
    pub fn mark_used(&mut self, id: ObjectId) {
        self.seen.insert(id);
    }

    /// Draw a fresh identifier not present in the seen set.
    ///
    /// Candidates are the first 24 hex digits of a random UUID, uppercased.
    /// A colliding draw is discarded and retried.
    pub fn next_id(&mut self) -> ObjectId {
        loop {
            let candidate = random_id();
            if !self.seen.contains(&candidate) {
                self.seen.insert(candidate.clone());
                return candidate;
            }
        }
    }
}

fn random_id() -> ObjectId {
    let hex = Uuid::new_v4().simple().to_string();
    ObjectId(hex[..24].to_ascii_uppercase())
}
