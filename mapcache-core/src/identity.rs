//! Identity types and route-parameter parsing.
//!
//! Entities coming back from the mapping API are keyed by integer ids
//! (challenges, tasks, projects, comments) or, for users addressed by name,
//! by string keys. Navigation context arrives as loosely-typed route
//! parameters that may be missing or garbage; those are treated as "no
//! identity" rather than as errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a cached entity.
///
/// Serialized untagged so that `42` and `"alice"` round-trip as plain JSON
/// scalars, matching the shape the API uses for `id` fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(i64),
    Key(String),
}

impl EntityId {
    /// Numeric value, if this id is numeric.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Key(_) => None,
        }
    }

    /// Extract an id from a JSON scalar. Floats with no fractional part are
    /// accepted since some endpoints serialize ids as doubles.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Self::Num),
            serde_json::Value::String(s) if !s.is_empty() => Some(Self::Key(s.clone())),
            _ => None,
        }
    }

    /// JSON scalar form of this id.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Num(n) => serde_json::Value::from(*n),
            Self::Key(k) => serde_json::Value::from(k.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{}", n),
            Self::Key(k) => f.write_str(k),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

/// Parse an integer id with integer-prefix semantics.
///
/// Leading whitespace and a single sign are allowed, then as many decimal
/// digits as follow. Anything after the digits is ignored, so `"42abc"`
/// parses as 42. No digits at all yields `None`.
pub fn parse_numeric_id(raw: Option<&str>) -> Option<i64> {
    let trimmed = raw?.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let magnitude: i64 = rest[..digits_len].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Identity of the challenge implied by the current navigation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeIdentity {
    pub id: i64,
    pub is_virtual: bool,
}

impl ChallengeIdentity {
    pub fn standard(id: i64) -> Self {
        Self {
            id,
            is_virtual: false,
        }
    }

    pub fn virtual_challenge(id: i64) -> Self {
        Self {
            id,
            is_virtual: true,
        }
    }
}

/// Matched route parameters supplied by the navigation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: HashMap<String, String>,
}

impl RouteParams {
    pub const CHALLENGE_ID: &'static str = "challengeId";
    pub const VIRTUAL_CHALLENGE_ID: &'static str = "virtualChallengeId";
    pub const TASK_ID: &'static str = "taskId";
    pub const USER_ID: &'static str = "userId";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn challenge_id(&self) -> Option<i64> {
        parse_numeric_id(self.get(Self::CHALLENGE_ID))
    }

    pub fn virtual_challenge_id(&self) -> Option<i64> {
        parse_numeric_id(self.get(Self::VIRTUAL_CHALLENGE_ID))
    }

    pub fn task_id(&self) -> Option<i64> {
        parse_numeric_id(self.get(Self::TASK_ID))
    }

    /// User ids may be internal ids, OSM ids, or display names, so they are
    /// kept verbatim. Blank values count as absent.
    pub fn user_id(&self) -> Option<&str> {
        self.get(Self::USER_ID).filter(|s| !s.trim().is_empty())
    }

    /// The virtual challenge id wins when it parses; otherwise the standard
    /// challenge id is used.
    pub fn challenge_identity(&self) -> Option<ChallengeIdentity> {
        match self.virtual_challenge_id() {
            Some(id) => Some(ChallengeIdentity::virtual_challenge(id)),
            None => self.challenge_id().map(ChallengeIdentity::standard),
        }
    }
}
