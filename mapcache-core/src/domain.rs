//! Typed views over cached JSON entities.
//!
//! The store keeps raw JSON objects; these structs pick out the handful of
//! fields the loaders make decisions on. Unknown fields are ignored.

use crate::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};

/// Challenge build/lifecycle status as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ChallengeStatus {
    None,
    Building,
    Failed,
    Ready,
    PartiallyLoaded,
    Finished,
    DeletingTasks,
    Unknown(i64),
}

impl From<i64> for ChallengeStatus {
    fn from(value: i64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Building,
            2 => Self::Failed,
            3 => Self::Ready,
            4 => Self::PartiallyLoaded,
            5 => Self::Finished,
            6 => Self::DeletingTasks,
            other => Self::Unknown(other),
        }
    }
}

impl From<ChallengeStatus> for i64 {
    fn from(value: ChallengeStatus) -> Self {
        match value {
            ChallengeStatus::None => 0,
            ChallengeStatus::Building => 1,
            ChallengeStatus::Failed => 2,
            ChallengeStatus::Ready => 3,
            ChallengeStatus::PartiallyLoaded => 4,
            ChallengeStatus::Finished => 5,
            ChallengeStatus::DeletingTasks => 6,
            ChallengeStatus::Unknown(other) => other,
        }
    }
}

impl ChallengeStatus {
    /// Whether the challenge's tasks can be queried. Tasks of challenges that
    /// are still building, failed to build, or are being deleted are not safe
    /// to fetch.
    pub fn is_usable(self) -> bool {
        matches!(
            self,
            Self::None | Self::Ready | Self::PartiallyLoaded | Self::Finished
        )
    }
}

/// Decision-relevant fields of a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    /// Owning project id.
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub status: Option<ChallengeStatus>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub deleted: bool,
    #[serde(default)]
    pub created: Option<String>,
}

impl ChallengeView {
    /// A missing status is treated as usable.
    pub fn has_usable_status(&self) -> bool {
        self.status.map(ChallengeStatus::is_usable).unwrap_or(true)
    }

    /// Creation time, if the server sent a parsable one.
    pub fn created_at(&self) -> Option<Timestamp> {
        let created = self.created.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(created)
            .ok()
            .map(|created| created.with_timezone(&chrono::Utc))
    }
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// OSM profile attached to a user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsmProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "avatarURL")]
    pub avatar_url: Option<String>,
}

/// Decision-relevant fields of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    #[serde(default)]
    pub osm_profile: Option<OsmProfile>,
    #[serde(default)]
    pub is_super_user: bool,
}

/// Map point of a cluster centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

/// One task cluster returned by the cluster endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCluster {
    #[serde(default)]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub num_points: i64,
    #[serde(default)]
    pub point: Option<Point>,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub task_status: Option<i64>,
    #[serde(default)]
    pub challenge_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
