//! Fire-and-forget error reporting sink.

use std::fmt;

/// User-facing error categories raised by loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ChallengeDoesNotExist,
    ChallengeFetchFailure,
    ProjectFetchFailure,
    TaskDoesNotExist,
    TaskFetchFailure,
    CommentFetchFailure,
    ClusterFetchFailure,
    UserNotFound,
    UserFetchFailure,
}

impl ErrorKind {
    /// Stable message key for UI lookups.
    pub fn key(self) -> &'static str {
        match self {
            Self::ChallengeDoesNotExist => "challenge.doesNotExist",
            Self::ChallengeFetchFailure => "challenge.fetchFailure",
            Self::ProjectFetchFailure => "project.fetchFailure",
            Self::TaskDoesNotExist => "task.doesNotExist",
            Self::TaskFetchFailure => "task.fetchFailure",
            Self::CommentFetchFailure => "task.commentFetchFailure",
            // Cluster failures are shown with the task fetch message.
            Self::ClusterFetchFailure => "task.fetchFailure",
            Self::UserNotFound => "user.notFound",
            Self::UserFetchFailure => "user.fetchFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Side channel that receives terminal failures. Reporting never affects
/// loader state.
pub trait ErrorSink: Send + Sync {
    fn report(&self, kind: ErrorKind);
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, kind: ErrorKind) {
        tracing::warn!(error_kind = %kind, "Load failure reported");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_failure_shares_task_key() {
        assert_eq!(ErrorKind::ClusterFetchFailure.key(), ErrorKind::TaskFetchFailure.key());
        assert_ne!(ErrorKind::ClusterFetchFailure, ErrorKind::TaskFetchFailure);
        assert_eq!(ErrorKind::ClusterFetchFailure.to_string(), "task.fetchFailure");
    }
}
