//! Command-line surface: `mapcache [--config path] <command> <id>`.

use crate::error::ClientError;
use mapcache_core::{parse_numeric_id, ChallengeIdentity};
use mapcache_loader::{
    ChallengeSession, LoaderContext, ProjectLoader, ProjectResource, TargetUserLookup, TaskLoader,
    TaskResource,
};
use serde_json::{json, Value};
use std::io::Write;

pub const USAGE: &str = "mapcache [--config path] challenge <id> | task <id> | project <id> \
     | clusters <challenge-id> | user <id>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Challenge(String),
    Task(String),
    Project(String),
    Clusters(String),
    User(String),
}

impl Command {
    /// Parse the arguments after the program name, skipping `--config <path>`.
    pub fn parse<I>(args: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                args.next();
                continue;
            }
            positional.push(arg);
        }

        let [name, id] = <[String; 2]>::try_from(positional)
            .map_err(|_| ClientError::Usage(USAGE.to_string()))?;
        match name.as_str() {
            "challenge" => Ok(Self::Challenge(id)),
            "task" => Ok(Self::Task(id)),
            "project" => Ok(Self::Project(id)),
            "clusters" => Ok(Self::Clusters(id)),
            "user" => Ok(Self::User(id)),
            other => Err(ClientError::Usage(format!("unknown command `{other}`; {USAGE}"))),
        }
    }

    /// Load through the cache pipeline and render the outcome as JSON.
    pub async fn run(&self, ctx: LoaderContext) -> Result<Value, ClientError> {
        let value = match self {
            Self::Challenge(raw) => {
                let mut session = ChallengeSession::new(ctx, false);
                let view = session.open(standard_identity(raw)).await;
                serde_json::to_value(view.load)?
            }
            Self::Task(raw) => {
                let mut loader = TaskLoader::new(TaskResource, ctx);
                serde_json::to_value(loader.load_param(Some(raw)).await)?
            }
            Self::Project(raw) => {
                let mut loader = ProjectLoader::new(ProjectResource, ctx);
                serde_json::to_value(loader.load_param(Some(raw)).await)?
            }
            Self::Clusters(raw) => {
                let mut session = ChallengeSession::new(ctx, true);
                let view = session.open(standard_identity(raw)).await;
                let clusters = view.clusters.map(|set| set.clusters).unwrap_or_default();
                json!({
                    "challenge": serde_json::to_value(view.load)?,
                    "clusters": serde_json::to_value(clusters)?,
                })
            }
            Self::User(raw) => {
                let mut lookup = TargetUserLookup::new(ctx, false);
                serde_json::to_value(lookup.load(None, Some(raw)).await)?
            }
        };
        Ok(value)
    }
}

/// Write `output` as pretty JSON followed by a newline.
pub fn write_output<W: Write>(mut out: W, output: &Value) -> Result<(), ClientError> {
    let rendered = serde_json::to_string_pretty(output)?;
    writeln!(out, "{rendered}")?;
    out.flush()?;
    Ok(())
}

fn standard_identity(raw: &str) -> Option<ChallengeIdentity> {
    parse_numeric_id(Some(raw)).map(ChallengeIdentity::standard)
}
