//! ID resolver module
//!
//! Resolves run ID prefixes to full UUIDs so users can type `3f2a` instead of
//! the whole identifier.

use anyhow::{Context, Result, anyhow};
use ferry_client::OrchestratorClient;
use uuid::Uuid;

/// Resolve a run ID or unambiguous prefix to a full UUID
///
/// A full UUID is returned as is, without asking the orchestrator.
pub async fn resolve_run_id(client: &OrchestratorClient, input: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let runs = client
        .list_runs()
        .await
        .context("Failed to fetch runs for ID resolution")?;

    match_prefix(runs.iter().map(|r| r.id), input)
}

/// Pick the single ID starting with `prefix`
fn match_prefix(ids: impl IntoIterator<Item = Uuid>, prefix: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Run ID must not be empty"));
    }

    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with ID starting with '{}'", prefix)),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple runs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        vec![
            Uuid::parse_str("3f2a0000-0000-4000-8000-000000000001").unwrap(),
            Uuid::parse_str("3f2b0000-0000-4000-8000-000000000002").unwrap(),
            Uuid::parse_str("a1000000-0000-4000-8000-000000000003").unwrap(),
        ]
    }

    #[test]
    fn test_unique_prefix_resolves() {
        let id = match_prefix(ids(), "3F2A").unwrap();
        assert_eq!(id, ids()[0]);
    }

    #[test]
    fn test_ambiguous_prefix_lists_candidates() {
        let err = match_prefix(ids(), "3f2").unwrap_err().to_string();
        assert!(err.contains("Ambiguous"));
        assert!(err.contains("3f2a0000"));
        assert!(err.contains("3f2b0000"));
    }

    #[test]
    fn test_unknown_prefix() {
        let err = match_prefix(ids(), "ff").unwrap_err().to_string();
        assert!(err.contains("No run found"));
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        assert!(match_prefix(ids(), "  ").is_err());
    }
}
