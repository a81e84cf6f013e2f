use anyhow::{Context, Result};
use serde::Deserialize;

use super::{PushEvent, PushEventParser};

/// The body of a Quay "Repository Push" notification.
#[derive(Debug, Deserialize)]
struct RepositoryPushHook {
    repository: String,
    docker_url: String,
    #[serde(default)]
    updated_tags: Vec<String>,
}

pub struct QuayParser;

impl PushEventParser for QuayParser {
    fn parse(&self, body: &[u8]) -> Result<PushEvent> {
        let hook: RepositoryPushHook =
            serde_json::from_slice(body).context("failed to parse Quay push hook")?;
        Ok(PushEvent {
            repository: hook.repository,
            image: hook.docker_url,
            updated_tags: hook.updated_tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let body = serde_json::json!({
            "name": "repository",
            "repository": "mynamespace/repository",
            "namespace": "mynamespace",
            "docker_url": "quay.io/mynamespace/repository",
            "homepage": "https://quay.io/repository/mynamespace/repository",
            "updated_tags": ["latest", "production"]
        });

        let hook = QuayParser
            .parse(&serde_json::to_vec(&body).unwrap())
            .unwrap();

        assert_eq!(
            hook,
            PushEvent {
                repository: "mynamespace/repository".into(),
                image: "quay.io/mynamespace/repository".into(),
                updated_tags: vec!["latest".into(), "production".into()],
            }
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(QuayParser.parse(br#"{"repository": "test"}"#).is_err());
        assert!(QuayParser.parse(b"not json").is_err());
    }
}
