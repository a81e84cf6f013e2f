use anyhow::{Context, Result};
use serde::Deserialize;

use super::{PushEvent, PushEventParser};

#[derive(Debug, Deserialize)]
struct PushData {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct DockerRepository {
    repo_name: String,
}

/// The body of a Docker Hub push webhook.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    push_data: PushData,
    repository: DockerRepository,
}

pub struct DockerParser;

impl PushEventParser for DockerParser {
    fn parse(&self, body: &[u8]) -> Result<PushEvent> {
        let hook: WebhookPayload =
            serde_json::from_slice(body).context("failed to parse Docker Hub push hook")?;
        Ok(PushEvent {
            image: hook.repository.repo_name.clone(),
            repository: hook.repository.repo_name,
            updated_tags: vec![hook.push_data.tag],
        })
    }
}
