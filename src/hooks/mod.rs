use anyhow::{anyhow, Result};

use self::{docker::DockerParser, quay::QuayParser};

pub mod docker;
pub mod quay;

/// A registry push, normalized from the registry specific webhook payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushEvent {
    /// The registry's name for the pushed repository, e.g. `mynamespace/repository`.
    pub repository: String,
    /// The image reference without tag, e.g. `quay.io/mynamespace/repository`.
    pub image: String,
    pub updated_tags: Vec<String>,
}

impl PushEvent {
    /// The image reference for the first updated tag.
    pub fn tagged_image(&self) -> Option<String> {
        self.updated_tags
            .first()
            .map(|tag| format!("{}:{}", self.image, tag))
    }
}

pub trait PushEventParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<PushEvent>;
}

/// Returns the parser for the named registry.
pub fn parser(name: &str) -> Result<Box<dyn PushEventParser>> {
    match name {
        "quay" => Ok(Box::new(QuayParser)),
        "docker" => Ok(Box::new(DockerParser)),
        other => Err(anyhow!("unknown parser: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser() {
        assert!(parser("quay").is_ok());
        assert!(parser("docker").is_ok());
        assert_eq!(
            parser("gcr").err().unwrap().to_string(),
            "unknown parser: gcr"
        );
    }

    #[test]
    fn test_tagged_image() {
        let mut hook = PushEvent {
            repository: "testorg/repo".into(),
            image: "quay.io/testorg/repo".into(),
            updated_tags: vec!["production".into(), "latest".into()],
        };
        assert_eq!(
            hook.tagged_image().as_deref(),
            Some("quay.io/testorg/repo:production")
        );

        hook.updated_tags.clear();
        assert_eq!(hook.tagged_image(), None);
    }
}
