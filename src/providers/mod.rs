use anyhow::Result;
use percent_encoding::{AsciiSet, CONTROLS};
use serde::Deserialize;

use crate::{commit::Author, gateway::Gateway};

use self::{gitea::Gitea, gitlab::Gitlab};

pub mod gitea;
pub mod gitlab;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'/');

#[derive(Debug, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum Provider {
    Gitea {
        api_url: String,
        /// `user:token`, sent as basic auth
        token: String,
        author: Option<String>,
    },
    Gitlab {
        #[serde(default = "gitlab::default_api_url")]
        api_url: String,
        token: String,
        author: Option<String>,
    },
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gitea { .. } => "gitea",
            Provider::Gitlab { .. } => "gitlab",
        }
    }
}

pub fn get_gateway(provider: Provider) -> Result<Box<dyn Gateway>> {
    Ok(match provider {
        Provider::Gitea {
            api_url,
            token,
            author,
        } => Box::new(Gitea::new(api_url, token, author.as_deref().map(Author::parse))),
        Provider::Gitlab {
            api_url,
            token,
            author,
        } => Box::new(Gitlab::new(
            api_url,
            token,
            author.as_deref().map(Author::parse),
        )?),
    })
}
