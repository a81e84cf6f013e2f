use crate::{
    commit::{Author, CommitRequest, PullRequest},
    gateway::Gateway,
};
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use percent_encoding::utf8_percent_encode;
use reqwest::{
    blocking::{Client, Response},
    header::{AUTHORIZATION, USER_AGENT},
    StatusCode,
};
use serde::{Deserialize, Serialize};

use super::FRAGMENT;

#[derive(Deserialize)]
struct GiteaFileInfo {
    sha: String,
}

#[derive(Deserialize)]
struct GiteaCommit {
    id: String,
}

#[derive(Deserialize)]
struct GiteaBranch {
    commit: GiteaCommit,
}

#[derive(Serialize)]
struct CreateBranchPayload<'a> {
    new_branch_name: &'a str,
    old_ref_name: &'a str,
}

#[derive(Serialize)]
struct UpdateFilePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a Author>,
    message: &'a str,
    branch: &'a str,
    content: String,
    sha: String,
}

pub struct Gitea {
    api_url: String,
    credentials: String,
    author: Option<Author>,
    client: Client,
}

impl Gitea {
    pub fn new(api_url: impl ToString, credentials: impl ToString, author: Option<Author>) -> Self {
        Self {
            api_url: api_url.to_string(),
            credentials: credentials.to_string(),
            author,
            client: Client::new(),
        }
    }

    fn auth_header(&self) -> String {
        format!(
            "Basic {}",
            general_purpose::STANDARD.encode(&self.credentials)
        )
    }

    /// Turns a failed response into an error carrying its body, or its status when the body is empty.
    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text()?;
            if text.trim().is_empty() {
                return Err(anyhow!("{}", status));
            }
            return Err(anyhow!(text));
        }
        Ok(response)
    }

    /// Returns the blob SHA of an existing file, or an empty string when it doesn't exist yet.
    fn file_sha(&self, repo: &str, path: &str, reference: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/repos/{}/contents/{}", self.api_url, repo, path))
            .query(&[("ref", reference)])
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok("".into());
        }

        Ok(Self::check(response)?.json::<GiteaFileInfo>()?.sha)
    }
}

impl Gateway for Gitea {
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let response = self
            .client
            .get(format!(
                "{}/repos/{}/branches/{}",
                self.api_url,
                repo,
                utf8_percent_encode(branch, FRAGMENT)
            ))
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .send()?;

        Ok(Self::check(response)?.json::<GiteaBranch>()?.commit.id)
    }

    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes> {
        log::debug!(
            "fetching file path={path} repo={repo} ref={reference} api_url={}",
            self.api_url
        );

        let response = self
            .client
            .get(format!("{}/repos/{}/raw/{}", self.api_url, repo, path))
            .query(&[("ref", reference)])
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .send()?;

        Ok(Self::check(response)?.bytes()?)
    }

    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/repos/{}/branches", self.api_url, repo))
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .json(&CreateBranchPayload {
                new_branch_name: name,
                old_ref_name: sha,
            })
            .send()?;

        Self::check(response)?;
        Ok(())
    }

    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()> {
        log::debug!(
            "committing file path={} repo={repo} ref={} message={} api_url={}",
            commit.path,
            commit.branch,
            commit.message,
            self.api_url
        );

        // updating an existing file requires its latest SHA
        let sha = self.file_sha(repo, &commit.path, &commit.branch)?;

        let response = self
            .client
            .put(format!(
                "{}/repos/{}/contents/{}",
                self.api_url, repo, commit.path
            ))
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .json(&UpdateFilePayload {
                author: self.author.as_ref(),
                message: &commit.message,
                branch: &commit.branch,
                content: general_purpose::STANDARD.encode(&commit.content),
                sha,
            })
            .send()?;

        Self::check(response)?;
        Ok(())
    }

    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/repos/{}/pulls", self.api_url, repo))
            .header(AUTHORIZATION, self.auth_header())
            .header(USER_AGENT, super::USER_AGENT)
            .json(pull_request)
            .send()?;

        Self::check(response)?;
        Ok(())
    }
}
