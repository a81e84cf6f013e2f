use crate::{
    commit::{Author, CommitRequest, PullRequest},
    gateway::Gateway,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use percent_encoding::utf8_percent_encode;
use reqwest::{
    blocking::Client,
    header::{ACCEPT, AUTHORIZATION},
    StatusCode,
};
use serde::{Deserialize, Serialize};

use super::{FRAGMENT, USER_AGENT};

const DEFAULT_GITLAB_API_URL: &str = "https://gitlab.com/api/v4";

pub fn default_api_url() -> String {
    DEFAULT_GITLAB_API_URL.into()
}

#[derive(Deserialize)]
struct CommitResponse {
    web_url: String,
}

#[derive(Deserialize)]
struct BranchCommit {
    id: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct MergeRequestResponse {
    web_url: String,
}

#[derive(Debug, Serialize)]
struct CommitPayload {
    branch: String,
    commit_message: String,
    actions: Vec<CommitAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author_email: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommitAction {
    action: Action,
    file_path: String,
    content: String,
    encoding: Encoding,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Create,
    Update,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Encoding {
    Text,
    Base64,
}

#[derive(Debug, Serialize)]
struct MergeRequestPayload<'a> {
    source_branch: &'a str,
    target_branch: &'a str,
    title: &'a str,
    description: &'a str,
}

pub struct Gitlab {
    api_url: String,
    token: String,
    author: Option<Author>,
    client: Client,
}

impl Gitlab {
    pub fn new(api_url: impl ToString, token: impl ToString, author: Option<Author>) -> Result<Self> {
        Ok(Self {
            api_url: api_url.to_string(),
            token: token.to_string(),
            author,
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .context("failed to construct HTTP client")?,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn project_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{}",
            self.api_url,
            utf8_percent_encode(project, FRAGMENT)
        )
    }

    fn file_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/repository/files/{}/raw",
            self.project_url(project),
            utf8_percent_encode(path, FRAGMENT)
        )
    }

    fn file_to_action(
        &self,
        project: &str,
        file_path: impl Into<String>,
        reference: &str,
        content: Bytes,
    ) -> Result<CommitAction> {
        let file_path = file_path.into();
        let action = if self.check_file_exists(project, &file_path, reference)? {
            Action::Update
        } else {
            Action::Create
        };
        let (encoding, content) = match std::str::from_utf8(&content) {
            Ok(content) => (Encoding::Text, content.into()),
            Err(_) => (Encoding::Base64, general_purpose::STANDARD.encode(content)),
        };

        Ok(CommitAction {
            action,
            file_path,
            content,
            encoding,
        })
    }

    fn check_file_exists(&self, project: &str, path: &str, reference: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.file_url(project, path))
            .query(&[("ref", reference)])
            .header(AUTHORIZATION, self.auth_header())
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        response.error_for_status()?;

        Ok(true)
    }
}

impl Gateway for Gitlab {
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let BranchResponse { commit } = self
            .client
            .get(format!(
                "{}/repository/branches/{}",
                self.project_url(repo),
                utf8_percent_encode(branch, FRAGMENT)
            ))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .send()?
            .error_for_status()?
            .json()?;

        Ok(commit.id)
    }

    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes> {
        log::debug!(
            "fetching file path={path} project={repo} ref={reference} api_url={}",
            self.api_url
        );

        let response = self
            .client
            .get(self.file_url(repo, path))
            .query(&[("ref", reference)])
            .header(AUTHORIZATION, self.auth_header())
            .send()?
            .error_for_status()?;

        Ok(response.bytes()?)
    }

    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()> {
        self.client
            .post(format!("{}/repository/branches", self.project_url(repo)))
            .query(&[("branch", name), ("ref", sha)])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .send()?
            .error_for_status()?;

        Ok(())
    }

    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()> {
        log::debug!(
            "committing changes path={} ref={} message={} project={repo} api_url={}",
            commit.path,
            commit.branch,
            commit.message,
            self.api_url
        );

        let action = self.file_to_action(repo, commit.path, &commit.branch, commit.content)?;

        let body = &CommitPayload {
            branch: commit.branch,
            commit_message: commit.message,
            actions: vec![action],
            author_name: self.author.as_ref().map(|author| author.name.clone()),
            author_email: self.author.as_ref().map(|author| author.email.clone()),
        };

        let CommitResponse { web_url } = self
            .client
            .post(format!("{}/repository/commits", self.project_url(repo)))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .json(body)
            .send()?
            .error_for_status()?
            .json()?;

        log::info!("commit URL: {web_url}");

        Ok(())
    }

    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()> {
        let MergeRequestResponse { web_url } = self
            .client
            .post(format!("{}/merge_requests", self.project_url(repo)))
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/json")
            .json(&MergeRequestPayload {
                source_branch: &pull_request.head,
                target_branch: &pull_request.base,
                title: &pull_request.title,
                description: &pull_request.body,
            })
            .send()?
            .error_for_status()?
            .json()?;

        log::info!("merge request URL: {web_url}");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::{BufMut, BytesMut};
    use mockito::Matcher;

    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn gitlab(server: &mockito::Server, author: Option<Author>) -> Gitlab {
        Gitlab::new(server.url(), "gitlab-token", author).unwrap()
    }

    #[test]
    fn test_get() {
        init();

        let mut server = mockito::Server::new();
        let get_mock = server
            .mock(
                "GET",
                "/projects/test%2Ftest/repository/files/test%2Ftest.yaml/raw?ref=main",
            )
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("user-agent", USER_AGENT)
            .with_body("hello!")
            .create();

        assert_eq!(
            gitlab(&server, None)
                .get_file("test/test", "test/test.yaml", "main")
                .unwrap(),
            Bytes::from("hello!")
        );

        get_mock.assert();
    }

    #[test]
    fn test_branch_head() {
        init();

        let mut server = mockito::Server::new();
        let get_mock = server
            .mock("GET", "/projects/test%2Ftest/repository/branches/main")
            .match_header("authorization", "Bearer gitlab-token")
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"main","commit":{"id":"abc123","short_id":"abc"}}"#)
            .create();

        assert_eq!(
            gitlab(&server, None)
                .branch_head("test/test", "main")
                .unwrap(),
            "abc123"
        );

        get_mock.assert();
    }

    #[test]
    fn test_create_branch() {
        init();

        let mut server = mockito::Server::new();
        let post_mock = server
            .mock("POST", "/projects/test%2Ftest/repository/branches")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("branch".into(), "image-update-a".into()),
                Matcher::UrlEncoded("ref".into(), "abc123".into()),
            ]))
            .match_header("authorization", "Bearer gitlab-token")
            .with_status(201)
            .with_body("{}")
            .create();

        gitlab(&server, None)
            .create_branch("test/test", "image-update-a", "abc123")
            .unwrap();

        post_mock.assert();
    }

    #[test]
    fn test_create_branch_failure() {
        init();

        let mut server = mockito::Server::new();
        let post_mock = server
            .mock("POST", "/projects/test%2Ftest/repository/branches")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"Branch already exists"}"#)
            .create();

        assert!(gitlab(&server, None)
            .create_branch("test/test", "image-update-a", "abc123")
            .is_err());

        post_mock.assert();
    }

    #[test]
    fn test_update_new() {
        init();

        let mut server = mockito::Server::new();

        let head_mock = server
            .mock(
                "HEAD",
                "/projects/test%2Ftest/repository/files/test.bin/raw?ref=main",
            )
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("user-agent", USER_AGENT)
            .with_status(404)
            .create();
        let post_mock = server
            .mock("POST", "/projects/test%2Ftest/repository/commits")
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("content-type", "application/json")
            .match_header("accept", "application/json")
            .match_header("user-agent", USER_AGENT)
            .match_body(Matcher::Json(serde_json::json!({
                "branch": "main",
                "commit_message": "test",
                "actions": [
                    {
                        "action": "create",
                        "file_path": "test.bin",
                        "content": "BNI=",
                        "encoding": "base64"
                    },
                ],
            })))
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::to_vec(&serde_json::json!({ "web_url": "https://example.com" }))
                    .unwrap(),
            )
            .create();

        let mut non_utf8 = BytesMut::new();
        non_utf8.put_u16(1234);

        gitlab(&server, None)
            .update_file(
                "test/test",
                CommitRequest {
                    path: "test.bin".into(),
                    branch: "main".into(),
                    message: "test".into(),
                    content: non_utf8.into(),
                },
            )
            .unwrap();

        head_mock.assert();
        post_mock.assert();
    }

    #[test]
    fn test_update_existing() {
        init();

        let mut server = mockito::Server::new();

        let head_mock = server
            .mock(
                "HEAD",
                "/projects/test%2Ftest/repository/files/test%2Ftest.yaml/raw?ref=main",
            )
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("user-agent", USER_AGENT)
            .create();
        let post_mock = server
            .mock("POST", "/projects/test%2Ftest/repository/commits")
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("content-type", "application/json")
            .match_header("accept", "application/json")
            .match_header("user-agent", USER_AGENT)
            .match_body(Matcher::Json(serde_json::json!({
                "branch": "main",
                "commit_message": "test",
                "actions": [
                    {
                        "action": "update",
                        "file_path": "test/test.yaml",
                        "content": "image: new\n",
                        "encoding": "text"
                    },
                ],
                "author_name": "test",
                "author_email": "author@email.tld",
            })))
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::to_vec(&serde_json::json!({ "web_url": "https://example.com" }))
                    .unwrap(),
            )
            .create();

        gitlab(&server, Some(Author::parse("test <author@email.tld>")))
            .update_file(
                "test/test",
                CommitRequest {
                    path: "test/test.yaml".into(),
                    branch: "main".into(),
                    message: "test".into(),
                    content: "image: new\n".into(),
                },
            )
            .unwrap();

        head_mock.assert();
        post_mock.assert();
    }

    #[test]
    fn test_create_merge_request() {
        init();

        let mut server = mockito::Server::new();
        let post_mock = server
            .mock("POST", "/projects/test%2Ftest/merge_requests")
            .match_header("authorization", "Bearer gitlab-token")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(serde_json::json!({
                "source_branch": "image-update-a",
                "target_branch": "main",
                "title": "Image org/image updated",
                "description": "Automated Image Update",
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"web_url":"https://gitlab.com/test/test/-/merge_requests/1"}"#)
            .create();

        gitlab(&server, None)
            .create_pull_request(
                "test/test",
                &PullRequest {
                    title: "Image org/image updated".into(),
                    body: "Automated Image Update".into(),
                    head: "image-update-a".into(),
                    base: "main".into(),
                },
            )
            .unwrap();

        post_mock.assert();
    }
}
