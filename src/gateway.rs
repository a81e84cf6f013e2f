use anyhow::{anyhow, Result};
use bytes::Bytes;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::commit::{CommitRequest, PullRequest};

/// The branch, file and pull request operations performed against a git hosting provider.
///
/// Calls are independent: nothing is assumed about atomicity across them.
pub trait Gateway: Send + Sync {
    /// Returns the SHA of the commit at the tip of `branch`.
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String>;
    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes>;
    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()>;
    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()>;
    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()>;
}

impl<G: Gateway + ?Sized> Gateway for Box<G> {
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        (**self).branch_head(repo, branch)
    }

    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes> {
        (**self).get_file(repo, path, reference)
    }

    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()> {
        (**self).create_branch(repo, name, sha)
    }

    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()> {
        (**self).update_file(repo, commit)
    }

    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()> {
        (**self).create_pull_request(repo, pull_request)
    }
}

impl<G: Gateway + ?Sized> Gateway for Arc<G> {
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        (**self).branch_head(repo, branch)
    }

    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes> {
        (**self).get_file(repo, path, reference)
    }

    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()> {
        (**self).create_branch(repo, name, sha)
    }

    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()> {
        (**self).update_file(repo, commit)
    }

    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()> {
        (**self).create_pull_request(repo, pull_request)
    }
}

/// Gateway operations that can be made to fail on an [`InMemoryGateway`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    BranchHead,
    GetFile,
    CreateBranch,
    UpdateFile,
    CreatePullRequest,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedBranch {
    pub repo: String,
    pub name: String,
    pub sha: String,
}

#[derive(Default)]
struct State {
    files: HashMap<String, Bytes>,
    heads: HashMap<String, String>,
    updates: HashMap<String, Bytes>,
    branches: Vec<CreatedBranch>,
    pull_requests: Vec<(String, PullRequest)>,
    failures: HashMap<Operation, String>,
}

impl State {
    fn check(&self, operation: Operation) -> Result<()> {
        match self.failures.get(&operation) {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}

fn key(repo: &str, reference: &str, path: &str) -> String {
    format!("{}/{}/{}", repo, reference, path)
}

/// A gateway keeping every repository in memory and recording each change made to it.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_file_contents(&self, repo: &str, path: &str, reference: &str, content: impl Into<Bytes>) {
        self.state()
            .files
            .insert(key(repo, reference, path), content.into());
    }

    pub fn add_branch_head(&self, repo: &str, branch: &str, sha: &str) {
        self.state()
            .heads
            .insert(format!("{}/{}", repo, branch), sha.to_string());
    }

    /// Makes every subsequent call of `operation` fail with `message`.
    pub fn fail(&self, operation: Operation, message: &str) {
        self.state().failures.insert(operation, message.to_string());
    }

    /// Returns the content written by `update_file`, if any.
    pub fn updated_contents(&self, repo: &str, path: &str, branch: &str) -> Option<Bytes> {
        self.state().updates.get(&key(repo, branch, path)).cloned()
    }

    pub fn created_branches(&self) -> Vec<CreatedBranch> {
        self.state().branches.clone()
    }

    pub fn pull_requests(&self, repo: &str) -> Vec<PullRequest> {
        self.state()
            .pull_requests
            .iter()
            .filter(|(r, _)| r == repo)
            .map(|(_, pr)| pr.clone())
            .collect()
    }

    pub fn has_updates(&self) -> bool {
        !self.state().updates.is_empty()
    }
}

impl Gateway for InMemoryGateway {
    fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let state = self.state();
        state.check(Operation::BranchHead)?;
        state
            .heads
            .get(&format!("{}/{}", repo, branch))
            .cloned()
            .ok_or_else(|| anyhow!("Branch not found"))
    }

    fn get_file(&self, repo: &str, path: &str, reference: &str) -> Result<Bytes> {
        let state = self.state();
        state.check(Operation::GetFile)?;
        state
            .files
            .get(&key(repo, reference, path))
            .cloned()
            .ok_or_else(|| anyhow!("File not found"))
    }

    fn create_branch(&self, repo: &str, name: &str, sha: &str) -> Result<()> {
        let mut state = self.state();
        state.check(Operation::CreateBranch)?;
        state.heads.insert(format!("{}/{}", repo, name), sha.to_string());
        state.branches.push(CreatedBranch {
            repo: repo.to_string(),
            name: name.to_string(),
            sha: sha.to_string(),
        });
        Ok(())
    }

    fn update_file(&self, repo: &str, commit: CommitRequest) -> Result<()> {
        let mut state = self.state();
        state.check(Operation::UpdateFile)?;
        let key = key(repo, &commit.branch, &commit.path);
        state.files.insert(key.clone(), commit.content.clone());
        state.updates.insert(key, commit.content);
        Ok(())
    }

    fn create_pull_request(&self, repo: &str, pull_request: &PullRequest) -> Result<()> {
        let mut state = self.state();
        state.check(Operation::CreatePullRequest)?;
        state
            .pull_requests
            .push((repo.to_string(), pull_request.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_inmemory_gateway() {
        // initialize a repository with a file
        let test_content = Bytes::from("Hello World");
        let gateway = InMemoryGateway::default();
        gateway.add_file_contents("org/repo", "file.txt", "main", test_content.clone());
        gateway.add_branch_head("org/repo", "main", "abc123");

        // try getting the file
        assert_eq!(
            gateway.get_file("org/repo", "file.txt", "main").unwrap(),
            test_content
        );
        assert!(gateway.get_file("org/repo", "file.txt", "other").is_err());

        // branch off and write a new version there
        let sha = gateway.branch_head("org/repo", "main").unwrap();
        gateway.create_branch("org/repo", "feature", &sha).unwrap();
        gateway
            .update_file(
                "org/repo",
                CommitRequest {
                    path: "file.txt".into(),
                    branch: "feature".into(),
                    message: "test".into(),
                    content: "hello again!!".into(),
                },
            )
            .unwrap();

        assert_eq!(
            gateway.get_file("org/repo", "file.txt", "feature").unwrap(),
            Bytes::from("hello again!!")
        );
        assert_eq!(
            gateway.updated_contents("org/repo", "file.txt", "feature"),
            Some(Bytes::from("hello again!!"))
        );
        assert_eq!(gateway.updated_contents("org/repo", "file.txt", "main"), None);
        assert_eq!(
            gateway.created_branches(),
            vec![CreatedBranch {
                repo: "org/repo".into(),
                name: "feature".into(),
                sha: "abc123".into(),
            }]
        );
        assert_eq!(gateway.branch_head("org/repo", "feature").unwrap(), "abc123");
    }

    #[test]
    fn test_inmemory_gateway_failures() {
        let gateway = InMemoryGateway::default();
        gateway.fail(Operation::CreatePullRequest, "can't create pull-request");

        let err = gateway
            .create_pull_request("org/repo", &PullRequest::default())
            .unwrap_err();

        assert_eq!(err.to_string(), "can't create pull-request");
        assert!(gateway.pull_requests("org/repo").is_empty());
    }
}
