use log::{debug, error, info};
use thiserror::Error;

use crate::{
    commit::{CommitRequest, PullRequest},
    config::{RepoConfiguration, Repository},
    gateway::Gateway,
    hooks::PushEvent,
    names::{NameGenerator, RandomNameGenerator},
    templaters::{yaml, PatchError},
};

const PULL_REQUEST_BODY: &str = "Automated Image Update";

/// Why an update could not be landed.
///
/// Failures reading the source file or patching it are passed through unchanged, failures
/// while writing carry the step that failed.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("push event for {0} has no updated tags")]
    NoUpdatedTags(String),

    #[error(transparent)]
    Upstream(anyhow::Error),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("failed to create branch: {0}")]
    CreateBranch(#[source] anyhow::Error),

    #[error("failed to update file: {0}")]
    UpdateFile(#[source] anyhow::Error),

    #[error("failed to create a pull request: {0}")]
    CreatePullRequest(#[source] anyhow::Error),

    /// More than one configured repository failed.
    #[error("{} updates failed: {}", .0.len(), join(.0))]
    Multiple(Vec<UpdateError>),
}

fn join(errors: &[UpdateError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Applies push events to the configured repositories.
pub struct Updater<G> {
    gateway: G,
    configs: RepoConfiguration,
    name_generator: Box<dyn NameGenerator>,
}

impl<G: Gateway> Updater<G> {
    pub fn new(gateway: G, configs: RepoConfiguration) -> Self {
        Self {
            gateway,
            configs,
            name_generator: Box::new(RandomNameGenerator),
        }
    }

    pub fn with_name_generator(mut self, name_generator: impl NameGenerator + 'static) -> Self {
        self.name_generator = Box::new(name_generator);
        self
    }

    /// Updates every repository configured for the pushed image.
    ///
    /// Repositories are updated one after the other; a failing repository does not stop the
    /// remaining ones from being updated.
    pub fn update_from_hook(&self, hook: &PushEvent) -> Result<(), UpdateError> {
        let repos = self.configs.match_all(hook);
        if repos.is_empty() {
            info!("no repository configured for image {}", hook.repository);
            return Ok(());
        }

        let new_image = hook
            .tagged_image()
            .ok_or_else(|| UpdateError::NoUpdatedTags(hook.repository.clone()))?;

        let mut errors: Vec<UpdateError> = repos
            .into_iter()
            .filter_map(|repo| {
                self.update_repository(repo, &new_image)
                    .map_err(|err| {
                        error!(
                            "failed to update repo={} file={}: {}",
                            repo.source_repo, repo.file_path, err
                        );
                        err
                    })
                    .err()
            })
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(UpdateError::Multiple(errors)),
        }
    }

    fn update_repository(&self, repo: &Repository, new_image: &str) -> Result<(), UpdateError> {
        let source_branch = repo.source_branch();
        debug!(
            "fetching file repo={} path={} ref={}",
            repo.source_repo, repo.file_path, source_branch
        );
        let current = self
            .gateway
            .get_file(&repo.source_repo, &repo.file_path, source_branch)
            .map_err(UpdateError::Upstream)?;

        let updated = yaml::update_file(&current, &repo.update_key, new_image)?;

        let branch = if repo.creates_branch() {
            self.create_branch(repo).map_err(UpdateError::CreateBranch)?
        } else {
            source_branch.to_string()
        };

        debug!(
            "updating file repo={} path={} branch={} key={}",
            repo.source_repo, repo.file_path, branch, repo.update_key
        );
        self.gateway
            .update_file(
                &repo.source_repo,
                CommitRequest {
                    path: repo.file_path.clone(),
                    branch: branch.clone(),
                    message: format!(
                        "Update {} in {} to {}",
                        repo.update_key, repo.file_path, new_image
                    ),
                    content: updated,
                },
            )
            .map_err(UpdateError::UpdateFile)?;

        if !repo.creates_branch() {
            info!(
                "updated {} to {new_image} on {}@{source_branch}",
                repo.file_path, repo.source_repo
            );
            return Ok(());
        }

        self.gateway
            .create_pull_request(
                &repo.source_repo,
                &PullRequest {
                    title: format!("Image {} updated", repo.name),
                    body: PULL_REQUEST_BODY.into(),
                    head: branch.clone(),
                    base: source_branch.into(),
                },
            )
            .map_err(UpdateError::CreatePullRequest)?;

        info!(
            "opened pull request to update {} to {new_image} on {} from {branch}",
            repo.file_path, repo.source_repo
        );

        Ok(())
    }

    /// Creates a freshly named branch at the tip of the source branch.
    fn create_branch(&self, repo: &Repository) -> anyhow::Result<String> {
        let sha = self
            .gateway
            .branch_head(&repo.source_repo, repo.source_branch())?;
        let name = self
            .name_generator
            .prefixed_name(&repo.branch_generate_name);
        debug!(
            "creating branch repo={} name={} sha={}",
            repo.source_repo, name, sha
        );
        self.gateway.create_branch(&repo.source_repo, &name, &sha)?;
        Ok(name)
    }
}
