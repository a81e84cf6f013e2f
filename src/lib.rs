//! Update GitOps manifests when a new image is pushed to a container registry.
//!
//! A push hook is parsed into a [`hooks::PushEvent`], matched against the
//! [`config::RepoConfiguration`] and applied by the [`updater::Updater`], which
//! rewrites a single value in the configured file through a [`gateway::Gateway`],
//! either directly on the source branch or on a new branch with a pull request.

pub mod commit;
pub mod config;
pub mod gateway;
pub mod hooks;
pub mod names;
pub mod providers;
pub mod server;
pub mod templaters;
pub mod updater;
