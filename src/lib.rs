//! forksync - Batch synchronization of forked repositories
//!
//! forksync keeps a user's forks in sync with their upstream parents: it
//! discovers every fork the user owns through the GitHub API, fetches each
//! fork's parent metadata, then clones or updates a local mirror, rebinds its
//! `upstream` remote, and pushes upstream commits, the default branch, a
//! best-effort master branch, and tags back to the user's origin.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and startup validation
//! - [`github`]: Repository directory client for the GitHub REST API
//! - [`git`]: Git subprocess executor and failure classification
//! - [`sync`]: Per-repository synchronizer and the orchestration pipeline
//! - [`logger`]: Per-run log sink flushed to disk at completion

pub mod config;
pub mod git;
pub mod github;
pub mod logger;
pub mod sync;

pub use config::{Config, ConfigError};
pub use git::{GitCli, Vcs, VcsError};
pub use github::{DirectoryError, GitHubClient, RepoDetail, RepoDirectory, RepoSummary};
pub use logger::RunLog;
pub use sync::{SyncEngine, SyncOutcome, SyncSummary, Synchronizer};
