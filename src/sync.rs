//! Synchronization pipeline
//!
//! This module holds the two halves of the core pipeline: [`Synchronizer`]
//! runs the ordered git step sequence for one repository, and [`SyncEngine`]
//! drives the end-to-end run (paginated fork discovery, bounded-concurrency
//! detail fetch, bounded-concurrency sync fan-out, terminal reporting).

use futures::stream::{self, FuturesUnordered, StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::config::Config;
use crate::git::{GitCli, Vcs, VcsError};
use crate::github::{DirectoryError, GitHubClient, RepoDetail, RepoDirectory, RepoSummary};
use crate::logger::RunLog;

/// Terminal report for one repository's synchronization
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Synced { full_name: String },
    Failed { full_name: String, error: String },
}

impl SyncOutcome {
    pub fn full_name(&self) -> &str {
        match self {
            SyncOutcome::Synced { full_name } | SyncOutcome::Failed { full_name, .. } => full_name,
        }
    }
}

/// Results from a complete run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub synced: usize,
    pub failed: usize,
    pub duration: Duration,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncSummary {
    fn compile(outcomes: Vec<SyncOutcome>, duration: Duration) -> Self {
        let total_repositories = outcomes.len();
        let synced = outcomes
            .iter()
            .filter(|o| matches!(o, SyncOutcome::Synced { .. }))
            .count();

        Self {
            total_repositories,
            synced,
            failed: total_repositories - synced,
            duration,
            outcomes,
        }
    }
}

/// Runs the ordered step sequence for a single fork
///
/// Steps are strictly sequential: acquire the local clone, rebind the
/// `upstream` remote to the current parent, pull/push the default branch,
/// best-effort sync of master, then sync tags. "Already done" failures from
/// a previous run are tolerated at the steps where they can occur, which is
/// what makes a re-run idempotent.
pub struct Synchronizer<'a> {
    vcs: &'a dyn Vcs,
    log: &'a RunLog,
    root: &'a Path,
}

impl<'a> Synchronizer<'a> {
    pub fn new(vcs: &'a dyn Vcs, log: &'a RunLog, root: &'a Path) -> Self {
        Self { vcs, log, root }
    }

    /// Synchronize one fork with its upstream parent.
    pub async fn sync(&self, repo: &RepoDetail) -> Result<(), VcsError> {
        let workdir = self.root.join(&repo.name);

        self.acquire_local(repo, &workdir).await?;
        self.rebind_upstream(repo, &workdir).await?;
        self.sync_branch(repo, &workdir, &repo.default_branch).await?;
        self.try_sync_master(repo, &workdir).await;
        self.sync_tags(repo, &workdir).await
    }

    async fn acquire_local(&self, repo: &RepoDetail, workdir: &Path) -> Result<(), VcsError> {
        self.log.log(
            &format!("Cloning repository {}", repo.clone_url),
            Some(&repo.full_name),
        );

        match self.vcs.clone_repo(&repo.clone_url, workdir).await {
            Err(err) if err.is_existing_destination() => {
                self.log.log(
                    "Repository folder already existed. Continuing.",
                    Some(&repo.full_name),
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Remove any stale `upstream` remote and bind it to the current parent,
    /// so the binding never accumulates across runs.
    async fn rebind_upstream(&self, repo: &RepoDetail, workdir: &Path) -> Result<(), VcsError> {
        self.log.log(
            &format!("Setting upstream to {}", repo.parent.clone_url),
            Some(&repo.full_name),
        );

        match self.vcs.remove_remote(workdir, "upstream").await {
            Err(err) if err.is_missing_remote() => {}
            other => other?,
        }

        self.vcs
            .add_remote(workdir, "upstream", &repo.parent.clone_url)
            .await
    }

    /// Checkout `branch`, pull it from upstream, and push it to origin with
    /// tracking. Used for both the default branch and the master branch.
    async fn sync_branch(
        &self,
        repo: &RepoDetail,
        workdir: &Path,
        branch: &str,
    ) -> Result<(), VcsError> {
        self.log
            .log(&format!("Checking out {}", branch), Some(&repo.full_name));

        match self.vcs.checkout(workdir, branch).await {
            // Branch already exists locally from a prior run
            Err(err) if err.is_branch_collision() => {}
            other => other?,
        }

        self.log
            .log(&format!("Pulling upstream/{}", branch), Some(&repo.full_name));
        self.vcs.pull(workdir, "upstream", branch).await?;

        self.log
            .log(&format!("Pushing to origin/{}", branch), Some(&repo.full_name));
        self.vcs.push_tracking(workdir, "origin", branch).await
    }

    /// Best-effort master sync: a no-op when master already is the default
    /// branch, and failures are swallowed since not every fork carries one.
    async fn try_sync_master(&self, repo: &RepoDetail, workdir: &Path) {
        if repo.default_branch == "master" {
            return;
        }

        self.log
            .log("Trying to sync master branch", Some(&repo.full_name));

        match self.sync_branch(repo, workdir, "master").await {
            Ok(()) => self.log.log("Master branch synced", Some(&repo.full_name)),
            Err(err) => self.log.log(
                &format!("Failed syncing master branch: {}", err),
                Some(&repo.full_name),
            ),
        }
    }

    async fn sync_tags(&self, repo: &RepoDetail, workdir: &Path) -> Result<(), VcsError> {
        self.log
            .log("Fetching tags from upstream", Some(&repo.full_name));
        self.vcs.fetch_tags(workdir, "upstream").await?;

        self.log
            .log("Pushing tags to origin", Some(&repo.full_name));
        self.vcs.push_tags(workdir).await
    }
}

/// The orchestrator driving the end-to-end pipeline
pub struct SyncEngine {
    config: Arc<Config>,
    directory: Arc<dyn RepoDirectory>,
    vcs: Arc<dyn Vcs>,
    log: Arc<RunLog>,
}

impl SyncEngine {
    /// Create an engine backed by the real GitHub API and git binary.
    pub fn new(config: Config) -> Result<Self, DirectoryError> {
        let directory = Arc::new(GitHubClient::new(&config)?);
        Ok(Self::with_parts(
            config,
            directory,
            Arc::new(GitCli),
            Arc::new(RunLog::new()),
        ))
    }

    /// Create an engine from explicit collaborators.
    pub fn with_parts(
        config: Config,
        directory: Arc<dyn RepoDirectory>,
        vcs: Arc<dyn Vcs>,
        log: Arc<RunLog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            directory,
            vcs,
            log,
        }
    }

    /// Run the complete pipeline: discovery, detail fetch, sync fan-out, and
    /// terminal reporting.
    ///
    /// Directory failures abort the whole run before any synchronization
    /// starts; per-repository failures are isolated and land in the summary.
    pub async fn run(&self) -> Result<SyncSummary, DirectoryError> {
        let start_time = Instant::now();

        let forks = self.discover_forks().await?;
        let details = self.fetch_details(&forks).await?;
        let outcomes = self.sync_all(details).await;

        let summary = SyncSummary::compile(outcomes, start_time.elapsed());

        self.log.log("Finished", None);
        if let Err(err) = self.log.flush(&self.config.root()).await {
            warn!("Failed to write run log: {}", err);
        }

        Ok(summary)
    }

    /// Walk the paginated listing from page 1, keeping forks in the order
    /// first observed, until the first empty page.
    ///
    /// Strictly sequential: each page request depends on the previous page's
    /// result.
    async fn discover_forks(&self) -> Result<Vec<RepoSummary>, DirectoryError> {
        let mut forks = Vec::new();
        let mut seen = HashSet::new();
        let mut page = 1u32;

        loop {
            self.log.log(
                &format!("Looking for forked repositories at page {}", page),
                None,
            );

            let repos = self
                .directory
                .list_repositories(&self.config.username, page)
                .await?;
            if repos.is_empty() {
                break;
            }

            for repo in repos {
                if repo.fork && seen.insert(repo.id) {
                    forks.push(repo);
                }
            }
            page += 1;
        }

        Ok(forks)
    }

    /// Fetch detail records for all forks, bounded by the configured GitHub
    /// concurrency limit. Any directory failure aborts the run.
    async fn fetch_details(
        &self,
        forks: &[RepoSummary],
    ) -> Result<Vec<RepoDetail>, DirectoryError> {
        self.log.log(
            &format!("Found {} forks. Fetching details...", forks.len()),
            None,
        );

        stream::iter(forks.iter().map(|repo| {
            let directory = Arc::clone(&self.directory);
            let log = Arc::clone(&self.log);
            let username = self.config.username.clone();
            let name = repo.name.clone();
            let full_name = repo.full_name.clone();

            async move {
                log.log("Fetching details for repository", Some(&full_name));
                directory.repository_detail(&username, &name).await
            }
        }))
        .buffer_unordered(self.config.github_concurrency.max(1))
        .try_collect()
        .await
    }

    /// Fan out one synchronization task per fork, gated by an optional
    /// semaphore. One repository's failure never cancels its siblings.
    async fn sync_all(&self, details: Vec<RepoDetail>) -> Vec<SyncOutcome> {
        let semaphore = self
            .config
            .git_concurrency
            .map(|limit| Arc::new(tokio::sync::Semaphore::new(limit.max(1))));

        let mut futures = FuturesUnordered::new();

        for repo in details {
            let semaphore = semaphore.clone();
            let vcs = Arc::clone(&self.vcs);
            let log = Arc::clone(&self.log);
            let root = self.config.root();

            futures.push(async move {
                let _permit = match semaphore.as_ref() {
                    Some(semaphore) => {
                        Some(semaphore.acquire().await.expect("Semaphore closed"))
                    }
                    None => None,
                };

                let synchronizer = Synchronizer::new(vcs.as_ref(), log.as_ref(), &root);
                match synchronizer.sync(&repo).await {
                    Ok(()) => {
                        log.log("Repository synchronized", Some(&repo.full_name));
                        SyncOutcome::Synced {
                            full_name: repo.full_name,
                        }
                    }
                    Err(err) => {
                        log.error(
                            &format!("Synchronization failed: {}", err),
                            Some(&repo.full_name),
                        );
                        SyncOutcome::Failed {
                            full_name: repo.full_name,
                            error: err.to_string(),
                        }
                    }
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}
