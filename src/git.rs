use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// A failed git invocation
///
/// Carries the command's diagnostic text so callers can decide whether the
/// failure is actually benign (see the `is_*` classifiers). Git reports these
/// conditions only through its stderr text, so substring matching on the
/// current message wording is the behavioral contract here.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to launch git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

impl VcsError {
    fn stderr(&self) -> &str {
        match self {
            VcsError::Command { stderr, .. } => stderr,
            VcsError::Spawn(_) => "",
        }
    }

    /// Clone failed because the target directory already holds a checkout.
    pub fn is_existing_destination(&self) -> bool {
        self.stderr()
            .contains("already exists and is not an empty directory")
    }

    /// Remote removal failed because the remote was never added. Git has
    /// reworded this over time ("No such remote: upstream", "No such remote:
    /// 'upstream'"), so only the stable prefix is matched.
    pub fn is_missing_remote(&self) -> bool {
        self.stderr().contains("No such remote")
    }

    /// Checkout failed because the local branch already exists from a
    /// previous run. Matched case-insensitively: older git says "A branch
    /// named '<b>' already exists", newer says "a branch named ...".
    pub fn is_branch_collision(&self) -> bool {
        let stderr = self.stderr().to_lowercase();
        stderr.contains("branch named") && stderr.contains("already exists")
    }
}

/// The git operations the synchronizer drives, one method per command
///
/// `GitCli` is the subprocess-backed implementation; tests substitute mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError>;

    async fn remove_remote(&self, workdir: &Path, name: &str) -> Result<(), VcsError>;

    async fn add_remote(&self, workdir: &Path, name: &str, url: &str) -> Result<(), VcsError>;

    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<(), VcsError>;

    async fn pull(&self, workdir: &Path, remote: &str, branch: &str) -> Result<(), VcsError>;

    /// `git push -u <remote> <branch>`, setting the tracking branch.
    async fn push_tracking(&self, workdir: &Path, remote: &str, branch: &str)
        -> Result<(), VcsError>;

    /// `git fetch <remote> --prune --tags`
    async fn fetch_tags(&self, workdir: &Path, remote: &str) -> Result<(), VcsError>;

    /// `git push --tags`
    async fn push_tags(&self, workdir: &Path) -> Result<(), VcsError>;
}

/// Git executor backed by the `git` binary
pub struct GitCli;

impl GitCli {
    /// Run one git command; no retries, no output interpretation.
    async fn run(&self, args: Vec<String>, workdir: Option<&Path>) -> Result<(), VcsError> {
        debug!("git {}", args.join(" "));

        let mut command = AsyncCommand::new("git");
        command.args(&args);
        if let Some(dir) = workdir {
            command.current_dir(dir);
        }

        let output = command.output().await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(VcsError::Command {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), VcsError> {
        let args = vec![
            "clone".to_string(),
            url.to_string(),
            dest.display().to_string(),
        ];
        self.run(args, None).await
    }

    async fn remove_remote(&self, workdir: &Path, name: &str) -> Result<(), VcsError> {
        let args = vec!["remote".to_string(), "remove".to_string(), name.to_string()];
        self.run(args, Some(workdir)).await
    }

    async fn add_remote(&self, workdir: &Path, name: &str, url: &str) -> Result<(), VcsError> {
        let args = vec![
            "remote".to_string(),
            "add".to_string(),
            name.to_string(),
            url.to_string(),
        ];
        self.run(args, Some(workdir)).await
    }

    async fn checkout(&self, workdir: &Path, branch: &str) -> Result<(), VcsError> {
        let args = vec!["checkout".to_string(), branch.to_string()];
        self.run(args, Some(workdir)).await
    }

    async fn pull(&self, workdir: &Path, remote: &str, branch: &str) -> Result<(), VcsError> {
        let args = vec!["pull".to_string(), remote.to_string(), branch.to_string()];
        self.run(args, Some(workdir)).await
    }

    async fn push_tracking(
        &self,
        workdir: &Path,
        remote: &str,
        branch: &str,
    ) -> Result<(), VcsError> {
        let args = vec![
            "push".to_string(),
            "-u".to_string(),
            remote.to_string(),
            branch.to_string(),
        ];
        self.run(args, Some(workdir)).await
    }

    async fn fetch_tags(&self, workdir: &Path, remote: &str) -> Result<(), VcsError> {
        let args = vec![
            "fetch".to_string(),
            remote.to_string(),
            "--prune".to_string(),
            "--tags".to_string(),
        ];
        self.run(args, Some(workdir)).await
    }

    async fn push_tags(&self, workdir: &Path) -> Result<(), VcsError> {
        let args = vec!["push".to_string(), "--tags".to_string()];
        self.run(args, Some(workdir)).await
    }
}
