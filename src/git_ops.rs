//! Git operations for repository-backed tasks
//!
//! Clone, branch listing and branch diffs, all through git2.

use anyhow::{anyhow, Context, Result};
use git2::{BranchType, DiffFormat, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

const REMOTE_PREFIX: &str = "origin/";

/// Repository name from a clone URL or path: the last segment without `.git`.
pub fn repo_name_from_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');

    let last_segment = match Url::parse(trimmed) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        // scp-style `git@host:owner/repo.git` and plain paths
        _ => trimmed
            .rsplit(['/', '\\', ':'])
            .next()
            .map(str::to_string),
    };

    let name = last_segment
        .map(|s| s.trim_end_matches(".git").to_string())
        .unwrap_or_default();

    if name.is_empty() {
        return Err(anyhow!("Could not determine a repository name from '{}'", url));
    }
    Ok(name)
}

/// Clone `url` into `dest_dir/<repo name>` and return that path
pub fn clone_repo(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let name = repo_name_from_url(url)?;
    let local_path = dest_dir.join(&name);
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create '{}'", dest_dir.display()))?;

    info!("Cloning '{}' into '{}'", url, local_path.display());
    Repository::clone(url, &local_path)
        .with_context(|| format!("Failed to clone repository '{}'", url))?;
    info!("Repository cloned to '{}'", local_path.display());

    Ok(local_path)
}

/// Remote branch names of `origin`, without the remote prefix, sorted
pub fn remote_branches(repo_path: &Path) -> Result<Vec<String>> {
    let repo = Repository::open(repo_path)
        .with_context(|| format!("Failed to open repository at '{}'", repo_path.display()))?;

    let mut branches = Vec::new();
    for entry in repo.branches(Some(BranchType::Remote))? {
        let (branch, _) = entry?;
        let Some(name) = branch.name()? else {
            continue;
        };
        let Some(short) = name.strip_prefix(REMOTE_PREFIX) else {
            continue;
        };
        if short == "HEAD" {
            continue;
        }
        branches.push(short.to_string());
    }

    branches.sort();
    branches.dedup();
    info!("Found {} remote branches", branches.len());
    Ok(branches)
}

/// Unified diff from `origin/<target>` to `origin/<source>`. Empty when the trees match.
pub fn diff_branches(repo_path: &Path, source: &str, target: &str) -> Result<String> {
    let repo = Repository::open(repo_path)
        .with_context(|| format!("Failed to open repository at '{}'", repo_path.display()))?;

    info!("Computing diff: origin/{} -> origin/{}", target, source);
    let target_tree = remote_tree(&repo, target)?;
    let source_tree = remote_tree(&repo, source)?;

    let diff = repo.diff_tree_to_tree(Some(&target_tree), Some(&source_tree), None)?;

    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin());
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;

    debug!("Diff computed: {} chars", patch.len());
    Ok(patch)
}

fn remote_tree<'r>(repo: &'r Repository, branch: &str) -> Result<git2::Tree<'r>> {
    let spec = format!("{}{}", REMOTE_PREFIX, branch);
    repo.revparse_single(&spec)
        .and_then(|object| object.peel_to_tree())
        .with_context(|| format!("Branch '{}' not found", spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn create_temp_repo() -> (tempfile::TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let repo_path = temp_dir.path().join("upstream");

        let repo = Repository::init(&repo_path).expect("Failed to init repo");
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "Test User").unwrap();
        config.set_str("user.email", "test@example.com").unwrap();

        (temp_dir, repo_path)
    }

    fn commit_file(repo_path: &Path, update_ref: &str, rel_path: &str, content: &str) {
        let repo = Repository::open(repo_path).unwrap();
        std::fs::write(repo_path.join(rel_path), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(rel_path)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let parents = match repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
            Some(parent) => vec![parent],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let sig = Signature::now("Test User", "test@example.com").unwrap();
        repo.commit(Some(update_ref), &sig, &sig, "commit", &tree, &parent_refs)
            .unwrap();
    }

    /// Upstream with a default branch holding `app.py` and a `feature` branch that edits it.
    fn upstream_with_feature() -> (tempfile::TempDir, PathBuf, String) {
        let (temp_dir, repo_path) = create_temp_repo();
        commit_file(&repo_path, "HEAD", "app.py", "print('hello')\n");

        let repo = Repository::open(&repo_path).unwrap();
        let default_branch = repo.head().unwrap().shorthand().unwrap().to_string();
        commit_file(
            &repo_path,
            "refs/heads/feature",
            "app.py",
            "print('hello world')\n",
        );
        // Keep the working tree and index on the default branch's content
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.reset(head.as_object(), git2::ResetType::Hard, None).unwrap();

        (temp_dir, repo_path, default_branch)
    }

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(
            repo_name_from_url("https://github.com/owner/project.git").unwrap(),
            "project"
        );
        assert_eq!(
            repo_name_from_url("https://github.com/owner/project/").unwrap(),
            "project"
        );
        assert_eq!(
            repo_name_from_url("git@github.com:owner/project.git").unwrap(),
            "project"
        );
        assert_eq!(repo_name_from_url("/tmp/work/upstream").unwrap(), "upstream");
        assert!(repo_name_from_url("https://github.com/").is_err());
    }

    #[test]
    fn test_clone_lists_branches_and_diffs() {
        let (temp_dir, upstream, default_branch) = upstream_with_feature();
        let dest = temp_dir.path().join("clones");
        std::fs::create_dir_all(&dest).unwrap();

        let local = clone_repo(upstream.to_str().unwrap(), &dest).unwrap();
        assert_eq!(local, dest.join("upstream"));
        assert!(local.join("app.py").exists());

        let branches = remote_branches(&local).unwrap();
        let mut expected = vec![default_branch.clone(), "feature".to_string()];
        expected.sort();
        assert_eq!(branches, expected);

        let diff = diff_branches(&local, "feature", &default_branch).unwrap();
        assert!(diff.contains("app.py"));
        assert!(diff.contains("-print('hello')"));
        assert!(diff.contains("+print('hello world')"));
    }

    #[test]
    fn test_diff_same_branch_is_empty() {
        let (temp_dir, upstream, default_branch) = upstream_with_feature();
        let dest = temp_dir.path().join("clones");
        let local = clone_repo(upstream.to_str().unwrap(), &dest).unwrap();
        let diff = diff_branches(&local, &default_branch, &default_branch).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_clone_into_occupied_directory_fails() {
        let (temp_dir, upstream, _) = upstream_with_feature();
        // dest/<name> is the upstream itself, which is not empty
        let err = clone_repo(upstream.to_str().unwrap(), temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to clone"));
    }

    #[test]
    fn test_diff_unknown_branch_errors() {
        let (temp_dir, upstream, default_branch) = upstream_with_feature();
        let local = clone_repo(upstream.to_str().unwrap(), &temp_dir.path().join("c")).unwrap();
        let err = diff_branches(&local, "missing", &default_branch).unwrap_err();
        assert!(err.to_string().contains("origin/missing"));
    }
}
