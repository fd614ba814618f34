//! Tag operations

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument};

use convoy_core::error::GitError;
use convoy_core::traits::DescribeResult;

use crate::command::{lines, run_git};
use crate::repository::{GitRepo, Result};

/// `<tag>-<distance>-g<sha>[-dirty]`
static TAGGED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<tag>.+)-(?P<count>\d+)-g(?P<sha>[0-9a-f]+)(?P<dirty>-dirty)?$")
        .expect("Invalid regex")
});

/// `<sha>[-dirty]` when no tag matched
static UNTAGGED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<sha>[0-9a-f]{4,40})(?P<dirty>-dirty)?$").expect("Invalid regex")
});

impl GitRepo {
    /// Whether a tag with this name exists
    pub fn tag_exists(&self, name: &str) -> Result<bool> {
        let repo = self.repo()?;
        let exists = match repo.find_reference(&format!("refs/tags/{name}")) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::Git2(e)),
        };
        exists
    }

    /// Create an annotated tag at HEAD
    #[instrument(skip(self, message))]
    pub fn create_tag(&self, name: &str, message: &str) -> Result<()> {
        if self.tag_exists(name)? {
            return Err(GitError::TagExists(name.to_string()));
        }
        run_git(self.root(), &["tag", name, "-m", message])?;
        info!(name, "created tag");
        Ok(())
    }

    /// Tags pointing at HEAD matching a glob `pattern`, in version order
    pub fn tags_at_head(&self, pattern: &str) -> Result<Vec<String>> {
        let output = run_git(
            self.root(),
            &["tag", "--sort", "version:refname", "--points-at", "HEAD", "--list", pattern],
        )?;
        let tags: Vec<String> = lines(&output).map(str::to_string).collect();
        debug!(pattern, count = tags.len(), "listed tags at HEAD");
        Ok(tags)
    }

    /// Describe HEAD against the most recent tag matching `pattern`
    ///
    /// Without a matching tag the commit count since the root stands in
    /// for the distance.
    #[instrument(skip(self))]
    pub fn describe(&self, pattern: &str) -> Result<DescribeResult> {
        let output = run_git(
            self.root(),
            &[
                "describe",
                "--always",
                "--long",
                "--dirty",
                "--first-parent",
                "--match",
                pattern,
            ],
        )?;

        let mut result = parse_describe(&output).ok_or_else(|| GitError::CommandFailed {
            command: format!("git describe --match {pattern}"),
            stderr: format!("unrecognized describe output: {output}"),
        })?;

        if result.last_tag.is_none() {
            let count = run_git(self.root(), &["rev-list", "--count", "--first-parent", "HEAD"])?;
            result.ref_count = count.trim().parse().unwrap_or_default();
        }
        debug!(
            last_tag = ?result.last_tag,
            ref_count = result.ref_count,
            sha = %result.sha,
            dirty = result.is_dirty,
            "described HEAD"
        );
        Ok(result)
    }
}

/// Parse `git describe --always --long --dirty` output
///
/// `v1.0.0-3-gabc1234-dirty` has a tag; a bare `abc1234` means no tag
/// matched and leaves `ref_count` at zero.
pub fn parse_describe(output: &str) -> Option<DescribeResult> {
    let output = output.trim();
    if let Some(caps) = TAGGED_REGEX.captures(output) {
        return Some(DescribeResult {
            last_tag: Some(caps["tag"].to_string()),
            ref_count: caps["count"].parse().ok()?,
            sha: caps["sha"].to_string(),
            is_dirty: caps.name("dirty").is_some(),
        });
    }
    UNTAGGED_REGEX.captures(output).map(|caps| DescribeResult {
        last_tag: None,
        ref_count: 0,
        sha: caps["sha"].to_string(),
        is_dirty: caps.name("dirty").is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::{commit_all, setup_repo};
    use git2::Repository;

    #[test]
    fn test_parse_describe() {
        let result = parse_describe("v1.2.0-3-gabc1234-dirty").unwrap();
        assert_eq!(result.last_tag.as_deref(), Some("v1.2.0"));
        assert_eq!(result.ref_count, 3);
        assert_eq!(result.sha, "abc1234");
        assert!(result.is_dirty);

        let scoped = parse_describe("@scope/pkg-a@2.0.0-beta.1-0-g1234567").unwrap();
        assert_eq!(scoped.last_tag.as_deref(), Some("@scope/pkg-a@2.0.0-beta.1"));
        assert_eq!(scoped.ref_count, 0);

        let untagged = parse_describe("abc1234").unwrap();
        assert!(untagged.last_tag.is_none());
        assert!(!untagged.is_dirty);
    }

    #[test]
    fn test_tag_and_describe() {
        let (temp, repo) = setup_repo();
        repo.create_tag("v1.0.0", "v1.0.0").unwrap();
        assert_eq!(repo.tags_at_head("v*").unwrap(), vec!["v1.0.0"]);

        std::fs::write(temp.path().join("file.txt"), "next").unwrap();
        commit_all(&Repository::open(temp.path()).unwrap(), "fix: next");

        let result = repo.describe("v*.*.*").unwrap();
        assert_eq!(result.last_tag.as_deref(), Some("v1.0.0"));
        assert_eq!(result.ref_count, 1);
        assert!(repo.tags_at_head("v*").unwrap().is_empty());
    }

    #[test]
    fn test_describe_without_tags_counts_commits() {
        let (_temp, repo) = setup_repo();
        let result = repo.describe("v*.*.*").unwrap();
        assert!(result.last_tag.is_none());
        assert_eq!(result.ref_count, 1);
    }

    #[test]
    fn test_tag_already_exists() {
        let (_temp, repo) = setup_repo();
        repo.create_tag("v1.0.0", "v1.0.0").unwrap();
        let result = repo.create_tag("v1.0.0", "again");
        assert!(matches!(result, Err(GitError::TagExists(_))));
    }
}
