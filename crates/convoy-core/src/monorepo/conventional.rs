//! Conventional-commit version recommendations

use std::sync::{Arc, LazyLock};

use regex::Regex;
use semver::Version;
use tracing::debug;

use crate::error::Result;
use crate::traits::VersionControlClient;
use crate::types::{ReleaseType, VersionMode};

use super::package::Package;
use super::versioning::Recommender;

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<type>[A-Za-z]+)(?:\([^)]*\))?(?P<breaking>!)?:").expect("Invalid regex")
});

/// Recommends increments from commit messages since the last release
///
/// A breaking change (`type!:` or a `BREAKING CHANGE` footer) is major,
/// `feat` is minor, anything else is patch. Below 1.0.0 majors become
/// minors.
pub struct ConventionalCommitRecommender {
    vcs: Arc<dyn VersionControlClient>,
    mode: VersionMode,
    tag_prefix: String,
}

impl ConventionalCommitRecommender {
    /// Create a recommender
    pub fn new(vcs: Arc<dyn VersionControlClient>, mode: VersionMode, tag_prefix: impl Into<String>) -> Self {
        Self {
            vcs,
            mode,
            tag_prefix: tag_prefix.into(),
        }
    }

    fn classify(&self, message: &str) -> ReleaseType {
        let subject = message.lines().next().unwrap_or_default();
        let caps = HEADER_REGEX.captures(subject);
        let breaking = caps.as_ref().is_some_and(|c| c.name("breaking").is_some())
            || message.contains("BREAKING CHANGE")
            || message.contains("BREAKING-CHANGE");

        if breaking {
            ReleaseType::Major
        } else if caps.is_some_and(|c| &c["type"] == "feat") {
            ReleaseType::Minor
        } else {
            ReleaseType::Patch
        }
    }

    fn last_release_tag(&self, package: &Package, current: &Version) -> String {
        match self.mode {
            VersionMode::Fixed => format!("{}{}", self.tag_prefix, current),
            VersionMode::Independent => format!("{}@{}", package.name(), current),
        }
    }
}

impl Recommender for ConventionalCommitRecommender {
    fn recommend(&self, package: &Package, current: &Version, preid: Option<&str>) -> Result<ReleaseType> {
        let since = self.last_release_tag(package, current);
        let messages = self
            .vcs
            .commit_messages_since(Some(&since), package.location())?;

        let mut release = messages
            .iter()
            .map(|m| self.classify(m))
            .max_by_key(|r| match r {
                ReleaseType::Major => 2,
                ReleaseType::Minor => 1,
                _ => 0,
            })
            .unwrap_or(ReleaseType::Patch);

        if release == ReleaseType::Major && current.major == 0 {
            release = ReleaseType::Minor;
        }
        if preid.is_some() {
            release = if current.pre.is_empty() {
                release.to_prerelease()
            } else {
                ReleaseType::Prerelease
            };
        }

        debug!(
            package = %package.name(),
            since = %since,
            commits = messages.len(),
            release = %release,
            "recommended increment"
        );
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::DescribeResult;
    use serde_json::json;
    use std::path::{Path, PathBuf};

    struct Log(Vec<&'static str>);

    impl VersionControlClient for Log {
        fn current_branch(&self) -> Result<Option<String>> {
            Ok(None)
        }
        fn is_anything_committed(&self) -> Result<bool> {
            Ok(true)
        }
        fn uncommitted_changes(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn is_behind_upstream(&self, _: &str, _: &str) -> Result<bool> {
            Ok(false)
        }
        fn remote_branch_exists(&self, _: &str, _: &str) -> Result<bool> {
            Ok(true)
        }
        fn head_sha(&self) -> Result<String> {
            Ok(String::new())
        }
        fn commit(&self, _: &str, _: &[PathBuf]) -> Result<()> {
            Ok(())
        }
        fn tag(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        fn push(&self, _: &str, _: &str, _: bool) -> Result<()> {
            Ok(())
        }
        fn describe(&self, _: &str) -> Result<DescribeResult> {
            Ok(DescribeResult::default())
        }
        fn list_tags_at_head(&self, _: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        fn list_changed_manifests_at_head(&self) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
        fn changed_files_since(&self, _: &str) -> Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
        fn commit_messages_since(&self, since: Option<&str>, _: &Path) -> Result<Vec<String>> {
            assert_eq!(since, Some("core@1.2.0"));
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
        fn reset_files(&self, _: &[PathBuf]) -> Result<()> {
            Ok(())
        }
    }

    fn recommend(log: Vec<&'static str>, current: &str, preid: Option<&str>) -> ReleaseType {
        let package = Package::from_value("/repo/packages/core", json!({ "name": "core", "version": current })).unwrap();
        let recommender =
            ConventionalCommitRecommender::new(Arc::new(Log(log)), VersionMode::Independent, "v");
        let current = Version::parse("1.2.0").unwrap();
        recommender.recommend(&package, &current, preid).unwrap()
    }

    #[test]
    fn test_highest_commit_type_wins() {
        assert_eq!(recommend(vec!["fix: typo", "feat(core): add thing"], "1.2.0", None), ReleaseType::Minor);
        assert_eq!(recommend(vec!["chore: deps"], "1.2.0", None), ReleaseType::Patch);
        assert_eq!(recommend(vec![], "1.2.0", None), ReleaseType::Patch);
        assert_eq!(recommend(vec!["feat!: drop node 14"], "1.2.0", None), ReleaseType::Major);
        assert_eq!(
            recommend(vec!["refactor: x\n\nBREAKING CHANGE: renamed"], "1.2.0", None),
            ReleaseType::Major
        );
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(recommend(vec!["feat(api)!: new shape"], "1.2.0", None), ReleaseType::Major);
        assert_eq!(recommend(vec!["feat(api): add"], "1.2.0", None), ReleaseType::Minor);
        assert_eq!(recommend(vec!["update readme\n\nfeat: not a header"], "1.2.0", None), ReleaseType::Patch);
    }

    #[test]
    fn test_preid_requests_prerelease_bump() {
        assert_eq!(recommend(vec!["feat: a"], "1.2.0", Some("beta")), ReleaseType::Preminor);
    }
}
