//! Dependency spec resolution
//!
//! Turns the right-hand side of a manifest dependency entry into a
//! [`ResolvedDependency`] that knows whether it can point at a local
//! package and how to rewrite itself once that package's next version is
//! known.

use std::path::{Component, Path, PathBuf};

use semver::{Version, VersionReq};

/// How a `workspace:` spec refers to its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceRange {
    /// `workspace:*`
    Any,
    /// `workspace:^`
    Caret,
    /// `workspace:~`
    Tilde,
    /// `workspace:<range>`
    Explicit(String),
}

/// Reference inside a git-hosted spec's `#` fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitReference {
    /// `#semver:<range>`
    Semver(String),
    /// `#<tag>` where the tag ends in a version
    Tag { prefix: String, version: Version },
}

/// A parsed dependency spec
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDependency {
    /// A plain semver range
    Range(String),
    /// A local directory (`file:`, `link:` or a path)
    Directory(PathBuf),
    /// A git-hosted reference pinned by semver range or tag
    Git { url: String, reference: GitReference },
    /// A `workspace:` protocol reference
    Workspace(WorkspaceRange),
}

impl ResolvedDependency {
    /// Parse `spec` as declared by a package located at `location`
    ///
    /// Returns `None` for specs that can never be local (dist-tags,
    /// aliases, git refs without a version).
    pub fn parse(spec: &str, location: &Path) -> Option<Self> {
        let spec = spec.trim();

        if let Some(rest) = spec.strip_prefix("workspace:") {
            let range = match rest {
                "" | "*" => WorkspaceRange::Any,
                "^" => WorkspaceRange::Caret,
                "~" => WorkspaceRange::Tilde,
                other => WorkspaceRange::Explicit(other.to_string()),
            };
            return Some(Self::Workspace(range));
        }

        if let Some(path) = spec
            .strip_prefix("file:")
            .or_else(|| spec.strip_prefix("link:"))
        {
            return Some(Self::Directory(normalize(&location.join(path))));
        }
        if spec.starts_with("./") || spec.starts_with("../") || spec.starts_with('/') {
            return Some(Self::Directory(normalize(&location.join(spec))));
        }

        if is_git_spec(spec) {
            let (url, fragment) = spec.split_once('#')?;
            let reference = parse_git_fragment(fragment)?;
            return Some(Self::Git {
                url: url.to_string(),
                reference,
            });
        }

        parse_range(spec).map(|_| Self::Range(spec.to_string()))
    }

    /// Whether this spec is satisfied by a local package
    pub fn points_to(&self, location: &Path, version: Option<&Version>) -> bool {
        match self {
            Self::Workspace(_) => true,
            Self::Directory(path) => *path == normalize(location),
            Self::Range(range) => version.is_some_and(|v| satisfies(range, v)),
            Self::Git { reference, .. } => match (reference, version) {
                (GitReference::Semver(range), Some(v)) => satisfies(range, v),
                (GitReference::Tag { version: tagged, .. }, Some(v)) => tagged == v,
                _ => false,
            },
        }
    }

    /// Spec to write when the target moves to `version`
    ///
    /// `prefix` is the range prefix (`^`, or empty for exact pins). Git
    /// tags keep their own prefix. `None` means the spec stays as it is.
    pub fn rewritten(&self, version: &Version, prefix: &str) -> Option<String> {
        match self {
            Self::Range(_) => Some(format!("{prefix}{version}")),
            Self::Git { url, reference } => Some(match reference {
                GitReference::Semver(_) => format!("{url}#semver:{prefix}{version}"),
                GitReference::Tag { prefix: tag_prefix, .. } => format!("{url}#{tag_prefix}{version}"),
            }),
            Self::Workspace(WorkspaceRange::Explicit(_)) => {
                Some(format!("workspace:{prefix}{version}"))
            }
            Self::Workspace(_) | Self::Directory(_) => None,
        }
    }

    /// Spec that ends up in the published manifest
    ///
    /// Local links and workspace references become plain ranges;
    /// everything else is already publishable.
    pub fn resolve_for_publish(&self, version: &Version, prefix: &str) -> Option<String> {
        match self {
            Self::Directory(_) => Some(format!("{prefix}{version}")),
            Self::Workspace(WorkspaceRange::Any) => Some(version.to_string()),
            Self::Workspace(WorkspaceRange::Caret) => Some(format!("^{version}")),
            Self::Workspace(WorkspaceRange::Tilde) => Some(format!("~{version}")),
            Self::Workspace(WorkspaceRange::Explicit(range)) => Some(range.clone()),
            Self::Range(_) | Self::Git { .. } => None,
        }
    }
}

fn is_git_spec(spec: &str) -> bool {
    const PREFIXES: [&str; 6] = ["git+", "git://", "github:", "gitlab:", "bitbucket:", "gist:"];
    if PREFIXES.iter().any(|p| spec.starts_with(p)) {
        return true;
    }
    // user/repo#ref shorthand
    match spec.split_once('#') {
        Some((repo, _)) => {
            let mut parts = repo.split('/');
            matches!((parts.next(), parts.next(), parts.next()), (Some(u), Some(r), None)
                if !u.is_empty() && !r.is_empty() && !u.starts_with('@') && !u.starts_with('.'))
        }
        None => false,
    }
}

fn parse_git_fragment(fragment: &str) -> Option<GitReference> {
    if let Some(range) = fragment.strip_prefix("semver:") {
        return parse_range(range).map(|_| GitReference::Semver(range.to_string()));
    }
    let split = fragment.find(|c: char| c.is_ascii_digit())?;
    let (prefix, version) = fragment.split_at(split);
    let version = Version::parse(version).ok()?;
    Some(GitReference::Tag {
        prefix: prefix.to_string(),
        version,
    })
}

/// Parse an npm-style range into alternatives of `VersionReq`
///
/// Handles `||`, hyphen ranges, whitespace-separated comparators and the
/// empty/`x` wildcard.
pub fn parse_range(range: &str) -> Option<Vec<VersionReq>> {
    range
        .split("||")
        .map(|alternative| {
            let alternative = alternative.trim();
            let normalized = if alternative.is_empty() || alternative == "x" || alternative == "X" {
                "*".to_string()
            } else if let Some((low, high)) = alternative.split_once(" - ") {
                format!(">={}, <={}", low.trim(), high.trim())
            } else if alternative.contains(',') {
                alternative.to_string()
            } else {
                join_comparators(alternative)
            };
            VersionReq::parse(&normalized).ok()
        })
        .collect()
}

// ">= 1.0.0 <2" -> ">=1.0.0, <2"; a bare "1.2.3" is exact, not caret
fn join_comparators(range: &str) -> String {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in range.split_whitespace() {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            pending_op = Some(token);
            continue;
        }
        let token = token.strip_prefix('v').unwrap_or(token);
        match pending_op.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None if token.starts_with(|c: char| c.is_ascii_digit())
                && !token.contains(['x', 'X', '*']) =>
            {
                comparators.push(format!("={token}"))
            }
            None => comparators.push(token.to_string()),
        }
    }
    comparators.join(", ")
}

/// Whether `version` satisfies an npm-style range
pub fn satisfies(range: &str, version: &Version) -> bool {
    parse_range(range).is_some_and(|alternatives| alternatives.iter().any(|req| req.matches(version)))
}

// Lexical normalization; symlinks are not followed.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
