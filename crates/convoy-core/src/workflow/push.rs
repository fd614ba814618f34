//! Pushing release commits and tags

use tracing::{info, warn};

use crate::error::{ConvoyError, Result};
use crate::traits::VersionControlClient;

/// Push `branch` and its tags, atomically when the remote supports it
///
/// A push rejected because of `--atomic` is retried once without it; any
/// other failure propagates unchanged.
pub fn push_with_fallback(vcs: &dyn VersionControlClient, remote: &str, branch: &str) -> Result<()> {
    match vcs.push(remote, branch, true) {
        Ok(()) => {
            info!(remote, branch, "pushed release");
            Ok(())
        }
        Err(ConvoyError::Git(e)) if e.stderr().is_some_and(|s| s.contains("atomic")) => {
            warn!(
                remote,
                branch,
                error = %e,
                "remote does not support atomic pushes, retrying without --atomic"
            );
            vcs.push(remote, branch, false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::FakeVcs;

    #[test]
    fn test_falls_back_when_atomic_is_rejected() {
        let vcs = FakeVcs {
            reject_atomic: true,
            ..FakeVcs::on_main()
        };
        push_with_fallback(&vcs, "origin", "main").unwrap();
        assert_eq!(
            vcs.calls(),
            vec![
                "push origin main atomic=true".to_string(),
                "push origin main atomic=false".to_string()
            ]
        );
    }

    #[test]
    fn test_other_push_errors_propagate() {
        let vcs = FakeVcs {
            push_error: Some("! [rejected] main -> main (non-fast-forward)".to_string()),
            ..FakeVcs::on_main()
        };
        let err = push_with_fallback(&vcs, "origin", "main").unwrap_err();
        assert_eq!(err.code(), "EGIT");
        assert_eq!(vcs.calls().len(), 1);
    }
}
