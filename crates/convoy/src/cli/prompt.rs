//! Interactive confirmation

use std::collections::HashMap;

use dialoguer::Confirm;

use convoy_core::error::{ConvoyError, Result};
use convoy_core::monorepo::versioning::VersionPlan;
use convoy_core::traits::Confirmation;

use super::output::{header, plan_lines};

/// Shows the planned versions and asks before going on
pub struct PromptConfirm {
    current: HashMap<String, Option<String>>,
}

impl PromptConfirm {
    /// `current` maps package names to their manifest versions
    pub fn new(current: HashMap<String, Option<String>>) -> Self {
        Self { current }
    }
}

impl Confirmation for PromptConfirm {
    fn confirm(&self, plan: &VersionPlan) -> Result<bool> {
        println!();
        println!("{}", header("Changes:"));
        for line in plan_lines(plan, |name| self.current.get(name).cloned().flatten()) {
            println!("{line}");
        }
        println!();

        Confirm::new()
            .with_prompt("Are you sure you want to release these changes?")
            .default(false)
            .interact()
            .map_err(|e| ConvoyError::other(e.to_string()))
    }
}
