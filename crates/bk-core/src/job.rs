// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job entity: an opaque unit of work acquired from the control plane.

use crate::define_id;
use crate::environment::Environment;
use crate::plugin::PluginSpec;

define_id! {
    /// Opaque job identifier as assigned by the control plane.
    pub struct JobId("job-");
}

/// Step metadata delivered with the job: the literal command, the plugin
/// list, and (in signed-step mode) the fields the control plane signed.
#[derive(Debug, Clone, Default)]
pub struct StepMetadata {
    pub command: Option<String>,
    pub plugins: Vec<PluginSpec>,
    /// Present when the job was delivered with a signed step. Maps field
    /// name (e.g. `"command"`) to the signed value, for the consistency
    /// check against the delivered command.
    pub signed_fields: std::collections::HashMap<String, String>,
}

/// A unit of work dispatched by the control plane.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub initial_environment: Environment,
    pub step: StepMetadata,
    pub chunk_size_limit: usize,
}

impl Job {
    pub fn new(id: JobId, initial_environment: Environment, step: StepMetadata) -> Self {
        Self {
            id,
            initial_environment,
            step,
            chunk_size_limit: crate::config::DEFAULT_CHUNK_SIZE,
        }
    }

    /// True unless the signed field set includes `command` and it differs
    /// from the job's delivered command.
    pub fn signed_step_is_consistent(&self) -> bool {
        match (self.step.signed_fields.get("command"), &self.step.command) {
            (Some(signed), Some(delivered)) => signed == delivered,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_has_expected_prefix() {
        let id = JobId::new();
        assert!(id.as_str().starts_with("job-"));
    }

    #[test]
    fn consistent_when_no_signed_command() {
        let job = Job::new(
            JobId::new(),
            Environment::new(),
            StepMetadata { command: Some("true".into()), ..Default::default() },
        );
        assert!(job.signed_step_is_consistent());
    }

    #[test]
    fn consistent_when_signed_matches_delivered() {
        let mut step = StepMetadata { command: Some("true".into()), ..Default::default() };
        step.signed_fields.insert("command".into(), "true".into());
        let job = Job::new(JobId::new(), Environment::new(), step);
        assert!(job.signed_step_is_consistent());
    }

    #[test]
    fn inconsistent_when_signed_differs_from_delivered() {
        let mut step = StepMetadata { command: Some("rm -rf /".into()), ..Default::default() };
        step.signed_fields.insert("command".into(), "true".into());
        let job = Job::new(JobId::new(), Environment::new(), step);
        assert!(!job.signed_step_is_consistent());
    }
}
