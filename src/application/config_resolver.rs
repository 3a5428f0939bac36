use crate::domain::config::{ApprovalPolicy, ProjectApprover};
use crate::domain::payment::ProjectId;
use crate::domain::ports::ApprovalConfigStoreRef;
use crate::error::Result;

/// Resolves the approval policy that applies to a project.
///
/// Absence of configuration is not an error: a project without a row gets
/// the single-approver default.
#[derive(Clone)]
pub struct ConfigResolver {
    configs: ApprovalConfigStoreRef,
}

impl ConfigResolver {
    pub fn new(configs: ApprovalConfigStoreRef) -> Self {
        Self { configs }
    }

    pub async fn resolve(&self, project: ProjectId) -> Result<ApprovalPolicy> {
        let Some(config) = self.configs.get(project).await? else {
            tracing::debug!(project, "no approval config, using default policy");
            return Ok(ApprovalPolicy::default());
        };

        let mut policy = config.policy;
        if policy.required_approvals == 0 {
            tracing::warn!(project, "required_approvals is 0, treating as 1");
            policy.required_approvals = 1;
        }
        Ok(policy)
    }

    /// Configured approvers in approval order.
    pub async fn approvers(&self, project: ProjectId) -> Result<Vec<ProjectApprover>> {
        let mut approvers = self
            .configs
            .get(project)
            .await?
            .map(|config| config.approvers)
            .unwrap_or_default();
        approvers.sort_by_key(|a| a.order);
        Ok(approvers)
    }
}
