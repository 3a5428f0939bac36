use super::approval::ApproverEmail;
use super::payment::ProjectId;
use serde::{Deserialize, Serialize};

/// How many approvals a project requires and whether approval order matters.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct ApprovalPolicy {
    pub required_approvals: u32,
    /// Read from configuration but not enforced when decisions are recorded.
    pub order_matters: bool,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            required_approvals: 1,
            order_matters: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProjectApprover {
    pub email: ApproverEmail,
    pub name: Option<String>,
    pub order: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProjectApprovalConfig {
    pub project: ProjectId,
    pub policy: ApprovalPolicy,
    pub approvers: Vec<ProjectApprover>,
}
