//! TOML description of projects, their approval policy and the payments
//! submitted against them.

use crate::application::engine::ApprovalEngine;
use crate::domain::approval::ApproverEmail;
use crate::domain::config::{ApprovalPolicy, ProjectApprovalConfig, ProjectApprover};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus, ProjectId};
use crate::domain::ports::ApprovalConfigStore;
use crate::error::{ApprovalError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ApproverEntry {
    pub email: ApproverEmail,
    pub name: Option<String>,
    pub order: u32,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ProjectEntry {
    pub id: ProjectId,
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,
    #[serde(default)]
    pub approval_order_matters: bool,
    #[serde(default)]
    pub approvers: Vec<ApproverEntry>,
}

fn default_required_approvals() -> u32 {
    1
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct PaymentEntry {
    pub id: PaymentId,
    pub project: ProjectId,
    pub period: String,
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
pub struct ProjectFile {
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub payments: Vec<PaymentEntry>,
}

impl ProjectFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content)?;
        if let Some(project) = file.projects.iter().find(|p| p.required_approvals == 0) {
            return Err(ApprovalError::ValidationError(format!(
                "Project {} requires at least one approval",
                project.id
            )));
        }
        Ok(file)
    }

    /// Writes every project's approval configuration, registers the payments
    /// that are not stored yet and submits the pending ones for approval.
    ///
    /// Returns the number of payments submitted.
    pub async fn load_into(
        &self,
        configs: &dyn ApprovalConfigStore,
        engine: &ApprovalEngine,
    ) -> Result<usize> {
        for project in &self.projects {
            configs
                .put(ProjectApprovalConfig {
                    project: project.id,
                    policy: ApprovalPolicy {
                        required_approvals: project.required_approvals,
                        order_matters: project.approval_order_matters,
                    },
                    approvers: project
                        .approvers
                        .iter()
                        .map(|a| ProjectApprover {
                            email: a.email.clone(),
                            name: a.name.clone(),
                            order: a.order,
                        })
                        .collect(),
                })
                .await?;
        }

        let mut submitted = 0;
        for entry in &self.payments {
            let payment = Payment::new(entry.id, entry.project, &entry.period, entry.total_amount)?;
            engine.register_payment(payment).await?;
            if engine.payment(entry.id).await?.status == PaymentStatus::Pendiente {
                engine.submit_for_approval(entry.id).await?;
                submitted += 1;
            }
        }
        tracing::debug!(projects = self.projects.len(), submitted, "project file loaded");
        Ok(submitted)
    }
}
