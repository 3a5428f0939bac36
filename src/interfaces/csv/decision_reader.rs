use crate::application::engine::DecisionRequest;
use crate::domain::approval::Decision;
use crate::domain::identity::{AccessLevel, Approver};
use crate::domain::payment::PaymentId;
use crate::error::{ApprovalError, Result};
use serde::Deserialize;
use std::io::Read;

/// One approver action as it appears in a decisions CSV.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct DecisionRow {
    pub payment: PaymentId,
    pub approver_email: String,
    pub approver_name: Option<String>,
    pub decision: Decision,
    pub notes: Option<String>,
    /// Temporary access grant; empty for authenticated approvers.
    pub grant: Option<String>,
}

impl DecisionRow {
    /// Splits the row into the arguments of `ApprovalEngine::decide`.
    pub fn into_parts(self) -> Result<(PaymentId, Approver, DecisionRequest)> {
        let access = match self.grant.filter(|g| !g.is_empty()) {
            Some(grant) => AccessLevel::Scoped { grant },
            None => AccessLevel::Direct,
        };
        let approver = Approver::new(&self.approver_email, self.approver_name.as_deref(), access)?;
        let request = DecisionRequest {
            decision: self.decision,
            notes: self.notes,
        };
        Ok((self.payment, approver, request))
    }
}

/// Reads approver decisions from a CSV source.
///
/// Whitespace is trimmed and trailing columns may be omitted.
pub struct DecisionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> DecisionReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a malformed row yields an error without
    /// stopping the stream.
    pub fn decisions(self) -> impl Iterator<Item = Result<DecisionRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ApprovalError::from))
    }
}
