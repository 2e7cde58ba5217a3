use enumset::EnumSet;
use std::{
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};
use crate::{
    approval::*,
    error::ValueError,
};

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(*self))
    }
}

impl From<InstanceStatus> for &'static str {
    fn from(status: InstanceStatus) -> &'static str {
        match status {
            InstanceStatus::Active => "active",
            InstanceStatus::Completed => "completed",
            InstanceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InstanceStatus {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "active" => Ok(InstanceStatus::Active),
            "completed" => Ok(InstanceStatus::Completed),
            "cancelled" => Ok(InstanceStatus::Cancelled),
            s => Err(ValueError::Unsupported(s.to_string())),
        }
    }
}

impl InstanceStatus {
    /// Completed and cancelled instances never change again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", <&'static str>::from(*self))
    }
}

impl From<StepStatus> for &'static str {
    fn from(status: StepStatus) -> &'static str {
        match status {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
            StepStatus::Delegated => "delegated",
            StepStatus::Timeout => "timeout",
        }
    }
}

impl FromStr for StepStatus {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_ref() {
            "pending" => Ok(StepStatus::Pending),
            "approved" => Ok(StepStatus::Approved),
            "rejected" => Ok(StepStatus::Rejected),
            "delegated" => Ok(StepStatus::Delegated),
            "timeout" => Ok(StepStatus::Timeout),
            s => Err(ValueError::Unsupported(s.to_string())),
        }
    }
}

impl StepStatus {
    /// The statuses a step may be closed with.
    pub fn terminal() -> EnumSet<StepStatus> {
        EnumSet::all() - StepStatus::Pending
    }

    /// The outcome recorded on a step when an action is executed
    /// against it.  Only the canonical action keys are mapped.
    pub fn from_action_key(action_key: &str) -> Result<Self, ValueError> {
        match action_key {
            "approve" => Ok(StepStatus::Approved),
            "reject" => Ok(StepStatus::Rejected),
            "delegate" => Ok(StepStatus::Delegated),
            s => Err(ValueError::UnmappedAction(s.to_string())),
        }
    }
}

impl ApprovalInstance {
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }
}

impl ApprovalStep {
    /// The delegate if one is set, otherwise the original assignee.
    pub fn effective_assignee(&self) -> i64 {
        self.delegated_to.unwrap_or(self.assigned_to)
    }

    pub fn can_be_completed_by(&self, user_id: i64) -> bool {
        self.effective_assignee() == user_id
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_overdue(&self, now: i64) -> bool {
        self.is_pending() && self.due_ts.is_some_and(|due| due < now)
    }

    /// Seconds from assignment to completion, once completed.
    pub fn duration(&self) -> Option<i64> {
        self.completed_ts.map(|ts| ts - self.assigned_ts)
    }
}

/// Shallow merge; keys in `update` replace those in `base`.
pub fn merge_metadata(base: &Metadata, update: Option<&Metadata>) -> Metadata {
    let mut result = base.clone();
    if let Some(update) = update {
        result.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    result
}

impl From<Vec<ApprovalStep>> for ApprovalSteps {
    fn from(steps: Vec<ApprovalStep>) -> Self {
        Self(steps)
    }
}

impl<const N: usize> From<[ApprovalStep; N]> for ApprovalSteps {
    fn from(steps: [ApprovalStep; N]) -> Self {
        Self(steps.into())
    }
}

impl From<ApprovalSteps> for Vec<ApprovalStep> {
    fn from(value: ApprovalSteps) -> Self {
        value.0
    }
}

impl Deref for ApprovalSteps {
    type Target = Vec<ApprovalStep>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ApprovalSteps {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
