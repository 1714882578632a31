// =============================================================================
// Shared domain types used across the ledger engine
// =============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TransactionId = Uuid;
pub type UserId = Uuid;
pub type RecommendationId = Uuid;

/// Who a user is, for role-scoped queries and recommendation targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Dev,
    Boss,
    Employee,
    Investor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dev => write!(f, "dev"),
            Self::Boss => write!(f, "boss"),
            Self::Employee => write!(f, "employee"),
            Self::Investor => write!(f, "investor"),
        }
    }
}

/// Whether a ledger row is money coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Income,
    Expense,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Income => write!(f, "income"),
            Self::Expense => write!(f, "expense"),
        }
    }
}

/// Where a transaction sits in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// The four anomaly kinds the detectors emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ExpenseSpike,
    RevenueDecline,
    CashflowWarning,
    TargetVariance,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpenseSpike => write!(f, "expense_spike"),
            Self::RevenueDecline => write!(f, "revenue_decline"),
            Self::CashflowWarning => write!(f, "cashflow_warning"),
            Self::TargetVariance => write!(f, "target_variance"),
        }
    }
}

impl AnomalyKind {
    /// Roles a recommendation of this kind is targeted at (spec gating step 3).
    pub fn target_roles(&self) -> &'static [Role] {
        match self {
            Self::TargetVariance => &[Role::Boss, Role::Dev, Role::Investor],
            _ => &[Role::Boss, Role::Dev],
        }
    }
}

/// Urgency of a recommendation, also used as a gating floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl Priority {
    /// Glyph used at the head of a rendered message title line.
    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Low => "\u{1f7e2}",
            Self::Medium => "\u{1f7e1}",
            Self::High => "\u{1f7e0}",
            Self::Critical => "\u{1f534}",
        }
    }
}

/// Confidence band used in the rendered message footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    VeryHigh,
    High,
    ModerateHigh,
    Moderate,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => Self::VeryHigh,
            80..=89 => Self::High,
            70..=79 => Self::ModerateHigh,
            60..=69 => Self::Moderate,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryHigh => write!(f, "Very High"),
            Self::High => write!(f, "High"),
            Self::ModerateHigh => write!(f, "Moderate-High"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Low => write!(f, "Low"),
        }
    }
}
