//! Discrete optimization actions and their semantic payload

use serde::{Deserialize, Serialize};

use adopt_core::{AdoptError, Result};

/// Optimization the learner can recommend for a campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationAction {
    BudgetIncrease,
    BudgetDecrease,
    AudienceExpand,
    AudienceNarrow,
    CreativeRefresh,
    BidIncrease,
    BidDecrease,
    ScheduleOptimize,
    PlatformShift,
    NoChange,
}

impl OptimizationAction {
    /// Every action in index order
    pub const ALL: [OptimizationAction; 10] = [
        OptimizationAction::BudgetIncrease,
        OptimizationAction::BudgetDecrease,
        OptimizationAction::AudienceExpand,
        OptimizationAction::AudienceNarrow,
        OptimizationAction::CreativeRefresh,
        OptimizationAction::BidIncrease,
        OptimizationAction::BidDecrease,
        OptimizationAction::ScheduleOptimize,
        OptimizationAction::PlatformShift,
        OptimizationAction::NoChange,
    ];

    /// Convert action to index for the discrete action space
    pub fn to_index(self) -> usize {
        match self {
            OptimizationAction::BudgetIncrease => 0,
            OptimizationAction::BudgetDecrease => 1,
            OptimizationAction::AudienceExpand => 2,
            OptimizationAction::AudienceNarrow => 3,
            OptimizationAction::CreativeRefresh => 4,
            OptimizationAction::BidIncrease => 5,
            OptimizationAction::BidDecrease => 6,
            OptimizationAction::ScheduleOptimize => 7,
            OptimizationAction::PlatformShift => 8,
            OptimizationAction::NoChange => 9,
        }
    }

    /// Create action from index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Number of discrete actions
    pub const fn action_space_size() -> usize {
        10
    }

    /// Parameter handed to the platform adapter that executes the action
    pub fn value(self) -> OptimizationValue {
        match self {
            OptimizationAction::BudgetIncrease => OptimizationValue::Factor(1.1),
            OptimizationAction::BudgetDecrease => OptimizationValue::Factor(0.9),
            OptimizationAction::AudienceExpand => OptimizationValue::directive("broader"),
            OptimizationAction::AudienceNarrow => OptimizationValue::directive("narrower"),
            OptimizationAction::CreativeRefresh => OptimizationValue::directive("new_variation"),
            OptimizationAction::BidIncrease => OptimizationValue::Factor(1.2),
            OptimizationAction::BidDecrease => OptimizationValue::Factor(0.8),
            OptimizationAction::ScheduleOptimize => OptimizationValue::directive("peak_hours"),
            OptimizationAction::PlatformShift => {
                OptimizationValue::directive("better_performing")
            }
            OptimizationAction::NoChange => OptimizationValue::directive("maintain"),
        }
    }

    pub fn describe(self) -> Optimization {
        Optimization {
            kind: self,
            value: self.value(),
        }
    }
}

impl std::fmt::Display for OptimizationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OptimizationAction::BudgetIncrease => "budget_increase",
            OptimizationAction::BudgetDecrease => "budget_decrease",
            OptimizationAction::AudienceExpand => "audience_expand",
            OptimizationAction::AudienceNarrow => "audience_narrow",
            OptimizationAction::CreativeRefresh => "creative_refresh",
            OptimizationAction::BidIncrease => "bid_increase",
            OptimizationAction::BidDecrease => "bid_decrease",
            OptimizationAction::ScheduleOptimize => "schedule_optimize",
            OptimizationAction::PlatformShift => "platform_shift",
            OptimizationAction::NoChange => "no_change",
        };
        write!(f, "{name}")
    }
}

/// Either a multiplicative factor or a named directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptimizationValue {
    Factor(f64),
    Directive(String),
}

impl OptimizationValue {
    fn directive(name: &str) -> Self {
        OptimizationValue::Directive(name.to_string())
    }
}

/// `{type, value}` descriptor returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    #[serde(rename = "type")]
    pub kind: OptimizationAction,
    pub value: OptimizationValue,
}

/// Immutable index -> optimization table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSpace;

impl ActionSpace {
    pub const SIZE: usize = OptimizationAction::action_space_size();

    pub fn size(self) -> usize {
        Self::SIZE
    }

    /// Descriptor for `index`; an index outside the table is a caller bug
    pub fn describe(self, index: usize) -> Result<Optimization> {
        OptimizationAction::from_index(index)
            .map(OptimizationAction::describe)
            .ok_or(AdoptError::InvalidAction {
                index,
                action_count: Self::SIZE,
            })
    }

    /// Descriptor for `index`, treating unknown indices as "no change"
    pub fn describe_or_no_change(self, index: usize) -> Optimization {
        OptimizationAction::from_index(index)
            .unwrap_or(OptimizationAction::NoChange)
            .describe()
    }
}
