use serde::{Deserialize, Serialize};
use std::fmt;

/// Production stage of a piece. Variants are declared in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Wedging,
    Throwing,
    Trimming,
    Drying,
    Bisque,
    Glazing,
    Firing,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Wedging,
        Stage::Throwing,
        Stage::Trimming,
        Stage::Drying,
        Stage::Bisque,
        Stage::Glazing,
        Stage::Firing,
        Stage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Wedging => "wedging",
            Stage::Throwing => "throwing",
            Stage::Trimming => "trimming",
            Stage::Drying => "drying",
            Stage::Bisque => "bisque",
            Stage::Glazing => "glazing",
            Stage::Firing => "firing",
            Stage::Complete => "complete",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Wedging => "Wedging",
            Stage::Throwing => "Throwing",
            Stage::Trimming => "Trimming",
            Stage::Drying => "Drying",
            Stage::Bisque => "Bisque",
            Stage::Glazing => "Glazing",
            Stage::Firing => "Firing",
            Stage::Complete => "Complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s.trim().to_lowercase())
    }

    /// Position in the pipeline, starting at 0
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The following stage, `None` once the piece is complete
    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Wedging
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}
