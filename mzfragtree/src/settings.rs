use context_error::{BoxedError, Context, CreateError};
use serde::{Deserialize, Serialize};

use crate::{
    color::ColorSet,
    error::{TreeError, TreeResult},
};

/// The strategy used to build trees
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub enum Strategy {
    /// Exact maximum colorful subtree by dynamic programming over color sets
    #[default]
    DynamicProgramming,
    /// Greedy critical path heuristic, fast but without any optimality guarantee
    Greedy,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::DynamicProgramming => "Dynamic programming",
                Self::Greedy => "Greedy",
            }
        )
    }
}

/// The settings for building trees.
///
/// Design considerations for the settings are as follows:
/// * The size of the tables grows exponentially in `max_colors`, 16 keeps the tables small enough
///   for many thousands of solves per spectrum while most graphs do not need any reduction.
/// * The abort signal is only checked between node tables, the interval should be small enough to
///   react quickly but large enough to not spend time on the atomic load for every node.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderSettings {
    /// The maximal number of working colors, if a graph has more colors the colors with the
    /// lowest information value are relaxed. Has to be between 1 and 64 (inclusive).
    ///
    /// Default: 16.
    pub max_colors: usize,
    /// Check the abort signal every this many node tables. Has to be at least 1.
    ///
    /// Default: 64.
    pub abort_check_interval: usize,
    /// Run the greedy heuristic before the dynamic programming and use its score to raise the
    /// lower bound for pruning.
    ///
    /// Default: true.
    pub greedy_warm_start: bool,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            max_colors: 16,
            abort_check_interval: 64,
            greedy_warm_start: true,
        }
    }
}

impl BuilderSettings {
    /// Check if all settings are in range.
    /// # Errors
    /// [`TreeError::InvalidSettings`] if any setting is out of range.
    pub fn validate(&self) -> TreeResult<()> {
        if !(1..=ColorSet::MAX_COLORS).contains(&self.max_colors) {
            return Err(BoxedError::new(
                TreeError::InvalidSettings,
                "Invalid maximal number of colors",
                format!(
                    "The maximal number of working colors has to be between 1 and {}",
                    ColorSet::MAX_COLORS
                ),
                Context::show(self.max_colors.to_string()),
            ));
        }
        if self.abort_check_interval == 0 {
            return Err(BoxedError::new(
                TreeError::InvalidSettings,
                "Invalid abort check interval",
                "The abort check interval has to be at least 1",
                Context::show(self.abort_check_interval.to_string()),
            ));
        }
        Ok(())
    }

    /// Parse settings from JSON, missing fields get their default value.
    /// # Errors
    /// [`TreeError::InvalidSettings`] if the JSON is malformed or any setting is out of range.
    pub fn from_json(text: &str) -> TreeResult<Self> {
        let settings: Self = serde_json::from_str(text).map_err(|err| {
            BoxedError::new(
                TreeError::InvalidSettings,
                "Invalid builder settings JSON",
                err.to_string(),
                Context::show(text.to_string()),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }
}
