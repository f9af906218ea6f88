#![doc = include_str!("../README.md")]
//!
//! # Features
//! * `rayon` (default) adds [`TreeBuilder::par_build_all`] to build trees for many roots in
//!   parallel.
#[cfg(test)]
use rand as _;
#[cfg(test)]
use tracing_subscriber as _;

mod abort;
mod batch;
mod bounds;
mod builder;
mod color;
mod error;
mod graph;
mod greedy;
mod helper_functions;
mod piece;
mod reduction;
mod repair;
mod settings;
mod solver;
mod table;
mod tree;

pub use abort::AbortSignal;
pub use builder::{PreparedState, TreeBuilder};
pub use color::ColorSet;
pub use error::{TreeError, TreeResult};
pub use graph::{FragmentationEdge, FragmentationGraph, FragmentationNode};
pub use helper_functions::SCORE_EPSILON;
pub use reduction::ColorReduction;
pub use settings::{BuilderSettings, Strategy};
pub use tree::{
    Degradation, FragmentationTree, Optimality, SolveStatistics, TreeEdge, TreeOutcome,
};

/// The types that are needed for most uses of this crate
pub mod prelude {
    pub use crate::{
        BuilderSettings, FragmentationEdge, FragmentationGraph, FragmentationNode,
        FragmentationTree, Strategy, TreeBuilder, TreeOutcome,
    };
}
