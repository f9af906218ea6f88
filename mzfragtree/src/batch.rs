#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    builder::{PreparedState, TreeBuilder},
    error::TreeResult,
    graph::FragmentationGraph,
    tree::{FragmentationTree, TreeOutcome},
};

impl TreeBuilder {
    /// Build the trees for multiple roots of the same graph. Every root gets its own result, so a
    /// failure for one root does not influence any other root. The results are in the same order
    /// as the roots.
    pub fn build_all(
        &self,
        graph: &FragmentationGraph,
        roots: impl IntoIterator<Item = usize>,
        lower_bound: f64,
        prepared: &PreparedState,
    ) -> Vec<(usize, TreeResult<TreeOutcome>)> {
        roots
            .into_iter()
            .map(|root| (root, self.build(graph, root, lower_bound, prepared)))
            .collect()
    }

    #[cfg(feature = "rayon")]
    /// Build the trees for multiple roots of the same graph in parallel. The results are in the
    /// same order as the roots.
    pub fn par_build_all(
        &self,
        graph: &FragmentationGraph,
        roots: &[usize],
        lower_bound: f64,
        prepared: &PreparedState,
    ) -> Vec<(usize, TreeResult<TreeOutcome>)> {
        roots
            .par_iter()
            .map(|root| (*root, self.build(graph, *root, lower_bound, prepared)))
            .collect()
    }

    /// Build the best tree over all given roots, the roots that fail are skipped. When multiple
    /// roots give the same score the first root wins.
    pub fn best_of(
        &self,
        graph: &FragmentationGraph,
        roots: impl IntoIterator<Item = usize>,
        lower_bound: f64,
        prepared: &PreparedState,
    ) -> Option<FragmentationTree> {
        self.build_all(graph, roots, lower_bound, prepared)
            .into_iter()
            .filter_map(|(_, result)| result.ok().and_then(TreeOutcome::into_tree))
            .fold(None, |best: Option<FragmentationTree>, tree| match best {
                Some(best) if best.score() >= tree.score() => Some(best),
                _ => Some(tree),
            })
    }
}
