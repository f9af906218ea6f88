use context_error::{BoxedError, Context, CreateError};
use serde::{Deserialize, Serialize};

use crate::{
    abort::AbortSignal,
    bounds::optimistic_below,
    error::{TreeError, TreeResult},
    graph::FragmentationGraph,
    greedy::{critical_paths, greedy_tree},
    helper_functions::below_bound,
    reduction::ColorReduction,
    repair::repair,
    settings::{BuilderSettings, Strategy},
    solver::{ColorfulSubtree, Solution},
    tree::{Degradation, FragmentationTree, Optimality, SolveStatistics, TreeOutcome, tree_score},
};

/// Builds fragmentation trees from fragmentation graphs.
///
/// Building is split in two phases. [`Self::prepare`] does all work that only depends on the
/// graph, and the resulting [`PreparedState`] can then be used by [`Self::build`] for any number
/// of roots and lower bounds, from any number of threads.
/// ```rust
/// use mzfragtree::*;
/// let graph = FragmentationGraph::new(
///     vec![
///         FragmentationNode::new(0.0, 0).as_root(),
///         FragmentationNode::new(2.0, 1),
///         FragmentationNode::new(1.0, 2),
///     ],
///     vec![
///         FragmentationEdge::new(0, 1, -0.5),
///         FragmentationEdge::new(1, 2, 0.5),
///     ],
/// )
/// .unwrap();
/// let builder = TreeBuilder::new(Strategy::DynamicProgramming, BuilderSettings::default()).unwrap();
/// let prepared = builder.prepare(&graph, f64::NEG_INFINITY).unwrap();
/// let tree = builder
///     .build(&graph, 0, f64::NEG_INFINITY, &prepared)
///     .unwrap()
///     .into_tree()
///     .unwrap();
/// assert_eq!(tree.nodes(), [0, 1, 2]);
/// assert!((tree.score() - 3.0).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeBuilder {
    strategy: Strategy,
    settings: BuilderSettings,
}

/// Everything about a graph that can be reused between builds for different roots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreparedState {
    reduction: ColorReduction,
    /// The working color per node
    colors: Vec<Option<u8>>,
    /// The optimistic subtree bound per node, ignoring colors
    below: Vec<f64>,
    /// The best path score per node, for the greedy heuristic
    paths: Vec<f64>,
    lower_bound: f64,
    viable_roots: Vec<usize>,
    /// The shape of the graph this state was prepared for (nodes, edges)
    shape: (usize, usize),
}

impl PreparedState {
    /// The color reduction that is used for this graph
    pub const fn reduction(&self) -> &ColorReduction {
        &self.reduction
    }

    /// Check if the colors of the graph had to be reduced, all trees built with this state will
    /// then be [`Optimality::Degraded`]
    pub fn is_reduced(&self) -> bool {
        self.reduction.is_reduced()
    }

    /// The lower bound this state was prepared with
    pub const fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// All nodes for which a tree could reach the lower bound of preparation
    pub fn viable_roots(&self) -> &[usize] {
        &self.viable_roots
    }

    /// The highest score any tree rooted at the given node could have, ignoring colors
    pub fn optimistic_bound(&self, node: usize) -> Option<f64> {
        self.below.get(node).copied()
    }
}

impl TreeBuilder {
    /// Create a new builder.
    /// # Errors
    /// [`TreeError::InvalidSettings`] if the settings are out of range.
    pub fn new(strategy: Strategy, settings: BuilderSettings) -> TreeResult<Self> {
        settings.validate()?;
        Ok(Self { strategy, settings })
    }

    /// The strategy used by this builder
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The settings used by this builder
    pub const fn settings(&self) -> BuilderSettings {
        self.settings
    }

    /// Prepare a graph for building trees. The lower bound is only used to determine the viable
    /// roots, builds can use any lower bound.
    /// # Errors
    /// [`TreeError::InvalidSettings`] if the lower bound is NaN.
    pub fn prepare(
        &self,
        graph: &FragmentationGraph,
        lower_bound: f64,
    ) -> TreeResult<PreparedState> {
        check_lower_bound(lower_bound)?;
        let reduction = ColorReduction::new(graph, self.settings.max_colors);
        let colors = reduction.node_colors(graph);
        let below = optimistic_below(graph);
        let paths = critical_paths(graph);
        let viable_roots = (0..graph.len())
            .filter(|n| !below_bound(below[*n], lower_bound))
            .collect();
        tracing::debug!(
            nodes = graph.len(),
            edges = graph.edges().len(),
            distinct_colors = reduction.distinct_colors(),
            working_colors = reduction.working_colors(),
            "Prepared fragmentation graph"
        );
        Ok(PreparedState {
            reduction,
            colors,
            below,
            paths,
            lower_bound,
            viable_roots,
            shape: (graph.len(), graph.edges().len()),
        })
    }

    /// Build the best tree for the given root, or prove that no tree reaches the lower bound. Use a
    /// lower bound of negative infinity to always get a tree. Ties in score go to the tree with the
    /// smallest sorted list of nodes.
    ///
    /// [`TreeOutcome::BelowBound`] is only returned when it is proven. If the colors were reduced
    /// the returned tree is [`Optimality::Degraded`], and while its upper bound reaches the lower
    /// bound the tree itself can score below it, so check [`FragmentationTree::score`] when that
    /// matters.
    /// # Errors
    /// * [`TreeError::InvalidRoot`] if the root is not a node of the graph.
    /// * [`TreeError::PreparationMismatch`] if the prepared state was made for another graph.
    /// * [`TreeError::InvalidSettings`] if the lower bound is NaN.
    pub fn build(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
        prepared: &PreparedState,
    ) -> TreeResult<TreeOutcome> {
        self.build_inner(graph, root, lower_bound, prepared, None)
    }

    /// Build the best tree for the given root, but stop early if the signal is aborted.
    /// # Errors
    /// The same as [`Self::build`], and [`TreeError::Aborted`] if the signal was aborted.
    pub fn build_abortable(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
        prepared: &PreparedState,
        abort: &AbortSignal,
    ) -> TreeResult<TreeOutcome> {
        self.build_inner(graph, root, lower_bound, prepared, Some(abort))
    }

    /// Prepare the graph and build the tree for a single root.
    /// # Errors
    /// The same as [`Self::build`].
    pub fn compute(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
    ) -> TreeResult<TreeOutcome> {
        let prepared = self.prepare(graph, lower_bound)?;
        self.build(graph, root, lower_bound, &prepared)
    }

    fn build_inner(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
        prepared: &PreparedState,
        abort: Option<&AbortSignal>,
    ) -> TreeResult<TreeOutcome> {
        check_lower_bound(lower_bound)?;
        if root >= graph.len() {
            return Err(BoxedError::new(
                TreeError::InvalidRoot,
                "Invalid root",
                format!("The root has to be one of the {} nodes of the graph", graph.len()),
                Context::show(root.to_string()),
            ));
        }
        if prepared.shape != (graph.len(), graph.edges().len()) {
            return Err(BoxedError::new(
                TreeError::PreparationMismatch,
                "Prepared state does not match graph",
                format!(
                    "The state was prepared for a graph with {} nodes and {} edges, but this graph has {} nodes and {} edges",
                    prepared.shape.0,
                    prepared.shape.1,
                    graph.len(),
                    graph.edges().len()
                ),
                Context::none(),
            ));
        }

        let outcome = match self.strategy {
            Strategy::Greedy => Ok(self.greedy(graph, root, lower_bound, prepared)),
            Strategy::DynamicProgramming => {
                self.dynamic_programming(graph, root, lower_bound, prepared, abort)
            }
        }?;
        match &outcome {
            TreeOutcome::Found(tree) => tracing::debug!(
                root,
                score = tree.score(),
                nodes = tree.len(),
                optimality = ?tree.optimality(),
                "Built fragmentation tree"
            ),
            TreeOutcome::BelowBound => {
                tracing::debug!(root, lower_bound, "No tree reaches the lower bound");
            }
        }
        Ok(outcome)
    }

    fn greedy(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
        prepared: &PreparedState,
    ) -> TreeOutcome {
        let upper_bound = prepared.below[root];
        if below_bound(upper_bound, lower_bound) {
            return TreeOutcome::BelowBound;
        }
        let statistics = SolveStatistics {
            reachable: graph.reachable_from(root).iter().filter(|r| **r).count(),
            ..SolveStatistics::default()
        };
        TreeOutcome::Found(FragmentationTree::from_edges(
            graph,
            root,
            greedy_tree(graph, root, &prepared.paths),
            Optimality::Heuristic { upper_bound },
            statistics,
        ))
    }

    fn dynamic_programming(
        &self,
        graph: &FragmentationGraph,
        root: usize,
        lower_bound: f64,
        prepared: &PreparedState,
        abort: Option<&AbortSignal>,
    ) -> TreeResult<TreeOutcome> {
        let reduced = prepared.is_reduced();
        // The greedy tree is valid so the optimum scores at least as high
        let greedy = (self.settings.greedy_warm_start || reduced).then(|| {
            let edges = greedy_tree(graph, root, &prepared.paths);
            let score = tree_score(graph, root, edges.iter().copied());
            (edges, score)
        });
        let effective_bound = match &greedy {
            Some((_, score)) if self.settings.greedy_warm_start => lower_bound.max(*score),
            _ => lower_bound,
        };
        let degradation = |upper_bound| {
            Optimality::Degraded(Degradation {
                upper_bound,
                distinct_colors: prepared.reduction.distinct_colors(),
                working_colors: prepared.reduction.working_colors(),
            })
        };

        let solution = ColorfulSubtree {
            graph,
            colors: &prepared.colors,
            below: &prepared.below,
            abort,
            abort_check_interval: self.settings.abort_check_interval,
        }
        .solve(root, effective_bound)?;

        Ok(match solution {
            Solution::BelowBound(statistics) => match greedy {
                // Nothing beats the greedy tree, so it is the best tree
                Some((edges, score)) if !below_bound(score, lower_bound) => {
                    let optimality = if reduced {
                        degradation(score)
                    } else {
                        Optimality::Exact
                    };
                    TreeOutcome::Found(FragmentationTree::from_edges(
                        graph, root, edges, optimality, statistics,
                    ))
                }
                _ => TreeOutcome::BelowBound,
            },
            Solution::Found {
                occurrences,
                statistics,
                ..
            } if !reduced => TreeOutcome::Found(FragmentationTree::from_edges(
                graph,
                root,
                occurrences.iter().filter_map(|o| o.edge),
                Optimality::Exact,
                statistics,
            )),
            Solution::Found {
                occurrences,
                score,
                statistics,
            } => {
                let repaired = repair(graph, root, &occurrences);
                let repaired_score = tree_score(graph, root, repaired.iter().copied());
                let edges = match greedy {
                    Some((edges, greedy_score)) if greedy_score > repaired_score => edges,
                    _ => repaired,
                };
                TreeOutcome::Found(FragmentationTree::from_edges(
                    graph,
                    root,
                    edges,
                    degradation(score),
                    statistics,
                ))
            }
        })
    }
}

fn check_lower_bound(lower_bound: f64) -> TreeResult<()> {
    if lower_bound.is_nan() {
        Err(BoxedError::new(
            TreeError::InvalidSettings,
            "Invalid lower bound",
            "The lower bound cannot be NaN, use negative infinity to disable the lower bound",
            Context::none(),
        ))
    } else {
        Ok(())
    }
}
