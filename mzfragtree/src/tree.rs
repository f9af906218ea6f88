use std::fmt::{Display, Write};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::graph::FragmentationGraph;

/// The outcome of building a tree for a single root.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum TreeOutcome {
    /// A tree was found
    Found(FragmentationTree),
    /// It is proven that no colorful tree for this root reaches the lower bound
    BelowBound,
}

impl TreeOutcome {
    /// Get the tree, if any
    pub const fn tree(&self) -> Option<&FragmentationTree> {
        match self {
            Self::Found(tree) => Some(tree),
            Self::BelowBound => None,
        }
    }

    /// Get the tree, if any
    pub fn into_tree(self) -> Option<FragmentationTree> {
        match self {
            Self::Found(tree) => Some(tree),
            Self::BelowBound => None,
        }
    }

    /// Check if this outcome is below the lower bound
    pub const fn is_below_bound(&self) -> bool {
        matches!(self, Self::BelowBound)
    }
}

/// How good the tree is guaranteed to be
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Optimality {
    /// The tree is a maximum colorful subtree
    #[default]
    Exact,
    /// The colors had to be reduced, the tree is valid but not guaranteed to be optimal
    Degraded(Degradation),
    /// The tree was made by the greedy heuristic, the upper bound ignores colors
    Heuristic {
        /// No tree for this root can score higher than this
        upper_bound: f64,
    },
}

/// The details of a solve on a reduced color alphabet
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Degradation {
    /// The optimal score under the reduced colors, no tree under the original colors can score higher
    pub upper_bound: f64,
    /// The number of distinct colors in the graph
    pub distinct_colors: usize,
    /// The number of working colors that were kept
    pub working_colors: usize,
}

/// Statistics about a single solve
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SolveStatistics {
    /// The number of nodes reachable from the root
    pub reachable: usize,
    /// The number of nodes for which a table was built
    pub processed: usize,
    /// The number of nodes skipped because they cannot reach the lower bound
    pub pruned: usize,
    /// The total number of table cells
    pub cells: usize,
}

/// A selected loss in a fragmentation tree
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct TreeEdge {
    /// The child node, first so that ordering sorts on child
    pub target: usize,
    /// The parent node
    pub source: usize,
    /// The index of the edge in the graph
    pub index: usize,
}

/// A fragmentation tree, a colorful subtree of a fragmentation graph. Every selected node except
/// the root has exactly one selected incoming edge, whose source is selected as well.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FragmentationTree {
    root: usize,
    nodes: Vec<usize>,
    edges: Vec<TreeEdge>,
    score: f64,
    optimality: Optimality,
    statistics: SolveStatistics,
}

impl FragmentationTree {
    /// Create a tree from the selected edge indices, the score is the sum of the node and edge scores.
    pub(crate) fn from_edges(
        graph: &FragmentationGraph,
        root: usize,
        edges: impl IntoIterator<Item = usize>,
        optimality: Optimality,
        statistics: SolveStatistics,
    ) -> Self {
        let edges = edges
            .into_iter()
            .map(|index| {
                let edge = &graph.edges()[index];
                TreeEdge {
                    target: edge.target,
                    source: edge.source,
                    index,
                }
            })
            .sorted()
            .collect_vec();
        let nodes = std::iter::once(root)
            .chain(edges.iter().map(|e| e.target))
            .sorted()
            .collect_vec();
        let score = tree_score(graph, root, edges.iter().map(|e| e.index));
        Self {
            root,
            nodes,
            edges,
            score,
            optimality,
            statistics,
        }
    }

    /// The root
    pub const fn root(&self) -> usize {
        self.root
    }

    /// All selected nodes, in ascending order, the root included
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// All selected edges, in ascending order of child node
    pub fn edges(&self) -> &[TreeEdge] {
        &self.edges
    }

    /// The total score, the sum of all selected node and edge scores
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// The optimality guarantee for this tree
    pub const fn optimality(&self) -> Optimality {
        self.optimality
    }

    /// Check if the colors had to be reduced to build this tree
    pub const fn is_degraded(&self) -> bool {
        matches!(self.optimality, Optimality::Degraded(_))
    }

    /// Check if this tree is guaranteed to be optimal
    pub const fn is_exact(&self) -> bool {
        matches!(self.optimality, Optimality::Exact)
    }

    /// The highest score any tree for this root could have, for exact trees this is the score itself
    pub const fn upper_bound(&self) -> f64 {
        match self.optimality {
            Optimality::Exact => self.score,
            Optimality::Degraded(Degradation { upper_bound, .. })
            | Optimality::Heuristic { upper_bound } => upper_bound,
        }
    }

    /// The statistics of the solve that made this tree
    pub const fn statistics(&self) -> SolveStatistics {
        self.statistics
    }

    /// The number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always contains its root
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check if the node is selected
    pub fn contains(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    /// The selected edge into this node, `None` for the root and unselected nodes
    pub fn parent_edge(&self, node: usize) -> Option<&TreeEdge> {
        self.edges
            .binary_search_by_key(&node, |e| e.target)
            .ok()
            .map(|i| &self.edges[i])
    }

    /// The selected edges out of this node, in ascending order of child
    pub fn children(&self, node: usize) -> impl Iterator<Item = &TreeEdge> + '_ {
        self.edges.iter().filter(move |e| e.source == node)
    }

    /// Show this tree as an indented list of fragments
    pub fn display<'a>(&'a self, graph: &'a FragmentationGraph) -> impl Display + 'a {
        TreeDisplay { tree: self, graph }
    }
}

/// The sum of the root score and the score of every edge and its target
pub(crate) fn tree_score(
    graph: &FragmentationGraph,
    root: usize,
    edges: impl IntoIterator<Item = usize>,
) -> f64 {
    graph.nodes()[root].score
        + edges
            .into_iter()
            .map(|e| {
                let edge = &graph.edges()[e];
                edge.score + graph.nodes()[edge.target].score
            })
            .sum::<f64>()
}

struct TreeDisplay<'a> {
    tree: &'a FragmentationTree,
    graph: &'a FragmentationGraph,
}

impl Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = |node: usize| {
            let mut text = node.to_string();
            if let Some(label) = self.graph.node(node).and_then(|n| n.label.as_deref()) {
                write!(&mut text, " [{label}]").unwrap_or_default();
            }
            text
        };
        writeln!(
            f,
            "{} score {:.4} (total {:.4})",
            label(self.tree.root),
            self.graph.nodes()[self.tree.root].score,
            self.tree.score
        )?;
        let mut stack = self
            .tree
            .children(self.tree.root)
            .rev()
            .map(|e| (e, 1))
            .collect_vec();
        while let Some((edge, depth)) = stack.pop() {
            writeln!(
                f,
                "{:width$}{:+.4} -> {} score {:.4}",
                "",
                self.graph.edges()[edge.index].score,
                label(edge.target),
                self.graph.nodes()[edge.target].score,
                width = depth * 2
            )?;
            stack.extend(self.tree.children(edge.target).rev().map(|e| (e, depth + 1)));
        }
        Ok(())
    }
}
