use context_error::{BoxedError, Context, CreateError};
use itertools::Itertools;

use crate::{
    abort::AbortSignal,
    bounds::optimistic_outside,
    color::ColorSet,
    error::{TreeError, TreeResult},
    graph::FragmentationGraph,
    helper_functions::{below_bound, same_score},
    piece::{Piece, branches},
    repair::Occurrence,
    table::ColorTable,
    tree::SolveStatistics,
};

/// The maximum colorful subtree solver for a single graph with fixed working colors.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColorfulSubtree<'a> {
    pub(crate) graph: &'a FragmentationGraph,
    /// The working color for every node, `None` for relaxed nodes
    pub(crate) colors: &'a [Option<u8>],
    /// The optimistic subtree bound for every node
    pub(crate) below: &'a [f64],
    pub(crate) abort: Option<&'a AbortSignal>,
    pub(crate) abort_check_interval: usize,
}

/// The raw result of a solve
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Solution {
    BelowBound(SolveStatistics),
    Found {
        /// The tree in pre order, if relaxed colors were used nodes can occur more than once
        occurrences: Vec<Occurrence>,
        score: f64,
        statistics: SolveStatistics,
    },
}

impl ColorfulSubtree<'_> {
    /// Find the highest scoring colorful subtree rooted at the given node, or prove that no
    /// subtree reaches the lower bound.
    ///
    /// The nodes reachable from the root are handled in reverse topological order. For every
    /// node a table is built that maps color sets to the best subtree with exactly those colors.
    /// It starts with just the node, then for every outgoing edge the child entries without the
    /// color of the node become branches, and every branch is combined with every entry that
    /// has disjoint colors. Nodes that cannot be part of any tree reaching the lower bound, even
    /// when ignoring colors, are skipped.
    ///
    /// Trees with the same score are ordered on their sorted list of nodes, the smallest one is
    /// returned.
    /// # Errors
    /// [`TreeError::Aborted`] if the abort signal was raised during the solve.
    pub(crate) fn solve(&self, root: usize, lower_bound: f64) -> TreeResult<Solution> {
        let graph = self.graph;
        let reachable = graph.reachable_from(root);
        let mut statistics = SolveStatistics {
            reachable: reachable.iter().filter(|r| **r).count(),
            ..SolveStatistics::default()
        };
        if below_bound(self.below[root], lower_bound) {
            tracing::trace!(
                root,
                bound = self.below[root],
                lower_bound,
                "Root cannot reach the lower bound"
            );
            return Ok(Solution::BelowBound(statistics));
        }

        let outside = optimistic_outside(graph, root, &reachable, self.below);
        let mut tables: Vec<Option<ColorTable>> = vec![None; graph.len()];
        for (step, &node) in graph
            .topological_order()
            .iter()
            .rev()
            .filter(|n| reachable[**n])
            .enumerate()
        {
            if step % self.abort_check_interval == 0
                && self.abort.is_some_and(AbortSignal::is_aborted)
            {
                return Err(BoxedError::new(
                    TreeError::Aborted,
                    "Solve aborted",
                    format!(
                        "The solve for root {root} was aborted after {step} of {} nodes",
                        statistics.reachable
                    ),
                    Context::none(),
                ));
            }
            if below_bound(outside[node] + self.below[node], lower_bound) {
                statistics.pruned += 1;
                continue;
            }
            let table = self.node_table(node, &tables);
            statistics.processed += 1;
            statistics.cells += table.len();
            tables[node] = Some(table);
        }

        let Some(best) = tables[root].as_ref().and_then(ColorTable::best_score) else {
            return Ok(Solution::BelowBound(statistics));
        };
        if below_bound(best, lower_bound) {
            tracing::trace!(root, best, lower_bound, "Optimum is below the lower bound");
            return Ok(Solution::BelowBound(statistics));
        }
        let occurrences = tables[root]
            .iter()
            .flat_map(ColorTable::iter)
            .filter(|(_, cell)| same_score(cell.score, best))
            .map(|(colors, _)| self.expand(&tables, root, colors))
            .min_by_key(|occurrences| occurrences.iter().map(|o| o.node).sorted().collect_vec())
            .unwrap_or_default();
        tracing::trace!(
            root,
            best,
            processed = statistics.processed,
            pruned = statistics.pruned,
            cells = statistics.cells,
            "Solved colorful subtree"
        );
        Ok(Solution::Found {
            occurrences,
            score: best,
            statistics,
        })
    }

    /// Build the table for a single node, all tables of its children have to be finished
    fn node_table(&self, node: usize, tables: &[Option<ColorTable>]) -> ColorTable {
        let own = self.colors[node];
        let mut table = ColorTable::seed(
            own.map_or(ColorSet::EMPTY, ColorSet::single),
            self.graph.nodes()[node].score,
        );
        for &e in self.graph.outgoing(node) {
            let edge = &self.graph.edges()[e];
            let Some(child) = &tables[edge.target] else {
                continue;
            };
            // A branch that lowers the score is dominated by the entry without it, branches
            // adding exactly nothing are kept as they can win a tie
            let candidates = child
                .iter()
                .filter(|(colors, _)| own.is_none_or(|c| !colors.contains(c)))
                .map(|(colors, cell)| (colors, cell.score + edge.score))
                .filter(|(_, score)| *score >= 0.0)
                .collect_vec();
            if candidates.is_empty() {
                continue;
            }
            let snapshot = table.snapshot();
            for (child_colors, branch_score) in candidates {
                for &(colors, score, previous) in &snapshot {
                    if colors.is_disjoint(child_colors) {
                        table.offer(
                            colors | child_colors,
                            score + branch_score,
                            Piece::new(e, child_colors, previous),
                            |pieces, current| {
                                let candidate = std::iter::once((e, child_colors))
                                    .chain(branches(pieces, previous));
                                self.subtree_nodes(tables, node, candidate)
                                    < self.subtree_nodes(tables, node, branches(pieces, current))
                            },
                        );
                    }
                }
            }
        }
        table
    }

    /// The sorted nodes of the subtree made of the node with the given branches. For entries
    /// with the same colors these lists have the same length, so their order is kept when the
    /// same disjoint branches are added to both.
    fn subtree_nodes(
        &self,
        tables: &[Option<ColorTable>],
        node: usize,
        node_branches: impl Iterator<Item = (usize, ColorSet)>,
    ) -> Vec<usize> {
        let mut nodes = vec![node];
        let mut stack = node_branches.collect_vec();
        while let Some((e, colors)) = stack.pop() {
            let target = self.graph.edges()[e].target;
            nodes.push(target);
            if let Some(table) = &tables[target]
                && let Some(cell) = table.get(colors)
            {
                stack.extend(branches(table.pieces(), cell.piece));
            }
        }
        nodes.sort_unstable();
        nodes
    }

    /// Reconstruct the tree for the given table entry, in pre order
    fn expand(
        &self,
        tables: &[Option<ColorTable>],
        root: usize,
        colors: ColorSet,
    ) -> Vec<Occurrence> {
        let mut occurrences = Vec::new();
        let mut stack = vec![(root, colors, None, None)];
        while let Some((node, colors, edge, parent)) = stack.pop() {
            let index = occurrences.len();
            occurrences.push(Occurrence { node, edge, parent });
            let Some(cell) = tables[node].as_ref().and_then(|t| t.get(colors)) else {
                continue;
            };
            let pieces = tables[node].as_ref().map_or(&[][..], ColorTable::pieces);
            for (e, child) in branches(pieces, cell.piece) {
                stack.push((self.graph.edges()[e].target, child, Some(e), Some(index)));
            }
        }
        occurrences
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{
        bounds::optimistic_below,
        graph::{FragmentationEdge, FragmentationNode},
    };

    fn solve(graph: &FragmentationGraph, lower_bound: f64) -> Solution {
        let colors = (0..graph.len())
            .map(|n| u8::try_from(graph.color_index(n)).ok())
            .collect_vec();
        let below = optimistic_below(graph);
        ColorfulSubtree {
            graph,
            colors: &colors,
            below: &below,
            abort: None,
            abort_check_interval: 1,
        }
        .solve(0, lower_bound)
        .unwrap()
    }

    fn nodes(solution: &Solution) -> Vec<usize> {
        match solution {
            Solution::Found { occurrences, .. } => {
                occurrences.iter().map(|o| o.node).sorted().collect()
            }
            Solution::BelowBound(_) => Vec::new(),
        }
    }

    #[test]
    fn branching() {
        // Root with two children of different colors that both pay off, and a grandchild
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(1.0, 1),
                FragmentationNode::new(1.0, 2),
                FragmentationNode::new(1.0, 3),
            ],
            vec![
                FragmentationEdge::new(0, 1, 1.0),
                FragmentationEdge::new(0, 2, 1.0),
                FragmentationEdge::new(1, 3, 1.0),
                FragmentationEdge::new(2, 3, 2.0),
            ],
        )
        .unwrap();
        let solution = solve(&graph, f64::NEG_INFINITY);
        assert_eq!(nodes(&solution), [0, 1, 2, 3]);
        match solution {
            Solution::Found { score, .. } => assert_eq!(score, 7.0),
            Solution::BelowBound(_) => panic!("Expected a tree"),
        }
    }

    #[test]
    fn shared_grandchild_color() {
        // Both children lead to a node of color 3, only one can be used
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(0.0, 1),
                FragmentationNode::new(0.0, 2),
                FragmentationNode::new(5.0, 3),
                FragmentationNode::new(4.0, 3),
            ],
            vec![
                FragmentationEdge::new(0, 1, 0.5),
                FragmentationEdge::new(0, 2, 0.0),
                FragmentationEdge::new(1, 3, 0.0),
                FragmentationEdge::new(2, 4, 0.0),
            ],
        )
        .unwrap();
        let solution = solve(&graph, f64::NEG_INFINITY);
        assert_eq!(nodes(&solution), [0, 1, 3]);
    }

    #[test]
    fn tie_goes_to_smallest_nodes() {
        // {0, 2, 3} is found first, {0, 1, 4} has the same score
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(1.0, 0).as_root(),
                FragmentationNode::new(1.0, 1),
                FragmentationNode::new(1.0, 1),
                FragmentationNode::new(1.0, 2),
                FragmentationNode::new(1.0, 2),
            ],
            vec![
                FragmentationEdge::new(0, 1, 0.0),
                FragmentationEdge::new(0, 2, 0.0),
                FragmentationEdge::new(2, 3, 0.0),
                FragmentationEdge::new(0, 4, 0.0),
            ],
        )
        .unwrap();
        let solution = solve(&graph, f64::NEG_INFINITY);
        assert_eq!(nodes(&solution), [0, 1, 4]);
        match solution {
            Solution::Found {
                occurrences, score, ..
            } => {
                assert_eq!(score, 3.0);
                assert_eq!(
                    occurrences.iter().filter_map(|o| o.edge).sorted().collect_vec(),
                    [0, 3]
                );
            }
            Solution::BelowBound(_) => panic!("Expected a tree"),
        }
    }

    #[test]
    fn zero_branch_ties_with_smaller_tree() {
        // Adding node 1 adds nothing, the tree with only the root is smaller
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(2.0, 0).as_root(),
                FragmentationNode::new(1.0, 1),
            ],
            vec![FragmentationEdge::new(0, 1, -1.0)],
        )
        .unwrap();
        assert_eq!(nodes(&solve(&graph, f64::NEG_INFINITY)), [0]);
    }

    #[test]
    fn pruning() {
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(10.0, 1),
                FragmentationNode::new(-1.0, 2),
                FragmentationNode::new(0.5, 3),
            ],
            vec![
                FragmentationEdge::new(0, 1, 0.0),
                FragmentationEdge::new(0, 2, -5.0),
                FragmentationEdge::new(2, 3, 0.0),
            ],
        )
        .unwrap();
        let solution = solve(&graph, 9.0);
        assert_eq!(nodes(&solution), [0, 1]);
        match solution {
            Solution::Found { statistics, .. } => {
                assert_eq!(statistics.reachable, 4);
                assert_eq!(statistics.pruned, 2);
            }
            Solution::BelowBound(_) => panic!("Expected a tree"),
        }
        assert!(matches!(solve(&graph, 10.5), Solution::BelowBound(_)));
    }

    #[test]
    fn abort() {
        let graph = FragmentationGraph::new(
            vec![FragmentationNode::new(0.0, 0).as_root()],
            Vec::new(),
        )
        .unwrap();
        let signal = AbortSignal::new();
        signal.abort();
        let colors = [Some(0)];
        let below = optimistic_below(&graph);
        let result = ColorfulSubtree {
            graph: &graph,
            colors: &colors,
            below: &below,
            abort: Some(&signal),
            abort_check_interval: 1,
        }
        .solve(0, f64::NEG_INFINITY);
        assert_eq!(*result.unwrap_err().get_kind(), TreeError::Aborted);
    }
}
