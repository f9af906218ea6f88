//! Optimistic bounds used for lower bound pruning. Both bounds ignore the colors, so they are
//! upper bounds for any colorful tree, with or without color reduction.

use crate::graph::FragmentationGraph;

/// For every node the best score a subtree rooted at that node could have if colors did not
/// matter: its own score plus every outgoing branch that has a positive contribution. This does
/// not depend on the root so it can be calculated once per graph.
pub(crate) fn optimistic_below(graph: &FragmentationGraph) -> Vec<f64> {
    let mut below = vec![0.0; graph.len()];
    for &node in graph.topological_order().iter().rev() {
        below[node] = graph.nodes()[node].score
            + graph
                .outgoing(node)
                .iter()
                .map(|e| {
                    let edge = &graph.edges()[*e];
                    (edge.score + below[edge.target]).max(0.0)
                })
                .sum::<f64>();
    }
    below
}

/// For every node reachable from the root the best score the rest of a tree (everything except
/// the subtree of the node itself) could have if colors did not matter. Unreachable nodes get
/// negative infinity.
pub(crate) fn optimistic_outside(
    graph: &FragmentationGraph,
    root: usize,
    reachable: &[bool],
    below: &[f64],
) -> Vec<f64> {
    let mut outside = vec![f64::NEG_INFINITY; graph.len()];
    outside[root] = 0.0;
    for &node in graph.topological_order() {
        if node == root || !reachable[node] {
            continue;
        }
        outside[node] = graph
            .incoming(node)
            .iter()
            .filter_map(|e| {
                let edge = &graph.edges()[*e];
                (reachable[edge.source] && outside[edge.source].is_finite()).then(|| {
                    outside[edge.source] + below[edge.source]
                        - (edge.score + below[node]).max(0.0)
                        + edge.score
                })
            })
            .fold(f64::NEG_INFINITY, f64::max);
    }
    outside
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::graph::{FragmentationEdge, FragmentationNode};

    #[test]
    fn bounds() {
        // 0 -> 1 -> 3, 0 -> 2, 1 -> 2
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(1.0, 0).as_root(),
                FragmentationNode::new(2.0, 1),
                FragmentationNode::new(-1.0, 2),
                FragmentationNode::new(4.0, 3),
            ],
            vec![
                FragmentationEdge::new(0, 1, 1.0),
                FragmentationEdge::new(1, 3, -2.0),
                FragmentationEdge::new(0, 2, 3.0),
                FragmentationEdge::new(1, 2, -5.0),
            ],
        )
        .unwrap();
        let below = optimistic_below(&graph);
        assert_eq!(below, [8.0, 4.0, -1.0, 4.0]);
        let reachable = graph.reachable_from(0);
        let outside = optimistic_outside(&graph, 0, &reachable, &below);
        assert_eq!(outside[0], 0.0);
        // Through 0: 0 + 8 - 5 + 1
        assert_eq!(outside[1], 4.0);
        // Through 0: 0 + 8 - 2 + 3 = 9, through 1: 4 + 4 - 0 - 5 = 3
        assert_eq!(outside[2], 9.0);
        // Through 1: 4 + 4 - 2 - 2
        assert_eq!(outside[3], 4.0);
        // The best tree (all nodes, 2 attached to 0) scores 8 and every bound is at least that
        for node in 0..4 {
            assert!(outside[node] + below[node] >= 8.0);
        }

        let reachable = graph.reachable_from(1);
        let outside = optimistic_outside(&graph, 1, &reachable, &below);
        assert_eq!(outside[0], f64::NEG_INFINITY);
        assert_eq!(outside[2], 4.0 - 0.0 - 5.0);
    }
}
