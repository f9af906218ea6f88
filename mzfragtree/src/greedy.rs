use ordered_float::OrderedFloat;

use crate::{graph::FragmentationGraph, repair::trim};

/// For every node the best score of a path starting with one of its outgoing edges, ignoring
/// colors, or zero if no path adds anything. Used as look ahead by the greedy heuristic.
pub(crate) fn critical_paths(graph: &FragmentationGraph) -> Vec<f64> {
    let mut paths = vec![0.0; graph.len()];
    for &node in graph.topological_order().iter().rev() {
        paths[node] = graph
            .outgoing(node)
            .iter()
            .map(|e| {
                let edge = &graph.edges()[*e];
                edge.score + graph.nodes()[edge.target].score + paths[edge.target]
            })
            .fold(0.0, f64::max);
    }
    paths
}

/// Grow a tree from the root by repeatedly adding the edge with the best gain: the edge score,
/// the score of the new node and the best path that continues from the new node. Only edges to
/// nodes of unused colors are considered. Stops when no edge has a positive gain, then trims all
/// branches that did not pay off. Returns the selected edges.
pub(crate) fn greedy_tree(graph: &FragmentationGraph, root: usize, paths: &[f64]) -> Vec<usize> {
    let mut in_tree = vec![false; graph.len()];
    let mut used_colors = vec![false; graph.distinct_colors()];
    let mut tree_nodes = vec![root];
    let mut edges = Vec::new();
    in_tree[root] = true;
    used_colors[graph.color_index(root)] = true;

    loop {
        let mut best: Option<(f64, usize)> = None;
        for &node in &tree_nodes {
            for &e in graph.outgoing(node) {
                let edge = &graph.edges()[e];
                if in_tree[edge.target] || used_colors[graph.color_index(edge.target)] {
                    continue;
                }
                let gain = edge.score + graph.nodes()[edge.target].score + paths[edge.target];
                if best.is_none_or(|(b, i)| {
                    OrderedFloat(gain)
                        .cmp(&OrderedFloat(b))
                        .then(i.cmp(&e))
                        .is_gt()
                }) {
                    best = Some((gain, e));
                }
            }
        }
        match best {
            Some((gain, e)) if gain > 0.0 => {
                let target = graph.edges()[e].target;
                in_tree[target] = true;
                used_colors[graph.color_index(target)] = true;
                tree_nodes.push(target);
                edges.push(e);
            }
            _ => break,
        }
    }
    trim(graph, root, edges)
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{
        graph::{FragmentationEdge, FragmentationNode},
        tree::tree_score,
    };

    #[test]
    fn follows_critical_path() {
        // The direct gain of 1 is low, but it opens up a path to node 3
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(0.0, 1),
                FragmentationNode::new(2.0, 2),
                FragmentationNode::new(10.0, 3),
            ],
            vec![
                FragmentationEdge::new(0, 1, 1.0),
                FragmentationEdge::new(0, 2, 1.0),
                FragmentationEdge::new(1, 3, 0.0),
            ],
        )
        .unwrap();
        let paths = critical_paths(&graph);
        assert_eq!(paths, [11.0, 10.0, 0.0, 0.0]);
        let edges = greedy_tree(&graph, 0, &paths);
        assert_eq!(edges, [0, 1, 2]);
        assert_eq!(tree_score(&graph, 0, edges), 14.0);
    }

    #[test]
    fn respects_colors() {
        let graph = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(1.0, 1),
                FragmentationNode::new(3.0, 1),
            ],
            vec![
                FragmentationEdge::new(0, 1, 1.0),
                FragmentationEdge::new(0, 2, 1.0),
            ],
        )
        .unwrap();
        let paths = critical_paths(&graph);
        assert_eq!(greedy_tree(&graph, 0, &paths), [1]);
    }
}
