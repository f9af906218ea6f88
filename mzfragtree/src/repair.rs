//! Turning relaxed trees into valid trees and trimming branches that do not pay off.

use std::collections::HashMap;

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::graph::FragmentationGraph;

/// A single occurrence of a node in a possibly relaxed tree. With relaxed colors the same node or
/// color can occur multiple times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Occurrence {
    pub(crate) node: usize,
    /// The edge from the parent occurrence, `None` for the root
    pub(crate) edge: Option<usize>,
    pub(crate) parent: Option<usize>,
}

/// Make a valid colorful tree from a relaxed tree. The occurrences have to be in pre order (every
/// parent before its children). Walks the tree top down, visiting heavier branches first, and
/// keeps the first occurrence of every node and original color, any later occurrence is dropped
/// together with its subtree. Returns the selected edges, branches that do not contribute are
/// trimmed afterwards.
pub(crate) fn repair(
    graph: &FragmentationGraph,
    root: usize,
    occurrences: &[Occurrence],
) -> Vec<usize> {
    let mut children = vec![Vec::new(); occurrences.len()];
    for (index, occurrence) in occurrences.iter().enumerate() {
        if let Some(parent) = occurrence.parent {
            children[parent].push(index);
        }
    }
    let mut value = occurrences
        .iter()
        .map(|o| graph.nodes()[o.node].score + o.edge.map_or(0.0, |e| graph.edges()[e].score))
        .collect_vec();
    for index in (0..occurrences.len()).rev() {
        if let Some(parent) = occurrences[index].parent {
            value[parent] += value[index];
        }
    }

    let mut used_nodes = vec![false; graph.len()];
    let mut used_colors = vec![false; graph.distinct_colors()];
    let mut edges = Vec::new();
    let mut stack = occurrences
        .iter()
        .position(|o| o.parent.is_none())
        .into_iter()
        .collect_vec();
    while let Some(index) = stack.pop() {
        let occurrence = occurrences[index];
        let color = graph.color_index(occurrence.node);
        if used_nodes[occurrence.node] || used_colors[color] {
            continue;
        }
        used_nodes[occurrence.node] = true;
        used_colors[color] = true;
        if let Some(edge) = occurrence.edge {
            edges.push(edge);
        }
        // Pushed lightest first, so the heaviest branch is popped first
        stack.extend(
            children[index]
                .iter()
                .copied()
                .sorted_by_key(|c| {
                    (
                        OrderedFloat(value[*c]),
                        std::cmp::Reverse(occurrences[*c].node),
                    )
                }),
        );
    }
    trim(graph, root, edges)
}

/// Remove all branches from a valid tree that do not contribute a positive score.
pub(crate) fn trim(graph: &FragmentationGraph, root: usize, edges: Vec<usize>) -> Vec<usize> {
    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    for edge in &edges {
        children
            .entry(graph.edges()[*edge].source)
            .or_default()
            .push(*edge);
    }
    // Post order over the tree, children before parents
    let mut order = Vec::with_capacity(edges.len() + 1);
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        order.push(node);
        if let Some(out) = children.get(&node) {
            stack.extend(out.iter().map(|e| graph.edges()[*e].target));
        }
    }
    let mut contribution: HashMap<usize, f64> = HashMap::with_capacity(order.len());
    for node in order.iter().rev() {
        let own = graph.nodes()[*node].score
            + children.get(node).map_or(0.0, |out| {
                out.iter()
                    .map(|e| {
                        let edge = &graph.edges()[*e];
                        (edge.score + contribution[&edge.target]).max(0.0)
                    })
                    .sum()
            });
        contribution.insert(*node, own);
    }

    let mut kept = Vec::with_capacity(edges.len());
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(out) = children.get(&node) {
            for e in out {
                let edge = &graph.edges()[*e];
                if edge.score + contribution[&edge.target] > 0.0 {
                    kept.push(*e);
                    stack.push(edge.target);
                }
            }
        }
    }
    kept.sort_unstable();
    kept
}
