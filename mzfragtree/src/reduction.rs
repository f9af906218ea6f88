use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{color::ColorSet, graph::FragmentationGraph};

/// The mapping of the colors of a graph onto the working colors used by the solver.
///
/// All colors that are in use get a dense working color (in ascending order of original color).
/// If there are more colors than the ceiling the colors with the lowest information value are
/// merged into a single relaxed class, which carries no uniqueness constraint at all. Merging
/// colors into the relaxed class only removes constraints, so the optimal tree under the reduced
/// colors scores at least as high as the optimal tree under the original colors.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ColorReduction {
    /// The original colors in use, ascending
    colors: Vec<usize>,
    /// For each color in use the working color, `None` for relaxed colors
    mapping: Vec<Option<u8>>,
    /// The original colors that are merged into the relaxed class, ascending
    relaxed: Vec<usize>,
    /// The number of distinct colors in use
    distinct: usize,
    /// The ceiling used to create this reduction
    ceiling: usize,
}

impl ColorReduction {
    /// Reduce the colors of the given graph to at most `ceiling` working colors.
    /// # Panics
    /// If the ceiling is zero or above [`ColorSet::MAX_COLORS`].
    pub fn new(graph: &FragmentationGraph, ceiling: usize) -> Self {
        assert!((1..=ColorSet::MAX_COLORS).contains(&ceiling));
        let values = information_values(graph);
        let colors = graph.palette().to_vec();
        let distinct = colors.len();

        let relaxed = if distinct > ceiling {
            colors
                .iter()
                .zip(&values)
                .sorted_by_key(|(color, value)| (OrderedFloat(**value), **color))
                .take(distinct - ceiling)
                .map(|(color, _)| *color)
                .sorted()
                .collect_vec()
        } else {
            Vec::new()
        };

        let mut mapping = Vec::with_capacity(distinct);
        let mut next = 0_u8;
        for color in &colors {
            if relaxed.binary_search(color).is_ok() {
                mapping.push(None);
            } else {
                mapping.push(Some(next));
                next += 1;
            }
        }
        if !relaxed.is_empty() {
            tracing::debug!(
                "Relaxed {} of {distinct} colors to fit the ceiling of {ceiling} working colors",
                relaxed.len()
            );
        }

        Self {
            colors,
            mapping,
            relaxed,
            distinct,
            ceiling,
        }
    }

    /// Check if any colors had to be relaxed
    pub fn is_reduced(&self) -> bool {
        !self.relaxed.is_empty()
    }

    /// The working color for an original color, `None` if the color is relaxed (or not in use)
    pub fn working_color(&self, original: usize) -> Option<u8> {
        self.colors
            .binary_search(&original)
            .ok()
            .and_then(|index| self.mapping[index])
    }

    /// The working colors for all nodes of the graph this reduction was made for
    pub fn node_colors(&self, graph: &FragmentationGraph) -> Vec<Option<u8>> {
        (0..graph.len())
            .map(|n| self.mapping.get(graph.color_index(n)).copied().flatten())
            .collect()
    }

    /// The working color set for a single node
    pub fn color_set(&self, original: usize) -> ColorSet {
        self.working_color(original)
            .map_or(ColorSet::EMPTY, ColorSet::single)
    }

    /// The original colors that were merged into the relaxed class
    pub fn relaxed_colors(&self) -> &[usize] {
        &self.relaxed
    }

    /// The number of distinct colors in use in the graph
    pub const fn distinct_colors(&self) -> usize {
        self.distinct
    }

    /// The number of working colors after reduction
    pub fn working_colors(&self) -> usize {
        self.distinct - self.relaxed.len()
    }

    /// The ceiling that was used to make this reduction
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }
}

/// The information value of every color, the maximal score any of its nodes can add to a tree:
/// its own score plus the best incoming edge score (if it has any incoming edges). Indexed on
/// the dense color index.
fn information_values(graph: &FragmentationGraph) -> Vec<f64> {
    let mut values = vec![f64::NEG_INFINITY; graph.distinct_colors()];
    for (index, node) in graph.nodes().iter().enumerate() {
        let incoming = graph
            .incoming(index)
            .iter()
            .map(|e| graph.edges()[*e].score)
            .max_by(f64::total_cmp)
            .unwrap_or_default();
        let entry = &mut values[graph.color_index(index)];
        *entry = entry.max(node.score + incoming);
    }
    values
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::ColorReduction;
    use crate::graph::{FragmentationEdge, FragmentationGraph, FragmentationNode};

    fn star(colors: &[(usize, f64)]) -> FragmentationGraph {
        let mut nodes = vec![FragmentationNode::new(0.0, 100).as_root()];
        nodes.extend(colors.iter().map(|(c, s)| FragmentationNode::new(*s, *c)));
        let edges = (1..nodes.len())
            .map(|t| FragmentationEdge::new(0, t, 1.0))
            .collect();
        FragmentationGraph::new(nodes, edges).unwrap()
    }

    #[test]
    fn no_reduction_is_dense() {
        let graph = star(&[(3, 1.0), (7, 2.0), (3, 0.5)]);
        let reduction = ColorReduction::new(&graph, 16);
        assert!(!reduction.is_reduced());
        assert_eq!(reduction.distinct_colors(), 3);
        assert_eq!(reduction.working_colors(), 3);
        assert_eq!(reduction.working_color(3), Some(0));
        assert_eq!(reduction.working_color(7), Some(1));
        assert_eq!(reduction.working_color(100), Some(2));
        assert_eq!(reduction.working_color(5), None);
        assert_eq!(
            reduction.node_colors(&graph),
            [Some(2), Some(0), Some(1), Some(0)]
        );
    }

    #[test]
    fn lowest_value_is_relaxed_first() {
        // Values: root 0.0, color 0 -> 6.0, color 1 -> 2.0, color 2 -> 2.0, color 3 -> 9.0
        let graph = star(&[(0, 5.0), (1, 1.0), (2, 1.0), (3, 8.0), (0, -3.0)]);
        let reduction = ColorReduction::new(&graph, 3);
        assert!(reduction.is_reduced());
        // The root color (100) has value 0 and goes first, then the tie between 1 and 2 is broken on index
        assert_eq!(reduction.relaxed_colors(), [1, 100]);
        assert_eq!(reduction.working_colors(), 3);
        assert_eq!(reduction.working_color(0), Some(0));
        assert_eq!(reduction.working_color(1), None);
        assert_eq!(reduction.working_color(2), Some(1));
        assert_eq!(reduction.working_color(3), Some(2));
    }

    #[test]
    fn single_color_floor() {
        let graph = star(&[(0, 5.0), (1, 1.0), (2, 3.0)]);
        let reduction = ColorReduction::new(&graph, 1);
        assert_eq!(reduction.working_colors(), 1);
        assert_eq!(reduction.working_color(0), Some(0));
    }
}
