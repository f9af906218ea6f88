use std::{cmp::Reverse, collections::BinaryHeap};

use context_error::{BoxedError, Context, CreateError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};

/// A single candidate fragment, the combination of an observed peak and a hypothesised formula.
/// The identity of a node is its index in the [`FragmentationGraph`].
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FragmentationNode {
    /// The intrinsic score of this fragment
    pub score: f64,
    /// The color, all nodes explaining the same peak share the same color
    pub color: usize,
    /// If this node is the precursor (the root of the graph)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub root: bool,
    /// A free text label, for example the formula, only used for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl FragmentationNode {
    /// Create a new node
    pub const fn new(score: f64, color: usize) -> Self {
        Self {
            score,
            color,
            root: false,
            label: None,
        }
    }

    /// Flag this node as the root of the graph
    #[must_use]
    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Set the label for this node
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A candidate loss, going from a parent fragment to a child fragment.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FragmentationEdge {
    /// The index of the parent node
    pub source: usize,
    /// The index of the child node
    pub target: usize,
    /// The score of this loss, can be negative
    pub score: f64,
}

impl FragmentationEdge {
    /// Create a new edge
    pub const fn new(source: usize, target: usize, score: f64) -> Self {
        Self {
            source,
            target,
            score,
        }
    }
}

/// A directed acyclic graph of candidate fragments and losses. It is immutable once created, all
/// invariants are checked on creation:
/// * All edges point to existing nodes and are not self loops
/// * There are no cycles
/// * At most one node is flagged as root
/// * All scores are finite
///
/// Colors can be any `usize`, they are renumbered densely in ascending order (see
/// [`Self::palette`]) so memory use only depends on the number of distinct colors.
///
/// Nodes and edges are stored in flat arrays, the adjacency is stored as compressed rows of edge
/// indices, the outgoing edges of a node are sorted on target and the incoming edges on source.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentationGraph {
    nodes: Vec<FragmentationNode>,
    edges: Vec<FragmentationEdge>,
    outgoing_offsets: Vec<usize>,
    outgoing: Vec<usize>,
    incoming_offsets: Vec<usize>,
    incoming: Vec<usize>,
    topological_order: Vec<usize>,
    /// The distinct original colors, ascending, the position is the dense color index
    palette: Vec<usize>,
    /// The dense color index for every node
    color_indices: Vec<usize>,
    root: Option<usize>,
}

#[derive(Deserialize)]
struct GraphDefinition {
    nodes: Vec<FragmentationNode>,
    #[serde(default)]
    edges: Vec<FragmentationEdge>,
}

#[derive(Serialize)]
struct GraphDefinitionRef<'a> {
    nodes: &'a [FragmentationNode],
    edges: &'a [FragmentationEdge],
}

impl FragmentationGraph {
    /// Create a new fragmentation graph.
    /// # Errors
    /// * [`TreeError::InvalidGraph`] if an edge refers to a node outside the graph, an edge is a
    ///   self loop, more than one node is flagged as root, or any score is not finite.
    /// * [`TreeError::CyclicGraph`] if the edges contain a cycle.
    pub fn new(nodes: Vec<FragmentationNode>, edges: Vec<FragmentationEdge>) -> TreeResult<Self> {
        if let Some((index, node)) = nodes.iter().find_position(|n| !n.score.is_finite()) {
            return Err(BoxedError::new(
                TreeError::InvalidGraph,
                "Invalid node score",
                format!("The score of node {index} is not finite"),
                Context::show(node.score.to_string()),
            ));
        }
        let roots = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.root)
            .map(|(i, _)| i)
            .collect_vec();
        if roots.len() > 1 {
            return Err(BoxedError::new(
                TreeError::InvalidGraph,
                "Multiple roots",
                "At most one node in a fragmentation graph can be flagged as root",
                Context::show(roots.iter().join(",")),
            ));
        }
        for (index, edge) in edges.iter().enumerate() {
            if edge.source >= nodes.len() || edge.target >= nodes.len() {
                return Err(BoxedError::new(
                    TreeError::InvalidGraph,
                    "Invalid edge",
                    format!(
                        "Edge {index} refers to a node outside of the graph, which has {} nodes",
                        nodes.len()
                    ),
                    Context::show(format!("{} -> {}", edge.source, edge.target)),
                ));
            }
            if edge.source == edge.target {
                return Err(BoxedError::new(
                    TreeError::InvalidGraph,
                    "Invalid edge",
                    format!("Edge {index} is a self loop"),
                    Context::show(format!("{} -> {}", edge.source, edge.target)),
                ));
            }
            if !edge.score.is_finite() {
                return Err(BoxedError::new(
                    TreeError::InvalidGraph,
                    "Invalid edge score",
                    format!("The score of edge {index} is not finite"),
                    Context::show(edge.score.to_string()),
                ));
            }
        }

        let (outgoing_offsets, outgoing) =
            compressed_rows(nodes.len(), &edges, |e| e.source, |e| e.target);
        let (incoming_offsets, incoming) =
            compressed_rows(nodes.len(), &edges, |e| e.target, |e| e.source);
        let topological_order = topological_order(
            nodes.len(),
            &edges,
            &outgoing_offsets,
            &outgoing,
            &incoming_offsets,
        )?;
        let palette = nodes.iter().map(|n| n.color).sorted_unstable().dedup().collect_vec();
        let color_indices = nodes
            .iter()
            .map(|n| palette.binary_search(&n.color).unwrap_or_default())
            .collect();

        Ok(Self {
            root: roots.first().copied(),
            nodes,
            edges,
            outgoing_offsets,
            outgoing,
            incoming_offsets,
            incoming,
            topological_order,
            palette,
            color_indices,
        })
    }

    /// Parse a graph from JSON, the format is `{"nodes": [{"score": 0.0, "color": 0, "root": true}, ...], "edges": [{"source": 0, "target": 1, "score": 1.0}, ...]}`.
    /// # Errors
    /// If the JSON is malformed or the graph is invalid, see [`Self::new`].
    pub fn from_json(text: &str) -> TreeResult<Self> {
        let definition: GraphDefinition = serde_json::from_str(text).map_err(|err| {
            BoxedError::new(
                TreeError::InvalidGraph,
                "Invalid fragmentation graph JSON",
                err.to_string(),
                Context::show(
                    text.lines()
                        .nth(err.line().saturating_sub(1))
                        .unwrap_or_default()
                        .to_string(),
                ),
            )
        })?;
        Self::new(definition.nodes, definition.edges)
    }

    /// Write this graph as JSON, in the same format as read by [`Self::from_json`].
    pub fn to_json(&self) -> String {
        serde_json::to_string(&GraphDefinitionRef {
            nodes: &self.nodes,
            edges: &self.edges,
        })
        .unwrap_or_default()
    }

    /// The number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if there are no nodes in this graph
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes
    pub fn nodes(&self) -> &[FragmentationNode] {
        &self.nodes
    }

    /// All edges
    pub fn edges(&self) -> &[FragmentationEdge] {
        &self.edges
    }

    /// Get a node by index
    pub fn node(&self, index: usize) -> Option<&FragmentationNode> {
        self.nodes.get(index)
    }

    /// Get an edge by index
    pub fn edge(&self, index: usize) -> Option<&FragmentationEdge> {
        self.edges.get(index)
    }

    /// The indices of all outgoing edges of this node, sorted on target index.
    /// # Panics
    /// If the node index is not in the graph.
    pub fn outgoing(&self, node: usize) -> &[usize] {
        &self.outgoing[self.outgoing_offsets[node]..self.outgoing_offsets[node + 1]]
    }

    /// The indices of all incoming edges of this node, sorted on source index.
    /// # Panics
    /// If the node index is not in the graph.
    pub fn incoming(&self, node: usize) -> &[usize] {
        &self.incoming[self.incoming_offsets[node]..self.incoming_offsets[node + 1]]
    }

    /// All nodes in topological order, every edge points from an earlier to a later node.
    /// Amongst nodes that could go in any order the lowest index comes first.
    pub fn topological_order(&self) -> &[usize] {
        &self.topological_order
    }

    /// The node flagged as root, if any
    pub const fn root(&self) -> Option<usize> {
        self.root
    }

    /// All nodes without incoming edges, these are the possible precursors when no root is flagged
    pub fn sources(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|n| self.incoming(*n).is_empty())
    }

    /// The number of colors that are used by at least one node
    pub fn distinct_colors(&self) -> usize {
        self.palette.len()
    }

    /// The distinct colors in use, ascending. The position of a color in this list is its dense
    /// index, see [`Self::color_index`].
    pub fn palette(&self) -> &[usize] {
        &self.palette
    }

    /// The dense index of the color of a node, in `0..self.distinct_colors()`. Colors are
    /// opaque identifiers, so any `usize` can be used as color without affecting memory use.
    /// # Panics
    /// If the node index is not in the graph.
    pub fn color_index(&self, node: usize) -> usize {
        self.color_indices[node]
    }

    /// Get for each node if it can be reached from the given node (including the node itself).
    /// # Panics
    /// If the node index is not in the graph.
    pub fn reachable_from(&self, start: usize) -> Vec<bool> {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        reachable[start] = true;
        while let Some(node) = stack.pop() {
            for &edge in self.outgoing(node) {
                let target = self.edges[edge].target;
                if !reachable[target] {
                    reachable[target] = true;
                    stack.push(target);
                }
            }
        }
        reachable
    }
}

/// Group edge indices by the `key` node, sorting every group by the `order` node then edge index
fn compressed_rows(
    nodes: usize,
    edges: &[FragmentationEdge],
    key: impl Fn(&FragmentationEdge) -> usize,
    order: impl Fn(&FragmentationEdge) -> usize,
) -> (Vec<usize>, Vec<usize>) {
    let mut offsets = vec![0; nodes + 1];
    for edge in edges {
        offsets[key(edge) + 1] += 1;
    }
    for index in 0..nodes {
        offsets[index + 1] += offsets[index];
    }
    let rows = (0..edges.len())
        .sorted_by_key(|index| (key(&edges[*index]), order(&edges[*index]), *index))
        .collect_vec();
    (offsets, rows)
}

/// Kahn's algorithm, always emitting the lowest ready index first
fn topological_order(
    nodes: usize,
    edges: &[FragmentationEdge],
    outgoing_offsets: &[usize],
    outgoing: &[usize],
    incoming_offsets: &[usize],
) -> TreeResult<Vec<usize>> {
    let mut in_degree = (0..nodes)
        .map(|n| incoming_offsets[n + 1] - incoming_offsets[n])
        .collect_vec();
    let mut ready = (0..nodes)
        .filter(|n| in_degree[*n] == 0)
        .map(Reverse)
        .collect::<BinaryHeap<_>>();
    let mut order = Vec::with_capacity(nodes);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &edge in &outgoing[outgoing_offsets[node]..outgoing_offsets[node + 1]] {
            let target = edges[edge].target;
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }
    if order.len() == nodes {
        Ok(order)
    } else {
        let stuck = (0..nodes)
            .filter(|n| in_degree[*n] != 0)
            .collect_vec();
        Err(BoxedError::new(
            TreeError::CyclicGraph,
            "Cyclic fragmentation graph",
            format!(
                "A fragmentation graph has to be acyclic, but {} nodes are part of or downstream of a cycle",
                stuck.len()
            ),
            Context::show(stuck.iter().join(",")),
        ))
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    fn diamond() -> FragmentationGraph {
        FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(1.0, 1),
                FragmentationNode::new(1.0, 2),
                FragmentationNode::new(1.0, 3),
            ],
            vec![
                FragmentationEdge::new(0, 2, 1.0),
                FragmentationEdge::new(0, 1, 1.0),
                FragmentationEdge::new(1, 3, 1.0),
                FragmentationEdge::new(2, 3, 1.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn adjacency() {
        let graph = diamond();
        assert_eq!(graph.outgoing(0), [1, 0]);
        assert_eq!(graph.incoming(3), [2, 3]);
        assert!(graph.outgoing(3).is_empty());
        assert_eq!(graph.topological_order(), [0, 1, 2, 3]);
        assert_eq!(graph.root(), Some(0));
        assert_eq!(graph.distinct_colors(), 4);
        assert_eq!(graph.palette(), [0, 1, 2, 3]);
        assert_eq!(graph.sources().collect_vec(), [0]);
        assert_eq!(graph.reachable_from(2), [false, false, true, true]);
    }

    #[test]
    fn topological_order_is_consistent() {
        let graph = FragmentationGraph::new(
            vec![FragmentationNode::new(0.0, 0); 5],
            vec![
                FragmentationEdge::new(4, 1, 0.0),
                FragmentationEdge::new(3, 4, 0.0),
                FragmentationEdge::new(1, 0, 0.0),
                FragmentationEdge::new(2, 0, 0.0),
            ],
        )
        .unwrap();
        assert_eq!(graph.topological_order(), [2, 3, 4, 1, 0]);
        let position = |n: usize| graph.topological_order().iter().position(|o| *o == n);
        for edge in graph.edges() {
            assert!(position(edge.source) < position(edge.target));
        }
    }

    #[test]
    fn invalid() {
        let cyclic = FragmentationGraph::new(
            vec![FragmentationNode::new(0.0, 0); 3],
            vec![
                FragmentationEdge::new(0, 1, 0.0),
                FragmentationEdge::new(1, 2, 0.0),
                FragmentationEdge::new(2, 1, 0.0),
            ],
        );
        assert_eq!(*cyclic.unwrap_err().get_kind(), TreeError::CyclicGraph);
        let out_of_range = FragmentationGraph::new(
            vec![FragmentationNode::new(0.0, 0)],
            vec![FragmentationEdge::new(0, 1, 0.0)],
        );
        assert_eq!(*out_of_range.unwrap_err().get_kind(), TreeError::InvalidGraph);
        let self_loop = FragmentationGraph::new(
            vec![FragmentationNode::new(0.0, 0)],
            vec![FragmentationEdge::new(0, 0, 0.0)],
        );
        assert_eq!(*self_loop.unwrap_err().get_kind(), TreeError::InvalidGraph);
        let two_roots = FragmentationGraph::new(
            vec![
                FragmentationNode::new(0.0, 0).as_root(),
                FragmentationNode::new(0.0, 1).as_root(),
            ],
            Vec::new(),
        );
        assert_eq!(*two_roots.unwrap_err().get_kind(), TreeError::InvalidGraph);
        let nan = FragmentationGraph::new(vec![FragmentationNode::new(f64::NAN, 0)], Vec::new());
        assert_eq!(*nan.unwrap_err().get_kind(), TreeError::InvalidGraph);
    }

    #[test]
    fn sparse_colors() {
        let graph = FragmentationGraph::from_json(
            r#"{"nodes": [{"score": 0.0, "color": 18446744073709551615, "root": true}, {"score": 1.0, "color": 1099511627776}, {"score": 1.0, "color": 7}, {"score": 2.0, "color": 7}]}"#,
        )
        .unwrap();
        assert_eq!(graph.distinct_colors(), 3);
        assert_eq!(graph.palette(), [7, 1 << 40, usize::MAX]);
        assert_eq!(
            (0..graph.len()).map(|n| graph.color_index(n)).collect_vec(),
            [2, 1, 0, 0]
        );
    }

    #[test]
    fn json() {
        let graph = diamond();
        let text = graph.to_json();
        assert_eq!(FragmentationGraph::from_json(&text).unwrap(), graph);
        let parsed = FragmentationGraph::from_json(
            r#"{"nodes": [{"score": 1.5, "color": 0, "root": true, "label": "C6H12O6"}, {"score": -0.5, "color": 1}], "edges": [{"source": 0, "target": 1, "score": 2.0}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.node(0).unwrap().label.as_deref(), Some("C6H12O6"));
        assert_eq!(parsed.edge(0).unwrap().score, 2.0);
        let error = FragmentationGraph::from_json(r#"{"nodes": [{"score": "high"}]}"#);
        assert_eq!(*error.unwrap_err().get_kind(), TreeError::InvalidGraph);
    }
}
