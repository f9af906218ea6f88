use crate::color::ColorSet;

/// A piece of a table entry, recording a single branch that was added to a node. Pieces are never
/// changed after creation, so an entry can always be reconstructed exactly even if the table cell
/// it was built on was improved later on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct Piece {
    /// The edge from the node to the child
    pub(crate) edge: usize,
    /// The colors of the subtree of the child, the child table entry with exactly these colors
    /// was used
    pub(crate) child: ColorSet,
    /// The piece for the remainder of the entry, `None` if the remainder is just the node itself
    pub(crate) previous: Option<u32>,
}

impl Piece {
    /// Create a new piece
    pub(crate) const fn new(edge: usize, child: ColorSet, previous: Option<u32>) -> Self {
        Self {
            edge,
            child,
            previous,
        }
    }
}

/// The branches of a table entry, starting at the most recently added branch. It yields the edge
/// and child colors for each branch.
pub(crate) fn branches(
    pieces: &[Piece],
    last: Option<u32>,
) -> impl Iterator<Item = (usize, ColorSet)> + '_ {
    let mut next = last;
    std::iter::from_fn(move || {
        let piece = pieces[next? as usize];
        next = piece.previous;
        Some((piece.edge, piece.child))
    })
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc)]
mod tests {
    use super::{Piece, branches};
    use crate::color::ColorSet;

    #[test]
    fn chain() {
        let pieces = [
            Piece::new(3, ColorSet::single(1), None),
            Piece::new(4, ColorSet::single(2), Some(0)),
            Piece::new(5, ColorSet::single(3), Some(0)),
        ];
        assert_eq!(
            branches(&pieces, Some(2)).collect::<Vec<_>>(),
            [(5, ColorSet::single(3)), (3, ColorSet::single(1))]
        );
        assert_eq!(branches(&pieces, None).count(), 0);
    }
}
