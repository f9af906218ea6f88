use std::collections::BTreeMap;

use crate::{color::ColorSet, helper_functions::same_score, piece::Piece};

/// A single cell in a node table
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Cell {
    /// The best score for a subtree with exactly the colors of this cell
    pub(crate) score: f64,
    /// The last branch added to reach this score, `None` if the subtree is only the node itself
    pub(crate) piece: Option<u32>,
}

/// The dynamic programming table for a single node. Maps sets of working colors to the best
/// subtree rooted at this node using exactly those colors.
#[derive(Clone, Debug, Default)]
pub(crate) struct ColorTable {
    cells: BTreeMap<ColorSet, Cell>,
    pieces: Vec<Piece>,
}

impl ColorTable {
    /// A table with only the node itself
    pub(crate) fn seed(colors: ColorSet, score: f64) -> Self {
        Self {
            cells: BTreeMap::from([(colors, Cell { score, piece: None })]),
            pieces: Vec::new(),
        }
    }

    /// Get the cell with exactly these colors
    pub(crate) fn get(&self, colors: ColorSet) -> Option<&Cell> {
        self.cells.get(&colors)
    }

    /// All pieces of this table
    pub(crate) fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// The number of cells
    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    /// All cells, in ascending order of color set
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ColorSet, &Cell)> + '_ {
        self.cells.iter().map(|(c, cell)| (*c, cell))
    }

    /// A copy of the colors and scores of all cells, to combine with a new child without seeing
    /// the cells created for this same child
    pub(crate) fn snapshot(&self) -> Vec<(ColorSet, f64, Option<u32>)> {
        self.cells
            .iter()
            .map(|(c, cell)| (*c, cell.score, cell.piece))
            .collect()
    }

    /// Offer a new combination of a previous cell with a new branch. It is stored if it beats the
    /// current cell for the same colors, or if the scores are the same and `wins_tie` decides in
    /// its favour. `wins_tie` gets all pieces and the piece of the current cell. Returns if it was
    /// stored.
    pub(crate) fn offer(
        &mut self,
        colors: ColorSet,
        score: f64,
        piece: Piece,
        wins_tie: impl FnOnce(&[Piece], Option<u32>) -> bool,
    ) -> bool {
        if let Some(cell) = self.cells.get(&colors) {
            let better = if same_score(cell.score, score) {
                wins_tie(&self.pieces, cell.piece)
            } else {
                score > cell.score
            };
            if !better {
                return false;
            }
        }
        let Ok(index) = u32::try_from(self.pieces.len()) else {
            return false;
        };
        self.pieces.push(piece);
        self.cells.insert(
            colors,
            Cell {
                score,
                piece: Some(index),
            },
        );
        true
    }

    /// The best score in this table
    pub(crate) fn best_score(&self) -> Option<f64> {
        self.cells.values().map(|c| c.score).max_by(f64::total_cmp)
    }
}

#[cfg(test)]
#[expect(clippy::missing_panics_doc, clippy::float_cmp)]
mod tests {
    use super::ColorTable;
    use crate::{color::ColorSet, piece::Piece};

    #[test]
    fn offer() {
        let root = ColorSet::single(0);
        let mut table = ColorTable::seed(root, 1.0);
        let both = root | ColorSet::single(1);
        let branch = |edge| Piece::new(edge, ColorSet::single(1), None);
        assert!(table.offer(both, 3.0, branch(0), |_, _| unreachable!()));
        assert!(!table.offer(both, 3.0, branch(1), |_, _| false));
        assert!(!table.offer(both, 2.0, branch(1), |_, _| unreachable!()));
        assert!(table.offer(both, 4.0, branch(1), |_, _| unreachable!()));
        assert_eq!(table.len(), 2);
        assert_eq!(table.pieces().len(), 2);
        assert_eq!(table.get(both).unwrap().piece, Some(1));
        assert_eq!(table.get(root).unwrap().piece, None);
        assert_eq!(table.best_score(), Some(4.0));
        assert_eq!(table.iter().next().unwrap().0, root);
    }

    #[test]
    fn tie() {
        let root = ColorSet::single(0);
        let mut table = ColorTable::seed(root, 1.0);
        let both = root | ColorSet::single(1);
        let branch = |edge| Piece::new(edge, ColorSet::single(1), None);
        assert!(table.offer(both, 3.0, branch(0), |_, _| unreachable!()));
        assert!(table.offer(both, 3.0 + 1e-12, branch(1), |pieces, current| {
            assert_eq!(current, Some(0));
            assert_eq!(pieces[0].edge, 0);
            true
        }));
        assert_eq!(table.get(both).unwrap().piece, Some(1));
        assert_eq!(table.pieces()[1].edge, 1);
    }
}
