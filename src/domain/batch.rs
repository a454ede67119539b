// ============================================================
// Layer 3 - Packed Batch Domain Type
// ============================================================
// The unit the packer emits and the persistence layer writes.
//
// A PackedBatch is `rows × cols` token ids stored row-major:
//
//   input_ids      [rows, cols]   token ids
//   attention_mask [rows, cols]   1 = real token, 0 = padding
//   labels         [rows, cols]   next-token targets (optional)
//
// With rows = 1 the batch is a single window; `window(i)`
// gives a borrowed view of any row either way.
//
// Reference: Rust Book §8 (Vectors), §4 (Slices)

use crate::domain::record::TokenId;

/// One fixed-shape unit of packed training data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBatch {
    rows: usize,
    cols: usize,
    input_ids: Vec<TokenId>,
    attention_mask: Vec<u8>,
    labels: Option<Vec<TokenId>>,
}

impl PackedBatch {
    /// Assemble a batch from flat row-major channels.
    ///
    /// # Panics
    /// Panics if any channel length differs from `rows * cols`;
    /// the packer always builds exact shapes.
    pub fn new(
        rows: usize,
        cols: usize,
        input_ids: Vec<TokenId>,
        attention_mask: Vec<u8>,
        labels: Option<Vec<TokenId>>,
    ) -> Self {
        let cells = rows * cols;
        assert_eq!(input_ids.len(), cells, "input_ids must be rows * cols");
        assert_eq!(attention_mask.len(), cells, "attention_mask must be rows * cols");
        if let Some(labels) = &labels {
            assert_eq!(labels.len(), cells, "labels must be rows * cols");
        }
        Self { rows, cols, input_ids, attention_mask, labels }
    }

    /// `(batch_size, token_limit)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn input_ids(&self) -> &[TokenId] {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &[u8] {
        &self.attention_mask
    }

    pub fn labels(&self) -> Option<&[TokenId]> {
        self.labels.as_deref()
    }

    /// Borrow row `row` as a window.
    pub fn window(&self, row: usize) -> Window<'_> {
        let span = row * self.cols..(row + 1) * self.cols;
        Window {
            input_ids:      &self.input_ids[span.clone()],
            attention_mask: &self.attention_mask[span.clone()],
            labels:         self.labels.as_ref().map(|l| &l[span]),
        }
    }

    /// Iterate the rows in order.
    pub fn windows(&self) -> impl Iterator<Item = Window<'_>> + '_ {
        (0..self.rows).map(move |row| self.window(row))
    }

    /// Number of positions whose mask bit is 1.
    pub fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&bit| bit == 1).count()
    }

    /// Number of positions introduced by padding.
    pub fn padding_tokens(&self) -> usize {
        self.attention_mask.len() - self.real_tokens()
    }

    /// Structural check for units read back from disk.
    pub fn is_well_formed(&self) -> bool {
        let cells = self.rows * self.cols;
        self.input_ids.len() == cells
            && self.attention_mask.len() == cells
            && self.attention_mask.iter().all(|&bit| bit <= 1)
            && self.labels.as_ref().map_or(true, |l| l.len() == cells)
    }
}

/// A single row of a PackedBatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub input_ids:      &'a [TokenId],
    pub attention_mask: &'a [u8],
    pub labels:         Option<&'a [TokenId]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> PackedBatch {
        PackedBatch::new(
            2,
            2,
            vec![1, 9, 2, 9],
            vec![1, 1, 1, 0],
            Some(vec![9, 2, 9, 3]),
        )
    }

    #[test]
    fn test_window_views_rows() {
        let b = two_by_two();
        let w = b.window(1);
        assert_eq!(w.input_ids, &[2, 9]);
        assert_eq!(w.attention_mask, &[1, 0]);
        assert_eq!(w.labels, Some(&[9, 3][..]));
        assert_eq!(b.windows().count(), 2);
    }

    #[test]
    fn test_counts_real_and_padding() {
        let b = two_by_two();
        assert_eq!(b.real_tokens(), 3);
        assert_eq!(b.padding_tokens(), 1);
    }

    #[test]
    #[should_panic]
    fn test_wrong_shape_panics() {
        let _ = PackedBatch::new(2, 2, vec![1, 2, 3], vec![1, 1, 1], None);
    }

    #[test]
    fn test_well_formed_checks_mask_bits() {
        let mut b = PackedBatch::new(1, 2, vec![4, 5], vec![1, 1], None);
        assert!(b.is_well_formed());
        b.attention_mask[1] = 2;
        assert!(!b.is_well_formed());
    }
}
