// ============================================================
// Layer 4 - Token Batcher
// ============================================================
// Implements Burn's Batcher trait to turn packed units into
// integer tensors a language model can consume.
//
// How batching works here:
//   Input:  Vec of N PackedBatch units, each [rows, T]
//   Output: TokenBatch with tensors of shape [N * rows, T]
//
//   Units are already row-major and equally wide, so their
//   channels are concatenated and handed to TensorData with the
//   final shape; no reshaping or padding happens here.
//
// Token ids are widened to i64 on the way in.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::batch::PackedBatch;

// ─── TokenBatch ───────────────────────────────────────────────────────────────
/// Packed windows as Burn tensors. All have shape [rows, token_limit].
#[derive(Debug, Clone)]
pub struct TokenBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,

    /// Present only when every unit carried labels
    pub labels: Option<Tensor<B, 2, Int>>,
}

// ─── TokenBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug, Default)]
pub struct TokenBatcher;

impl TokenBatcher {
    pub fn new() -> Self {
        Self
    }

    /// Tensors for a single unit.
    pub fn tensors<B: Backend>(&self, unit: &PackedBatch, device: &B::Device) -> TokenBatch<B> {
        let (rows, cols) = unit.shape();
        let labels = unit.labels().map(|l| int_tensor(widen(l), rows, cols, device));
        TokenBatch {
            input_ids:      int_tensor(widen(unit.input_ids()), rows, cols, device),
            attention_mask: int_tensor(widen(unit.attention_mask()), rows, cols, device),
            labels,
        }
    }
}

fn widen<T: Copy + Into<i64>>(values: &[T]) -> Vec<i64> {
    values.iter().map(|&v| v.into()).collect()
}

fn int_tensor<B: Backend>(flat: Vec<i64>, rows: usize, cols: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [rows, cols]), device)
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, PackedBatch, TokenBatch<B>> for TokenBatcher {
    /// Stack units along the row axis.
    ///
    /// # Panics
    /// Panics if the units disagree on width; units from one pack
    /// run always share `token_limit`.
    fn batch(&self, items: Vec<PackedBatch>, device: &B::Device) -> TokenBatch<B> {
        let cols = items.first().map_or(0, |u| u.shape().1);
        assert!(
            items.iter().all(|u| u.shape().1 == cols),
            "all units in a batch must share token_limit"
        );
        let rows: usize = items.iter().map(|u| u.shape().0).sum();

        let input_flat: Vec<i64> = items.iter().flat_map(|u| widen(u.input_ids())).collect();
        let mask_flat: Vec<i64> = items.iter().flat_map(|u| widen(u.attention_mask())).collect();
        let labels_flat: Option<Vec<i64>> = items
            .iter()
            .map(|u| u.labels().map(widen))
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.concat());

        TokenBatch {
            input_ids:      int_tensor(input_flat, rows, cols, device),
            attention_mask: int_tensor(mask_flat, rows, cols, device),
            labels:         labels_flat.map(|l| int_tensor(l, rows, cols, device)),
        }
    }
}
