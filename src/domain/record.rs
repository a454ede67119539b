// ============================================================
// Layer 3 - Record Domain Type
// ============================================================
// One source document after tokenisation: the ordered token
// ids, and optionally a mask bit per token when the upstream
// stage already marked some positions as padding.
//
// Records come from two places:
//   - the tokenizer          → Vec<u32>, always valid
//   - pre-tokenised JSONL    → raw ids, validated before use
//
// Reference: Rust Book §5 (Structs), §10 (TryFrom)

use crate::domain::error::InvalidToken;

/// Token ids as produced by the tokenizer
pub type TokenId = u32;

/// A tokenised document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    ids: Vec<TokenId>,
    mask: Option<Vec<u8>>,
}

impl Record {
    /// A record whose tokens are all real (mask bit 1).
    pub fn new(ids: Vec<TokenId>) -> Self {
        Self { ids, mask: None }
    }

    /// A record with explicit mask bits, one per token, each 0 or 1.
    pub fn with_mask(ids: Vec<TokenId>, mask: Vec<u8>) -> Result<Self, InvalidToken> {
        if ids.len() != mask.len() {
            return Err(InvalidToken::MaskLength {
                tokens: ids.len(),
                mask:   mask.len(),
            });
        }
        if let Some((position, &value)) = mask.iter().enumerate().find(|&(_, &b)| b > 1) {
            return Err(InvalidToken::MaskBit { position, value });
        }
        Ok(Self { ids, mask: Some(mask) })
    }

    pub fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<TokenId>> for Record {
    fn from(ids: Vec<TokenId>) -> Self {
        Self::new(ids)
    }
}

/// Raw ids from an untyped source: every id must fit a `u32`.
impl TryFrom<Vec<i64>> for Record {
    type Error = InvalidToken;

    fn try_from(raw: Vec<i64>) -> Result<Self, Self::Error> {
        let ids = raw
            .iter()
            .enumerate()
            .map(|(position, &value)| {
                TokenId::try_from(value).map_err(|_| InvalidToken::OutOfRange { position, value: value.into() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ids))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_id_is_rejected() {
        let err = Record::try_from(vec![1i64, 2, -1]).unwrap_err();
        assert_eq!(err, InvalidToken::OutOfRange { position: 2, value: -1 });
    }

    #[test]
    fn test_oversized_id_is_rejected() {
        let err = Record::try_from(vec![i64::from(u32::MAX) + 1]).unwrap_err();
        assert!(matches!(err, InvalidToken::OutOfRange { position: 0, .. }));
    }

    #[test]
    fn test_valid_raw_ids_convert() {
        let r = Record::try_from(vec![0i64, 7, i64::from(u32::MAX)]).unwrap();
        assert_eq!(r.ids(), &[0, 7, u32::MAX]);
        assert_eq!(r.mask(), None);
    }

    #[test]
    fn test_mask_must_match_length() {
        let err = Record::with_mask(vec![1, 2], vec![1]).unwrap_err();
        assert_eq!(err, InvalidToken::MaskLength { tokens: 2, mask: 1 });
    }

    #[test]
    fn test_mask_bits_must_be_binary() {
        let err = Record::with_mask(vec![1, 2], vec![1, 2]).unwrap_err();
        assert_eq!(err, InvalidToken::MaskBit { position: 1, value: 2 });
    }

    #[test]
    fn test_explicit_mask_is_kept() {
        let r = Record::with_mask(vec![5, 6], vec![1, 0]).unwrap();
        assert_eq!(r.mask(), Some(&[1u8, 0][..]));
    }
}
