// ============================================================
// Layer 4 - Window Packer
// ============================================================
// Turns a stream of variable-length records into a stream of
// fixed-shape units (batch_size × token_limit).
//
// How packing works:
//   Every record is appended to a rolling buffer, followed by
//   the delimiter id. Whenever the buffer holds at least
//   `required_length` tokens, exactly that many are drained
//   from the front and reshaped into one unit.
//
//   required_length = token_limit * batch_size       (plain)
//   required_length = token_limit * batch_size + 1   (label shift)
//
// Example with token_limit=4, batch_size=1, delimiter=99:
//   records  [[1,2],[3]]
//   buffer   [1,2,99,3,99]
//   unit 0   [1,2,99,3]     mask [1,1,1,1]
//   tail     [99]  → pad → [99,99,99,99]   mask [1,0,0,0]
//
// With label shift each drained slice carries one extra token:
//   features row i = slice[i*T     .. (i+1)*T]
//   labels   row i = slice[i*T + 1 .. (i+1)*T + 1]
//
// The tail left when the input ends is handled exactly once,
// by `finish`, according to the RemainderPolicy.
//
// Reference: Rust Book §8 (Collections), §13 (Iterators)

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::batch::PackedBatch;
use crate::domain::error::{InvalidToken, PackError};
use crate::domain::record::{Record, TokenId};

// ─── Configuration ────────────────────────────────────────────────────────────

/// What to do with the buffered tail when the input ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemainderPolicy {
    /// Right-pad with the delimiter id, mask bits 0, and emit one last unit
    #[default]
    Pad,
    /// Discard the tail and report how many tokens were dropped
    Drop,
}

impl FromStr for RemainderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pad" => Ok(Self::Pad),
            "drop" => Ok(Self::Drop),
            other => Err(format!("unknown remainder policy '{other}' (expected pad or drop)")),
        }
    }
}

impl fmt::Display for RemainderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pad => f.write_str("pad"),
            Self::Drop => f.write_str("drop"),
        }
    }
}

/// Packer settings. Validated once, in `WindowPacker::new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackerConfig {
    pub token_limit:      usize,
    pub batch_size:       usize,
    pub delimiter_id:     Option<TokenId>,
    pub label_shift:      bool,
    pub remainder_policy: RemainderPolicy,
}

impl PackerConfig {
    /// Plain packing (no label shift) with the Pad policy.
    pub fn new(token_limit: usize, batch_size: usize, delimiter_id: TokenId) -> Self {
        Self {
            token_limit,
            batch_size,
            delimiter_id: Some(delimiter_id),
            label_shift: false,
            remainder_policy: RemainderPolicy::Pad,
        }
    }

    pub fn with_label_shift(mut self, label_shift: bool) -> Self {
        self.label_shift = label_shift;
        self
    }

    pub fn with_remainder_policy(mut self, policy: RemainderPolicy) -> Self {
        self.remainder_policy = policy;
        self
    }

    /// Tokens drained from the buffer per emitted unit.
    pub fn required_length(&self) -> Option<usize> {
        self.token_limit
            .checked_mul(self.batch_size)
            .and_then(|cells| cells.checked_add(usize::from(self.label_shift)))
    }

    fn validate(&self) -> Result<(TokenId, usize), PackError> {
        if self.token_limit == 0 {
            return Err(PackError::configuration("token_limit must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(PackError::configuration("batch_size must be at least 1"));
        }
        let delimiter = self
            .delimiter_id
            .ok_or_else(|| PackError::configuration("delimiter_id is required"))?;
        let required = self.required_length().ok_or_else(|| {
            PackError::configuration(format!(
                "token_limit ({}) * batch_size ({}) overflows",
                self.token_limit, self.batch_size
            ))
        })?;
        Ok((delimiter, required))
    }
}

// ─── Statistics ───────────────────────────────────────────────────────────────

/// Running counters of one packing run.
///
/// Once the input is exhausted and `finish` has run:
///   packed_tokens + dropped_tokens == input_tokens + delimiters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackStats {
    pub records:        usize,
    pub input_tokens:   usize,
    pub delimiters:     usize,
    /// Buffered tokens placed into emitted units (padding excluded)
    pub packed_tokens:  usize,
    /// Pad cells in emitted input_ids (mask bit 0); a pad that only
    /// shows up in the labels is not counted
    pub padding_tokens: usize,
    pub dropped_tokens: usize,
    pub units:          usize,
}

/// Outcome of `WindowPacker::finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remainder {
    /// The buffer was empty; nothing to do
    Empty,
    /// The tail, padded out to a full unit
    Padded(PackedBatch),
    /// The tail was discarded
    Dropped { tokens: usize },
}

// ─── WindowPacker ─────────────────────────────────────────────────────────────

/// Owns the rolling buffer. Single-threaded, single-owner.
#[derive(Debug, Clone)]
pub struct WindowPacker {
    config:    PackerConfig,
    delimiter: TokenId,
    required:  usize,
    tokens:    VecDeque<TokenId>,
    mask:      VecDeque<u8>,
    stats:     PackStats,
}

impl WindowPacker {
    /// Build a packer, rejecting unusable configurations up front.
    pub fn new(config: PackerConfig) -> Result<Self, PackError> {
        let (delimiter, required) = config.validate()?;
        Ok(Self {
            config,
            delimiter,
            required,
            tokens: VecDeque::new(),
            mask: VecDeque::new(),
            stats: PackStats::default(),
        })
    }

    pub fn config(&self) -> &PackerConfig {
        &self.config
    }

    pub fn required_length(&self) -> usize {
        self.required
    }

    pub fn stats(&self) -> PackStats {
        self.stats
    }

    /// Tokens currently waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.tokens.len()
    }

    /// Append one record and its delimiter to the buffer.
    pub fn push(&mut self, record: Record) {
        self.tokens.extend(record.ids().iter().copied());
        match record.mask() {
            Some(bits) => self.mask.extend(bits.iter().copied()),
            None => self.mask.extend(std::iter::repeat(1u8).take(record.len())),
        }
        self.tokens.push_back(self.delimiter);
        self.mask.push_back(1);

        self.stats.records += 1;
        self.stats.input_tokens += record.len();
        self.stats.delimiters += 1;
    }

    /// Drain one full unit from the front of the buffer, if enough
    /// tokens have accumulated.
    pub fn next_ready(&mut self) -> Option<PackedBatch> {
        if self.tokens.len() < self.required {
            return None;
        }
        let ids: Vec<TokenId> = self.tokens.drain(..self.required).collect();
        let mask: Vec<u8> = self.mask.drain(..self.required).collect();

        self.stats.packed_tokens += self.required;
        self.stats.units += 1;
        tracing::trace!(unit = self.stats.units - 1, buffered = self.tokens.len(), "packed unit");

        Some(self.assemble(ids, mask))
    }

    /// Apply the remainder policy to whatever is left in the buffer.
    ///
    /// Call this once, after the whole input has been pushed and every
    /// ready unit drained. The buffer is empty afterwards.
    pub fn finish(&mut self) -> Remainder {
        debug_assert!(self.tokens.len() < self.required, "drain ready units before finish");

        let leftover = self.tokens.len();
        if leftover == 0 {
            return Remainder::Empty;
        }

        match self.config.remainder_policy {
            RemainderPolicy::Pad => {
                let pad = self.required.saturating_sub(leftover);
                let mut ids: Vec<TokenId> = self.tokens.drain(..).collect();
                let mut mask: Vec<u8> = self.mask.drain(..).collect();
                ids.resize(ids.len() + pad, self.delimiter);
                mask.resize(mask.len() + pad, 0);

                // Under label shift the slice's last pad reaches only the labels
                let cells = self.required - usize::from(self.config.label_shift);
                self.stats.packed_tokens += leftover;
                self.stats.padding_tokens += cells.saturating_sub(leftover);
                self.stats.units += 1;
                tracing::debug!(leftover, pad, "padded final unit");

                Remainder::Padded(self.assemble(ids, mask))
            }
            RemainderPolicy::Drop => {
                self.tokens.clear();
                self.mask.clear();
                self.stats.dropped_tokens += leftover;
                tracing::info!(tokens = leftover, "dropped remainder at end of stream");

                Remainder::Dropped { tokens: leftover }
            }
        }
    }

    /// Lazily pack `records`, consuming this packer.
    pub fn pack<I>(self, records: I) -> PackStream<impl Iterator<Item = Result<I::Item, PackError>>>
    where
        I: IntoIterator,
    {
        self.try_pack(records.into_iter().map(Ok::<_, PackError>))
    }

    /// Lazily pack a fallible source, consuming this packer.
    ///
    /// The first upstream `Err` is passed through as is and ends the
    /// stream; the buffered tail is then neither padded nor dropped.
    pub fn try_pack<I, R, E>(self, records: I) -> PackStream<I::IntoIter, E>
    where
        I: IntoIterator<Item = Result<R, E>>,
    {
        PackStream {
            packer:  self,
            records: records.into_iter(),
            index:   0,
            done:    false,
            error:   PhantomData,
        }
    }

    /// Split a drained slice of `required` tokens into the unit shape.
    fn assemble(&self, mut ids: Vec<TokenId>, mut mask: Vec<u8>) -> PackedBatch {
        let cells = self.config.token_limit * self.config.batch_size;
        // Row i of the labels is ids[i*T+1 ..= (i+1)*T], which is the
        // contiguous run ids[1..=cells] cut into rows
        let labels = self.config.label_shift.then(|| ids[1..].to_vec());
        ids.truncate(cells);
        mask.truncate(cells);
        PackedBatch::new(self.config.batch_size, self.config.token_limit, ids, mask, labels)
    }
}

/// Convenience: validate `config` and lazily pack `records`.
pub fn pack<I>(
    config: PackerConfig,
    records: I,
) -> Result<PackStream<impl Iterator<Item = Result<I::Item, PackError>>>, PackError>
where
    I: IntoIterator,
{
    Ok(WindowPacker::new(config)?.pack(records))
}

// ─── PackStream ───────────────────────────────────────────────────────────────

/// Lazy, finite, non-restartable stream of packed units.
///
/// A record is only pulled from the input once the buffer has no
/// full unit left to give. A malformed record ends the stream with
/// a single `PackError::InvalidRecord`, converted into `E`.
pub struct PackStream<I, E = PackError> {
    packer:  WindowPacker,
    records: I,
    index:   usize,
    done:    bool,
    error:   PhantomData<fn() -> E>,
}

impl<I, E> PackStream<I, E> {
    pub fn stats(&self) -> PackStats {
        self.packer.stats()
    }

    pub fn packer(&self) -> &WindowPacker {
        &self.packer
    }
}

impl<I, R, E> Iterator for PackStream<I, E>
where
    I: Iterator<Item = Result<R, E>>,
    R: TryInto<Record>,
    R::Error: Into<InvalidToken>,
    E: From<PackError>,
{
    type Item = Result<PackedBatch, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(unit) = self.packer.next_ready() {
                return Some(Ok(unit));
            }
            match self.records.next() {
                Some(Ok(raw)) => match raw.try_into() {
                    Ok(record) => {
                        self.packer.push(record);
                        self.index += 1;
                    }
                    Err(err) => {
                        self.done = true;
                        let err = PackError::InvalidRecord { index: self.index, source: err.into() };
                        return Some(Err(err.into()));
                    }
                },
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return match self.packer.finish() {
                        Remainder::Padded(unit) => Some(Ok(unit)),
                        Remainder::Empty | Remainder::Dropped { .. } => None,
                    };
                }
            }
        }
    }
}

impl<I, R, E> std::iter::FusedIterator for PackStream<I, E>
where
    I: Iterator<Item = Result<R, E>>,
    R: TryInto<Record>,
    R::Error: Into<InvalidToken>,
    E: From<PackError>,
{
}
