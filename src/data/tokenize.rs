// ============================================================
// Layer 4 - Tokenizing Record Source
// ============================================================
// Turns a stream of abstracts into a stream of Records for the
// packer, one record per abstract, in input order.
//
// Abstracts are pulled in chunks (1000 by default) and each
// chunk goes through `Tokenizer::encode_batch`, which spreads
// the work over the tokenizer's own thread pool and hands the
// encodings back in input order. Only one chunk is in memory at
// a time.
//
// Special tokens are not added: the packer appends the
// delimiter itself.
//
// Corpora tokenised elsewhere come in through
// `PretokenizedRecords` instead: JSONL lines of the form
//   {"input_ids": [464, 3290, ...], "attention_mask": [1, 1, ...]}
// with the mask optional. Ids must be integers in the u32 range
// and a bad line fails with the index of the record it held.
//
// Reference: tokenizers crate documentation
//            Rust Book §13 (Iterators)

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tokenizers::Tokenizer;

use crate::domain::abstract_record::Abstract;
use crate::domain::error::{InvalidToken, PackError};
use crate::domain::record::{Record, TokenId};

/// Default number of abstracts tokenised per `encode_batch` call
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Encode a group of texts, preserving order.
pub fn encode_chunk(tokenizer: &Tokenizer, texts: Vec<String>) -> Result<Vec<Record>> {
    let encodings = tokenizer
        .encode_batch(texts, false)
        .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
    Ok(encodings
        .into_iter()
        .map(|enc| Record::new(enc.get_ids().to_vec()))
        .collect())
}

/// Lazily tokenises abstracts chunk by chunk.
pub struct TokenizingSource<'t, I> {
    tokenizer:  &'t Tokenizer,
    abstracts:  I,
    chunk_size: usize,
    ready:      VecDeque<Record>,
    exhausted:  bool,
}

impl<'t, I> TokenizingSource<'t, I>
where
    I: Iterator<Item = Result<Abstract>>,
{
    pub fn new(tokenizer: &'t Tokenizer, abstracts: I, chunk_size: usize) -> Self {
        Self {
            tokenizer,
            abstracts,
            chunk_size: chunk_size.max(1),
            ready: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Read up to one chunk of abstracts and tokenise it.
    fn refill(&mut self) -> Result<()> {
        let mut texts = Vec::with_capacity(self.chunk_size);
        while texts.len() < self.chunk_size {
            match self.abstracts.next() {
                Some(item) => texts.push(item?.text),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if !texts.is_empty() {
            tracing::trace!("Tokenising chunk of {} abstracts", texts.len());
            self.ready.extend(encode_chunk(self.tokenizer, texts)?);
        }
        Ok(())
    }
}

impl<'t, I> Iterator for TokenizingSource<'t, I>
where
    I: Iterator<Item = Result<Abstract>>,
{
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ready.is_empty() && !self.exhausted {
            if let Err(e) = self.refill() {
                // Fail fast: nothing after a bad chunk is trustworthy
                self.exhausted = true;
                self.ready.clear();
                return Some(Err(e));
            }
        }
        self.ready.pop_front().map(Ok)
    }
}

// ─── Pre-tokenised Input ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenLine {
    // Kept untyped so a float or string id is a rejected record, not bad JSON
    input_ids:      Vec<Value>,
    #[serde(default)]
    attention_mask: Option<Vec<u8>>,
}

impl TryFrom<TokenLine> for Record {
    type Error = InvalidToken;

    fn try_from(line: TokenLine) -> Result<Self, Self::Error> {
        let ids = token_ids(&line.input_ids)?;
        match line.attention_mask {
            Some(mask) => Record::with_mask(ids, mask),
            None => Ok(Record::new(ids)),
        }
    }
}

fn token_ids(raw: &[Value]) -> Result<Vec<TokenId>, InvalidToken> {
    raw.iter()
        .enumerate()
        .map(|(position, value)| {
            let Value::Number(n) = value else {
                return Err(InvalidToken::NotInteger { position });
            };
            if let Some(id) = n.as_u64() {
                TokenId::try_from(id)
                    .map_err(|_| InvalidToken::OutOfRange { position, value: id.into() })
            } else if let Some(id) = n.as_i64() {
                Err(InvalidToken::OutOfRange { position, value: id.into() })
            } else {
                Err(InvalidToken::NotInteger { position })
            }
        })
        .collect()
}

/// Lazily read pre-tokenised records from a JSONL file.
pub struct PretokenizedRecords<B> {
    path:   PathBuf,
    lines:  Lines<B>,
    line:   usize,
    record: usize,
}

impl PretokenizedRecords<BufReader<File>> {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        Ok(Self::from_reader(path, BufReader::new(file)))
    }
}

impl<B: BufRead> PretokenizedRecords<B> {
    /// `path` is only used in error messages.
    pub fn from_reader(path: impl Into<PathBuf>, reader: B) -> Self {
        Self { path: path.into(), lines: reader.lines(), line: 0, record: 0 }
    }

    fn parse(&mut self, text: &str) -> Result<Record> {
        let parsed: TokenLine = serde_json::from_str(text)
            .with_context(|| format!("Bad JSON at {}:{}", self.path.display(), self.line))?;
        let index = self.record;
        self.record += 1;
        Record::try_from(parsed)
            .map_err(|source| PackError::InvalidRecord { index, source })
            .with_context(|| format!("Rejected record at {}:{}", self.path.display(), self.line))
    }
}

impl<B: BufRead> Iterator for PretokenizedRecords<B> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let text = match line {
                Ok(text) => text,
                Err(e) => {
                    return Some(Err(anyhow::Error::new(e)
                        .context(format!("Cannot read '{}'", self.path.display()))))
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(self.parse(&text));
        }
    }
}
