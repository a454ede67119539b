// ============================================================
// Layer 4 - PubMed Loader
// ============================================================
// Reads gzip-compressed PubMed XML archives and the JSONL
// staging files produced from them.
//
// The part of a PubMed archive we care about looks like:
//   PubmedArticleSet
//     └── PubmedArticle
//           └── MedlineCitation
//                 ├── PMID                     ← pmid
//                 └── Article
//                       └── Abstract
//                             └── AbstractText ← first one only
//
// The archive is streamed event by event (quick-xml over a
// flate2 GzDecoder), so a 300 MB file never sits in memory as
// a tree. Text nested inside AbstractText (<i>, <sup>, ...)
// is kept; the markup itself is dropped.
//
// Reference: quick-xml and flate2 crate documentation
//            Rust Book §9 (Error Handling)

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::domain::abstract_record::Abstract;
use crate::domain::traits::AbstractSource;

const CITATION: &[u8] = b"MedlineCitation";
const PMID_PATH: &[&[u8]] = &[b"MedlineCitation", b"PMID"];
const ABSTRACT_PATH: &[&[u8]] = &[b"MedlineCitation", b"Article", b"Abstract", b"AbstractText"];

/// Extracts abstracts from `*.xml.gz` PubMed archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct PubmedXmlLoader;

impl PubmedXmlLoader {
    pub fn new() -> Self {
        Self
    }
}

impl AbstractSource for PubmedXmlLoader {
    fn load_file(&self, path: &Path) -> Result<Vec<Abstract>> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        let reader = BufReader::new(GzDecoder::new(file));
        let abstracts = parse_citations(reader)
            .with_context(|| format!("Cannot parse '{}'", path.display()))?;

        tracing::debug!("Parsed {} abstracts from '{}'", abstracts.len(), path.display());
        Ok(abstracts)
    }
}

/// List the archives to extract, sorted by path.
///
/// With a file list, each non-blank line names a file inside
/// `input_dir`. Without one, every `*.xml.gz` in `input_dir` is used.
pub fn list_archives(input_dir: &Path, file_list: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = match file_list {
        Some(list) => fs::read_to_string(list)
            .with_context(|| format!("Cannot read file list '{}'", list.display()))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|name| input_dir.join(name))
            .collect(),
        None => {
            let entries = fs::read_dir(input_dir)
                .with_context(|| format!("Cannot read directory '{}'", input_dir.display()))?;
            let mut found = Vec::new();
            for entry in entries {
                let path = entry?.path();
                let is_archive = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(".xml.gz"));
                if is_archive {
                    found.push(path);
                }
            }
            found
        }
    };

    if files.is_empty() {
        bail!("No .xml.gz archives found under '{}'", input_dir.display());
    }
    files.sort();
    Ok(files)
}

/// Pull every citation with a non-blank abstract out of an XML stream.
pub fn parse_citations<R: BufRead>(input: R) -> Result<Vec<Abstract>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut citation: Option<Citation> = None;
    let mut abstracts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == CITATION {
                    citation = Some(Citation::new(path.len()));
                }
                path.push(name);
                if let Some(c) = citation.as_mut() {
                    c.enter(&path);
                }
            }
            Event::End(_) => {
                if let Some(c) = citation.as_mut() {
                    c.leave(path.len());
                }
                let closed = path.pop();
                if closed.as_deref() == Some(CITATION) {
                    if let Some(found) = citation.take().and_then(Citation::finish) {
                        abstracts.push(found);
                    }
                }
            }
            Event::Text(t) => {
                if let Some(c) = citation.as_mut().filter(|c| c.capturing()) {
                    c.push_text(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some(c) = citation.as_mut().filter(|c| c.capturing()) {
                    c.push_text(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(abstracts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pmid,
    Text,
}

/// Parse state for the MedlineCitation currently open.
#[derive(Debug)]
struct Citation {
    /// Depth of the MedlineCitation element in the document
    root:    usize,
    pmid:    Option<String>,
    text:    Option<String>,
    /// Field being captured and the depth of its element
    capture: Option<(Field, usize)>,
}

impl Citation {
    fn new(root: usize) -> Self {
        Self { root, pmid: None, text: None, capture: None }
    }

    fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn enter(&mut self, path: &[Vec<u8>]) {
        if self.capture.is_some() {
            return;
        }
        let relative = &path[self.root..];
        let is_at = |want: &[&[u8]]| relative.iter().map(Vec::as_slice).eq(want.iter().copied());

        if self.pmid.is_none() && is_at(PMID_PATH) {
            self.pmid = Some(String::new());
            self.capture = Some((Field::Pmid, path.len()));
        } else if self.text.is_none() && is_at(ABSTRACT_PATH) {
            self.text = Some(String::new());
            self.capture = Some((Field::Text, path.len()));
        }
    }

    fn leave(&mut self, depth: usize) {
        if matches!(self.capture, Some((_, d)) if d == depth) {
            self.capture = None;
        }
    }

    fn push_text(&mut self, s: &str) {
        let slot = match self.capture {
            Some((Field::Pmid, _)) => &mut self.pmid,
            Some((Field::Text, _)) => &mut self.text,
            None => return,
        };
        if let Some(value) = slot.as_mut() {
            value.push_str(s);
        }
    }

    fn finish(self) -> Option<Abstract> {
        let found = Abstract::new(
            self.pmid.map(|p| p.trim().to_string()).unwrap_or_default(),
            self.text.unwrap_or_default(),
        );
        (!found.is_blank()).then_some(found)
    }
}

// ─── JSONL Staging Files ──────────────────────────────────────────────────────

/// Lazily read `{"pmid", "abstract"}` lines from a JSONL file.
pub struct JsonlAbstracts {
    path:  PathBuf,
    lines: Lines<BufReader<File>>,
    line:  usize,
}

impl JsonlAbstracts {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::open(&path)
            .with_context(|| format!("Cannot open '{}'", path.display()))?;
        Ok(Self { path, lines: BufReader::new(file).lines(), line: 0 })
    }
}

impl Iterator for JsonlAbstracts {
    type Item = Result<Abstract>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let parsed = line
                .with_context(|| format!("Cannot read '{}'", self.path.display()))
                .and_then(|l| {
                    if l.trim().is_empty() {
                        return Ok(None);
                    }
                    serde_json::from_str::<Abstract>(&l).map(Some).with_context(|| {
                        format!("Bad JSON at {}:{}", self.path.display(), self.line)
                    })
                });
            match parsed {
                Ok(Some(a)) => return Some(Ok(a)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
