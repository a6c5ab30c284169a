//! Reference index assembly.
//!
//! Named reference sequences are concatenated, densely, into one packed
//! forward buffer; per-sequence holes are shifted into the global coordinate
//! space; the search structure is built once over the doubled
//! (forward + reverse-complement) buffer. The builder is single-use:
//! `finalize` consumes it, so entries cannot be added afterwards and the
//! build step cannot run twice.

use crate::engine::{AlignmentEngine, EngineOptions, FmEngine};
use crate::error::{Error, Result};
use crate::pac::PacVec;
use crate::sequence::{Hole, PackedSequence};

/// Annotation for one named sequence inside the concatenated buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Sequence name (e.g. "chr1").
    pub name: String,
    /// Cumulative start position inside the concatenated packed buffer.
    pub offset: u64,
    /// Length of this sequence.
    pub length: u32,
    /// Number of ambiguity runs contributed by this sequence.
    pub hole_count: u32,
}

/// Accumulates reference sequences until `finalize` builds the immutable
/// search-ready index.
#[derive(Default)]
pub struct ReferenceIndexBuilder {
    annotations: Vec<ReferenceEntry>,
    forward_pac: PacVec,
    holes: Vec<Hole>,
}

impl ReferenceIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sequences added so far.
    pub fn entry_count(&self) -> usize {
        self.annotations.len()
    }

    /// Encode `text` and append it as a named reference entry.
    ///
    /// A failed add leaves the builder exactly as it was: the sequence is
    /// fully validated and encoded before any buffer is touched.
    pub fn add(&mut self, name: &str, text: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyInput("reference name"));
        }
        if text.is_empty() {
            return Err(Error::EmptyInput("reference sequence"));
        }
        let seq = PackedSequence::from_text(text)?;

        let offset = self.forward_pac.len() as u64;
        for i in 0..seq.len() as usize {
            self.forward_pac.push(seq.code_at(i));
        }
        for hole in seq.holes() {
            self.holes.push(Hole {
                offset: offset + hole.offset,
                ..*hole
            });
        }
        self.annotations.push(ReferenceEntry {
            name: name.to_owned(),
            offset,
            length: seq.len(),
            hole_count: seq.holes().len() as u32,
        });
        log::debug!(
            "added reference '{}' at offset {} ({} bases, {} holes)",
            name,
            offset,
            seq.len(),
            seq.holes().len()
        );
        Ok(())
    }

    /// Build the immutable index: double the forward buffer with its full
    /// reverse-complement and hand it to the alignment engine.
    ///
    /// The occurrence cap passed to the engine grows with reference
    /// cardinality, mirroring bwa's `max(500, 2 * n_refs)` tuning.
    pub fn finalize(self, mut options: EngineOptions) -> Result<ReferenceIndex> {
        if self.annotations.is_empty() {
            return Err(Error::EmptyInput("reference set"));
        }

        let total = self.forward_pac.len();
        let mut bwt_pac = self.forward_pac.clone();
        for i in (0..total).rev() {
            bwt_pac.push(3 - self.forward_pac.get(i));
        }

        options.max_occ = options.max_occ.max(self.annotations.len() * 2);
        let engine = FmEngine::build(&bwt_pac, options)?;

        log::info!(
            "finalized reference index: {} sequences, {} bases, {} holes",
            self.annotations.len(),
            total,
            self.holes.len()
        );

        Ok(ReferenceIndex {
            forward_pac: self.forward_pac,
            bwt_pac,
            annotations: self.annotations,
            holes: self.holes,
            engine: Box::new(engine),
        })
    }
}

/// Assembled, immutable, search-ready reference index.
///
/// Shared by reference across worker threads; nothing is mutated by search.
pub struct ReferenceIndex {
    forward_pac: PacVec,
    bwt_pac: PacVec,
    annotations: Vec<ReferenceEntry>,
    holes: Vec<Hole>,
    pub(crate) engine: Box<dyn AlignmentEngine>,
}

impl ReferenceIndex {
    /// Total forward length in bases; the doubled buffer is twice this.
    pub fn forward_len(&self) -> u64 {
        self.forward_pac.len() as u64
    }

    /// Concatenated forward packed buffer.
    pub fn forward_pac(&self) -> &PacVec {
        &self.forward_pac
    }

    /// Forward buffer followed by its full reverse-complement.
    pub fn bwt_pac(&self) -> &PacVec {
        &self.bwt_pac
    }

    /// Per-sequence annotations, sorted by offset, contiguous.
    pub fn annotations(&self) -> &[ReferenceEntry] {
        &self.annotations
    }

    /// Ambiguity runs in global concatenated coordinates.
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    /// Index of the entry containing forward position `pos`, if any.
    pub(crate) fn entry_for(&self, pos: u64) -> Option<usize> {
        if pos >= self.forward_len() {
            return None;
        }
        // Entries are contiguous and sorted by offset.
        Some(self.annotations.partition_point(|ann| ann.offset <= pos) - 1)
    }
}
