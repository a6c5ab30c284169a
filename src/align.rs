//! Query execution: raw engine hits to structured match records.

use crate::cigar;
use crate::error::Result;
use crate::reference::ReferenceIndex;
use crate::sequence::PackedSequence;

/// One hit of a query against one reference entry.
///
/// Reference coordinates are half-open, local to the named entry, and always
/// expressed on the forward strand. `ref_id` borrows the entry's name from
/// the index and is valid for the index's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentMatch<'idx> {
    pub ref_id: &'idx str,
    pub ref_begin: u64,
    pub ref_end: u64,
    pub query_subseq: String,
    pub query_begin: u32,
    pub query_end: u32,
    pub is_primary: bool,
    pub is_secondary: bool,
    pub is_reverse: bool,
    pub cigar: String,
    pub score: i32,
}

impl AlignmentMatch<'_> {
    /// Reference bases covered by the hit.
    pub fn ref_len(&self) -> u64 {
        self.ref_end - self.ref_begin
    }

    /// Query bases covered by the hit.
    pub fn query_len(&self) -> u32 {
        self.query_end - self.query_begin
    }
}

impl ReferenceIndex {
    /// Run one query against the index.
    ///
    /// An empty result list is a valid outcome, not an error.
    pub fn search(&self, query_text: &str) -> Result<Vec<AlignmentMatch<'_>>> {
        let query = PackedSequence::from_text(query_text)?;
        let codes: Vec<u8> = (0..query.len() as usize).map(|i| query.code_at(i)).collect();
        let hits = self.engine.find_regions(&codes)?;

        let l = self.forward_len();
        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            // A hit in the second half of the doubled axis sits on the
            // reverse-complement strand; fold it back onto the forward axis.
            let is_reverse = hit.ref_begin >= l;
            let (fwd_begin, fwd_end) = if is_reverse {
                (2 * l - hit.ref_end, 2 * l - hit.ref_begin)
            } else {
                (hit.ref_begin, hit.ref_end)
            };

            let Some(rid) = self.entry_for(fwd_begin) else {
                continue;
            };
            let entry = &self.annotations()[rid];
            if fwd_end > entry.offset + entry.length as u64 {
                log::debug!(
                    "dropping hit [{}, {}) bridging reference boundary after '{}'",
                    fwd_begin,
                    fwd_end,
                    entry.name
                );
                continue;
            }

            // The consumed query span comes from the operation list, not the
            // raw begin/end pair.
            let (start, consumed) = cigar::consumed_span(&hit.ops);
            matches.push(AlignmentMatch {
                ref_id: &entry.name,
                ref_begin: fwd_begin - entry.offset,
                ref_end: fwd_end - entry.offset,
                query_subseq: query_text[start..start + consumed].to_string(),
                query_begin: hit.query_begin as u32,
                query_end: hit.query_end as u32,
                is_primary: !hit.is_secondary,
                is_secondary: hit.is_secondary,
                is_reverse,
                cigar: cigar::to_string(&hit.ops),
                score: hit.score,
            });
        }
        log::debug!(
            "query of {} bases produced {} matches",
            query.len(),
            matches.len()
        );
        Ok(matches)
    }
}
