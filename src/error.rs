//! Error taxonomy for codec, assembly and search operations.
//!
//! Precondition violations (double finalize, add after finalize, search
//! before build) are not represented here: the builder is consumed by
//! `finalize`, so those states cannot be expressed in the type system.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Text contains a character outside the allowed nucleotide alphabet.
    /// Recoverable; the caller must reject or clean its input.
    #[error("invalid nucleotide: '{symbol}'")]
    InvalidSymbol { symbol: char },

    /// Sequence length exceeds the addressable range of the packed
    /// representation (4 x length must fit a 32-bit byte offset).
    #[error("provided sequence is too long ({len} symbols)")]
    SequenceTooLong { len: usize },

    /// Empty name or sequence passed to index assembly.
    #[error("empty {0} passed to index assembly")]
    EmptyInput(&'static str),

    /// A serialized sequence blob does not describe a valid sequence.
    #[error("malformed sequence blob: {0}")]
    MalformedBlob(&'static str),

    /// I/O error while reading or writing a serialized blob.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Opaque failure surfaced from the alignment engine, propagated
    /// unchanged.
    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}
