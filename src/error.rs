use thiserror::Error;

/// Failures surfaced by tree mutators and node preloading.
///
/// A key that is simply absent is not an error: lookups, deletes and
/// `tag_clear` report it as `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A node could be obtained neither from the allocator nor from a preload pool.
    #[error("out of memory allocating a radix tree node")]
    OutOfMemory,
    /// `insert` targeted an index that already holds an item.
    #[error("index {index} is already occupied")]
    AlreadyExists { index: u64 },
    /// A tag mutator targeted an index that holds no item.
    #[error("no item stored at index {index}")]
    NoSuchKey { index: u64 },
    #[error("invalid tree configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
