//! Library-owned error surface, unified behind a single `thiserror` enum.

use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A `{param}` token in a builder template has no bound value.
    #[error("invalid param: {0}")]
    InvalidParam(String),

    /// Reserved for a future strict mode; the default builder tolerates
    /// missing `<input>` tokens by expanding them to the empty string.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A scan/bind destination was not a pointer.
    #[error("destination must be a pointer")]
    DestMustBePointer,

    /// A scan/bind destination was a nil pointer.
    #[error("destination must be a non-nil pointer")]
    DestMustBeNonNilPointer,

    /// A row-list bind destination was not a slice/vec.
    #[error("destination must be a slice")]
    DestMustBeSlice,

    /// A struct-shaped bind destination was required but not provided.
    #[error("destination must be a struct")]
    DestMustBeStruct,

    /// The destination type implements none of the binding capabilities.
    #[error("destination type is not bindable")]
    DestNotBindable,

    /// A map-shaped bind destination used a non-string key type.
    #[error("map destination key must be a string")]
    MapKeyMustBeString,

    /// `on_dht` was called with a DHT name that was never registered.
    #[error("missing dht: {0}")]
    MissingDht(String),

    /// A key is mid-migration: it currently lives on `current` but a
    /// scale-out in progress will move it to `next`. Non-fatal; callers
    /// decide whether to read-from-current, dual-write, or retry later.
    #[error("item busy: migrating from database {current} to {next}")]
    ItemBusy {
        /// Database index the key currently resolves to.
        current: usize,
        /// Database index the key will resolve to once migration ends.
        next: usize,
    },

    /// A DHT lookup or registration was attempted with no ring configured.
    #[error("dht is not initialized")]
    NilDht,

    /// Unwrapped backend driver error.
    #[error(transparent)]
    Db(#[from] sqlx::Error),

    /// A spawned Map/Reduce task panicked or was aborted before it could
    /// report its own result.
    #[error("task join failed: {0}")]
    Join(String),

    /// An ambient cancellation token fired before the driver call returned.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
