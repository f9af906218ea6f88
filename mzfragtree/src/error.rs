//! The [`TreeError`] which makes it easy for downstream users of the error type to match on the exact error.

use context_error::ErrorKind;

/// All kinds of errors that can be raised when building or solving fragmentation graphs.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum TreeError {
    /// The graph definition is invalid (edge out of range, self loop, multiple roots, non finite score, malformed JSON)
    #[default]
    InvalidGraph,
    /// The edges of the graph contain a cycle
    CyclicGraph,
    /// The requested root is not a node in the graph
    InvalidRoot,
    /// The builder settings are out of range
    InvalidSettings,
    /// The prepared state was made for a graph of a different shape
    PreparationMismatch,
    /// The solve was aborted by the caller
    Aborted,
}

impl ErrorKind for TreeError {
    type Settings = ();
    fn descriptor(&self) -> &'static str {
        "error"
    }
    fn ignored(&self, _settings: Self::Settings) -> bool {
        false
    }
    fn is_error(&self, _settings: Self::Settings) -> bool {
        true
    }
}

/// The result type used throughout this crate
pub type TreeResult<T> = Result<T, context_error::BoxedError<'static, TreeError>>;
