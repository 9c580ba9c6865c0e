use thiserror::Error;

/// The result type for the `rngtables` crate.
pub type Result<T> = std::result::Result<T, RngError>;

/// The error type for the `rngtables` crate.
#[derive(Error, Debug)]
pub struct RngError {
    /// The source of the error.
    pub source: Box<RngErrorKind>,
}

impl RngError {
    /// Create a new `RngError`.
    pub fn new(kind: RngErrorKind) -> Self {
        RngError {
            source: Box::new(kind),
        }
    }
}

impl std::fmt::Display for RngError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum RngErrorKind {
    /// An element in the input schema is not under the RELAX NG structure namespace.
    #[error("element '{0}' is not in the RELAX NG namespace")]
    SchemaWrongNamespace(String),

    /// An element has a local name the loader does not recognize.
    #[error("unknown schema element '{0}'")]
    SchemaUnknownElement(String),

    /// An `attribute` construct used a name class other than a single `name`.
    #[error("attribute name class unsupported: {0}")]
    AttrNameClassUnsupported(String),

    /// Two defines nullable in the same child state produced conflicting successor states.
    #[error("ambiguous child transition for define '{0}': state {1} and state {2}")]
    AmbiguousChildTransition(String, usize, usize),

    /// A `ref` named a `define` that does not exist in the schema.
    #[error("reference to undefined define '{0}'")]
    UndefinedReference(String),

    /// An impossible internal state was reached.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),

    /// A std::io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The input document could not be parsed as XML.
    #[error("malformed schema document: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The output tables could not be serialized as JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for RngError {
    fn from(error: std::io::Error) -> Self {
        RngError::new(RngErrorKind::Io(error))
    }
}

impl From<roxmltree::Error> for RngError {
    fn from(error: roxmltree::Error) -> Self {
        RngError::new(RngErrorKind::Xml(error))
    }
}

impl From<serde_json::Error> for RngError {
    fn from(error: serde_json::Error) -> Self {
        RngError::new(RngErrorKind::Json(error))
    }
}
