//! DOM operation errors

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Cyclic insertion, disallowed child type, or document cardinality violation
    #[error("Hierarchy request error: the node cannot be inserted here")]
    HierarchyRequest,

    /// Reference node is not a child of the given parent
    #[error("Not found: the node is not a child of this node")]
    NotFound,

    /// Target is read-only
    #[error("No modification allowed: the node is read-only")]
    NoModificationAllowed,

    /// Prefix/namespace combination is invalid
    #[error("Namespace error: invalid prefix or namespace")]
    Namespace,

    /// Name contains characters not allowed by the XML Name production
    #[error("Invalid character in name")]
    InvalidCharacter,

    /// Shadow root operation on a root that no longer has a host
    #[error("Invalid access: the shadow root has no host")]
    InvalidAccess,

    /// Host already has a shadow root
    #[error("Not supported: a host carries a single shadow root")]
    NotSupported,

    /// Operation applied to the wrong kind of node
    #[error("Invalid node type for this operation")]
    InvalidNodeType,
}
