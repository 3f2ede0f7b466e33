use thiserror::Error;

/// Top-level error type for the skeletonization pipeline.
#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid periodic box: {0}")]
    InvalidBox(String),

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("non-finite coordinate on {0}")]
    NonFinite(String),
}

/// Errors related to the skeleton graph structure.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("cannot connect node {0} to itself")]
    SelfLoop(u32),

    #[error("adjacency is not symmetric between nodes {0} and {1}")]
    BrokenSymmetry(u32, u32),

    #[error("invalid dislocation: {0}")]
    InvalidDislocation(String),
}

/// Errors related to pipeline operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Convenience type alias for results using [`SkeletonError`].
pub type Result<T> = std::result::Result<T, SkeletonError>;
