//! Query descriptor

/// Kind of GPU query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Number of samples that passed the depth/stencil test
    Occlusion,
    /// Non-zero when any sample passed (result is 0 or 1)
    AnyOcclusion,
}

/// Descriptor for creating a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryCreationDescription {
    pub query_type: QueryType,
}

impl QueryCreationDescription {
    pub fn new(query_type: QueryType) -> Self {
        Self { query_type }
    }
}
