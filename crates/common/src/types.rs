use serde::{Deserialize, Serialize};

/// Identifies one saga instance.
///
/// `name` is the logical saga type, stable across every instance of the
/// same workflow (e.g. "deploy"); `id` is unique to this instance. Together
/// they form the key under which the saga's event log is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SagaId {
    name: String,
    id: String,
}

impl SagaId {
    /// Creates a saga identity from a saga type name and an instance id.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// Returns the logical saga type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unique instance identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.id)
    }
}
