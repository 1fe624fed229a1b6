use serde::{Deserialize, Serialize};

/// Immutable descriptor for one camera in the fleet.
///
/// The registry of descriptors is loaded once at startup and never
/// mutated for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDescriptor {
    id: String,
    display_name: String,
    location: String,
}

impl CameraDescriptor {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            location: location.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}
