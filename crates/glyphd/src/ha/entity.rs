use serde::Deserialize;
use serde::Serialize;

/// Entity domains the display can meaningfully toggle.
pub const CONTROLLABLE_DOMAINS: &[&str] =
    &["light", "switch", "fan", "input_boolean", "automation"];

/// An entity as returned by `GET /api/states`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Domain-prefixed id, e.g. "light.kitchen"
    pub entity_id: String,

    /// Raw state string ("on", "off", "unavailable", ...)
    pub state: String,

    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
}

impl Entity {
    pub fn is_on(&self) -> bool {
        self.state == "on"
    }

    /// Friendly name, falling back to the entity id.
    pub fn display_name(&self) -> &str {
        self.attributes
            .friendly_name
            .as_deref()
            .unwrap_or(&self.entity_id)
    }

    /// The part of the id before the first `.`.
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map(|(domain, _)| domain)
            .unwrap_or(&self.entity_id)
    }

    pub fn is_controllable(&self) -> bool {
        CONTROLLABLE_DOMAINS.contains(&self.domain())
    }

    /// Case-insensitive substring match on display name or id. A blank query
    /// matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.display_name().to_lowercase().contains(&query)
            || self.entity_id.to_lowercase().contains(&query)
    }
}
