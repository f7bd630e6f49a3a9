//! Agent discovery and capability types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Protocol version advertised in agent cards.
pub const AGENT_PROTOCOL_VERSION: &str = "0.3.0";

/// Agent Card for discovery.
///
/// The card is served as a JSON document and describes the agent, its
/// capabilities, skills, and the transports it is reachable over. An agent
/// that speaks MXP advertises the endpoint both in
/// `capabilities.mxpEndpoint` and as an `additionalInterfaces` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// A2A protocol version, [`AGENT_PROTOCOL_VERSION`]
    pub protocol_version: String,

    /// Name of the agent
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Primary URL the agent is served from
    pub url: String,

    /// Organization providing the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,

    /// Agent version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// What the agent can do at the protocol level
    pub capabilities: AgentCapabilities,

    /// Skills the agent advertises
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<AgentSkill>,

    /// Input modes accepted when a skill does not override them
    pub default_input_modes: Vec<String>,

    /// Output modes produced when a skill does not override them
    pub default_output_modes: Vec<String>,

    /// Further transport interfaces beyond the primary URL
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_interfaces: Vec<AgentInterface>,

    /// Supported authentication schemes, keyed by scheme name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub security_schemes: HashMap<String, SecurityScheme>,
}

impl AgentCard {
    /// Create a card with empty capabilities and text-only modes.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            protocol_version: AGENT_PROTOCOL_VERSION.to_string(),
            name: name.into(),
            description: description.into(),
            url: url.into(),
            provider: None,
            version: None,
            capabilities: AgentCapabilities::default(),
            skills: Vec::new(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            additional_interfaces: Vec::new(),
            security_schemes: HashMap::new(),
        }
    }

    /// Set the capabilities.
    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Add a skill.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }

    /// Set the agent version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: AgentProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add a security scheme under the given name.
    pub fn with_security_scheme(
        mut self,
        name: impl Into<String>,
        scheme: SecurityScheme,
    ) -> Self {
        self.security_schemes.insert(name.into(), scheme);
        self
    }

    /// Advertise an MXP endpoint: sets the capability flags and mirrors the
    /// endpoint into `additionalInterfaces`.
    pub fn with_mxp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.capabilities.mxp_transport = true;
        self.capabilities.mxp_endpoint = Some(endpoint.clone());
        self.additional_interfaces.push(AgentInterface {
            url: endpoint,
            transport: "mxp".to_string(),
        });
        self
    }
}

/// Protocol-level capabilities of an agent.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Supports streaming responses
    #[serde(default)]
    pub streaming: bool,

    /// Supports push notifications via webhooks
    #[serde(default)]
    pub push_notifications: bool,

    /// Exposes task state transition history
    #[serde(default)]
    pub state_transition_history: bool,

    /// Reachable over MXP
    #[serde(default)]
    pub mxp_transport: bool,

    /// MXP endpoint URL (`mxp://…`) when `mxp_transport` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mxp_endpoint: Option<String>,
}

impl AgentCapabilities {
    /// Capabilities with every flag off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable streaming.
    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Enable push notifications.
    pub fn with_push_notifications(mut self) -> Self {
        self.push_notifications = true;
        self
    }

    /// Enable state transition history.
    pub fn with_state_transition_history(mut self) -> Self {
        self.state_transition_history = true;
        self
    }
}

/// Organization behind an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentProvider {
    /// Organization name
    pub organization: String,

    /// Organization URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A skill an agent advertises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    /// Skill identifier, unique within the card
    pub id: String,

    /// Display name
    pub name: String,

    /// What the skill does
    pub description: String,

    /// Search tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Example prompts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,

    /// Input modes overriding the card defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_modes: Vec<String>,

    /// Output modes overriding the card defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_modes: Vec<String>,
}

impl AgentSkill {
    /// Create a skill with the given identifier, name, and description.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            examples: Vec::new(),
            input_modes: Vec::new(),
            output_modes: Vec::new(),
        }
    }

    /// Add search tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add example prompts.
    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }
}

/// A transport interface entry in an agent card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentInterface {
    /// Endpoint URL
    pub url: String,

    /// Transport name (e.g. "jsonrpc", "mxp")
    pub transport: String,
}

/// Authentication scheme for reaching an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    /// API key in a header, query parameter, or cookie
    #[serde(rename_all = "camelCase")]
    ApiKey {
        /// Where the key is carried ("header", "query", "cookie")
        #[serde(rename = "in")]
        location: String,
        /// Parameter name
        name: String,
    },

    /// HTTP authentication
    #[serde(rename_all = "camelCase")]
    Http {
        /// Scheme name ("bearer", "basic")
        scheme: String,
        /// Bearer token format hint
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
    },

    /// OpenID Connect discovery
    #[serde(rename_all = "camelCase")]
    OpenIdConnect {
        /// Discovery document URL
        open_id_connect_url: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_card_creation() {
        let card = AgentCard::new("Search Agent", "Finds things", "https://agent.example.com")
            .with_version("1.2.0")
            .with_capabilities(AgentCapabilities::new().with_streaming())
            .with_skill(
                AgentSkill::new("search", "Web search", "Searches the web")
                    .with_tags(vec!["search".to_string()]),
            );

        assert_eq!(card.protocol_version, AGENT_PROTOCOL_VERSION);
        assert!(card.capabilities.streaming);
        assert!(!card.capabilities.mxp_transport);
        assert_eq!(card.skills.len(), 1);
        assert_eq!(card.default_input_modes, vec!["text"]);
    }

    #[test]
    fn test_mxp_endpoint_mirrored() {
        let card = AgentCard::new("A", "B", "https://a.example.com")
            .with_mxp_endpoint("mxp://a.example.com:9000");

        assert!(card.capabilities.mxp_transport);
        assert_eq!(
            card.capabilities.mxp_endpoint.as_deref(),
            Some("mxp://a.example.com:9000")
        );
        assert_eq!(card.additional_interfaces.len(), 1);
        assert_eq!(card.additional_interfaces[0].transport, "mxp");
        assert_eq!(card.additional_interfaces[0].url, "mxp://a.example.com:9000");
    }

    #[test]
    fn test_card_serialization_round_trip() {
        let card = AgentCard::new("Test", "Description", "https://t.example.com")
            .with_mxp_endpoint("mxp://t.example.com:9000")
            .with_provider(AgentProvider {
                organization: "Example Org".to_string(),
                url: None,
            })
            .with_security_scheme(
                "bearer",
                SecurityScheme::Http {
                    scheme: "bearer".to_string(),
                    bearer_format: Some("JWT".to_string()),
                },
            );

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["protocolVersion"], "0.3.0");
        assert_eq!(json["capabilities"]["mxpTransport"], true);
        assert_eq!(json["capabilities"]["mxpEndpoint"], "mxp://t.example.com:9000");
        assert_eq!(json["additionalInterfaces"][0]["transport"], "mxp");
        assert_eq!(json["securitySchemes"]["bearer"]["type"], "http");

        let deserialized: AgentCard = serde_json::from_value(json).unwrap();
        assert_eq!(card, deserialized);
    }

    #[test]
    fn test_security_scheme_tags() {
        let api_key = SecurityScheme::ApiKey {
            location: "header".to_string(),
            name: "X-API-Key".to_string(),
        };
        let json = serde_json::to_value(&api_key).unwrap();
        assert_eq!(json["type"], "apiKey");
        assert_eq!(json["in"], "header");

        let oidc = SecurityScheme::OpenIdConnect {
            open_id_connect_url: "https://auth.example.com/.well-known".to_string(),
        };
        let json = serde_json::to_value(&oidc).unwrap();
        assert_eq!(json["type"], "openIdConnect");
    }
}
