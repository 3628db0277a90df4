use serde::{Deserialize, Serialize};

/// Tunables for suggestion generation.
///
/// Deserializes from partial documents; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Offer an "execute current command" item when the command is complete.
    pub execute_suggestion: bool,
    /// Offer a placeholder item instead of an empty list.
    pub no_match_placeholder: bool,
    /// Cap on returned suggestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_suggestions: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            execute_suggestion: true,
            no_match_placeholder: true,
            max_suggestions: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: ParserConfig = serde_yaml::from_str("max_suggestions: 5").unwrap();
        assert_eq!(config.max_suggestions, Some(5));
        assert!(config.execute_suggestion);
        assert!(config.no_match_placeholder);
    }
}
