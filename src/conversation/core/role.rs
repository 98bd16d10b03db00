//! Message author role.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Author of a message. Any other value is rejected when a document is read.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// End-user input.
    User,
    /// Chatbot reply.
    #[serde(alias = "assistant")]
    Bot,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "bot" | "assistant" => Ok(Self::Bot),
            _ => Err(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Bot));
        assert_eq!("system".parse::<Role>(), Err("system".to_string()));
    }

    #[test]
    fn test_role_serde_rejects_unknown() {
        assert_eq!(serde_json::to_string(&Role::Bot).unwrap(), "\"bot\"");
        let alias: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(alias, Role::Bot);
        assert!(serde_json::from_str::<Role>("\"tool\"").is_err());
    }
}
