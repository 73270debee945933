use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Operative role chosen during team selection. Fixed closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Commander,
    Specialist,
    Diplomat,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Commander => write!(f, "Commander"),
            Role::Specialist => write!(f, "Specialist"),
            Role::Diplomat => write!(f, "Diplomat"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "commander" => Ok(Role::Commander),
            "specialist" => Ok(Role::Specialist),
            "diplomat" => Ok(Role::Diplomat),
            _ => Err(anyhow!("Unknown role: {}", s)),
        }
    }
}

impl Role {
    pub fn all() -> [Role; 3] {
        [Role::Commander, Role::Specialist, Role::Diplomat]
    }

    pub fn description(&self) -> &str {
        match self {
            Role::Commander => "Authority. Tactical Command.",
            Role::Specialist => "Technical. System Operations.",
            Role::Diplomat => "Negotiation. Psychology.",
        }
    }
}

/// Identity of the player for one session. Mutable only during team
/// selection; frozen once the simulation begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub role: Role,
}

impl Default for UserProfile {
    fn default() -> Self {
        UserProfile {
            name: String::new(),
            role: Role::Specialist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        let role: Role = "commander".parse().unwrap();
        assert_eq!(role, Role::Commander);

        let role: Role = "Diplomat".parse().unwrap();
        assert_eq!(role, Role::Diplomat);

        assert!("pilot".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display_roundtrip() {
        for role in Role::all() {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }
}
