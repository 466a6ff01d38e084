use core::fmt;

/// Networks that are reset between runs and come with unlocked, pre-funded accounts.
pub const LOCAL_BLOCKCHAIN_ENVIRONMENTS: [&str; 2] = ["development", "ganache-local"];

pub const DEFAULT_NETWORK: &str = "development";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkIdentity(String);

impl NetworkIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        NetworkIdentity(name.into())
    }

    /// Picks the active network: explicit choice first, then the configured
    /// default, then `development`.
    pub fn resolve(explicit: Option<&str>, configured_default: Option<&str>) -> Self {
        let name = explicit
            .or(configured_default)
            .unwrap_or(DEFAULT_NETWORK);

        NetworkIdentity::new(name)
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        LOCAL_BLOCKCHAIN_ENVIRONMENTS.contains(&self.0.as_str())
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_networks() {
        assert!(NetworkIdentity::new("development").is_local());
        assert!(NetworkIdentity::new("ganache-local").is_local());

        assert!(!NetworkIdentity::new("rinkeby").is_local());
        assert!(!NetworkIdentity::new("mainnet-fork").is_local());
        assert!(!NetworkIdentity::new("Development").is_local());
    }

    #[test]
    fn test_resolve_order() {
        assert_eq!(
            NetworkIdentity::resolve(Some("rinkeby"), Some("ganache-local")).name(),
            "rinkeby"
        );
        assert_eq!(
            NetworkIdentity::resolve(None, Some("ganache-local")).name(),
            "ganache-local"
        );
        assert_eq!(NetworkIdentity::resolve(None, None).name(), "development");
    }
}
