//! Endpoint defaults and environment overrides.

const MAINNET_GRAPHQL: &str = "https://graphql.mainnet.sui.io/graphql";
const TESTNET_GRAPHQL: &str = "https://graphql.testnet.sui.io/graphql";
const DEVNET_GRAPHQL: &str = "https://graphql.devnet.sui.io/graphql";

/// Environment variable overriding the GraphQL endpoint.
pub const ENDPOINT_ENV: &str = "PTB_GRAPHQL_ENDPOINT";

pub fn default_graphql_endpoint(network: &str) -> String {
    match network {
        "testnet" => TESTNET_GRAPHQL.to_string(),
        "devnet" => DEVNET_GRAPHQL.to_string(),
        _ => MAINNET_GRAPHQL.to_string(),
    }
}

/// Resolve the endpoint: explicit value, then env override, then mainnet.
pub fn resolve_graphql_endpoint(explicit: Option<&str>) -> String {
    if let Some(url) = explicit {
        if !url.trim().is_empty() {
            return url.to_string();
        }
    }
    if let Ok(value) = std::env::var(ENDPOINT_ENV) {
        if !value.trim().is_empty() {
            return value;
        }
    }
    MAINNET_GRAPHQL.to_string()
}

pub fn infer_network_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("testnet") {
        Some("testnet")
    } else if lower.contains("devnet") {
        Some("devnet")
    } else if lower.contains("mainnet") {
        Some("mainnet")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_endpoint_wins() {
        assert_eq!(
            resolve_graphql_endpoint(Some("http://localhost:9000/graphql")),
            "http://localhost:9000/graphql"
        );
    }

    #[test]
    fn infers_network() {
        assert_eq!(infer_network_from_url(TESTNET_GRAPHQL), Some("testnet"));
        assert_eq!(infer_network_from_url("http://localhost"), None);
    }

    #[test]
    fn defaults_per_network() {
        assert_eq!(default_graphql_endpoint("devnet"), DEVNET_GRAPHQL);
        assert_eq!(default_graphql_endpoint("anything"), MAINNET_GRAPHQL);
    }
}
