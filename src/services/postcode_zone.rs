/// Whether the address's leading postcode token falls inside the congestion zone.
///
/// Only the first whitespace-delimited token is inspected, so `"SW1A 1AA London"`
/// classifies on `SW1A`. Matching is a case-insensitive prefix test.
pub fn is_congestion_zone(address: &str, prefixes: &[String]) -> bool {
    let Some(token) = address.split_whitespace().next() else {
        return false;
    };
    let outward = token.to_uppercase();

    prefixes
        .iter()
        .map(|prefix| prefix.trim())
        .any(|prefix| !prefix.is_empty() && outward.starts_with(&prefix.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CongestionZoneConfig;

    fn prefixes() -> Vec<String> {
        CongestionZoneConfig::default().postcode_prefixes
    }

    #[test]
    fn test_central_postcodes_are_inside() {
        assert!(is_congestion_zone("EC1A 1BB", &prefixes()));
        assert!(is_congestion_zone("sw1a 2aa", &prefixes()));
        assert!(is_congestion_zone("  WC2N 5DU Trafalgar Square", &prefixes()));
        assert!(is_congestion_zone("SE1", &prefixes()));
    }

    #[test]
    fn test_outer_postcodes_are_outside() {
        assert!(!is_congestion_zone("N1 9GU", &prefixes()));
        assert!(!is_congestion_zone("E14 5AB", &prefixes()));
        assert!(!is_congestion_zone("W2 1HB", &prefixes()));
    }

    #[test]
    fn test_matching_is_by_prefix() {
        // SW19 shares the SW1 prefix
        assert!(is_congestion_zone("SW19 5AE", &prefixes()));
        assert!(is_congestion_zone("W1D 3QF", &prefixes()));
    }

    #[test]
    fn test_only_leading_token_counts() {
        assert!(!is_congestion_zone("Manchester M1 1AE", &prefixes()));
        assert!(!is_congestion_zone("N1 SW1A", &prefixes()));
    }

    #[test]
    fn test_blank_prefixes_match_nothing() {
        let prefixes = vec!["EC1".to_string(), " ".to_string(), String::new()];
        assert!(!is_congestion_zone("M1 1AE", &prefixes));
        assert!(is_congestion_zone("EC1A 1BB", &prefixes));
    }

    #[test]
    fn test_empty_address_is_outside() {
        assert!(!is_congestion_zone("", &prefixes()));
        assert!(!is_congestion_zone("   ", &prefixes()));
    }
}
