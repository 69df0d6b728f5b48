//! Property-based tests for locator parsing using proptest
//!
//! These verify component extraction, URL round-tripping, and rejection of
//! malformed locators over randomized inputs.

use gcpio::Locator;
use proptest::prelude::*;

/// Generate a plausible scheme
fn arb_scheme() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("gs".to_string()),
        Just("storage".to_string()),
        Just("pubsub".to_string()),
        "[a-z][a-z0-9]{1,7}",
    ]
}

/// Generate a host hint / bucket-style name
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,14}[a-z0-9]".prop_map(String::from)
}

/// Generate object key segments
fn arb_key_segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[A-Za-z0-9._-]{1,12}", 0..4)
}

proptest! {
    /// scheme://host/bucket/key... decomposes into exactly those parts
    #[test]
    fn components_extracted(
        scheme in arb_scheme(),
        host in arb_name(),
        bucket in arb_name(),
        segments in arb_key_segments(),
    ) {
        let mut url = format!("{scheme}://{host}/{bucket}");
        for segment in &segments {
            url.push('/');
            url.push_str(segment);
        }

        let locator = Locator::parse(&url).unwrap();
        prop_assert_eq!(locator.scheme(), scheme.as_str());
        prop_assert_eq!(locator.host(), host.as_str());
        prop_assert_eq!(locator.bucket(), bucket.as_str());
        prop_assert_eq!(locator.key(), segments.join("/"));
    }

    /// Rebuilding the URL and reparsing yields an equivalent locator
    #[test]
    fn url_round_trip(
        scheme in arb_scheme(),
        host in arb_name(),
        bucket in arb_name(),
        segments in arb_key_segments(),
    ) {
        let mut url = format!("{scheme}://{host}/{bucket}");
        for segment in &segments {
            url.push('/');
            url.push_str(segment);
        }

        let first = Locator::parse(&url).unwrap();
        let second = Locator::parse(&first.to_url()).unwrap();
        prop_assert_eq!(first, second);
    }

    /// A lone segment names the container/topic and doubles as the host hint
    #[test]
    fn lone_segment_is_container_and_hint(scheme in arb_scheme(), name in arb_name()) {
        let locator = Locator::parse(&format!("{scheme}://{name}")).unwrap();
        prop_assert_eq!(locator.host(), name.as_str());
        prop_assert_eq!(locator.bucket(), name.as_str());
        prop_assert_eq!(locator.key(), "");

        let round = Locator::parse(&locator.to_url()).unwrap();
        prop_assert_eq!(locator, round);
    }

    /// Hostless locators keep the bucket as the first path component
    #[test]
    fn hostless_form_parses(scheme in arb_scheme(), bucket in arb_name(), segments in arb_key_segments()) {
        let mut url = format!("{scheme}:///{bucket}");
        for segment in &segments {
            url.push('/');
            url.push_str(segment);
        }

        let locator = Locator::parse(&url).unwrap();
        prop_assert_eq!(locator.host(), "");
        prop_assert_eq!(locator.bucket(), bucket.as_str());
    }

    /// Anything without a scheme separator is rejected
    #[test]
    fn missing_scheme_rejected(raw in "[a-z0-9/._-]{0,30}") {
        prop_assume!(!raw.contains("://"));
        prop_assert!(Locator::parse(&raw).is_err());
    }
}
