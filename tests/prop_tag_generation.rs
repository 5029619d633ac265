//! Property-based tests for cache-tag generation
//!
//! Purge tooling matches tags exactly, so prefix enumeration has to be
//! precise at every depth and the set must never contain duplicates.

use edge_cache_policy::{Classification, RequestDescriptor, TagGenerator};
use proptest::prelude::*;
use std::collections::HashSet;

fn segments_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9_-]{1,10}", 1..6)
}

fn request_for(segments: &[String]) -> RequestDescriptor {
    RequestDescriptor::new("https", "example.com", format!("/{}", segments.join("/")), "")
}

fn matched(category: &str) -> Classification {
    Classification {
        category: category.to_string(),
        is_default: false,
        ..Classification::uncached()
    }
}

proptest! {
    #[test]
    fn no_duplicate_tags(segments in segments_strategy()) {
        let tags = TagGenerator::default()
            .generate(&request_for(&segments), &matched("video"));
        let unique: HashSet<_> = tags.iter().collect();
        prop_assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn one_prefix_tag_per_depth(segments in segments_strategy()) {
        let req = request_for(&segments);
        let tags = TagGenerator::default().generate(&req, &Classification::uncached());
        let prefixes: Vec<_> = tags
            .iter()
            .filter(|t| t.starts_with("cf:prefix:"))
            .collect();
        prop_assert_eq!(prefixes.len(), segments.len());
        // Every prefix keeps its leading slash, and the deepest one is the
        // full path.
        for tag in &prefixes {
            prop_assert!(tag.starts_with("cf:prefix:/"));
        }
        let full_path_tag = format!("cf:prefix:{}", req.path);
        prop_assert_eq!(prefixes.last().unwrap().as_str(), full_path_tag.as_str());
    }

    #[test]
    fn prefixes_are_cumulative(segments in segments_strategy()) {
        let req = request_for(&segments);
        let tags = TagGenerator::default().generate(&req, &Classification::uncached());
        let mut expected = String::new();
        let mut iter = tags.iter().filter(|t| t.starts_with("cf:prefix:"));
        for segment in &segments {
            expected.push('/');
            expected.push_str(segment);
            let expected_tag = format!("cf:prefix:{}", expected);
            prop_assert_eq!(iter.next().unwrap().as_str(), expected_tag.as_str());
        }
    }

    #[test]
    fn host_tag_comes_first(segments in segments_strategy()) {
        let tags = TagGenerator::default()
            .generate(&request_for(&segments), &matched("image"));
        prop_assert_eq!(tags[0].as_str(), "cf:host:example.com");
    }

    #[test]
    fn all_tags_carry_namespace(
        segments in segments_strategy(),
        namespace in "[a-z]{1,8}",
    ) {
        let tags = TagGenerator::new(namespace.clone())
            .generate(&request_for(&segments), &matched("video"));
        let prefix = format!("{}:", namespace);
        for tag in &tags {
            prop_assert!(tag.starts_with(&prefix));
        }
    }
}

#[test]
fn exact_sequence_for_three_segments() {
    let req = RequestDescriptor::new("https", "h", "/a/b/c", "");
    let tags = TagGenerator::default().generate(&req, &matched("doc"));
    assert_eq!(
        tags,
        vec![
            "cf:host:h",
            "cf:type:doc",
            "cf:path:/a/b/c",
            "cf:prefix:/a",
            "cf:prefix:/a/b",
            "cf:prefix:/a/b/c",
        ]
    );
}
