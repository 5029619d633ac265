//! Cache-tag generation
//!
//! Tags are the only mechanism for later bulk invalidation by host, category,
//! path prefix, or extension; external purge tooling matches on them exactly.
//! The prefix enumeration therefore has to be precise: `/a/b/c` yields
//! `prefix:/a`, `prefix:/a/b`, `prefix:/a/b/c`, each with its leading slash.

use crate::classifier::Classification;
use crate::models::RequestDescriptor;

/// Generates namespaced, deduplicated cache tags for a request
#[derive(Debug, Clone)]
pub struct TagGenerator {
    namespace: String,
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new("cf")
    }
}

impl TagGenerator {
    /// Create a generator with the given namespace prefix
    ///
    /// Every emitted tag is `<namespace>:<tag>`.
    pub fn new(namespace: impl Into<String>) -> Self {
        TagGenerator {
            namespace: namespace.into(),
        }
    }

    /// Generate the ordered tag set for a request
    ///
    /// Emission order is fixed:
    /// 1. `host:<hostname>`
    /// 2. `type:<category>` — only for non-default categories; the rule's
    ///    `cache_tag_override` replaces the category name when present
    /// 3. `path:<full-path>` followed by one `prefix:<cumulative-path>` per
    ///    depth, or `page:home` when the path has no segments
    /// 4. `ext:<extension>` when the final segment has one (lowercased)
    ///
    /// Duplicates are dropped while preserving first-occurrence order.
    pub fn generate(
        &self,
        request: &RequestDescriptor,
        classification: &Classification,
    ) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();

        self.push(&mut tags, format!("host:{}", request.host));

        if !classification.is_default {
            let label = classification
                .cache_tag_override
                .as_deref()
                .unwrap_or(&classification.category);
            self.push(&mut tags, format!("type:{}", label));
        }

        let segments = request.path_segments();
        if segments.is_empty() {
            self.push(&mut tags, "page:home".to_string());
        } else {
            self.push(&mut tags, format!("path:{}", request.path));
            let mut prefix = String::new();
            for segment in &segments {
                prefix.push('/');
                prefix.push_str(segment);
                self.push(&mut tags, format!("prefix:{}", prefix));
            }
        }

        if let Some(ext) = request.extension() {
            self.push(&mut tags, format!("ext:{}", ext));
        }

        tags
    }

    fn push(&self, tags: &mut Vec<String>, tag: String) {
        let namespaced = format!("{}:{}", self.namespace, tag);
        if !tags.contains(&namespaced) {
            tags.push(namespaced);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(host: &str, path: &str) -> RequestDescriptor {
        RequestDescriptor::new("https", host, path, "")
    }

    fn matched(category: &str) -> Classification {
        Classification {
            category: category.to_string(),
            is_default: false,
            ..Classification::uncached()
        }
    }

    #[test]
    fn test_full_tag_sequence() {
        let tags = TagGenerator::default().generate(
            &request("example.com", "/Videos/show.mp4"),
            &matched("video"),
        );
        assert_eq!(
            tags,
            vec![
                "cf:host:example.com",
                "cf:type:video",
                "cf:path:/Videos/show.mp4",
                "cf:prefix:/Videos",
                "cf:prefix:/Videos/show.mp4",
                "cf:ext:mp4",
            ]
        );
    }

    #[test]
    fn test_prefix_enumeration_depths() {
        let tags = TagGenerator::default()
            .generate(&request("h", "/a/b/c"), &Classification::uncached());
        assert_eq!(
            tags,
            vec![
                "cf:host:h",
                "cf:path:/a/b/c",
                "cf:prefix:/a",
                "cf:prefix:/a/b",
                "cf:prefix:/a/b/c",
            ]
        );
    }

    #[test]
    fn test_default_category_omits_type_tag() {
        let tags = TagGenerator::default()
            .generate(&request("h", "/a/b.xyz"), &Classification::uncached());
        assert!(!tags.iter().any(|t| t.starts_with("cf:type:")));
    }

    #[test]
    fn test_root_path_emits_page_home() {
        let tags = TagGenerator::default()
            .generate(&request("h", "/"), &Classification::uncached());
        assert_eq!(tags, vec!["cf:host:h", "cf:page:home"]);
    }

    #[test]
    fn test_tag_override_replaces_category_label() {
        let mut classification = matched("video");
        classification.cache_tag_override = Some("media".to_string());
        let tags =
            TagGenerator::default().generate(&request("h", "/v.mp4"), &classification);
        assert!(tags.contains(&"cf:type:media".to_string()));
        assert!(!tags.contains(&"cf:type:video".to_string()));
    }

    #[test]
    fn test_custom_namespace() {
        let tags = TagGenerator::new("edge")
            .generate(&request("h", "/"), &Classification::uncached());
        assert_eq!(tags, vec!["edge:host:h", "edge:page:home"]);
    }

    #[test]
    fn test_no_duplicates_preserves_first_occurrence() {
        // A single-segment path makes path:/x and prefix:/x distinct tags,
        // but repeated pushes of an identical tag must collapse.
        let tags = TagGenerator::default()
            .generate(&request("h", "/x"), &Classification::uncached());
        let mut seen = std::collections::HashSet::new();
        for tag in &tags {
            assert!(seen.insert(tag.clone()), "duplicate tag {}", tag);
        }
    }
}
