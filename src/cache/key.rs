//! Key and Namespace Builder
//!
//! Derives a deterministic cache key and a tag from a call's arguments, and
//! formats the namespace keys entries live under. Two calls with identical
//! effective arguments must produce identical keys, or hits never happen.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Namespace Formatting ==
/// Segment used in place of a tag when no tag is configured.
pub const UNTAGGED_SEGMENT: &str = "untagged";

/// Formats the concrete namespace key `prefix:tagSegment:functionName`.
///
/// Always a concrete key: size checks and eviction address exactly one
/// namespace. Only [`purge_pattern`] produces a glob.
pub fn namespace(prefix: &str, tag: Option<&str>, func_name: &str) -> String {
    let segment = tag.unwrap_or(UNTAGGED_SEGMENT);
    format!("{}:{}:{}", prefix, segment, func_name)
}

/// Key of the recency index for a namespace. The suffix keeps the index
/// inside the tag's purge pattern so purge clears both structures.
pub fn index_key(namespace: &str) -> String {
    format!("{}:index", namespace)
}

/// Glob pattern matching every key under a tag, for purge's keyspace scan.
pub fn purge_pattern(prefix: &str, tag: &str) -> String {
    format!("{}:{}:*", prefix, tag)
}

// == Call Arguments ==
/// The ordered positional and named arguments of one call, captured as
/// serialized values so the cache stays opaque to what it caches.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.positional.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Sets a keyword argument.
    pub fn kwarg<T: Serialize>(mut self, name: &str, value: &T) -> Result<Self> {
        self.keyword.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// The positional argument at `index`, if present.
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// The keyword argument named `name`, if present.
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    /// Positional arguments followed by keyword arguments sorted by name,
    /// each keyword rendered as a `[name, value]` pair.
    fn effective_sequence(&self) -> Vec<Value> {
        let mut sequence = self.positional.clone();
        for (name, value) in &self.keyword {
            sequence.push(Value::Array(vec![
                Value::String(name.clone()),
                value.clone(),
            ]));
        }
        sequence
    }
}

// == Argument Slice ==
/// Restriction of the effective argument sequence, used to drop trailing
/// arguments that cannot be serialized (open handles and the like).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArgSlice {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl ArgSlice {
    /// The whole sequence.
    pub fn full() -> Self {
        Self::default()
    }

    /// The first `end` items.
    pub fn up_to(end: usize) -> Self {
        Self { start: None, end: Some(end) }
    }

    /// Items in `[start, end)`.
    pub fn range(start: usize, end: usize) -> Self {
        Self { start: Some(start), end: Some(end) }
    }

    fn apply<'a>(&self, items: &'a [Value]) -> &'a [Value] {
        let start = self.start.unwrap_or(0).min(items.len());
        let end = self.end.unwrap_or(items.len()).clamp(start, items.len());
        &items[start..end]
    }
}

// == Tag Specification ==
/// How the invalidation tag is derived from a call, validated up front.
///
/// The tag is produced by formatting a template with exactly one selected
/// argument: a positional index or a keyword name, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSpec {
    /// No tag; entries live under the fixed sentinel segment.
    Untagged,
    /// Tag formatted with the positional argument at `index`.
    Positional { template: String, index: usize },
    /// Tag formatted with the keyword argument named `name`.
    Keyword { template: String, name: String },
}

impl TagSpec {
    // == Validation ==
    /// Builds a TagSpec from raw configuration parts.
    ///
    /// Fails with a configuration error, before any store access, when both
    /// selectors are supplied, when a template lacks a selector, or when a
    /// selector lacks a template.
    pub fn from_parts(
        template: Option<String>,
        arg_index: Option<usize>,
        kwarg_name: Option<String>,
    ) -> Result<Self> {
        match (template, arg_index, kwarg_name) {
            (None, None, None) => Ok(TagSpec::Untagged),
            (Some(template), Some(index), None) => Ok(TagSpec::Positional { template, index }),
            (Some(template), None, Some(name)) => Ok(TagSpec::Keyword { template, name }),
            (_, Some(_), Some(_)) => Err(CacheError::Config(
                "only one of tag_arg_index or tag_kwarg_name may be specified".to_string(),
            )),
            (Some(_), None, None) => Err(CacheError::Config(
                "tag template requires tag_arg_index or tag_kwarg_name".to_string(),
            )),
            (None, _, _) => Err(CacheError::Config(
                "tag selector requires a tag template".to_string(),
            )),
        }
    }

    // == Resolution ==
    /// Formats the tag for one call, or None when untagged.
    ///
    /// A selector pointing at an argument the call did not supply is a
    /// configuration error.
    pub fn resolve(&self, args: &CallArgs) -> Result<Option<String>> {
        match self {
            TagSpec::Untagged => Ok(None),
            TagSpec::Positional { template, index } => {
                let value = args.positional(*index).ok_or_else(|| {
                    CacheError::Config(format!("tag argument index {} out of range", index))
                })?;
                Ok(Some(render_tag(template, value)))
            }
            TagSpec::Keyword { template, name } => {
                let value = args.keyword(name).ok_or_else(|| {
                    CacheError::Config(format!("tag keyword argument '{}' missing", name))
                })?;
                Ok(Some(render_tag(template, value)))
            }
        }
    }
}

/// Substitutes the selected argument into the tag template's `{}` placeholder.
/// Strings substitute without quotes; other values use their JSON form.
fn render_tag(template: &str, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    template.replace("{}", &text)
}

// == Key Builder ==
/// Per-function key derivation: argument slice plus tag specification.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    slice: ArgSlice,
    tag: TagSpec,
}

impl KeyBuilder {
    pub fn new(slice: ArgSlice, tag: TagSpec) -> Self {
        Self { slice, tag }
    }

    /// The cache key for one call: the sliced effective argument sequence,
    /// serialized as a canonical JSON array. Deterministic and
    /// order-sensitive by construction.
    pub fn cache_key(&self, args: &CallArgs) -> Result<String> {
        let sequence = args.effective_sequence();
        let sliced = self.slice.apply(&sequence);
        Ok(serde_json::to_string(sliced)?)
    }

    /// The tag for one call, or None when untagged.
    pub fn tag(&self, args: &CallArgs) -> Result<Option<String>> {
        self.tag.resolve(args)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn builder(slice: ArgSlice, tag: TagSpec) -> KeyBuilder {
        KeyBuilder::new(slice, tag)
    }

    #[test]
    fn test_namespace_with_tag() {
        assert_eq!(namespace("lru", Some("user/7"), "search"), "lru:user/7:search");
    }

    #[test]
    fn test_namespace_untagged_sentinel() {
        assert_eq!(namespace("lru", None, "search"), "lru:untagged:search");
    }

    #[test]
    fn test_index_key_stays_inside_purge_pattern() {
        let ns = namespace("lru", Some("user/7"), "search");
        let idx = index_key(&ns);
        assert_eq!(idx, "lru:user/7:search:index");
        // Both keys fall under the tag's purge pattern.
        assert!(ns.starts_with("lru:user/7:"));
        assert!(idx.starts_with("lru:user/7:"));
    }

    #[test]
    fn test_purge_pattern() {
        assert_eq!(purge_pattern("lru", "user/7"), "lru:user/7:*");
    }

    #[test]
    fn test_cache_key_deterministic() {
        let keys = builder(ArgSlice::full(), TagSpec::Untagged);
        let first = CallArgs::new().arg(&1).unwrap().kwarg("b", &true).unwrap();
        let second = CallArgs::new().arg(&1).unwrap().kwarg("b", &true).unwrap();
        assert_eq!(keys.cache_key(&first).unwrap(), keys.cache_key(&second).unwrap());
    }

    #[test]
    fn test_cache_key_order_sensitive() {
        let keys = builder(ArgSlice::full(), TagSpec::Untagged);
        let forward = CallArgs::new().arg(&1).unwrap().arg(&2).unwrap();
        let reversed = CallArgs::new().arg(&2).unwrap().arg(&1).unwrap();
        assert_ne!(keys.cache_key(&forward).unwrap(), keys.cache_key(&reversed).unwrap());
    }

    #[test]
    fn test_cache_key_kwargs_sorted_by_name() {
        let keys = builder(ArgSlice::full(), TagSpec::Untagged);
        let one = CallArgs::new()
            .kwarg("z", &1).unwrap()
            .kwarg("a", &2).unwrap();
        let other = CallArgs::new()
            .kwarg("a", &2).unwrap()
            .kwarg("z", &1).unwrap();
        // Insertion order of keywords never affects the key.
        assert_eq!(keys.cache_key(&one).unwrap(), keys.cache_key(&other).unwrap());
    }

    #[test]
    fn test_cache_key_slice_drops_trailing_args() {
        let keys = builder(ArgSlice::up_to(1), TagSpec::Untagged);
        let short = CallArgs::new().arg(&"q").unwrap();
        let long = CallArgs::new().arg(&"q").unwrap().arg(&"handle").unwrap();
        assert_eq!(keys.cache_key(&short).unwrap(), keys.cache_key(&long).unwrap());
    }

    #[test]
    fn test_slice_out_of_range_is_safe() {
        let keys = builder(ArgSlice::range(5, 9), TagSpec::Untagged);
        let args = CallArgs::new().arg(&1).unwrap();
        assert_eq!(keys.cache_key(&args).unwrap(), "[]");
    }

    #[test]
    fn test_tag_from_parts_untagged() {
        assert_eq!(TagSpec::from_parts(None, None, None).unwrap(), TagSpec::Untagged);
    }

    #[test]
    fn test_tag_from_parts_both_selectors_rejected() {
        let result = TagSpec::from_parts(
            Some("user/{}".to_string()),
            Some(0),
            Some("user".to_string()),
        );
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_tag_from_parts_template_without_selector_rejected() {
        let result = TagSpec::from_parts(Some("user/{}".to_string()), None, None);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_tag_from_parts_selector_without_template_rejected() {
        let result = TagSpec::from_parts(None, Some(0), None);
        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[test]
    fn test_tag_resolves_positional_argument() {
        let spec = TagSpec::from_parts(Some("user/{}".to_string()), Some(0), None).unwrap();
        let args = CallArgs::new().arg(&"alice").unwrap();
        assert_eq!(spec.resolve(&args).unwrap(), Some("user/alice".to_string()));
    }

    #[test]
    fn test_tag_resolves_keyword_argument() {
        let spec =
            TagSpec::from_parts(Some("pkg/{}".to_string()), None, Some("name".to_string())).unwrap();
        let args = CallArgs::new().kwarg("name", &"requests").unwrap();
        assert_eq!(spec.resolve(&args).unwrap(), Some("pkg/requests".to_string()));
    }

    #[test]
    fn test_tag_missing_argument_is_config_error() {
        let spec = TagSpec::from_parts(Some("user/{}".to_string()), Some(3), None).unwrap();
        let args = CallArgs::new().arg(&"alice").unwrap();
        assert!(matches!(spec.resolve(&args), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_tag_renders_non_string_as_json() {
        let spec = TagSpec::from_parts(Some("user/{}".to_string()), Some(0), None).unwrap();
        let args = CallArgs::new().arg(&17).unwrap();
        assert_eq!(spec.resolve(&args).unwrap(), Some("user/17".to_string()));
    }
}
