//! Rule matching: `matches(rule, event) -> bool` over a fixed set of
//! scalar attributes, label/annotation maps, and a count threshold.

use crate::event::Event;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

/// A filter as written in config. Every scalar field is a regex pattern
/// (unanchored containment match); a nil/empty pattern matches anything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    pub api_version: Option<String>,
    pub kind: Option<String>,
    pub namespace: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub component: Option<String>,
    pub host: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub min_count: Option<i64>,
    pub receiver: Option<String>,
}

/// A [`Rule`] with every pattern precompiled, built once when config loads
/// so the hot routing path never calls [`Regex::new`].
#[derive(Debug, Clone)]
pub struct CompiledRule {
    api_version: CompiledPattern,
    kind: CompiledPattern,
    namespace: CompiledPattern,
    reason: CompiledPattern,
    message: CompiledPattern,
    event_type: CompiledPattern,
    component: CompiledPattern,
    host: CompiledPattern,
    labels: Vec<(String, CompiledPattern)>,
    annotations: Vec<(String, CompiledPattern)>,
    min_count: Option<i64>,
    receiver: Option<String>,
}

/// A compiled scalar pattern. `None` means "the rule didn't specify this
/// attribute" (vacuously true); `Some(Err(_))` means the pattern failed to
/// compile, which per spec behaves as "never matches" for that attribute
/// rather than as a config load failure.
#[derive(Debug, Clone)]
struct CompiledPattern(Option<Result<Regex, ()>>);

impl CompiledPattern {
    fn compile(pattern: &Option<String>, field: &str) -> Self {
        match pattern.as_deref() {
            None | Some("") => Self(None),
            Some(p) => match Regex::new(p) {
                Ok(re) => Self(Some(Ok(re))),
                Err(err) => {
                    warn!(message = "rule pattern failed to compile; attribute will never match", field, pattern = p, %err);
                    Self(Some(Err(())))
                }
            },
        }
    }

    fn is_match(&self, value: &str) -> bool {
        match &self.0 {
            None => true,
            Some(Err(())) => false,
            Some(Ok(re)) => re.is_match(value),
        }
    }
}

impl Rule {
    /// Precompiles all patterns in this rule.
    pub fn compile(&self) -> CompiledRule {
        CompiledRule {
            api_version: CompiledPattern::compile(&self.api_version, "apiVersion"),
            kind: CompiledPattern::compile(&self.kind, "kind"),
            namespace: CompiledPattern::compile(&self.namespace, "namespace"),
            reason: CompiledPattern::compile(&self.reason, "reason"),
            message: CompiledPattern::compile(&self.message, "message"),
            event_type: CompiledPattern::compile(&self.event_type, "type"),
            component: CompiledPattern::compile(&self.component, "component"),
            host: CompiledPattern::compile(&self.host, "host"),
            labels: self
                .labels
                .iter()
                .map(|(k, p)| (k.clone(), CompiledPattern::compile(&Some(p.clone()), "labels")))
                .collect(),
            annotations: self
                .annotations
                .iter()
                .map(|(k, p)| {
                    (
                        k.clone(),
                        CompiledPattern::compile(&Some(p.clone()), "annotations"),
                    )
                })
                .collect(),
            min_count: self.min_count,
            receiver: self.receiver.clone(),
        }
    }
}

impl CompiledRule {
    pub fn receiver(&self) -> Option<&str> {
        self.receiver.as_deref()
    }

    /// Evaluates every attribute independently and returns their conjunction.
    pub fn matches(&self, event: &Event) -> bool {
        self.api_version.is_match(&event.involved_object.api_version)
            && self.kind.is_match(&event.involved_object.kind)
            && self.namespace.is_match(&event.namespace)
            && self.reason.is_match(&event.reason)
            && self.message.is_match(&event.message)
            && self.event_type.is_match(&event.event_type)
            && self.component.is_match(&event.source.component)
            && self.host.is_match(&event.source.host)
            && Self::map_matches(&self.labels, event.labels())
            && Self::map_matches(&self.annotations, event.annotations())
            && Self::min_count_matches(self.min_count, event)
    }

    fn map_matches(rule_map: &[(String, CompiledPattern)], event_map: &BTreeMap<String, String>) -> bool {
        rule_map.iter().all(|(key, pattern)| match event_map.get(key) {
            Some(value) => pattern.is_match(value),
            None => false,
        })
    }

    fn min_count_matches(min_count: Option<i64>, event: &Event) -> bool {
        match min_count {
            None | Some(0) => true,
            Some(min) => event.count_or_default() >= min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;

    fn rule(yaml: &str) -> CompiledRule {
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        rule.compile()
    }

    #[test]
    fn all_nil_matches_everything() {
        let r = rule("{}");
        assert!(r.matches(&sample_event()));
    }

    #[test]
    fn scalar_regex_is_unanchored_containment() {
        let r = rule("reason: Created");
        assert!(r.matches(&sample_event()));

        let r = rule("reason: ^Created$");
        assert!(r.matches(&sample_event()));

        let r = rule("reason: NotThere");
        assert!(!r.matches(&sample_event()));
    }

    #[test]
    fn missing_event_string_is_treated_as_empty() {
        let mut event = sample_event();
        event.action = String::new();
        let r = rule("{}");
        assert!(r.matches(&event));

        let r = rule("message: something");
        let mut e2 = sample_event();
        e2.message = String::new();
        assert!(!r.matches(&e2));
    }

    #[test]
    fn invalid_regex_never_matches() {
        let r = rule("reason: \"(unclosed\"");
        assert!(!r.matches(&sample_event()));
    }

    #[test]
    fn label_rule_requires_key_presence() {
        let mut event = sample_event();
        event
            .involved_object
            .labels
            .insert("app".to_owned(), "web".to_owned());

        let r = rule("labels:\n  app: web");
        assert!(r.matches(&event));

        let r = rule("labels:\n  tier: backend");
        assert!(!r.matches(&event));
    }

    #[test]
    fn min_count_threshold() {
        let mut event = sample_event();
        event.count = Some(3);

        assert!(rule("minCount: 3").matches(&event));
        assert!(rule("minCount: 1").matches(&event));
        assert!(!rule("minCount: 4").matches(&event));
        assert!(rule("minCount: 0").matches(&event));

        let mut no_count = sample_event();
        no_count.count = None;
        assert!(rule("minCount: 1").matches(&no_count));
        assert!(!rule("minCount: 2").matches(&no_count));
    }
}
