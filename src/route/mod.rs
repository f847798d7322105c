//! The route evaluator: a recursive tree of drop/match rule sets that
//! decides, per event, which receivers each event reaches.

mod rule;

pub use rule::{CompiledRule, Rule};

use crate::event::Event;
use serde::Deserialize;

/// A node in the evaluation tree. Config-shaped; compile it via
/// [`Route::compile`] before evaluating.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Route {
    pub drop: Vec<Rule>,
    #[serde(rename = "match")]
    pub match_: Vec<Rule>,
    pub routes: Vec<Route>,
}

/// A [`Route`] with every contained [`Rule`] precompiled.
#[derive(Debug, Clone, Default)]
pub struct CompiledRoute {
    drop: Vec<CompiledRule>,
    match_: Vec<CompiledRule>,
    routes: Vec<CompiledRoute>,
}

impl Route {
    pub fn compile(&self) -> CompiledRoute {
        CompiledRoute {
            drop: self.drop.iter().map(Rule::compile).collect(),
            match_: self.match_.iter().map(Rule::compile).collect(),
            routes: self.routes.iter().map(Route::compile).collect(),
        }
    }
}

impl CompiledRoute {
    /// Walks this route (and, if every match rule matches, its children) for
    /// `event`, invoking `emit(receiver_name, event)` for every match rule
    /// that matched and carried a receiver.
    ///
    /// Authoritative algorithm (spec.md §4.1):
    /// 1. Any `drop` rule matching aborts the whole subtree.
    /// 2. Every `match` rule is evaluated; matching rules with a receiver
    ///    emit. Sub-routes are entered only if every match rule matched (an
    ///    empty list counts as "all matched").
    pub fn process(&self, event: &Event, emit: &mut impl FnMut(&str, &Event)) {
        if self.drop.iter().any(|rule| rule.matches(event)) {
            return;
        }

        let mut all_matched = true;
        for rule in &self.match_ {
            let matched = rule.matches(event);
            if matched {
                if let Some(receiver) = rule.receiver() {
                    emit(receiver, event);
                }
            } else {
                all_matched = false;
            }
        }

        if all_matched {
            for route in &self.routes {
                route.process(event, emit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;

    fn route(yaml: &str) -> CompiledRoute {
        let route: Route = serde_yaml::from_str(yaml).unwrap();
        route.compile()
    }

    fn emitted(route: &CompiledRoute, event: &Event) -> Vec<String> {
        let mut out = Vec::new();
        route.process(event, &mut |receiver, _event| out.push(receiver.to_owned()));
        out
    }

    /// End-to-end scenario 1: selective alerting (spec.md §8).
    #[test]
    fn drop_normal_match_failed_create() {
        let r = route(
            r#"
drop:
  - type: Normal
match:
  - reason: FailedCreatePodContainer
    receiver: elastic
"#,
        );

        let mut a = sample_event();
        a.event_type = "Warning".to_owned();
        a.reason = "FailedCreatePodContainer".to_owned();
        assert_eq!(emitted(&r, &a), vec!["elastic".to_owned()]);

        let mut b = sample_event();
        b.event_type = "Warning".to_owned();
        b.reason = "FailedCreate".to_owned();
        assert!(emitted(&r, &b).is_empty());

        let mut c = sample_event();
        c.event_type = "Normal".to_owned();
        c.reason = "FailedCreatePodContainer".to_owned();
        assert!(emitted(&r, &c).is_empty());
    }

    /// End-to-end scenario 2: regex namespace match gating a sub-route.
    #[test]
    fn sub_route_only_entered_when_all_match_rules_match() {
        let r = route(
            r#"
match:
  - namespace: "kube-.*"
routes:
  - match:
      - receiver: sys
"#,
        );

        let mut in_kube = sample_event();
        in_kube.namespace = "kube-system".to_owned();
        assert_eq!(emitted(&r, &in_kube), vec!["sys".to_owned()]);

        let mut in_default = sample_event();
        in_default.namespace = "default".to_owned();
        assert!(emitted(&r, &in_default).is_empty());
    }

    #[test]
    fn gate_rule_without_receiver_still_participates_in_conjunction() {
        let r = route(
            r#"
match:
  - namespace: "does-not-exist"
routes:
  - match:
      - receiver: sys
"#,
        );
        assert!(emitted(&r, &sample_event()).is_empty());
    }

    #[test]
    fn empty_route_emits_nothing() {
        let r = route("{}");
        assert!(emitted(&r, &sample_event()).is_empty());
    }

    #[test]
    fn duplicate_emission_to_same_receiver_is_allowed() {
        let r = route(
            r#"
match:
  - reason: Created
    receiver: a
  - type: Normal
    receiver: a
"#,
        );
        assert_eq!(emitted(&r, &sample_event()), vec!["a".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn first_matching_drop_rule_wins_in_list_order() {
        let r = route(
            r#"
drop:
  - reason: DoesNotMatch
  - type: Normal
match:
  - receiver: a
"#,
        );
        assert!(emitted(&r, &sample_event()).is_empty());
    }
}
