// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! MQTT-style slash topic matching: `+` matches exactly one level, `#`
//! matches zero or more trailing levels and must be the last token.

use crate::error::{BusError, BusErrorKind};

/// Single-level wildcard.
pub const SINGLE_WILDCARD: &str = "+";
/// Multi-level (tail) wildcard.
pub const TAIL_WILDCARD: &str = "#";

/// Validates a topic filter used for subscriptions.
///
/// # Errors
/// Returns [`BusErrorKind::InvalidPattern`] if the filter is empty, has an
/// empty level, or uses `#` anywhere but the final level.
pub fn validate_topic_pattern(pattern: &str) -> Result<(), BusError> {
    if pattern.is_empty() {
        return Err(BusErrorKind::InvalidPattern(pattern.to_string(), "pattern must not be empty").into());
    }
    let levels: Vec<&str> = pattern.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.is_empty() {
            return Err(BusErrorKind::InvalidPattern(pattern.to_string(), "levels must not be empty").into());
        }
        if *level == TAIL_WILDCARD && i != levels.len() - 1 {
            return Err(BusErrorKind::InvalidPattern(
                pattern.to_string(),
                "'#' is only valid as the final level",
            )
            .into());
        }
    }
    Ok(())
}

/// Checks whether a concrete topic matches a (possibly wildcarded) filter.
#[must_use]
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    let mut p = pattern_levels.iter();
    let mut t = topic_levels.iter();

    loop {
        match (p.next(), t.next()) {
            (Some(&TAIL_WILDCARD), _) => return true,
            (Some(&SINGLE_WILDCARD), Some(_)) => continue,
            (Some(pl), Some(tl)) => {
                if pl != tl {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Converts a dotted subject into a slash topic, for the MQTT mirror side
/// of the bridge (`maestra.entity.state.light.foo` ->
/// `maestra/entity/state/light/foo`).
#[must_use]
pub fn subject_to_topic(subject: &str) -> String {
    subject.replace('.', "/")
}

/// Converts a slash topic into a dotted subject, for the NATS mirror side
/// of the bridge.
#[must_use]
pub fn topic_to_subject(topic: &str) -> String {
    topic.replace('/', ".")
}

/// Slash-topic counterpart to [`crate::subject_tree::fan_out_subjects`]:
/// the same three-level fan-out (per-slug, per-type, global), expressed
/// with `/` separators for topic-tree subscribers.
#[must_use]
pub fn fan_out_topics(base: &str, entity_type: &str, slug: &str) -> Vec<String> {
    vec![
        format!("{base}/{entity_type}/{slug}"),
        format!("{base}/{entity_type}"),
        base.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("maestra/entity/state/light/foo", "maestra/entity/state/light/foo", true; "exact match")]
    #[test_case("maestra/entity/state/+/foo", "maestra/entity/state/light/foo", true; "single wildcard")]
    #[test_case("maestra/entity/state/+/foo", "maestra/entity/state/light/bar", false; "single wildcard mismatch tail")]
    #[test_case("maestra/entity/#", "maestra/entity/state/light/foo", true; "tail wildcard")]
    #[test_case("maestra/entity/#", "maestra/device/state", false; "tail wildcard requires prefix")]
    fn matches(pattern: &str, topic: &str, expected: bool) {
        assert_eq!(topic_matches(pattern, topic), expected);
    }

    #[test]
    fn rejects_tail_wildcard_not_at_end() {
        assert!(validate_topic_pattern("maestra/#/foo").is_err());
    }

    #[test]
    fn fan_out_topics_produces_three_levels_most_specific_first() {
        let topics = fan_out_topics("maestra/entity/state", "light", "lamp-1");
        assert_eq!(
            topics,
            vec![
                "maestra/entity/state/light/lamp-1",
                "maestra/entity/state/light",
                "maestra/entity/state",
            ]
        );
    }

    #[test]
    fn subject_and_topic_round_trip() {
        let subject = "maestra.entity.state.light.foo";
        let topic = subject_to_topic(subject);
        assert_eq!(topic, "maestra/entity/state/light/foo");
        assert_eq!(topic_to_subject(&topic), subject);
    }
}
