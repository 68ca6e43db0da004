// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! NATS-style dotted subject matching: `*` matches exactly one token,
//! `>` matches one or more trailing tokens and must be the last one.

use crate::error::{BusError, BusErrorKind};

/// Single wildcard: matches exactly one subject token.
pub const SINGLE_WILDCARD: &str = "*";
/// Tail wildcard: matches one or more trailing tokens.
pub const TAIL_WILDCARD: &str = ">";

/// Validates a subject pattern used for subscriptions.
///
/// # Errors
/// Returns [`BusErrorKind::InvalidPattern`] if the pattern is empty, has an
/// empty token (leading/trailing/doubled `.`), or uses `>` anywhere but the
/// final token.
pub fn validate_subject_pattern(pattern: &str) -> Result<(), BusError> {
    if pattern.is_empty() {
        return Err(BusErrorKind::InvalidPattern(pattern.to_string(), "pattern must not be empty").into());
    }
    let tokens: Vec<&str> = pattern.split('.').collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(BusErrorKind::InvalidPattern(pattern.to_string(), "tokens must not be empty").into());
        }
        if *token == TAIL_WILDCARD && i != tokens.len() - 1 {
            return Err(BusErrorKind::InvalidPattern(
                pattern.to_string(),
                "'>' is only valid as the final token",
            )
            .into());
        }
    }
    Ok(())
}

/// Checks whether a concrete subject matches a (possibly wildcarded)
/// subscription pattern.
#[must_use]
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let pattern_tokens: Vec<&str> = pattern.split('.').collect();
    let subject_tokens: Vec<&str> = subject.split('.').collect();

    let mut p = pattern_tokens.iter();
    let mut s = subject_tokens.iter();

    loop {
        match (p.next(), s.next()) {
            (Some(&TAIL_WILDCARD), Some(_)) => return true,
            (Some(&SINGLE_WILDCARD), Some(_)) => continue,
            (Some(pt), Some(st)) => {
                if pt != st {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Builds the set of canonical subjects a state change or lifecycle event
/// should be published on, from most specific to least: `maestra.entity.
/// state.<type>.<slug>`, `maestra.entity.state.<type>`, `maestra.entity.
/// state`. Mirrors the three-subject fan-out rule in spec section 4.1/4.2.
#[must_use]
pub fn fan_out_subjects(base: &str, entity_type: &str, slug: &str) -> Vec<String> {
    vec![
        format!("{base}.{entity_type}.{slug}"),
        format!("{base}.{entity_type}"),
        base.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("maestra.entity.state.light.foo", "maestra.entity.state.light.foo", true; "exact match")]
    #[test_case("maestra.entity.state.*.foo", "maestra.entity.state.light.foo", true; "single wildcard")]
    #[test_case("maestra.entity.state.*.foo", "maestra.entity.state.light.bar", false; "single wildcard mismatch tail")]
    #[test_case("maestra.entity.>", "maestra.entity.state.light.foo", true; "tail wildcard")]
    #[test_case("maestra.entity.>", "maestra.device.state", false; "tail wildcard requires prefix")]
    #[test_case("maestra.entity.>", "maestra.entity", false; "tail wildcard requires at least one trailing token")]
    #[test_case("maestra.entity.state", "maestra.entity.state.light.foo", false; "pattern shorter than subject")]
    #[test_case("maestra.entity.state.light.foo", "maestra.entity.state", false; "pattern longer than subject")]
    fn matches(pattern: &str, subject: &str, expected: bool) {
        assert_eq!(subject_matches(pattern, subject), expected);
    }

    #[test]
    fn rejects_tail_wildcard_not_at_end() {
        assert!(validate_subject_pattern("maestra.>.foo").is_err());
    }

    #[test]
    fn rejects_empty_tokens() {
        assert!(validate_subject_pattern("maestra..foo").is_err());
        assert!(validate_subject_pattern("").is_err());
    }

    #[test]
    fn fan_out_produces_three_subjects_most_specific_first() {
        let subjects = fan_out_subjects("maestra.entity.state", "light", "lamp-1");
        assert_eq!(
            subjects,
            vec![
                "maestra.entity.state.light.lamp-1",
                "maestra.entity.state.light",
                "maestra.entity.state",
            ]
        );
    }
}
