// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

/// A subscription pattern over `/`-separated topic levels.
///
/// A level equal to `+` matches exactly one topic level of any value; a
/// level equal to `*` matches zero or more consecutive levels. Any other
/// level, including the empty one, matches only its literal self. Wildcard
/// characters embedded in a longer level carry no special meaning.
#[derive(Debug, Default, Clone, Eq)]
pub struct Pattern {
    pattern: String,
    levels: Vec<PatternLevel>,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern.eq(&other.pattern)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternLevel {
    /// Normal level, matched verbatim.
    Literal(String),

    /// `+` char, to match exactly one level.
    Single,

    /// `*` char, to match zero or more levels.
    Multi,
}

impl Pattern {
    #[must_use]
    pub fn new(s: &str) -> Self {
        let levels = s
            .split('/')
            .map(|level| match level {
                "+" => PatternLevel::Single,
                "*" => PatternLevel::Multi,
                _ => PatternLevel::Literal(level.to_string()),
            })
            .collect();
        Self {
            pattern: s.to_string(),
            levels,
        }
    }

    /// Check whether the concrete `topic` matches this pattern.
    ///
    /// Matching succeeds iff all topic levels and all pattern levels are
    /// consumed. `*` prefers the shortest expansion that lets the rest of
    /// the pattern match.
    #[must_use]
    pub fn is_match(&self, topic: &str) -> bool {
        let topic_levels: Vec<&str> = topic.split('/').collect();
        match_levels(&topic_levels, &self.levels)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

fn match_levels(topic: &[&str], pattern: &[PatternLevel]) -> bool {
    match pattern.split_first() {
        None => topic.is_empty(),
        Some((PatternLevel::Single, rest)) => match topic.split_first() {
            Some((_, topic_rest)) => match_levels(topic_rest, rest),
            None => false,
        },
        Some((PatternLevel::Multi, rest)) => {
            // Zero expansion first, then grow one level at a time.
            if match_levels(topic, rest) {
                return true;
            }
            match topic.split_first() {
                Some((_, topic_rest)) => match_levels(topic_rest, pattern),
                None => false,
            }
        }
        Some((PatternLevel::Literal(literal), rest)) => match topic.split_first() {
            Some((level, topic_rest)) if *level == literal.as_str() => {
                match_levels(topic_rest, rest)
            }
            _ => false,
        },
    }
}
