// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Pattern-keyed subscription table.

use std::collections::HashMap;

use codec::Pattern;

#[derive(Debug)]
struct Entry {
    pattern: Pattern,
    subscribers: Vec<String>,
}

/// Mapping from subscription pattern to the subscribers interested in it.
///
/// A subscriber appears at most once per pattern. An entry whose subscriber
/// list drained to empty is kept; it matches no one and is cheap.
#[derive(Debug, Default)]
pub struct SubTable {
    entries: HashMap<String, Entry>,
}

impl SubTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, pattern: &str, id: &str) {
        let entry = self
            .entries
            .entry(pattern.to_string())
            .or_insert_with(|| Entry {
                pattern: Pattern::new(pattern),
                subscribers: Vec::new(),
            });
        if !entry.subscribers.iter().any(|s| s == id) {
            entry.subscribers.push(id.to_string());
        }
    }

    pub fn unsubscribe(&mut self, pattern: &str, id: &str) {
        if let Some(entry) = self.entries.get_mut(pattern) {
            entry.subscribers.retain(|s| s != id);
        }
    }

    /// Whether `id` is listed under `pattern`.
    #[must_use]
    pub fn contains(&self, pattern: &str, id: &str) -> bool {
        self.entries
            .get(pattern)
            .map_or(false, |entry| entry.subscribers.iter().any(|s| s == id))
    }

    /// All patterns matching `topic`, with their subscriber lists.
    pub fn matches<'a>(&'a self, topic: &str) -> Vec<(&'a str, &'a [String])> {
        self.entries
            .values()
            .filter(|entry| entry.pattern.is_match(topic))
            .map(|entry| (entry.pattern.as_str(), entry.subscribers.as_slice()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
