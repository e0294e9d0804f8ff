// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Identity-keyed subscriber state.

use std::collections::HashMap;
use std::sync::Arc;

use codec::DeliveryFrame;

use crate::commands::SessionId;

/// State of one subscriber identity.
///
/// An entry is created on the first connect for an identity and survives
/// disconnects, so subscriptions and the store-and-forward queue outlive
/// the stream connection.
#[derive(Debug)]
pub struct Subscriber {
    id: String,

    /// Live session, if any.
    session: Option<SessionId>,

    /// pattern -> store-and-forward flag.
    subs: HashMap<String, bool>,

    /// Frames retained while disconnected, in arrival order.
    pending: Vec<Arc<DeliveryFrame>>,
}

impl Subscriber {
    #[must_use]
    pub fn new(id: &str, session: SessionId) -> Self {
        Self {
            id: id.to_string(),
            session: Some(session),
            subs: HashMap::new(),
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn session(&self) -> Option<SessionId> {
        self.session
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn set_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    /// Store-and-forward flag for `pattern`, or `None` when the subscriber
    /// holds no subscription for it.
    #[must_use]
    pub fn sf(&self, pattern: &str) -> Option<bool> {
        self.subs.get(pattern).copied()
    }

    /// Record a subscription, silently overwriting a prior flag choice.
    pub fn set_sub(&mut self, pattern: &str, sf: bool) {
        self.subs.insert(pattern.to_string(), sf);
    }

    pub fn remove_sub(&mut self, pattern: &str) {
        self.subs.remove(pattern);
    }

    #[must_use]
    pub const fn subs(&self) -> &HashMap<String, bool> {
        &self.subs
    }

    /// Retain a frame for replay, at most once per frame identity.
    ///
    /// Returns whether the frame was inserted.
    pub fn queue(&mut self, frame: Arc<DeliveryFrame>) -> bool {
        if self.pending.iter().any(|m| Arc::ptr_eq(m, &frame)) {
            return false;
        }
        self.pending.push(frame);
        true
    }

    /// Drain the retained frames in insertion order.
    #[must_use]
    pub fn take_pending(&mut self) -> Vec<Arc<DeliveryFrame>> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn pending(&self) -> &[Arc<DeliveryFrame>] {
        &self.pending
    }
}

/// All subscriber identities the broker has ever seen.
#[derive(Debug, Default)]
pub struct Registry {
    map: HashMap<String, Subscriber>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Subscriber> {
        self.map.get(id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Subscriber> {
        self.map.get_mut(id)
    }

    pub fn insert(&mut self, subscriber: Subscriber) {
        self.map.insert(subscriber.id().to_string(), subscriber);
    }

    /// Find the subscriber owning `session`.
    #[must_use]
    pub fn find_by_session(&mut self, session: SessionId) -> Option<&mut Subscriber> {
        self.map
            .values_mut()
            .find(|subscriber| subscriber.session() == Some(session))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscriber> {
        self.map.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
