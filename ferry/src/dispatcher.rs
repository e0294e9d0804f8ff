// Copyright (c) 2025 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Fan-out of ingress datagrams to subscribers.

use std::collections::HashSet;
use std::sync::Arc;

use codec::DeliveryFrame;

use crate::commands::SessionId;
use crate::registry::{Registry, Subscriber};
use crate::subscription::SubTable;

/// Result of a connect attempt for an identity.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// The identity is now live; retained frames to replay, in order.
    Accepted { replay: Vec<Arc<DeliveryFrame>> },

    /// Another live session holds this identity.
    AlreadyConnected,

    /// The live session re-announced its own identity.
    Noop,
}

/// Owns the subscriber registry and the subscription table and routes
/// every ingress datagram through them.
///
/// All methods run on the broker task; no other execution context touches
/// this state.
#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: Registry,
    table: SubTable,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a connect request for `id` arriving on `session`.
    pub fn connect(&mut self, id: &str, session: SessionId) -> ConnectOutcome {
        match self.registry.get_mut(id) {
            None => {
                self.registry.insert(Subscriber::new(id, session));
                ConnectOutcome::Accepted { replay: Vec::new() }
            }
            Some(subscriber) if subscriber.session() == Some(session) => ConnectOutcome::Noop,
            Some(subscriber) if subscriber.is_connected() => ConnectOutcome::AlreadyConnected,
            Some(subscriber) => {
                subscriber.set_session(session);
                ConnectOutcome::Accepted {
                    replay: subscriber.take_pending(),
                }
            }
        }
    }

    /// Mark `id` as disconnected, keeping its subscriptions and queue.
    ///
    /// Returns false when the identity is unknown.
    pub fn disconnect(&mut self, id: &str) -> bool {
        self.registry.get_mut(id).map_or(false, |subscriber| {
            subscriber.clear_session();
            true
        })
    }

    /// Mark whichever identity owns `session` as disconnected.
    ///
    /// Returns the identity, if one was bound to the session.
    pub fn disconnect_session(&mut self, session: SessionId) -> Option<String> {
        self.registry.find_by_session(session).map(|subscriber| {
            subscriber.clear_session();
            subscriber.id().to_string()
        })
    }

    /// Register interest of `id` in `pattern`.
    ///
    /// Returns false when the identity is unknown.
    pub fn subscribe(&mut self, id: &str, pattern: &str, sf: bool) -> bool {
        match self.registry.get_mut(id) {
            None => false,
            Some(subscriber) => {
                subscriber.set_sub(pattern, sf);
                self.table.subscribe(pattern, id);
                true
            }
        }
    }

    /// Drop interest of `id` in `pattern`.
    ///
    /// Returns false when the identity is unknown.
    pub fn unsubscribe(&mut self, id: &str, pattern: &str) -> bool {
        match self.registry.get_mut(id) {
            None => false,
            Some(subscriber) => {
                subscriber.remove_sub(pattern);
                self.table.unsubscribe(pattern, id);
                true
            }
        }
    }

    /// Fan one ingress frame out.
    ///
    /// Returns the sessions to deliver to live, each at most once no matter
    /// how many patterns matched. Disconnected subscribers with the
    /// store-and-forward flag set on a matching pattern retain the frame,
    /// at most once per frame.
    pub fn dispatch(&mut self, frame: &Arc<DeliveryFrame>) -> Vec<SessionId> {
        let mut sessions = Vec::new();
        let mut delivered: HashSet<&str> = HashSet::new();

        for (pattern, subscribers) in self.table.matches(frame.topic()) {
            for id in subscribers {
                let Some(subscriber) = self.registry.get_mut(id) else {
                    log::error!("dispatcher: no registry entry for subscriber {id}");
                    continue;
                };
                let Some(sf) = subscriber.sf(pattern) else {
                    // Table and per-subscriber maps are updated together;
                    // a missing entry here is a broken invariant.
                    log::error!("dispatcher: {id} listed under {pattern} without subscription");
                    continue;
                };
                if let Some(session) = subscriber.session() {
                    if delivered.insert(id.as_str()) {
                        sessions.push(session);
                    }
                } else if sf {
                    let _inserted = subscriber.queue(Arc::clone(frame));
                }
            }
        }
        sessions
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn table(&self) -> &SubTable {
        &self.table
    }
}
