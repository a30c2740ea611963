// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message dispatch
//!
//! The dispatcher owns the current [`ViewerState`], applies messages through
//! [`update`] and tells subscribers about every change. Producers of intent
//! (a list click, a finished pass) never call into the renderers directly.

use crate::state::{update, Message, ViewerState};

type Subscriber = Box<dyn FnMut(&ViewerState, &Message)>;

/// Handle returned by [`Dispatcher::subscribe`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionId(usize);

#[derive(Default)]
pub struct Dispatcher {
    state: ViewerState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: usize,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Apply a message and notify subscribers with the new state
    pub fn dispatch(&mut self, message: Message) {
        let next = update(&self.state, &message);
        if next == self.state {
            log::trace!("{:?} left the state unchanged", message);
        }
        self.state = next;
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.state, &message);
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&ViewerState, &Message) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }
}
