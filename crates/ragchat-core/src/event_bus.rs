//! Queue of `ChatEvent`s from the registry and controller to the display layer.
//!
//! Single-threaded; clones share one queue. A session list view drains
//! everything each frame, while a chat pane can take only the events of the
//! conversation it shows and leave the rest queued.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use ragchat_types::event::ChatEvent;

#[derive(Clone, Default)]
pub struct EventBus {
    queue: Rc<RefCell<VecDeque<ChatEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ChatEvent) {
        log::trace!("event: {:?}", event);
        self.queue.borrow_mut().push_back(event);
    }

    /// Every queued event, oldest first.
    pub fn drain(&self) -> Vec<ChatEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Queued events about `session_id`, oldest first. Events for other
    /// sessions and session-less ones stay queued in their original order.
    pub fn drain_session(&self, session_id: &str) -> Vec<ChatEvent> {
        let mut queue = self.queue.borrow_mut();
        let (taken, kept): (Vec<ChatEvent>, Vec<ChatEvent>) = queue
            .drain(..)
            .partition(|e| e.session_id() == Some(session_id));
        queue.extend(kept);
        taken
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}
