//! Reentrancy guards
//!
//! Everything runs on one thread, so these are counters rather than locks.
//! They catch handler code that runs in the middle of a structural update.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::Document;

/// Per-document counter of open "no event dispatch" scopes
#[derive(Debug, Clone, Default)]
pub(crate) struct EventDispatchCounter(Rc<Cell<u32>>);

impl EventDispatchCounter {
    pub(crate) fn is_forbidden(&self) -> bool {
        self.0.get() > 0
    }

    pub(crate) fn enter(&self) -> EventDispatchForbiddenScope {
        self.0.set(self.0.get() + 1);
        EventDispatchForbiddenScope {
            counter: Rc::clone(&self.0),
        }
    }
}

/// Scoped section during which no event may be dispatched.
///
/// Dispatching while a scope is alive is a bug in the caller: debug builds
/// assert, release builds log and carry on.
#[must_use = "the scope ends when the guard is dropped"]
#[derive(Debug)]
pub struct EventDispatchForbiddenScope {
    counter: Rc<Cell<u32>>,
}

impl Drop for EventDispatchForbiddenScope {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

/// Deferred work run once a burst of attachment finishes
pub type PostAttachCallback = Box<dyn FnOnce(&mut Document)>;

/// Suspension counter plus deferred callback queue for bulk attachment.
///
/// While suspended, callbacks queue up; they run when the outermost
/// suspension is resumed. Callbacks queued while the queue drains run in the
/// same drain.
#[derive(Default)]
pub struct PostAttachQueue {
    depth: u32,
    callbacks: VecDeque<PostAttachCallback>,
}

impl PostAttachQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current suspension depth
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_suspended(&self) -> bool {
        self.depth > 0
    }

    /// Number of queued callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub(crate) fn suspend(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn push(&mut self, callback: PostAttachCallback) {
        self.callbacks.push_back(callback);
    }

    pub(crate) fn pop(&mut self) -> Option<PostAttachCallback> {
        self.callbacks.pop_front()
    }
}

impl fmt::Debug for PostAttachQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostAttachQueue")
            .field("depth", &self.depth)
            .field("queued", &self.callbacks.len())
            .finish()
    }
}

impl Document {
    /// Open a scope during which event dispatch is forbidden
    pub fn forbid_event_dispatch(&self) -> EventDispatchForbiddenScope {
        self.dispatch_counter.enter()
    }

    /// Whether any "no event dispatch" scope is open
    pub fn is_event_dispatch_forbidden(&self) -> bool {
        self.dispatch_counter.is_forbidden()
    }

    /// Post-attach queue state
    pub fn post_attach_queue(&self) -> &PostAttachQueue {
        &self.post_attach
    }

    /// Defer post-attach callbacks until the matching resume
    pub fn suspend_post_attach_callbacks(&mut self) {
        self.post_attach.suspend();
    }

    /// End one suspension; the outermost resume drains the queue
    pub fn resume_post_attach_callbacks(&mut self) {
        if self.post_attach.depth() == 1 {
            while let Some(callback) = self.post_attach.pop() {
                callback(self);
            }
        }
        self.post_attach.leave();
    }

    /// Run `callback` now, or after the current attach burst if suspended
    pub fn queue_post_attach_callback(&mut self, callback: PostAttachCallback) {
        if self.post_attach.is_suspended() {
            self.post_attach.push(callback);
        } else {
            callback(self);
        }
    }
}
