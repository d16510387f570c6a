//! Mapper lifecycle events.
//!
//! The mapper announces row lifecycle transitions through a small
//! dispatcher. A before-save or before-delete listener can veto the
//! pending operation; the veto is carried by an explicit [`Cancelable`]
//! result decided by the *first* listener's return value.

use std::collections::HashMap;

use rowmap_core::Row;

/// Fired once the first time a cursor position is visited.
pub const EV_LOAD: &str = "mapper.load";
/// Fired before `save`; cancellable.
pub const EV_BEFORE_SAVE: &str = "mapper.beforesave";
/// Fired after `save`, vetoed or not.
pub const EV_AFTER_SAVE: &str = "mapper.aftersave";
/// Fired before a cursor-positioned `delete`; cancellable.
pub const EV_BEFORE_DELETE: &str = "mapper.beforedelete";
/// Fired after a cursor-positioned `delete`, with the removed row.
pub const EV_AFTER_DELETE: &str = "mapper.afterdelete";

/// Outcome of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cancelable {
    /// True when the first listener returned `false`.
    pub cancelled: bool,
}

type Listener = Box<dyn FnMut(&Row) -> bool>;

/// Name-keyed listener registry.
#[derive(Default)]
pub struct Events {
    listeners: HashMap<String, Vec<Listener>>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Returning `false` from the first listener of
    /// a cancellable event vetoes the operation.
    pub fn on(&mut self, event: impl Into<String>, listener: impl FnMut(&Row) -> bool + 'static) {
        self.listeners
            .entry(event.into())
            .or_default()
            .push(Box::new(listener));
    }

    /// Whether anything listens to `event`.
    pub fn has(&self, event: &str) -> bool {
        self.listeners.get(event).is_some_and(|l| !l.is_empty())
    }

    /// Run every listener in registration order. Only the first result
    /// decides cancellation; later listeners still run.
    pub fn dispatch(&mut self, event: &str, row: &Row) -> Cancelable {
        let mut outcome = Cancelable::default();
        if let Some(listeners) = self.listeners.get_mut(event) {
            for (n, listener) in listeners.iter_mut().enumerate() {
                let result = listener(row);
                if n == 0 {
                    outcome.cancelled = !result;
                }
            }
        }
        outcome
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(&str, usize)> = self
            .listeners
            .iter()
            .map(|(name, l)| (name.as_str(), l.len()))
            .collect();
        f.debug_struct("Events").field("listeners", &counts).finish()
    }
}
