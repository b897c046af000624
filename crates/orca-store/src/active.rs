//! Tracking of the record the host is currently showing.

use std::fmt;

/// Key reported while no subject is open.
pub const NO_ACTIVE_SUBJECT: &str = "No Open Image";

/// The active subject moved from `previous` to `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectChange {
    pub previous: String,
    pub current: String,
}

type Listener = Box<dyn FnMut(&SubjectChange)>;

/// Holds the active record key and notifies listeners when it changes.
pub struct ActiveSubject {
    current: String,
    listeners: Vec<Listener>,
}

impl Default for ActiveSubject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActiveSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSubject")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ActiveSubject {
    pub fn new() -> Self {
        Self {
            current: NO_ACTIVE_SUBJECT.to_string(),
            listeners: Vec::new(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is_open(&self) -> bool {
        self.current != NO_ACTIVE_SUBJECT
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&SubjectChange) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Make `key` active. Listeners run only if it differs from the current key.
    pub fn set_active(&mut self, key: &str) -> Option<SubjectChange> {
        if self.current == key {
            return None;
        }
        let change = SubjectChange {
            previous: std::mem::replace(&mut self.current, key.to_string()),
            current: key.to_string(),
        };
        tracing::debug!(previous = %change.previous, current = %change.current, "Active subject changed");
        for listener in &mut self.listeners {
            listener(&change);
        }
        Some(change)
    }

    pub fn clear(&mut self) -> Option<SubjectChange> {
        self.set_active(NO_ACTIVE_SUBJECT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn listeners_see_previous_and_current() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut subject = ActiveSubject::new();
        let sink = Rc::clone(&seen);
        subject.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        assert!(!subject.is_open());
        subject.set_active("a.jpg");
        assert!(subject.set_active("a.jpg").is_none());
        subject.set_active("b.jpg");
        subject.clear();

        let pairs: Vec<(String, String)> = seen
            .borrow()
            .iter()
            .map(|c| (c.previous.clone(), c.current.clone()))
            .collect();
        assert_eq!(
            pairs,
            [
                (NO_ACTIVE_SUBJECT.to_string(), "a.jpg".to_string()),
                ("a.jpg".to_string(), "b.jpg".to_string()),
                ("b.jpg".to_string(), NO_ACTIVE_SUBJECT.to_string()),
            ]
        );
    }
}
