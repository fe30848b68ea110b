//! Ordered per-key listener storage.
//!
//! Keys keep their first-insertion order so `event_names()` is stable. A key
//! is deleted as soon as its list becomes empty, so [`ListenerRegistry::key_count`]
//! always equals the number of keys holding at least one listener.

use herald_core::EventKey;

/// Where a new entry goes in its key's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Append at the tail.
    Append,
    /// Insert at the head.
    Prepend,
}

#[derive(Debug)]
struct ListenerList<E> {
    entries: Vec<E>,
    warned: bool,
}

/// Mapping of event key to its ordered listener list.
#[derive(Debug)]
pub(crate) struct ListenerRegistry<E> {
    lists: Vec<(EventKey, ListenerList<E>)>,
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self { lists: Vec::new() }
    }
}

impl<E> ListenerRegistry<E> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &EventKey) -> Option<usize> {
        self.lists.iter().position(|(k, _)| k == key)
    }

    fn list(&self, key: &EventKey) -> Option<&ListenerList<E>> {
        self.lists.iter().find(|(k, _)| k == key).map(|(_, l)| l)
    }

    /// Insert `entry` and return the key's new listener count.
    pub(crate) fn insert(&mut self, key: &EventKey, entry: E, placement: Placement) -> usize {
        let idx = match self.position(key) {
            Some(idx) => idx,
            None => {
                self.lists.push((
                    key.clone(),
                    ListenerList {
                        entries: Vec::new(),
                        warned: false,
                    },
                ));
                self.lists.len().saturating_sub(1)
            },
        };
        let Some((_, list)) = self.lists.get_mut(idx) else {
            return 0;
        };
        match placement {
            Placement::Append => list.entries.push(entry),
            Placement::Prepend => list.entries.insert(0, entry),
        }
        list.entries.len()
    }

    /// Remove the first entry of `key` matching `pred`.
    pub(crate) fn remove_first<P>(&mut self, key: &EventKey, mut pred: P) -> Option<E>
    where
        P: FnMut(&E) -> bool,
    {
        let idx = self.position(key)?;
        let (_, list) = self.lists.get_mut(idx)?;
        let pos = list.entries.iter().position(|e| pred(e))?;
        let removed = list.entries.remove(pos);
        if list.entries.is_empty() {
            self.lists.remove(idx);
        }
        Some(removed)
    }

    /// Remove and return every entry of `key`.
    pub(crate) fn take(&mut self, key: &EventKey) -> Vec<E> {
        match self.position(key) {
            Some(idx) => self.lists.remove(idx).1.entries,
            None => Vec::new(),
        }
    }

    /// Whether any entry of `key` matches `pred`.
    pub(crate) fn any<P>(&self, key: &EventKey, pred: P) -> bool
    where
        P: FnMut(&E) -> bool,
    {
        self.list(key).is_some_and(|l| l.entries.iter().any(pred))
    }

    /// Number of entries under `key`.
    pub(crate) fn count(&self, key: &EventKey) -> usize {
        self.list(key).map_or(0, |l| l.entries.len())
    }

    /// Number of keys with at least one entry.
    pub(crate) fn key_count(&self) -> usize {
        self.lists.len()
    }

    /// Keys in first-registration order.
    pub(crate) fn keys(&self) -> Vec<EventKey> {
        self.lists.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Flag `key` as warned. Returns `true` only the first time.
    pub(crate) fn mark_warned(&mut self, key: &EventKey) -> bool {
        match self.lists.iter_mut().find(|(k, _)| k == key) {
            Some((_, list)) if !list.warned => {
                list.warned = true;
                true
            },
            _ => false,
        }
    }

    /// Drop every list.
    pub(crate) fn clear(&mut self) {
        self.lists.clear();
    }
}

impl<E: Clone> ListenerRegistry<E> {
    /// Copy of the list for `key`, taken for dispatch or inspection.
    pub(crate) fn snapshot(&self, key: &EventKey) -> Vec<E> {
        self.list(key).map(|l| l.entries.clone()).unwrap_or_default()
    }
}
