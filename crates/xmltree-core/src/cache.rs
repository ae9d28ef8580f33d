//! Optional prefix cache: a small fixed-size ring of previously located
//! canonical-key scopes within the *source* document. Purely an
//! optimization -- disabling the `prefix-cache` feature changes no
//! observable result, only skips this fast path. Invalidated wholesale on
//! every mutation, since a single mutation can shift the meaning of any
//! cached span once the overlay is replayed.

use crate::locator::Span;

const CACHE_SLOTS: usize = 8;

#[derive(Debug, Clone)]
struct CacheEntry {
    key: String,
    scope: Span,
}

#[derive(Debug, Default)]
pub struct PrefixCache {
    slots: Vec<CacheEntry>,
    next: usize,
}

impl PrefixCache {
    pub fn new() -> Self {
        Self { slots: Vec::with_capacity(CACHE_SLOTS), next: 0 }
    }

    pub fn get(&self, key: &str) -> Option<Span> {
        self.slots.iter().find(|e| e.key == key).map(|e| e.scope)
    }

    pub fn set(&mut self, key: &str, scope: Span) {
        if let Some(existing) = self.slots.iter_mut().find(|e| e.key == key) {
            existing.scope = scope;
            return;
        }
        let entry = CacheEntry { key: key.to_string(), scope };
        if self.slots.len() < CACHE_SLOTS {
            self.slots.push(entry);
        } else {
            self.slots[self.next] = entry;
            self.next = (self.next + 1) % CACHE_SLOTS;
        }
    }

    pub fn invalidate(&mut self) {
        self.slots.clear();
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_retrieves() {
        let mut c = PrefixCache::new();
        c.set("top.dogs", Span { start: 5, end: 10 });
        assert_eq!(c.get("top.dogs"), Some(Span { start: 5, end: 10 }));
        assert_eq!(c.get("top.cats"), None);
    }

    #[test]
    fn wraps_around_after_capacity() {
        let mut c = PrefixCache::new();
        for i in 0..CACHE_SLOTS + 3 {
            c.set(&format!("k{i}"), Span { start: i, end: i + 1 });
        }
        assert_eq!(c.get("k0"), None);
        assert!(c.get(&format!("k{}", CACHE_SLOTS + 2)).is_some());
    }

    #[test]
    fn invalidate_clears_all() {
        let mut c = PrefixCache::new();
        c.set("a", Span { start: 0, end: 1 });
        c.invalidate();
        assert_eq!(c.get("a"), None);
    }
}
