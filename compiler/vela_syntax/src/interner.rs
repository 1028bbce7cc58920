//! String interner for identifier and token text storage.
//!
//! Interning gives O(1) equality and hashing for names. The interner is
//! thread-safe (readers take a shared lock, writers an exclusive one) and
//! can be wrapped in `Arc` for sharing across a host's compilations.
//!
//! Backing storage is leaked `Box<str>` so lookups hand out `&'static str`
//! without holding the lock; an interner lives for the process lifetime in
//! every real host, so the leak is the storage strategy, not a bug.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Interned string handle.
///
/// Index 0 is always the empty string.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Name(u32);

impl Name {
    /// The pre-interned empty string.
    pub const EMPTY: Name = Name(0);

    /// Raw index of the handle.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

struct InternerState {
    map: FxHashMap<&'static str, u32>,
    strings: Vec<&'static str>,
}

/// Thread-safe string interner.
pub struct StringInterner {
    state: RwLock<InternerState>,
}

impl StringInterner {
    /// Create a new interner with the empty string pre-interned at index 0.
    pub fn new() -> Self {
        let mut state = InternerState {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(256),
        };
        state.map.insert("", 0);
        state.strings.push("");
        StringInterner {
            state: RwLock::new(state),
        }
    }

    /// Intern a string, returning its handle.
    ///
    /// Interning the same content twice returns the same [`Name`].
    pub fn intern(&self, text: &str) -> Name {
        if text.is_empty() {
            return Name::EMPTY;
        }

        {
            let state = self.state.read();
            if let Some(&idx) = state.map.get(text) {
                return Name(idx);
            }
        }

        let mut state = self.state.write();
        // Another writer may have interned it between the locks.
        if let Some(&idx) = state.map.get(text) {
            return Name(idx);
        }

        let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
        let idx = u32::try_from(state.strings.len())
            .unwrap_or_else(|_| panic_interner_full(state.strings.len()));
        state.strings.push(leaked);
        state.map.insert(leaked, idx);
        Name(idx)
    }

    /// Look up the text of a handle.
    ///
    /// # Panics
    /// Panics if the handle came from a different interner.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.state.read().strings[name.0 as usize]
    }

    /// Number of interned strings (including the empty string).
    pub fn len(&self) -> usize {
        self.state.read().strings.len()
    }

    /// Always false: the empty string is pre-interned.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        StringInterner::new()
    }
}

#[cold]
#[inline(never)]
fn panic_interner_full(count: usize) -> ! {
    panic!("interner capacity exceeded: {count} strings (0x{count:X}), max is {}", u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedup() {
        let interner = StringInterner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.lookup(a), "hello");
        assert_eq!(interner.lookup(c), "world");
    }

    #[test]
    fn test_empty_string_is_index_zero() {
        let interner = StringInterner::new();
        assert_eq!(interner.intern(""), Name::EMPTY);
        assert_eq!(interner.lookup(Name::EMPTY), "");
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        use std::sync::Arc;

        let interner = Arc::new(StringInterner::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let interner = Arc::clone(&interner);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| interner.intern(&format!("name{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<Name>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
    }
}
