//! Process-wide cache of compiled regular expressions.
//!
//! Regex constraints are matched many times against many strings during one
//! evaluation, and the same patterns recur across evaluations. Compilation
//! results are cached process-wide: the mutex is held for lookup and
//! first-time insertion per pattern; the compiled program is shared via
//! `Arc` and matched without any lock.

use std::sync::{Arc, LazyLock, Mutex};

use ahash::AHashMap;
use regex::Regex;

static CACHE: LazyLock<Mutex<AHashMap<Box<str>, Result<Arc<Regex>, regex::Error>>>> =
    LazyLock::new(|| Mutex::new(AHashMap::new()));

/// Compiles a pattern, reusing a prior compilation when available.
///
/// Failed compilations are cached too, so a bad pattern in a hot pattern
/// constraint does not recompile on every arc.
pub(crate) fn compile(pattern: &str) -> Result<Arc<Regex>, regex::Error> {
    let mut cache = CACHE.lock().expect("regex cache poisoned");
    if let Some(entry) = cache.get(pattern) {
        return entry.clone();
    }
    let compiled = Regex::new(pattern).map(Arc::new);
    cache.insert(pattern.into(), compiled.clone());
    compiled
}
