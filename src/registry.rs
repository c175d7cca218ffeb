//! Script loader registry
//!
//! A process-wide table from [`ScriptId`] to the literal guest source text a
//! synthetic frame refers to. Tracebacks resolve frame locations through it,
//! the same way a native traceback resolves a file name through a module
//! loader.
//!
//! Entries are held weakly. The strong references live in the registering
//! context (until it is torn down) and in the frames of errors that are
//! still alive, so a source disappears from the registry once nothing can
//! display it any more.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::prelude::FxHashMap;

/// Identifier of a registered script source. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(u64);

impl ScriptId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered piece of guest source text.
#[derive(Debug)]
pub struct ScriptSource {
    id: ScriptId,
    context: u64,
    name: String,
    text: String,
}

impl ScriptSource {
    pub fn id(&self) -> ScriptId {
        self.id
    }

    /// Id of the context that registered this source.
    pub fn context(&self) -> u64 {
        self.context
    }

    /// Synthetic module name, `javascript:<context>:<n>[:<function>]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Registrations between two automatic purges.
const PURGE_INTERVAL: u64 = 256;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

static REGISTRY: Lazy<RwLock<FxHashMap<ScriptId, Weak<ScriptSource>>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Register `text` on behalf of `context`. The returned `Arc` is the strong
/// reference that keeps the entry resolvable.
pub fn register(context: u64, function: Option<&str>, text: &str) -> Arc<ScriptSource> {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let id = ScriptId(n);
    let name = match function {
        Some(function) => format!("javascript:{}:{}:{}", context, n, function),
        None => format!("javascript:{}:{}", context, n),
    };
    let source = Arc::new(ScriptSource {
        id,
        context,
        name,
        text: text.to_string(),
    });

    let mut entries = REGISTRY.write();
    if n % PURGE_INTERVAL == 0 {
        entries.retain(|_, weak| weak.strong_count() > 0);
    }
    entries.insert(id, Arc::downgrade(&source));
    source
}

/// Resolve an identifier to its registered source, if still alive.
pub fn lookup(id: ScriptId) -> Option<Arc<ScriptSource>> {
    REGISTRY.read().get(&id).and_then(Weak::upgrade)
}

/// The literal source text registered under `id`.
pub fn get_source(id: ScriptId) -> Option<String> {
    lookup(id).map(|source| source.text.clone())
}

/// All live sources registered by one context, in registration order.
pub fn scripts_for(context: u64) -> Vec<Arc<ScriptSource>> {
    let mut sources: Vec<_> = REGISTRY
        .read()
        .values()
        .filter_map(Weak::upgrade)
        .filter(|source| source.context == context)
        .collect();
    sources.sort_by_key(|source| source.id);
    sources
}

/// Drop entries whose source is no longer referenced. Returns the number of
/// entries removed.
pub fn purge() -> usize {
    let mut entries = REGISTRY.write();
    let before = entries.len();
    entries.retain(|_, weak| weak.strong_count() > 0);
    before - entries.len()
}
