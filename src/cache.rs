//! Explicit, bounded result cache.
//!
//! An interactive front end wants to show the last artifact again without
//! paying for another round of transformer calls. Instead of a hidden global,
//! callers hold an [`ArtifactCache`] and look results up by [`RequestKey`]:
//! a SHA-256 over the source text and the configuration selector.
//!
//! A request with an injected provider or transformer has no key unless the
//! configuration carries a `cache_label` naming that backend.

use crate::config::ExtractionConfig;
use crate::output::ExtractionOutput;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default number of cached results.
pub const DEFAULT_CAPACITY: usize = 16;

type Digest256 = sha2::digest::Output<Sha256>;

/// Fingerprint of one request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey(Digest256);

impl RequestKey {
    /// Key for `text` under `config`, or `None` if the request is not
    /// cacheable (see [`ExtractionConfig::selector`]).
    pub fn new(text: &str, config: &ExtractionConfig) -> Option<Self> {
        let selector = config.selector()?;
        let mut hasher = Sha256::new();
        hasher.update(selector.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        Some(Self(hasher.finalize()))
    }

    pub fn to_hex(&self) -> String {
        format!("{:x}", self.0)
    }
}

impl fmt::Debug for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestKey({})", &self.to_hex()[..12])
    }
}

struct Entries {
    map: HashMap<RequestKey, Arc<ExtractionOutput>>,
    order: VecDeque<RequestKey>,
}

/// Bounded, thread-safe map from [`RequestKey`] to results.
///
/// The oldest insertion is evicted first once `capacity` is reached.
pub struct ArtifactCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ArtifactCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn get(&self, key: &RequestKey) -> Option<Arc<ExtractionOutput>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.map.get(key).cloned()
    }

    pub fn insert(&self, key: RequestKey, output: ExtractionOutput) -> Arc<ExtractionOutput> {
        let output = Arc::new(output);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.map.insert(key, Arc::clone(&output)).is_none() {
            entries.order.push_back(key);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                debug!("Evicting {:?}", oldest);
                entries.map.remove(&oldest);
            }
        }
        output
    }

    /// Most recently inserted result, if any.
    pub fn last(&self) -> Option<Arc<ExtractionOutput>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .order
            .back()
            .and_then(|k| entries.map.get(k))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.map.clear();
        entries.order.clear();
    }
}
