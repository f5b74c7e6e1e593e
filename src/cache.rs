use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::trace;

use crate::options::CompileOptions;
use crate::target::CompileResult;

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub hash: String,
    pub result: CompileResult,
}

/// Caller-owned memo of compile results. The compiler never consults it on
/// its own.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: HashMap<String, CacheEntry>,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 over the source and the serialized options.
    pub fn compute_hash(source: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(options).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, source: &str, options: &CompileOptions) -> Option<&CompileResult> {
        let hash = Self::compute_hash(source, options);
        let hit = self.entries.get(&hash).map(|e| &e.result);
        trace!(hash = %hash, hit = hit.is_some(), "cache lookup");
        hit
    }

    pub fn set(&mut self, source: &str, options: &CompileOptions, result: CompileResult) {
        let hash = Self::compute_hash(source, options);
        self.entries.insert(hash.clone(), CacheEntry { hash, result });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
