//! Curated whitelist catalog
//!
//! Hand-picked known-good recording ids per tag, used when live search
//! comes back empty or fails. Picks rotate round-robin per tag so repeat
//! generations do not always land on the same recording.
//!
//! The pick operation holds a plain sync mutex and contains no await
//! point, so concurrent picks for the same tag cannot lose cursor
//! updates.

use std::collections::HashMap;
use std::sync::Mutex;

/// Curated tag → recording-id catalog with round-robin cursors.
pub struct WhitelistCatalog {
    entries: Mutex<HashMap<String, Vec<u64>>>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl WhitelistCatalog {
    /// Catalog with the built-in curated entries.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        for (tag, ids) in CURATED {
            entries.insert(tag.to_string(), ids.to_vec());
        }
        Self {
            entries: Mutex::new(entries),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Empty catalog, for tests.
    pub fn empty() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn has(&self, tag: &str) -> bool {
        self.entries
            .lock()
            .expect("whitelist lock poisoned")
            .get(tag)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    pub fn ids(&self, tag: &str) -> Vec<u64> {
        self.entries
            .lock()
            .expect("whitelist lock poisoned")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace a tag's entry and reset its rotation cursor.
    pub fn set(&self, tag: &str, ids: Vec<u64>) {
        self.entries
            .lock()
            .expect("whitelist lock poisoned")
            .insert(tag.to_string(), ids);
        self.cursors
            .lock()
            .expect("whitelist lock poisoned")
            .insert(tag.to_string(), 0);
    }

    /// Next id for this tag in round-robin order, advancing the cursor.
    pub fn pick(&self, tag: &str) -> Option<u64> {
        let entries = self.entries.lock().expect("whitelist lock poisoned");
        let ids = entries.get(tag)?;
        if ids.is_empty() {
            return None;
        }
        let mut cursors = self.cursors.lock().expect("whitelist lock poisoned");
        let cursor = cursors.entry(tag.to_string()).or_insert(0);
        let id = ids[*cursor % ids.len()];
        *cursor = (*cursor + 1) % ids.len();
        Some(id)
    }
}

impl Default for WhitelistCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Hand-picked recordings per tag, vetted for seamless looping and a
/// non-musical character.
const CURATED: &[(&str, &[u64])] = &[
    ("roomtone", &[237_410, 331_621, 456_123]),
    ("light_rain", &[346_642, 243_627]),
    ("rain", &[243_628, 169_295, 528_837]),
    ("wind", &[181_252, 397_946]),
    ("waves", &[450_755, 328_118]),
    ("seagulls", &[412_017]),
    ("distant_chatter", &[328_725, 165_284]),
    ("footsteps_stone", &[334_298]),
    ("subway", &[157_539, 426_888]),
    ("motorcycle", &[172_338]),
    ("birds", &[345_852, 416_529]),
    ("insects", &[371_277, 513_652]),
    ("neon_buzz", &[254_819]),
    ("vinyl_crackle", &[159_744, 476_632]),
    ("bell", &[339_809]),
];
