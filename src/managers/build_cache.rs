//! 按名索引的构建缓存，带失效代数
//!
//! build 开始前取 generation()，构建完成后用 insert_if_current 写回；
//! 期间若发生 invalidate / clear，代数已变，旧定义构建出的对象不会进入缓存。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Slots<T> {
    generation: u64,
    entries: HashMap<String, Arc<T>>,
}

pub struct BuildCache<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> Default for BuildCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slots {
                generation: 0,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<T> BuildCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.slots.lock().ok()?.entries.get(name).cloned()
    }

    pub fn generation(&self) -> u64 {
        self.slots.lock().map(|s| s.generation).unwrap_or(u64::MAX)
    }

    /// 代数未变时写入并返回 true
    pub fn insert_if_current(&self, generation: u64, name: &str, value: Arc<T>) -> bool {
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        if slots.generation != generation {
            return false;
        }
        slots.entries.insert(name.to_string(), value);
        true
    }

    /// 移除条目并推进代数；返回条目是否存在
    pub fn invalidate(&self, name: &str) -> bool {
        let Ok(mut slots) = self.slots.lock() else {
            return false;
        };
        slots.generation += 1;
        slots.entries.remove(name).is_some()
    }

    pub fn clear(&self) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.generation += 1;
            slots.entries.clear();
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots
            .lock()
            .map(|s| s.entries.contains_key(name))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_skipped_after_invalidation() {
        let cache: BuildCache<String> = BuildCache::new();
        let generation = cache.generation();
        cache.invalidate("crew");
        assert!(!cache.insert_if_current(generation, "crew", Arc::new("old".into())));
        assert!(cache.get("crew").is_none());

        let generation = cache.generation();
        assert!(cache.insert_if_current(generation, "crew", Arc::new("new".into())));
        assert_eq!(cache.get("crew").as_deref().map(String::as_str), Some("new"));
    }

    #[test]
    fn test_clear_bumps_generation() {
        let cache: BuildCache<u32> = BuildCache::new();
        let generation = cache.generation();
        assert!(cache.insert_if_current(generation, "a", Arc::new(1)));
        cache.clear();
        assert!(!cache.contains("a"));
        assert!(!cache.insert_if_current(generation, "a", Arc::new(2)));
        assert_ne!(cache.generation(), generation);
    }
}
