use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use codeloom_identity::{GeneratedId, IdRequest, IdentityError, IdentityProvider, IdentityService};

/// Identity service wrapper with a per-analyzer LRU cache, keyed on the
/// full request tuple. A file re-uses the same scope ids for every entity
/// it contains, so the hit rate within one invocation is high.
pub struct CachedIdentity {
    service: IdentityService,
    cache: Mutex<LruCache<IdRequest, GeneratedId>>,
}

impl CachedIdentity {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is non-zero");
        Self {
            service: IdentityService,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn generate(&self, request: &IdRequest) -> Result<GeneratedId, IdentityError> {
        {
            let mut cache = self.cache.lock().expect("id cache lock poisoned");
            if let Some(hit) = cache.get(request) {
                return Ok(hit.clone());
            }
        }
        let generated = self.service.generate_id(request)?;
        self.cache
            .lock()
            .expect("id cache lock poisoned")
            .put(request.clone(), generated.clone());
        Ok(generated)
    }
}

impl Default for CachedIdentity {
    fn default() -> Self {
        Self::new(2048)
    }
}
