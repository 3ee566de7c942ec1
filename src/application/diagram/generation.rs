use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Monotonic render counter shared between a caller's render loop and the
/// hydration passes it starts. A pass is stale once a newer render has begun.
#[derive(Debug, Clone, Default)]
pub struct RenderGeneration {
    latest: Arc<AtomicU64>,
}

impl RenderGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new render cycle and return its id. Ids start at 1.
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    pub fn is_current(&self, render_id: u64) -> bool {
        self.latest() == render_id
    }

    /// Staleness predicate for the pass started for `render_id`.
    pub fn staleness(&self, render_id: u64) -> impl Fn() -> bool + Send + Sync + 'static {
        let latest = Arc::clone(&self.latest);
        move || latest.load(Ordering::Acquire) != render_id
    }
}

#[cfg(test)]
mod tests {
    use super::RenderGeneration;

    #[test]
    fn newer_render_makes_older_pass_stale() {
        let generation = RenderGeneration::new();
        let first = generation.begin();
        let is_stale = generation.staleness(first);
        assert!(!is_stale());

        let second = generation.clone().begin();
        assert_eq!(second, first + 1);
        assert!(is_stale());
        assert!(generation.is_current(second));
    }
}
