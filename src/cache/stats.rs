use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected by a [`crate::Cache`] since the previous call to [`crate::Cache::stats`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Stats {
    /// Accesses served from a fresh entry.
    pub hit_count: u64,
    /// Accesses that found no entry or a stale one.
    pub miss_count: u64,
    /// Populations whose handler succeeded.
    pub population_count: u64,
    /// Populations that failed, either in the handler or in the storage backend.
    pub failed_population_count: u64,
    /// Entries invalidated and removed because they were stale or could not be consumed.
    pub invalidation_count: u64,
    pub millis_elapsed: u128,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    population_count: AtomicU64,
    failed_population_count: AtomicU64,
    invalidation_count: AtomicU64,
}

impl Counters {
    pub(crate) fn increment_hit_count(&self) {
        self.hit_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_miss_count(&self) {
        self.miss_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_population_count(&self) {
        self.population_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_failed_population_count(&self) {
        self.failed_population_count.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn increment_invalidation_count(&self) {
        self.invalidation_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Moves the current counts into `stats` and resets them.
    pub(crate) fn take_into(&self, stats: &mut Stats) {
        stats.hit_count = self.hit_count.swap(0, Ordering::AcqRel);
        stats.miss_count = self.miss_count.swap(0, Ordering::AcqRel);
        stats.population_count = self.population_count.swap(0, Ordering::AcqRel);
        stats.failed_population_count = self.failed_population_count.swap(0, Ordering::AcqRel);
        stats.invalidation_count = self.invalidation_count.swap(0, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_resets_counts_when_taken() {
        // given
        let counters = Counters::default();
        counters.increment_hit_count();
        counters.increment_hit_count();
        counters.increment_miss_count();
        counters.increment_population_count();

        // when
        let mut stats = Stats::default();
        counters.take_into(&mut stats);

        // then
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.population_count, 1);
        assert_eq!(stats.failed_population_count, 0);

        let mut stats = Stats::default();
        counters.take_into(&mut stats);
        assert_eq!(stats, Stats::default());
    }
}
