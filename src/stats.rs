//! Aggregated runtime statistics (ambient module, `SPEC_FULL.md` §2).
//!
//! Pulls the live counters every subsystem already tracks into one struct
//! the `ffi` surface can hand back through `get_stats`. No subsystem reaches
//! upward to collect these itself (spec.md §9 "Cyclic references": "subsystems
//! publish stats, they do not query each other upward") — `context` gathers
//! them here instead.

use crate::batcher::BatcherStats;
use crate::buffer_pool::BufferPoolStats;
use crate::scaler::ScalerStats;
use crate::shader_cache::ShaderCacheStats;
use crate::state::StateStats;
use crate::streaming_ring::StreamingRingStats;

#[derive(Copy, Clone, Debug, Default)]
pub struct Stats {
    pub state: StateStats,
    pub buffer_pool: BufferPoolStats,
    pub streaming_ring: StreamingRingStats,
    pub shader_cache: ShaderCacheStats,
    pub batcher: BatcherStats,
    pub scaler: ScalerStats,
}

impl Stats {
    pub fn state_changes_avoided(&self) -> u64 {
        self.state.avoided
    }

    pub fn draw_calls_saved(&self) -> u64 {
        self.batcher.draw_calls_saved
    }

    pub fn shader_cache_hit_rate(&self) -> f32 {
        let total = self.shader_cache.hits + self.shader_cache.misses;
        if total == 0 {
            0.0
        } else {
            self.shader_cache.hits as f32 / total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_with_no_lookups() {
        assert_eq!(Stats::default().shader_cache_hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_reflects_hits_over_total() {
        let mut stats = Stats::default();
        stats.shader_cache.hits = 3;
        stats.shader_cache.misses = 1;
        assert_eq!(stats.shader_cache_hit_rate(), 0.75);
    }
}
