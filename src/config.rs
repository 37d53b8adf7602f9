//! Closed-set configuration surface (spec §6). Reading the value in from a
//! JSON file, a settings UI, or anywhere else is the host application's job
//! (spec §1's "external collaborators") — this module only defines the shape
//! and the defaults `identity::recommended_config` projects onto it.

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum QualityPreset {
    UltraLow,
    Low,
    Medium,
    High,
    Ultra,
    Custom,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BackendSelector {
    Auto,
    Gles3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShaderCacheMode {
    Disabled,
    MemoryOnly,
    Disk,
    Aggressive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub quality_preset: QualityPreset,
    pub backend: BackendSelector,

    pub shader_cache_mode: ShaderCacheMode,
    pub shader_cache_path: Option<String>,
    pub shader_cache_max_bytes: u64,

    pub dynamic_resolution_enabled: bool,
    pub min_scale: f32,
    pub max_scale: f32,
    pub target_fps: f32,

    pub draw_batching_enabled: bool,
    pub instancing_enabled: bool,
    pub max_batch_size: u32,

    pub texture_pool_mb: u32,
    pub max_texture_size: u32,
    pub buffer_pool_mb: u32,
    pub persistent_mapping_enabled: bool,

    pub gpu_specific_tweaks_enabled: bool,
    pub debug_output: bool,
    pub profiling_enabled: bool,

    /// `forceCompatibilityMode` in the source config blob. No subsystem
    /// reads this today; carried through so callers passing an existing
    /// config file don't lose the field. See spec.md §9 Open Questions.
    pub reserved_force_compat: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            quality_preset: QualityPreset::Medium,
            backend: BackendSelector::Auto,
            shader_cache_mode: ShaderCacheMode::Disk,
            shader_cache_path: None,
            shader_cache_max_bytes: 64 * 1024 * 1024,
            dynamic_resolution_enabled: true,
            min_scale: 0.5,
            max_scale: 1.0,
            target_fps: 60.0,
            draw_batching_enabled: true,
            instancing_enabled: true,
            max_batch_size: 256,
            texture_pool_mb: 128,
            max_texture_size: 4096,
            buffer_pool_mb: 64,
            persistent_mapping_enabled: true,
            gpu_specific_tweaks_enabled: true,
            debug_output: false,
            profiling_enabled: false,
            reserved_force_compat: false,
        }
    }
}

impl Config {
    pub fn target_frame_time_ms(&self) -> f32 {
        1000.0 / self.target_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = Config::default();
        assert!(cfg.min_scale <= cfg.max_scale);
        assert!(cfg.target_fps > 0.0);
    }
}
