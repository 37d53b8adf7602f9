//! GPU identity database (spec §4.A, component A).
//!
//! Pure functions of the strings/limits/extensions queried once at context
//! creation: no GL calls issue from here after construction (spec contract).

use bitflags::bitflags;

use crate::config::{BackendSelector, Config, QualityPreset, ShaderCacheMode};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Vendor {
    Unknown,
    Adreno,
    Mali,
    PowerVr,
    Xclipse,
    Nvidia,
    Intel,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Generation {
    Unknown,
    // Adreno
    AdrenoLegacy,
    Adreno6xx,
    Adreno7xx,
    // Mali
    MaliMidgard,
    MaliBifrost,
    MaliValhall,
    // PowerVR
    PowerVrRogue,
    PowerVrImg,
    // Xclipse
    XclipseRdna,
    // Desktop-class vendors encountered on emulators/dev boxes.
    NvidiaDesktop,
    IntelDesktop,
}

bitflags! {
    #[derive(Default)]
    pub struct FeatureFlags: u32 {
        const COMPUTE               = 1 << 0;
        const GEOMETRY              = 1 << 1;
        const TESSELLATION          = 1 << 2;
        const ANISOTROPIC_FILTER    = 1 << 3;
        const PROGRAM_BINARY        = 1 << 4;
        const ASTC                  = 1 << 5;
        const FRAMEBUFFER_FETCH     = 1 << 6;
        const PERSISTENT_MAPPED_BUFFER = 1 << 7;
    }
}

/// Immutable record fixed at context creation (spec §3 "Device identity").
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceIdentity {
    pub vendor: Vendor,
    pub generation: Generation,
    pub model: u32,
    pub performance_tier: u8,
    pub features: FeatureFlags,
    pub anisotropic_max: f32,
    pub vendor_hash: u32,
    pub driver_version_hash: u32,
}

impl DeviceIdentity {
    /// 64-bit key combining vendor and driver-version hashes (spec §3).
    pub fn cache_key(&self) -> u64 {
        ((self.vendor_hash as u64) << 32) | self.driver_version_hash as u64
    }
}

/// Inputs queried once at context creation (spec §4.A "Inputs").
pub struct DeviceQuery<'a> {
    pub vendor_string: &'a str,
    pub renderer_string: &'a str,
    pub version_string: &'a str,
    pub extensions: &'a [String],
    pub max_anisotropy: f32,
}

/// Classifies a device from its reported strings. Documented match order,
/// first hit wins (spec §4.A): qualcomm/adreno, arm/mali, imagination/powervr,
/// samsung/xclipse, nvidia, intel, unknown.
pub fn classify(query: &DeviceQuery) -> DeviceIdentity {
    let haystack = format!(
        "{} {}",
        query.vendor_string.to_lowercase(),
        query.renderer_string.to_lowercase()
    );

    let vendor = if haystack.contains("qualcomm") || haystack.contains("adreno") {
        Vendor::Adreno
    } else if haystack.contains("arm") || haystack.contains("mali") {
        Vendor::Mali
    } else if haystack.contains("imagination") || haystack.contains("powervr") {
        Vendor::PowerVr
    } else if haystack.contains("samsung") || haystack.contains("xclipse") {
        Vendor::Xclipse
    } else if haystack.contains("nvidia") {
        Vendor::Nvidia
    } else if haystack.contains("intel") {
        Vendor::Intel
    } else {
        Vendor::Unknown
    };

    let model = extract_model_number(&haystack);
    let generation = classify_generation(vendor, model, query.extensions);
    let performance_tier = performance_tier_for(vendor, model, generation);
    let features = detect_features(vendor, generation, query.extensions);

    let vendor_hash = fxhash::hash32(query.vendor_string);
    let driver_version_hash = fxhash::hash32(query.version_string);

    DeviceIdentity {
        vendor,
        generation,
        model,
        performance_tier,
        features,
        anisotropic_max: query.max_anisotropy,
        vendor_hash,
        driver_version_hash,
    }
}

/// First decimal digit sequence found in the renderer string (spec §4.A).
fn extract_model_number(haystack: &str) -> u32 {
    let mut digits = String::new();
    let mut found = false;
    for c in haystack.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            found = true;
        } else if found {
            break;
        }
    }
    digits.parse().unwrap_or(0)
}

fn classify_generation(vendor: Vendor, model: u32, extensions: &[String]) -> Generation {
    match vendor {
        Vendor::Adreno => {
            if model >= 700 {
                Generation::Adreno7xx
            } else if model >= 600 {
                Generation::Adreno6xx
            } else {
                Generation::AdrenoLegacy
            }
        }
        Vendor::Mali => {
            if extensions.iter().any(|e| e.contains("EXT_shader_framebuffer_fetch")) && model >= 700
            {
                Generation::MaliValhall
            } else if model >= 600 {
                Generation::MaliBifrost
            } else {
                Generation::MaliMidgard
            }
        }
        Vendor::PowerVr => {
            if model >= 9 {
                Generation::PowerVrRogue
            } else {
                Generation::PowerVrImg
            }
        }
        Vendor::Xclipse => Generation::XclipseRdna,
        Vendor::Nvidia => Generation::NvidiaDesktop,
        Vendor::Intel => Generation::IntelDesktop,
        Vendor::Unknown => Generation::Unknown,
    }
}

/// Performance tier lookup table keyed by (vendor, model) (spec §4.A).
fn performance_tier_for(vendor: Vendor, model: u32, generation: Generation) -> u8 {
    match vendor {
        Vendor::Adreno => {
            if model >= 730 {
                5
            } else if model >= 650 {
                4
            } else if model >= 530 {
                3
            } else {
                2
            }
        }
        Vendor::Mali => match generation {
            Generation::MaliValhall => 4,
            Generation::MaliBifrost => 3,
            _ => 2,
        },
        Vendor::Xclipse => 4,
        Vendor::PowerVr => 2,
        Vendor::Nvidia | Vendor::Intel => 5,
        Vendor::Unknown => 2,
    }
}

fn detect_features(vendor: Vendor, generation: Generation, extensions: &[String]) -> FeatureFlags {
    let has = |name: &str| extensions.iter().any(|e| e == name);
    let mut f = FeatureFlags::empty();

    if has("GL_EXT_texture_filter_anisotropic") || has("GL_ARB_texture_filter_anisotropic") {
        f |= FeatureFlags::ANISOTROPIC_FILTER;
    }
    if has("GL_OES_texture_compression_astc") || has("GL_KHR_texture_compression_astc_ldr") {
        f |= FeatureFlags::ASTC;
    }
    if has("GL_EXT_shader_framebuffer_fetch") {
        f |= FeatureFlags::FRAMEBUFFER_FETCH;
    }
    if has("GL_EXT_buffer_storage") {
        f |= FeatureFlags::PERSISTENT_MAPPED_BUFFER;
    }
    if has("GL_OES_get_program_binary") || has("GL_ARB_get_program_binary") {
        f |= FeatureFlags::PROGRAM_BINARY;
    }
    if has("GL_ARB_tessellation_shader") || has("GL_EXT_tessellation_shader") {
        f |= FeatureFlags::TESSELLATION;
    }
    if has("GL_EXT_geometry_shader") || has("GL_ARB_geometry_shader4") {
        f |= FeatureFlags::GEOMETRY;
    }
    // Compute shaders are core in ES 3.1+; conservatively require the desktop
    // ARB extension string OR a generation known to ship ES 3.1+ drivers.
    if has("GL_ARB_compute_shader")
        || matches!(
            generation,
            Generation::Adreno6xx
                | Generation::Adreno7xx
                | Generation::MaliBifrost
                | Generation::MaliValhall
                | Generation::XclipseRdna
                | Generation::NvidiaDesktop
                | Generation::IntelDesktop
        )
    {
        f |= FeatureFlags::COMPUTE;
    }
    let _ = vendor;
    f
}

/// Tier-driven defaults projected onto a `Config` (spec §4.A "Outputs").
pub fn recommended_config(identity: &DeviceIdentity) -> Config {
    let tier = identity.performance_tier;

    let (quality_preset, max_batch_size, texture_pool_mb, min_scale, instancing, target_fps) =
        match tier {
            1 => (QualityPreset::UltraLow, 64, 32, 0.4, false, 30.0),
            2 => (QualityPreset::Low, 128, 64, 0.5, false, 30.0),
            3 => (QualityPreset::Medium, 192, 96, 0.6, true, 60.0),
            4 => (QualityPreset::High, 256, 128, 0.7, true, 60.0),
            _ => (QualityPreset::Ultra, 384, 256, 0.8, true, 60.0),
        };

    Config {
        quality_preset,
        backend: BackendSelector::Auto,
        shader_cache_mode: ShaderCacheMode::Disk,
        shader_cache_path: None,
        shader_cache_max_bytes: 64 * 1024 * 1024,
        dynamic_resolution_enabled: true,
        min_scale,
        max_scale: 1.0,
        target_fps,
        draw_batching_enabled: true,
        instancing_enabled: instancing,
        max_batch_size,
        texture_pool_mb,
        max_texture_size: 4096,
        buffer_pool_mb: 64,
        persistent_mapping_enabled: identity
            .features
            .contains(FeatureFlags::PERSISTENT_MAPPED_BUFFER),
        gpu_specific_tweaks_enabled: true,
        debug_output: false,
        profiling_enabled: false,
        reserved_force_compat: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classify_order_qualcomm_first() {
        let q = DeviceQuery {
            vendor_string: "Qualcomm",
            renderer_string: "Adreno (TM) 740",
            version_string: "OpenGL ES 3.2",
            extensions: &ext(&[]),
            max_anisotropy: 16.0,
        };
        let id = classify(&q);
        assert_eq!(id.vendor, Vendor::Adreno);
        assert_eq!(id.model, 740);
        assert_eq!(id.performance_tier, 5);
    }

    #[test]
    fn classify_mali_g710() {
        let q = DeviceQuery {
            vendor_string: "ARM",
            renderer_string: "Mali-G710",
            version_string: "OpenGL ES 3.2",
            extensions: &ext(&["GL_EXT_shader_framebuffer_fetch"]),
            max_anisotropy: 16.0,
        };
        let id = classify(&q);
        assert_eq!(id.vendor, Vendor::Mali);
        assert_eq!(id.generation, Generation::MaliValhall);
        assert_eq!(id.performance_tier, 4);
    }

    #[test]
    fn unknown_vendor_is_tier_two() {
        let q = DeviceQuery {
            vendor_string: "Totally Generic Corp",
            renderer_string: "Generic GL Renderer",
            version_string: "OpenGL ES 3.0",
            extensions: &ext(&[]),
            max_anisotropy: 1.0,
        };
        let id = classify(&q);
        assert_eq!(id.vendor, Vendor::Unknown);
        assert_eq!(id.performance_tier, 2);
    }

    #[test]
    fn feature_flags_reflect_extension_list_not_vendor_guess() {
        let q = DeviceQuery {
            vendor_string: "Qualcomm",
            renderer_string: "Adreno (TM) 530",
            version_string: "OpenGL ES 3.1",
            extensions: &ext(&["GL_EXT_texture_filter_anisotropic"]),
            max_anisotropy: 16.0,
        };
        let id = classify(&q);
        assert!(id.features.contains(FeatureFlags::ANISOTROPIC_FILTER));
        assert!(!id.features.contains(FeatureFlags::ASTC));
    }

    #[test]
    fn cache_key_combines_both_hashes() {
        let id = DeviceIdentity {
            vendor: Vendor::Adreno,
            generation: Generation::Adreno7xx,
            model: 740,
            performance_tier: 5,
            features: FeatureFlags::empty(),
            anisotropic_max: 16.0,
            vendor_hash: 0xAAAA_BBBB,
            driver_version_hash: 0xCCCC_DDDD,
        };
        let key = id.cache_key();
        assert_eq!(key >> 32, 0xAAAA_BBBB);
        assert_eq!(key & 0xFFFF_FFFF, 0xCCCC_DDDD);
    }
}
