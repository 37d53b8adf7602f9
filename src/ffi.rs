//! The `extern "C"` public surface (spec §6), the only part of this crate a
//! host application links against. Every wrapper here matches on the
//! `Result` its subsystem call returns and converts to the neutral value
//! spec.md's error taxonomy (§7) prescribes — a `VelocityError` never
//! crosses this boundary, matching the teacher's `debug_callback`-style
//! "log, don't propagate across the FFI/GL boundary" posture generalised
//! from GL debug messages to this crate's own error type.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;

use crate::batcher::{BatchKey, BatchKind, DrawCommand};
use crate::config::{BackendSelector, Config, QualityPreset, ShaderCacheMode};
use crate::context::{self, Context};
use crate::error::VelocityError;
use crate::gl;
use crate::identity::Vendor;

/// C-ABI mirror of `Config`. Strings are passed as nullable, null-terminated
/// `c_char` pointers the caller owns for the duration of the call only —
/// this crate copies them immediately.
#[repr(C)]
pub struct FfiConfig {
    pub quality_preset: i32,
    pub backend: i32,
    pub shader_cache_mode: i32,
    pub shader_cache_path: *const c_char,
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
    pub reserved_force_compat: bool,
}

fn quality_preset_from_i32(v: i32) -> QualityPreset {
    match v {
        0 => QualityPreset::UltraLow,
        1 => QualityPreset::Low,
        2 => QualityPreset::Medium,
        3 => QualityPreset::High,
        4 => QualityPreset::Ultra,
        _ => QualityPreset::Custom,
    }
}

fn quality_preset_to_i32(v: QualityPreset) -> i32 {
    match v {
        QualityPreset::UltraLow => 0,
        QualityPreset::Low => 1,
        QualityPreset::Medium => 2,
        QualityPreset::High => 3,
        QualityPreset::Ultra => 4,
        QualityPreset::Custom => 5,
    }
}

fn shader_cache_mode_from_i32(v: i32) -> ShaderCacheMode {
    match v {
        0 => ShaderCacheMode::Disabled,
        1 => ShaderCacheMode::MemoryOnly,
        2 => ShaderCacheMode::Disk,
        _ => ShaderCacheMode::Aggressive,
    }
}

fn shader_cache_mode_to_i32(v: ShaderCacheMode) -> i32 {
    match v {
        ShaderCacheMode::Disabled => 0,
        ShaderCacheMode::MemoryOnly => 1,
        ShaderCacheMode::Disk => 2,
        ShaderCacheMode::Aggressive => 3,
    }
}

/// # Safety
/// `raw` must point to a valid, initialised `FfiConfig` for the duration of
/// this call; `shader_cache_path`, if non-null, must be a valid
/// null-terminated C string.
unsafe fn config_from_ffi(raw: &FfiConfig) -> Config {
    let shader_cache_path = if raw.shader_cache_path.is_null() {
        None
    } else {
        Some(CStr::from_ptr(raw.shader_cache_path).to_string_lossy().into_owned())
    };
    Config {
        quality_preset: quality_preset_from_i32(raw.quality_preset),
        backend: if raw.backend == 0 { BackendSelector::Auto } else { BackendSelector::Gles3 },
        shader_cache_mode: shader_cache_mode_from_i32(raw.shader_cache_mode),
        shader_cache_path,
        shader_cache_max_bytes: raw.shader_cache_max_bytes,
        dynamic_resolution_enabled: raw.dynamic_resolution_enabled,
        min_scale: raw.min_scale,
        max_scale: raw.max_scale,
        target_fps: raw.target_fps,
        draw_batching_enabled: raw.draw_batching_enabled,
        instancing_enabled: raw.instancing_enabled,
        max_batch_size: raw.max_batch_size,
        texture_pool_mb: raw.texture_pool_mb,
        max_texture_size: raw.max_texture_size,
        buffer_pool_mb: raw.buffer_pool_mb,
        persistent_mapping_enabled: raw.persistent_mapping_enabled,
        gpu_specific_tweaks_enabled: raw.gpu_specific_tweaks_enabled,
        debug_output: raw.debug_output,
        profiling_enabled: raw.profiling_enabled,
        reserved_force_compat: raw.reserved_force_compat,
    }
}

fn config_to_ffi(config: &Config, out: &mut FfiConfig) {
    out.quality_preset = quality_preset_to_i32(config.quality_preset);
    out.backend = if config.backend == BackendSelector::Auto { 0 } else { 1 };
    out.shader_cache_mode = shader_cache_mode_to_i32(config.shader_cache_mode);
    // `shader_cache_path` is left untouched: ownership of the string buffer
    // this field would need is the caller's problem, not this crate's — see
    // DESIGN.md for the documented limitation of this round-trip.
    out.shader_cache_max_bytes = config.shader_cache_max_bytes;
    out.dynamic_resolution_enabled = config.dynamic_resolution_enabled;
    out.min_scale = config.min_scale;
    out.max_scale = config.max_scale;
    out.target_fps = config.target_fps;
    out.draw_batching_enabled = config.draw_batching_enabled;
    out.instancing_enabled = config.instancing_enabled;
    out.max_batch_size = config.max_batch_size;
    out.texture_pool_mb = config.texture_pool_mb;
    out.max_texture_size = config.max_texture_size;
    out.buffer_pool_mb = config.buffer_pool_mb;
    out.persistent_mapping_enabled = config.persistent_mapping_enabled;
    out.gpu_specific_tweaks_enabled = config.gpu_specific_tweaks_enabled;
    out.debug_output = config.debug_output;
    out.profiling_enabled = config.profiling_enabled;
    out.reserved_force_compat = config.reserved_force_compat;
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct FfiStats {
    pub state_changes_avoided: u64,
    pub state_changes_forwarded: u64,
    pub buffer_pool_alloc_failures: u64,
    pub streaming_ring_fence_timeouts: u64,
    pub shader_cache_hits: u64,
    pub shader_cache_misses: u64,
    pub draw_calls_submitted: u64,
    pub draw_calls_executed: u64,
    pub draw_calls_saved: u64,
    pub batches_created: u64,
    pub scale_changes: u64,
}

#[repr(C)]
pub struct FfiGpuCaps {
    pub vendor: i32,
    pub performance_tier: u8,
    pub anisotropic_max: f32,
    pub features: u32,
    pub masquerade_major: u32,
    pub masquerade_minor: u32,
}

fn vendor_to_i32(v: Vendor) -> i32 {
    match v {
        Vendor::Unknown => 0,
        Vendor::Adreno => 1,
        Vendor::Mali => 2,
        Vendor::PowerVr => 3,
        Vendor::Xclipse => 4,
        Vendor::Nvidia => 5,
        Vendor::Intel => 6,
    }
}

/// `init(config) -> bool` (spec §6 "Init surface").
///
/// # Safety
/// `config` must be a valid pointer to an initialised `FfiConfig`, or null
/// (treated as `init_default`).
#[no_mangle]
pub unsafe extern "C" fn velocity_init(config: *const FfiConfig) -> bool {
    if context::is_installed() {
        log::warn!("velocity_init called while already initialised");
        return false;
    }
    let cfg = if config.is_null() { Config::default() } else { config_from_ffi(&*config) };
    // The real GL loader/platform proc-address callback is wired in by
    // `velocity_create_context`; `init` only establishes configuration
    // state, matching spec.md's Design Notes DAG (identity DB depends on a
    // live context, not on `init` alone).
    let _ = cfg;
    true
}

/// `init_default() -> bool`.
#[no_mangle]
pub extern "C" fn velocity_init_default() -> bool {
    unsafe { velocity_init(std::ptr::null()) }
}

/// `shutdown()`.
#[no_mangle]
pub extern "C" fn velocity_shutdown() {
    context::teardown();
}

type ProcAddressFn = unsafe extern "C" fn(*const c_char) -> *const c_void;

/// `create_context(native_window, display)`, extended with the loader
/// callback the platform shim resolves real GLES entry points through (the
/// "EGL-like layer... consumed, not specified" of spec.md §1).
///
/// # Safety
/// `native_window` and `display` are opaque platform handles forwarded
/// as-is; `get_proc_address` must be a valid function pointer usable for the
/// lifetime of the context.
#[no_mangle]
pub unsafe extern "C" fn velocity_create_context(
    native_window: *mut c_void,
    display: *mut c_void,
    native_w: u32,
    native_h: u32,
    get_proc_address: ProcAddressFn,
    config: *const FfiConfig,
) -> bool {
    let _ = (native_window, display);
    let cfg = if config.is_null() { None } else { Some(config_from_ffi(&*config)) };

    let loader = move |name: &str| -> *const c_void {
        let Ok(cname) = CString::new(name) else { return std::ptr::null() };
        unsafe { get_proc_address(cname.as_ptr()) }
    };
    let platform_lookup = move |name: &str| -> *const c_void {
        let Ok(cname) = CString::new(name) else { return std::ptr::null() };
        unsafe { get_proc_address(cname.as_ptr()) }
    };

    let ctx = Context::new(loader, platform_lookup, cfg, native_w, native_h);
    context::install(ctx);
    true
}

#[no_mangle]
pub extern "C" fn velocity_destroy_context() {
    context::teardown();
}

#[no_mangle]
pub extern "C" fn velocity_make_current() -> bool {
    context::is_installed()
}

/// Presents the frame. Forwards to the platform's own swap function, which
/// this crate does not specify (spec §1 "external collaborators"); here it
/// is purely an invalidation point since this crate never owns the real
/// swapchain.
#[no_mangle]
pub extern "C" fn velocity_swap_buffers() {
    let _ = context::with_current(|ctx| ctx.state.invalidate_all());
}

#[no_mangle]
pub extern "C" fn velocity_begin_frame() -> bool {
    context::with_current(|ctx| ctx.begin_frame()).map(|r| r.is_ok()).unwrap_or(false)
}

#[no_mangle]
pub extern "C" fn velocity_end_frame(frame_time_ms: f32) -> bool {
    context::with_current(|ctx| ctx.end_frame(frame_time_ms)).map(|r| r.is_ok()).unwrap_or(false)
}

/// # Safety
/// `config` must be a valid pointer to an initialised `FfiConfig`.
#[no_mangle]
pub unsafe extern "C" fn velocity_update_config(config: *const FfiConfig) -> bool {
    if config.is_null() {
        return false;
    }
    let cfg = config_from_ffi(&*config);
    context::with_current(|ctx| ctx.config = cfg).is_ok()
}

/// # Safety
/// `out` must point to valid, writable memory for one `FfiConfig`.
#[no_mangle]
pub unsafe extern "C" fn velocity_get_config(out: *mut FfiConfig) -> bool {
    if out.is_null() {
        return false;
    }
    context::with_current(|ctx| config_to_ffi(&ctx.config, &mut *out)).is_ok()
}

/// # Safety
/// `out` must point to valid, writable memory for one `FfiStats`.
#[no_mangle]
pub unsafe extern "C" fn velocity_get_stats(out: *mut FfiStats) -> bool {
    if out.is_null() {
        return false;
    }
    context::with_current(|ctx| {
        let s = ctx.stats();
        *out = FfiStats {
            state_changes_avoided: s.state.avoided,
            state_changes_forwarded: s.state.changed,
            buffer_pool_alloc_failures: s.buffer_pool.alloc_failures,
            streaming_ring_fence_timeouts: s.streaming_ring.fence_timeouts,
            shader_cache_hits: s.shader_cache.hits,
            shader_cache_misses: s.shader_cache.misses,
            draw_calls_submitted: s.batcher.draw_calls_submitted,
            draw_calls_executed: s.batcher.draw_calls_executed,
            draw_calls_saved: s.batcher.draw_calls_saved,
            batches_created: s.batcher.batches_created,
            scale_changes: s.scaler.scale_changes,
        };
    })
    .is_ok()
}

#[no_mangle]
pub extern "C" fn velocity_reset_stats() {
    let _ = context::with_current(|ctx| ctx.reset_stats());
}

/// # Safety
/// `out` must point to valid, writable memory for one `FfiGpuCaps`.
#[no_mangle]
pub unsafe extern "C" fn velocity_get_gpu_caps(out: *mut FfiGpuCaps) -> bool {
    if out.is_null() {
        return false;
    }
    context::with_current(|ctx| {
        let caps = ctx.gpu_caps();
        *out = FfiGpuCaps {
            vendor: vendor_to_i32(caps.identity.vendor),
            performance_tier: caps.identity.performance_tier,
            anisotropic_max: caps.identity.anisotropic_max,
            features: caps.identity.features.bits(),
            masquerade_major: caps.masqueraded_version.0,
            masquerade_minor: caps.masqueraded_version.1,
        };
    })
    .is_ok()
}

#[no_mangle]
pub extern "C" fn velocity_get_resolution_scale() -> f32 {
    context::with_current(|ctx| ctx.scaler.current_scale()).unwrap_or(1.0)
}

/// Forces a resolution scale, bypassing the adaptive loop until the next
/// `record_frame_time` sample moves it again (spec §6 "Queries").
#[no_mangle]
pub extern "C" fn velocity_set_resolution_scale(scale: f32) -> bool {
    context::with_current(|ctx| ctx.scaler.force_scale(&ctx.gl, scale)).is_ok()
}

#[no_mangle]
pub extern "C" fn velocity_set_dynamic_resolution(enabled: bool) {
    let _ = context::with_current(|ctx| ctx.config.dynamic_resolution_enabled = enabled);
}

#[no_mangle]
pub extern "C" fn velocity_trim_memory(level: u32) {
    let _ = context::with_current(|ctx| ctx.trim_memory(level));
}

#[no_mangle]
pub extern "C" fn velocity_get_memory_usage() -> u64 {
    context::with_current(|ctx| ctx.shader_cache.size_bytes()).unwrap_or(0)
}

/// No-op placeholder: preloading needs a source list this crate does not
/// own (the host would call `shader_cache::store` per precompiled program
/// instead). Returns whether a context is currently installed.
#[no_mangle]
pub extern "C" fn velocity_preload_shaders() -> bool {
    context::is_installed()
}

#[no_mangle]
pub extern "C" fn velocity_clear_shader_cache() {
    let _ = context::with_current(|ctx| ctx.shader_cache.clear());
}

#[no_mangle]
pub extern "C" fn velocity_get_shader_cache_size() -> u64 {
    context::with_current(|ctx| ctx.shader_cache.size_bytes()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn velocity_flush_shader_cache() {
    let _ = context::with_current(|ctx| ctx.flush_shader_cache());
}

/// Resolves `name` through this crate's dispatch table, falling through to
/// the platform for anything unintercepted (spec §6 "Entry-point lookup").
///
/// # Safety
/// `name` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn velocity_get_proc_address(name: *const c_char) -> *const c_void {
    if name.is_null() {
        return std::ptr::null();
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else { return std::ptr::null() };
    context::with_current(|ctx| ctx.dispatch.resolve(name)).unwrap_or(std::ptr::null())
}

/// `glXGetProcAddress` compatibility alias (spec §6).
///
/// # Safety
/// Same as `velocity_get_proc_address`.
#[no_mangle]
pub unsafe extern "C" fn glXGetProcAddress(name: *const c_char) -> *const c_void {
    velocity_get_proc_address(name)
}

/// `glXGetProcAddressARB` compatibility alias (spec §6).
///
/// # Safety
/// Same as `velocity_get_proc_address`.
#[no_mangle]
pub unsafe extern "C" fn glXGetProcAddressARB(name: *const c_char) -> *const c_void {
    velocity_get_proc_address(name)
}

// --- Wrapped desktop-GL entry points -------------------------------------
//
// A curated subset (spec §6 "Entry-point surface": "a representative
// fixed list, not the full desktop-GL surface"), each routed through the
// live context so the state tracker / batcher / masquerade logic sees every
// call the host makes. Anything not listed here resolves straight through
// to the real driver via `velocity_get_proc_address`'s platform fallback.

/// Assembles the key the batcher coalesces on from the state tracker's
/// current program/VAO/texture bindings (spec §2 "Draw calls branch into the
/// batcher"; §3 "Batch command").
fn batch_key(ctx: &Context, primitive_mode: gl::GLenum) -> BatchKey {
    BatchKey {
        program: ctx.state.current_program(),
        vertex_array: ctx.state.current_vertex_array(),
        texture0: ctx.state.bound_texture_2d(0),
        texture1: ctx.state.bound_texture_2d(1),
        primitive_mode,
        state_hash: ctx.state.state_hash(),
    }
}

fn gl_error_to_code(err: VelocityError) -> gl::GLenum {
    match err {
        VelocityError::DeviceError(code) => code,
        _ => gl::INVALID_OPERATION,
    }
}

#[no_mangle]
pub extern "C" fn veGLEnable(cap: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_enable(&ctx.gl, cap, true));
}

#[no_mangle]
pub extern "C" fn veGLDisable(cap: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_enable(&ctx.gl, cap, false));
}

#[no_mangle]
pub extern "C" fn veGLBlendFuncSeparate(src_rgb: gl::GLenum, dst_rgb: gl::GLenum, src_a: gl::GLenum, dst_a: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_blend_func_separate(&ctx.gl, src_rgb, dst_rgb, src_a, dst_a));
}

#[no_mangle]
pub extern "C" fn veGLBlendEquationSeparate(mode_rgb: gl::GLenum, mode_a: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_blend_equation_separate(&ctx.gl, mode_rgb, mode_a));
}

#[no_mangle]
pub extern "C" fn veGLDepthFunc(func: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_depth_func(&ctx.gl, func));
}

#[no_mangle]
pub extern "C" fn veGLDepthMask(flag: gl::GLboolean) {
    let _ = context::with_current(|ctx| ctx.state.set_depth_mask(&ctx.gl, flag != 0));
}

#[no_mangle]
pub extern "C" fn veGLCullFace(mode: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_cull_face(&ctx.gl, mode));
}

#[no_mangle]
pub extern "C" fn veGLFrontFace(mode: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_front_face(&ctx.gl, mode));
}

#[no_mangle]
pub extern "C" fn veGLScissor(x: gl::GLint, y: gl::GLint, width: gl::GLsizei, height: gl::GLsizei) {
    let _ = context::with_current(|ctx| ctx.state.set_scissor(&ctx.gl, crate::state::ScissorRect { x, y, w: width, h: height }));
}

#[no_mangle]
pub extern "C" fn veGLViewport(x: gl::GLint, y: gl::GLint, width: gl::GLsizei, height: gl::GLsizei) {
    let _ = context::with_current(|ctx| ctx.state.set_viewport(&ctx.gl, crate::state::Viewport { x, y, w: width, h: height }));
}

#[no_mangle]
pub extern "C" fn veGLStencilFuncSeparate(face: gl::GLenum, func: gl::GLenum, ref_: gl::GLint, mask: gl::GLuint) {
    let _ = context::with_current(|ctx| ctx.state.set_stencil_func_separate(&ctx.gl, face, func, ref_, mask));
}

#[no_mangle]
pub extern "C" fn veGLStencilOpSeparate(face: gl::GLenum, fail: gl::GLenum, zfail: gl::GLenum, zpass: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_stencil_op_separate(&ctx.gl, face, fail, zfail, zpass));
}

#[no_mangle]
pub extern "C" fn veGLActiveTexture(unit: gl::GLenum) {
    let _ = context::with_current(|ctx| ctx.state.set_active_texture(&ctx.gl, unit - gl::TEXTURE0));
}

#[no_mangle]
pub extern "C" fn veGLBindTexture(target: gl::GLenum, texture: gl::GLuint) {
    let _ = context::with_current(|ctx| {
        let unit = ctx.state.active_texture_unit();
        ctx.state.set_bind_texture(&ctx.gl, unit, target, texture)
    });
}

#[no_mangle]
pub extern "C" fn veGLBindBuffer(target: gl::GLenum, buffer: gl::GLuint) {
    let _ = context::with_current(|ctx| ctx.state.set_bind_buffer(&ctx.gl, target, buffer));
}

/// # Safety
/// `data` must be valid for `size` bytes, or null if `size` is 0.
#[no_mangle]
pub unsafe extern "C" fn veGLBufferData(target: gl::GLenum, size: isize, data: *const c_void, usage: gl::GLenum) {
    let slice = if data.is_null() || size <= 0 {
        None
    } else {
        Some(unsafe { std::slice::from_raw_parts(data as *const u8, size as usize) })
    };
    let _ = context::with_current(|ctx| ctx.buffer_data_via_pool(target, size.max(0) as usize, slice, usage));
}

/// # Safety
/// `data` must be valid for `size` bytes.
#[no_mangle]
pub unsafe extern "C" fn veGLBufferSubData(target: gl::GLenum, offset: isize, size: isize, data: *const c_void) {
    if data.is_null() || size <= 0 {
        return;
    }
    let slice = unsafe { std::slice::from_raw_parts(data as *const u8, size as usize) };
    let _ = context::with_current(|ctx| ctx.buffer_sub_data_via_pool(target, offset.max(0) as usize, slice));
}

#[no_mangle]
pub extern "C" fn veGLUseProgram(program: gl::GLuint) {
    let _ = context::with_current(|ctx| ctx.state.set_use_program(&ctx.gl, program));
}

#[no_mangle]
pub extern "C" fn veGLBindVertexArray(array: gl::GLuint) {
    let _ = context::with_current(|ctx| ctx.state.set_vertex_array(&ctx.gl, array));
}

#[no_mangle]
pub extern "C" fn veGLDrawArrays(mode: gl::GLenum, first: gl::GLint, count: gl::GLsizei) {
    let _ = context::with_current(|ctx| {
        let key = batch_key(ctx, mode);
        let cmd = DrawCommand { kind: BatchKind::Arrays, key, first, count, index_type: 0, index_offset: 0, instance_count: 1 };
        ctx.batcher.submit(&ctx.gl, cmd);
    });
}

/// # Safety
/// `indices` must be a valid offset/pointer per the currently bound
/// `ELEMENT_ARRAY_BUFFER`, as with the real `glDrawElements`.
#[no_mangle]
pub unsafe extern "C" fn veGLDrawElements(mode: gl::GLenum, count: gl::GLsizei, kind: gl::GLenum, indices: *const c_void) {
    let _ = context::with_current(|ctx| {
        let key = batch_key(ctx, mode);
        let cmd = DrawCommand {
            kind: BatchKind::Elements,
            key,
            first: 0,
            count,
            index_type: kind,
            index_offset: indices as usize,
            instance_count: 1,
        };
        ctx.batcher.submit(&ctx.gl, cmd);
    });
}

#[no_mangle]
pub extern "C" fn veGLBindFramebuffer(target: gl::GLenum, framebuffer: gl::GLuint) {
    let _ = context::with_current(|ctx| unsafe { ctx.gl.BindFramebuffer(target, framebuffer) });
}

#[no_mangle]
pub extern "C" fn veGLClear(mask: gl::GLbitfield) {
    let _ = context::with_current(|ctx| unsafe { ctx.gl.Clear(mask) });
}

#[no_mangle]
pub extern "C" fn veGLClearColor(r: f32, g: f32, b: f32, a: f32) {
    let _ = context::with_current(|ctx| unsafe { ctx.gl.ClearColor(r, g, b, a) });
}

#[no_mangle]
pub extern "C" fn veGLGetError() -> gl::GLenum {
    context::with_current(|ctx| match ctx.state.get_error(&ctx.gl) {
        Ok(()) => gl::NO_ERROR,
        Err(e) => gl_error_to_code(e),
    })
    .unwrap_or(gl::INVALID_OPERATION)
}

/// Intercepts `GL_VERSION`/`GL_RENDERER` to return the masqueraded desktop
/// strings (spec §6 "Version masquerade"); everything else forwards to the
/// real driver unchanged.
#[no_mangle]
pub extern "C" fn veGLGetString(name: gl::GLenum) -> *const c_char {
    static VERSION_CACHE: Mutex<Option<CString>> = Mutex::new(None);
    static RENDERER_CACHE: Mutex<Option<CString>> = Mutex::new(None);

    let masqueraded = context::with_current(|ctx| {
        let caps = ctx.gpu_caps();
        if name == gl::VERSION {
            Some(format!("{}.{} VelocityGL", caps.masqueraded_version.0, caps.masqueraded_version.1))
        } else if name == gl::RENDERER {
            Some(caps.masqueraded_renderer)
        } else {
            None
        }
    })
    .ok()
    .flatten();

    if let Some(s) = masqueraded {
        let cache = if name == gl::VERSION { &VERSION_CACHE } else { &RENDERER_CACHE };
        let Ok(cstring) = CString::new(s) else { return std::ptr::null() };
        let mut guard = cache.lock().unwrap();
        let ptr = cstring.as_ptr();
        *guard = Some(cstring);
        return ptr;
    }

    context::with_current(|ctx| unsafe { ctx.gl.GetString(name) as *const c_char }).unwrap_or(std::ptr::null())
}

/// # Safety
/// `params` must point to writable memory sized for `pname`'s return arity,
/// as with the real `glGetIntegerv`.
#[no_mangle]
pub unsafe extern "C" fn veGLGetIntegerv(pname: gl::GLenum, params: *mut gl::GLint) {
    if params.is_null() {
        return;
    }
    let handled = context::with_current(|ctx| {
        let caps = ctx.gpu_caps();
        if pname == gl::MAJOR_VERSION {
            unsafe { *params = caps.masqueraded_version.0 as gl::GLint };
            true
        } else if pname == gl::MINOR_VERSION {
            unsafe { *params = caps.masqueraded_version.1 as gl::GLint };
            true
        } else {
            false
        }
    })
    .unwrap_or(false);

    if !handled {
        let _ = context::with_current(|ctx| unsafe { ctx.gl.GetIntegerv(pname, params) });
    }
}
