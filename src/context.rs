//! The explicit context object every subsystem hangs off (spec §9 Design
//! Notes: "explicit context object, not module globals"), plus the single
//! current-context slot the nullary `extern "C"` surface in `ffi` needs
//! (spec §5's "init mutex... guard for a single 'current context' slot").

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::OnceCell;

use crate::batcher::Batcher;
use crate::buffer_pool::{Allocation, BufferPoolManager, PoolId};
use crate::config::Config;
use crate::dispatch::DispatchTable;
use crate::driver::Gl;
use crate::error::{Result, VelocityError};
use crate::gl;
use crate::identity::{self, DeviceIdentity, DeviceQuery};
use crate::scaler::ResolutionScaler;
use crate::shader_cache::ShaderCache;
use crate::state::StateTracker;
use crate::stats::Stats;
use crate::streaming_ring::StreamingRing;
use crate::version::{self, EsCapability};

/// GPU capability summary handed back by `get_gpu_caps` (spec §6 "Queries").
#[derive(Clone, Debug)]
pub struct GpuCaps {
    pub identity: DeviceIdentity,
    pub masqueraded_version: (u32, u32),
    pub masqueraded_renderer: String,
}

/// Everything a frame touches, owned by one struct and threaded explicitly
/// rather than reached through module globals.
pub struct Context {
    pub gl: Gl,
    pub config: Config,
    pub identity: DeviceIdentity,
    pub state: StateTracker,
    pub buffer_pools: BufferPoolManager,
    pub streaming_ring: Option<StreamingRing>,
    pub shader_cache: ShaderCache,
    pub batcher: Batcher,
    pub scaler: ResolutionScaler,
    pub dispatch: DispatchTable,
    native_w: u32,
    native_h: u32,
    shader_cache_path: Option<std::path::PathBuf>,
    /// One static pool per buffer target, created lazily the first time a
    /// host `glBufferData` call needs one (spec §2 "buffer/texture creation
    /// routes through pools").
    buffer_pool_targets: HashMap<gl::GLenum, PoolId>,
    /// The allocation currently backing each target's pool-routed buffer, so
    /// a later `glBufferSubData` on the same target updates the right
    /// allocation instead of the host's original (now-replaced) buffer.
    active_pool_allocations: HashMap<gl::GLenum, Allocation>,
}

impl Context {
    /// Constructs every subsystem in the DAG order spec.md's Design Notes
    /// require: identity DB -> config -> each subsystem (no back-pointers).
    /// `config: None` defers to `identity::recommended_config` once the GPU
    /// identity is known (spec §4.A Outputs: "tier drives default
    /// maxBatchSize, texturePoolSize, resolution scale band, instancing,
    /// target FPS") — identity classification requires a live context, so
    /// this can't happen before `gl` is loaded.
    pub fn new(
        loader: impl FnMut(&str) -> *const std::ffi::c_void,
        platform_lookup: impl Fn(&str) -> *const std::ffi::c_void + Send + 'static,
        config: Option<Config>,
        native_w: u32,
        native_h: u32,
    ) -> Context {
        let gl = Gl::load(loader);

        let vendor_string = unsafe { crate::driver::cstr_from_gl(gl.GetString(crate::gl::VENDOR)) };
        let renderer_string = unsafe { crate::driver::cstr_from_gl(gl.GetString(crate::gl::RENDERER)) };
        let version_string = unsafe { crate::driver::cstr_from_gl(gl.GetString(crate::gl::VERSION)) };
        let extensions = crate::driver::query_extensions(&gl);
        let mut max_anisotropy = 1.0f32;
        unsafe { gl.GetFloatv(crate::gl::MAX_TEXTURE_MAX_ANISOTROPY, &mut max_anisotropy) };

        let identity = identity::classify(&DeviceQuery {
            vendor_string: &vendor_string,
            renderer_string: &renderer_string,
            version_string: &version_string,
            extensions: &extensions,
            max_anisotropy,
        });

        let config = config.unwrap_or_else(|| identity::recommended_config(&identity));

        let shader_cache = ShaderCache::new(
            config.shader_cache_max_bytes,
            4096,
            identity.vendor_hash,
            identity.driver_version_hash,
        );
        let shader_cache_path = config.shader_cache_path.as_ref().map(|p| {
            let mut p = std::path::PathBuf::from(p);
            p.push("shader_cache.bin");
            p
        });
        if let (Some(path), crate::config::ShaderCacheMode::Disk | crate::config::ShaderCacheMode::Aggressive) =
            (&shader_cache_path, config.shader_cache_mode)
        {
            shader_cache.load_from_disk(path);
        }

        let mut dispatch = DispatchTable::new(platform_lookup);
        register_entry_points(&mut dispatch);
        let supports_multi_draw = dispatch.resolve("glMultiDrawArraysEXT") as usize != 0;
        let batcher = Batcher::new(config.max_batch_size, config.draw_batching_enabled, supports_multi_draw);

        let scaler = ResolutionScaler::new(
            config.dynamic_resolution_enabled,
            false,
            config.min_scale,
            config.max_scale,
            config.target_fps,
            native_w,
            native_h,
        );

        Context {
            gl,
            config,
            identity,
            state: StateTracker::new(32),
            buffer_pools: BufferPoolManager::new(),
            streaming_ring: None,
            shader_cache,
            batcher,
            scaler,
            dispatch,
            native_w,
            native_h,
            shader_cache_path,
            buffer_pool_targets: HashMap::new(),
            active_pool_allocations: HashMap::new(),
        }
    }

    /// Lazily creates the streaming ring sized from the buffer-pool MB
    /// config once the render target/backing buffer details are known to
    /// the caller (spec §4.C "Streaming ring").
    pub fn ensure_streaming_ring(&mut self, target: crate::gl::GLenum, region_size: usize) {
        if self.streaming_ring.is_none() {
            self.streaming_ring = Some(StreamingRing::new(&self.gl, target, region_size, self.config.persistent_mapping_enabled));
        }
    }

    /// Lazily creates (and caches) a static pool for `target`, sized from
    /// `config.buffer_pool_mb` (spec §4.C; wired from the live `glBufferData`
    /// surface rather than only from tests, per spec §2 "buffer/texture
    /// creation routes through pools").
    fn ensure_buffer_pool(&mut self, target: gl::GLenum) -> Option<PoolId> {
        if let Some(&id) = self.buffer_pool_targets.get(&target) {
            return Some(id);
        }
        let size = (self.config.buffer_pool_mb as usize) * 1024 * 1024;
        let id = self.buffer_pools.create(&self.gl, &self.identity, target, self.config.persistent_mapping_enabled, size)?;
        self.buffer_pool_targets.insert(target, id);
        Some(id)
    }

    /// Routes a `glBufferData`-shaped upload through the pool allocator:
    /// replaces any previous allocation on `target`, uploads the payload,
    /// and binds the pool's buffer object in place of whatever the host had
    /// bound (spec §2, §4.C). Falls back to forwarding straight to the
    /// driver on the host's own buffer if no pool could be created or the
    /// allocation doesn't fit (spec §4.C "Failure").
    pub fn buffer_data_via_pool(&mut self, target: gl::GLenum, size: usize, data: Option<&[u8]>, usage: gl::GLenum) {
        let Some(pool) = self.ensure_buffer_pool(target) else {
            log::warn!("buffer pool unavailable for target 0x{target:04X}, falling back to direct upload");
            self.forward_buffer_data(target, size, data, usage);
            return;
        };
        if let Some(old) = self.active_pool_allocations.remove(&target) {
            self.buffer_pools.free(old);
        }
        let Some(alloc) = self.buffer_pools.alloc(pool, size.max(1)) else {
            log::warn!("buffer pool exhausted for target 0x{target:04X}, falling back to direct upload");
            self.forward_buffer_data(target, size, data, usage);
            return;
        };
        if let Some(data) = data {
            self.buffer_pools.upload(&self.gl, &alloc, 0, data);
        }
        let buffer_id = self.buffer_pools.buffer_id(pool).unwrap_or(0);
        self.state.set_bind_buffer(&self.gl, target, buffer_id);
        self.active_pool_allocations.insert(target, alloc);
    }

    /// Routes a `glBufferSubData`-shaped update through the pool allocator
    /// when `target` is currently backed by a pool allocation; otherwise
    /// forwards straight to whatever buffer the host has bound.
    pub fn buffer_sub_data_via_pool(&mut self, target: gl::GLenum, offset: usize, data: &[u8]) {
        if let Some(alloc) = self.active_pool_allocations.get(&target).copied() {
            self.buffer_pools.upload(&self.gl, &alloc, offset, data);
        } else {
            unsafe { self.gl.BufferSubData(target, offset as gl::GLintptr, data.len() as gl::GLsizeiptr, data.as_ptr() as *const gl::GLvoid) };
        }
    }

    fn forward_buffer_data(&self, target: gl::GLenum, size: usize, data: Option<&[u8]>, usage: gl::GLenum) {
        let ptr = data.map_or(std::ptr::null(), |d| d.as_ptr() as *const gl::GLvoid);
        unsafe { self.gl.BufferData(target, size as gl::GLsizeiptr, ptr, usage) };
    }

    pub fn gpu_caps(&self) -> GpuCaps {
        // ES capability is conservatively read off the feature bitset and
        // model heuristics already computed by `identity`; a real driver
        // query of `GL_MAJOR_VERSION`/`GL_MINOR_VERSION` would replace this
        // in a build wired to a live ES context.
        let es = if self.identity.features.contains(identity::FeatureFlags::COMPUTE) {
            EsCapability { major: 3, minor: 1 }
        } else {
            EsCapability { major: 3, minor: 0 }
        };
        GpuCaps {
            identity: self.identity.clone(),
            masqueraded_version: version::masquerade_version(es),
            masqueraded_renderer: version::masquerade_renderer_string(&format!("{:?}", self.identity.vendor)),
        }
    }

    /// `begin_frame` (spec §2 "Frame lifecycle"): arms the streaming ring's
    /// fence wait, the batcher's queue, and the scaler's off-screen target.
    pub fn begin_frame(&mut self) -> Result<(u32, u32)> {
        if let Some(ring) = self.streaming_ring.as_mut() {
            ring.begin_frame(&self.gl);
        }
        self.batcher.begin_frame();
        let dims = self.scaler.begin_frame(&self.gl);
        // The scaler just rebound DRAW_FRAMEBUFFER and set the viewport
        // directly through `gl`, bypassing the tracker; invalidation is
        // mandatory here so the mirror doesn't go stale (spec §4.B, §9).
        self.state.invalidate_all();
        Ok(dims)
    }

    /// `end_frame`: flushes the batcher, composites through the scaler,
    /// inserts the streaming ring's fence, and invalidates the state mirror
    /// (mandatory per spec §4.B after anything that "may have touched
    /// state").
    pub fn end_frame(&mut self, frame_time_ms: f32) -> Result<()> {
        self.batcher.end_frame(&self.gl);
        self.scaler.end_frame(&self.gl);
        self.scaler.record_frame_time(&self.gl, frame_time_ms);
        if let Some(ring) = self.streaming_ring.as_mut() {
            ring.end_frame(&self.gl);
        }
        self.state.invalidate_all();
        self.state.get_error(&self.gl)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            state: self.state.stats(),
            buffer_pool: self.buffer_pools.stats(),
            streaming_ring: self.streaming_ring.as_ref().map(|r| r.stats()).unwrap_or_default(),
            shader_cache: self.shader_cache.stats(),
            batcher: self.batcher.stats(),
            scaler: self.scaler.stats(),
        }
    }

    /// Clears every subsystem's counters (spec §6/§8: `reset_stats` clears
    /// the whole stats interface, not just the state tracker).
    pub fn reset_stats(&mut self) {
        self.state.reset_stats();
        self.buffer_pools.reset_stats();
        if let Some(ring) = self.streaming_ring.as_mut() {
            ring.reset_stats();
        }
        self.shader_cache.reset_stats();
        self.batcher.reset_stats();
        self.scaler.reset_stats();
    }

    /// Trim levels per spec §6 "Trim levels": 0 trims buffer pools, 1 adds
    /// texture cap halving, 2 adds shader cache clear, >=3 adds a general
    /// memory trim. Texture-cache halving and the general trim have no
    /// owning subsystem in this crate yet, so they are logged as no-ops
    /// rather than silently ignored.
    pub fn trim_memory(&mut self, level: u32) {
        if level >= 2 {
            self.shader_cache.clear();
        }
        if level == 1 {
            log::info!("trim_memory(1): texture memory cap halving requested, no texture cache owner yet");
        }
        if level >= 3 {
            log::info!("trim_memory(>=3): general memory trim requested, no additional owner to trim");
        }
    }

    pub fn flush_shader_cache(&self) {
        if let Some(path) = &self.shader_cache_path {
            self.shader_cache.flush_to_disk(path);
        }
    }
}

/// Registers this crate's own wrapped entry points under their canonical
/// desktop-GL names (spec §4.G "resolve(name)": "this table is populated
/// once, at context creation, with every entry point the library itself
/// intercepts").
fn register_entry_points(dispatch: &mut DispatchTable) {
    macro_rules! reg {
        ($name:literal, $func:path) => {
            dispatch.register($name, $func as *const std::ffi::c_void);
        };
    }
    reg!("glEnable", crate::ffi::veGLEnable);
    reg!("glDisable", crate::ffi::veGLDisable);
    reg!("glBlendFuncSeparate", crate::ffi::veGLBlendFuncSeparate);
    reg!("glBlendEquationSeparate", crate::ffi::veGLBlendEquationSeparate);
    reg!("glDepthFunc", crate::ffi::veGLDepthFunc);
    reg!("glDepthMask", crate::ffi::veGLDepthMask);
    reg!("glCullFace", crate::ffi::veGLCullFace);
    reg!("glFrontFace", crate::ffi::veGLFrontFace);
    reg!("glScissor", crate::ffi::veGLScissor);
    reg!("glViewport", crate::ffi::veGLViewport);
    reg!("glStencilFuncSeparate", crate::ffi::veGLStencilFuncSeparate);
    reg!("glStencilOpSeparate", crate::ffi::veGLStencilOpSeparate);
    reg!("glActiveTexture", crate::ffi::veGLActiveTexture);
    reg!("glBindTexture", crate::ffi::veGLBindTexture);
    reg!("glBindBuffer", crate::ffi::veGLBindBuffer);
    reg!("glBufferData", crate::ffi::veGLBufferData);
    reg!("glBufferSubData", crate::ffi::veGLBufferSubData);
    reg!("glUseProgram", crate::ffi::veGLUseProgram);
    reg!("glBindVertexArray", crate::ffi::veGLBindVertexArray);
    reg!("glDrawArrays", crate::ffi::veGLDrawArrays);
    reg!("glDrawElements", crate::ffi::veGLDrawElements);
    reg!("glBindFramebuffer", crate::ffi::veGLBindFramebuffer);
    reg!("glClear", crate::ffi::veGLClear);
    reg!("glClearColor", crate::ffi::veGLClearColor);
    reg!("glGetError", crate::ffi::veGLGetError);
    reg!("glGetString", crate::ffi::veGLGetString);
    reg!("glGetIntegerv", crate::ffi::veGLGetIntegerv);
}

unsafe impl Send for Context {}

/// The one current-context slot the C ABI's nullary functions lock (spec §5).
static CURRENT: OnceCell<Mutex<Option<Context>>> = OnceCell::new();

fn slot() -> &'static Mutex<Option<Context>> {
    CURRENT.get_or_init(|| Mutex::new(None))
}

pub fn install(ctx: Context) {
    *slot().lock().unwrap() = Some(ctx);
}

pub fn teardown() {
    *slot().lock().unwrap() = None;
}

pub fn with_current<R>(f: impl FnOnce(&mut Context) -> R) -> Result<R> {
    let mut guard = slot().lock().unwrap();
    match guard.as_mut() {
        Some(ctx) => Ok(f(ctx)),
        None => Err(VelocityError::NotInitialized),
    }
}

pub fn is_installed() -> bool {
    slot().lock().unwrap().is_some()
}
