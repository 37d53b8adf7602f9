//! Streaming ring buffer (spec §4.C, component C, part 2 of 2).
//!
//! One backing buffer split into three equal regions indexed by a rolling
//! frame counter. Fence handling is grounded on `render-gl/src/sync.rs`'s
//! `GpuSyncObject`: a `FenceSync` inserted at `end_frame`, waited on with a
//! bounded timeout the next time that region comes back around at
//! `begin_frame`.

use std::time::Duration;

use crate::driver::Gl;
use crate::gl;

const REGION_COUNT: usize = 3;
const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(1);

struct Region {
    fence: Option<gl::GLsync>,
    offset: usize,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct StreamingRingStats {
    pub fence_timeouts: u64,
    pub overflow_warnings: u64,
}

/// Owns the ring's backing buffer, its three regions, and the rolling frame
/// counter (spec §3 "Streaming-ring region: logically 'owned' by the GPU
/// between end-frame and the next time its fence signals").
pub struct StreamingRing {
    buffer: gl::GLuint,
    target: gl::GLenum,
    region_size: usize,
    mapped_base: Option<*mut u8>,
    regions: [Region; REGION_COUNT],
    current: usize,
    fence_timeout: Duration,
    stats: StreamingRingStats,
}

unsafe impl Send for StreamingRing {}

impl StreamingRing {
    /// Creates a ring with `region_size` bytes per region (`3 * region_size`
    /// total). Persistent-coherent mapping is attempted first; falls back to
    /// an unmapped `dynamic-draw` buffer written through `BufferSubData`.
    pub fn new(gl: &Gl, target: gl::GLenum, region_size: usize, try_persistent: bool) -> StreamingRing {
        let total = region_size * REGION_COUNT;
        let mut obj: gl::GLuint = 0;
        let mut mapped_base = None;
        unsafe {
            gl.GenBuffers(1, &mut obj);
            gl.BindBuffer(target, obj);
            if try_persistent {
                let flags = gl::DYNAMIC_STORAGE_BIT | gl::MAP_WRITE_BIT | gl::MAP_PERSISTENT_BIT | gl::MAP_COHERENT_BIT;
                gl.BufferStorageEXT(target, total as gl::GLsizeiptr, std::ptr::null(), flags);
                let ptr = gl.MapBufferRange(
                    target,
                    0,
                    total as gl::GLsizeiptr,
                    gl::MAP_WRITE_BIT | gl::MAP_PERSISTENT_BIT | gl::MAP_COHERENT_BIT,
                );
                if !ptr.is_null() {
                    mapped_base = Some(ptr as *mut u8);
                }
            }
            if mapped_base.is_none() {
                gl.BufferData(target, total as gl::GLsizeiptr, std::ptr::null(), gl::DYNAMIC_DRAW);
            }
        }

        StreamingRing {
            buffer: obj,
            target,
            region_size,
            mapped_base,
            regions: [
                Region { fence: None, offset: 0 },
                Region { fence: None, offset: region_size },
                Region { fence: None, offset: region_size * 2 },
            ],
            current: 0,
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
            stats: StreamingRingStats::default(),
        }
    }

    pub fn stats(&self) -> StreamingRingStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = StreamingRingStats::default();
    }

    pub fn destroy(&mut self, gl: &Gl) {
        for r in &mut self.regions {
            if let Some(sync) = r.fence.take() {
                unsafe { gl.DeleteSync(sync) };
            }
        }
        unsafe { gl.DeleteBuffers(1, &self.buffer) };
    }

    /// Advances the frame counter modulo 3 and waits on that region's fence
    /// with a bounded timeout; on timeout, logs and proceeds anyway (spec
    /// §4.C "begin_frame").
    pub fn begin_frame(&mut self, gl: &Gl) {
        self.current = (self.current + 1) % REGION_COUNT;
        let region = &mut self.regions[self.current];

        if let Some(sync) = region.fence.take() {
            let timeout_ns = self.fence_timeout.as_nanos().min(u64::MAX as u128) as u64;
            let result = unsafe { gl.ClientWaitSync(sync, gl::SYNC_FLUSH_COMMANDS_BIT, timeout_ns) };
            unsafe { gl.DeleteSync(sync) };
            if result != gl::CONDITION_SATISFIED && result != gl::ALREADY_SIGNALED {
                self.stats.fence_timeouts += 1;
                log::warn!(
                    "streaming ring region {} fence wait exceeded {:?}, proceeding anyway",
                    self.current,
                    self.fence_timeout
                );
            }
        }
        // Reset the intra-frame offset to the region start.
        self.regions[self.current].offset = self.current * self.region_size;
    }

    /// Appends `data` within the current region, aligned up to 256 bytes.
    /// Overflow returns `None` and logs (spec §4.C "stream_alloc").
    pub fn stream_alloc(&mut self, gl: &Gl, data: &[u8]) -> Option<usize> {
        let aligned_len = (data.len() + 255) & !255;
        let region = &mut self.regions[self.current];
        let region_start = self.current * self.region_size;
        let used = region.offset - region_start;
        if used + aligned_len > self.region_size {
            self.stats.overflow_warnings += 1;
            log::warn!(
                "streaming ring region {} overflow: {} + {} > {}",
                self.current,
                used,
                aligned_len,
                self.region_size
            );
            return None;
        }

        let write_at = region.offset;
        if let Some(base) = self.mapped_base {
            unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(write_at), data.len()) };
        } else {
            unsafe {
                gl.BindBuffer(self.target, self.buffer);
                gl.BufferSubData(
                    self.target,
                    write_at as gl::GLintptr,
                    data.len() as gl::GLsizeiptr,
                    data.as_ptr() as *const gl::GLvoid,
                );
            }
        }
        region.offset += aligned_len;
        Some(write_at)
    }

    /// Inserts a fence for the region just used (spec §4.C "end_frame").
    pub fn end_frame(&mut self, gl: &Gl) {
        let sync = unsafe { gl.FenceSync(gl::SYNC_GPU_COMMANDS_COMPLETE, 0) };
        self.regions[self.current].fence = Some(sync);
    }

    pub fn current_region(&self) -> usize {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_driver() -> Gl {
        Gl::load(|_name| std::ptr::null())
    }

    fn unmapped_ring(region_size: usize) -> StreamingRing {
        StreamingRing {
            buffer: 0,
            target: gl::ARRAY_BUFFER,
            region_size,
            mapped_base: None,
            regions: [
                Region { fence: None, offset: 0 },
                Region { fence: None, offset: region_size },
                Region { fence: None, offset: region_size * 2 },
            ],
            current: 0,
            fence_timeout: Duration::from_millis(10),
            stats: StreamingRingStats::default(),
        }
    }

    #[test]
    fn region_rotates_modulo_three() {
        let gl = null_driver();
        let mut ring = unmapped_ring(4096);
        assert_eq!(ring.current_region(), 0);
        ring.begin_frame(&gl);
        assert_eq!(ring.current_region(), 1);
        ring.begin_frame(&gl);
        assert_eq!(ring.current_region(), 2);
        ring.begin_frame(&gl);
        assert_eq!(ring.current_region(), 0);
    }

    #[test]
    fn stream_alloc_overflow_returns_none_and_logs() {
        let gl = null_driver();
        let mut ring = unmapped_ring(512);
        assert!(ring.stream_alloc(&gl, &[0u8; 256]).is_some());
        // 256 already consumed (aligned), another 256 pushes past 512.
        assert!(ring.stream_alloc(&gl, &[0u8; 300]).is_none());
        assert_eq!(ring.stats().overflow_warnings, 1);
    }

    #[test]
    fn begin_frame_without_prior_fence_does_not_wait() {
        let gl = null_driver();
        let mut ring = unmapped_ring(4096);
        ring.begin_frame(&gl);
        assert_eq!(ring.stats().fence_timeouts, 0);
    }

    #[test]
    fn stream_alloc_offsets_advance_within_region() {
        let gl = null_driver();
        let mut ring = unmapped_ring(4096);
        let a = ring.stream_alloc(&gl, &[0u8; 10]).unwrap();
        let b = ring.stream_alloc(&gl, &[0u8; 10]).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 256); // 10 bytes aligned up to 256.
    }
}
