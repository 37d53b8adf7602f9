//! Dynamic resolution scaler (spec §4.F, component F).
//!
//! Off-screen RGBA8 + D24S8 render target whose size follows a frame-time
//! feedback loop over a 60-sample circular window. Framebuffer completeness
//! bookkeeping follows the same create/verify/destroy shape the teacher uses
//! for its swapchain-adjacent resources, generalised to the host-driven
//! scale factor this component owns.

use crate::driver::Gl;
use crate::gl;

const WINDOW_SIZE: usize = 60;
const ADJUST_SPEED: f32 = 1.0;
const DELTA_THRESHOLD: f32 = 0.1;
const SCALE_EPSILON: f32 = 0.01;

/// `⌊native · scale⌋` rounded up to the nearest even integer (spec §3
/// "Render target"). Always returns an even value, which is what spec §8
/// invariant 6 ("both are even whenever the scaler is enabled") requires —
/// a simple round-to-nearest only guarantees evenness on exact `.5` ties.
fn round_even(x: f32) -> u32 {
    let floored = x.max(0.0).floor() as u32;
    if floored % 2 == 1 {
        floored + 1
    } else {
        floored
    }
}

fn clamp_dim(v: u32, native: u32) -> u32 {
    v.clamp(64, native.saturating_mul(2).max(64))
}

struct Target {
    fbo: gl::GLuint,
    color_tex: gl::GLuint,
    depth_tex: gl::GLuint,
    render_w: u32,
    render_h: u32,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ScalerStats {
    pub scale_changes: u64,
}

pub struct ResolutionScaler {
    enabled: bool,
    sharpening_enabled: bool,
    scale: f32,
    min_scale: f32,
    max_scale: f32,
    target_frame_time_ms: f32,
    native_w: u32,
    native_h: u32,
    target: Option<Target>,
    frame_times: [f32; WINDOW_SIZE],
    frame_time_count: usize,
    frame_time_cursor: usize,
    bilinear_program: gl::GLuint,
    cas_program: gl::GLuint,
    quad_vao: gl::GLuint,
    quad_vbo: gl::GLuint,
    stats: ScalerStats,
}

impl ResolutionScaler {
    pub fn new(
        enabled: bool,
        sharpening_enabled: bool,
        min_scale: f32,
        max_scale: f32,
        target_fps: f32,
        native_w: u32,
        native_h: u32,
    ) -> ResolutionScaler {
        ResolutionScaler {
            enabled,
            sharpening_enabled,
            scale: max_scale,
            min_scale,
            max_scale,
            target_frame_time_ms: 1000.0 / target_fps,
            native_w,
            native_h,
            target: None,
            frame_times: [0.0; WINDOW_SIZE],
            frame_time_count: 0,
            frame_time_cursor: 0,
            bilinear_program: 0,
            cas_program: 0,
            quad_vao: 0,
            quad_vbo: 0,
            stats: ScalerStats::default(),
        }
    }

    pub fn stats(&self) -> ScalerStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ScalerStats::default();
    }

    pub fn current_scale(&self) -> f32 {
        self.scale
    }

    /// Forces the scale to an explicit value, clamped to `[min_scale,
    /// max_scale]`, bypassing the adaptive loop for this one call (spec §6
    /// "Queries": `set_resolution_scale`). The adaptive loop in
    /// `record_frame_time` remains free to move it again on the next frame.
    pub fn force_scale(&mut self, gl: &Gl, scale: f32) {
        let clamped = scale.clamp(self.min_scale, self.max_scale);
        if (clamped - self.scale).abs() > SCALE_EPSILON {
            self.scale = clamped;
            self.stats.scale_changes += 1;
            if self.enabled {
                self.rebuild_target(gl);
            }
        }
    }

    fn render_dims(&self) -> (u32, u32) {
        (
            clamp_dim(round_even(self.native_w as f32 * self.scale), self.native_w),
            clamp_dim(round_even(self.native_h as f32 * self.scale), self.native_h),
        )
    }

    /// Compiles the two upscale programs and the shared fullscreen-quad
    /// VAO/VBO once (spec §4.F "Shaders" / "Contracts": "created once and
    /// shared by both programs").
    pub fn init_resources(&mut self, gl: &Gl, bilinear_program: gl::GLuint, cas_program: gl::GLuint) {
        self.bilinear_program = bilinear_program;
        self.cas_program = cas_program;

        let mut vao = 0;
        let mut vbo = 0;
        unsafe {
            gl.GenVertexArrays(1, &mut vao);
            gl.GenBuffers(1, &mut vbo);
            gl.BindVertexArray(vao);
            gl.BindBuffer(gl::ARRAY_BUFFER, vbo);
            #[rustfmt::skip]
            let verts: [f32; 12] = [
                -1.0, -1.0,  1.0, -1.0,  -1.0, 1.0,
                -1.0,  1.0,  1.0, -1.0,   1.0, 1.0,
            ];
            gl.BufferData(
                gl::ARRAY_BUFFER,
                std::mem::size_of_val(&verts) as gl::GLsizeiptr,
                verts.as_ptr() as *const gl::GLvoid,
                gl::STATIC_DRAW,
            );
            gl.VertexAttribPointer(0, 2, gl::FLOAT, gl::FALSE, 0, std::ptr::null());
            gl.EnableVertexAttribArray(0);
        }
        self.quad_vao = vao;
        self.quad_vbo = vbo;

        if self.enabled {
            self.rebuild_target(gl);
        }
    }

    fn rebuild_target(&mut self, gl: &Gl) {
        if let Some(old) = self.target.take() {
            unsafe {
                gl.DeleteTextures(1, &old.color_tex);
                gl.DeleteTextures(1, &old.depth_tex);
                gl.DeleteFramebuffers(1, &old.fbo);
            }
        }

        let (render_w, render_h) = self.render_dims();
        let mut color_tex = 0;
        let mut depth_tex = 0;
        let mut fbo = 0;
        unsafe {
            gl.GenTextures(1, &mut color_tex);
            gl.BindTexture(gl::TEXTURE_2D, color_tex);
            gl.TexStorage2D(gl::TEXTURE_2D, 1, gl::RGBA8, render_w as gl::GLsizei, render_h as gl::GLsizei);

            gl.GenTextures(1, &mut depth_tex);
            gl.BindTexture(gl::TEXTURE_2D, depth_tex);
            gl.TexStorage2D(gl::TEXTURE_2D, 1, gl::DEPTH24_STENCIL8, render_w as gl::GLsizei, render_h as gl::GLsizei);

            gl.GenFramebuffers(1, &mut fbo);
            gl.BindFramebuffer(gl::FRAMEBUFFER, fbo);
            gl.FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, color_tex, 0);
            gl.FramebufferTexture2D(gl::FRAMEBUFFER, gl::DEPTH_STENCIL_ATTACHMENT, gl::TEXTURE_2D, depth_tex, 0);

            let status = gl.CheckFramebufferStatus(gl::FRAMEBUFFER);
            if status != gl::FRAMEBUFFER_COMPLETE {
                log::error!("resolution scaler framebuffer incomplete after resize: 0x{status:04X}");
            }
        }

        self.target = Some(Target { fbo, color_tex, depth_tex, render_w, render_h });
    }

    /// Binds the off-screen target and sets the viewport; reports native
    /// dimensions and does not rebind when disabled (spec §4.F "Frame
    /// lifecycle").
    pub fn begin_frame(&mut self, gl: &Gl) -> (u32, u32) {
        if !self.enabled {
            return (self.native_w, self.native_h);
        }
        let Some(target) = &self.target else {
            return (self.native_w, self.native_h);
        };
        unsafe {
            gl.BindFramebuffer(gl::DRAW_FRAMEBUFFER, target.fbo);
            gl.Viewport(0, 0, target.render_w as gl::GLsizei, target.render_h as gl::GLsizei);
        }
        (target.render_w, target.render_h)
    }

    /// Composites the off-screen colour texture onto the default framebuffer
    /// via the upscale program (spec §4.F "Frame lifecycle").
    pub fn end_frame(&mut self, gl: &Gl) {
        if !self.enabled {
            return;
        }
        let Some(target) = &self.target else { return };

        unsafe {
            gl.BindFramebuffer(gl::DRAW_FRAMEBUFFER, 0);
            gl.Viewport(0, 0, self.native_w as gl::GLsizei, self.native_h as gl::GLsizei);
            gl.Disable(gl::DEPTH_TEST);
            gl.Disable(gl::BLEND);

            let program = if self.sharpening_enabled { self.cas_program } else { self.bilinear_program };
            gl.UseProgram(program);
            gl.ActiveTexture(gl::TEXTURE0);
            gl.BindTexture(gl::TEXTURE_2D, target.color_tex);
            gl.BindVertexArray(self.quad_vao);
            gl.DrawArrays(gl::TRIANGLES, 0, 6);

            gl.Enable(gl::DEPTH_TEST);
        }
    }

    /// Appends to the circular frame-time window and runs the adaptive loop
    /// (spec §4.F "Adaptive loop").
    pub fn record_frame_time(&mut self, gl: &Gl, ms: f32) {
        self.frame_times[self.frame_time_cursor] = ms;
        self.frame_time_cursor = (self.frame_time_cursor + 1) % WINDOW_SIZE;
        self.frame_time_count = (self.frame_time_count + 1).min(WINDOW_SIZE);

        if !self.enabled || self.frame_time_count == 0 {
            return;
        }

        let avg = self.frame_times[..self.frame_time_count].iter().sum::<f32>() / self.frame_time_count as f32;
        let delta = (avg - self.target_frame_time_ms) / self.target_frame_time_ms;
        if delta.abs() <= DELTA_THRESHOLD {
            return;
        }

        let proposed = (self.scale - delta * ADJUST_SPEED).clamp(self.min_scale, self.max_scale);
        if (proposed - self.scale).abs() > SCALE_EPSILON {
            self.scale = proposed;
            self.stats.scale_changes += 1;
            self.rebuild_target(gl);
        }
    }

    pub fn destroy(&mut self, gl: &Gl) {
        if let Some(target) = self.target.take() {
            unsafe {
                gl.DeleteTextures(1, &target.color_tex);
                gl.DeleteTextures(1, &target.depth_tex);
                gl.DeleteFramebuffers(1, &target.fbo);
            }
        }
        unsafe {
            gl.DeleteVertexArrays(1, &self.quad_vao);
            gl.DeleteBuffers(1, &self.quad_vbo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn null_driver() -> Gl {
        Gl::load(|_name| std::ptr::null())
    }

    #[test]
    fn round_even_rounds_ties_to_even() {
        assert_eq!(round_even(2.5), 2);
        assert_eq!(round_even(3.5), 4);
        assert_eq!(round_even(4.0), 4);
    }

    #[test]
    fn clamp_dim_respects_bounds() {
        assert_eq!(clamp_dim(10, 1920), 64);
        assert_eq!(clamp_dim(100_000, 1920), 3840);
    }

    #[test]
    fn disabled_scaler_reports_native_dimensions() {
        let gl = null_driver();
        let mut scaler = ResolutionScaler::new(false, false, 0.5, 1.0, 60.0, 1920, 1080);
        let (w, h) = scaler.begin_frame(&gl);
        assert_eq!((w, h), (1920, 1080));
    }

    #[test]
    fn sustained_slow_frames_scale_down_and_count_changes() {
        // Spec §8 boundary scenario 5.
        let gl = null_driver();
        let mut scaler = ResolutionScaler::new(true, false, 0.5, 1.0, 60.0, 1920, 1080);
        scaler.init_resources(&gl, 1, 2);

        let mut last_scale = scaler.current_scale();
        let mut saw_decrease = false;
        for _ in 0..120 {
            scaler.record_frame_time(&gl, 25.0);
            let s = scaler.current_scale();
            if s < last_scale {
                saw_decrease = true;
            }
            assert!(s >= 0.5 - f32::EPSILON);
            last_scale = s;
        }
        assert!(saw_decrease);
        assert!(scaler.stats().scale_changes > 0);
        assert!(scaler.current_scale() <= 1.0);
    }
}
