//! The real GLES 3.x entry points this library calls *through*, loaded once
//! from the platform's proc-address resolver (the EGL-like layer spec §1
//! calls "consumed, not specified").
//!
//! This is the low-level counterpart of `dispatch`: `dispatch` resolves the
//! *desktop*-GL names the host asks for and routes them into this crate's
//! wrappers; `Gl` resolves the *actual* GLES names the underlying driver
//! implements so those wrappers have something to call. Modelled directly on
//! the `gl_generator`-produced `Gl` struct the teacher crate builds at
//! compile time (`render-gl/build.rs`) — hand-written here because this
//! library only ever calls a fixed, curated subset of the real surface, not
//! the whole of GLES.
#![allow(non_snake_case, dead_code)]

use std::ffi::{c_void, CStr};
use std::mem;
use std::os::raw::c_char;

use crate::gl::*;

type LoaderFn<'a> = dyn FnMut(&str) -> *const c_void + 'a;

macro_rules! gl_functions {
    ($($(#[$meta:meta])* fn $name:ident($($arg:ident: $arg_ty:ty),* $(,)?) -> $ret:ty;)*) => {
        pub struct Gl {
            $($name: unsafe extern "system" fn($($arg_ty),*) -> $ret,)*
        }

        /// Fallback entry points used when the platform loader can't resolve
        /// a name: log instead of dereferencing a null function pointer.
        mod stub {
            use super::*;
            $(pub unsafe extern "system" fn $name($(_: $arg_ty),*) -> $ret {
                log::warn!(concat!("gl", stringify!($name), " called but was never resolved by the platform loader"));
                mem::zeroed()
            })*
        }

        impl Gl {
            /// Loads every entry point this crate needs via `loader`, which
            /// forwards to the platform's real `eglGetProcAddress`-equivalent.
            /// Entry points the driver does not expose fall back to a stub
            /// that logs and returns a zeroed value rather than crashing.
            pub fn load(mut loader: impl FnMut(&str) -> *const c_void) -> Gl {
                let loader: &mut LoaderFn = &mut loader;
                Gl {
                    $($name: {
                        let p = loader(concat!("gl", stringify!($name)));
                        if p.is_null() {
                            stub::$name
                        } else {
                            unsafe { mem::transmute(p) }
                        }
                    },)*
                }
            }

            $($(#[$meta])*
            #[inline]
            pub unsafe fn $name(&self, $($arg: $arg_ty),*) -> $ret {
                (self.$name)($($arg),*)
            })*
        }
    };
}

gl_functions! {
    fn Enable(cap: GLenum) -> ();
    fn Disable(cap: GLenum) -> ();
    fn Enablei(cap: GLenum, index: GLuint) -> ();
    fn Disablei(cap: GLenum, index: GLuint) -> ();
    fn IsEnabled(cap: GLenum) -> GLboolean;

    fn BlendEquationSeparate(mode_rgb: GLenum, mode_alpha: GLenum) -> ();
    fn BlendEquationSeparatei(buf: GLuint, mode_rgb: GLenum, mode_alpha: GLenum) -> ();
    fn BlendFuncSeparate(src_rgb: GLenum, dst_rgb: GLenum, src_alpha: GLenum, dst_alpha: GLenum) -> ();
    fn BlendFuncSeparatei(buf: GLuint, src_rgb: GLenum, dst_rgb: GLenum, src_alpha: GLenum, dst_alpha: GLenum) -> ();
    fn BlendColor(r: GLfloat, g: GLfloat, b: GLfloat, a: GLfloat) -> ();

    fn DepthFunc(func: GLenum) -> ();
    fn DepthMask(flag: GLboolean) -> ();
    fn DepthRangef(near: GLfloat, far: GLfloat) -> ();

    fn StencilFuncSeparate(face: GLenum, func: GLenum, reference: GLint, mask: GLuint) -> ();
    fn StencilOpSeparate(face: GLenum, sfail: GLenum, dpfail: GLenum, dppass: GLenum) -> ();
    fn StencilMaskSeparate(face: GLenum, mask: GLuint) -> ();

    fn CullFace(mode: GLenum) -> ();
    fn FrontFace(mode: GLenum) -> ();
    fn LineWidth(width: GLfloat) -> ();
    fn Scissor(x: GLint, y: GLint, width: GLsizei, height: GLsizei) -> ();
    fn ScissorIndexed(index: GLuint, left: GLint, bottom: GLint, width: GLsizei, height: GLsizei) -> ();
    fn Viewport(x: GLint, y: GLint, width: GLsizei, height: GLsizei) -> ();
    fn ViewportIndexedf(index: GLuint, x: GLfloat, y: GLfloat, w: GLfloat, h: GLfloat) -> ();

    fn ActiveTexture(texture: GLenum) -> ();
    fn BindTexture(target: GLenum, texture: GLuint) -> ();
    fn GenTextures(n: GLsizei, textures: *mut GLuint) -> ();
    fn DeleteTextures(n: GLsizei, textures: *const GLuint) -> ();
    fn TexParameteri(target: GLenum, pname: GLenum, param: GLint) -> ();
    fn TexStorage2D(target: GLenum, levels: GLsizei, internalformat: GLenum, width: GLsizei, height: GLsizei) -> ();
    fn BindSampler(unit: GLuint, sampler: GLuint) -> ();
    fn GenSamplers(n: GLsizei, samplers: *mut GLuint) -> ();
    fn DeleteSamplers(n: GLsizei, samplers: *const GLuint) -> ();

    fn GenBuffers(n: GLsizei, buffers: *mut GLuint) -> ();
    fn DeleteBuffers(n: GLsizei, buffers: *const GLuint) -> ();
    fn BindBuffer(target: GLenum, buffer: GLuint) -> ();
    fn BindBufferRange(target: GLenum, index: GLuint, buffer: GLuint, offset: GLintptr, size: GLsizeiptr) -> ();
    fn BindBufferBase(target: GLenum, index: GLuint, buffer: GLuint) -> ();
    fn BufferData(target: GLenum, size: GLsizeiptr, data: *const GLvoid, usage: GLenum) -> ();
    fn BufferStorageEXT(target: GLenum, size: GLsizeiptr, data: *const GLvoid, flags: GLbitfield) -> ();
    fn BufferSubData(target: GLenum, offset: GLintptr, size: GLsizeiptr, data: *const GLvoid) -> ();
    fn MapBufferRange(target: GLenum, offset: GLintptr, length: GLsizeiptr, access: GLbitfield) -> *mut GLvoid;
    fn UnmapBuffer(target: GLenum) -> GLboolean;
    fn FlushMappedBufferRange(target: GLenum, offset: GLintptr, length: GLsizeiptr) -> ();

    fn GenVertexArrays(n: GLsizei, arrays: *mut GLuint) -> ();
    fn DeleteVertexArrays(n: GLsizei, arrays: *const GLuint) -> ();
    fn BindVertexArray(array: GLuint) -> ();
    fn VertexAttribPointer(index: GLuint, size: GLint, ty: GLenum, normalized: GLboolean, stride: GLsizei, pointer: *const GLvoid) -> ();
    fn EnableVertexAttribArray(index: GLuint) -> ();

    fn CreateShader(ty: GLenum) -> GLuint;
    fn DeleteShader(shader: GLuint) -> ();
    fn ShaderSource(shader: GLuint, count: GLsizei, strings: *const *const GLchar, lengths: *const GLint) -> ();
    fn CompileShader(shader: GLuint) -> ();
    fn GetShaderiv(shader: GLuint, pname: GLenum, params: *mut GLint) -> ();
    fn GetShaderInfoLog(shader: GLuint, buf_size: GLsizei, length: *mut GLsizei, info_log: *mut c_char) -> ();

    fn CreateProgram() -> GLuint;
    fn DeleteProgram(program: GLuint) -> ();
    fn AttachShader(program: GLuint, shader: GLuint) -> ();
    fn LinkProgram(program: GLuint) -> ();
    fn UseProgram(program: GLuint) -> ();
    fn GetProgramiv(program: GLuint, pname: GLenum, params: *mut GLint) -> ();
    fn GetProgramInfoLog(program: GLuint, buf_size: GLsizei, length: *mut GLsizei, info_log: *mut c_char) -> ();
    fn ProgramParameteri(program: GLuint, pname: GLenum, value: GLint) -> ();
    fn GetProgramBinary(program: GLuint, buf_size: GLsizei, length: *mut GLsizei, binary_format: *mut GLenum, binary: *mut GLvoid) -> ();
    fn ProgramBinary(program: GLuint, binary_format: GLenum, binary: *const GLvoid, length: GLsizei) -> ();

    fn GenFramebuffers(n: GLsizei, framebuffers: *mut GLuint) -> ();
    fn DeleteFramebuffers(n: GLsizei, framebuffers: *const GLuint) -> ();
    fn BindFramebuffer(target: GLenum, framebuffer: GLuint) -> ();
    fn FramebufferTexture2D(target: GLenum, attachment: GLenum, textarget: GLenum, texture: GLuint, level: GLint) -> ();
    fn CheckFramebufferStatus(target: GLenum) -> GLenum;
    fn DrawBuffers(n: GLsizei, bufs: *const GLenum) -> ();
    fn Clear(mask: GLbitfield) -> ();
    fn ClearColor(r: GLfloat, g: GLfloat, b: GLfloat, a: GLfloat) -> ();

    fn DrawArrays(mode: GLenum, first: GLint, count: GLsizei) -> ();
    fn DrawArraysInstanced(mode: GLenum, first: GLint, count: GLsizei, instance_count: GLsizei) -> ();
    fn DrawElements(mode: GLenum, count: GLsizei, ty: GLenum, indices: *const GLvoid) -> ();
    fn DrawElementsInstanced(mode: GLenum, count: GLsizei, ty: GLenum, indices: *const GLvoid, instance_count: GLsizei) -> ();
    fn MultiDrawArraysEXT(mode: GLenum, first: *const GLint, count: *const GLsizei, drawcount: GLsizei) -> ();
    fn MultiDrawElementsEXT(mode: GLenum, count: *const GLsizei, ty: GLenum, indices: *const *const GLvoid, drawcount: GLsizei) -> ();

    fn FenceSync(condition: GLenum, flags: GLbitfield) -> GLsync;
    fn ClientWaitSync(sync: GLsync, flags: GLbitfield, timeout: GLuint64) -> GLenum;
    fn DeleteSync(sync: GLsync) -> ();

    fn GetError() -> GLenum;
    fn GetIntegerv(pname: GLenum, params: *mut GLint) -> ();
    fn GetFloatv(pname: GLenum, params: *mut GLfloat) -> ();
    fn GetString(name: GLenum) -> *const GLubyte;
    fn GetStringi(name: GLenum, index: GLuint) -> *const GLubyte;
}

/// Reads the null-terminated string returned by `glGetString`/`glGetStringi`.
///
/// # Safety
/// `ptr` must be a valid, null-terminated C string pointer as returned by the
/// driver, or null.
pub unsafe fn cstr_from_gl(ptr: *const GLubyte) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr as *const c_char)
        .to_string_lossy()
        .into_owned()
}

/// Enumerates the driver's extension strings via the ES-3-style indexed
/// query (`GL_NUM_EXTENSIONS` + `glGetStringi`), since the legacy single
/// `GL_EXTENSIONS` string query was removed from core ES/desktop profiles.
pub fn query_extensions(gl: &Gl) -> Vec<String> {
    unsafe {
        let mut count = 0;
        gl.GetIntegerv(NUM_EXTENSIONS, &mut count);
        (0..count)
            .map(|i| cstr_from_gl(gl.GetStringi(EXTENSIONS, i as GLuint)))
            .collect()
    }
}
