//! Raw GL type aliases and the constant subset this crate issues or intercepts.
//!
//! Stands in for the `gl_generator`-produced bindings the teacher crate builds
//! at compile time (see `render-gl/build.rs`): this library wraps a fixed,
//! curated list of desktop-GL entry points rather than the whole surface, so
//! the bindings are hand-maintained instead of codegen'd.
#![allow(non_camel_case_types, dead_code)]

use std::os::raw::{c_char, c_void};

pub type GLenum = u32;
pub type GLboolean = u8;
pub type GLbitfield = u32;
pub type GLvoid = c_void;
pub type GLbyte = i8;
pub type GLshort = i16;
pub type GLint = i32;
pub type GLclampx = i32;
pub type GLsizei = i32;
pub type GLfloat = f32;
pub type GLclampf = f32;
pub type GLdouble = f64;
pub type GLclampd = f64;
pub type GLchar = c_char;
pub type GLubyte = u8;
pub type GLushort = u16;
pub type GLuint = u32;
pub type GLsizeiptr = isize;
pub type GLintptr = isize;
pub type GLsync = *const c_void;
pub type GLint64 = i64;
pub type GLuint64 = u64;

pub const FALSE: GLboolean = 0;
pub const TRUE: GLboolean = 1;
pub const NO_ERROR: GLenum = 0;

// Errors
pub const INVALID_ENUM: GLenum = 0x0500;
pub const INVALID_VALUE: GLenum = 0x0501;
pub const INVALID_OPERATION: GLenum = 0x0502;
pub const OUT_OF_MEMORY: GLenum = 0x0505;
pub const INVALID_FRAMEBUFFER_OPERATION: GLenum = 0x0506;

// Enable/disable caps
pub const BLEND: GLenum = 0x0BE2;
pub const DEPTH_TEST: GLenum = 0x0B71;
pub const STENCIL_TEST: GLenum = 0x0B90;
pub const CULL_FACE: GLenum = 0x0B44;
pub const SCISSOR_TEST: GLenum = 0x0C11;
pub const PROGRAM_POINT_SIZE: GLenum = 0x8642;

// Faces / winding
pub const FRONT: GLenum = 0x0404;
pub const BACK: GLenum = 0x0405;
pub const FRONT_AND_BACK: GLenum = 0x0408;
pub const CW: GLenum = 0x0900;
pub const CCW: GLenum = 0x0901;

// Blend factors
pub const ZERO: GLenum = 0;
pub const ONE: GLenum = 1;
pub const SRC_COLOR: GLenum = 0x0300;
pub const ONE_MINUS_SRC_COLOR: GLenum = 0x0301;
pub const SRC_ALPHA: GLenum = 0x0302;
pub const ONE_MINUS_SRC_ALPHA: GLenum = 0x0303;
pub const DST_ALPHA: GLenum = 0x0304;
pub const ONE_MINUS_DST_ALPHA: GLenum = 0x0305;
pub const DST_COLOR: GLenum = 0x0306;
pub const ONE_MINUS_DST_COLOR: GLenum = 0x0307;
pub const SRC_ALPHA_SATURATE: GLenum = 0x0308;
pub const CONSTANT_COLOR: GLenum = 0x8001;
pub const ONE_MINUS_CONSTANT_COLOR: GLenum = 0x8002;
pub const CONSTANT_ALPHA: GLenum = 0x8003;
pub const ONE_MINUS_CONSTANT_ALPHA: GLenum = 0x8004;

// Blend ops
pub const FUNC_ADD: GLenum = 0x8006;
pub const FUNC_SUBTRACT: GLenum = 0x800A;
pub const FUNC_REVERSE_SUBTRACT: GLenum = 0x800B;
pub const MIN: GLenum = 0x8007;
pub const MAX: GLenum = 0x8008;

// Compare funcs
pub const NEVER: GLenum = 0x0200;
pub const LESS: GLenum = 0x0201;
pub const EQUAL: GLenum = 0x0202;
pub const LEQUAL: GLenum = 0x0203;
pub const GREATER: GLenum = 0x0204;
pub const NOTEQUAL: GLenum = 0x0205;
pub const GEQUAL: GLenum = 0x0206;
pub const ALWAYS: GLenum = 0x0207;

// Stencil ops
pub const KEEP: GLenum = 0x1E00;
pub const REPLACE: GLenum = 0x1E01;
pub const INCR: GLenum = 0x1E02;
pub const DECR: GLenum = 0x1E03;
pub const INVERT: GLenum = 0x150A;
pub const INCR_WRAP: GLenum = 0x8507;
pub const DECR_WRAP: GLenum = 0x8508;

// Primitive modes
pub const POINTS: GLenum = 0x0000;
pub const LINES: GLenum = 0x0001;
pub const LINE_LOOP: GLenum = 0x0002;
pub const LINE_STRIP: GLenum = 0x0003;
pub const TRIANGLES: GLenum = 0x0004;
pub const TRIANGLE_STRIP: GLenum = 0x0005;
pub const TRIANGLE_FAN: GLenum = 0x0006;

// Buffer targets
pub const ARRAY_BUFFER: GLenum = 0x8892;
pub const ELEMENT_ARRAY_BUFFER: GLenum = 0x8893;
pub const UNIFORM_BUFFER: GLenum = 0x8A11;
pub const SHADER_STORAGE_BUFFER: GLenum = 0x90D2;
pub const PIXEL_PACK_BUFFER: GLenum = 0x88EB;
pub const PIXEL_UNPACK_BUFFER: GLenum = 0x88EC;

// Buffer usage / storage flags
pub const STATIC_DRAW: GLenum = 0x88E4;
pub const DYNAMIC_DRAW: GLenum = 0x88E8;
pub const STREAM_DRAW: GLenum = 0x88E0;
pub const MAP_READ_BIT: GLbitfield = 0x0001;
pub const MAP_WRITE_BIT: GLbitfield = 0x0002;
pub const MAP_PERSISTENT_BIT: GLbitfield = 0x0040;
pub const MAP_COHERENT_BIT: GLbitfield = 0x0080;
pub const DYNAMIC_STORAGE_BIT: GLbitfield = 0x0100;

// Index / vertex attrib types
pub const UNSIGNED_BYTE: GLenum = 0x1401;
pub const UNSIGNED_SHORT: GLenum = 0x1403;
pub const UNSIGNED_INT: GLenum = 0x1405;
pub const FLOAT: GLenum = 0x1406;

// Texture targets / bindings
pub const TEXTURE_2D: GLenum = 0x0DE1;
pub const TEXTURE_3D: GLenum = 0x806F;
pub const TEXTURE_CUBE_MAP: GLenum = 0x8513;
pub const TEXTURE_2D_ARRAY: GLenum = 0x8C1A;
pub const TEXTURE0: GLenum = 0x84C0;

// Shader stages
pub const VERTEX_SHADER: GLenum = 0x8B31;
pub const FRAGMENT_SHADER: GLenum = 0x8B30;
pub const GEOMETRY_SHADER: GLenum = 0x8DD9;
pub const TESS_CONTROL_SHADER: GLenum = 0x8E88;
pub const TESS_EVALUATION_SHADER: GLenum = 0x8E87;
pub const COMPUTE_SHADER: GLenum = 0x91B9;
pub const COMPILE_STATUS: GLenum = 0x8B81;
pub const LINK_STATUS: GLenum = 0x8B82;
pub const INFO_LOG_LENGTH: GLenum = 0x8B84;

// Program binary
pub const PROGRAM_BINARY_LENGTH: GLenum = 0x8741;
pub const NUM_PROGRAM_BINARY_FORMATS: GLenum = 0x87FE;
pub const PROGRAM_BINARY_FORMATS: GLenum = 0x87FF;
pub const PROGRAM_BINARY_RETRIEVABLE_HINT: GLenum = 0x8257;

// Framebuffer
pub const FRAMEBUFFER: GLenum = 0x8D40;
pub const DRAW_FRAMEBUFFER: GLenum = 0x8CA9;
pub const READ_FRAMEBUFFER: GLenum = 0x8CA8;
pub const COLOR_ATTACHMENT0: GLenum = 0x8CE0;
pub const DEPTH_STENCIL_ATTACHMENT: GLenum = 0x821A;
pub const FRAMEBUFFER_COMPLETE: GLenum = 0x8CD5;

// Texture formats
pub const RGBA8: GLenum = 0x8058;
pub const DEPTH24_STENCIL8: GLenum = 0x88F0;
pub const RGBA: GLenum = 0x1908;

// Sync
pub const SYNC_GPU_COMMANDS_COMPLETE: GLenum = 0x9117;
pub const SYNC_FLUSH_COMMANDS_BIT: GLbitfield = 0x0001;
pub const ALREADY_SIGNALED: GLenum = 0x911A;
pub const TIMEOUT_EXPIRED: GLenum = 0x911B;
pub const CONDITION_SATISFIED: GLenum = 0x911C;
pub const WAIT_FAILED: GLenum = 0x911D;

// Integer queries
pub const MAJOR_VERSION: GLenum = 0x821B;
pub const MINOR_VERSION: GLenum = 0x821C;
pub const VERSION: GLenum = 0x1F02;
pub const RENDERER: GLenum = 0x1F01;
pub const VENDOR: GLenum = 0x1F00;
pub const EXTENSIONS: GLenum = 0x1F03;
pub const NUM_EXTENSIONS: GLenum = 0x821D;
pub const MAX_DRAW_BUFFERS: GLenum = 0x8824;
pub const MAX_COLOR_ATTACHMENTS: GLenum = 0x8CDF;
pub const MAX_VIEWPORTS: GLenum = 0x825B;
pub const MAX_TEXTURE_MAX_ANISOTROPY: GLenum = 0x84FF;
pub const UNIFORM_BUFFER_OFFSET_ALIGNMENT: GLenum = 0x8A34;
