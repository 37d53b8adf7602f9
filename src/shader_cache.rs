//! Shader binary cache (spec §4.D, component D).
//!
//! In-memory store is an `fxhash`-hashed `HashMap<u64, CacheEntry>` behind one
//! `Mutex`, held only for the structural update — the "real implementation"
//! the teacher's own Design Notes call for in place of a flat linear-scan
//! array. Link/compile error handling is grounded on `pipeline/shader.rs`'s
//! `ShaderCreationError` (collapsed here into `VelocityError::Corruption`
//! on verification failure).

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::time::Instant;

use fxhash::FxBuildHasher;

use crate::driver::Gl;
use crate::gl;

const MAGIC: [u8; 4] = *b"VELS";
const FORMAT_VERSION: u32 = 1;

/// Combines the two source hashes exactly as spec.md specifies: `vh XOR
/// (fh.wrapping_mul(31))`.
pub fn cache_key(vert_source: &[u8], frag_source: &[u8]) -> u64 {
    let vh = fnv1a(vert_source);
    let fh = fnv1a(frag_source);
    vh ^ fh.wrapping_mul(31)
}

fn fnv1a(data: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01B3;
    let mut hash = OFFSET_BASIS;
    for &b in data {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[derive(Clone)]
struct CacheEntry {
    binary_format: gl::GLenum,
    binary: Vec<u8>,
    last_used: Instant,
    hit_count: u64,
    dirty: bool,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ShaderCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub disk_load_failures: u64,
}

struct Inner {
    entries: HashMap<u64, CacheEntry, FxBuildHasher>,
    total_bytes: u64,
}

pub struct ShaderCache {
    inner: Mutex<Inner>,
    max_bytes: u64,
    max_entries: usize,
    vendor_hash: u32,
    driver_hash: u32,
    stats: Mutex<ShaderCacheStats>,
}

impl ShaderCache {
    pub fn new(max_bytes: u64, max_entries: usize, vendor_hash: u32, driver_hash: u32) -> ShaderCache {
        ShaderCache {
            inner: Mutex::new(Inner { entries: HashMap::with_hasher(FxBuildHasher::default()), total_bytes: 0 }),
            max_bytes,
            max_entries,
            vendor_hash,
            driver_hash,
            stats: Mutex::new(ShaderCacheStats::default()),
        }
    }

    pub fn stats(&self) -> ShaderCacheStats {
        *self.stats.lock().unwrap()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap() = ShaderCacheStats::default();
    }

    /// Materialises a new program handle from a cached binary and verifies
    /// link status (spec §4.D "Lookup contract"). On verification failure
    /// the entry is evicted and treated as a miss.
    pub fn get(&self, gl: &Gl, vert_source: &[u8], frag_source: &[u8]) -> Option<gl::GLuint> {
        let key = cache_key(vert_source, frag_source);
        let entry = {
            let mut inner = self.inner.lock().unwrap();
            let Some(entry) = inner.entries.get_mut(&key) else {
                self.stats.lock().unwrap().misses += 1;
                return None;
            };
            entry.last_used = Instant::now();
            entry.hit_count += 1;
            entry.clone()
        };

        let program = unsafe { gl.CreateProgram() };
        unsafe {
            gl.ProgramBinary(program, entry.binary_format, entry.binary.as_ptr() as *const gl::GLvoid, entry.binary.len() as gl::GLsizei);
        }
        let mut link_status = 0;
        unsafe { gl.GetProgramiv(program, gl::LINK_STATUS, &mut link_status) };

        if link_status == gl::TRUE as gl::GLint {
            self.stats.lock().unwrap().hits += 1;
            Some(program)
        } else {
            unsafe { gl.DeleteProgram(program) };
            self.evict(key);
            let mut s = self.stats.lock().unwrap();
            s.misses += 1;
            s.evictions += 1;
            log::warn!("shader cache entry failed to relink, evicted (key=0x{key:016x})");
            None
        }
    }

    /// Captures `program`'s binary and stores it under the source-pair key.
    /// A retrieval failure is a silent no-op (spec §4.D "Store").
    pub fn store(&self, gl: &Gl, vert_source: &[u8], frag_source: &[u8], program: gl::GLuint) {
        let mut len = 0;
        unsafe { gl.GetProgramiv(program, gl::PROGRAM_BINARY_LENGTH, &mut len) };
        if len <= 0 {
            return;
        }
        let mut binary = vec![0u8; len as usize];
        let mut actual_len = 0;
        let mut format: gl::GLenum = 0;
        unsafe {
            gl.GetProgramBinary(
                program,
                len,
                &mut actual_len,
                &mut format,
                binary.as_mut_ptr() as *mut gl::GLvoid,
            );
        }
        if actual_len <= 0 {
            return;
        }
        binary.truncate(actual_len as usize);

        let key = cache_key(vert_source, frag_source);
        let entry = CacheEntry { binary_format: format, binary, last_used: Instant::now(), hit_count: 0, dirty: true };
        self.insert(key, entry);
    }

    fn insert(&self, key: u64, entry: CacheEntry) {
        let entry_bytes = entry.binary.len() as u64;
        let mut inner = self.inner.lock().unwrap();
        self.evict_until_fits(&mut inner, entry_bytes);
        if let Some(old) = inner.entries.insert(key, entry) {
            inner.total_bytes -= old.binary.len() as u64;
        }
        inner.total_bytes += entry_bytes;
    }

    fn evict_until_fits(&self, inner: &mut Inner, incoming_bytes: u64) {
        let mut evicted = 0u64;
        while (inner.total_bytes + incoming_bytes > self.max_bytes || inner.entries.len() >= self.max_entries)
            && !inner.entries.is_empty()
        {
            if let Some((&lru_key, _)) = inner.entries.iter().min_by_key(|(_, e)| e.last_used) {
                if let Some(removed) = inner.entries.remove(&lru_key) {
                    inner.total_bytes -= removed.binary.len() as u64;
                    evicted += 1;
                }
            } else {
                break;
            }
        }
        if evicted > 0 {
            self.stats.lock().unwrap().evictions += evicted;
        }
    }

    fn evict(&self, key: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(removed) = inner.entries.remove(&key) {
            inner.total_bytes -= removed.binary.len() as u64;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.lock().unwrap().total_bytes
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Loads a previously flushed cache file. Rejects on magic/version/vendor
    /// mismatch and on any I/O error; rejection is logged, never fatal (spec
    /// §4.D "Persistence").
    pub fn load_from_disk(&self, path: &std::path::Path) {
        if let Err(e) = self.try_load_from_disk(path) {
            self.stats.lock().unwrap().disk_load_failures += 1;
            log::warn!("shader cache disk load rejected: {e}");
        }
    }

    fn try_load_from_disk(&self, path: &std::path::Path) -> io::Result<()> {
        let mut f = std::fs::File::open(path)?;
        let mut magic = [0u8; 4];
        f.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
        }
        let version = read_u32(&mut f)?;
        if version != FORMAT_VERSION {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "version mismatch"));
        }
        let vendor_hash = read_u32(&mut f)?;
        let driver_hash = read_u32(&mut f)?;
        let _timestamp = read_u64(&mut f)?;
        if vendor_hash != self.vendor_hash || driver_hash != self.driver_hash {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "device mismatch, refusing cross-GPU binaries"));
        }
        let entry_count = read_u32(&mut f)? as usize;
        let _reserved = read_u32(&mut f)?;

        // Fixed-size records: {source_hash:u64, binary_format:u32,
        // binary_size:u32, data_offset:u32, is_program:u8,
        // shader_types_bitmask:u8, padding:u16} (spec §6).
        struct Record {
            key: u64,
            format: gl::GLenum,
            len: u32,
            offset: u32,
        }
        let mut records = Vec::with_capacity(entry_count);
        for _ in 0..entry_count {
            let key = read_u64(&mut f)?;
            let format = read_u32(&mut f)?;
            let len = read_u32(&mut f)?;
            let offset = read_u32(&mut f)?;
            let mut rest = [0u8; 4]; // is_program, shader_types_bitmask, padding(2)
            f.read_exact(&mut rest)?;
            records.push(Record { key, format, len, offset });
        }

        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.total_bytes = 0;
        for r in records {
            let mut blob = vec![0u8; r.len as usize];
            use std::io::Seek;
            f.seek(std::io::SeekFrom::Start(r.offset as u64))?;
            f.read_exact(&mut blob)?;
            inner.total_bytes += blob.len() as u64;
            inner.entries.insert(
                r.key,
                CacheEntry { binary_format: r.format, binary: blob, last_used: Instant::now(), hit_count: 0, dirty: false },
            );
        }
        Ok(())
    }

    /// Writes the header, then every fixed-size record, then every blob in
    /// the same order (spec §4.D "Persistence", byte layout per spec §6).
    /// Best-effort: failures are logged, never propagated.
    pub fn flush_to_disk(&self, path: &std::path::Path) {
        if let Err(e) = self.try_flush_to_disk(path) {
            log::error!("shader cache disk flush failed: {e}");
        }
    }

    fn try_flush_to_disk(&self, path: &std::path::Path) -> io::Result<()> {
        let inner = self.inner.lock().unwrap();
        let mut f = std::fs::File::create(path)?;
        f.write_all(&MAGIC)?;
        f.write_all(&FORMAT_VERSION.to_le_bytes())?;
        f.write_all(&self.vendor_hash.to_le_bytes())?;
        f.write_all(&self.driver_hash.to_le_bytes())?;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        f.write_all(&timestamp.to_le_bytes())?;
        f.write_all(&(inner.entries.len() as u32).to_le_bytes())?;
        f.write_all(&0u32.to_le_bytes())?; // reserved

        const HEADER_LEN: u64 = 4 + 4 + 4 + 4 + 8 + 4 + 4;
        const RECORD_LEN: u64 = 8 + 4 + 4 + 4 + 1 + 1 + 2;
        let mut offset = HEADER_LEN + inner.entries.len() as u64 * RECORD_LEN;
        let entries: Vec<(&u64, &CacheEntry)> = inner.entries.iter().collect();
        for (key, entry) in &entries {
            f.write_all(&key.to_le_bytes())?;
            f.write_all(&entry.binary_format.to_le_bytes())?;
            f.write_all(&(entry.binary.len() as u32).to_le_bytes())?;
            f.write_all(&(offset as u32).to_le_bytes())?;
            f.write_all(&[1u8, 0u8, 0u8, 0u8])?; // is_program=1, shader_types_bitmask=0, padding(2)
            offset += entry.binary.len() as u64;
        }
        for (_, entry) in &entries {
            f.write_all(&entry.binary)?;
        }
        Ok(())
    }
}

fn read_u32(f: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    f.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(f: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    f.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_matches_spec_combiner() {
        let v = b"vertex source";
        let fr = b"fragment source";
        let vh = fnv1a(v);
        let fh = fnv1a(fr);
        assert_eq!(cache_key(v, fr), vh ^ fh.wrapping_mul(31));
    }

    #[test]
    fn lru_eviction_respects_entry_cap() {
        let cache = ShaderCache::new(1_000_000, 2, 0xAAAA, 0xBBBB);
        cache.insert(1, CacheEntry { binary_format: 0, binary: vec![0; 16], last_used: Instant::now(), hit_count: 0, dirty: true });
        cache.insert(2, CacheEntry { binary_format: 0, binary: vec![0; 16], last_used: Instant::now(), hit_count: 0, dirty: true });
        cache.insert(3, CacheEntry { binary_format: 0, binary: vec![0; 16], last_used: Instant::now(), hit_count: 0, dirty: true });
        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.stats().evictions, 1);
        // Key 1 was least recently used and should have been evicted.
        assert!(!cache.inner.lock().unwrap().entries.contains_key(&1));
    }

    #[test]
    fn lru_eviction_respects_byte_cap() {
        let cache = ShaderCache::new(32, 100, 0xAAAA, 0xBBBB);
        cache.insert(1, CacheEntry { binary_format: 0, binary: vec![0; 20], last_used: Instant::now(), hit_count: 0, dirty: true });
        cache.insert(2, CacheEntry { binary_format: 0, binary: vec![0; 20], last_used: Instant::now(), hit_count: 0, dirty: true });
        assert!(cache.size_bytes() <= 32);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn disk_round_trip_rejects_on_vendor_mismatch() {
        crate::init_test_logging();
        let dir = std::env::temp_dir().join(format!("velocity_gl_shader_cache_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("shader_cache.bin");

        let cache = ShaderCache::new(1_000_000, 10, 0x1111, 0x2222);
        cache.insert(42, CacheEntry { binary_format: 7, binary: vec![1, 2, 3, 4], last_used: Instant::now(), hit_count: 0, dirty: true });
        cache.flush_to_disk(&path);

        let reloaded = ShaderCache::new(1_000_000, 10, 0x1111, 0x2222);
        reloaded.load_from_disk(&path);
        assert_eq!(reloaded.entry_count(), 1);
        assert_eq!(reloaded.stats().disk_load_failures, 0);

        let different_gpu = ShaderCache::new(1_000_000, 10, 0x9999, 0x2222);
        different_gpu.load_from_disk(&path);
        assert_eq!(different_gpu.entry_count(), 0);
        assert_eq!(different_gpu.stats().disk_load_failures, 1);

        let _ = std::fs::remove_file(&path);
    }
}
