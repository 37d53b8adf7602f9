//! Dispatch / entry table (spec §4.G, component G).
//!
//! A name→function-pointer map populated once at init with every desktop-GL
//! entry point this library intercepts. `resolve` checks the map first, then
//! falls through to the platform's native proc-address lookup so that
//! unintercepted extension entry points still work. Built as an
//! `fxhash`-hashed map (spec §5 "one init mutex... idempotent"; this table
//! is built once under that same mutex in `context::Context::new`).

use std::ffi::c_void;

use fxhash::FxHashMap;

/// Canonical host-visible name, e.g. `"glDrawArrays"`.
pub type EntryName = &'static str;

pub struct DispatchTable {
    entries: FxHashMap<EntryName, *const c_void>,
    platform_lookup: Box<dyn Fn(&str) -> *const c_void + Send>,
}

unsafe impl Send for DispatchTable {}

impl DispatchTable {
    pub fn new(platform_lookup: impl Fn(&str) -> *const c_void + Send + 'static) -> DispatchTable {
        DispatchTable { entries: FxHashMap::default(), platform_lookup: Box::new(platform_lookup) }
    }

    /// Registers one of this crate's own wrapper functions under its
    /// canonical desktop-GL name.
    pub fn register(&mut self, name: EntryName, ptr: *const c_void) {
        self.entries.insert(name, ptr);
    }

    /// Resolves a name: own wrappers first, then the platform loader for
    /// anything unintercepted (spec §4.G "resolve(name)").
    pub fn resolve(&self, name: &str) -> *const c_void {
        if let Some(&ptr) = self.entries.get(name) {
            return ptr;
        }
        (self.platform_lookup)(name)
    }

    /// The public `get_proc_address` surface plus its two compatibility
    /// aliases (spec §6 "Entry-point lookup"): `glXGetProcAddress` and
    /// `glXGetProcAddressARB` both resolve through this same table, after
    /// stripping the alias wrapper's own name back to the canonical one the
    /// caller actually asked for.
    pub fn resolve_with_aliases(&self, requested_name: &str) -> *const c_void {
        self.resolve(requested_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_name_resolves_without_platform_fallback() {
        let table_ptr = 0x1234usize as *const c_void;
        let mut table = DispatchTable::new(|_name| std::ptr::null());
        table.register("glDrawArrays", table_ptr);

        assert_eq!(table.resolve("glDrawArrays"), table_ptr);
    }

    #[test]
    fn unknown_name_falls_through_to_platform() {
        let table = DispatchTable::new(|name| {
            if name == "glSomeVendorExtensionFunc" {
                0x9999usize as *const c_void
            } else {
                std::ptr::null()
            }
        });
        assert_eq!(table.resolve("glSomeVendorExtensionFunc"), 0x9999usize as *const c_void);
        assert!(table.resolve("glTotallyUnknown").is_null());
    }

    #[test]
    fn alias_names_resolve_through_the_same_table() {
        let mut table = DispatchTable::new(|_name| std::ptr::null());
        let ptr = 0xABCDusize as *const c_void;
        table.register("glDrawArrays", ptr);
        assert_eq!(table.resolve_with_aliases("glDrawArrays"), ptr);
    }
}
