//! Symbol Address Table
//!
//! Every forwarded name owns one [`Export`] record whose first field is the
//! [`Slot`] its trampoline jumps through. Binding fills the slots from the
//! genuine library, once, keyed by exact export name.

use crate::{
    ForwardModule, Result, error::duplicate_export_error, os::DynamicLoader,
    resolver::LibraryHandle,
};
use core::{
    ffi::{CStr, c_void},
    fmt::Debug,
    hash::{Hash, Hasher},
    ptr::{NonNull, null_mut},
    sync::atomic::{AtomicPtr, Ordering},
};
use foldhash::{SharedSeed, fast::FoldHasher};
use hashbrown::HashTable;

/// A write-once cell holding the resolved address of one export.
///
/// The layout is a single pointer so trampolines can load it directly.
#[repr(transparent)]
pub struct Slot(AtomicPtr<c_void>);

impl Slot {
    /// Creates an unbound slot.
    pub const fn new() -> Self {
        Self(AtomicPtr::new(null_mut()))
    }

    /// Gets the bound address, or `None` while the slot is unbound.
    #[inline]
    pub fn get(&self) -> Option<NonNull<c_void>> {
        NonNull::new(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.get().is_some()
    }

    #[inline]
    pub(crate) fn set(&self, addr: NonNull<c_void>) {
        self.0.store(addr.as_ptr(), Ordering::Release);
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Slot")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}

/// One entry of a forwarding table: an exported name and its slot.
///
/// The slot must stay the first field, trampolines read it at offset 0.
#[repr(C)]
pub struct Export {
    slot: Slot,
    name: &'static str,
    cname: &'static CStr,
    module: &'static ForwardModule,
}

impl Export {
    /// Creates the record for `name`.
    ///
    /// `name_with_nul` is `name` followed by a single NUL byte; the macro
    /// builds it with `concat!`.
    pub const fn new(
        name: &'static str,
        name_with_nul: &'static str,
        module: &'static ForwardModule,
    ) -> Self {
        let cname = match CStr::from_bytes_with_nul(name_with_nul.as_bytes()) {
            Ok(cname) => cname,
            Err(_) => panic!("export names must not contain NUL bytes"),
        };
        Self {
            slot: Slot::new(),
            name,
            cname,
            module,
        }
    }

    /// The exact name looked up in the genuine library.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn cname(&self) -> &'static CStr {
        self.cname
    }

    #[inline]
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// The forwarded module this export belongs to.
    #[inline]
    pub fn module(&self) -> &'static ForwardModule {
        self.module
    }

    /// The address calls are currently forwarded to.
    #[inline]
    pub fn address(&self) -> Option<NonNull<c_void>> {
        self.slot.get()
    }
}

impl Debug for Export {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Export")
            .field("name", &self.name)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Outcome of binding a forwarding table.
#[derive(Debug, Clone, Default)]
pub struct BindReport {
    bound: usize,
    missing: Vec<&'static str>,
}

impl BindReport {
    /// Number of exports now bound to the genuine library.
    #[inline]
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Exports the genuine library does not provide; their slots stay unbound.
    #[inline]
    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }
}

/// Addresses looked up for a forwarding table, not yet stored in its slots.
pub struct ResolvedExports<'a> {
    exports: &'a [&'static Export],
    addrs: Vec<Option<NonNull<c_void>>>,
}

impl ResolvedExports<'_> {
    /// Names whose lookup failed.
    pub fn missing(&self) -> Vec<&'static str> {
        self.exports
            .iter()
            .zip(&self.addrs)
            .filter(|(_, addr)| addr.is_none())
            .map(|(export, _)| export.name())
            .collect()
    }

    /// Stores every found address into its slot.
    pub fn bind(self) -> BindReport {
        let mut report = BindReport::default();
        for (export, addr) in self.exports.iter().zip(self.addrs) {
            match addr {
                Some(addr) => {
                    export.slot.set(addr);
                    report.bound += 1;
                }
                None => report.missing.push(export.name()),
            }
        }
        report
    }
}

/// Looks up every export of the table in the genuine library.
pub fn resolve_exports<'a, L: DynamicLoader>(
    handle: LibraryHandle,
    exports: &'a [&'static Export],
) -> ResolvedExports<'a> {
    let addrs = exports
        .iter()
        .map(|export| {
            let addr = unsafe { L::symbol(handle.as_raw(), export.cname()) };
            #[cfg(feature = "log")]
            match addr {
                Some(addr) => log::trace!("[{}] {} -> {:p}", export.module().library(), export.name(), addr),
                None => log::warn!(
                    "[{}] {} is not exported by the genuine library",
                    export.module().library(),
                    export.name()
                ),
            }
            addr
        })
        .collect();
    ResolvedExports { exports, addrs }
}

/// Looks up and binds every export of the table.
///
/// A failed lookup leaves that slot unbound and is recorded in the report;
/// the other exports are still bound. Binding again against the same library
/// stores the same addresses.
pub fn bind_exports<L: DynamicLoader>(
    handle: LibraryHandle,
    exports: &[&'static Export],
) -> BindReport {
    resolve_exports::<L>(handle, exports).bind()
}

struct IndexEntry {
    name: &'static str,
    idx: usize,
}

const HASHER: FoldHasher<'static> = FoldHasher::with_seed(0, SharedSeed::global_fixed());

/// Name to position map over a forwarding table.
pub struct ExportIndex {
    map: HashTable<IndexEntry>,
}

impl ExportIndex {
    fn hash(name: &str) -> u64 {
        let mut hasher = HASHER.clone();
        name.as_bytes().hash(&mut hasher);
        hasher.finish()
    }

    /// Builds the index, refusing tables that name an export twice.
    pub fn build(exports: &[&'static Export]) -> Result<Self> {
        let mut map = HashTable::with_capacity(exports.len());
        for (idx, export) in exports.iter().enumerate() {
            let name = export.name();
            let hash = Self::hash(name);
            if map.find(hash, |entry: &IndexEntry| entry.name == name).is_some() {
                return Err(duplicate_export_error(name));
            }
            map.insert_unique(hash, IndexEntry { name, idx }, |entry| {
                Self::hash(entry.name)
            });
        }
        Ok(Self { map })
    }

    /// Position of `name` in the table.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.map
            .find(Self::hash(name), |entry| entry.name == name)
            .map(|entry| entry.idx)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Debug for ExportIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExportIndex")
            .field("len", &self.map.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error, ProxyConfig,
        resolver::{
            self,
            tests::{FAKE_SYMBOL, FakeLoader},
        },
    };

    static MODULE: ForwardModule = ForwardModule::new("fake.dll", EXPORTS, ProxyConfig::new());
    static EXPORTS: &[&Export] = &[&FIRST, &MISSING, &SECOND];
    static FIRST: Export = Export::new("First", "First\0", &MODULE);
    static MISSING: Export = Export::new("MissingThird", "MissingThird\0", &MODULE);
    static SECOND: Export = Export::new("Second", "Second\0", &MODULE);

    static DUP_MODULE: ForwardModule =
        ForwardModule::new("fake.dll", DUP_EXPORTS, ProxyConfig::new());
    static DUP_EXPORTS: &[&Export] = &[&DUP_A, &DUP_B];
    static DUP_A: Export = Export::new("Same", "Same\0", &DUP_MODULE);
    static DUP_B: Export = Export::new("Same", "Same\0", &DUP_MODULE);

    fn fake_handle() -> LibraryHandle {
        resolver::resolve::<FakeLoader>(&ProxyConfig::new(), "fake.dll")
            .unwrap()
            .handle()
    }

    #[test]
    fn slots_start_unbound() {
        let slot = Slot::new();
        assert!(!slot.is_bound());
        assert_eq!(core::mem::size_of::<Slot>(), core::mem::size_of::<usize>());
        assert_eq!(core::mem::offset_of!(Export, slot), 0);
    }

    #[test]
    fn lookup_failure_only_affects_its_own_slot() {
        let report = bind_exports::<FakeLoader>(fake_handle(), EXPORTS);
        assert_eq!(report.bound(), 2);
        assert_eq!(report.missing(), ["MissingThird"]);
        let expected = NonNull::from(&FAKE_SYMBOL).cast();
        assert_eq!(FIRST.address(), Some(expected));
        assert_eq!(SECOND.address(), Some(expected));
        assert_eq!(MISSING.address(), None);

        // A second pass writes the same addresses.
        let again = bind_exports::<FakeLoader>(fake_handle(), EXPORTS);
        assert_eq!(again.bound(), 2);
        assert_eq!(FIRST.address(), Some(expected));
    }

    #[test]
    fn resolved_exports_do_not_touch_slots_until_bound() {
        static LATE_MODULE: ForwardModule =
            ForwardModule::new("fake.dll", LATE_EXPORTS, ProxyConfig::new());
        static LATE_EXPORTS: &[&Export] = &[&LATE];
        static LATE: Export = Export::new("Late", "Late\0", &LATE_MODULE);

        let resolved = resolve_exports::<FakeLoader>(fake_handle(), LATE_EXPORTS);
        assert!(resolved.missing().is_empty());
        assert!(!LATE.slot().is_bound());
        resolved.bind();
        assert!(LATE.slot().is_bound());
    }

    #[test]
    fn index_finds_every_name() {
        let index = ExportIndex::build(EXPORTS).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("First"), Some(0));
        assert_eq!(index.get("MissingThird"), Some(1));
        assert_eq!(index.get("Second"), Some(2));
        assert_eq!(index.get("first"), None);
    }

    #[test]
    fn index_rejects_duplicates() {
        let err = ExportIndex::build(DUP_EXPORTS).unwrap_err();
        match err {
            Error::DuplicateExport { name } => assert_eq!(name, "Same"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
