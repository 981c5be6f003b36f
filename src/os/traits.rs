use crate::Result;
use bitflags::bitflags;
use core::{ffi::{CStr, c_void}, ptr::NonNull};
use std::path::{Path, PathBuf};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Flags controlling how the genuine library is opened.
    ///
    /// Flags a platform has no notion of are ignored by its loader.
    pub struct OpenFlags: u32 {
        /// Resolve every symbol of the library when it is opened (`RTLD_NOW`).
        const NOW = 1;

        /// Keep the library's symbols out of the global namespace (`RTLD_LOCAL`).
        const LOCAL = 2;

        /// Resolve the library's own dependencies from its directory and the
        /// system directory only (`LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR |
        /// LOAD_LIBRARY_SEARCH_SYSTEM32`).
        const TRUSTED_DEPENDENCIES = 4;
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::NOW | OpenFlags::LOCAL | OpenFlags::TRUSTED_DEPENDENCIES
    }
}

/// A trait for the platform operations the resolver and the export table need.
///
/// The methods are associated functions because the platform loader is
/// process-wide state; implementations carry no data of their own.
///
/// # Example
/// ```rust,ignore
/// struct MyLoader;
///
/// impl DynamicLoader for MyLoader {
///     fn system_directory() -> Result<PathBuf> {
///         Ok(PathBuf::from("/opt/vendor/lib"))
///     }
///
///     unsafe fn open(path: &Path, flags: OpenFlags) -> Result<NonNull<c_void>> {
///         // Platform-specific implementation
///         todo!()
///     }
///
///     unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
///         todo!()
///     }
/// }
/// ```
pub trait DynamicLoader {
    /// Returns the canonical, trusted directory holding the system libraries.
    ///
    /// The returned path must be absolute.
    fn system_directory() -> Result<PathBuf>;

    /// Loads the library at the absolute `path`.
    ///
    /// # Safety
    /// Loading a library runs its initializers inside the current process.
    unsafe fn open(path: &Path, flags: OpenFlags) -> Result<NonNull<c_void>>;

    /// Looks up the exported symbol `name` in a library returned by [`open`].
    ///
    /// # Safety
    /// `handle` must come from [`open`] of the same loader.
    ///
    /// [`open`]: DynamicLoader::open
    unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>>;

    /// Whether `handle`, opened from `path`, is the module this crate is linked into.
    ///
    /// The default implementation never reports a self reference.
    fn is_current_module(_handle: NonNull<c_void>, _path: &Path) -> bool {
        false
    }
}
