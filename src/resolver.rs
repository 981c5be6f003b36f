//! Library Resolver
//!
//! Locates the genuine library at `<system directory>/<file name>` and loads
//! it from that absolute path only. Loading by bare name would go through the
//! platform search order, which finds the proxy itself (infinite recursion) or
//! whatever an attacker planted earlier in the search path.

use crate::{
    ProxyConfig, Result,
    error::{invalid_name_error, self_reference_error, system_dir_error},
    os::DynamicLoader,
};
use core::{ffi::c_void, fmt::Debug, marker::PhantomData, ptr::NonNull};
use std::path::{Component, Path, PathBuf};

/// Opaque handle to the loaded genuine library.
///
/// The handle is never released: the genuine library stays loaded for as
/// long as the process, which matches the proxy's own unload timing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LibraryHandle {
    raw: NonNull<c_void>,
}

unsafe impl Send for LibraryHandle {}
unsafe impl Sync for LibraryHandle {}

impl LibraryHandle {
    /// # Safety
    /// `raw` must be a live handle returned by the platform loader.
    #[inline]
    pub unsafe fn from_raw(raw: NonNull<c_void>) -> Self {
        Self { raw }
    }

    /// Gets the platform handle (`HMODULE` or `dlopen` handle).
    #[inline]
    pub fn as_raw(&self) -> NonNull<c_void> {
        self.raw
    }
}

impl Debug for LibraryHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("LibraryHandle").field(&self.raw).finish()
    }
}

/// The genuine library, loaded from its canonical path.
pub struct ResolvedLibrary<L: DynamicLoader> {
    handle: LibraryHandle,
    path: PathBuf,
    _loader: PhantomData<fn() -> L>,
}

impl<L: DynamicLoader> Debug for ResolvedLibrary<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResolvedLibrary")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .finish()
    }
}

impl<L: DynamicLoader> ResolvedLibrary<L> {
    #[inline]
    pub fn handle(&self) -> LibraryHandle {
        self.handle
    }

    /// The absolute path the library was loaded from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn into_parts(self) -> (LibraryHandle, PathBuf) {
        (self.handle, self.path)
    }
}

fn check_file_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) if file == name && !name.contains(['/', '\\']) => {
            Ok(())
        }
        _ => Err(invalid_name_error(name.to_owned())),
    }
}

/// Builds `<system directory>/<file name>` for the genuine library.
pub fn canonical_path<L: DynamicLoader>(config: &ProxyConfig, file_name: &str) -> Result<PathBuf> {
    check_file_name(file_name)?;
    let dir = match config.system_dir_override() {
        Some(dir) => PathBuf::from(dir),
        None => L::system_directory()?,
    };
    if !dir.is_absolute() {
        return Err(system_dir_error(format!(
            "system directory is not absolute: {}",
            dir.display()
        )));
    }
    Ok(dir.join(file_name))
}

/// Loads the genuine library `file_name` from its canonical path.
///
/// Runs exactly once per forwarded module (the caller owns the run-once
/// guard); a failure is reported, never retried.
pub fn resolve<L: DynamicLoader>(
    config: &ProxyConfig,
    file_name: &str,
) -> Result<ResolvedLibrary<L>> {
    let path = canonical_path::<L>(config, file_name)?;
    let raw = match unsafe { L::open(&path, config.flags()) } {
        Ok(raw) => raw,
        Err(err) => {
            #[cfg(feature = "log")]
            log::error!("[{}] {}", file_name, err);
            return Err(err);
        }
    };
    if L::is_current_module(raw, &path) {
        return Err(self_reference_error(path.display().to_string()));
    }
    #[cfg(feature = "log")]
    log::debug!(
        "[{}] Loaded genuine library from {} at {:p}",
        file_name,
        path.display(),
        raw
    );
    Ok(ResolvedLibrary {
        handle: unsafe { LibraryHandle::from_raw(raw) },
        path,
        _loader: PhantomData,
    })
}
