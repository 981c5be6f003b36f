use crate::{
    Result,
    error::{load_error, system_dir_error},
    os::{DynamicLoader, OpenFlags},
};
use core::{
    ffi::{CStr, c_int, c_void},
    mem::MaybeUninit,
    ptr::NonNull,
};
use std::{
    ffi::{CString, OsStr},
    os::unix::ffi::OsStrExt,
    path::{Path, PathBuf},
};

/// An implementation of DynamicLoader trait
pub struct DefaultLoader;

fn dl_flags(flags: OpenFlags) -> c_int {
    let mut bits = if flags.contains(OpenFlags::NOW) {
        libc::RTLD_NOW
    } else {
        libc::RTLD_LAZY
    };
    if flags.contains(OpenFlags::LOCAL) {
        bits |= libc::RTLD_LOCAL;
    } else {
        bits |= libc::RTLD_GLOBAL;
    }
    bits
}

/// Takes the pending `dlerror` message, if any.
fn last_dl_error() -> String {
    let msg = unsafe { libc::dlerror() };
    if msg.is_null() {
        return String::from("unknown dynamic loader error");
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// File name of the loaded object containing `addr`.
fn object_path(addr: *const c_void) -> Option<PathBuf> {
    let mut info = MaybeUninit::<libc::Dl_info>::uninit();
    if unsafe { libc::dladdr(addr, info.as_mut_ptr()) } == 0 {
        return None;
    }
    let info = unsafe { info.assume_init() };
    if info.dli_fname.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(info.dli_fname) };
    Some(PathBuf::from(OsStr::from_bytes(name.to_bytes())))
}

/// Whether `file_name` names the C library in the loader's link map.
#[cfg(not(target_vendor = "apple"))]
fn is_libc(file_name: &OsStr) -> bool {
    let name = file_name.as_bytes();
    name.starts_with(b"libc.so") || name.starts_with(b"ld-musl-")
}

/// Path of the C library as recorded by the dynamic loader.
///
/// Libc functions like `malloc` may be interposed by the executable or an
/// allocator, so `dladdr` on them can name the wrong object.
#[cfg(not(target_vendor = "apple"))]
fn libc_path() -> Option<PathBuf> {
    unsafe extern "C" fn visit(
        info: *mut libc::dl_phdr_info,
        _size: libc::size_t,
        data: *mut c_void,
    ) -> c_int {
        let info = unsafe { &*info };
        if info.dlpi_name.is_null() {
            return 0;
        }
        let name = unsafe { CStr::from_ptr(info.dlpi_name) };
        let path = Path::new(OsStr::from_bytes(name.to_bytes()));
        if !path.file_name().is_some_and(is_libc) {
            return 0;
        }
        let found = unsafe { &mut *data.cast::<Option<PathBuf>>() };
        *found = Some(path.to_path_buf());
        1
    }

    let mut found: Option<PathBuf> = None;
    unsafe {
        libc::dl_iterate_phdr(Some(visit), (&raw mut found).cast::<c_void>());
    }
    found
}

impl DynamicLoader for DefaultLoader {
    #[cfg(target_vendor = "apple")]
    fn system_directory() -> Result<PathBuf> {
        Ok(PathBuf::from("/usr/lib"))
    }

    #[cfg(not(target_vendor = "apple"))]
    fn system_directory() -> Result<PathBuf> {
        // The directory the dynamic loader took the C library from.
        let libc_path = libc_path()
            .ok_or_else(|| system_dir_error("the C library is not in the link map"))?;
        let dir = libc_path
            .parent()
            .filter(|dir| dir.is_absolute())
            .ok_or_else(|| {
                system_dir_error(format!(
                    "C library path is not absolute: {}",
                    libc_path.display()
                ))
            })?;
        Ok(dir.to_path_buf())
    }

    unsafe fn open(path: &Path, flags: OpenFlags) -> Result<NonNull<c_void>> {
        let cpath = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| load_error(path.display().to_string(), "path contains a NUL byte"))?;
        let handle = unsafe { libc::dlopen(cpath.as_ptr(), dl_flags(flags)) };
        NonNull::new(handle).ok_or_else(|| load_error(path.display().to_string(), last_dl_error()))
    }

    unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        NonNull::new(unsafe { libc::dlsym(handle.as_ptr(), name.as_ptr()) })
    }

    fn is_current_module(_handle: NonNull<c_void>, path: &Path) -> bool {
        let Some(own) = object_path(crate::module::bind_export as *const c_void) else {
            return false;
        };
        match (std::fs::canonicalize(own), std::fs::canonicalize(path)) {
            (Ok(own), Ok(target)) => own == target,
            _ => false,
        }
    }
}
