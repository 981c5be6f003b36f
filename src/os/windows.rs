use crate::{
    Result,
    error::{load_error, system_dir_error},
    os::{DynamicLoader, OpenFlags},
};
use core::{
    ffi::{CStr, c_void},
    ptr::{NonNull, null_mut},
};
use std::{
    ffi::OsString,
    os::windows::ffi::{OsStrExt, OsStringExt},
    path::{Path, PathBuf},
};
use windows_sys::Win32::{
    Foundation::{GetLastError, HMODULE, MAX_PATH},
    System::{
        LibraryLoader::{
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
            GetModuleHandleExW, GetProcAddress, LOAD_LIBRARY_FLAGS,
            LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR, LOAD_LIBRARY_SEARCH_SYSTEM32, LoadLibraryExW,
        },
        SystemInformation::GetSystemDirectoryW,
    },
};

/// An implementation of DynamicLoader trait
pub struct DefaultLoader;

fn load_flags(flags: OpenFlags) -> LOAD_LIBRARY_FLAGS {
    if flags.contains(OpenFlags::TRUSTED_DEPENDENCIES) {
        LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_SYSTEM32
    } else {
        0
    }
}

fn wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

impl DynamicLoader for DefaultLoader {
    fn system_directory() -> Result<PathBuf> {
        let mut buf = vec![0u16; MAX_PATH as usize];
        loop {
            let len = unsafe { GetSystemDirectoryW(buf.as_mut_ptr(), buf.len() as u32) } as usize;
            if len == 0 {
                let err_code = unsafe { GetLastError() };
                return Err(system_dir_error(format!(
                    "GetSystemDirectoryW failed with error: {err_code}"
                )));
            }
            // On a short buffer the return value is the required size, NUL included.
            if len >= buf.len() {
                buf.resize(len, 0);
                continue;
            }
            buf.truncate(len);
            break;
        }
        let dir = PathBuf::from(OsString::from_wide(&buf));
        if !dir.is_absolute() {
            return Err(system_dir_error(format!(
                "system directory is not absolute: {}",
                dir.display()
            )));
        }
        Ok(dir)
    }

    unsafe fn open(path: &Path, flags: OpenFlags) -> Result<NonNull<c_void>> {
        let wide_path = wide(path);
        let handle = unsafe { LoadLibraryExW(wide_path.as_ptr(), null_mut(), load_flags(flags)) };
        NonNull::new(handle).ok_or_else(|| {
            let err_code = unsafe { GetLastError() };
            load_error(
                path.display().to_string(),
                format!("LoadLibraryExW failed with error: {err_code}"),
            )
        })
    }

    unsafe fn symbol(handle: NonNull<c_void>, name: &CStr) -> Option<NonNull<c_void>> {
        let proc = unsafe { GetProcAddress(handle.as_ptr() as HMODULE, name.as_ptr().cast()) };
        proc.and_then(|f| NonNull::new(f as *mut c_void))
    }

    fn is_current_module(handle: NonNull<c_void>, _path: &Path) -> bool {
        let mut own: HMODULE = null_mut();
        let found = unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                crate::module::bind_export as *const u16,
                &mut own,
            )
        };
        found != 0 && own == handle.as_ptr() as HMODULE
    }
}
