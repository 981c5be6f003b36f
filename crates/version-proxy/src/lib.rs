//! A drop-in `version.dll`.
//!
//! Placed next to an application, this library is loaded instead of the
//! system `version.dll`. Every export forwards to the genuine library in the
//! system directory, which is loaded on the first call.
#![cfg(windows)]

use core::ffi::c_void;
use forward_proxy::forward_exports;
use windows_sys::Win32::{
    Foundation::{BOOL, HANDLE, HINSTANCE, TRUE},
    System::{LibraryLoader::DisableThreadLibraryCalls, SystemServices::DLL_PROCESS_ATTACH},
};

forward_exports! {
    pub mod version {
        library = "version.dll";
        extern "system" {
            fn GetFileVersionInfoA(file: *const u8, handle: u32, len: u32, data: *mut c_void) -> BOOL;
            fn GetFileVersionInfoByHandle(flags: u32, file: HANDLE, data: *mut *mut c_void, len: *mut u32) -> BOOL;
            fn GetFileVersionInfoExA(flags: u32, file: *const u8, handle: u32, len: u32, data: *mut c_void) -> BOOL;
            fn GetFileVersionInfoExW(flags: u32, file: *const u16, handle: u32, len: u32, data: *mut c_void) -> BOOL;
            fn GetFileVersionInfoSizeA(file: *const u8, handle: *mut u32) -> u32;
            fn GetFileVersionInfoSizeExA(flags: u32, file: *const u8, handle: *mut u32) -> u32;
            fn GetFileVersionInfoSizeExW(flags: u32, file: *const u16, handle: *mut u32) -> u32;
            fn GetFileVersionInfoSizeW(file: *const u16, handle: *mut u32) -> u32;
            fn GetFileVersionInfoW(file: *const u16, handle: u32, len: u32, data: *mut c_void) -> BOOL;
            fn VerFindFileA(
                flags: u32,
                file: *const u8,
                win_dir: *const u8,
                app_dir: *const u8,
                cur_dir: *mut u8,
                cur_dir_len: *mut u32,
                dest_dir: *mut u8,
                dest_dir_len: *mut u32,
            ) -> u32;
            fn VerFindFileW(
                flags: u32,
                file: *const u16,
                win_dir: *const u16,
                app_dir: *const u16,
                cur_dir: *mut u16,
                cur_dir_len: *mut u32,
                dest_dir: *mut u16,
                dest_dir_len: *mut u32,
            ) -> u32;
            fn VerInstallFileA(
                flags: u32,
                src_file: *const u8,
                dest_file: *const u8,
                src_dir: *const u8,
                dest_dir: *const u8,
                cur_dir: *const u8,
                tmp_file: *mut u8,
                tmp_file_len: *mut u32,
            ) -> u32;
            fn VerInstallFileW(
                flags: u32,
                src_file: *const u16,
                dest_file: *const u16,
                src_dir: *const u16,
                dest_dir: *const u16,
                cur_dir: *const u16,
                tmp_file: *mut u16,
                tmp_file_len: *mut u32,
            ) -> u32;
            fn VerLanguageNameA(lang: u32, buf: *mut u8, len: u32) -> u32;
            fn VerLanguageNameW(lang: u32, buf: *mut u16, len: u32) -> u32;
            fn VerQueryValueA(block: *const c_void, sub_block: *const u8, buf: *mut *mut c_void, len: *mut u32) -> BOOL;
            fn VerQueryValueW(block: *const c_void, sub_block: *const u16, buf: *mut *mut c_void, len: *mut u32) -> BOOL;
        }
    }
}

/// Only drops thread notifications. Loading the genuine library here would
/// happen under the loader lock, so binding waits for the first call.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
extern "system" fn DllMain(module: HINSTANCE, reason: u32, _reserved: *mut c_void) -> BOOL {
    if reason == DLL_PROCESS_ATTACH {
        unsafe { DisableThreadLibraryCalls(module) };
    }
    TRUE
}
