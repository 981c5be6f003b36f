#![cfg(windows)]

mod common;

use common::{exported_names, init_logger};
use core::ffi::c_void;
use forward_proxy::{Error, ProxyConfig, forward_exports};
use libloading::Library;

forward_exports! {
    mod version {
        library = "version.dll";
        prefix = "test_fwd_";
        extern "system" {
            fn GetFileVersionInfoSizeW(file: *const u16, handle: *mut u32) -> u32;
            fn GetFileVersionInfoW(file: *const u16, handle: u32, len: u32, data: *mut c_void) -> i32;
            fn VerQueryValueA(block: *const c_void, sub_block: *const u8, buf: *mut *mut c_void, len: *mut u32) -> i32;
        }
    }

    mod elsewhere {
        library = "version.dll";
        config = ProxyConfig::new().system_dir(r"C:\forward_proxy\does\not\exist");
        prefix = "test_fwd_elsewhere_";
        extern "system" {
            fn VerQueryValueW(block: *const c_void, sub_block: *const u16, buf: *mut *mut c_void, len: *mut u32) -> i32;
        }
    }
}

type SizeW = unsafe extern "system" fn(*const u16, *mut u32) -> u32;
type InfoW = unsafe extern "system" fn(*const u16, u32, u32, *mut c_void) -> i32;
type QueryA = unsafe extern "system" fn(*const c_void, *const u8, *mut *mut c_void, *mut u32) -> i32;

fn wide(s: &std::path::Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    s.as_os_str().encode_wide().chain(Some(0)).collect()
}

/// Reads the version resource of `file` and returns its `VS_FIXEDFILEINFO`.
unsafe fn fixed_file_info(file: &[u16], size_w: SizeW, info_w: InfoW, query_a: QueryA) -> Vec<u8> {
    let mut handle = 0;
    let size = unsafe { size_w(file.as_ptr(), &mut handle) };
    assert_ne!(size, 0);
    let mut block = vec![0u8; size as usize];
    assert_ne!(
        unsafe { info_w(file.as_ptr(), 0, size, block.as_mut_ptr().cast()) },
        0
    );
    let mut value = core::ptr::null_mut();
    let mut len = 0;
    assert_ne!(
        unsafe { query_a(block.as_ptr().cast(), c"\\".as_ptr().cast(), &mut value, &mut len) },
        0
    );
    unsafe { core::slice::from_raw_parts(value.cast::<u8>(), len as usize) }.to_vec()
}

#[test]
fn ver_query_value_matches_genuine() {
    init_logger();
    let binding = version::MODULE.init().unwrap();
    let kernel32 = wide(&binding.path().with_file_name("kernel32.dll"));

    let forwarded = unsafe {
        fixed_file_info(
            &kernel32,
            version::GetFileVersionInfoSizeW,
            version::GetFileVersionInfoW,
            version::VerQueryValueA,
        )
    };

    let lib = unsafe { Library::new(binding.path()) }.unwrap();
    let genuine = unsafe {
        fixed_file_info(
            &kernel32,
            *lib.get::<SizeW>(b"GetFileVersionInfoSizeW").unwrap(),
            *lib.get::<InfoW>(b"GetFileVersionInfoW").unwrap(),
            *lib.get::<QueryA>(b"VerQueryValueA").unwrap(),
        )
    };
    // VS_FIXEDFILEINFO starts with the 0xFEEF04BD signature.
    assert_eq!(&forwarded[..4], &0xFEEF04BDu32.to_le_bytes());
    assert_eq!(forwarded, genuine);
}

#[test]
fn slots_hold_the_genuine_addresses() {
    let binding = version::MODULE.init().unwrap();
    assert!(binding.path().ends_with("version.dll"));
    let lib = unsafe { Library::new(binding.path()) }.unwrap();
    for export in version::MODULE.exports() {
        let expected = unsafe { *lib.get::<unsafe extern "system" fn()>(export.name().as_bytes()).unwrap() };
        assert_eq!(export.address().unwrap().as_ptr(), expected as *mut c_void);
    }
}

#[test]
fn genuine_library_exports_every_forwarded_name() {
    let binding = version::MODULE.init().unwrap();
    let names = exported_names(binding.path());
    for export in version::MODULE.exports() {
        assert!(names.iter().any(|name| name == export.name()), "{}", export.name());
    }
}

#[test]
fn missing_system_directory_is_a_load_error() {
    match elsewhere::MODULE.init().unwrap_err() {
        Error::Load { path, .. } => assert!(path.ends_with("version.dll")),
        other => panic!("unexpected error: {other}"),
    }
}
