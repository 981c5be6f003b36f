//! Platform loaders for the genuine library.
//!
//! Each platform provides a [`DefaultLoader`] implementing [`DynamicLoader`]:
//! Windows goes through `GetSystemDirectoryW`/`LoadLibraryExW`/`GetProcAddress`,
//! Unix through `dl_iterate_phdr`/`dlopen`/`dlsym`.

mod traits;

pub use traits::{DynamicLoader, OpenFlags};

cfg_if::cfg_if! {
    if #[cfg(windows)]{
        pub(crate) mod windows;
        pub use windows::*;
    }else if #[cfg(unix)]{
        pub(crate) mod unix;
        pub use unix::*;
    }else {
        compile_error!("unsupported os: no dynamic loader available");
    }
}
