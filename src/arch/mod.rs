//! Trampolines and the lazy binder for each supported architecture.
//!
//! Every architecture module provides two things:
//! - `bind_trampoline`, the naked routine a trampoline falls into while its
//!   slot is still empty. It preserves every argument register, calls
//!   `module::bind_export` and tail-jumps to the address it returns.
//! - `__trampoline!`, the body of one exported stub: load the slot, jump
//!   through it when bound, otherwise hand the export record to the binder.
//!
//! Neither touches the caller's return address, so the genuine function
//! returns straight to the original caller.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")]{
        mod x86_64;
        pub use x86_64::*;
    }else if #[cfg(target_arch = "riscv64")]{
        mod riscv64;
        pub use riscv64::*;
    }else if #[cfg(target_arch="aarch64")]{
        mod aarch64;
        pub use aarch64::*;
    }else {
        compile_error!("unsupported arch: no trampoline available");
    }
}
