//! # forward_proxy
//! Building blocks for export-forwarding proxy libraries.
//!
//! A proxy library exposes the same exported names as a genuine system
//! library. Every export is a trampoline that tail-jumps, with the caller's
//! registers and stack untouched, to the genuine function. The genuine library
//! is loaded once, and only from `<system directory>/<file name>`.
//!
//! The pieces:
//! - the resolver ([`resolver`], [`os`]) finds and loads the genuine library;
//! - the symbol address table ([`table`]) holds one [`Slot`] per export;
//! - the trampolines ([`forward_exports!`]) jump through those slots.
//!
//! Binding is lazy: a trampoline whose slot is still empty falls into a binder
//! that initializes its [`ForwardModule`] and then continues into the genuine
//! function. This keeps library loading out of `DllMain`. [`ForwardModule::init`]
//! binds eagerly instead.
//!
//! ## Example
//! ```no_run
//! use forward_proxy::forward_exports;
//!
//! forward_exports! {
//!     pub mod math {
//!         library = "libm.so.6";
//!         prefix = "proxy_";
//!         extern "C" {
//!             fn cos(x: f64) -> f64;
//!         }
//!     }
//! }
//!
//! // The first call loads libm and binds the slot.
//! assert_eq!(unsafe { math::cos(0.0) }, 1.0);
//! let binding = math::MODULE.binding().unwrap();
//! println!("forwarding to {}", binding.path().display());
//! ```
//!
//! ## Features
//! - `log`: report loading and binding through the `log` facade.

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
)))]
compile_error!("unsupport arch");

#[doc(hidden)]
pub mod arch;
mod config;
mod error;
mod macros;
mod module;
pub mod os;
pub mod resolver;
pub mod table;

pub use config::{MissingSymbol, ProxyConfig};
pub use error::Error;
pub use module::{Binding, ForwardModule};
pub use resolver::LibraryHandle;
pub use table::{BindReport, Export, Slot};

/// A type alias for `Result`s returned by `forward_proxy` functions.
///
/// This is a convenience alias that eliminates the need to repeatedly specify
/// the `Error` type in function signatures.
pub type Result<T> = core::result::Result<T, Error>;
