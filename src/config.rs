//! Per-module configuration.
//!
//! [`ProxyConfig`] is built with `const fn`s so it can be stored in the
//! process-wide [`ForwardModule`](crate::ForwardModule) static generated by
//! [`forward_exports!`](crate::forward_exports).

use crate::os::OpenFlags;
use core::fmt::Debug;

/// What a trampoline does when its export was not found in the genuine library.
#[derive(Clone, Copy)]
pub enum MissingSymbol {
    /// Print a message naming the export and the library, then abort the process.
    Abort,
    /// Bind the export to an integrator supplied function instead.
    ///
    /// The function is jumped to with the caller's original arguments, so it
    /// must have exactly the signature and ABI of the missing export.
    Redirect(unsafe extern "C" fn()),
}

impl Debug for MissingSymbol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MissingSymbol::Abort => f.write_str("Abort"),
            MissingSymbol::Redirect(func) => f
                .debug_tuple("Redirect")
                .field(&(*func as *const ()))
                .finish(),
        }
    }
}

/// Configuration of one forwarded library.
#[derive(Debug, Clone, Copy)]
pub struct ProxyConfig {
    system_dir: Option<&'static str>,
    strict: bool,
    on_missing: MissingSymbol,
    flags: OpenFlags,
}

impl ProxyConfig {
    /// The default configuration: canonical system directory, non-strict
    /// binding and [`MissingSymbol::Abort`].
    pub const fn new() -> Self {
        Self {
            system_dir: None,
            strict: false,
            on_missing: MissingSymbol::Abort,
            flags: OpenFlags::NOW
                .union(OpenFlags::LOCAL)
                .union(OpenFlags::TRUSTED_DEPENDENCIES),
        }
    }

    /// Load the genuine library from `dir` instead of the system directory.
    ///
    /// `dir` must be absolute; a relative directory is rejected at
    /// initialization like any other untrusted location.
    pub const fn system_dir(mut self, dir: &'static str) -> Self {
        self.system_dir = Some(dir);
        self
    }

    /// Fail the whole initialization when any export is missing.
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the policy for exports missing from the genuine library.
    pub const fn on_missing(mut self, policy: MissingSymbol) -> Self {
        self.on_missing = policy;
        self
    }

    /// Sets the flags the genuine library is opened with.
    pub const fn open_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn system_dir_override(&self) -> Option<&'static str> {
        self.system_dir
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[inline]
    pub fn missing_policy(&self) -> MissingSymbol {
        self.on_missing
    }

    #[inline]
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new()
    }
}
