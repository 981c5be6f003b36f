use core::fmt::Display;
use std::borrow::Cow;

/// Error types used throughout the `forward_proxy` library.
/// These errors represent the failure conditions of resolving the genuine
/// library and binding the forwarded exports to it.
#[derive(Debug, Clone)]
pub enum Error {
    /// The canonical system directory could not be determined.
    ///
    /// This error typically indicates:
    /// * `GetSystemDirectoryW` failed
    /// * the C library is missing from the dynamic loader's link map
    /// * the reported directory is not an absolute path
    SystemDirectory {
        /// A descriptive message about the failure.
        msg: Cow<'static, str>,
    },

    /// The genuine library name is not a bare file name.
    ///
    /// Only `<system directory>/<file name>` is an acceptable source, so names
    /// carrying separators or parent components are refused.
    InvalidName {
        /// The rejected library name.
        name: Cow<'static, str>,
    },

    /// The genuine library could not be loaded from its canonical path.
    ///
    /// This error typically indicates:
    /// * the file does not exist
    /// * the file is corrupt or built for another architecture
    /// * access was denied
    Load {
        /// The absolute path the load was attempted from.
        path: Cow<'static, str>,
        /// A descriptive message reported by the platform loader.
        msg: Cow<'static, str>,
    },

    /// The canonical path resolved to the proxy module itself.
    SelfReference {
        /// The absolute path of the offending module.
        path: Cow<'static, str>,
    },

    /// The same export name appears twice in a forwarding table.
    DuplicateExport {
        /// The duplicated name.
        name: Cow<'static, str>,
    },

    /// Strict binding refused a library missing some of the forwarded exports.
    Unresolved {
        /// The genuine library file name.
        library: Cow<'static, str>,
        /// Every export the library does not provide.
        missing: Vec<&'static str>,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::SystemDirectory { msg } => write!(f, "System directory error: {msg}"),
            Error::InvalidName { name } => {
                write!(f, "Invalid library name: {name:?} is not a bare file name")
            }
            Error::Load { path, msg } => write!(f, "Failed to load {path}: {msg}"),
            Error::SelfReference { path } => {
                write!(f, "Refusing to forward into the proxy itself: {path}")
            }
            Error::DuplicateExport { name } => write!(f, "Duplicate export: {name}"),
            Error::Unresolved { library, missing } => {
                write!(f, "{library} does not export: {}", missing.join(", "))
            }
        }
    }
}

impl core::error::Error for Error {}

/// Creates a system directory error with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn system_dir_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::SystemDirectory { msg: msg.into() }
}

/// Creates a load error for `path` with the specified message.
#[cold]
#[inline(never)]
pub(crate) fn load_error(
    path: impl Into<Cow<'static, str>>,
    msg: impl Into<Cow<'static, str>>,
) -> Error {
    Error::Load {
        path: path.into(),
        msg: msg.into(),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn invalid_name_error(name: impl Into<Cow<'static, str>>) -> Error {
    Error::InvalidName { name: name.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn self_reference_error(path: impl Into<Cow<'static, str>>) -> Error {
    Error::SelfReference { path: path.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn duplicate_export_error(name: impl Into<Cow<'static, str>>) -> Error {
    Error::DuplicateExport { name: name.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn unresolved_error(
    library: impl Into<Cow<'static, str>>,
    missing: Vec<&'static str>,
) -> Error {
    Error::Unresolved {
        library: library.into(),
        missing,
    }
}
