//! Process-wide state of one forwarded library.
//!
//! A [`ForwardModule`] lives in a static generated by
//! [`forward_exports!`](crate::forward_exports). It is initialized at most
//! once, either eagerly through [`ForwardModule::init`] or lazily by the first
//! trampoline that finds its slot empty.

use crate::{
    MissingSymbol, ProxyConfig, Result,
    error::unresolved_error,
    os::{DefaultLoader, DynamicLoader},
    resolver::{self, LibraryHandle},
    table::{self, BindReport, Export, ExportIndex},
};
use core::{
    ffi::c_void,
    fmt::{Arguments, Debug},
    ptr::NonNull,
};
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// The immutable snapshot left by a successful initialization.
pub struct Binding {
    handle: LibraryHandle,
    path: PathBuf,
    report: BindReport,
    index: ExportIndex,
}

impl Binding {
    /// Handle of the genuine library.
    #[inline]
    pub fn handle(&self) -> LibraryHandle {
        self.handle
    }

    /// The absolute path the genuine library was loaded from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of exports bound to the genuine library.
    #[inline]
    pub fn bound(&self) -> usize {
        self.report.bound()
    }

    /// Exports the genuine library does not provide.
    #[inline]
    pub fn missing(&self) -> &[&'static str] {
        self.report.missing()
    }

    #[inline]
    pub fn index(&self) -> &ExportIndex {
        &self.index
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Binding")
            .field("handle", &self.handle)
            .field("path", &self.path)
            .field("bound", &self.report.bound())
            .field("missing", &self.report.missing())
            .finish()
    }
}

/// One forwarded library: its name, its forwarding table and the run-once
/// binding state.
pub struct ForwardModule {
    library: &'static str,
    exports: &'static [&'static Export],
    config: ProxyConfig,
    state: OnceLock<Result<Binding>>,
}

impl ForwardModule {
    pub const fn new(
        library: &'static str,
        exports: &'static [&'static Export],
        config: ProxyConfig,
    ) -> Self {
        Self {
            library,
            exports,
            config,
            state: OnceLock::new(),
        }
    }

    /// Loads the genuine library and binds every export, once.
    ///
    /// Concurrent callers block until the first one finishes and then share
    /// its result. A failure is cached and returned again on every call.
    pub fn init(&self) -> Result<&Binding> {
        self.init_with::<DefaultLoader>()
    }

    pub(crate) fn init_with<L: DynamicLoader>(&self) -> Result<&Binding> {
        self.state
            .get_or_init(|| self.initialize::<L>())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn initialize<L: DynamicLoader>(&self) -> Result<Binding> {
        let index = ExportIndex::build(self.exports)?;
        let (handle, path) = resolver::resolve::<L>(&self.config, self.library)?.into_parts();
        let resolved = table::resolve_exports::<L>(handle, self.exports);
        if self.config.is_strict() {
            let missing = resolved.missing();
            if !missing.is_empty() {
                #[cfg(feature = "log")]
                log::error!(
                    "[{}] Strict binding failed, missing: {}",
                    self.library,
                    missing.join(", ")
                );
                return Err(unresolved_error(self.library, missing));
            }
        }
        let report = resolved.bind();
        #[cfg(feature = "log")]
        log::info!(
            "[{}] Bound {} of {} exports",
            self.library,
            report.bound(),
            self.exports.len()
        );
        Ok(Binding {
            handle,
            path,
            report,
            index,
        })
    }

    /// The binding, if initialization already ran and succeeded.
    #[inline]
    pub fn binding(&self) -> Option<&Binding> {
        self.state.get().and_then(|state| state.as_ref().ok())
    }

    /// Whether initialization already ran, successfully or not.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// File name of the genuine library.
    #[inline]
    pub fn library(&self) -> &'static str {
        self.library
    }

    #[inline]
    pub fn exports(&self) -> &'static [&'static Export] {
        self.exports
    }

    #[inline]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Finds the export record named `name`.
    pub fn export(&self, name: &str) -> Option<&'static Export> {
        match self.binding() {
            Some(binding) => binding.index.get(name).map(|idx| self.exports[idx]),
            None => self
                .exports
                .iter()
                .copied()
                .find(|export| export.name() == name),
        }
    }
}

impl Debug for ForwardModule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ForwardModule")
            .field("library", &self.library)
            .field("exports", &self.exports.len())
            .field("config", &self.config)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cold]
fn fatal(args: Arguments<'_>) -> ! {
    #[cfg(feature = "log")]
    log::error!("{}", args);
    eprintln!("forward_proxy: {}", args);
    std::process::abort()
}

/// Where the address of `export` comes from once its module is initialized.
fn target_of<L: DynamicLoader>(export: &'static Export) -> Option<NonNull<c_void>> {
    let module = export.module();
    if let Err(err) = module.init_with::<L>() {
        fatal(format_args!(
            "cannot forward {} to {}: {}",
            export.name(),
            module.library(),
            err
        ));
    }
    if let Some(addr) = export.address() {
        return Some(addr);
    }
    match module.config().missing_policy() {
        MissingSymbol::Redirect(fallback) => {
            let addr = NonNull::new(fallback as *mut c_void)?;
            #[cfg(feature = "log")]
            log::warn!(
                "[{}] Redirecting {} to {:p}",
                module.library(),
                export.name(),
                addr
            );
            export.slot().set(addr);
            Some(addr)
        }
        MissingSymbol::Abort => None,
    }
}

/// Entry point of the architecture binder.
///
/// Initializes the module owning `export` and returns the address its
/// trampoline should jump to. Never returns when the genuine library cannot
/// be loaded or the export has no target under the configured policy.
#[doc(hidden)]
#[allow(improper_ctypes_definitions)]
pub extern "C" fn bind_export(export: &'static Export) -> *const c_void {
    match target_of::<DefaultLoader>(export) {
        Some(addr) => addr.as_ptr(),
        None => fatal(format_args!(
            "{} does not export {}",
            export.module().library(),
            export.name()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        resolver::tests::{FAKE_DIR, FAKE_SYMBOL, FakeLoader},
    };
    use std::{sync::Barrier, thread};

    macro_rules! fake_module {
        ($module:ident, $exports:ident, $config:expr, [$($export:ident = $name:literal),*]) => {
            static $module: ForwardModule = ForwardModule::new("fake.dll", $exports, $config);
            static $exports: &[&Export] = &[$(&$export),*];
            $(static $export: Export = Export::new($name, concat!($name, "\0"), &$module);)*
        };
    }

    unsafe extern "C" fn fallback() {}

    #[test]
    fn init_binds_every_export_once() {
        fake_module!(MODULE, EXPORTS, ProxyConfig::new(), [A = "Alpha", B = "Beta"]);

        assert!(!MODULE.is_initialized());
        assert!(MODULE.binding().is_none());
        let binding = MODULE.init_with::<FakeLoader>().unwrap();
        assert_eq!(binding.bound(), 2);
        assert!(binding.missing().is_empty());
        assert_eq!(binding.path(), Path::new(FAKE_DIR).join("fake.dll"));
        assert!(A.slot().is_bound() && B.slot().is_bound());

        let again = MODULE.init_with::<FakeLoader>().unwrap();
        assert!(core::ptr::eq(binding, again));
        assert!(core::ptr::eq(MODULE.export("Beta").unwrap(), &B));
        assert!(MODULE.export("Gamma").is_none());
    }

    #[test]
    fn missing_export_keeps_the_rest() {
        fake_module!(
            MODULE,
            EXPORTS,
            ProxyConfig::new(),
            [A = "Alpha", M = "MissingOne"]
        );

        let binding = MODULE.init_with::<FakeLoader>().unwrap();
        assert_eq!(binding.bound(), 1);
        assert_eq!(binding.missing(), ["MissingOne"]);
        assert_eq!(A.address(), Some(NonNull::from(&FAKE_SYMBOL).cast()));
        assert_eq!(M.address(), None);
    }

    #[test]
    fn strict_mode_refuses_partial_tables() {
        fake_module!(
            MODULE,
            EXPORTS,
            ProxyConfig::new().strict(true),
            [A = "Alpha", M = "MissingOne"]
        );

        match MODULE.init_with::<FakeLoader>().unwrap_err() {
            Error::Unresolved { library, missing } => {
                assert_eq!(library, "fake.dll");
                assert_eq!(missing, ["MissingOne"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing was bound, and the failure is cached.
        assert!(!A.slot().is_bound());
        assert!(MODULE.is_initialized());
        assert!(MODULE.binding().is_none());
        assert!(MODULE.init_with::<FakeLoader>().is_err());
    }

    #[test]
    fn load_failure_is_cached() {
        fake_module!(
            MODULE,
            EXPORTS,
            ProxyConfig::new().system_dir(if cfg!(windows) { r"C:\nowhere" } else { "/nowhere" }),
            [A = "Alpha"]
        );

        assert!(matches!(
            MODULE.init_with::<FakeLoader>(),
            Err(Error::Load { .. })
        ));
        assert!(matches!(
            MODULE.init_with::<FakeLoader>(),
            Err(Error::Load { .. })
        ));
        assert!(!A.slot().is_bound());
    }

    #[test]
    fn duplicate_names_fail_before_loading() {
        fake_module!(MODULE, EXPORTS, ProxyConfig::new(), [A = "Twice", B = "Twice"]);

        assert!(matches!(
            MODULE.init_with::<FakeLoader>(),
            Err(Error::DuplicateExport { .. })
        ));
        assert!(!A.slot().is_bound() && !B.slot().is_bound());
    }

    #[test]
    fn redirect_binds_the_fallback() {
        fake_module!(
            MODULE,
            EXPORTS,
            ProxyConfig::new().on_missing(MissingSymbol::Redirect(fallback)),
            [M = "MissingOne"]
        );

        let addr = target_of::<FakeLoader>(&M).unwrap();
        assert_eq!(addr.as_ptr(), fallback as *mut c_void);
        assert_eq!(M.address(), Some(addr));
    }

    #[test]
    fn abort_policy_has_no_target() {
        fake_module!(MODULE, EXPORTS, ProxyConfig::new(), [M = "MissingOne"]);

        assert!(target_of::<FakeLoader>(&M).is_none());
        assert!(!M.slot().is_bound());
    }

    #[test]
    fn racing_initializers_share_one_binding() {
        fake_module!(MODULE, EXPORTS, ProxyConfig::new(), [A = "Alpha"]);

        let barrier = Barrier::new(8);
        let bindings: Vec<usize> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        MODULE.init_with::<FakeLoader>().unwrap() as *const Binding as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(bindings.windows(2).all(|w| w[0] == w[1]));
        assert!(A.slot().is_bound());
    }
}
