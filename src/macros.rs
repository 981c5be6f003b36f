/// Declare the exports of a proxy library and forward them to the genuine one.
///
/// Each `fn` becomes a naked trampoline exported under its own name (after an
/// optional `prefix`) together with the [`Export`](crate::Export) record its
/// trampoline jumps through. The block also defines `MODULE`, the
/// [`ForwardModule`](crate::ForwardModule) shared by all of them.
///
/// Signatures must match the genuine exports exactly: arguments are passed
/// through untouched, so a wrong ABI or parameter list is undefined behaviour.
///
/// The `config` expression and the signature types are resolved in the module
/// that invokes the macro, through a `use super::*` in the generated module.
///
/// # Example
/// ```no_run
/// use forward_proxy::{ProxyConfig, forward_exports};
///
/// forward_exports! {
///     /// Forwards to the C math library.
///     pub mod math {
///         library = "libm.so.6";
///         config = ProxyConfig::new().strict(true);
///         prefix = "proxy_";
///         extern "C" {
///             fn cos(x: f64) -> f64;
///             fn ldexp(x: f64, exp: i32) -> f64;
///         }
///     }
/// }
///
/// fn main() {
///     // bind eagerly instead of on the first call
///     math::MODULE.init().unwrap();
///     assert_eq!(unsafe { math::ldexp(1.5, 2) }, 6.0);
///     assert!(math::ldexp::EXPORT.slot().is_bound());
/// }
/// ```
#[macro_export]
macro_rules! forward_exports {
    (
        $(#[$attr:meta])*
        $vis:vis mod $module:ident {
            library = $library:literal;
            $(config = $config:expr;)?
            $(prefix = $prefix:literal;)?
            extern $abi:tt {
                $($body:tt)*
            }
        }
        $($rest:tt)*
    ) => {
        $crate::__forward_module! {
            attrs [$(#[$attr])*]
            vis [$vis]
            module [$module]
            library [$library]
            config [$($config)?]
            prefix [$($prefix)?]
            abi [$abi]
            body [$($body)*]
        }
        $crate::forward_exports! { $($rest)* }
    };
    () => {};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __forward_module {
    (
        attrs [$($attrs:tt)*]
        vis [$($vis:tt)*]
        module [$module:ident]
        library [$library:literal]
        config []
        prefix [$($prefix:tt)*]
        abi [$abi:tt]
        body [$($body:tt)*]
    ) => {
        $crate::__forward_module! {
            attrs [$($attrs)*]
            vis [$($vis)*]
            module [$module]
            library [$library]
            config [$crate::ProxyConfig::new()]
            prefix [$($prefix)*]
            abi [$abi]
            body [$($body)*]
        }
    };
    (
        attrs [$($attrs:tt)*]
        vis [$($vis:tt)*]
        module [$module:ident]
        library [$library:literal]
        config [$config:expr]
        prefix []
        abi [$abi:tt]
        body [$($body:tt)*]
    ) => {
        $crate::__forward_module! {
            attrs [$($attrs)*]
            vis [$($vis)*]
            module [$module]
            library [$library]
            config [$config]
            prefix [""]
            abi [$abi]
            body [$($body)*]
        }
    };
    (
        attrs [$(#[$attr:meta])*]
        vis [$vis:vis]
        module [$module:ident]
        library [$library:literal]
        config [$config:expr]
        prefix [$prefix:literal]
        abi [$abi:tt]
        body [$(
            $(#[$fn_attr:meta])*
            fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
        )*]
    ) => {
        $(#[$attr])*
        $vis mod $module {
            #[allow(unused_imports)]
            use super::*;

            /// The genuine library and the binding state of its exports.
            pub static MODULE: $crate::ForwardModule =
                $crate::ForwardModule::new($library, EXPORTS, $config);

            static EXPORTS: &[&$crate::Export] = &[$(&$name::EXPORT),*];

            $(
                #[doc(hidden)]
                #[allow(non_snake_case)]
                pub mod $name {
                    #[allow(unused_imports)]
                    use super::*;

                    pub static EXPORT: $crate::Export = $crate::Export::new(
                        stringify!($name),
                        concat!(stringify!($name), "\0"),
                        &super::MODULE,
                    );

                    $(#[$fn_attr])*
                    #[unsafe(naked)]
                    #[unsafe(export_name = concat!($prefix, stringify!($name)))]
                    pub unsafe extern $abi fn forward($(_: $ty),*) $(-> $ret)? {
                        $crate::__trampoline!(EXPORT)
                    }
                }

                $(#[$fn_attr])*
                pub use self::$name::forward as $name;
            )*
        }
    };
}
