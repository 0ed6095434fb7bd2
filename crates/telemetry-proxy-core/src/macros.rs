//! The `intercept!` macro.

/// Declare an interface as interceptable.
///
/// For a dyn-compatible trait `Iface` this implements `Iface` for
/// [`Proxy<dyn Iface>`](crate::Proxy) and [`Interface<T>`](crate::Interface)
/// for `dyn Iface`, so any `T: Iface` can be wrapped. Each listed method gets
/// its own static [`CallSite`](crate::CallSite). Arguments are rendered
/// through [`Probe`](crate::render::Probe) and `Result::Err` returns are
/// recorded as failures.
///
/// The namespace defaults to the invoking module path and the type name to
/// the trait name. Methods marked `#[private]` are subject to the
/// ignore-private rule.
///
/// ```ignore
/// pub trait Weather: Send + Sync {
///     fn summary(&self, index: usize) -> Option<String>;
///     fn refresh(&self) -> Result<(), FetchError>;
/// }
///
/// telemetry_proxy_core::intercept! {
///     impl Weather {
///         namespace = "app::weather";
///         fn summary(&self, index: usize) -> Option<String>;
///         #[private]
///         fn refresh(&self) -> Result<(), FetchError>;
///     }
/// }
/// ```
#[macro_export]
macro_rules! intercept {
    (@or ; $default:expr) => { $default };
    (@or $value:expr ; $default:expr) => { $value };

    (@visibility) => { $crate::Visibility::Public };
    (@visibility public) => { $crate::Visibility::Public };
    (@visibility private) => { $crate::Visibility::Private };

    (@ret) => { () };
    (@ret $ret:ty) => { $ret };

    (
        impl $iface:ident {
            $(namespace = $namespace:expr;)?
            $(type_name = $type_name:expr;)?
            $(
                $(#[$visibility:ident])?
                fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
            )*
        }
    ) => {
        const _: () = {
            const NAMESPACE: &str = $crate::intercept!(@or $($namespace)? ; ::core::module_path!());
            const TYPE_NAME: &str = $crate::intercept!(@or $($type_name)? ; ::core::stringify!($iface));

            impl<T: $iface + 'static> $crate::Interface<T> for dyn $iface {
                fn upcast(target: ::std::sync::Arc<T>) -> ::std::sync::Arc<Self> {
                    target
                }
            }

            impl $iface for $crate::Proxy<dyn $iface> {
                $(
                    fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                        #[allow(unused_imports)]
                        use $crate::render::{
                            ViaArgument as _, ViaDebug as _, ViaDisplay as _, ViaOpaque as _,
                            ViaOptionDebug as _, ViaOptionDisplay as _, ViaOptionOpaque as _,
                        };
                        #[allow(unused_imports)]
                        use $crate::outcome::{ViaDebugError as _, ViaDisplayError as _, ViaValue as _};

                        static SITE: $crate::CallSite =
                            $crate::CallSite::new(::core::stringify!($method), NAMESPACE, TYPE_NAME)
                                .with_parameters(&[$(::core::stringify!($arg)),*])
                                .with_visibility($crate::intercept!(@visibility $($visibility)?));

                        let arguments: &[$crate::ArgValue<'_>] =
                            &[$((&&&&&&&$crate::render::Probe(&$arg)).arg_value()),*];
                        let call = $crate::Proxy::begin(self, &$crate::Invocation::new(&SITE, arguments));
                        let target = $crate::Proxy::target(self);
                        call.forward(
                            move || target.$method($($arg),*),
                            |result: &$crate::intercept!(@ret $($ret)?)| {
                                (&&&$crate::outcome::Inspect(result)).failure()
                            },
                        )
                    }
                )*
            }
        };
    };
}
