//! Argument rendering.
//!
//! Every argument of an intercepted call is turned into a trace-safe string
//! by [`render`]. Rendering never fails: a value that cannot be formatted
//! degrades to a fallback literal instead of aborting the call.
//!
//! Values reach the renderer as an [`ArgValue`], a borrowed view that records
//! which formatting route applies. Types can choose their route by
//! implementing [`Argument`]; everything else is classified by the
//! [`intercept!`](crate::intercept) macro through [`Probe`], which prefers
//! [`Argument`], then `Display`, then `Debug`, and finally the type name.
//! `None` is null whatever the inner type.

use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::Arc;

/// Rendered form of an absent value.
pub const NULL: &str = "null";

/// Fallback for a primitive whose string form could not be produced.
pub const PRIMITIVE: &str = "primitive";

/// Borrowed view of one argument value.
#[derive(Clone, Copy)]
pub enum ArgValue<'a> {
    /// An absent value.
    Null,
    /// A scalar: bool, integer, float or char.
    Primitive(&'a dyn fmt::Display),
    /// Text, rendered as-is.
    Text(&'a str),
    /// A value with a `Display` implementation.
    Display {
        /// The value.
        value: &'a dyn fmt::Display,
        /// Type name used if formatting fails.
        type_name: &'static str,
    },
    /// A value with only a `Debug` implementation.
    Debug {
        /// The value.
        value: &'a dyn fmt::Debug,
        /// Type name used if formatting fails.
        type_name: &'static str,
    },
    /// A value that cannot be formatted at all.
    Opaque {
        /// The value's type name.
        type_name: &'static str,
    },
}

impl<'a> ArgValue<'a> {
    /// View a value through its `Display` implementation.
    pub fn display<T: fmt::Display>(value: &'a T) -> Self {
        ArgValue::Display {
            value,
            type_name: short_type_name::<T>(),
        }
    }

    /// View a value through its `Debug` implementation.
    pub fn debug<T: fmt::Debug>(value: &'a T) -> Self {
        ArgValue::Debug {
            value,
            type_name: short_type_name::<T>(),
        }
    }

    /// A value of type `T` that is only known by name.
    pub fn opaque<T: ?Sized>() -> Self {
        ArgValue::Opaque {
            type_name: short_type_name::<T>(),
        }
    }

    /// Whether this is the absent value.
    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }
}

impl fmt::Debug for ArgValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => f.write_str("Null"),
            ArgValue::Primitive(_) => f.write_str("Primitive"),
            ArgValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ArgValue::Display { type_name, .. } => {
                f.debug_struct("Display").field("type_name", type_name).finish()
            }
            ArgValue::Debug { type_name, .. } => {
                f.debug_struct("Debug").field("type_name", type_name).finish()
            }
            ArgValue::Opaque { type_name } => {
                f.debug_struct("Opaque").field("type_name", type_name).finish()
            }
        }
    }
}

/// Render an argument value to a string.
pub fn render(value: ArgValue<'_>) -> String {
    match value {
        ArgValue::Null => NULL.to_string(),
        ArgValue::Primitive(value) => {
            format_or(|| value.to_string()).unwrap_or_else(|| PRIMITIVE.to_string())
        }
        ArgValue::Text(text) => text.to_string(),
        ArgValue::Display { value, type_name } => {
            format_or(|| value.to_string()).unwrap_or_else(|| bracketed(type_name))
        }
        ArgValue::Debug { value, type_name } => {
            format_or(|| format!("{value:?}")).unwrap_or_else(|| bracketed(type_name))
        }
        ArgValue::Opaque { type_name } => bracketed(type_name),
    }
}

fn format_or(format: impl FnOnce() -> String) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(format)).ok()
}

fn bracketed(type_name: &str) -> String {
    format!("[{type_name}]")
}

/// Type name without its leading module path.
///
/// Generic parameters are kept: `alloc::vec::Vec<u8>` becomes `Vec<u8>`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let generics = full.find('<').unwrap_or(full.len());
    match full[..generics].rfind("::") {
        Some(separator) => &full[separator + 2..],
        None => full,
    }
}

/// A value that knows how it should be rendered.
pub trait Argument {
    /// Borrowed view of this value.
    fn arg_value(&self) -> ArgValue<'_>;
}

macro_rules! primitive_arguments {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Argument for $ty {
                fn arg_value(&self) -> ArgValue<'_> {
                    ArgValue::Primitive(self)
                }
            }
        )*
    };
}

primitive_arguments!(
    bool, char, f32, f64, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
);

impl Argument for str {
    fn arg_value(&self) -> ArgValue<'_> {
        ArgValue::Text(self)
    }
}

impl Argument for String {
    fn arg_value(&self) -> ArgValue<'_> {
        ArgValue::Text(self)
    }
}

impl Argument for Cow<'_, str> {
    fn arg_value(&self) -> ArgValue<'_> {
        ArgValue::Text(self)
    }
}

impl<T: Argument> Argument for Option<T> {
    fn arg_value(&self) -> ArgValue<'_> {
        match self {
            Some(value) => value.arg_value(),
            None => ArgValue::Null,
        }
    }
}

impl<T: Argument + ?Sized> Argument for &T {
    fn arg_value(&self) -> ArgValue<'_> {
        (**self).arg_value()
    }
}

impl<T: Argument + ?Sized> Argument for &mut T {
    fn arg_value(&self) -> ArgValue<'_> {
        (**self).arg_value()
    }
}

impl<T: Argument + ?Sized> Argument for Box<T> {
    fn arg_value(&self) -> ArgValue<'_> {
        (**self).arg_value()
    }
}

impl<T: Argument + ?Sized> Argument for Arc<T> {
    fn arg_value(&self) -> ArgValue<'_> {
        (**self).arg_value()
    }
}

impl<T: Argument + ?Sized> Argument for Rc<T> {
    fn arg_value(&self) -> ArgValue<'_> {
        (**self).arg_value()
    }
}

/// Classifies an arbitrary value without requiring any trait of it.
///
/// Use as `(&&&&&&&Probe(&value)).arg_value()` with the `Via*` route traits
/// in scope; method resolution picks the first route the value's type
/// supports:
///
/// 1. [`ViaArgument`]
/// 2. [`ViaOptionDisplay`], [`ViaOptionDebug`], [`ViaOptionOpaque`]: `None`
///    is null and `Some` takes the inner value's route
/// 3. [`ViaDisplay`], [`ViaDebug`], [`ViaOpaque`]
pub struct Probe<'a, T>(pub &'a T);

/// Route for types implementing [`Argument`].
pub trait ViaArgument<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for `Option<T>` where `T` implements `Display`.
pub trait ViaOptionDisplay<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for `Option<T>` where `T` implements `Debug`.
pub trait ViaOptionDebug<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for any other `Option<T>`.
pub trait ViaOptionOpaque<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for types implementing `Display`.
pub trait ViaDisplay<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for types implementing `Debug`.
pub trait ViaDebug<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

/// Route for everything else.
pub trait ViaOpaque<'a> {
    /// Borrowed view of the probed value.
    fn arg_value(&self) -> ArgValue<'a>;
}

impl<'a, T: Argument> ViaArgument<'a> for &&&&&&Probe<'a, T> {
    fn arg_value(&self) -> ArgValue<'a> {
        Argument::arg_value(self.0)
    }
}

impl<'a, T: fmt::Display> ViaOptionDisplay<'a> for &&&&&Probe<'a, Option<T>> {
    fn arg_value(&self) -> ArgValue<'a> {
        match self.0 {
            Some(value) => ArgValue::display(value),
            None => ArgValue::Null,
        }
    }
}

impl<'a, T: fmt::Debug> ViaOptionDebug<'a> for &&&&Probe<'a, Option<T>> {
    fn arg_value(&self) -> ArgValue<'a> {
        match self.0 {
            Some(value) => ArgValue::debug(value),
            None => ArgValue::Null,
        }
    }
}

impl<'a, T> ViaOptionOpaque<'a> for &&&Probe<'a, Option<T>> {
    fn arg_value(&self) -> ArgValue<'a> {
        match self.0 {
            Some(_) => ArgValue::opaque::<T>(),
            None => ArgValue::Null,
        }
    }
}

impl<'a, T: fmt::Display> ViaDisplay<'a> for &&Probe<'a, T> {
    fn arg_value(&self) -> ArgValue<'a> {
        ArgValue::display(self.0)
    }
}

impl<'a, T: fmt::Debug> ViaDebug<'a> for &Probe<'a, T> {
    fn arg_value(&self) -> ArgValue<'a> {
        ArgValue::debug(self.0)
    }
}

impl<'a, T> ViaOpaque<'a> for Probe<'a, T> {
    fn arg_value(&self) -> ArgValue<'a> {
        ArgValue::opaque::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Celsius(f64);

    impl fmt::Display for Celsius {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}°C", self.0)
        }
    }

    #[derive(Debug)]
    struct Point {
        x: i32,
        y: i32,
    }

    struct Secretive;

    struct Exploding;

    impl fmt::Display for Exploding {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("cannot format");
        }
    }

    macro_rules! probe {
        ($value:expr) => {
            render((&&&&&&&Probe(&$value)).arg_value())
        };
    }

    #[test]
    fn test_null() {
        let value: Option<i32> = None;
        assert_eq!(render(value.arg_value()), "null");
        assert_eq!(probe!(value), "null");
    }

    #[test]
    fn test_primitives() {
        assert_eq!(probe!(5i32), "5");
        assert_eq!(probe!(true), "true");
        assert_eq!(probe!('c'), "c");
        assert_eq!(probe!(2.5f64), "2.5");
        assert_eq!(probe!(Some(7u8)), "7");
    }

    #[test]
    fn test_text() {
        assert_eq!(probe!("hello"), "hello");
        assert_eq!(probe!(String::from("world")), "world");
    }

    #[test]
    fn test_display_route() {
        assert_eq!(probe!(Celsius(21.5)), "21.5°C");
    }

    #[test]
    fn test_debug_route() {
        assert_eq!(probe!(Point { x: 1, y: 2 }), "Point { x: 1, y: 2 }");
        assert_eq!(probe!(vec![1, 2, 3]), "[1, 2, 3]");
    }

    #[test]
    fn test_option_of_debug_type() {
        assert_eq!(probe!(None::<Point>), "null");
        assert_eq!(probe!(Some(Point { x: 1, y: 2 })), "Point { x: 1, y: 2 }");
        assert_eq!(probe!(Some(vec![1, 2])), "[1, 2]");
        assert_eq!(probe!(None::<Vec<u8>>), "null");
    }

    #[test]
    fn test_option_of_display_type() {
        assert_eq!(probe!(Some(Celsius(3.0))), "3°C");
        assert_eq!(probe!(None::<Celsius>), "null");
    }

    #[test]
    fn test_option_of_opaque_type() {
        assert_eq!(probe!(Some(Secretive)), "[Secretive]");
        assert_eq!(probe!(None::<Secretive>), "null");
    }

    #[test]
    fn test_opaque_route() {
        assert_eq!(probe!(Secretive), "[Secretive]");
    }

    #[test]
    fn test_panicking_display_falls_back() {
        assert_eq!(probe!(Exploding), "[Exploding]");
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec<u8>");
        assert_eq!(short_type_name::<i32>(), "i32");
    }

    #[test]
    fn test_smart_pointers() {
        let shared: Arc<str> = Arc::from("shared");
        assert_eq!(render(shared.arg_value()), "shared");
        let boxed = Box::new(42u64);
        assert_eq!(render(boxed.arg_value()), "42");
    }
}
