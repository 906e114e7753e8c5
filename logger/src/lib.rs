//! Backend-agnostic logging macros.
//!
//! The macros expand in the calling crate, so the `log` and `defmt` features checked here are the
//! features of the caller. Crates using this facade declare both features and forward them to
//! `logger/log` and `logger/defmt`. Format strings must stick to plain `{}` placeholders, which
//! both backends understand.
#![no_std]

#[doc(hidden)]
#[macro_export]
macro_rules! __forward {
    ($level:ident, $($args:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::$level!($($args)*);
        #[cfg(feature = "log")]
        log::$level!($($args)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        if false {
            ::core::mem::drop(::core::format_args!($($args)*));
        };
    }};
}

#[macro_export]
macro_rules! trace {
    ($($args:tt)*) => { $crate::__forward!(trace, $($args)*) };
}

#[macro_export]
macro_rules! debug {
    ($($args:tt)*) => { $crate::__forward!(debug, $($args)*) };
}

#[macro_export]
macro_rules! info {
    ($($args:tt)*) => { $crate::__forward!(info, $($args)*) };
}

#[macro_export]
macro_rules! warn {
    ($($args:tt)*) => { $crate::__forward!(warn, $($args)*) };
}

#[macro_export]
macro_rules! error {
    ($($args:tt)*) => { $crate::__forward!(error, $($args)*) };
}
