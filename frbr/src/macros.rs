//! Macros for clustering error handling.
//!
//! Provides convenience macros for creating and returning
//! [`crate::error::FrbrError`] instances with reduced boilerplate.

/// Creates a [`crate::error::FrbrError`] from an error kind and description.
///
/// Supports optional dynamic detail and an optional source error.
#[macro_export]
macro_rules! frbr_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::FrbrError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::FrbrError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::FrbrError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::FrbrError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Creates and returns a [`crate::error::FrbrError`] from the current function.
///
/// Combines error creation with early return for conditions that should
/// immediately terminate execution. Supports the same optional detail and
/// source arguments as [`frbr_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::frbr_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::frbr_error!($kind, $desc, source: $source))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::frbr_error!($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        return ::core::result::Result::Err($crate::frbr_error!(
            $kind,
            $desc,
            $detail,
            source: $source
        ))
    };
}
