// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT
//
// Adapted from `tabulon/src/floatfuncs.rs` for `f64`, since the curve
// tesselator and entity processor are the only callers that need libm
// fallbacks when the `std` feature is disabled.

//! Shims for math functions that ordinarily come from std.

/// Defines a trait that chooses between libstd or libm implementations of float methods.
macro_rules! define_float_funcs {
    ($(
        fn $name:ident(self $(,$arg:ident: $arg_ty:ty)*) -> $ret:ty
        => $lfname:ident;
    )+) => {
        /// Provides libm implementations of float functions typically provided by
        /// std, for use when the `std` feature is not enabled.
        #[allow(dead_code, reason = "here for future no_std callers, unused today")]
        #[cfg(not(feature = "std"))]
        pub(crate) trait FloatFuncs: Sized {
            $(fn $name(self $(,$arg: $arg_ty)*) -> $ret;)+
        }

        #[cfg(not(feature = "std"))]
        impl FloatFuncs for f64 {
            $(fn $name(self $(,$arg: $arg_ty)*) -> $ret {
                #[cfg(feature = "libm")]
                return libm::$lfname(self $(,$arg)*);

                #[cfg(not(feature = "libm"))]
                compile_error!("dxf_import_core requires either the `std` or `libm` feature");
            })+
        }
    }
}

define_float_funcs! {
    fn atan2(self, other: Self) -> Self => atan2;
    fn hypot(self, other: Self) -> Self => hypot;
    fn sin_cos(self) -> (Self, Self) => sincos;
    fn sqrt(self) -> Self => sqrt;
    fn round(self) -> Self => round;
}
