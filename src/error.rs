// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for the import pipeline.
//!
//! Only [`ImportError::SizeExceeded`] (and I/O/parse failures reaching the
//! `std`-feature file/reader entry points) ever abort an import. Every other
//! condition from the malformed-AST / cycle / unsupported-feature taxonomy is
//! recovered locally and reported through `tracing`, never returned here.

use alloc::string::String;

/// Errors that can abort [`crate::import`] or its `std`-feature wrappers.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The input's entity count, counted before processing begins, exceeds
    /// the hard import limit.
    #[error("DXF input has {count} entities, exceeding the {limit} entity import limit")]
    SizeExceeded {
        /// Number of entities counted in the input.
        count: usize,
        /// The hard limit that was exceeded.
        limit: usize,
    },
    /// The upstream `dxf` crate failed to parse the drawing.
    #[error("failed to parse DXF input: {0}")]
    Parse(String),
    /// Reading the input failed at the I/O layer.
    #[cfg(feature = "std")]
    #[error("failed to read DXF input: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "std")]
impl From<dxf::DxfError> for ImportError {
    fn from(e: dxf::DxfError) -> Self {
        Self::Parse(alloc::format!("{e}"))
    }
}
