// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Unit Resolver: produces a single `globalScale` mapping source units to
//! centimeters.
//!
//! The `$INSUNITS` table below follows the DXF reference's own unit
//! ordering, the same one `dxf`'s `Units` enum (and this crate's
//! `adapt::units_to_insunits_code`) is built from. Where `joto_constants`
//! has a matching named unit, the ratio is taken as a division of its
//! iota-valued constants (the same pattern the teacher uses to turn an
//! iota-valued linewidth into micrometers: `linewidth / MICROMETER`) so
//! the factor doesn't have to be hand-typed; codes with no equivalent
//! constant keep a literal factor with a comment.

use crate::model::{DxfData, DxfEntityKind};
use joto_constants::u64::{CENTIMETER, FOOT, INCH, METER, MILLIMETER};

fn iota_ratio(unit: u64) -> f64 {
    unit as f64 / CENTIMETER as f64
}

/// Caller override for `sourceUnits`, mirroring the DXF table entries an
/// explicit override is allowed to pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceUnitsOverride {
    #[default]
    Auto,
    Meters,
    Centimeters,
    Millimeters,
    Feet,
    Inches,
}

fn override_to_centimeters(o: SourceUnitsOverride) -> Option<f64> {
    match o {
        SourceUnitsOverride::Auto => None,
        SourceUnitsOverride::Meters => Some(100.0),
        SourceUnitsOverride::Centimeters => Some(1.0),
        SourceUnitsOverride::Millimeters => Some(0.1),
        SourceUnitsOverride::Feet => Some(30.48),
        SourceUnitsOverride::Inches => Some(2.54),
    }
}

/// `$INSUNITS` code to centimeters-per-source-unit, per §4.2's table.
fn insunits_to_centimeters(code: i16) -> Option<f64> {
    match code {
        1 => Some(iota_ratio(INCH)),
        2 => Some(iota_ratio(FOOT)),
        3 => Some(160_934.4),                 // Miles: no joto_constants equivalent
        4 => Some(iota_ratio(MILLIMETER)),
        5 => Some(iota_ratio(CENTIMETER)),
        6 => Some(iota_ratio(METER)),
        7 => Some(100_000.0),                 // Kilometers: no joto_constants equivalent
        8 => Some(2.54e-6),                   // Microinches: no joto_constants equivalent
        9 => Some(2.54e-3),                   // Mils: no joto_constants equivalent
        10 => Some(91.44),                    // Yards: no joto_constants equivalent
        11 => Some(1.0e-8),                   // Angstroms: no joto_constants equivalent
        12 => Some(1.0e-7),                   // Nanometers: no joto_constants equivalent
        13 => Some(1.0e-4),                   // Microns: no joto_constants equivalent
        14 => Some(10.0),                     // Decimeters: no joto_constants equivalent
        15 => Some(1000.0),                   // Decameters: no joto_constants equivalent
        16 => Some(10_000.0),                 // Hectometers: no joto_constants equivalent
        17 => Some(1.0e11),                   // Gigameters: no joto_constants equivalent
        0 => None,                            // Unitless
        _ => None,                            // Unknown code
    }
}

fn point_extent(data: &DxfData, include_paper_space: bool) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut fold = |x: f64, y: f64| {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    };

    if let (Some(min), Some(max)) = (&data.header.ext_min, &data.header.ext_max) {
        fold(min.x, min.y);
        fold(max.x, max.y);
    }

    let mut scanned = 0usize;
    for e in &data.entities {
        if scanned >= 1000 {
            break;
        }
        if e.in_paper_space && !include_paper_space {
            continue;
        }
        let counted = match &e.kind {
            DxfEntityKind::Line { p1, p2 } => {
                fold(p1.x, p1.y);
                fold(p2.x, p2.y);
                true
            }
            DxfEntityKind::LwPolyline { vertices, .. }
            | DxfEntityKind::Polyline { vertices, .. } => {
                for v in vertices {
                    fold(v.x, v.y);
                }
                !vertices.is_empty()
            }
            DxfEntityKind::Circle { center, radius } | DxfEntityKind::Arc { center, radius, .. } => {
                fold(center.x - radius, center.y - radius);
                fold(center.x + radius, center.y + radius);
                true
            }
            DxfEntityKind::Insert { location, .. } => {
                fold(location.x, location.y);
                true
            }
            _ => false,
        };
        if counted {
            scanned += 1;
        }
    }

    (min_x, min_y, max_x, max_y)
}

/// Resolve `globalScale`, the factor converting drawing units to
/// centimeters.
pub(crate) fn resolve_global_scale(
    data: &DxfData,
    override_units: SourceUnitsOverride,
    include_paper_space: bool,
    unitless_heuristic_threshold: f64,
) -> f64 {
    if let Some(scale) = override_to_centimeters(override_units) {
        return scale;
    }

    if let Some(code) = data.header.insunits {
        if let Some(scale) = insunits_to_centimeters(code) {
            return scale;
        }
    }

    let (min_x, min_y, max_x, max_y) = point_extent(data, include_paper_space);
    if !min_x.is_finite() || !max_x.is_finite() {
        tracing::debug!("unitless heuristic found no geometry, defaulting to scale 1");
        return 1.0;
    }
    let width = max_x - min_x;
    let height = max_y - min_y;
    let extent = width.max(height);

    if extent > 0.0 && extent < unitless_heuristic_threshold {
        tracing::debug!(extent, "unitless heuristic assuming meters");
        100.0
    } else {
        tracing::debug!(extent, "unitless heuristic assuming centimeters");
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DxfEntity, DxfEntityKind, DxfHeader, DxfVector};

    fn line(p1: (f64, f64), p2: (f64, f64)) -> DxfEntity {
        DxfEntity::new(
            DxfEntityKind::Line {
                p1: DxfVector::xy(p1.0, p1.1),
                p2: DxfVector::xy(p2.0, p2.1),
            },
            "0",
        )
    }

    #[test]
    fn explicit_override_wins() {
        let data = DxfData::default();
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Meters, false, 2000.0);
        assert_eq!(scale, 100.0);
    }

    #[test]
    fn insunits_code_used_when_present() {
        let mut data = DxfData::default();
        data.header.insunits = Some(4); // millimeters
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Auto, false, 2000.0);
        assert_eq!(scale, 0.1);
    }

    #[test]
    fn heuristic_assumes_meters_below_threshold() {
        let mut data = DxfData::default();
        data.entities.push(line((0.0, 0.0), (10.0, 0.0)));
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Auto, false, 2000.0);
        assert_eq!(scale, 100.0);
    }

    #[test]
    fn heuristic_assumes_centimeters_above_threshold() {
        let mut data = DxfData::default();
        data.entities.push(line((0.0, 0.0), (5000.0, 0.0)));
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Auto, false, 2000.0);
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn no_geometry_defaults_to_one() {
        let data = DxfData::default();
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Auto, false, 2000.0);
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn header_without_entities_is_not_header_default() {
        let mut data = DxfData::default();
        data.header = DxfHeader::default();
        data.header.insunits = None;
        let scale = resolve_global_scale(&data, SourceUnitsOverride::Auto, false, 2000.0);
        assert_eq!(scale, 1.0);
    }
}
