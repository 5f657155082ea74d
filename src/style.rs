// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Style Resolver: color, lineweight, and linetype/dash resolution.
//!
//! Color and lineweight precedence is grounded on the teacher's
//! `resolve_paint`/`resolve_style` closures in `load_file_default_layers`
//! (`tabulon_dxf/src/lib.rs`); the font map is grounded on the teacher's
//! `match s.primary_font_file_name.as_str()` arm.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use crate::aci_palette;
use crate::model::{DxfColor, DxfLayerDef, DxfLinetypeDef};

/// Reserved sentinel for deferred ByBlock resolution, re-exported from
/// [`crate::model::BYBLOCK_PLACEHOLDER`] for callers of this module.
pub(crate) use crate::model::BYBLOCK_PLACEHOLDER;

/// Post-processing mode applied to resolved, non-placeholder colors.
#[derive(Debug, Clone, Default)]
pub enum ColorScheme {
    #[default]
    Original,
    Grayscale,
    Monochrome,
    FixedGray153,
    Custom(String),
}

/// Light/dark theme, controlling the ACI index-7 (white/black) fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

fn rgb_hex(rgb: u32) -> String {
    format!("#{:06X}", rgb & 0x00FF_FFFF)
}

fn aci_to_hex(index: i16, theme: Theme) -> String {
    if index == 7 {
        return match theme {
            Theme::Dark => "#FFFFFF".to_string(),
            Theme::Light => "#000000".to_string(),
        };
    }
    let idx = if (1..=255).contains(&index) { index } else { 7 };
    rgb_hex(aci_palette::lookup(idx))
}

/// Resolve a layer table entry's own ACI index to a `#RRGGBB` string, for
/// the editor-facing [`crate::model::Layer`]'s default stroke color.
pub(crate) fn aci_hex_for_layer(index: i16, theme: Theme) -> String {
    aci_to_hex(index, theme)
}

/// The theme's default stroke color, used for layers with neither a true
/// color nor an ACI index on the table entry.
pub(crate) fn default_hex_for_theme(theme: Theme) -> String {
    match theme {
        Theme::Dark => "#FFFFFF".to_string(),
        Theme::Light => "#000000".to_string(),
    }
}

/// Resolve an entity/layer color to a `#RRGGBB` string or the ByBlock
/// placeholder, per §4.3's color precedence.
pub(crate) fn resolve_color(
    color: DxfColor,
    layer: Option<&DxfLayerDef>,
    parent_color: Option<&str>,
    theme: Theme,
) -> String {
    match color {
        DxfColor::TrueColor(rgb) => rgb_hex(rgb),
        DxfColor::Index(0) => {
            // ByBlock.
            parent_color
                .map(str::to_string)
                .unwrap_or_else(|| BYBLOCK_PLACEHOLDER.to_string())
        }
        DxfColor::Index(256) => {
            // ByLayer.
            match layer {
                Some(l) => {
                    if let Some(rgb) = l.true_color {
                        rgb_hex(rgb)
                    } else if let Some(idx) = l.color_index {
                        aci_to_hex(idx, theme)
                    } else {
                        match theme {
                            Theme::Dark => "#FFFFFF".to_string(),
                            Theme::Light => "#000000".to_string(),
                        }
                    }
                }
                None => match theme {
                    Theme::Dark => "#FFFFFF".to_string(),
                    Theme::Light => "#000000".to_string(),
                },
            }
        }
        DxfColor::Index(idx) => aci_to_hex(idx, theme),
    }
}

/// Apply a [`ColorScheme`] to an already-resolved color; placeholders and
/// `"transparent"` pass through unchanged.
pub(crate) fn apply_color_scheme(color: &str, scheme: &ColorScheme) -> String {
    if color == BYBLOCK_PLACEHOLDER || color == "transparent" {
        return color.to_string();
    }
    match scheme {
        ColorScheme::Original => color.to_string(),
        ColorScheme::Monochrome => "#000000".to_string(),
        ColorScheme::FixedGray153 => "#999999".to_string(),
        ColorScheme::Custom(hex) => hex.to_uppercase(),
        ColorScheme::Grayscale => {
            let Some((r, g, b)) = parse_hex(color) else {
                return color.to_string();
            };
            let y = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u32;
            let y = y.min(255);
            format!("#{y:02X}{y:02X}{y:02X}")
        }
    }
}

fn parse_hex(s: &str) -> Option<(u8, u8, u8)> {
    let s = s.strip_prefix('#')?;
    if s.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Default lineweight, used for `-2`/`-3`/unknown values, expressed in the
/// same hundredths-of-mm unit DXF uses for the enum: 25 hundredths of a
/// mm, i.e. 0.25mm, the DXF reference's own `LWDEFAULT`.
const DEFAULT_LINEWEIGHT_ENUM: i16 = 25;

/// Lookup table mapping DXF lineweight enum values (hundredths of mm) to
/// display-pixel stroke widths, per §4.3.
fn lineweight_table(enum_value: i16) -> f64 {
    match enum_value {
        i if i <= 0 => 1.0,
        1..=13 => 1.0,
        14..=17 => 1.2,
        18..=20 => 1.5,
        21..=29 => 1.8,
        30..=34 => 2.0,
        35..=39 => 2.2,
        40..=49 => 2.5,
        50..=59 => 3.0,
        60..=69 => 4.0,
        70..=89 => 5.0,
        90..=99 => 6.0,
        100..=119 => 7.0,
        120..=157 => 8.0,
        158..=199 => 9.0,
        _ => 10.0,
    }
}

/// Resolve an entity's effective stroke width in display pixels.
pub(crate) fn resolve_stroke_width(entity_lineweight: i16, layer: Option<&DxfLayerDef>) -> f64 {
    let resolved_enum = match entity_lineweight {
        -2 => layer.and_then(|l| l.lineweight).filter(|w| *w >= 0).unwrap_or(DEFAULT_LINEWEIGHT_ENUM),
        -3 => DEFAULT_LINEWEIGHT_ENUM,
        -1 => DEFAULT_LINEWEIGHT_ENUM, // BYBLOCK shouldn't reach here; default.
        i if i < 0 => DEFAULT_LINEWEIGHT_ENUM,
        i => i,
    };
    lineweight_table(resolved_enum)
}

fn builtin_linetype(name: &str) -> Option<Vec<f64>> {
    match name.to_ascii_uppercase().as_str() {
        "DASHED" => Some(vec![10.0, 5.0]),
        "HIDDEN" => Some(vec![5.0, 5.0]),
        "CENTER" => Some(vec![20.0, 5.0, 5.0, 5.0]),
        "PHANTOM" => Some(vec![20.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
        "DOT" => Some(vec![2.0, 2.0]),
        "CONTINUOUS" | "BYLAYER" | "BYBLOCK" => Some(Vec::new()),
        _ => None,
    }
}

fn pattern_to_dash(pattern: &[f64]) -> Vec<f64> {
    pattern
        .iter()
        .map(|&v| if v == 0.0 { 0.1 } else { v.abs() })
        .collect()
}

/// Outcome of resolving an entity's linetype: either a concrete dash array
/// or a deferred-ByBlock marker for the block-cache/INSERT patch path.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedDash {
    Concrete(Vec<f64>),
    DashByBlock,
}

/// Resolve an entity's dash pattern, per §4.3's linetype precedence and
/// the ByBlock-flag decision in this crate's design notes (§9 Open
/// Question 1): rather than silently collapsing to `CONTINUOUS`, a
/// ByBlock linetype with no parent dash available is tagged
/// [`ResolvedDash::DashByBlock`] for the INSERT stage to patch.
pub(crate) fn resolve_dash(
    line_type: Option<&str>,
    layer: Option<&DxfLayerDef>,
    linetypes: &alloc::collections::BTreeMap<String, DxfLinetypeDef>,
    parent_dash: Option<&[f64]>,
    lt_scale: f64,
    entity_line_type_scale: f64,
) -> ResolvedDash {
    let is_byblock = line_type.is_some_and(|n| n.eq_ignore_ascii_case("BYBLOCK"));
    if is_byblock {
        if let Some(dash) = parent_dash {
            return ResolvedDash::Concrete(scale_dash(dash, lt_scale, entity_line_type_scale));
        }
        return ResolvedDash::DashByBlock;
    }

    let effective_name: String = match line_type {
        None => layer
            .and_then(|l| l.line_type.clone())
            .unwrap_or_else(|| "CONTINUOUS".to_string()),
        Some(n) if n.eq_ignore_ascii_case("BYLAYER") => layer
            .and_then(|l| l.line_type.clone())
            .unwrap_or_else(|| "CONTINUOUS".to_string()),
        Some(n) => n.to_string(),
    };

    let dash = if let Some(def) = linetypes.get(&effective_name) {
        pattern_to_dash(&def.pattern)
    } else {
        builtin_linetype(&effective_name).unwrap_or_default()
    };

    ResolvedDash::Concrete(scale_dash(&dash, lt_scale, entity_line_type_scale))
}

fn scale_dash(dash: &[f64], lt_scale: f64, entity_scale: f64) -> Vec<f64> {
    let factor = lt_scale * entity_scale;
    dash.iter().map(|&v| v * factor).collect()
}

/// Resolve a generic font family from a style's primary font file name,
/// per §4.5's heuristic.
pub(crate) fn font_family_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.contains("roman") {
        "serif"
    } else if lower.contains("mono") || lower.contains("txt") {
        "monospace"
    } else {
        "sans-serif"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_color_formats_as_hex() {
        let s = resolve_color(DxfColor::TrueColor(0x00FF80), None, None, Theme::Dark);
        assert_eq!(s, "#00FF80");
    }

    #[test]
    fn byblock_with_no_parent_is_placeholder() {
        let s = resolve_color(DxfColor::Index(0), None, None, Theme::Dark);
        assert_eq!(s, BYBLOCK_PLACEHOLDER);
    }

    #[test]
    fn byblock_with_parent_inherits() {
        let s = resolve_color(DxfColor::Index(0), None, Some("#FF0000"), Theme::Dark);
        assert_eq!(s, "#FF0000");
    }

    #[test]
    fn indexed_color_one_is_red() {
        let s = resolve_color(DxfColor::Index(1), None, None, Theme::Dark);
        assert_eq!(s, "#FF0000");
    }

    #[test]
    fn indexed_color_five_is_blue() {
        let s = resolve_color(DxfColor::Index(5), None, None, Theme::Dark);
        assert_eq!(s, "#0000FF");
    }

    #[test]
    fn dashed_linetype_scaling() {
        let linetypes = alloc::collections::BTreeMap::new();
        let dash = resolve_dash(Some("DASHED"), None, &linetypes, None, 2.0, 3.0);
        match dash {
            ResolvedDash::Concrete(d) => assert_eq!(d, alloc::vec![60.0, 30.0]),
            ResolvedDash::DashByBlock => panic!("expected concrete dash"),
        }
    }

    #[test]
    fn byblock_linetype_without_parent_is_flagged() {
        let linetypes = alloc::collections::BTreeMap::new();
        let dash = resolve_dash(Some("BYBLOCK"), None, &linetypes, None, 1.0, 1.0);
        assert!(matches!(dash, ResolvedDash::DashByBlock));
    }

    #[test]
    fn grayscale_applies_luminance() {
        let s = apply_color_scheme("#FF0000", &ColorScheme::Grayscale);
        assert_eq!(s, "#4C4C4C");
    }
}
