// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapts a parsed [`dxf::Drawing`] into this crate's own [`DxfData`] AST.
//!
//! Grounded on the teacher's `load_file_default_layers` drawing traversal
//! (`drawing.layers()`, `.styles()`, `.blocks()`, `.entities()`,
//! `recover_color_enum`); re-targeted to build a plain, renderer-agnostic
//! AST instead of populating a `GraphicsBag` directly.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use dxf::entities::EntityType;
use dxf::enums::Units;
use dxf::Drawing;

use crate::model::{
    DxfBlock, DxfColor, DxfData, DxfEntity, DxfEntityKind, DxfHeader, DxfLayerDef,
    DxfLinetypeDef, DxfStyleDef, DxfVector, TextHAlign, TextVAlign,
};

/// Recover a signed color-enum value from a [`dxf::Color`], the same
/// reconstruction the teacher does since `dxf::Color` doesn't expose this
/// directly: `0` ByBlock, `256` ByLayer, `257` ByEntity, `1..=255` indexed,
/// `-1` unresolvable.
fn recover_color_enum(c: &dxf::Color) -> i16 {
    if c.is_by_block() {
        0
    } else if c.is_by_layer() {
        256
    } else if c.is_by_entity() {
        257
    } else if let Some(index) = c.index() {
        index as i16
    } else {
        -1
    }
}

fn adapt_color(c: &dxf::Color, color_24_bit: i32) -> DxfColor {
    match recover_color_enum(c) {
        257 => DxfColor::TrueColor(color_24_bit as u32 & 0x00FF_FFFF),
        256 => DxfColor::Index(256),
        0 => DxfColor::Index(0),
        i @ 1..=255 => DxfColor::Index(i),
        _ => DxfColor::Index(256),
    }
}

/// `$INSUNITS` numeric code for a [`dxf::enums::Units`] value, matching the
/// values the DXF reference assigns to each unit (the `dxf` crate's own
/// enum variants are named after the same reference table).
fn units_to_insunits_code(u: Units) -> i16 {
    match u {
        Units::Unitless => 0,
        Units::Inches => 1,
        Units::Feet => 2,
        Units::Miles => 3,
        Units::Millimeters => 4,
        Units::Centimeters => 5,
        Units::Meters => 6,
        Units::Kilometers => 7,
        Units::Microinches => 8,
        Units::Mils => 9,
        Units::Yards => 10,
        Units::Angstroms => 11,
        Units::Nanometers => 12,
        Units::Microns => 13,
        Units::Decimeters => 14,
        Units::Decameters => 15,
        Units::Hectometers => 16,
        Units::Gigameters => 17,
        // Astronomical units and beyond have no meaningful conversion factor
        // in this importer's unit table; fall back to unitless.
        _ => 0,
    }
}

fn point_to_vector(p: &dxf::Point) -> DxfVector {
    DxfVector {
        x: p.x,
        y: p.y,
        z: Some(p.z),
        bulge: None,
    }
}

fn h_align_from_justification(h: dxf::enums::HorizontalTextJustification) -> TextHAlign {
    use dxf::enums::HorizontalTextJustification as H;
    match h {
        H::Left => TextHAlign::Left,
        H::Center | H::Middle | H::Fit => TextHAlign::Center,
        H::Right => TextHAlign::Right,
        _ => TextHAlign::Left,
    }
}

fn v_align_from_justification(v: dxf::enums::VerticalTextJustification) -> TextVAlign {
    use dxf::enums::VerticalTextJustification as V;
    match v {
        V::Baseline => TextVAlign::Baseline,
        V::Bottom => TextVAlign::Bottom,
        V::Middle => TextVAlign::Middle,
        V::Top => TextVAlign::Top,
        #[allow(unreachable_patterns, reason = "future-proof against new variants")]
        _ => TextVAlign::Bottom,
    }
}

fn adapt_entity_kind(e: &dxf::entities::Entity) -> Option<DxfEntityKind> {
    match &e.specific {
        EntityType::Line(l) => Some(DxfEntityKind::Line {
            p1: point_to_vector(&l.p1),
            p2: point_to_vector(&l.p2),
        }),
        EntityType::Circle(c) => Some(DxfEntityKind::Circle {
            center: point_to_vector(&c.center),
            radius: c.radius,
        }),
        EntityType::Arc(a) => Some(DxfEntityKind::Arc {
            center: point_to_vector(&a.center),
            radius: a.radius,
            start_angle_deg: a.start_angle,
            end_angle_deg: a.end_angle,
        }),
        EntityType::LwPolyline(lwp) => Some(DxfEntityKind::LwPolyline {
            vertices: lwp
                .vertices
                .iter()
                .map(|v| DxfVector {
                    x: v.x,
                    y: v.y,
                    z: None,
                    bulge: Some(v.bulge),
                })
                .collect(),
            closed: lwp.is_closed(),
        }),
        EntityType::Polyline(pl) => Some(DxfEntityKind::Polyline {
            vertices: pl
                .vertices()
                .map(|v| DxfVector {
                    x: v.location.x,
                    y: v.location.y,
                    z: Some(v.location.z),
                    bulge: Some(v.bulge),
                })
                .collect(),
            closed: pl.is_closed(),
        }),
        EntityType::Spline(s) => Some(DxfEntityKind::Spline {
            degree: s.degree_of_curve as u8,
            control_points: s.control_points.iter().map(point_to_vector).collect(),
            knots: s.knot_values.clone(),
            weights: if s.weight_values.is_empty() {
                alloc::vec![1.0; s.control_points.len()]
            } else {
                s.weight_values.clone()
            },
            closed: false,
        }),
        EntityType::Text(t) => Some(DxfEntityKind::Text {
            value: t.value.clone(),
            insertion: point_to_vector(&t.location),
            alignment: (t.second_alignment_point.x != 0.0 || t.second_alignment_point.y != 0.0)
                .then(|| point_to_vector(&t.second_alignment_point)),
            height: t.text_height,
            rotation_deg: t.rotation,
            oblique_deg: t.oblique_angle,
            width_factor: if t.relative_x_scale_factor == 0.0 {
                1.0
            } else {
                t.relative_x_scale_factor
            },
            style_name: t.text_style_name.clone(),
            h_align: h_align_from_justification(t.horizontal_text_justification),
            v_align: v_align_from_justification(t.vertical_text_justification),
        }),
        EntityType::Attribute(a) => Some(DxfEntityKind::Attrib {
            value: a.value.clone(),
            insertion: point_to_vector(&a.location),
            alignment: (a.alignment_point.x != 0.0 || a.alignment_point.y != 0.0)
                .then(|| point_to_vector(&a.alignment_point)),
            height: a.text_height,
            rotation_deg: a.rotation,
            oblique_deg: a.oblique_angle,
            width_factor: if a.relative_x_scale_factor == 0.0 {
                1.0
            } else {
                a.relative_x_scale_factor
            },
            style_name: a.text_style_name.clone(),
            h_align: h_align_from_justification(a.horizontal_text_justification),
            v_align: v_align_from_justification(a.vertical_text_justification),
        }),
        EntityType::MText(mt) => {
            let mut value = mt.text.clone();
            for ext in &mt.extended_text {
                value.push_str(ext);
            }
            Some(DxfEntityKind::MText {
                value,
                insertion: point_to_vector(&mt.insertion_point),
                height: mt.initial_text_height,
                rotation_deg: mt.rotation_angle,
                width_factor: 1.0,
                style_name: mt.text_style_name.clone(),
                attachment_point: mt.attachment_point as i16 as u8,
                reference_width: mt.reference_rectangle_width,
            })
        }
        EntityType::Insert(ins) => Some(DxfEntityKind::Insert {
            block_name: ins.name.clone(),
            location: point_to_vector(&ins.location),
            x_scale: ins.x_scale_factor,
            y_scale: ins.y_scale_factor,
            rotation_deg: ins.rotation,
            row_count: ins.row_count.max(1) as u32,
            column_count: ins.column_count.max(1) as u32,
            row_spacing: ins.row_spacing,
            column_spacing: ins.column_spacing,
        }),
        _ => None,
    }
}

fn adapt_entity(e: &dxf::entities::Entity) -> Option<DxfEntity> {
    let kind = adapt_entity_kind(e)?;
    let common = &e.common;
    let attribs = if let EntityType::Insert(ins) = &e.specific {
        ins.attributes.iter().filter_map(adapt_entity).collect()
    } else {
        Vec::new()
    };
    Some(DxfEntity {
        handle: common.handle.0,
        kind,
        layer: common.layer.clone(),
        color: adapt_color(&common.color, common.color_24_bit),
        line_type: if common.line_type_name.is_empty() {
            None
        } else {
            Some(common.line_type_name.clone())
        },
        line_type_scale: if common.line_type_scale == 0.0 {
            1.0
        } else {
            common.line_type_scale
        },
        lineweight: common.lineweight_enum_value,
        in_paper_space: common.is_in_paper_space,
        attribs,
    })
}

/// Translate a loaded [`dxf::Drawing`] into this crate's own AST.
pub(crate) fn adapt_drawing(drawing: &Drawing) -> DxfData {
    let mut layers = BTreeMap::new();
    for l in drawing.layers() {
        layers.insert(
            l.name.clone(),
            DxfLayerDef {
                name: l.name.clone(),
                color_index: l.color.index().map(|i| i as i16),
                true_color: None,
                line_type: if l.line_type_name.is_empty() {
                    None
                } else {
                    Some(l.line_type_name.clone())
                },
                lineweight: Some(l.line_weight.raw_value()),
                frozen: !l.is_layer_on || l.is_frozen,
                visible: l.is_layer_on,
            },
        );
    }

    let mut linetypes = BTreeMap::new();
    for lt in drawing.line_types() {
        linetypes.insert(
            lt.name.clone(),
            DxfLinetypeDef {
                name: lt.name.clone(),
                pattern: lt.dash_dot_space_lengths.clone(),
            },
        );
    }

    let mut styles = BTreeMap::new();
    for s in drawing.styles() {
        styles.insert(
            s.name.clone(),
            DxfStyleDef {
                name: s.name.clone(),
                fixed_text_height: s.text_height,
                width_factor: if s.width_factor == 0.0 {
                    1.0
                } else {
                    s.width_factor
                },
                oblique_angle: s.oblique_angle,
                font_file: s.primary_font_file_name.clone(),
            },
        );
    }

    let mut blocks = BTreeMap::new();
    for b in drawing.blocks() {
        blocks.insert(
            b.name.clone(),
            DxfBlock {
                name: b.name.clone(),
                base_point: point_to_vector(&b.base_point),
                entities: b.entities.iter().filter_map(adapt_entity).collect(),
            },
        );
    }

    let entities: Vec<DxfEntity> = drawing.entities().filter_map(adapt_entity).collect();

    let header = &drawing.header;
    let dxf_header = DxfHeader {
        insunits: Some(units_to_insunits_code(header.default_drawing_units)),
        ext_min: Some(point_to_vector(&header.minimum_drawing_extents)),
        ext_max: Some(point_to_vector(&header.maximum_drawing_extents)),
        text_size: (header.default_text_height != 0.0).then_some(header.default_text_height),
        lt_scale: (header.line_type_scale != 0.0).then_some(header.line_type_scale),
        cel_type_scale: (header.current_entity_line_type_scale != 0.0)
            .then_some(header.current_entity_line_type_scale),
    };

    DxfData {
        header: dxf_header,
        layers,
        linetypes,
        styles,
        blocks,
        entities,
    }
}

/// Total entity count across top-level entities and block contents, used
/// for the hard import-size guard before any processing begins.
pub(crate) fn count_entities(data: &DxfData) -> usize {
    let mut n = data.entities.len();
    for b in data.blocks.values() {
        n += b.entities.len();
    }
    n
}
