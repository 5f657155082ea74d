// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DXF import core.
//!
//! Ingests a DXF drawing and produces a normalized, renderer-agnostic scene
//! graph of shapes, layers, and extents (an [`model::ImportResult`]).
//!
//! The pipeline is six components, always run in this order:
//! Raw-Pass Augmenter ([`raw_pass`]) → Unit Resolver ([`units`]) and Style
//! Resolver ([`style`]) → Curve Tesselator ([`tesselate`]) and Entity
//! Processor ([`process`]), one pass per top-level entity → Extents
//! Normalizer ([`normalize`]).
//!
//! Only [`error::ImportError::SizeExceeded`] aborts an import; every other
//! malformed/unsupported condition is recovered and reported through
//! `tracing`.

extern crate alloc;

use alloc::string::ToString;
use alloc::vec::Vec;

pub mod model;

mod adapt;
mod aci_palette;
mod error;
mod floatfuncs;
mod matrix;
mod normalize;
mod process;
mod raw_pass;
mod style;
mod tesselate;
mod units;

pub use error::ImportError;
pub use process::ImportOptions;
pub use style::{ColorScheme, Theme};
pub use units::SourceUnitsOverride;

use model::{DxfData, ImportResult, Layer};

fn build_layers(data: &DxfData, options: &ImportOptions) -> Vec<Layer> {
    let mut layers: Vec<Layer> = data
        .layers
        .values()
        .map(|l| {
            let stroke_color = match (l.true_color, l.color_index) {
                (Some(rgb), _) => alloc::format!("#{:06X}", rgb & 0x00FF_FFFF),
                (None, Some(idx)) => style::aci_hex_for_layer(idx, options.theme),
                (None, None) => style::default_hex_for_theme(options.theme),
            };
            Layer {
                id: l.name.clone(),
                name: l.name.clone(),
                stroke_color,
                fill_color: "transparent".to_string(),
                visible: l.visible && !l.frozen,
                locked: options.read_only || l.frozen,
                is_native: false,
            }
        })
        .collect();

    if !data.layers.contains_key(&options.default_layer_id) {
        layers.push(Layer {
            id: options.default_layer_id.clone(),
            name: options.default_layer_id.clone(),
            stroke_color: style::default_hex_for_theme(options.theme),
            fill_color: "transparent".to_string(),
            visible: true,
            locked: options.read_only,
            is_native: false,
        });
    }

    layers
}

/// Run the import pipeline over an already-adapted [`DxfData`] AST.
///
/// This is the core entry point with no I/O: the `std`-feature wrappers
/// below parse a DXF file/reader into a [`dxf::Drawing`], adapt it via
/// [`adapt::adapt_drawing`], and call this.
#[tracing::instrument(skip_all)]
pub fn import(data: DxfData, options: &ImportOptions) -> Result<ImportResult, ImportError> {
    let count = adapt::count_entities(&data);
    if count > process::ENTITY_LIMIT {
        return Err(ImportError::SizeExceeded {
            count,
            limit: process::ENTITY_LIMIT,
        });
    }

    let global_scale = units::resolve_global_scale(
        &data,
        options.source_units,
        options.include_paper_space,
        options.unitless_heuristic_threshold,
    );

    let mut shapes = process::process_all(&data, options, global_scale);
    let extents = normalize::normalize(&mut shapes);
    let layers = build_layers(&data, options);

    if let Some(floor_id) = &options.floor_id {
        for shape in &mut shapes {
            shape.floor_id = Some(floor_id.clone());
        }
    }

    Ok(ImportResult {
        shapes,
        layers,
        width: extents.width,
        height: extents.height,
        origin: extents.origin,
    })
}

#[cfg(feature = "std")]
mod std_entry {
    use super::{adapt, import, raw_pass, ImportError, ImportOptions, ImportResult};
    use std::io::Read;
    use std::path::Path;

    fn import_bytes(bytes: &[u8], options: &ImportOptions) -> Result<ImportResult, ImportError> {
        let drawing = dxf::Drawing::load(&mut &bytes[..])?;
        let mut data = adapt::adapt_drawing(&drawing);
        let text = String::from_utf8_lossy(bytes);
        raw_pass::augment(&text, &mut data);
        import(data, options)
    }

    /// Parse and import a DXF file from disk, recovering entities the
    /// structured parser dropped via a raw-text pass over the same bytes.
    #[tracing::instrument(skip_all)]
    pub fn import_file(
        path: impl AsRef<Path>,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let bytes = std::fs::read(path)?;
        import_bytes(&bytes, options)
    }

    /// Parse and import a DXF drawing from an arbitrary reader.
    #[tracing::instrument(skip_all)]
    pub fn import_reader<R: Read>(
        mut reader: R,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        import_bytes(&bytes, options)
    }
}

#[cfg(feature = "std")]
pub use std_entry::{import_file, import_reader};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DxfBlock, DxfColor, DxfEntity, DxfEntityKind, DxfLinetypeDef, DxfVector, ShapeKind,
    };

    fn line(layer: &str, p1: (f64, f64), p2: (f64, f64)) -> DxfEntity {
        DxfEntity::new(
            DxfEntityKind::Line {
                p1: DxfVector::xy(p1.0, p1.1),
                p2: DxfVector::xy(p2.0, p2.1),
            },
            layer,
        )
    }

    #[test]
    fn basic_line_auto_meters_heuristic() {
        let mut data = DxfData::default();
        data.entities.push(line("0", (0.0, 0.0), (10.0, 0.0)));
        let result = import(data, &ImportOptions::default()).unwrap();
        assert_eq!(result.shapes.len(), 1);
        assert_eq!(
            result.shapes[0].points,
            alloc::vec![model::Point2::new(0.0, 0.0), model::Point2::new(1000.0, 0.0)]
        );
    }

    #[test]
    fn coordinate_normalization() {
        let mut data = DxfData::default();
        data.header.insunits = Some(5); // centimeters: scale stays 1.0
        data.entities
            .push(line("0", (10_000.0, 10_000.0), (11_000.0, 11_000.0)));
        let result = import(data, &ImportOptions::default()).unwrap();
        assert_eq!(result.origin, model::Point2::new(10_000.0, 10_000.0));
        assert_eq!(result.width, 1000.0);
        assert_eq!(result.height, 1000.0);
        assert_eq!(
            result.shapes[0].points,
            alloc::vec![model::Point2::new(0.0, 0.0), model::Point2::new(1000.0, 1000.0)]
        );
    }

    #[test]
    fn byblock_inheritance_in_insert_order() {
        let mut data = DxfData::default();
        data.header.insunits = Some(5);
        let mut block = DxfBlock {
            name: "Box".to_string(),
            base_point: DxfVector::xy(0.0, 0.0),
            entities: Vec::new(),
        };
        block
            .entities
            .push(line("0", (0.0, 0.0), (1.0, 0.0)));
        block.entities[0].color = DxfColor::Index(0);
        data.blocks.insert("Box".to_string(), block);

        let mk_insert = |color: DxfColor| {
            let mut e = DxfEntity::new(
                DxfEntityKind::Insert {
                    block_name: "Box".to_string(),
                    location: DxfVector::xy(0.0, 0.0),
                    x_scale: 1.0,
                    y_scale: 1.0,
                    rotation_deg: 0.0,
                    row_count: 1,
                    column_count: 1,
                    row_spacing: 0.0,
                    column_spacing: 0.0,
                },
                "0",
            );
            e.color = color;
            e
        };
        data.entities.push(mk_insert(DxfColor::Index(1)));
        data.entities.push(mk_insert(DxfColor::Index(5)));

        let result = import(data, &ImportOptions::default()).unwrap();
        assert_eq!(result.shapes.len(), 2);
        assert_eq!(result.shapes[0].stroke_color, "#FF0000");
        assert_eq!(result.shapes[1].stroke_color, "#0000FF");
    }

    #[test]
    fn dashed_linetype_produces_stroke_dash() {
        let mut data = DxfData::default();
        data.header.insunits = Some(5);
        data.linetypes.insert(
            "DASHED".to_string(),
            DxfLinetypeDef {
                name: "DASHED".to_string(),
                pattern: alloc::vec![10.0, -5.0],
            },
        );
        let mut e = line("0", (0.0, 0.0), (100.0, 0.0));
        e.line_type = Some("DASHED".to_string());
        data.entities.push(e);

        let result = import(data, &ImportOptions::default()).unwrap();
        assert_eq!(result.shapes[0].stroke_dash, alloc::vec![10.0, 5.0]);
    }

    #[test]
    fn circle_uniform_scale_fast_path() {
        let mut data = DxfData::default();
        data.entities.push(line("0", (0.0, 0.0), (10.0, 0.0)));
        let mut circle = DxfEntity::new(
            DxfEntityKind::Circle {
                center: DxfVector::xy(50.0, 50.0),
                radius: 10.0,
            },
            "0",
        );
        circle.color = DxfColor::Index(256);
        data.entities.push(circle);

        let result = import(data, &ImportOptions::default()).unwrap();
        let circle_shape = result
            .shapes
            .iter()
            .find(|s| s.kind == ShapeKind::Circle)
            .unwrap();
        assert_eq!(circle_shape.radius, 1000.0);
    }

    #[test]
    fn insert_cycle_is_tolerated() {
        let mut data = DxfData::default();
        data.header.insunits = Some(5);

        let mk_insert = |name: &str| {
            DxfEntity::new(
                DxfEntityKind::Insert {
                    block_name: name.to_string(),
                    location: DxfVector::xy(0.0, 0.0),
                    x_scale: 1.0,
                    y_scale: 1.0,
                    rotation_deg: 0.0,
                    row_count: 1,
                    column_count: 1,
                    row_spacing: 0.0,
                    column_spacing: 0.0,
                },
                "0",
            )
        };

        data.blocks.insert(
            "A".to_string(),
            DxfBlock {
                name: "A".to_string(),
                base_point: DxfVector::xy(0.0, 0.0),
                entities: alloc::vec![line("0", (0.0, 0.0), (1.0, 0.0)), mk_insert("B")],
            },
        );
        data.blocks.insert(
            "B".to_string(),
            DxfBlock {
                name: "B".to_string(),
                base_point: DxfVector::xy(0.0, 0.0),
                entities: alloc::vec![mk_insert("A")],
            },
        );
        data.entities.push(mk_insert("A"));

        let result = import(data, &ImportOptions::default()).unwrap();
        assert_eq!(result.shapes.len(), 1);
    }

    #[test]
    fn entity_cap_is_enforced() {
        let mut data = DxfData::default();
        for _ in 0..(process::ENTITY_LIMIT + 1) {
            data.entities.push(line("0", (0.0, 0.0), (1.0, 0.0)));
        }
        let err = import(data, &ImportOptions::default()).unwrap_err();
        match err {
            ImportError::SizeExceeded { count, limit } => {
                assert_eq!(limit, process::ENTITY_LIMIT);
                assert_eq!(count, process::ENTITY_LIMIT + 1);
            }
            other => panic!("expected SizeExceeded, got {other:?}"),
        }
    }
}
