// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Upstream AST contract and output data model.
//!
//! [`DxfData`] is the "parsed DXF AST" the rest of the pipeline consumes,
//! matching the upstream contract described in the import core's external
//! interfaces. [`Shape`], [`Layer`] and [`ImportResult`] are the output side.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A 2D point, optionally carrying a Z ordinate and a polyline bulge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DxfVector {
    /// X ordinate.
    pub x: f64,
    /// Y ordinate.
    pub y: f64,
    /// Z ordinate, when the source entity carried one.
    pub z: Option<f64>,
    /// Curvature to the following vertex in a polyline, `tan(theta/4)`.
    pub bulge: Option<f64>,
}

impl DxfVector {
    /// Make a bare 2D point with no Z or bulge.
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            bulge: None,
        }
    }
}

/// A point in the output shape coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    /// X ordinate.
    pub x: f64,
    /// Y ordinate.
    pub y: f64,
}

impl Point2 {
    /// Construct a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Color as carried by the AST, before [`crate::style`] resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DxfColor {
    /// AutoCAD Color Index; `0` = ByBlock, `256` = ByLayer, missing = ByLayer.
    Index(i16),
    /// 24-bit true color, `0xRRGGBB`.
    TrueColor(u32),
}

impl Default for DxfColor {
    fn default() -> Self {
        Self::Index(256)
    }
}

/// Per-kind geometry payload for a [`DxfEntity`].
#[derive(Debug, Clone)]
pub enum DxfEntityKind {
    /// Two-point line segment.
    Line { p1: DxfVector, p2: DxfVector },
    /// Lightweight polyline: 2D vertices with optional per-vertex bulge.
    LwPolyline { vertices: Vec<DxfVector>, closed: bool },
    /// Legacy polyline: vertices may carry a Z ordinate.
    Polyline { vertices: Vec<DxfVector>, closed: bool },
    /// NURBS/B-spline curve.
    Spline {
        degree: u8,
        control_points: Vec<DxfVector>,
        knots: Vec<f64>,
        weights: Vec<f64>,
        closed: bool,
    },
    /// Circle.
    Circle { center: DxfVector, radius: f64 },
    /// Circular arc, angles in degrees as read from the source entity.
    Arc {
        center: DxfVector,
        radius: f64,
        start_angle_deg: f64,
        end_angle_deg: f64,
    },
    /// Single-line text.
    Text {
        value: String,
        insertion: DxfVector,
        alignment: Option<DxfVector>,
        height: f64,
        rotation_deg: f64,
        oblique_deg: f64,
        width_factor: f64,
        style_name: String,
        h_align: TextHAlign,
        v_align: TextVAlign,
    },
    /// Multi-line text with inline formatting codes.
    MText {
        value: String,
        insertion: DxfVector,
        height: f64,
        rotation_deg: f64,
        width_factor: f64,
        style_name: String,
        attachment_point: u8,
        reference_width: f64,
    },
    /// Block attribute, geometrically identical to [`DxfEntityKind::Text`].
    Attrib {
        value: String,
        insertion: DxfVector,
        alignment: Option<DxfVector>,
        height: f64,
        rotation_deg: f64,
        oblique_deg: f64,
        width_factor: f64,
        style_name: String,
        h_align: TextHAlign,
        v_align: TextVAlign,
    },
    /// Block reference.
    Insert {
        block_name: String,
        location: DxfVector,
        x_scale: f64,
        y_scale: f64,
        rotation_deg: f64,
        row_count: u32,
        column_count: u32,
        row_spacing: f64,
        column_spacing: f64,
    },
    /// Synthetic closed polyline recovered from a solid `HATCH` by the
    /// raw-pass augmenter; rendered filled rather than stroked.
    HatchFill { loop_points: Vec<DxfVector> },
}

/// Horizontal text justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextHAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextVAlign {
    Baseline,
    #[default]
    Bottom,
    Middle,
    Top,
}

/// One drawing primitive from the AST.
#[derive(Debug, Clone)]
pub struct DxfEntity {
    /// Source handle, carried through purely for caller-side correlation.
    pub handle: u64,
    /// Per-kind geometry.
    pub kind: DxfEntityKind,
    /// Owning layer name.
    pub layer: String,
    /// ACI or true color.
    pub color: DxfColor,
    /// Named linetype, `None`/`"BYLAYER"` defers to the layer.
    pub line_type: Option<String>,
    /// Per-entity linetype scale multiplier.
    pub line_type_scale: f64,
    /// DXF lineweight enum value (hundredths of mm, or -1/-2/-3 sentinel).
    pub lineweight: i16,
    /// Whether this entity lives in paper space.
    pub in_paper_space: bool,
    /// ATTRIB children, only populated on `Insert` entities.
    pub attribs: Vec<DxfEntity>,
}

impl DxfEntity {
    /// Construct an entity with the common defaults (ByLayer color/lineweight,
    /// unit linetype scale, model space).
    pub fn new(kind: DxfEntityKind, layer: impl Into<String>) -> Self {
        Self {
            handle: 0,
            kind,
            layer: layer.into(),
            color: DxfColor::default(),
            line_type: None,
            line_type_scale: 1.0,
            lineweight: -1,
            in_paper_space: false,
            attribs: Vec::new(),
        }
    }
}

/// Reusable entity group referenced by `INSERT`.
#[derive(Debug, Clone, Default)]
pub struct DxfBlock {
    /// Block name, as referenced by `INSERT`.
    pub name: String,
    /// Base point subtracted before the insert transform is applied.
    pub base_point: DxfVector,
    /// Entities owned by the block, in declaration order.
    pub entities: Vec<DxfEntity>,
}

/// Layer table entry.
#[derive(Debug, Clone, Default)]
pub struct DxfLayerDef {
    /// Layer name.
    pub name: String,
    /// ACI color index, when present.
    pub color_index: Option<i16>,
    /// Derived RGB, when the source carried a true color.
    pub true_color: Option<u32>,
    /// Default linetype name.
    pub line_type: Option<String>,
    /// Default lineweight (DXF enum units), when present.
    pub lineweight: Option<i16>,
    /// Layer is frozen (excluded from the unit heuristic and rendering).
    pub frozen: bool,
    /// Layer is visible (the "layer on/off" flag).
    pub visible: bool,
}

/// Linetype table entry.
#[derive(Debug, Clone, Default)]
pub struct DxfLinetypeDef {
    /// Linetype name.
    pub name: String,
    /// Signed dash-pattern element lengths; negative means gap.
    pub pattern: Vec<f64>,
}

/// Text style table entry.
#[derive(Debug, Clone, Default)]
pub struct DxfStyleDef {
    /// Style name.
    pub name: String,
    /// Fixed text height; `0.0` means "use the entity's own height".
    pub fixed_text_height: f64,
    /// Width scale factor.
    pub width_factor: f64,
    /// Oblique angle in degrees.
    pub oblique_angle: f64,
    /// Primary font file name (often an `.shx` name).
    pub font_file: String,
}

/// Header variables relevant to the import pipeline.
#[derive(Debug, Clone, Default)]
pub struct DxfHeader {
    /// `$INSUNITS` code.
    pub insunits: Option<i16>,
    /// `$EXTMIN`.
    pub ext_min: Option<DxfVector>,
    /// `$EXTMAX`.
    pub ext_max: Option<DxfVector>,
    /// `$TEXTSIZE`.
    pub text_size: Option<f64>,
    /// `$LTSCALE`.
    pub lt_scale: Option<f64>,
    /// `$CELTSCALE`.
    pub cel_type_scale: Option<f64>,
}

/// The upstream AST this crate's pipeline operates on.
#[derive(Debug, Clone, Default)]
pub struct DxfData {
    /// Header variables.
    pub header: DxfHeader,
    /// Layer table, keyed by name.
    pub layers: BTreeMap<String, DxfLayerDef>,
    /// Linetype table, keyed by name.
    pub linetypes: BTreeMap<String, DxfLinetypeDef>,
    /// Text style table, keyed by name.
    pub styles: BTreeMap<String, DxfStyleDef>,
    /// Block table, keyed by name.
    pub blocks: BTreeMap<String, DxfBlock>,
    /// Top-level entities.
    pub entities: Vec<DxfEntity>,
}

/// Output shape discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Polyline,
    Circle,
    Text,
    Arrow,
    Rect,
}

/// Text attributes carried by a `Text`-kind [`Shape`].
#[derive(Debug, Clone)]
pub struct TextAttrs {
    /// Text content, already sanitized of inline formatting codes.
    pub content: String,
    /// Font size in drawing units.
    pub font_size: f64,
    /// Resolved generic font family (`"serif"`, `"monospace"`, `"sans-serif"`).
    pub font_family: &'static str,
    /// Italic iff the combined oblique angle exceeds 10 degrees.
    pub italic: bool,
    /// Rotation in radians.
    pub rotation: f64,
    /// Horizontal alignment.
    pub h_align: TextHAlign,
    /// Vertical alignment.
    pub v_align: TextVAlign,
    /// Horizontal scale, including the style's width factor.
    pub scale_x: f64,
    /// Vertical scale; sign conveys a Y-flip/mirror.
    pub scale_y: f64,
}

/// A renderer-agnostic drawing primitive.
#[derive(Debug, Clone)]
pub struct Shape {
    /// Unique id.
    pub id: String,
    /// Shape discriminant.
    pub kind: ShapeKind,
    /// Polyline/line vertices; empty for `text`/`circle`/`rect`.
    pub points: Vec<Point2>,
    /// Anchor X (circle/text/rect).
    pub x: f64,
    /// Anchor Y (circle/text/rect).
    pub y: f64,
    /// Circle radius.
    pub radius: f64,
    /// Rect width.
    pub width: f64,
    /// Rect height.
    pub height: f64,
    /// `#RRGGBB`, `"transparent"`, or the ByBlock placeholder.
    pub stroke_color: String,
    /// `#RRGGBB`, `"transparent"`, or the ByBlock placeholder.
    pub fill_color: String,
    /// Stroke width in display pixels.
    pub stroke_width: f64,
    /// Dash pattern; empty means continuous.
    pub stroke_dash: Vec<f64>,
    /// Whether the stroke is drawn.
    pub stroke_enabled: bool,
    /// Whether the fill is drawn.
    pub fill_enabled: bool,
    /// Text attributes, set iff `kind == ShapeKind::Text`.
    pub text: Option<TextAttrs>,
    /// Owning layer id.
    pub layer_id: String,
    /// Caller-supplied floor stamp.
    pub floor_id: Option<String>,
    /// Owning discipline; always `"architecture"` for this importer.
    pub discipline: &'static str,
}

/// Reserved sentinel standing in for an unresolved ByBlock color/fill.
pub const BYBLOCK_PLACEHOLDER: &str = "#BYBLOCK";

impl Shape {
    /// Build a blank shape with the common defaults used by every emitter.
    pub(crate) fn blank(kind: ShapeKind, layer_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            points: Vec::new(),
            x: 0.0,
            y: 0.0,
            radius: 0.0,
            width: 0.0,
            height: 0.0,
            stroke_color: String::from("#000000"),
            fill_color: String::from("transparent"),
            stroke_width: 1.0,
            stroke_dash: Vec::new(),
            stroke_enabled: true,
            fill_enabled: false,
            text: None,
            layer_id: layer_id.into(),
            floor_id: None,
            discipline: "architecture",
        }
    }
}

/// Editor-facing layer.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Unique id.
    pub id: String,
    /// Layer name.
    pub name: String,
    /// Default stroke color, `#RRGGBB`.
    pub stroke_color: String,
    /// Default fill color, `#RRGGBB` or `"transparent"`.
    pub fill_color: String,
    /// Visibility.
    pub visible: bool,
    /// Locked (read-only import option, or frozen source layer).
    pub locked: bool,
    /// Always `false`: DXF layers are never "native" editor layers.
    pub is_native: bool,
}

/// Aggregate import result.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    /// Emitted shapes, in AST iteration order.
    pub shapes: Vec<Shape>,
    /// Emitted layers, one per DXF layer table entry encountered.
    pub layers: Vec<Layer>,
    /// Bounding box width after normalization.
    pub width: f64,
    /// Bounding box height after normalization.
    pub height: f64,
    /// World origin before normalization (the subtracted minimum corner).
    pub origin: Point2,
}
