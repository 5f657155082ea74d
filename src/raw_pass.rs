// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raw-Pass Augmenter.
//!
//! Scans the source text as bare group-code/value pairs, independent of the
//! structured `dxf` parser, and appends entities the structured AST is
//! missing: solid-fill `HATCH` boundaries (which the `dxf` crate surfaces
//! as boundary-path data this crate doesn't otherwise consume) and `POLYLINE`
//! / `VERTEX` / `SEQEND` runs that the structured parser dropped because of
//! a malformed field somewhere in the entity. Grounded in the group-code
//! scanning style of `other_examples/6d769c79_harborgrid-justin-caddy`'s
//! `DxfParser::read_section`, but scanning the whole file rather than
//! buffering per-section, and never failing: a malformed group or stray
//! EOF just truncates the scan.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::model::{DxfData, DxfEntity, DxfEntityKind, DxfVector};

#[derive(Debug, Clone)]
struct CodePair {
    code: i32,
    value: String,
}

fn scan_pairs(text: &str) -> Vec<CodePair> {
    let mut lines = text.lines();
    let mut pairs = Vec::new();
    loop {
        let Some(code_line) = lines.next() else {
            break;
        };
        let Ok(code) = code_line.trim().parse::<i32>() else {
            continue;
        };
        let Some(value_line) = lines.next() else {
            break;
        };
        pairs.push(CodePair {
            code,
            value: value_line.trim().to_string(),
        });
    }
    pairs
}

/// A handful of the fields common to every entity this pass recovers.
#[derive(Debug, Default)]
struct CommonFields {
    layer: String,
}

fn read_common(code: i32, value: &str, common: &mut CommonFields) -> bool {
    if code == 8 {
        common.layer = value.to_string();
        true
    } else {
        false
    }
}

/// Recover a solid-fill `HATCH`'s boundary loops as closed polylines.
///
/// Scans the entity's group pairs up to the next `0` marker, first checking
/// the pattern name (code 2): non-`SOLID` patterns are left unrecovered.
/// Within the span, code 91 gives the loop count (informational), 92 opens
/// a loop, 93 gives its edge count (informational), and 72 selects the
/// edge type for what follows. Only edge type 1 (line) is recovered: its
/// two points (codes 10/20 then 11/21) are read, appending the start only
/// when it doesn't coincide with the previous edge's end (squared distance
/// above `1e-12`) so a closed loop's shared vertices aren't duplicated.
/// Other edge types (arc, ellipse, spline) are skipped conservatively by
/// scanning to the next edge or loop boundary. Each loop that collects at
/// least 3 points becomes its own closed polyline entity.
fn recover_hatch(pairs: &[CodePair], i: &mut usize) -> Vec<DxfEntity> {
    let start = *i;
    let mut end = start;
    while end < pairs.len() && pairs[end].code != 0 {
        end += 1;
    }
    let span = &pairs[start..end];
    *i = end;

    let mut common = CommonFields::default();
    let mut pattern_name = String::new();
    for p in span {
        if read_common(p.code, &p.value, &mut common) {
            continue;
        }
        if p.code == 2 && pattern_name.is_empty() {
            pattern_name = p.value.clone();
        }
    }
    if !pattern_name.eq_ignore_ascii_case("SOLID") {
        return Vec::new();
    }

    let mut loops: Vec<Vec<DxfVector>> = Vec::new();
    let mut current_loop: Vec<DxfVector> = Vec::new();
    let mut last_point: Option<DxfVector> = None;
    let mut j = 0usize;
    while j < span.len() {
        match span[j].code {
            92 => {
                if current_loop.len() >= 3 {
                    loops.push(core::mem::take(&mut current_loop));
                } else {
                    current_loop.clear();
                }
                last_point = None;
                j += 1;
            }
            72 => {
                let edge_type = span[j].value.parse::<i32>().unwrap_or(0);
                j += 1;
                let edge_start = j;
                while j < span.len() && !matches!(span[j].code, 72 | 92) {
                    j += 1;
                }
                if edge_type == 1 {
                    let edge = &span[edge_start..j];
                    let mut x1 = None;
                    let mut y1 = None;
                    let mut x2 = None;
                    let mut y2 = None;
                    for p in edge {
                        match p.code {
                            10 => x1 = p.value.parse::<f64>().ok(),
                            20 => y1 = p.value.parse::<f64>().ok(),
                            11 => x2 = p.value.parse::<f64>().ok(),
                            21 => y2 = p.value.parse::<f64>().ok(),
                            _ => {}
                        }
                    }
                    if let (Some(x1), Some(y1)) = (x1, y1) {
                        let start_point = DxfVector::xy(x1, y1);
                        let dedup = last_point.is_some_and(|lp| {
                            let dx = start_point.x - lp.x;
                            let dy = start_point.y - lp.y;
                            dx * dx + dy * dy <= 1e-12
                        });
                        if !dedup {
                            current_loop.push(start_point);
                        }
                    }
                    if let (Some(x2), Some(y2)) = (x2, y2) {
                        let end_point = DxfVector::xy(x2, y2);
                        current_loop.push(end_point);
                        last_point = Some(end_point);
                    }
                }
                // Unsupported edge types (arc/ellipse/spline) are skipped:
                // their fields were scanned over above without contributing
                // points.
            }
            _ => j += 1,
        }
    }
    if current_loop.len() >= 3 {
        loops.push(current_loop);
    }

    loops
        .into_iter()
        .map(|loop_points| DxfEntity::new(DxfEntityKind::HatchFill { loop_points }, common.layer.clone()))
        .collect()
}

/// Recover a loose `POLYLINE` ... `VERTEX`* ... `SEQEND` run that the
/// structured parser rejected outright.
fn recover_loose_polyline(pairs: &[CodePair], i: &mut usize) -> Option<DxfEntity> {
    let mut common = CommonFields::default();
    let mut closed = false;

    while *i < pairs.len() && pairs[*i].code != 0 {
        let p = &pairs[*i];
        if !read_common(p.code, &p.value, &mut common) && p.code == 70 {
            if let Ok(flags) = p.value.parse::<i32>() {
                closed = flags & 1 != 0;
            }
        }
        *i += 1;
    }

    let mut vertices = Vec::new();
    loop {
        if *i >= pairs.len() || pairs[*i].code != 0 {
            return None;
        }
        match pairs[*i].value.as_str() {
            "VERTEX" => {
                *i += 1;
                let mut x = None;
                let mut y = None;
                let mut bulge = 0.0;
                while *i < pairs.len() && pairs[*i].code != 0 {
                    let p = &pairs[*i];
                    match p.code {
                        10 => x = p.value.parse::<f64>().ok(),
                        20 => y = p.value.parse::<f64>().ok(),
                        42 => bulge = p.value.parse::<f64>().unwrap_or(0.0),
                        _ => {}
                    }
                    *i += 1;
                }
                if let (Some(x), Some(y)) = (x, y) {
                    vertices.push(DxfVector {
                        x,
                        y,
                        z: None,
                        bulge: Some(bulge),
                    });
                }
            }
            "SEQEND" => {
                *i += 1;
                while *i < pairs.len() && pairs[*i].code != 0 {
                    *i += 1;
                }
                break;
            }
            _ => return None,
        }
    }

    if vertices.len() < 2 {
        return None;
    }

    Some(DxfEntity::new(
        DxfEntityKind::Polyline { vertices, closed },
        common.layer,
    ))
}

/// Scan `text` for entities the structured `dxf` parse is known to miss and
/// append them to `data.entities` (or, for sequences found inside a block
/// definition, to that block's own entity list). Never returns an error:
/// anything it can't make sense of is simply skipped.
///
/// Tracks the enclosing `SECTION` name and, within a `BLOCKS` section, the
/// name of the block currently being defined (code 2 on the `BLOCK`
/// marker), so recovered entities land where they belong: `HATCH` recovery
/// only runs in the `ENTITIES` section, and a recovered `POLYLINE` is
/// attached to the block it was found in rather than always landing at the
/// top level.
pub(crate) fn augment(text: &str, data: &mut DxfData) {
    let pairs = scan_pairs(text);
    let mut i = 0;
    let mut recovered = 0usize;
    let mut section: Option<String> = None;
    let mut current_block: Option<String> = None;

    while i < pairs.len() {
        if pairs[i].code == 0 {
            match pairs[i].value.as_str() {
                "SECTION" => {
                    section = pairs.get(i + 1).filter(|p| p.code == 2).map(|p| p.value.clone());
                }
                "ENDSEC" => {
                    section = None;
                }
                "BLOCK" => {
                    let block_start = i;
                    i += 1;
                    let mut name = None;
                    while i < pairs.len() && pairs[i].code != 0 {
                        if pairs[i].code == 2 && name.is_none() {
                            name = Some(pairs[i].value.clone());
                        }
                        i += 1;
                    }
                    current_block = name;
                    i = block_start;
                }
                "ENDBLK" => {
                    current_block = None;
                }
                "HATCH" if section.as_deref() == Some("ENTITIES") => {
                    i += 1;
                    let entities = recover_hatch(&pairs, &mut i);
                    if !entities.is_empty() {
                        recovered += entities.len();
                        data.entities.extend(entities);
                        continue;
                    }
                }
                "POLYLINE" => {
                    let start = i;
                    i += 1;
                    if let Some(e) = recover_loose_polyline(&pairs, &mut i) {
                        let attached = match &current_block {
                            Some(name) => data.blocks.get_mut(name).map(|b| b.entities.push(e)).is_some(),
                            None => {
                                data.entities.push(e);
                                true
                            }
                        };
                        if attached {
                            recovered += 1;
                        }
                        continue;
                    }
                    i = start + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }

    if recovered > 0 {
        tracing::debug!(recovered, "raw-pass augmenter recovered entities");
    }
}
