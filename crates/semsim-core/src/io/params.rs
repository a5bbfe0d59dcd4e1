//! Two-line parameter sidecar written next to every saved frame.
//!
//! ```text
//! focus=0.1 stigmator_x=0 stigmator_y=0 accelerating_voltage=15 working_distance=10 screen_halfwidth=57.15 magnification=1000 aperture_offset_x=0 aperture_offset_y=0
//! halfwidth_major_nm=1000 halfwidth_minor_nm=1000
//! ```
//!
//! Floats use Rust's shortest round-trip formatting, so parsing the file and
//! recomputing the kernel reproduces it exactly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::beam::{BeamKernel, BeamParameters};
use crate::consts::PARAMS_SIDECAR_SUFFIX;
use crate::error::{Result, SimError};
use crate::frame::Frame;
use crate::io::image_io::save_png;

const BEAM_KEYS: [&str; 9] = [
    "focus",
    "stigmator_x",
    "stigmator_y",
    "accelerating_voltage",
    "working_distance",
    "screen_halfwidth",
    "magnification",
    "aperture_offset_x",
    "aperture_offset_y",
];

const HALFWIDTH_KEYS: [&str; 2] = ["halfwidth_major_nm", "halfwidth_minor_nm"];

/// Contents of a parameter sidecar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamsRecord {
    pub beam: BeamParameters,
    pub halfwidth_major_nm: f64,
    pub halfwidth_minor_nm: f64,
}

impl ParamsRecord {
    pub fn new(beam: BeamParameters, kernel: &BeamKernel) -> Self {
        Self {
            beam,
            halfwidth_major_nm: kernel.halfwidth_major_nm,
            halfwidth_minor_nm: kernel.halfwidth_minor_nm,
        }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self::new(frame.beam, &frame.kernel)
    }
}

pub fn format_params(record: &ParamsRecord) -> String {
    let b = &record.beam;
    let values = [
        b.focus,
        b.stigmator_x,
        b.stigmator_y,
        b.accelerating_voltage,
        b.working_distance,
        b.screen_halfwidth,
        b.magnification,
        b.aperture_offset_x,
        b.aperture_offset_y,
    ];
    let line1 = join_pairs(&BEAM_KEYS, &values);
    let line2 = join_pairs(
        &HALFWIDTH_KEYS,
        &[record.halfwidth_major_nm, record.halfwidth_minor_nm],
    );
    format!("{line1}\n{line2}\n")
}

fn join_pairs(keys: &[&str], values: &[f64]) -> String {
    keys.iter()
        .zip(values)
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn parse_params(text: &str) -> Result<ParamsRecord> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() != 2 {
        return Err(SimError::ParamsFormat(format!(
            "expected 2 lines, found {}",
            lines.len()
        )));
    }

    let beam_values = parse_line(lines[0], &BEAM_KEYS, 1)?;
    let hw = parse_line(lines[1], &HALFWIDTH_KEYS, 2)?;

    let get = |key: &str| beam_values[key];
    Ok(ParamsRecord {
        beam: BeamParameters {
            focus: get("focus"),
            stigmator_x: get("stigmator_x"),
            stigmator_y: get("stigmator_y"),
            accelerating_voltage: get("accelerating_voltage"),
            working_distance: get("working_distance"),
            screen_halfwidth: get("screen_halfwidth"),
            magnification: get("magnification"),
            aperture_offset_x: get("aperture_offset_x"),
            aperture_offset_y: get("aperture_offset_y"),
        },
        halfwidth_major_nm: hw["halfwidth_major_nm"],
        halfwidth_minor_nm: hw["halfwidth_minor_nm"],
    })
}

/// Parse `key=value` tokens, requiring exactly `keys` with no extras.
fn parse_line(line: &str, keys: &[&str], number: usize) -> Result<HashMap<String, f64>> {
    let mut values = HashMap::new();
    for token in line.split_whitespace() {
        let (key, raw) = token.split_once('=').ok_or_else(|| {
            SimError::ParamsFormat(format!("line {number}: expected key=value, got '{token}'"))
        })?;
        if !keys.contains(&key) {
            return Err(SimError::ParamsFormat(format!(
                "line {number}: unknown key '{key}'"
            )));
        }
        let value: f64 = raw.parse().map_err(|_| {
            SimError::ParamsFormat(format!("line {number}: '{key}' has non-numeric value '{raw}'"))
        })?;
        if values.insert(key.to_string(), value).is_some() {
            return Err(SimError::ParamsFormat(format!(
                "line {number}: duplicate key '{key}'"
            )));
        }
    }
    if let Some(missing) = keys.iter().find(|k| !values.contains_key(**k)) {
        return Err(SimError::ParamsFormat(format!(
            "line {number}: missing key '{missing}'"
        )));
    }
    Ok(values)
}

/// Sidecar path for an image: `<dir>/<stem>_params.txt`.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    image_path.with_file_name(format!("{stem}{PARAMS_SIDECAR_SUFFIX}"))
}

pub fn write_params(record: &ParamsRecord, path: &Path) -> Result<()> {
    fs::write(path, format_params(record))?;
    Ok(())
}

pub fn read_params(path: &Path) -> Result<ParamsRecord> {
    let text = fs::read_to_string(path)?;
    parse_params(&text)
}

/// Write the frame as PNG plus its sidecar. Returns the sidecar path.
pub fn save_frame(frame: &Frame, image_path: &Path) -> Result<PathBuf> {
    save_png(&frame.data, image_path)?;
    let sidecar = sidecar_path(image_path);
    write_params(&ParamsRecord::from_frame(frame), &sidecar)?;
    Ok(sidecar)
}
