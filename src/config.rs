/*
File: config.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
//! Viewer settings. Every field has a default, so a JSON file only needs the
//! keys it changes, e.g. `{"variable": "B", "operator": "magnitude"}`.

use crate::error::Result;
use crate::reader::Operator;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Variable drawn on the spatial grid
    pub variable: String,

    pub operator: Operator,

    /// Particle population whose velocity space is picked
    pub population: String,

    /// Build the spatial grid on a background thread
    pub threaded: bool,

    /// Picks this close outside the domain are pulled inside
    pub pick_tolerance: f64,

    /// How far inside the boundary a pulled pick lands
    pub pick_nudge: f64,

    /// Pitch-angle histogram bins
    pub histogram_bins: usize,

    /// Contour levels of the velocity-space iso-surface
    pub iso_contours: Vec<f64>,

    pub iso_opacity: f64,

    /// Length of the B glyph vector (B is normalized first)
    pub b_vector_length: f64,

    pub b_glyph_scale: f64,

    /// Write pitch-angle histograms as PNG next to the other output
    pub save_plots: bool,

    /// Where VTK files and plots are written
    pub output_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            variable: "rho".to_string(),
            operator: Operator::Pass,
            population: "proton".to_string(),
            threaded: true,
            pick_tolerance: 15.0,
            pick_nudge: 1.0,
            histogram_bins: 50,
            iso_contours: vec![1e-15, 1e-14, 1e-12],
            iso_opacity: 0.3,
            b_vector_length: 8e12,
            b_glyph_scale: 1e5,
            save_plots: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ViewerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
