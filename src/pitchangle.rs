/*
File: pitchangle.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::error::{GridError, Result};
use crate::reader::VlsvReader;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchAngleOptions {
    /// Return cos(alpha) instead of alpha in degrees.
    pub cosine: bool,
    /// Measure velocities relative to the bulk flow.
    pub plasma_frame: bool,
}

impl Default for PitchAngleOptions {
    fn default() -> Self {
        Self {
            cosine: true,
            plasma_frame: false,
        }
    }
}

/// Pitch angle of every velocity cell of one spatial cell, with the avgs
/// value to weight it by.
#[derive(Debug, Clone)]
pub struct PitchAngles {
    pub cellid: u64,
    pub values: Vec<f64>,
    pub avgs: Vec<f64>,
    pub units: &'static str,
}

impl PitchAngles {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// avgs-weighted histogram; cosines are binned over [-1, 1] and degrees
    /// over [0, 180].
    pub fn histogram(&self, bins: usize) -> Histogram {
        let range = if self.units == "degree" {
            (0.0, 180.0)
        } else {
            (-1.0, 1.0)
        };
        Histogram::weighted(&self.values, &self.avgs, bins, Some(range))
    }
}

pub fn pitch_angles<R: VlsvReader + ?Sized>(
    reader: &R,
    cellid: u64,
    pop: &str,
    options: PitchAngleOptions,
) -> Result<PitchAngles> {
    let blocks = reader
        .read_blocks(cellid, pop)
        .filter(|b| !b.is_empty())
        .ok_or(GridError::NoVelocityBlocks(cellid))?;
    let mesh = reader
        .velocity_mesh(pop)
        .ok_or_else(|| GridError::MissingVelocityMesh(pop.to_string()))?;

    let b = reader.magnetic_field(cellid)?;
    let b_norm = norm(&b);
    if b_norm == 0.0 || !b_norm.is_finite() {
        return Err(GridError::ZeroMagneticField(cellid));
    }
    let b_unit = [b[0] / b_norm, b[1] / b_norm, b[2] / b_norm];
    let frame = if options.plasma_frame {
        reader.bulk_velocity(cellid)?
    } else {
        [0.0; 3]
    };

    let (vcellids, avgs): (Vec<u64>, Vec<f64>) = blocks.velocity_cells().unzip();
    let coords = mesh
        .velocity_cell_coordinates(&vcellids)
        .ok_or_else(|| GridError::InvalidBlock(vcellids.first().copied().unwrap_or(0)))?;

    let (values, avgs): (Vec<f64>, Vec<f64>) = coords
        .par_iter()
        .zip(avgs.par_iter())
        .filter_map(|(v, &f)| {
            let v = [v[0] - frame[0], v[1] - frame[1], v[2] - frame[2]];
            let v_norm = norm(&v);
            if v_norm == 0.0 {
                return None;
            }
            let cos = ((v[0] * b_unit[0] + v[1] * b_unit[1] + v[2] * b_unit[2]) / v_norm)
                .clamp(-1.0, 1.0);
            let value = if options.cosine {
                cos
            } else {
                cos.acos().to_degrees()
            };
            Some((value, f))
        })
        .unzip();

    Ok(PitchAngles {
        cellid,
        values,
        avgs,
        units: if options.cosine { "" } else { "degree" },
    })
}

#[inline]
fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Equal-width weighted histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// bins + 1 edges
    pub edges: Vec<f64>,
    pub counts: Vec<f64>,
}

impl Histogram {
    /// Values outside `range` and non-finite values are dropped. Without a
    /// range the data min/max is used. The upper edge belongs to the last bin.
    pub fn weighted(values: &[f64], weights: &[f64], bins: usize, range: Option<(f64, f64)>) -> Self {
        let bins = bins.max(1);
        let pairs = values
            .iter()
            .zip(weights.iter())
            .filter(|(v, w)| v.is_finite() && w.is_finite());
        let (lo, hi) = range.unwrap_or_else(|| {
            pairs.clone().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (&v, _)| {
                (lo.min(v), hi.max(v))
            })
        });
        let (lo, hi) = if !lo.is_finite() || !hi.is_finite() {
            (0.0, 1.0)
        } else if lo == hi {
            (lo - 0.5, hi + 0.5)
        } else {
            (lo, hi)
        };
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0.0; bins];
        for (&v, &w) in pairs {
            if v < lo || v > hi {
                continue;
            }
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += w;
        }
        Self { edges, counts }
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }
}
