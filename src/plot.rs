/*
File: plot.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::cutthrough::VariableInfo;
use crate::error::{GridError, Result};
use crate::pitchangle::Histogram;
use plotters::prelude::*;
use std::path::Path;

const SIZE: (u32, u32) = (900, 600);

fn plot_err<E: std::fmt::Display>(e: E) -> GridError {
    GridError::Plot(e.to_string())
}

/// Finite (min, max) of the data, widened when flat.
fn value_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        return (lo - pad, hi + pad);
    }
    (lo, hi)
}

/// Bar chart of a weighted histogram as PNG.
pub fn save_histogram(hist: &Histogram, path: impl AsRef<Path>, title: &str, x_desc: &str) -> Result<()> {
    let (Some(&x0), Some(&x1)) = (hist.edges.first(), hist.edges.last()) else {
        return Err(GridError::ShapeMismatch {
            expected: 2,
            got: hist.edges.len(),
        });
    };
    let ymax = hist.counts.iter().copied().fold(0.0_f64, f64::max);
    let ymax = if ymax > 0.0 { ymax * 1.05 } else { 1.0 };

    let root = BitMapBackend::new(path.as_ref(), SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x0..x1, 0.0..ymax)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("avgs")
        .draw()
        .map_err(plot_err)?;
    chart
        .draw_series(hist.edges.windows(2).zip(hist.counts.iter()).map(|(e, &c)| {
            Rectangle::new([(e[0], 0.0), (e[1], c)], BLUE.mix(0.6).filled())
        }))
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    Ok(())
}

/// One panel per variable against distance along a cut.
pub fn plot_multiple_variables(
    distances: &[f64],
    variables: &[VariableInfo],
    path: impl AsRef<Path>,
) -> Result<()> {
    if variables.is_empty() {
        return Err(GridError::BadArgs("nothing to plot".to_string()));
    }
    if let Some(v) = variables.iter().find(|v| v.data.len() != distances.len()) {
        return Err(GridError::ShapeMismatch {
            expected: distances.len(),
            got: v.data.len(),
        });
    }
    let (d0, d1) = value_range(distances);
    let height = SIZE.1 / 2 * variables.len() as u32;
    let root = BitMapBackend::new(path.as_ref(), (SIZE.0, height.max(SIZE.1))).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((variables.len(), 1));

    for (panel, var) in panels.iter().zip(variables.iter()) {
        let (y0, y1) = value_range(&var.data);
        let y_desc = if var.units.is_empty() {
            var.label()
        } else {
            format!("{} [{}]", var.label(), var.units)
        };
        let mut chart = ChartBuilder::on(panel)
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(80)
            .build_cartesian_2d(d0..d1, y0..y1)
            .map_err(plot_err)?;
        chart
            .configure_mesh()
            .x_desc("distance")
            .y_desc(y_desc)
            .draw()
            .map_err(plot_err)?;
        chart
            .draw_series(LineSeries::new(
                distances.iter().copied().zip(var.data.iter().copied()),
                &RED,
            ))
            .map_err(plot_err)?;
    }
    root.present().map_err(plot_err)?;
    Ok(())
}
