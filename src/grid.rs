/*
File: grid.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::error::{GridError, Result};
use crate::reader::{Operator, VlsvReader};
use ndarray::{Array2, Axis};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Spatial mesh as a VTK structured grid with one scalar per cell.
#[derive(Debug, Clone)]
pub struct StructuredGrid {
    pub mins: [f64; 3],
    pub maxs: [f64; 3],
    /// Node counts (cells + 1) per dimension.
    pub dimensions: [usize; 3],
    /// Node points, x varying fastest.
    pub points: Array2<f64>,
    /// Cell scalars sorted by cell id.
    pub scalars: Vec<f64>,
    pub scalars_name: String,
}

impl StructuredGrid {
    pub fn cells(&self) -> [usize; 3] {
        std::array::from_fn(|d| self.dimensions[d] - 1)
    }

    pub fn ncells(&self) -> usize {
        self.cells().iter().product()
    }

    pub fn npoints(&self) -> usize {
        self.points.nrows()
    }

    /// Scalar of the cell with this id, `None` for 0 or ids past the grid.
    pub fn cell_value(&self, cellid: u64) -> Option<f64> {
        cellid
            .checked_sub(1)
            .and_then(|i| self.scalars.get(i as usize).copied())
    }
}

/// Reorders file-order values into ascending cell id order.
pub fn sort_by_cellid(locations: &HashMap<u64, usize>, values: &[f64]) -> Result<Vec<f64>> {
    let mut order: Vec<(u64, usize)> = locations.iter().map(|(&c, &i)| (c, i)).collect();
    order.sort_unstable_by_key(|&(cid, _)| cid);
    order
        .into_iter()
        .map(|(_, row)| {
            values.get(row).copied().ok_or(GridError::ShapeMismatch {
                expected: row + 1,
                got: values.len(),
            })
        })
        .collect()
}

pub fn build_structured_grid(
    mins: [f64; 3],
    maxs: [f64; 3],
    cells: [usize; 3],
    datas: Vec<f64>,
    name: &str,
) -> Result<StructuredGrid> {
    let ncells: usize = cells.iter().product();
    if datas.len() != ncells {
        return Err(GridError::ShapeMismatch {
            expected: ncells,
            got: datas.len(),
        });
    }
    let dims: [usize; 3] = std::array::from_fn(|d| cells[d] + 1);
    let step: [f64; 3] = std::array::from_fn(|d| (maxs[d] - mins[d]) / cells[d].max(1) as f64);
    let mut points = Array2::<f64>::zeros((dims[0] * dims[1] * dims[2], 3));
    for (n, mut row) in points.axis_iter_mut(Axis(0)).enumerate() {
        let i = n % dims[0];
        let j = (n / dims[0]) % dims[1];
        let k = n / (dims[0] * dims[1]);
        row[0] = mins[0] + i as f64 * step[0];
        row[1] = mins[1] + j as f64 * step[1];
        row[2] = mins[2] + k as f64 * step[2];
    }
    Ok(StructuredGrid {
        mins,
        maxs,
        dimensions: dims,
        points,
        scalars: datas,
        scalars_name: name.to_string(),
    })
}

/// Reads `variable` for every cell and lays it on the spatial grid.
pub fn load_grid<R: VlsvReader + ?Sized>(
    reader: &R,
    variable: &str,
    operator: Operator,
) -> Result<StructuredGrid> {
    let (mins, maxs) = reader.spatial_extents()?;
    let cells = reader.spatial_cells()?;
    let locations = reader.cellid_locations();
    let values = reader.read_variable(variable, operator, None)?;
    let sorted = sort_by_cellid(&locations, &values)?;
    log::debug!(
        "grid {variable} ({operator}): {}x{}x{} cells",
        cells[0],
        cells[1],
        cells[2]
    );
    build_structured_grid(mins, maxs, cells, sorted, variable)
}

/// Grid construction either done inline or on one background thread.
#[derive(Debug)]
pub enum GridJob {
    Ready(Result<StructuredGrid>),
    Running(JoinHandle<Result<StructuredGrid>>),
}

impl GridJob {
    pub fn spawn<R>(reader: Arc<R>, variable: &str, operator: Operator, threaded: bool) -> Self
    where
        R: VlsvReader + Send + Sync + ?Sized + 'static,
    {
        if !threaded {
            return Self::Ready(load_grid(reader.as_ref(), variable, operator));
        }
        let variable = variable.to_string();
        Self::Running(std::thread::spawn(move || {
            load_grid(reader.as_ref(), &variable, operator)
        }))
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Self::Ready(_) => true,
            Self::Running(handle) => handle.is_finished(),
        }
    }

    pub fn join(self) -> Result<StructuredGrid> {
        match self {
            Self::Ready(grid) => grid,
            Self::Running(handle) => handle.join().map_err(|_| GridError::WorkerPanicked)?,
        }
    }
}
