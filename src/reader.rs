/*
File: reader.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::error::{GridError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use crate::mesh::{VelocityBlocks, VelocityMesh};

/// Vector to scalar reduction applied when reading a variable.
/// Numeric codes follow the reader backends: 0 pass, 1 x, 2 y, 3 z, 4 magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    Pass,
    X,
    Y,
    Z,
    Magnitude,
}

impl Operator {
    pub fn from_code(op: i32) -> Option<Self> {
        match op {
            0 => Some(Self::Pass),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            3 => Some(Self::Z),
            4 => Some(Self::Magnitude),
            _ => None,
        }
    }

    /// Reduces one cell's components. `Pass` only applies to scalars.
    pub fn reduce(&self, components: ArrayView1<f64>) -> Option<f64> {
        match self {
            Self::Pass => (components.len() == 1).then(|| components[0]),
            Self::X => components.get(0).copied(),
            Self::Y => components.get(1).copied(),
            Self::Z => components.get(2).copied(),
            Self::Magnitude => Some(components.iter().map(|c| c * c).sum::<f64>().sqrt()),
        }
    }
}

impl FromStr for Operator {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pass" | "0" => Ok(Self::Pass),
            "x" | "1" => Ok(Self::X),
            "y" | "2" => Ok(Self::Y),
            "z" | "3" => Ok(Self::Z),
            "magnitude" | "4" => Ok(Self::Magnitude),
            other => Err(GridError::UnknownOperator(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::Magnitude => "magnitude",
        };
        f.write_str(s)
    }
}

/// Data access to one open simulation file.
///
/// Implementors only need to expose what the file holds; grid building,
/// operators and the physics helpers are provided on top.
pub trait VlsvReader {
    fn read_parameter(&self, name: &str) -> Option<f64>;

    /// Cell id -> row of that cell in the variable arrays.
    fn cellid_locations(&self) -> HashMap<u64, usize>;

    /// Raw variable rows (cells x components). `None` cellids means every
    /// cell in file order.
    fn read_vectors(&self, name: &str, cellids: Option<&[u64]>) -> Option<Array2<f64>>;

    fn check_variable(&self, name: &str) -> bool;

    fn variable_units(&self, _name: &str) -> Option<String> {
        None
    }

    /// Cell containing the coordinates, 0 when outside the grid.
    fn cellid(&self, coordinates: [f64; 3]) -> u64;

    /// Cell centre.
    fn cell_coordinates(&self, cellid: u64) -> Option<[f64; 3]>;

    fn cells_with_blocks(&self, pop: &str) -> Vec<u64>;

    fn read_blocks(&self, cellid: u64, pop: &str) -> Option<VelocityBlocks>;

    fn velocity_mesh(&self, pop: &str) -> Option<VelocityMesh>;

    /// Brackets a burst of small reads; backends may keep the file open.
    fn optimize_open_file(&self) {}

    fn optimize_close_file(&self) {}

    fn parameter(&self, name: &str) -> Result<f64> {
        self.read_parameter(name)
            .ok_or_else(|| GridError::MissingParameter(name.to_string()))
    }

    /// (mins, maxs) of the spatial domain.
    fn spatial_extents(&self) -> Result<([f64; 3], [f64; 3])> {
        Ok((
            [
                self.parameter("xmin")?,
                self.parameter("ymin")?,
                self.parameter("zmin")?,
            ],
            [
                self.parameter("xmax")?,
                self.parameter("ymax")?,
                self.parameter("zmax")?,
            ],
        ))
    }

    fn spatial_cells(&self) -> Result<[usize; 3]> {
        Ok([
            self.parameter("xcells_ini")? as usize,
            self.parameter("ycells_ini")? as usize,
            self.parameter("zcells_ini")? as usize,
        ])
    }

    /// One scalar per cell with `operator` applied.
    fn read_variable(
        &self,
        name: &str,
        operator: Operator,
        cellids: Option<&[u64]>,
    ) -> Result<Vec<f64>> {
        let data = self
            .read_vectors(name, cellids)
            .ok_or_else(|| GridError::MissingVariable(name.to_string()))?;
        let ncomp = data.ncols();
        data.axis_iter(Axis(0))
            .map(|row| {
                operator.reduce(row).ok_or(GridError::ShapeMismatch {
                    expected: 1,
                    got: ncomp,
                })
            })
            .collect()
    }

    fn read_vector(&self, name: &str, cellid: u64) -> Result<Vec<f64>> {
        let data = self
            .read_vectors(name, Some(std::slice::from_ref(&cellid)))
            .ok_or_else(|| GridError::MissingVariable(name.to_string()))?;
        data.axis_iter(Axis(0))
            .next()
            .map(|row| row.to_vec())
            .ok_or(GridError::UnknownCell(cellid))
    }

    /// rho_v / rho, falling back to V for newer files.
    fn bulk_velocity(&self, cellid: u64) -> Result<[f64; 3]> {
        if self.check_variable("rho_v") && self.check_variable("rho") {
            let rho_v = self.read_vector("rho_v", cellid)?;
            let rho = self.read_vector("rho", cellid)?;
            let rho = rho.first().copied().unwrap_or(0.0);
            if rho != 0.0 && rho_v.len() == 3 {
                return Ok([rho_v[0] / rho, rho_v[1] / rho, rho_v[2] / rho]);
            }
        }
        let v = self.read_vector("V", cellid)?;
        to_triplet("V", &v)
    }

    /// B, falling back to B_vol.
    fn magnetic_field(&self, cellid: u64) -> Result<[f64; 3]> {
        let name = ["B", "B_vol"]
            .into_iter()
            .find(|n| self.check_variable(n))
            .ok_or_else(|| GridError::MissingVariable("B".to_string()))?;
        let b = self.read_vector(name, cellid)?;
        to_triplet(name, &b)
    }
}

fn to_triplet(name: &str, v: &[f64]) -> Result<[f64; 3]> {
    match v {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => {
            log::debug!("'{name}' is not a 3-vector");
            Err(GridError::ShapeMismatch {
                expected: 3,
                got: v.len(),
            })
        }
    }
}

/// Uniform spatial grid held in memory, with Vlasiator cell numbering
/// `1 + i + j*nx + k*nx*ny`.
#[derive(Debug, Default)]
pub struct MemoryReader {
    mins: [f64; 3],
    maxs: [f64; 3],
    cells: [usize; 3],
    parameters: HashMap<String, f64>,
    file_order: Vec<u64>,
    variables: HashMap<String, Array2<f64>>,
    units: HashMap<String, String>,
    meshes: HashMap<String, VelocityMesh>,
    blocks: HashMap<String, Vec<(u64, VelocityBlocks)>>,
    open_batches: AtomicUsize,
}

impl MemoryReader {
    pub fn new(mins: [f64; 3], maxs: [f64; 3], cells: [usize; 3]) -> Self {
        let parameters = [
            ("xmin", mins[0]),
            ("ymin", mins[1]),
            ("zmin", mins[2]),
            ("xmax", maxs[0]),
            ("ymax", maxs[1]),
            ("zmax", maxs[2]),
            ("xcells_ini", cells[0] as f64),
            ("ycells_ini", cells[1] as f64),
            ("zcells_ini", cells[2] as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let ncells = (cells[0] * cells[1] * cells[2]) as u64;
        Self {
            mins,
            maxs,
            cells,
            parameters,
            file_order: (1..=ncells).collect(),
            ..Default::default()
        }
    }

    pub fn ncells(&self) -> usize {
        self.file_order.len()
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) {
        self.parameters.insert(name.to_string(), value);
    }

    /// Reorders the cells as a writer with domain decomposition would.
    /// Must be a permutation of the cell ids and be called before adding variables.
    pub fn set_file_order(&mut self, order: Vec<u64>) -> Result<()> {
        let mut sorted = order.clone();
        sorted.sort_unstable();
        let expected: Vec<u64> = (1..=self.ncells() as u64).collect();
        if sorted != expected {
            return Err(GridError::ShapeMismatch {
                expected: expected.len(),
                got: order.len(),
            });
        }
        if !self.variables.is_empty() {
            return Err(GridError::BadArgs(
                "file order must be set before variables".to_string(),
            ));
        }
        self.file_order = order;
        Ok(())
    }

    pub fn file_order(&self) -> &[u64] {
        &self.file_order
    }

    /// Rows in file order.
    pub fn add_variable(&mut self, name: &str, data: Array2<f64>) -> Result<()> {
        if data.nrows() != self.ncells() {
            return Err(GridError::ShapeMismatch {
                expected: self.ncells(),
                got: data.nrows(),
            });
        }
        self.variables.insert(name.to_string(), data);
        Ok(())
    }

    pub fn add_scalar(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        let n = values.len();
        let data = Array2::from_shape_vec((n, 1), values).map_err(|_| GridError::ShapeMismatch {
            expected: self.ncells(),
            got: n,
        })?;
        self.add_variable(name, data)
    }

    pub fn add_vector(&mut self, name: &str, values: Vec<[f64; 3]>) -> Result<()> {
        let n = values.len();
        let flat: Vec<f64> = values.into_iter().flatten().collect();
        let data = Array2::from_shape_vec((n, 3), flat).map_err(|_| GridError::ShapeMismatch {
            expected: self.ncells(),
            got: n,
        })?;
        self.add_variable(name, data)
    }

    pub fn set_units(&mut self, name: &str, units: &str) {
        self.units.insert(name.to_string(), units.to_string());
    }

    pub fn add_population(&mut self, pop: &str, mesh: VelocityMesh) {
        self.meshes.insert(pop.to_string(), mesh);
        self.blocks.entry(pop.to_string()).or_default();
    }

    pub fn add_blocks(&mut self, pop: &str, cellid: u64, blocks: VelocityBlocks) -> Result<()> {
        if !self.file_order.contains(&cellid) {
            return Err(GridError::UnknownCell(cellid));
        }
        let list = self.blocks.entry(pop.to_string()).or_default();
        match list.iter_mut().find(|(cid, _)| *cid == cellid) {
            Some(entry) => entry.1 = blocks,
            None => list.push((cellid, blocks)),
        }
        Ok(())
    }

    /// Outstanding optimize_open_file calls.
    pub fn open_batches(&self) -> usize {
        self.open_batches.load(Ordering::Relaxed)
    }

    fn cell_size(&self) -> [f64; 3] {
        std::array::from_fn(|d| (self.maxs[d] - self.mins[d]) / self.cells[d] as f64)
    }
}

impl VlsvReader for MemoryReader {
    fn read_parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    fn cellid_locations(&self) -> HashMap<u64, usize> {
        self.file_order
            .iter()
            .enumerate()
            .map(|(row, &cid)| (cid, row))
            .collect()
    }

    fn read_vectors(&self, name: &str, cellids: Option<&[u64]>) -> Option<Array2<f64>> {
        let data = self.variables.get(name)?;
        let Some(cellids) = cellids else {
            return Some(data.clone());
        };
        let locations = self.cellid_locations();
        let rows = cellids
            .iter()
            .map(|cid| locations.get(cid).copied())
            .collect::<Option<Vec<usize>>>()
            .or_else(|| {
                log::warn!("'{name}' requested for a cell not in the grid");
                None
            })?;
        Some(data.select(Axis(0), &rows))
    }

    fn check_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    fn variable_units(&self, name: &str) -> Option<String> {
        self.units.get(name).cloned()
    }

    fn cellid(&self, coordinates: [f64; 3]) -> u64 {
        let dx = self.cell_size();
        let mut ijk = [0usize; 3];
        for d in 0..3 {
            let f = ((coordinates[d] - self.mins[d]) / dx[d]).floor();
            if !f.is_finite() || f < 0.0 || f >= self.cells[d] as f64 {
                return 0;
            }
            ijk[d] = f as usize;
        }
        1 + (ijk[0] + ijk[1] * self.cells[0] + ijk[2] * self.cells[0] * self.cells[1]) as u64
    }

    fn cell_coordinates(&self, cellid: u64) -> Option<[f64; 3]> {
        if cellid == 0 || cellid as usize > self.ncells() {
            return None;
        }
        let idx = (cellid - 1) as usize;
        let (nx, ny) = (self.cells[0], self.cells[1]);
        let ijk = [idx % nx, (idx / nx) % ny, idx / (nx * ny)];
        let dx = self.cell_size();
        Some(std::array::from_fn(|d| {
            self.mins[d] + (ijk[d] as f64 + 0.5) * dx[d]
        }))
    }

    fn cells_with_blocks(&self, pop: &str) -> Vec<u64> {
        self.blocks
            .get(pop)
            .map(|list| list.iter().map(|(cid, _)| *cid).collect())
            .unwrap_or_default()
    }

    fn read_blocks(&self, cellid: u64, pop: &str) -> Option<VelocityBlocks> {
        self.blocks
            .get(pop)?
            .iter()
            .find(|(cid, _)| *cid == cellid)
            .map(|(_, b)| b.clone())
    }

    fn velocity_mesh(&self, pop: &str) -> Option<VelocityMesh> {
        self.meshes.get(pop).cloned()
    }

    fn optimize_open_file(&self) {
        self.open_batches.fetch_add(1, Ordering::Relaxed);
    }

    fn optimize_close_file(&self) {
        let _ = self
            .open_batches
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}
