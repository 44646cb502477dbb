/*
File: mesh.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.

Velocity space as an unstructured grid. Every velocity cell of every stored
block becomes one VTK voxel; shared corner nodes are emitted once.
*/
use crate::error::{GridError, Result};
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use std::collections::HashMap;

/// VTK_VOXEL cell type id.
pub const VTK_VOXEL: u8 = 11;

/// Corner offsets in VTK voxel point order.
const VOXEL_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [0, 1, 0],
    [1, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [0, 1, 1],
    [1, 1, 1],
];

/// Geometry of one population's velocity mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityMesh {
    pub vmin: [f64; 3],
    pub vmax: [f64; 3],
    pub blocks_per_dim: [usize; 3],
    pub wid: usize,
}

impl VelocityMesh {
    pub const DEFAULT_WID: usize = 4;

    pub fn new(vmin: [f64; 3], vmax: [f64; 3], blocks_per_dim: [usize; 3]) -> Self {
        Self {
            vmin,
            vmax,
            blocks_per_dim,
            wid: Self::DEFAULT_WID,
        }
    }

    pub fn with_wid(mut self, wid: usize) -> Self {
        self.wid = wid;
        self
    }

    #[inline]
    pub fn cells_per_block(&self) -> usize {
        self.wid.pow(3)
    }

    #[inline]
    pub fn total_blocks(&self) -> u64 {
        self.blocks_per_dim.iter().map(|&n| n as u64).product()
    }

    /// Size of one velocity cell.
    pub fn cell_size(&self) -> [f64; 3] {
        std::array::from_fn(|d| {
            (self.vmax[d] - self.vmin[d]) / (self.blocks_per_dim[d] * self.wid) as f64
        })
    }

    pub fn block_indices(&self, block: u64) -> Option<[usize; 3]> {
        if block >= self.total_blocks() {
            return None;
        }
        let [mx, my, _] = self.blocks_per_dim;
        let id = block as usize;
        let plane = mx * my;
        Some([id % mx, (id % plane) / mx, id / plane])
    }

    pub fn block_id(&self, ijk: [usize; 3]) -> Option<u64> {
        let [mx, my, mz] = self.blocks_per_dim;
        (ijk[0] < mx && ijk[1] < my && ijk[2] < mz)
            .then(|| (ijk[0] + mx * (ijk[1] + my * ijk[2])) as u64)
    }

    /// Local cell id -> (i, j, k) inside a block, `local = i + WID*(j + WID*k)`.
    #[inline]
    pub fn local_indices(&self, local: usize) -> [usize; 3] {
        let w = self.wid;
        [local % w, (local / w) % w, local / (w * w)]
    }

    /// Global velocity cell index of a cell inside a block.
    pub fn cell_indices(&self, block: u64, local: usize) -> Option<[usize; 3]> {
        if local >= self.cells_per_block() {
            return None;
        }
        let b = self.block_indices(block)?;
        let l = self.local_indices(local);
        Some(std::array::from_fn(|d| b[d] * self.wid + l[d]))
    }

    /// Centre of a velocity cell given its global id `block*WID^3 + local`.
    pub fn cell_coordinates(&self, vcellid: u64) -> Option<[f64; 3]> {
        let wid3 = self.cells_per_block() as u64;
        let ijk = self.cell_indices(vcellid / wid3, (vcellid % wid3) as usize)?;
        let dv = self.cell_size();
        Some(std::array::from_fn(|d| {
            self.vmin[d] + (ijk[d] as f64 + 0.5) * dv[d]
        }))
    }

    pub fn velocity_cell_coordinates(&self, vcellids: &[u64]) -> Option<Vec<[f64; 3]>> {
        vcellids
            .par_iter()
            .map(|&v| self.cell_coordinates(v))
            .collect()
    }
}

/// Velocity blocks of one spatial cell: ids plus `nblocks x WID^3` avgs.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityBlocks {
    block_ids: Vec<u64>,
    avgs: Array2<f64>,
}

impl VelocityBlocks {
    pub fn new(block_ids: Vec<u64>, avgs: Array2<f64>) -> Result<Self> {
        if block_ids.len() != avgs.nrows() {
            return Err(GridError::ShapeMismatch {
                expected: block_ids.len(),
                got: avgs.nrows(),
            });
        }
        Ok(Self { block_ids, avgs })
    }

    pub fn from_flat(block_ids: Vec<u64>, avgs: Vec<f64>, cells_per_block: usize) -> Result<Self> {
        let expected = block_ids.len() * cells_per_block;
        let got = avgs.len();
        let avgs = Array2::from_shape_vec((block_ids.len(), cells_per_block), avgs)
            .map_err(|_| GridError::ShapeMismatch { expected, got })?;
        Self::new(block_ids, avgs)
    }

    pub fn block_ids(&self) -> &[u64] {
        &self.block_ids
    }

    pub fn avgs(&self) -> &Array2<f64> {
        &self.avgs
    }

    pub fn len(&self) -> usize {
        self.block_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_ids.is_empty()
    }

    pub fn cells_per_block(&self) -> usize {
        self.avgs.ncols()
    }

    /// (velocity cell id, avgs) pairs in storage order.
    pub fn velocity_cells(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        let wid3 = self.cells_per_block() as u64;
        self.block_ids
            .iter()
            .zip(self.avgs.axis_iter(Axis(0)))
            .flat_map(move |(&bid, row)| {
                row.into_iter()
                    .enumerate()
                    .map(move |(local, &v)| (bid * wid3 + local as u64, v))
                    .collect::<Vec<_>>()
            })
    }

    pub fn ravel_avgs(&self) -> Vec<f64> {
        self.avgs.iter().copied().collect()
    }
}

/// Unstructured voxel grid ready for a VTK pipeline.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    /// npoints x 3
    pub points: Array2<f64>,
    pub voxels: Vec<[usize; 8]>,
    pub scalars: Vec<f64>,
    pub scalars_name: String,
}

impl VoxelGrid {
    pub fn npoints(&self) -> usize {
        self.points.nrows()
    }

    pub fn ncells(&self) -> usize {
        self.voxels.len()
    }

    pub fn scalar_range(&self) -> Option<(f64, f64)> {
        self.scalars
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Builds the voxel grid of a cell's velocity blocks. Voxels follow the avgs
/// order, so `scalars[n]` belongs to `voxels[n]`.
pub fn construct_velocity_cell_nodes(
    mesh: &VelocityMesh,
    blocks: &VelocityBlocks,
) -> Result<VoxelGrid> {
    let wid3 = mesh.cells_per_block();
    if blocks.cells_per_block() != wid3 {
        return Err(GridError::ShapeMismatch {
            expected: wid3,
            got: blocks.cells_per_block(),
        });
    }
    let dv = mesh.cell_size();
    let mut node_index: HashMap<[usize; 3], usize> = HashMap::with_capacity(blocks.len() * wid3);
    let mut nodes: Vec<[usize; 3]> = Vec::with_capacity(blocks.len() * wid3);
    let mut voxels = Vec::with_capacity(blocks.len() * wid3);

    for &bid in blocks.block_ids() {
        if mesh.block_indices(bid).is_none() {
            return Err(GridError::InvalidBlock(bid));
        }
        for local in 0..wid3 {
            let Some(cell) = mesh.cell_indices(bid, local) else {
                return Err(GridError::InvalidBlock(bid));
            };
            let mut voxel = [0usize; 8];
            for (corner, offset) in voxel.iter_mut().zip(VOXEL_CORNERS.iter()) {
                let key = [cell[0] + offset[0], cell[1] + offset[1], cell[2] + offset[2]];
                *corner = *node_index.entry(key).or_insert_with(|| {
                    nodes.push(key);
                    nodes.len() - 1
                });
            }
            voxels.push(voxel);
        }
    }

    let mut points = Array2::<f64>::zeros((nodes.len(), 3));
    for (mut row, key) in points.axis_iter_mut(Axis(0)).zip(nodes.iter()) {
        for d in 0..3 {
            row[d] = mesh.vmin[d] + key[d] as f64 * dv[d];
        }
    }

    Ok(VoxelGrid {
        points,
        voxels,
        scalars: blocks.ravel_avgs(),
        scalars_name: "avgs".to_string(),
    })
}

/// Velocity-space difference `a - b`. A block missing from one side counts
/// as zeros. Output order: shared blocks, blocks only in `a`, blocks only in `b`.
pub fn diff_blocks(a: &VelocityBlocks, b: &VelocityBlocks) -> Result<VelocityBlocks> {
    let wid3 = a.cells_per_block();
    if b.cells_per_block() != wid3 {
        return Err(GridError::ShapeMismatch {
            expected: wid3,
            got: b.cells_per_block(),
        });
    }
    let index_b: HashMap<u64, usize> = b
        .block_ids()
        .iter()
        .enumerate()
        .map(|(i, &bid)| (bid, i))
        .collect();
    let index_a: HashMap<u64, usize> = a
        .block_ids()
        .iter()
        .enumerate()
        .map(|(i, &bid)| (bid, i))
        .collect();

    let mut shared = Vec::new();
    let mut only_a = Vec::new();
    for (ia, &bid) in a.block_ids().iter().enumerate() {
        match index_b.get(&bid) {
            Some(&ib) => shared.push((bid, ia, ib)),
            None => only_a.push((bid, ia)),
        }
    }
    let only_b: Vec<(u64, usize)> = b
        .block_ids()
        .iter()
        .enumerate()
        .filter(|(_, bid)| !index_a.contains_key(bid))
        .map(|(ib, &bid)| (bid, ib))
        .collect();

    let total = shared.len() + only_a.len() + only_b.len();
    let mut ids = Vec::with_capacity(total);
    let mut avgs = Array2::<f64>::zeros((total, wid3));
    let mut rows = avgs.axis_iter_mut(Axis(0));

    for (bid, ia, ib) in shared {
        if let Some(mut row) = rows.next() {
            row.assign(&(&a.avgs().row(ia) - &b.avgs().row(ib)));
        }
        ids.push(bid);
    }
    for (bid, ia) in only_a {
        if let Some(mut row) = rows.next() {
            row.assign(&a.avgs().row(ia));
        }
        ids.push(bid);
    }
    for (bid, ib) in only_b {
        if let Some(mut row) = rows.next() {
            row.assign(&b.avgs().row(ib).mapv(|v| -v));
        }
        ids.push(bid);
    }
    drop(rows);

    VelocityBlocks::new(ids, avgs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> VelocityMesh {
        VelocityMesh::new([-4.0, -4.0, -4.0], [4.0, 4.0, 4.0], [2, 2, 2]).with_wid(2)
    }

    fn blocks(ids: &[u64], fill: f64) -> VelocityBlocks {
        let n = ids.len() * 8;
        VelocityBlocks::from_flat(ids.to_vec(), vec![fill; n], 8).unwrap()
    }

    #[test]
    fn test_block_indices() {
        let m = mesh();
        assert_eq!(m.block_indices(0), Some([0, 0, 0]));
        assert_eq!(m.block_indices(1), Some([1, 0, 0]));
        assert_eq!(m.block_indices(2), Some([0, 1, 0]));
        assert_eq!(m.block_indices(7), Some([1, 1, 1]));
        assert_eq!(m.block_indices(8), None);
        for b in 0..8 {
            assert_eq!(m.block_id(m.block_indices(b).unwrap()), Some(b));
        }
    }

    #[test]
    fn test_cell_coordinates() {
        let m = mesh();
        assert_eq!(m.cell_size(), [2.0, 2.0, 2.0]);
        // first cell of block 0
        assert_eq!(m.cell_coordinates(0), Some([-3.0, -3.0, -3.0]));
        // local 1 of block 0 is one cell further in x
        assert_eq!(m.cell_coordinates(1), Some([-1.0, -3.0, -3.0]));
        // block 7, last local cell
        assert_eq!(m.cell_coordinates(7 * 8 + 7), Some([3.0, 3.0, 3.0]));
        assert_eq!(m.cell_coordinates(64), None);
        assert!(m.velocity_cell_coordinates(&[0, 64]).is_none());
    }

    #[test]
    fn test_single_block_voxels() {
        let m = mesh();
        let g = construct_velocity_cell_nodes(&m, &blocks(&[0], 1.0)).unwrap();
        assert_eq!(g.ncells(), 8);
        assert_eq!(g.npoints(), 27);
        assert_eq!(g.scalars.len(), 8);
        assert_eq!(g.scalars_name, "avgs");
        let first = g.voxels[0];
        let p = |i: usize| [g.points[[i, 0]], g.points[[i, 1]], g.points[[i, 2]]];
        assert_eq!(p(first[0]), [-4.0, -4.0, -4.0]);
        assert_eq!(p(first[1]), [-2.0, -4.0, -4.0]);
        assert_eq!(p(first[2]), [-4.0, -2.0, -4.0]);
        assert_eq!(p(first[7]), [-2.0, -2.0, -2.0]);
    }

    #[test]
    fn test_adjacent_blocks_share_nodes() {
        let m = mesh();
        let g = construct_velocity_cell_nodes(&m, &blocks(&[0, 1], 1.0)).unwrap();
        assert_eq!(g.ncells(), 16);
        // 5 x 3 x 3 lattice
        assert_eq!(g.npoints(), 45);
    }

    #[test]
    fn test_invalid_block_is_rejected() {
        let m = mesh();
        assert!(matches!(
            construct_velocity_cell_nodes(&m, &blocks(&[9], 1.0)),
            Err(GridError::InvalidBlock(9))
        ));
        let wrong = VelocityBlocks::from_flat(vec![0], vec![0.0; 27], 27).unwrap();
        assert!(construct_velocity_cell_nodes(&m, &wrong).is_err());
    }

    #[test]
    fn test_velocity_cells_ids() {
        let b = blocks(&[3], 0.5);
        let cells: Vec<(u64, f64)> = b.velocity_cells().collect();
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], (24, 0.5));
        assert_eq!(cells[7], (31, 0.5));
    }

    #[test]
    fn test_diff_blocks_ordering_and_values() {
        let a = blocks(&[0, 1, 2], 3.0);
        let b = blocks(&[5, 1], 1.0);
        let d = diff_blocks(&a, &b).unwrap();
        assert_eq!(d.block_ids(), &[1, 0, 2, 5]);
        assert!(d.avgs().row(0).iter().all(|&v| v == 2.0));
        assert!(d.avgs().row(1).iter().all(|&v| v == 3.0));
        assert!(d.avgs().row(2).iter().all(|&v| v == 3.0));
        assert!(d.avgs().row(3).iter().all(|&v| v == -1.0));
    }
}
