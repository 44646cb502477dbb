/*
File: nearest.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::error::{GridError, Result};
use crate::reader::VlsvReader;
use once_cell::sync::OnceCell;
use rayon::prelude::*;

const PAR_THRESHOLD: usize = 4096;

/// Nearest cell (by centre distance) that stores a velocity distribution.
pub fn nearest_cell_with_blocks<R: VlsvReader + ?Sized>(
    reader: &R,
    cellid: u64,
    pop: &str,
) -> Result<u64> {
    NearestCellFinder::new(pop).nearest(reader, cellid)
}

/// Caches the centres of the cells with velocity space, which do not change
/// for an open file.
#[derive(Debug)]
pub struct NearestCellFinder {
    pop: String,
    candidates: OnceCell<Vec<(u64, [f64; 3])>>,
}

impl NearestCellFinder {
    pub fn new(pop: &str) -> Self {
        Self {
            pop: pop.to_string(),
            candidates: OnceCell::new(),
        }
    }

    pub fn pop(&self) -> &str {
        &self.pop
    }

    pub fn candidates<R: VlsvReader + ?Sized>(&self, reader: &R) -> &[(u64, [f64; 3])] {
        self.candidates.get_or_init(|| {
            reader
                .cells_with_blocks(&self.pop)
                .into_iter()
                .filter_map(|cid| match reader.cell_coordinates(cid) {
                    Some(c) => Some((cid, c)),
                    None => {
                        log::warn!("cell {cid} with blocks has no coordinates, skipped");
                        None
                    }
                })
                .collect()
        })
    }

    pub fn nearest<R: VlsvReader + ?Sized>(&self, reader: &R, cellid: u64) -> Result<u64> {
        let point = reader
            .cell_coordinates(cellid)
            .ok_or(GridError::UnknownCell(cellid))?;
        self.nearest_to_point(reader, point)
    }

    pub fn nearest_to_point<R: VlsvReader + ?Sized>(&self, reader: &R, point: [f64; 3]) -> Result<u64> {
        let candidates = self.candidates(reader);
        let idx = nearest_index(candidates, point)
            .ok_or_else(|| GridError::NoCandidates(self.pop.clone()))?;
        Ok(candidates[idx].0)
    }
}

/// Index of the closest candidate; ties go to the lowest index.
fn nearest_index(candidates: &[(u64, [f64; 3])], point: [f64; 3]) -> Option<usize> {
    let dist = |c: &[f64; 3]| {
        let d = [c[0] - point[0], c[1] - point[1], c[2] - point[2]];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
    };
    let closer = |a: (f64, usize), b: (f64, usize)| {
        if b.0.total_cmp(&a.0).then(b.1.cmp(&a.1)).is_lt() {
            b
        } else {
            a
        }
    };
    if candidates.len() < PAR_THRESHOLD {
        candidates
            .iter()
            .enumerate()
            .map(|(i, (_, c))| (dist(c), i))
            .reduce(closer)
            .map(|(_, i)| i)
    } else {
        candidates
            .par_iter()
            .enumerate()
            .map(|(i, (_, c))| (dist(c), i))
            .reduce_with(closer)
            .map(|(_, i)| i)
    }
}
