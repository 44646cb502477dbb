/*
File: cutthrough.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use crate::error::{GridError, Result};
use crate::reader::{Operator, VlsvReader};
use ndarray::Axis;

/// One requested variable, `name` or `name,operator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRequest {
    pub name: String,
    pub operator: Option<Operator>,
}

/// Picker arguments, e.g. `plot rho B,x E,y`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CutThroughArgs {
    pub plot: bool,
    pub requests: Vec<VariableRequest>,
}

impl CutThroughArgs {
    pub fn parse(args: &str) -> Result<Self> {
        let mut parsed = Self::default();
        for token in args.split_whitespace() {
            if token == "plot" {
                parsed.plot = true;
                continue;
            }
            let request = match token.split_once(',') {
                Some((name, op)) => VariableRequest {
                    name: name.to_string(),
                    operator: Some(op.parse()?),
                },
                None => VariableRequest {
                    name: token.to_string(),
                    operator: None,
                },
            };
            if request.name.is_empty() {
                return Err(GridError::BadArgs(format!("'{token}' has no variable name")));
            }
            parsed.requests.push(request);
        }
        if parsed.requests.is_empty() {
            return Err(GridError::BadArgs(format!("no variables in '{args}'")));
        }
        Ok(parsed)
    }
}

/// Values of one variable along the cut.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub operator: Operator,
    pub units: String,
    pub data: Vec<f64>,
}

impl VariableInfo {
    /// `B,x`-style label for plots.
    pub fn label(&self) -> String {
        match self.operator {
            Operator::Pass => self.name.clone(),
            op => format!("{},{op}", self.name),
        }
    }
}

/// Cells crossed by a segment, with the distance from the start point at
/// which the segment enters each of them.
#[derive(Debug, Clone, Default)]
pub struct CutThrough {
    pub point1: [f64; 3],
    pub point2: [f64; 3],
    pub cellids: Vec<u64>,
    pub distances: Vec<f64>,
    pub variables: Vec<VariableInfo>,
}

impl CutThrough {
    pub fn len(&self) -> usize {
        self.cellids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cellids.is_empty()
    }

    /// Reads every requested variable for the cut cells. Without an explicit
    /// operator scalars pass through and vectors are reduced to magnitude.
    pub fn read_variables<R: VlsvReader + ?Sized>(
        &mut self,
        reader: &R,
        args: &CutThroughArgs,
    ) -> Result<()> {
        reader.optimize_open_file();
        let read = args
            .requests
            .iter()
            .map(|req| self.read_one(reader, req))
            .collect::<Result<Vec<_>>>();
        reader.optimize_close_file();
        self.variables.extend(read?);
        Ok(())
    }

    fn read_one<R: VlsvReader + ?Sized>(
        &self,
        reader: &R,
        req: &VariableRequest,
    ) -> Result<VariableInfo> {
        let rows = reader
            .read_vectors(&req.name, Some(self.cellids.as_slice()))
            .ok_or_else(|| GridError::MissingVariable(req.name.clone()))?;
        let operator = req.operator.unwrap_or(if rows.ncols() == 1 {
            Operator::Pass
        } else {
            Operator::Magnitude
        });
        let data = rows
            .axis_iter(Axis(0))
            .map(|row| {
                operator.reduce(row).ok_or(GridError::ShapeMismatch {
                    expected: 1,
                    got: rows.ncols(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(VariableInfo {
            name: req.name.clone(),
            operator,
            units: reader.variable_units(&req.name).unwrap_or_default(),
            data,
        })
    }
}

/// Tolerance, in cell widths and in segment fractions, for treating a point
/// as lying on a cell face.
const FACE_TOL: f64 = 1e-9;

/// Walks the segment p1 -> p2 cell by cell on the uniform spatial grid.
///
/// The cut starts in the cell the segment enters from `p1`, which is the cell
/// below a face when `p1` sits on that face and the segment heads down. It
/// always ends in the cell containing `p2`. Crossing an edge or corner steps
/// every affected axis at once.
pub fn cut_through<R: VlsvReader + ?Sized>(
    reader: &R,
    point1: [f64; 3],
    point2: [f64; 3],
) -> Result<CutThrough> {
    let first = reader.cellid(point1);
    if first == 0 {
        return Err(GridError::InvalidCell(point1));
    }
    let last = reader.cellid(point2);
    if last == 0 {
        return Err(GridError::InvalidCell(point2));
    }
    let (mins, maxs) = reader.spatial_extents()?;
    let cells = reader.spatial_cells()?;
    let dx: [f64; 3] = std::array::from_fn(|d| (maxs[d] - mins[d]) / cells[d].max(1) as f64);

    let dir: [f64; 3] = std::array::from_fn(|d| point2[d] - point1[d]);
    let length = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
    let mut cut = CutThrough {
        point1,
        point2,
        cellids: vec![],
        distances: vec![],
        variables: vec![],
    };
    if first == last || length == 0.0 {
        cut.cellids.push(first);
        cut.distances.push(0.0);
        return Ok(cut);
    }

    let mut ijk: [i64; 3] = std::array::from_fn(|d| {
        let f = (point1[d] - mins[d]) / dx[d];
        let r = f.round();
        let i = if dir[d] < 0.0 && (f - r).abs() < FACE_TOL {
            r as i64 - 1
        } else {
            f.floor() as i64
        };
        i.clamp(0, cells[d].max(1) as i64 - 1)
    });
    let step: [i64; 3] = std::array::from_fn(|d| {
        if dir[d] > 0.0 {
            1
        } else if dir[d] < 0.0 {
            -1
        } else {
            0
        }
    });
    let t_delta: [f64; 3] = std::array::from_fn(|d| {
        if dir[d] == 0.0 {
            f64::INFINITY
        } else {
            dx[d] / dir[d].abs()
        }
    });
    // Segment parameter at which the next face along each axis is crossed.
    let mut t_max: [f64; 3] = std::array::from_fn(|d| {
        if dir[d] == 0.0 {
            return f64::INFINITY;
        }
        let face = ijk[d] + i64::from(dir[d] > 0.0);
        (mins[d] + face as f64 * dx[d] - point1[d]) / dir[d]
    });

    let max_steps = cells.iter().sum::<usize>() + 3;
    let mut t_enter = 0.0_f64;
    let mut reached_end = false;
    for _ in 0..max_steps {
        let centre: [f64; 3] = std::array::from_fn(|d| mins[d] + (ijk[d] as f64 + 0.5) * dx[d]);
        let cid = reader.cellid(centre);
        if cid == 0 {
            break;
        }
        if cut.cellids.last() != Some(&cid) {
            cut.cellids.push(cid);
            cut.distances.push(t_enter * length);
        }
        let t_next = t_max.iter().copied().fold(f64::INFINITY, f64::min);
        if t_next >= 1.0 - FACE_TOL {
            reached_end = true;
            break;
        }
        for d in 0..3 {
            if t_max[d] - t_next <= FACE_TOL {
                ijk[d] += step[d];
                t_max[d] += t_delta[d];
            }
        }
        if (0..3).any(|d| ijk[d] < 0 || ijk[d] >= cells[d] as i64) {
            break;
        }
        t_enter = t_next;
    }

    if cut.cellids.last() != Some(&last) {
        if reached_end {
            // p2 sits on the face shared with the next cell, which owns it
            cut.cellids.push(last);
            cut.distances.push(length);
        } else {
            log::warn!("cut-through stopped before reaching cell {last}");
        }
    }
    Ok(cut)
}
