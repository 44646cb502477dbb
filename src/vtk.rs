/*
File: vtk.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.

Legacy ASCII VTK output, readable by ParaView, VisIt and mayavi.
*/
use crate::error::Result;
use crate::grid::StructuredGrid;
use crate::mesh::{VTK_VOXEL, VoxelGrid};
use ndarray::{ArrayView2, Axis};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: &str = "# vtk DataFile Version 3.0";

/// VTK array names cannot contain whitespace.
fn array_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "scalars".to_string()
    } else {
        cleaned
    }
}

fn write_points<W: Write>(w: &mut W, points: ArrayView2<f64>) -> Result<()> {
    writeln!(w, "POINTS {} double", points.nrows())?;
    for p in points.axis_iter(Axis(0)) {
        writeln!(w, "{} {} {}", p[0], p[1], p[2])?;
    }
    Ok(())
}

fn write_cell_scalars<W: Write>(w: &mut W, name: &str, values: &[f64]) -> Result<()> {
    writeln!(w, "CELL_DATA {}", values.len())?;
    writeln!(w, "SCALARS {} double 1", array_name(name))?;
    writeln!(w, "LOOKUP_TABLE default")?;
    for v in values {
        writeln!(w, "{v}")?;
    }
    Ok(())
}

pub fn write_structured_grid<W: Write>(grid: &StructuredGrid, w: &mut W) -> Result<()> {
    writeln!(w, "{HEADER}")?;
    writeln!(w, "{}", grid.scalars_name)?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET STRUCTURED_GRID")?;
    let [nx, ny, nz] = grid.dimensions;
    writeln!(w, "DIMENSIONS {nx} {ny} {nz}")?;
    write_points(w, grid.points.view())?;
    write_cell_scalars(w, &grid.scalars_name, &grid.scalars)
}

pub fn write_voxel_grid<W: Write>(grid: &VoxelGrid, title: &str, w: &mut W) -> Result<()> {
    writeln!(w, "{HEADER}")?;
    writeln!(w, "{title}")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    write_points(w, grid.points.view())?;
    let n = grid.ncells();
    writeln!(w, "CELLS {} {}", n, n * 9)?;
    for voxel in &grid.voxels {
        write!(w, "8")?;
        for idx in voxel {
            write!(w, " {idx}")?;
        }
        writeln!(w)?;
    }
    writeln!(w, "CELL_TYPES {n}")?;
    for _ in 0..n {
        writeln!(w, "{VTK_VOXEL}")?;
    }
    write_cell_scalars(w, &grid.scalars_name, &grid.scalars)
}

/// Single point carrying one vector, drawn as a glyph by the viewer.
pub fn write_vector_glyph<W: Write>(
    origin: [f64; 3],
    vector: [f64; 3],
    name: &str,
    w: &mut W,
) -> Result<()> {
    writeln!(w, "{HEADER}")?;
    writeln!(w, "{name}")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET POLYDATA")?;
    writeln!(w, "POINTS 1 double")?;
    writeln!(w, "{} {} {}", origin[0], origin[1], origin[2])?;
    writeln!(w, "VERTICES 1 2")?;
    writeln!(w, "1 0")?;
    writeln!(w, "POINT_DATA 1")?;
    writeln!(w, "VECTORS {} double", array_name(name))?;
    writeln!(w, "{} {} {}", vector[0], vector[1], vector[2])?;
    Ok(())
}

pub fn save_structured_grid(grid: &StructuredGrid, path: impl AsRef<Path>) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_structured_grid(grid, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn save_voxel_grid(grid: &VoxelGrid, title: &str, path: impl AsRef<Path>) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_voxel_grid(grid, title, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn save_vector_glyph(
    origin: [f64; 3],
    vector: [f64; 3],
    name: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_vector_glyph(origin, vector, name, &mut w)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::build_structured_grid;
    use crate::mesh::{VelocityBlocks, VelocityMesh, construct_velocity_cell_nodes};

    #[test]
    fn test_structured_grid_layout() {
        let g = build_structured_grid([0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1], vec![1.5, 2.5], "rho")
            .unwrap();
        let mut out = Vec::new();
        write_structured_grid(&g, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[3], "DATASET STRUCTURED_GRID");
        assert_eq!(lines[4], "DIMENSIONS 3 2 2");
        assert_eq!(lines[5], "POINTS 12 double");
        assert!(text.contains("CELL_DATA 2\nSCALARS rho double 1\nLOOKUP_TABLE default\n1.5\n2.5\n"));
    }

    #[test]
    fn test_voxel_grid_layout() {
        let mesh = VelocityMesh::new([-1.0; 3], [1.0; 3], [1, 1, 1]).with_wid(1);
        let blocks = VelocityBlocks::from_flat(vec![0], vec![3.0], 1).unwrap();
        let g = construct_velocity_cell_nodes(&mesh, &blocks).unwrap();
        let mut out = Vec::new();
        write_voxel_grid(&g, "cell 7", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("POINTS 8 double\n-1 -1 -1\n1 -1 -1\n"));
        assert!(text.contains("CELLS 1 9\n8 0 1 2 3 4 5 6 7\n"));
        assert!(text.contains("CELL_TYPES 1\n11\n"));
        assert!(text.contains("SCALARS avgs double 1"));
    }

    #[test]
    fn test_glyph_and_names() {
        let mut out = Vec::new();
        write_vector_glyph([0.0; 3], [0.0, 0.0, 1.0], "B vector", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("VECTORS B_vector double\n0 0 1\n"));
        assert_eq!(array_name(""), "scalars");
    }

    #[test]
    fn test_save_to_file() {
        let g = build_structured_grid([0.0; 3], [1.0; 3], [1, 1, 1], vec![4.0], "rho").unwrap();
        let path = std::env::temp_dir().join(format!("vlsvgrid_vtk_{}.vtk", std::process::id()));
        save_structured_grid(&g, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));
        std::fs::remove_file(&path).unwrap();
    }
}
