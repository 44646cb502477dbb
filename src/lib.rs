/*
File: lib.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.

Grid viewer data and small analysis tools on top of a VLSV reader.
Nothing in here parses files: every read goes through the VlsvReader trait,
so any backend (mmap reader, python bridge, in-memory arrays) can drive it.

EXAMPLES:
    let reader = Arc::new(MemoryReader::new([-1e7, -1e7, -1e7], [1e7, 1e7, 1e7], [10, 10, 10]));
    let mut viewer = GridViewer::new(reader, ViewerConfig::default())?;
    viewer.set_picker(Picker::PitchAngle);
    let outcome = viewer.on_pick([0.0, 0.0, 0.0])?;

There are 4 main parts here:
1) reader:
    The VlsvReader trait and an in-memory implementation.
    Keywords:
    read_parameter, cellid_locations, read_variable, read_vector, cellid, cell_coordinates, cells_with_blocks, read_blocks, velocity_mesh

2) grid + mesh:
    Structured spatial grid and unstructured velocity-space voxel grid.
    Keywords:
    load_grid, GridJob, construct_velocity_cell_nodes, velocity_cell_coordinates, diff_blocks

3) analysis:
    Keywords:
    pitch_angles, Histogram::weighted, nearest_cell_with_blocks, cut_through, CutThroughArgs

4) output + viewer:
    Keywords:
    write_structured_grid, write_voxel_grid, save_histogram, plot_multiple_variables, GridViewer::on_pick
*/

pub mod config;
pub mod cutthrough;
pub mod error;
pub mod grid;
pub mod mesh;
pub mod nearest;
pub mod pitchangle;
pub mod plot;
pub mod reader;
pub mod viewer;
pub mod vtk;

pub use config::ViewerConfig;
pub use cutthrough::{CutThrough, CutThroughArgs, VariableInfo, VariableRequest, cut_through};
pub use error::{GridError, Result};
pub use grid::{GridJob, StructuredGrid, load_grid};
pub use mesh::{VoxelGrid, construct_velocity_cell_nodes, diff_blocks};
pub use nearest::{NearestCellFinder, nearest_cell_with_blocks};
pub use pitchangle::{Histogram, PitchAngleOptions, PitchAngles, pitch_angles};
pub use reader::{MemoryReader, Operator, VelocityBlocks, VelocityMesh, VlsvReader};
pub use viewer::{BGlyph, FigureStyle, GridViewer, PickOutcome, Picker, VelocityFigure};
