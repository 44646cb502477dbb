/*
File: error.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use thiserror::Error;

/// Errors raised while turning reader data into grids, plots and picks
#[derive(Debug, Error)]
pub enum GridError {
    /// A scalar parameter (xmin, xcells_ini, ...) is not available
    #[error("parameter '{0}' not found")]
    MissingParameter(String),

    /// A variable is not available from the reader
    #[error("variable '{0}' not found")]
    MissingVariable(String),

    /// The cell has no velocity distribution stored
    #[error("cell {0} has no velocity block")]
    NoVelocityBlocks(u64),

    /// Coordinates map to cell id 0 (outside the grid)
    #[error("invalid cell id for coordinates {0:?}")]
    InvalidCell([f64; 3]),

    /// Cell id not present in the file
    #[error("cell {0} not in the grid")]
    UnknownCell(u64),

    /// No cell in the file carries velocity space
    #[error("no cells with velocity blocks for population '{0}'")]
    NoCandidates(String),

    /// Block id outside the velocity mesh
    #[error("velocity block {0} outside the velocity mesh")]
    InvalidBlock(u64),

    /// Velocity mesh description missing for a population
    #[error("no velocity mesh for population '{0}'")]
    MissingVelocityMesh(String),

    /// Array lengths do not agree with the grid
    #[error("shape mismatch: expected {expected} values, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Unusable picker arguments
    #[error("bad args: {0}")]
    BadArgs(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    /// Pitch angles are undefined without a field direction
    #[error("magnetic field is zero or missing in cell {0}")]
    ZeroMagneticField(u64),

    /// Drawing backend failure
    #[error("plot error: {0}")]
    Plot(String),

    /// The background grid worker panicked
    #[error("grid worker thread panicked")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Results using GridError
pub type Result<T> = std::result::Result<T, GridError>;
