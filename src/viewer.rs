/*
File: viewer.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.

Headless grid viewer. A front end (window, notebook, test) feeds world
coordinates of mouse picks into `on_pick`; the selected picker decides what
gets built. Results stay in the viewer and can be written out as VTK/PNG.

Picker options:
    None                                  ignore picks
    Velocity_space                        velocity space of the picked cell
    Velocity_space_iso_surface            same, drawn as iso-surface
    Velocity_space_nearest_cellid         velocity space of the closest cell that has one
    Velocity_space_nearest_cellid_iso_surface
    Pitch_angle                           pitch-angle histogram of the picked cell
    Cut_through                           two picks, args like "plot rho B,x E,y"
*/
use crate::config::ViewerConfig;
use crate::cutthrough::{CutThrough, CutThroughArgs, cut_through};
use crate::error::{GridError, Result};
use crate::grid::{GridJob, StructuredGrid};
use crate::mesh::{VoxelGrid, construct_velocity_cell_nodes, diff_blocks};
use crate::nearest::NearestCellFinder;
use crate::pitchangle::{Histogram, PitchAngleOptions, PitchAngles, pitch_angles};
use crate::plot::{plot_multiple_variables, save_histogram};
use crate::reader::VlsvReader;
use crate::vtk;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Picker {
    #[default]
    None,
    VelocitySpace,
    VelocitySpaceNearestCellid,
    VelocitySpaceIsoSurface,
    VelocitySpaceNearestCellidIsoSurface,
    PitchAngle,
    CutThrough,
}

impl Picker {
    pub const ALL: [Picker; 7] = [
        Picker::None,
        Picker::VelocitySpace,
        Picker::VelocitySpaceNearestCellid,
        Picker::VelocitySpaceIsoSurface,
        Picker::VelocitySpaceNearestCellidIsoSurface,
        Picker::PitchAngle,
        Picker::CutThrough,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Picker::None => "None",
            Picker::VelocitySpace => "Velocity_space",
            Picker::VelocitySpaceNearestCellid => "Velocity_space_nearest_cellid",
            Picker::VelocitySpaceIsoSurface => "Velocity_space_iso_surface",
            Picker::VelocitySpaceNearestCellidIsoSurface => {
                "Velocity_space_nearest_cellid_iso_surface"
            }
            Picker::PitchAngle => "Pitch_angle",
            Picker::CutThrough => "Cut_through",
        }
    }

    fn iso_surface(&self) -> bool {
        matches!(
            self,
            Picker::VelocitySpaceIsoSurface | Picker::VelocitySpaceNearestCellidIsoSurface
        )
    }
}

impl FromStr for Picker {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        Picker::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GridError::BadArgs(format!("unknown picker '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FigureStyle {
    Surface,
    IsoSurface { contours: Vec<f64>, opacity: f64 },
}

/// Normalized magnetic field drawn at the velocity-space origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BGlyph {
    pub origin: [f64; 3],
    pub vector: [f64; 3],
    pub scale_factor: f64,
}

#[derive(Debug, Clone)]
pub struct VelocityFigure {
    pub name: String,
    pub cellids: Vec<u64>,
    pub grid: VoxelGrid,
    pub b_glyph: Option<BGlyph>,
    pub style: FigureStyle,
}

#[derive(Debug, Clone)]
pub enum PickOutcome {
    /// Picker is `None`
    Ignored,
    InvalidCell([f64; 3]),
    NoVelocityBlocks(u64),
    /// Index into `GridViewer::figures`
    VelocityFigure { cellid: u64, index: usize },
    PitchAngle {
        angles: PitchAngles,
        histogram: Histogram,
        plot: Option<PathBuf>,
    },
    CutThroughStarted([f64; 3]),
    CutThroughDone { cells: usize, plot: Option<PathBuf> },
    BadArgs(String),
}

pub struct GridViewer<R: VlsvReader + Send + Sync + 'static> {
    reader: Arc<R>,
    config: ViewerConfig,
    picker: Picker,
    args: String,
    mins: [f64; 3],
    maxs: [f64; 3],
    last_pick: Option<[f64; 3]>,
    job: Option<GridJob>,
    grid: Option<StructuredGrid>,
    figures: Vec<VelocityFigure>,
    cut_through: Option<CutThrough>,
    cuts_done: usize,
    nearest: NearestCellFinder,
}

impl<R: VlsvReader + Send + Sync + 'static> GridViewer<R> {
    /// Starts building the spatial grid (on a worker thread when
    /// `config.threaded`) and returns immediately.
    pub fn new(reader: Arc<R>, config: ViewerConfig) -> Result<Self> {
        let (mins, maxs) = reader.spatial_extents()?;
        let job = GridJob::spawn(
            reader.clone(),
            &config.variable,
            config.operator,
            config.threaded,
        );
        let nearest = NearestCellFinder::new(&config.population);
        Ok(Self {
            reader,
            config,
            picker: Picker::None,
            args: String::new(),
            mins,
            maxs,
            last_pick: None,
            job: Some(job),
            grid: None,
            figures: vec![],
            cut_through: None,
            cuts_done: 0,
            nearest,
        })
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn picker(&self) -> Picker {
        self.picker
    }

    pub fn set_picker(&mut self, picker: Picker) {
        self.picker = picker;
    }

    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn set_args(&mut self, args: &str) {
        self.args = args.to_string();
    }

    pub fn last_pick(&self) -> Option<[f64; 3]> {
        self.last_pick
    }

    pub fn figures(&self) -> &[VelocityFigure] {
        &self.figures
    }

    pub fn cut_through(&self) -> Option<&CutThrough> {
        self.cut_through.as_ref()
    }

    /// The spatial grid, waiting for the worker if it is still running.
    pub fn grid(&mut self) -> Result<&StructuredGrid> {
        if let Some(job) = self.job.take() {
            let grid = job.join()?;
            log::info!(
                "grid '{}' ready: {} cells",
                grid.scalars_name,
                grid.ncells()
            );
            self.grid = Some(grid);
        }
        self.grid
            .as_ref()
            .ok_or_else(|| GridError::MissingVariable(self.config.variable.clone()))
    }

    /// Pulls picks that land just outside the domain back inside it.
    pub fn clamp_pick(&self, mut coordinates: [f64; 3]) -> [f64; 3] {
        let tol = self.config.pick_tolerance;
        let nudge = self.config.pick_nudge;
        for d in 0..3 {
            if coordinates[d] < self.mins[d] && coordinates[d] + tol > self.mins[d] {
                coordinates[d] = self.mins[d] + nudge;
            }
            if coordinates[d] > self.maxs[d] && coordinates[d] - tol < self.maxs[d] {
                coordinates[d] = self.maxs[d] - nudge;
            }
        }
        coordinates
    }

    pub fn on_pick(&mut self, coordinates: [f64; 3]) -> Result<PickOutcome> {
        if self.picker != Picker::CutThrough {
            self.last_pick = None;
        }
        let coordinates = self.clamp_pick(coordinates);
        log::debug!("COORDINATES: {coordinates:?}");
        let cellid = self.reader.cellid(coordinates);
        log::debug!("CELL ID: {cellid}");
        if cellid == 0 {
            log::warn!("Invalid cell id at {coordinates:?}");
            return Ok(PickOutcome::InvalidCell(coordinates));
        }

        match self.picker {
            Picker::None => Ok(PickOutcome::Ignored),
            Picker::VelocitySpace | Picker::VelocitySpaceIsoSurface => {
                self.velocity_outcome(cellid, self.picker.iso_surface())
            }
            Picker::VelocitySpaceNearestCellid | Picker::VelocitySpaceNearestCellidIsoSurface => {
                let nearest = self.nearest.nearest(self.reader.as_ref(), cellid)?;
                log::debug!("nearest cell with velocity space to {cellid}: {nearest}");
                self.velocity_outcome(nearest, self.picker.iso_surface())
            }
            Picker::PitchAngle => self.pitch_angle_outcome(cellid),
            Picker::CutThrough => match self.last_pick.take() {
                Some(first) => self.finish_cut(first, coordinates),
                None => {
                    self.last_pick = Some(coordinates);
                    Ok(PickOutcome::CutThroughStarted(coordinates))
                }
            },
        }
    }

    fn velocity_outcome(&mut self, cellid: u64, iso_surface: bool) -> Result<PickOutcome> {
        if self.generate_velocity_grid(cellid, iso_surface)?.is_none() {
            return Ok(PickOutcome::NoVelocityBlocks(cellid));
        }
        Ok(PickOutcome::VelocityFigure {
            cellid,
            index: self.figures.len() - 1,
        })
    }

    fn pitch_angle_outcome(&mut self, cellid: u64) -> Result<PickOutcome> {
        let options = PitchAngleOptions {
            cosine: true,
            plasma_frame: true,
        };
        let angles = match pitch_angles(
            self.reader.as_ref(),
            cellid,
            &self.config.population,
            options,
        ) {
            Ok(a) => a,
            Err(GridError::NoVelocityBlocks(c)) => {
                log::warn!("CELL {c} HAS NO VELOCITY BLOCK");
                return Ok(PickOutcome::NoVelocityBlocks(c));
            }
            Err(e) => return Err(e),
        };
        let histogram = angles.histogram(self.config.histogram_bins);
        let plot = if self.config.save_plots {
            let path = self
                .config
                .output_dir
                .join(format!("pitch_angle_{cellid}.png"));
            save_histogram(
                &histogram,
                &path,
                &format!("Pitch angle distribution, cell {cellid}"),
                "cos(pitch angle)",
            )?;
            Some(path)
        } else {
            None
        };
        Ok(PickOutcome::PitchAngle {
            angles,
            histogram,
            plot,
        })
    }

    /// Builds and stores the cut first; bad args or a failed plot leave the
    /// stored cut in place.
    fn finish_cut(&mut self, first: [f64; 3], second: [f64; 3]) -> Result<PickOutcome> {
        let cut = self
            .cut_through
            .insert(cut_through(self.reader.as_ref(), first, second)?);
        let args = match CutThroughArgs::parse(&self.args) {
            Ok(a) => a,
            Err(GridError::BadArgs(msg)) | Err(GridError::UnknownOperator(msg)) => {
                log::warn!("Bad args: {msg}");
                return Ok(PickOutcome::BadArgs(msg));
            }
            Err(e) => return Err(e),
        };
        cut.read_variables(self.reader.as_ref(), &args)?;
        let cells = cut.len();
        log::info!("cut-through over {cells} cells");
        self.cuts_done += 1;
        if !args.plot {
            return Ok(PickOutcome::CutThroughDone { cells, plot: None });
        }
        let path = self
            .config
            .output_dir
            .join(format!("cut_through_{}.png", self.cuts_done));
        plot_multiple_variables(&cut.distances, &cut.variables, &path)?;
        Ok(PickOutcome::CutThroughDone {
            cells,
            plot: Some(path),
        })
    }

    fn b_glyph(&self, cellid: u64) -> Option<BGlyph> {
        let b = self.reader.magnetic_field(cellid).ok()?;
        let norm = (b[0] * b[0] + b[1] * b[1] + b[2] * b[2]).sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        let len = self.config.b_vector_length;
        Some(BGlyph {
            origin: [0.0; 3],
            vector: [b[0] / norm * len, b[1] / norm * len, b[2] / norm * len],
            scale_factor: self.config.b_glyph_scale,
        })
    }

    /// Velocity space of one cell as a new figure, `None` when the cell
    /// stores no distribution.
    pub fn generate_velocity_grid(
        &mut self,
        cellid: u64,
        iso_surface: bool,
    ) -> Result<Option<&VelocityFigure>> {
        let pop = &self.config.population;
        let Some(blocks) = self
            .reader
            .read_blocks(cellid, pop)
            .filter(|b| !b.is_empty())
        else {
            log::warn!("CELL {cellid} HAS NO VELOCITY BLOCK");
            return Ok(None);
        };
        let mesh = self
            .reader
            .velocity_mesh(pop)
            .ok_or_else(|| GridError::MissingVelocityMesh(pop.clone()))?;
        let grid = construct_velocity_cell_nodes(&mesh, &blocks)?;
        let style = if iso_surface {
            FigureStyle::IsoSurface {
                contours: self.config.iso_contours.clone(),
                opacity: self.config.iso_opacity,
            }
        } else {
            FigureStyle::Surface
        };
        let figure = VelocityFigure {
            name: cellid.to_string(),
            cellids: vec![cellid],
            b_glyph: self.b_glyph(cellid),
            grid,
            style,
        };
        log::info!(
            "velocity figure {}: {} voxels",
            figure.name,
            figure.grid.ncells()
        );
        self.figures.push(figure);
        Ok(self.figures.last())
    }

    /// avgs(cellid1) - avgs(cellid2); a velocity cell missing from one of
    /// them counts as zero.
    pub fn generate_diff_grid(
        &mut self,
        cellid1: u64,
        cellid2: u64,
    ) -> Result<Option<&VelocityFigure>> {
        let pop = &self.config.population;
        let read = |cid: u64| {
            let b = self.reader.read_blocks(cid, pop).filter(|b| !b.is_empty());
            if b.is_none() {
                log::warn!("CELL {cid} HAS NO VELOCITY BLOCK");
            }
            b
        };
        let (Some(a), Some(b)) = (read(cellid1), read(cellid2)) else {
            return Ok(None);
        };
        let mesh = self
            .reader
            .velocity_mesh(pop)
            .ok_or_else(|| GridError::MissingVelocityMesh(pop.clone()))?;
        let diff = diff_blocks(&a, &b)?;
        let grid = construct_velocity_cell_nodes(&mesh, &diff)?;
        self.figures.push(VelocityFigure {
            name: format!("{cellid1} {cellid2}"),
            cellids: vec![cellid1, cellid2],
            grid,
            b_glyph: None,
            style: FigureStyle::Surface,
        });
        Ok(self.figures.last())
    }

    /// Writes the spatial grid to `<output_dir>/<variable>.vtk`.
    pub fn save_grid(&mut self) -> Result<PathBuf> {
        let path = self
            .config
            .output_dir
            .join(format!("{}.vtk", self.config.variable));
        vtk::save_structured_grid(self.grid()?, &path)?;
        Ok(path)
    }

    /// Writes a figure's voxel grid, plus its B glyph if any. Returns the
    /// written paths.
    pub fn save_figure(&self, index: usize) -> Result<Vec<PathBuf>> {
        let figure = self.figures.get(index).ok_or(GridError::ShapeMismatch {
            expected: self.figures.len(),
            got: index,
        })?;
        let stem = figure.name.replace(' ', "_");
        let mut written = vec![];
        let path = self.config.output_dir.join(format!("vspace_{stem}.vtk"));
        vtk::save_voxel_grid(&figure.grid, &figure.name, &path)?;
        written.push(path);
        if let Some(glyph) = &figure.b_glyph {
            let path = self.config.output_dir.join(format!("vspace_{stem}_B.vtk"));
            vtk::save_vector_glyph(glyph.origin, glyph.vector, "B_vector", &path)?;
            written.push(path);
        }
        Ok(written)
    }
}
