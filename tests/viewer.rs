/*
File: viewer.rs
Copyright (C) 2025 The vlsvgrid authors
This program is free software; you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 2 of the License, or
(at your option) any later version.
*/
use std::path::PathBuf;
use std::sync::Arc;
use vlsvgrid::*;

const EPS: f64 = 1e-9;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 4x4x1 grid over [0,4]x[0,4]x[0,1]. Cells 6 and 16 carry one velocity
/// block (WID 2) of a mesh spanning [-2, 2]^3, B points along +z.
fn reader() -> MemoryReader {
    let mut r = MemoryReader::new([0.0; 3], [4.0, 4.0, 1.0], [4, 4, 1]);
    r.add_scalar("rho", (1..=16).map(|c| c as f64).collect()).unwrap();
    r.add_vector("B", vec![[0.0, 0.0, 5e-9]; 16]).unwrap();
    r.add_vector("V", vec![[0.0; 3]; 16]).unwrap();
    r.set_units("rho", "1/m^3");
    let mesh = VelocityMesh::new([-2.0; 3], [2.0; 3], [1, 1, 1]).with_wid(2);
    r.add_population("proton", mesh);
    let ramp = VelocityBlocks::from_flat(vec![0], (1..=8).map(|v| v as f64).collect(), 8).unwrap();
    let flat = VelocityBlocks::from_flat(vec![0], vec![1.0; 8], 8).unwrap();
    r.add_blocks("proton", 6, ramp).unwrap();
    r.add_blocks("proton", 16, flat).unwrap();
    r
}

fn output_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vlsvgrid_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn viewer(threaded: bool) -> GridViewer<MemoryReader> {
    init_logs();
    let config = ViewerConfig {
        threaded,
        ..ViewerConfig::default()
    };
    GridViewer::new(Arc::new(reader()), config).unwrap()
}

#[test]
fn test_grid_inline_and_threaded() {
    for threaded in [false, true] {
        let mut v = viewer(threaded);
        let grid = v.grid().unwrap();
        assert_eq!(grid.ncells(), 16);
        assert_eq!(grid.dimensions, [5, 5, 2]);
        assert_eq!(grid.cell_value(6), Some(6.0));
        assert_eq!(grid.scalars_name, "rho");
    }
}

#[test]
fn test_missing_grid_variable() {
    init_logs();
    let config = ViewerConfig {
        variable: "E".to_string(),
        threaded: false,
        ..ViewerConfig::default()
    };
    let mut v = GridViewer::new(Arc::new(reader()), config).unwrap();
    assert!(matches!(v.grid(), Err(GridError::MissingVariable(_))));
}

#[test]
fn test_no_picker_and_invalid_cell() {
    let mut v = viewer(false);
    assert!(matches!(
        v.on_pick([1.5, 1.5, 0.5]).unwrap(),
        PickOutcome::Ignored
    ));
    v.set_picker(Picker::VelocitySpace);
    assert!(matches!(
        v.on_pick([100.0, 1.5, 0.5]).unwrap(),
        PickOutcome::InvalidCell(_)
    ));
    assert!(v.figures().is_empty());
}

#[test]
fn test_pick_near_boundary_is_clamped() {
    let v = viewer(false);
    let c = v.clamp_pick([-5.0, 4.0 + 10.0, 0.5]);
    assert!((c[0] - 1.0).abs() < EPS);
    assert!((c[1] - 3.0).abs() < EPS);
    assert!((c[2] - 0.5).abs() < EPS);
    let far = v.clamp_pick([-20.0, 1.0, 0.5]);
    assert_eq!(far[0], -20.0);
}

#[test]
fn test_velocity_space_pick() {
    let mut v = viewer(false);
    v.set_picker(Picker::VelocitySpace);
    match v.on_pick([-5.0, 1.5, 0.5]).unwrap() {
        PickOutcome::VelocityFigure { cellid, index } => {
            assert_eq!(cellid, 6);
            assert_eq!(index, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    let fig = &v.figures()[0];
    assert_eq!(fig.name, "6");
    assert_eq!(fig.cellids, vec![6]);
    assert_eq!(fig.style, FigureStyle::Surface);
    assert_eq!(fig.grid.ncells(), 8);
    assert_eq!(fig.grid.npoints(), 27);
    let glyph = fig.b_glyph.as_ref().unwrap();
    assert!((glyph.vector[2] - 8e12).abs() < 1.0);
    assert_eq!(glyph.vector[0], 0.0);
    assert!((glyph.scale_factor - 1e5).abs() < EPS);
}

#[test]
fn test_velocity_space_without_blocks() {
    let mut v = viewer(false);
    v.set_picker(Picker::VelocitySpaceIsoSurface);
    assert!(matches!(
        v.on_pick([0.5, 0.5, 0.5]).unwrap(),
        PickOutcome::NoVelocityBlocks(1)
    ));
    assert!(v.figures().is_empty());
}

#[test]
fn test_nearest_cell_iso_surface() {
    let mut v = viewer(false);
    v.set_picker(Picker::VelocitySpaceNearestCellidIsoSurface);
    match v.on_pick([0.5, 0.5, 0.5]).unwrap() {
        PickOutcome::VelocityFigure { cellid, .. } => assert_eq!(cellid, 6),
        other => panic!("unexpected outcome {other:?}"),
    }
    v.set_picker(Picker::VelocitySpaceNearestCellid);
    match v.on_pick([3.5, 2.5, 0.5]).unwrap() {
        PickOutcome::VelocityFigure { cellid, .. } => assert_eq!(cellid, 16),
        other => panic!("unexpected outcome {other:?}"),
    }
    let figs = v.figures();
    assert_eq!(figs.len(), 2);
    match &figs[0].style {
        FigureStyle::IsoSurface { contours, opacity } => {
            assert_eq!(contours, &vec![1e-15, 1e-14, 1e-12]);
            assert!((opacity - 0.3).abs() < EPS);
        }
        FigureStyle::Surface => panic!("expected an iso-surface"),
    }
    assert_eq!(figs[1].style, FigureStyle::Surface);
}

#[test]
fn test_pitch_angle_pick() {
    let mut v = viewer(false);
    v.set_picker(Picker::PitchAngle);
    match v.on_pick([1.5, 1.5, 0.5]).unwrap() {
        PickOutcome::PitchAngle {
            angles,
            histogram,
            plot,
        } => {
            assert_eq!(angles.cellid, 6);
            assert_eq!(angles.len(), 8);
            assert_eq!(histogram.bins(), 50);
            assert!((histogram.total() - 36.0).abs() < EPS);
            assert!((histogram.edges[0] + 1.0).abs() < EPS);
            assert!(plot.is_none());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(matches!(
        v.on_pick([0.5, 0.5, 0.5]).unwrap(),
        PickOutcome::NoVelocityBlocks(1)
    ));
}

#[test]
fn test_cut_through_two_picks() {
    let mut v = viewer(false);
    v.set_picker(Picker::CutThrough);
    v.set_args("rho B,z");
    assert!(matches!(
        v.on_pick([0.5, 0.5, 0.5]).unwrap(),
        PickOutcome::CutThroughStarted(_)
    ));
    assert!(v.last_pick().is_some());
    match v.on_pick([3.5, 0.5, 0.5]).unwrap() {
        PickOutcome::CutThroughDone { cells, plot } => {
            assert_eq!(cells, 4);
            assert!(plot.is_none());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(v.last_pick().is_none());
    let cut = v.cut_through().unwrap();
    assert_eq!(cut.cellids, vec![1, 2, 3, 4]);
    assert_eq!(cut.variables[0].data, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(cut.variables[0].units, "1/m^3");
    assert_eq!(cut.variables[1].label(), "B,z");
    assert!(cut.variables[1].data.iter().all(|b| (b - 5e-9).abs() < 1e-18));
    assert_eq!(v.reader().open_batches(), 0);
}

#[test]
fn test_cut_through_bad_args() {
    let mut v = viewer(false);
    v.set_picker(Picker::CutThrough);
    v.set_args("plot");
    v.on_pick([0.5, 0.5, 0.5]).unwrap();
    assert!(matches!(
        v.on_pick([3.5, 3.5, 0.5]).unwrap(),
        PickOutcome::BadArgs(_)
    ));
    assert!(v.last_pick().is_none());
    let cut = v.cut_through().unwrap();
    assert_eq!(cut.cellids.first(), Some(&1));
    assert_eq!(cut.cellids.last(), Some(&16));
    assert!(cut.variables.is_empty());
}

fn plotting_viewer(dir: PathBuf) -> GridViewer<MemoryReader> {
    init_logs();
    let config = ViewerConfig {
        threaded: false,
        save_plots: true,
        output_dir: dir,
        ..ViewerConfig::default()
    };
    GridViewer::new(Arc::new(reader()), config).unwrap()
}

fn assert_non_empty_file(path: &std::path::Path) {
    let meta = std::fs::metadata(path).unwrap();
    assert!(meta.is_file());
    assert!(meta.len() > 0, "{} is empty", path.display());
}

#[test]
fn test_pitch_angle_png() {
    let dir = output_dir("pitch_png");
    let mut v = plotting_viewer(dir.clone());
    v.set_picker(Picker::PitchAngle);
    match v.on_pick([1.5, 1.5, 0.5]).unwrap() {
        PickOutcome::PitchAngle { plot, .. } => {
            let path = plot.unwrap();
            assert_eq!(path, dir.join("pitch_angle_6.png"));
            assert_non_empty_file(&path);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_cut_through_png() {
    let dir = output_dir("cut_png");
    let mut v = plotting_viewer(dir.clone());
    v.set_picker(Picker::CutThrough);
    v.set_args("plot rho B,z");
    v.on_pick([0.5, 0.5, 0.5]).unwrap();
    match v.on_pick([3.5, 2.5, 0.5]).unwrap() {
        PickOutcome::CutThroughDone { plot, .. } => {
            let path = plot.unwrap();
            assert_eq!(path, dir.join("cut_through_1.png"));
            assert_non_empty_file(&path);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_failed_cut_plot_keeps_cut() {
    let dir = std::env::temp_dir()
        .join(format!("vlsvgrid_missing_{}", std::process::id()))
        .join("sub");
    let mut v = plotting_viewer(dir);
    v.set_picker(Picker::CutThrough);
    v.set_args("plot rho");
    v.on_pick([0.5, 0.5, 0.5]).unwrap();
    assert!(v.on_pick([3.5, 0.5, 0.5]).is_err());
    assert!(v.last_pick().is_none());
    let cut = v.cut_through().unwrap();
    assert_eq!(cut.cellids, vec![1, 2, 3, 4]);
    assert_eq!(cut.variables[0].data, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_leaving_cut_through_forgets_first_pick() {
    let mut v = viewer(false);
    v.set_picker(Picker::CutThrough);
    v.set_args("rho");
    v.on_pick([0.5, 0.5, 0.5]).unwrap();
    v.set_picker(Picker::None);
    v.on_pick([1.5, 0.5, 0.5]).unwrap();
    assert!(v.last_pick().is_none());
    v.set_picker(Picker::CutThrough);
    assert!(matches!(
        v.on_pick([2.5, 0.5, 0.5]).unwrap(),
        PickOutcome::CutThroughStarted(_)
    ));
}

#[test]
fn test_diff_grid() {
    let mut v = viewer(false);
    let fig = v.generate_diff_grid(6, 16).unwrap().unwrap();
    assert_eq!(fig.name, "6 16");
    assert_eq!(fig.cellids, vec![6, 16]);
    assert!(fig.b_glyph.is_none());
    let expected: Vec<f64> = (0..8).map(|v| v as f64).collect();
    assert_eq!(fig.grid.scalars, expected);
    assert!(v.generate_diff_grid(6, 1).unwrap().is_none());
    assert_eq!(v.figures().len(), 1);
}

#[test]
fn test_save_outputs() {
    init_logs();
    let dir = output_dir("save");
    let config = ViewerConfig {
        threaded: false,
        output_dir: dir.clone(),
        ..ViewerConfig::default()
    };
    let mut v = GridViewer::new(Arc::new(reader()), config).unwrap();
    let grid_path = v.save_grid().unwrap();
    assert_eq!(grid_path, dir.join("rho.vtk"));
    let text = std::fs::read_to_string(&grid_path).unwrap();
    assert!(text.contains("DIMENSIONS 5 5 2"));

    v.generate_velocity_grid(16, false).unwrap();
    let written = v.save_figure(0).unwrap();
    assert_eq!(written.len(), 2);
    let voxels = std::fs::read_to_string(&written[0]).unwrap();
    assert!(voxels.contains("CELL_TYPES 8"));
    let glyph = std::fs::read_to_string(&written[1]).unwrap();
    assert!(glyph.contains("VECTORS B_vector double"));
    assert!(v.save_figure(5).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_config_from_json() {
    init_logs();
    let config = ViewerConfig::from_json_str(
        r#"{"variable": "B", "operator": "z", "threaded": false, "histogram_bins": 10}"#,
    )
    .unwrap();
    let mut v = GridViewer::new(Arc::new(reader()), config).unwrap();
    assert!(v.grid().unwrap().scalars.iter().all(|b| (b - 5e-9).abs() < 1e-18));
    v.set_picker("Pitch_angle".parse().unwrap());
    match v.on_pick([3.5, 3.5, 0.5]).unwrap() {
        PickOutcome::PitchAngle { histogram, .. } => assert_eq!(histogram.bins(), 10),
        other => panic!("unexpected outcome {other:?}"),
    }
}
