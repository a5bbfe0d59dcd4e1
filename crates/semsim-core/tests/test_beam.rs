use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use approx::assert_relative_eq;

use semsim_core::beam::{nm_per_pixel, BeamModel, BeamParameters, ColumnAberrations};
use semsim_core::config::{ColumnConfig, SimulatorConfig};
use semsim_core::error::SimError;
use semsim_core::state::MicroscopeState;

fn model() -> BeamModel {
    BeamModel::from_config(&SimulatorConfig::default()).unwrap()
}

fn params(focus: f64) -> BeamParameters {
    BeamParameters {
        focus,
        stigmator_x: 0.0,
        stigmator_y: 0.0,
        accelerating_voltage: 15.0,
        working_distance: 10.0,
        screen_halfwidth: 57.15,
        magnification: 1000.0,
        aperture_offset_x: 0.0,
        aperture_offset_y: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn test_zero_focus_zero_stigmation_is_identity() {
    let m = model();
    for kv in [1.0, 5.0, 15.0, 30.0] {
        for mag in [10.0, 950.0, 100_000.0] {
            let p = BeamParameters {
                accelerating_voltage: kv,
                magnification: mag,
                ..params(0.0)
            };
            let k = m.compute_kernel(&p).unwrap();
            assert!(k.is_identity(), "kv={kv} mag={mag} gave {k:?}");
            assert_eq!(k.halfwidth_major_nm, 0.0);
            assert_eq!(k.halfwidth_minor_nm, 0.0);
            assert_eq!(k.shift_x, 0.0);
            assert_eq!(k.shift_y, 0.0);
        }
    }
}

// ---------------------------------------------------------------------------
// Defocus
// ---------------------------------------------------------------------------

#[test]
fn test_defocus_halfwidth_closed_form() {
    // alpha = 0.1 / 10 = 0.01 rad, V = V_ref, so r = 0.1 mm * 0.01 = 1000 nm.
    let k = model().compute_kernel(&params(0.1)).unwrap();
    assert_relative_eq!(k.halfwidth_major_nm, 1000.0, max_relative = 1e-12);
    assert_relative_eq!(k.halfwidth_minor_nm, 1000.0, max_relative = 1e-12);

    let px = nm_per_pixel(57.15, 1000.0);
    assert_relative_eq!(px, 223.2421875, max_relative = 1e-12);
    assert_relative_eq!(k.sigma_x, 1000.0 / px, max_relative = 1e-12);
    assert_eq!(k.ellipticity(), 1.0);
}

#[test]
fn test_halfwidth_strictly_increases_with_defocus() {
    let m = model();
    let mut last = 0.0;
    for step in 1..20 {
        let focus = step as f64 * 0.05;
        let k = m.compute_kernel(&params(focus)).unwrap();
        assert!(
            k.halfwidth_major_nm > last,
            "halfwidth should grow with |focus|: {} <= {last} at {focus}",
            k.halfwidth_major_nm
        );
        last = k.halfwidth_major_nm;

        let under = m.compute_kernel(&params(-focus)).unwrap();
        assert_eq!(under.halfwidth_major_nm, k.halfwidth_major_nm);
    }
}

#[test]
fn test_halfwidth_strictly_decreases_with_voltage() {
    let m = model();
    let mut last = f64::INFINITY;
    for kv in [1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0] {
        let p = BeamParameters {
            accelerating_voltage: kv,
            ..params(0.2)
        };
        let k = m.compute_kernel(&p).unwrap();
        assert!(k.halfwidth_major_nm < last, "not decreasing at {kv} kV");
        last = k.halfwidth_major_nm;
    }
}

#[test]
fn test_longer_working_distance_narrows_cone() {
    let m = model();
    let near = m.compute_kernel(&params(0.2)).unwrap();
    let far = m
        .compute_kernel(&BeamParameters {
            working_distance: 20.0,
            ..params(0.2)
        })
        .unwrap();
    assert_relative_eq!(far.halfwidth_major_nm * 2.0, near.halfwidth_major_nm, max_relative = 1e-12);
}

// ---------------------------------------------------------------------------
// Astigmatism
// ---------------------------------------------------------------------------

#[test]
fn test_astigmatic_line_focus_along_stigmator_axis() {
    let p = BeamParameters {
        stigmator_x: 0.2,
        ..params(0.1)
    };
    let k = model().compute_kernel(&p).unwrap();
    // Line foci at 0.1 +- 0.1: one width is 0.2 mm, the other collapses to 0.
    assert_relative_eq!(k.halfwidth_major_nm, 2000.0, max_relative = 1e-12);
    assert_eq!(k.halfwidth_minor_nm, 0.0);
    assert_eq!(k.orientation, 0.0);
    assert!(!k.is_identity());
    assert!(k.ellipticity().is_infinite());
}

#[test]
fn test_major_axis_flips_through_focus() {
    let m = model();
    let over = m
        .compute_kernel(&BeamParameters {
            stigmator_x: 0.2,
            ..params(0.1)
        })
        .unwrap();
    let under = m
        .compute_kernel(&BeamParameters {
            stigmator_x: 0.2,
            ..params(-0.1)
        })
        .unwrap();
    assert_relative_eq!(over.halfwidth_major_nm, under.halfwidth_major_nm, max_relative = 1e-12);
    assert_relative_eq!((over.orientation - under.orientation).abs(), FRAC_PI_2, epsilon = 1e-12);
}

#[test]
fn test_stigmator_y_rotates_axis_by_45_degrees() {
    let k = model()
        .compute_kernel(&BeamParameters {
            stigmator_y: 0.2,
            ..params(0.1)
        })
        .unwrap();
    assert_relative_eq!(k.orientation, FRAC_PI_4, epsilon = 1e-12);
}

#[test]
fn test_astigmatism_at_midpoint_is_round() {
    let k = model()
        .compute_kernel(&BeamParameters {
            stigmator_x: 0.3,
            stigmator_y: -0.4,
            ..params(0.0)
        })
        .unwrap();
    assert_relative_eq!(k.halfwidth_major_nm, k.halfwidth_minor_nm, max_relative = 1e-12);
    assert!(k.halfwidth_major_nm > 0.0);
}

#[test]
fn test_orientation_stays_in_half_open_range() {
    let m = model();
    for i in 0..32 {
        let angle = i as f64 / 32.0 * std::f64::consts::TAU;
        for focus in [-0.3, 0.3] {
            let k = m
                .compute_kernel(&BeamParameters {
                    stigmator_x: 0.2 * angle.cos(),
                    stigmator_y: 0.2 * angle.sin(),
                    ..params(focus)
                })
                .unwrap();
            assert!(k.orientation > -FRAC_PI_2 && k.orientation <= FRAC_PI_2);
            assert!(k.halfwidth_major_nm >= k.halfwidth_minor_nm);
        }
    }
}

// ---------------------------------------------------------------------------
// Aperture
// ---------------------------------------------------------------------------

#[test]
fn test_misaligned_aperture_shifts_only_when_defocused() {
    let m = model();
    let focused = m
        .compute_kernel(&BeamParameters {
            aperture_offset_x: 0.1,
            ..params(0.0)
        })
        .unwrap();
    assert_eq!(focused.shift_x, 0.0);

    let over = m
        .compute_kernel(&BeamParameters {
            aperture_offset_x: 0.1,
            ..params(0.5)
        })
        .unwrap();
    let under = m
        .compute_kernel(&BeamParameters {
            aperture_offset_x: 0.1,
            ..params(-0.5)
        })
        .unwrap();
    assert!(over.shift_x > 0.0);
    assert_relative_eq!(over.shift_x, -under.shift_x, max_relative = 1e-12);
    assert_eq!(over.shift_y, 0.0);

    // Tilt adds a little blur on top of plain defocus.
    let plain = m.compute_kernel(&params(0.5)).unwrap();
    assert!(over.halfwidth_major_nm > plain.halfwidth_major_nm);

    // 0.1 mm * 0.5 / 10 = 5000 nm at 223.24 nm per pixel.
    assert_relative_eq!(over.shift_x, 5000.0 / 223.2421875, max_relative = 1e-12);
}

#[test]
fn test_misaligned_aperture_in_focus_is_identity() {
    let m = model();
    for (ax, ay) in [(0.1, 0.0), (0.0, -0.2), (0.15, 0.07)] {
        let kernel = m
            .compute_kernel(&BeamParameters {
                aperture_offset_x: ax,
                aperture_offset_y: ay,
                ..params(0.0)
            })
            .unwrap();
        assert!(kernel.is_identity(), "offset ({ax}, {ay}) gave {kernel:?}");
        assert_eq!(kernel.halfwidth_major_nm, 0.0);
        assert_eq!(kernel.sigma_x, 0.0);
        assert_eq!(kernel.sigma_y, 0.0);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_inputs_are_rejected() {
    let m = model();
    let bad = [
        BeamParameters { magnification: 0.0, ..params(0.1) },
        BeamParameters { magnification: -5.0, ..params(0.1) },
        BeamParameters { accelerating_voltage: 0.0, ..params(0.1) },
        BeamParameters { working_distance: -1.0, ..params(0.1) },
        BeamParameters { screen_halfwidth: 0.0, ..params(0.1) },
        BeamParameters { focus: f64::NAN, ..params(0.1) },
        BeamParameters { stigmator_x: f64::INFINITY, ..params(0.1) },
    ];
    for p in bad {
        assert!(
            matches!(m.compute_kernel(&p), Err(SimError::InvalidParameter(_))),
            "{p:?} should be rejected"
        );
    }
}

#[test]
fn test_model_rejects_bad_optics() {
    assert!(BeamModel::new(0.0, 15.0).is_err());
    assert!(BeamModel::new(0.1, -1.0).is_err());
    assert!(BeamModel::new(0.1, 15.0).is_ok());
}

// ---------------------------------------------------------------------------
// Column aberrations
// ---------------------------------------------------------------------------

#[test]
fn test_aberrations_combine_with_controls() {
    let state = MicroscopeState {
        stigmator_x: 0.1,
        aperture_x: 0.05,
        ..MicroscopeState::default()
    };
    let aberrations = ColumnAberrations {
        astigmatism_x: -0.1,
        astigmatism_y: 0.2,
        misalignment_x: 0.05,
        misalignment_y: -0.02,
    };
    let p = BeamParameters::from_state(&state, &aberrations, 500.0);
    assert_eq!(p.stigmator_x, 0.0);
    assert_eq!(p.stigmator_y, 0.2);
    assert_eq!(p.aperture_offset_x, 0.0);
    assert_eq!(p.aperture_offset_y, 0.02);
    assert_eq!(p.magnification, 500.0);
}

#[test]
fn test_seeded_aberrations_are_reproducible() {
    let config = ColumnConfig {
        randomize: true,
        seed: Some(42),
        ..ColumnConfig::default()
    };
    let a = ColumnAberrations::from_config(&config);
    let b = ColumnAberrations::from_config(&config);
    assert_eq!(a, b);
    assert_ne!(a, ColumnAberrations::none());

    let off = ColumnAberrations::from_config(&ColumnConfig::default());
    assert_eq!(off, ColumnAberrations::none());
}
