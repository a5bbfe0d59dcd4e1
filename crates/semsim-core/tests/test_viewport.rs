use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_relative_eq;

use semsim_core::error::SimError;
use semsim_core::state::MicroscopeState;
use semsim_core::viewport::ViewportResolver;

const SOURCE: (usize, usize) = (1024, 768);

fn state_at(magnification: f64) -> MicroscopeState {
    MicroscopeState {
        magnification,
        ..MicroscopeState::default()
    }
}

// ---------------------------------------------------------------------------
// Scale and placement
// ---------------------------------------------------------------------------

#[test]
fn test_matching_magnification_is_centered_identity() {
    let vp = ViewportResolver::default()
        .resolve(&state_at(1000.0), 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_eq!((vp.width, vp.height), (512, 384));
    assert_eq!(vp.scale, 1.0);
    assert_eq!((vp.center_x, vp.center_y), (512.0, 384.0));
    assert_eq!(vp.origin(), (256.0, 192.0));
    assert_eq!(vp.subpixel_offset(), (0.0, 0.0));

    // Output pixel centres land exactly on source pixel centres.
    assert_eq!(vp.source_position(0, 0), (192.0, 256.0));
    assert_eq!(vp.source_position(383, 511), (575.0, 767.0));
}

#[test]
fn test_scale_is_effective_over_requested() {
    let vp = ViewportResolver::default()
        .resolve(&state_at(2000.0), 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_eq!(vp.scale, 0.5);
    assert_eq!(vp.source_extent(), (256.0, 192.0));

    let vp = ViewportResolver::default()
        .resolve(&state_at(950.0), 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_relative_eq!(vp.scale, 1000.0 / 950.0, max_relative = 1e-12);
    assert!(vp.is_within_source(1e-9));
}

#[test]
fn test_zoom_out_is_limited_to_source() {
    // 10x on a 100x capture would need 10x the source width.
    let vp = ViewportResolver::default()
        .resolve(&state_at(10.0), 100.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_relative_eq!(vp.scale, 2.0, max_relative = 1e-12);
    assert!(vp.is_within_source(1e-9));
}

#[test]
fn test_pan_moves_center() {
    let state = MicroscopeState {
        pan_x: 40.0,
        pan_y: -25.5,
        ..state_at(1000.0)
    };
    let vp = ViewportResolver::default()
        .resolve(&state, 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_eq!((vp.center_x, vp.center_y), (552.0, 358.5));
    assert_eq!(vp.subpixel_offset(), (0.0, 0.5));
}

#[test]
fn test_image_shift_adds_to_pan() {
    let state = MicroscopeState {
        pan_x: 10.0,
        ..state_at(1000.0)
    };
    let vp = ViewportResolver::default()
        .resolve(&state, 1000.0, SOURCE, (5.0, -3.0))
        .unwrap();
    assert_eq!((vp.center_x, vp.center_y), (527.0, 381.0));
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

#[test]
fn test_viewport_never_leaves_source() {
    let resolver = ViewportResolver::default();
    let pans = [-1e9, -5000.0, -300.0, -1.5, 0.0, 2.25, 300.0, 5000.0, 1e9];
    let rotations = [0.0, 0.3, FRAC_PI_2, 2.0, PI, -0.7];
    for &mag in &[10.0, 500.0, 1000.0, 4000.0] {
        for &px in &pans {
            for &py in &pans {
                for &rot in &rotations {
                    let state = MicroscopeState {
                        pan_x: px,
                        pan_y: py,
                        scan_rotation: rot,
                        ..state_at(mag)
                    };
                    let vp = resolver.resolve(&state, 1000.0, SOURCE, (0.0, 0.0)).unwrap();
                    assert!(
                        vp.is_within_source(1e-6),
                        "mag={mag} pan=({px}, {py}) rot={rot} bounds={:?}",
                        vp.bounds()
                    );
                }
            }
        }
    }
}

#[test]
fn test_clamp_is_not_written_back() {
    let state = MicroscopeState {
        pan_x: 1e6,
        ..state_at(1000.0)
    };
    let before = state.clone();
    let vp = ViewportResolver::default()
        .resolve(&state, 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    assert_eq!(vp.center_x, 768.0);
    assert_eq!(state, before);
}

#[test]
fn test_quarter_turn_swaps_extents() {
    let state = MicroscopeState {
        scan_rotation: FRAC_PI_2,
        ..state_at(2000.0)
    };
    let vp = ViewportResolver::default()
        .resolve(&state, 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    let b = vp.bounds();
    assert_relative_eq!(b.max_x - b.min_x, 192.0, epsilon = 1e-9);
    assert_relative_eq!(b.max_y - b.min_y, 256.0, epsilon = 1e-9);
}

#[test]
fn test_rotation_walks_along_rotated_axes() {
    let state = MicroscopeState {
        scan_rotation: FRAC_PI_2,
        ..state_at(1000.0)
    };
    let vp = ViewportResolver::default()
        .resolve(&state, 1000.0, SOURCE, (0.0, 0.0))
        .unwrap();
    // Moving right along an output row moves down the source.
    let (y0, x0) = vp.source_position(100, 100);
    let (y1, x1) = vp.source_position(100, 101);
    assert_relative_eq!(y1 - y0, 1.0, epsilon = 1e-9);
    assert_relative_eq!(x1 - x0, 0.0, epsilon = 1e-9);
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_magnification_is_rejected() {
    let resolver = ViewportResolver::default();
    assert!(matches!(
        resolver.resolve(&state_at(0.0), 1000.0, SOURCE, (0.0, 0.0)),
        Err(SimError::InvalidParameter(_))
    ));
    assert!(matches!(
        resolver.resolve(&state_at(100.0), -1.0, SOURCE, (0.0, 0.0)),
        Err(SimError::InvalidParameter(_))
    ));
    assert!(matches!(
        resolver.resolve(&state_at(100.0), 100.0, (0, 768), (0.0, 0.0)),
        Err(SimError::InvalidParameter(_))
    ));
}
