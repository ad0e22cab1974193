//! Height ↔ airborne sediment exchange.
//!
//! Whatever leaves the ground enters suspension in the same cell and vice
//! versa, so `height + sediment` is unchanged by this stage.
use crate::grid::Grid;
use crate::kernel::{horn_gradient, length, Spacing};

use super::settings::WindKernelParams;

/// Cosine between the wind and the uphill direction, in `[-1, 1]` for
/// unit slopes; positive on windward faces.
#[inline]
pub fn facing(velocity: [f32; 2], gradient: [f32; 2]) -> f32 {
    let speed = length(velocity);
    if speed <= 0.0 {
        return 0.0;
    }
    (velocity[0] * gradient[0] + velocity[1] * gradient[1]) / speed
}

/// Height lifted into the air at `(r, c)` this step; negative when
/// sediment settles.
#[allow(clippy::too_many_arguments)]
pub fn suspend(
    height: &Grid<f32>,
    sediment: &Grid<f32>,
    velocity: &Grid<[f32; 2]>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    p: &WindKernelParams,
) -> f32 {
    let h = height.get(r, c).max(0.0);
    let s = sediment.get(r, c).max(0.0);
    let v = velocity.get(r, c);
    let speed = length(v);
    let f = facing(v, horn_gradient(height, r, c, spacing));

    let pickup = p.dt * speed * (p.suspension * (1.0 + p.slope_factor * f.max(0.0)) + p.abrasion * s);
    let settle = p.dt * p.deposition * s * (1.0 + p.slope_factor * (-f).max(0.0)) / (1.0 + speed * p.dt);
    (pickup - settle).clamp(-s, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wind::settings::WindSettings;

    fn spacing() -> Spacing {
        Spacing { dx: 1.0, dy: 1.0, height_scale: 50.0 }
    }

    fn ramp() -> Grid<f32> {
        let mut h = Grid::zeros(5, 5);
        for r in 0..5 {
            for c in 0..5 {
                h.set(r, c, 0.2 + c as f32 * 0.01);
            }
        }
        h
    }

    #[test]
    fn calm_air_only_settles() {
        let h = ramp();
        let s = Grid::new(5, 5, 1e-4);
        let v = Grid::zeros(5, 5);
        let p = WindSettings::default().kernel_params();
        let d = suspend(&h, &s, &v, 2, 2, &spacing(), &p);
        assert!(d < 0.0 && d >= -1e-4);
        assert_eq!(suspend(&h, &Grid::zeros(5, 5), &v, 2, 2, &spacing(), &p), 0.0);
    }

    #[test]
    fn windward_faces_lose_more_than_lee_faces() {
        let h = ramp();
        let s = Grid::zeros(5, 5);
        let p = WindSettings::default().kernel_params();
        let into_slope = suspend(&h, &s, &Grid::new(5, 5, [20.0, 0.0]), 2, 2, &spacing(), &p);
        let off_slope = suspend(&h, &s, &Grid::new(5, 5, [-20.0, 0.0]), 2, 2, &spacing(), &p);
        assert!(into_slope > off_slope && off_slope > 0.0);
    }

    #[test]
    fn abrasion_grows_with_load() {
        let h = ramp();
        let v = Grid::new(5, 5, [20.0, 0.0]);
        let p = WindKernelParams { deposition: 0.0, ..WindSettings::default().kernel_params() };
        let clean = suspend(&h, &Grid::zeros(5, 5), &v, 2, 2, &spacing(), &p);
        let loaded = suspend(&h, &Grid::new(5, 5, 0.01), &v, 2, 2, &spacing(), &p);
        assert!(loaded > clean);
    }

    #[test]
    fn exchange_never_exceeds_available_material() {
        let h = Grid::new(3, 3, 1e-7);
        let s = Grid::zeros(3, 3);
        let v = Grid::new(3, 3, [500.0, 0.0]);
        let p = WindSettings::default().kernel_params();
        assert!(suspend(&h, &s, &v, 1, 1, &spacing(), &p) <= 1e-7);
    }
}
