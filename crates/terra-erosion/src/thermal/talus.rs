//! Slope-threshold (talus) relaxation kernels, shared by every solver.
//!
//! Each pass has two dispatches.  `talus_outflow` decides, per cell, how much
//! material leaves toward each D8 neighbour whose drop exceeds
//! `tan(repose) × distance`; `talus_apply` gathers the result.  Whatever a
//! cell sends, a neighbour receives, so total height is conserved.  Lanes
//! pointing outside the grid are always zero (no-flux boundary).
use rand::Rng;

use crate::fields::FieldStore;
use crate::grid::Grid;
use crate::kernel::{dispatch, opposite, Spacing, D8_OFFSETS};

/// Largest time delta at which one pass cannot overshoot a two-cell step.
pub const THERMAL_STABLE_DT: f32 = 0.01;

/// Upper clamp for any repose angle, degrees.
pub const MAX_REPOSE_DEG: f32 = 89.9;

/// Repose threshold and time step of one relaxation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TalusParams {
    pub dt: f32,
    /// Angle of repose in degrees along `[x, y]`.
    pub repose_deg: [f32; 2],
}

impl TalusParams {
    pub fn new(dt: f32, repose_deg: [f32; 2]) -> Self {
        Self { dt, repose_deg }
    }

    #[inline]
    fn tan_for(&self, k: usize, extra_deg: f32) -> f32 {
        let t = |deg: f32| (deg + extra_deg).clamp(0.0, MAX_REPOSE_DEG).to_radians().tan();
        match D8_OFFSETS[k] {
            (0, _) => t(self.repose_deg[0]),
            (_, 0) => t(self.repose_deg[1]),
            _ => 0.5 * (t(self.repose_deg[0]) + t(self.repose_deg[1])),
        }
    }
}

/// Draw this iteration's repose angle: `base ± 0.9 × jitter / 2`, clamped
/// to `[0, MAX_REPOSE_DEG]`.  Both axes get the same value.
pub fn jittered_repose<R: Rng>(rng: &mut R, base_deg: f32, jitter_deg: f32) -> [f32; 2] {
    let offset = if jitter_deg > 0.0 {
        rng.gen_range(-1.0f32..=1.0) * 0.9 * jitter_deg * 0.5
    } else {
        0.0
    };
    let angle = (base_deg + offset).clamp(0.0, MAX_REPOSE_DEG);
    [angle, angle]
}

/// Optional per-cell modifiers of the relaxation.
#[derive(Clone, Copy, Default)]
pub struct TalusMasks<'a> {
    /// 0 = loose, 1 = immovable.
    pub hardness: Option<&'a Grid<f32>>,
    /// Degrees added to the repose angle.
    pub repose: Option<&'a Grid<f32>>,
    /// Cells above 0.5 neither give nor receive material.
    pub collision: Option<&'a Grid<f32>>,
}

impl TalusMasks<'_> {
    #[inline]
    fn blocked(&self, r: usize, c: usize) -> bool {
        self.collision.is_some_and(|m| m.get(r, c) > 0.5)
    }
}

/// Material leaving cell `(r, c)` toward each D8 neighbour, in normalised
/// height units.
pub fn talus_outflow(
    h: &Grid<f32>,
    masks: &TalusMasks<'_>,
    r: usize,
    c: usize,
    spacing: &Spacing,
    params: &TalusParams,
) -> [f32; 8] {
    let mut lanes = [0.0f32; 8];
    if masks.blocked(r, c) {
        return lanes;
    }

    let z0 = h.get(r, c);
    let extra = masks.repose.map_or(0.0, |m| m.get(r, c));
    let mut excess = [0.0f32; 8];
    let mut total = 0.0f32;
    let mut max_excess = 0.0f32;

    for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
        let (nr, nc) = (r as isize + dr, c as isize + dc);
        let Some(z1) = h.try_get(nr, nc) else { continue };
        if masks.blocked(nr as usize, nc as usize) {
            continue;
        }
        let dist = spacing.d8_distance(k);
        let drop_world = (z0 - z1) * spacing.height_scale;
        let e = drop_world - params.tan_for(k, extra) * dist;
        if e > 0.0 {
            excess[k] = e;
            total += e;
            max_excess = max_excess.max(e);
        }
    }

    if total <= 0.0 {
        return lanes;
    }

    let loose = 1.0 - masks.hardness.map_or(0.0, |m| m.get(r, c).clamp(0.0, 1.0));
    let amount_world = 0.5 * max_excess * (params.dt / THERMAL_STABLE_DT) * loose;
    let amount = amount_world / spacing.height_scale;
    for k in 0..8 {
        lanes[k] = amount * excess[k] / total;
    }
    lanes
}

/// Net material gained by `(r, c)` in one pass: what its neighbours sent
/// toward it minus what it sent.
pub fn talus_net(outflow: &Grid<[f32; 8]>, r: usize, c: usize) -> f32 {
    let sent: f32 = outflow.get(r, c).iter().sum();
    let mut received = 0.0f32;
    for (k, &(dr, dc)) in D8_OFFSETS.iter().enumerate() {
        if let Some(lanes) = outflow.try_get(r as isize + dr, c as isize + dc) {
            received += lanes[opposite(k)];
        }
    }
    received - sent
}

#[inline]
pub fn talus_apply(h: &Grid<f32>, outflow: &Grid<[f32; 8]>, r: usize, c: usize) -> f32 {
    h.get(r, c) + talus_net(outflow, r, c)
}

/// Field names a solver uses for relaxation.
#[derive(Debug, Clone, Copy)]
pub struct TalusFields {
    pub height: &'static str,
    pub outflow: &'static str,
    pub hardness: Option<&'static str>,
    pub repose: Option<&'static str>,
    pub collision: Option<&'static str>,
}

/// One relaxation pass over the store: outflow dispatch, then a ping-pong
/// step of the height field.
pub fn relax(store: &mut FieldStore, fields: &TalusFields, spacing: &Spacing, params: &TalusParams) {
    store.write::<[f32; 8], _>(fields.outflow, |s, out| {
        let h = s.front::<f32>(fields.height);
        let masks = TalusMasks {
            hardness: fields.hardness.map(|n| s.front::<f32>(n)),
            repose: fields.repose.map(|n| s.front::<f32>(n)),
            collision: fields.collision.map(|n| s.front::<f32>(n)),
        };
        dispatch("talus_outflow", out, |r, c| talus_outflow(h, &masks, r, c, spacing, params));
    });
    store.step::<f32, _>(fields.height, |s, out| {
        let h = s.front::<f32>(fields.height);
        let outflow = s.front::<[f32; 8]>(fields.outflow);
        dispatch("talus_apply", out, |r, c| talus_apply(h, outflow, r, c));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn unit_spacing() -> Spacing {
        Spacing { dx: 1.0, dy: 1.0, height_scale: 1.0 }
    }

    fn run(h: &Grid<f32>, masks: &TalusMasks<'_>, params: &TalusParams) -> Grid<f32> {
        let sp = unit_spacing();
        let mut outflow: Grid<[f32; 8]> = Grid::zeros(h.width, h.height);
        dispatch("outflow", &mut outflow, |r, c| talus_outflow(h, masks, r, c, &sp, params));
        let mut next = Grid::zeros(h.width, h.height);
        dispatch("apply", &mut next, |r, c| talus_apply(h, &outflow, r, c));
        next
    }

    #[test]
    fn one_sided_cliff_moves_material_downhill() {
        let mut h = Grid::zeros(5, 5);
        h.set(2, 2, 10.0);
        let next = run(&h, &TalusMasks::default(), &TalusParams::new(0.005, [30.0, 30.0]));
        assert!(next.get(2, 2) < 10.0);
        assert!(next.get(2, 3) > 0.0);
        assert!(next.get(1, 1) > 0.0);
    }

    #[test]
    fn mass_is_conserved_at_edges() {
        // A spike on the corner cell: lanes pointing off-grid must carry nothing.
        let mut h = Grid::zeros(4, 4);
        h.set(0, 0, 5.0);
        h.set(3, 2, 2.0);
        let before = h.sum();
        let next = run(&h, &TalusMasks::default(), &TalusParams::new(0.01, [20.0, 20.0]));
        assert!((next.sum() - before).abs() < 1e-5);
    }

    #[test]
    fn gentle_slope_unchanged() {
        let mut h = Grid::zeros(6, 6);
        for r in 0..6 {
            for c in 0..6 {
                h.set(r, c, c as f32 * 0.1);
            }
        }
        let next = run(&h, &TalusMasks::default(), &TalusParams::new(0.005, [30.0, 30.0]));
        assert_eq!(next, h);
    }

    #[test]
    fn hard_cells_do_not_release() {
        let mut h = Grid::zeros(3, 3);
        h.set(1, 1, 10.0);
        let hard = Grid::new(3, 3, 1.0);
        let masks = TalusMasks { hardness: Some(&hard), ..TalusMasks::default() };
        let next = run(&h, &masks, &TalusParams::new(0.005, [30.0, 30.0]));
        assert_eq!(next, h);
    }

    #[test]
    fn collision_cells_neither_give_nor_receive() {
        let mut h = Grid::zeros(3, 1);
        h.set(0, 0, 10.0);
        let mut wall = Grid::zeros(3, 1);
        wall.set(0, 1, 1.0);
        let masks = TalusMasks { collision: Some(&wall), ..TalusMasks::default() };
        let next = run(&h, &masks, &TalusParams::new(0.005, [30.0, 30.0]));
        assert_eq!(next, h);
    }

    #[test]
    fn jitter_stays_in_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let [a, b] = jittered_repose(&mut rng, 30.0, 10.0);
            assert_eq!(a, b);
            assert!((25.5..=34.5).contains(&a), "angle {a}");
        }
        let [steep, _] = jittered_repose(&mut rng, 89.0, 10.0);
        assert!(steep <= MAX_REPOSE_DEG);
    }
}
