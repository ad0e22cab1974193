//! Brush-stamp compositing: blend a solver's result back into the terrain
//! through a mask and a strength.
use log::debug;

use crate::eroder::{ErodeParams, Eroder, HARDNESS, HEIGHT};
use crate::error::{ErosionError, Result};
use crate::grid::{Grid, HeightField};

/// Per-texel blend weight of one stamp.  Never written by a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushMask {
    pub mask: Grid<f32>,
    pub strength: f32,
}

impl BrushMask {
    pub fn uniform(width: usize, height: usize, strength: f32) -> Self {
        Self { mask: Grid::new(width, height, 1.0), strength }
    }

    /// Disc of `radius` cells centred on the grid, full weight in the middle
    /// and a smoothstep falloff to zero at the rim.
    pub fn radial(width: usize, height: usize, radius: f32, strength: f32) -> Self {
        let (cy, cx) = ((height as f32 - 1.0) / 2.0, (width as f32 - 1.0) / 2.0);
        let mut mask = Grid::zeros(width, height);
        for r in 0..height {
            for c in 0..width {
                let d = ((r as f32 - cy).powi(2) + (c as f32 - cx).powi(2)).sqrt();
                let t = (1.0 - d / radius.max(f32::EPSILON)).clamp(0.0, 1.0);
                mask.set(r, c, t * t * (3.0 - 2.0 * t));
            }
        }
        Self { mask, strength }
    }

    #[inline]
    pub fn weight(&self, r: usize, c: usize) -> f32 {
        (self.mask.get(r, c) * self.strength).clamp(0.0, 1.0)
    }
}

/// `original + (eroded − original) × weight`, cell by cell.
pub fn composite(original: &HeightField, eroded: &HeightField, brush: &BrushMask) -> HeightField {
    assert!(
        original.same_size(eroded) && original.same_size(&brush.mask),
        "composite: original {}×{}, eroded {}×{}, mask {}×{}",
        original.width,
        original.height,
        eroded.width,
        eroded.height,
        brush.mask.width,
        brush.mask.height
    );
    let mut out = original.clone();
    for r in 0..original.height {
        for c in 0..original.width {
            let o = original.get(r, c);
            out.set(r, c, o + (eroded.get(r, c) - o) * brush.weight(r, c));
        }
    }
    out
}

/// Run one stamp of `eroder` over `patch` and return the patch with the
/// blended result written into `params.domain`.  `brush` covers the domain.
pub fn apply_stamp(
    eroder: &mut dyn Eroder,
    patch: &HeightField,
    hardness: Option<&HeightField>,
    brush: &BrushMask,
    params: &ErodeParams,
) -> Result<HeightField> {
    let domain = params.domain;
    if (brush.mask.width, brush.mask.height) != (domain.width, domain.height) {
        return Err(ErosionError::InputSizeMismatch {
            name: "Brush Mask".to_string(),
            expected: (domain.width, domain.height),
            got: (brush.mask.width, brush.mask.height),
        });
    }

    eroder.clear_inputs();
    eroder.set_input(HEIGHT, patch.clone());
    if let Some(h) = hardness {
        eroder.set_input(HARDNESS, h.clone());
    }
    eroder.erode(params)?;

    let eroded = eroder.outputs().scalar(HEIGHT).ok_or(ErosionError::MissingOutput(HEIGHT))?;
    let original = patch.crop(domain);
    let blended = composite(&original, eroded, brush);
    debug!(
        "{}: stamp at ({}, {}), strength {}, mean Δh {:.3e}",
        eroder.name(),
        domain.x,
        domain.y,
        brush.strength,
        blended.mean() - original.mean()
    );

    let mut out = patch.clone();
    out.blit(&blended, domain);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Rect;
    use crate::synthetic;
    use crate::thermal::{ThermalEroder, ThermalSettings};

    const DIMS: [f64; 3] = [64.0, 100.0, 64.0];

    #[test]
    fn zero_strength_keeps_original() {
        let original = synthetic::cone(8, 8, 0.0, 1.0, 3.0);
        let eroded = HeightField::new(8, 8, 0.5);
        let out = composite(&original, &eroded, &BrushMask::uniform(8, 8, 0.0));
        assert_eq!(out, original);
    }

    #[test]
    fn full_strength_takes_eroded() {
        let original = HeightField::new(4, 4, 0.2);
        let eroded = HeightField::new(4, 4, 0.7);
        let out = composite(&original, &eroded, &BrushMask::uniform(4, 4, 3.0));
        for v in out.data {
            assert!((v - 0.7).abs() < 1e-6);
        }
    }

    #[test]
    fn radial_mask_fades_out() {
        let brush = BrushMask::radial(9, 9, 4.0, 1.0);
        assert_eq!(brush.weight(4, 4), 1.0);
        assert_eq!(brush.weight(0, 0), 0.0);
        assert!(brush.weight(4, 6) > 0.0 && brush.weight(4, 6) < 1.0);
    }

    #[test]
    fn stamp_only_touches_domain() {
        let patch = synthetic::spike(16, 16, 0.0, 0.5);
        let mut eroder = ThermalEroder::new(ThermalSettings { iterations: 20, ..Default::default() });
        let mut params = ErodeParams::for_patch(16, 16, DIMS, [1.0, 1.0]);
        params.domain = Rect::new(4, 4, 9, 9);
        let brush = BrushMask::uniform(9, 9, 1.0);
        let out = apply_stamp(&mut eroder, &patch, None, &brush, &params).unwrap();

        assert_eq!(out.get(0, 0), patch.get(0, 0));
        assert_eq!(out.get(15, 15), patch.get(15, 15));
        assert!(out.get(8, 8) < patch.get(8, 8));
        // The mask itself is left alone.
        assert_eq!(brush, BrushMask::uniform(9, 9, 1.0));
    }

    #[test]
    fn zero_strength_stamp_is_identity() {
        let patch = synthetic::fbm(16, 16, 2, 0.0, 0.8);
        let mut eroder = ThermalEroder::default();
        let params = ErodeParams::for_patch(16, 16, DIMS, [1.0, 1.0]);
        let out = apply_stamp(&mut eroder, &patch, None, &BrushMask::uniform(16, 16, 0.0), &params).unwrap();
        assert_eq!(out, patch);
    }

    #[test]
    fn mask_must_match_domain() {
        let patch = HeightField::new(8, 8, 0.3);
        let mut eroder = ThermalEroder::default();
        let params = ErodeParams::for_patch(8, 8, DIMS, [1.0, 1.0]);
        let err = apply_stamp(&mut eroder, &patch, None, &BrushMask::uniform(4, 4, 1.0), &params);
        assert!(matches!(err, Err(ErosionError::InputSizeMismatch { .. })));
    }
}
