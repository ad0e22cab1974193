//! The call contract shared by every solver.
//!
//! A caller sets named input grids (`Height`, optionally `Hardness`), calls
//! `erode` once per brush stamp, then reads named output fields cropped to
//! the domain rectangle.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErosionError, Result};
use crate::fields::{Element, FieldData};
use crate::grid::{Grid, HeightField, Rect};

pub const HEIGHT: &str = "Height";
pub const HARDNESS: &str = "Hardness";

/// Per-stamp geometry passed to `Eroder::erode`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErodeParams {
    /// World size of the whole terrain `(x, y, z)`; `y` is the height that a
    /// normalised value of 1.0 represents.
    pub terrain_dimensions: [f64; 3],
    /// Simulated rectangle, in texels of the `Height` input.
    pub domain: Rect,
    /// World size of one texel `(x, z)`.
    pub texel_size: [f64; 2],
    /// Negate the net height change after simulating.
    pub invert_effect: bool,
}

impl ErodeParams {
    /// Parameters that simulate an entire `width × height` patch.
    pub fn for_patch(width: usize, height: usize, terrain_dimensions: [f64; 3], texel_size: [f64; 2]) -> Self {
        Self {
            terrain_dimensions,
            domain: Rect::full(width, height),
            texel_size,
            invert_effect: false,
        }
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert_effect = invert;
        self
    }

    fn validate(&self) -> Result<()> {
        let scales: Vec<f64> = self
            .terrain_dimensions
            .iter()
            .chain(self.texel_size.iter())
            .copied()
            .collect();
        if scales.iter().all(|v| v.is_finite() && *v > 0.0) {
            Ok(())
        } else {
            Err(ErosionError::InvalidScale(scales))
        }
    }
}

/// Named input grids supplied by the caller before `erode`.
#[derive(Debug, Clone, Default)]
pub struct InputFields {
    fields: BTreeMap<String, HeightField>,
}

impl InputFields {
    pub fn set(&mut self, name: &str, grid: HeightField) {
        self.fields.insert(name.to_string(), grid);
    }

    pub fn get(&self, name: &str) -> Option<&HeightField> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeightField> {
        self.fields.remove(name)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// Named output fields produced by the last `erode`, cropped to its domain.
#[derive(Debug, Clone, Default)]
pub struct OutputFields {
    fields: BTreeMap<String, FieldData>,
}

impl OutputFields {
    pub fn insert(&mut self, name: &str, data: FieldData) {
        self.fields.insert(name.to_string(), data);
    }

    pub fn get(&self, name: &str) -> Option<&FieldData> {
        self.fields.get(name)
    }

    pub fn grid<T: Element>(&self, name: &str) -> Option<&Grid<T>> {
        self.fields.get(name).and_then(|d| d.as_grid::<T>())
    }

    pub fn scalar(&self, name: &str) -> Option<&Grid<f32>> {
        self.grid::<f32>(name)
    }

    pub fn vector(&self, name: &str) -> Option<&Grid<[f32; 2]>> {
        self.grid::<[f32; 2]>(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

/// A grid-based erosion solver.
pub trait Eroder {
    /// Short solver name, used in logs.
    fn name(&self) -> &'static str;

    fn inputs_mut(&mut self) -> &mut InputFields;

    fn set_input(&mut self, name: &str, grid: HeightField) {
        self.inputs_mut().set(name, grid);
    }

    fn clear_inputs(&mut self) {
        self.inputs_mut().clear();
    }

    /// Run one full simulation for a brush stamp.  Fails before touching any
    /// working grid if `Height` is missing or the geometry is invalid.
    fn erode(&mut self, params: &ErodeParams) -> Result<()>;

    fn outputs(&self) -> &OutputFields;

    /// Drop every working grid.  The next `erode` reallocates.
    fn release(&mut self);
}

/// Inputs of one stamp, validated and cropped to the domain rectangle.
pub(crate) struct DomainPatch {
    pub height: HeightField,
    pub hardness: Option<HeightField>,
}

pub(crate) fn prepare(inputs: &InputFields, params: &ErodeParams) -> Result<DomainPatch> {
    let height = inputs.get(HEIGHT).ok_or(ErosionError::MissingInput(HEIGHT))?;
    params.validate()?;

    let domain = params.domain;
    if domain.is_empty() || !domain.fits_within(height.width, height.height) {
        return Err(ErosionError::DomainOutOfBounds {
            domain,
            width: height.width,
            height: height.height,
        });
    }

    let hardness = match inputs.get(HARDNESS) {
        Some(h) if !h.same_size(height) => {
            return Err(ErosionError::InputSizeMismatch {
                name: HARDNESS.to_string(),
                expected: (height.width, height.height),
                got: (h.width, h.height),
            })
        }
        Some(h) => Some(h.crop(domain)),
        None => None,
    };

    Ok(DomainPatch { height: height.crop(domain), hardness })
}

/// Apply the invert flag: `h0 - (h - h0)` when set.
pub(crate) fn apply_invert(original: &HeightField, mut eroded: HeightField, invert: bool) -> HeightField {
    if invert {
        for (e, &o) in eroded.data.iter_mut().zip(original.data.iter()) {
            *e = 2.0 * o - *e;
        }
    }
    eroded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs_with_height(w: usize, h: usize) -> InputFields {
        let mut inputs = InputFields::default();
        inputs.set(HEIGHT, Grid::new(w, h, 0.5));
        inputs
    }

    #[test]
    fn missing_height_is_rejected() {
        let params = ErodeParams::for_patch(8, 8, [100.0, 50.0, 100.0], [1.0, 1.0]);
        let err = prepare(&InputFields::default(), &params).err();
        assert_eq!(err, Some(ErosionError::MissingInput(HEIGHT)));
    }

    #[test]
    fn domain_outside_input_is_rejected() {
        let mut params = ErodeParams::for_patch(8, 8, [100.0, 50.0, 100.0], [1.0, 1.0]);
        params.domain = Rect::new(4, 4, 8, 8);
        assert!(matches!(
            prepare(&inputs_with_height(8, 8), &params),
            Err(ErosionError::DomainOutOfBounds { .. })
        ));
    }

    #[test]
    fn overflowing_domain_is_rejected() {
        let mut params = ErodeParams::for_patch(8, 8, [100.0, 50.0, 100.0], [1.0, 1.0]);
        params.domain = Rect::new(usize::MAX, 0, 2, 2);
        assert!(matches!(
            prepare(&inputs_with_height(8, 8), &params),
            Err(ErosionError::DomainOutOfBounds { .. })
        ));
    }

    #[test]
    fn hardness_size_mismatch_is_rejected() {
        let mut inputs = inputs_with_height(8, 8);
        inputs.set(HARDNESS, Grid::zeros(4, 4));
        let params = ErodeParams::for_patch(8, 8, [100.0, 50.0, 100.0], [1.0, 1.0]);
        assert!(matches!(
            prepare(&inputs, &params),
            Err(ErosionError::InputSizeMismatch { .. })
        ));
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let params = ErodeParams::for_patch(8, 8, [100.0, 0.0, 100.0], [1.0, 1.0]);
        assert!(matches!(
            prepare(&inputs_with_height(8, 8), &params),
            Err(ErosionError::InvalidScale(_))
        ));
    }

    #[test]
    fn prepare_crops_to_domain() {
        let mut params = ErodeParams::for_patch(8, 8, [100.0, 50.0, 100.0], [1.0, 1.0]);
        params.domain = Rect::new(2, 1, 5, 3);
        let patch = prepare(&inputs_with_height(8, 8), &params).unwrap();
        assert_eq!((patch.height.width, patch.height.height), (5, 3));
        assert!(patch.hardness.is_none());
    }

    #[test]
    fn invert_mirrors_change() {
        let original = Grid::new(2, 1, 0.5);
        let mut eroded = original.clone();
        eroded.data = vec![0.4, 0.7];
        let inv = apply_invert(&original, eroded, true);
        assert!((inv.data[0] - 0.6).abs() < 1e-6);
        assert!((inv.data[1] - 0.3).abs() < 1e-6);
    }
}
