use serde::{Deserialize, Serialize};

/// Value stored in one grid cell.  Scalars are `f32`; vector and flux cells
/// are fixed-size `f32` arrays so every field shares one storage layout.
pub trait Cell: Copy + Default + Send + Sync + 'static {
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Cell for f32 {
    #[inline]
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

macro_rules! array_cell {
    ($($n:literal),*) => {$(
        impl Cell for [f32; $n] {
            #[inline]
            fn lerp(a: Self, b: Self, t: f32) -> Self {
                let mut out = a;
                for (o, &v) in out.iter_mut().zip(b.iter()) {
                    *o += (v - *o) * t;
                }
                out
            }
        }
    )*};
}

array_cell!(2, 4, 8);

/// Axis-aligned texel rectangle inside a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole `width × height` grid.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the rectangle lies entirely inside a `width × height` grid.
    /// A rectangle whose far edge overflows `usize` lies outside every grid.
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }
}

/// A row-major 2D grid.  Row `r`, column `c` lives at `data[r * width + c]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grid<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
}

/// Elevation patch in normalised height units (height over terrain max height).
pub type HeightField = Grid<f32>;

impl<T: Cell> Grid<T> {
    /// Create a grid filled with the given value.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Create a grid filled with `T::default()` (zero).
    pub fn zeros(width: usize, height: usize) -> Self {
        Self::new(width, height, T::default())
    }

    /// Zero grid of `width × height` whose storage is reserved for at least
    /// `capacity` cells, so later `reshape`s up to that size do not allocate.
    pub fn zeros_with_capacity(width: usize, height: usize, capacity: usize) -> Self {
        let mut data = Vec::with_capacity(capacity.max(width * height));
        data.resize(width * height, T::default());
        Self { data, width, height }
    }

    /// Change the extent to `width × height` and zero every cell.  Reuses the
    /// existing storage when it is large enough.
    pub fn reshape(&mut self, width: usize, height: usize) {
        self.data.clear();
        self.data.resize(width * height, T::default());
        self.width = width;
        self.height = height;
    }

    /// Number of cells the storage holds without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn same_size<U>(&self, other: &Grid<U>) -> bool {
        self.width == other.width && self.height == other.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    /// Edge-clamped read: out-of-range coordinates return the nearest edge cell.
    #[inline]
    pub fn get_clamped(&self, row: isize, col: isize) -> T {
        let r = row.clamp(0, self.height as isize - 1) as usize;
        let c = col.clamp(0, self.width as isize - 1) as usize;
        self.get(r, c)
    }

    /// In-bounds read for signed coordinates.
    #[inline]
    pub fn try_get(&self, row: isize, col: isize) -> Option<T> {
        if row < 0 || col < 0 || row >= self.height as isize || col >= self.width as isize {
            None
        } else {
            Some(self.get(row as usize, col as usize))
        }
    }

    pub fn fill(&mut self, val: T) {
        self.data.iter_mut().for_each(|v| *v = val);
    }

    /// Sample at fractional cell coordinates `(y, x)` using bilinear
    /// interpolation.  Coordinates outside the grid clamp to the edge.
    pub fn sample(&self, y: f32, x: f32) -> T {
        let fx = x.clamp(0.0, (self.width - 1) as f32);
        let fy = y.clamp(0.0, (self.height - 1) as f32);

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let top = T::lerp(self.get(y0, x0), self.get(y0, x1), tx);
        let bottom = T::lerp(self.get(y1, x0), self.get(y1, x1), tx);
        T::lerp(top, bottom, ty)
    }

    /// Copy out the cells covered by `rect`.  Panics if `rect` does not fit.
    pub fn crop(&self, rect: Rect) -> Self {
        assert!(
            rect.fits_within(self.width, self.height),
            "crop {rect:?} outside {}×{} grid",
            self.width,
            self.height
        );
        let mut data = Vec::with_capacity(rect.width * rect.height);
        for r in rect.y..rect.y + rect.height {
            let start = r * self.width + rect.x;
            data.extend_from_slice(&self.data[start..start + rect.width]);
        }
        Self { data, width: rect.width, height: rect.height }
    }

    /// Write `src` into this grid with its top-left corner at `(rect.y, rect.x)`.
    pub fn blit(&mut self, src: &Grid<T>, rect: Rect) {
        assert!(rect.width == src.width && rect.height == src.height);
        assert!(rect.fits_within(self.width, self.height));
        for r in 0..src.height {
            let dst = (rect.y + r) * self.width + rect.x;
            let s = r * src.width;
            self.data[dst..dst + src.width].copy_from_slice(&src.data[s..s + src.width]);
        }
    }
}

impl Grid<f32> {
    pub fn min_value(&self) -> f32 {
        self.data.iter().cloned().fold(f32::INFINITY, f32::min)
    }

    pub fn max_value(&self) -> f32 {
        self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Sum of all cells, accumulated in f64.
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
