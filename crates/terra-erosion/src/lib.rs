//! Grid-based terrain erosion: hydraulic, thermal and wind solvers over a
//! shared field store, plus brush-stamp compositing.
//!
//! ```no_run
//! use terra_erosion::{synthetic, ErodeParams, Eroder, HydraulicEroder, HEIGHT};
//!
//! let patch = synthetic::cone(64, 64, 0.1, 0.6, 24.0);
//! let mut eroder = HydraulicEroder::default();
//! eroder.set_input(HEIGHT, patch);
//! eroder.erode(&ErodeParams::for_patch(64, 64, [100.0, 50.0, 100.0], [1.5625, 1.5625]))?;
//! let eroded = eroder.outputs().scalar(HEIGHT);
//! # Ok::<(), terra_erosion::ErosionError>(())
//! ```
pub mod brush;
pub mod eroder;
pub mod error;
pub mod fields;
pub mod grid;
pub mod hydraulic;
pub mod kernel;
mod settings;
pub mod synthetic;
pub mod thermal;
pub mod wind;

pub use brush::{apply_stamp, composite, BrushMask};
pub use eroder::{ErodeParams, Eroder, InputFields, OutputFields, HARDNESS, HEIGHT};
pub use error::{ErosionError, Result};
pub use fields::{FieldData, FieldKind, FieldStore};
pub use grid::{Grid, HeightField, Rect};
pub use hydraulic::{HydraulicEroder, HydraulicSettings};
pub use thermal::{ThermalEroder, ThermalSettings};
pub use wind::{WindEroder, WindSettings};
