//! Grid field store: the named, equal-resolution working grids of one solver.
//!
//! Every evolving field is a ping-pong pair.  The front (most recently
//! written) buffer is `generation % 2`; `swap` only bumps the counter, so no
//! data is ever copied between the two halves of a pair.
//!
//! Storage is reserved at the workgroup-padded resolution, but grids only
//! span the requested extent.  There are no padding cells for a stage to
//! read or write: the grid edge is the domain edge.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::grid::{Cell, Grid};

/// Kernel workgroup edge length.  Reserved storage is padded up to a multiple.
pub const WORKGROUP_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Vector,
    /// Four outflow lanes per cell: left, right, top, bottom.
    Flux4,
    /// Eight outflow lanes per cell, in `kernel::D8_OFFSETS` order.
    Flux8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Buffering {
    Single,
    PingPong,
}

/// Static declaration of one field in a solver's field set.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub buffering: Buffering,
}

impl FieldSpec {
    pub const fn ping_pong(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, buffering: Buffering::PingPong }
    }

    pub const fn single(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, buffering: Buffering::Single }
    }
}

/// Type-erased grid, one variant per `FieldKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldData {
    Scalar(Grid<f32>),
    Vector(Grid<[f32; 2]>),
    Flux4(Grid<[f32; 4]>),
    Flux8(Grid<[f32; 8]>),
}

impl FieldData {
    fn zeros(kind: FieldKind, width: usize, height: usize, capacity: usize) -> Self {
        match kind {
            FieldKind::Scalar => Self::Scalar(Grid::zeros_with_capacity(width, height, capacity)),
            FieldKind::Vector => Self::Vector(Grid::zeros_with_capacity(width, height, capacity)),
            FieldKind::Flux4 => Self::Flux4(Grid::zeros_with_capacity(width, height, capacity)),
            FieldKind::Flux8 => Self::Flux8(Grid::zeros_with_capacity(width, height, capacity)),
        }
    }

    fn reshape(&mut self, width: usize, height: usize) {
        match self {
            Self::Scalar(g) => g.reshape(width, height),
            Self::Vector(g) => g.reshape(width, height),
            Self::Flux4(g) => g.reshape(width, height),
            Self::Flux8(g) => g.reshape(width, height),
        }
    }

    fn placeholder() -> Self {
        Self::Scalar(Grid::default())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Vector(_) => FieldKind::Vector,
            Self::Flux4(_) => FieldKind::Flux4,
            Self::Flux8(_) => FieldKind::Flux8,
        }
    }

    pub fn dims(&self) -> (usize, usize) {
        match self {
            Self::Scalar(g) => (g.width, g.height),
            Self::Vector(g) => (g.width, g.height),
            Self::Flux4(g) => (g.width, g.height),
            Self::Flux8(g) => (g.width, g.height),
        }
    }

    fn zero_fill(&mut self) {
        match self {
            Self::Scalar(g) => g.fill(0.0),
            Self::Vector(g) => g.fill([0.0; 2]),
            Self::Flux4(g) => g.fill([0.0; 4]),
            Self::Flux8(g) => g.fill([0.0; 8]),
        }
    }

    pub fn as_grid<T: Element>(&self) -> Option<&Grid<T>> {
        T::view(self)
    }
}

/// Cell types that can live in a `FieldStore`.
pub trait Element: Cell {
    const KIND: FieldKind;
    fn view(data: &FieldData) -> Option<&Grid<Self>>;
    fn view_mut(data: &mut FieldData) -> Option<&mut Grid<Self>>;
}

macro_rules! element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const KIND: FieldKind = FieldKind::$variant;

            fn view(data: &FieldData) -> Option<&Grid<Self>> {
                match data {
                    FieldData::$variant(g) => Some(g),
                    _ => None,
                }
            }

            fn view_mut(data: &mut FieldData) -> Option<&mut Grid<Self>> {
                match data {
                    FieldData::$variant(g) => Some(g),
                    _ => None,
                }
            }
        }
    };
}

element!(f32, Scalar);
element!([f32; 2], Vector);
element!([f32; 4], Flux4);
element!([f32; 8], Flux8);

struct Slot {
    spec: FieldSpec,
    buffers: Vec<FieldData>,
    generation: u64,
}

impl Slot {
    fn front(&self) -> usize {
        (self.generation % self.buffers.len() as u64) as usize
    }

    fn back(&self) -> usize {
        (self.front() + 1) % self.buffers.len()
    }
}

/// Owns every working grid of one solver instance.
pub struct FieldStore {
    specs: &'static [FieldSpec],
    slots: Vec<Slot>,
    width: usize,
    height: usize,
    /// Padded resolution the storage is reserved for.
    reserved: (usize, usize),
}

impl FieldStore {
    /// An empty store for the given field set.  Nothing is allocated until
    /// the first `ensure`.
    pub fn new(specs: &'static [FieldSpec]) -> Self {
        Self { specs, slots: Vec::new(), width: 0, height: 0, reserved: (0, 0) }
    }

    /// Round a resolution up to the workgroup granularity.
    pub fn padded_resolution(width: usize, height: usize) -> (usize, usize) {
        let round = |n: usize| n.div_ceil(WORKGROUP_SIZE) * WORKGROUP_SIZE;
        (round(width), round(height))
    }

    /// Make sure every declared field spans `width × height`, with storage
    /// reserved at the padded form of that resolution.  Returns `true` if the
    /// storage was (re)allocated.  Whenever the extent changes every buffer
    /// is zero afterwards.
    pub fn ensure(&mut self, width: usize, height: usize) -> bool {
        let (pw, ph) = Self::padded_resolution(width, height);
        if self.is_allocated() && (pw, ph) == self.reserved {
            if (width, height) != (self.width, self.height) {
                debug!("field store: resizing to {width}×{height} within reserved {pw}×{ph}");
                for slot in &mut self.slots {
                    slot.buffers.iter_mut().for_each(|b| b.reshape(width, height));
                    slot.generation = 0;
                }
                self.width = width;
                self.height = height;
            }
            return false;
        }
        debug!(
            "field store: allocating {} fields at {width}×{height} (reserved {pw}×{ph}, was {}×{})",
            self.specs.len(),
            self.width,
            self.height
        );
        self.release();
        self.slots = self
            .specs
            .iter()
            .map(|&spec| {
                let n = match spec.buffering {
                    Buffering::Single => 1,
                    Buffering::PingPong => 2,
                };
                Slot {
                    spec,
                    buffers: (0..n).map(|_| FieldData::zeros(spec.kind, width, height, pw * ph)).collect(),
                    generation: 0,
                }
            })
            .collect();
        self.width = width;
        self.height = height;
        self.reserved = (pw, ph);
        true
    }

    pub fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Extent `(width, height)` every field spans.
    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Padded resolution `(width, height)` the storage is reserved for.
    pub fn reserved_resolution(&self) -> (usize, usize) {
        self.reserved
    }

    pub fn release(&mut self) {
        self.slots.clear();
        self.width = 0;
        self.height = 0;
        self.reserved = (0, 0);
    }

    /// Zero both buffers of `name` and reset its generation.
    pub fn clear(&mut self, name: &str) {
        let idx = self.slot_index(name);
        let slot = &mut self.slots[idx];
        slot.buffers.iter_mut().for_each(FieldData::zero_fill);
        slot.generation = 0;
    }

    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.buffers.iter_mut().for_each(FieldData::zero_fill);
            slot.generation = 0;
        }
    }

    /// Flip the front/back roles of a ping-pong pair.
    pub fn swap(&mut self, name: &str) {
        let idx = self.slot_index(name);
        let slot = &mut self.slots[idx];
        assert!(
            slot.spec.buffering == Buffering::PingPong,
            "field \"{name}\" is single-buffered and cannot be swapped"
        );
        slot.generation += 1;
    }

    pub fn generation(&self, name: &str) -> u64 {
        self.slots[self.slot_index(name)].generation
    }

    /// Index of the buffer currently holding the most recent write.
    pub fn front_index(&self, name: &str) -> usize {
        self.slots[self.slot_index(name)].front()
    }

    pub fn front<T: Element>(&self, name: &str) -> &Grid<T> {
        let slot = &self.slots[self.slot_index(name)];
        T::view(&slot.buffers[slot.front()])
            .unwrap_or_else(|| panic!("field \"{name}\" is {:?}, not {:?}", slot.spec.kind, T::KIND))
    }

    pub fn front_mut<T: Element>(&mut self, name: &str) -> &mut Grid<T> {
        let idx = self.slot_index(name);
        let slot = &mut self.slots[idx];
        let front = slot.front();
        let kind = slot.spec.kind;
        T::view_mut(&mut slot.buffers[front])
            .unwrap_or_else(|| panic!("field \"{name}\" is {kind:?}, not {:?}", T::KIND))
    }

    /// Copy `src` into every buffer of `name` and reset its generation, so
    /// the first read of either half sees the same state.
    pub fn load<T: Element>(&mut self, name: &str, src: &Grid<T>) {
        assert!(
            src.width == self.width && src.height == self.height,
            "field \"{name}\": source is {}×{}, store is {}×{}",
            src.width,
            src.height,
            self.width,
            self.height
        );
        let idx = self.slot_index(name);
        let slot = &mut self.slots[idx];
        let kind = slot.spec.kind;
        for buf in &mut slot.buffers {
            T::view_mut(buf)
                .unwrap_or_else(|| panic!("field \"{name}\" is {kind:?}, not {:?}", T::KIND))
                .data
                .copy_from_slice(&src.data);
        }
        slot.generation = 0;
    }

    /// Run a stage that fills the back buffer of `name` while reading any
    /// other field through the shared store reference.  For a single-buffered
    /// field the back buffer is the field itself.
    pub fn write<T, F>(&mut self, name: &str, stage: F)
    where
        T: Element,
        F: FnOnce(&FieldStore, &mut Grid<T>),
    {
        let idx = self.slot_index(name);
        let back = self.slots[idx].back();
        let mut out = std::mem::replace(&mut self.slots[idx].buffers[back], FieldData::placeholder());
        {
            let grid = T::view_mut(&mut out).unwrap_or_else(|| {
                panic!("field \"{name}\" is {:?}, not {:?}", self.slots[idx].spec.kind, T::KIND)
            });
            stage(self, grid);
        }
        self.slots[idx].buffers[back] = out;
    }

    /// `write` followed by `swap`: the freshly written buffer becomes front.
    pub fn step<T, F>(&mut self, name: &str, stage: F)
    where
        T: Element,
        F: FnOnce(&FieldStore, &mut Grid<T>),
    {
        self.write(name, stage);
        self.swap(name);
    }

    /// Clone of the front buffer, type-erased.
    pub fn snapshot(&self, name: &str) -> FieldData {
        let slot = &self.slots[self.slot_index(name)];
        slot.buffers[slot.front()].clone()
    }

    fn slot_index(&self, name: &str) -> usize {
        match self.specs.iter().position(|s| s.name == name) {
            Some(i) if i < self.slots.len() => i,
            Some(_) => panic!("field \"{name}\" accessed before the store was allocated"),
            None => panic!("field \"{name}\" is not declared by this solver"),
        }
    }
}
