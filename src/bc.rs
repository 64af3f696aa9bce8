use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;

use crate::{
    mesh::BlockFace,
    state::Primitive,
    vector::Vector3,
};

/// The states of the cells adjacent to one face of a block, in the order of
/// the face's tangent index pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    extents: (usize, usize),
    states: Vec<Primitive>,
}

impl Layer {
    pub fn new(extents: (usize, usize), states: Vec<Primitive>) -> Self {
        debug_assert_eq!(extents.0 * extents.1, states.len());
        Self { extents, states }
    }

    pub fn extents(&self) -> (usize, usize) {
        self.extents
    }

    #[inline]
    pub fn get(&self, (a, b): (usize, usize)) -> &Primitive {
        &self.states[a + self.extents.0 * b]
    }
}

/// Face layers of partner blocks, frozen at the start of an iteration so
/// that every block reads the same neighbor data regardless of the order
/// in which blocks are updated.
#[derive(Debug, Clone, Default)]
pub struct InterfaceLayers {
    layers: HashMap<(usize, BlockFace), Layer>,
}

impl InterfaceLayers {
    pub fn insert(&mut self, block: usize, face: BlockFace, layer: Layer) {
        self.layers.insert((block, face), layer);
    }

    pub fn get(&self, block: usize, face: BlockFace) -> Option<&Layer> {
        self.layers.get(&(block, face))
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// What a boundary condition sees of a boundary face.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryFace<'a> {
    /// State of the interior cell adjacent to the face.
    pub interior: Primitive,
    /// Unit normal, pointing towards increasing index.
    pub normal: Vector3,
    /// Position of the face in its layer.
    pub position: (usize, usize),
    pub interfaces: &'a InterfaceLayers,
}

/// Supplies the outside state used to evaluate fluxes on a boundary face.
pub trait BoundaryCondition: Send + Sync {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive;

    fn name(&self) -> &'static str;
}

/// Fixed free-stream state.
#[derive(Debug, Clone, Copy)]
pub struct FarField(pub Primitive);

impl BoundaryCondition for FarField {
    fn ghost_state(&self, _face: &BoundaryFace<'_>) -> Primitive {
        self.0
    }

    fn name(&self) -> &'static str {
        "farField"
    }
}

/// Inviscid wall: no flow through the face.
#[derive(Debug, Clone, Copy)]
pub struct SlipWall;

impl BoundaryCondition for SlipWall {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive {
        face.interior.reflected(face.normal)
    }

    fn name(&self) -> &'static str {
        "slipWall"
    }
}

/// Adiabatic no-slip wall.
#[derive(Debug, Clone, Copy)]
pub struct ViscousWall;

impl BoundaryCondition for ViscousWall {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive {
        let w = face.interior;
        Primitive::new(w.rho, -w.vel, w.p)
    }

    fn name(&self) -> &'static str {
        "viscousWall"
    }
}

/// Mirror plane.
#[derive(Debug, Clone, Copy)]
pub struct Symmetry;

impl BoundaryCondition for Symmetry {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive {
        face.interior.reflected(face.normal)
    }

    fn name(&self) -> &'static str {
        "symmetry"
    }
}

/// Zero-gradient outflow.
#[derive(Debug, Clone, Copy)]
pub struct Extrapolate;

impl BoundaryCondition for Extrapolate {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive {
        face.interior
    }

    fn name(&self) -> &'static str {
        "extrapolate"
    }
}

/// Connection to a face of another block with the same in-face extents
/// and orientation.
#[derive(Debug, Clone, Copy)]
pub struct Interface {
    pub block: usize,
    pub face: BlockFace,
}

impl BoundaryCondition for Interface {
    fn ghost_state(&self, face: &BoundaryFace<'_>) -> Primitive {
        // the driver captures the layer of every partner before each sweep
        let layer = face.interfaces.get(self.block, self.face);
        debug_assert!(
            layer.is_some(),
            "no layer captured for the {:?} face of block {}",
            self.face,
            self.block
        );
        layer.map_or(face.interior, |layer| *layer.get(face.position))
    }

    fn name(&self) -> &'static str {
        "interface"
    }
}

/// Configured kind of a block face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoundarySpec {
    #[default]
    FarField,
    SlipWall,
    ViscousWall,
    Symmetry,
    Extrapolate,
    Interface { block: usize, face: BlockFace },
}

impl BoundarySpec {
    pub fn build(&self, free_stream: Primitive) -> Arc<dyn BoundaryCondition> {
        match *self {
            BoundarySpec::FarField => Arc::new(FarField(free_stream)),
            BoundarySpec::SlipWall => Arc::new(SlipWall),
            BoundarySpec::ViscousWall => Arc::new(ViscousWall),
            BoundarySpec::Symmetry => Arc::new(Symmetry),
            BoundarySpec::Extrapolate => Arc::new(Extrapolate),
            BoundarySpec::Interface { block, face } => Arc::new(Interface { block, face }),
        }
    }

    pub fn partner(&self) -> Option<(usize, BlockFace)> {
        match *self {
            BoundarySpec::Interface { block, face } => Some((block, face)),
            _ => None,
        }
    }
}

/// Boundary conditions of the six faces of a block, indexed by
/// [`BlockFace::index`].
#[derive(Clone)]
pub struct BlockBoundaries {
    faces: [Arc<dyn BoundaryCondition>; 6],
}

impl BlockBoundaries {
    pub fn new(specs: &[BoundarySpec; 6], free_stream: Primitive) -> Self {
        Self {
            faces: std::array::from_fn(|n| specs[n].build(free_stream)),
        }
    }

    pub fn uniform(bc: Arc<dyn BoundaryCondition>) -> Self {
        Self {
            faces: std::array::from_fn(|_| Arc::clone(&bc)),
        }
    }

    pub fn with_face(mut self, face: BlockFace, bc: Arc<dyn BoundaryCondition>) -> Self {
        self.faces[face.index()] = bc;
        self
    }

    #[inline]
    pub fn get(&self, face: BlockFace) -> &dyn BoundaryCondition {
        self.faces[face.index()].as_ref()
    }
}

impl std::fmt::Debug for BlockBoundaries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.faces.iter().map(|bc| bc.name()))
            .finish()
    }
}
