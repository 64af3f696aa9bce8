//! Geometric metrics of a structured block: face area vectors, face
//! centers, cell volumes and centroids.

use crate::{
    error::{CellLocation, SolverError},
    mesh::{Dims, Direction, StructuredBlock},
    vector::Vector3,
};

#[derive(Debug, Clone)]
pub struct BlockMetrics {
    cells: Dims,
    volume: Vec<f64>,
    centroid: Vec<Vector3>,
    face_area: [Vec<Vector3>; 3],
    face_center: [Vec<Vector3>; 3],
}

#[inline]
fn shifted(mut ijk: [usize; 3], axis: usize) -> [usize; 3] {
    ijk[axis] += 1;
    ijk
}

impl BlockMetrics {
    pub fn compute(block: &StructuredBlock) -> Self {
        let cells = block.cells();

        let mut face_area: [Vec<Vector3>; 3] = Default::default();
        let mut face_center: [Vec<Vector3>; 3] = Default::default();
        for direction in Direction::ALL {
            let faces = cells.faces(direction);
            let (t1, t2) = direction.tangents();
            let (areas, centers): (Vec<Vector3>, Vec<Vector3>) = faces
                .iter()
                .map(|ijk| {
                    let p00 = block.node(ijk);
                    let p10 = block.node(shifted(ijk, t1));
                    let p01 = block.node(shifted(ijk, t2));
                    let p11 = block.node(shifted(shifted(ijk, t1), t2));
                    let area = 0.5 * (p11 - p00).cross(p01 - p10);
                    let center = 0.25 * (p00 + p10 + p01 + p11);
                    (area, center)
                })
                .unzip();
            face_area[direction.axis()] = areas;
            face_center[direction.axis()] = centers;
        }

        let mut volume = Vec::with_capacity(cells.len());
        let mut centroid = Vec::with_capacity(cells.len());
        for ijk in cells.iter() {
            // divergence theorem, with x as the field: V = 1/3 ∮ x·dA
            let mut v = 0.0;
            for direction in Direction::ALL {
                let faces = cells.faces(direction);
                let d = direction.axis();
                let lo = faces.offset(ijk);
                let hi = faces.offset(shifted(ijk, d));
                v += face_center[d][hi].dot(face_area[d][hi]) - face_center[d][lo].dot(face_area[d][lo]);
            }
            volume.push(v / 3.0);

            let mut c = Vector3::ZERO;
            for n in 0..8 {
                c += block.node([ijk[0] + (n & 1), ijk[1] + ((n >> 1) & 1), ijk[2] + (n >> 2)]);
            }
            centroid.push(c / 8.0);
        }

        Self {
            cells,
            volume,
            centroid,
            face_area,
            face_center,
        }
    }

    /// Fails on the first cell with a non-positive volume.
    pub fn validate(&self, block: usize) -> Result<(), SolverError> {
        match self.volume.iter().position(|&v| v <= 0.0 || v.is_nan()) {
            Some(n) => Err(SolverError::InvalidMesh {
                at: CellLocation::new(block, self.cells.ijk(n)),
                volume: self.volume[n],
            }),
            None => Ok(()),
        }
    }

    pub fn cells(&self) -> Dims {
        self.cells
    }

    pub fn faces(&self, direction: Direction) -> Dims {
        self.cells.faces(direction)
    }

    #[inline]
    pub fn volume(&self, cell: usize) -> f64 {
        self.volume[cell]
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volume
    }

    #[inline]
    pub fn centroid(&self, cell: usize) -> Vector3 {
        self.centroid[cell]
    }

    pub fn centroids(&self) -> &[Vector3] {
        &self.centroid
    }

    /// Area vector of a face, pointing towards increasing index.
    #[inline]
    pub fn face_area(&self, direction: Direction, face: usize) -> Vector3 {
        self.face_area[direction.axis()][face]
    }

    #[inline]
    pub fn face_center(&self, direction: Direction, face: usize) -> Vector3 {
        self.face_center[direction.axis()][face]
    }

    /// Offsets of the lower and upper faces of a cell along `direction`.
    #[inline]
    pub fn bounding_faces(&self, direction: Direction, cell: [usize; 3]) -> (usize, usize) {
        let faces = self.cells.faces(direction);
        (faces.offset(cell), faces.offset(shifted(cell, direction.axis())))
    }

    /// Sum of the six outward area vectors of a cell.
    pub fn closure(&self, cell: [usize; 3]) -> Vector3 {
        Direction::ALL.into_iter().fold(Vector3::ZERO, |acc, direction| {
            let (lo, hi) = self.bounding_faces(direction, cell);
            acc + self.face_area(direction, hi) - self.face_area(direction, lo)
        })
    }
}
