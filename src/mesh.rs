use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::vector::Vector3;

/// A logical index direction of a structured block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    I,
    J,
    K,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::I, Direction::J, Direction::K];

    #[inline]
    pub fn axis(self) -> usize {
        match self {
            Direction::I => 0,
            Direction::J => 1,
            Direction::K => 2,
        }
    }

    // cyclic, so that t1 × t2 points along the direction
    #[inline]
    pub fn tangents(self) -> (usize, usize) {
        let a = self.axis();
        ((a + 1) % 3, (a + 2) % 3)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::I => "i",
            Direction::J => "j",
            Direction::K => "k",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Lower,
    Upper,
}

/// One of the six bounding faces of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockFace {
    ILower,
    IUpper,
    JLower,
    JUpper,
    KLower,
    KUpper,
}

impl BlockFace {
    pub const ALL: [BlockFace; 6] = [
        BlockFace::ILower,
        BlockFace::IUpper,
        BlockFace::JLower,
        BlockFace::JUpper,
        BlockFace::KLower,
        BlockFace::KUpper,
    ];

    pub fn new(direction: Direction, side: Side) -> Self {
        match (direction, side) {
            (Direction::I, Side::Lower) => BlockFace::ILower,
            (Direction::I, Side::Upper) => BlockFace::IUpper,
            (Direction::J, Side::Lower) => BlockFace::JLower,
            (Direction::J, Side::Upper) => BlockFace::JUpper,
            (Direction::K, Side::Lower) => BlockFace::KLower,
            (Direction::K, Side::Upper) => BlockFace::KUpper,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            BlockFace::ILower | BlockFace::IUpper => Direction::I,
            BlockFace::JLower | BlockFace::JUpper => Direction::J,
            BlockFace::KLower | BlockFace::KUpper => Direction::K,
        }
    }

    pub fn side(self) -> Side {
        match self {
            BlockFace::ILower | BlockFace::JLower | BlockFace::KLower => Side::Lower,
            BlockFace::IUpper | BlockFace::JUpper | BlockFace::KUpper => Side::Upper,
        }
    }

    /// Position in [`BlockFace::ALL`].
    pub fn index(self) -> usize {
        2 * self.direction().axis()
            + match self.side() {
                Side::Lower => 0,
                Side::Upper => 1,
            }
    }
}

impl fmt::Display for BlockFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side() {
            Side::Lower => "Lower",
            Side::Upper => "Upper",
        };
        write!(f, "{}{}", self.direction().name(), side)
    }
}

/// Extents of a structured index space. Flat storage has `i` varying
/// fastest, then `j`, then `k`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dims(pub [usize; 3]);

impl Dims {
    pub fn new(ni: usize, nj: usize, nk: usize) -> Self {
        Self([ni, nj, nk])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0[0] * self.0[1] * self.0[2]
    }

    /// Number of points, or `None` when it does not fit in a `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.0[0].checked_mul(self.0[1])?.checked_mul(self.0[2])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, axis: usize) -> usize {
        self.0[axis]
    }

    #[inline]
    pub fn offset(&self, [i, j, k]: [usize; 3]) -> usize {
        i + self.0[0] * (j + self.0[1] * k)
    }

    #[inline]
    pub fn ijk(&self, offset: usize) -> [usize; 3] {
        let i = offset % self.0[0];
        let rest = offset / self.0[0];
        [i, rest % self.0[1], rest / self.0[1]]
    }

    /// Offset increment for a unit step along `axis`.
    #[inline]
    pub fn stride(&self, axis: usize) -> usize {
        match axis {
            0 => 1,
            1 => self.0[0],
            _ => self.0[0] * self.0[1],
        }
    }

    /// Index space of the faces normal to `direction` of a cell index space.
    pub fn faces(&self, direction: Direction) -> Dims {
        let mut n = self.0;
        n[direction.axis()] += 1;
        Dims(n)
    }

    /// Extents of the face layer normal to `direction`, in tangent order.
    pub fn layer(&self, direction: Direction) -> (usize, usize) {
        let (t1, t2) = direction.tangents();
        (self.0[t1], self.0[t2])
    }

    pub fn iter(self) -> impl Iterator<Item = [usize; 3]> {
        (0..self.len()).map(move |n| self.ijk(n))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("at least 2 nodes are required in every direction, got {0:?}")]
    TooFewNodes([usize; 3]),
    #[error("expected {expected} coordinates, found {found}")]
    CoordinateCount { expected: usize, found: usize },
}

/// Node coordinates of a single structured block.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredBlock {
    nodes: Dims,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
}

impl StructuredBlock {
    pub fn new(nodes: Dims, x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, ShapeError> {
        if nodes.0.iter().any(|&n| n < 2) {
            return Err(ShapeError::TooFewNodes(nodes.0));
        }
        for c in [&x, &y, &z] {
            if c.len() != nodes.len() {
                return Err(ShapeError::CoordinateCount {
                    expected: nodes.len(),
                    found: c.len(),
                });
            }
        }
        Ok(Self { nodes, x, y, z })
    }

    pub fn from_fn(nodes: Dims, f: impl Fn([usize; 3]) -> Vector3) -> Result<Self, ShapeError> {
        let (mut x, mut y, mut z) = (
            Vec::with_capacity(nodes.len()),
            Vec::with_capacity(nodes.len()),
            Vec::with_capacity(nodes.len()),
        );
        for ijk in nodes.iter() {
            let p = f(ijk);
            x.push(p.x);
            y.push(p.y);
            z.push(p.z);
        }
        Self::new(nodes, x, y, z)
    }

    /// Uniform box with `cells` cells spanning `lengths`, anchored at the origin.
    pub fn cartesian(cells: [usize; 3], lengths: [f64; 3]) -> Result<Self, ShapeError> {
        let nodes = Dims([cells[0] + 1, cells[1] + 1, cells[2] + 1]);
        Self::from_fn(nodes, |[i, j, k]| {
            Vector3::new(
                lengths[0] * i as f64 / cells[0].max(1) as f64,
                lengths[1] * j as f64 / cells[1].max(1) as f64,
                lengths[2] * k as f64 / cells[2].max(1) as f64,
            )
        })
    }

    pub fn nodes(&self) -> Dims {
        self.nodes
    }

    pub fn cells(&self) -> Dims {
        let [ni, nj, nk] = self.nodes.0;
        Dims([ni - 1, nj - 1, nk - 1])
    }

    #[inline]
    pub fn node(&self, ijk: [usize; 3]) -> Vector3 {
        let n = self.nodes.offset(ijk);
        Vector3::new(self.x[n], self.y[n], self.z[n])
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }
}

/// A multi-block structured mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    blocks: Vec<StructuredBlock>,
}

impl Mesh {
    pub fn new(blocks: Vec<StructuredBlock>) -> Self {
        Self { blocks }
    }

    pub fn push(&mut self, block: StructuredBlock) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[StructuredBlock] {
        &self.blocks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_cells(&self) -> usize {
        self.blocks.iter().map(|b| b.cells().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_round_trip() {
        let d = Dims::new(3, 4, 5);
        for n in 0..d.len() {
            assert_eq!(d.offset(d.ijk(n)), n);
        }
        assert_eq!(d.offset([1, 0, 0]) - d.offset([0, 0, 0]), d.stride(0));
        assert_eq!(d.offset([0, 1, 0]) - d.offset([0, 0, 0]), d.stride(1));
        assert_eq!(d.offset([0, 0, 1]) - d.offset([0, 0, 0]), d.stride(2));
    }

    #[test]
    fn face_index_spaces() {
        let cells = Dims::new(3, 4, 5);
        assert_eq!(cells.faces(Direction::I), Dims::new(4, 4, 5));
        assert_eq!(cells.faces(Direction::K), Dims::new(3, 4, 6));
        assert_eq!(cells.layer(Direction::J), (5, 3));
    }

    #[test]
    fn block_faces_are_indexed_in_order() {
        for (n, face) in BlockFace::ALL.into_iter().enumerate() {
            assert_eq!(face.index(), n);
            assert_eq!(BlockFace::new(face.direction(), face.side()), face);
        }
        assert_eq!(BlockFace::JUpper.to_string(), "jUpper");
    }

    #[test]
    fn rejects_malformed_blocks() {
        assert_eq!(
            StructuredBlock::new(Dims::new(1, 2, 2), vec![0.0; 4], vec![0.0; 4], vec![0.0; 4]),
            Err(ShapeError::TooFewNodes([1, 2, 2]))
        );
        assert!(matches!(
            StructuredBlock::new(Dims::new(2, 2, 2), vec![0.0; 8], vec![0.0; 7], vec![0.0; 8]),
            Err(ShapeError::CoordinateCount { expected: 8, found: 7 })
        ));
    }
}
