//! Multi-block PLOT3D files in whole, native-endian binary form without
//! record markers.
//!
//! Grid: `nblocks: i32`, `nblocks × (ni, nj, nk): i32`, then for every
//! block the `x`, `y` and `z` arrays as `f64` with `i` varying fastest.
//! Solution (`.q`) files share the header; every block then carries its
//! Mach number, angle of attack, Reynolds number and time followed by the
//! five conserved variables of every point.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use bytemuck::{bytes_of, cast_slice, pod_read_unaligned};

use crate::{
    driver::{ObsCtx, Observer},
    error::SolverError,
    mesh::{Dims, Mesh, StructuredBlock},
    solver::BlockSolver,
    state::NUM_EQNS,
};

struct Cursor<'a> {
    bytes: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SolverError> {
        if self.bytes.len() < n {
            return Err(SolverError::MalformedGrid(format!(
                "expected {n} more bytes, found {}",
                self.bytes.len()
            )));
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn count(&mut self) -> Result<usize, SolverError> {
        let v: i32 = pod_read_unaligned(self.take(4)?);
        usize::try_from(v).map_err(|_| SolverError::MalformedGrid(format!("negative count {v}")))
    }

    fn reals(&mut self, n: usize) -> Result<Vec<f64>, SolverError> {
        let bytes = n
            .checked_mul(8)
            .ok_or_else(|| SolverError::MalformedGrid(format!("{n} values do not fit in memory")))?;
        Ok(self
            .take(bytes)?
            .chunks_exact(8)
            .map(pod_read_unaligned::<f64>)
            .collect())
    }
}

pub fn read_grid_from(mut input: impl Read) -> Result<Mesh, SolverError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let mut cursor = Cursor { bytes: &bytes };

    let nblocks = cursor.count()?;
    // three i32 extents per block
    if nblocks.saturating_mul(12) > cursor.bytes.len() {
        return Err(SolverError::MalformedGrid(format!(
            "{nblocks} blocks announced but only {} bytes follow",
            cursor.bytes.len()
        )));
    }
    let mut dims = Vec::with_capacity(nblocks);
    for _ in 0..nblocks {
        dims.push(Dims([cursor.count()?, cursor.count()?, cursor.count()?]));
    }

    let mut mesh = Mesh::default();
    for (b, nodes) in dims.into_iter().enumerate() {
        let n = nodes
            .checked_len()
            .ok_or_else(|| SolverError::MalformedGrid(format!("block {b} has too many nodes: {:?}", nodes.0)))?;
        let x = cursor.reals(n)?;
        let y = cursor.reals(n)?;
        let z = cursor.reals(n)?;
        let block = StructuredBlock::new(nodes, x, y, z)
            .map_err(|source| SolverError::MalformedBlock { block: b, source })?;
        mesh.push(block);
    }
    if !cursor.bytes.is_empty() {
        return Err(SolverError::MalformedGrid(format!(
            "{} trailing bytes",
            cursor.bytes.len()
        )));
    }
    Ok(mesh)
}

pub fn read_grid(path: impl AsRef<Path>) -> Result<Mesh, SolverError> {
    read_grid_from(BufReader::new(File::open(path)?))
}

fn write_header(output: &mut impl Write, dims: impl ExactSizeIterator<Item = Dims>) -> io::Result<()> {
    output.write_all(bytes_of(&(dims.len() as i32)))?;
    for d in dims {
        for n in d.0 {
            output.write_all(bytes_of(&(n as i32)))?;
        }
    }
    Ok(())
}

pub fn write_grid_to(mut output: impl Write, mesh: &Mesh) -> io::Result<()> {
    write_header(&mut output, mesh.blocks().iter().map(|b| b.nodes()))?;
    for block in mesh.blocks() {
        output.write_all(cast_slice(block.x()))?;
        output.write_all(cast_slice(block.y()))?;
        output.write_all(cast_slice(block.z()))?;
    }
    output.flush()
}

pub fn write_grid(path: impl AsRef<Path>, mesh: &Mesh) -> Result<(), SolverError> {
    write_grid_to(BufWriter::new(File::create(path)?), mesh).map_err(SolverError::from)
}

/// Grid whose points are the cell centroids of every block.
pub fn write_cell_centers_to(mut output: impl Write, solvers: &[BlockSolver]) -> io::Result<()> {
    write_header(&mut output, solvers.iter().map(|s| s.metrics().cells()))?;
    for solver in solvers {
        let centroids = solver.metrics().centroids();
        for component in 0..3 {
            let values: Vec<f64> = centroids.iter().map(|c| c.component(component)).collect();
            output.write_all(cast_slice(&values))?;
        }
    }
    output.flush()
}

/// Scalars written ahead of every block of a solution file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolutionMeta {
    pub mach: f64,
    pub alpha: f64,
    pub reynolds: f64,
    pub time: f64,
}

/// Conserved variables at the cell centers of every block.
pub fn write_solution_to(mut output: impl Write, solvers: &[BlockSolver], meta: SolutionMeta) -> io::Result<()> {
    write_header(&mut output, solvers.iter().map(|s| s.metrics().cells()))?;
    for solver in solvers {
        let scalars = [meta.mach, meta.alpha, meta.reynolds, meta.time];
        output.write_all(cast_slice(&scalars))?;
        for eqn in 0..NUM_EQNS {
            let values: Vec<f64> = solver.state().iter().map(|u| u[eqn]).collect();
            output.write_all(cast_slice(&values))?;
        }
    }
    output.flush()
}

/// Writes the cell-center grid at startup and overwrites the solution file
/// at every output.
pub struct Plot3dWriter {
    centers: PathBuf,
    solution: PathBuf,
}

impl Plot3dWriter {
    /// Files are named after `grid`: `<grid>_center.xyz` and `<grid>.q`.
    pub fn new(grid: impl AsRef<Path>) -> Self {
        let base = grid.as_ref().with_extension("");
        let mut centers = base.clone().into_os_string();
        centers.push("_center.xyz");
        Self {
            centers: centers.into(),
            solution: base.with_extension("q"),
        }
    }

    pub fn solution_path(&self) -> &Path {
        &self.solution
    }

    pub fn centers_path(&self) -> &Path {
        &self.centers
    }
}

impl Observer for Plot3dWriter {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        write_cell_centers_to(BufWriter::new(File::create(&self.centers)?), ctx.solvers())?;
        Ok(())
    }

    fn at_output(&mut self, ctx: ObsCtx) -> Result<(), SolverError> {
        let reference = ctx.simulation().reference();
        let meta = SolutionMeta {
            mach: reference.mach(),
            alpha: reference.alpha(),
            reynolds: reference.reynolds.unwrap_or(0.0),
            time: ctx.time(),
        };
        tracing::event!(
            tracing::Level::INFO,
            "writing solution at iteration {} to {}",
            ctx.iter(),
            self.solution.display()
        );
        write_solution_to(BufWriter::new(File::create(&self.solution)?), ctx.solvers(), meta)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector3;

    fn mesh() -> Mesh {
        Mesh::new(vec![
            StructuredBlock::cartesian([2, 3, 1], [1.0, 2.0, 0.5]).unwrap(),
            StructuredBlock::from_fn(Dims::new(2, 2, 3), |[i, j, k]| {
                Vector3::new(i as f64, j as f64 + 0.5 * i as f64, k as f64 * 0.25)
            })
            .unwrap(),
        ])
    }

    #[test]
    fn grid_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.xyz");
        let mesh = mesh();
        write_grid(&path, &mesh).unwrap();
        assert_eq!(read_grid(&path).unwrap(), mesh);

        let expected = 4 + 2 * 12 + 8 * 3 * (mesh.blocks()[0].nodes().len() + mesh.blocks()[1].nodes().len());
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, expected);
    }

    #[test]
    fn truncated_and_degenerate_grids_are_rejected() {
        let mut bytes = Vec::new();
        write_grid_to(&mut bytes, &mesh()).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(read_grid_from(&bytes[..]), Err(SolverError::MalformedGrid(_))));

        let mut flat = Vec::new();
        for v in [1i32, 1, 2, 2] {
            flat.extend_from_slice(bytes_of(&v));
        }
        flat.extend_from_slice(cast_slice(&[0.0f64; 12]));
        assert!(matches!(
            read_grid_from(&flat[..]),
            Err(SolverError::MalformedBlock { block: 0, .. })
        ));
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let header = |values: &[i32]| {
            let mut bytes = Vec::new();
            for v in values {
                bytes.extend_from_slice(bytes_of(v));
            }
            bytes
        };
        assert!(matches!(
            read_grid_from(&header(&[i32::MAX])[..]),
            Err(SolverError::MalformedGrid(_))
        ));
        assert!(matches!(
            read_grid_from(&header(&[1, i32::MAX, i32::MAX, i32::MAX])[..]),
            Err(SolverError::MalformedGrid(_))
        ));
        assert!(matches!(
            read_grid_from(&header(&[1, 1 << 20, 1 << 20, 1 << 10])[..]),
            Err(SolverError::MalformedGrid(_))
        ));
    }

    #[test]
    fn output_file_names() {
        let w = Plot3dWriter::new("/tmp/run/wing.xyz");
        assert_eq!(w.centers_path(), Path::new("/tmp/run/wing_center.xyz"));
        assert_eq!(w.solution_path(), Path::new("/tmp/run/wing.q"));
    }
}
