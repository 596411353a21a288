use super::{Aabb, FMat, VMat};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use na::Vector3;
use serde::{Deserialize, Serialize};

// Skewed so parity rays don't graze the edges of axis-aligned meshes.
const PARITY_RAY: [f32; 3] = [0.999_986, 0.003_217, 0.004_121];

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("face {face} references vertex {index}, but the mesh only has {len} vertices")]
    IndexOutOfRange { face: usize, index: u32, len: usize },
    #[error("mesh has no faces")]
    Empty,
}

/// Wire form of a [`TriMesh`], as produced by a content pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
}

/// Closed triangle mesh. Faces index columns of the vertex matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMesh", into = "RawMesh")]
pub struct TriMesh {
    vv: VMat,
    ff: FMat,
}
impl TriMesh {
    pub fn new(vv: VMat, ff: FMat) -> Result<TriMesh, MeshError> {
        if ff.ncols() == 0 {
            return Err(MeshError::Empty);
        }
        for (face, col) in ff.column_iter().enumerate() {
            if let Some(&index) = col.iter().find(|&&i| i as usize >= vv.ncols()) {
                return Err(MeshError::IndexOutOfRange {
                    face,
                    index,
                    len: vv.ncols(),
                });
            }
        }
        Ok(TriMesh { vv, ff })
    }
    pub fn verts(&self) -> &VMat {
        &self.vv
    }
    pub fn faces(&self) -> &FMat {
        &self.ff
    }
    pub fn tri(&self, face: usize) -> [Vector3<f32>; 3] {
        let f = self.ff.column(face);
        [
            self.vv.column(f[0] as usize).clone_owned(),
            self.vv.column(f[1] as usize).clone_owned(),
            self.vv.column(f[2] as usize).clone_owned(),
        ]
    }
    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::empty();
        for v in self.vv.column_iter() {
            b.grow(&v.clone_owned());
        }
        b
    }
    /// Divergence theorem over the faces. Sign follows the winding.
    pub fn signed_volume(&self) -> f32 {
        (0..self.ff.ncols())
            .map(|f| {
                let [a, b, c] = self.tri(f);
                a.dot(&b.cross(&c))
            })
            .sum::<f32>()
            / 6.
    }
    pub fn volume(&self) -> f32 {
        self.signed_volume().abs()
    }
    /// Inside test by ray parity. Winding agnostic, but the mesh must be closed.
    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        let dir = Vector3::from(PARITY_RAY);
        let hits = (0..self.ff.ncols())
            .filter(|&f| {
                let [a, b, c] = self.tri(f);
                ray_hits_tri(p, &dir, &a, &b, &c)
            })
            .count();
        hits % 2 == 1
    }
}
impl TryFrom<RawMesh> for TriMesh {
    type Error = MeshError;
    fn try_from(raw: RawMesh) -> Result<Self, Self::Error> {
        let vv = VMat::from_iterator(raw.vertices.len(), raw.vertices.into_iter().flatten());
        let ff = FMat::from_iterator(raw.faces.len(), raw.faces.into_iter().flatten());
        TriMesh::new(vv, ff)
    }
}
impl From<TriMesh> for RawMesh {
    fn from(m: TriMesh) -> Self {
        RawMesh {
            vertices: m.vv.column_iter().map(|c| [c[0], c[1], c[2]]).collect(),
            faces: m.ff.column_iter().map(|c| [c[0], c[1], c[2]]).collect(),
        }
    }
}

// Moller-Trumbore, only counting hits strictly in front of the origin.
fn ray_hits_tri(
    origin: &Vector3<f32>,
    dir: &Vector3<f32>,
    a: &Vector3<f32>,
    b: &Vector3<f32>,
    c: &Vector3<f32>,
) -> bool {
    const EPS: f32 = 1e-9;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < EPS {
        return false;
    }
    let inv = 1. / det;
    let s = origin - a;
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < 0. || u + v > 1. {
        return false;
    }
    e2.dot(&q) * inv > EPS
}

/// Generates the mesh of a unit cube, centered on the origin.
pub fn unit_cube() -> TriMesh {
    TriMesh {
        vv: VMat::from_iterator(
            8,
            [
                -0.5, -0.5, -0.5, // left bottom rear
                -0.5, -0.5,  0.5, // left bottom front
                -0.5,  0.5, -0.5, // left top rear
                -0.5,  0.5,  0.5, // left top front
                 0.5, -0.5, -0.5, // right bottom rear
                 0.5, -0.5,  0.5, // right bottom front
                 0.5,  0.5, -0.5, // right top rear
                 0.5,  0.5,  0.5, // right top front
            ]
            .into_iter(),
        ),
        ff: FMat::from_iterator(
            12,
            [
                1, 0, 4, 5, 1, 4, // bottom
                6, 2, 3, 6, 3, 7, // top
                0, 1, 2, 3, 2, 1, // left
                4, 6, 7, 4, 7, 5, // right
                0, 2, 6, 0, 6, 4, // back
                5, 7, 3, 3, 1, 5, // front
            ]
            .into_iter(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_cube_is_closed() {
        let cube = unit_cube();
        assert_relative_eq!(cube.volume(), 1.0, epsilon = 1e-6);
        assert!(cube.contains(&Vector3::zeros()));
        assert!(cube.contains(&Vector3::new(0.45, -0.45, 0.3)));
        assert!(!cube.contains(&Vector3::new(0.55, 0., 0.)));
        assert!(!cube.contains(&Vector3::new(-2., 0., 0.)));
        assert_eq!(cube.bounds().extents(), Vector3::new(1., 1., 1.));
    }

    #[test]
    fn rejects_dangling_indices() {
        let raw = RawMesh {
            vertices: vec![[0., 0., 0.], [1., 0., 0.], [0., 1., 0.]],
            faces: vec![[0, 1, 3]],
        };
        assert_eq!(
            TriMesh::try_from(raw),
            Err(MeshError::IndexOutOfRange { face: 0, index: 3, len: 3 })
        );
        let empty = RawMesh { vertices: vec![], faces: vec![] };
        assert_eq!(TriMesh::try_from(empty), Err(MeshError::Empty));
    }

    #[test]
    fn raw_conversion_preserves_mesh() {
        let cube = unit_cube();
        let raw = RawMesh::from(cube.clone());
        assert_eq!(raw.vertices.len(), 8);
        assert_eq!(raw.faces[0], [1, 0, 4]);
        assert_eq!(TriMesh::try_from(raw), Ok(cube));
    }
}
