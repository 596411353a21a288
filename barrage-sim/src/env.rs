use crate::config::EnvConfig;

use model::geom::Aabb;
use na::{Unit, Vector3};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum StaticId {
    Plane(u32),
    Box(u32),
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub normal: Unit<Vector3<f32>>,
    pub offset: f32,
}

/// A sphere touching static geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StaticHit {
    pub id: StaticId,
    /// Points out of the static geometry, towards the sphere.
    pub normal: Vector3<f32>,
    pub depth: f32,
    pub point: Vector3<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    pub planes: Vec<Plane>,
    pub boxes: Vec<Aabb>,
}

impl From<&EnvConfig> for Environment {
    fn from(cfg: &EnvConfig) -> Self {
        let planes = cfg
            .planes
            .iter()
            .filter_map(|p| {
                let n = Vector3::from(p.normal);
                match Unit::try_new(n, 1e-6) {
                    Some(normal) => Some(Plane {
                        normal,
                        offset: p.offset,
                    }),
                    None => {
                        warn!("Ignoring plane with degenerate normal {:?}.", p.normal);
                        None
                    }
                }
            })
            .collect();
        let boxes = cfg
            .boxes
            .iter()
            .map(|b| Aabb::new(Vector3::from(b.min), Vector3::from(b.max)))
            .collect();
        Self { planes, boxes }
    }
}

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.planes.is_empty() && self.boxes.is_empty()
    }

    /// Every static shape the sphere overlaps, planes first, in index order.
    pub fn hits(&self, center: &Vector3<f32>, radius: f32, out: &mut Vec<StaticHit>) {
        for (i, p) in self.planes.iter().enumerate() {
            let dist = p.normal.dot(center) - p.offset;
            if dist < radius {
                out.push(StaticHit {
                    id: StaticId::Plane(i as u32),
                    normal: p.normal.into_inner(),
                    depth: radius - dist,
                    point: center - p.normal.into_inner() * dist,
                });
            }
        }
        for (i, b) in self.boxes.iter().enumerate() {
            if let Some((normal, depth, point)) = sphere_box(b, center, radius) {
                out.push(StaticHit {
                    id: StaticId::Box(i as u32),
                    normal,
                    depth,
                    point,
                });
            }
        }
    }
}

fn sphere_box(b: &Aabb, c: &Vector3<f32>, r: f32) -> Option<(Vector3<f32>, f32, Vector3<f32>)> {
    let q = b.closest_point(c);
    let d = c - q;
    let dist = d.norm();
    if dist > 1e-6 {
        return (dist < r).then(|| (d / dist, r - dist, q));
    }
    // center inside: leave through the nearest face
    let mut best = (f32::INFINITY, 0, 1.);
    for i in 0..3 {
        let lo = c[i] - b.min[i];
        let hi = b.max[i] - c[i];
        if lo < best.0 {
            best = (lo, i, -1.);
        }
        if hi < best.0 {
            best = (hi, i, 1.);
        }
    }
    let (gap, axis, sign) = best;
    let mut normal = Vector3::zeros();
    normal[axis] = sign;
    let mut point = *c;
    point[axis] += sign * gap;
    Some((normal, r + gap, point))
}
