use model::fragment::FragmentId;
use na::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct RegionId(pub u32);

/// A named sphere in world space that damage can be aimed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub center: [f32; 3],
    pub radius: f32,
}
impl Region {
    pub fn center(&self) -> Vector3<f32> {
        Vector3::from(self.center)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionMap(Vec<Region>);
impl RegionMap {
    pub fn new(regions: Vec<Region>) -> Self {
        Self(regions)
    }
    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.0.get(id.0 as usize)
    }
    pub fn find(&self, name: &str) -> Option<RegionId> {
        self.0
            .iter()
            .position(|r| r.name == name)
            .map(|i| RegionId(i as u32))
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FragmentImpulse {
    pub fragment: FragmentId,
    pub impulse: Vector3<f32>,
    pub distance: f32,
}

/// Splits `magnitude` over the fragments within `radius` of `center` with a
/// linear falloff, nearest first and ties by id. A fragment sitting on the
/// center is pushed straight up.
pub fn spread<I>(center: &Vector3<f32>, radius: f32, magnitude: f32, fragments: I) -> Vec<FragmentImpulse>
where
    I: IntoIterator<Item = (FragmentId, Vector3<f32>)>,
{
    if !(radius > 0.) {
        return vec![];
    }
    let mut hits: Vec<FragmentImpulse> = fragments
        .into_iter()
        .filter_map(|(fragment, pos)| {
            let offset = pos - center;
            let distance = offset.norm();
            if distance > radius {
                return None;
            }
            let dir = if distance > 1e-6 {
                offset / distance
            } else {
                Vector3::y()
            };
            Some(FragmentImpulse {
                fragment,
                impulse: dir * magnitude * (1. - distance / radius),
                distance,
            })
        })
        .collect();
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.fragment.cmp(&b.fragment))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn falloff_is_linear_and_ordered() {
        let frags = vec![
            (FragmentId(0), Vector3::new(1.5, 0., 0.)),
            (FragmentId(1), Vector3::new(0., 0., 0.)),
            (FragmentId(2), Vector3::new(0., 0., -1.)),
            (FragmentId(3), Vector3::new(5., 0., 0.)),
        ];
        let hits = spread(&Vector3::zeros(), 2., 10., frags);
        let order: Vec<_> = hits.iter().map(|h| h.fragment).collect();
        assert_eq!(order, vec![FragmentId(1), FragmentId(2), FragmentId(0)]);
        assert_relative_eq!(hits[0].impulse, Vector3::new(0., 10., 0.));
        assert_relative_eq!(hits[1].impulse, Vector3::new(0., 0., -5.));
        assert_relative_eq!(hits[2].impulse.norm(), 2.5);
    }

    #[test]
    fn equal_distances_break_ties_by_id() {
        let frags = vec![
            (FragmentId(4), Vector3::new(1., 0., 0.)),
            (FragmentId(2), Vector3::new(-1., 0., 0.)),
        ];
        let hits = spread(&Vector3::zeros(), 3., 1., frags);
        assert_eq!(hits[0].fragment, FragmentId(2));
    }

    #[test]
    fn regions_resolve_by_name() {
        let map = RegionMap::new(vec![Region {
            name: "pillar".into(),
            center: [0., 1., 0.],
            radius: 0.5,
        }]);
        assert_eq!(map.find("pillar"), Some(RegionId(0)));
        assert!(map.find("roof").is_none());
        assert!(map.get(RegionId(3)).is_none());
    }
}
