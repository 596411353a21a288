//! # Bond & constraint table
//!
//! Connectivity between fragments. Built once by the fracture builder, after
//! which only stress and state change. A broken bond never re-forms; a fresh
//! table from the builder starts with every bond intact.

use std::collections::BTreeMap;

use crate::fragment::FragmentId;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct BondId(pub u32);
impl BondId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unordered fragment pair, stored low id first.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct BondKey(FragmentId, FragmentId);
impl BondKey {
    pub fn new(a: FragmentId, b: FragmentId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
    pub fn a(&self) -> FragmentId {
        self.0
    }
    pub fn b(&self) -> FragmentId {
        self.1
    }
    pub fn other(&self, f: FragmentId) -> Option<FragmentId> {
        if f == self.0 {
            Some(self.1)
        } else if f == self.1 {
            Some(self.0)
        } else {
            None
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
pub enum BondState {
    Intact,
    Broken,
    /// Refused a break; holds for the rest of the instance's life.
    Unbreakable,
}

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
pub enum BondKind {
    /// Joins fragments from different top level cells.
    Intercell,
    /// Joins fragments subdivided from the same cell.
    Intracell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub key: BondKey,
    pub kind: BondKind,
    pub contact_area: f32,
    pub strength: f32,
    stress: f32,
    state: BondState,
}
impl Bond {
    pub fn stress(&self) -> f32 {
        self.stress
    }
    pub fn state(&self) -> BondState {
        self.state
    }
    /// Whether the bond still holds its fragments together.
    pub fn connects(&self) -> bool {
        self.state != BondState::Broken
    }
    pub fn is_overstressed(&self) -> bool {
        self.state == BondState::Intact && self.stress > self.strength
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BondTable {
    bonds: Vec<Bond>,
    by_key: BTreeMap<BondKey, BondId>,
    adjacency: Vec<Vec<BondId>>,
}

impl BondTable {
    pub fn new(fragment_count: usize) -> Self {
        Self {
            bonds: vec![],
            by_key: BTreeMap::new(),
            adjacency: vec![vec![]; fragment_count],
        }
    }

    /// Adds a bond, or folds the area and strength into an existing bond
    /// between the same pair.
    pub fn insert(
        &mut self,
        a: FragmentId,
        b: FragmentId,
        kind: BondKind,
        contact_area: f32,
        strength: f32,
    ) -> BondId {
        let key = BondKey::new(a, b);
        if let Some(&id) = self.by_key.get(&key) {
            let bond = &mut self.bonds[id.index()];
            bond.contact_area += contact_area;
            bond.strength += strength;
            return id;
        }
        let id = BondId(self.bonds.len() as u32);
        let needed = key.b().index() + 1;
        if self.adjacency.len() < needed {
            self.adjacency.resize(needed, vec![]);
        }
        self.adjacency[key.a().index()].push(id);
        self.adjacency[key.b().index()].push(id);
        self.bonds.push(Bond {
            key,
            kind,
            contact_area,
            strength,
            stress: 0.,
            state: BondState::Intact,
        });
        self.by_key.insert(key, id);
        id
    }

    pub fn len(&self) -> usize {
        self.bonds.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty()
    }
    pub fn fragment_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn bond(&self, id: BondId) -> &Bond {
        &self.bonds[id.index()]
    }
    pub fn get(&self, a: FragmentId, b: FragmentId) -> Option<BondId> {
        self.by_key.get(&BondKey::new(a, b)).copied()
    }
    pub fn iter(&self) -> impl Iterator<Item = (BondId, &Bond)> + '_ {
        self.bonds
            .iter()
            .enumerate()
            .map(|(i, b)| (BondId(i as u32), b))
    }
    /// Every bond touching `f`, broken or not.
    pub fn bonds_of(&self, f: FragmentId) -> &[BondId] {
        self.adjacency.get(f.index()).map(|v| v.as_slice()).unwrap_or(&[])
    }
    /// Fragments still held to `f` by a bond.
    pub fn intact_neighbours(&self, f: FragmentId) -> impl Iterator<Item = FragmentId> + '_ {
        self.bonds_of(f).iter().filter_map(move |id| {
            let bond = self.bond(*id);
            if bond.connects() {
                bond.key.other(f)
            } else {
                None
            }
        })
    }

    pub fn is_intact(&self, id: BondId) -> bool {
        self.bond(id).state == BondState::Intact
    }

    /// Loads an intact bond. Broken and unbreakable bonds ignore stress.
    pub fn add_stress(&mut self, id: BondId, amount: f32) {
        let bond = &mut self.bonds[id.index()];
        if bond.state == BondState::Intact {
            bond.stress += amount;
        }
    }
    pub fn decay_stress(&mut self, factor: f32) {
        let factor = factor.clamp(0., 1.);
        for bond in self.bonds.iter_mut() {
            bond.stress = if bond.state == BondState::Intact {
                bond.stress * factor
            } else {
                0.
            };
        }
    }

    /// Returns true only on the transition to broken.
    pub fn break_bond(&mut self, id: BondId) -> bool {
        let bond = &mut self.bonds[id.index()];
        match bond.state {
            BondState::Intact => {
                bond.state = BondState::Broken;
                bond.stress = 0.;
                trace!("Bond {:?} broke.", bond.key);
                true
            }
            BondState::Broken | BondState::Unbreakable => false,
        }
    }
    pub fn mark_unbreakable(&mut self, id: BondId) -> bool {
        let bond = &mut self.bonds[id.index()];
        if bond.state == BondState::Intact {
            bond.state = BondState::Unbreakable;
            bond.stress = 0.;
            true
        } else {
            false
        }
    }

    pub fn set_strength(&mut self, id: BondId, strength: f32) {
        self.bonds[id.index()].strength = strength;
    }
    pub fn set_uniform_strength(&mut self, strength: f32) {
        for bond in self.bonds.iter_mut() {
            bond.strength = strength;
        }
    }

    pub fn broken_count(&self) -> usize {
        self.bonds
            .iter()
            .filter(|b| b.state == BondState::Broken)
            .count()
    }
}
