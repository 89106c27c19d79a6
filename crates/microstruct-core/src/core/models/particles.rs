use super::cell::SimulationCell;
use super::property::{ParticleProperty, PropertyReference};
use nalgebra::Point3;

/// A particle snapshot: positions, the enclosing simulation cell and per-particle properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleData {
    pub cell: SimulationCell,
    pub positions: Vec<Point3<f64>>,
    pub properties: Vec<ParticleProperty>,
}

impl ParticleData {
    pub fn new(cell: SimulationCell, positions: Vec<Point3<f64>>) -> Self {
        Self {
            cell,
            positions,
            properties: Vec::new(),
        }
    }

    pub fn particle_count(&self) -> usize {
        self.positions.len()
    }

    pub fn property(&self, name: &str) -> Option<&ParticleProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn resolve(&self, reference: &PropertyReference) -> Option<&ParticleProperty> {
        reference.find_in(&self.properties)
    }

    /// Adds a property, replacing any existing property with the same name.
    pub fn insert_property(&mut self, property: ParticleProperty) {
        match self.properties.iter_mut().find(|p| p.name() == property.name()) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }
}
