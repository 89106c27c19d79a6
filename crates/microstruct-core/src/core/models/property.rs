use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PropertyError {
    #[error("Property '{name}' must have at least one component")]
    NoComponents { name: String },
    #[error(
        "Property '{name}' storage length {len} is not a multiple of its component count {components}"
    )]
    RaggedStorage {
        name: String,
        len: usize,
        components: usize,
    },
    #[error("'{0}' is not a valid property reference")]
    InvalidReference(String),
    #[error("Property '{name}' has no component {component} (component count {components})")]
    ComponentOutOfRange {
        name: String,
        component: usize,
        components: usize,
    },
}

/// The element type stored in a [`ParticleProperty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyDataType {
    Int,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
enum PropertyStorage {
    Int(Vec<i32>),
    Float(Vec<f64>),
}

impl PropertyStorage {
    fn len(&self) -> usize {
        match self {
            PropertyStorage::Int(v) => v.len(),
            PropertyStorage::Float(v) => v.len(),
        }
    }
}

/// A per-particle data array with a fixed number of components per particle.
///
/// Values are stored in a flat buffer, particle-major: component `c` of
/// particle `i` lives at `i * component_count + c`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleProperty {
    name: String,
    component_count: usize,
    storage: PropertyStorage,
}

impl ParticleProperty {
    fn new(
        name: impl Into<String>,
        component_count: usize,
        storage: PropertyStorage,
    ) -> Result<Self, PropertyError> {
        let name = name.into();
        if component_count == 0 {
            return Err(PropertyError::NoComponents { name });
        }
        if storage.len() % component_count != 0 {
            return Err(PropertyError::RaggedStorage {
                len: storage.len(),
                components: component_count,
                name,
            });
        }
        Ok(Self {
            name,
            component_count,
            storage,
        })
    }

    pub fn scalar_float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            component_count: 1,
            storage: PropertyStorage::Float(values),
        }
    }

    pub fn scalar_int(name: impl Into<String>, values: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            component_count: 1,
            storage: PropertyStorage::Int(values),
        }
    }

    /// Creates a floating-point property with `component_count` values per particle.
    pub fn vector_float(
        name: impl Into<String>,
        component_count: usize,
        values: Vec<f64>,
    ) -> Result<Self, PropertyError> {
        Self::new(name, component_count, PropertyStorage::Float(values))
    }

    /// Creates an integer property with `component_count` values per particle.
    pub fn vector_int(
        name: impl Into<String>,
        component_count: usize,
        values: Vec<i32>,
    ) -> Result<Self, PropertyError> {
        Self::new(name, component_count, PropertyStorage::Int(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }

    pub fn data_type(&self) -> PropertyDataType {
        match self.storage {
            PropertyStorage::Int(_) => PropertyDataType::Int,
            PropertyStorage::Float(_) => PropertyDataType::Float,
        }
    }

    /// Returns the number of particles this property has values for.
    pub fn len(&self) -> usize {
        self.storage.len() / self.component_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a single value converted to `f64`, or `None` if out of range.
    #[inline]
    pub fn get(&self, particle: usize, component: usize) -> Option<f64> {
        if component >= self.component_count {
            return None;
        }
        let index = particle * self.component_count + component;
        match &self.storage {
            PropertyStorage::Int(v) => v.get(index).map(|&x| x as f64),
            PropertyStorage::Float(v) => v.get(index).copied(),
        }
    }

    /// Returns an iterator over one component of every particle, converted to `f64`.
    pub fn component_values(
        &self,
        component: usize,
    ) -> Result<impl Iterator<Item = f64> + '_, PropertyError> {
        if component >= self.component_count {
            return Err(PropertyError::ComponentOutOfRange {
                name: self.name.clone(),
                component,
                components: self.component_count,
            });
        }
        Ok((0..self.len()).map(move |i| {
            let index = i * self.component_count + component;
            match &self.storage {
                PropertyStorage::Int(v) => v[index] as f64,
                PropertyStorage::Float(v) => v[index],
            }
        }))
    }
}

/// Selects a property by name and, for vector properties, one of its components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyReference {
    pub name: String,
    pub component: Option<usize>,
}

impl PropertyReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: None,
        }
    }

    pub fn with_component(name: impl Into<String>, component: usize) -> Self {
        Self {
            name: name.into(),
            component: Some(component),
        }
    }

    /// The component index to read; scalar references resolve to component 0.
    pub fn component_index(&self) -> usize {
        self.component.unwrap_or(0)
    }

    /// Looks up the referenced property in a list of properties.
    pub fn find_in<'a>(&self, properties: &'a [ParticleProperty]) -> Option<&'a ParticleProperty> {
        properties.iter().find(|p| p.name() == self.name)
    }
}

impl fmt::Display for PropertyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.component {
            Some(c) => write!(f, "{}.{}", self.name, c),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parses `Name`, `Name.2` or `Name.X` (vector components X, Y, Z map to 0, 1, 2).
impl FromStr for PropertyReference {
    type Err = PropertyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PropertyError::InvalidReference(s.to_string()));
        }
        let Some((name, suffix)) = s.rsplit_once('.') else {
            return Ok(Self::new(s));
        };
        if name.is_empty() {
            return Err(PropertyError::InvalidReference(s.to_string()));
        }
        let component = match suffix {
            "X" | "x" => Some(0),
            "Y" | "y" => Some(1),
            "Z" | "z" => Some(2),
            other => other.parse::<usize>().ok(),
        };
        Ok(match component {
            Some(c) => Self::with_component(name, c),
            None => Self::new(s),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_property_reports_particle_count_and_components() {
        let p = ParticleProperty::vector_float("Velocity", 3, vec![0.0; 12]).unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p.component_count(), 3);
        assert_eq!(p.data_type(), PropertyDataType::Float);
    }

    #[test]
    fn ragged_storage_is_rejected() {
        let result = ParticleProperty::vector_int("Ids", 2, vec![1, 2, 3]);
        assert!(matches!(result, Err(PropertyError::RaggedStorage { .. })));
    }

    #[test]
    fn zero_components_are_rejected() {
        let result = ParticleProperty::vector_float("Empty", 0, vec![]);
        assert!(matches!(result, Err(PropertyError::NoComponents { .. })));
    }

    #[test]
    fn get_reads_interleaved_components() {
        let p = ParticleProperty::vector_int("Image", 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(p.get(1, 0), Some(3.0));
        assert_eq!(p.get(1, 1), Some(4.0));
        assert_eq!(p.get(2, 0), None);
        assert_eq!(p.get(0, 2), None);
    }

    #[test]
    fn component_values_rejects_out_of_range_component() {
        let p = ParticleProperty::scalar_float("Charge", vec![1.0, 2.0]);
        assert!(p.component_values(1).is_err());
        let values: Vec<f64> = p.component_values(0).unwrap().collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn reference_finds_property_by_name_and_formats_component() {
        let props = vec![
            ParticleProperty::scalar_float("Charge", vec![1.0]),
            ParticleProperty::scalar_int("Type", vec![2]),
        ];
        let reference = PropertyReference::with_component("Type", 0);
        assert_eq!(reference.find_in(&props).unwrap().name(), "Type");
        assert_eq!(reference.to_string(), "Type.0");
        assert!(PropertyReference::new("Missing").find_in(&props).is_none());
    }

    #[test]
    fn reference_parses_name_and_component_suffix() {
        assert_eq!("Charge".parse(), Ok(PropertyReference::new("Charge")));
        assert_eq!(
            "Velocity.Y".parse(),
            Ok(PropertyReference::with_component("Velocity", 1))
        );
        assert_eq!(
            "Stress.4".parse(),
            Ok(PropertyReference::with_component("Stress", 4))
        );
        assert_eq!(
            "c_pe.atom".parse(),
            Ok(PropertyReference::new("c_pe.atom"))
        );
        assert!("".parse::<PropertyReference>().is_err());
        assert!(".X".parse::<PropertyReference>().is_err());
    }
}
