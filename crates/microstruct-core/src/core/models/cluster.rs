use super::ids::{ClusterId, TransitionId};
use nalgebra::{Matrix3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use std::ops::Neg;
use thiserror::Error;
use tracing::trace;

/// Two transition matrices closer than this (element-wise) are considered equal.
const TRANSITION_MATRIX_EPSILON: f64 = 1e-4;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ClusterError {
    #[error("Cluster with id {0} already exists")]
    DuplicateId(i32),
    #[error("Unknown cluster key")]
    UnknownCluster,
    #[error("Unknown transition key")]
    UnknownTransition,
    #[error("Transition matrix between clusters {from} and {to} is not invertible")]
    SingularTransition { from: i32, to: i32 },
    #[error("Transitions cannot be concatenated: target of the first is not the source of the second")]
    NotChained,
}

/// Local crystal structure types produced by the structure identification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StructureType {
    #[default]
    Other,
    Fcc,
    Hcp,
    Bcc,
    CubicDiamond,
    HexDiamond,
}

impl StructureType {
    /// Returns `true` for lattices with cubic symmetry.
    pub fn is_cubic(self) -> bool {
        matches!(
            self,
            StructureType::Fcc | StructureType::Bcc | StructureType::CubicDiamond
        )
    }

    pub fn is_hexagonal(self) -> bool {
        matches!(self, StructureType::Hcp | StructureType::HexDiamond)
    }
}

/// A group of particles that share one local lattice orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: i32,
    pub structure: StructureType,
    pub atom_count: usize,
    /// Maps vectors from the cluster's lattice frame to simulation coordinates.
    pub orientation: Matrix3<f64>,
    pub center_of_mass: Point3<f64>,
    pub symmetry_transformation: usize,
    /// Links a defect cluster to the crystal cluster it is embedded in.
    pub parent_transition: Option<TransitionId>,
    transitions: Vec<TransitionId>,
}

impl Cluster {
    fn new(id: i32, structure: StructureType) -> Self {
        Self {
            id,
            structure,
            atom_count: 0,
            orientation: Matrix3::identity(),
            center_of_mass: Point3::origin(),
            symmetry_transformation: 0,
            parent_transition: None,
            transitions: Vec::new(),
        }
    }

    /// Outgoing transitions, ordered by increasing distance.
    pub fn transitions(&self) -> &[TransitionId] {
        &self.transitions
    }
}

/// A lattice transformation from the frame of `cluster1` into the frame of `cluster2`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTransition {
    pub cluster1: ClusterId,
    pub cluster2: ClusterId,
    pub tm: Matrix3<f64>,
    pub reverse: TransitionId,
    /// Number of direct edges composed into this transition; 0 for self transitions.
    pub distance: usize,
    pub area: usize,
}

impl ClusterTransition {
    pub fn is_self_transition(&self) -> bool {
        self.cluster1 == self.cluster2 && self.distance == 0
    }
}

/// Owns all clusters and transitions produced by one structure analysis run.
#[derive(Debug, Clone)]
pub struct ClusterGraph {
    clusters: SlotMap<ClusterId, Cluster>,
    transitions: SlotMap<TransitionId, ClusterTransition>,
    by_id: HashMap<i32, ClusterId>,
    null_cluster: ClusterId,
    disconnected: HashSet<(ClusterId, ClusterId)>,
}

impl Default for ClusterGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterGraph {
    /// Creates a graph containing only the null cluster (id 0).
    pub fn new() -> Self {
        let mut clusters = SlotMap::with_key();
        let null_cluster = clusters.insert(Cluster::new(0, StructureType::Other));
        let mut by_id = HashMap::new();
        by_id.insert(0, null_cluster);
        Self {
            clusters,
            transitions: SlotMap::with_key(),
            by_id,
            null_cluster,
            disconnected: HashSet::new(),
        }
    }

    pub fn null_cluster(&self) -> ClusterId {
        self.null_cluster
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id)
    }

    pub fn cluster_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.get_mut(id)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&ClusterTransition> {
        self.transitions.get(id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> {
        self.clusters.iter()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn create_cluster(
        &mut self,
        structure: StructureType,
        id: i32,
    ) -> Result<ClusterId, ClusterError> {
        if self.by_id.contains_key(&id) {
            return Err(ClusterError::DuplicateId(id));
        }
        let key = self.clusters.insert(Cluster::new(id, structure));
        self.by_id.insert(id, key);
        Ok(key)
    }

    /// Looks up a cluster by its numeric id.
    pub fn find_cluster(&self, id: i32) -> Option<ClusterId> {
        self.by_id.get(&id).copied()
    }

    pub fn set_parent_transition(
        &mut self,
        cluster: ClusterId,
        transition: TransitionId,
    ) -> Result<(), ClusterError> {
        if !self.transitions.contains_key(transition) {
            return Err(ClusterError::UnknownTransition);
        }
        let c = self
            .clusters
            .get_mut(cluster)
            .ok_or(ClusterError::UnknownCluster)?;
        c.parent_transition = Some(transition);
        Ok(())
    }

    /// Returns the identity transition of a cluster onto itself, creating it on first use.
    pub fn create_self_transition(&mut self, cluster: ClusterId) -> Result<TransitionId, ClusterError> {
        let c = self
            .clusters
            .get(cluster)
            .ok_or(ClusterError::UnknownCluster)?;
        if let Some(&first) = c.transitions.first() {
            if self.transitions[first].is_self_transition() {
                return Ok(first);
            }
        }

        let id = self.transitions.insert_with_key(|key| ClusterTransition {
            cluster1: cluster,
            cluster2: cluster,
            tm: Matrix3::identity(),
            reverse: key,
            distance: 0,
            area: 0,
        });
        self.clusters[cluster].transitions.insert(0, id);
        Ok(id)
    }

    /// Creates a transition from `a` to `b` together with its reverse.
    ///
    /// If an equivalent transition already exists it is returned instead.
    pub fn create_transition(
        &mut self,
        a: ClusterId,
        b: ClusterId,
        tm: Matrix3<f64>,
        distance: usize,
    ) -> Result<TransitionId, ClusterError> {
        if !self.clusters.contains_key(a) || !self.clusters.contains_key(b) {
            return Err(ClusterError::UnknownCluster);
        }
        if a == b && matrices_match(&tm, &Matrix3::identity()) {
            return self.create_self_transition(a);
        }

        let existing = self.clusters[a].transitions.iter().copied().find(|&t| {
            let t = &self.transitions[t];
            t.cluster2 == b && matrices_match(&t.tm, &tm)
        });
        if let Some(t) = existing {
            return Ok(t);
        }

        let inverse = tm.try_inverse().ok_or(ClusterError::SingularTransition {
            from: self.clusters[a].id,
            to: self.clusters[b].id,
        })?;

        let forward = self.transitions.insert_with_key(|key| ClusterTransition {
            cluster1: a,
            cluster2: b,
            tm,
            reverse: key,
            distance,
            area: 0,
        });
        let reverse = self.transitions.insert(ClusterTransition {
            cluster1: b,
            cluster2: a,
            tm: inverse,
            reverse: forward,
            distance,
            area: 0,
        });
        self.transitions[forward].reverse = reverse;

        self.insert_sorted(a, forward);
        self.insert_sorted(b, reverse);

        if distance == 1 {
            self.disconnected.clear();
        }
        Ok(forward)
    }

    fn insert_sorted(&mut self, cluster: ClusterId, transition: TransitionId) {
        let distance = self.transitions[transition].distance;
        let list = &self.clusters[cluster].transitions;
        let pos = list.partition_point(|&t| self.transitions[t].distance <= distance);
        self.clusters[cluster].transitions.insert(pos, transition);
    }

    /// Composes `t_ab` (A→B) and `t_bc` (B→C) into a single A→C transition.
    pub fn concatenate_transitions(
        &mut self,
        t_ab: TransitionId,
        t_bc: TransitionId,
    ) -> Result<TransitionId, ClusterError> {
        let ab = self
            .transitions
            .get(t_ab)
            .ok_or(ClusterError::UnknownTransition)?
            .clone();
        let bc = self
            .transitions
            .get(t_bc)
            .ok_or(ClusterError::UnknownTransition)?
            .clone();
        if ab.cluster2 != bc.cluster1 {
            return Err(ClusterError::NotChained);
        }
        if ab.is_self_transition() {
            return Ok(t_bc);
        }
        if bc.is_self_transition() {
            return Ok(t_ab);
        }
        if bc.reverse == t_ab {
            return self.create_self_transition(ab.cluster1);
        }
        self.create_transition(
            ab.cluster1,
            bc.cluster2,
            bc.tm * ab.tm,
            ab.distance + bc.distance,
        )
    }

    /// Finds a transition from `a` to `b`.
    ///
    /// Direct edges are used when present. Otherwise paths of at most two edges are
    /// searched; the shortest one found is cached as a new composed edge. Pairs with
    /// no such path are remembered so that repeated queries return quickly.
    pub fn determine_transition(
        &mut self,
        a: ClusterId,
        b: ClusterId,
    ) -> Result<Option<TransitionId>, ClusterError> {
        if !self.clusters.contains_key(a) || !self.clusters.contains_key(b) {
            return Err(ClusterError::UnknownCluster);
        }
        if a == b {
            return self.create_self_transition(a).map(Some);
        }

        if let Some(t) = self.clusters[a]
            .transitions
            .iter()
            .copied()
            .find(|&t| self.transitions[t].cluster2 == b)
        {
            return Ok(Some(t));
        }

        let pair = if self.clusters[a].id < self.clusters[b].id {
            (a, b)
        } else {
            (b, a)
        };
        if self.disconnected.contains(&pair) {
            return Ok(None);
        }

        let mut best: Option<(TransitionId, TransitionId, usize)> = None;
        for &t1 in &self.clusters[a].transitions {
            let first = &self.transitions[t1];
            if first.distance == 0 {
                continue;
            }
            for &t2 in &self.clusters[first.cluster2].transitions {
                let second = &self.transitions[t2];
                if second.cluster2 != b || second.distance == 0 {
                    continue;
                }
                let total = first.distance + second.distance;
                if best.is_none_or(|(_, _, d)| total < d) {
                    best = Some((t1, t2, total));
                }
            }
        }

        match best {
            Some((t1, t2, _)) => {
                trace!(
                    from = self.clusters[a].id,
                    to = self.clusters[b].id,
                    "Caching composed cluster transition."
                );
                self.concatenate_transitions(t1, t2).map(Some)
            }
            None => {
                self.disconnected.insert(pair);
                Ok(None)
            }
        }
    }
}

fn matrices_match(a: &Matrix3<f64>, b: &Matrix3<f64>) -> bool {
    (a - b).abs().max() <= TRANSITION_MATRIX_EPSILON
}

/// A vector expressed in the local lattice frame of a cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterVector {
    pub local: Vector3<f64>,
    pub cluster: Option<ClusterId>,
}

impl ClusterVector {
    pub fn new(local: Vector3<f64>, cluster: ClusterId) -> Self {
        Self {
            local,
            cluster: Some(cluster),
        }
    }

    /// A vector already given in simulation coordinates.
    pub fn spatial(vector: Vector3<f64>) -> Self {
        Self {
            local: vector,
            cluster: None,
        }
    }

    /// Maps the vector into simulation coordinates using the cluster orientation.
    pub fn to_spatial_vector(&self, graph: &ClusterGraph) -> Option<Vector3<f64>> {
        match self.cluster {
            Some(c) => graph.cluster(c).map(|c| c.orientation * self.local),
            None => Some(self.local),
        }
    }

    /// Re-expresses the vector in the frame of `other`, if the two clusters are connected.
    pub fn transform_to_cluster(
        &self,
        other: ClusterId,
        graph: &mut ClusterGraph,
    ) -> Result<Option<ClusterVector>, ClusterError> {
        let Some(from) = self.cluster else {
            return Ok(None);
        };
        let Some(t) = graph.determine_transition(from, other)? else {
            return Ok(None);
        };
        let tm = graph.transitions[t].tm;
        Ok(Some(ClusterVector::new(tm * self.local, other)))
    }
}

impl Neg for ClusterVector {
    type Output = ClusterVector;

    fn neg(self) -> Self::Output {
        ClusterVector {
            local: -self.local,
            cluster: self.cluster,
        }
    }
}
