//! Identifiers, partition descriptors, distance profiles and collaborator traits.
//!
//! Collaborators are small traits with blanket impls for closures, so callers can
//! pass either a named type or an inline `|..| ..`.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::BoxError;

/// Opaque, ordered byte-string key naming one point or feature.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(Vec<u8>);

impl ItemId {
    #[inline]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Vec<u8>> for ItemId {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                f.write_str("0x")?;
                for b in &self.0 {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Coordinate of a spatial partition (grid cell, curve segment, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey(pub Vec<i64>);

impl PartitionKey {
    #[inline]
    pub fn cell(coords: &[i64]) -> Self {
        Self(coords.to_vec())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (k, c) in self.0.iter().enumerate() {
            if k > 0 {
                f.write_str(",")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("]")
    }
}

/// Partition descriptor: a coordinate plus whether the point is primary there.
///
/// Equality and hashing look at `key` only; the flag is OR-merged into the
/// canonical descriptor kept by the partition index.
#[derive(Clone, Debug)]
pub struct PartitionData {
    pub key: PartitionKey,
    pub primary: bool,
}

impl PartitionData {
    #[inline]
    pub fn new(key: PartitionKey, primary: bool) -> Self {
        Self { key, primary }
    }
}

impl PartialEq for PartitionData {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PartitionData {}

impl Hash for PartitionData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

/// Distance between two values plus whatever the distance function learned on
/// the way (e.g. which coordinate pair realised the minimum).
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceProfile<C> {
    pub distance: f64,
    pub context: C,
}

/// Classification of a candidate neighbor before a distance is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferType {
    /// No shortcut; compute the distance.
    None,
    /// Ignore this candidate for the current center.
    Skip,
    /// Drop the candidate from the traversal entirely.
    Remove,
}

/// Converts a raw partition value into the stored value.
pub trait TypeConverter<P, V> {
    fn convert(&self, id: &ItemId, value: &P) -> Result<V, BoxError>;
}

impl<P, V, F> TypeConverter<P, V> for F
where
    F: Fn(&ItemId, &P) -> Result<V, BoxError>,
{
    fn convert(&self, id: &ItemId, value: &P) -> Result<V, BoxError> {
        self(id, value)
    }
}

/// Sink the partitioner reports partitions to.
pub type PartitionSink<'a> = dyn FnMut(PartitionData) -> Result<(), BoxError> + 'a;

/// Places a raw value into one or more partitions.
pub trait Partitioner<P> {
    /// Calls `emit` once per partition `value` belongs to.
    fn partition(&self, value: &P, emit: &mut PartitionSink<'_>) -> Result<(), BoxError>;
}

impl<P, F> Partitioner<P> for F
where
    F: Fn(&P, &mut PartitionSink<'_>) -> Result<(), BoxError>,
{
    fn partition(&self, value: &P, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
        self(value, emit)
    }
}

/// Computes the distance profile between two stored values.
pub trait DistanceProfileFn<V> {
    type Context;
    fn profile(&self, a: &V, b: &V) -> Result<DistanceProfile<Self::Context>, BoxError>;
}

impl<V, C, F> DistanceProfileFn<V> for F
where
    F: Fn(&V, &V) -> Result<DistanceProfile<C>, BoxError>,
{
    type Context = C;
    fn profile(&self, a: &V, b: &V) -> Result<DistanceProfile<C>, BoxError> {
        self(a, b)
    }
}

/// Receives every finished primary with its final neighbor list.
pub trait CompleteNotifier<V, L> {
    fn complete(&mut self, id: &ItemId, value: &V, list: &mut L) -> Result<(), BoxError>;
}

impl<V, L, F> CompleteNotifier<V, L> for F
where
    F: FnMut(&ItemId, &V, &mut L) -> Result<(), BoxError>,
{
    fn complete(&mut self, id: &ItemId, value: &V, list: &mut L) -> Result<(), BoxError> {
        self(id, value, list)
    }
}
