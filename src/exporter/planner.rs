//! Groups exported handlers by listener port.
//!
//! Handlers whose URL leaves the port unspecified follow the explicitly
//! configured ones: they are served on *every* explicit port, or on
//! [`DEFAULT_PORT`] when no handler names a port. Moving a primary handler to
//! another port therefore moves the secondary handlers along with it.

use std::collections::{btree_map, BTreeMap};

use super::source::ServletSource;

/// Port used when no handler names one.
pub const DEFAULT_PORT: u16 = 80;

/// Handlers to mount, keyed by listener port.
#[derive(Debug, Clone, Default)]
pub struct PortPlan {
    groups: BTreeMap<u16, Vec<ServletSource>>,
}

impl PortPlan {
    /// Ports in ascending order.
    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.groups.keys().copied()
    }

    pub fn get(&self, port: u16) -> Option<&[ServletSource]> {
        self.groups.get(&port).map(Vec::as_slice)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u16, Vec<ServletSource>> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<u16, Vec<ServletSource>> {
        self.groups
    }
}

impl<'a> IntoIterator for &'a PortPlan {
    type Item = (&'a u16, &'a Vec<ServletSource>);
    type IntoIter = btree_map::Iter<'a, u16, Vec<ServletSource>>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Assign every source to the listener port(s) it must be served on.
pub fn plan<I>(sources: I) -> PortPlan
where
    I: IntoIterator<Item = ServletSource>,
{
    let mut groups: BTreeMap<u16, Vec<ServletSource>> = BTreeMap::new();
    let mut unspecified = Vec::new();

    for source in sources {
        match source.port() {
            Some(port) => groups.entry(port).or_default().push(source),
            None => unspecified.push(source),
        }
    }

    if !unspecified.is_empty() {
        if groups.is_empty() {
            groups.insert(DEFAULT_PORT, unspecified);
        } else {
            for group in groups.values_mut() {
                group.extend(unspecified.iter().cloned());
            }
        }
    }

    PortPlan { groups }
}
