//! Location Hierarchy Resolver
//!
//! Owns the single key to id table for the run. Ids are minted in one place,
//! [`LocationResolver::resolve`], both while rows are read and (as a fallback)
//! while the parent-before-child order is computed.
use crate::logger::Logger;
use crate::model::Location;
use crate::model::LocationType;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::hash::Hash;
use std::hash::Hasher;

/// Identity of a location: the same name under another parent is another location.
#[derive(Clone, Debug)]
pub struct LocationKey {
    pub name: String,
    pub kind: LocationType,
    pub parent_id: Option<u32>,
}

impl LocationKey {
    pub fn new(name: &str, kind: LocationType, parent_id: Option<u32>) -> Self {
        LocationKey {
            name: name.to_owned(),
            kind,
            parent_id,
        }
    }

    /// The fields that decide equality and hashing.
    fn identity(&self) -> (&str, LocationType, Option<u32>) {
        (self.name.as_str(), self.kind, self.parent_id)
    }
}

impl PartialEq for LocationKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for LocationKey {}

impl Hash for LocationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Deduplicates locations across all rows of a run and orders them for insertion.
#[derive(Debug)]
pub struct LocationResolver {
    ids: HashMap<LocationKey, u32>,
    /// Keys in the order they were first seen
    discovered: Vec<LocationKey>,
    next_id: u32,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationResolver {
    pub fn new() -> Self {
        LocationResolver {
            ids: HashMap::new(),
            discovered: Vec::new(),
            next_id: 1,
        }
    }

    /// Number of distinct locations seen so far.
    pub fn len(&self) -> usize {
        self.discovered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discovered.is_empty()
    }

    /// Returns the id of `key`, assigning the next sequential id on first sight.
    pub fn resolve(&mut self, key: LocationKey) -> u32 {
        if let Some(id) = self.ids.get(&key) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.discovered.push(key.clone());
        self.ids.insert(key, id);
        id
    }

    /// Resolves one row's chain of names, given most general level first.
    ///
    /// Empty names are skipped without breaking the chain: the next present level
    /// hangs off the nearest resolved ancestor. Returns the id of the deepest level.
    pub fn resolve_chain<'a, I>(&mut self, chain: I) -> Option<u32>
    where
        I: IntoIterator<Item = (LocationType, &'a str)>,
    {
        let mut parent_id = None::<u32>;
        for (kind, name) in chain {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            parent_id = Some(self.resolve(LocationKey::new(name, kind, parent_id)));
        }
        parent_id
    }

    /// Lists every location so that each parent precedes its children.
    ///
    /// Breadth-first from the roots, visiting each parent's children in discovery
    /// order. A key found without an id is given one here.
    pub fn topological_order(&mut self, logger: &dyn Logger) -> Vec<Location> {
        let mut children = HashMap::<Option<u32>, Vec<usize>>::new();
        for (index, key) in self.discovered.iter().enumerate() {
            children.entry(key.parent_id).or_default().push(index);
        }

        let mut sorted = Vec::<Location>::with_capacity(self.discovered.len());
        let mut visited = HashSet::<usize>::new();
        let mut queue = VecDeque::from([None::<u32>]);
        while let Some(parent_id) = queue.pop_front() {
            let Some(bucket) = children.get(&parent_id) else {
                continue;
            };
            for &index in bucket {
                if !visited.insert(index) {
                    continue;
                }
                let key = self.discovered[index].clone();
                let id = self.resolve(key.clone());
                sorted.push(Location {
                    id,
                    name: key.name,
                    kind: key.kind,
                    parent_id: key.parent_id,
                });
                queue.push_back(Some(id));
            }
        }

        if sorted.len() < self.discovered.len() {
            logger.warn(&format!(
                "{} locations are not reachable from a root and were left out",
                self.discovered.len() - sorted.len()
            ));
        }
        logger.debug(&format!("Sorted {} locations hierarchically", sorted.len()));
        sorted
    }
}
