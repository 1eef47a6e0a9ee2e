use crate::error::ModelError;
use lasso::{Spur, ThreadedRodeo};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Unique identifier for an object type in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a domain object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unique identifier for a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateId(u32);

impl PredicateId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        PredicateId(raw)
    }
}

#[derive(Debug)]
struct TypeEntry {
    name: Spur,
    parent: Option<TypeId>,
}

#[derive(Debug)]
struct ObjectEntry {
    name: Spur,
    ty: TypeId,
}

/// A predicate signature: interned name plus one type per term position.
#[derive(Debug)]
pub struct Predicate {
    name: Spur,
    param_types: SmallVec<[TypeId; 4]>,
}

impl Predicate {
    /// Number of term positions.
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }

    /// The declared type of the term at `position`.
    pub fn param_type(&self, position: usize) -> TypeId {
        self.param_types[position]
    }
}

/// The typed object universe: types, objects and predicate signatures.
///
/// Immutable once analysis starts. All names are interned; lookups by name
/// are only needed while the caller assembles the model, everything past
/// that point works on the u32 ids.
pub struct Catalog {
    names: ThreadedRodeo,
    types: Vec<TypeEntry>,
    type_by_name: FxHashMap<Spur, TypeId>,
    objects: Vec<ObjectEntry>,
    object_by_name: FxHashMap<Spur, ObjectId>,
    predicates: Vec<Predicate>,
    predicate_by_name: FxHashMap<Spur, PredicateId>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            names: ThreadedRodeo::new(),
            types: Vec::new(),
            type_by_name: FxHashMap::default(),
            objects: Vec::new(),
            object_by_name: FxHashMap::default(),
            predicates: Vec::new(),
            predicate_by_name: FxHashMap::default(),
        }
    }

    /// Register a type. `parent` must already be registered.
    pub fn add_type(&mut self, name: &str, parent: Option<&str>) -> Result<TypeId, ModelError> {
        let parent = match parent {
            Some(p) => Some(self.lookup_type(p)?),
            None => None,
        };
        let spur = self.names.get_or_intern(name);
        if self.type_by_name.contains_key(&spur) {
            return Err(ModelError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeEntry { name: spur, parent });
        self.type_by_name.insert(spur, id);
        Ok(id)
    }

    /// Register an object of an already-registered type.
    pub fn add_object(&mut self, name: &str, ty: &str) -> Result<ObjectId, ModelError> {
        let ty = self.lookup_type(ty)?;
        let spur = self.names.get_or_intern(name);
        if self.object_by_name.contains_key(&spur) {
            return Err(ModelError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = ObjectId(self.objects.len() as u32);
        self.objects.push(ObjectEntry { name: spur, ty });
        self.object_by_name.insert(spur, id);
        Ok(id)
    }

    /// Register a predicate with one declared type per term position.
    pub fn add_predicate(
        &mut self,
        name: &str,
        param_types: &[&str],
    ) -> Result<PredicateId, ModelError> {
        let mut params: SmallVec<[TypeId; 4]> = SmallVec::new();
        for ty in param_types {
            params.push(self.lookup_type(ty)?);
        }
        let spur = self.names.get_or_intern(name);
        if self.predicate_by_name.contains_key(&spur) {
            return Err(ModelError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = PredicateId(self.predicates.len() as u32);
        self.predicates.push(Predicate {
            name: spur,
            param_types: params,
        });
        self.predicate_by_name.insert(spur, id);
        Ok(id)
    }

    fn lookup_type(&self, name: &str) -> Result<TypeId, ModelError> {
        self.names
            .get(name)
            .and_then(|spur| self.type_by_name.get(&spur).copied())
            .ok_or_else(|| ModelError::UnknownType {
                name: name.to_string(),
            })
    }

    /// Look up an object by name.
    pub fn object(&self, name: &str) -> Result<ObjectId, ModelError> {
        self.names
            .get(name)
            .and_then(|spur| self.object_by_name.get(&spur).copied())
            .ok_or_else(|| ModelError::UnknownObject {
                name: name.to_string(),
            })
    }

    /// Look up a predicate by name.
    pub fn predicate_id(&self, name: &str) -> Result<PredicateId, ModelError> {
        self.names
            .get(name)
            .and_then(|spur| self.predicate_by_name.get(&spur).copied())
            .ok_or_else(|| ModelError::UnknownPredicate {
                name: name.to_string(),
            })
    }

    /// The signature of a predicate.
    pub fn predicate(&self, id: PredicateId) -> &Predicate {
        &self.predicates[id.index()]
    }

    /// The type of an object.
    pub fn type_of(&self, object: ObjectId) -> TypeId {
        self.objects[object.index()].ty
    }

    /// True iff `sub` is `sup` or a (transitive) subtype of it.
    pub fn is_subtype_of(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut current = Some(sub);
        while let Some(ty) = current {
            if ty == sup {
                return true;
            }
            current = self.types[ty.index()].parent;
        }
        false
    }

    /// Iterate over all registered objects.
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> {
        (0..self.objects.len() as u32).map(ObjectId)
    }

    /// Number of registered objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The largest arity over all registered predicates.
    pub fn max_arity(&self) -> usize {
        self.predicates.iter().map(Predicate::arity).max().unwrap_or(0)
    }

    /// Resolve an object id back to its name.
    pub fn object_name(&self, id: ObjectId) -> &str {
        self.names.resolve(&self.objects[id.index()].name)
    }

    /// Resolve a type id back to its name.
    pub fn type_name(&self, id: TypeId) -> &str {
        self.names.resolve(&self.types[id.index()].name)
    }

    /// Resolve a predicate id back to its name.
    pub fn predicate_name(&self, id: PredicateId) -> &str {
        self.names.resolve(&self.predicates[id.index()].name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logistics() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_type("object", None).unwrap();
        catalog.add_type("locatable", Some("object")).unwrap();
        catalog.add_type("truck", Some("locatable")).unwrap();
        catalog.add_type("location", Some("object")).unwrap();
        catalog.add_object("t1", "truck").unwrap();
        catalog.add_object("l1", "location").unwrap();
        catalog
            .add_predicate("at", &["locatable", "location"])
            .unwrap();
        catalog
    }

    #[test]
    fn subtype_chain_is_transitive() {
        let catalog = logistics();
        let object = catalog.lookup_type("object").unwrap();
        let truck = catalog.lookup_type("truck").unwrap();
        let location = catalog.lookup_type("location").unwrap();

        assert!(catalog.is_subtype_of(truck, object));
        assert!(catalog.is_subtype_of(truck, truck));
        assert!(!catalog.is_subtype_of(object, truck));
        assert!(!catalog.is_subtype_of(location, truck));
    }

    #[test]
    fn unknown_type_is_a_startup_error() {
        let mut catalog = Catalog::new();
        let err = catalog.add_object("t1", "truck").unwrap_err();
        assert!(matches!(err, ModelError::UnknownType { .. }));
    }

    #[test]
    fn duplicate_object_name_rejected() {
        let mut catalog = logistics();
        let err = catalog.add_object("t1", "truck").unwrap_err();
        assert!(matches!(err, ModelError::DuplicateName { .. }));
    }

    #[test]
    fn predicate_signature_round_trips() {
        let catalog = logistics();
        let at = catalog.predicate_id("at").unwrap();
        let sig = catalog.predicate(at);
        assert_eq!(sig.arity(), 2);
        assert_eq!(catalog.type_name(sig.param_type(1)), "location");
        assert_eq!(catalog.predicate_name(at), "at");
    }

    #[test]
    fn max_arity_tracks_widest_predicate() {
        let mut catalog = logistics();
        assert_eq!(catalog.max_arity(), 2);
        catalog
            .add_predicate("path", &["location", "location", "location"])
            .unwrap();
        assert_eq!(catalog.max_arity(), 3);
    }
}
