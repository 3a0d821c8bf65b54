//! Optional capabilities of a surface
//!
//! Protocol extensions may give a surface additional behavior: an extended-surface with
//! client properties, a sub-surface attached to a parent, or a shell-surface with a title.
//! These are stored as independent facets keyed by their type. A surface can carry any
//! combination of them, and its buffer handling only ever looks at [`SubSurface`].

use std::{
    any::{Any, TypeId},
    collections::{BTreeMap, HashMap},
    fmt,
};

use super::SurfaceId;
use crate::utils::{Logical, Point};

/// Type-keyed set of capability objects
#[derive(Default)]
pub struct Facets {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl fmt::Debug for Facets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facets").field("len", &self.map.len()).finish_non_exhaustive()
    }
}

impl Facets {
    /// Insert a facet, returning the previous one of the same type
    pub fn insert<T: Any + Send>(&mut self, facet: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(facet))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Access a facet
    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.map.get(&TypeId::of::<T>()).and_then(|f| f.downcast_ref())
    }

    /// Mutably access a facet
    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.map.get_mut(&TypeId::of::<T>()).and_then(|f| f.downcast_mut())
    }

    /// Remove a facet
    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|f| f.downcast::<T>().ok())
            .map(|f| *f)
    }

    /// Whether a facet of this type is present
    pub fn contains<T: Any + Send>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Number of facets
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no facet is present
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Generic client-settable properties of a surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedSurface {
    /// Properties set by the client, by name
    pub properties: BTreeMap<String, String>,
}

/// Sub-surface role of a surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubSurface {
    /// The surface this one is attached to
    ///
    /// A sub-surface with a parent is never mapped on its own.
    pub parent: Option<SurfaceId>,
    /// Position relative to the parent
    pub position: Point<i32, Logical>,
}

/// Kind of a shell surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShellSurfaceKind {
    /// Not configured yet
    #[default]
    None,
    /// A regular window
    Toplevel,
    /// A window positioned relative to another surface
    Transient,
    /// A fullscreen window
    Fullscreen,
    /// A popup menu
    Popup,
}

/// Shell role of a surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSurface {
    /// Title of the window
    pub title: String,
    /// Class (application id) of the window
    pub class: String,
    /// What the surface is used as
    pub kind: ShellSurfaceKind,
}

#[cfg(test)]
mod tests {
    use super::{ExtendedSurface, Facets, ShellSurface, SubSurface};

    #[test]
    fn keyed_by_type() {
        let mut facets = Facets::default();
        assert!(facets.is_empty());

        assert!(facets.insert(SubSurface::default()).is_none());
        let mut shell = ShellSurface::default();
        shell.title = "hello".into();
        facets.insert(shell);

        assert_eq!(facets.len(), 2);
        assert!(facets.contains::<SubSurface>());
        assert!(!facets.contains::<ExtendedSurface>());
        assert_eq!(facets.get::<ShellSurface>().unwrap().title, "hello");

        facets.get_mut::<ShellSurface>().unwrap().title = "world".into();
        let replaced = facets.insert(ShellSurface::default()).unwrap();
        assert_eq!(replaced.title, "world");

        assert!(facets.remove::<SubSurface>().is_some());
        assert!(facets.remove::<SubSurface>().is_none());
        assert_eq!(facets.len(), 1);
    }
}
