//! Execution tree scopes and the set of scopes currently open in the report.

use std::rc::Rc;

use crate::core::types::{Skip, UnitId};

/// Stable identity of a scope or test within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKind {
    /// Root scope of a compilation unit.
    Unit(UnitId),
    Group,
}

/// A group node in the execution tree. Parents are shared, so a scope can be
/// referenced by any number of descendants.
#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub kind: ScopeKind,
    pub parent: Option<Rc<Scope>>,
    pub skip: Option<Skip>,
}

impl Scope {
    /// Root scope for a unit, named after its class.
    pub fn unit(id: ScopeId, unit: UnitId) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: unit.class_name(),
            kind: ScopeKind::Unit(unit),
            parent: None,
            skip: None,
        })
    }

    pub fn group(
        id: ScopeId,
        name: impl Into<String>,
        parent: Option<&Rc<Scope>>,
        skip: Option<Skip>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id,
            name: name.into(),
            kind: ScopeKind::Group,
            parent: parent.cloned(),
            skip,
        })
    }

    /// This scope followed by its ancestors, innermost first.
    pub fn chain(self: &Rc<Self>) -> impl Iterator<Item = &Rc<Scope>> {
        std::iter::successors(Some(self), |&scope| scope.parent.as_ref())
    }

    /// Unit the scope belongs to, if its root is a unit scope.
    pub fn unit_id(self: &Rc<Self>) -> Option<&UnitId> {
        self.chain().find_map(|scope| match &scope.kind {
            ScopeKind::Unit(unit) => Some(unit),
            ScopeKind::Group => None,
        })
    }

    /// Names from the root down to this scope, space separated.
    pub fn full_name(self: &Rc<Self>) -> String {
        let mut names: Vec<&str> = self.chain().map(|scope| scope.name.as_str()).collect();
        names.reverse();
        names.join(" ")
    }
}

/// A single test.
#[derive(Debug, Clone)]
pub struct Test {
    pub id: ScopeId,
    pub name: String,
    pub parent: Option<Rc<Scope>>,
    pub skip: Option<Skip>,
}

impl Test {
    pub fn new(id: ScopeId, name: impl Into<String>, parent: Option<&Rc<Scope>>) -> Self {
        Self {
            id,
            name: name.into(),
            parent: parent.cloned(),
            skip: None,
        }
    }

    pub fn unit_id(&self) -> Option<&UnitId> {
        self.parent.as_ref().and_then(|parent| parent.unit_id())
    }

    pub fn full_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{} {}", parent.full_name(), self.name),
            None => self.name.clone(),
        }
    }
}

/// Scopes whose header has been written and whose indent level is still open.
///
/// A scope is added at most once and removed at most once.
#[derive(Debug, Default)]
pub struct OpenScopeSet {
    open: Vec<ScopeId>,
}

impl OpenScopeSet {
    pub fn contains(&self, id: ScopeId) -> bool {
        self.open.contains(&id)
    }

    /// Returns true if the scope was not already open.
    pub fn insert_if_absent(&mut self, id: ScopeId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.open.push(id);
        true
    }

    /// Returns true if the scope was open.
    pub fn remove_if_present(&mut self, id: ScopeId) -> bool {
        match self.open.iter().position(|open| *open == id) {
            Some(index) => {
                self.open.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every open scope, returning how many were open.
    pub fn drain(&mut self) -> usize {
        let count = self.open.len();
        self.open.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
