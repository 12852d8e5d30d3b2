//! Role hierarchy.
//!
//! # Spring Security Equivalent
//! `RoleHierarchyImpl`
//!
//! A role "includes" every role reachable from it through `>` edges. The
//! hierarchy is a DAG; the transitive closure is computed once when the
//! hierarchy is built so that lookups at request time are a set union.

use std::collections::{BTreeSet, HashMap, HashSet};

use derive_more::{Display, Error};

const ROLE_PREFIX: &str = "ROLE_";

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[display("role hierarchy contains a cycle through {role}")]
    Cycle {
        #[error(not(source))]
        role: String,
    },
    #[display("malformed role hierarchy line: {line}")]
    Malformed {
        #[error(not(source))]
        line: String,
    },
}

/// Immutable role hierarchy with precomputed reachability.
///
/// # Example
/// ```
/// use registration_security_core::http::security::RoleHierarchy;
///
/// let hierarchy = RoleHierarchy::parse("ROLE_ADMIN > ROLE_STAFF\nROLE_STAFF > ROLE_USER").unwrap();
/// let roles = hierarchy.reachable_roles(&["ADMIN".to_string()]);
///
/// assert!(roles.contains("STAFF"));
/// assert!(roles.contains("USER"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    reachable: HashMap<String, BTreeSet<String>>,
}

impl RoleHierarchy {
    /// A hierarchy where every role only includes itself.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> RoleHierarchyBuilder {
        RoleHierarchyBuilder::default()
    }

    /// Parses one rule per line, `HIGHER > LOWER [> LOWER ...]`.
    ///
    /// The `ROLE_` prefix is optional and stripped. Blank lines are ignored.
    pub fn parse(definition: &str) -> Result<Self, HierarchyError> {
        let mut builder = Self::builder();
        for line in definition.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let roles: Vec<&str> = line.split('>').map(str::trim).collect();
            if roles.len() < 2 || roles.iter().any(|r| r.is_empty()) {
                return Err(HierarchyError::Malformed {
                    line: line.to_string(),
                });
            }
            for pair in roles.windows(2) {
                builder = builder.include(pair[0], pair[1]);
            }
        }
        builder.build()
    }

    /// Returns the given roles plus everything they include.
    pub fn reachable_roles(&self, roles: &[String]) -> HashSet<String> {
        let mut result = HashSet::new();
        for role in roles {
            let role = normalize(role);
            match self.reachable.get(role) {
                Some(reachable) => result.extend(reachable.iter().cloned()),
                None => {
                    result.insert(role.to_string());
                }
            }
        }
        result
    }

    /// Whether holding `held` grants `required`.
    pub fn implies(&self, held: &str, required: &str) -> bool {
        let (held, required) = (normalize(held), normalize(required));
        held == required
            || self
                .reachable
                .get(held)
                .is_some_and(|reachable| reachable.contains(required))
    }
}

/// Collects `higher > lower` edges and validates them into a [`RoleHierarchy`].
#[derive(Debug, Default)]
pub struct RoleHierarchyBuilder {
    edges: HashMap<String, BTreeSet<String>>,
}

impl RoleHierarchyBuilder {
    /// Declares that `higher` includes `lower`.
    pub fn include(mut self, higher: &str, lower: &str) -> Self {
        self.edges
            .entry(normalize(higher).to_string())
            .or_default()
            .insert(normalize(lower).to_string());
        self.edges.entry(normalize(lower).to_string()).or_default();
        self
    }

    pub fn build(self) -> Result<RoleHierarchy, HierarchyError> {
        let mut state: HashMap<&str, Visit> = HashMap::new();
        let mut order = Vec::new();
        let mut roles: Vec<&String> = self.edges.keys().collect();
        roles.sort();
        for role in roles {
            visit(role, &self.edges, &mut state, &mut order)?;
        }

        // `order` is post-order: every role appears after all roles it includes.
        let mut reachable: HashMap<String, BTreeSet<String>> = HashMap::new();
        for role in order {
            let mut closure = BTreeSet::from([role.to_string()]);
            for lower in &self.edges[role] {
                closure.extend(reachable[lower.as_str()].iter().cloned());
            }
            reachable.insert(role.to_string(), closure);
        }

        Ok(RoleHierarchy { reachable })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

fn visit<'a>(
    role: &'a str,
    edges: &'a HashMap<String, BTreeSet<String>>,
    state: &mut HashMap<&'a str, Visit>,
    order: &mut Vec<&'a str>,
) -> Result<(), HierarchyError> {
    match state.get(role) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => {
            return Err(HierarchyError::Cycle {
                role: role.to_string(),
            })
        }
        None => {}
    }
    state.insert(role, Visit::InProgress);
    if let Some(lower) = edges.get(role) {
        for next in lower {
            visit(next, edges, state, order)?;
        }
    }
    state.insert(role, Visit::Done);
    order.push(role);
    Ok(())
}

fn normalize(role: &str) -> &str {
    role.strip_prefix(ROLE_PREFIX).unwrap_or(role)
}
