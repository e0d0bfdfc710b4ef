//! Mapping of semantic roles onto concrete schema field names.
//!
//! Two roles need a field: the meeting date and the languages category.
//! Resolution runs in tiers:
//!
//! 1. A field named exactly the configured default wins outright.
//! 2. Otherwise the role's candidates are filtered from the schema (never a
//!    read-only field, never a `createdate` system timestamp).
//! 3. Among candidates, one whose name contains the role's keyword is
//!    preferred, then the first in declared order.
//! 4. With no candidate the default name is kept and the write may fail;
//!    that failure is reported, not corrected here.

use tracing::debug;

use crate::schema::{FieldDefinition, SchemaDescriptor};

/// A preference predicate over schema fields.
pub type Tier<'a> = &'a dyn Fn(&FieldDefinition) -> bool;

/// First candidate matching the earliest tier that matches anything.
///
/// Candidates are scanned in order, so within a tier declared order decides.
pub fn best_match<'a>(
    candidates: &[&'a FieldDefinition],
    tiers: &[Tier<'_>],
) -> Option<&'a FieldDefinition> {
    tiers
        .iter()
        .find_map(|tier| candidates.iter().copied().find(|f| tier(*f)))
}

/// A semantic purpose a field must serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The meeting date.
    Date,
    /// The language preference.
    Category,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Category => "category",
        }
    }

    /// Name fragment that marks a candidate as the intended one.
    fn keyword(self) -> &'static str {
        match self {
            Self::Date => "meeting",
            Self::Category => "language",
        }
    }

    fn is_candidate(self, field: &FieldDefinition) -> bool {
        if field.read_only {
            return false;
        }
        match self {
            Self::Date => {
                field.data_type.is_temporal()
                    && !field.name.to_lowercase().contains("createdate")
            }
            Self::Category => field.is_enumerated(),
        }
    }
}

/// How a role's field name was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleResolution {
    /// The configured default exists in the schema.
    Explicit,
    /// Picked from schema candidates.
    Inferred,
    /// No candidate; the configured default is used unverified.
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub name: String,
    pub resolution: RoleResolution,
}

/// Concrete field names chosen for one booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFieldMap {
    pub date: ResolvedRole,
    pub category: ResolvedRole,
}

impl ResolvedFieldMap {
    /// The configured names, unverified. Used by search, which does no inference.
    pub fn defaults(default_date: &str, default_category: &str) -> Self {
        Self {
            date: ResolvedRole {
                name: default_date.to_string(),
                resolution: RoleResolution::Default,
            },
            category: ResolvedRole {
                name: default_category.to_string(),
                resolution: RoleResolution::Default,
            },
        }
    }

    pub fn date_field(&self) -> &str {
        &self.date.name
    }

    pub fn category_field(&self) -> &str {
        &self.category.name
    }

    /// Roles that fell back to an unverified default.
    pub fn unresolved(&self) -> impl Iterator<Item = (Role, &str)> {
        [(Role::Date, &self.date), (Role::Category, &self.category)]
            .into_iter()
            .filter(|(_, r)| r.resolution == RoleResolution::Default)
            .map(|(role, r)| (role, r.name.as_str()))
    }
}

/// Resolve both roles against `schema`.
pub fn resolve_fields(
    schema: &SchemaDescriptor,
    default_date: &str,
    default_category: &str,
) -> ResolvedFieldMap {
    ResolvedFieldMap {
        date: resolve_role(schema, Role::Date, default_date),
        category: resolve_role(schema, Role::Category, default_category),
    }
}

/// Resolve a single role.
pub fn resolve_role(schema: &SchemaDescriptor, role: Role, default: &str) -> ResolvedRole {
    if schema.has_field(default) {
        return ResolvedRole {
            name: default.to_string(),
            resolution: RoleResolution::Explicit,
        };
    }

    let candidates: Vec<&FieldDefinition> = schema
        .fields
        .iter()
        .filter(|f| role.is_candidate(f))
        .collect();
    let keyword = role.keyword();
    let named = |f: &FieldDefinition| f.name.to_lowercase().contains(keyword);
    let any = |_: &FieldDefinition| true;

    match best_match(&candidates, &[&named, &any]) {
        Some(field) => {
            debug!(
                role = role.as_str(),
                field = %field.name,
                candidates = candidates.len(),
                "inferred field for role"
            );
            ResolvedRole {
                name: field.name.clone(),
                resolution: RoleResolution::Inferred,
            }
        }
        None => ResolvedRole {
            name: default.to_string(),
            resolution: RoleResolution::Default,
        },
    }
}
