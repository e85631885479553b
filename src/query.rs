//! Turning search terms into a store predicate.
//!
//! Matching itself is the store's business; this only describes what has to
//! match.

use crate::fields::{Catalog, FieldKey};
use crate::model::RecordKind;
use crate::options::{Options, SearchScope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive substring match on one field.
    Contains { field: FieldKey, needle: String },
    /// Case-insensitive substring match on a group name.
    GroupName(String),
    /// Substring match on the record id.
    Uid(String),
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: RecordKind,
    pub predicate: Predicate,
}

/// One conjunct per term, each a disjunction over the fields in scope; a
/// UID filter adds one more required conjunct.
pub fn build_query(catalog: &Catalog, options: &Options) -> Query {
    let kind = match options.scope {
        SearchScope::Groups => RecordKind::Group,
        SearchScope::NamesOnly | SearchScope::All => RecordKind::Person,
    };

    let mut conjuncts: Vec<Predicate> = options
        .terms
        .iter()
        .map(|term| term_predicate(catalog, options.scope, term))
        .collect();

    if let Some(uid) = options.uid_filter.as_deref().filter(|uid| !uid.is_empty()) {
        conjuncts.push(Predicate::Uid(uid.to_string()));
    }

    Query {
        kind,
        predicate: Predicate::All(conjuncts),
    }
}

fn term_predicate(catalog: &Catalog, scope: SearchScope, term: &str) -> Predicate {
    if scope == SearchScope::Groups {
        return Predicate::GroupName(term.to_string());
    }
    Predicate::Any(
        catalog
            .searchable(scope)
            .iter()
            .map(|spec| Predicate::Contains {
                field: spec.key,
                needle: term.to_string(),
            })
            .collect(),
    )
}
