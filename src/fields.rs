//! The field table.
//!
//! A fixed, ordered catalog of the attributes a contact can carry. Order
//! matters twice over: it is the display order, and the leading name fields
//! form the block that name-only searches use and that the standard display
//! collapses into a single `Name` line.

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

use crate::model::{FieldValue, Person};
use crate::options::{DisplayForm, SearchScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    FirstName,
    LastName,
    MiddleName,
    Nickname,
    MaidenName,
    Organization,
    Phone,
    Email,
    Address,
    JobTitle,
    Department,
    Url,
    Birthday,
    Anniversary,
    SocialProfile,
    InstantMessage,
    Related,
    Note,
    Modified,
}

impl FieldKey {
    /// Stable identifier used for index rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::FirstName => "first",
            FieldKey::LastName => "last",
            FieldKey::MiddleName => "middle",
            FieldKey::Nickname => "nickname",
            FieldKey::MaidenName => "maiden",
            FieldKey::Organization => "org",
            FieldKey::Phone => "phone",
            FieldKey::Email => "email",
            FieldKey::Address => "address",
            FieldKey::JobTitle => "title",
            FieldKey::Department => "department",
            FieldKey::Url => "url",
            FieldKey::Birthday => "birthday",
            FieldKey::Anniversary => "anniversary",
            FieldKey::SocialProfile => "social",
            FieldKey::InstantMessage => "im",
            FieldKey::Related => "related",
            FieldKey::Note => "note",
            FieldKey::Modified => "modified",
        }
    }
}

/// Shape of the values a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    PlainString,
    MultiLineString,
    Date,
    MultiString,
    MultiAddress,
    MultiSocialProfile,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Terminal display width of `label`.
    pub width: usize,
}

impl FieldSpec {
    fn new(key: FieldKey, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            width: UnicodeWidthStr::width(label),
        }
    }
}

/// Number of leading name fields (first name through maiden name).
pub const NAME_FIELDS: usize = 5;

/// Number of fields shown by the standard and plain forms.
pub const STANDARD_FIELDS: usize = 9;

/// Label of the synthesized name line.
pub const NAME_LABEL: &str = "Name";

#[derive(Debug, Clone)]
pub struct Catalog {
    specs: Vec<FieldSpec>,
}

impl Catalog {
    pub fn new() -> Self {
        use FieldKind::*;

        let specs = vec![
            FieldSpec::new(FieldKey::FirstName, "First", PlainString),
            FieldSpec::new(FieldKey::LastName, "Last", PlainString),
            FieldSpec::new(FieldKey::MiddleName, "Middle", PlainString),
            FieldSpec::new(FieldKey::Nickname, "Nickname", PlainString),
            FieldSpec::new(FieldKey::MaidenName, "Maiden", PlainString),
            FieldSpec::new(FieldKey::Organization, "Company", PlainString),
            FieldSpec::new(FieldKey::Phone, "Phone", MultiString),
            FieldSpec::new(FieldKey::Email, "Email", MultiString),
            FieldSpec::new(FieldKey::Address, "Address", MultiAddress),
            FieldSpec::new(FieldKey::JobTitle, "Title", PlainString),
            FieldSpec::new(FieldKey::Department, "Department", PlainString),
            FieldSpec::new(FieldKey::Url, "URL", MultiString),
            FieldSpec::new(FieldKey::Birthday, "Birthday", Date),
            FieldSpec::new(FieldKey::Anniversary, "Anniversary", Date),
            FieldSpec::new(FieldKey::SocialProfile, "Social", MultiSocialProfile),
            FieldSpec::new(FieldKey::InstantMessage, "IM", MultiString),
            FieldSpec::new(FieldKey::Related, "Related", MultiString),
            FieldSpec::new(FieldKey::Note, "Note", MultiLineString),
            FieldSpec::new(FieldKey::Modified, "Modified", Date),
        ];

        Self { specs }
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn name_fields(&self) -> &[FieldSpec] {
        &self.specs[..NAME_FIELDS]
    }

    pub fn is_name_field(&self, index: usize) -> bool {
        index < NAME_FIELDS
    }

    #[cfg(test)]
    pub fn get(&self, key: FieldKey) -> Option<&FieldSpec> {
        self.specs.iter().find(|spec| spec.key == key)
    }

    pub fn index_of(&self, key: FieldKey) -> Option<usize> {
        self.specs.iter().position(|spec| spec.key == key)
    }

    /// How many leading fields a display form fetches and shows.
    pub fn cutoff(&self, form: DisplayForm) -> usize {
        match form {
            DisplayForm::Standard | DisplayForm::Plain | DisplayForm::Brief => STANDARD_FIELDS,
            DisplayForm::Long => self.specs.len(),
            DisplayForm::Raw => 0,
        }
    }

    /// Fields whose values participate in a search with the given scope.
    /// Group searches match group names only, which are not catalog fields.
    pub fn searchable(&self, scope: SearchScope) -> &[FieldSpec] {
        match scope {
            SearchScope::NamesOnly => self.name_fields(),
            SearchScope::All => &self.specs,
            SearchScope::Groups => &[],
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Values fetched for one record, indexed like the catalog.
///
/// Built fresh for every record so nothing carries over between records.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    values: Vec<Option<FieldValue>>,
}

impl FieldValues {
    /// Fetch the first `cutoff` fields of `person`.
    pub fn fetch(catalog: &Catalog, person: &Person, cutoff: usize) -> Self {
        let cutoff = cutoff.min(catalog.len());
        let values = catalog
            .specs()
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                if index < cutoff {
                    person.value(spec.key).cloned()
                } else {
                    None
                }
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&FieldValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn text(&self, index: usize) -> Option<&str> {
        self.get(index).and_then(FieldValue::as_text)
    }

    pub fn lookup(&self, catalog: &Catalog, key: FieldKey) -> Option<&FieldValue> {
        catalog.index_of(key).and_then(|index| self.get(index))
    }

    #[cfg(test)]
    pub fn has_name(&self) -> bool {
        (0..NAME_FIELDS).any(|index| self.get(index).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MultiValue;

    #[test]
    fn test_name_fields_come_first() {
        let catalog = Catalog::new();
        let keys: Vec<_> = catalog.name_fields().iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            vec![
                FieldKey::FirstName,
                FieldKey::LastName,
                FieldKey::MiddleName,
                FieldKey::Nickname,
                FieldKey::MaidenName,
            ]
        );
        for (index, spec) in catalog.specs().iter().enumerate() {
            let is_name = keys.contains(&spec.key);
            assert_eq!(catalog.is_name_field(index), is_name, "{:?}", spec.key);
        }
    }

    #[test]
    fn test_standard_cutoff_ends_after_address() {
        let catalog = Catalog::new();
        let cutoff = catalog.cutoff(DisplayForm::Standard);
        assert_eq!(catalog.specs()[cutoff - 1].key, FieldKey::Address);
        assert_eq!(catalog.cutoff(DisplayForm::Long), catalog.len());
        assert_eq!(catalog.cutoff(DisplayForm::Raw), 0);
    }

    #[test]
    fn test_widths_are_precomputed() {
        let catalog = Catalog::new();
        assert_eq!(catalog.get(FieldKey::Email).unwrap().width, 5);
        assert_eq!(catalog.get(FieldKey::Url).unwrap().width, 3);
    }

    #[test]
    fn test_keys_are_unique() {
        let catalog = Catalog::new();
        let mut keys: Vec<_> = catalog.specs().iter().map(|s| s.key.as_str()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), catalog.len());
    }

    #[test]
    fn test_searchable_follows_scope() {
        let catalog = Catalog::new();
        assert_eq!(catalog.searchable(SearchScope::NamesOnly).len(), NAME_FIELDS);
        assert_eq!(catalog.searchable(SearchScope::All).len(), catalog.len());
        assert!(catalog.searchable(SearchScope::Groups).is_empty());
    }

    #[test]
    fn test_fetch_respects_cutoff() {
        let catalog = Catalog::new();
        let person = Person::new("a:default")
            .with(FieldKey::FirstName, FieldValue::Text("Jane".into()))
            .with(FieldKey::Note, FieldValue::Text("hello".into()))
            .with(FieldKey::Email, FieldValue::Strings(MultiValue::new()));

        let standard = FieldValues::fetch(&catalog, &person, catalog.cutoff(DisplayForm::Standard));
        assert_eq!(standard.text(0), Some("Jane"));
        let note_index = catalog.specs().iter().position(|s| s.key == FieldKey::Note).unwrap();
        assert!(standard.get(note_index).is_none());

        let long = FieldValues::fetch(&catalog, &person, catalog.cutoff(DisplayForm::Long));
        assert_eq!(long.text(note_index), Some("hello"));
        let email_index = catalog.specs().iter().position(|s| s.key == FieldKey::Email).unwrap();
        assert!(long.get(email_index).is_none());
        assert!(long.has_name());
    }
}
