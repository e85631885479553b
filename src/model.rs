//! Records as the contact store hands them out.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::fields::FieldKey;

/// One value of a multi-valued field together with its raw label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labeled<V> {
    pub label: String,
    pub value: V,
}

/// An ordered list of labeled values. `primary` points at the entry the
/// store flags as the default, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiValue<V> {
    pub entries: Vec<Labeled<V>>,
    pub primary: Option<usize>,
}

impl<V> MultiValue<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            primary: None,
        }
    }

    pub fn push(&mut self, label: impl Into<String>, value: V) {
        self.entries.push(Labeled {
            label: label.into(),
            value,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn primary_value(&self) -> Option<&V> {
        self.primary
            .and_then(|idx| self.entries.get(idx))
            .map(|entry| &entry.value)
    }
}

impl<V> Default for MultiValue<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for MultiValue<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut multi = MultiValue::new();
        for (label, value) in iter {
            multi.push(label, value);
        }
        multi
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
}

impl Address {
    /// `street, city state zip`, skipping the parts that are missing.
    pub fn one_line(&self) -> String {
        let street = self
            .street
            .as_deref()
            .map(|s| s.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(", "))
            .filter(|s| !s.is_empty());
        let locality = [&self.city, &self.state, &self.postal_code]
            .iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let mut parts = Vec::new();
        if let Some(street) = street {
            parts.push(street);
        }
        if !locality.is_empty() {
            parts.push(locality);
        }
        parts.join(", ")
    }

    /// The one-line form followed by the country; used for map lookups.
    pub fn search_text(&self) -> String {
        let mut text = self.one_line();
        if let Some(country) = self.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            if !text.is_empty() {
                text.push_str(", ");
            }
            text.push_str(country);
        }
        text
    }

    pub fn is_empty(&self) -> bool {
        self.search_text().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub service: String,
    pub username: String,
}

/// The value shapes a field can hold for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Date(Date),
    Strings(MultiValue<String>),
    Addresses(MultiValue<Address>),
    Profiles(MultiValue<SocialProfile>),
}

impl FieldValue {
    /// Empty strings and empty lists count as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::Date(_) => false,
            FieldValue::Strings(multi) => multi.is_empty(),
            FieldValue::Addresses(multi) => multi.is_empty(),
            FieldValue::Profiles(multi) => multi.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&MultiValue<String>> {
        match self {
            FieldValue::Strings(multi) => Some(multi),
            _ => None,
        }
    }

    pub fn as_addresses(&self) -> Option<&MultiValue<Address>> {
        match self {
            FieldValue::Addresses(multi) => Some(multi),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Store identifier: `<card uid>:<address book>`.
    pub id: String,
    pub path: PathBuf,
    pub fields: BTreeMap<FieldKey, FieldValue>,
    /// Opaque description shown by the raw display form.
    pub description: String,
}

impl Person {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: PathBuf::new(),
            fields: BTreeMap::new(),
            description: String::new(),
        }
    }

    pub fn value(&self, key: FieldKey) -> Option<&FieldValue> {
        self.fields.get(&key).filter(|value| !value.is_empty())
    }

    pub fn text(&self, key: FieldKey) -> Option<&str> {
        self.value(key).and_then(FieldValue::as_text)
    }

    pub fn set(&mut self, key: FieldKey, value: FieldValue) {
        if value.is_empty() {
            self.fields.remove(&key);
        } else {
            self.fields.insert(key, value);
        }
    }

    #[cfg(test)]
    pub fn with(mut self, key: FieldKey, value: FieldValue) -> Self {
        self.set(key, value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    /// Store ids of the members.
    pub members: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Person(Person),
    Group(Group),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Person(person) => &person.id,
            Record::Group(group) => &group.id,
        }
    }

    pub fn set_id(&mut self, id: String) {
        match self {
            Record::Person(person) => person.id = id,
            Record::Group(group) => group.id = id,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Record::Person(person) => &person.path,
            Record::Group(group) => &group.path,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Person(_) => RecordKind::Person,
            Record::Group(_) => RecordKind::Group,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Person,
    Group,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Person => "person",
            RecordKind::Group => "group",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(street: &str, city: &str, state: &str, zip: &str) -> Address {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Address {
            street: opt(street),
            city: opt(city),
            state: opt(state),
            postal_code: opt(zip),
            country: None,
            country_code: None,
        }
    }

    #[test]
    fn test_address_one_line_full() {
        let a = addr("1 Main St", "Springfield", "IL", "62701");
        assert_eq!(a.one_line(), "1 Main St, Springfield IL 62701");
    }

    #[test]
    fn test_address_one_line_skips_missing_parts() {
        assert_eq!(addr("", "Springfield", "", "62701").one_line(), "Springfield 62701");
        assert_eq!(addr("1 Main St", "", "", "").one_line(), "1 Main St");
        assert_eq!(addr("Flat 2\n1 Main St", "", "", "").one_line(), "Flat 2, 1 Main St");
        assert!(addr("", "", "", "").is_empty());
    }

    #[test]
    fn test_address_search_text_appends_country() {
        let mut a = addr("1 Main St", "Springfield", "IL", "62701");
        a.country = Some("USA".into());
        assert_eq!(a.search_text(), "1 Main St, Springfield IL 62701, USA");
    }

    #[test]
    fn test_empty_values_are_absent() {
        let person = Person::new("x:default")
            .with(FieldKey::FirstName, FieldValue::Text(String::new()))
            .with(FieldKey::Email, FieldValue::Strings(MultiValue::new()));
        assert!(person.value(FieldKey::FirstName).is_none());
        assert!(person.value(FieldKey::Email).is_none());
    }

    #[test]
    fn test_primary_value_follows_index() {
        let mut multi: MultiValue<String> =
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]
                .into_iter()
                .collect();
        assert_eq!(multi.primary_value(), None);
        multi.primary = Some(1);
        assert_eq!(multi.primary_value().map(String::as_str), Some("2"));
    }
}
