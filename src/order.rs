//! Result ordering.

use crate::fields::FieldKey;
use crate::model::{Group, Person, Record};
use crate::search::normalize;

const PERSON_KEYS: [FieldKey; 3] = [FieldKey::LastName, FieldKey::FirstName, FieldKey::Organization];

/// Case- and accent-insensitive collation key. Missing values sort first.
fn collation_key(value: Option<&str>) -> String {
    value.map(normalize).unwrap_or_default()
}

fn person_key(person: &Person) -> Vec<String> {
    PERSON_KEYS
        .iter()
        .map(|key| collation_key(person.text(*key)))
        .collect()
}

fn group_key(group: &Group) -> Vec<String> {
    vec![collation_key(Some(&group.name))]
}

fn record_key(record: &Record) -> Vec<String> {
    match record {
        Record::Person(person) => person_key(person),
        Record::Group(group) => group_key(group),
    }
}

/// Stable sort: people by (last, first, organization), groups by name.
pub fn sort_records(records: &mut [Record]) {
    records.sort_by_cached_key(record_key);
}

pub fn sort_people(people: &mut [Person]) {
    people.sort_by_cached_key(person_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use std::path::PathBuf;

    fn person(id: &str, first: &str, last: &str, org: &str) -> Person {
        let text = |s: &str| FieldValue::Text(s.to_string());
        Person::new(id)
            .with(FieldKey::FirstName, text(first))
            .with(FieldKey::LastName, text(last))
            .with(FieldKey::Organization, text(org))
    }

    fn group(id: &str, name: &str) -> Record {
        Record::Group(Group {
            id: id.to_string(),
            path: PathBuf::new(),
            name: name.to_string(),
            members: Vec::new(),
            description: String::new(),
        })
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(Record::id).collect()
    }

    #[test]
    fn test_sort_by_last_then_first_then_org() {
        let mut records = vec![
            Record::Person(person("1", "Zoe", "Adams", "")),
            Record::Person(person("2", "Anna", "smith", "Beta")),
            Record::Person(person("3", "Anna", "Smith", "Acme")),
            Record::Person(person("4", "Bob", "Adams", "")),
        ];
        sort_records(&mut records);
        assert_eq!(ids(&records), vec!["4", "1", "3", "2"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut records = vec![
            Record::Person(person("b", "Jane", "Doe", "")),
            Record::Person(person("a", "JANE", "doe", "")),
            Record::Person(person("c", "jane", "DOE", "")),
        ];
        sort_records(&mut records);
        assert_eq!(ids(&records), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_folds_accents() {
        let mut people = vec![
            person("1", "", "Zimmer", ""),
            person("2", "", "Émile", ""),
            person("3", "", "Eaton", ""),
        ];
        sort_people(&mut people);
        let order: Vec<_> = people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(order, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_missing_names_sort_first() {
        let mut people = vec![person("named", "Al", "Baker", ""), person("org", "", "", "Acme")];
        sort_people(&mut people);
        assert_eq!(people[0].id, "org");
    }

    #[test]
    fn test_groups_sort_by_name() {
        let mut records = vec![group("1", "Work"), group("2", "family"), group("3", "Book club")];
        sort_records(&mut records);
        assert_eq!(ids(&records), vec!["3", "2", "1"]);
    }
}
