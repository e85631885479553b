use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::macros::format_description;

use crate::db::{Database, IndexedItem, IndexedProp};
use crate::model::{FieldValue, Record};
use crate::search;
use crate::vcard_io;
use crate::vdir;

#[derive(Debug, Clone)]
pub struct IndexedRecord {
    pub item: IndexedItem,
    pub props: Vec<IndexedProp>,
}

pub fn build_record(record: &Record) -> Result<IndexedRecord> {
    let json = serde_json::to_string(record)
        .with_context(|| format!("failed to serialize record {}", record.id()))?;

    let (name_norm, props) = match record {
        Record::Person(person) => {
            let mut props = Vec::new();
            for (key, value) in &person.fields {
                for text in search_texts(value) {
                    push_prop(&mut props, key.as_str(), &text);
                }
            }
            (None, props)
        }
        Record::Group(group) => (Some(search::normalize(&group.name)), Vec::new()),
    };

    let item = IndexedItem {
        id: record.id().to_string(),
        kind: record.kind().as_str().to_string(),
        name_norm,
        record: json,
    };

    Ok(IndexedRecord { item, props })
}

fn push_prop(props: &mut Vec<IndexedProp>, field: &str, value: &str) {
    if let Some(value_norm) = search::normalize_query(value) {
        props.push(IndexedProp {
            field: field.to_string(),
            value_norm,
        });
    }
}

/// Strings a search term is matched against for one field value.
fn search_texts(value: &FieldValue) -> Vec<String> {
    match value {
        FieldValue::Text(text) => vec![text.clone()],
        FieldValue::Date(date) => date
            .format(format_description!("[year]-[month]-[day]"))
            .map(|formatted| vec![formatted])
            .unwrap_or_default(),
        FieldValue::Strings(multi) => {
            let mut texts = Vec::new();
            for entry in &multi.entries {
                texts.push(entry.value.clone());
                let digits = phone_digits(&entry.value);
                if digits.len() >= 3 && digits != entry.value {
                    texts.push(digits);
                }
            }
            texts
        }
        FieldValue::Addresses(multi) => multi
            .entries
            .iter()
            .map(|entry| entry.value.search_text())
            .collect(),
        FieldValue::Profiles(multi) => multi
            .entries
            .iter()
            .map(|entry| format!("{} {}", entry.value.service, entry.value.username))
            .collect(),
    }
}

// lets `5550199` find `555-0199`; non-phone values never reduce to digits
fn phone_digits(value: &str) -> String {
    let looks_like_phone = value
        .chars()
        .all(|c| c.is_ascii_digit() || " +-().".contains(c));
    if !looks_like_phone {
        return String::new();
    }
    value.chars().filter(char::is_ascii_digit).collect()
}

/// `uid:book` becomes `uid-n:book`.
fn numbered_id(id: &str, n: usize) -> String {
    match id.rsplit_once(':') {
        Some((uid, book)) => format!("{uid}-{n}:{book}"),
        None => format!("{id}-{n}"),
    }
}

/// Give every record from `path` an id no other file holds.
///
/// The first file indexed with a UID keeps it; later cards with the same UID
/// get a numbered id.
fn claim_ids(db: &Database, path: &Path, records: &mut [Record]) -> Result<()> {
    let mut claimed = HashSet::new();
    for record in records.iter_mut() {
        let id = record.id().to_string();
        let mut candidate = id.clone();
        let mut n = 2;
        loop {
            let held_elsewhere = match db.id_owner(&candidate)? {
                Some(owner) => owner != path,
                None => false,
            };
            if !held_elsewhere && !claimed.contains(&candidate) {
                break;
            }
            candidate = numbered_id(&id, n);
            n += 1;
        }
        if candidate != id {
            log::warn!("duplicate card {id} in {}, indexed as {candidate}", path.display());
            record.set_id(candidate.clone());
        }
        claimed.insert(candidate);
    }
    Ok(())
}

/// Bring the index in line with the vCard directory.
///
/// Files whose hash or mtime changed are re-read; files that disappeared
/// are dropped.
/// A card file that fails to parse is skipped with a warning so one bad
/// export does not hide the rest of the address book.
pub fn reindex(db: &mut Database, root: &Path, force: bool) -> Result<()> {
    let files = vdir::list_vcf_files(root)
        .with_context(|| format!("failed to scan vCard directory {}", root.display()))?;
    let paths_set: HashSet<PathBuf> = files.iter().cloned().collect();
    let stored = db.stored_files()?;
    let mut updated = 0usize;

    for path in files {
        let state = vdir::compute_file_state(&path)?;
        let requires_index = force
            || match stored.get(&path) {
                Some(existing) => existing.sha1 != state.sha1 || existing.mtime != state.mtime,
                None => true,
            };
        if !requires_index {
            continue;
        }

        let mut records = match vcard_io::load_records(root, &path) {
            Ok(records) => records,
            Err(err) => {
                log::warn!("unable to parse vCard file {}: {err:#}", path.display());
                db.delete_file(&path)?;
                continue;
            }
        };
        if records.is_empty() {
            log::warn!("file {} contained no vCards", path.display());
        }

        claim_ids(db, &path, &mut records)?;
        let indexed = records
            .iter()
            .map(build_record)
            .collect::<Result<Vec<_>>>()?;
        db.replace_file(&path, &state, &indexed)?;
        updated += 1;
    }

    let removed = db.remove_missing(&paths_set)?;
    log::debug!("index refreshed: {updated} files updated, {removed} removed");
    Ok(())
}
