//! Rendering records as terminal text.
//!
//! Every form is driven by the field table: the formatter fetches the fields
//! a form needs into a fresh [`FieldValues`], works out the label column
//! width from what is actually present, and then renders each field by the
//! shape of its value.

use time::macros::format_description;
use time::Date;
use unicode_width::UnicodeWidthStr;

use crate::fields::{Catalog, FieldKey, FieldKind, FieldSpec, FieldValues, NAME_FIELDS, NAME_LABEL};
use crate::label;
use crate::model::{FieldValue, Group, MultiValue, Person};
use crate::options::{DisplayForm, Options};
use crate::select::first_labeled;

/// Phone labels shown by the brief form, in order.
const BRIEF_PHONES: [&str; 3] = [label::MOBILE, label::HOME, label::WORK];
/// Email labels shown by the brief form, in order.
const BRIEF_EMAILS: [&str; 2] = [label::HOME, label::WORK];

/// The parts of a record that make up its display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NameParts<'a> {
    pub first: Option<&'a str>,
    pub last: Option<&'a str>,
    pub nickname: Option<&'a str>,
    pub organization: Option<&'a str>,
}

impl<'a> NameParts<'a> {
    pub fn from_values(catalog: &Catalog, values: &'a FieldValues) -> Self {
        let text = move |key| values.lookup(catalog, key).and_then(FieldValue::as_text);
        Self {
            first: text(FieldKey::FirstName),
            last: text(FieldKey::LastName),
            nickname: text(FieldKey::Nickname),
            organization: text(FieldKey::Organization),
        }
    }

    pub fn from_person(person: &'a Person) -> Self {
        Self {
            first: person.text(FieldKey::FirstName),
            last: person.text(FieldKey::LastName),
            nickname: person.text(FieldKey::Nickname),
            organization: person.text(FieldKey::Organization),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Render a display name followed by `terminator`.
///
/// A nickname wins over the first name. The organization is only used when
/// neither a given name nor a last name exists. Nothing at all yields an
/// empty string, without the terminator.
pub fn format_name(parts: &NameParts<'_>, terminator: &str) -> String {
    let given = non_empty(parts.nickname).or_else(|| non_empty(parts.first));
    let last = non_empty(parts.last);

    let name = match (given, last) {
        (None, None) => match non_empty(parts.organization) {
            Some(org) => org.to_string(),
            None => return String::new(),
        },
        (Some(given), None) => given.to_string(),
        (None, Some(last)) => last.to_string(),
        (Some(given), Some(last)) => format!("{given} {last}"),
    };

    format!("{name}{terminator}")
}

/// Strip the trailing `:<storeid>` from a record id.
pub fn display_uid(id: &str) -> &str {
    id.rsplit_once(':').map(|(uid, _)| uid).unwrap_or(id)
}

/// `"<n> matches"`, or nothing for exactly one match.
pub fn summary_line(count: usize) -> Option<String> {
    if count == 1 {
        None
    } else {
        Some(format!("{} {}", count, match_noun(count)))
    }
}

fn match_noun(count: usize) -> &'static str {
    if count == 1 {
        "match"
    } else {
        "matches"
    }
}

fn long_date(date: &Date) -> String {
    let format = format_description!("[weekday], [month repr:long] [day padding:none], [year]");
    date.format(&format).unwrap_or_else(|_| date.to_string())
}

/// Split on any CR, LF or CRLF boundary.
fn split_lines(text: &str) -> Vec<&str> {
    text.trim_end_matches(['\r', '\n'])
        .split("\r\n")
        .flat_map(|chunk| chunk.split(['\r', '\n']))
        .collect()
}

fn tagged(value: &str, raw_label: &str, abbreviated: bool) -> String {
    let tag = label::display(raw_label, abbreviated);
    if tag.is_empty() {
        value.to_string()
    } else {
        format!("{value} ({tag})")
    }
}

pub struct Formatter<'a> {
    catalog: &'a Catalog,
    form: DisplayForm,
    show_uid: bool,
}

impl<'a> Formatter<'a> {
    pub fn new(catalog: &'a Catalog, options: &Options) -> Self {
        Self {
            show_uid: options.show_uid,
            ..Self::with_form(catalog, options.form)
        }
    }

    pub fn with_form(catalog: &'a Catalog, form: DisplayForm) -> Self {
        Self {
            catalog,
            form,
            show_uid: false,
        }
    }

    pub fn person(&self, person: &Person) -> String {
        if self.form == DisplayForm::Raw {
            return raw(&person.description);
        }

        let cutoff = self.catalog.cutoff(self.form);
        let values = FieldValues::fetch(self.catalog, person, cutoff);

        if self.form == DisplayForm::Brief {
            return self.brief(&values);
        }

        let name = format_name(&NameParts::from_values(self.catalog, &values), "");
        let width = self.label_width(&values, cutoff, !name.is_empty());
        let mut out = String::new();

        for (index, spec) in self.catalog.specs()[..cutoff].iter().enumerate() {
            if self.form.collapses_name() && self.catalog.is_name_field(index) {
                if index == 0 && !name.is_empty() {
                    self.line(&mut out, NAME_LABEL, width, &name);
                }
                continue;
            }
            let Some(value) = values.get(index) else {
                continue;
            };
            self.field(&mut out, spec, value, width);
        }

        if self.show_uid {
            out.push_str(&format!("UID: {}\n", display_uid(&person.id)));
        }
        out.push('\n');
        out
    }

    pub fn group(&self, group: &Group, members: &[Person]) -> String {
        match self.form {
            DisplayForm::Raw => raw(&group.description),
            DisplayForm::Brief => format!("{}\n", group.name),
            DisplayForm::Plain => format!("{}\n\n", group.name),
            DisplayForm::Standard | DisplayForm::Long => {
                let count = group.members.len();
                let mut out = format!(
                    "{} ({} member{})\n",
                    group.name,
                    count,
                    if count == 1 { "" } else { "s" }
                );
                if self.form == DisplayForm::Long {
                    for member in members {
                        let values = FieldValues::fetch(self.catalog, member, NAME_FIELDS);
                        let name = format_name(&NameParts::from_values(self.catalog, &values), "");
                        out.push_str(&format!("    {name}\n"));
                    }
                }
                out.push('\n');
                out
            }
        }
    }

    fn brief(&self, values: &FieldValues) -> String {
        let mut out = format_name(&NameParts::from_values(self.catalog, values), " ");

        let phones = values
            .lookup(self.catalog, FieldKey::Phone)
            .and_then(FieldValue::as_strings);
        brief_matches(&mut out, phones, &BRIEF_PHONES);

        let emails = values
            .lookup(self.catalog, FieldKey::Email)
            .and_then(FieldValue::as_strings);
        brief_matches(&mut out, emails, &BRIEF_EMAILS);

        out.push('\n');
        out
    }

    /// Widest label among the fields that will actually be printed.
    fn label_width(&self, values: &FieldValues, cutoff: usize, has_name: bool) -> usize {
        if !self.form.shows_labels() {
            return 0;
        }

        let mut width = 0;
        if self.form.collapses_name() && has_name {
            width = UnicodeWidthStr::width(NAME_LABEL);
        }

        for (index, spec) in self.catalog.specs()[..cutoff].iter().enumerate() {
            if self.form.collapses_name() && self.catalog.is_name_field(index) {
                continue;
            }
            match values.get(index) {
                None => {}
                Some(FieldValue::Profiles(profiles)) => {
                    for entry in &profiles.entries {
                        width = width.max(UnicodeWidthStr::width(entry.value.service.as_str()));
                    }
                }
                Some(_) => width = width.max(spec.width),
            }
        }
        width
    }

    fn prefix(&self, label: &str, width: usize) -> String {
        if !self.form.shows_labels() {
            return String::new();
        }
        let pad = width.saturating_sub(UnicodeWidthStr::width(label));
        format!("{}{}: ", " ".repeat(pad), label)
    }

    fn blank_prefix(&self, width: usize) -> String {
        if !self.form.shows_labels() {
            return String::new();
        }
        " ".repeat(width + 2)
    }

    fn line(&self, out: &mut String, label: &str, width: usize, body: &str) {
        out.push_str(&self.prefix(label, width));
        out.push_str(body);
        out.push('\n');
    }

    fn continuation(&self, out: &mut String, width: usize, body: &str) {
        out.push_str(&self.blank_prefix(width));
        out.push_str(body);
        out.push('\n');
    }

    fn field(&self, out: &mut String, spec: &FieldSpec, value: &FieldValue, width: usize) {
        let abbreviated = self.form.abbreviates_labels();

        match (spec.kind, value) {
            (FieldKind::MultiLineString, FieldValue::Text(text)) => {
                for (n, segment) in split_lines(text).into_iter().enumerate() {
                    if n == 0 {
                        self.line(out, spec.label, width, segment);
                    } else {
                        self.continuation(out, width, segment);
                    }
                }
            }
            (_, FieldValue::Text(text)) => self.line(out, spec.label, width, text),
            (_, FieldValue::Date(date)) => self.line(out, spec.label, width, &long_date(date)),
            (_, FieldValue::Strings(multi)) => {
                self.labeled_entries(out, spec, width, multi, |value, raw_label| {
                    tagged(value, raw_label, abbreviated)
                })
            }
            (_, FieldValue::Addresses(multi)) => {
                self.labeled_entries(out, spec, width, multi, |address, raw_label| {
                    tagged(&address.one_line(), raw_label, abbreviated)
                })
            }
            (_, FieldValue::Profiles(multi)) => {
                for entry in &multi.entries {
                    self.line(out, &entry.value.service, width, &entry.value.username);
                }
            }
        }
    }

    /// Only the first entry carries the field label; the rest line up under
    /// it with a blank label.
    fn labeled_entries<V>(
        &self,
        out: &mut String,
        spec: &FieldSpec,
        width: usize,
        multi: &MultiValue<V>,
        body: impl Fn(&V, &str) -> String,
    ) {
        for (n, entry) in multi.entries.iter().enumerate() {
            let text = body(&entry.value, &entry.label);
            if n == 0 {
                self.line(out, spec.label, width, &text);
            } else {
                self.continuation(out, width, &text);
            }
        }
    }
}

fn brief_matches(out: &mut String, values: Option<&MultiValue<String>>, tags: &[&str]) {
    let Some(values) = values else {
        return;
    };
    for tag in tags {
        if let Some(value) = first_labeled(values, tag) {
            out.push_str(&format!("{} ({}) ", value, label::abbreviate(tag)));
        }
    }
}

fn raw(description: &str) -> String {
    let mut out = description.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}
