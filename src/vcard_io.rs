use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use time::{Date, Month};
use vcard4::parameter::{Parameters, TypeParameter};
use vcard4::property::TextOrUriProperty;
use vcard4::{parse, Vcard};

use crate::fields::FieldKey;
use crate::label;
use crate::model::{Address, FieldValue, Group, MultiValue, Person, Record, SocialProfile};
use crate::vdir;

const URN_UUID: &str = "urn:uuid:";

/// Parse a UTF-8 encoded vCard file into `Vcard` values.
pub fn parse_file(path: &Path) -> Result<Vec<Vcard>> {
    let input = fs::read_to_string(path)
        .with_context(|| format!("failed to read vCard file at {}", path.display()))?;
    parse_str(&input)
}

/// Parse a UTF-8 string into `Vcard` values.
pub fn parse_str(input: &str) -> Result<Vec<Vcard>> {
    let cards = parse(input)
        .map_err(|err| anyhow!(err))
        .context("parsing vCard data")?;
    if cards.is_empty() && !input.trim().is_empty() {
        return Err(anyhow!("no vCard found"));
    }
    Ok(cards)
}

/// Read every card in `path` and map it to a record of the book the file
/// lives in.
pub fn load_records(root: &Path, path: &Path) -> Result<Vec<Record>> {
    let cards = parse_file(path)?;
    let book = vdir::book_name(root, path);
    let multi = cards.len() > 1;
    Ok(cards
        .iter()
        .enumerate()
        .map(|(index, card)| {
            let fallback = fallback_uid(path, multi.then_some(index));
            card_to_record(card, path, &book, &fallback)
        })
        .collect())
}

fn fallback_uid(path: &Path, index: Option<usize>) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("card")
        .to_string();
    match index {
        Some(index) => format!("{stem}-{index}"),
        None => stem,
    }
}

/// Retrieve the UID value as a string if present.
pub fn card_uid(card: &Vcard) -> Option<String> {
    match &card.uid {
        Some(TextOrUriProperty::Text(text)) => Some(text.value.clone()),
        Some(TextOrUriProperty::Uri(uri)) => Some(uri.value.to_string()),
        None => None,
    }
}

fn strip_urn(value: &str) -> &str {
    value
        .get(..URN_UUID.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(URN_UUID))
        .map(|_| &value[URN_UUID.len()..])
        .unwrap_or(value)
}

pub fn record_id(uid: &str, book: &str) -> String {
    format!("{}:{}", strip_urn(uid.trim()), book)
}

pub fn is_group(card: &Vcard) -> bool {
    let kind = card.kind.as_ref().map(|kind| kind.value.to_string());
    let apple_kind = extension_values(card, "X-ADDRESSBOOKSERVER-KIND").next();
    kind.into_iter()
        .chain(apple_kind)
        .any(|value| value.trim().eq_ignore_ascii_case("group"))
}

pub fn card_to_record(card: &Vcard, path: &Path, book: &str, fallback_uid: &str) -> Record {
    let uid = card_uid(card)
        .filter(|uid| !uid.trim().is_empty())
        .unwrap_or_else(|| fallback_uid.to_string());
    let id = record_id(&uid, book);
    let description = card.to_string();

    if is_group(card) {
        return Record::Group(Group {
            id,
            path: path.to_path_buf(),
            name: formatted_name(card).unwrap_or_default(),
            members: group_members(card, book),
            description,
        });
    }

    let mut person = Person::new(id);
    person.path = path.to_path_buf();
    person.description = description;
    collect_names(card, &mut person);
    collect_work(card, &mut person);
    collect_dates(card, &mut person);
    collect_contact_points(card, &mut person);
    collect_social_profiles(card, &mut person);

    let notes: Vec<&str> = card.note.iter().map(|note| note.value.as_str()).collect();
    person.set(FieldKey::Note, FieldValue::Text(notes.join("\n")));

    Record::Person(person)
}

// ============================================================================
// Names and organization
// ============================================================================

fn formatted_name(card: &Vcard) -> Option<String> {
    card.formatted_name
        .iter()
        .map(|prop| prop.value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn text(value: Option<&String>) -> FieldValue {
    FieldValue::Text(value.map(|v| v.trim().to_string()).unwrap_or_default())
}

fn collect_names(card: &Vcard, person: &mut Person) {
    if let Some(name) = &card.name {
        person.set(FieldKey::LastName, text(name.value.first()));
        person.set(FieldKey::FirstName, text(name.value.get(1)));
        person.set(FieldKey::MiddleName, text(name.value.get(2)));
    }

    person.set(FieldKey::Nickname, text(card.nickname.first().map(|n| &n.value)));
    let maiden = extension_values(card, "X-MAIDENNAME").next();
    person.set(FieldKey::MaidenName, text(maiden.as_ref()));

    // cards with only FN get their name split from it, unless FN is just
    // the company name
    let unnamed = person.text(FieldKey::FirstName).is_none() && person.text(FieldKey::LastName).is_none();
    if unnamed {
        let org = card.org.first().and_then(|org| org.value.first()).map(|o| o.trim());
        if let Some(fn_value) = formatted_name(card).filter(|fn_value| Some(fn_value.as_str()) != org) {
            let (first, last) = split_formatted_name(&fn_value);
            person.set(FieldKey::FirstName, FieldValue::Text(first));
            person.set(FieldKey::LastName, FieldValue::Text(last));
        }
    }
}

fn split_formatted_name(value: &str) -> (String, String) {
    match value.rsplit_once(char::is_whitespace) {
        Some((first, last)) => (first.trim().to_string(), last.trim().to_string()),
        None => (String::new(), value.to_string()),
    }
}

fn collect_work(card: &Vcard, person: &mut Person) {
    if let Some(org) = card.org.first() {
        person.set(FieldKey::Organization, text(org.value.first()));
        let units: Vec<&str> = org
            .value
            .iter()
            .skip(1)
            .map(|unit| unit.trim())
            .filter(|unit| !unit.is_empty())
            .collect();
        person.set(FieldKey::Department, FieldValue::Text(units.join(", ")));
    }

    let title = card.title.first().or_else(|| card.role.first());
    person.set(FieldKey::JobTitle, text(title.map(|t| &t.value)));
}

// ============================================================================
// Dates
// ============================================================================

fn collect_dates(card: &Vcard, person: &mut Person) {
    let set_date = |person: &mut Person, key: FieldKey, raw: Option<String>| {
        if let Some(date) = raw.as_deref().and_then(parse_date) {
            person.set(key, FieldValue::Date(date));
        }
    };

    set_date(person, FieldKey::Birthday, card.bday.as_ref().map(|b| b.to_string()));
    let anniversary = card
        .anniversary
        .as_ref()
        .map(|a| a.to_string())
        .or_else(|| extension_values(card, "X-ANNIVERSARY").next());
    set_date(person, FieldKey::Anniversary, anniversary);
    set_date(person, FieldKey::Modified, card.rev.as_ref().map(|r| r.to_string()));
}

/// Accepts `YYYYMMDD`, `YYYY-MM-DD` and either followed by a time part.
/// Partial dates without a year yield nothing.
pub fn parse_date(raw: &str) -> Option<Date> {
    let date_part = raw.trim().split('T').next()?.rsplit(':').next()?;
    let digits: String = date_part.chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits[..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

// ============================================================================
// Labeled values
// ============================================================================

/// Accumulates labeled entries and remembers the one with the lowest PREF.
struct Collector<V> {
    values: MultiValue<V>,
    best_pref: Option<u8>,
}

impl<V> Collector<V> {
    fn new() -> Self {
        Self {
            values: MultiValue::new(),
            best_pref: None,
        }
    }

    fn push(&mut self, label: String, pref: Option<u8>, value: V) {
        if let Some(pref) = pref {
            if self.best_pref.map(|best| pref < best).unwrap_or(true) {
                self.best_pref = Some(pref);
                self.values.primary = Some(self.values.entries.len());
            }
        }
        self.values.push(label, value);
    }

    fn finish(self) -> MultiValue<V> {
        self.values
    }
}

fn type_name(param: &TypeParameter) -> String {
    match param {
        TypeParameter::Telephone(value) => value.to_string(),
        TypeParameter::Related(value) => value.to_string(),
        TypeParameter::Home => "home".to_string(),
        TypeParameter::Work => "work".to_string(),
        TypeParameter::Extension(value) => value.clone(),
    }
}

fn type_names(parameters: Option<&Parameters>) -> Vec<String> {
    parameters
        .and_then(|params| params.types.as_ref())
        .map(|types| types.iter().map(type_name).collect())
        .unwrap_or_default()
}

fn pref_rank(parameters: Option<&Parameters>) -> Option<u8> {
    let explicit = parameters.and_then(|params| params.pref);
    let typed = type_names(parameters)
        .iter()
        .any(|name| name.eq_ignore_ascii_case("pref"))
        .then_some(1);
    explicit.or(typed)
}

fn parameter_extension(parameters: Option<&Parameters>, name: &str) -> Option<String> {
    parameters
        .and_then(|params| params.extensions.as_ref())
        .and_then(|extensions| {
            extensions
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, values)| values.first().cloned())
        })
}

fn extension_values<'a>(card: &'a Vcard, name: &'a str) -> impl Iterator<Item = String> + 'a {
    card.extensions
        .iter()
        .filter(move |ext| ext.name.eq_ignore_ascii_case(name))
        .map(|ext| ext.value.to_string())
}

fn grouped_extension(card: &Vcard, group: Option<&String>, name: &str) -> Option<String> {
    let group = group?;
    card.extensions
        .iter()
        .filter(|ext| ext.name.eq_ignore_ascii_case(name))
        .find(|ext| {
            ext.group
                .as_ref()
                .map(|g| g.eq_ignore_ascii_case(group))
                .unwrap_or(false)
        })
        .map(|ext| ext.value.to_string())
        .filter(|value| !value.trim().is_empty())
}

/// Raw label for a property: an `X-ABLabel` in the same property group wins,
/// otherwise the first meaningful TYPE mapped onto the vendor tags.
fn entry_label(card: &Vcard, group: Option<&String>, parameters: Option<&Parameters>) -> String {
    if let Some(custom) = grouped_extension(card, group, "X-ABLABEL") {
        return custom.trim().to_string();
    }

    let mapped: Vec<&'static str> = type_names(parameters)
        .iter()
        .filter(|name| !name.eq_ignore_ascii_case("pref"))
        .map(|name| label::from_vcard_type(name))
        .collect();
    mapped
        .iter()
        .find(|tag| **tag != label::OTHER && **tag != label::MAIN)
        .or_else(|| mapped.iter().find(|tag| **tag == label::MAIN))
        .copied()
        .unwrap_or(label::OTHER)
        .to_string()
}

fn text_or_uri(prop: &TextOrUriProperty) -> (Option<&String>, String, Option<&Parameters>) {
    match prop {
        TextOrUriProperty::Text(text) => (text.group.as_ref(), text.value.clone(), text.parameters.as_ref()),
        TextOrUriProperty::Uri(uri) => (uri.group.as_ref(), uri.value.to_string(), uri.parameters.as_ref()),
    }
}

fn strip_scheme<'a>(value: &'a str, scheme: &str) -> &'a str {
    value
        .get(..scheme.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
        .map(|_| value[scheme.len()..].trim())
        .unwrap_or(value)
}

fn collect_contact_points(card: &Vcard, person: &mut Person) {
    let mut phones = Collector::new();
    for prop in &card.tel {
        let (group, value, params) = text_or_uri(prop);
        let value = strip_scheme(value.trim(), "tel:").to_string();
        if !value.is_empty() {
            phones.push(entry_label(card, group, params), pref_rank(params), value);
        }
    }
    person.set(FieldKey::Phone, FieldValue::Strings(phones.finish()));

    let mut emails = Collector::new();
    for prop in &card.email {
        let params = prop.parameters.as_ref();
        let value = strip_scheme(prop.value.trim(), "mailto:").to_string();
        if !value.is_empty() {
            emails.push(entry_label(card, prop.group.as_ref(), params), pref_rank(params), value);
        }
    }
    person.set(FieldKey::Email, FieldValue::Strings(emails.finish()));

    let mut urls = Collector::new();
    for prop in &card.url {
        let params = prop.parameters.as_ref();
        urls.push(
            entry_label(card, prop.group.as_ref(), params),
            pref_rank(params),
            prop.value.to_string(),
        );
    }
    person.set(FieldKey::Url, FieldValue::Strings(urls.finish()));

    let mut ims = Collector::new();
    for prop in &card.impp {
        let params = prop.parameters.as_ref();
        ims.push(
            entry_label(card, prop.group.as_ref(), params),
            pref_rank(params),
            prop.value.to_string(),
        );
    }
    person.set(FieldKey::InstantMessage, FieldValue::Strings(ims.finish()));

    let mut related = Collector::new();
    for prop in &card.related {
        let (group, value, params) = text_or_uri(prop);
        let value = strip_urn(value.trim()).to_string();
        if !value.is_empty() {
            related.push(entry_label(card, group, params), pref_rank(params), value);
        }
    }
    person.set(FieldKey::Related, FieldValue::Strings(related.finish()));

    let mut addresses = Collector::new();
    for prop in &card.address {
        let params = prop.parameters.as_ref();
        let mut address = address_from_components(&split_components(&prop.value.to_string()));
        address.country_code = grouped_extension(card, prop.group.as_ref(), "X-ABADR");
        if !address.is_empty() {
            addresses.push(entry_label(card, prop.group.as_ref(), params), pref_rank(params), address);
        }
    }
    person.set(FieldKey::Address, FieldValue::Addresses(addresses.finish()));
}

/// Split a structured value on unescaped `;`, undoing text escapes.
fn split_components(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') | Some('N') => current.push('\n'),
                Some(other) => current.push(other),
                None => {}
            },
            ';' => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    parts
}

// pobox;extended;street;locality;region;code;country
fn address_from_components(parts: &[String]) -> Address {
    let part = |index: usize| {
        parts
            .get(index)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
    };

    let street_lines: Vec<String> = [part(2).or_else(|| part(0)), part(1)]
        .into_iter()
        .flatten()
        .collect();

    Address {
        street: (!street_lines.is_empty()).then(|| street_lines.join("\n")),
        city: part(3),
        state: part(4),
        postal_code: part(5),
        country: part(6),
        country_code: None,
    }
}

// ============================================================================
// Social profiles
// ============================================================================

fn collect_social_profiles(card: &Vcard, person: &mut Person) {
    let mut profiles = Collector::new();
    for ext in card
        .extensions
        .iter()
        .filter(|ext| ext.name.eq_ignore_ascii_case("X-SOCIALPROFILE"))
    {
        let params = ext.parameters.as_ref();
        let value = ext.value.to_string();
        let service = type_names(params)
            .into_iter()
            .find(|name| !name.eq_ignore_ascii_case("pref"))
            .unwrap_or_else(|| service_from_url(&value));
        let username = parameter_extension(params, "X-USER")
            .filter(|user| !user.trim().is_empty())
            .unwrap_or_else(|| username_from_url(&value));
        if username.is_empty() {
            continue;
        }
        profiles.push(service.clone(), pref_rank(params), SocialProfile { service, username });
    }
    person.set(FieldKey::SocialProfile, FieldValue::Profiles(profiles.finish()));
}

fn username_from_url(value: &str) -> String {
    value
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_start_matches('@')
        .to_string()
}

fn service_from_url(value: &str) -> String {
    url::Url::parse(value.trim())
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| {
            let host = host.trim_start_matches("www.");
            host.split('.').next().unwrap_or(host).to_string()
        })
        .unwrap_or_else(|| "social".to_string())
}

// ============================================================================
// Groups
// ============================================================================

fn group_members(card: &Vcard, book: &str) -> Vec<String> {
    let members = card.member.iter().map(|member| member.value.to_string());
    let apple = extension_values(card, "X-ADDRESSBOOKSERVER-MEMBER");
    members
        .chain(apple)
        .map(|uid| uid.trim().to_string())
        .filter(|uid| !uid.is_empty())
        .map(|uid| record_id(&uid, book))
        .collect()
}
