//! Handing a contact to an outside application.
//!
//! The dispatcher picks the value to use and builds a locator for it; an
//! [`Opener`] does the actual launching.

use std::io;
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::config::{CommandExec, Commands};
use crate::fields::FieldKey;
use crate::format::{format_name, NameParts};
use crate::model::{Address, FieldValue, Person};
use crate::options::{LaunchTarget, Preference};
use crate::select::select_preferred;

const GOOGLE_MAPS: &str = "https://maps.google.com/maps?q=";
const OPEN_STREET_MAP: &str = "https://www.openstreetmap.org/search?query=";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no {what} for {name}")]
    NoValue { what: &'static str, name: String },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to open {locator}: {source}")]
    Open {
        locator: String,
        #[source]
        source: io::Error,
    },
}

pub trait Opener {
    /// Open a URL (or any locator the platform understands).
    fn open(&self, locator: &str) -> Result<(), LaunchError>;

    /// Open a card file for editing.
    fn edit(&self, path: &Path) -> Result<(), LaunchError> {
        self.open(&path.to_string_lossy())
    }
}

/// Launches through the desktop's default handlers unless the config names
/// explicit commands.
pub struct SystemOpener {
    commands: Commands,
}

impl SystemOpener {
    pub fn new(commands: Commands) -> Self {
        Self { commands }
    }
}

fn command(exec: &CommandExec, arg: &str) -> Command {
    let mut cmd = Command::new(&exec.program);
    cmd.args(&exec.args).arg(arg);
    cmd
}

impl Opener for SystemOpener {
    fn open(&self, locator: &str) -> Result<(), LaunchError> {
        log::info!("opening {locator}");
        match &self.commands.open {
            Some(exec) => command(exec, locator)
                .spawn()
                .map(|_| ())
                .map_err(|source| LaunchError::Spawn {
                    program: exec.program.clone(),
                    source,
                }),
            None => open::that_detached(locator).map_err(|source| LaunchError::Open {
                locator: locator.to_string(),
                source,
            }),
        }
    }

    fn edit(&self, path: &Path) -> Result<(), LaunchError> {
        let Some(exec) = &self.commands.editor else {
            return self.open(&path.to_string_lossy());
        };
        log::info!("editing {}", path.display());
        // editors usually need the terminal, so wait for them
        command(exec, &path.to_string_lossy())
            .status()
            .map(|_| ())
            .map_err(|source| LaunchError::Spawn {
                program: exec.program.clone(),
                source,
            })
    }
}

fn encode(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes()).collect()
}

pub fn mail_locator(address: &str) -> String {
    format!("mailto:{}", address.trim())
}

pub fn map_locator(base: &str, address: &Address) -> String {
    format!("{base}{}", encode(&address.search_text()))
}

fn no_value(what: &'static str, person: &Person) -> LaunchError {
    let name = format_name(&NameParts::from_person(person), "");
    let name = if name.is_empty() { person.id.clone() } else { name };
    LaunchError::NoValue { what, name }
}

fn preferred_string<'a>(person: &'a Person, key: FieldKey, preference: Preference) -> Option<&'a str> {
    person
        .value(key)
        .and_then(FieldValue::as_strings)
        .and_then(|values| select_preferred(key, values, preference))
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn preferred_address(person: &Person, preference: Preference) -> Option<&Address> {
    person
        .value(FieldKey::Address)
        .and_then(FieldValue::as_addresses)
        .and_then(|values| select_preferred(FieldKey::Address, values, preference))
        .filter(|address| !address.is_empty())
}

/// Resolve the locator for `target`. The editor target has none; it works
/// on the card file.
pub fn locator(target: LaunchTarget, person: &Person, preference: Preference) -> Result<Option<String>, LaunchError> {
    let locator = match target {
        LaunchTarget::Editor => return Ok(None),
        LaunchTarget::Browser => preferred_string(person, FieldKey::Url, preference)
            .map(|url| url.trim().to_string())
            .ok_or_else(|| no_value("URL", person))?,
        LaunchTarget::GoogleMaps => preferred_address(person, preference)
            .map(|address| map_locator(GOOGLE_MAPS, address))
            .ok_or_else(|| no_value("address", person))?,
        LaunchTarget::OpenStreetMap => preferred_address(person, preference)
            .map(|address| map_locator(OPEN_STREET_MAP, address))
            .ok_or_else(|| no_value("address", person))?,
        LaunchTarget::Email => preferred_string(person, FieldKey::Email, preference)
            .map(mail_locator)
            .ok_or_else(|| no_value("email address", person))?,
    };
    Ok(Some(locator))
}

pub fn dispatch(
    target: LaunchTarget,
    person: &Person,
    preference: Preference,
    opener: &dyn Opener,
) -> Result<(), LaunchError> {
    match locator(target, person, preference)? {
        Some(locator) => opener.open(&locator),
        None => opener.edit(&person.path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{HOME, WORK};
    use crate::model::MultiValue;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Default)]
    struct Recorder {
        opened: RefCell<Vec<String>>,
    }

    impl Opener for Recorder {
        fn open(&self, locator: &str) -> Result<(), LaunchError> {
            self.opened.borrow_mut().push(locator.to_string());
            Ok(())
        }
    }

    fn jane() -> Person {
        let emails: MultiValue<String> = vec![
            (WORK.to_string(), "j@x.com".to_string()),
            (HOME.to_string(), "jane@y.com".to_string()),
        ]
        .into_iter()
        .collect();
        let mut addresses = MultiValue::new();
        addresses.push(
            HOME,
            Address {
                street: Some("1 Main St".into()),
                city: Some("Springfield".into()),
                state: Some("IL".into()),
                postal_code: Some("62701".into()),
                country: Some("USA".into()),
                country_code: None,
            },
        );
        let mut person = Person::new("jane:default")
            .with(FieldKey::FirstName, FieldValue::Text("Jane".into()))
            .with(FieldKey::LastName, FieldValue::Text("Doe".into()))
            .with(FieldKey::Email, FieldValue::Strings(emails))
            .with(FieldKey::Address, FieldValue::Addresses(addresses));
        person.path = PathBuf::from("/vdir/jane.vcf");
        person
    }

    fn opened(target: LaunchTarget, person: &Person, preference: Preference) -> Vec<String> {
        let recorder = Recorder::default();
        dispatch(target, person, preference, &recorder).unwrap();
        recorder.opened.into_inner()
    }

    #[test]
    fn test_email_uses_preferred_address() {
        let jane = jane();
        assert_eq!(opened(LaunchTarget::Email, &jane, Preference::Work), vec!["mailto:j@x.com"]);
        assert_eq!(opened(LaunchTarget::Email, &jane, Preference::Home), vec!["mailto:jane@y.com"]);
        assert_eq!(opened(LaunchTarget::Email, &jane, Preference::None), vec!["mailto:jane@y.com"]);
    }

    #[test]
    fn test_map_locators_encode_address() {
        let jane = jane();
        assert_eq!(
            opened(LaunchTarget::GoogleMaps, &jane, Preference::None),
            vec!["https://maps.google.com/maps?q=1+Main+St%2C+Springfield+IL+62701%2C+USA"]
        );
        assert_eq!(
            opened(LaunchTarget::OpenStreetMap, &jane, Preference::Home),
            vec!["https://www.openstreetmap.org/search?query=1+Main+St%2C+Springfield+IL+62701%2C+USA"]
        );
    }

    #[test]
    fn test_missing_value_is_reported() {
        let jane = jane();
        let recorder = Recorder::default();
        let err = dispatch(LaunchTarget::Browser, &jane, Preference::None, &recorder).unwrap_err();
        assert!(matches!(err, LaunchError::NoValue { what: "URL", .. }));
        assert_eq!(err.to_string(), "no URL for Jane Doe");
        assert!(recorder.opened.borrow().is_empty());

        let err = dispatch(LaunchTarget::GoogleMaps, &jane, Preference::Work, &recorder).unwrap_err();
        assert!(matches!(err, LaunchError::NoValue { what: "address", .. }));
    }

    #[test]
    fn test_editor_falls_back_to_opening_the_card() {
        let jane = jane();
        assert_eq!(opened(LaunchTarget::Editor, &jane, Preference::None), vec!["/vdir/jane.vcf"]);
    }

    #[test]
    fn test_browser_opens_url_verbatim() {
        let mut urls = MultiValue::new();
        urls.push(crate::label::HOME_PAGE, "https://jane.example/~me?a=b".to_string());
        let person = jane().with(FieldKey::Url, FieldValue::Strings(urls));
        assert_eq!(
            opened(LaunchTarget::Browser, &person, Preference::Home),
            vec!["https://jane.example/~me?a=b"]
        );
    }
}
