//! Resolved run options.
//!
//! The command line is turned into one `Options` value up front and passed
//! by reference to everything that needs it.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayForm {
    Plain,
    #[default]
    Standard,
    Brief,
    Long,
    Raw,
}

impl DisplayForm {
    /// Whether a label column is printed at all.
    pub fn shows_labels(&self) -> bool {
        !matches!(self, DisplayForm::Plain)
    }

    /// Whether per-value labels are cut to one character.
    pub fn abbreviates_labels(&self) -> bool {
        !matches!(self, DisplayForm::Long)
    }

    /// Whether the name fields collapse into a single `Name` line.
    pub fn collapses_name(&self) -> bool {
        matches!(self, DisplayForm::Standard | DisplayForm::Plain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    NamesOnly,
    Groups,
    #[default]
    All,
}

/// Which entry of a multi-valued field to prefer when launching an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preference {
    #[default]
    None,
    Home,
    Work,
}

/// External application to hand the first result to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchTarget {
    Editor,
    Browser,
    GoogleMaps,
    OpenStreetMap,
    Email,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    pub form: DisplayForm,
    pub scope: SearchScope,
    pub preference: Preference,
    pub show_uid: bool,
    /// Required UID substring, when one was given.
    pub uid_filter: Option<String>,
    pub launch: Option<LaunchTarget>,
    pub terms: Vec<String>,
}

impl Options {
    /// Listing every group needs no search terms.
    pub fn lists_all_groups(&self) -> bool {
        self.scope == SearchScope::Groups && self.terms.is_empty()
    }

    /// Search terms are required unless a UID filter or group listing
    /// stands in for them.
    pub fn has_search_input(&self) -> bool {
        !self.terms.is_empty() || self.uid_filter.is_some() || self.scope == SearchScope::Groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_command_line_defaults() {
        let options = Options::default();
        assert_eq!(options.form, DisplayForm::Standard);
        assert_eq!(options.scope, SearchScope::All);
        assert_eq!(options.preference, Preference::None);
        assert!(!options.has_search_input());
    }

    #[test]
    fn test_label_rules_per_form() {
        assert!(!DisplayForm::Plain.shows_labels());
        assert!(DisplayForm::Standard.shows_labels());
        assert!(DisplayForm::Standard.abbreviates_labels());
        assert!(!DisplayForm::Long.abbreviates_labels());
        assert!(DisplayForm::Plain.collapses_name());
        assert!(!DisplayForm::Long.collapses_name());
    }

    #[test]
    fn test_uid_filter_or_groups_replace_terms() {
        let uid = Options {
            uid_filter: Some("abc".into()),
            ..Options::default()
        };
        assert!(uid.has_search_input());

        let groups = Options {
            scope: SearchScope::Groups,
            ..Options::default()
        };
        assert!(groups.has_search_input());
        assert!(groups.lists_all_groups());
    }
}
