mod config;
mod db;
mod fields;
mod format;
mod indexer;
mod label;
mod launch;
mod model;
mod options;
mod order;
mod query;
mod search;
mod select;
mod translit;
mod vcard_io;
mod vdir;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};

use db::{ContactStore, Database};
use fields::Catalog;
use format::{summary_line, Formatter};
use launch::{Opener, SystemOpener};
use model::Record;
use options::{DisplayForm, LaunchTarget, Options, Preference, SearchScope};

#[derive(Parser, Debug)]
#[command(
    name = "rolo",
    version,
    about = "Look up contacts in a vCard directory",
    args_override_self = true
)]
struct Cli {
    /// Standard display (default)
    #[arg(short = 'S', long, overrides_with_all = ["brief", "long", "raw", "plain"])]
    standard: bool,

    /// One line per contact: name, phones and emails
    #[arg(short, long, overrides_with_all = ["standard", "long", "raw", "plain"])]
    brief: bool,

    /// Every field, with full labels
    #[arg(short, long, overrides_with_all = ["standard", "brief", "raw", "plain"])]
    long: bool,

    /// The stored vCard text
    #[arg(short, long, overrides_with_all = ["standard", "brief", "long", "plain"])]
    raw: bool,

    /// Standard display without labels
    #[arg(short, long, overrides_with_all = ["standard", "brief", "long", "raw"])]
    plain: bool,

    /// Search names only
    #[arg(short, long, overrides_with_all = ["all", "groups"])]
    names: bool,

    /// Search every field (default)
    #[arg(short, long, overrides_with_all = ["names", "groups"])]
    all: bool,

    /// Search groups; lists every group when no terms are given
    #[arg(short, long, overrides_with_all = ["names", "all"])]
    groups: bool,

    /// Show UIDs; with a value, only show contacts whose UID contains it
    #[arg(
        short,
        long,
        value_name = "UID",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    uid: Option<String>,

    /// Open the first match's card in the editor
    #[arg(short, long)]
    edit: bool,

    /// Open the first match's URL in a browser
    #[arg(short = 'B', long)]
    browse: bool,

    /// Show the first match's address on Google Maps
    #[arg(short, long)]
    map: bool,

    /// Show the first match's address on OpenStreetMap
    #[arg(short = 'M', long)]
    osm: bool,

    /// Write an email to the first match
    #[arg(short = 'E', long)]
    email: bool,

    /// Prefer home values when launching
    #[arg(short = 'H', long, overrides_with = "work")]
    home: bool,

    /// Prefer work values when launching
    #[arg(short = 'W', long, overrides_with = "home")]
    work: bool,

    /// Configuration file (default: <config dir>/rolo/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// vCard directory, overriding the configuration
    #[arg(long, value_name = "DIR")]
    vdir: Option<PathBuf>,

    /// Rebuild the search index from scratch
    #[arg(long)]
    reindex: bool,

    /// Log what is going on to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Search terms; every term has to match
    #[arg(value_name = "TERM")]
    terms: Vec<String>,
}

impl Cli {
    fn options(&self) -> Options {
        // the override rules leave at most one form flag set
        let form = if self.standard {
            DisplayForm::Standard
        } else if self.brief {
            DisplayForm::Brief
        } else if self.long {
            DisplayForm::Long
        } else if self.raw {
            DisplayForm::Raw
        } else if self.plain {
            DisplayForm::Plain
        } else {
            DisplayForm::Standard
        };

        let scope = if self.all {
            SearchScope::All
        } else if self.names {
            SearchScope::NamesOnly
        } else if self.groups {
            SearchScope::Groups
        } else {
            SearchScope::All
        };

        let preference = if self.home {
            Preference::Home
        } else if self.work {
            Preference::Work
        } else {
            Preference::None
        };

        // several launch flags: the first in this order wins
        let launch = [
            (self.edit, LaunchTarget::Editor),
            (self.browse, LaunchTarget::Browser),
            (self.map, LaunchTarget::GoogleMaps),
            (self.osm, LaunchTarget::OpenStreetMap),
            (self.email, LaunchTarget::Email),
        ]
        .into_iter()
        .find_map(|(set, target)| set.then_some(target));

        Options {
            form,
            scope,
            preference,
            show_uid: self.uid.is_some(),
            uid_filter: self.uid.clone(),
            launch,
            terms: self.terms.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp(None);
    let _ = builder.try_init();
}

fn main() {
    // usage problems and store failures are reported, never turned into a
    // failing exit status
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
    }
}

fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // help and version go to stdout, usage errors to stderr
            let _ = err.print();
            return Ok(());
        }
    };
    init_logging(cli.verbose);

    let options = cli.options();
    if !options.has_search_input() {
        eprintln!("{}", Cli::command().render_usage());
        return Ok(());
    }

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(vdir) = &cli.vdir {
        config.vdir = vdir.clone();
    }
    if let Some(path) = &config.config_path {
        log::debug!("loaded configuration from {}", path.display());
    }
    if !config.vdir.is_dir() {
        bail!("vCard directory does not exist: {}", config.vdir.display());
    }

    let mut db = Database::open(&config.index_path)?;
    if cli.reindex {
        db.reset_schema()?;
    }
    indexer::reindex(&mut db, &config.vdir, cli.reindex)?;

    let catalog = Catalog::new();
    let opener = SystemOpener::new(config.commands.clone());
    let stdout = io::stdout();
    let mut out = stdout.lock();
    report(&db, &catalog, &options, &opener, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Search, sort and print; hand the first person to the launcher when one
/// was asked for. Returns the number of matches.
fn report<W: Write>(
    store: &dyn ContactStore,
    catalog: &Catalog,
    options: &Options,
    opener: &dyn Opener,
    out: &mut W,
) -> Result<usize> {
    if options.lists_all_groups() {
        log::debug!("no terms given, listing every group");
    }
    let query = query::build_query(catalog, options);
    let mut records = store.search(&query)?;
    order::sort_records(&mut records);

    let formatter = Formatter::new(catalog, options);
    for record in &records {
        match record {
            Record::Person(person) => {
                write!(out, "{}", formatter.person(person))?;
                if let Some(target) = options.launch {
                    if let Err(err) = launch::dispatch(target, person, options.preference, opener) {
                        log::warn!("{err}");
                    }
                    break;
                }
            }
            Record::Group(group) => {
                let mut members = if options.form == DisplayForm::Long {
                    store.members(group)?
                } else {
                    Vec::new()
                };
                order::sort_people(&mut members);
                write!(out, "{}", formatter.group(group, &members))?;
            }
        }
    }

    if let Some(summary) = summary_line(records.len()) {
        writeln!(out, "{summary}")?;
    }
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKey;
    use crate::launch::LaunchError;
    use crate::model::{FieldValue, Group, MultiValue, Person};
    use crate::query::Query;
    use std::cell::RefCell;

    struct FakeStore {
        records: Vec<Record>,
        people: Vec<Person>,
        searches: RefCell<Vec<Query>>,
    }

    impl ContactStore for FakeStore {
        fn search(&self, query: &Query) -> Result<Vec<Record>> {
            self.searches.borrow_mut().push(query.clone());
            Ok(self.records.clone())
        }

        fn members(&self, group: &Group) -> Result<Vec<Person>> {
            Ok(self
                .people
                .iter()
                .filter(|p| group.members.contains(&p.id))
                .cloned()
                .collect())
        }
    }

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

    fn person(id: &str, first: &str, last: &str, emails: &[(&str, &str)]) -> Person {
        let emails: MultiValue<String> = emails
            .iter()
            .map(|(label, value)| (label.to_string(), value.to_string()))
            .collect();
        Person::new(id)
            .with(FieldKey::FirstName, FieldValue::Text(first.into()))
            .with(FieldKey::LastName, FieldValue::Text(last.into()))
            .with(FieldKey::Email, FieldValue::Strings(emails))
    }

    fn store(records: Vec<Record>) -> FakeStore {
        let people = records
            .iter()
            .filter_map(|r| match r {
                Record::Person(p) => Some(p.clone()),
                Record::Group(_) => None,
            })
            .collect();
        FakeStore {
            records,
            people,
            searches: RefCell::new(Vec::new()),
        }
    }

    fn run_report(store: &FakeStore, options: &Options, opener: &Recorder) -> String {
        let mut out = Vec::new();
        report(store, &Catalog::new(), options, opener, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn parse(args: &[&str]) -> Options {
        let mut argv = vec!["rolo"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().options()
    }

    #[test]
    fn test_cli_last_display_form_wins() {
        assert_eq!(parse(&["x"]).form, DisplayForm::Standard);
        assert_eq!(parse(&["-b", "-l", "x"]).form, DisplayForm::Long);
        assert_eq!(parse(&["-l", "-b", "x"]).form, DisplayForm::Brief);
        assert_eq!(parse(&["-p", "-S", "x"]).form, DisplayForm::Standard);
        assert_eq!(parse(&["-r", "-r", "x"]).form, DisplayForm::Raw);
    }

    #[test]
    fn test_cli_last_scope_and_preference_win() {
        assert_eq!(parse(&["-n", "-a", "x"]).scope, SearchScope::All);
        assert_eq!(parse(&["-g", "-n", "x"]).scope, SearchScope::NamesOnly);
        assert_eq!(parse(&["-g"]).scope, SearchScope::Groups);
        assert_eq!(parse(&["-H", "-W", "x"]).preference, Preference::Work);
        assert_eq!(parse(&["-W", "-H", "x"]).preference, Preference::Home);
        assert_eq!(parse(&["x"]).preference, Preference::None);
    }

    #[test]
    fn test_cli_launch_priority() {
        assert_eq!(parse(&["-E", "-e", "x"]).launch, Some(LaunchTarget::Editor));
        assert_eq!(parse(&["-E", "-M", "-B", "x"]).launch, Some(LaunchTarget::Browser));
        assert_eq!(parse(&["-E", "-M", "-m", "x"]).launch, Some(LaunchTarget::GoogleMaps));
        assert_eq!(parse(&["-E", "-M", "x"]).launch, Some(LaunchTarget::OpenStreetMap));
        assert_eq!(parse(&["-E", "x"]).launch, Some(LaunchTarget::Email));
        assert_eq!(parse(&["x"]).launch, None);
    }

    #[test]
    fn test_cli_uid_with_and_without_value() {
        let bare = parse(&["--uid", "x"]);
        assert!(bare.show_uid);
        assert_eq!(bare.terms, vec!["x"]);

        let filtered = parse(&["--uid=ABC"]);
        assert!(filtered.show_uid);
        assert_eq!(filtered.uid_filter.as_deref(), Some("ABC"));
        assert!(filtered.has_search_input());

        assert!(!parse(&[]).has_search_input());
    }

    #[test]
    fn test_report_sorts_and_summarizes() {
        let store = store(vec![
            Record::Person(person("b:default", "Bob", "Smith", &[])),
            Record::Person(person("a:default", "Ann", "Adams", &[])),
        ]);
        let options = Options {
            terms: vec!["x".into()],
            ..Options::default()
        };
        let output = run_report(&store, &options, &Recorder::default());
        assert_eq!(output, "Name: Ann Adams\n\nName: Bob Smith\n\n2 matches\n");
    }

    #[test]
    fn test_report_single_match_has_no_summary() {
        let store = store(vec![Record::Person(person("a:default", "Ann", "Adams", &[]))]);
        let options = Options {
            terms: vec!["ann".into()],
            ..Options::default()
        };
        let output = run_report(&store, &options, &Recorder::default());
        assert!(!output.contains("match"));
    }

    #[test]
    fn test_report_zero_matches() {
        let store = store(vec![]);
        let options = Options {
            terms: vec!["nobody".into()],
            ..Options::default()
        };
        assert_eq!(run_report(&store, &options, &Recorder::default()), "0 matches\n");
    }

    #[test]
    fn test_report_dispatches_first_result_only() {
        let store = store(vec![
            Record::Person(person("b:default", "Bob", "Smith", &[(label::WORK, "bob@work")])),
            Record::Person(person("a:default", "Ann", "Adams", &[(label::WORK, "ann@work")])),
        ]);
        let options = Options {
            terms: vec!["x".into()],
            launch: Some(LaunchTarget::Email),
            preference: Preference::Work,
            ..Options::default()
        };
        let recorder = Recorder::default();
        let output = run_report(&store, &options, &recorder);
        assert_eq!(recorder.opened.into_inner(), vec!["mailto:ann@work"]);
        assert!(output.contains("Ann Adams"));
        assert!(!output.contains("Bob Smith"));
    }

    #[test]
    fn test_report_long_groups_list_members() {
        let ann = person("a:default", "Ann", "Adams", &[]);
        let group = Group {
            id: "g:default".into(),
            path: PathBuf::new(),
            name: "Friends".into(),
            members: vec!["a:default".into()],
            description: String::new(),
        };
        let mut store = store(vec![Record::Group(group)]);
        store.people.push(ann);
        let options = Options {
            scope: SearchScope::Groups,
            form: DisplayForm::Long,
            ..Options::default()
        };
        let output = run_report(&store, &options, &Recorder::default());
        assert!(output.starts_with("Friends (1 member)\n"));
        assert!(output.contains("    Ann Adams\n"));

        let searches = store.searches.borrow();
        assert_eq!(searches[0].kind, crate::model::RecordKind::Group);
    }
}
