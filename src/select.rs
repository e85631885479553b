//! Choosing one value out of a multi-valued field.

use crate::fields::FieldKey;
use crate::label;
use crate::model::MultiValue;
use crate::options::Preference;

/// First value whose raw label is exactly `tag`.
pub fn first_labeled<'a, V>(values: &'a MultiValue<V>, tag: &str) -> Option<&'a V> {
    values
        .entries
        .iter()
        .find(|entry| entry.label == tag)
        .map(|entry| &entry.value)
}

/// Pick the value to launch an app with.
///
/// Falls back `None -> Home -> Work`: no preference tries the store's primary
/// entry first, home tries the home label (and, for URLs, the home page
/// label), work tries the work label. Each step only runs when the previous
/// one found nothing.
pub fn select_preferred<V>(key: FieldKey, values: &MultiValue<V>, preference: Preference) -> Option<&V> {
    let work = || first_labeled(values, label::WORK);
    let home = || {
        first_labeled(values, label::HOME).or_else(|| {
            if key == FieldKey::Url {
                first_labeled(values, label::HOME_PAGE)
            } else {
                None
            }
        })
    };

    match preference {
        Preference::None => values.primary_value().or_else(home).or_else(work),
        Preference::Home => home().or_else(work),
        Preference::Work => work(),
    }
}
