//! Label normalization.
//!
//! Address books exported from Apple Contacts wrap their built-in labels in a
//! vendor decoration (`_$!<Home>!$_`), while user-defined labels are stored
//! verbatim. Everything that prints a label goes through [`clean`] first.

pub const HOME: &str = "_$!<Home>!$_";
pub const WORK: &str = "_$!<Work>!$_";
pub const MOBILE: &str = "_$!<Mobile>!$_";
pub const MAIN: &str = "_$!<Main>!$_";
pub const HOME_FAX: &str = "_$!<HomeFAX>!$_";
pub const PAGER: &str = "_$!<Pager>!$_";
pub const OTHER: &str = "_$!<Other>!$_";
pub const HOME_PAGE: &str = "_$!<HomePage>!$_";

/// Strip the vendor wrapper from a raw label.
///
/// Returns the text strictly between the first `<` and the last `>` when both
/// are present in that order, otherwise the label unchanged.
pub fn clean(raw: &str) -> String {
    match (raw.find('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if close > open => raw[open + 1..close].to_string(),
        _ => raw.to_string(),
    }
}

/// The cleaned label cut down to its first character (`Work` -> `W`).
pub fn abbreviate(raw: &str) -> String {
    clean(raw).chars().take(1).collect()
}

/// Clean and optionally abbreviate, as the formatters need it.
pub fn display(raw: &str, abbreviated: bool) -> String {
    if abbreviated {
        abbreviate(raw)
    } else {
        clean(raw)
    }
}

/// Map a vCard `TYPE` parameter value onto the vendor tag used for built-in
/// labels.
pub fn from_vcard_type(kind: &str) -> &'static str {
    match kind.trim().to_ascii_lowercase().as_str() {
        "home" => HOME,
        "work" => WORK,
        "cell" | "mobile" | "iphone" => MOBILE,
        "voice" | "main" | "pref" => MAIN,
        "fax" => HOME_FAX,
        "pager" => PAGER,
        "homepage" | "home-page" => HOME_PAGE,
        _ => OTHER,
    }
}
