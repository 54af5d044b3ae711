use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap());
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").unwrap());

/// True if nothing but whitespace is left.
pub fn is_blank(value: &str) -> bool {
    value.chars().all(char::is_whitespace)
}

/// Very basic URL-shape check used for every distribution link.
pub fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with("www.")
}

/// Keeps at most the first 10 characters so dates end up as `YYYY-MM-DD`.
pub fn truncate_date(value: &str) -> String {
    value.trim().chars().take(10).collect()
}

pub fn is_iso_date(value: &str) -> bool {
    DATE_RE.is_match(value.trim())
}

/// Removes markup, line breaks and (optionally) quotes which would otherwise
/// break the unescaped CSV output.
pub fn clean_string(value: &str, remove_quotes: bool) -> String {
    let decoded = decode_html_entities(value);
    let stripped = TAG_RE.replace_all(&decoded, "");
    let mut cleaned = stripped.replace(['\r', '\n'], " ");
    if remove_quotes {
        cleaned = cleaned.replace(['"', '\''], " ");
    }
    WHITESPACE_RE.replace_all(&cleaned, " ").trim().to_string()
}

fn decode_html_entities(value: &str) -> String {
    let named = value
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'");
    let numeric = NUMERIC_ENTITY_RE.replace_all(&named, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    // last, so "&amp;lt;" stays "&lt;"
    numeric.replace("&amp;", "&")
}

const LICENSE_ALIASES: &[(&str, &str)] = &[
    ("https://www.apache.org/licenses/LICENSE-2.0", "Apache License 2.0"),
    ("http://purl.org/NET/rdflicense/cc-by3.0", "CC-BY 3.0"),
    ("http://purl.org/NET/rdflicense/cc-by4.0", "CC-BY 4.0"),
    ("http://creativecommons.org/publicdomain/zero/1.0/", "CC0 1.0 DEED"),
    ("https://creativecommons.org/publicdomain/zero/1.0/", "CC0 1.0 DEED"),
    ("https://creativecommons.org/licenses/by/1.0", "CC-BY 1.0"),
    ("https://creativecommons.org/licenses/by/1.0/", "CC-BY 1.0"),
    ("http://creativecommons.org/licenses/by/2.0", "CC-BY 2.0"),
    ("http://creativecommons.org/licenses/by/2.0/", "CC-BY 2.0"),
    ("http://creativecommons.org/licenses/by/3.0", "CC-BY 3.0"),
    ("http://creativecommons.org/licenses/by/3.0/", "CC-BY 3.0"),
    ("https://creativecommons.org/licenses/by/3.0/", "CC-BY 3.0"),
    ("https://creativecommons.org/licenses/by/4.0", "CC-BY 4.0"),
    ("https://creativecommons.org/licenses/by/4.0/", "CC-BY 4.0"),
    ("http://creativecommons.org/licenses/by/4.0/", "CC-BY 4.0"),
    ("http://creativecommons.org/licenses/by/4.0", "CC-BY 4.0"),
    ("https://creativecommons.org/licenses/by/4.0/legalcode", "CC-BY 4.0"),
    ("Creative Commons Attribution 4.0 International", "CC-BY 4.0"),
    ("Creative Commons Attribution 4.0 International (CC BY 4.0)", "CC-BY 4.0"),
    ("https://creativecommons.org/licenses/by-nc/3.0/legalcode", "CC-BY-NC 3.0"),
    ("https://creativecommons.org/licenses/by-nc/4.0/", "CC-BY-NC 4.0"),
    ("http://creativecommons.org/licenses/by-nc-sa/2.0/", "CC-BY-NC-SA 2.0"),
    ("http://creativecommons.org/licenses/by-nc-sa/3.0/", "CC-BY-NC-SA 3.0"),
    ("https://creativecommons.org/licenses/by-nd/4.0/", "CC-BY-ND 4.0"),
    ("https://creativecommons.org/licenses/by-sa/4.0/", "CC-BY-SA 4.0"),
    ("GNU General Public License", "GPL-1.0"),
    ("http://opensource.org/licenses/MIT", "MIT"),
    ("https://opensource.org/licenses/MIT", "MIT"),
    ("http://www.opendatacommons.org/licenses/pddl/1.0/", "PDDL 1.0"),
];

const KNOWN_LICENSE_TITLES: &[&str] = &[
    "BSD-2-Clause",
    "BSD-3-Clause",
    "CC0 1.0 Universal",
    "CC-BY-SA 3.0",
    "GPL-3.0",
    "Information not available",
    "OGC Document License Agreement",
    "W3C Document License (2023)",
];

/// Maps license IRIs and long names onto a short title.
pub fn align_license(value: &str) -> String {
    let value = value.trim();
    if let Some((_, title)) = LICENSE_ALIASES.iter().find(|(alias, _)| *alias == value) {
        return (*title).to_string();
    }
    let is_known_title = KNOWN_LICENSE_TITLES.contains(&value)
        || LICENSE_ALIASES.iter().any(|(_, title)| *title == value);
    if is_known_title {
        return value.to_string();
    }
    clean_string(value, true)
}

/// Replaces everything outside `[A-Za-z0-9_-]` so a URL can be a file name.
pub fn sanitize_for_filename(url: &str) -> String {
    url.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
