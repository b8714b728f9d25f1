//! Control-stanza header recognition and list parsing.

/// Headers the parser acts on. Everything else is carried only in the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Package,
    Filename,
    Md5sum,
    Depends,
    Recommends,
    Task,
}

const HEADERS: &[(&str, Field)] = &[
    ("Package:", Field::Package),
    ("Filename:", Field::Filename),
    ("MD5sum:", Field::Md5sum),
    ("Depends:", Field::Depends),
    ("Recommends:", Field::Recommends),
    ("Task:", Field::Task),
];

/// Split a stanza line into a recognized header and its raw value.
///
/// Headers are matched case-sensitively at the very start of the line.
pub(crate) fn header(line: &str) -> Option<(Field, &str)> {
    HEADERS.iter().find_map(|(prefix, field)| {
        line.strip_prefix(prefix).map(|value| (*field, value))
    })
}

/// Names listed in a relationship field.
///
/// Commas and pipes are treated alike, so `a | b` and `a, b` both yield
/// `a` and `b`: whether a group meant "all of" or "any of" is not kept.
/// Anything after the first whitespace in a token (a version constraint or
/// architecture qualifier) is dropped, and empty tokens are skipped.
///
/// ```
/// use isosmith::package::parse_list;
///
/// let names: Vec<&str> = parse_list(" libc6 (>= 2.9), debconf | debconf-2.0").collect();
/// assert_eq!(names, vec!["libc6", "debconf", "debconf-2.0"]);
/// ```
pub fn parse_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split([',', '|'])
        .filter_map(|token| token.split_whitespace().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_recognition() {
        assert_eq!(header("Package: foo"), Some((Field::Package, " foo")));
        assert_eq!(header("MD5sum:abc"), Some((Field::Md5sum, "abc")));
        assert_eq!(header("Task: minimal\n"), Some((Field::Task, " minimal\n")));
        assert_eq!(header("Version: 1.0"), None);
        assert_eq!(header("md5sum: abc"), None);
        assert_eq!(header(" Package: indented"), None);
    }

    #[test]
    fn test_pre_depends_is_not_depends() {
        assert_eq!(header("Pre-Depends: dpkg"), None);
    }

    #[test]
    fn test_parse_list_flattens_alternatives() {
        let names: Vec<&str> = parse_list(" bar (>= 1.0), baz | qux").collect();
        assert_eq!(names, vec!["bar", "baz", "qux"]);
    }

    #[test]
    fn test_parse_list_skips_empty_tokens() {
        let names: Vec<&str> = parse_list(" a,, b |  ,c ").collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(parse_list("   ").count(), 0);
    }

    proptest! {
        #[test]
        fn test_parse_list_recovers_names(
            names in prop::collection::vec("[a-z][a-z0-9.+-]{0,12}", 1..8),
            use_pipe in prop::collection::vec(any::<bool>(), 8),
        ) {
            let value = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let sep = if i == 0 { " " } else if use_pipe[i] { " | " } else { ", " };
                    format!("{sep}{name} (>= {i}.0)")
                })
                .collect::<String>();

            let parsed: Vec<&str> = parse_list(&value).collect();
            prop_assert_eq!(parsed, names.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}
