// ============================================================================
// Entity Name Normalization
// ============================================================================
//
// External names arrive pluralized and in URL casing ("folders",
// "user_groups/members"). Each "/"-separated segment is converted to upper
// camel case and then singularized. Casing first keeps the whole operation
// idempotent: separators are gone before the suffix rules look at the tail.
//
// ============================================================================

pub(crate) const PATH_SEPARATOR: char = '/';

/// Singularize with the English-ish rules: "ies" -> "y", and a trailing single
/// "s" (not part of "ss") is dropped.
pub fn singularize(segment: &str) -> String {
    if let Some(stem) = segment.strip_suffix("ies") {
        return format!("{}y", stem);
    }

    if segment.ends_with('s') && !segment.ends_with("ss") {
        return segment[..segment.len() - 1].to_string();
    }

    segment.to_string()
}

/// "user_group" -> "UserGroup"; already camel-cased input passes through.
pub fn to_upper_camel_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut upper_next = true;

    for ch in segment.chars() {
        if ch == '_' || ch == '-' {
            upper_next = true;
            continue;
        }

        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }

    out
}

/// Normalize a single segment (no separator).
pub fn normalize_segment(segment: &str) -> String {
    singularize(&to_upper_camel_case(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("folders"), "folder");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("file"), "file");
        assert_eq!(singularize(""), "");
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_upper_camel_case("folder"), "Folder");
        assert_eq!(to_upper_camel_case("user_group"), "UserGroup");
        assert_eq!(to_upper_camel_case("mail-template"), "MailTemplate");
        assert_eq!(to_upper_camel_case("UserGroup"), "UserGroup");
    }

    #[test]
    fn test_normalize_segment() {
        assert_eq!(normalize_segment("folders"), "Folder");
        assert_eq!(normalize_segment("user_groups"), "UserGroup");
        assert_eq!(normalize_segment("Folder"), "Folder");
        assert_eq!(normalize_segment("a_ss"), "AS");
        assert_eq!(normalize_segment("AS"), "AS");
    }
}
