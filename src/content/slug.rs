//! Slug normalization and unique-slug assignment.

use uuid::Uuid;

/// Normalize a title into a lowercase hyphenated URL-safe form.
/// Non-alphanumeric runs collapse to a single hyphen; leading and trailing
/// hyphens are trimmed. May return an empty string for titles with no
/// ASCII alphanumerics.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

fn random_token() -> String {
    let mut token = Uuid::new_v4().simple().to_string();
    token.truncate(16);
    token
}

/// Produce the slug for a record being saved.
///
/// Slugs are immutable: a non-empty `existing_slug` is returned unchanged.
/// Otherwise the title is slugified (falling back to a random 16-hex-char
/// token for titles that normalize to nothing) and probed against `exists`,
/// appending `-1`, `-2`, ... until a free candidate is found. The caller's
/// `exists` check must exclude the record's own identity.
pub fn assign_slug<F>(title: &str, existing_slug: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !existing_slug.is_empty() {
        return existing_slug.to_string();
    }

    let base = {
        let normalized = slugify(title);
        if normalized.is_empty() {
            random_token()
        } else {
            normalized
        }
    };

    if !exists(&base) {
        return base;
    }

    let mut index = 1u64;
    loop {
        let candidate = format!("{}-{}", base, index);
        if !exists(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Launch Playbook"), "launch-playbook");
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("Rust 2024"), "rust-2024");
    }

    #[test]
    fn test_slugify_degenerate_titles() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_existing_slug_is_immutable() {
        let slug = assign_slug("New Title", "old-slug", |_| true);
        assert_eq!(slug, "old-slug");
    }

    #[test]
    fn test_first_post_gets_base_slug() {
        let slug = assign_slug("Launch Playbook", "", |_| false);
        assert_eq!(slug, "launch-playbook");
    }

    #[test]
    fn test_collisions_get_numeric_suffixes() {
        let taken: HashSet<&str> = ["launch-playbook", "launch-playbook-1"]
            .into_iter()
            .collect();
        let slug = assign_slug("Launch Playbook", "", |c| taken.contains(c));
        assert_eq!(slug, "launch-playbook-2");
    }

    #[test]
    fn test_empty_title_falls_back_to_random_token() {
        let slug = assign_slug("???", "", |_| false);
        assert_eq!(slug.len(), 16);
        assert!(slug.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
