use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const ENROLLMENT_CODE_LEN: usize = 7;
const MAX_SLUG_LEN: usize = 32;

/// Canonical form of a class identifier: lowercase ASCII alphanumerics with
/// single `-` separators, no leading or trailing `-`.
pub fn canonical_class_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Loose comparison key: case and punctuation ignored.
pub fn normalized_class_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// New class id: a slug of the name plus a short random suffix, already in
/// canonical form.
pub fn new_class_id(name: &str) -> String {
    let mut slug = canonical_class_id(name);
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    if slug.is_empty() {
        slug.push_str("class");
    }
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{slug}-{}", &suffix[..6])
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Seven lowercase alphanumerics, the shape of a classroom join code.
pub fn enrollment_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ENROLLMENT_CODE_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}
