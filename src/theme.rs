//! Class theming: colour palette and cover image catalog.

use sha2::{Digest, Sha256};

pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

pub const PALETTE: [&str; 8] = [
    "#1a73e8", "#1e8e3e", "#d93025", "#e37400", "#129eaf", "#9334e6", "#4285f4", "#5f6368",
];

const THEME_BASE: &str = "https://gstatic.com/classroom/themes";

/// Theme image categories, in the order a picker would show them.
pub const CATEGORIES: [&str; 6] = ["general", "english-history", "math-science", "arts", "sports", "other"];

fn images_for(category: &str) -> &'static [&'static str] {
    match category {
        "english-history" => &["img_graduation", "img_bookclub", "img_reachout", "img_code"],
        "math-science" => &["img_bookclub", "img_code", "img_graduation", "img_reachout"],
        "arts" => &["img_concert", "img_bookclub", "img_graduation", "img_code"],
        "sports" => &["img_reachout", "img_code", "img_graduation", "img_bookclub"],
        "other" => &["img_code", "img_pencils", "img_bookclub", "img_graduation"],
        _ => &["img_breakfast", "img_code", "img_bookclub", "img_graduation"],
    }
}

fn bucket(seed: &str, len: usize) -> usize {
    let digest = Sha256::digest(seed.as_bytes());
    (u16::from_be_bytes([digest[0], digest[1]]) as usize) % len
}

/// Palette colour derived from the class name, stable across reloads.
pub fn default_color(name: &str) -> &'static str {
    PALETTE[bucket(&name.trim().to_lowercase(), PALETTE.len())]
}

pub fn theme_image_url(category: &str, seed: &str) -> String {
    let images = images_for(category);
    format!("{THEME_BASE}/{}.jpg", images[bucket(seed, images.len())])
}

/// Cover used when a class has no image of its own.
pub fn placeholder_cover(class_id: &str) -> String {
    theme_image_url("general", class_id)
}

/// Guess a theme category from free-text subject/name.
pub fn category_for(text: &str) -> &'static str {
    let t = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| t.contains(w));
    if has(&["math", "science", "physics", "chemistry", "biology", "algebra", "calculus"]) {
        "math-science"
    } else if has(&["english", "history", "literature", "writing", "language"]) {
        "english-history"
    } else if has(&["art", "music", "drawing", "design", "riso", "print"]) {
        "arts"
    } else if has(&["sport", "physical", "pe ", "football", "basketball"]) {
        "sports"
    } else if t.trim().is_empty() {
        "general"
    } else {
        "other"
    }
}
