//! Cheap paragraph-level language detection (§4.7 step 5: "route each
//! paragraph to the RTL target only if it isn't already in that script").
//! No ML model — a Unicode-block heuristic is enough to tell Hebrew script
//! apart from Western-script text, which is the only distinction the
//! routing step needs.

/// Fraction of alphabetic characters in `text` that fall in the Hebrew
/// Unicode block (U+0590..U+05FF).
fn hebrew_ratio(text: &str) -> f64 {
    let mut alpha = 0usize;
    let mut hebrew = 0usize;
    for c in text.chars() {
        if c.is_alphabetic() {
            alpha += 1;
            if ('\u{0590}'..='\u{05FF}').contains(&c) {
                hebrew += 1;
            }
        }
    }
    if alpha == 0 {
        0.0
    } else {
        hebrew as f64 / alpha as f64
    }
}

/// True when `text` is already predominantly in the given RTL target
/// language's script, so translation would be a no-op.
pub fn is_already_in_script(text: &str, rtl_target_language: &str) -> bool {
    if rtl_target_language == "he" {
        hebrew_ratio(text) > 0.5
    } else {
        false
    }
}

/// Fraction of alphabetic characters that are plain ASCII Latin letters —
/// cheap enough to tell "already Western-script" text apart from Hebrew or
/// other non-Latin paragraphs without a real language identifier.
fn latin_ratio(text: &str) -> f64 {
    let mut alpha = 0usize;
    let mut latin = 0usize;
    for c in text.chars() {
        if c.is_alphabetic() {
            alpha += 1;
            if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
    }
    if alpha == 0 {
        1.0
    } else {
        latin as f64 / alpha as f64
    }
}

/// Paragraph routing's per-paragraph check (§4.7 step 5): does this
/// paragraph already look like it's in `target_lang`, so translation would
/// be a no-op? For the RTL target, script membership is definitive; for any
/// other (Western) target, "already Latin-script" is the best cheap proxy
/// available without a real language identifier.
pub fn matches_target_language(text: &str, target_lang: &str, rtl_target_language: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    if target_lang == rtl_target_language {
        is_already_in_script(text, rtl_target_language)
    } else {
        latin_ratio(text) > 0.9
    }
}

/// True when `text` contains at least one character from the RTL Unicode
/// block (currently Hebrew only, per the RTL target language this crate
/// supports). Used by audit (§4.9 `PLACEHOLDER`/`VALID` classification,
/// P2) to flag an RTL translation file that contains no RTL script at all —
/// distinct from `is_already_in_script`'s "predominantly" threshold, since a
/// single stray RTL character is enough to disqualify a file from this
/// particular check, not enough to call it Hebrew content.
pub fn contains_rtl_char(text: &str) -> bool {
    text.chars().any(|c| ('\u{0590}'..='\u{05FF}').contains(&c))
}

/// Characters from `source_lang`'s diacritic set still present in `text`
/// (§4.7 step 7 "cheap regex lint"). Only German is grounded in the
/// original's default source-language hint (`deu`); other source languages
/// are not linted.
pub fn contains_source_diacritics(text: &str, source_lang: Option<&str>) -> bool {
    match source_lang.map(|s| s.to_lowercase()) {
        Some(lang) if lang == "de" || lang == "deu" || lang == "german" => text
            .chars()
            .any(|c| matches!(c, 'ä' | 'ö' | 'ü' | 'ß' | 'Ä' | 'Ö' | 'Ü')),
        _ => false,
    }
}
