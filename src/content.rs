//! Post body censoring.

/// Words replaced by [`censor`]
pub const PROFANE_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];

const MASK: &str = "****";

/// Mask profane words, matched whole and case-insensitively.
///
/// Words are split on single spaces, so `"Fornax!"` is left alone and runs
/// of spaces survive unchanged.
pub fn censor(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            let lowered = word.to_lowercase();
            if PROFANE_WORDS.contains(&lowered.as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
