//! Generated display names for users who registered without one.

use rand::seq::IndexedRandom;
use rand::Rng;

pub const ADJECTIVES: &[&str] = &[
    "Happy", "Swift", "Clever", "Brave", "Calm", "Bright", "Lucky", "Mighty",
];

pub const NOUNS: &[&str] = &[
    "Tiger", "Falcon", "Panda", "Otter", "Wolf", "Eagle", "Fox", "Bear",
];

/// `<Adjective><Noun><NNNN>`, e.g. `SwiftOtter4821`.
///
/// Not unique; two users may well end up with the same name.
pub fn synthesize_display_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    // Both lists are non-empty constants.
    let adjective = ADJECTIVES.choose(&mut *rng).copied().unwrap_or("Happy");
    let noun = NOUNS.choose(&mut *rng).copied().unwrap_or("Tiger");
    let number: u16 = rng.random_range(1000..=9999);

    format!("{}{}{}", adjective, noun, number)
}

/// True when `name` has the shape produced by [`synthesize_display_name`].
pub fn is_synthesized(name: &str) -> bool {
    ADJECTIVES.iter().any(|adjective| {
        name.strip_prefix(adjective).is_some_and(|rest| {
            NOUNS.iter().any(|noun| {
                rest.strip_prefix(noun).is_some_and(|digits| {
                    digits.len() == 4
                        && digits.chars().all(|c| c.is_ascii_digit())
                        && !digits.starts_with('0')
                })
            })
        })
    })
}
