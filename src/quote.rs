use crate::model::day_key;
use chrono::NaiveDate;

pub const NO_SELECTION: &str = "Select a date to see your motivation ✨";

pub const QUOTES: [&str; 15] = [
    "Don't watch the clock; do what it does. Keep going.",
    "Success is the sum of small efforts, repeated day in and day out.",
    "Push yourself, because no one else is going to do it for you.",
    "Dream it. Wish it. Do it.",
    "Believe you can and you're halfway there.",
    "The only bad workout is the one that didn’t happen.",
    "Strive for progress, not perfection.",
    "Your limitation—it’s only your imagination.",
    "Great things never come from comfort zones.",
    "Do something today that your future self will thank you for.",
    "Little things make big days.",
    "Don't stop when you're tired. Stop when you're done.",
    "Sometimes later becomes never. Do it now.",
    "Don’t wait for opportunity. Create it.",
    "The harder you work for something, the greater you’ll feel when you achieve it.",
];

/// Rolling `hash * 31 + c` over UTF-16 units. Only the shifted term is
/// truncated to 32 bits; the accumulator itself is not.
pub fn day_hash(key: &str) -> i64 {
    key.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        i64::from(unit) + shifted - hash
    })
}

pub fn quote_for_key(key: &str) -> &'static str {
    let idx = day_hash(key).unsigned_abs() % QUOTES.len() as u64;
    QUOTES[idx as usize]
}

pub fn quote_for(day: Option<NaiveDate>) -> &'static str {
    match day {
        Some(day) => quote_for_key(&day_key(day)),
        None => NO_SELECTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_values() {
        assert_eq!(day_hash(""), 0);
        assert_eq!(day_hash("a"), 97);
        assert_eq!(day_hash("2024-03-05"), 3_681_685_250);
        assert_eq!(day_hash("2025-01-01"), 4_569_129_345);
    }

    #[test]
    fn quote_is_stable_per_day() {
        assert_eq!(quote_for_key("2024-03-05"), QUOTES[5]);
        assert_eq!(quote_for_key("2025-01-01"), QUOTES[0]);
        assert_eq!(quote_for_key("2024-12-31"), QUOTES[4]);
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(quote_for(Some(day)), quote_for(Some(day)));
        assert_eq!(quote_for(Some(day)), QUOTES[5]);
    }

    #[test]
    fn no_selection_has_placeholder() {
        assert_eq!(quote_for(None), NO_SELECTION);
    }
}
