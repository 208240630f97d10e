//! Four letter join codes.

use rand::Rng;

pub const CODE_LENGTH: usize = 4;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Codes that would be embarrassing to show on a shared screen.
const BLOCKED: &[&str] = &[
    "SHIT", "FUCK", "DAMN", "CUNT", "TIT", "PISS", "BOOB", "ASS", "CUM", "FAG", "ANAL", "ANUS",
    "ARSE", "CLIT", "COCK", "CRAP", "DICK", "DUMB", "DYKE", "GOOK", "HOMO", "JISM", "JUGS", "KIKE",
    "PAKI", "SCUM", "SHAG", "SLUT", "SPIC", "SUCK", "TURD", "TWAT", "WANK",
];

/// True when the code contains a blocked word anywhere in it.
pub fn is_blocked(code: &str) -> bool {
    BLOCKED.iter().any(|word| code.contains(word))
}

/// Canonical form of a code typed by a player.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Draw random codes until one is clean and not `is_taken`.
pub fn generate_code(is_taken: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        if !is_blocked(&code) && !is_taken(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use ntest::test_case;

    use super::*;

    #[test]
    fn test_code_shape() {
        for _ in 0..200 {
            let code = generate_code(|_| false);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
            assert!(!is_blocked(&code));
        }
    }

    #[test_case("XASS", true)]
    #[test_case("TITX", true)]
    #[test_case("WANK", true)]
    #[test_case("ABCD", false)]
    #[test_case("QWER", false)]
    fn test_blocked_substrings(code: &str, blocked: bool) {
        assert_eq!(is_blocked(code), blocked);
    }

    #[test]
    fn test_skips_taken_codes() {
        let mut taken = HashSet::new();
        for _ in 0..100 {
            let code = generate_code(|c| taken.contains(c));
            assert!(taken.insert(code));
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" abcd "), "ABCD");
    }
}
