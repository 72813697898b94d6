//! Room codes.
//!
//! A room is addressed by four uppercase letters. The alphabet drops letters
//! that are easy to misread on a phone screen (`I`, `L`, `O`), and generated
//! or typed codes containing a denylisted substring are rejected.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Number of characters in a room code.
pub const ROOM_CODE_LEN: usize = 4;

/// Allowed characters.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ";

/// Substrings no room code may contain.
/// Spelled with [`ALPHABET`] letters only, or the entry could never match.
const DENYLIST: &[&[u8]] = &[
    b"ASS", b"CUM", b"CUNT", b"DAMN", b"DCK", b"DYKE", b"FAG", b"FCK", b"FUCK", b"FUK", b"GAY",
    b"JEW", b"KKK", b"NGR", b"PSS", b"PUSY", b"RAPE", b"SEX", b"SHT", b"TWAT", b"WANK", b"WHR",
];

/// Why a string is not a valid room code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomCodeError {
    /// Wrong number of characters.
    #[error("room code must be {ROOM_CODE_LEN} letters, got {0}")]
    WrongLength(usize),

    /// Character outside [`ALPHABET`].
    #[error("room code contains invalid character {0:?}")]
    InvalidCharacter(char),

    /// Code contains a denylisted substring.
    #[error("room code is not allowed")]
    Denied,
}

/// A validated 4-letter room code.
///
/// Construct with [`RoomCode::parse`] (user input, case-insensitive) or
/// [`RoomCode::generate`] (host side).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode([u8; ROOM_CODE_LEN]);

impl RoomCode {
    /// Parse user input. Surrounding whitespace is ignored and lowercase
    /// letters are accepted.
    ///
    /// # Errors
    ///
    /// See [`RoomCodeError`].
    pub fn parse(input: &str) -> Result<Self, RoomCodeError> {
        let trimmed = input.trim();
        let len = trimmed.chars().count();
        if len != ROOM_CODE_LEN {
            return Err(RoomCodeError::WrongLength(len));
        }

        let mut code = [0u8; ROOM_CODE_LEN];
        for (slot, ch) in code.iter_mut().zip(trimmed.chars()) {
            let upper = ch.to_ascii_uppercase();
            if !upper.is_ascii() || !ALPHABET.contains(&(upper as u8)) {
                return Err(RoomCodeError::InvalidCharacter(ch));
            }
            *slot = upper as u8;
        }

        if is_denied(&code) {
            return Err(RoomCodeError::Denied);
        }

        Ok(Self(code))
    }

    /// Generate a random code.
    ///
    /// `fill` supplies entropy (e.g. `Environment::random_bytes`). Bytes that
    /// would bias the alphabet are discarded and denylisted codes are redrawn,
    /// so `fill` may be called more than four times.
    pub fn generate(mut fill: impl FnMut(&mut [u8])) -> Self {
        // Largest multiple of the alphabet size that fits in a byte.
        let limit = 256 / ALPHABET.len() * ALPHABET.len();

        loop {
            let mut code = [0u8; ROOM_CODE_LEN];
            let mut filled = 0;
            while filled < ROOM_CODE_LEN {
                let mut byte = [0u8; 1];
                fill(&mut byte);
                let value = usize::from(byte[0]);
                if value < limit {
                    code[filled] = ALPHABET[value % ALPHABET.len()];
                    filled += 1;
                }
            }

            if !is_denied(&code) {
                return Self(code);
            }
        }
    }

    /// Code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

fn is_denied(code: &[u8; ROOM_CODE_LEN]) -> bool {
    DENYLIST.iter().any(|word| code.windows(word.len()).any(|window| window == *word))
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomCode({})", self.as_str())
    }
}

impl FromStr for RoomCode {
    type Err = RoomCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = RoomCode::parse("  bcdf ").unwrap();
        assert_eq!(code.as_str(), "BCDF");
        assert_eq!(code.to_string(), "BCDF");
    }

    #[test]
    fn ambiguous_letters_rejected() {
        assert_eq!(RoomCode::parse("ABCO"), Err(RoomCodeError::InvalidCharacter('O')));
        assert_eq!(RoomCode::parse("ABCI"), Err(RoomCodeError::InvalidCharacter('I')));
        assert_eq!(RoomCode::parse("lABC"), Err(RoomCodeError::InvalidCharacter('l')));
        assert_eq!(RoomCode::parse("AB1C"), Err(RoomCodeError::InvalidCharacter('1')));
    }

    #[test]
    fn wrong_length_rejected() {
        assert_eq!(RoomCode::parse("ABC"), Err(RoomCodeError::WrongLength(3)));
        assert_eq!(RoomCode::parse("ABCDE"), Err(RoomCodeError::WrongLength(5)));
        assert_eq!(RoomCode::parse(""), Err(RoomCodeError::WrongLength(0)));
    }

    #[test]
    fn non_ascii_rejected() {
        assert_eq!(RoomCode::parse("ABCÉ"), Err(RoomCodeError::InvalidCharacter('É')));
    }

    #[test]
    fn denylisted_substrings_rejected() {
        assert_eq!(RoomCode::parse("XASS"), Err(RoomCodeError::Denied));
        assert_eq!(RoomCode::parse("fuck"), Err(RoomCodeError::Denied));
        assert_eq!(RoomCode::parse("KKKA"), Err(RoomCodeError::Denied));
    }

    #[test]
    fn denylist_only_uses_code_letters() {
        for word in DENYLIST {
            assert!(word.len() <= ROOM_CODE_LEN);
            assert!(word.iter().all(|b| ALPHABET.contains(b)), "{:?}", std::str::from_utf8(word));
        }
        assert_eq!(RoomCode::parse("PSSA"), Err(RoomCodeError::Denied));
        assert_eq!(RoomCode::parse("ADCK"), Err(RoomCodeError::Denied));
    }

    #[test]
    fn generate_redraws_denied_codes() {
        // Feed "ASSA" first, then "BBBB".
        let script = [0u8, 15, 15, 0, 1, 1, 1, 1];
        let mut next = script.iter().copied();
        let code = RoomCode::generate(|buf| {
            for byte in buf.iter_mut() {
                *byte = next.next().unwrap_or(1);
            }
        });
        assert_eq!(code.as_str(), "BBBB");
    }

    #[test]
    fn generate_discards_biased_bytes() {
        let script = [255u8, 254, 2, 2, 2, 2];
        let mut next = script.iter().copied();
        let code = RoomCode::generate(|buf| {
            for byte in buf.iter_mut() {
                *byte = next.next().unwrap_or(2);
            }
        });
        assert_eq!(code.as_str(), "CCCC");
    }

    proptest! {
        #[test]
        fn generated_codes_parse(seed in any::<u64>()) {
            let mut state = seed;
            let code = RoomCode::generate(|buf| {
                for byte in buf.iter_mut() {
                    state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                    *byte = (state >> 56) as u8;
                }
            });
            prop_assert_eq!(RoomCode::parse(code.as_str()), Ok(code));
        }

        #[test]
        fn parse_never_panics(input in ".{0,8}") {
            let _ = RoomCode::parse(&input);
        }
    }
}
