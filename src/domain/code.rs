use rand::RngCore;

const CODE_PREFIX: &str = "PROMO";
const FALLBACK_INITIALS: &str = "XX";
const SUFFIX_BYTES: usize = 4;

/// Generate a discount code of the form `PROMO-<INITIALS>-<SUFFIX>`.
///
/// Initials come from the first letters of up to three words of the display
/// name; an empty or unusable name falls back to `XX`. The suffix is 4 bytes
/// from the thread-local CSPRNG, hex encoded, so two calls with the same name
/// collide with probability 2^-32. The ledger's unique index catches the
/// remainder.
pub fn generate_code(display_name: &str) -> String {
    let mut bytes = [0u8; SUFFIX_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!(
        "{CODE_PREFIX}-{}-{}",
        initials(display_name),
        hex::encode_upper(bytes)
    )
}

fn initials(display_name: &str) -> String {
    let letters: String = display_name
        .split_whitespace()
        .take(3)
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        FALLBACK_INITIALS.to_string()
    } else {
        letters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_carries_prefix_and_initials() {
        let code = generate_code("Ada Lovelace");
        assert!(code.starts_with("PROMO-AL-"), "got {code}");
        let suffix = code.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_BYTES * 2);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn empty_name_falls_back() {
        assert!(generate_code("").starts_with("PROMO-XX-"));
        assert!(generate_code("   ").starts_with("PROMO-XX-"));
        assert!(generate_code("--- ***").starts_with("PROMO-XX-"));
    }

    #[test]
    fn at_most_three_initials() {
        let code = generate_code("Anna Maria Luisa de Medici");
        assert!(code.starts_with("PROMO-AML-"), "got {code}");
    }

    #[test]
    fn lowercase_names_are_uppercased() {
        assert!(generate_code("ada lovelace").starts_with("PROMO-AL-"));
    }

    #[test]
    fn consecutive_codes_differ() {
        let a = generate_code("Ada Lovelace");
        let b = generate_code("Ada Lovelace");
        assert_ne!(a, b);
    }
}
