//! Receipt codes and synthetic transaction ids

use rand::Rng;

use crate::util::now_millis;

/// Receipt code prefix
pub const RECEIPT_PREFIX: &str = "NX-";

/// Number of random characters after the prefix
pub const RECEIPT_CODE_LEN: usize = 6;

/// Upper-case letters without `I`/`O`, digits without `0` (33 symbols)
pub const RECEIPT_ALPHABET: &[u8; 33] = b"ABCDEFGHJKLMNPQRSTUVWXYZ123456789";

/// Generate a receipt code such as `NX-7QK2MD`
pub fn generate_receipt_code() -> String {
    generate_receipt_code_with(&mut rand::thread_rng())
}

/// Generate a receipt code from the given RNG (seedable in tests)
pub fn generate_receipt_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(RECEIPT_PREFIX.len() + RECEIPT_CODE_LEN);
    code.push_str(RECEIPT_PREFIX);
    for _ in 0..RECEIPT_CODE_LEN {
        let idx = rng.gen_range(0..RECEIPT_ALPHABET.len());
        code.push(RECEIPT_ALPHABET[idx] as char);
    }
    code
}

/// Whether `code` has the receipt shape: prefix + 6 alphabet characters
pub fn is_valid_receipt_code(code: &str) -> bool {
    let Some(body) = code.strip_prefix(RECEIPT_PREFIX) else {
        return false;
    };
    body.len() == RECEIPT_CODE_LEN && body.bytes().all(|b| RECEIPT_ALPHABET.contains(&b))
}

/// Synthetic transaction id for simulated in-chat payments: `TXN-<millis>-<suffix>`
pub fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| RECEIPT_ALPHABET[rng.gen_range(0..RECEIPT_ALPHABET.len())] as char)
        .collect();
    format!("TXN-{}-{}", now_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn test_alphabet_excludes_lookalikes() {
        for b in [b'I', b'O', b'0'] {
            assert!(!RECEIPT_ALPHABET.contains(&b));
        }
        let unique: HashSet<u8> = RECEIPT_ALPHABET.iter().copied().collect();
        assert_eq!(unique.len(), 33);
    }

    #[test]
    fn test_ten_thousand_codes_are_well_formed() {
        for _ in 0..10_000 {
            let code = generate_receipt_code();
            assert!(is_valid_receipt_code(&code), "bad code {code}");
            assert_eq!(code.len(), 9);
        }
    }

    #[test]
    fn test_every_symbol_is_reachable() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            let code = generate_receipt_code_with(&mut rng);
            seen.extend(code[RECEIPT_PREFIX.len()..].bytes());
        }
        assert_eq!(seen.len(), RECEIPT_ALPHABET.len());
    }

    #[test]
    fn test_validation_rejects_malformed() {
        assert!(is_valid_receipt_code("NX-ABC234"));
        assert!(!is_valid_receipt_code("NX-ABC23"));
        assert!(!is_valid_receipt_code("NX-ABC2345"));
        assert!(!is_valid_receipt_code("NX-ABCO23"));
        assert!(!is_valid_receipt_code("nx-ABC234"));
        assert!(!is_valid_receipt_code("NX-abc234"));
        assert!(!is_valid_receipt_code(""));
    }

    #[test]
    fn test_transaction_id_shape() {
        let txn = generate_transaction_id();
        let parts: Vec<_> = txn.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 4);
    }
}
