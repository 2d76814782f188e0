//! CPF and CNPJ check-digit validation plus display formatting.
//!
//! Every function here is pure and total: malformed input (wrong length,
//! non-digit characters) yields `false` or is passed through, never a panic.

/// Weight cycle used by both CNPJ check digits, read right to left.
const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Removes every non-digit character from raw caller input.
pub fn strip_non_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn to_digits(s: &str, expected_len: usize) -> Option<Vec<u32>> {
    if s.len() != expected_len {
        return None;
    }
    s.chars().map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (top - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        r => r,
    }
}

/// Validates an 11-digit CPF.
///
/// Rejects repeated-digit sequences (`000.000.000-00` and friends), which pass
/// the arithmetic but are never issued.
pub fn is_valid_cpf(digits: &str) -> bool {
    let Some(d) = to_digits(digits, 11) else {
        return false;
    };
    if all_same(&d) {
        return false;
    }

    cpf_check_digit(&d[..9]) == d[9] && cpf_check_digit(&d[..10]) == d[10]
}

fn cnpj_check_digit(digits: &[u32]) -> u32 {
    // Align the weight cycle so its last entry (2) lands on the rightmost digit.
    let weights = &CNPJ_WEIGHTS[CNPJ_WEIGHTS.len() - digits.len()..];
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        r if r < 2 => 0,
        r => 11 - r,
    }
}

/// Validates a 14-digit CNPJ.
pub fn is_valid_cnpj(digits: &str) -> bool {
    let Some(d) = to_digits(digits, 14) else {
        return false;
    };
    if all_same(&d) {
        return false;
    }

    cnpj_check_digit(&d[..12]) == d[12] && cnpj_check_digit(&d[..13]) == d[13]
}

/// Formats 11 digits as `###.###.###-##`. Other input is returned unchanged.
pub fn format_cpf(digits: &str) -> String {
    if digits.len() != 11 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Formats 14 digits as `##.###.###/####-##`. Other input is returned unchanged.
pub fn format_cnpj(digits: &str) -> String {
    if digits.len() != 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return digits.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}

/// Formats a postal code as `#####-###` when it carries exactly 8 digits.
pub fn format_cep(raw: &str) -> String {
    let digits = strip_non_digits(raw);
    if digits.len() == 8 {
        format!("{}-{}", &digits[..5], &digits[5..])
    } else {
        raw.trim().to_string()
    }
}
