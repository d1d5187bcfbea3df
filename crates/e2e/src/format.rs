//! Brazilian document formatting

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{E2eError, E2eResult};

fn non_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9]").expect("valid regex"))
}

fn cpf_groups() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{3})(\d{3})(\d{3})(\d{2})$").expect("valid regex"))
}

fn mask(digits: &str) -> String {
    cpf_groups().replace(digits, "$1.$2.$3-$4").into_owned()
}

/// Display mask for a CPF (`xxx.xxx.xxx-xx`).
///
/// Input that does not hold exactly 11 digits is returned unchanged.
pub fn format_cpf(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let digits = non_digits().replace_all(value, "");
    if digits.len() != 11 {
        return value.to_string();
    }
    mask(&digits)
}

/// Like [`format_cpf`], but rejects input without exactly 11 digits.
pub fn format_cpf_strict(cpf: &str) -> E2eResult<String> {
    let digits = non_digits().replace_all(cpf, "");
    if digits.len() != 11 {
        return Err(E2eError::InvalidDocument(format!(
            "CPF must have 11 digits. Got: {} ({} digits)",
            cpf,
            digits.len()
        )));
    }
    Ok(mask(&digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("12345678901", "123.456.789-01" ; "bare digits")]
    #[test_case("123.456.789-01", "123.456.789-01" ; "already masked")]
    #[test_case("123 456 789 01", "123.456.789-01" ; "spaces")]
    #[test_case("1234", "1234" ; "too short is kept")]
    #[test_case("12.345.678/0001-90", "12.345.678/0001-90" ; "cnpj is kept")]
    #[test_case("", "" ; "empty")]
    #[test_case("١٢٣٤٥٦٧٨٩٠١", "١٢٣٤٥٦٧٨٩٠١" ; "non ascii digits are kept")]
    fn test_format_cpf(input: &str, expected: &str) {
        assert_eq!(format_cpf(input), expected);
    }

    #[test]
    fn test_strict_rejects_wrong_length() {
        assert_eq!(format_cpf_strict("98765432100").unwrap(), "987.654.321-00");

        let err = format_cpf_strict("987.654").unwrap_err();
        assert!(err.to_string().contains("(6 digits)"));

        // Arabic-Indic digits are not CPF digits
        assert!(format_cpf_strict("١٢٣٤٥٦٧٨٩٠١").is_err());
    }
}
