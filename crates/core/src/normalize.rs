use once_cell::sync::Lazy;
use regex::Regex;

static APOSTROPHE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*['’]\s*(\p{L})").expect("apostrophe pattern"));

/// Canonicalize Turkish apostrophe-suffix constructions and whitespace.
///
/// "saat 10'da" becomes "saat 10 da" so that downstream patterns only have
/// to deal with space-separated tokens. Pure and idempotent.
pub fn normalize(text: &str) -> String {
    let split = APOSTROPHE_SUFFIX.replace_all(text, "$1 $2");
    split.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_apostrophe_suffixes() {
        assert_eq!(normalize("saat 10'da toplantı"), "saat 10 da toplantı");
        assert_eq!(normalize("22'si saat 10:00'da"), "22 si saat 10:00 da");
    }

    #[test]
    fn handles_curly_apostrophes() {
        assert_eq!(normalize("saat 9’da"), "saat 9 da");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  yarın   saat\t14  "), "yarın saat 14");
    }

    #[test]
    fn is_idempotent() {
        for sample in [
            "Yarın saat 14 te tedarikçi toplantısı",
            "22'si saat 10:00'da tedarikçi",
            "  boş   luk  ",
            "",
        ] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once);
        }
    }
}
