//! Text normalization: raw Vietnamese text to speakable text.
//!
//! The pipeline only depends on [`TextNormalizer`]; [`VietnameseNormalizer`]
//! is the rule-driven implementation used by the CLI.

pub mod numbers;
pub mod rules;

use unicode_normalization::UnicodeNormalization;

/// Converts raw written text into the form the backbone was trained on.
pub trait TextNormalizer {
    fn normalize(&self, text: &str) -> String;
}

/// Rule-table normalizer for Vietnamese.
///
/// Rules run in a fixed order: NFC composition, abbreviations, dates, times,
/// currency, units, phone numbers, Roman numerals, numerals, symbols and
/// finally punctuation cleanup plus lowercasing.
#[derive(Debug, Clone, Copy, Default)]
pub struct VietnameseNormalizer;

impl VietnameseNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl TextNormalizer for VietnameseNormalizer {
    fn normalize(&self, text: &str) -> String {
        let text = text.nfc().collect::<String>();
        let text = rules::expand_abbreviations(&text);
        let text = rules::expand_dates(&text);
        let text = rules::expand_times(&text);
        let text = rules::expand_currency(&text);
        let text = rules::expand_units(&text);
        let text = rules::expand_phone_numbers(&text);
        let text = rules::expand_roman_numerals(&text);
        let text = rules::expand_numbers(&text);
        let text = rules::expand_symbols(&text);
        rules::clean_punctuation(&text)
    }
}

/// Split normalized text into chunks of at most `max_chars` characters.
///
/// Splits prefer sentence ends, then commas, then spaces. Words are never
/// broken, so a single word longer than `max_chars` becomes its own chunk.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    for sentence in split_after(text, &['.', '!', '?']) {
        if char_len(&sentence) <= max_chars {
            pieces.push(sentence);
            continue;
        }
        for clause in split_after(&sentence, &[',']) {
            if char_len(&clause) <= max_chars {
                pieces.push(clause);
            } else {
                pieces.extend(pack(clause.split_whitespace().map(str::to_string), max_chars));
            }
        }
    }
    pack(pieces, max_chars)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split after every delimiter, keeping it attached to the preceding piece.
fn split_after(text: &str, delims: &[char]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if delims.contains(&c) {
            let piece = current.trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            current.clear();
        }
    }
    let piece = current.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
    pieces
}

/// Greedily join pieces with spaces while they fit.
fn pack(pieces: impl IntoIterator<Item = String>, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if current.is_empty() {
            current = piece;
        } else if char_len(&current) + 1 + char_len(&piece) <= max_chars {
            current.push(' ');
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(text: &str) -> String {
        VietnameseNormalizer::new().normalize(text)
    }

    #[test]
    fn expands_numerals_in_sentences() {
        assert_eq!(
            normalize("Năm 2024, tôi có 15 con mèo."),
            "năm hai nghìn không trăm hai mươi bốn, tôi có mười lăm con mèo."
        );
    }

    #[test]
    fn plain_text_only_lowercased() {
        assert_eq!(
            normalize("Công nghệ giọng nói đang phát triển rất nhanh."),
            "công nghệ giọng nói đang phát triển rất nhanh."
        );
    }

    #[test]
    fn mixed_rules() {
        assert_eq!(
            normalize("Ngày 2/9/1945, UBND TP.HCM chi 1.500.000đ (tăng 20%)."),
            "ngày hai tháng chín năm một nghìn chín trăm bốn mươi lăm, ủy ban nhân dân \
             thành phố hồ chí minh chi một triệu năm trăm nghìn đồng tăng hai mươi phần trăm."
        );
        assert_eq!(normalize("A & B"), "a và b");
        assert_eq!(normalize("Họp lúc 14:30 ở tầng 3"), "họp lúc mười bốn giờ ba mươi phút ở tầng ba");
    }

    #[test]
    fn signs_and_ranges_survive_units_and_times() {
        let cases = [
            ("Nhiệt độ -5°C", "nhiệt độ âm năm độ xê"),
            ("giảm 10-20%", "giảm mười đến hai mươi phần trăm"),
            ("đi 5-10km", "đi năm đến mười ki lô mét"),
            ("Lúc 10:30-11:00", "lúc mười giờ ba mươi phút đến mười một giờ"),
            ("mã A-5kg", "mã a năm ki lô gam"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn decimals_before_a_slash_are_not_dates() {
        let text = normalize("Điểm 8,5/10");
        assert!(text.starts_with("điểm tám phẩy năm"), "{text}");
        assert!(!text.contains("ngày"), "{text}");
    }

    #[test]
    fn unreadable_numerals_are_still_spoken() {
        assert_eq!(normalize("phiên bản 1.2.3"), "phiên bản một chấm hai chấm ba");
        assert_eq!(normalize("các số 1,2,3"), "các số một phẩy hai phẩy ba");
    }

    #[test]
    fn decomposed_diacritics_are_composed() {
        let decomposed = "Vie\u{0302}\u{0323}t Nam";
        assert_eq!(normalize(decomposed), "việt nam");
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let inputs = [
            "Xin chào, tôi là trợ lý ảo.",
            "Giá 25.000 VND, giảm 10% từ 8h đến 17h!",
            "Thế kỷ XXI... thật \"tuyệt\" vời",
            "các số 1,2,3",
            "phiên bản 1.2.3",
            "mã 123456789012345678901234",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
            assert!(!once.chars().any(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize("   "), "");
        assert!(split_into_chunks("", 10).is_empty());
    }

    #[test]
    fn chunks_respect_sentence_boundaries() {
        let text = "câu một. câu hai dài hơn. ba!";
        assert_eq!(split_into_chunks(text, 100), vec![text.to_string()]);
        assert_eq!(
            split_into_chunks(text, 20),
            vec!["câu một.", "câu hai dài hơn. ba!"]
        );
    }

    #[test]
    fn long_sentences_split_at_commas_then_words() {
        let text = "một hai ba, bốn năm sáu bảy tám chín mười";
        let chunks = split_into_chunks(text, 12);
        assert_eq!(chunks[0], "một hai ba,");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 12, "{chunk:?}");
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn oversized_words_are_kept_whole() {
        let chunks = split_into_chunks("nghiêngnghiêngnghiêng a", 5);
        assert_eq!(chunks, vec!["nghiêngnghiêngnghiêng", "a"]);
    }
}
