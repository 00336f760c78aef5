//! Rewrite rules applied by [`super::VietnameseNormalizer`], in pipeline order.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::numbers::{read_digits, read_month, read_number, read_numeral_or_digits};

/// Written numeral: digits with `.`/`,` groups.
const NUM: &str = r"[0-9]+(?:[.,][0-9]+)*";

/// Optionally signed numeral, optionally a `a-b` range.
const AMOUNT: &str = r"-?[0-9]+(?:[.,][0-9]+)*(?:\s*[-–]\s*-?[0-9]+(?:[.,][0-9]+)*)?";

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("TP.HCM", "thành phố hồ chí minh"),
    ("TPHCM", "thành phố hồ chí minh"),
    ("TP.", "thành phố"),
    ("UBND", "ủy ban nhân dân"),
    ("HĐND", "hội đồng nhân dân"),
    ("CSGT", "cảnh sát giao thông"),
    ("THPT", "trung học phổ thông"),
    ("THCS", "trung học cơ sở"),
    ("ĐH", "đại học"),
    ("BHXH", "bảo hiểm xã hội"),
    ("BHYT", "bảo hiểm y tế"),
    ("TW", "trung ương"),
    ("VN", "việt nam"),
    ("GS.TS.", "giáo sư tiến sĩ"),
    ("PGS.TS.", "phó giáo sư tiến sĩ"),
    ("GS.", "giáo sư"),
    ("PGS.", "phó giáo sư"),
    ("TS.", "tiến sĩ"),
    ("ThS.", "thạc sĩ"),
    ("BS.", "bác sĩ"),
    ("KS.", "kỹ sư"),
    ("v.v.", "vân vân"),
    ("v.v", "vân vân"),
];

// Longer symbols first; the regex alternation is leftmost-first.
const UNITS: &[(&str, &str)] = &[
    ("km/h", "ki lô mét trên giờ"),
    ("km²", "ki lô mét vuông"),
    ("km2", "ki lô mét vuông"),
    ("m²", "mét vuông"),
    ("m2", "mét vuông"),
    ("m³", "mét khối"),
    ("m3", "mét khối"),
    ("°C", "độ xê"),
    ("°F", "độ ép"),
    ("km", "ki lô mét"),
    ("cm", "xăng ti mét"),
    ("mm", "mi li mét"),
    ("kg", "ki lô gam"),
    ("mg", "mi li gam"),
    ("ml", "mi li lít"),
    ("ha", "héc ta"),
    ("m", "mét"),
    ("g", "gam"),
    ("l", "lít"),
];

fn numeral(text: &str) -> String {
    read_numeral_or_digits(text)
}

/// True when the character before `start` is a letter or digit.
fn after_word(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(char::is_alphanumeric)
}

/// True when `start` continues a decimal such as `8,5`.
fn after_decimal(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    matches!(
        (before.next(), before.next()),
        (Some('.' | ','), Some(d)) if d.is_ascii_digit()
    )
}

fn signed_numeral(text: &str) -> String {
    match text.strip_prefix('-') {
        Some(rest) => format!("âm {}", numeral(rest)),
        None => numeral(text),
    }
}

/// Read an [`AMOUNT`] match found at `start` of `text`.
///
/// A leading `-` only means "âm" when it does not follow a word, so codes
/// like `A-5` keep their separator.
fn amount(text: &str, start: usize, matched: &str) -> String {
    let (head, body) = match matched.strip_prefix('-') {
        Some(rest) if after_word(text, start) => ("- ", rest),
        _ => ("", matched),
    };
    let split = body
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '-' | '–'))
        .map(|(idx, c)| (idx, c.len_utf8()));
    match split {
        Some((idx, len)) => format!(
            "{head}{} đến {}",
            signed_numeral(body[..idx].trim()),
            signed_numeral(body[idx + len..].trim())
        ),
        None => format!("{head}{}", signed_numeral(body)),
    }
}

/// Expand every `AMOUNT` captured as group 1 of `re` with `reading(amount, caps)`.
fn replace_amounts(
    re: &Regex,
    text: &str,
    reading: impl Fn(String, &Captures) -> String,
) -> String {
    re.replace_all(text, |caps: &Captures| {
        let Some(m) = caps.get(1) else {
            return caps[0].to_string();
        };
        reading(amount(text, m.start(), m.as_str()), caps)
    })
    .into_owned()
}

fn lookup_abbreviation(word: &str) -> Option<&'static str> {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == word)
        .map(|(_, long)| *long)
}

fn expand_word(word: &str) -> String {
    let core = word
        .trim_start_matches(['(', '"', '“', '\''])
        .trim_end_matches([',', ';', ':', '!', '?', ')', '"', '”', '\'']);
    if core.is_empty() {
        return word.to_string();
    }
    let start = word.len() - word.trim_start_matches(['(', '"', '“', '\'']).len();
    let (head, tail) = (&word[..start], &word[start + core.len()..]);
    if let Some(long) = lookup_abbreviation(core) {
        return format!("{head}{long}{tail}");
    }
    if let Some(long) = core.strip_suffix('.').and_then(lookup_abbreviation) {
        return format!("{head}{long}.{tail}");
    }
    word.to_string()
}

/// Expand fixed abbreviations (`UBND`, `TP.HCM`, `GS.`...). Case sensitive.
pub fn expand_abbreviations(text: &str) -> String {
    text.split_whitespace()
        .map(expand_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn valid_date(day: u32, month: u32) -> bool {
    (1..=31).contains(&day) && (1..=12).contains(&month)
}

/// `dd/mm/yyyy`, `mm/yyyy` and `dd/mm` → `ngày … tháng … năm …`.
pub fn expand_dates(text: &str) -> String {
    static FULL: OnceLock<Regex> = OnceLock::new();
    static MONTH_YEAR: OnceLock<Regex> = OnceLock::new();
    static DAY_MONTH: OnceLock<Regex> = OnceLock::new();

    let full = FULL.get_or_init(|| {
        Regex::new(r"(?i)(?:ngày\s+)?\b([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{4})\b")
            .expect("full date regex")
    });
    let text = full.replace_all(text, |caps: &Captures| {
        let (day, month) = (caps[1].parse().unwrap_or(0), caps[2].parse().unwrap_or(0));
        if !valid_date(day, month) || after_decimal(text, caps.get(0).map_or(0, |m| m.start())) {
            return caps[0].to_string();
        }
        format!(
            "ngày {} tháng {} năm {}",
            read_number(day as u64),
            read_month(month),
            numeral(&caps[3])
        )
    });

    let month_year = MONTH_YEAR.get_or_init(|| {
        Regex::new(r"(?i)(?:tháng\s+)?\b([0-9]{1,2})/([0-9]{4})\b").expect("month year regex")
    });
    let text = month_year.replace_all(&text, |caps: &Captures| {
        let month = caps[1].parse().unwrap_or(0);
        if !(1..=12).contains(&month) || after_decimal(&text, caps.get(0).map_or(0, |m| m.start())) {
            return caps[0].to_string();
        }
        format!("tháng {} năm {}", read_month(month), numeral(&caps[2]))
    });

    let day_month = DAY_MONTH.get_or_init(|| {
        Regex::new(r"(?i)(?:ngày\s+)?\b([0-9]{1,2})/([0-9]{1,2})\b").expect("day month regex")
    });
    day_month
        .replace_all(&text, |caps: &Captures| {
            let (day, month) = (caps[1].parse().unwrap_or(0), caps[2].parse().unwrap_or(0));
            if !valid_date(day, month) || after_decimal(&text, caps.get(0).map_or(0, |m| m.start())) {
                return caps[0].to_string();
            }
            format!("ngày {} tháng {}", read_number(day as u64), read_month(month))
        })
        .into_owned()
}

fn read_clock(hour: &str, minute: &str, second: Option<&str>) -> Option<String> {
    let hour: u64 = hour.parse().ok()?;
    let minute: u64 = minute.parse().ok()?;
    let second = second.map(str::parse::<u64>).transpose().ok()?;
    if hour > 24 || minute > 59 || second.is_some_and(|s| s > 59) {
        return None;
    }
    let mut out = format!("{} giờ", read_number(hour));
    if minute > 0 || second.is_some() {
        out.push_str(&format!(" {} phút", read_number(minute)));
    }
    if let Some(second) = second {
        out.push_str(&format!(" {} giây", read_number(second)));
    }
    Some(out)
}

fn read_hour(hour: &str) -> Option<String> {
    match hour.parse::<u64>() {
        Ok(h) if h <= 24 => Some(format!("{} giờ", read_number(h))),
        _ => None,
    }
}

/// `hh:mm[:ss]`, `hhhmm`, `hhgmm` and `hhh` → `… giờ … phút`; `a-b` ranges
/// of either form read `đến`.
pub fn expand_times(text: &str) -> String {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    static HOUR: OnceLock<Regex> = OnceLock::new();

    let clock = CLOCK.get_or_init(|| {
        let time = r"([0-9]{1,2})(?::|h|g)([0-9]{2})(?::([0-9]{2}))?";
        Regex::new(&format!(r"\b{time}(?:\s*[-–]\s*{time})?\b")).expect("clock regex")
    });
    let text = clock.replace_all(text, |caps: &Captures| {
        let part = |first: usize| {
            let hour = caps.get(first)?.as_str();
            let minute = caps.get(first + 1)?.as_str();
            read_clock(hour, minute, caps.get(first + 2).map(|m| m.as_str()))
        };
        let Some(start) = part(1) else {
            return caps[0].to_string();
        };
        match (caps.get(4), part(4)) {
            (None, _) => start,
            (Some(_), Some(end)) => format!("{start} đến {end}"),
            (Some(_), None) => caps[0].to_string(),
        }
    });

    let hour = HOUR.get_or_init(|| {
        Regex::new(r"\b([0-9]{1,2})h(?:\s*[-–]\s*([0-9]{1,2})h)?\b").expect("hour regex")
    });
    hour.replace_all(&text, |caps: &Captures| {
        let Some(start) = read_hour(&caps[1]) else {
            return caps[0].to_string();
        };
        match caps.get(2).map(|m| read_hour(m.as_str())) {
            None => start,
            Some(Some(end)) => format!("{start} đến {end}"),
            Some(None) => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Amounts in đồng or dollars, and percentages. Signs and ranges are read.
pub fn expand_currency(text: &str) -> String {
    static DONG: OnceLock<Regex> = OnceLock::new();
    static DOLLAR_PREFIX: OnceLock<Regex> = OnceLock::new();
    static DOLLAR_SUFFIX: OnceLock<Regex> = OnceLock::new();
    static PERCENT: OnceLock<Regex> = OnceLock::new();

    let dong = DONG.get_or_init(|| {
        Regex::new(&format!(r"(?i)({AMOUNT})\s*(?:đồng|vnđ|vnd|đ)\b")).expect("dong regex")
    });
    let text = replace_amounts(dong, text, |amount, _| format!("{amount} đồng"));

    let prefix = DOLLAR_PREFIX
        .get_or_init(|| Regex::new(&format!(r"\$\s*({AMOUNT})")).expect("dollar prefix regex"));
    let text = replace_amounts(prefix, &text, |amount, _| format!("{amount} đô la"));

    let suffix = DOLLAR_SUFFIX.get_or_init(|| {
        Regex::new(&format!(r"({AMOUNT})\s*(?:\$|(?i:usd)\b)")).expect("dollar suffix regex")
    });
    let text = replace_amounts(suffix, &text, |amount, _| format!("{amount} đô la"));

    let percent =
        PERCENT.get_or_init(|| Regex::new(&format!(r"({AMOUNT})\s*%")).expect("percent regex"));
    replace_amounts(percent, &text, |amount, _| format!("{amount} phần trăm"))
}

/// Measurement units directly after a numeral, signed numeral or range.
pub fn expand_units(text: &str) -> String {
    static UNIT: OnceLock<Regex> = OnceLock::new();

    let unit = UNIT.get_or_init(|| {
        let symbols = UNITS
            .iter()
            .map(|(symbol, _)| regex::escape(symbol))
            .collect::<Vec<_>>()
            .join("|");
        // `m²` ends in a non-word char, so the boundary is matched explicitly.
        Regex::new(&format!(r"({AMOUNT})\s*({symbols})([^\p{{L}}\p{{N}}]|$)"))
            .expect("unit regex")
    });
    replace_amounts(unit, text, |amount, caps| {
        let name = UNITS
            .iter()
            .find(|(symbol, _)| *symbol == &caps[2])
            .map(|(_, name)| *name)
            .unwrap_or_default();
        format!("{amount} {name}{}", &caps[3])
    })
}

/// Phone-like numbers (leading zero, 9 to 11 digits) are read digit by digit.
pub fn expand_phone_numbers(text: &str) -> String {
    static PHONE: OnceLock<Regex> = OnceLock::new();

    let phone = PHONE.get_or_init(|| Regex::new(r"\b(0[0-9]{8,10})\b").expect("phone regex"));
    phone
        .replace_all(text, |caps: &Captures| read_digits(&caps[1]))
        .into_owned()
}

fn roman_value(numeral: &str) -> Option<u64> {
    let value = |c: char| match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };
    let digits = numeral.chars().map(value).collect::<Option<Vec<u64>>>()?;
    let mut total = 0;
    for (idx, digit) in digits.iter().enumerate() {
        match digits.get(idx + 1) {
            Some(next) if next > digit => total -= *digit as i64,
            _ => total += *digit as i64,
        }
    }
    u64::try_from(total).ok().filter(|v| (1..4000).contains(v))
}

/// Roman numerals after `thế kỷ`, `thứ`, `khóa`, `quý`, `lần`.
pub fn expand_roman_numerals(text: &str) -> String {
    static ROMAN: OnceLock<Regex> = OnceLock::new();

    let roman = ROMAN.get_or_init(|| {
        Regex::new(r"\b((?i:thế kỷ|thế kỉ|thứ|khóa|khoá|quý|lần))\s+([IVXLCDM]+)\b")
            .expect("roman regex")
    });
    roman
        .replace_all(text, |caps: &Captures| {
            let Some(value) = roman_value(&caps[2]) else {
                return caps[0].to_string();
            };
            let word = &caps[1];
            let reading = match value {
                1 if word.eq_ignore_ascii_case("thứ") => "nhất".to_string(),
                4 if word.eq_ignore_ascii_case("thứ") => "tư".to_string(),
                v => read_number(v),
            };
            format!("{word} {reading}")
        })
        .into_owned()
}

/// Ranges, negatives and every remaining numeral.
pub fn expand_numbers(text: &str) -> String {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    static NEGATIVE: OnceLock<Regex> = OnceLock::new();
    static PLAIN: OnceLock<Regex> = OnceLock::new();

    let range = RANGE.get_or_init(|| {
        Regex::new(&format!(r"({NUM})\s*[-–]\s*({NUM})")).expect("range regex")
    });
    let text = range.replace_all(text, |caps: &Captures| {
        format!("{} đến {}", numeral(&caps[1]), numeral(&caps[2]))
    });

    let negative = NEGATIVE.get_or_init(|| {
        Regex::new(&format!(r"(^|[\s(])-({NUM})")).expect("negative regex")
    });
    let text = negative.replace_all(&text, |caps: &Captures| {
        format!("{}âm {}", &caps[1], numeral(&caps[2]))
    });

    let plain = PLAIN.get_or_init(|| Regex::new(NUM).expect("numeral regex"));
    plain
        .replace_all(&text, |caps: &Captures| format!(" {} ", numeral(&caps[0])))
        .into_owned()
}

/// Spoken names for the symbols that carry meaning.
pub fn expand_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str(" và "),
            '%' => out.push_str(" phần trăm "),
            '+' => out.push_str(" cộng "),
            '=' => out.push_str(" bằng "),
            '@' => out.push_str(" a còng "),
            '°' => out.push_str(" độ "),
            c => out.push(c),
        }
    }
    out
}

/// Drop decoration, unify pause punctuation, collapse whitespace, lowercase.
pub fn clean_punctuation(text: &str) -> String {
    static ELLIPSIS: OnceLock<Regex> = OnceLock::new();
    static SPACE_BEFORE: OnceLock<Regex> = OnceLock::new();
    static REPEATED: OnceLock<Regex> = OnceLock::new();

    let ellipsis = ELLIPSIS.get_or_init(|| Regex::new(r"…|\.{2,}").expect("ellipsis regex"));
    let text = ellipsis.replace_all(text, ".");

    let mapped = text
        .chars()
        .map(|c| match c {
            ';' | ':' => ',',
            c if c.is_alphanumeric() || c.is_whitespace() => c,
            '.' | ',' | '!' | '?' => c,
            _ => ' ',
        })
        .collect::<String>();
    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");

    let space_before =
        SPACE_BEFORE.get_or_init(|| Regex::new(r"\s+([.,!?])").expect("space regex"));
    let text = space_before.replace_all(&collapsed, "$1");
    let repeated =
        REPEATED.get_or_init(|| Regex::new(r"([.,!?])[.,!?]+").expect("repeated regex"));
    let text = repeated.replace_all(&text, "$1");

    text.trim_start_matches(['.', ',', '!', '?', ' '])
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_keep_surrounding_punctuation() {
        assert_eq!(
            expand_abbreviations("Tại TP.HCM, UBND (THPT) họp v.v."),
            "Tại thành phố hồ chí minh, ủy ban nhân dân (trung học phổ thông) họp vân vân"
        );
        assert_eq!(
            expand_abbreviations("GS. Nguyễn đến TP.HCM."),
            "giáo sư Nguyễn đến thành phố hồ chí minh."
        );
    }

    #[test]
    fn dates_are_spoken() {
        assert_eq!(
            expand_dates("ngày 30/4/1975"),
            "ngày ba mươi tháng tư năm một nghìn chín trăm bảy mươi lăm"
        );
        assert_eq!(expand_dates("tháng 12/2024"), "tháng mười hai năm hai nghìn không trăm hai mươi bốn");
        assert_eq!(expand_dates("hôm 2/9"), "hôm ngày hai tháng chín");
        assert_eq!(expand_dates("tỉ lệ 45/13"), "tỉ lệ 45/13");
    }

    #[test]
    fn decimal_fraction_is_not_a_day() {
        assert_eq!(expand_dates("Điểm 8,5/10"), "Điểm 8,5/10");
    }

    #[test]
    fn times_are_spoken() {
        assert_eq!(expand_times("lúc 7:30"), "lúc bảy giờ ba mươi phút");
        assert_eq!(expand_times("lúc 10h15"), "lúc mười giờ mười lăm phút");
        assert_eq!(expand_times("8h sáng"), "tám giờ sáng");
        assert_eq!(expand_times("6g00"), "sáu giờ");
        assert_eq!(expand_times("99:99"), "99:99");
    }

    #[test]
    fn time_ranges_read_den() {
        assert_eq!(
            expand_times("Lúc 10:30-11:00"),
            "Lúc mười giờ ba mươi phút đến mười một giờ"
        );
        assert_eq!(expand_times("mở 8h - 17h"), "mở tám giờ đến mười bảy giờ");
        assert_eq!(expand_times("10:30-99:00"), "10:30-99:00");
    }

    #[test]
    fn currency_and_percent() {
        assert_eq!(expand_currency("giá 50.000đ"), "giá năm mươi nghìn đồng");
        assert_eq!(expand_currency("$20"), "hai mươi đô la");
        assert_eq!(expand_currency("15 USD"), "mười lăm đô la");
        assert_eq!(expand_currency("tăng 3,5%"), "tăng ba phẩy năm phần trăm");
        assert_eq!(expand_currency("đi chơi"), "đi chơi");
    }

    #[test]
    fn signed_and_ranged_amounts() {
        let cases = [
            ("giảm 10-20%", "giảm mười đến hai mươi phần trăm"),
            ("lỗ -5%", "lỗ âm năm phần trăm"),
            ("từ 100-200 đồng", "từ một trăm đến hai trăm đồng"),
            ("$5-10", "năm đến mười đô la"),
        ];
        for (input, expected) in cases {
            assert_eq!(expand_currency(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn units_follow_numbers() {
        assert_eq!(expand_units("dài 5km."), "dài năm ki lô mét.");
        assert_eq!(expand_units("60 km/h"), "sáu mươi ki lô mét trên giờ");
        assert_eq!(expand_units("100m² đất"), "một trăm mét vuông đất");
        assert_eq!(expand_units("30°C"), "ba mươi độ xê");
        assert_eq!(expand_units("5 mèo"), "5 mèo");
    }

    #[test]
    fn units_keep_sign_and_range() {
        let cases = [
            ("Nhiệt độ -5°C", "Nhiệt độ âm năm độ xê"),
            ("đi 5-10km", "đi năm đến mười ki lô mét"),
            ("từ -10 – -2°C", "từ âm mười đến âm hai độ xê"),
            ("mã A-5kg", "mã A- năm ki lô gam"),
        ];
        for (input, expected) in cases {
            assert_eq!(expand_units(input), expected, "input {input:?}");
        }
    }

    #[test]
    fn phone_numbers_are_read_digit_by_digit() {
        assert_eq!(
            expand_phone_numbers("gọi 0912345678"),
            "gọi không chín một hai ba bốn năm sáu bảy tám"
        );
    }

    #[test]
    fn roman_numerals_after_keywords() {
        assert_eq!(expand_roman_numerals("thế kỷ XXI"), "thế kỷ hai mươi mốt");
        assert_eq!(expand_roman_numerals("hạng thứ I"), "hạng thứ nhất");
        assert_eq!(expand_roman_numerals("quý IV"), "quý bốn");
        assert_eq!(expand_roman_numerals("Vitamin C"), "Vitamin C");
    }

    #[test]
    fn numbers_ranges_and_negatives() {
        assert_eq!(
            expand_numbers("từ 5-10 người").split_whitespace().collect::<Vec<_>>().join(" "),
            "từ năm đến mười người"
        );
        assert_eq!(
            expand_numbers("nhiệt độ -5").split_whitespace().collect::<Vec<_>>().join(" "),
            "nhiệt độ âm năm"
        );
        assert_eq!(
            expand_numbers("có 1.000.000 người").split_whitespace().collect::<Vec<_>>().join(" "),
            "có một triệu người"
        );
    }

    #[test]
    fn punctuation_is_cleaned() {
        assert_eq!(
            clean_punctuation("  \"Xin chào\"... (bạn) ; khỏe  không ?? "),
            "xin chào. bạn, khỏe không?"
        );
    }
}
