//! Reading numerals as Vietnamese words.

const DIGITS: [&str; 10] = [
    "không", "một", "hai", "ba", "bốn", "năm", "sáu", "bảy", "tám", "chín",
];
const BILLION: u64 = 1_000_000_000;

/// Read a non-negative integer, e.g. `2024` → `hai nghìn không trăm hai mươi bốn`.
pub fn read_number(n: u64) -> String {
    if n == 0 {
        return DIGITS[0].to_string();
    }
    let mut words = Vec::new();
    push_number(n, false, &mut words);
    words.join(" ")
}

/// Read each digit separately (phone numbers, leading zeros).
pub fn read_digits(digits: &str) -> String {
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| DIGITS[d as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Month names use `tư` for April instead of `bốn`.
pub fn read_month(month: u32) -> String {
    if month == 4 {
        "tư".to_string()
    } else {
        read_number(month as u64)
    }
}

/// Read a written numeral using Vietnamese conventions.
///
/// `.` groups thousands (`1.000.000`) and `,` separates decimals (`3,5`). A dot
/// that does not form three-digit groups is read as a decimal point. Returns
/// `None` if the token is not a numeral or overflows.
pub fn read_numeral(token: &str) -> Option<String> {
    let (negative, body) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if body.is_empty() || !body.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let (integer, fraction) = split_numeral(body)?;
    let mut words = Vec::new();
    if negative {
        words.push("âm".to_string());
    }
    if integer.len() > 1 && integer.starts_with('0') && fraction.is_none() {
        words.push(read_digits(&integer));
    } else {
        words.push(read_number(integer.parse().ok()?));
    }
    if let Some(fraction) = fraction {
        words.push("phẩy".to_string());
        words.push(read_fraction(fraction));
    }
    Some(words.join(" "))
}

fn split_numeral(body: &str) -> Option<(String, Option<&str>)> {
    if !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    let (int_part, fraction) = match body.split_once(',') {
        Some((int_part, fraction)) => (int_part, Some(fraction)),
        None => (body, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    if !int_part.contains('.') {
        return Some((int_part.to_string(), fraction));
    }
    let groups = int_part.split('.').collect::<Vec<_>>();
    let thousands = groups[0].len() <= 3
        && !groups[0].is_empty()
        && groups[1..].iter().all(|group| group.len() == 3);
    if thousands {
        return Some((groups.concat(), fraction));
    }
    // `1.5` style decimal point
    match (groups.as_slice(), fraction) {
        ([whole, frac], None) if !whole.is_empty() && !frac.is_empty() => {
            Some((whole.to_string(), Some(*frac)))
        }
        _ => None,
    }
}

fn read_fraction(fraction: &str) -> String {
    if fraction.starts_with('0') || fraction.len() > 3 {
        read_digits(fraction)
    } else {
        fraction
            .parse()
            .map(read_number)
            .unwrap_or_else(|_| read_digits(fraction))
    }
}

fn push_number(n: u64, full: bool, words: &mut Vec<String>) {
    if n >= BILLION {
        push_number(n / BILLION, full, words);
        words.push("tỷ".to_string());
        let rest = n % BILLION;
        if rest > 0 {
            push_below_billion(rest, true, words);
        }
        return;
    }
    push_below_billion(n, full, words);
}

fn push_below_billion(n: u64, full: bool, words: &mut Vec<String>) {
    let groups = [
        ((n / 1_000_000) % 1000, "triệu"),
        ((n / 1000) % 1000, "nghìn"),
        (n % 1000, ""),
    ];
    let mut started = full;
    for (group, scale) in groups {
        if group == 0 {
            continue;
        }
        push_triple(group as usize, started, words);
        if !scale.is_empty() {
            words.push(scale.to_string());
        }
        started = true;
    }
}

/// Read a three-digit group. `full` forces the hundreds digit (`không trăm`)
/// when the group follows a larger one.
fn push_triple(n: usize, full: bool, words: &mut Vec<String>) {
    let (hundreds, tens, units) = (n / 100, (n / 10) % 10, n % 10);
    let with_hundreds = full || hundreds > 0;
    if with_hundreds {
        words.push(DIGITS[hundreds].to_string());
        words.push("trăm".to_string());
    }
    let unit = match (tens, units) {
        (_, 0) => None,
        (0, u) => {
            if with_hundreds {
                words.push("linh".to_string());
            }
            Some(DIGITS[u])
        }
        (_, 5) => Some("lăm"),
        (2.., 1) => Some("mốt"),
        (_, u) => Some(DIGITS[u]),
    };
    match tens {
        0 => {}
        1 => words.push("mười".to_string()),
        t => {
            words.push(DIGITS[t].to_string());
            words.push("mươi".to_string());
        }
    }
    if let Some(unit) = unit {
        words.push(unit.to_string());
    }
}

/// Like [`read_numeral`], but never gives up: tokens it cannot read as one
/// number (`1.2.3`, `1,2,3`, more digits than fit in `u64`) are read group by
/// group, with `chấm` for `.` and `phẩy` for `,`.
pub fn read_numeral_or_digits(token: &str) -> String {
    if let Some(words) = read_numeral(token) {
        return words;
    }
    let mut words = Vec::new();
    let mut group = String::new();
    let flush = |group: &mut String, words: &mut Vec<String>| {
        if !group.is_empty() {
            words.push(read_numeral(group).unwrap_or_else(|| read_digits(group)));
            group.clear();
        }
    };
    for (idx, c) in token.char_indices() {
        match c {
            '-' if idx == 0 => words.push("âm".to_string()),
            '.' | ',' => {
                flush(&mut group, &mut words);
                words.push(if c == '.' { "chấm" } else { "phẩy" }.to_string());
            }
            c if c.is_ascii_digit() => group.push(c),
            _ => {}
        }
    }
    flush(&mut group, &mut words);
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_small_numbers() {
        let cases = [
            (0, "không"),
            (5, "năm"),
            (10, "mười"),
            (11, "mười một"),
            (15, "mười lăm"),
            (20, "hai mươi"),
            (21, "hai mươi mốt"),
            (24, "hai mươi bốn"),
            (55, "năm mươi lăm"),
            (100, "một trăm"),
            (105, "một trăm linh năm"),
            (115, "một trăm mười lăm"),
            (999, "chín trăm chín mươi chín"),
        ];
        for (n, expected) in cases {
            assert_eq!(read_number(n), expected, "reading {n}");
        }
    }

    #[test]
    fn reads_scaled_numbers() {
        assert_eq!(read_number(1005), "một nghìn không trăm linh năm");
        assert_eq!(read_number(2024), "hai nghìn không trăm hai mươi bốn");
        assert_eq!(read_number(10_000), "mười nghìn");
        assert_eq!(read_number(1_000_000), "một triệu");
        assert_eq!(read_number(1_500_000), "một triệu năm trăm nghìn");
        assert_eq!(read_number(3_000_000_000), "ba tỷ");
        assert_eq!(
            read_number(1_000_000_021),
            "một tỷ không trăm hai mươi mốt"
        );
        assert_eq!(read_number(2_000_000_000_000), "hai nghìn tỷ");
    }

    #[test]
    fn reads_written_numerals() {
        assert_eq!(read_numeral("1.000.000").as_deref(), Some("một triệu"));
        assert_eq!(read_numeral("3,5").as_deref(), Some("ba phẩy năm"));
        assert_eq!(read_numeral("3,05").as_deref(), Some("ba phẩy không năm"));
        assert_eq!(read_numeral("1.5").as_deref(), Some("một phẩy năm"));
        assert_eq!(read_numeral("-7").as_deref(), Some("âm bảy"));
        assert_eq!(read_numeral("007").as_deref(), Some("không không bảy"));
        assert_eq!(read_numeral("12.34.5"), None);
        assert_eq!(read_numeral("abc"), None);
    }

    #[test]
    fn unreadable_numerals_fall_back_to_groups() {
        assert_eq!(read_numeral_or_digits("1.2.3"), "một chấm hai chấm ba");
        assert_eq!(read_numeral_or_digits("1,2,3"), "một phẩy hai phẩy ba");
        assert_eq!(
            read_numeral_or_digits("123456789012345678901234"),
            read_digits("123456789012345678901234")
        );
        assert_eq!(read_numeral_or_digits("2024"), "hai nghìn không trăm hai mươi bốn");
    }

    #[test]
    fn april_is_tu() {
        assert_eq!(read_month(4), "tư");
        assert_eq!(read_month(12), "mười hai");
    }

    #[test]
    fn digits_are_read_one_by_one() {
        assert_eq!(read_digits("0912"), "không chín một hai");
    }
}
