//! Value normalization for the row transformer: dates, sex codes, program
//! codes and the role implied by a section label.
use crate::model::RoleKind;
use crate::model::RoleStatus;
use chrono::Datelike;
use chrono::Days;
use chrono::Months;
use chrono::NaiveDate;
use chrono::TimeDelta;
use regex::Regex;
use std::sync::LazyLock;

/// Textual date layouts, tried in order after the serial-day interpretation.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
];

/// Accepted year range for serial-day and bare-year dates.
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

/// Canonical sex codes.
pub const SEX_MALE: &str = "M";
pub const SEX_FEMALE: &str = "F";

/// Length of a synthesized previous-role participation.
const PREVIOUS_ROLE_DAYS: u64 = 180;

/// Day zero of spreadsheet serial dates (1900 date system).
fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal")
}

/// Parses a spreadsheet date cell.
///
/// Tried in order: a serial day count (kept only if it lands in 1900..=2100),
/// the textual layouts of [`DATE_FORMATS`], then a bare four-digit year, read
/// as 1 January. A number such as "1925" is therefore taken as serial day 1925.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(date) = parse_serial_date(value) {
        return Some(date);
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    if value.len() == 4 && value.bytes().all(|byte| byte.is_ascii_digit()) {
        let year = value.parse::<i32>().ok()?;
        if (MIN_YEAR..=MAX_YEAR).contains(&year) {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }

    None
}

fn parse_serial_date(value: &str) -> Option<NaiveDate> {
    let days = value.parse::<f64>().ok()?;
    if !days.is_finite() || days <= 0.0 {
        return None;
    }
    let delta = TimeDelta::try_days(days.floor() as i64)?;
    let date = serial_epoch().checked_add_signed(delta)?;
    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

/// Maps the usual spellings to [`SEX_MALE`] / [`SEX_FEMALE`]; anything else
/// becomes its first character in upper case.
pub fn normalize_sex(value: &str) -> Option<String> {
    let value = value.trim();
    match value.to_lowercase().as_str() {
        "" => None,
        "m" | "male" | "man" => Some(SEX_MALE.to_owned()),
        "f" | "female" | "woman" => Some(SEX_FEMALE.to_owned()),
        _ => value.chars().next().map(|first| first.to_uppercase().collect()),
    }
}

static BOOK_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Book\s+(\d+)\s*\(?\s*U(\d+)\)?").expect("Hardcode regex pattern"));
static BOOK_BRANCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Book\s+(\d+)\s*\(?\s*BR(\d+)\)?").expect("Hardcode regex pattern"));
static BOOK_GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Book\s+3\s*\(?\s*G(\d+)\)?").expect("Hardcode regex pattern"));
static BOOK_GRADE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Book\s+3\s+Grade\s+(\d+)").expect("Hardcode regex pattern"));
static BOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Book\s+(\d+)$").expect("Hardcode regex pattern"));

/// Rewrites spreadsheet spellings of program codes to the catalog form.
///
/// "Book 1" becomes "Book1", "Book 10\n(U1)" becomes "Book10_U1", "Book 5 (BR1)"
/// becomes "Book5_BR1" and "Book 3 (G2)" or "Book 3 Grade 2" become "Book3_G2".
/// Codes that match none of these ("G1", "BC") come back trimmed but otherwise unchanged.
pub fn normalize_program_code(code: &str) -> String {
    let code = code.replace(['\n', '\r'], " ");
    let code = code.trim();

    if let Some(captures) = BOOK_UNIT.captures(code) {
        return format!("Book{}_U{}", &captures[1], &captures[2]);
    }
    if let Some(captures) = BOOK_BRANCH.captures(code) {
        return format!("Book{}_BR{}", &captures[1], &captures[2]);
    }
    if let Some(captures) = BOOK_GRADE.captures(code) {
        return format!("Book3_G{}", &captures[1]);
    }
    if let Some(captures) = BOOK_GRADE_WORD.captures(code) {
        return format!("Book3_G{}", &captures[1]);
    }
    if let Some(captures) = BOOK.captures(code) {
        return format!("Book{}", &captures[1]);
    }
    code.to_owned()
}

/// Derives role kind and status from a section label.
///
/// Tutoring or teaching wins over coordinating, which wins over serving;
/// everything else is participation. The status is current unless the label
/// speaks of a previous role without also saying current.
pub fn classify_section(section: &str) -> (RoleKind, RoleStatus) {
    let label = section.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| label.contains(keyword));

    let kind = if mentions(&["tutor", "tutoring", "teaching", "teacher"]) {
        RoleKind::Tutor
    } else if mentions(&["coordinating", "coordinator"]) {
        RoleKind::Coordinator
    } else {
        // serving counts as participation
        RoleKind::Participant
    };

    let status = if mentions(&["currently", "current"]) {
        RoleStatus::Current
    } else if mentions(&["previously", "previous"]) {
        RoleStatus::Previous
    } else {
        RoleStatus::Current
    };

    (kind, status)
}

/// Start date used when a role cell holds no date: one year back for current
/// roles, two for previous ones. 29 February falls back to 28 February.
pub fn synthetic_start_date(status: RoleStatus, today: NaiveDate) -> Option<NaiveDate> {
    let months = match status {
        RoleStatus::Current => 12,
        RoleStatus::Previous => 24,
    };
    today.checked_sub_months(Months::new(months))
}

/// End date of a previous role: 180 days after the start, no later than
/// `today`, and always at least one day after the start.
pub fn synthetic_end_date(start_date: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
    let mut end_date = start_date.checked_add_days(Days::new(PREVIOUS_ROLE_DAYS))?;
    if end_date > today {
        end_date = today;
    }
    if end_date <= start_date {
        end_date = start_date.checked_add_days(Days::new(1))?;
    }
    Some(end_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn serial_day_dates() {
        assert_eq!(parse_date("25569"), Some(date(1970, 1, 1)));
        assert_eq!(parse_date("25569.75"), Some(date(1970, 1, 1)));
        assert_eq!(parse_date("2"), Some(date(1900, 1, 1)));
        assert_eq!(parse_date("1"), None);
        assert_eq!(parse_date("0"), None);
        assert_eq!(parse_date("-5"), None);
        assert_eq!(parse_date("99999999"), None);
        assert_eq!(parse_date("1e300"), None);
        assert_eq!(parse_date("NaN"), None);
    }

    #[test]
    fn four_digit_numbers_are_serial_days_first() {
        assert_eq!(parse_date("1925"), Some(date(1905, 4, 8)));
    }

    #[test]
    fn text_dates_in_priority_order() {
        assert_eq!(parse_date("1984-07-02"), Some(date(1984, 7, 2)));
        assert_eq!(parse_date("07/02/1984"), Some(date(1984, 7, 2)));
        assert_eq!(parse_date("25/12/1984"), Some(date(1984, 12, 25)));
        assert_eq!(parse_date("1984/07/02"), Some(date(1984, 7, 2)));
        assert_eq!(parse_date("7-2-1984"), Some(date(1984, 7, 2)));
        assert_eq!(parse_date("25-12-1984"), Some(date(1984, 12, 25)));
        assert_eq!(parse_date(" 1984-07-02 "), Some(date(1984, 7, 2)));
    }

    #[test]
    fn unparsable_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("x"), None);
        assert_eq!(parse_date("yes"), None);
        assert_eq!(parse_date("31/31/1984"), None);
    }

    #[test]
    fn sex_codes() {
        assert_eq!(normalize_sex("Female").as_deref(), Some("F"));
        assert_eq!(normalize_sex("WOMAN").as_deref(), Some("F"));
        assert_eq!(normalize_sex("m").as_deref(), Some("M"));
        assert_eq!(normalize_sex(" Male ").as_deref(), Some("M"));
        assert_eq!(normalize_sex("man").as_deref(), Some("M"));
        assert_eq!(normalize_sex("x").as_deref(), Some("X"));
        assert_eq!(normalize_sex("other").as_deref(), Some("O"));
        assert_eq!(normalize_sex(""), None);
        assert_eq!(normalize_sex("  "), None);
    }

    #[test]
    fn program_codes() {
        assert_eq!(normalize_program_code("Book 10\n(U1)"), "Book10_U1");
        assert_eq!(normalize_program_code("Book 8 U2"), "Book8_U2");
        assert_eq!(normalize_program_code("Book 5 (BR1)"), "Book5_BR1");
        assert_eq!(normalize_program_code("Book 3\r\n(G2)"), "Book3_G2");
        assert_eq!(normalize_program_code("Book 3\nGrade 4"), "Book3_G4");
        assert_eq!(normalize_program_code("book 1"), "Book1");
        assert_eq!(normalize_program_code(" Book 14 "), "Book14");
        assert_eq!(normalize_program_code("G1"), "G1");
        assert_eq!(normalize_program_code("BC"), "BC");
        assert_eq!(normalize_program_code("Book1"), "Book1");
        assert_eq!(normalize_program_code("Book 2 extra"), "Book 2 extra");
    }

    #[test]
    fn section_labels() {
        assert_eq!(
            classify_section("Currently teaching a children's class"),
            (RoleKind::Tutor, RoleStatus::Current)
        );
        assert_eq!(
            classify_section("Previously tutored a study circle"),
            (RoleKind::Tutor, RoleStatus::Previous)
        );
        assert_eq!(
            classify_section("Previously coordinating"),
            (RoleKind::Coordinator, RoleStatus::Previous)
        );
        assert_eq!(
            classify_section("Serving as animator"),
            (RoleKind::Participant, RoleStatus::Current)
        );
        assert_eq!(
            classify_section("Participated in a study circle"),
            (RoleKind::Participant, RoleStatus::Current)
        );
        assert_eq!(
            classify_section("Currently or previously coordinating"),
            (RoleKind::Coordinator, RoleStatus::Current)
        );
    }

    #[test]
    fn synthetic_start_dates() {
        let today = date(2026, 10, 18);
        assert_eq!(synthetic_start_date(RoleStatus::Current, today), Some(date(2025, 10, 18)));
        assert_eq!(synthetic_start_date(RoleStatus::Previous, today), Some(date(2024, 10, 18)));
        assert_eq!(synthetic_start_date(RoleStatus::Current, date(2024, 2, 29)), Some(date(2023, 2, 28)));
    }

    #[test]
    fn synthetic_end_dates() {
        let today = date(2026, 10, 18);
        assert_eq!(synthetic_end_date(date(2020, 1, 1), today), Some(date(2020, 6, 29)));
        assert_eq!(synthetic_end_date(date(2026, 9, 1), today), Some(today));
        assert_eq!(synthetic_end_date(today, today), Some(date(2026, 10, 19)));
        assert_eq!(synthetic_end_date(date(2030, 1, 1), today), Some(date(2030, 1, 2)));
    }
}
