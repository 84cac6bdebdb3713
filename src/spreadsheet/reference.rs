//! Conversions between Excel-style cell references and column positions.

/// Last column of a worksheet ("XFD").
pub(crate) const MAX_COLUMN: usize = 16384;

/// Converts the column letters of a reference (e.g. "AB" in "AB12") to a 1-based
/// column number, reading base-26 with 'A' = 1.
///
/// Returns `None` when the reference does not start with a letter.
pub(crate) fn column_number(reference: &str) -> Option<usize> {
    let letters = reference
        .bytes()
        .take_while(|byte| byte.is_ascii_alphabetic())
        .map(|byte| byte.to_ascii_uppercase());
    let mut number = 0usize;
    let mut seen = false;
    for letter in letters {
        number = number.checked_mul(26)?.checked_add(usize::from(letter - b'A') + 1)?;
        seen = true;
    }
    seen.then_some(number)
}

/// Converts a 1-based column number back to its letters (1 = "A", 27 = "AA").
pub(crate) fn column_letters(number: usize) -> String {
    let mut column = number;
    let mut letters = String::new();
    while column > 0 {
        column -= 1;
        letters.insert(0, char::from(b'A' + (column % 26) as u8));
        column /= 26;
    }
    letters
}
