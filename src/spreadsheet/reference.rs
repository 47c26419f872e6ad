//! Conversions between A1-style cell references and 0-based (row, col) indexes.

/// Rows in an Excel worksheet.
pub(crate) const MAX_ROWS: usize = 1_048_576;

/// Columns in an Excel worksheet, `A` through `XFD`.
pub(crate) const MAX_COLUMNS: usize = 16_384;

/// Parses column letters (`A`, `Z`, `AA`, ...) into a 0-based column index.
/// Columns past `XFD` are rejected.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters
        .chars()
        .try_fold(0usize, |index, letter| {
            let letter = letter.to_ascii_uppercase();
            if letter.is_ascii_uppercase() {
                index.checked_mul(26)?.checked_add(letter as usize - 'A' as usize + 1)
            } else {
                None
            }
        })
        .filter(|index| *index <= MAX_COLUMNS)
        .map(|index| index - 1)
}

/// Parses a 1-based row number into a 0-based row index. Rows past
/// [`MAX_ROWS`] are rejected.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| (1..=MAX_ROWS).contains(row))
        .map(|row| row - 1)
}

/// Parses a cell reference such as `C7` or `$C$7` into `(row, col)`.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    Some((row_to_index(digits)?, col_to_index(letters)?))
}

/// Formats `(row, col)` as an A1-style reference.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut letters = Vec::new();
    let mut col = col + 1;
    while col > 0 {
        col -= 1;
        letters.push((b'A' + (col % 26) as u8) as char);
        col /= 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_columns() {
        assert_eq!(col_to_index("A"), Some(0));
        assert_eq!(col_to_index("z"), Some(25));
        assert_eq!(col_to_index("AA"), Some(26));
        assert_eq!(col_to_index("XFD"), Some(16383));
        assert_eq!(col_to_index("XFE"), None);
        assert_eq!(col_to_index("AAAA"), None);
        assert_eq!(col_to_index(""), None);
        assert_eq!(col_to_index("A1"), None);
    }

    #[test]
    fn parses_references() {
        assert_eq!(reference_to_index("A1"), Some((0, 0)));
        assert_eq!(reference_to_index("$C$7"), Some((6, 2)));
        assert_eq!(reference_to_index("AB12"), Some((11, 27)));
        assert_eq!(reference_to_index("12"), None);
        assert_eq!(reference_to_index("B0"), None);
        assert_eq!(reference_to_index("B"), None);
    }

    #[test]
    fn rejects_references_beyond_the_grid() {
        assert_eq!(reference_to_index("XFD1048576"), Some((1_048_575, 16_383)));
        assert_eq!(reference_to_index("A1048577"), None);
        assert_eq!(reference_to_index("XFE1"), None);
        assert_eq!(row_to_index("18446744073709551615"), None);
        assert_eq!(row_to_index("99999999999999999999999"), None);
    }

    #[test]
    fn formats_references() {
        assert_eq!(index_to_reference(0, 0), "A1");
        assert_eq!(index_to_reference(9, 25), "Z10");
        assert_eq!(index_to_reference(0, 26), "AA1");
        assert_eq!(index_to_reference(99, 701), "ZZ100");
        assert_eq!(index_to_reference(0, 702), "AAA1");
    }
}
