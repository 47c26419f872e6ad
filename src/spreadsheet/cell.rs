use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::fmt::Display;

/// How the raw text of a `<c>` element must be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `t="b"`, stored as `0`/`1`
    Boolean,
    /// Plain numeric value
    Number,
    /// Date/time serial from the 1900 epoch
    NumberDateTime1900,
    /// Date serial from the 1900 epoch
    NumberDate1900,
    /// Time-of-day fraction, 1900 epoch
    NumberTime1900,
    /// Date/time serial from the 1904 epoch
    NumberDateTime1904,
    /// Date serial from the 1904 epoch
    NumberDate1904,
    /// Time-of-day fraction, 1904 epoch
    NumberTime1904,
    /// `t="d"`, ISO 8601 text
    IsoDateTime,
    /// `t="inlineStr"` or `t="str"` (formula string result)
    InlineString,
    /// `t="s"`, index into the shared string table
    SharedString,
    /// `t="e"`, error literal such as `#N/A`
    Error,
}

impl CellType {
    /// Maps the `t` attribute of a cell to its type.
    pub(crate) fn from_type_attribute(value: Option<&str>) -> Self {
        match value {
            Some("inlineStr") | Some("str") => Self::InlineString,
            Some("s") => Self::SharedString,
            Some("d") => Self::IsoDateTime,
            Some("b") => Self::Boolean,
            Some("e") => Self::Error,
            _ => Self::Number,
        }
    }

    /// Built-in number format ids that denote dates and times.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(Self::date_time(is_1904)),
            "14" | "15" | "16" | "17" => Some(Self::date(is_1904)),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::time(is_1904)),
            _ => None,
        }
    }

    /// Classifies a custom format code by the date/time tokens outside of
    /// quoted literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' | '*' if !is_literal => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::date_time(is_1904),
            (true, false) => Self::date(is_1904),
            (false, true) => Self::time(is_1904),
            (false, false) => Self::Number,
        }
    }

    fn date_time(is_1904: bool) -> Self {
        if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }
    }

    fn date(is_1904: bool) -> Self {
        if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }
    }

    fn time(is_1904: bool) -> Self {
        if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }
    }
}

/// A cell as found in the worksheet part, before interpretation.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    /// Raw text of `<v>` or `<is>`
    pub(crate) value: String,
}

impl Cell {
    /// Interprets the raw text according to the cell type. Shared string
    /// cells are resolved against `shared_strings`; an out-of-range index
    /// yields `None`.
    pub(crate) fn to_value(&self, shared_strings: &[String]) -> Option<CellValue> {
        let value = match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(self.value.trim() == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::InlineString => CellValue::Text(self.value.to_owned()),
            CellType::SharedString => {
                let index = self.value.trim().parse::<usize>().ok()?;
                CellValue::Text(shared_strings.get(index)?.to_owned())
            }
            CellType::Error => CellValue::Error(self.value.to_owned()),
            CellType::IsoDateTime => parse_iso_value(&self.value),
            CellType::Number => self.number_or_text(),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => self
                .serial(|datetime| CellValue::DateTime(datetime))
                .unwrap_or_else(|| self.number_or_text()),
            CellType::NumberDate1900 | CellType::NumberDate1904 => self
                .serial(|datetime| CellValue::Date(datetime.date()))
                .unwrap_or_else(|| self.number_or_text()),
            CellType::NumberTime1900 | CellType::NumberTime1904 => self
                .serial(|datetime| CellValue::Time(datetime.time()))
                .unwrap_or_else(|| self.number_or_text()),
        };
        Some(value)
    }

    fn is_1904(&self) -> bool {
        matches!(
            self.kind,
            CellType::NumberDateTime1904 | CellType::NumberDate1904 | CellType::NumberTime1904
        )
    }

    fn serial<F>(&self, f: F) -> Option<CellValue>
    where
        F: FnOnce(NaiveDateTime) -> CellValue,
    {
        let serial = self.value.trim().parse::<f64>().ok()?;
        serial_to_datetime(serial, self.is_1904()).map(f)
    }

    fn number_or_text(&self) -> CellValue {
        match self.value.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => CellValue::Number(number),
            _ => CellValue::Text(self.value.to_owned()),
        }
    }
}

/// A decoded cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Excel error literal, e.g. `#DIV/0!`
    Error(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl Display for CellValue {
    /// Text form stored in the target table. Integral numbers print without a
    /// fractional part (`3`, not `3.0`).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(value) | CellValue::Error(value) => f.write_str(value),
            CellValue::Number(value) => write!(f, "{}", value),
            CellValue::Boolean(value) => write!(f, "{}", value),
            CellValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            CellValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Time(value) => write!(f, "{}", value.format("%H:%M:%S")),
        }
    }
}

/// Converts a spreadsheet serial number to a date-time, rounded to the second.
///
/// In the 1900 system serial 1 is 1900-01-01 and serial 60 is the fictitious
/// 1900-02-29 kept for Lotus 1-2-3 compatibility, so serials from 61 on are
/// shifted back by one day.
pub(crate) fn serial_to_datetime(serial: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = if is_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let seconds = (serial * 86_400f64).round() as i64;
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::try_seconds(seconds)?)
}

fn parse_iso_value(value: &str) -> CellValue {
    if let Ok(datetime) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        CellValue::DateTime(datetime)
    } else if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        CellValue::Date(date)
    } else if let Ok(time) = NaiveTime::parse_from_str(value, "%H:%M:%S%.f") {
        CellValue::Time(time)
    } else {
        CellValue::Text(value.to_owned())
    }
}
