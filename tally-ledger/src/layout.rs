//! Fixed sheet geometry shared by every reason sheet.
//!
//! ```text
//! row 1 | No | H.No | Name | Meskerem |       | Tikimt |       | ... | Remark
//! row 2 |    |      |      | Amount   | FT No | Amount | FT No | ... |
//! row 3 | 1  | 101  | ...  | =500+700 | FT1, FT2                     <- houses
//! ...   |    | TOTAL|      | =SUM(D3:D9) | ...                       <- totals
//! ```

use tally_core::EthiopianMonth;

use crate::grid::Row;

pub const HEADER_ROWS: usize = 2;
pub const SEQ_COL: usize = 0;
pub const HOUSE_COL: usize = 1;
pub const NAME_COL: usize = 2;
const FIRST_MONTH_COL: usize = 3;
pub const REMARK_COL: usize = FIRST_MONTH_COL + 2 * EthiopianMonth::ALL.len();
pub const WIDTH: usize = REMARK_COL + 1;
pub const TOTAL_LABEL: &str = "TOTAL";

pub fn amount_col(month: EthiopianMonth) -> usize {
    FIRST_MONTH_COL + 2 * month.index()
}

pub fn reference_col(month: EthiopianMonth) -> usize {
    amount_col(month) + 1
}

/// Zero-based column to spreadsheet letters: 0 → `A`, 26 → `AA`.
pub fn column_letter(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn header_rows() -> [Row; 2] {
    let mut top = vec![String::new(); WIDTH];
    let mut sub = vec![String::new(); WIDTH];
    top[SEQ_COL] = "No".into();
    top[HOUSE_COL] = "H.No".into();
    top[NAME_COL] = "Name".into();
    top[REMARK_COL] = "Remark".into();
    for month in EthiopianMonth::ALL {
        top[amount_col(month)] = month.name().into();
        sub[amount_col(month)] = "Amount".into();
        sub[reference_col(month)] = "FT No".into();
    }
    [top, sub]
}

/// True when the first row carries our column titles.
pub fn has_expected_header(rows: &[Row]) -> bool {
    let Some(top) = rows.first() else {
        return false;
    };
    let cell = |col: usize| top.get(col).map(|c| c.trim()).unwrap_or("");
    cell(SEQ_COL) == "No"
        && cell(HOUSE_COL) == "H.No"
        && EthiopianMonth::ALL
            .iter()
            .all(|m| cell(amount_col(*m)).eq_ignore_ascii_case(m.name()))
}

pub fn is_total_row(row: &[String]) -> bool {
    row.iter()
        .take(NAME_COL + 1)
        .any(|c| c.trim().eq_ignore_ascii_case(TOTAL_LABEL))
}

pub fn house_row(seq: usize, house: &str, occupant: &str) -> Row {
    let mut row = vec![String::new(); WIDTH];
    row[SEQ_COL] = seq.to_string();
    row[HOUSE_COL] = house.to_string();
    row[NAME_COL] = occupant.to_string();
    row
}

/// Per-month `=SUM(..)` over sheet rows 3..=`last_data_row` (1-based).
pub fn total_row(last_data_row: usize) -> Row {
    let first = HEADER_ROWS + 1;
    let last = last_data_row.max(first);
    let mut row = vec![String::new(); WIDTH];
    row[HOUSE_COL] = TOTAL_LABEL.into();
    for month in EthiopianMonth::ALL {
        let letter = column_letter(amount_col(month));
        row[amount_col(month)] = format!("=SUM({letter}{first}:{letter}{last})");
    }
    row
}
