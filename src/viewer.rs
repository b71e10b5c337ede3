#![forbid(unsafe_code)]

use crate::model::{RECORD_SIZE, ViewKind, Viewer};

const CTRL_Z: u8 = 0x1A;
const DUMP_WIDTH: usize = 16;
const TAB_STOP: usize = 8;

fn printable(byte: u8) -> char {
    if (0x20..0x7F).contains(&byte) { char::from(byte) } else { '.' }
}

/// Text up to the first `^Z`, one string per line.
pub fn text_lines(records: &[[u8; RECORD_SIZE]]) -> Vec<String> {
    let bytes = records.iter().flatten().copied().take_while(|b| *b != CTRL_Z);
    let mut lines = Vec::new();
    let mut line = String::new();
    for byte in bytes {
        match byte {
            b'\n' => lines.push(std::mem::take(&mut line)),
            b'\r' => {}
            b'\t' => line.extend(std::iter::repeat_n(' ', TAB_STOP - line.len() % TAB_STOP)),
            _ => line.push(printable(byte)),
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Sixteen bytes a line: address, hex bytes and the printable column.
pub fn hex_lines(records: &[[u8; RECORD_SIZE]]) -> Vec<String> {
    let bytes: Vec<u8> = records.iter().flatten().copied().collect();
    bytes
        .chunks(DUMP_WIDTH)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("{:04X}  ", i * DUMP_WIDTH);
            for byte in chunk {
                line.push_str(&format!("{byte:02X} "));
            }
            for _ in chunk.len()..DUMP_WIDTH {
                line.push_str("   ");
            }
            line.push_str(" |");
            line.extend(chunk.iter().map(|b| printable(*b)));
            line.push('|');
            line
        })
        .collect()
}

impl Viewer {
    pub fn open(kind: ViewKind, name: &str, records: &[[u8; RECORD_SIZE]]) -> Self {
        let lines = match kind {
            ViewKind::Text => text_lines(records),
            ViewKind::Dump => hex_lines(records),
        };
        Self { kind, name: name.to_string(), lines, top: 0, at_end: false }
    }

    pub fn page(&self, rows: usize) -> &[String] {
        let start = self.top.min(self.lines.len());
        let end = (start + rows).min(self.lines.len());
        &self.lines[start..end]
    }

    pub fn is_last_page(&self, rows: usize) -> bool {
        self.top + rows >= self.lines.len()
    }

    /// Moves to the next page; returns false when there was none.
    pub fn advance(&mut self, rows: usize) -> bool {
        if self.is_last_page(rows) {
            return false;
        }
        self.top += rows.max(1);
        true
    }

    pub fn footer(&self) -> String {
        format!("{}: {} (<SPACE>: more | <ESC>: exit)", self.kind.label(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::to_records;

    #[test]
    fn text_stops_at_ctrl_z_and_drops_cr() {
        let lines = text_lines(&to_records(b"first\r\nsec\x01nd\r\nthird"));
        assert_eq!(lines, ["first", "sec.nd", "third"]);
    }

    #[test]
    fn tabs_expand_to_the_next_eighth_column() {
        let lines = text_lines(&to_records(b"\tA\r\nLABEL:\tMVI\tA,0\r\n"));
        assert_eq!(lines, ["        A", "LABEL:  MVI     A,0"]);
    }

    #[test]
    fn dump_lines_carry_address_hex_and_ascii() {
        let lines = hex_lines(&to_records(b"AB"));
        assert_eq!(lines.len(), 8);
        assert!(lines[0].starts_with("0000  41 42 1A 1A "));
        assert!(lines[0].ends_with("|AB..............|"));
        assert!(lines[1].starts_with("0010  "));
    }

    #[test]
    fn paging_walks_to_the_end() {
        let text: Vec<u8> = (0..10).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        let mut viewer = Viewer::open(ViewKind::Text, "T.TXT", &to_records(&text));
        assert_eq!(viewer.page(4).len(), 4);
        assert!(viewer.advance(4));
        assert!(viewer.advance(4));
        assert_eq!(viewer.page(4), ["line 8", "line 9"]);
        assert!(!viewer.advance(4));
        assert_eq!(viewer.footer(), "VIEW: T.TXT (<SPACE>: more | <ESC>: exit)");
    }
}
