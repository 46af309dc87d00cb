//! NDJSON (newline-delimited JSON) stream sink.
//!
//! Each row is serialized straight into a buffered writer.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_offers(&offer_rows)?;
//! sink.write_holdings(&holding_rows)?;
//! sink.finish()?;
//! ```

use super::{HoldingRow, OfferRow};
use serde::Serialize;
use std::io::{self, BufWriter, Write};

pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Wraps any writer (file, `Vec<u8>`, etc.).
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(64 * 1024, writer),
            rows_written: 0,
        }
    }

    pub fn write_offers(&mut self, rows: &[OfferRow]) -> io::Result<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    pub fn write_holdings(&mut self, rows: &[HoldingRow]) -> io::Result<()> {
        rows.iter().try_for_each(|row| self.write_row(row))
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_json_object_per_line() {
        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);

        let offers = vec![OfferRow {
            offer_id: "o1".into(),
            label: Some("Gold sale".into()),
            owner: Some("02aa".into()),
            source: "h1".into(),
            source_asset: Some("gold".into()),
            source_quantity: 5,
            target: None,
            target_asset: None,
            target_quantity: 0,
            open: true,
            rules: vec!["EXCHANGE_ONCE".into()],
        }];
        let holdings = vec![HoldingRow {
            account: "02aa".into(),
            account_label: None,
            holding_id: "h1".into(),
            asset: "gold".into(),
            quantity: 12,
            label: Some("vault".into()),
        }];

        sink.write_offers(&offers).unwrap();
        sink.write_holdings(&holdings).unwrap();
        assert_eq!(sink.rows_written(), 2);
        let n = sink.finish().unwrap();
        assert_eq!(n, 2);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let offer: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(offer["source_asset"], "gold");
        assert_eq!(offer["target"], serde_json::Value::Null);
        let holding: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(holding["quantity"], 12);
    }
}
