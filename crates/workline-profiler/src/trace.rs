//! Trace-event JSON output.
//!
//! The file is a single object whose `traceEvents` array holds one
//! complete-event record per entry:
//!
//! ```text
//! {"otherData":{},"traceEvents":[{"cat":"function","dur":7,"name":"load","ph":"X","pid":0,"tid":3,"ts":2},...]}
//! ```
//!
//! Every record is written followed by a comma. On finish the last comma is
//! overwritten by the closing `]}`, which is why the writer needs `Seek`.

use std::io::{self, Seek, SeekFrom, Write};

use serde::Serialize;
use workline_core::ticks_to_micros;

use crate::events::ProfileEntry;

/// Bytes written before the first record.
pub const TRACE_HEADER: &str = r#"{"otherData":{},"traceEvents":["#;
/// Bytes that close the event array and the document.
pub const TRACE_FOOTER: &str = "]}";

const CATEGORY: &str = "function";
/// Complete event: a begin timestamp plus a duration.
const PHASE_COMPLETE: &str = "X";
const PROCESS_ID: u32 = 0;

/// One serialized record. Field order is the output order.
#[derive(Debug, Serialize)]
struct TraceEvent<'a> {
    cat: &'static str,
    dur: u64,
    name: &'a str,
    ph: &'static str,
    pid: u32,
    tid: u64,
    ts: u64,
}

impl<'a> TraceEvent<'a> {
    fn from_entry(entry: &'a ProfileEntry, frequency: u64) -> Self {
        let begin = ticks_to_micros(entry.begin_tick, frequency);
        let end = ticks_to_micros(entry.end_tick, frequency);
        Self {
            cat: CATEGORY,
            dur: end.saturating_sub(begin),
            name: &entry.name,
            ph: PHASE_COMPLETE,
            pid: PROCESS_ID,
            tid: entry.thread_id,
            ts: begin,
        }
    }
}

/// Streams entries into a trace-event document.
#[derive(Debug)]
pub struct TraceWriter<W: Write + Seek> {
    out: W,
    frequency: u64,
    records: u64,
}

impl<W: Write + Seek> TraceWriter<W> {
    /// Write the header. `frequency` is the tick rate of entry timestamps.
    pub fn begin(mut out: W, frequency: u64) -> io::Result<Self> {
        out.write_all(TRACE_HEADER.as_bytes())?;
        Ok(Self {
            out,
            frequency,
            records: 0,
        })
    }

    /// Append one record followed by a separator.
    pub fn write_entry(&mut self, entry: &ProfileEntry) -> io::Result<()> {
        let event = TraceEvent::from_entry(entry, self.frequency);
        serde_json::to_writer(&mut self.out, &event)?;
        self.out.write_all(b",")?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// Replace the trailing separator with the footer and flush.
    ///
    /// Returns the underlying writer and the number of records written.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        if self.records > 0 {
            self.out.seek(SeekFrom::Current(-1))?;
        }
        self.out.write_all(TRACE_FOOTER.as_bytes())?;
        self.out.flush()?;
        Ok((self.out, self.records))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn render(entries: &[ProfileEntry], frequency: u64) -> String {
        let mut writer = TraceWriter::begin(Cursor::new(Vec::new()), frequency).unwrap();
        for entry in entries {
            writer.write_entry(entry).unwrap();
        }
        let (cursor, records) = writer.finish().unwrap();
        assert_eq!(records, entries.len() as u64);
        String::from_utf8(cursor.into_inner()).unwrap()
    }

    #[test]
    fn empty_trace_is_well_formed() {
        assert_eq!(render(&[], 1_000_000), r#"{"otherData":{},"traceEvents":[]}"#);
    }

    #[test]
    fn record_layout_and_truncating_conversion() {
        // 3 MHz: begin 7 ticks -> 2us, end 29 ticks -> 9us, so dur is 7us.
        let entry = ProfileEntry::on_thread("load", 7, 29, 3);
        assert_eq!(
            render(&[entry], 3_000_000),
            concat!(
                r#"{"otherData":{},"traceEvents":["#,
                r#"{"cat":"function","dur":7,"name":"load","ph":"X","pid":0,"tid":3,"ts":2}"#,
                "]}"
            )
        );
    }

    #[test]
    fn only_the_last_separator_is_replaced() {
        let entries = [
            ProfileEntry::on_thread("a", 0, 1_000, 1),
            ProfileEntry::on_thread("b", 1_000, 3_000, 2),
        ];
        let text = render(&entries, 1_000_000);
        assert!(text.contains(r#""ts":0},{"cat""#));
        assert!(text.ends_with(r#""ts":1000}]}"#));

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        let events = parsed["traceEvents"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["dur"], 2_000);
        assert_eq!(events[1]["tid"], 2);
    }

    #[test]
    fn names_are_json_escaped() {
        let entry = ProfileEntry::on_thread(r#"say "hi"\now"#, 0, 0, 1);
        let text = render(&[entry], 1_000);

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["traceEvents"][0]["name"], r#"say "hi"\now"#);
    }
}
