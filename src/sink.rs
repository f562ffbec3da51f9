// src/sink.rs
//
// Record sinks. The session appends decoded records here and reads the count
// back for its stopping condition.

use std::io::Write;

use crate::record::Record;

/// Receiver of decoded records.
///
/// Not synchronized: the session that owns a sink is its only writer.
pub trait RecordSink {
    fn append(&mut self, record: Record);

    fn count(&self) -> usize;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn append(&mut self, record: Record) {
        (**self).append(record)
    }

    fn count(&self) -> usize {
        (**self).count()
    }
}

/// Append-only, in-order collection of decoded records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSeries {
    records: Vec<Record>,
}

impl DecodedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    /// Values of one field across all records, skipping records without it
    pub fn column(&self, name: &str) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.get(name)).collect()
    }
}

impl RecordSink for DecodedSeries {
    fn append(&mut self, record: Record) {
        self.records.push(record);
    }

    fn count(&self) -> usize {
        self.records.len()
    }
}

/// Sink that echoes every record as one JSON object per line before passing it on.
/// Write failures are logged; the record is still appended.
pub struct JsonLinesSink<W, K> {
    out: W,
    inner: K,
}

impl<W: Write, K: RecordSink> JsonLinesSink<W, K> {
    pub fn new(out: W, inner: K) -> Self {
        JsonLinesSink { out, inner }
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

impl<W: Write, K: RecordSink> RecordSink for JsonLinesSink<W, K> {
    fn append(&mut self, record: Record) {
        let written = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|json| writeln!(self.out, "{}", json))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            tlog!("[sink] Failed to echo record #{}: {}", self.inner.count() + 1, e);
        }
        self.inner.append(record);
    }

    fn count(&self) -> usize {
        self.inner.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::decode_line;

    #[test]
    fn test_append_keeps_order() {
        let mut series = DecodedSeries::new();
        series.append(decode_line("START;LOAD:1;DISTANCE:10;END"));
        series.append(decode_line("START;LOAD:2;END"));
        series.append(Record::new());

        assert_eq!(series.count(), 3);
        assert_eq!(series.records()[1].get("LOAD"), Some(2.0));
        assert!(series.last().unwrap().is_empty());
    }

    #[test]
    fn test_column_skips_missing_fields() {
        let mut series = DecodedSeries::new();
        series.append(decode_line("START;LOAD:1;DISTANCE:10;END"));
        series.append(decode_line("START;LOAD:2;END"));
        series.append(decode_line("START;LOAD:3;DISTANCE:30;END"));

        assert_eq!(series.column("LOAD"), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.column("DISTANCE"), vec![10.0, 30.0]);
        assert!(series.column("SPEED").is_empty());
    }

    #[test]
    fn test_json_lines_sink_echoes_and_collects() {
        let mut sink = JsonLinesSink::new(Vec::new(), DecodedSeries::new());
        sink.append(decode_line("START;LOAD:12.5;DISTANCE:3.0;END"));
        sink.append(Record::new());

        assert_eq!(sink.count(), 2);
        let JsonLinesSink { out, inner } = sink;
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"LOAD\":12.5,\"DISTANCE\":3.0}\n{}\n"
        );
        assert_eq!(inner.column("LOAD"), vec![12.5]);
    }

    #[test]
    fn test_boxed_sink() {
        let mut sink: Box<dyn RecordSink> = Box::new(DecodedSeries::new());
        sink.append(Record::new());
        assert_eq!(sink.count(), 1);
    }
}
