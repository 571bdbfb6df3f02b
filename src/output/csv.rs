//! CSV result sink

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SinkError;
use crate::output::OutputTarget;
use crate::types::MatchRecord;

struct SinkState {
    /// `None` once the sink has been closed
    out: Option<Box<dyn Write + Send>>,
    count: u64,
}

/// Thread-safe CSV sink that counts the rows it accepts
///
/// Rows have no header and a variable number of columns. Each row is encoded
/// in memory and appended whole; appending and incrementing the count happen
/// under one lock, so the count always equals the number of rows written.
pub struct ResultSink {
    state: Mutex<SinkState>,
}

impl ResultSink {
    /// Open the destination for writing
    pub fn open(target: &OutputTarget) -> Result<Self, SinkError> {
        let out: Box<dyn Write + Send> = match target {
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|source| SinkError::Open {
                    path: path.clone(),
                    source,
                })?;
                Box::new(BufWriter::new(file))
            }
            OutputTarget::Console => Box::new(io::stdout()),
        };

        Ok(Self::from_writer(out))
    }

    /// Wrap an arbitrary writer
    pub fn from_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(SinkState {
                out: Some(out),
                count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one row; the count only moves when the write succeeds
    pub fn record<I, T>(&self, fields: I) -> Result<(), SinkError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let row = encode_row(fields)?;

        let mut state = self.lock();
        let out = state.out.as_mut().ok_or(SinkError::Closed)?;
        out.write_all(&row).map_err(SinkError::Write)?;
        state.count += 1;
        Ok(())
    }

    /// Append the row for a matched certificate
    pub fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError> {
        self.record(record.fields())
    }

    /// Number of rows accepted so far
    pub fn count(&self) -> u64 {
        self.lock().count
    }

    /// Flush buffered rows without closing
    pub fn flush(&self) -> Result<(), SinkError> {
        let mut state = self.lock();
        match state.out.as_mut() {
            Some(out) => out.flush().map_err(SinkError::Flush),
            None => Ok(()),
        }
    }

    /// Flush and release the destination, returning the final count.
    ///
    /// Only the first call does any work; later calls return the count.
    pub fn close(&self) -> Result<u64, SinkError> {
        let mut state = self.lock();
        if let Some(mut out) = state.out.take() {
            out.flush().map_err(SinkError::Flush)?;
            tracing::debug!("Result sink closed after {} rows", state.count);
        }
        Ok(state.count)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().out.is_none()
    }
}

impl Drop for ResultSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to flush results on drop: {}", e);
        }
    }
}

/// Encode one CSV row, terminator included
fn encode_row<I, T>(fields: I) -> Result<Vec<u8>, SinkError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| SinkError::Write(io::Error::new(e.error().kind(), e.error().to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Writer that shares its buffer with the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Writer that fails a fixed number of writes, then succeeds
    struct FlakyWriter {
        failures_left: usize,
        inner: SharedBuf,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(subject: &str, dns: &[&str]) -> MatchRecord {
        MatchRecord {
            issuer: "Test EV CA".to_string(),
            not_before: "2015-06-01".to_string(),
            subject: subject.to_string(),
            dns_names: dns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_ragged_rows_without_header() {
        let buf = SharedBuf::default();
        let sink = ResultSink::from_writer(Box::new(buf.clone()));

        sink.record_match(&record("a.com", &["a.com", "www.a.com"])).unwrap();
        sink.record_match(&record("b.com", &[])).unwrap();
        sink.close().unwrap();

        assert_eq!(
            buf.contents(),
            "Test EV CA,2015-06-01,a.com,a.com,www.a.com\nTest EV CA,2015-06-01,b.com\n"
        );
    }

    #[test]
    fn test_fields_with_delimiter_are_quoted() {
        let buf = SharedBuf::default();
        let sink = ResultSink::from_writer(Box::new(buf.clone()));

        sink.record(["Acme, Inc. EV CA", "2015-06-01", "say \"hi\""]).unwrap();
        sink.close().unwrap();

        assert_eq!(
            buf.contents(),
            "\"Acme, Inc. EV CA\",2015-06-01,\"say \"\"hi\"\"\"\n"
        );
    }

    #[test]
    fn test_count_tracks_records() {
        let sink = ResultSink::from_writer(Box::new(io::sink()));
        assert_eq!(sink.count(), 0);

        for i in 0..5 {
            sink.record_match(&record(&format!("{}.com", i), &[])).unwrap();
        }

        assert_eq!(sink.count(), 5);
        assert_eq!(sink.close().unwrap(), 5);
    }

    #[test]
    fn test_failed_write_does_not_poison_sink() {
        let buf = SharedBuf::default();
        let sink = ResultSink::from_writer(Box::new(FlakyWriter {
            failures_left: 2,
            inner: buf.clone(),
        }));

        assert!(matches!(sink.record(["lost", "1"]), Err(SinkError::Write(_))));
        assert!(matches!(sink.record(["lost", "2"]), Err(SinkError::Write(_))));
        assert_eq!(sink.count(), 0);

        sink.record(["kept", "3"]).unwrap();
        assert_eq!(sink.close().unwrap(), 1);
        assert_eq!(buf.contents(), "kept,3\n");
    }

    #[test]
    fn test_close_is_idempotent() {
        let sink = ResultSink::from_writer(Box::new(io::sink()));
        sink.record(["a", "b", "c"]).unwrap();

        assert_eq!(sink.close().unwrap(), 1);
        assert!(sink.is_closed());
        assert_eq!(sink.close().unwrap(), 1);

        assert!(matches!(sink.record(["d"]), Err(SinkError::Closed)));
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn test_drop_flushes() {
        let buf = SharedBuf::default();
        {
            let sink = ResultSink::from_writer(Box::new(buf.clone()));
            sink.record(["a", "b", "c"]).unwrap();
        }
        assert_eq!(buf.contents(), "a,b,c\n");
    }

    #[test]
    fn test_concurrent_records_are_exact() {
        let buf = SharedBuf::default();
        let sink = Arc::new(ResultSink::from_writer(Box::new(buf.clone())));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let subject = format!("w{}-{}.example.com", worker, i);
                        sink.record(["Test EV CA", "2015-06-01", subject.as_str(), subject.as_str()])
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.close().unwrap(), 2000);

        let contents = buf.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2000);
        for line in lines {
            // No interleaving: every row is intact
            let cols: Vec<&str> = line.split(',').collect();
            assert_eq!(cols.len(), 4);
            assert_eq!(cols[2], cols[3]);
        }
    }

    #[test]
    fn test_open_invalid_directory() {
        let target = OutputTarget::File("/nonexistent/dir/ev-certs.csv".into());
        let err = ResultSink::open(&target).err().unwrap();
        assert!(matches!(err, SinkError::Open { .. }));
    }
}
