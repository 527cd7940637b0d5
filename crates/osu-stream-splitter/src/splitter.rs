//! Push-style record splitter with a bounded, self-compacting buffer.
//!
//! Input arrives as arbitrary chunks; records are the byte ranges between
//! separator occurrences. The splitter owns a single backing buffer:
//!
//! ```text
//! 0          body_offset           offset          capacity
//! |-- consumed --|--- pending record ---|---- free ----|
//! ```
//!
//! Records are handed to the sink as borrowed [`Record`] views into that
//! buffer. A view is only valid for the duration of the sink call because the
//! next `feed` may compact or reallocate the buffer; sinks copy out whatever
//! they keep.

use anyhow::{anyhow, bail, Result};
use std::ops::Range;
use tracing::{debug, trace};

use crate::config::SplitterConfig;

/// One emitted record: its zero-based sequence index and its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub index: usize,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    /// Past the end of the record range; input is discarded.
    Exhausted,
    Finished,
    /// A sink or allocation error aborted the stream.
    Failed,
}

/// Splits a chunked byte stream into separator-delimited records.
///
/// One instance handles exactly one logical stream: call [`feed`](Self::feed)
/// for every chunk in order, then [`finish`](Self::finish) once.
pub struct RecordSplitter {
    separator: Vec<u8>,
    buffer: Vec<u8>,
    /// Position of the next free byte.
    offset: usize,
    /// Start of the oldest record not yet emitted.
    body_offset: usize,
    flush_ratio: f64,
    range: Range<usize>,
    include_separator: bool,
    next_index: usize,
    phase: Phase,
}

impl RecordSplitter {
    /// Create a splitter, allocating its initial buffer.
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate()?;

        let mut buffer = Vec::new();
        buffer.try_reserve_exact(config.buffer_size).map_err(|e| {
            anyhow!(
                "Failed to allocate {} byte splitter buffer: {}",
                config.buffer_size,
                e
            )
        })?;
        buffer.resize(config.buffer_size, 0);

        Ok(Self {
            separator: config.separator,
            buffer,
            offset: 0,
            body_offset: 0,
            flush_ratio: config.buffer_flush_ratio,
            range: config.record_range,
            include_separator: config.include_separator,
            next_index: 0,
            phase: Phase::Open,
        })
    }

    /// Current backing-buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of records delimited so far, emitted or skipped.
    pub fn records_seen(&self) -> usize {
        self.next_index
    }

    /// Bytes buffered for the record currently being accumulated.
    pub fn pending_len(&self) -> usize {
        self.offset - self.body_offset
    }

    /// True once the record range end has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.phase == Phase::Exhausted
    }

    /// Append a chunk and emit every record it completes.
    ///
    /// An error returned by `sink` stops scanning immediately, is returned to
    /// the caller and poisons the splitter.
    pub fn feed<F>(&mut self, chunk: &[u8], mut sink: F) -> Result<()>
    where
        F: FnMut(Record<'_>) -> Result<()>,
    {
        match self.phase {
            Phase::Open => {}
            Phase::Exhausted => return Ok(()),
            Phase::Finished => bail!("Cannot feed a finished record splitter"),
            Phase::Failed => bail!("Record splitter was aborted by an earlier error"),
        }
        if chunk.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.make_room(chunk.len()) {
            self.phase = Phase::Failed;
            return Err(e);
        }

        let stop = self.offset + chunk.len();
        self.buffer[self.offset..stop].copy_from_slice(chunk);

        // A separator may straddle the previous chunk boundary.
        let floor = self.offset.saturating_sub(self.separator.len() - 1);
        let scanned = self.scan(floor, stop, &mut sink);
        self.offset = stop;

        if scanned.is_err() {
            self.phase = Phase::Failed;
        }
        scanned
    }

    /// Signal end of input, emitting any trailing bytes as a final record.
    pub fn finish<F>(&mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(Record<'_>) -> Result<()>,
    {
        match self.phase {
            Phase::Open => {}
            Phase::Exhausted => {
                self.phase = Phase::Finished;
                return Ok(());
            }
            Phase::Finished => bail!("Record splitter already finished"),
            Phase::Failed => bail!("Record splitter was aborted by an earlier error"),
        }
        self.phase = Phase::Finished;

        if self.body_offset == self.offset {
            return Ok(());
        }

        let index = self.next_index;
        if self.range.contains(&index) {
            let record = Record {
                index,
                bytes: &self.buffer[self.body_offset..self.offset],
            };
            if let Err(e) = sink(record) {
                self.phase = Phase::Failed;
                return Err(e);
            }
        }
        self.body_offset = self.offset;
        self.next_index += 1;
        Ok(())
    }

    fn scan<F>(&mut self, floor: usize, stop: usize, sink: &mut F) -> Result<()>
    where
        F: FnMut(Record<'_>) -> Result<()>,
    {
        let separator_len = self.separator.len();
        loop {
            let start = self.body_offset.max(floor);
            let Some(found) = find(&self.buffer[start..stop], &self.separator) else {
                return Ok(());
            };

            let index = self.next_index;
            if index >= self.range.end {
                trace!(index, "record range exhausted");
                self.phase = Phase::Exhausted;
                return Ok(());
            }

            let match_start = start + found;
            if index >= self.range.start {
                let end = if self.include_separator {
                    match_start + separator_len
                } else {
                    match_start
                };
                sink(Record {
                    index,
                    bytes: &self.buffer[self.body_offset..end],
                })?;
            }

            self.body_offset = match_start + separator_len;
            self.next_index += 1;
        }
    }

    /// Compact, and if needed grow, so that `incoming` bytes fit after `offset`.
    fn make_room(&mut self, incoming: usize) -> Result<()> {
        let capacity = self.buffer.len();
        let flush_threshold = (capacity as f64 * self.flush_ratio) as usize;
        if self.offset + incoming <= capacity - flush_threshold {
            return Ok(());
        }

        let consumed = self.body_offset;
        self.buffer.copy_within(consumed..self.offset, 0);
        self.offset -= consumed;
        self.body_offset = 0;
        trace!(consumed, pending = self.offset, "compacted splitter buffer");

        if self.offset + incoming > capacity {
            let grown = capacity - consumed + incoming;
            self.buffer
                .try_reserve_exact(grown - capacity)
                .map_err(|e| anyhow!("Failed to grow splitter buffer to {} bytes: {}", grown, e))?;
            self.buffer.resize(grown, 0);
            debug!(from = capacity, to = grown, "increased splitter buffer size");
        }
        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if let [byte] = needle {
        return haystack.iter().position(|b| b == byte);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Split a complete chunk sequence, returning owned copies of every record.
pub fn split_all<'a, I>(config: SplitterConfig, chunks: I) -> Result<Vec<Vec<u8>>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut splitter = RecordSplitter::new(config)?;
    let mut records = Vec::new();
    for chunk in chunks {
        splitter.feed(chunk, |record| {
            records.push(record.bytes.to_vec());
            Ok(())
        })?;
    }
    splitter.finish(|record| {
        records.push(record.bytes.to_vec());
        Ok(())
    })?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(config: SplitterConfig, chunks: &[&[u8]]) -> Vec<String> {
        split_all(config, chunks.iter().copied())
            .expect("split should succeed")
            .into_iter()
            .map(|r| String::from_utf8(r).expect("utf8"))
            .collect()
    }

    /// Every way of cutting `input` into two or three chunks.
    fn chunkings(input: &[u8]) -> Vec<Vec<&[u8]>> {
        let mut out = vec![vec![input]];
        for i in 0..=input.len() {
            out.push(vec![&input[..i], &input[i..]]);
            for j in i..=input.len() {
                out.push(vec![&input[..i], &input[i..j], &input[j..]]);
            }
        }
        out
    }

    #[test]
    fn test_basic_newline_split() {
        let records = lines(SplitterConfig::new("\n"), &[b"a\nbb\nccc"]);
        assert_eq!(records, vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn test_trailing_separator_emits_no_empty_record() {
        let records = lines(SplitterConfig::new("\n"), &[b"a\nbb\n"]);
        assert_eq!(records, vec!["a", "bb"]);
    }

    #[test]
    fn test_consecutive_separators_emit_empty_records() {
        let records = lines(SplitterConfig::new("\n"), &[b"a\n\nb"]);
        assert_eq!(records, vec!["a", "", "b"]);
    }

    #[test]
    fn test_no_separator_yields_whole_input() {
        let records = lines(SplitterConfig::new("\n"), &[b"abc", b"def"]);
        assert_eq!(records, vec!["abcdef"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(lines(SplitterConfig::new("\n"), &[]).is_empty());
        assert!(lines(SplitterConfig::new("\n"), &[b"", b""]).is_empty());
    }

    #[test]
    fn test_include_separator() {
        let config = SplitterConfig::new("\r\n").with_separator_included(true);
        let records = lines(config, &[b"a\r\nb\r", b"\nc"]);
        assert_eq!(records, vec!["a\r\n", "b\r\n", "c"]);
    }

    #[test]
    fn test_record_range_filter() {
        let config = SplitterConfig::new("\n").with_record_range(1..3);
        let records = lines(config, &[b"a\nbb\nccc\ndd\ne"]);
        assert_eq!(records, vec!["bb", "ccc"]);
    }

    #[test]
    fn test_record_range_filter_chunked() {
        let input = b"a\nbb\nccc\ndd\ne";
        for chunks in chunkings(input) {
            let config = SplitterConfig::new("\n").with_record_range(1..3);
            assert_eq!(lines(config, &chunks), vec!["bb", "ccc"], "chunks: {:?}", chunks);
        }
    }

    #[test]
    fn test_record_range_includes_unterminated_tail() {
        let config = SplitterConfig::new("\n").with_record_range(3..10);
        let records = lines(config, &[b"a\nbb\nccc\ndd\ne"]);
        assert_eq!(records, vec!["dd", "e"]);
    }

    #[test]
    fn test_empty_record_range_emits_nothing() {
        let config = SplitterConfig::new("\n").with_record_range(0..0);
        assert!(lines(config, &[b"abc"]).is_empty());
    }

    #[test]
    fn test_record_indices_are_sequential() {
        let mut splitter = RecordSplitter::new(SplitterConfig::new(",")).unwrap();
        let mut seen = Vec::new();
        splitter
            .feed(b"x,y,z", |r| {
                seen.push(r.index);
                Ok(())
            })
            .unwrap();
        splitter
            .finish(|r| {
                seen.push(r.index);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(splitter.records_seen(), 3);
    }

    #[test]
    fn test_chunk_invariance_single_byte_separator() {
        let input = b"osu file format v14\n\n[General]\nAudioFilename: a.mp3\n";
        let expected = lines(SplitterConfig::new("\n"), &[input]);
        for chunks in chunkings(input) {
            assert_eq!(lines(SplitterConfig::new("\n"), &chunks), expected);
        }
    }

    #[test]
    fn test_chunk_invariance_multi_byte_separator() {
        let input = b"aa<sep>b<se<sep><sep>cc<sep";
        let expected = lines(SplitterConfig::new("<sep>"), &[input]);
        assert_eq!(expected, vec!["aa", "b<se", "", "cc<sep"]);
        for chunks in chunkings(input) {
            assert_eq!(lines(SplitterConfig::new("<sep>"), &chunks), expected);
        }
    }

    #[test]
    fn test_chunk_invariance_self_overlapping_separator() {
        let input = b"xaaaybaaz";
        let expected = lines(SplitterConfig::new("aa"), &[input]);
        assert_eq!(expected, vec!["x", "ayb", "z"]);
        for chunks in chunkings(input) {
            assert_eq!(lines(SplitterConfig::new("aa"), &chunks), expected);
        }
    }

    #[test]
    fn test_byte_at_a_time_with_tiny_buffer() {
        let input: Vec<u8> = (0..200u32)
            .map(|i| format!("line-{}", i))
            .collect::<Vec<_>>()
            .join("\r\n")
            .into_bytes();
        let expected = lines(SplitterConfig::new("\r\n"), &[input.as_slice()]);
        assert_eq!(expected.len(), 200);

        let config = SplitterConfig::new("\r\n").with_buffer_size(4).with_flush_ratio(0.5);
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(lines(config, &chunks), expected);
    }

    #[test]
    fn test_buffer_grows_for_oversized_chunk() {
        let mut splitter =
            RecordSplitter::new(SplitterConfig::new("\n").with_buffer_size(8)).unwrap();
        let big = vec![b'x'; 100];
        splitter.feed(&big, |_| Ok(())).unwrap();
        assert!(splitter.capacity() >= 100);
        assert_eq!(splitter.pending_len(), 100);

        let mut records = Vec::new();
        splitter
            .feed(b"\ny", |r| {
                records.push(r.bytes.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(records, vec![big]);
        assert_eq!(splitter.pending_len(), 1);
    }

    #[test]
    fn test_compaction_keeps_capacity_bounded() {
        let mut splitter = RecordSplitter::new(
            SplitterConfig::new("\n").with_buffer_size(64).with_flush_ratio(0.25),
        )
        .unwrap();
        let mut count = 0;
        for _ in 0..1_000 {
            splitter
                .feed(b"0123456789\n", |_| {
                    count += 1;
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(count, 1_000);
        assert_eq!(splitter.capacity(), 64);
    }

    #[test]
    fn test_sink_error_aborts_and_poisons() {
        let mut splitter = RecordSplitter::new(SplitterConfig::new("\n")).unwrap();
        let mut seen = Vec::new();
        let result = splitter.feed(b"a\nb\nc\n", |r| {
            if r.index == 1 {
                return Err(anyhow!("bad record"));
            }
            seen.push(r.bytes.to_vec());
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(seen, vec![b"a".to_vec()]);
        assert!(splitter.feed(b"d\n", |_| Ok(())).is_err());
        assert!(splitter.finish(|_| Ok(())).is_err());
    }

    #[test]
    fn test_exhausted_splitter_ignores_input() {
        let mut splitter =
            RecordSplitter::new(SplitterConfig::new("\n").with_record_range(0..1)).unwrap();
        let mut records = Vec::new();
        splitter
            .feed(b"a\nb\n", |r| {
                records.push(r.bytes.to_vec());
                Ok(())
            })
            .unwrap();
        assert!(splitter.is_exhausted());
        splitter
            .feed(b"more\n", |_| panic!("no records past the range end"))
            .unwrap();
        splitter
            .finish(|_| panic!("no records past the range end"))
            .unwrap();
        assert_eq!(records, vec![b"a".to_vec()]);
    }

    #[test]
    fn test_feed_after_finish_is_an_error() {
        let mut splitter = RecordSplitter::new(SplitterConfig::new("\n")).unwrap();
        splitter.finish(|_| Ok(())).unwrap();
        assert!(splitter.feed(b"a", |_| Ok(())).is_err());
        assert!(splitter.finish(|_| Ok(())).is_err());
    }

    #[test]
    fn test_find() {
        assert_eq!(find(b"abc", b"c"), Some(2));
        assert_eq!(find(b"abc", b"bc"), Some(1));
        assert_eq!(find(b"ab", b"abc"), None);
        assert_eq!(find(b"", b"a"), None);
    }
}
