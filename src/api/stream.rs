use super::logging::emit_record_dropped;
use crate::types::StreamRecord;

pub const DATA_PREFIX: &str = "data: ";

/// Incremental decoder for the newline-delimited `data: {json}` stream.
///
/// By default every read is split on its own: a record whose bytes straddle
/// two reads fails to parse in both halves and is dropped. With
/// [`RecordDecoder::reassembling`] the unterminated last line of a read is
/// carried over and completed by the next one.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    utf8_tail: Vec<u8>,
    line_tail: String,
    reassemble: bool,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reassembling() -> Self {
        Self {
            reassemble: true,
            ..Self::default()
        }
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        let text = self.decode_utf8(chunk);
        let mut records = Vec::new();

        if self.reassemble {
            self.line_tail.push_str(&text);
            let Some(last_newline) = self.line_tail.rfind('\n') else {
                return records;
            };
            let complete: String = self.line_tail.drain(..=last_newline).collect();
            for line in complete.split('\n') {
                push_line(line, &mut records);
            }
        } else {
            for line in text.split('\n') {
                push_line(line, &mut records);
            }
        }

        records
    }

    /// Decodes whatever the reassembling buffer still holds once the body is exhausted.
    pub fn finish(&mut self) -> Vec<StreamRecord> {
        let mut records = Vec::new();
        let rest = std::mem::take(&mut self.line_tail);
        push_line(&rest, &mut records);
        self.utf8_tail.clear();
        records
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(chunk);
        let split = incomplete_tail_start(&bytes);
        self.utf8_tail = bytes.split_off(split);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn push_line(line: &str, records: &mut Vec<StreamRecord>) {
    let line = line.trim_end_matches('\r');
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return;
    };

    match StreamRecord::parse(payload) {
        Ok(record) => records.push(record),
        Err(error) => emit_record_dropped(payload, &error),
    }
}

/// Index where a trailing, not yet complete UTF-8 sequence begins.
fn incomplete_tail_start(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { len - back } else { len };
    }
    len
}
