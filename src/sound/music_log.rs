//! Music logs
//!
//! Records every sound chip write, one field at a time, in one of two
//! stream formats. Both share the register write records:
//!
//! | bytes | meaning |
//! |---|---|
//! | `01 aa dd` | FM bank 0 write |
//! | `02 aa dd` | FM bank 1 write |
//! | `03 dd` | PSG write |
//!
//! GYM ends each field with `00` and leaves DAC samples out.
//!
//! GNM opens each field with `00 hh ll` (the field's line count, or zero
//! when the field carried no DAC samples) and adds one record per line:
//! `05` for a line without a sample, `04 dd` for a sample below `0x10`, and
//! the bare sample byte otherwise. Fields without samples are stripped of
//! their `05` records.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// FM address of the DAC sample register
pub const DAC_DATA_ADDRESS: u8 = 0x2a;

const END_OF_FIELD: u8 = 0x00;
const FM_BANK0: u8 = 0x01;
const FM_BANK1: u8 = 0x02;
const PSG_WRITE: u8 = 0x03;
const LOW_SAMPLE: u8 = 0x04;
const NO_SAMPLE: u8 = 0x05;

/// Destination for logged fields
pub trait MusicLogSink: Send {
    /// Accept one complete field
    fn write_field(&mut self, bytes: &[u8]);
}

impl MusicLogSink for Vec<u8> {
    fn write_field(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Log buffer shared with another thread (for example a "save log" action
/// in a front end)
#[derive(Debug, Clone, Default)]
pub struct SharedMusicLog(Arc<Mutex<Vec<u8>>>);

impl SharedMusicLog {
    /// Empty shared log
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes logged so far
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Nothing logged yet
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of the log contents
    pub fn snapshot(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Take the log contents, leaving it empty
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl MusicLogSink for SharedMusicLog {
    fn write_field(&mut self, bytes: &[u8]) {
        self.0.lock().extend_from_slice(bytes);
    }
}

/// Log stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MusicLogFormat {
    /// Register writes only
    #[default]
    Gym,
    /// Register writes plus one DAC sample record per line
    Gnm,
}

/// Accumulates one field of register writes
pub struct MusicLog {
    format: MusicLogFormat,
    field: Vec<u8>,
    sink: Box<dyn MusicLogSink>,
    total_lines: u32,
    pending_sample: Option<u8>,
    field_has_samples: bool,
    fields: u64,
}

impl MusicLog {
    /// Log into `sink`; `total_lines` goes into GNM field headers
    pub fn new(sink: Box<dyn MusicLogSink>, format: MusicLogFormat, total_lines: u32) -> Self {
        let mut log = Self {
            format,
            field: Vec::with_capacity(256),
            sink,
            total_lines,
            pending_sample: None,
            field_has_samples: false,
            fields: 0,
        };
        log.begin_field();
        log
    }

    fn begin_field(&mut self) {
        self.field.clear();
        self.field_has_samples = false;
        if self.format == MusicLogFormat::Gnm {
            let [hi, lo] = (self.total_lines.min(u16::MAX as u32) as u16).to_be_bytes();
            self.field.extend_from_slice(&[END_OF_FIELD, hi, lo]);
        }
    }

    /// Line count for headers of fields started from now on
    pub fn set_total_lines(&mut self, total_lines: u32) {
        self.total_lines = total_lines;
    }

    /// FM register write on bank 0 or 1
    ///
    /// Bank 0 writes to the DAC data register are held as the line's
    /// sample instead of being logged as register writes.
    pub fn fm(&mut self, bank: u8, address: u8, data: u8) {
        if bank == 0 && address == DAC_DATA_ADDRESS {
            self.pending_sample = Some(data);
            return;
        }
        let tag = if bank == 0 { FM_BANK0 } else { FM_BANK1 };
        self.field.extend_from_slice(&[tag, address, data]);
    }

    /// PSG write
    pub fn psg(&mut self, data: u8) {
        self.field.extend_from_slice(&[PSG_WRITE, data]);
    }

    /// A scanline finished; GNM records its DAC sample
    pub fn end_line(&mut self) {
        if self.format != MusicLogFormat::Gnm {
            return;
        }
        match self.pending_sample.take() {
            None => self.field.push(NO_SAMPLE),
            Some(sample) => {
                if sample & 0xf0 == 0 {
                    self.field.push(LOW_SAMPLE);
                }
                self.field.push(sample);
                self.field_has_samples = true;
            }
        }
    }

    /// Close the field and hand it to the sink
    pub fn end_field(&mut self) {
        match self.format {
            MusicLogFormat::Gym => self.field.push(END_OF_FIELD),
            MusicLogFormat::Gnm if !self.field_has_samples => self.strip_line_records(),
            MusicLogFormat::Gnm => {}
        }
        self.sink.write_field(&self.field);
        self.fields += 1;
        self.begin_field();
    }

    fn strip_line_records(&mut self) {
        let mut kept = Vec::with_capacity(self.field.len());
        kept.extend_from_slice(&[END_OF_FIELD, 0, 0]);
        let mut rest = self.field.get(3..).unwrap_or_default();
        while let Some((&tag, tail)) = rest.split_first() {
            let len = match tag {
                FM_BANK0 | FM_BANK1 => 2,
                PSG_WRITE => 1,
                _ => 0,
            };
            if tag != NO_SAMPLE {
                kept.push(tag);
                kept.extend_from_slice(&tail[..len.min(tail.len())]);
            }
            rest = &tail[len.min(tail.len())..];
        }
        self.field = kept;
    }

    /// Stream format
    pub fn format(&self) -> MusicLogFormat {
        self.format
    }

    /// Fields written so far
    pub fn fields(&self) -> u64 {
        self.fields
    }
}

impl std::fmt::Debug for MusicLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicLog")
            .field("format", &self.format)
            .field("pending", &self.field.len())
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
