//! Configuration journal
//!
//! Each entry is one tab-separated line:
//!
//! ```text
//! n	<seconds>.<millis>	<raw length>	<base64 of the zlib-compressed document>
//! ```
//!
//! The raw length is the size of the serialized document before
//! compression. Compression uses the best (level 9) setting.
//!
//! In notify-only mode the length is `0` and the payload is empty. Nothing
//! is written while the store generation is unchanged since the last entry.

use crate::coalesce::Journal;
use crate::error::ConfError;
use crate::store::ConfStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};
use tracing::debug;

fn compress(xml: &str) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(xml.as_bytes())?;
    encoder.finish()
}

/// Format one journal line, payload included when `xml` is given
pub fn journal_line(now: DateTime<Utc>, xml: Option<&str>) -> io::Result<String> {
    let stamp = format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis());
    match xml {
        Some(xml) => {
            let payload = STANDARD.encode(compress(xml)?);
            Ok(format!("n\t{}\t{}\t{}\n", stamp, xml.len(), payload))
        }
        None => Ok(format!("n\t{}\t0\t\n", stamp)),
    }
}

pub struct ConfigJournal<W: Write + Send> {
    sink: W,
    notify_only: bool,
    last_generation: Option<u32>,
}

impl<W: Write + Send> ConfigJournal<W> {
    pub fn new(sink: W, notify_only: bool) -> Self {
        Self {
            sink,
            notify_only,
            last_generation: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Append an entry for the current state of `store`.
    ///
    /// Returns false when the generation has not moved since the last entry.
    pub fn write_entry(&mut self, store: &mut ConfStore) -> Result<bool, ConfError> {
        let generation = store.generation();
        if self.last_generation == Some(generation) {
            return Ok(false);
        }

        let line = if self.notify_only {
            journal_line(Utc::now(), None)
        } else {
            let xml = store.xml_in_mem()?;
            journal_line(Utc::now(), Some(&xml))
        }
        .map_err(ConfError::Journal)?;
        self.sink
            .write_all(line.as_bytes())
            .and_then(|_| self.sink.flush())
            .map_err(ConfError::Journal)?;
        debug!(generation, "journaled configuration");
        self.last_generation = Some(generation);
        Ok(true)
    }
}

impl<W: Write + Send> Journal for ConfigJournal<W> {
    fn record(&mut self, store: &mut ConfStore) -> Result<(), ConfError> {
        self.write_entry(store).map(|_| ())
    }
}
