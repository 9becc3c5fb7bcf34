//! Response decoder registry.
//!
//! Inbound frames are matched against registered response prefixes; the
//! longest matching prefix wins, with ties broken by registration order. The
//! selected decoder receives the frame suffix, updates the property cache
//! and reports the zones it touched.
//!
//! Decoders are plain functions so integrations can register their own for
//! responses the built-in set does not cover.

use std::sync::Arc;

use tracing::{debug, error};

use pioneer_api::Zone;

use crate::params::AvrParams;
use crate::properties::AvrProperties;

/// A response decoder: `(frame suffix, properties, params) → zones touched`.
pub type DecodeFn = Arc<dyn Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> + Send + Sync>;

struct DecoderEntry {
    prefix: String,
    decode: DecodeFn,
}

/// Ordered decoder table with longest-prefix matching.
#[derive(Default)]
pub struct DecoderRegistry {
    entries: Vec<DecoderEntry>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the built-in decoders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::decoders::register_defaults(&mut registry);
        registry
    }

    /// Register a decoder for a response prefix.
    pub fn register<F>(&mut self, prefix: impl Into<String>, decode: F)
    where
        F: Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> + Send + Sync + 'static,
    {
        self.entries.push(DecoderEntry {
            prefix: prefix.into(),
            decode: Arc::new(decode),
        });
    }

    /// Find the decoder for a frame: longest prefix wins, ties break by
    /// registration order. Returns the entry index and the frame suffix.
    fn match_frame<'f>(&self, frame: &'f str) -> Option<(usize, &'f str)> {
        let mut best: Option<(usize, usize)> = None; // (index, prefix length)
        for (index, entry) in self.entries.iter().enumerate() {
            if frame.starts_with(&entry.prefix) {
                let len = entry.prefix.len();
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((index, len));
                }
            }
        }
        best.map(|(index, len)| (index, &frame[len..]))
    }

    /// Decode a frame and apply it to the property cache.
    ///
    /// Returns the zones whose observable state changed. Decoder panics are
    /// logged and discarded; they never tear down the reader.
    pub fn dispatch(
        &self,
        frame: &str,
        properties: &AvrProperties,
        params: &AvrParams,
    ) -> Vec<Zone> {
        let Some((index, suffix)) = self.match_frame(frame) else {
            debug!("undecoded response: {frame}");
            return vec![];
        };
        let decode = self.entries[index].decode.clone();
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            decode(suffix, properties, params)
        })) {
            Ok(zones) => zones,
            Err(_) => {
                error!("decoder for {} panicked on: {frame}", self.entries[index].prefix);
                vec![]
            }
        }
    }
}
