//! Synth instances attached to channels, and the registry that builds them.
//!
//! A channel's instrument is a live object owned by the audio side. The
//! project file only records which synth it is (`synth_id`) and which
//! instance of that synth (`synth_num`); the registry turns that pair back
//! into an instrument when a project is loaded.

use std::sync::Arc;

/// A live synth instance owned by a channel.
pub trait Instrument: std::fmt::Debug + Send + Sync {
    /// Identifier of the synth type, e.g. `"subtractive"`.
    fn synth_id(&self) -> &str;

    /// Instance number of this synth within the project.
    fn synth_num(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no instrument for synth '{synth_id}' #{synth_num}")]
pub struct UnresolvedInstrument {
    pub synth_id: String,
    pub synth_num: u32,
}

/// Builds live instruments from their stored identity.
pub trait SynthRegistry {
    fn resolve_instrument(
        &self,
        synth_id: &str,
        synth_num: u32,
    ) -> Result<Arc<dyn Instrument>, UnresolvedInstrument>;
}

/// Synth types shipped with the editor.
pub const STOCK_SYNTHS: [&str; 4] = ["subtractive", "fm", "sampler", "drumkit"];

/// Instrument produced by [`StockSynths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockSynth {
    synth_id: String,
    synth_num: u32,
}

impl StockSynth {
    pub fn new(synth_id: impl Into<String>, synth_num: u32) -> Self {
        Self {
            synth_id: synth_id.into(),
            synth_num,
        }
    }
}

impl Instrument for StockSynth {
    fn synth_id(&self) -> &str {
        &self.synth_id
    }

    fn synth_num(&self) -> u32 {
        self.synth_num
    }
}

/// Registry over the stock synth types. Instance numbers start at 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockSynths;

impl StockSynths {
    /// Create a new instrument of a stock synth type.
    pub fn instantiate(
        &self,
        synth_id: &str,
        synth_num: u32,
    ) -> Result<Arc<dyn Instrument>, UnresolvedInstrument> {
        self.resolve_instrument(synth_id, synth_num)
    }
}

impl SynthRegistry for StockSynths {
    fn resolve_instrument(
        &self,
        synth_id: &str,
        synth_num: u32,
    ) -> Result<Arc<dyn Instrument>, UnresolvedInstrument> {
        if synth_num == 0 || !STOCK_SYNTHS.contains(&synth_id) {
            return Err(UnresolvedInstrument {
                synth_id: synth_id.to_string(),
                synth_num,
            });
        }
        Ok(Arc::new(StockSynth::new(synth_id, synth_num)))
    }
}
