//! Terrain descriptor model: noise-function layers grouped into the three
//! generated channels (height, temperature, humidity).

use std::fmt;

/// Kind of noise function a layer evaluates.
///
/// Every kind is matched exhaustively by both the descriptor parser and the
/// source generator, so adding a variant is a single compile-checked change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoiseFunctionKind {
    /// Fractal sum of simplex noise octaves.
    RidgedNoise,
}

impl NoiseFunctionKind {
    /// All known kinds, in declaration order.
    pub const ALL: [NoiseFunctionKind; 1] = [NoiseFunctionKind::RidgedNoise];

    /// Key naming this kind in a planet document.
    pub fn document_name(self) -> &'static str {
        match self {
            NoiseFunctionKind::RidgedNoise => "ridgedNoise",
        }
    }

    /// Looks up a kind by its document key. Unknown names yield `None`.
    pub fn from_document_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.document_name() == name)
    }
}

impl fmt::Display for NoiseFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.document_name())
    }
}

/// Parameters of a single noise layer.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseFunctionParams {
    /// Which noise function to evaluate.
    pub kind: NoiseFunctionKind,
    /// Number of octaves summed. Always at least 1.
    pub octaves: u32,
    /// Amplitude multiplier applied after every octave.
    pub persistence: f32,
    /// Sampling frequency of the first octave.
    pub frequency: f32,
    /// Lower bound of the layer's output range.
    pub low: f32,
    /// Upper bound of the layer's output range.
    pub high: f32,
}

impl NoiseFunctionParams {
    /// Output range of raw simplex noise, used when a layer sets no range.
    pub const DEFAULT_RANGE: (f32, f32) = (-1.0, 1.0);

    /// Creates a layer of the given kind with default parameters.
    pub fn new(kind: NoiseFunctionKind) -> Self {
        Self {
            kind,
            octaves: 1,
            persistence: 1.0,
            frequency: 1.0,
            low: Self::DEFAULT_RANGE.0,
            high: Self::DEFAULT_RANGE.1,
        }
    }

    /// Returns `true` if `low`/`high` differ from the canonical `[-1, 1]`
    /// noise range and the layer output must be remapped.
    pub fn has_custom_range(&self) -> bool {
        (self.low, self.high) != Self::DEFAULT_RANGE
    }
}

/// Descriptor of one generated channel: a constant base offset plus an
/// ordered list of additive noise layers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelSpec {
    /// Sum of every `base` entry of the channel, in document order.
    pub base_offset: f32,
    /// Layers in document order, which is also emission order.
    pub layers: Vec<NoiseFunctionParams>,
}

impl ChannelSpec {
    /// Returns `true` if the channel has no layers and a zero base offset.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.base_offset == 0.0
    }
}

/// The three scalar outputs computed by a planet generation program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Height,
    Temperature,
    Humidity,
}

impl Channel {
    /// All channels in output-location order.
    pub const ALL: [Channel; 3] = [Channel::Height, Channel::Temperature, Channel::Humidity];

    /// Top-level document key holding this channel's descriptor.
    pub fn document_key(self) -> &'static str {
        match self {
            Channel::Height => "baseHeight",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
        }
    }

    /// Looks up the channel stored under a top-level document key.
    pub fn from_document_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.document_key() == key)
    }

    /// Name of the accumulator variable and fragment output in generated code.
    pub fn symbol(self) -> &'static str {
        match self {
            Channel::Height => "height",
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
        }
    }

    /// Fragment output location the channel is written to.
    pub fn output_location(self) -> u32 {
        match self {
            Channel::Height => 0,
            Channel::Temperature => 1,
            Channel::Humidity => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Fully parsed planet descriptor: one [`ChannelSpec`] per [`Channel`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanetDescriptor {
    pub height: ChannelSpec,
    pub temperature: ChannelSpec,
    pub humidity: ChannelSpec,
}

impl PlanetDescriptor {
    /// Returns the [`ChannelSpec`] for the given channel.
    pub fn channel(&self, channel: Channel) -> &ChannelSpec {
        match channel {
            Channel::Height => &self.height,
            Channel::Temperature => &self.temperature,
            Channel::Humidity => &self.humidity,
        }
    }
}
