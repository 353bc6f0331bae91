//! Descriptor parser: turns a planet document tree into per-channel
//! [`ChannelSpec`]s.
//!
//! A channel whose node is missing or not a mapping degrades to an empty
//! channel with a warning. A field that fails to coerce aborts the rest of
//! that channel and is reported as [`DescriptorError::FieldCoercion`]; the
//! other channels are still parsed.

use crate::document::{DocumentNode, NodeKind};
use crate::noise_layer::{Channel, ChannelSpec, NoiseFunctionKind, NoiseFunctionParams, PlanetDescriptor};

/// Key of the constant offset entries inside a channel mapping.
pub const BASE_KEY: &str = "base";

/// Errors raised while reading a planet descriptor.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    /// The document root is missing or is not a mapping.
    #[error("planet document root must be a mapping, found {found}")]
    RootNotMapping { found: NodeKind },

    /// A field could not be converted to the type it requires.
    #[error("channel '{channel}': field '{field}' expected {expected}, found {found}")]
    FieldCoercion {
        channel: Channel,
        field: String,
        expected: &'static str,
        found: String,
    },
}

/// Per-channel outcome of parsing a planet document.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedPlanet {
    pub height: Result<ChannelSpec, DescriptorError>,
    pub temperature: Result<ChannelSpec, DescriptorError>,
    pub humidity: Result<ChannelSpec, DescriptorError>,
}

impl Default for ParsedPlanet {
    fn default() -> Self {
        Self {
            height: Ok(ChannelSpec::default()),
            temperature: Ok(ChannelSpec::default()),
            humidity: Ok(ChannelSpec::default()),
        }
    }
}

impl ParsedPlanet {
    /// Outcome for one channel.
    pub fn channel(&self, channel: Channel) -> &Result<ChannelSpec, DescriptorError> {
        match channel {
            Channel::Height => &self.height,
            Channel::Temperature => &self.temperature,
            Channel::Humidity => &self.humidity,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut Result<ChannelSpec, DescriptorError> {
        match channel {
            Channel::Height => &mut self.height,
            Channel::Temperature => &mut self.temperature,
            Channel::Humidity => &mut self.humidity,
        }
    }

    /// Errors of all failed channels, in output-location order.
    pub fn errors(&self) -> impl Iterator<Item = &DescriptorError> {
        Channel::ALL
            .into_iter()
            .filter_map(|channel| self.channel(channel).as_ref().err())
    }

    /// Collapses the outcome into a descriptor, failing with the first
    /// channel error in output-location order.
    pub fn into_descriptor(self) -> Result<PlanetDescriptor, DescriptorError> {
        Ok(PlanetDescriptor {
            height: self.height?,
            temperature: self.temperature?,
            humidity: self.humidity?,
        })
    }
}

/// Parses every recognized channel of a planet document root.
///
/// Channel keys may appear more than once; later occurrences keep adding to
/// the same channel. Unknown top-level keys are ignored.
pub fn parse_planet<N: DocumentNode>(root: &N) -> Result<ParsedPlanet, DescriptorError> {
    if !root.is_mapping() {
        return Err(DescriptorError::RootNotMapping { found: root.kind() });
    }

    let mut parsed = ParsedPlanet::default();
    for (key, node) in root.entries() {
        let Some(channel) = Channel::from_document_key(key) else {
            tracing::debug!("Ignoring unknown top-level key '{key}'");
            continue;
        };

        let slot = parsed.channel_mut(channel);
        let result = match slot {
            Ok(spec) => parse_channel_into(channel, Some(node), spec),
            // Channel already aborted.
            Err(_) => continue,
        };
        if let Err(err) = result {
            tracing::error!("Failed to parse planet channel: {err}");
            *slot = Err(err);
        }
    }
    Ok(parsed)
}

/// Parses one channel descriptor node.
///
/// A missing, null or non-mapping node yields an empty channel.
pub fn parse_channel<N: DocumentNode>(
    channel: Channel,
    node: Option<&N>,
) -> Result<ChannelSpec, DescriptorError> {
    let mut spec = ChannelSpec::default();
    parse_channel_into(channel, node, &mut spec)?;
    Ok(spec)
}

fn parse_channel_into<N: DocumentNode>(
    channel: Channel,
    node: Option<&N>,
    spec: &mut ChannelSpec,
) -> Result<(), DescriptorError> {
    let Some(node) = node.filter(|node| node.is_mapping()) else {
        let found = node.map_or("nothing".to_string(), |n| n.kind().to_string());
        tracing::warn!(
            "Channel '{}' must be a mapping, found {found}; using an empty channel",
            channel.document_key()
        );
        return Ok(());
    };

    for (key, value) in node.entries() {
        if key == BASE_KEY {
            spec.base_offset += coerce_float(value).ok_or_else(|| {
                coercion_error(channel, BASE_KEY.to_string(), "a finite number", value)
            })?;
            if !spec.base_offset.is_finite() {
                return Err(coercion_error(
                    channel,
                    BASE_KEY.to_string(),
                    "a base sum within f32 range",
                    value,
                ));
            }
            continue;
        }

        let Some(kind) = NoiseFunctionKind::from_document_name(key) else {
            tracing::debug!("Ignoring unknown entry '{key}' in channel '{channel}'");
            continue;
        };

        match value.kind() {
            NodeKind::Sequence => {
                for (index, item) in value.elements().enumerate() {
                    let field = format!("{key}[{index}]");
                    spec.layers.push(parse_layer(channel, kind, &field, item)?);
                }
            }
            _ => spec.layers.push(parse_layer(channel, kind, key, value)?),
        }
    }
    Ok(())
}

/// Builds one layer from its parameter mapping. The layer is only returned
/// once every present field has coerced.
fn parse_layer<N: DocumentNode>(
    channel: Channel,
    kind: NoiseFunctionKind,
    path: &str,
    node: &N,
) -> Result<NoiseFunctionParams, DescriptorError> {
    let mut params = NoiseFunctionParams::new(kind);
    match node.kind() {
        NodeKind::Null => return Ok(params),
        NodeKind::Mapping => {}
        _ => {
            return Err(coercion_error(
                channel,
                path.to_string(),
                "a parameter mapping",
                node,
            ));
        }
    }

    match kind {
        NoiseFunctionKind::RidgedNoise => {
            for (field, value) in node.entries() {
                let target = match field {
                    "octaves" => {
                        params.octaves = coerce_octaves(value).ok_or_else(|| {
                            coercion_error(
                                channel,
                                format!("{path}.{field}"),
                                "an integer >= 1",
                                value,
                            )
                        })?;
                        continue;
                    }
                    "persistence" => &mut params.persistence,
                    "frequency" => &mut params.frequency,
                    "low" => &mut params.low,
                    "high" => &mut params.high,
                    _ => {
                        tracing::debug!("Ignoring unknown field '{path}.{field}' in channel '{channel}'");
                        continue;
                    }
                };
                *target = coerce_float(value).ok_or_else(|| {
                    coercion_error(channel, format!("{path}.{field}"), "a finite number", value)
                })?;
            }
        }
    }
    Ok(params)
}

/// Integer coercion: integers, integral floats and numeric strings.
fn coerce_integer<N: DocumentNode>(node: &N) -> Option<i64> {
    match node.kind() {
        NodeKind::Integer => node.as_integer(),
        NodeKind::Float => node
            .as_float()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64),
        NodeKind::String => node.as_string()?.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_octaves<N: DocumentNode>(node: &N) -> Option<u32> {
    coerce_integer(node)
        .and_then(|i| u32::try_from(i).ok())
        .filter(|&octaves| octaves >= 1)
}

/// Float coercion: numbers and numeric strings that stay finite as `f32`.
fn coerce_float<N: DocumentNode>(node: &N) -> Option<f32> {
    let value = match node.kind() {
        NodeKind::Integer | NodeKind::Float => node.as_float()?,
        NodeKind::String => node.as_string()?.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let value = value as f32;
    value.is_finite().then_some(value)
}

fn coercion_error<N: DocumentNode>(
    channel: Channel,
    field: String,
    expected: &'static str,
    node: &N,
) -> DescriptorError {
    DescriptorError::FieldCoercion {
        channel,
        field,
        expected,
        found: describe(node),
    }
}

/// Short human-readable description of a node for diagnostics.
fn describe<N: DocumentNode>(node: &N) -> String {
    match node.kind() {
        NodeKind::String => format!("string {:?}", node.as_string().unwrap_or_default()),
        NodeKind::Integer => format!("integer {}", node.as_integer().unwrap_or_default()),
        NodeKind::Float => format!("float {}", node.as_float().unwrap_or_default()),
        kind => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocValue, DocumentFormat};
    use serde_json::json;

    fn ron(text: &str) -> DocValue {
        DocumentFormat::Ron.parse(text).unwrap()
    }

    #[test]
    fn test_base_entries_sum_in_document_order() {
        let root = ron("(baseHeight: (base: 5.0, base: 2.5, base: -1))");
        let parsed = parse_planet(&root).unwrap();
        assert_eq!(parsed.height.as_ref().unwrap().base_offset, 6.5);
        assert!(parsed.height.as_ref().unwrap().layers.is_empty());
    }

    #[test]
    fn test_layer_overlays_present_fields_on_defaults() {
        let root = ron("(temperature: (ridgedNoise: (octaves: 6, frequency: 0.25, high: 40.0)))");
        let spec = parse_planet(&root).unwrap().temperature.unwrap();
        assert_eq!(spec.layers.len(), 1);

        let layer = &spec.layers[0];
        assert_eq!(layer.kind, NoiseFunctionKind::RidgedNoise);
        assert_eq!(layer.octaves, 6);
        assert_eq!(layer.frequency, 0.25);
        assert_eq!(layer.persistence, 1.0);
        assert_eq!(layer.low, -1.0);
        assert_eq!(layer.high, 40.0);
    }

    #[test]
    fn test_layers_keep_document_order() {
        let root = ron(
            "(baseHeight: (
                ridgedNoise: (octaves: 1),
                base: 3.0,
                ridgedNoise: (octaves: 2),
                ridgedNoise: [(octaves: 3), (octaves: 4)],
            ))",
        );
        let spec = parse_planet(&root).unwrap().height.unwrap();
        let octaves: Vec<u32> = spec.layers.iter().map(|l| l.octaves).collect();
        assert_eq!(octaves, vec![1, 2, 3, 4]);
        assert_eq!(spec.base_offset, 3.0);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let root = json!({
            "name": "Aldrin",
            "baseHeight": {"cellular": {"octaves": 3}, "base": 1, "ridgedNoise": {"seed": 7}}
        });
        let spec = parse_planet(&root).unwrap().height.unwrap();
        assert_eq!(spec.base_offset, 1.0);
        assert_eq!(spec.layers, vec![NoiseFunctionParams::new(NoiseFunctionKind::RidgedNoise)]);
    }

    #[test]
    fn test_numeric_strings_and_integral_floats_coerce() {
        let root = json!({
            "humidity": {"base": "0.5", "ridgedNoise": {"octaves": "3", "persistence": "0.25"}},
            "temperature": {"ridgedNoise": {"octaves": 2.0}}
        });
        let parsed = parse_planet(&root).unwrap();
        let humidity = parsed.humidity.unwrap();
        assert_eq!(humidity.base_offset, 0.5);
        assert_eq!(humidity.layers[0].octaves, 3);
        assert_eq!(humidity.layers[0].persistence, 0.25);
        assert_eq!(parsed.temperature.unwrap().layers[0].octaves, 2);
    }

    #[test]
    fn test_coercion_failure_is_confined_to_its_channel() {
        let root = json!({
            "baseHeight": {"base": 5},
            "temperature": {"ridgedNoise": {"octaves": "oops"}},
            "humidity": {"base": 2}
        });
        let parsed = parse_planet(&root).unwrap();

        assert_eq!(parsed.height.as_ref().unwrap().base_offset, 5.0);
        assert_eq!(parsed.humidity.as_ref().unwrap().base_offset, 2.0);
        assert_eq!(
            parsed.temperature,
            Err(DescriptorError::FieldCoercion {
                channel: Channel::Temperature,
                field: "ridgedNoise.octaves".to_string(),
                expected: "an integer >= 1",
                found: "string \"oops\"".to_string(),
            })
        );
        assert_eq!(parsed.errors().count(), 1);
        assert!(parsed.into_descriptor().is_err());
    }

    #[test]
    fn test_coercion_failure_stops_remaining_entries_and_drops_partial_layer() {
        let root = ron("(baseHeight: (base: 1.0, ridgedNoise: (frequency: 2.0, low: \"x\"), base: 10.0))");
        let mut spec = ChannelSpec::default();
        let err = parse_channel_into(Channel::Height, root.get("baseHeight"), &mut spec).unwrap_err();

        assert!(matches!(err, DescriptorError::FieldCoercion { ref field, .. } if field == "ridgedNoise.low"));
        assert!(spec.layers.is_empty());
        assert_eq!(spec.base_offset, 1.0);
    }

    #[test]
    fn test_non_numeric_base_is_coercion_error() {
        let root = json!({"baseHeight": {"base": true}});
        let err = parse_planet(&root).unwrap().height.unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::FieldCoercion { channel: Channel::Height, ref field, .. } if field == "base"
        ));
    }

    #[test]
    fn test_base_sum_overflow_is_coercion_error() {
        let root = ron("(baseHeight: (base: 3.0e38, base: 3.0e38), humidity: (base: 1.0))");
        let parsed = parse_planet(&root).unwrap();
        assert!(matches!(
            parsed.height,
            Err(DescriptorError::FieldCoercion { channel: Channel::Height, ref field, expected, .. })
                if field == "base" && expected == "a base sum within f32 range"
        ));
        assert_eq!(parsed.humidity.unwrap().base_offset, 1.0);
    }

    #[test]
    fn test_zero_or_negative_octaves_rejected() {
        for octaves in [json!(0), json!(-2), json!(1.5)] {
            let root = json!({"humidity": {"ridgedNoise": {"octaves": octaves}}});
            assert!(parse_planet(&root).unwrap().humidity.is_err());
        }
    }

    #[test]
    fn test_non_mapping_channel_degrades_to_empty() {
        let root = json!({"baseHeight": 12, "temperature": null, "humidity": [1, 2]});
        let descriptor = parse_planet(&root).unwrap().into_descriptor().unwrap();
        assert_eq!(descriptor, PlanetDescriptor::default());
    }

    #[test]
    fn test_missing_channel_node_is_empty() {
        let spec = parse_channel::<DocValue>(Channel::Humidity, None).unwrap();
        assert_eq!(spec, ChannelSpec::default());
    }

    #[test]
    fn test_null_layer_uses_defaults() {
        let root = ron("(baseHeight: (ridgedNoise: ()))");
        let spec = parse_planet(&root).unwrap().height.unwrap();
        assert_eq!(spec.layers, vec![NoiseFunctionParams::new(NoiseFunctionKind::RidgedNoise)]);
    }

    #[test]
    fn test_scalar_layer_value_rejected() {
        let root = json!({"baseHeight": {"ridgedNoise": 4}});
        let err = parse_planet(&root).unwrap().height.unwrap_err();
        assert!(matches!(err, DescriptorError::FieldCoercion { ref field, .. } if field == "ridgedNoise"));
    }

    #[test]
    fn test_repeated_channel_key_accumulates() {
        let root = ron("(humidity: (base: 1.0), humidity: (base: 2.0, ridgedNoise: ()))");
        let spec = parse_planet(&root).unwrap().humidity.unwrap();
        assert_eq!(spec.base_offset, 3.0);
        assert_eq!(spec.layers.len(), 1);
    }

    #[test]
    fn test_scalar_root_rejected() {
        let root = json!(42);
        assert_eq!(
            parse_planet(&root),
            Err(DescriptorError::RootNotMapping {
                found: NodeKind::Integer
            })
        );
        assert!(matches!(
            parse_planet(&DocValue::Null),
            Err(DescriptorError::RootNotMapping {
                found: NodeKind::Null
            })
        ));
    }
}
