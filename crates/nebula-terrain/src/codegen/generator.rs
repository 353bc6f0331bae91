//! Source generator: lowers three channel descriptors into one WGSL
//! fragment program.
//!
//! The emitted entry point initializes one accumulator per channel with the
//! channel's base offset, then appends every layer's statements in document
//! order: height layers first, then temperature, then humidity.

use super::ast::{AssignOp, EntryPoint, Expr, Stage, Stmt, WgslWriter};
use crate::noise_layer::{Channel, ChannelSpec, NoiseFunctionKind, NoiseFunctionParams, PlanetDescriptor};

/// Noise primitives and the `GenInput`/`GenOutput` interface structs.
pub const NOISE_LIBRARY: &str = include_str!("noise.wgsl");

/// Name of the generated fragment entry point.
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// 3D noise function provided by [`NOISE_LIBRARY`].
pub const NOISE_PRIMITIVE: &str = "snoise";

const INPUT: &str = "in";
const INPUT_TYPE: &str = "GenInput";
const OUTPUT_TYPE: &str = "GenOutput";
const POSITION: &str = "position";

const TOTAL: &str = "total";
const AMPLITUDE: &str = "amplitude";
const MAX_AMPLITUDE: &str = "maxAmplitude";
const FREQUENCY: &str = "frequency";
const OCTAVE: &str = "octave";

/// Generates the complete fragment source for three channels.
pub fn generate(height: &ChannelSpec, temperature: &ChannelSpec, humidity: &ChannelSpec) -> String {
    let mut writer = WgslWriter::new();
    writer.write_raw(NOISE_LIBRARY);
    writer.write_raw("");
    writer.write_entry_point(&build_entry_point(height, temperature, humidity));
    writer.finish()
}

/// Generates the fragment source for a parsed planet descriptor.
pub fn generate_descriptor(descriptor: &PlanetDescriptor) -> String {
    generate(
        descriptor.channel(Channel::Height),
        descriptor.channel(Channel::Temperature),
        descriptor.channel(Channel::Humidity),
    )
}

/// Builds the fragment entry point syntax tree.
pub fn build_entry_point(
    height: &ChannelSpec,
    temperature: &ChannelSpec,
    humidity: &ChannelSpec,
) -> EntryPoint {
    let channels = [
        (Channel::Height, height),
        (Channel::Temperature, temperature),
        (Channel::Humidity, humidity),
    ];

    let mut body = vec![
        Stmt::Let {
            name: POSITION.to_string(),
            init: Expr::member(Expr::ident(INPUT), POSITION),
        },
        Stmt::var(TOTAL, "f32", None),
        Stmt::var(AMPLITUDE, "f32", None),
        Stmt::var(MAX_AMPLITUDE, "f32", None),
        Stmt::var(FREQUENCY, "f32", None),
    ];

    for (channel, spec) in channels {
        body.push(Stmt::var(
            channel.symbol(),
            "f32",
            Some(Expr::Float(spec.base_offset)),
        ));
    }

    for (channel, spec) in channels {
        for (index, layer) in spec.layers.iter().enumerate() {
            body.push(Stmt::Comment(format!(
                "{channel} layer {index}: {}",
                layer.kind
            )));
            body.extend(layer_statements(channel, layer));
        }
    }

    body.push(Stmt::Return(Expr::call(
        OUTPUT_TYPE,
        Channel::ALL
            .into_iter()
            .map(|channel| Expr::ident(channel.symbol()))
            .collect(),
    )));

    EntryPoint {
        stage: Stage::Fragment,
        name: FRAGMENT_ENTRY_POINT.to_string(),
        params: vec![(INPUT.to_string(), INPUT_TYPE.to_string())],
        return_type: OUTPUT_TYPE.to_string(),
        body,
    }
}

/// Statements evaluating one layer and adding it to the channel accumulator.
pub fn layer_statements(channel: Channel, layer: &NoiseFunctionParams) -> Vec<Stmt> {
    match layer.kind {
        NoiseFunctionKind::RidgedNoise => ridged_noise(channel, layer),
    }
}

fn ridged_noise(channel: Channel, layer: &NoiseFunctionParams) -> Vec<Stmt> {
    let octave_body = vec![
        Stmt::assign(
            TOTAL,
            AssignOp::Add,
            Expr::call(
                NOISE_PRIMITIVE,
                vec![Expr::ident(POSITION).mul(Expr::ident(FREQUENCY))],
            )
            .mul(Expr::ident(AMPLITUDE)),
        ),
        Stmt::assign(FREQUENCY, AssignOp::Mul, Expr::Float(2.0)),
        Stmt::assign(MAX_AMPLITUDE, AssignOp::Add, Expr::ident(AMPLITUDE)),
        Stmt::assign(AMPLITUDE, AssignOp::Mul, Expr::Float(layer.persistence)),
    ];

    vec![
        Stmt::assign(TOTAL, AssignOp::Set, Expr::Float(0.0)),
        Stmt::assign(AMPLITUDE, AssignOp::Set, Expr::Float(1.0)),
        Stmt::assign(MAX_AMPLITUDE, AssignOp::Set, Expr::Float(0.0)),
        Stmt::assign(FREQUENCY, AssignOp::Set, Expr::Float(layer.frequency)),
        Stmt::Repeat {
            counter: OCTAVE.to_string(),
            count: layer.octaves,
            body: octave_body,
        },
        Stmt::assign(channel.symbol(), AssignOp::Add, scaled_output(layer)),
    ]
}

/// `total / maxAmplitude`, remapped from `[-1, 1]` to `[low, high]` when the
/// layer sets a custom range.
fn scaled_output(layer: &NoiseFunctionParams) -> Expr {
    let normalized = Expr::ident(TOTAL).div(Expr::ident(MAX_AMPLITUDE));
    if !layer.has_custom_range() {
        return normalized;
    }

    let high = || Expr::Float(layer.high);
    let low = || Expr::Float(layer.low);
    Expr::group(normalized)
        .mul(Expr::group(high().sub(low())))
        .mul(Expr::Float(0.5))
        .add(Expr::group(high().add(low())).mul(Expr::Float(0.5)))
}
