// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Immutable pipeline state descriptors.
//!
//! A descriptor bundles rasterizer, depth/stencil and blend state together with
//! a shader reference. Descriptors are compared by value; two logically equal
//! configurations always resolve to the same cached pipeline.

use crate::cairn_bitflags;
use std::borrow::Cow;

/// Which kind of pipeline a descriptor builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineType {
    /// Rasterization pipeline.
    #[default]
    Graphics,
    /// Compute pipeline. Carries no raster, depth or blend state.
    Compute,
}

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Each vertex is a point.
    PointList,
    /// Every two vertices form a line.
    LineList,
    /// Every three vertices form a triangle.
    #[default]
    TriangleList,
    /// Triangles share edges with their predecessor.
    TriangleStrip,
}

/// Winding order that defines front faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise.
    #[default]
    Ccw,
    /// Clockwise.
    Cw,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Polygon rasterization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    /// Filled polygons.
    #[default]
    Fill,
    /// Outlines only.
    Line,
}

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less than the stored one.
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less than or equal to the stored one.
    LessEqual,
    /// Passes if the new value is greater than the stored one.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the new value is greater than or equal to the stored one.
    GreaterEqual,
    /// Always passes.
    #[default]
    Always,
}

/// Operation applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set the value to zero.
    Zero,
    /// Replace the value with the reference.
    Replace,
    /// Bitwise invert.
    Invert,
    /// Increment with clamping.
    IncrementClamp,
    /// Decrement with clamping.
    DecrementClamp,
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0.
    Zero,
    /// 1.
    One,
    /// Source alpha.
    SrcAlpha,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
    /// Destination color.
    Dst,
}

/// Blend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    /// src + dst.
    #[default]
    Add,
    /// src - dst.
    Subtract,
    /// min(src, dst).
    Min,
    /// max(src, dst).
    Max,
}

cairn_bitflags! {
    /// Color channels a pipeline writes.
    pub struct ColorWrites: u32 {
        /// Red channel.
        const RED = 1 << 0;
        /// Green channel.
        const GREEN = 1 << 1;
        /// Blue channel.
        const BLUE = 1 << 2;
        /// Alpha channel.
        const ALPHA = 1 << 3;
        /// All channels.
        const ALL = 0b1111;
    }
}

/// Describes the state for primitive assembly and rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrimitiveState {
    /// The topology of the primitives.
    pub topology: PrimitiveTopology,
    /// The vertex winding order that determines the "front" face of a triangle.
    pub front_face: FrontFace,
    /// The face culling mode.
    pub cull_mode: Option<CullMode>,
    /// The rasterization mode for polygons.
    pub polygon_mode: PolygonMode,
    /// If `true`, disables clipping of fragments based on their depth.
    pub unclipped_depth: bool,
}

/// Describes the stencil test and operations for a single face.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    /// The comparison function used for the stencil test.
    pub compare: CompareFunction,
    /// The operation to perform if the stencil test fails.
    pub fail_op: StencilOperation,
    /// The operation to perform if the stencil test passes but the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// The operation to perform if both tests pass.
    pub pass_op: StencilOperation,
}

/// Describes depth biasing, used to prevent z-fighting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthBiasState {
    /// A constant value added to the depth of each fragment.
    pub constant: i32,
    /// A factor that scales with the fragment's depth slope.
    pub slope_scale: f32,
    /// The maximum bias that can be applied.
    pub clamp: f32,
}

/// Describes the state for depth and stencil testing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthStencilState {
    /// If `true`, depth values are written.
    pub depth_write_enabled: bool,
    /// The comparison function used for the depth test.
    pub depth_compare: CompareFunction,
    /// Stencil state for front faces. `None` disables the stencil test.
    pub stencil: Option<StencilState>,
    /// Depth bias.
    pub bias: DepthBiasState,
}

/// Stencil test configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// The stencil state for front-facing primitives.
    pub front: StencilFaceState,
    /// The stencil state for back-facing primitives.
    pub back: StencilFaceState,
    /// The reference value.
    pub reference: u32,
    /// A bitmask for reading from the stencil buffer.
    pub read_mask: u32,
    /// A bitmask for writing to the stencil buffer.
    pub write_mask: u32,
}

/// One blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    /// Factor applied to the source.
    pub src_factor: BlendFactor,
    /// Factor applied to the destination.
    pub dst_factor: BlendFactor,
    /// Combining operation.
    pub operation: BlendOperation,
}

/// Blend state for the color and alpha channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Color channels.
    pub color: BlendComponent,
    /// Alpha channel.
    pub alpha: BlendComponent,
}

impl BlendState {
    /// Classic `src * a + dst * (1 - a)` blending.
    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent {
            src_factor: BlendFactor::One,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
    };
}

/// A reference to a shader program, resolved by the shader system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderRef {
    /// Program name.
    pub name: Cow<'static, str>,
    /// Preprocessor defines the program variant is compiled with.
    pub defines: Vec<Cow<'static, str>>,
}

impl ShaderRef {
    /// References a program without defines.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            defines: Vec::new(),
        }
    }

    /// Adds a define.
    #[must_use]
    pub fn with_define(mut self, define: impl Into<Cow<'static, str>>) -> Self {
        self.defines.push(define.into());
        self
    }
}

/// The full, immutable description of a pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineDescriptor {
    /// An optional debug label.
    pub label: Option<Cow<'static, str>>,
    /// Graphics or compute.
    pub pipeline_type: PipelineType,
    /// Shader program.
    pub shader: ShaderRef,
    /// Rasterizer state.
    pub primitive: PrimitiveState,
    /// Depth and stencil state. `None` disables depth testing.
    pub depth_stencil: Option<DepthStencilState>,
    /// Blend state. `None` writes colors unblended.
    pub blend: Option<BlendState>,
    /// Color write mask.
    pub color_writes: ColorWrites,
}

impl PipelineDescriptor {
    /// A graphics pipeline with default state writing all color channels.
    pub fn graphics(shader: ShaderRef) -> Self {
        Self {
            shader,
            color_writes: ColorWrites::ALL,
            ..Default::default()
        }
    }

    /// A compute pipeline.
    pub fn compute(shader: ShaderRef) -> Self {
        Self {
            pipeline_type: PipelineType::Compute,
            shader,
            ..Default::default()
        }
    }
}
