//! Blend modes applied when a pass writes over existing destination contents.

use serde::{Deserialize, Serialize};

/// The built-in color-combining functions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// Blending disabled; the pass overwrites the destination.
    #[default]
    Normal,
    /// Standard alpha-over.
    Transparent,
    /// Additive.
    Add,
    /// Multiplies the destination by the source color.
    Multiply,
}

impl BlendMode {
    /// The wgpu blend state for this mode, or `None` when blending is disabled.
    pub fn state(self) -> Option<wgpu::BlendState> {
        use wgpu::{BlendComponent, BlendFactor, BlendOperation, BlendState};

        let component = |src_factor, dst_factor| BlendComponent {
            src_factor,
            dst_factor,
            operation: BlendOperation::Add,
        };

        match self {
            BlendMode::Normal => None,
            BlendMode::Transparent => {
                let c = component(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
                Some(BlendState { color: c, alpha: c })
            }
            BlendMode::Add => {
                let c = component(BlendFactor::One, BlendFactor::One);
                Some(BlendState { color: c, alpha: c })
            }
            BlendMode::Multiply => {
                let c = component(BlendFactor::Dst, BlendFactor::OneMinusSrcAlpha);
                Some(BlendState { color: c, alpha: c })
            }
        }
    }
}

/// A blend selection: one of the built-in modes or a raw wgpu blend state.
///
/// wgpu bakes blending into the pipeline, so a custom blend is expressed as the
/// state it would set up rather than as a callback issuing API calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Blend {
    Mode(BlendMode),
    Custom(wgpu::BlendState),
}

impl Blend {
    pub fn state(self) -> Option<wgpu::BlendState> {
        match self {
            Blend::Mode(mode) => mode.state(),
            Blend::Custom(state) => Some(state),
        }
    }
}

impl Default for Blend {
    fn default() -> Self {
        Blend::Mode(BlendMode::Normal)
    }
}

impl From<BlendMode> for Blend {
    fn from(mode: BlendMode) -> Self {
        Blend::Mode(mode)
    }
}

impl From<wgpu::BlendState> for Blend {
    fn from(state: wgpu::BlendState) -> Self {
        Blend::Custom(state)
    }
}
