// Render state knobs a backend binds before the batched draw.

/// How quad colors combine with the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Premultiplied alpha.
    #[default]
    AlphaBlend,
    Additive,
    Opaque,
    NonPremultiplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerMode {
    #[default]
    PointClamp,
    PointWrap,
    LinearClamp,
    LinearWrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthMode {
    #[default]
    None,
    Read,
    ReadWrite,
}

/// Which triangle winding gets culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState {
    pub blend: BlendMode,
    pub sampler: SamplerMode,
    pub depth: DepthMode,
    pub cull: CullMode,
}

impl BlendMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "alpha" | "alpha_blend" => Some(BlendMode::AlphaBlend),
            "additive" => Some(BlendMode::Additive),
            "opaque" => Some(BlendMode::Opaque),
            "non_premultiplied" => Some(BlendMode::NonPremultiplied),
            _ => None,
        }
    }
}

impl SamplerMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "point_clamp" => Some(SamplerMode::PointClamp),
            "point_wrap" => Some(SamplerMode::PointWrap),
            "linear_clamp" => Some(SamplerMode::LinearClamp),
            "linear_wrap" => Some(SamplerMode::LinearWrap),
            _ => None,
        }
    }

    pub fn is_linear(self) -> bool {
        matches!(self, SamplerMode::LinearClamp | SamplerMode::LinearWrap)
    }

    pub fn wraps(self) -> bool {
        matches!(self, SamplerMode::PointWrap | SamplerMode::LinearWrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = RenderState::default();
        assert_eq!(state.blend, BlendMode::AlphaBlend);
        assert_eq!(state.sampler, SamplerMode::PointClamp);
        assert_eq!(state.depth, DepthMode::None);
        assert_eq!(state.cull, CullMode::None);
    }

    #[test]
    fn test_names() {
        assert_eq!(BlendMode::from_name("Additive"), Some(BlendMode::Additive));
        assert_eq!(BlendMode::from_name("glow"), None);
        assert_eq!(SamplerMode::from_name("linear_wrap"), Some(SamplerMode::LinearWrap));
        assert!(SamplerMode::LinearWrap.is_linear() && SamplerMode::LinearWrap.wraps());
    }
}
