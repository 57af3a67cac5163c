//! Per-call and per-pass rendering options.

use crate::backend::{Destination, FilterMode, Size, TargetFormat, TargetSize};
use crate::blend::Blend;
use crate::color::Color;

/// Options for one render call. Unset fields fall back to the producer's defaults.
///
/// ```
/// use shaderpass::{BlendMode, RenderOptions};
///
/// let opts = RenderOptions::new().render_to_screen(true).blend(BlendMode::Add);
/// assert_eq!(opts.resolve().render_to_screen, true);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderOptions {
    pub render_to_screen: Option<bool>,
    pub blend: Option<Blend>,
    /// Blend for the screen blit only. Falls back to `blend`.
    pub screen_blend: Option<Blend>,
    pub clear: Option<bool>,
    pub clear_color: Option<Color>,
    /// Filter used when blitting to the screen: linear if `true`, nearest if `false`.
    pub linear_filter: Option<bool>,
    /// Draw here instead of the producer's own buffer. With `render_to_screen`, the screen
    /// copy shows this destination's contents.
    pub destination: Option<Destination>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `RenderOptions::new().render_to_screen(true)`.
    pub fn to_screen() -> Self {
        Self::new().render_to_screen(true)
    }

    pub fn render_to_screen(mut self, yes: bool) -> Self {
        self.render_to_screen = Some(yes);
        self
    }

    pub fn blend(mut self, blend: impl Into<Blend>) -> Self {
        self.blend = Some(blend.into());
        self
    }

    pub fn screen_blend(mut self, blend: impl Into<Blend>) -> Self {
        self.screen_blend = Some(blend.into());
        self
    }

    pub fn clear(mut self, yes: bool) -> Self {
        self.clear = Some(yes);
        self
    }

    pub fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn linear_filter(mut self, yes: bool) -> Self {
        self.linear_filter = Some(yes);
        self
    }

    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Field-wise merge: values set on `self` win over `defaults`.
    pub fn or(self, defaults: &RenderOptions) -> RenderOptions {
        RenderOptions {
            render_to_screen: self.render_to_screen.or(defaults.render_to_screen),
            blend: self.blend.or(defaults.blend),
            screen_blend: self.screen_blend.or(defaults.screen_blend),
            clear: self.clear.or(defaults.clear),
            clear_color: self.clear_color.or(defaults.clear_color),
            linear_filter: self.linear_filter.or(defaults.linear_filter),
            destination: self.destination.or(defaults.destination),
        }
    }

    /// Fill every unset field with its built-in default.
    pub fn resolve(&self) -> ResolvedOptions {
        let blend = self.blend.unwrap_or_default();
        ResolvedOptions {
            render_to_screen: self.render_to_screen.unwrap_or(false),
            blend,
            screen_blend: self.screen_blend.unwrap_or(blend),
            clear: self.clear.unwrap_or(false),
            clear_color: self.clear_color.unwrap_or(Color::BLACK),
            filter: if self.linear_filter.unwrap_or(true) {
                FilterMode::Linear
            } else {
                FilterMode::Nearest
            },
            destination: self.destination,
        }
    }
}

/// [`RenderOptions`] with every default applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedOptions {
    pub render_to_screen: bool,
    pub blend: Blend,
    pub screen_blend: Blend,
    pub clear: bool,
    pub clear_color: Color,
    pub filter: FilterMode,
    pub destination: Option<Destination>,
}

/// Construction options for a [`RenderPass`](crate::RenderPass).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PassOptions {
    pub size: TargetSize,
    pub double_buffer: bool,
    pub format: TargetFormat,
    /// Defaults for every render call.
    pub render: RenderOptions,
}

impl PassOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = TargetSize::Fixed(Size::new(width, height));
        self
    }

    pub fn double_buffer(mut self, yes: bool) -> Self {
        self.double_buffer = yes;
        self
    }

    pub fn format(mut self, format: TargetFormat) -> Self {
        self.format = format;
        self
    }

    pub fn render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BlendMode;

    #[test]
    fn call_options_override_defaults() {
        let defaults = RenderOptions::new()
            .render_to_screen(true)
            .blend(BlendMode::Add)
            .clear(true);
        let call = RenderOptions::new().render_to_screen(false);

        let merged = call.or(&defaults).resolve();
        assert!(!merged.render_to_screen);
        assert!(merged.clear);
        assert_eq!(merged.blend, Blend::Mode(BlendMode::Add));
    }

    #[test]
    fn screen_blend_falls_back_to_blend() {
        let opts = RenderOptions::new().blend(BlendMode::Transparent).resolve();
        assert_eq!(opts.screen_blend, Blend::Mode(BlendMode::Transparent));

        let opts = RenderOptions::new()
            .blend(BlendMode::Transparent)
            .screen_blend(BlendMode::Normal)
            .resolve();
        assert_eq!(opts.screen_blend, Blend::Mode(BlendMode::Normal));
    }

    #[test]
    fn defaults_are_offscreen_opaque_black_linear() {
        let opts = RenderOptions::new().resolve();
        assert!(!opts.render_to_screen);
        assert!(!opts.clear);
        assert_eq!(opts.clear_color, Color::BLACK);
        assert_eq!(opts.filter, FilterMode::Linear);
        assert_eq!(opts.blend.state(), None);
    }
}
