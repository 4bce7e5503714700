//! Text styling from flat props and `parley` layout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::error::{CompositorError, CompositorResult};
use crate::geometry::color::{Rgba, color_or};
use crate::geometry::rect::{ManifestRect, rect_from_props};
use crate::scene::props::FlatProps;

/// Family used when `fontName` is absent.
pub const DEFAULT_FONT_NAME: &str = "Open Sans";
/// Size used when `fontSize` is absent.
pub const DEFAULT_FONT_SIZE: f64 = 44.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub struct TextBrushRgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl From<Rgba> for TextBrushRgba8 {
    fn from(c: Rgba) -> Self {
        let [r, g, b, a] = c.to_rgba8();
        Self { r, g, b, a }
    }
}

/// Horizontal alignment of text lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    /// Flush left.
    #[default]
    Left,
    /// Centered.
    Center,
    /// Flush right.
    Right,
    /// Justified (last line flush left).
    Justified,
    /// Script-natural direction.
    Natural,
}

impl TextAlign {
    /// Parse a `textAlign` value; anything unknown is `Left`.
    pub fn parse(s: &str) -> Self {
        match s {
            "center" => Self::Center,
            "right" => Self::Right,
            "justified" => Self::Justified,
            "natural" => Self::Natural,
            _ => Self::Left,
        }
    }

    fn to_parley(self) -> parley::Alignment {
        match self {
            Self::Left | Self::Natural => parley::Alignment::Start,
            Self::Center => parley::Alignment::Center,
            Self::Right => parley::Alignment::End,
            Self::Justified => parley::Alignment::Justify,
        }
    }
}

/// Vertical anchor of the `y` prop relative to the laid-out block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OriginY {
    /// `y` is the top of the block.
    #[default]
    Top,
    /// `y` is the vertical center of the block.
    Center,
    /// `y` is the bottom of the block.
    Bottom,
}

impl OriginY {
    /// Parse an `originY` value; anything unknown is `Top`.
    pub fn parse(s: &str) -> Self {
        match s {
            "bottom" => Self::Bottom,
            "center" => Self::Center,
            _ => Self::Top,
        }
    }

    /// Manifest-space shift applied to `y` for a block of `block_height`.
    pub fn shift(self, block_height: f64) -> f64 {
        match self {
            Self::Top => 0.0,
            Self::Center => -block_height / 2.0,
            Self::Bottom => -block_height,
        }
    }
}

/// Blurred drop shadow under the glyphs (no offset).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextShadow {
    /// Shadow color, alpha included.
    pub color: Rgba,
    /// Blur radius in pixels.
    pub blur_radius: f64,
}

/// Text element props, with defaults applied.
#[derive(Clone, Debug, PartialEq)]
pub struct TextStyle {
    /// Text to draw.
    pub value: String,
    /// Requested font family.
    pub font_name: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Fill color with `alpha` applied.
    pub color: Rgba,
    /// Line alignment.
    pub align: TextAlign,
    /// Anchor of `y`.
    pub origin_y: OriginY,
    /// Shadow, present only when both `shadowColor` and `shadowBlurRadius` are set.
    pub shadow: Option<TextShadow>,
    /// Frame rectangle in manifest space; zero width or height means unconstrained.
    pub rect: ManifestRect,
}

impl TextStyle {
    /// Read a text element's props.
    pub fn from_props(props: &FlatProps) -> Self {
        let alpha = props.number_or("alpha", 1.0);
        let color = color_or(&props.text_or("color", "#FFFFFF"), alpha, Rgba::WHITE);

        let shadow = match (props.text("shadowColor"), props.number("shadowBlurRadius")) {
            (Some(hex), Some(blur_radius)) => Some(TextShadow {
                color: color_or(&hex, props.number_or("shadowAlpha", 1.0), Rgba::BLACK),
                blur_radius,
            }),
            _ => None,
        };

        Self {
            value: props.text_or("value", ""),
            font_name: props.text_or("fontName", DEFAULT_FONT_NAME),
            font_size: props.number_or("fontSize", DEFAULT_FONT_SIZE),
            color,
            align: TextAlign::parse(&props.text_or("textAlign", "left")),
            origin_y: OriginY::parse(&props.text_or("originY", "top")),
            shadow,
            rect: rect_from_props(props, None),
        }
    }

    /// Width constraint for line breaking.
    pub fn max_width(&self) -> Option<f32> {
        (self.rect.width > 0.0).then_some(self.rect.width as f32)
    }
}

/// Laid-out text ready to be drawn.
#[derive(Clone)]
pub struct TextBlock {
    /// Source text.
    pub text: String,
    /// Shaped and aligned layout; glyph positions are Y-down from the block's top-left.
    pub layout: parley::Layout<TextBrushRgba8>,
    /// Font bytes the layout was shaped with.
    pub font: Arc<Vec<u8>>,
    /// Glyph fill color.
    pub color: Rgba,
    /// Optional shadow.
    pub shadow: Option<TextShadow>,
    /// Laid-out width.
    pub width: f64,
    /// Laid-out height.
    pub height: f64,
}

impl std::fmt::Debug for TextBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextBlock")
            .field("text", &self.text)
            .field("font_bytes_len", &self.font.len())
            .field("color", &self.color)
            .field("shadow", &self.shadow)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Stateful `parley` layout engine. Fonts are registered once per font buffer.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    families: HashMap<usize, (Arc<Vec<u8>>, String)>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    /// Construct a new layout engine with fresh Parley contexts.
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            families: HashMap::new(),
        }
    }

    fn family_for(&mut self, font: &Arc<Vec<u8>>) -> CompositorResult<String> {
        let key = Arc::as_ptr(font) as usize;
        if let Some((_, name)) = self.families.get(&key) {
            return Ok(name.clone());
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font.as_ref().clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            CompositorError::resource_unavailable("no font families registered from font bytes")
        })?;
        let name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| {
                CompositorError::resource_unavailable("registered font family has no name")
            })?
            .to_string();

        // The Arc is kept so the pointer key cannot be reused by another buffer.
        self.families.insert(key, (Arc::clone(font), name.clone()));
        Ok(name)
    }

    /// Shape, break and align `style.value` with `font`.
    pub fn layout(&mut self, style: &TextStyle, font: Arc<Vec<u8>>) -> CompositorResult<TextBlock> {
        let size_px = style.font_size as f32;
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(CompositorError::invalid_property(
                "fontSize must be finite and > 0",
            ));
        }

        let family = self.family_for(&font)?;
        let text = style.value.as_str();
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrushRgba8::from(
            style.color,
        )));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        let max_width = style.max_width();
        layout.break_all_lines(max_width);
        layout.align(
            max_width,
            style.align.to_parley(),
            parley::AlignmentOptions::default(),
        );

        Ok(TextBlock {
            text: style.value.clone(),
            width: f64::from(max_width.unwrap_or_else(|| layout.width())),
            height: f64::from(layout.height()),
            layout,
            font,
            color: style.color,
            shadow: style.shadow,
        })
    }
}

thread_local! {
    static ENGINE: RefCell<TextLayoutEngine> = RefCell::new(TextLayoutEngine::new());
}

/// Lay out `style` on this thread's engine.
pub fn layout_text(style: &TextStyle, font: Arc<Vec<u8>>) -> CompositorResult<TextBlock> {
    ENGINE.with(|engine| engine.borrow_mut().layout(style, font))
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
