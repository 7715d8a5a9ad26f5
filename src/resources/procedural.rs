//! Offscreen rasterization of procedural colour maps.
//!
//! The laptop and monitor screens are textured with images painted on the CPU:
//! a syntax-highlighted code listing and a dashboard-style UI mockup. Glyphs
//! are rasterized as solid cells in the colour of their token class, which is
//! what text reads as at the distance these screens are seen from.
//!
//! Generation failure is never fatal. Callers use [`map_or_flat`] which logs
//! and returns `None`, leaving the mesh with its flat material colour.

use image::{Rgba, RgbaImage};

use crate::{config::ThemeColors, error::EngineError};

/// Largest edge accepted for a generated map.
pub const MAX_TEXTURE_SIZE: u32 = 4096;

const SNIPPET: &[&str] = &[
    "use std::collections::HashMap;",
    "",
    "// portfolio: featured projects",
    "pub struct Project {",
    "    name: String,",
    "    stars: u32,",
    "    tags: Vec<String>,",
    "}",
    "",
    "impl Project {",
    "    pub fn new(name: &str) -> Self {",
    "        Self { name: name.into(), stars: 0, tags: vec![] }",
    "    }",
    "",
    "    pub fn score(&self) -> f32 {",
    "        let weight = 1.5 * self.tags.len() as f32;",
    "        self.stars as f32 + weight",
    "    }",
    "}",
    "",
    "fn main() {",
    "    let mut index = HashMap::new();",
    "    for name in [\"engine\", \"shader\", \"site\"] {",
    "        index.insert(name, Project::new(name));",
    "    }",
    "    // ship it",
    "    println!(\"{} projects\", index.len());",
    "}",
];

const KEYWORDS: &[&str] = &[
    "use", "pub", "struct", "impl", "fn", "let", "mut", "for", "in", "as", "Self", "self", "return",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Space,
    Keyword,
    Ident,
    Type,
    Str,
    Number,
    Comment,
    Punct,
}

struct CodePalette {
    background: Rgba<u8>,
    gutter: Rgba<u8>,
    keyword: Rgba<u8>,
    ident: Rgba<u8>,
    ty: Rgba<u8>,
    string: Rgba<u8>,
    number: Rgba<u8>,
    comment: Rgba<u8>,
    punct: Rgba<u8>,
}

impl CodePalette {
    fn from_theme(theme: &ThemeColors) -> Self {
        Self {
            background: rgba([0.05, 0.06, 0.10], 1.0),
            gutter: rgba([0.35, 0.38, 0.45], 1.0),
            keyword: rgba(theme.secondary, 1.0),
            ident: rgba([0.86, 0.88, 0.92], 1.0),
            ty: rgba(theme.accent, 1.0),
            string: rgba([0.55, 0.85, 0.45], 1.0),
            number: rgba([0.98, 0.70, 0.35], 1.0),
            comment: rgba([0.42, 0.46, 0.52], 1.0),
            punct: rgba(theme.primary, 1.0),
        }
    }

    fn color(&self, token: Token) -> Option<Rgba<u8>> {
        match token {
            Token::Space => None,
            Token::Keyword => Some(self.keyword),
            Token::Ident => Some(self.ident),
            Token::Type => Some(self.ty),
            Token::Str => Some(self.string),
            Token::Number => Some(self.number),
            Token::Comment => Some(self.comment),
            Token::Punct => Some(self.punct),
        }
    }
}

fn rgba(c: [f32; 3], a: f32) -> Rgba<u8> {
    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba([to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(a)])
}

/// Classifies every character of a line.
fn classify(line: &str) -> Vec<Token> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = vec![Token::Space; chars.len()];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            tokens[i..].iter_mut().for_each(|t| *t = Token::Comment);
            break;
        }
        if c == '"' {
            let end = chars[i + 1..]
                .iter()
                .position(|c| *c == '"')
                .map_or(chars.len(), |p| i + 2 + p);
            tokens[i..end].iter_mut().for_each(|t| *t = Token::Str);
            i = end;
            continue;
        }
        if c.is_ascii_alphanumeric() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let token = if KEYWORDS.contains(&word.as_str()) {
                Token::Keyword
            } else if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
                Token::Number
            } else if word.starts_with(|c: char| c.is_ascii_uppercase()) {
                Token::Type
            } else {
                Token::Ident
            };
            tokens[start..i].iter_mut().for_each(|t| *t = token);
            continue;
        }
        if !c.is_whitespace() {
            tokens[i] = Token::Punct;
        }
        i += 1;
    }
    tokens
}

fn check_size(width: u32, height: u32) -> Result<(), EngineError> {
    if width == 0 || height == 0 || width > MAX_TEXTURE_SIZE || height > MAX_TEXTURE_SIZE {
        return Err(EngineError::TextureGeneration(format!(
            "unsupported canvas size {width}x{height}"
        )));
    }
    Ok(())
}

fn fill_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let (iw, ih) = img.dimensions();
    for py in y.min(ih)..(y + h).min(ih) {
        for px in x.min(iw)..(x + w).min(iw) {
            img.put_pixel(px, py, color);
        }
    }
}

/// Paints the code listing onto a `width` x `height` canvas.
pub fn render_code_texture(width: u32, height: u32, theme: &ThemeColors) -> Result<RgbaImage, EngineError> {
    check_size(width, height)?;
    let palette = CodePalette::from_theme(theme);
    let mut img = RgbaImage::from_pixel(width, height, palette.background);

    let columns = 60u32;
    let glyph_w = (width / columns).max(1);
    let line_h = (height / SNIPPET.len() as u32).max(2);
    let glyph_h = (line_h * 3 / 5).max(1);
    let gutter = glyph_w * 4;

    for (row, line) in SNIPPET.iter().enumerate() {
        let y = row as u32 * line_h + (line_h - glyph_h) / 2;
        // line number stub in the gutter
        fill_rect(&mut img, glyph_w, y, glyph_w * 2, glyph_h, palette.gutter);
        for (col, token) in classify(line).into_iter().enumerate() {
            if let Some(color) = palette.color(token) {
                let x = gutter + col as u32 * glyph_w;
                fill_rect(&mut img, x, y, glyph_w.saturating_sub(1).max(1), glyph_h, color);
            }
        }
    }
    Ok(img)
}

/// Paints a dashboard mockup: title bar, sidebar, chart bars and content cards.
pub fn render_ui_mockup(width: u32, height: u32, theme: &ThemeColors) -> Result<RgbaImage, EngineError> {
    check_size(width, height)?;
    let background = rgba(theme.background, 1.0);
    let surface = rgba(theme.surface, 1.0);
    let primary = rgba(theme.primary, 1.0);
    let accent = rgba(theme.accent, 1.0);
    let text = rgba(theme.text, 1.0);
    let mut img = RgbaImage::from_pixel(width, height, background);

    let bar_h = (height / 12).max(1);
    fill_rect(&mut img, 0, 0, width, bar_h, surface);
    for dot in 0..3u32 {
        let size = (bar_h / 2).max(1);
        fill_rect(&mut img, size + dot * size * 2, size / 2, size, size, accent);
    }

    let sidebar_w = (width / 6).max(1);
    fill_rect(&mut img, 0, bar_h, sidebar_w, height - bar_h, surface);
    let item_h = (height / 16).max(1);
    for item in 0..6u32 {
        let y = bar_h + item_h + item * item_h * 2;
        let color = if item == 1 { primary } else { text };
        fill_rect(&mut img, sidebar_w / 6, y, sidebar_w * 2 / 3, (item_h / 2).max(1), color);
    }

    let content_x = sidebar_w + width / 24;
    let content_w = width.saturating_sub(content_x + width / 24);
    let chart_top = bar_h + height / 10;
    let chart_h = height / 3;
    let bars = 10u32;
    let slot = (content_w / bars).max(1);
    for b in 0..bars {
        let level = 0.35 + 0.6 * (((b as f32) * 1.7).sin() * 0.5 + 0.5);
        let bh = (chart_h as f32 * level) as u32;
        let color = if b % 3 == 0 { accent } else { primary };
        fill_rect(
            &mut img,
            content_x + b * slot + slot / 5,
            chart_top + chart_h - bh,
            (slot * 3 / 5).max(1),
            bh,
            color,
        );
    }

    let cards_top = chart_top + chart_h + height / 16;
    let card_w = (content_w / 3).saturating_sub(width / 48).max(1);
    let card_h = height.saturating_sub(cards_top + height / 16);
    for c in 0..3u32 {
        let x = content_x + c * (card_w + width / 48);
        fill_rect(&mut img, x, cards_top, card_w, card_h, surface);
        fill_rect(&mut img, x + card_w / 8, cards_top + card_h / 6, card_w / 2, (card_h / 10).max(1), text);
        fill_rect(&mut img, x + card_w / 8, cards_top + card_h / 2, card_w * 3 / 4, (card_h / 6).max(1), primary);
    }
    Ok(img)
}

/// Unwraps a generated map, degrading to `None` (flat colour) on failure.
pub fn map_or_flat(result: Result<RgbaImage, EngineError>, what: &str) -> Option<RgbaImage> {
    match result {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("{what}: {e}. Falling back to a flat material.");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_syntax() {
        let tokens = classify("let x = \"hi\"; // done");
        assert_eq!(&tokens[0..3], &[Token::Keyword; 3]);
        assert_eq!(tokens[4], Token::Ident);
        assert_eq!(tokens[6], Token::Punct);
        assert_eq!(&tokens[8..12], &[Token::Str; 4]);
        assert_eq!(*tokens.last().unwrap(), Token::Comment);
    }

    #[test]
    fn code_texture_paints_tokens_over_background() {
        let theme = ThemeColors::dark();
        let img = render_code_texture(256, 160, &theme).unwrap();
        assert_eq!(img.dimensions(), (256, 160));
        let background = CodePalette::from_theme(&theme).background;
        let painted = img.pixels().filter(|p| **p != background).count();
        assert!(painted > 0);
        assert!(painted < (256 * 160) as usize);
    }

    #[test]
    fn unsupported_sizes_degrade_to_flat() {
        let theme = ThemeColors::light();
        assert!(render_code_texture(0, 64, &theme).is_err());
        assert!(render_ui_mockup(64, MAX_TEXTURE_SIZE + 1, &theme).is_err());
        assert!(map_or_flat(render_ui_mockup(0, 0, &theme), "monitor").is_none());
        assert!(map_or_flat(render_ui_mockup(128, 80, &theme), "monitor").is_some());
    }
}
