//! # 样式属性值的解析函数
//!
//! 每个函数接收属性的原始字符串，成功时返回 [`StyleValue`]，
//! 无法解析时返回 `None`，由调用方报告并丢弃该属性。

use once_cell::sync::Lazy;
use regex::Regex;

use super::value::{
    Color, Edge, EdgeOffset, EmphasisColor, LengthPair, Position, RubyReserve, SpecifiedShadow,
    StyleValue, TextEmphasis, TextOutline,
};
use crate::length::{Length, LengthUnit, parse_length};

static HEX_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})?$")
        .expect("未能编译 HEX_COLOR_REGEX")
});

static RGB_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgb\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)$").expect("未能编译 RGB_COLOR_REGEX")
});

static RGBA_COLOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba\(\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*(\d+)\s*\)$")
        .expect("未能编译 RGBA_COLOR_REGEX")
});

/// 逗号分隔多个阴影，但括号内的逗号（如 `rgba(...)`）不算分隔符。
static SHADOW_SPLIT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[^(,)]|\([^)]+\))+").expect("未能编译 SHADOW_SPLIT_REGEX")
});

const NAMED_COLORS: &[(&str, Color)] = &[
    ("transparent", Color::rgba(0, 0, 0, 0)),
    ("black", Color::rgba(0, 0, 0, 255)),
    ("silver", Color::rgba(192, 192, 192, 255)),
    ("gray", Color::rgba(128, 128, 128, 255)),
    ("white", Color::rgba(255, 255, 255, 255)),
    ("maroon", Color::rgba(128, 0, 0, 255)),
    ("red", Color::rgba(255, 0, 0, 255)),
    ("purple", Color::rgba(128, 0, 128, 255)),
    ("fuchsia", Color::rgba(255, 0, 255, 255)),
    ("magenta", Color::rgba(255, 0, 255, 255)),
    ("green", Color::rgba(0, 128, 0, 255)),
    ("lime", Color::rgba(0, 255, 0, 255)),
    ("olive", Color::rgba(128, 128, 0, 255)),
    ("yellow", Color::rgba(255, 255, 0, 255)),
    ("navy", Color::rgba(0, 0, 128, 255)),
    ("blue", Color::rgba(0, 0, 255, 255)),
    ("teal", Color::rgba(0, 128, 128, 255)),
    ("aqua", Color::rgba(0, 255, 255, 255)),
    ("cyan", Color::rgba(0, 255, 255, 255)),
];

/// 解析命名颜色（不区分大小写）、`#rrggbb[aa]`、`rgb(r,g,b)` 和 `rgba(r,g,b,a)`。
#[must_use]
pub fn parse_color(input: &str) -> Option<Color> {
    if let Some((_, color)) = NAMED_COLORS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input))
    {
        return Some(*color);
    }

    if let Some(caps) = HEX_COLOR_REGEX.captures(input) {
        let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok();
        let alpha = match caps.get(4) {
            Some(m) => u8::from_str_radix(m.as_str(), 16).ok()?,
            None => 255,
        };
        return Some(Color::rgba(channel(1)?, channel(2)?, channel(3)?, alpha));
    }

    if let Some(caps) = RGB_COLOR_REGEX.captures(input) {
        let channel = |i: usize| caps[i].parse::<u8>().ok();
        return Some(Color::rgba(channel(1)?, channel(2)?, channel(3)?, 255));
    }

    if let Some(caps) = RGBA_COLOR_REGEX.captures(input) {
        let channel = |i: usize| caps[i].parse::<u8>().ok();
        return Some(Color::rgba(
            channel(1)?,
            channel(2)?,
            channel(3)?,
            channel(4)?,
        ));
    }

    None
}

pub(crate) fn parse_keyword(input: &str) -> Option<StyleValue> {
    Some(StyleValue::keyword(input))
}

pub(crate) fn parse_color_value(input: &str) -> Option<StyleValue> {
    parse_color(input).map(StyleValue::Color)
}

pub(crate) fn parse_length_value(input: &str) -> Option<StyleValue> {
    parse_length(input).map(StyleValue::Length)
}

pub(crate) fn parse_bool(input: &str) -> Option<StyleValue> {
    Some(StyleValue::Bool(input == "true"))
}

pub(crate) fn parse_opacity(input: &str) -> Option<StyleValue> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(StyleValue::Number)
}

pub(crate) fn parse_z_index(input: &str) -> Option<StyleValue> {
    if input == "auto" {
        return Some(StyleValue::keyword(input));
    }
    input.trim().parse::<i64>().ok().map(StyleValue::Integer)
}

/// `tts:extent` 与 `tts:origin`：`auto` 或两个长度。
pub(crate) fn parse_length_pair(input: &str) -> Option<StyleValue> {
    if input == "auto" {
        return Some(StyleValue::keyword(input));
    }
    let mut parts = input.split(' ');
    let w = parse_length(parts.next()?)?;
    let h = parse_length(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(StyleValue::LengthPair(LengthPair { w, h }))
}

pub(crate) fn parse_line_height(input: &str) -> Option<StyleValue> {
    if input == "normal" {
        return Some(StyleValue::keyword(input));
    }
    parse_length_value(input)
}

/// 逗号分隔的字体族列表。未加引号的 `default` 映射为 `monospaceSerif`。
#[must_use]
pub fn parse_font_family(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .map(|family| {
            if family == "default" {
                "monospaceSerif".to_owned()
            } else {
                family.to_owned()
            }
        })
        .collect()
}

pub(crate) fn parse_font_family_value(input: &str) -> Option<StyleValue> {
    Some(StyleValue::FontFamily(parse_font_family(input)))
}

pub(crate) fn parse_padding(input: &str) -> Option<StyleValue> {
    let lengths = input
        .split(' ')
        .map(parse_length)
        .collect::<Option<Vec<_>>>()?;
    if lengths.len() > 4 {
        return None;
    }
    Some(StyleValue::Lengths(lengths))
}

enum PositionToken<'a> {
    Keyword(&'a str),
    Offset(Length),
}

fn is_position_keyword(token: &str) -> bool {
    matches!(token, "center" | "left" | "top" | "bottom" | "right")
}

/// 解析 1 到 4 个分量的 `tts:position`。
///
/// 关键字后面跟随的偏移量只在分量数不为 2 时生效；
/// 只有一个或两个分量时允许裸偏移量，依次作为水平和垂直偏移。
#[must_use]
pub fn parse_position(input: &str) -> Option<Position> {
    let tokens = input
        .split(' ')
        .map(|t| {
            if is_position_keyword(t) {
                Some(PositionToken::Keyword(t))
            } else {
                parse_length(t).map(PositionToken::Offset)
            }
        })
        .collect::<Option<Vec<_>>>()?;

    if tokens.len() > 4 {
        return None;
    }

    let centered = Length::new(50.0, LengthUnit::Percent);
    let mut position = Position {
        h: EdgeOffset {
            edge: Edge::Left,
            offset: centered,
        },
        v: EdgeOffset {
            edge: Edge::Top,
            offset: centered,
        },
    };

    let count = tokens.len();
    let mut i = 0;
    while i < count {
        let token = &tokens[i];
        i += 1;
        match token {
            PositionToken::Keyword(keyword) => {
                let mut offset = Length::new(0.0, LengthUnit::Percent);
                if count != 2
                    && let Some(PositionToken::Offset(next)) = tokens.get(i)
                {
                    offset = *next;
                    i += 1;
                }
                match *keyword {
                    "right" => position.h = EdgeOffset { edge: Edge::Right, offset },
                    "bottom" => position.v = EdgeOffset { edge: Edge::Bottom, offset },
                    "left" => position.h.offset = offset,
                    "top" => position.v.offset = offset,
                    _ => {}
                }
            }
            PositionToken::Offset(offset) if count <= 2 => {
                if i == 1 {
                    position.h.offset = *offset;
                } else {
                    position.v.offset = *offset;
                }
            }
            PositionToken::Offset(_) => return None,
        }
    }

    Some(position)
}

pub(crate) fn parse_position_value(input: &str) -> Option<StyleValue> {
    parse_position(input).map(StyleValue::Position)
}

pub(crate) fn parse_ruby_align(input: &str) -> Option<StyleValue> {
    matches!(input, "center" | "spaceAround").then(|| StyleValue::keyword(input))
}

pub(crate) fn parse_text_combine(input: &str) -> Option<StyleValue> {
    matches!(input, "none" | "all").then(|| StyleValue::keyword(input))
}

pub(crate) fn parse_ruby_reserve(input: &str) -> Option<StyleValue> {
    let parts: Vec<&str> = input.split(' ').collect();
    if parts.len() > 2 {
        return None;
    }
    let mode = parts[0];
    if !matches!(mode, "none" | "both" | "after" | "before" | "outside") {
        return None;
    }
    let length = match parts.get(1) {
        Some(l) if mode != "none" => Some(parse_length(l)?),
        _ => None,
    };
    Some(StyleValue::RubyReserve(RubyReserve {
        mode: mode.to_owned(),
        length,
    }))
}

pub(crate) fn parse_text_decoration(input: &str) -> Option<StyleValue> {
    Some(StyleValue::TextDecoration(
        input.split(' ').map(str::to_owned).collect(),
    ))
}

/// 解析 `tts:textEmphasis`，并补齐缺省的样式、符号、颜色和位置。
#[must_use]
pub fn parse_text_emphasis(input: &str) -> Option<TextEmphasis> {
    let mut style = None;
    let mut symbol = None;
    let mut color = None;
    let mut position = None;

    for token in input.split(' ') {
        match token {
            "none" | "auto" | "filled" | "open" => style = Some(token),
            "circle" | "dot" | "sesame" => symbol = Some(token),
            "current" => color = Some(EmphasisColor::Current),
            "outside" | "before" | "after" => position = Some(token),
            other => color = Some(EmphasisColor::Color(parse_color(other)?)),
        }
    }

    let (style, symbol) = if style.is_none() && symbol.is_none() {
        ("auto", None)
    } else {
        (style.unwrap_or("filled"), Some(symbol.unwrap_or("circle")))
    };

    Some(TextEmphasis {
        style: style.to_owned(),
        symbol: symbol.map(str::to_owned),
        color: color.unwrap_or(EmphasisColor::Current),
        position: position.unwrap_or("outside").to_owned(),
    })
}

pub(crate) fn parse_text_emphasis_value(input: &str) -> Option<StyleValue> {
    parse_text_emphasis(input).map(StyleValue::TextEmphasis)
}

/// `none`，或可选颜色加一个厚度。
pub(crate) fn parse_text_outline(input: &str) -> Option<StyleValue> {
    if input == "none" {
        return Some(StyleValue::keyword(input));
    }
    let parts: Vec<&str> = input.split(' ').collect();
    let (color, thickness) = match parts.as_slice() {
        [thickness] => (None, *thickness),
        [color, thickness] => (Some(parse_color(color)?), *thickness),
        _ => return None,
    };
    Some(StyleValue::TextOutline(TextOutline {
        color,
        thickness: parse_length(thickness)?,
    }))
}

/// 解析逗号分隔的阴影列表。每个阴影是 x、y 偏移，可选的模糊半径和可选的颜色。
///
/// 分量数不在 2 到 4 之间的阴影被忽略。
pub(crate) fn parse_text_shadow(input: &str) -> Option<StyleValue> {
    let mut shadows = Vec::new();

    for m in SHADOW_SPLIT_REGEX.find_iter(input) {
        let parts: Vec<&str> = m.as_str().split_whitespace().collect();
        if parts.as_slice() == ["none"] {
            return Some(StyleValue::keyword("none"));
        }
        if !(2..=4).contains(&parts.len()) {
            continue;
        }

        let x_offset = parse_length(parts[0])?;
        let y_offset = parse_length(parts[1])?;
        let mut rest = &parts[2..];

        let blur_radius = match rest.first().copied().and_then(parse_length) {
            Some(blur) => {
                rest = &rest[1..];
                Some(blur)
            }
            None => None,
        };

        let color = match rest {
            [] => None,
            [color] => Some(parse_color(color)?),
            _ => return None,
        };

        shadows.push(SpecifiedShadow {
            x_offset,
            y_offset,
            blur_radius,
            color,
        });
    }

    Some(StyleValue::TextShadow(shadows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_colors_case_insensitively() {
        assert_eq!(parse_color("white"), Some(Color::WHITE));
        assert_eq!(parse_color("Transparent"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("CYAN"), Some(Color::rgba(0, 255, 255, 255)));
        assert_eq!(parse_color("orange"), None);
    }

    #[test]
    fn test_parse_numeric_colors() {
        assert_eq!(parse_color("#ff0000"), Some(Color::rgba(255, 0, 0, 255)));
        assert_eq!(parse_color("#00ff0080"), Some(Color::rgba(0, 255, 0, 128)));
        assert_eq!(
            parse_color("rgb( 1, 2 ,3 )"),
            Some(Color::rgba(1, 2, 3, 255))
        );
        assert_eq!(
            parse_color("rgba(233,30,99,255)"),
            Some(Color::rgba(233, 30, 99, 255))
        );

        assert_eq!(parse_color("#ff00"), None);
        assert_eq!(parse_color("rgb(256,0,0)"), None);
        assert_eq!(parse_color("rgba(1,2,3)"), None);
    }

    #[test]
    fn test_parse_font_family() {
        assert_eq!(
            parse_font_family("Arial, default ,'My Font'"),
            ["Arial", "monospaceSerif", "'My Font'"]
        );
        assert_eq!(parse_font_family("\"default\""), ["\"default\""]);
    }

    #[test]
    fn test_parse_position_keywords_and_offsets() {
        let p = parse_position("center").unwrap();
        assert_eq!(p.h.edge, Edge::Left);
        assert_eq!(p.h.offset, Length::new(50.0, LengthUnit::Percent));
        assert_eq!(p.v.offset, Length::new(50.0, LengthUnit::Percent));

        let p = parse_position("right 10% bottom 5%").unwrap();
        assert_eq!(p.h.edge, Edge::Right);
        assert_eq!(p.h.offset, Length::new(10.0, LengthUnit::Percent));
        assert_eq!(p.v.edge, Edge::Bottom);
        assert_eq!(p.v.offset, Length::new(5.0, LengthUnit::Percent));

        let p = parse_position("top left").unwrap();
        assert_eq!(p.h.offset, Length::new(0.0, LengthUnit::Percent));
        assert_eq!(p.v.offset, Length::new(0.0, LengthUnit::Percent));

        let p = parse_position("10px 20%").unwrap();
        assert_eq!(p.h.offset, Length::new(10.0, LengthUnit::Px));
        assert_eq!(p.v.offset, Length::new(20.0, LengthUnit::Percent));
    }

    #[test]
    fn test_parse_position_rejects_invalid_input() {
        assert!(parse_position("left 10% top 10% right").is_none());
        assert!(parse_position("10% 10% 10%").is_none());
        assert!(parse_position("middle").is_none());
    }

    #[test]
    fn test_parse_text_shadow() {
        let Some(StyleValue::TextShadow(shadows)) =
            parse_text_shadow("1px 2px, 3px 4px 5px rgba(1,2,3,4)")
        else {
            panic!("应当解析出阴影列表");
        };
        assert_eq!(shadows.len(), 2);
        assert_eq!(shadows[0].blur_radius, None);
        assert_eq!(shadows[0].color, None);
        assert_eq!(
            shadows[1].blur_radius,
            Some(Length::new(5.0, LengthUnit::Px))
        );
        assert_eq!(shadows[1].color, Some(Color::rgba(1, 2, 3, 4)));

        assert_eq!(parse_text_shadow("none"), Some(StyleValue::keyword("none")));
        assert_eq!(parse_text_shadow("1px red"), None);
    }

    #[test]
    fn test_parse_text_emphasis_defaults() {
        let e = parse_text_emphasis("dot").unwrap();
        assert_eq!(e.style, "filled");
        assert_eq!(e.symbol.as_deref(), Some("dot"));
        assert_eq!(e.color, EmphasisColor::Current);
        assert_eq!(e.position, "outside");

        let e = parse_text_emphasis("red before").unwrap();
        assert_eq!(e.style, "auto");
        assert_eq!(e.symbol, None);
        assert_eq!(e.color, EmphasisColor::Color(Color::rgba(255, 0, 0, 255)));
        assert_eq!(e.position, "before");

        assert!(parse_text_emphasis("sparkle").is_none());
    }

    #[test]
    fn test_parse_text_outline() {
        assert_eq!(parse_text_outline("none"), Some(StyleValue::keyword("none")));
        assert_eq!(
            parse_text_outline("red 2px"),
            Some(StyleValue::TextOutline(TextOutline {
                color: Some(Color::rgba(255, 0, 0, 255)),
                thickness: Length::new(2.0, LengthUnit::Px),
            }))
        );
        assert_eq!(
            parse_text_outline("10%"),
            Some(StyleValue::TextOutline(TextOutline {
                color: None,
                thickness: Length::new(10.0, LengthUnit::Percent),
            }))
        );
        assert_eq!(parse_text_outline("red"), None);
        assert_eq!(parse_text_outline("red 1px 2px"), None);
    }

    #[test]
    fn test_parse_padding_and_ruby_reserve() {
        assert!(matches!(parse_padding("1px 2px 3px 4px"), Some(StyleValue::Lengths(l)) if l.len() == 4));
        assert_eq!(parse_padding("1px 2px 3px 4px 5px"), None);
        assert_eq!(parse_padding("1px foo"), None);

        assert_eq!(
            parse_ruby_reserve("after 10%"),
            Some(StyleValue::RubyReserve(RubyReserve {
                mode: "after".to_owned(),
                length: Some(Length::new(10.0, LengthUnit::Percent)),
            }))
        );
        assert_eq!(parse_ruby_reserve("sideways"), None);
    }
}
