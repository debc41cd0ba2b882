//! # 样式属性的值类型
//!
//! 解析后的值（specified）和计算后的值（computed）共用 [`StyleValue`]，
//! 计算函数负责把前者换算为后者，例如 `Length` 换算为 `Computed`。

use std::fmt;

use crate::length::{ComputedLength, Dimensions, Length};

/// RGBA 颜色，每个分量 0-255。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Self = Self::rgba(0, 0, 0, 0);
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// `tts:extent` 和 `tts:origin` 的两个分量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthPair {
    pub w: Length,
    pub h: Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// 相对某条边的偏移量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeOffset {
    pub edge: Edge,
    pub offset: Length,
}

/// `tts:position` 的解析结果：水平和垂直方向各自相对一条边。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub h: EdgeOffset,
    pub v: EdgeOffset,
}

/// `tts:rubyReserve`，长度缺省时计算为字号的一半。
#[derive(Debug, Clone, PartialEq)]
pub struct RubyReserve<L> {
    pub mode: String,
    pub length: Option<L>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmphasisColor {
    Current,
    Color(Color),
}

/// `tts:textEmphasis`，缺省分量已经补齐。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEmphasis {
    pub style: String,
    pub symbol: Option<String>,
    pub color: EmphasisColor,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOutline<C, L> {
    pub color: C,
    pub thickness: L,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shadow<C, L, B> {
    pub x_offset: L,
    pub y_offset: L,
    pub blur_radius: B,
    pub color: C,
}

pub type SpecifiedShadow = Shadow<Option<Color>, Length, Option<Length>>;
pub type ComputedShadow = Shadow<Color, ComputedLength, ComputedLength>;

/// 四个方向的计算内边距，顺序为上、左、下、右。
pub type EdgeLengths = [ComputedLength; 4];

#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Keyword(String),
    Color(Color),
    Bool(bool),
    Number(f64),
    Integer(i64),
    Length(Length),
    Computed(ComputedLength),
    LengthPair(LengthPair),
    Dimensions(Dimensions),
    Lengths(Vec<Length>),
    Edges(EdgeLengths),
    Position(Position),
    FontFamily(Vec<String>),
    TextDecoration(Vec<String>),
    TextEmphasis(TextEmphasis),
    TextOutline(TextOutline<Option<Color>, Length>),
    ComputedTextOutline(TextOutline<Color, ComputedLength>),
    TextShadow(Vec<SpecifiedShadow>),
    ComputedTextShadow(Vec<ComputedShadow>),
    RubyReserve(RubyReserve<Length>),
    ComputedRubyReserve(RubyReserve<ComputedLength>),
}

impl StyleValue {
    pub(crate) fn keyword(value: &str) -> Self {
        Self::Keyword(value.to_owned())
    }

    #[must_use]
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Self::Keyword(k) => Some(k),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_computed(&self) -> Option<ComputedLength> {
        match self {
            Self::Computed(c) => Some(*c),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_dimensions(&self) -> Option<Dimensions> {
        match self {
            Self::Dimensions(d) => Some(*d),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => f.write_str(k),
            Self::Color(c) => write!(f, "{c}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Length(l) => write!(f, "{l}"),
            Self::Computed(c) => write!(f, "{c}"),
            Self::LengthPair(p) => write!(f, "{} {}", p.w, p.h),
            Self::Dimensions(d) => write!(f, "w={} h={}", d.w, d.h),
            Self::Lengths(ls) => write_joined(f, ls),
            Self::Edges(es) => write_joined(f, es),
            Self::Position(p) => write!(
                f,
                "{:?} {} {:?} {}",
                p.h.edge, p.h.offset, p.v.edge, p.v.offset
            ),
            Self::FontFamily(names) => f.write_str(&names.join(", ")),
            Self::TextDecoration(ds) => write_joined(f, ds),
            Self::TextEmphasis(e) => {
                write!(f, "{}", e.style)?;
                if let Some(symbol) = &e.symbol {
                    write!(f, " {symbol}")?;
                }
                match e.color {
                    EmphasisColor::Current => f.write_str(" current")?,
                    EmphasisColor::Color(c) => write!(f, " {c}")?,
                }
                write!(f, " {}", e.position)
            }
            Self::TextOutline(o) => match o.color {
                Some(c) => write!(f, "{c} {}", o.thickness),
                None => write!(f, "{}", o.thickness),
            },
            Self::ComputedTextOutline(o) => write!(f, "{} {}", o.color, o.thickness),
            Self::TextShadow(shadows) => write!(f, "{} shadow(s)", shadows.len()),
            Self::ComputedTextShadow(shadows) => {
                for (i, s) in shadows.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(
                        f,
                        "{} {} {} {}",
                        s.x_offset, s.y_offset, s.blur_radius, s.color
                    )?;
                }
                Ok(())
            }
            Self::RubyReserve(r) => match r.length {
                Some(l) => write!(f, "{} {l}", r.mode),
                None => f.write_str(&r.mode),
            },
            Self::ComputedRubyReserve(r) => match r.length {
                Some(l) => write!(f, "{} {l}", r.mode),
                None => f.write_str(&r.mode),
            },
        }
    }
}
