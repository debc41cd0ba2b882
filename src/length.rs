//! # 长度的解析与计算
//!
//! TTML 中的长度由数值和单位组成。计算后的长度以根容器的宽高为基准，
//! 表示为 `rw * 根宽度 + rh * 根高度`，从而与最终的渲染尺寸无关。

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

static LENGTH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\+|-)?\d*(?:\.\d+)?)(px|em|c|%|rh|rw)$").expect("未能编译 LENGTH_REGEX")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Px,
    Em,
    Cell,
    Percent,
    RootHeight,
    RootWidth,
}

impl LengthUnit {
    fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "px" => Self::Px,
            "em" => Self::Em,
            "c" => Self::Cell,
            "%" => Self::Percent,
            "rh" => Self::RootHeight,
            "rw" => Self::RootWidth,
            _ => return None,
        })
    }

    const fn suffix(self) -> &'static str {
        match self {
            Self::Px => "px",
            Self::Em => "em",
            Self::Cell => "c",
            Self::Percent => "%",
            Self::RootHeight => "rh",
            Self::RootWidth => "rw",
        }
    }
}

/// 解析得到的长度，尚未计算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: LengthUnit,
}

impl Length {
    #[must_use]
    pub const fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

/// 解析形如 `10px`、`-1.5em`、`80%` 或 `.5c` 的长度字符串。
#[must_use]
pub fn parse_length(input: &str) -> Option<Length> {
    let caps = LENGTH_REGEX.captures(input)?;
    let value = caps[1].parse::<f64>().ok()?;
    let unit = LengthUnit::from_suffix(&caps[2])?;
    Some(Length { value, unit })
}

/// 根容器相对的长度：`rw` 为根宽度的比例，`rh` 为根高度的比例。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComputedLength {
    pub rw: f64,
    pub rh: f64,
}

impl ComputedLength {
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(rw: f64, rh: f64) -> Self {
        Self { rw, rh }
    }

    #[must_use]
    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.rw * factor, self.rh * factor)
    }

    /// 针对具体的根容器尺寸求出像素值。
    #[must_use]
    pub fn to_pixels(self, width: f64, height: f64) -> f64 {
        self.rw.mul_add(width, self.rh * height)
    }
}

impl fmt::Display for ComputedLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}rw, {}rh)", self.rw, self.rh)
    }
}

/// 水平和垂直方向上的一对计算长度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub w: ComputedLength,
    pub h: ComputedLength,
}

impl Dimensions {
    /// 根容器自身：宽为 `1rw`，高为 `1rh`。
    pub const ROOT: Self = Self {
        w: ComputedLength::new(1.0, 0.0),
        h: ComputedLength::new(0.0, 1.0),
    };

    /// 把根容器在两个方向上等分成 `columns` × `rows` 份后的单个单元尺寸。
    #[must_use]
    pub fn divided(columns: f64, rows: f64) -> Self {
        Self {
            w: ComputedLength::new(1.0 / columns, 0.0),
            h: ComputedLength::new(0.0, 1.0 / rows),
        }
    }
}

/// 计算一个长度时可用的各单位基准。缺失的基准意味着该单位在此上下文中不可用。
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthBasis {
    pub em: Option<ComputedLength>,
    pub percent: Option<ComputedLength>,
    pub cell: Option<ComputedLength>,
    pub px: Option<ComputedLength>,
}

impl LengthBasis {
    /// 将长度换算为根容器相对的长度。`rh`/`rw` 单位总是可以换算。
    #[must_use]
    pub fn compute(&self, length: Length) -> Option<ComputedLength> {
        let v = length.value;
        match length.unit {
            LengthUnit::Percent => self
                .percent
                .map(|p| ComputedLength::new(p.rw * v / 100.0, p.rh * v / 100.0)),
            LengthUnit::Em => self.em.map(|em| em.scale(v)),
            LengthUnit::Cell => self.cell.map(|c| c.scale(v)),
            LengthUnit::Px => self.px.map(|px| px.scale(v)),
            LengthUnit::RootHeight => Some(ComputedLength::new(0.0, v / 100.0)),
            LengthUnit::RootWidth => Some(ComputedLength::new(v / 100.0, 0.0)),
        }
    }
}
