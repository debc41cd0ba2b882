//! # 样式属性目录
//!
//! 目录中的每一项描述一个样式属性：限定名、适用的元素种类、是否继承、
//! 初始值以及解析和计算函数。目录的顺序即层叠计算时遍历属性的顺序，
//! 这个顺序是固定的，例如 `extent` 和 `fontSize` 必须先于依赖它们的
//! `padding` 和 `position` 计算。

pub mod compute;
pub mod parse;
pub mod value;

use std::{collections::BTreeMap, collections::HashMap, fmt};

use once_cell::sync::Lazy;

use crate::{
    model::ElementKind::{self, Body, Div, P, Region, Span},
    namespaces,
};
use compute::{
    ComputeFn, compute_extent, compute_font_size, compute_line_height, compute_line_padding,
    compute_origin, compute_padding, compute_position, compute_ruby_reserve, compute_shear,
    compute_text_align, compute_text_outline, compute_text_shadow,
};
use parse::{
    parse_bool, parse_color_value, parse_font_family_value, parse_keyword, parse_length_pair,
    parse_length_value, parse_line_height, parse_opacity, parse_padding, parse_position_value,
    parse_ruby_align, parse_ruby_reserve, parse_text_combine, parse_text_decoration,
    parse_text_emphasis_value, parse_text_outline, parse_text_shadow, parse_z_index,
};
pub use value::{Color, StyleValue};

pub type ParseFn = fn(&str) -> Option<StyleValue>;

/// 元素上已解析（或已计算）的样式属性，按目录顺序排列。
pub type StyleMap = BTreeMap<StyleName, StyleValue>;

/// 目录中的所有样式属性。声明顺序与 [`CATALOG`] 一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleName {
    BackgroundColor,
    Color,
    Direction,
    Display,
    DisplayAlign,
    Extent,
    FontFamily,
    Shear,
    FontSize,
    FontStyle,
    FontWeight,
    LineHeight,
    Opacity,
    Origin,
    Overflow,
    Padding,
    Position,
    Ruby,
    RubyAlign,
    RubyPosition,
    RubyReserve,
    ShowBackground,
    TextAlign,
    TextCombine,
    TextDecoration,
    TextEmphasis,
    TextOutline,
    TextShadow,
    UnicodeBidi,
    Visibility,
    WrapOption,
    WritingMode,
    ZIndex,
    LinePadding,
    MultiRowAlign,
    BackgroundImage,
    ForcedDisplay,
    FillLineGap,
}

impl StyleName {
    #[must_use]
    pub fn definition(self) -> &'static StyleAttributeDefinition {
        &CATALOG[self as usize]
    }
}

impl fmt::Display for StyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().local)
    }
}

pub struct StyleAttributeDefinition {
    pub name: StyleName,
    pub ns: &'static str,
    pub local: &'static str,
    /// `None` 表示除非被 `<initial>` 覆盖，否则没有初始值。
    pub initial: Option<&'static str>,
    pub applies: &'static [ElementKind],
    pub inherit: bool,
    pub animatable: bool,
    pub parse: ParseFn,
    /// `None` 表示 specified 值原样进入 ISD。
    pub compute: Option<ComputeFn>,
}

impl StyleAttributeDefinition {
    /// 形如 `"命名空间 本地名"` 的限定名。
    #[must_use]
    pub fn qname(&self) -> String {
        format!("{} {}", self.ns, self.local)
    }

    #[must_use]
    pub fn applies_to(&self, kind: ElementKind) -> bool {
        self.applies.contains(&kind)
    }

    /// 解析目录中的初始值。
    #[must_use]
    pub fn parsed_initial(&self) -> Option<StyleValue> {
        self.initial.and_then(self.parse)
    }
}

impl fmt::Debug for StyleAttributeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleAttributeDefinition")
            .field("name", &self.name)
            .field("ns", &self.ns)
            .field("local", &self.local)
            .field("initial", &self.initial)
            .field("applies", &self.applies)
            .field("inherit", &self.inherit)
            .field("animatable", &self.animatable)
            .finish_non_exhaustive()
    }
}

const ALL_STYLED: &[ElementKind] = &[Body, Div, P, Region, Span];
const SPAN_ONLY: &[ElementKind] = &[Span];
const SPAN_AND_P: &[ElementKind] = &[Span, P];
const P_ONLY: &[ElementKind] = &[P];
const REGION_ONLY: &[ElementKind] = &[Region];
const DIV_ONLY: &[ElementKind] = &[Div];

pub static CATALOG: [StyleAttributeDefinition; 38] = [
    StyleAttributeDefinition {
        name: StyleName::BackgroundColor,
        ns: namespaces::TTS,
        local: "backgroundColor",
        initial: Some("transparent"),
        applies: ALL_STYLED,
        inherit: false,
        animatable: true,
        parse: parse_color_value,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Color,
        ns: namespaces::TTS,
        local: "color",
        initial: Some("white"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_color_value,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Direction,
        ns: namespaces::TTS,
        local: "direction",
        initial: Some("ltr"),
        applies: SPAN_AND_P,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Display,
        ns: namespaces::TTS,
        local: "display",
        initial: Some("auto"),
        applies: ALL_STYLED,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::DisplayAlign,
        ns: namespaces::TTS,
        local: "displayAlign",
        initial: Some("before"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Extent,
        ns: namespaces::TTS,
        local: "extent",
        initial: Some("auto"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_length_pair,
        compute: Some(compute_extent),
    },
    StyleAttributeDefinition {
        name: StyleName::FontFamily,
        ns: namespaces::TTS,
        local: "fontFamily",
        initial: Some("default"),
        applies: SPAN_AND_P,
        inherit: true,
        animatable: true,
        parse: parse_font_family_value,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Shear,
        ns: namespaces::TTS,
        local: "shear",
        initial: Some("0%"),
        applies: P_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_length_value,
        compute: Some(compute_shear),
    },
    StyleAttributeDefinition {
        name: StyleName::FontSize,
        ns: namespaces::TTS,
        local: "fontSize",
        initial: Some("1c"),
        applies: SPAN_AND_P,
        inherit: true,
        animatable: true,
        parse: parse_length_value,
        compute: Some(compute_font_size),
    },
    StyleAttributeDefinition {
        name: StyleName::FontStyle,
        ns: namespaces::TTS,
        local: "fontStyle",
        initial: Some("normal"),
        applies: SPAN_AND_P,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::FontWeight,
        ns: namespaces::TTS,
        local: "fontWeight",
        initial: Some("normal"),
        applies: SPAN_AND_P,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::LineHeight,
        ns: namespaces::TTS,
        local: "lineHeight",
        initial: Some("normal"),
        applies: P_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_line_height,
        compute: Some(compute_line_height),
    },
    StyleAttributeDefinition {
        name: StyleName::Opacity,
        ns: namespaces::TTS,
        local: "opacity",
        initial: Some("1.0"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_opacity,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Origin,
        ns: namespaces::TTS,
        local: "origin",
        initial: Some("auto"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_length_pair,
        compute: Some(compute_origin),
    },
    StyleAttributeDefinition {
        name: StyleName::Overflow,
        ns: namespaces::TTS,
        local: "overflow",
        initial: Some("hidden"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Padding,
        ns: namespaces::TTS,
        local: "padding",
        initial: Some("0px"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_padding,
        compute: Some(compute_padding),
    },
    StyleAttributeDefinition {
        name: StyleName::Position,
        ns: namespaces::TTS,
        local: "position",
        initial: Some("top left"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_position_value,
        compute: Some(compute_position),
    },
    StyleAttributeDefinition {
        name: StyleName::Ruby,
        ns: namespaces::TTS,
        local: "ruby",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::RubyAlign,
        ns: namespaces::TTS,
        local: "rubyAlign",
        initial: Some("center"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_ruby_align,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::RubyPosition,
        ns: namespaces::TTS,
        local: "rubyPosition",
        initial: Some("outside"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::RubyReserve,
        ns: namespaces::TTS,
        local: "rubyReserve",
        initial: Some("none"),
        applies: P_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_ruby_reserve,
        compute: Some(compute_ruby_reserve),
    },
    StyleAttributeDefinition {
        name: StyleName::ShowBackground,
        ns: namespaces::TTS,
        local: "showBackground",
        initial: Some("always"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::TextAlign,
        ns: namespaces::TTS,
        local: "textAlign",
        initial: Some("start"),
        applies: P_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: Some(compute_text_align),
    },
    StyleAttributeDefinition {
        name: StyleName::TextCombine,
        ns: namespaces::TTS,
        local: "textCombine",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_text_combine,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::TextDecoration,
        ns: namespaces::TTS,
        local: "textDecoration",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_text_decoration,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::TextEmphasis,
        ns: namespaces::TTS,
        local: "textEmphasis",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_text_emphasis_value,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::TextOutline,
        ns: namespaces::TTS,
        local: "textOutline",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_text_outline,
        compute: Some(compute_text_outline),
    },
    StyleAttributeDefinition {
        name: StyleName::TextShadow,
        ns: namespaces::TTS,
        local: "textShadow",
        initial: Some("none"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_text_shadow,
        compute: Some(compute_text_shadow),
    },
    StyleAttributeDefinition {
        name: StyleName::UnicodeBidi,
        ns: namespaces::TTS,
        local: "unicodeBidi",
        initial: Some("normal"),
        applies: SPAN_AND_P,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::Visibility,
        ns: namespaces::TTS,
        local: "visibility",
        initial: Some("visible"),
        applies: ALL_STYLED,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::WrapOption,
        ns: namespaces::TTS,
        local: "wrapOption",
        initial: Some("wrap"),
        applies: SPAN_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::WritingMode,
        ns: namespaces::TTS,
        local: "writingMode",
        initial: Some("lrtb"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::ZIndex,
        ns: namespaces::TTS,
        local: "zIndex",
        initial: Some("auto"),
        applies: REGION_ONLY,
        inherit: false,
        animatable: true,
        parse: parse_z_index,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::LinePadding,
        ns: namespaces::EBUTTS,
        local: "linePadding",
        initial: Some("0c"),
        applies: P_ONLY,
        inherit: true,
        animatable: false,
        parse: parse_length_value,
        compute: Some(compute_line_padding),
    },
    StyleAttributeDefinition {
        name: StyleName::MultiRowAlign,
        ns: namespaces::EBUTTS,
        local: "multiRowAlign",
        initial: Some("auto"),
        applies: P_ONLY,
        inherit: true,
        animatable: false,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::BackgroundImage,
        ns: namespaces::SMPTE,
        local: "backgroundImage",
        initial: None,
        applies: DIV_ONLY,
        inherit: false,
        animatable: false,
        parse: parse_keyword,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::ForcedDisplay,
        ns: namespaces::ITTS,
        local: "forcedDisplay",
        initial: Some("false"),
        applies: ALL_STYLED,
        inherit: true,
        animatable: true,
        parse: parse_bool,
        compute: None,
    },
    StyleAttributeDefinition {
        name: StyleName::FillLineGap,
        ns: namespaces::ITTS,
        local: "fillLineGap",
        initial: Some("false"),
        applies: P_ONLY,
        inherit: true,
        animatable: true,
        parse: parse_bool,
        compute: None,
    },
];

type QNameIndex = HashMap<&'static str, HashMap<&'static str, &'static StyleAttributeDefinition>>;

static BY_QNAME: Lazy<QNameIndex> = Lazy::new(|| {
    let mut index: QNameIndex = HashMap::new();
    for definition in &CATALOG {
        index
            .entry(definition.ns)
            .or_default()
            .insert(definition.local, definition);
    }
    index
});

static BY_ALIAS: Lazy<HashMap<&'static str, &'static StyleAttributeDefinition>> =
    Lazy::new(|| CATALOG.iter().map(|d| (d.local, d)).collect());

/// 按命名空间和本地名查找样式属性。
#[must_use]
pub fn lookup_by_qname(ns: &str, local: &str) -> Option<&'static StyleAttributeDefinition> {
    BY_QNAME.get(ns)?.get(local).copied()
}

/// 按简称（本地名，例如 `fontSize`）查找样式属性。
#[must_use]
pub fn lookup_by_alias(alias: &str) -> Option<&'static StyleAttributeDefinition> {
    BY_ALIAS.get(alias).copied()
}

/// 按固定的层叠顺序遍历所有样式属性。
pub fn definitions() -> impl Iterator<Item = &'static StyleAttributeDefinition> {
    CATALOG.iter()
}

/// `tts:ruby` 的取值，没有指定时为 `None`。
pub(crate) fn ruby_role(styles: &StyleMap) -> Option<&str> {
    styles.get(&StyleName::Ruby).and_then(StyleValue::as_keyword)
}
