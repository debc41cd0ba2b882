//! # 文档模型
//!
//! 解析器产出的类型化文档树。元素类型对计时参数泛型：
//! 解析阶段是 [`UnresolvedElement`]，带有显式的 begin/end/dur；
//! 计时解析之后是 [`ContentElement`]，只保留绝对的开始和结束时间。

use std::{collections::BTreeMap, fmt};

use crate::{
    error::{ErrorHandler, Result, TracingErrorHandler},
    isd::{self, Isd},
    length::Dimensions,
    styles::{StyleMap, StyleName, StyleValue},
    timing::{EventIndex, ExplicitTiming, Interval},
};

/// 文档树中元素的种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Region,
    Body,
    Div,
    P,
    Span,
    Br,
    Image,
}

impl ElementKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Body => "body",
            Self::Div => "div",
            Self::P => "p",
            Self::Span => "span",
            Self::Br => "br",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `xml:space` 的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum XmlSpace {
    #[default]
    Default,
    Preserve,
}

/// `timeContainer` 的取值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeContainer {
    #[default]
    Par,
    Seq,
}

/// `<image>` 元素或 `smpte:backgroundImage` 引用的图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub src: String,
    pub mime_type: Option<String>,
}

/// 元素的内容：叶子元素、直接携带文本的 span，或有序的子元素列表。
#[derive(Debug, Clone, PartialEq)]
pub enum Contents<T> {
    Leaf,
    Text(String),
    Children(Vec<Element<T>>),
}

/// 计时的样式动画，活动期间用一个值覆盖父元素的某个样式属性。
#[derive(Debug, Clone, PartialEq)]
pub struct Set<T> {
    pub timing: T,
    pub style: StyleName,
    pub value: StyleValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element<T> {
    pub kind: ElementKind,
    pub id: Option<String>,
    pub lang: String,
    pub space: XmlSpace,
    /// 元素自身的 `region` 属性，空字符串视为未指定。
    pub region_id: Option<String>,
    pub styles: StyleMap,
    pub sets: Vec<Set<T>>,
    pub time_container: TimeContainer,
    pub timing: T,
    pub contents: Contents<T>,
    pub image: Option<ImageSource>,
    /// 由文本节点生成的匿名 span。
    pub anonymous: bool,
}

pub type UnresolvedElement = Element<ExplicitTiming>;
pub type ContentElement = Element<Interval>;

impl<T> Element<T> {
    /// 没有子元素或子元素为空的元素。
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match &self.contents {
            Contents::Children(children) => children.is_empty(),
            Contents::Leaf | Contents::Text(_) => true,
        }
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.contents {
            Contents::Children(children) => children,
            Contents::Leaf | Contents::Text(_) => &[],
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.contents {
            Contents::Text(text) => Some(text),
            _ => None,
        }
    }

    /// 显式指定的非空区域 ID。
    #[must_use]
    pub fn explicit_region(&self) -> Option<&str> {
        self.region_id.as_deref().filter(|r| !r.is_empty())
    }
}

impl ContentElement {
    #[must_use]
    pub const fn begin(&self) -> f64 {
        self.timing.begin
    }

    #[must_use]
    pub const fn end(&self) -> f64 {
        self.timing.end
    }

    #[must_use]
    pub fn is_active_at(&self, offset: f64) -> bool {
        self.timing.contains(offset)
    }
}

/// `<styling>` 中解析完成后仍需保留的部分：`<initial>` 对初始值的覆盖。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Styling {
    pub initials: BTreeMap<StyleName, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    /// 按声明顺序排列的区域。
    pub regions: Vec<ContentElement>,
}

impl Layout {
    #[must_use]
    pub fn region(&self, id: &str) -> Option<&ContentElement> {
        self.regions
            .iter()
            .find(|r| r.id.as_deref().unwrap_or_default() == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Head {
    pub styling: Styling,
    pub layout: Layout,
}

/// 解析并完成计时解析的 TTML 文档。构建完成后不再改变，可以在多个线程间共享。
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// 由 `ttp:cellResolution` 得出的单元格尺寸。
    pub cell_length: Dimensions,
    /// `ttp:frameRate` 乘以 `ttp:frameRateMultiplier`。
    pub effective_frame_rate: f64,
    pub tick_rate: f64,
    /// 宽高比，来自 `ittp:aspectRatio` 或 `ttp:displayAspectRatio`。
    pub aspect_ratio: Option<f64>,
    /// 根元素 `tts:extent` 以像素给出时，一个像素的尺寸。
    pub px_length: Option<Dimensions>,
    pub dimensions: Dimensions,
    pub lang: String,
    pub head: Head,
    pub body: Option<ContentElement>,
    pub(crate) events: EventIndex,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            cell_length: Dimensions::divided(32.0, 15.0),
            effective_frame_rate: 30.0,
            tick_rate: 1.0,
            aspect_ratio: None,
            px_length: None,
            dimensions: Dimensions::ROOT,
            lang: String::new(),
            head: Head::default(),
            body: None,
            events: EventIndex::default(),
        }
    }
}

impl Document {
    /// 第一个和最后一个媒体时间事件。文档中没有任何有效区间时返回 `None`。
    #[must_use]
    pub fn media_time_range(&self) -> Option<(f64, f64)> {
        self.events.range()
    }

    /// 所有媒体时间事件，严格递增。
    #[must_use]
    pub fn media_time_events(&self) -> &[f64] {
        self.events.as_slice()
    }

    /// 生成 `offset` 时刻的 ISD，诊断信息交给 `tracing`。
    ///
    /// # Errors
    ///
    /// 使用 [`TracingErrorHandler`] 时不会中止，目前总是返回 `Ok`。
    pub fn generate_isd(&self, offset: f64) -> Result<Isd> {
        self.generate_isd_with(offset, &mut TracingErrorHandler)
    }

    /// 生成 `offset` 时刻的 ISD，诊断信息交给调用方的处理器。
    ///
    /// # Errors
    ///
    /// 处理器在收到警告或错误后返回 `true` 时，返回 [`crate::IsdError::Aborted`]。
    pub fn generate_isd_with(&self, offset: f64, handler: &mut dyn ErrorHandler) -> Result<Isd> {
        isd::generate(self, offset, handler)
    }
}
