//! # ISD (Intermediate Synchronic Document) 生成
//!
//! 对给定的时间偏移，从已构建的 [`Document`] 中选出活动的区域，
//! 对每个区域执行一次完整的样式层叠，得到可以直接渲染的快照。
//! 生成过程只读取文档，同一个文档可以在多个线程中同时生成不同时刻的 ISD。

mod cascade;
mod whitespace;

use std::fmt::{self, Write as _};

use tracing::trace;

use crate::{
    error::{ErrorHandler, Reporter, Result},
    model::{ContentElement, Contents, Document, ElementKind, ImageSource, XmlSpace},
    styles::{StyleMap, StyleName, StyleValue, lookup_by_qname, ruby_role},
};
use cascade::Cascade;

/// 某一时刻的快照：以区域为根的内容树列表。
#[derive(Debug, Clone, PartialEq)]
pub struct Isd {
    /// 在该时刻有可见内容（或需要显示背景）的区域，按布局中的声明顺序排列。
    pub contents: Vec<IsdContentElement>,
    pub aspect_ratio: Option<f64>,
    pub lang: String,
}

/// ISD 中的一个元素，样式已经完成层叠和计算。
#[derive(Debug, Clone, PartialEq)]
pub struct IsdContentElement {
    pub kind: ElementKind,
    pub lang: String,
    pub id: Option<String>,
    pub styles: StyleMap,
    pub contents: Vec<IsdContentElement>,
    /// 直接携带文本的 span 才有文本。
    pub text: Option<String>,
    pub space: XmlSpace,
    pub image: Option<ImageSource>,
}

impl IsdContentElement {
    /// 没有任何样式和内容的元素。
    #[must_use]
    pub const fn empty(kind: ElementKind) -> Self {
        Self {
            kind,
            lang: String::new(),
            id: None,
            styles: StyleMap::new(),
            contents: Vec::new(),
            text: None,
            space: XmlSpace::Default,
            image: None,
        }
    }

    /// 复制文档元素的标识、语言、specified 样式和文本，不复制子元素。
    pub(crate) fn from_element(element: &ContentElement) -> Self {
        Self {
            kind: element.kind,
            lang: element.lang.clone(),
            id: element.id.clone().filter(|id| !id.is_empty()),
            styles: element.styles.clone(),
            contents: Vec::new(),
            text: match &element.contents {
                Contents::Text(text) => Some(text.clone()),
                Contents::Leaf | Contents::Children(_) => None,
            },
            space: element.space,
            image: element.image.clone(),
        }
    }

    #[must_use]
    pub fn style(&self, name: StyleName) -> Option<&StyleValue> {
        self.styles.get(&name)
    }

    /// 按限定名查找样式，例如 `(namespaces::TTS, "color")`。
    #[must_use]
    pub fn style_by_qname(&self, ns: &str, local: &str) -> Option<&StyleValue> {
        self.styles.get(&lookup_by_qname(ns, local)?.name)
    }

    /// `tts:ruby` 的计算值。
    #[must_use]
    pub fn ruby(&self) -> Option<&str> {
        ruby_role(&self.styles)
    }

    fn write_tree(&self, out: &mut String, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        write!(out, "{indent}{}", self.kind)?;
        if let Some(id) = &self.id {
            write!(out, " #{id}")?;
        }
        for (name, value) in &self.styles {
            write!(out, " {name}={value}")?;
        }
        if let Some(image) = &self.image {
            write!(out, " src={}", image.src)?;
        }
        if let Some(text) = &self.text {
            write!(out, " {text:?}")?;
        }
        out.push('\n');
        for child in &self.contents {
            child.write_tree(out, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for IsdContentElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_tree(&mut out, 0)?;
        f.write_str(&out)
    }
}

impl fmt::Display for Isd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in &self.contents {
            write!(f, "{region}")?;
        }
        Ok(())
    }
}

/// 记录哪些区域需要在本次生成中处理。
struct ActiveRegions {
    /// 与 `doc.head.layout.regions` 一一对应。
    flags: Vec<bool>,
    /// 被内容引用但没有声明的区域 ID。
    unknown: Vec<String>,
}

impl ActiveRegions {
    fn activate(&mut self, doc: &Document, id: &str) {
        match doc
            .head
            .layout
            .regions
            .iter()
            .position(|r| r.id.as_deref().unwrap_or_default() == id)
        {
            Some(index) => self.flags[index] = true,
            None => {
                if !self.unknown.iter().any(|u| u == id) {
                    self.unknown.push(id.to_owned());
                }
            }
        }
    }
}

/// 区域在没有内容时是否仍然需要显示背景。
fn shows_background(doc: &Document, region: &ContentElement, offset: f64) -> bool {
    let initials = &doc.head.styling.initials;

    let show_background = region
        .styles
        .get(&StyleName::ShowBackground)
        .and_then(StyleValue::as_keyword)
        .or_else(|| initials.get(&StyleName::ShowBackground).map(String::as_str));
    let has_background_color = region.styles.contains_key(&StyleName::BackgroundColor)
        || initials.contains_key(&StyleName::BackgroundColor);

    matches!(show_background, None | Some("always"))
        && has_background_color
        && region.is_active_at(offset)
}

/// 标记活动内容显式引用的区域。只进入在 `offset` 时刻活动的子元素。
fn mark_content_regions(element: &ContentElement, offset: f64, doc: &Document, active: &mut ActiveRegions) {
    for child in element.children() {
        if !child.is_active_at(offset) {
            continue;
        }
        if let Some(region_id) = child.explicit_region() {
            active.activate(doc, region_id);
        }
        mark_content_regions(child, offset, doc, active);
    }
}

/// 生成 `offset` 时刻的 ISD。
///
/// # Errors
///
/// 错误处理器在收到警告或错误后要求中止时返回 [`crate::IsdError::Aborted`]。
pub(crate) fn generate(doc: &Document, offset: f64, handler: &mut dyn ErrorHandler) -> Result<Isd> {
    let mut reporter = Reporter::new(handler);
    let regions = &doc.head.layout.regions;

    let mut active = ActiveRegions {
        flags: regions
            .iter()
            .map(|region| shows_background(doc, region, offset))
            .collect(),
        unknown: Vec::new(),
    };

    if let Some(body) = &doc.body {
        if let Some(region_id) = body.explicit_region() {
            active.activate(doc, region_id);
        }
        mark_content_regions(body, offset, doc, &mut active);
    }

    // 合成的默认区域总是参与处理
    for (flag, region) in active.flags.iter_mut().zip(regions) {
        if region.id.as_deref() == Some("") {
            *flag = true;
        }
    }

    for id in &active.unknown {
        reporter.warn(&format!("内容引用了未声明的区域 '{id}'，已忽略"))?;
    }

    let mut cascade = Cascade::new(doc, offset, reporter);
    let mut contents = Vec::new();

    for (region, _) in regions.iter().zip(&active.flags).filter(|(_, flag)| **flag) {
        if let Some(element) = cascade.process_region(region)? {
            contents.push(element);
        }
    }

    trace!(offset, regions = contents.len(), "ISD 生成完成");

    Ok(Isd {
        contents,
        aspect_ratio: doc.aspect_ratio,
        lang: doc.lang.clone(),
    })
}
