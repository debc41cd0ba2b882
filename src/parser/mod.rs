//! # TTML (Timed Text Markup Language) 解析器
//!
//! 解析器由两部分组成：与具体 XML 库无关的 [`TreeBuilder`]，
//! 以及用 `quick-xml` 的 `NsReader` 产生开始标签、文本和结束标签事件的驱动循环。

mod constants;
mod handlers;
mod metadata;
mod state;
mod styling;
mod utils;

use std::{borrow::Cow, str};

use quick_xml::{
    NsReader,
    events::{BytesStart, Event},
    name::ResolveResult,
};
use tracing::debug;

pub use self::{metadata::MetadataHandler, state::TreeBuilder, utils::parse_time_expression};
use crate::{
    error::{ErrorHandler, Result, TracingErrorHandler},
    model::Document,
    namespaces,
};

/// 带命名空间的属性。不在任何命名空间中的属性 `ns` 为空字符串。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlAttribute {
    pub ns: String,
    pub local: String,
    pub value: String,
}

/// 一个开始标签：命名空间、本地名和按文档顺序排列的属性。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlNode {
    pub ns: String,
    pub local: String,
    pub attributes: Vec<XmlAttribute>,
}

impl XmlNode {
    /// 由 `(命名空间, 本地名, 值)` 三元组构造一个节点。
    #[must_use]
    pub fn new(ns: &str, local: &str, attributes: &[(&str, &str, &str)]) -> Self {
        Self {
            ns: ns.to_owned(),
            local: local.to_owned(),
            attributes: attributes
                .iter()
                .map(|(ns, local, value)| XmlAttribute {
                    ns: (*ns).to_owned(),
                    local: (*local).to_owned(),
                    value: (*value).to_owned(),
                })
                .collect(),
        }
    }

    /// 按命名空间和本地名查找属性值。
    #[must_use]
    pub fn attribute(&self, ns: &str, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.ns == ns && a.local == local)
            .map(|a| a.value.as_str())
    }
}

/// [`parse_ttml_with`] 的选项。
#[derive(Default)]
pub struct ParseOptions<'h> {
    /// 诊断信息的接收者，缺省时交给 `tracing`。
    pub error_handler: Option<&'h mut dyn ErrorHandler>,
    /// `<metadata>` 子树的事件回调。
    pub metadata_handler: Option<&'h mut dyn MetadataHandler>,
}

impl<'h> ParseOptions<'h> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn error_handler(mut self, handler: &'h mut dyn ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    #[must_use]
    pub fn metadata_handler(mut self, handler: &'h mut dyn MetadataHandler) -> Self {
        self.metadata_handler = Some(handler);
        self
    }
}

/// 解析 TTML 文档，诊断信息交给 `tracing`。
///
/// # Errors
///
/// 见 [`parse_ttml_with`]。
pub fn parse_ttml(content: &str) -> Result<Document> {
    parse_ttml_with(content, ParseOptions::default())
}

/// 解析 TTML 文档并完成计时解析。
///
/// # 返回
///
/// * `Ok(Document)` - 构建完成、不再改变的文档。
/// * `Err(IsdError)` - 解析失败，不会返回部分构建的文档。
///
/// # Errors
///
/// * `IsdError::Xml` / `IsdError::Attribute` / `IsdError::Encoding` - 输入不是格式良好的 XML
/// * `IsdError::Fatal` - 文档结构违规，例如非法的父子关系或第二个 `<body>`
/// * `IsdError::Aborted` - 错误处理器在收到警告或错误后要求中止
/// * `IsdError::MissingRoot` - 文档中没有 `<tt>` 元素
pub fn parse_ttml_with(content: &str, options: ParseOptions<'_>) -> Result<Document> {
    let mut fallback = TracingErrorHandler;
    let error_handler: &mut dyn ErrorHandler = match options.error_handler {
        Some(handler) => handler,
        None => &mut fallback,
    };

    let mut builder = TreeBuilder::new(error_handler);
    if let Some(handler) = options.metadata_handler {
        builder = builder.with_metadata_handler(handler);
    }

    let mut reader = NsReader::from_str(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    // 相邻的文本、CDATA 和实体引用合并成一个文本事件
    let mut pending_text = String::new();

    loop {
        builder.set_position(reader.buffer_position());

        let (element_ns, event) = {
            let (resolved, event) = reader.read_resolved_event()?;
            let element_ns = match event {
                Event::Start(_) => Some(namespace_of(&resolved)?),
                _ => None,
            };
            (element_ns, event)
        };

        match event {
            Event::Start(e) => {
                flush_text(&mut builder, &mut pending_text)?;
                let node = read_node(&reader, element_ns.unwrap_or_default(), &e)?;
                builder.open_tag(&node)?;
            }
            Event::End(_) => {
                flush_text(&mut builder, &mut pending_text)?;
                builder.close_tag()?;
            }
            Event::Text(e) => pending_text.push_str(&e.xml_content()?),
            Event::CData(e) => pending_text.push_str(str::from_utf8(e.as_ref())?),
            Event::GeneralRef(e) => {
                let name = str::from_utf8(e.as_ref())?;
                match decode_entity(name) {
                    Some(c) => pending_text.push(c),
                    None => builder
                        .reporter
                        .warn(&format!("忽略了未知的 XML 实体 '&{name};'"))?,
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    flush_text(&mut builder, &mut pending_text)?;
    let document = builder.finish()?;

    debug!(
        events = document.media_time_events().len(),
        regions = document.head.layout.regions.len(),
        "TTML 文档解析完成"
    );

    Ok(document)
}

fn flush_text(builder: &mut TreeBuilder<'_>, pending_text: &mut String) -> Result<()> {
    if !pending_text.is_empty() {
        builder.text(pending_text)?;
        pending_text.clear();
    }
    Ok(())
}

fn namespace_of(resolved: &ResolveResult<'_>) -> Result<String> {
    Ok(match resolved {
        ResolveResult::Bound(ns) => str::from_utf8(ns.as_ref())?.to_owned(),
        ResolveResult::Unknown(prefix) if prefix.as_slice() == b"xml" => {
            namespaces::XML.to_owned()
        }
        ResolveResult::Unbound | ResolveResult::Unknown(_) => String::new(),
    })
}

/// 把开始标签转换为 [`XmlNode`]，跳过命名空间声明。
fn read_node(reader: &NsReader<&[u8]>, ns: String, start: &BytesStart<'_>) -> Result<XmlNode> {
    let mut attributes = Vec::new();

    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let ns = namespace_of(&resolved)?;
        let local = str::from_utf8(local.as_ref())?.to_owned();
        let value: Cow<'_, str> = attr.decode_and_unescape_value(reader.decoder())?;

        attributes.push(XmlAttribute {
            ns,
            local,
            value: value.into_owned(),
        });
    }

    let local = str::from_utf8(start.local_name().as_ref())?.to_owned();
    Ok(XmlNode {
        ns,
        local,
        attributes,
    })
}

/// 解码预定义实体和数字字符引用。
fn decode_entity(name: &str) -> Option<char> {
    if let Some(num_str) = name.strip_prefix('#') {
        let (radix, code_point_str) = num_str
            .strip_prefix('x')
            .map_or((10, num_str), |stripped| (16, stripped));
        return u32::from_str_radix(code_point_str, radix)
            .ok()
            .and_then(char::from_u32);
    }

    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{CollectingErrorHandler, IsdError, Severity},
        model::{Contents, ElementKind, XmlSpace},
        styles::{StyleName, StyleValue},
    };

    fn parse_collecting(content: &str) -> (Result<Document>, CollectingErrorHandler) {
        let mut handler = CollectingErrorHandler::default();
        let result = parse_ttml_with(content, ParseOptions::new().error_handler(&mut handler));
        (result, handler)
    }

    fn tt(head: &str, body: &str) -> String {
        format!(
            r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:tts="http://www.w3.org/ns/ttml#styling" xmlns:ttp="http://www.w3.org/ns/ttml#parameter" xml:lang="en"><head>{head}</head>{body}</tt>"#
        )
    }

    #[test]
    fn test_decode_entity() {
        assert_eq!(decode_entity("amp"), Some('&'));
        assert_eq!(decode_entity("#x41"), Some('A'));
        assert_eq!(decode_entity("#8212"), Some('—'));
        assert_eq!(decode_entity("nbsp"), None);
        assert_eq!(decode_entity("#xZZ"), None);
    }

    #[test]
    fn test_default_region_is_synthesized() {
        let doc = parse_ttml(&tt("", "<body><div><p>Hello</p></div></body>")).unwrap();

        assert_eq!(doc.head.layout.regions.len(), 1);
        let region = &doc.head.layout.regions[0];
        assert_eq!(region.id.as_deref(), Some(""));
        assert_eq!(region.lang, "en");
        assert_eq!(region.end(), f64::INFINITY);
    }

    #[test]
    fn test_text_merging_and_span_collapse() {
        let doc = parse_ttml(&tt(
            "",
            "<body><div><p>A &amp; B<![CDATA[ <c>]]><span>one</span><span>x<br/>y</span></p></div></body>",
        ))
        .unwrap();

        let p = &doc.body.as_ref().unwrap().children()[0].children()[0];
        let children = p.children();
        assert_eq!(children.len(), 3);
        assert!(children[0].anonymous);
        assert_eq!(children[0].text(), Some("A & B <c>"));
        // 只有一个匿名子元素的 span 直接携带文本
        assert!(!children[1].anonymous);
        assert_eq!(children[1].text(), Some("one"));
        let kinds: Vec<ElementKind> = children[2].children().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, [ElementKind::Span, ElementKind::Br, ElementKind::Span]);
    }

    #[test]
    fn test_lang_and_space_are_inherited() {
        let doc = parse_ttml(&tt(
            "",
            r#"<body><div xml:lang="fr"><p xml:space="preserve"><span xml:lang="de">a</span> b</p></div></body>"#,
        ))
        .unwrap();

        let div = &doc.body.as_ref().unwrap().children()[0];
        assert_eq!(div.lang, "fr");
        let p = &div.children()[0];
        assert_eq!(p.space, XmlSpace::Preserve);
        assert_eq!(p.children()[0].lang, "de");
        assert_eq!(p.children()[0].space, XmlSpace::Preserve);
        assert_eq!(p.children()[1].lang, "fr");
    }

    #[test]
    fn test_empty_lang_clears_inherited_language() {
        let doc = parse_ttml(&tt(
            "",
            r#"<body><div xml:lang=""><p>x</p></div><div><p>y</p></div></body>"#,
        ))
        .unwrap();

        let body = doc.body.as_ref().unwrap();
        let cleared = &body.children()[0];
        assert_eq!(cleared.lang, "");
        assert_eq!(cleared.children()[0].lang, "");
        assert_eq!(body.children()[1].lang, "en");
    }

    #[test]
    fn test_illegal_parent_is_fatal() {
        let (result, handler) = parse_collecting(&tt("", "<body><p>x</p></body>"));
        assert!(matches!(result, Err(IsdError::Fatal(_))));
        assert_eq!(handler.count(Severity::Fatal), 1);

        let (result, _) = parse_collecting(&tt("", "<body/><body/>"));
        assert!(matches!(result, Err(IsdError::Fatal(_))));
    }

    #[test]
    fn test_missing_root() {
        let result = parse_ttml("<root><p/></root>");
        assert!(matches!(result, Err(IsdError::MissingRoot)));
    }

    #[test]
    fn test_malformed_xml_is_reported() {
        let result = parse_ttml(r#"<tt xmlns="http://www.w3.org/ns/ttml"><body></div></tt>"#);
        assert!(matches!(result, Err(IsdError::Xml(_))));
    }

    #[test]
    fn test_unsupported_time_base_is_fatal() {
        let (result, _) = parse_collecting(
            r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttp="http://www.w3.org/ns/ttml#parameter" ttp:timeBase="smpte"/>"#,
        );
        assert!(matches!(result, Err(IsdError::Fatal(_))));
    }

    #[test]
    fn test_root_extent_must_be_pixels() {
        let doc = parse_ttml(
            r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:tts="http://www.w3.org/ns/ttml#styling" tts:extent="640px 480px"/>"#,
        )
        .unwrap();
        let px = doc.px_length.unwrap();
        assert_eq!(px.w.rw, 1.0 / 640.0);
        assert_eq!(px.h.rh, 1.0 / 480.0);

        let (result, _) = parse_collecting(
            r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:tts="http://www.w3.org/ns/ttml#styling" tts:extent="50% 50%"/>"#,
        );
        assert!(matches!(result, Err(IsdError::Fatal(_))));
    }

    #[test]
    fn test_region_style_priority() {
        let head = r#"<styling><style xml:id="s1" tts:color="red" tts:fontStyle="italic"/></styling>
            <layout><region xml:id="r1" style="s1" tts:color="lime"><style tts:fontStyle="normal" tts:showBackground="whenActive"/></region></layout>"#;
        let doc = parse_ttml(&tt(head, "")).unwrap();

        let region = doc.head.layout.region("r1").unwrap();
        assert_eq!(region.styles[&StyleName::Color], StyleValue::Color(crate::styles::Color::rgba(0, 255, 0, 255)));
        assert_eq!(region.styles[&StyleName::FontStyle], StyleValue::keyword("normal"));
        assert_eq!(region.styles[&StyleName::ShowBackground], StyleValue::keyword("whenActive"));
    }

    #[test]
    fn test_duplicate_region_and_missing_style_id() {
        let head = r#"<styling><style tts:color="red"/></styling>
            <layout><region xml:id="r1"/><region xml:id="r1"/><region/></layout>"#;
        let (result, handler) = parse_collecting(&tt(head, ""));
        let doc = result.unwrap();

        assert_eq!(doc.head.layout.regions.len(), 1);
        assert_eq!(handler.count(Severity::Error), 3);
    }

    #[test]
    fn test_initial_overrides_are_collected() {
        let head = r#"<styling><initial tts:color="yellow" tts:fontSize="2c"/></styling>"#;
        let doc = parse_ttml(&tt(head, "")).unwrap();

        let initials = &doc.head.styling.initials;
        assert_eq!(initials[&StyleName::Color], "yellow");
        assert_eq!(initials[&StyleName::FontSize], "2c");
    }

    #[test]
    fn test_set_validation() {
        let body = r#"<body><div>
            <set begin="1s" dur="1s" tts:color="red" tts:display="none"/>
            <set begin="2s"/>
            <p>x</p></div></body>"#;
        let (result, handler) = parse_collecting(&tt("", body));
        let doc = result.unwrap();

        let div = &doc.body.as_ref().unwrap().children()[0];
        assert_eq!(div.sets.len(), 1);
        assert_eq!(div.sets[0].style, StyleName::Color);
        assert_eq!((div.sets[0].timing.begin, div.sets[0].timing.end), (1.0, 2.0));
        assert_eq!(handler.count(Severity::Error), 2);
    }

    #[test]
    fn test_background_image_becomes_image_child() {
        let content = r##"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:smpte="http://www.smpte-ra.org/schemas/2052-1/2010/smpte-tt">
            <body><div smpte:backgroundImage="#img1"/></body></tt>"##;
        let doc = parse_ttml(content).unwrap();

        let div = &doc.body.as_ref().unwrap().children()[0];
        assert!(!div.styles.contains_key(&StyleName::BackgroundImage));
        let image = &div.children()[0];
        assert_eq!(image.kind, ElementKind::Image);
        assert_eq!(image.image.as_ref().unwrap().src, "#img1");
        assert!(matches!(image.contents, Contents::Leaf));
    }

    #[test]
    fn test_image_requires_src_and_type() {
        let (result, handler) = parse_collecting(&tt("", "<body><div><image/></div></body>"));
        let doc = result.unwrap();

        assert_eq!(doc.body.unwrap().children()[0].children().len(), 1);
        assert_eq!(handler.count(Severity::Error), 2);
    }

    #[test]
    fn test_ruby_container_ignores_text_and_undeclared_spans() {
        let body = r#"<body><div><p><span tts:ruby="container">
            <span tts:ruby="base">漢</span><span>stray</span><span tts:ruby="text">かん</span>
            </span></p></div></body>"#;
        let doc = parse_ttml(&tt("", body)).unwrap();

        let container = &doc.body.as_ref().unwrap().children()[0].children()[0].children()[0];
        let texts: Vec<Option<&str>> = container.children().iter().map(|c| c.text()).collect();
        assert_eq!(texts, [Some("漢"), Some("かん")]);
    }

    #[test]
    fn test_malformed_timing_and_time_container() {
        let body = r#"<body><div begin="bogus" timeContainer="parallel"><p dur="2s" end="x">a</p></div></body>"#;
        let (result, handler) = parse_collecting(&tt("", body));
        let doc = result.unwrap();

        let p = &doc.body.as_ref().unwrap().children()[0].children()[0];
        assert_eq!((p.begin(), p.end()), (0.0, 2.0));
        assert_eq!(handler.count(Severity::Warn), 2);
        assert_eq!(handler.count(Severity::Error), 1);
    }

    #[test]
    fn test_handler_can_abort_on_error() {
        let mut handler = CollectingErrorHandler::aborting_on_error();
        let result = parse_ttml_with(
            &tt("<layout><region/></layout>", ""),
            ParseOptions::new().error_handler(&mut handler),
        );
        assert!(matches!(
            result,
            Err(IsdError::Aborted {
                severity: Severity::Error,
                ..
            })
        ));
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl MetadataHandler for Recorder {
        fn on_open_tag(&mut self, ns: &str, local: &str, attributes: &[XmlAttribute]) {
            let attrs: Vec<String> = attributes
                .iter()
                .map(|a| format!("{}={}", a.local, a.value))
                .collect();
            self.events.push(format!("open {ns} {local} [{}]", attrs.join(",")));
        }

        fn on_text(&mut self, text: &str) {
            self.events.push(format!("text {text}"));
        }

        fn on_close_tag(&mut self) {
            self.events.push("close".to_owned());
        }
    }

    #[test]
    fn test_metadata_callbacks_mirror_subtree() {
        let content = r#"<tt xmlns="http://www.w3.org/ns/ttml" xmlns:ttm="http://www.w3.org/ns/ttml#metadata">
            <head><ttm:title>ignored</ttm:title><metadata><ttm:agent xml:id="a1" type="person"><ttm:name>Bob</ttm:name></ttm:agent></metadata></head></tt>"#;
        let mut recorder = Recorder::default();
        parse_ttml_with(content, ParseOptions::new().metadata_handler(&mut recorder)).unwrap();

        assert_eq!(
            recorder.events,
            [
                format!("open {} agent [id=a1,type=person]", namespaces::TTM),
                format!("open {} name []", namespaces::TTM),
                "text Bob".to_owned(),
                "close".to_owned(),
                "close".to_owned(),
            ]
        );
    }
}
