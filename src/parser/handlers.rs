//! # TTML 解析器 - 事件处理器
//!
//! 该模块负责把开始标签、文本和结束标签三种事件分发到对应的元素处理逻辑，
//! 校验元素的嵌套关系，并在文档结束时完成默认区域、计时解析和 ruby 清理。

use super::{
    XmlNode,
    constants::{
        ATTR_BEGIN, ATTR_DUR, ATTR_END, ATTR_ID, ATTR_LANG, ATTR_REGION, ATTR_SPACE, ATTR_SRC,
        ATTR_TIME_BASE, ATTR_TIME_CONTAINER, ATTR_TYPE, SPACE_PRESERVE, TAG_BODY, TAG_BR, TAG_DIV,
        TAG_HEAD, TAG_IMAGE, TAG_INITIAL, TAG_LAYOUT, TAG_METADATA, TAG_P, TAG_REGION, TAG_SET,
        TAG_SPAN, TAG_STYLE, TAG_STYLING, TAG_TT, TIME_BASE_MEDIA,
    },
    metadata,
    state::{Frame, NamedStyle, TreeBuilder},
    styling::{
        collect_styles, element_styles, flatten_named_styles, initial_styles,
        merge_referenced_styles, merge_if_absent, style_refs,
    },
    utils::{
        extract_aspect_ratio, extract_cell_resolution, extract_frame_and_tick_rate,
        extract_root_extent, parse_time_expression,
    },
};
use crate::{
    error::{IsdError, Result},
    length::{Dimensions, LengthUnit},
    model::{
        Contents, ContentElement, Document, Element, ElementKind, ImageSource, Set, TimeContainer,
        UnresolvedElement, XmlSpace,
    },
    namespaces,
    styles::{StyleMap, StyleName, ruby_role},
    timing::{self, EventIndex, ExplicitTiming},
};

/// 处理开始标签：维护 `xml:lang`/`xml:space` 栈，校验父元素并压入新的一帧。
pub(super) fn handle_open_tag(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<()> {
    let space = match node.attribute(namespaces::XML, ATTR_SPACE) {
        Some(SPACE_PRESERVE) => XmlSpace::Preserve,
        Some(_) => XmlSpace::Default,
        None => state.current_space(),
    };
    state.space_stack.push(space);

    let lang = match node.attribute(namespaces::XML, ATTR_LANG) {
        Some(lang) => lang.to_owned(),
        None => state.current_lang().to_owned(),
    };
    state.lang_stack.push(lang);

    let frame = if node.ns == namespaces::TT {
        match node.local.as_str() {
            TAG_TT => open_tt(state, node)?,
            TAG_HEAD => {
                require_parent(state, TAG_HEAD, "<tt>", |f| matches!(f, Frame::Tt))?;
                Frame::Head
            }
            TAG_STYLING => {
                require_parent(state, TAG_STYLING, "<head>", |f| matches!(f, Frame::Head))?;
                Frame::Styling
            }
            TAG_LAYOUT => {
                require_parent(state, TAG_LAYOUT, "<head>", |f| matches!(f, Frame::Head))?;
                Frame::Layout
            }
            TAG_STYLE => open_style(state, node)?,
            TAG_INITIAL => open_initial(state, node)?,
            TAG_REGION => open_region(state, node)?,
            TAG_BODY => open_body(state, node)?,
            TAG_DIV => open_div(state, node)?,
            TAG_IMAGE => open_image(state, node)?,
            TAG_P => {
                require_parent(state, TAG_P, "<div>", |f| is_content(f, &[ElementKind::Div]))?;
                Frame::Content(content_element(state, node, ElementKind::P)?)
            }
            TAG_SPAN => {
                require_parent(state, TAG_SPAN, "<span> 或 <p>", |f| {
                    is_content(f, &[ElementKind::Span, ElementKind::P])
                })?;
                Frame::Content(content_element(state, node, ElementKind::Span)?)
            }
            TAG_BR => {
                require_parent(state, TAG_BR, "<span> 或 <p>", |f| {
                    is_content(f, &[ElementKind::Span, ElementKind::P])
                })?;
                Frame::Content(content_element(state, node, ElementKind::Br)?)
            }
            TAG_SET => open_set(state, node)?,
            TAG_METADATA => Frame::Foreign { metadata: true },
            _ => Frame::Foreign { metadata: false },
        }
    } else {
        Frame::Foreign { metadata: false }
    };

    if let Frame::Foreign { metadata: is_metadata } = frame {
        metadata::enter_foreign_element(state, node, is_metadata);
    }

    state.stack.push(frame);
    Ok(())
}

/// 处理文本：在 `<p>` 或 `<span>` 中生成匿名 span，在 `<metadata>` 中转发。
pub(super) fn handle_text(state: &mut TreeBuilder<'_>, text: &str) -> Result<()> {
    if matches!(state.stack.last(), Some(Frame::Foreign { .. })) {
        metadata::foreign_text(state, text);
        return Ok(());
    }

    let lang = state.current_lang().to_owned();
    let space = state.current_space();

    if let Some(Frame::Content(parent)) = state.stack.last_mut()
        && matches!(parent.kind, ElementKind::P | ElementKind::Span)
    {
        // ruby 容器中的可见文本只来自其中的 base/text span
        if parent.kind == ElementKind::Span
            && matches!(
                ruby_role(&parent.styles),
                Some("container" | "textContainer" | "baseContainer")
            )
        {
            return Ok(());
        }

        let span = anonymous_span(text, lang, space);
        if let Contents::Children(children) = &mut parent.contents {
            children.push(span);
        }
    }

    Ok(())
}

/// 处理结束标签：弹出一帧，执行该元素的收尾工作，并把它挂到父元素上。
pub(super) fn handle_close_tag(state: &mut TreeBuilder<'_>) -> Result<()> {
    let Some(frame) = state.stack.pop() else {
        return Ok(());
    };
    state.lang_stack.pop();
    state.space_stack.pop();

    match frame {
        Frame::Styling => flatten_named_styles(&mut state.named_styles, &mut state.reporter)?,
        Frame::Region {
            mut region,
            style_refs,
            registered,
        } => {
            merge_referenced_styles(
                &state.named_styles,
                &style_refs,
                &mut region.styles,
                &mut state.reporter,
            )?;
            if registered {
                state.regions.push(region);
            }
        }
        Frame::Content(mut element) => {
            if matches!(element.kind, ElementKind::P | ElementKind::Span) {
                merge_anonymous_spans(&mut element);
            }
            attach_content(state, element);
        }
        Frame::Set(Some(set)) => {
            if let Some(Frame::Content(parent) | Frame::Region { region: parent, .. }) =
                state.stack.last_mut()
            {
                parent.sets.push(set);
            }
        }
        Frame::Foreign {
            metadata: is_metadata,
        } => metadata::leave_foreign_element(state, is_metadata),
        Frame::Tt
        | Frame::Head
        | Frame::Layout
        | Frame::Style
        | Frame::Initial
        | Frame::Set(None) => {}
    }

    Ok(())
}

/// 文档结束后的收尾：补上默认区域，解析所有区域和 body 的计时，清理 ruby 容器。
pub(super) fn finish(mut state: TreeBuilder<'_>) -> Result<Document> {
    let Some(mut document) = state.document.take() else {
        return Err(IsdError::MissingRoot);
    };

    if state.regions.is_empty() {
        state.regions.push(default_region(&document.lang));
    }

    let mut events = EventIndex::default();
    document.head.layout.regions = state
        .regions
        .into_iter()
        .map(|region| timing::resolve(region, &mut events))
        .collect();

    document.body = state.body.take().map(|body| {
        let mut body = timing::resolve(body, &mut events);
        clean_ruby_containers(&mut body);
        body
    });
    document.events = events;

    Ok(document)
}

fn fatal_at(state: &mut TreeBuilder<'_>, message: &str) -> IsdError {
    let position = state.position;
    state.reporter.fatal(format!("{message}，位置 {position}"))
}

/// 父元素不满足 `accepts` 时报告致命错误。
fn require_parent(
    state: &mut TreeBuilder<'_>,
    tag: &str,
    expected: &str,
    accepts: impl Fn(&Frame) -> bool,
) -> Result<()> {
    if state.stack.last().is_some_and(accepts) {
        return Ok(());
    }
    Err(fatal_at(
        state,
        &format!("<{tag}> 元素的父元素不是 {expected}"),
    ))
}

fn is_content(frame: &Frame, kinds: &[ElementKind]) -> bool {
    matches!(frame, Frame::Content(element) if kinds.contains(&element.kind))
}

fn open_tt(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    if state.document.is_some() {
        return Err(fatal_at(state, "文档中出现了两个 <tt> 元素"));
    }

    let (columns, rows) = extract_cell_resolution(node, &mut state.reporter)?;
    let (effective_frame_rate, tick_rate) = extract_frame_and_tick_rate(node, &mut state.reporter)?;
    let aspect_ratio = extract_aspect_ratio(node, &mut state.reporter)?;

    if let Some(time_base) = node.attribute(namespaces::TTP, ATTR_TIME_BASE)
        && time_base != TIME_BASE_MEDIA
    {
        return Err(fatal_at(
            state,
            &format!("不支持的时间基准 '{time_base}'"),
        ));
    }

    let px_length = match extract_root_extent(node, &mut state.reporter)? {
        None => None,
        Some((w, h)) if w.unit == LengthUnit::Px && h.unit == LengthUnit::Px => {
            if w.value > 0.0 && h.value > 0.0 {
                Some(Dimensions::divided(w.value, h.value))
            } else {
                state
                    .reporter
                    .warn(&format!("根元素的 extent {w} {h} 不是正数，已忽略"))?;
                None
            }
        }
        Some(_) => {
            return Err(fatal_at(state, "根元素的 tts:extent 必须以 px 为单位"));
        }
    };

    state.document = Some(Document {
        cell_length: Dimensions::divided(columns, rows),
        effective_frame_rate,
        tick_rate,
        aspect_ratio,
        px_length,
        lang: state.current_lang().to_owned(),
        ..Document::default()
    });

    Ok(Frame::Tt)
}

fn open_style(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    match state.stack.last() {
        Some(Frame::Styling) => {
            let styles = element_styles(node, &mut state.reporter)?;
            match node.attribute(namespaces::XML, ATTR_ID).filter(|id| !id.is_empty()) {
                Some(id) => {
                    let style = NamedStyle {
                        styles,
                        refs: style_refs(node),
                    };
                    state.named_styles.insert(id.to_owned(), style);
                }
                None => state.reporter.error("<style> 元素缺少 xml:id 属性，已忽略")?,
            }
        }
        Some(Frame::Region { .. }) => {
            // 嵌套的样式立即合并，优先级低于区域自身的属性
            let styles = element_styles(node, &mut state.reporter)?;
            if let Some(Frame::Region { region, .. }) = state.stack.last_mut() {
                merge_if_absent(&styles, &mut region.styles);
            }
        }
        _ => {
            return Err(fatal_at(
                state,
                "<style> 元素的父元素不是 <styling> 或 <region>",
            ));
        }
    }
    Ok(Frame::Style)
}

fn open_initial(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_INITIAL, "<styling>", |f| matches!(f, Frame::Styling))?;

    let initials = initial_styles(node, &mut state.reporter)?;
    if let Some(document) = state.document.as_mut() {
        document.head.styling.initials.extend(initials);
    }
    Ok(Frame::Initial)
}

fn open_region(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_REGION, "<layout>", |f| matches!(f, Frame::Layout))?;

    let mut region = bare_element(state, node, ElementKind::Region)?;
    region.styles = element_styles(node, &mut state.reporter)?;
    region.contents = Contents::Leaf;

    let registered = match region.id.as_deref() {
        Some(id) => state.region_ids.insert(id.to_owned()),
        None => false,
    };
    if !registered {
        let position = state.position;
        state.reporter.error(&format!(
            "忽略 xml:id 缺失或重复的 <region>，位置 {position}"
        ))?;
    }

    Ok(Frame::Region {
        region,
        style_refs: style_refs(node),
        registered,
    })
}

fn open_body(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_BODY, "<tt>", |f| matches!(f, Frame::Tt))?;
    if state.body_opened {
        return Err(fatal_at(state, "文档中出现了第二个 <body> 元素"));
    }
    state.body_opened = true;

    Ok(Frame::Content(content_element(state, node, ElementKind::Body)?))
}

fn open_div(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_DIV, "<body> 或 <div>", |f| {
        is_content(f, &[ElementKind::Body, ElementKind::Div])
    })?;

    let mut div = content_element(state, node, ElementKind::Div)?;

    // smpte:backgroundImage 改写为子 image 元素
    if let Some(background) = div.styles.remove(&StyleName::BackgroundImage)
        && let Some(src) = background.as_keyword()
    {
        let image = Element {
            contents: Contents::Leaf,
            image: Some(ImageSource {
                src: src.to_owned(),
                mime_type: None,
            }),
            ..detached_element(ElementKind::Image, div.lang.clone(), div.space)
        };
        if let Contents::Children(children) = &mut div.contents {
            children.push(image);
        }
    }

    Ok(Frame::Content(div))
}

fn open_image(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_IMAGE, "<div>", |f| is_content(f, &[ElementKind::Div]))?;

    let src = node.attribute("", ATTR_SRC).filter(|s| !s.is_empty());
    if src.is_none() {
        state.reporter.error("image 元素的 src 属性无效")?;
    }
    let mime_type = node.attribute("", ATTR_TYPE).filter(|t| !t.is_empty());
    if mime_type.is_none() {
        state.reporter.error("image 元素的 type 属性无效")?;
    }

    let mut image = content_element(state, node, ElementKind::Image)?;
    image.image = Some(ImageSource {
        src: src.unwrap_or_default().to_owned(),
        mime_type: mime_type.map(str::to_owned),
    });
    Ok(Frame::Content(image))
}

fn open_set(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<Frame> {
    require_parent(state, TAG_SET, "内容元素或区域", |f| match f {
        Frame::Content(element) => !matches!(element.kind, ElementKind::Image),
        Frame::Region { .. } => true,
        _ => false,
    })?;

    let timing = explicit_timing(state, node)?;
    let mut styles = collect_styles(node, &mut state.reporter)?.into_iter();

    let Some((style, value)) = styles.next() else {
        state.reporter.error("<set> 元素没有指定任何样式，已忽略")?;
        return Ok(Frame::Set(None));
    };
    if styles.next().is_some() {
        state
            .reporter
            .error("<set> 元素指定了多个样式，只保留第一个")?;
    }

    Ok(Frame::Set(Some(Set {
        timing,
        style,
        value,
    })))
}

/// 不带任何属性的元素骨架。
fn detached_element(kind: ElementKind, lang: String, space: XmlSpace) -> UnresolvedElement {
    Element {
        kind,
        id: None,
        lang,
        space,
        region_id: None,
        styles: StyleMap::new(),
        sets: Vec::new(),
        time_container: TimeContainer::Par,
        timing: ExplicitTiming::default(),
        contents: Contents::Children(Vec::new()),
        image: None,
        anonymous: false,
    }
}

fn anonymous_span(text: &str, lang: String, space: XmlSpace) -> UnresolvedElement {
    Element {
        contents: Contents::Text(text.to_owned()),
        anonymous: true,
        ..detached_element(ElementKind::Span, lang, space)
    }
}

/// 带有标识、计时和时间容器的元素，样式留空。
fn bare_element(
    state: &mut TreeBuilder<'_>,
    node: &XmlNode,
    kind: ElementKind,
) -> Result<UnresolvedElement> {
    let mut element = detached_element(kind, state.current_lang().to_owned(), state.current_space());
    element.id = node
        .attribute(namespaces::XML, ATTR_ID)
        .filter(|id| !id.is_empty())
        .map(str::to_owned);
    element.timing = explicit_timing(state, node)?;
    element.time_container = time_container(state, node)?;
    Ok(element)
}

/// 内容元素：标识、计时、区域关联，除 `<br>` 外还有样式。
fn content_element(
    state: &mut TreeBuilder<'_>,
    node: &XmlNode,
    kind: ElementKind,
) -> Result<UnresolvedElement> {
    let mut element = bare_element(state, node, kind)?;
    element.region_id = node.attribute("", ATTR_REGION).map(str::to_owned);

    if kind != ElementKind::Br {
        let mut styles = element_styles(node, &mut state.reporter)?;
        merge_referenced_styles(
            &state.named_styles,
            &style_refs(node),
            &mut styles,
            &mut state.reporter,
        )?;
        element.styles = styles;
    }

    if matches!(kind, ElementKind::Br | ElementKind::Image) {
        element.contents = Contents::Leaf;
    }

    Ok(element)
}

fn explicit_timing(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<ExplicitTiming> {
    let (effective_frame_rate, tick_rate) = state.time_rates();
    let parse = |value: &str| parse_time_expression(value, effective_frame_rate, tick_rate);

    let mut timing = ExplicitTiming::default();

    if let Some(value) = node.attribute("", ATTR_BEGIN) {
        timing.begin = parse(value);
        if timing.begin.is_none() {
            state
                .reporter
                .warn(&format!("begin 值 '{value}' 格式错误，按未指定处理"))?;
        }
    }
    if let Some(value) = node.attribute("", ATTR_DUR) {
        timing.dur = parse(value);
        if timing.dur.is_none() {
            state
                .reporter
                .warn(&format!("dur 值 '{value}' 格式错误，已忽略"))?;
        }
    }
    if let Some(value) = node.attribute("", ATTR_END) {
        timing.end = parse(value);
        if timing.end.is_none() {
            state
                .reporter
                .warn(&format!("end 值 '{value}' 格式错误，已忽略"))?;
        }
    }

    Ok(timing)
}

fn time_container(state: &mut TreeBuilder<'_>, node: &XmlNode) -> Result<TimeContainer> {
    match node.attribute("", ATTR_TIME_CONTAINER) {
        None | Some("" | "par") => Ok(TimeContainer::Par),
        Some("seq") => Ok(TimeContainer::Seq),
        Some(other) => {
            state
                .reporter
                .error(&format!("timeContainer 的值 '{other}' 非法，按 'par' 处理"))?;
            Ok(TimeContainer::Par)
        }
    }
}

/// 把关闭的内容元素挂到父元素上。父元素为 `<tt>` 时即为 body。
fn attach_content(state: &mut TreeBuilder<'_>, element: UnresolvedElement) {
    match state.stack.last_mut() {
        Some(Frame::Content(parent)) => {
            if let Contents::Children(children) = &mut parent.contents {
                children.push(element);
            }
        }
        Some(Frame::Tt) => state.body = Some(element),
        _ => {}
    }
}

/// 合并相邻的匿名 span；只剩一个匿名子元素的 span 直接携带其文本。
fn merge_anonymous_spans(element: &mut UnresolvedElement) {
    let Contents::Children(children) = &mut element.contents else {
        return;
    };

    if children.len() > 1 {
        let mut merged: Vec<UnresolvedElement> = Vec::with_capacity(children.len());
        for child in children.drain(..) {
            if child.anonymous
                && let Some(last) = merged.last_mut()
                && last.anonymous
                && let (Contents::Text(acc), Contents::Text(text)) =
                    (&mut last.contents, &child.contents)
            {
                acc.push_str(text);
                continue;
            }
            merged.push(child);
        }
        *children = merged;
    }

    if element.kind == ElementKind::Span
        && children.len() == 1
        && children[0].anonymous
        && let Some(Element {
            contents: Contents::Text(text),
            ..
        }) = children.pop()
    {
        element.contents = Contents::Text(text);
    }
}

fn default_region(lang: &str) -> UnresolvedElement {
    Element {
        id: Some(String::new()),
        contents: Contents::Leaf,
        ..detached_element(ElementKind::Region, lang.to_owned(), XmlSpace::Default)
    }
}

/// 删除 ruby 容器中没有 `tts:ruby` 的子元素。
fn clean_ruby_containers(element: &mut ContentElement) {
    let is_container = element.kind == ElementKind::Span
        && matches!(
            ruby_role(&element.styles),
            Some("container" | "textContainer" | "baseContainer")
        );

    if let Contents::Children(children) = &mut element.contents {
        if is_container {
            children.retain(|child| child.styles.contains_key(&StyleName::Ruby));
        }
        for child in children {
            clean_ruby_containers(child);
        }
    }
}
