//! # 样式层叠
//!
//! 对一个区域后序遍历 body 树：依次应用动画、派生规则、继承、初始值、
//! 单位计算和适用性裁剪，最后整理空白并决定元素是否保留。

use std::collections::BTreeSet;

use super::{IsdContentElement, whitespace};
use crate::{
    error::{Reporter, Result},
    length::ComputedLength,
    model::{ContentElement, Document, ElementKind},
    styles::{StyleName, StyleValue, compute::ComputeContext, definitions, ruby_role},
};

/// ruby 容器类 span 上不生效的样式。
const RUBY_CONTAINER_EXCLUDED: &[StyleName] = &[
    StyleName::Color,
    StyleName::TextCombine,
    StyleName::TextDecoration,
    StyleName::TextEmphasis,
    StyleName::TextOutline,
    StyleName::TextShadow,
];

pub(super) struct Cascade<'d, 'h> {
    doc: &'d Document,
    offset: f64,
    reporter: Reporter<'h>,
    context: ComputeContext,
}

impl<'d, 'h> Cascade<'d, 'h> {
    pub(super) const fn new(doc: &'d Document, offset: f64, reporter: Reporter<'h>) -> Self {
        Self {
            doc,
            offset,
            reporter,
            context: ComputeContext,
        }
    }

    /// 处理一个活动区域，返回保留下来的区域元素。
    pub(super) fn process_region(
        &mut self,
        region: &ContentElement,
    ) -> Result<Option<IsdContentElement>> {
        self.process(region, None, "", region)
    }

    fn process(
        &mut self,
        region: &ContentElement,
        parent: Option<&IsdContentElement>,
        inherited_region_id: &str,
        element: &ContentElement,
    ) -> Result<Option<IsdContentElement>> {
        if !element.is_active_at(self.offset) {
            return Ok(None);
        }

        let region_id = region.id.as_deref().unwrap_or_default();
        let associated_region_id = element.explicit_region().unwrap_or(inherited_region_id);

        // 属于其他区域的元素留到那个区域处理
        if parent.is_some()
            && associated_region_id != region_id
            && (element.is_terminal() || !associated_region_id.is_empty())
        {
            return Ok(None);
        }

        let mut isd_element = IsdContentElement::from_element(element);

        for set in &element.sets {
            if set.timing.contains(self.offset) {
                isd_element.styles.insert(set.style, set.value.clone());
            }
        }

        let mut specified: BTreeSet<StyleName> = isd_element.styles.keys().copied().collect();

        if isd_element.kind == ElementKind::Region {
            derive_direction(&mut isd_element);
        }

        if let Some(parent) = parent {
            inherit_styles(parent, &mut isd_element);
        }

        self.apply_initial_values(&mut isd_element, &mut specified)?;
        self.compute_styles(parent, &mut isd_element, &specified)?;

        if isd_element.style(StyleName::Display).and_then(StyleValue::as_keyword) == Some("none") {
            return Ok(None);
        }

        // 区域的唯一子元素是 body
        let doc = self.doc;
        let contents = match (parent, &doc.body) {
            (None, Some(body)) => std::slice::from_ref(body),
            (None, None) => &[],
            (Some(_), _) => element.children(),
        };

        let mut children = Vec::new();
        for child in contents {
            if let Some(child) =
                self.process(region, Some(&isd_element), associated_region_id, child)?
            {
                children.push(child);
            }
        }
        isd_element.contents = children;

        remove_inapplicable_styles(&mut isd_element);

        if isd_element.kind == ElementKind::P
            || (isd_element.kind == ElementKind::Span
                && matches!(isd_element.ruby(), Some("textContainer" | "text")))
        {
            whitespace::normalize(&mut isd_element);
        }

        Ok(is_retained(&isd_element).then_some(isd_element))
    }

    /// 对尚未确定的属性使用 `<initial>` 覆盖值或目录中的初始值。
    ///
    /// 区域上应用所有属性的初始值，其他元素只应用不可继承属性的初始值。
    fn apply_initial_values(
        &mut self,
        element: &mut IsdContentElement,
        specified: &mut BTreeSet<StyleName>,
    ) -> Result<()> {
        for definition in definitions() {
            if element.styles.contains_key(&definition.name) {
                continue;
            }

            // position 与 origin 互斥
            let exclusive = match definition.name {
                StyleName::Position => Some(StyleName::Origin),
                StyleName::Origin => Some(StyleName::Position),
                _ => None,
            };
            if exclusive.is_some_and(|other| element.styles.contains_key(&other)) {
                continue;
            }

            let Some(initial) = self
                .doc
                .head
                .styling
                .initials
                .get(&definition.name)
                .map(String::as_str)
                .or(definition.initial)
            else {
                continue;
            };

            if element.kind != ElementKind::Region && definition.inherit {
                continue;
            }

            match (definition.parse)(initial) {
                Some(value) => {
                    element.styles.insert(definition.name, value);
                    specified.insert(definition.name);
                }
                None => self.reporter.error(&format!(
                    "元素 {} 上 {} 的初始值 '{initial}' 无效",
                    element.kind, definition.local
                ))?,
            }
        }
        Ok(())
    }

    /// 计算所有在本元素上指定（包括动画和初始值）的属性。
    ///
    /// 无法计算时改用该属性自身的初始值重新计算，并报告错误。
    fn compute_styles(
        &mut self,
        parent: Option<&IsdContentElement>,
        element: &mut IsdContentElement,
        specified: &BTreeSet<StyleName>,
    ) -> Result<()> {
        for definition in definitions() {
            let Some(compute) = definition.compute else {
                continue;
            };
            if !specified.contains(&definition.name) {
                continue;
            }
            let Some(value) = element.styles.get(&definition.name).cloned() else {
                continue;
            };

            if let Some(computed) = compute(self.doc, parent, element, &value, &mut self.context) {
                element.styles.insert(definition.name, computed);
                continue;
            }

            let fallback = definition
                .parsed_initial()
                .and_then(|initial| compute(self.doc, parent, element, &initial, &mut self.context));
            match fallback {
                Some(computed) => {
                    element.styles.insert(definition.name, computed);
                }
                None => {
                    element.styles.remove(&definition.name);
                }
            }

            self.reporter.error(&format!(
                "元素 {} 上的样式 {} 无法计算，已使用初始值",
                element.kind, definition.local
            ))?;
        }
        Ok(())
    }
}

/// 区域指定了 `writingMode` 而没有指定 `direction` 时，由书写方向推出 `direction`。
fn derive_direction(element: &mut IsdContentElement) {
    if element.styles.contains_key(&StyleName::Direction) {
        return;
    }
    let direction = match element
        .style(StyleName::WritingMode)
        .and_then(StyleValue::as_keyword)
    {
        Some("lrtb" | "lr") => "ltr",
        Some("rltb" | "rl") => "rtl",
        _ => return,
    };
    element
        .styles
        .insert(StyleName::Direction, StyleValue::keyword(direction));
}

fn half(length: ComputedLength) -> StyleValue {
    StyleValue::Computed(length.scale(0.5))
}

/// 从父元素继承可继承的属性。
fn inherit_styles(parent: &IsdContentElement, element: &mut IsdContentElement) {
    let role = ruby_role(&element.styles).map(str::to_owned);
    let parent_font_size = parent
        .style(StyleName::FontSize)
        .and_then(StyleValue::as_computed);

    for definition in definitions() {
        let name = definition.name;

        if name == StyleName::TextDecoration {
            let merged = merge_text_decoration(
                parent.style(name),
                element.styles.get(&name),
            );
            if let Some(merged) = merged {
                element.styles.insert(name, merged);
            }
            continue;
        }

        if element.styles.contains_key(&name) {
            continue;
        }

        if name == StyleName::FontSize && element.kind == ElementKind::Span {
            let ruby_size = match (role.as_deref(), parent_font_size) {
                (Some("textContainer"), Some(fs)) => Some(half(fs)),
                (Some("text"), Some(fs)) if parent.ruby() == Some("textContainer") => {
                    Some(StyleValue::Computed(fs))
                }
                (Some("text"), Some(fs)) => Some(half(fs)),
                _ => None,
            };
            if let Some(value) = ruby_size {
                element.styles.insert(name, value);
                continue;
            }
        }

        if definition.inherit
            && let Some(value) = parent.style(name)
        {
            element.styles.insert(name, value.clone());
        }
    }
}

/// 合并 `textDecoration`：元素没有指定时原样继承，指定了 `none` 时以 `none` 为准，
/// 否则逐条决定下划线、删除线和上划线。
fn merge_text_decoration(
    parent: Option<&StyleValue>,
    own: Option<&StyleValue>,
) -> Option<StyleValue> {
    let Some(StyleValue::TextDecoration(own)) = own else {
        return parent.cloned();
    };
    if own.iter().any(|d| d == "none") {
        return Some(StyleValue::TextDecoration(vec!["none".to_owned()]));
    }

    let inherited: &[String] = match parent {
        Some(StyleValue::TextDecoration(p)) => p,
        _ => &[],
    };
    let has = |list: &[String], value: &str| list.iter().any(|d| d == value);

    let merged = [
        ("underline", "noUnderline"),
        ("lineThrough", "noLineThrough"),
        ("overline", "noOverline"),
    ]
    .into_iter()
    .filter(|(line, cancel)| has(own, line) || (has(inherited, line) && !has(own, cancel)))
    .map(|(line, _)| line.to_owned())
    .collect();

    Some(StyleValue::TextDecoration(merged))
}

/// 删除不适用于该元素的样式，包括 ruby 相关的特殊规则。
fn remove_inapplicable_styles(element: &mut IsdContentElement) {
    let kind = element.kind;
    let role = if kind == ElementKind::Span {
        element.ruby().map(str::to_owned)
    } else {
        None
    };
    let is_container = matches!(
        role.as_deref(),
        Some("container" | "textContainer" | "baseContainer")
    );

    element.styles.retain(|name, _| {
        if kind == ElementKind::Span {
            if is_container && RUBY_CONTAINER_EXCLUDED.contains(name) {
                return false;
            }
            if *name == StyleName::RubyAlign && role.as_deref() != Some("container") {
                return false;
            }
            if *name == StyleName::RubyPosition
                && !matches!(role.as_deref(), Some("textContainer" | "text"))
            {
                return false;
            }
        }
        name.definition().applies_to(kind)
    });
}

/// 元素在没有可见内容时是否仍然保留。
fn is_retained(element: &IsdContentElement) -> bool {
    match element.kind {
        ElementKind::Br | ElementKind::Image => true,
        ElementKind::Div if element.styles.contains_key(&StyleName::BackgroundImage) => true,
        ElementKind::Span if element.text.as_deref().is_some_and(|t| !t.is_empty()) => true,
        ElementKind::Region
            if element
                .style(StyleName::ShowBackground)
                .and_then(StyleValue::as_keyword)
                == Some("always") =>
        {
            true
        }
        _ => !element.contents.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoration(values: &[&str]) -> StyleValue {
        StyleValue::TextDecoration(values.iter().map(|v| (*v).to_owned()).collect())
    }

    #[test]
    fn test_text_decoration_merge() {
        let parent = decoration(&["underline"]);

        assert_eq!(
            merge_text_decoration(Some(&parent), Some(&decoration(&["noUnderline", "lineThrough"]))),
            Some(decoration(&["lineThrough"]))
        );
        assert_eq!(merge_text_decoration(Some(&parent), None), Some(parent.clone()));
        assert_eq!(
            merge_text_decoration(Some(&parent), Some(&decoration(&["overline", "none"]))),
            Some(decoration(&["none"]))
        );
        assert_eq!(
            merge_text_decoration(None, Some(&decoration(&["overline"]))),
            Some(decoration(&["overline"]))
        );
    }

    #[test]
    fn test_direction_follows_writing_mode() {
        let mut region = IsdContentElement::empty(ElementKind::Region);
        region
            .styles
            .insert(StyleName::WritingMode, StyleValue::keyword("rl"));
        derive_direction(&mut region);
        assert_eq!(region.style(StyleName::Direction), Some(&StyleValue::keyword("rtl")));

        let mut vertical = IsdContentElement::empty(ElementKind::Region);
        vertical
            .styles
            .insert(StyleName::WritingMode, StyleValue::keyword("tbrl"));
        derive_direction(&mut vertical);
        assert_eq!(vertical.style(StyleName::Direction), None);
    }

    #[test]
    fn test_ruby_text_container_font_size() {
        let mut parent = IsdContentElement::empty(ElementKind::Span);
        parent.styles.insert(
            StyleName::FontSize,
            StyleValue::Computed(ComputedLength::new(0.0, 0.1)),
        );
        parent
            .styles
            .insert(StyleName::Ruby, StyleValue::keyword("textContainer"));

        // textContainer 中的 text 直接沿用父元素的字号，容器本身已经减半
        let mut text = IsdContentElement::empty(ElementKind::Span);
        text.styles.insert(StyleName::Ruby, StyleValue::keyword("text"));
        inherit_styles(&parent, &mut text);
        assert_eq!(
            text.style(StyleName::FontSize),
            Some(&StyleValue::Computed(ComputedLength::new(0.0, 0.1)))
        );

        let mut container = IsdContentElement::empty(ElementKind::Span);
        container
            .styles
            .insert(StyleName::Ruby, StyleValue::keyword("textContainer"));
        inherit_styles(&parent, &mut container);
        assert_eq!(
            container.style(StyleName::FontSize),
            Some(&StyleValue::Computed(ComputedLength::new(0.0, 0.05)))
        );
    }

    #[test]
    fn test_ruby_applicability() {
        let mut base = IsdContentElement::empty(ElementKind::Span);
        base.styles.insert(StyleName::Ruby, StyleValue::keyword("base"));
        base.styles.insert(StyleName::RubyAlign, StyleValue::keyword("center"));
        base.styles.insert(StyleName::RubyPosition, StyleValue::keyword("outside"));
        base.styles.insert(StyleName::Color, StyleValue::keyword("red"));
        base.styles.insert(StyleName::Extent, StyleValue::keyword("auto"));
        remove_inapplicable_styles(&mut base);

        let names: Vec<StyleName> = base.styles.keys().copied().collect();
        assert_eq!(names, [StyleName::Color, StyleName::Ruby]);

        let mut container = IsdContentElement::empty(ElementKind::Span);
        container.styles.insert(StyleName::Ruby, StyleValue::keyword("container"));
        container.styles.insert(StyleName::RubyAlign, StyleValue::keyword("center"));
        container.styles.insert(StyleName::Color, StyleValue::keyword("red"));
        remove_inapplicable_styles(&mut container);

        let names: Vec<StyleName> = container.styles.keys().copied().collect();
        assert_eq!(names, [StyleName::Ruby, StyleName::RubyAlign]);
    }

    #[test]
    fn test_retention_rule() {
        assert!(is_retained(&IsdContentElement::empty(ElementKind::Br)));
        assert!(is_retained(&IsdContentElement::empty(ElementKind::Image)));
        assert!(!is_retained(&IsdContentElement::empty(ElementKind::Div)));

        let mut span = IsdContentElement::empty(ElementKind::Span);
        span.text = Some(String::new());
        assert!(!is_retained(&span));
        span.text = Some("a".to_owned());
        assert!(is_retained(&span));

        let mut region = IsdContentElement::empty(ElementKind::Region);
        region
            .styles
            .insert(StyleName::ShowBackground, StyleValue::keyword("whenActive"));
        assert!(!is_retained(&region));
        region.contents.push(span);
        assert!(is_retained(&region));
    }
}
