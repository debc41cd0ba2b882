//! # TTML 解析器 - 样式属性的收集与合并
//!
//! 元素上直接指定的样式优先级最高，其次是 `style` 属性引用的具名样式。
//! 具名样式之间的引用在 `<styling>` 关闭时展开。

use std::collections::BTreeMap;

use super::{XmlNode, constants::ATTR_STYLE, state::NamedStyle};
use crate::{
    error::{Reporter, Result},
    namespaces,
    styles::{StyleMap, StyleName, StyleValue, lookup_by_qname},
};

/// 按文档顺序收集元素上可以识别的样式属性。
///
/// 无法解析的值报告为错误并丢弃；`zIndex` 会额外产生一条警告，
/// 因为 IMSC1 中的区域不会重叠。
pub(super) fn collect_styles(
    node: &XmlNode,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<(StyleName, StyleValue)>> {
    let mut styles = Vec::new();

    for attr in &node.attributes {
        let Some(definition) = lookup_by_qname(&attr.ns, &attr.local) else {
            continue;
        };

        match (definition.parse)(&attr.value) {
            Some(value) => {
                if definition.name == StyleName::ZIndex {
                    reporter.warn("存在 zIndex 属性，但 IMSC1 中的区域不会重叠，该属性不会生效")?;
                }
                styles.push((definition.name, value));
            }
            None => reporter.error(&format!(
                "无法解析样式属性 {} --> {}",
                definition.qname(),
                attr.value
            ))?,
        }
    }

    Ok(styles)
}

pub(super) fn element_styles(node: &XmlNode, reporter: &mut Reporter<'_>) -> Result<StyleMap> {
    Ok(collect_styles(node, reporter)?.into_iter().collect())
}

/// `style` 属性中以空白分隔的样式 ID。
pub(super) fn style_refs(node: &XmlNode) -> Vec<String> {
    node.attribute("", ATTR_STYLE)
        .map(|refs| refs.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// 把 `from` 中 `into` 尚未指定的属性复制过去。
pub(super) fn merge_if_absent(from: &StyleMap, into: &mut StyleMap) {
    for (name, value) in from {
        into.entry(*name).or_insert_with(|| value.clone());
    }
}

/// 合并元素引用的具名样式。越靠后的引用优先级越高。
pub(super) fn merge_referenced_styles(
    named: &BTreeMap<String, NamedStyle>,
    refs: &[String],
    into: &mut StyleMap,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    for reference in refs.iter().rev() {
        match named.get(reference) {
            Some(style) => merge_if_absent(&style.styles, into),
            None => reporter.error(&format!("引用了不存在的样式 ID '{reference}'"))?,
        }
    }
    Ok(())
}

/// 展开所有具名样式之间的引用链。
///
/// 被引用的样式先展开，再以较低的优先级合并进引用方。
/// 形成环的引用会被报告为错误并跳过。
pub(super) fn flatten_named_styles(
    named: &mut BTreeMap<String, NamedStyle>,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    let ids: Vec<String> = named.keys().cloned().collect();
    let mut chain = Vec::new();
    for id in &ids {
        flatten_chain(named, id, &mut chain, reporter)?;
    }
    Ok(())
}

fn flatten_chain(
    named: &mut BTreeMap<String, NamedStyle>,
    id: &str,
    chain: &mut Vec<String>,
    reporter: &mut Reporter<'_>,
) -> Result<()> {
    let Some(style) = named.get_mut(id) else {
        return Ok(());
    };
    let mut refs = std::mem::take(&mut style.refs);

    chain.push(id.to_owned());
    while let Some(reference) = refs.pop() {
        if chain.contains(&reference) {
            reporter.error(&format!(
                "样式 '{id}' 循环引用了样式 '{reference}'，已忽略该引用"
            ))?;
            continue;
        }
        if !named.contains_key(&reference) {
            reporter.error(&format!("引用了不存在的样式 ID '{reference}'"))?;
            continue;
        }

        flatten_chain(named, &reference, chain, reporter)?;

        let inherited = named
            .get(&reference)
            .map(|s| s.styles.clone())
            .unwrap_or_default();
        if let Some(style) = named.get_mut(id) {
            merge_if_absent(&inherited, &mut style.styles);
        }
    }
    chain.pop();

    Ok(())
}

/// 收集 `<initial>` 上的样式属性，保留原始字符串。
///
/// 样式命名空间中无法识别的属性会产生警告，无法解析的值会产生错误。
pub(super) fn initial_styles(
    node: &XmlNode,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<(StyleName, String)>> {
    let mut initials = Vec::new();

    for attr in &node.attributes {
        let in_styling_ns = matches!(
            attr.ns.as_str(),
            namespaces::TTS | namespaces::ITTS | namespaces::EBUTTS | namespaces::SMPTE
        );
        if !in_styling_ns {
            continue;
        }

        let Some(definition) = lookup_by_qname(&attr.ns, &attr.local) else {
            reporter.warn(&format!(
                "<initial> 中的样式属性 {} {} 无法识别，已忽略",
                attr.ns, attr.local
            ))?;
            continue;
        };

        if (definition.parse)(&attr.value).is_some() {
            initials.push((definition.name, attr.value.clone()));
        } else {
            reporter.error(&format!(
                "无法解析样式属性 {} --> {}",
                definition.qname(),
                attr.value
            ))?;
        }
    }

    Ok(initials)
}
