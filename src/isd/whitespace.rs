//! # 空白折叠
//!
//! 段落（以及 ruby 文本）内的叶子 span 被视为一个连续的文本序列：
//! 连续的空白折叠为一个空格，行首和行尾的空格被删除，变空的 span 被移除。

use once_cell::sync::Lazy;
use regex::Regex;

use super::IsdContentElement;
use crate::model::{ElementKind, XmlSpace};

static LWSP_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\t\r\n ]+").expect("未能编译 LWSP_RUN_REGEX"));

/// 整理 `element` 中所有可达叶子的空白，然后自底向上删除空的 span。
pub(super) fn normalize(element: &mut IsdContentElement) {
    let mut leaves = Vec::new();
    collect_leaves(element, &mut leaves);
    collapse(&mut leaves);
    prune_empty_spans(element);
}

/// 按文档顺序收集文本 span 和换行。ruby 文本及其容器各自独立处理，不在此收集。
fn collect_leaves<'a>(element: &'a mut IsdContentElement, leaves: &mut Vec<&'a mut IsdContentElement>) {
    for child in &mut element.contents {
        let independent = child.kind == ElementKind::Span
            && matches!(child.ruby(), Some("textContainer" | "text"));
        if independent {
            continue;
        }

        let has_text = child.text.as_deref().map(|text| !text.is_empty());
        match has_text {
            Some(true) => leaves.push(child),
            Some(false) => {}
            None if child.kind == ElementKind::Br => leaves.push(child),
            None => collect_leaves(child, leaves),
        }
    }
}

fn is_fixed(element: &IsdContentElement) -> bool {
    element.kind == ElementKind::Br || element.space == XmlSpace::Preserve
}

fn text_of(element: &IsdContentElement) -> &str {
    element.text.as_deref().unwrap_or_default()
}

/// 前一个叶子是否以空白结束。
fn ends_with_lwsp(element: &IsdContentElement) -> bool {
    element.kind == ElementKind::Br || text_of(element).ends_with(['\r', '\n', '\t', ' '])
}

/// 后一个叶子是否以空白开始。只有保留空白的文本会以换行开头。
fn starts_with_lwsp(element: &IsdContentElement) -> bool {
    element.kind == ElementKind::Br
        || (element.space == XmlSpace::Preserve && text_of(element).starts_with(['\r', '\n']))
}

fn collapse(leaves: &mut Vec<&mut IsdContentElement>) {
    let mut i = 0;
    while i < leaves.len() {
        if is_fixed(leaves[i]) {
            i += 1;
            continue;
        }

        let mut text = LWSP_RUN_REGEX.replace_all(text_of(leaves[i]), " ").into_owned();
        if text.starts_with(' ') && (i == 0 || ends_with_lwsp(leaves[i - 1])) {
            text.remove(0);
        }

        let is_empty = text.is_empty();
        leaves[i].text = Some(text);
        if is_empty {
            leaves.remove(i);
        } else {
            i += 1;
        }
    }

    for i in 0..leaves.len() {
        if is_fixed(leaves[i]) {
            continue;
        }
        let trailing = text_of(leaves[i]).ends_with(' ')
            && leaves.get(i + 1).is_none_or(|next| starts_with_lwsp(next));
        if trailing && let Some(text) = leaves[i].text.as_mut() {
            text.pop();
        }
    }
}

/// 删除变空的 span 和不再包含任何内容的分支。返回 `element` 自身是否为空。
fn prune_empty_spans(element: &mut IsdContentElement) -> bool {
    match element.kind {
        ElementKind::Br | ElementKind::Image => return false,
        _ => {}
    }
    if let Some(text) = &element.text {
        return text.is_empty();
    }
    element.contents.retain_mut(|child| !prune_empty_spans(child));
    element.contents.is_empty()
}
