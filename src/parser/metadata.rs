//! # TTML 解析器 - Metadata 转发模块
//!
//! `<metadata>` 元素内部的标记不属于内容模型，解析器只把它们按原样
//! 转发给调用方提供的 [`MetadataHandler`]。

use super::{XmlAttribute, XmlNode, state::TreeBuilder};

/// 接收 `<metadata>` 子树事件的回调。
///
/// 只有严格位于 `<metadata>` 元素内部的节点才会触发回调，
/// `<metadata>` 元素本身不会。默认实现忽略所有事件。
pub trait MetadataHandler {
    fn on_open_tag(&mut self, _ns: &str, _local: &str, _attributes: &[XmlAttribute]) {}

    fn on_text(&mut self, _text: &str) {}

    fn on_close_tag(&mut self) {}
}

/// 进入一个外部元素。`is_metadata` 表示该元素是否为 `<metadata>` 容器本身。
pub(super) fn enter_foreign_element(state: &mut TreeBuilder<'_>, node: &XmlNode, is_metadata: bool) {
    if is_metadata {
        state.metadata_depth += 1;
    } else if state.metadata_depth > 0
        && let Some(handler) = state.metadata_handler.as_deref_mut()
    {
        handler.on_open_tag(&node.ns, &node.local, &node.attributes);
    }
}

pub(super) fn leave_foreign_element(state: &mut TreeBuilder<'_>, is_metadata: bool) {
    if is_metadata {
        state.metadata_depth = state.metadata_depth.saturating_sub(1);
    } else if state.metadata_depth > 0
        && let Some(handler) = state.metadata_handler.as_deref_mut()
    {
        handler.on_close_tag();
    }
}

pub(super) fn foreign_text(state: &mut TreeBuilder<'_>, text: &str) {
    if state.metadata_depth > 0
        && let Some(handler) = state.metadata_handler.as_deref_mut()
    {
        handler.on_text(text);
    }
}
