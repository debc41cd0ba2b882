//! # 解析器的状态机和数据结构

use std::collections::{BTreeMap, HashSet};

use super::{XmlNode, handlers, metadata::MetadataHandler};
use crate::{
    error::{ErrorHandler, Reporter, Result},
    model::{Document, Set, UnresolvedElement, XmlSpace},
    styles::StyleMap,
    timing::ExplicitTiming,
};

/// 元素栈中的一帧。每个打开的元素对应一帧，关闭时弹出。
#[derive(Debug)]
pub(super) enum Frame {
    Tt,
    Head,
    Styling,
    Layout,
    /// `<style>`，其属性在打开时就已登记或合并。
    Style,
    Initial,
    Region {
        region: UnresolvedElement,
        /// 关闭时才合并的引用样式。
        style_refs: Vec<String>,
        /// ID 缺失或重复的区域不会登记到布局中。
        registered: bool,
    },
    /// `body`、`div`、`p`、`span`、`br` 或 `image`。关闭时挂到父元素上。
    Content(UnresolvedElement),
    /// 样式数量不为一的 `<set>` 以 `None` 入栈，关闭时丢弃。
    Set(Option<Set<ExplicitTiming>>),
    /// 非内容元素。`metadata` 为 `true` 表示 TT 命名空间中的 `<metadata>`。
    Foreign { metadata: bool },
}

/// `<styling>` 中具名的 `<style>`。
#[derive(Debug, Clone, Default)]
pub(super) struct NamedStyle {
    pub(super) styles: StyleMap,
    /// 尚未展开的 `style` 引用，展开后清空。
    pub(super) refs: Vec<String>,
}

/// 以三个基本事件（开始标签、文本、结束标签）驱动的文档树构建器。
///
/// 构建器不关心事件来自哪个 XML 解析器，只要求输入是格式良好的。
/// [`crate::parse_ttml`] 使用 `quick-xml` 驱动它。
pub struct TreeBuilder<'h> {
    pub(super) reporter: Reporter<'h>,
    pub(super) metadata_handler: Option<&'h mut dyn MetadataHandler>,

    /// 元素栈，栈顶为最内层的元素。
    pub(super) stack: Vec<Frame>,
    /// 与元素栈平行的 `xml:lang` 栈。
    pub(super) lang_stack: Vec<String>,
    /// 与元素栈平行的 `xml:space` 栈。
    pub(super) space_stack: Vec<XmlSpace>,
    /// 当前位于多少层 `<metadata>` 之内。
    pub(super) metadata_depth: usize,
    /// 当前事件在输入中的字节偏移，用于诊断消息。
    pub(super) position: u64,

    /// 打开 `<tt>` 时创建。
    pub(super) document: Option<Document>,
    pub(super) named_styles: BTreeMap<String, NamedStyle>,
    pub(super) region_ids: HashSet<String>,
    /// 按声明顺序登记的区域。
    pub(super) regions: Vec<UnresolvedElement>,
    pub(super) body: Option<UnresolvedElement>,
    pub(super) body_opened: bool,
}

impl<'h> TreeBuilder<'h> {
    /// 创建一个新的构建器，诊断信息交给 `error_handler`。
    pub fn new(error_handler: &'h mut dyn ErrorHandler) -> Self {
        Self {
            reporter: Reporter::new(error_handler),
            metadata_handler: None,
            stack: Vec::new(),
            lang_stack: Vec::new(),
            space_stack: Vec::new(),
            metadata_depth: 0,
            position: 0,
            document: None,
            named_styles: BTreeMap::new(),
            region_ids: HashSet::new(),
            regions: Vec::new(),
            body: None,
            body_opened: false,
        }
    }

    /// 为 `<metadata>` 子树设置事件回调。
    #[must_use]
    pub fn with_metadata_handler(mut self, handler: &'h mut dyn MetadataHandler) -> Self {
        self.metadata_handler = Some(handler);
        self
    }

    /// 更新当前输入位置，之后的诊断消息会引用这个位置。
    pub const fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    /// 处理一个开始标签。
    ///
    /// # Errors
    ///
    /// 非法的父子关系、重复的 `<tt>` 或 `<body>` 等结构错误返回 [`crate::IsdError::Fatal`]；
    /// 错误处理器要求中止时返回 [`crate::IsdError::Aborted`]。
    pub fn open_tag(&mut self, node: &XmlNode) -> Result<()> {
        handlers::handle_open_tag(self, node)
    }

    /// 处理一段文本。相邻的文本应当由调用方合并后再传入。
    ///
    /// # Errors
    ///
    /// 错误处理器要求中止时返回错误。
    pub fn text(&mut self, text: &str) -> Result<()> {
        handlers::handle_text(self, text)
    }

    /// 处理一个结束标签，对应最近一次尚未关闭的开始标签。
    ///
    /// # Errors
    ///
    /// 样式引用无法解析且错误处理器要求中止时返回错误。
    pub fn close_tag(&mut self) -> Result<()> {
        handlers::handle_close_tag(self)
    }

    /// 结束构建：补上默认区域，解析计时，清理 ruby 容器。
    ///
    /// # Errors
    ///
    /// 输入中没有 `<tt>` 元素时返回 [`crate::IsdError::MissingRoot`]。
    pub fn finish(self) -> Result<Document> {
        handlers::finish(self)
    }

    /// 栈顶元素的 `xml:lang`，栈为空时为空字符串。
    pub(super) fn current_lang(&self) -> &str {
        self.lang_stack.last().map_or("", String::as_str)
    }

    pub(super) fn current_space(&self) -> XmlSpace {
        self.space_stack.last().copied().unwrap_or_default()
    }

    /// 当前的有效帧率和 tick 速率。`<tt>` 之外使用缺省值。
    pub(super) fn time_rates(&self) -> (f64, f64) {
        self.document
            .as_ref()
            .map_or((30.0, 1.0), |d| (d.effective_frame_rate, d.tick_rate))
    }
}
