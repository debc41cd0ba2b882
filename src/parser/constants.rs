//! # TTML 解析器 - 常量定义
//!
//! 该模块定义了解析器识别的元素本地名和属性名。

pub(super) const TAG_TT: &str = "tt";
pub(super) const TAG_HEAD: &str = "head";
pub(super) const TAG_STYLING: &str = "styling";
pub(super) const TAG_STYLE: &str = "style";
pub(super) const TAG_INITIAL: &str = "initial";
pub(super) const TAG_LAYOUT: &str = "layout";
pub(super) const TAG_REGION: &str = "region";
pub(super) const TAG_BODY: &str = "body";
pub(super) const TAG_DIV: &str = "div";
pub(super) const TAG_P: &str = "p";
pub(super) const TAG_SPAN: &str = "span";
pub(super) const TAG_BR: &str = "br";
pub(super) const TAG_IMAGE: &str = "image";
pub(super) const TAG_SET: &str = "set";
pub(super) const TAG_METADATA: &str = "metadata";

// 以下属性不在任何命名空间中
pub(super) const ATTR_BEGIN: &str = "begin";
pub(super) const ATTR_END: &str = "end";
pub(super) const ATTR_DUR: &str = "dur";
pub(super) const ATTR_REGION: &str = "region";
pub(super) const ATTR_STYLE: &str = "style";
pub(super) const ATTR_TIME_CONTAINER: &str = "timeContainer";
pub(super) const ATTR_SRC: &str = "src";
pub(super) const ATTR_TYPE: &str = "type";

// 以下属性位于 XML 命名空间
pub(super) const ATTR_ID: &str = "id";
pub(super) const ATTR_LANG: &str = "lang";
pub(super) const ATTR_SPACE: &str = "space";

// 以下属性位于参数命名空间（`ttp:` 或 `ittp:`）
pub(super) const ATTR_CELL_RESOLUTION: &str = "cellResolution";
pub(super) const ATTR_FRAME_RATE: &str = "frameRate";
pub(super) const ATTR_FRAME_RATE_MULTIPLIER: &str = "frameRateMultiplier";
pub(super) const ATTR_TICK_RATE: &str = "tickRate";
pub(super) const ATTR_TIME_BASE: &str = "timeBase";
pub(super) const ATTR_ASPECT_RATIO: &str = "aspectRatio";
pub(super) const ATTR_DISPLAY_ASPECT_RATIO: &str = "displayAspectRatio";

// `tts:extent`
pub(super) const ATTR_EXTENT: &str = "extent";

pub(super) const SPACE_PRESERVE: &str = "preserve";
pub(super) const TIME_BASE_MEDIA: &str = "media";
