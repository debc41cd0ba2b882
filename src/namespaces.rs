//! TTML 及其扩展使用的 XML 命名空间。

pub const TT: &str = "http://www.w3.org/ns/ttml";
pub const TTS: &str = "http://www.w3.org/ns/ttml#styling";
pub const TTP: &str = "http://www.w3.org/ns/ttml#parameter";
pub const TTM: &str = "http://www.w3.org/ns/ttml#metadata";
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
pub const SMPTE: &str = "http://www.smpte-ra.org/schemas/2052-1/2010/smpte-tt";
pub const ITTP: &str = "http://www.w3.org/ns/ttml/profile/imsc1#parameter";
pub const ITTS: &str = "http://www.w3.org/ns/ttml/profile/imsc1#styling";
pub const EBUTTS: &str = "urn:ebu:tt:style";
