//! # 样式属性值的计算函数
//!
//! 在 ISD 生成期间，计算函数把 specified 值换算成与渲染尺寸无关的计算值。
//! 返回 `None` 表示该值在当前上下文中无法计算。

use super::{
    StyleName,
    value::{Color, ComputedShadow, Edge, RubyReserve, StyleValue, TextOutline},
};
use crate::{
    isd::IsdContentElement,
    length::{ComputedLength, Dimensions, Length, LengthBasis, LengthUnit},
    model::Document,
};

/// 单次 ISD 生成期间在各计算函数之间共享的上下文。
/// 目前没有计算函数需要跨元素的状态。
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeContext;

pub type ComputeFn = fn(
    &Document,
    Option<&IsdContentElement>,
    &IsdContentElement,
    &StyleValue,
    &mut ComputeContext,
) -> Option<StyleValue>;

fn font_size_of(element: &IsdContentElement) -> Option<ComputedLength> {
    element
        .styles
        .get(&StyleName::FontSize)
        .and_then(StyleValue::as_computed)
}

fn extent_of(element: &IsdContentElement) -> Option<Dimensions> {
    element
        .styles
        .get(&StyleName::Extent)
        .and_then(StyleValue::as_dimensions)
}

/// 以元素自身字号为 em 和百分比基准的长度计算。
fn relative_to_font_size(doc: &Document, element: &IsdContentElement) -> LengthBasis {
    let font_size = font_size_of(element);
    LengthBasis {
        em: font_size,
        percent: font_size,
        cell: Some(doc.cell_length.h),
        px: doc.px_length.map(|px| px.h),
    }
}

/// `tts:extent` 与 `tts:origin` 共用的计算逻辑，`auto` 的取值由调用方给出。
fn compute_length_pair(doc: &Document, value: &StyleValue, auto: Dimensions) -> Option<StyleValue> {
    match value {
        StyleValue::Keyword(k) if k == "auto" => Some(StyleValue::Dimensions(auto)),
        StyleValue::LengthPair(pair) => {
            let h = LengthBasis {
                percent: Some(doc.dimensions.h),
                px: doc.px_length.map(|px| px.h),
                ..LengthBasis::default()
            }
            .compute(pair.h)?;
            let w = LengthBasis {
                percent: Some(doc.dimensions.w),
                px: doc.px_length.map(|px| px.w),
                ..LengthBasis::default()
            }
            .compute(pair.w)?;
            Some(StyleValue::Dimensions(Dimensions { w, h }))
        }
        _ => None,
    }
}

pub(crate) fn compute_extent(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    compute_length_pair(doc, value, Dimensions::ROOT)
}

pub(crate) fn compute_origin(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    compute_length_pair(
        doc,
        value,
        Dimensions {
            w: ComputedLength::ZERO,
            h: ComputedLength::ZERO,
        },
    )
}

/// `em` 与百分比相对父元素的字号；没有父元素时相对单元格高度。
pub(crate) fn compute_font_size(
    doc: &Document,
    parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let StyleValue::Length(length) = value else {
        return None;
    };
    let reference = match parent {
        Some(p) => font_size_of(p),
        None => Some(doc.cell_length.h),
    };
    LengthBasis {
        em: reference,
        percent: reference,
        cell: Some(doc.cell_length.h),
        px: doc.px_length.map(|px| px.h),
    }
    .compute(*length)
    .map(StyleValue::Computed)
}

/// 只接受百分比，并截断到 ±100%。
pub(crate) fn compute_shear(
    _doc: &Document,
    _parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    match value {
        StyleValue::Length(Length {
            value,
            unit: LengthUnit::Percent,
        }) => Some(StyleValue::Number(value.clamp(-100.0, 100.0))),
        _ => None,
    }
}

pub(crate) fn compute_line_height(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    match value {
        StyleValue::Keyword(k) if k == "normal" => Some(value.clone()),
        StyleValue::Length(length) => relative_to_font_size(doc, element)
            .compute(*length)
            .map(StyleValue::Computed),
        _ => None,
    }
}

/// 把 1 到 4 个值展开为 [before, end, after, start]，
/// 再按书写模式排列为 [上, 左, 下, 右] 并逐个计算。
pub(crate) fn compute_padding(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let StyleValue::Lengths(lengths) = value else {
        return None;
    };
    let logical = match lengths.as_slice() {
        [a] => [*a, *a, *a, *a],
        [a, b] => [*a, *b, *a, *b],
        [a, b, c] => [*a, *b, *c, *b],
        [a, b, c, d] => [*a, *b, *c, *d],
        _ => return None,
    };

    let writing_mode = element
        .styles
        .get(&StyleName::WritingMode)
        .and_then(StyleValue::as_keyword);
    let [before, end, after, start] = logical;
    let physical = match writing_mode {
        Some("lrtb" | "lr") => [before, start, after, end],
        Some("rltb" | "rl") => [before, end, after, start],
        Some("tblr") => [start, before, end, after],
        Some("tbrl" | "tb") => [start, after, end, before],
        _ => return None,
    };

    let extent = extent_of(element)?;
    let font_size = font_size_of(element);
    let mut edges = [ComputedLength::ZERO; 4];
    for (i, length) in physical.iter().enumerate() {
        if length.value == 0.0 {
            continue;
        }
        let vertical = i % 2 == 0;
        let basis = LengthBasis {
            em: font_size,
            percent: Some(if vertical { extent.h } else { extent.w }),
            cell: Some(if vertical {
                doc.cell_length.h
            } else {
                doc.cell_length.w
            }),
            px: doc.px_length.map(|px| if vertical { px.h } else { px.w }),
        };
        edges[i] = basis.compute(*length)?;
    }
    Some(StyleValue::Edges(edges))
}

/// 把相对边的偏移换算为区域左上角相对根容器左上角的位置。
pub(crate) fn compute_position(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let StyleValue::Position(position) = value else {
        return None;
    };
    let extent = extent_of(element)?;
    let dims = doc.dimensions;

    let mut h = LengthBasis {
        percent: Some(ComputedLength::new(
            -extent.h.rw,
            dims.h.rh - extent.h.rh,
        )),
        px: doc.px_length.map(|px| px.h),
        ..LengthBasis::default()
    }
    .compute(position.v.offset)?;
    if position.v.edge == Edge::Bottom {
        h = ComputedLength::new(-h.rw - extent.h.rw, dims.h.rh - h.rh - extent.h.rh);
    }

    let mut w = LengthBasis {
        percent: Some(ComputedLength::new(
            dims.w.rw - extent.w.rw,
            -extent.w.rh,
        )),
        px: doc.px_length.map(|px| px.w),
        ..LengthBasis::default()
    }
    .compute(position.h.offset)?;
    if position.h.edge == Edge::Right {
        w = ComputedLength::new(dims.w.rw - w.rw - extent.w.rw, -w.rh - extent.w.rh);
    }

    Some(StyleValue::Dimensions(Dimensions { w, h }))
}

/// 未给出长度时预留字号的一半。
pub(crate) fn compute_ruby_reserve(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let StyleValue::RubyReserve(reserve) = value else {
        return None;
    };
    if reserve.mode == "none" {
        return Some(StyleValue::ComputedRubyReserve(RubyReserve {
            mode: reserve.mode.clone(),
            length: None,
        }));
    }
    let length = match reserve.length {
        Some(l) => relative_to_font_size(doc, element).compute(l)?,
        None => font_size_of(element)?.scale(0.5),
    };
    Some(StyleValue::ComputedRubyReserve(RubyReserve {
        mode: reserve.mode.clone(),
        length: Some(length),
    }))
}

/// `left`/`right` 分别归一为 `start`/`end`。
pub(crate) fn compute_text_align(
    _doc: &Document,
    _parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    Some(match value.as_keyword()? {
        "left" => StyleValue::keyword("start"),
        "right" => StyleValue::keyword("end"),
        _ => value.clone(),
    })
}

/// 厚度相对字号；未指定颜色时取元素自身的 `tts:color`。
pub(crate) fn compute_text_outline(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    match value {
        StyleValue::Keyword(k) if k == "none" => Some(value.clone()),
        StyleValue::TextOutline(outline) => {
            let color = match outline.color {
                Some(c) => c,
                None => element_color(element)?,
            };
            let thickness = relative_to_font_size(doc, element).compute(outline.thickness)?;
            Some(StyleValue::ComputedTextOutline(TextOutline { color, thickness }))
        }
        _ => None,
    }
}

fn element_color(element: &IsdContentElement) -> Option<Color> {
    element
        .styles
        .get(&StyleName::Color)
        .and_then(StyleValue::as_color)
}

/// 阴影偏移和模糊半径的百分比相对字号，不接受 `em`。
pub(crate) fn compute_text_shadow(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let shadows = match value {
        StyleValue::Keyword(k) if k == "none" => return Some(value.clone()),
        StyleValue::TextShadow(shadows) => shadows,
        _ => return None,
    };

    let font_size = font_size_of(element);
    let horizontal = LengthBasis {
        percent: font_size,
        px: doc.px_length.map(|px| px.w),
        ..LengthBasis::default()
    };
    let vertical = LengthBasis {
        percent: font_size,
        px: doc.px_length.map(|px| px.h),
        ..LengthBasis::default()
    };

    let mut computed = Vec::with_capacity(shadows.len());
    for shadow in shadows {
        let blur_radius = match shadow.blur_radius {
            Some(blur) => vertical.compute(blur)?,
            None => ComputedLength::ZERO,
        };
        let color = match shadow.color {
            Some(c) => c,
            None => element_color(element)?,
        };
        computed.push(ComputedShadow {
            x_offset: horizontal.compute(shadow.x_offset)?,
            y_offset: vertical.compute(shadow.y_offset)?,
            blur_radius,
            color,
        });
    }
    Some(StyleValue::ComputedTextShadow(computed))
}

/// 只接受单元格单位，按单元格宽度计算。
pub(crate) fn compute_line_padding(
    doc: &Document,
    _parent: Option<&IsdContentElement>,
    _element: &IsdContentElement,
    value: &StyleValue,
    _context: &mut ComputeContext,
) -> Option<StyleValue> {
    let StyleValue::Length(length) = value else {
        return None;
    };
    LengthBasis {
        cell: Some(doc.cell_length.w),
        ..LengthBasis::default()
    }
    .compute(*length)
    .map(StyleValue::Computed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Document, ElementKind},
        styles::value::{EdgeOffset, Position},
    };

    fn element_with(kind: ElementKind, styles: &[(StyleName, StyleValue)]) -> IsdContentElement {
        let mut element = IsdContentElement::empty(kind);
        element.styles.extend(styles.iter().cloned());
        element
    }

    fn approx(a: ComputedLength, b: ComputedLength) -> bool {
        (a.rw - b.rw).abs() < 1e-12 && (a.rh - b.rh).abs() < 1e-12
    }

    #[test]
    fn test_font_size_percent_is_relative_to_parent() {
        let doc = Document::default();
        let parent = element_with(
            ElementKind::P,
            &[(
                StyleName::FontSize,
                StyleValue::Computed(ComputedLength::new(0.0, 0.05)),
            )],
        );
        let span = element_with(ElementKind::Span, &[]);
        let value = StyleValue::Length(Length::new(150.0, LengthUnit::Percent));

        let computed =
            compute_font_size(&doc, Some(&parent), &span, &value, &mut ComputeContext)
                .and_then(|v| v.as_computed())
                .unwrap();
        assert!(approx(computed, ComputedLength::new(0.0, 0.075)));
    }

    #[test]
    fn test_font_size_without_parent_uses_cell_height() {
        let doc = Document::default();
        let region = element_with(ElementKind::Region, &[]);
        let value = StyleValue::Length(Length::new(1.0, LengthUnit::Cell));

        let computed =
            compute_font_size(&doc, None, &region, &value, &mut ComputeContext)
                .and_then(|v| v.as_computed())
                .unwrap();
        assert!(approx(computed, ComputedLength::new(0.0, 1.0 / 15.0)));
    }

    #[test]
    fn test_px_lengths_fail_without_root_extent() {
        let doc = Document::default();
        let region = element_with(ElementKind::Region, &[]);
        let value = StyleValue::Length(Length::new(20.0, LengthUnit::Px));

        assert!(
            compute_font_size(&doc, None, &region, &value, &mut ComputeContext)
                .is_none()
        );
    }

    #[test]
    fn test_shear_is_clamped() {
        let doc = Document::default();
        let p = element_with(ElementKind::P, &[]);
        let mut ctx = ComputeContext;

        let value = StyleValue::Length(Length::new(-150.0, LengthUnit::Percent));
        assert_eq!(
            compute_shear(&doc, None, &p, &value, &mut ctx),
            Some(StyleValue::Number(-100.0))
        );
        let value = StyleValue::Length(Length::new(1.0, LengthUnit::Em));
        assert_eq!(compute_shear(&doc, None, &p, &value, &mut ctx), None);
    }

    #[test]
    fn test_padding_follows_writing_mode() {
        let doc = Document::default();
        let region = element_with(
            ElementKind::Region,
            &[
                (StyleName::WritingMode, StyleValue::keyword("tbrl")),
                (StyleName::Extent, StyleValue::Dimensions(Dimensions::ROOT)),
            ],
        );
        let value = StyleValue::Lengths(vec![
            Length::new(10.0, LengthUnit::Percent),
            Length::new(0.0, LengthUnit::Percent),
            Length::new(20.0, LengthUnit::Percent),
            Length::new(30.0, LengthUnit::Percent),
        ]);

        let Some(StyleValue::Edges(edges)) =
            compute_padding(&doc, None, &region, &value, &mut ComputeContext)
        else {
            panic!("内边距应当可以计算");
        };
        // tbrl: [start, after, end, before] => [上, 左, 下, 右]
        assert!(approx(edges[0], ComputedLength::new(0.0, 0.3)));
        assert!(approx(edges[1], ComputedLength::new(0.2, 0.0)));
        assert!(approx(edges[2], ComputedLength::ZERO));
        assert!(approx(edges[3], ComputedLength::new(0.1, 0.0)));
    }

    #[test]
    fn test_position_from_bottom_right() {
        let doc = Document::default();
        let extent = Dimensions {
            w: ComputedLength::new(0.5, 0.0),
            h: ComputedLength::new(0.0, 0.2),
        };
        let region = element_with(
            ElementKind::Region,
            &[(StyleName::Extent, StyleValue::Dimensions(extent))],
        );
        let value = StyleValue::Position(Position {
            h: EdgeOffset {
                edge: Edge::Right,
                offset: Length::new(0.0, LengthUnit::Percent),
            },
            v: EdgeOffset {
                edge: Edge::Bottom,
                offset: Length::new(10.0, LengthUnit::RootHeight),
            },
        });

        let Some(StyleValue::Dimensions(origin)) =
            compute_position(&doc, None, &region, &value, &mut ComputeContext)
        else {
            panic!("位置应当可以计算");
        };
        assert!(approx(origin.w, ComputedLength::new(0.5, 0.0)));
        assert!(approx(origin.h, ComputedLength::new(0.0, 0.7)));
    }

    #[test]
    fn test_text_outline_defaults_to_element_color() {
        let doc = Document::default();
        let span = element_with(
            ElementKind::Span,
            &[
                (StyleName::Color, StyleValue::Color(Color::WHITE)),
                (
                    StyleName::FontSize,
                    StyleValue::Computed(ComputedLength::new(0.0, 0.1)),
                ),
            ],
        );
        let value = StyleValue::TextOutline(TextOutline {
            color: None,
            thickness: Length::new(10.0, LengthUnit::Percent),
        });

        let Some(StyleValue::ComputedTextOutline(outline)) =
            compute_text_outline(&doc, None, &span, &value, &mut ComputeContext)
        else {
            panic!("描边应当可以计算");
        };
        assert_eq!(outline.color, Color::WHITE);
        assert!(approx(outline.thickness, ComputedLength::new(0.0, 0.01)));
    }

    #[test]
    fn test_text_align_is_normalized() {
        let doc = Document::default();
        let p = element_with(ElementKind::P, &[]);
        let mut ctx = ComputeContext;
        assert_eq!(
            compute_text_align(&doc, None, &p, &StyleValue::keyword("left"), &mut ctx),
            Some(StyleValue::keyword("start"))
        );
        assert_eq!(
            compute_text_align(&doc, None, &p, &StyleValue::keyword("center"), &mut ctx),
            Some(StyleValue::keyword("center"))
        );
    }
}
