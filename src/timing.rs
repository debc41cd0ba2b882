//! # 计时解析
//!
//! 把每个元素的显式 begin/end/dur 换算为绝对的 `[begin, end)` 区间（秒），
//! 同时维护文档的媒体时间事件索引。

use std::cmp::Ordering;

use crate::model::{Contents, ContentElement, Element, Set, TimeContainer, UnresolvedElement};

/// 解析阶段记录的显式计时属性，单位为秒。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExplicitTiming {
    pub begin: Option<f64>,
    pub end: Option<f64>,
    pub dur: Option<f64>,
}

/// 解析后的绝对区间，左闭右开。`end` 可能为正无穷。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub begin: f64,
    pub end: f64,
}

impl Interval {
    #[must_use]
    pub fn contains(&self, offset: f64) -> bool {
        offset >= self.begin && offset < self.end
    }
}

/// 严格递增、不含重复值的事件时间列表。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventIndex(Vec<f64>);

impl EventIndex {
    /// 登记一个区间。空区间或负区间不登记，无穷的结束时间不登记。
    pub(crate) fn register(&mut self, interval: Interval) {
        if interval.begin.partial_cmp(&interval.end) != Some(Ordering::Less) {
            return;
        }
        self.insert(interval.begin);
        if interval.end.is_finite() {
            self.insert(interval.end);
        }
    }

    fn insert(&mut self, time: f64) {
        if let Err(pos) = self.0.binary_search_by(|probe| probe.total_cmp(&time)) {
            self.0.insert(pos, time);
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.0.first()?, *self.0.last()?))
    }
}

/// 父元素中影响子元素隐式开始时间的部分。
#[derive(Debug, Clone, Copy)]
struct ParentTiming {
    begin: f64,
    container: TimeContainer,
}

fn implicit_begin(parent: Option<ParentTiming>, previous_end: Option<f64>) -> f64 {
    match (parent, previous_end) {
        (None, _) => 0.0,
        (Some(p), Some(end)) if p.container == TimeContainer::Seq => end,
        (Some(p), _) => p.begin,
    }
}

/// 结束时间相对 `implicit_begin` 而不是 `begin` 计算。
fn resolve_end(explicit: ExplicitTiming, begin: f64, implicit_begin: f64, implicit_end: f64) -> f64 {
    match (explicit.end, explicit.dur) {
        (Some(end), Some(dur)) => (begin + dur).min(implicit_begin + end),
        (None, Some(dur)) => begin + dur,
        (Some(end), None) => implicit_begin + end,
        (None, None) => implicit_end,
    }
}

/// 没有子元素的元素在 `seq` 中隐式时长为零，否则为无限。
fn leaf_implicit_end(parent: Option<ParentTiming>, begin: f64) -> f64 {
    match parent {
        Some(p) if p.container == TimeContainer::Seq => begin,
        _ => f64::INFINITY,
    }
}

/// 把子元素的结束时间累计到父元素的隐式结束时间中。
fn accumulate(container: TimeContainer, implicit_end: f64, child_end: f64) -> f64 {
    match container {
        TimeContainer::Seq => child_end,
        TimeContainer::Par => implicit_end.max(child_end),
    }
}

fn resolve_set(
    set: Set<ExplicitTiming>,
    previous_end: Option<f64>,
    parent: ParentTiming,
    events: &mut EventIndex,
) -> Set<Interval> {
    let implicit_begin = implicit_begin(Some(parent), previous_end);
    let begin = set.timing.begin.map_or(implicit_begin, |b| b + implicit_begin);
    let implicit_end = leaf_implicit_end(Some(parent), begin);
    let end = resolve_end(set.timing, begin, implicit_begin, implicit_end);

    let timing = Interval { begin, end };
    events.register(timing);
    Set {
        timing,
        style: set.style,
        value: set.value,
    }
}

fn resolve_element(
    element: UnresolvedElement,
    previous_end: Option<f64>,
    parent: Option<ParentTiming>,
    events: &mut EventIndex,
) -> ContentElement {
    let Element {
        kind,
        id,
        lang,
        space,
        region_id,
        styles,
        sets,
        time_container,
        timing: explicit,
        contents,
        image,
        anonymous,
    } = element;

    let implicit_begin = implicit_begin(parent, previous_end);
    let begin = explicit.begin.map_or(implicit_begin, |b| b + implicit_begin);
    let own = ParentTiming {
        begin,
        container: time_container,
    };

    let mut implicit_end = begin;

    let mut previous = None;
    let sets = sets
        .into_iter()
        .map(|set| {
            let resolved = resolve_set(set, previous, own, events);
            implicit_end = accumulate(time_container, implicit_end, resolved.timing.end);
            previous = Some(resolved.timing.end);
            resolved
        })
        .collect();

    let contents = match contents {
        Contents::Children(children) => {
            let mut previous = None;
            let children = children
                .into_iter()
                .map(|child| {
                    let resolved = resolve_element(child, previous, Some(own), events);
                    implicit_end = accumulate(time_container, implicit_end, resolved.end());
                    previous = Some(resolved.end());
                    resolved
                })
                .collect();
            Contents::Children(children)
        }
        Contents::Text(text) => {
            implicit_end = leaf_implicit_end(parent, begin);
            Contents::Text(text)
        }
        Contents::Leaf => {
            implicit_end = leaf_implicit_end(parent, begin);
            Contents::Leaf
        }
    };

    let end = resolve_end(explicit, begin, implicit_begin, implicit_end);
    let timing = Interval { begin, end };
    events.register(timing);

    Element {
        kind,
        id,
        lang,
        space,
        region_id,
        styles,
        sets,
        time_container,
        timing,
        contents,
        image,
        anonymous,
    }
}

/// 解析一棵顶层元素树（区域或 body）的计时，并把区间登记到 `events`。
pub(crate) fn resolve(element: UnresolvedElement, events: &mut EventIndex) -> ContentElement {
    resolve_element(element, None, None, events)
}
