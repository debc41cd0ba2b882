//! # TTML 解析器的工具函数
//!
//! 该模块提供时间表达式的解析，以及从根元素 `<tt>` 上提取文档参数的辅助函数。

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    XmlNode,
    constants::{
        ATTR_ASPECT_RATIO, ATTR_CELL_RESOLUTION, ATTR_DISPLAY_ASPECT_RATIO, ATTR_EXTENT,
        ATTR_FRAME_RATE, ATTR_FRAME_RATE_MULTIPLIER, ATTR_TICK_RATE,
    },
};
use crate::{
    error::{Reporter, Result},
    length::{Length, parse_length},
    namespaces,
};

static CLOCK_TIME_FRACTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2,}):(\d\d):(\d\d(?:\.\d+)?)$").expect("未能编译 CLOCK_TIME_FRACTION_REGEX")
});

static CLOCK_TIME_FRAMES_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2,}):(\d\d):(\d\d):(\d{2,})$").expect("未能编译 CLOCK_TIME_FRAMES_REGEX")
});

static OFFSET_TIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)(h|ms|m|s|f|t)$").expect("未能编译 OFFSET_TIME_REGEX")
});

static CELL_RESOLUTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) (\d+)").expect("未能编译 CELL_RESOLUTION_REGEX"));

static SINGLE_NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)").expect("未能编译 SINGLE_NUMBER_REGEX"));

static ASPECT_RATIO_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+(\d+)").expect("未能编译 ASPECT_RATIO_REGEX"));

/// 解析 TTML 时间表达式，返回秒数。
///
/// 支持以下格式：
/// - `HH:MM:SS(.fff)`
/// - `HH:MM:SS:FF`，帧数按有效帧率换算
/// - `N(.N)` 加单位 `h`、`m`、`s`、`ms`、`f`（帧）或 `t`（tick）
#[must_use]
pub fn parse_time_expression(expr: &str, effective_frame_rate: f64, tick_rate: f64) -> Option<f64> {
    if let Some(caps) = OFFSET_TIME_REGEX.captures(expr) {
        let value = caps[1].parse::<f64>().ok()?;
        return match &caps[2] {
            "h" => Some(value * 3600.0),
            "m" => Some(value * 60.0),
            "s" => Some(value),
            "ms" => Some(value / 1000.0),
            "f" if effective_frame_rate > 0.0 => Some(value / effective_frame_rate),
            "t" if tick_rate > 0.0 => Some(value / tick_rate),
            _ => None,
        };
    }

    if let Some(caps) = CLOCK_TIME_FRACTION_REGEX.captures(expr) {
        let hours = caps[1].parse::<f64>().ok()?;
        let minutes = caps[2].parse::<f64>().ok()?;
        let seconds = caps[3].parse::<f64>().ok()?;
        return Some(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    if let Some(caps) = CLOCK_TIME_FRAMES_REGEX.captures(expr) {
        let hours = caps[1].parse::<f64>().ok()?;
        let minutes = caps[2].parse::<f64>().ok()?;
        let seconds = caps[3].parse::<f64>().ok()?;
        let frames = caps[4].parse::<f64>().ok()?;
        if effective_frame_rate <= 0.0 {
            return None;
        }
        return Some(hours * 3600.0 + minutes * 60.0 + seconds + frames / effective_frame_rate);
    }

    None
}

/// 解析 `ttp:cellResolution`，返回 (列数, 行数)。缺省为 32 × 15。
pub(super) fn extract_cell_resolution(node: &XmlNode, reporter: &mut Reporter<'_>) -> Result<(f64, f64)> {
    let Some(value) = node.attribute(namespaces::TTP, ATTR_CELL_RESOLUTION) else {
        return Ok((32.0, 15.0));
    };

    let parsed = CELL_RESOLUTION_REGEX.captures(value).and_then(|caps| {
        let columns = caps[1].parse::<u32>().ok()?;
        let rows = caps[2].parse::<u32>().ok()?;
        (columns > 0 && rows > 0).then(|| (f64::from(columns), f64::from(rows)))
    });

    match parsed {
        Some(resolution) => Ok(resolution),
        None => {
            reporter.warn(&format!(
                "cellResolution 值 '{value}' 格式错误，使用初始值 32 15"
            ))?;
            Ok((32.0, 15.0))
        }
    }
}

/// 返回 (有效帧率, tick 速率)。
///
/// 没有 `ttp:tickRate` 时，若指定了帧率则 tick 速率等于有效帧率，否则为 1。
pub(super) fn extract_frame_and_tick_rate(
    node: &XmlNode,
    reporter: &mut Reporter<'_>,
) -> Result<(f64, f64)> {
    let frame_rate_attr = node.attribute(namespaces::TTP, ATTR_FRAME_RATE);

    let mut frame_rate = 30.0;
    if let Some(value) = frame_rate_attr {
        match first_number(value) {
            Some(fps) => frame_rate = fps,
            None => reporter.warn(&format!("帧率 '{value}' 格式错误，使用初始值 30"))?,
        }
    }

    let mut multiplier = 1.0;
    if let Some(value) = node.attribute(namespaces::TTP, ATTR_FRAME_RATE_MULTIPLIER) {
        let parsed = CELL_RESOLUTION_REGEX.captures(value).and_then(|caps| {
            let numerator = caps[1].parse::<u32>().ok()?;
            let denominator = caps[2].parse::<u32>().ok()?;
            (denominator > 0).then(|| f64::from(numerator) / f64::from(denominator))
        });
        match parsed {
            Some(m) => multiplier = m,
            None => reporter.warn(&format!("帧率倍数 '{value}' 格式错误，使用初始值 1 1"))?,
        }
    }

    let effective_frame_rate = frame_rate * multiplier;

    let tick_rate = match node.attribute(namespaces::TTP, ATTR_TICK_RATE) {
        None if frame_rate_attr.is_some() => effective_frame_rate,
        None => 1.0,
        Some(value) => match first_number(value) {
            Some(rate) => rate,
            None => {
                reporter.warn(&format!("tick 速率 '{value}' 格式错误，使用初始值"))?;
                if frame_rate_attr.is_some() {
                    effective_frame_rate
                } else {
                    1.0
                }
            }
        },
    };

    Ok((effective_frame_rate, tick_rate))
}

fn first_number(value: &str) -> Option<f64> {
    let caps = SINGLE_NUMBER_REGEX.captures(value)?;
    caps[1].parse::<u32>().ok().map(f64::from)
}

/// 解析 `ittp:aspectRatio`，不存在时退回 `ttp:displayAspectRatio`。
pub(super) fn extract_aspect_ratio(
    node: &XmlNode,
    reporter: &mut Reporter<'_>,
) -> Result<Option<f64>> {
    let Some(value) = node
        .attribute(namespaces::ITTP, ATTR_ASPECT_RATIO)
        .or_else(|| node.attribute(namespaces::TTP, ATTR_DISPLAY_ASPECT_RATIO))
    else {
        return Ok(None);
    };

    let Some(caps) = ASPECT_RATIO_REGEX.captures(value) else {
        reporter.error(&format!("aspectRatio 属性 '{value}' 格式错误，已忽略"))?;
        return Ok(None);
    };

    let w = caps[1].parse::<u32>().unwrap_or(0);
    let h = caps[2].parse::<u32>().unwrap_or(0);
    if w == 0 || h == 0 {
        reporter.error(&format!("aspectRatio 属性 '{value}' 的值非法，已忽略"))?;
        return Ok(None);
    }

    Ok(Some(f64::from(w) / f64::from(h)))
}

/// 解析根元素上的 `tts:extent`，格式错误时报告警告并忽略。
pub(super) fn extract_root_extent(
    node: &XmlNode,
    reporter: &mut Reporter<'_>,
) -> Result<Option<(Length, Length)>> {
    let Some(value) = node.attribute(namespaces::TTS, ATTR_EXTENT) else {
        return Ok(None);
    };

    let parts: Vec<&str> = value.split(' ').collect();
    let [w, h] = parts.as_slice() else {
        reporter.warn(&format!("extent '{value}' 格式错误，已忽略"))?;
        return Ok(None);
    };

    match (parse_length(w), parse_length(h)) {
        (Some(w), Some(h)) => Ok(Some((w, h))),
        _ => {
            reporter.warn(&format!("extent '{value}' 的值格式错误，已忽略"))?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CollectingErrorHandler, Severity};

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_parse_offset_times() {
        assert!(approx(parse_time_expression("1.2s", 30.0, 1.0), 1.2));
        assert!(approx(parse_time_expression("1.2m", 30.0, 1.0), 72.0));
        assert!(approx(parse_time_expression("1.2h", 30.0, 1.0), 4320.0));
        assert!(approx(parse_time_expression("1500ms", 30.0, 1.0), 1.5));
        assert!(approx(parse_time_expression("20t", 30.0, 10.0), 2.0));
        assert!(approx(
            parse_time_expression("24f", 24.0 * 1000.0 / 1001.0, 1.0),
            1.001
        ));
    }

    #[test]
    fn test_parse_clock_times() {
        assert!(approx(parse_time_expression("01:02:03", 30.0, 1.0), 3723.0));
        assert!(approx(
            parse_time_expression("01:02:03.235", 30.0, 1.0),
            3723.235
        ));
        assert!(approx(
            parse_time_expression("100:00:00.1", 30.0, 1.0),
            360_000.1
        ));
        assert!(approx(
            parse_time_expression("01:02:03:15", 30.0, 1.0),
            3723.5
        ));
    }

    #[test]
    fn test_parse_invalid_times() {
        assert_eq!(parse_time_expression("1:02:03", 30.0, 1.0), None);
        assert_eq!(parse_time_expression("01:2:03", 30.0, 1.0), None);
        assert_eq!(parse_time_expression("10", 30.0, 1.0), None);
        assert_eq!(parse_time_expression("-1s", 30.0, 1.0), None);
        assert_eq!(parse_time_expression(".5s", 30.0, 1.0), None);
        assert_eq!(parse_time_expression("1.5 s", 30.0, 1.0), None);
        assert_eq!(parse_time_expression("", 30.0, 1.0), None);
    }

    fn tt_node(attributes: &[(&str, &str, &str)]) -> XmlNode {
        XmlNode::new(namespaces::TT, "tt", attributes)
    }

    #[test]
    fn test_frame_rate_drives_tick_rate() {
        let mut handler = CollectingErrorHandler::default();
        let mut reporter = Reporter::new(&mut handler);

        let node = tt_node(&[
            (namespaces::TTP, "frameRate", "24"),
            (namespaces::TTP, "frameRateMultiplier", "1000 1001"),
        ]);
        let (efps, tick_rate) = extract_frame_and_tick_rate(&node, &mut reporter).unwrap();
        assert!((efps - 24000.0 / 1001.0).abs() < 1e-9);
        assert!((tick_rate - efps).abs() < 1e-12);

        let node = tt_node(&[(namespaces::TTP, "tickRate", "10000000")]);
        assert_eq!(
            extract_frame_and_tick_rate(&node, &mut reporter).unwrap(),
            (30.0, 10_000_000.0)
        );

        let node = tt_node(&[]);
        assert_eq!(
            extract_frame_and_tick_rate(&node, &mut reporter).unwrap(),
            (30.0, 1.0)
        );
        assert!(handler.diagnostics.is_empty());
    }

    #[test]
    fn test_malformed_root_parameters_fall_back() {
        let mut handler = CollectingErrorHandler::default();
        let mut reporter = Reporter::new(&mut handler);

        let node = tt_node(&[
            (namespaces::TTP, "cellResolution", "forty"),
            (namespaces::ITTP, "aspectRatio", "16 0"),
        ]);
        assert_eq!(
            extract_cell_resolution(&node, &mut reporter).unwrap(),
            (32.0, 15.0)
        );
        assert_eq!(extract_aspect_ratio(&node, &mut reporter).unwrap(), None);

        assert_eq!(handler.count(Severity::Warn), 1);
        assert_eq!(handler.count(Severity::Error), 1);
    }

    #[test]
    fn test_display_aspect_ratio_fallback() {
        let mut handler = CollectingErrorHandler::default();
        let mut reporter = Reporter::new(&mut handler);

        let node = tt_node(&[(namespaces::TTP, "displayAspectRatio", "4 3")]);
        let ratio = extract_aspect_ratio(&node, &mut reporter).unwrap().unwrap();
        assert!((ratio - 4.0 / 3.0).abs() < 1e-12);
    }
}
