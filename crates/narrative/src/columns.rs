//! Column detection and reading order.

use crate::config::ColumnConfig;
use crate::types::{PageGeometry, Segment};

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingOrder {
    pub segments: Vec<Segment>,
    pub two_column: bool,
    /// x coordinate separating the columns on two-column pages.
    pub split_x: Option<f32>,
}

/// Segments spanning most of the page separate the column bands.
pub fn is_full_width(segment: &Segment, page_width: f32, config: &ColumnConfig) -> bool {
    if page_width <= 0.0 {
        return false;
    }
    segment.width() >= config.full_width_ratio * page_width
        || (segment.x0 <= config.full_width_left * page_width
            && segment.x1 >= config.full_width_right * page_width)
}

/// Find the column split from the largest gap between sorted segment
/// midpoints, if the page qualifies as two-column.
pub fn detect_split(segments: &[Segment], geometry: &PageGeometry, config: &ColumnConfig) -> Option<f32> {
    let mut mids: Vec<f32> = segments
        .iter()
        .filter(|s| !is_full_width(s, geometry.width, config))
        .filter(|s| s.char_count() >= config.min_segment_chars)
        .map(Segment::mid)
        .collect();
    if mids.len() < config.min_midpoints {
        return None;
    }
    mids.sort_by(f32::total_cmp);

    let (position, gap) = mids
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[1] - w[0]))
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let min_gap = (config.min_gap_ratio * geometry.width)
        .max(config.min_gap_font_ratio * geometry.body_font_size);
    let left = position + 1;
    let right = mids.len() - left;
    if gap < min_gap || left < config.min_per_side || right < config.min_per_side {
        return None;
    }
    Some((mids[position] + mids[position + 1]) / 2.0)
}

/// Order a page's segments for reading.
///
/// Two-column pages are read band by band: between successive separators
/// the left column top to bottom, then the right column, then the separator
/// itself. Other pages read top to bottom, left to right.
pub fn order_segments(mut segments: Vec<Segment>, geometry: &PageGeometry, config: &ColumnConfig) -> ReadingOrder {
    segments.sort_by(|a, b| a.row.cmp(&b.row).then(a.x0.total_cmp(&b.x0)));

    let Some(split_x) = detect_split(&segments, geometry, config) else {
        return ReadingOrder {
            segments,
            two_column: false,
            split_x: None,
        };
    };

    let is_separator = |s: &Segment| {
        is_full_width(s, geometry.width, config) || (s.x0 < split_x && s.x1 > split_x)
    };

    let mut ordered = Vec::with_capacity(segments.len());
    let mut left = Vec::new();
    let mut right = Vec::new();
    for segment in segments {
        if is_separator(&segment) {
            ordered.append(&mut left);
            ordered.append(&mut right);
            ordered.push(segment);
        } else if segment.mid() < split_x {
            left.push(segment);
        } else {
            right.push(segment);
        }
    }
    ordered.append(&mut left);
    ordered.append(&mut right);

    ReadingOrder {
        segments: ordered,
        two_column: true,
        split_x: Some(split_x),
    }
}
