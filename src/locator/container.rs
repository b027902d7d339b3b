use super::{ContainerInfo, ElementId, ScrollMetrics};

/// Score of a scroll container candidate, `None` when it cannot be the
/// track list's scroller. Virtualization markers outrank everything, then the
/// ratio of scrollable content to viewport height.
pub fn score(info: &ContainerInfo, min_height: f64) -> Option<f64> {
    let metrics = &info.metrics;
    if !metrics.is_scrollable() {
        return None;
    }

    let ratio = metrics.scroll_height / metrics.client_height.max(1.0);
    if info.virtualized {
        return Some(1000.0 + ratio);
    }
    if metrics.client_height < min_height {
        return None;
    }
    Some(ratio)
}

/// Candidates ordered best first. Ties keep discovery order.
pub fn rank(candidates: &[ContainerInfo], min_height: f64) -> Vec<ElementId> {
    let mut scored: Vec<(f64, ElementId)> = candidates
        .iter()
        .filter_map(|c| score(c, min_height).map(|s| (s, c.id)))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, id)| id).collect()
}

/// Median of the measurable rendered row heights, or `fallback`.
pub fn row_height(heights: &[f64], fallback: f64) -> f64 {
    let mut usable: Vec<f64> = heights
        .iter()
        .copied()
        .filter(|h| h.is_finite() && *h > 0.0)
        .collect();
    if usable.is_empty() {
        return fallback;
    }
    usable.sort_by(f64::total_cmp);
    usable[usable.len() / 2]
}

/// Pixel offset at which the row at `index` should be rendered.
pub fn estimated_offset(index: usize, row_height: f64, header_height: f64) -> f64 {
    header_height + (index as f64 + 1.0) * row_height
}

impl ScrollMetrics {
    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }

    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }
}
