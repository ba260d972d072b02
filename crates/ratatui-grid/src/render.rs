use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui_grid_core::column::ClipMode;
use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

use crate::viewport::ViewportState;

const ELLIPSIS: char = '…';

pub fn render_scrollbar(area: Rect, buf: &mut Buffer, state: &ViewportState, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 {
        return;
    }
    if state.content_h <= state.viewport_h as u32 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = area.height as f64;
    let thumb_h = ((state.viewport_h as f64 / state.content_h as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;
    let max_y = state
        .content_h
        .saturating_sub(state.viewport_h as u32)
        .max(1) as f64;
    let thumb_top = ((state.y as f64 / max_y) * (track_h - thumb_h as f64))
        .round()
        .clamp(0.0, (track_h - thumb_h as f64).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            " "
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Draws `spans` from `(x, y)` and stops before `max_cols` display columns are exceeded.
/// A wide character that would straddle the limit is dropped.
pub fn render_spans(
    x: u16,
    y: u16,
    max_cols: u16,
    buf: &mut Buffer,
    spans: &[Span<'_>],
    fallback_style: Style,
) {
    let max_cols = max_cols as usize;
    let mut used = 0usize;
    for span in spans {
        let style = if span.style == Style::default() {
            fallback_style
        } else {
            fallback_style.patch(span.style)
        };
        for ch in span.content.chars() {
            let w = UnicodeWidthChar::width(ch).unwrap_or(0);
            if w == 0 {
                continue;
            }
            if used + w > max_cols {
                return;
            }
            let cx = x + used as u16;
            if let Some(cell) = buf.cell_mut((cx, y)) {
                cell.set_style(style);
                cell.set_symbol(&ch.to_string());
            }
            if w == 2
                && let Some(cell) = buf.cell_mut((cx + 1, y))
            {
                cell.set_style(style);
                cell.set_symbol("");
            }
            used += w;
        }
    }
}

/// Cuts `text` to `width` display columns. Ellipsis modes end a cut value with `…`.
pub fn fit_cell(text: &str, width: u16, mode: ClipMode) -> String {
    let width = width as usize;
    let text = text.replace(['\n', '\t'], " ");
    if UnicodeWidthStr::width(text.as_str()) <= width {
        return text;
    }
    let budget = match mode {
        ClipMode::Clip => width,
        ClipMode::Ellipsis | ClipMode::EllipsisWithTooltip => width.saturating_sub(1),
    };
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        out.push(ch);
        used += w;
    }
    if mode != ClipMode::Clip && width > 0 {
        out.push(ELLIPSIS);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_cell_respects_clip_mode() {
        assert_eq!(fit_cell("abcdef", 4, ClipMode::Clip), "abcd");
        assert_eq!(fit_cell("abcdef", 4, ClipMode::Ellipsis), "abc…");
        assert_eq!(fit_cell("abc", 4, ClipMode::EllipsisWithTooltip), "abc");
        assert_eq!(fit_cell("你好世界", 5, ClipMode::Ellipsis), "你好…");
    }

    #[test]
    fn render_spans_stops_at_the_limit() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 6, 1));
        render_spans(0, 0, 3, &mut buf, &[Span::raw("hello")], Style::default());
        assert_eq!(buf[(0, 0)].symbol(), "h");
        assert_eq!(buf[(2, 0)].symbol(), "l");
        assert_eq!(buf[(3, 0)].symbol(), " ");
    }

    #[test]
    fn render_scrollbar_does_not_panic() {
        let mut state = ViewportState::default();
        state.set_viewport(5);
        state.set_content(50);
        let mut buf = Buffer::empty(Rect::new(0, 0, 1, 5));
        render_scrollbar(Rect::new(0, 0, 1, 5), &mut buf, &state, Style::default());
    }
}
