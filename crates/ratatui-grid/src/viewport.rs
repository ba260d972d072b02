/// Vertical scroll state of the content region, in rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportState {
    pub y: u32,
    pub viewport_h: u16,
    pub content_h: u32,
}

impl ViewportState {
    pub fn set_viewport(&mut self, h: u16) {
        self.viewport_h = h;
        self.clamp();
    }

    pub fn set_content(&mut self, h: u32) {
        self.content_h = h;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        self.y = self.y.min(self.max_y());
    }

    pub fn scroll_y_by(&mut self, delta: i32) {
        let next = self.y as i64 + delta as i64;
        self.y = next.clamp(0, self.max_y() as i64) as u32;
    }

    pub fn to_top(&mut self) {
        self.y = 0;
    }

    /// Scrolls the least amount that brings `row` into view.
    pub fn ensure_visible(&mut self, row: u32) {
        let h = self.viewport_h.max(1) as u32;
        if row < self.y {
            self.y = row;
        } else if row >= self.y + h {
            self.y = row + 1 - h;
        }
        self.clamp();
    }

    /// Rows hidden below the viewport.
    pub fn rows_below(&self) -> u32 {
        self.content_h
            .saturating_sub(self.y)
            .saturating_sub(self.viewport_h as u32)
    }

    fn max_y(&self) -> u32 {
        self.content_h.saturating_sub(self.viewport_h as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_clamps_to_content() {
        let mut s = ViewportState::default();
        s.set_viewport(5);
        s.set_content(6);
        s.y = 99;
        s.clamp();
        assert_eq!(s.y, 1);
    }

    #[test]
    fn ensure_visible_scrolls_minimally() {
        let mut s = ViewportState::default();
        s.set_viewport(3);
        s.set_content(20);
        s.ensure_visible(5);
        assert_eq!(s.y, 3);
        s.ensure_visible(4);
        assert_eq!(s.y, 3);
        s.ensure_visible(1);
        assert_eq!(s.y, 1);
        assert_eq!(s.rows_below(), 16);
    }
}
