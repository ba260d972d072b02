use crate::render;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui_grid_core::keymap::Binding;
use ratatui_grid_core::keymap::GridBindings;

#[derive(Clone, Debug)]
pub struct HelpBarOptions {
    pub style: Style,
    pub key_style: Style,
    pub separator: String,
}

impl Default for HelpBarOptions {
    fn default() -> Self {
        Self {
            style: Style::default(),
            key_style: Style::default(),
            separator: " · ".to_string(),
        }
    }
}

/// One-line key hint bar.
#[derive(Clone, Debug, Default)]
pub struct HelpBar {
    bindings: Vec<Binding>,
    options: HelpBarOptions,
}

impl HelpBar {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            options: HelpBarOptions::default(),
        }
    }

    pub fn for_grid(bindings: &GridBindings, options: HelpBarOptions) -> Self {
        Self {
            bindings: bindings.help(),
            options,
        }
    }

    pub fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        buf.set_style(area, self.options.style);
        render::render_spans(
            area.x,
            area.y,
            area.width,
            buf,
            &self.to_spans(),
            self.options.style,
        );
    }

    fn to_spans(&self) -> Vec<Span<'_>> {
        let mut spans = Vec::new();
        for (i, b) in self.bindings.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(
                    self.options.separator.as_str(),
                    self.options.style,
                ));
            }
            spans.push(Span::styled(b.help_key.as_str(), self.options.key_style));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(b.help_desc.as_str(), self.options.style));
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_grid_bindings_clipped() {
        let hb = HelpBar::for_grid(&GridBindings::default(), HelpBarOptions::default());
        let mut buf = Buffer::empty(Rect::new(0, 0, 12, 1));
        hb.render_ref(Rect::new(0, 0, 12, 1), &mut buf);
        let line: String = (0..12).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert_eq!(line, "enter sort ·");
    }
}
