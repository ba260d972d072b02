use ratatui::style::Style;

#[derive(Clone, Debug)]
pub struct Theme {
    pub text_primary: Style,
    pub text_muted: Style,
    pub accent: Style,
    pub danger: Style,
    pub header: Style,
    /// The focused cell outline.
    pub focus: Style,
    pub selected: Style,
    /// Cells of the row under edit.
    pub editing: Style,
    pub tooltip: Style,
}

impl Default for Theme {
    fn default() -> Self {
        use ratatui::style::Stylize;

        Self {
            text_primary: Style::default(),
            text_muted: Style::default().dark_gray(),
            accent: Style::default().cyan(),
            danger: Style::default().red(),
            header: Style::default().bold(),
            focus: Style::default().reversed(),
            selected: Style::default().on_dark_gray(),
            editing: Style::default().yellow(),
            tooltip: Style::default().black().on_cyan(),
        }
    }
}
