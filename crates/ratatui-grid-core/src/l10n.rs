/// Display strings used by the grid and its renderers.
///
/// Lookups never affect engine behaviour. `args` are substituted into `{name}` placeholders.
pub trait Localizer {
    fn text(&self, key: &str, args: &[(&str, String)]) -> String;
}

pub const EMPTY_RECORD: &str = "emptyRecord";
pub const CONFIRM_DELETE: &str = "confirmDelete";
pub const SAVE_FAILED: &str = "saveFailed";
pub const PAGER_INFO: &str = "pagerInfo";

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLocalizer;

impl Localizer for DefaultLocalizer {
    fn text(&self, key: &str, args: &[(&str, String)]) -> String {
        let template = match key {
            EMPTY_RECORD => "No records to display",
            CONFIRM_DELETE => "Are you sure you want to delete this record?",
            SAVE_FAILED => "Save failed: {reason}",
            PAGER_INFO => "Page {current} of {pages} ({total} items)",
            other => other,
        };
        substitute(template, args)
    }
}

pub fn substitute(template: &str, args: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in args {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_placeholders() {
        let text = DefaultLocalizer.text(
            PAGER_INFO,
            &[
                ("current", "2".into()),
                ("pages", "4".into()),
                ("total", "10".into()),
            ],
        );
        assert_eq!(text, "Page 2 of 4 (10 items)");
    }

    #[test]
    fn unknown_keys_fall_back_to_the_key() {
        assert_eq!(DefaultLocalizer.text("custom", &[]), "custom");
    }
}
