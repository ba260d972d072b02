use crate::column::Capability;
use crate::column::ColumnModel;
use crate::settings::GridSettings;

/// Drops sort and filter entries whose column is gone or no longer allows the operation.
///
/// Surviving entries keep their relative order and content.
pub fn reconcile(columns: &ColumnModel, settings: &GridSettings) -> GridSettings {
    let mut out = settings.clone();
    out.sort.columns.retain(|d| columns.can_sort(&d.field));
    out.filter.columns.retain(|p| columns.can_filter(&p.field));
    let dropped_sort = settings.sort.columns.len() - out.sort.columns.len();
    let dropped_filter = settings.filter.columns.len() - out.filter.columns.len();
    if dropped_sort > 0 || dropped_filter > 0 {
        tracing::debug!(dropped_sort, dropped_filter, "reconciled settings against columns");
    }
    out
}

/// Runs [`reconcile`] only when column capabilities actually change, so that ordinary
/// settings updates never feed back into reconciliation.
#[derive(Clone, Debug, Default)]
pub struct SettingsReconciler {
    last: Option<Vec<Capability>>,
}

impl SettingsReconciler {
    pub fn new(columns: &ColumnModel) -> Self {
        Self {
            last: Some(columns.capabilities()),
        }
    }

    /// Returns the reconciled settings when capabilities differ from the previous call.
    pub fn on_columns_changed(
        &mut self,
        columns: &ColumnModel,
        settings: &GridSettings,
    ) -> Option<GridSettings> {
        let caps = columns.capabilities();
        if self.last.as_ref() == Some(&caps) {
            return None;
        }
        self.last = Some(caps);
        let next = reconcile(columns, settings);
        (next != *settings).then_some(next)
    }
}
