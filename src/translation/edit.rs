//! Explicit unit edits

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{TransyncError, TransyncResult};
use crate::units::{Change, ChangeAction, TranslationId, Unit, UnitId, UnitStore};

use super::Translation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslateOutcome {
    /// The unit content changed
    pub saved: bool,
    /// Other translations whose units received the same edit
    pub propagated: Vec<TranslationId>,
}

/// Store a new target on a unit and mark it pending. Without an explicit
/// `action` the change is recorded as new or changed translation.
pub(crate) fn record_edit(
    units: &dyn UnitStore,
    unit: &mut Unit,
    user: Option<&str>,
    target: Vec<String>,
    fuzzy: bool,
    action: Option<ChangeAction>,
) -> bool {
    if unit.target == target && unit.fuzzy == fuzzy {
        return false;
    }
    let was_translated = unit.translated;
    unit.translated = !fuzzy && target.iter().any(|t| !t.is_empty());
    unit.target = target;
    unit.fuzzy = fuzzy;
    unit.pending = true;
    unit.refresh_checks();
    units.save(unit);

    let action = action.unwrap_or(if was_translated {
        ChangeAction::Change
    } else {
        ChangeAction::New
    });
    units.add_change(
        Change::new(action, Some(&unit.translation))
            .with_unit(unit.id)
            .by(user)
            .with_target(unit.target_text()),
    );
    true
}

/// Copy an edit to the same string in sibling components
fn propagate(units: &dyn UnitStore, unit: &Unit, user: Option<&str>) -> Vec<TranslationId> {
    let mut touched = Vec::new();
    for mut other in units.propagation_targets(unit) {
        if record_edit(units, &mut other, user, unit.target.clone(), unit.fuzzy, None) {
            debug!("propagated {} to {}", unit, other.translation);
            if !touched.contains(&other.translation) {
                touched.push(other.translation.clone());
            }
        }
    }
    touched
}

impl Translation {
    /// Edit one unit from the editor: takes (or refreshes) the editor lock,
    /// commits edits of a previous author first and propagates the new
    /// target to other components of the project.
    pub fn translate(
        &mut self,
        user: &str,
        unit_id: UnitId,
        target: Vec<String>,
        fuzzy: bool,
        now: DateTime<Utc>,
    ) -> TransyncResult<TranslateOutcome> {
        if self.is_user_locked(Some(user), now) {
            let holder = self
                .lock
                .as_ref()
                .map(|l| l.user.clone())
                .unwrap_or_default();
            return Err(TransyncError::Locked(holder));
        }
        self.update_lock(user, true, now);

        let mut unit = self
            .services
            .units
            .get(unit_id)
            .filter(|u| u.translation == self.id)
            .ok_or_else(|| TransyncError::NotFound(format!("unit {} in {}", unit_id, self.id)))?;

        self.commit_pending(Some(user))?;

        let units = self.services.units.as_ref();
        let saved = record_edit(units, &mut unit, Some(user), target, fuzzy, None);
        let propagated = if saved {
            propagate(units, &unit, Some(user))
        } else {
            Vec::new()
        };

        if saved {
            self.update_stats();
            self.invalidate_last_change();
        }
        Ok(TranslateOutcome { saved, propagated })
    }
}
