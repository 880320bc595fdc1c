//! File → database synchronization

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::TransyncResult;
use crate::format::StoreUnit;
use crate::units::{Change, ChangeAction, UnitId};

use super::Translation;

impl Translation {
    /// Bring the unit database in line with the file.
    ///
    /// Skipped when the file hash matches the stored revision unless
    /// `force` is set. `action` is recorded on the summary change and
    /// defaults to [`ChangeAction::Update`]. Returns whether a pass ran.
    pub fn check_sync(
        &mut self,
        force: bool,
        user: Option<&str>,
        action: Option<ChangeAction>,
    ) -> TransyncResult<bool> {
        let action = action.unwrap_or(ChangeAction::Update);
        let blob_hash = self.get_git_blob_hash()?;

        if self.revision == blob_hash && !force {
            debug!("{}up to date", self.log_prefix());
            return Ok(false);
        }
        if self.revision != blob_hash {
            info!("{}processing {}, revision has changed", self.log_prefix(), self.filename.display());
        } else {
            info!("{}processing {}, check forced", self.log_prefix(), self.filename.display());
        }

        self.reset_store();
        let file_units: Vec<StoreUnit> = self
            .store()?
            .all_units()
            .filter(|u| u.is_translatable())
            .cloned()
            .collect();

        let units = Arc::clone(&self.services.units);
        let save_history = self.component.config.save_history;
        let mut was_new = false;
        let mut created: HashSet<UnitId> = HashSet::new();
        let mut history = Vec::new();

        for (index, file_unit) in file_units.iter().enumerate() {
            let position = index + 1;

            if let Some(existing) = units.find(&self.id, &file_unit.key()) {
                if created.contains(&existing.id) {
                    warn!("{}duplicate string {}", self.log_prefix(), file_unit.key());
                    units.add_change(
                        Change::new(ChangeAction::DuplicateString, Some(&self.id))
                            .with_unit(existing.id)
                            .by(user),
                    );
                    continue;
                }
            }

            let update = units.update_from_unit(&self.id, file_unit, position);
            let unit = &update.unit;
            let old = &update.old_unit;

            was_new = was_new
                || (update.is_new && !unit.translated)
                || (!unit.translated && unit.translated != old.translated)
                || (unit.fuzzy && unit.fuzzy != old.fuzzy);

            created.insert(unit.id);

            if action == ChangeAction::Upload && update.is_modified {
                let target = if save_history {
                    unit.target_text().to_string()
                } else {
                    String::new()
                };
                history.push(
                    Change::new(ChangeAction::Upload, Some(&self.id))
                        .with_unit(unit.id)
                        .by(user)
                        .with_target(target),
                );
            }
        }

        if !history.is_empty() {
            units.add_changes(history);
        }

        let stale = units.stale_units(&self.id, &created);
        let deleted = stale.len();
        if deleted > 0 {
            info!("{}removing {} stale units", self.log_prefix(), deleted);
            units.delete_units(&stale);
        }

        self.update_stats();
        self.revision = blob_hash;
        if deleted > 0 {
            self.invalidate_cache();
        }

        units.add_change(Change::new(action, Some(&self.id)).by(user));
        self.invalidate_last_change();

        if was_new {
            self.services.notifier.new_string(&self.id);
        }
        Ok(true)
    }

    /// Recompute the aggregate counters from the unit database
    pub fn update_stats(&mut self) {
        self.stats = self
            .services
            .units
            .aggregate(&self.id)
            .unwrap_or_default();
    }
}
