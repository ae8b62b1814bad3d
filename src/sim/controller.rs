/// Stage controller: the authoritative current stage and completed set.
///
/// Navigation is strict: `change_stage` refuses ids the registry does not
/// know. Reach-gating (`can_navigate_to`) is enforced by `navigate_to`,
/// which is what the navigation dots use; stage signals go through the
/// ungated `advance_from_stage` / `retreat_from_stage`.

use std::collections::BTreeSet;

use crate::domain::stage::{StageDescriptor, StageHandler};
use crate::error::NavError;
use crate::sim::registry::StageRegistry;

/// What the current stage id resolves to.
#[derive(Debug, PartialEq)]
pub enum StageView<'a> {
    Found(&'a StageDescriptor, StageHandler),
    /// Registered, but the handler key names nothing we can run.
    NotImplemented(&'a StageDescriptor),
    /// The current id is not registered.
    NotFound(u32),
}

pub struct StageController {
    registry: StageRegistry,
    current: u32,
    completed: BTreeSet<u32>,
}

impl StageController {
    /// `start` is not validated; an unknown start id resolves to
    /// `StageView::NotFound`.
    pub fn new(registry: StageRegistry, start: u32) -> Self {
        if !registry.contains(start) {
            log::warn!("start stage {} is not registered", start);
        }
        StageController { registry, current: start, completed: BTreeSet::new() }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn completed(&self) -> &BTreeSet<u32> {
        &self.completed
    }

    pub fn is_completed(&self, id: u32) -> bool {
        self.completed.contains(&id)
    }

    /// Idempotent. Never moves `current`. Returns true on first insert.
    /// Ids missing from the registry are not recorded, so `completed`
    /// only ever holds registered stages and the percentage stays within
    /// 0..=100.
    pub fn complete_stage(&mut self, id: u32) -> bool {
        if !self.registry.contains(id) {
            log::debug!("ignoring completion of unregistered stage {}", id);
            return false;
        }
        let fresh = self.completed.insert(id);
        if fresh {
            log::info!("stage {} completed", id);
        }
        fresh
    }

    pub fn change_stage(&mut self, id: u32) -> Result<(), NavError> {
        if !self.registry.contains(id) {
            return Err(NavError::OutOfRange(id));
        }
        if self.current != id {
            log::info!("stage {} -> {}", self.current, id);
        }
        self.current = id;
        Ok(())
    }

    /// Reach-gated jump.
    pub fn navigate_to(&mut self, id: u32) -> Result<(), NavError> {
        if !self.registry.contains(id) {
            return Err(NavError::OutOfRange(id));
        }
        if !self.can_navigate_to(id) {
            return Err(NavError::NotReached(id));
        }
        self.change_stage(id)
    }

    /// Move to the stage after `id`. No-op (false) on the last or an
    /// unknown id.
    pub fn advance_from_stage(&mut self, id: u32) -> bool {
        match self.registry.next_after(id) {
            Some(next) => self.change_stage(next).is_ok(),
            None => false,
        }
    }

    pub fn retreat_from_stage(&mut self, id: u32) -> bool {
        match self.registry.previous_before(id) {
            Some(prev) => self.change_stage(prev).is_ok(),
            None => false,
        }
    }

    /// Recovery from the not-found view.
    pub fn return_to_first(&mut self) {
        let first = self.registry.first_id();
        if self.change_stage(first).is_err() {
            log::error!("first stage {} missing from registry", first);
        }
    }

    /// max(completed ∪ {current})
    pub fn highest_reached(&self) -> u32 {
        self.completed.iter().next_back().copied().map_or(self.current, |m| m.max(self.current))
    }

    pub fn can_navigate_to(&self, id: u32) -> bool {
        self.registry.contains(id)
            && (id == self.current || self.is_completed(id) || id <= self.highest_reached())
    }

    pub fn resolve(&self) -> StageView<'_> {
        match self.registry.get(self.current) {
            None => StageView::NotFound(self.current),
            Some(d) => match d.handler {
                Some(h) => StageView::Found(d, h),
                None => StageView::NotImplemented(d),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::StageKind;

    fn three() -> StageController {
        let reg = StageRegistry::new(vec![
            StageDescriptor::new(1, StageKind::Content, "Intro", "intro"),
            StageDescriptor::new(2, StageKind::Game, "Balloons", "balloon-pop"),
            StageDescriptor::new(3, StageKind::Game, "Trivia", "trivia"),
        ])
        .unwrap();
        StageController::new(reg, 1)
    }

    #[test]
    fn end_to_end_three_stages() {
        let mut c = three();
        assert_eq!(c.current(), 1);
        c.complete_stage(1);
        assert!(c.advance_from_stage(1));
        assert_eq!(c.current(), 2);
        assert_eq!(c.completed().iter().copied().collect::<Vec<_>>(), vec![1]);

        assert!(!c.advance_from_stage(3));
        assert_eq!(c.current(), 2);
        assert_eq!(c.completed().len(), 1);
        assert!(!c.registry().contains(4));
    }

    #[test]
    fn complete_twice_stored_once() {
        let mut c = three();
        assert!(c.complete_stage(3));
        assert!(!c.complete_stage(3));
        assert_eq!(c.completed().iter().filter(|&&id| id == 3).count(), 1);
        assert_eq!(c.completed().len(), 1);
        assert_eq!(c.current(), 1);
    }

    #[test]
    fn change_then_advance_on_last_is_noop() {
        let mut c = three();
        c.change_stage(3).unwrap();
        assert!(!c.advance_from_stage(3));
        assert_eq!(c.current(), 3);
    }

    #[test]
    fn change_stage_rejects_unknown_ids() {
        let mut c = three();
        assert_eq!(c.change_stage(4), Err(NavError::OutOfRange(4)));
        assert_eq!(c.change_stage(0), Err(NavError::OutOfRange(0)));
        assert_eq!(c.current(), 1);
    }

    #[test]
    fn navigation_gated_by_reach() {
        let mut c = three();
        assert!(c.can_navigate_to(1));
        assert!(!c.can_navigate_to(2));
        assert_eq!(c.navigate_to(3), Err(NavError::NotReached(3)));

        c.complete_stage(1);
        c.advance_from_stage(1);
        c.complete_stage(2);
        c.advance_from_stage(2);
        assert_eq!(c.highest_reached(), 3);

        c.navigate_to(1).unwrap();
        assert_eq!(c.current(), 1);
        assert!(c.can_navigate_to(2));
        assert_eq!(c.highest_reached(), 2);
    }

    #[test]
    fn retreat_stops_at_first() {
        let mut c = three();
        c.change_stage(2).unwrap();
        assert!(c.retreat_from_stage(2));
        assert_eq!(c.current(), 1);
        assert!(!c.retreat_from_stage(1));
        assert_eq!(c.current(), 1);
    }

    #[test]
    fn resolve_views() {
        let reg = StageRegistry::new(vec![
            StageDescriptor::new(1, StageKind::Content, "Intro", "intro"),
            StageDescriptor::new(2, StageKind::Game, "Puzzle", "PuzzleGame"),
        ])
        .unwrap();
        let mut c = StageController::new(reg, 7);
        assert_eq!(c.resolve(), StageView::NotFound(7));

        c.return_to_first();
        assert!(matches!(c.resolve(), StageView::Found(d, StageHandler::Intro) if d.id == 1));

        c.change_stage(2).unwrap();
        assert!(matches!(c.resolve(), StageView::NotImplemented(d) if d.id == 2));
    }

    #[test]
    fn completing_unregistered_id_ignored() {
        let mut c = three();
        assert!(!c.complete_stage(9));
        assert!(c.completed().is_empty());
    }
}
