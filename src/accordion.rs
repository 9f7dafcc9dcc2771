//! Section Revealer
//!
//! Tracks which accordion panels have been opened at least once. At most one
//! panel is expanded at a time; a visit is permanent until reset.

use std::collections::BTreeSet;

use crate::completion::percentage;

#[derive(Debug, Clone, Default)]
pub struct SectionRevealer {
    sections: Vec<String>,
    expanded: Option<String>,
    visited: BTreeSet<String>,
}

impl SectionRevealer {
    pub fn new<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
            expanded: None,
            visited: BTreeSet::new(),
        }
    }

    /// Expand/collapse event for one panel.
    ///
    /// Expanding records a visit. Collapsing the expanded panel clears the
    /// expansion but keeps the visit.
    pub fn handle_accordion_change(&mut self, section_id: &str, expanded: bool) {
        if expanded {
            self.expanded = Some(section_id.to_string());
            self.visited.insert(section_id.to_string());
        } else if self.expanded.as_deref() == Some(section_id) {
            self.expanded = None;
        }
    }

    /// Handler bound to one panel id, for wiring into a view callback.
    pub fn change_handler(section_id: impl Into<String>) -> impl Fn(&mut SectionRevealer, bool) {
        let section_id = section_id.into();
        move |revealer, expanded| revealer.handle_accordion_change(&section_id, expanded)
    }

    pub fn is_section_visited(&self, section_id: &str) -> bool {
        self.visited.contains(section_id)
    }

    pub fn mark_section_visited(&mut self, section_id: &str) {
        self.visited.insert(section_id.to_string());
    }

    /// "Mark all reviewed"
    pub fn mark_all_visited(&mut self) {
        self.visited.extend(self.sections.iter().cloned());
    }

    /// Share of configured sections visited. Unknown ids do not count.
    pub fn completion_percentage(&self) -> u8 {
        let seen = self
            .sections
            .iter()
            .filter(|id| self.visited.contains(id.as_str()))
            .count();
        percentage(seen, self.sections.len())
    }

    pub fn all_visited(&self) -> bool {
        !self.sections.is_empty()
            && self
                .sections
                .iter()
                .all(|id| self.visited.contains(id.as_str()))
    }

    pub fn reset_accordion(&mut self) {
        self.expanded = None;
        self.visited.clear();
    }

    pub fn expanded_section(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    pub fn is_expanded(&self, section_id: &str) -> bool {
        self.expanded.as_deref() == Some(section_id)
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn visited_sections(&self) -> &BTreeSet<String> {
        &self.visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revealer() -> SectionRevealer {
        SectionRevealer::new(["rights", "privacy", "grievance", "fees"])
    }

    #[test]
    fn test_visits_survive_collapse() {
        let mut accordion = revealer();
        accordion.handle_accordion_change("rights", true);
        assert_eq!(accordion.expanded_section(), Some("rights"));

        accordion.handle_accordion_change("rights", false);
        assert_eq!(accordion.expanded_section(), None);
        assert!(accordion.is_section_visited("rights"));
        assert_eq!(accordion.completion_percentage(), 25);
    }

    #[test]
    fn test_single_expansion() {
        let mut accordion = revealer();
        accordion.handle_accordion_change("rights", true);
        accordion.handle_accordion_change("privacy", true);
        assert!(accordion.is_expanded("privacy"));
        assert!(!accordion.is_expanded("rights"));

        // Collapse event from a panel that is no longer expanded.
        accordion.handle_accordion_change("rights", false);
        assert_eq!(accordion.expanded_section(), Some("privacy"));
        assert_eq!(accordion.completion_percentage(), 50);
    }

    #[test]
    fn test_unknown_sections_do_not_inflate_completion() {
        let mut accordion = revealer();
        accordion.mark_section_visited("appendix");
        accordion.mark_section_visited("fees");
        assert!(accordion.is_section_visited("appendix"));
        assert_eq!(accordion.completion_percentage(), 25);
    }

    #[test]
    fn test_mark_all_and_reset() {
        let mut accordion = revealer();
        accordion.mark_all_visited();
        assert!(accordion.all_visited());
        assert_eq!(accordion.completion_percentage(), 100);

        accordion.handle_accordion_change("fees", true);
        accordion.reset_accordion();
        assert_eq!(accordion.expanded_section(), None);
        assert!(accordion.visited_sections().is_empty());
        assert_eq!(accordion.completion_percentage(), 0);
    }

    #[test]
    fn test_bound_handler() {
        let mut accordion = revealer();
        let on_grievance = SectionRevealer::change_handler("grievance");
        on_grievance(&mut accordion, true);
        on_grievance(&mut accordion, false);
        assert!(accordion.is_section_visited("grievance"));
        assert!(accordion.expanded_section().is_none());
    }

    #[test]
    fn test_no_sections() {
        let accordion = SectionRevealer::default();
        assert_eq!(accordion.completion_percentage(), 0);
        assert!(!accordion.all_visited());
    }
}
