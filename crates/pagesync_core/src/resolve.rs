//! Fuzzy routing from a commit's (project, module, component) triple to
//! a space and page, by greedy substring containment over titles.
//!
//! Containment on short tokens can false-positive ("adm" matches
//! "roadmap"); commit authors are expected to use reasonably specific
//! tokens. Matching is case-insensitive and returns the first hit in
//! listing order.

use serde::Serialize;

use crate::store::{PageSummary, SpaceSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPage {
    pub space_key: String,
    pub page_id: String,
    pub page_title: String,
}

/// A space matches when the project token appears in its name or key.
pub fn space_matches(project: &str, space: &SpaceSummary) -> bool {
    let project = project.trim().to_lowercase();
    if project.is_empty() {
        return false;
    }
    space.name.to_lowercase().contains(&project) || space.key.to_lowercase().contains(&project)
}

/// Pick the page for a (module, component) pair.
///
/// Pages whose title and parent title carry both tokens between them
/// win over pages matching a single token, so a child page under the
/// right section beats an unrelated page that happens to contain one
/// token. Within each tier the first page in listing order is taken.
pub fn match_page<'a>(
    module: &str,
    component: &str,
    pages: &'a [PageSummary],
) -> Option<&'a PageSummary> {
    let module = module.trim().to_lowercase();
    let component = component.trim().to_lowercase();
    if module.is_empty() && component.is_empty() {
        return None;
    }

    if !module.is_empty() && !component.is_empty() {
        for page in pages {
            let title = page.title.to_lowercase();
            let Some(parent) = page
                .parent_id
                .as_deref()
                .and_then(|parent_id| pages.iter().find(|candidate| candidate.id == parent_id))
            else {
                continue;
            };
            let parent_title = parent.title.to_lowercase();
            if (title.contains(&module) && parent_title.contains(&component))
                || (title.contains(&component) && parent_title.contains(&module))
            {
                return Some(page);
            }
        }
    }

    pages.iter().find(|page| {
        let title = page.title.to_lowercase();
        (!module.is_empty() && title.contains(&module))
            || (!component.is_empty() && title.contains(&component))
    })
}
