//! Commit-message-driven page sync.
//!
//! One invocation handles one commit message: parse the bracketed
//! routing triple, extract field updates from the free text, resolve
//! the target page, patch the body, and write back with the next
//! version number only when the body actually changed. Expected
//! business outcomes (no triple, nothing to update, no matching page,
//! stale version) are report variants, not errors.

use anyhow::Result;
use serde::Serialize;

use crate::extract::{CommitRef, extract_updates, parse_commit_message};
use crate::patch::{FieldPatch, apply_updates};
use crate::resolve::{ResolvedPage, match_page, space_matches};
use crate::store::{ContentStore, PageContent, PutOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Updated,
    Unchanged,
    NoCommitRef,
    NoUpdates,
    PageNotResolved,
    VersionConflict,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::NoCommitRef => "no_commit_ref",
            Self::NoUpdates => "no_updates",
            Self::PageNotResolved => "page_not_resolved",
            Self::VersionConflict => "version_conflict",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub reason: Option<String>,
    pub space_key: Option<String>,
    pub page_id: Option<String>,
    pub page_title: Option<String>,
    pub new_version: Option<i64>,
    pub patches: Vec<FieldPatch>,
    pub request_count: usize,
}

impl SyncReport {
    fn stopped(outcome: SyncOutcome, reason: impl Into<String>, request_count: usize) -> Self {
        Self {
            outcome,
            reason: Some(reason.into()),
            space_key: None,
            page_id: None,
            page_title: None,
            new_version: None,
            patches: Vec::new(),
            request_count,
        }
    }
}

/// Run the full pipeline for one commit message against a store.
pub fn run_sync(store: &mut dyn ContentStore, commit_message: &str) -> Result<SyncReport> {
    let Some(commit) = parse_commit_message(commit_message) else {
        return Ok(SyncReport::stopped(
            SyncOutcome::NoCommitRef,
            "commit message does not carry [project][module][component] tokens",
            store.request_count(),
        ));
    };

    // Extract before touching the network so messages with nothing to
    // apply never cost listing calls.
    let updates = extract_updates(&commit.description);
    if updates.is_empty() {
        return Ok(SyncReport::stopped(
            SyncOutcome::NoUpdates,
            "could not resolve field/value from commit message",
            store.request_count(),
        ));
    }

    let Some(resolved) = resolve_page(store, &commit)? else {
        return Ok(SyncReport::stopped(
            SyncOutcome::PageNotResolved,
            format!(
                "could not resolve space or page for module '{}' and component '{}'",
                commit.module, commit.component
            ),
            store.request_count(),
        ));
    };

    let page = store.get_page(&resolved.page_id)?;
    let applied = apply_updates(&page.body, &updates);
    if !applied.changed {
        return Ok(SyncReport {
            outcome: SyncOutcome::Unchanged,
            reason: None,
            space_key: Some(resolved.space_key),
            page_id: Some(resolved.page_id),
            page_title: Some(page.title),
            new_version: None,
            patches: applied.patches,
            request_count: store.request_count(),
        });
    }

    let next_version = page.version + 1;
    let put = store.put_page(&PageContent {
        id: page.id.clone(),
        title: page.title.clone(),
        version: next_version,
        body: applied.body,
    })?;

    let (outcome, reason, new_version) = match put {
        PutOutcome::Updated => (SyncOutcome::Updated, None, Some(next_version)),
        PutOutcome::VersionConflict => (
            SyncOutcome::VersionConflict,
            Some(format!(
                "page '{}' changed upstream while syncing (stale version {})",
                page.title, next_version
            )),
            None,
        ),
    };

    Ok(SyncReport {
        outcome,
        reason,
        space_key: Some(resolved.space_key),
        page_id: Some(resolved.page_id),
        page_title: Some(page.title),
        new_version,
        patches: applied.patches,
        request_count: store.request_count(),
    })
}

/// Walk matching spaces in listing order, returning the first page hit.
pub fn resolve_page(
    store: &mut dyn ContentStore,
    commit: &CommitRef,
) -> Result<Option<ResolvedPage>> {
    let spaces = store.list_spaces()?;
    for space in spaces
        .iter()
        .filter(|space| space_matches(&commit.project, space))
    {
        let pages = store.list_pages(&space.key)?;
        if let Some(page) = match_page(&commit.module, &commit.component, &pages) {
            return Ok(Some(ResolvedPage {
                space_key: space.key.clone(),
                page_id: page.id.clone(),
                page_title: page.title.clone(),
            }));
        }
    }
    Ok(None)
}
