use crate::api::{ApiError, Backend};
use crate::models::{StatusFilter, Task, TaskDraft, TaskPage, TaskPatch, TaskStatus};
use std::sync::Arc;
use tracing::{debug, warn};

/// Transient dashboard criteria; never persisted. The server owns the
/// actual filter and search semantics.
#[derive(Clone, Debug, Default)]
pub struct Criteria {
    pub status: StatusFilter,
    pub search: String,
}

/// Stamped by `begin_reload`; a response is applied only if its ticket
/// is still the latest issued generation. Supersede a reload by issuing
/// a new ticket and dropping the old in-flight future.
#[derive(Debug)]
pub struct ReloadTicket {
    generation: u64,
    status: Option<TaskStatus>,
    search: Option<String>,
}

/// One removed entry and where it sat, so a failed delete restores
/// exactly that entry instead of rolling back the whole list.
#[derive(Debug)]
pub struct UndoToken {
    index: usize,
    task: Task,
}

/// Client-side cache of the user's tasks, ordered as the server returns
/// them, with locally created tasks prepended. Task ids are unique
/// within the cache.
pub struct TaskList<B: Backend> {
    api: Arc<B>,
    tasks: Vec<Task>,
    total: u64,
    generation: u64,
    pub criteria: Criteria,
}

impl<B: Backend> TaskList<B> {
    pub fn new(api: Arc<B>) -> TaskList<B> {
        TaskList {
            api,
            tasks: Vec::new(),
            total: 0,
            generation: 0,
            criteria: Criteria::default(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Drop the cached list, e.g. on logout.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.total = 0;
    }

    /// (in progress, done) counts over the cached list.
    pub fn progress_counts(&self) -> (usize, usize) {
        let in_progress = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        (in_progress, done)
    }

    /// Snapshot the current criteria under the next generation.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        let search = self.criteria.search.trim();
        ReloadTicket {
            generation: self.generation,
            status: self.criteria.status.as_status(),
            search: if search.is_empty() {
                None
            } else {
                Some(search.to_string())
            },
        }
    }

    /// Apply a reload outcome. Stale responses are discarded and failed
    /// ones leave the prior cache; both are silent by design. Returns
    /// whether the cache was replaced.
    pub fn finish_reload(
        &mut self,
        ticket: ReloadTicket,
        outcome: Result<TaskPage, ApiError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!(
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale task list response"
            );
            return false;
        }
        match outcome {
            Ok(page) => {
                self.tasks = page.tasks;
                self.total = page.total;
                true
            }
            Err(err) => {
                warn!(%err, "task reload failed, keeping previous list");
                false
            }
        }
    }

    /// Fetch the list for the current criteria and replace the cache.
    pub async fn reload(&mut self) -> bool {
        let ticket = self.begin_reload();
        let outcome = self
            .api
            .list_tasks(ticket.status, None, ticket.search.as_deref())
            .await;
        self.finish_reload(ticket, outcome)
    }

    /// Rejects a whitespace-only title locally; nothing is sent. On
    /// success the server's task (with its id and timestamps) is
    /// prepended.
    pub async fn create(&mut self, draft: TaskDraft) -> Result<(), ApiError> {
        if draft.title.trim().is_empty() {
            return Err(ApiError::Validation("Title is required".to_string()));
        }
        let task = self.api.create_task(&draft).await?;
        self.tasks.insert(0, task);
        self.total += 1;
        Ok(())
    }

    /// On success the cached entry is replaced in place, preserving
    /// order. On failure the cache is untouched.
    pub async fn update(&mut self, id: i64, patch: TaskPatch) -> Result<(), ApiError> {
        let task = self.api.update_task(id, &patch).await?;
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
            *slot = task;
        }
        Ok(())
    }

    /// Optimistic removal; the entry disappears before the server
    /// responds and comes back at its old position if the call fails.
    pub async fn delete(&mut self, id: i64) -> Result<(), ApiError> {
        let undo = match self.remove_local(id) {
            Some(undo) => undo,
            None => return Ok(()),
        };
        match self.api.delete_task(id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.restore(undo);
                Err(err)
            }
        }
    }

    fn remove_local(&mut self, id: i64) -> Option<UndoToken> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        let task = self.tasks.remove(index);
        self.total = self.total.saturating_sub(1);
        Some(UndoToken { index, task })
    }

    fn restore(&mut self, undo: UndoToken) {
        let index = undo.index.min(self.tasks.len());
        self.tasks.insert(index, undo.task);
        self.total += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;
    use crate::models::TaskPriority;
    use pretty_assertions::assert_eq;

    fn controller(api: &Arc<FakeBackend>) -> TaskList<FakeBackend> {
        TaskList::new(api.clone())
    }

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
        }
    }

    #[tokio::test]
    async fn test_whitespace_titles_are_rejected_without_a_request() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);

        for title in ["", " ", "\t", "  \n  "] {
            let err = list.create(draft(title)).await.unwrap_err();
            assert_eq!(err, ApiError::Validation("Title is required".to_string()));
        }

        assert_eq!(api.calls(), 0);
        assert!(list.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_reload_round_trips() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);

        list.create(draft("A")).await.unwrap();
        assert_eq!(list.tasks()[0].title, "A");
        assert!(list.tasks()[0].id > 0);

        list.reload().await;
        assert_eq!(list.tasks().len(), 1);
        assert_eq!(list.total(), 1);
        assert_eq!(list.tasks()[0].title, "A");
        assert_eq!(list.tasks()[0].status, TaskStatus::Todo);
        assert_eq!(list.tasks()[0].priority, TaskPriority::Low);
    }

    #[tokio::test]
    async fn test_create_prepends_newest_task() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);

        list.create(draft("first")).await.unwrap();
        list.create(draft("second")).await.unwrap();

        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_cache_unchanged() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("keeper")).await.unwrap();
        let before = list.tasks().to_vec();

        api.fail_next(ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        });
        let err = list.create(draft("doomed")).await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(list.tasks(), before.as_slice());
    }

    #[tokio::test]
    async fn test_update_replaces_entry_preserving_order() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("one")).await.unwrap();
        list.create(draft("two")).await.unwrap();
        list.create(draft("three")).await.unwrap();
        let id = list.tasks()[1].id;

        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            ..TaskPatch::default()
        };
        list.update(id, patch).await.unwrap();

        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two", "one"]);
        assert_eq!(list.tasks()[1].status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_update_of_missing_id_surfaces_error_and_keeps_cache() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("present")).await.unwrap();
        let before = list.tasks().to_vec();

        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            ..TaskPatch::default()
        };
        let err = list.update(5, patch).await.unwrap_err();

        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                message: "Task not found".to_string(),
            }
        );
        assert_eq!(list.tasks(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_removes_immediately() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("gone")).await.unwrap();
        let id = list.tasks()[0].id;

        list.delete(id).await.unwrap();

        assert!(list.tasks().is_empty());
        assert_eq!(list.total(), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_restores_entry_at_its_position() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("one")).await.unwrap();
        list.create(draft("two")).await.unwrap();
        list.create(draft("three")).await.unwrap();
        let before = list.tasks().to_vec();
        let id = list.tasks()[1].id;

        api.fail_next(ApiError::Status {
            status: 500,
            message: "boom".to_string(),
        });
        let err = list.delete(id).await.unwrap_err();

        assert!(matches!(err, ApiError::Status { status: 500, .. }));
        assert_eq!(list.tasks(), before.as_slice());
        assert_eq!(list.total(), 3);
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_previous_list() {
        let api = Arc::new(FakeBackend::new());
        let mut list = controller(&api);
        list.create(draft("kept")).await.unwrap();
        let before = list.tasks().to_vec();

        api.fail_next(ApiError::Timeout);
        let applied = list.reload().await;

        assert!(!applied);
        assert_eq!(list.tasks(), before.as_slice());
    }

    #[tokio::test]
    async fn test_reload_applies_status_and_search_criteria() {
        let api = Arc::new(FakeBackend::new());
        api.push_task("write report", TaskStatus::Todo, TaskPriority::Medium);
        api.push_task("Report bug", TaskStatus::Done, TaskPriority::High);
        api.push_task("water plants", TaskStatus::Done, TaskPriority::Low);
        let mut list = controller(&api);

        list.criteria.status = StatusFilter::Done;
        list.criteria.search = "  report ".to_string();
        list.reload().await;

        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Report bug"]);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let api = Arc::new(FakeBackend::new());
        let foo = api.push_task("foo", TaskStatus::Todo, TaskPriority::Low);
        let bar = api.push_task("bar", TaskStatus::Todo, TaskPriority::Low);
        let mut list = controller(&api);

        // Two reloads issued in order "foo" then "bar"; the earlier
        // one's response arrives last and must lose.
        list.criteria.search = "foo".to_string();
        let first = list.begin_reload();
        list.criteria.search = "bar".to_string();
        let second = list.begin_reload();

        let bar_page = TaskPage {
            tasks: vec![bar.clone()],
            total: 1,
        };
        assert!(list.finish_reload(second, Ok(bar_page)));

        let foo_page = TaskPage {
            tasks: vec![foo],
            total: 1,
        };
        assert!(!list.finish_reload(first, Ok(foo_page)));

        let titles: Vec<&str> = list.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["bar"]);
    }
}
