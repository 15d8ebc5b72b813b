use crate::models::{
    Ack, PasswordChange, ProfilePatch, Task, TaskDraft, TaskPage, TaskPatch, TaskPriority,
    TaskStatus, TokenGrant, User,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    /// Rejected locally before any request is dispatched.
    #[error("{0}")]
    Validation(String),
    /// Non-2xx response; carries the server's `detail` message verbatim
    /// or the generic fallback.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// The remote operations the controllers are written against. The HTTP
/// implementation is the only code that touches the network; everything
/// above it is a state machine over these results.
#[async_trait]
pub trait Backend: Send + Sync {
    fn set_token(&self, token: &str);
    fn clear_token(&self);

    async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenGrant, ApiError>;
    async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError>;
    async fn me(&self) -> Result<User, ApiError>;
    async fn update_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError>;
    async fn change_password(&self, change: &PasswordChange) -> Result<Ack, ApiError>;

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        priority: Option<TaskPriority>,
        search: Option<&str>,
    ) -> Result<TaskPage, ApiError>;
    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: i64) -> Result<(), ApiError>;
}

pub struct HttpBackend {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: String) -> Result<HttpBackend, reqwest::Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(HttpBackend {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_headers(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header("Content-Type", "application/json");
        match self.token.read().unwrap().as_deref() {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let res = self.with_headers(req).send().await?;
        let status = res.status();
        if status.is_success() {
            Ok(res.json::<T>().await?)
        } else {
            let body = res.bytes().await.unwrap_or_default();
            let err = status_error(status, &body);
            warn!(status = status.as_u16(), %err, "request rejected");
            Err(err)
        }
    }

    async fn execute_no_content(&self, req: RequestBuilder) -> Result<(), ApiError> {
        let res = self.with_headers(req).send().await?;
        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = res.bytes().await.unwrap_or_default();
            let err = status_error(status, &body);
            warn!(status = status.as_u16(), %err, "request rejected");
            Err(err)
        }
    }
}

/// Map a non-2xx response to a typed error: the JSON `detail` message
/// when present, `HTTP <status>` when the body is JSON without one, and
/// the generic fallback when the body is not JSON at all.
fn status_error(status: StatusCode, body: &[u8]) -> ApiError {
    let message = match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => value
            .get("detail")
            .and_then(|detail| detail.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        Err(_) => "Request failed".to_string(),
    };
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn set_token(&self, token: &str) {
        *self.token.write().unwrap() = Some(token.to_string());
    }

    fn clear_token(&self) {
        *self.token.write().unwrap() = None;
    }

    async fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<TokenGrant, ApiError> {
        debug!(username, "registering account");
        let body = json!({
            "email": email,
            "username": username,
            "password": password,
        });
        self.execute(self.http.post(self.url("/api/auth/register")).json(&body))
            .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        debug!("logging in");
        let body = json!({
            "email": email,
            "password": password,
        });
        self.execute(self.http.post(self.url("/api/auth/login")).json(&body))
            .await
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.execute(self.http.get(self.url("/api/auth/me"))).await
    }

    async fn update_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError> {
        self.execute(self.http.put(self.url("/api/auth/me")).json(patch))
            .await
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<Ack, ApiError> {
        self.execute(
            self.http
                .put(self.url("/api/auth/me/password"))
                .json(change),
        )
        .await
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        priority: Option<TaskPriority>,
        search: Option<&str>,
    ) -> Result<TaskPage, ApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = priority {
            query.push(("priority", priority.as_str().to_string()));
        }
        if let Some(search) = search {
            query.push(("search", search.to_string()));
        }
        self.execute(self.http.get(self.url("/api/tasks")).query(&query))
            .await
    }

    async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        debug!(title = %draft.title, "creating task");
        self.execute(self.http.post(self.url("/api/tasks")).json(draft))
            .await
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ApiError> {
        debug!(id, "updating task");
        self.execute(
            self.http
                .put(self.url(&format!("/api/tasks/{}", id)))
                .json(patch),
        )
        .await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        debug!(id, "deleting task");
        self.execute_no_content(self.http.delete(self.url(&format!("/api/tasks/{}", id))))
            .await
    }
}

/// In-memory stand-in for the remote server, used by the controller
/// tests. Behaves like the real API over the same trait: issues tokens,
/// filters task lists, 404s on unknown ids.
#[cfg(test)]
pub mod testing {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    pub struct Account {
        pub user: User,
        pub password: String,
        pub tokens: Vec<String>,
    }

    #[derive(Default)]
    pub struct FakeState {
        pub installed_token: Option<String>,
        pub account: Option<Account>,
        pub tasks: Vec<Task>,
        pub next_task_id: i64,
        pub next_token: u32,
        /// Network requests seen, auth and tasks alike.
        pub calls: usize,
        /// When set, the next request fails with this error.
        pub fail_next: Option<ApiError>,
    }

    pub struct FakeBackend {
        pub state: Mutex<FakeState>,
    }

    impl FakeBackend {
        pub fn new() -> FakeBackend {
            FakeBackend {
                state: Mutex::new(FakeState {
                    next_task_id: 1,
                    ..FakeState::default()
                }),
            }
        }

        pub fn with_account(email: &str, username: &str, password: &str) -> FakeBackend {
            let backend = FakeBackend::new();
            {
                let mut state = backend.state.lock().unwrap();
                state.account = Some(Account {
                    user: User {
                        id: 1,
                        email: email.to_string(),
                        username: username.to_string(),
                        created_at: Utc::now(),
                    },
                    password: password.to_string(),
                    tokens: Vec::new(),
                });
            }
            backend
        }

        pub fn fail_next(&self, err: ApiError) {
            self.state.lock().unwrap().fail_next = Some(err);
        }

        pub fn calls(&self) -> usize {
            self.state.lock().unwrap().calls
        }

        pub fn push_task(&self, title: &str, status: TaskStatus, priority: TaskPriority) -> Task {
            let mut state = self.state.lock().unwrap();
            let id = state.next_task_id;
            state.next_task_id += 1;
            let now = Utc::now();
            let task = Task {
                id,
                title: title.to_string(),
                description: String::new(),
                status,
                priority,
                created_at: now,
                updated_at: now,
            };
            state.tasks.push(task.clone());
            task
        }

        fn begin(&self) -> Result<std::sync::MutexGuard<'_, FakeState>, ApiError> {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            if let Some(err) = state.fail_next.take() {
                return Err(err);
            }
            Ok(state)
        }
    }

    fn issue_token(state: &mut FakeState) -> String {
        state.next_token += 1;
        let token = format!("token-{}", state.next_token);
        if let Some(account) = state.account.as_mut() {
            account.tokens.push(token.clone());
        }
        token
    }

    fn authorized(state: &FakeState) -> Result<&Account, ApiError> {
        let account = state.account.as_ref().ok_or(ApiError::Status {
            status: 401,
            message: "Not authenticated".to_string(),
        })?;
        match &state.installed_token {
            Some(token) if account.tokens.contains(token) => Ok(account),
            _ => Err(ApiError::Status {
                status: 401,
                message: "Not authenticated".to_string(),
            }),
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        fn set_token(&self, token: &str) {
            self.state.lock().unwrap().installed_token = Some(token.to_string());
        }

        fn clear_token(&self) {
            self.state.lock().unwrap().installed_token = None;
        }

        async fn register(
            &self,
            email: &str,
            username: &str,
            password: &str,
        ) -> Result<TokenGrant, ApiError> {
            let mut state = self.begin()?;
            if state.account.is_some() {
                return Err(ApiError::Status {
                    status: 409,
                    message: "Email already registered".to_string(),
                });
            }
            let user = User {
                id: 1,
                email: email.to_string(),
                username: username.to_string(),
                created_at: Utc::now(),
            };
            state.account = Some(Account {
                user: user.clone(),
                password: password.to_string(),
                tokens: Vec::new(),
            });
            let access_token = issue_token(&mut state);
            Ok(TokenGrant {
                access_token,
                token_type: "bearer".to_string(),
                user,
            })
        }

        async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
            let mut state = self.begin()?;
            let matches = state
                .account
                .as_ref()
                .map(|a| a.user.email == email && a.password == password)
                .unwrap_or(false);
            if !matches {
                return Err(ApiError::Status {
                    status: 401,
                    message: "Invalid email or password".to_string(),
                });
            }
            let access_token = issue_token(&mut state);
            let user = state.account.as_ref().unwrap().user.clone();
            Ok(TokenGrant {
                access_token,
                token_type: "bearer".to_string(),
                user,
            })
        }

        async fn me(&self) -> Result<User, ApiError> {
            let state = self.begin()?;
            Ok(authorized(&state)?.user.clone())
        }

        async fn update_profile(&self, patch: &ProfilePatch) -> Result<User, ApiError> {
            let mut state = self.begin()?;
            authorized(&state)?;
            let account = state.account.as_mut().unwrap();
            if let Some(username) = &patch.username {
                account.user.username = username.clone();
            }
            if let Some(email) = &patch.email {
                account.user.email = email.clone();
            }
            Ok(account.user.clone())
        }

        async fn change_password(&self, change: &PasswordChange) -> Result<Ack, ApiError> {
            let mut state = self.begin()?;
            authorized(&state)?;
            let account = state.account.as_mut().unwrap();
            if account.password != change.current_password {
                return Err(ApiError::Status {
                    status: 400,
                    message: "Current password is incorrect".to_string(),
                });
            }
            account.password = change.new_password.clone();
            Ok(Ack {
                message: "Password updated successfully".to_string(),
            })
        }

        async fn list_tasks(
            &self,
            status: Option<TaskStatus>,
            priority: Option<TaskPriority>,
            search: Option<&str>,
        ) -> Result<TaskPage, ApiError> {
            let state = self.begin()?;
            let needle = search.map(str::to_lowercase);
            // Newest first, like the server's created_at ordering.
            let tasks: Vec<Task> = state
                .tasks
                .iter()
                .rev()
                .filter(|t| status.map_or(true, |s| t.status == s))
                .filter(|t| priority.map_or(true, |p| t.priority == p))
                .filter(|t| {
                    needle.as_deref().map_or(true, |n| {
                        t.title.to_lowercase().contains(n)
                            || t.description.to_lowercase().contains(n)
                    })
                })
                .cloned()
                .collect();
            let total = tasks.len() as u64;
            Ok(TaskPage { tasks, total })
        }

        async fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
            let mut state = self.begin()?;
            let id = state.next_task_id;
            state.next_task_id += 1;
            let now = Utc::now();
            let task = Task {
                id,
                title: draft.title.clone(),
                description: draft.description.clone(),
                status: draft.status,
                priority: draft.priority,
                created_at: now,
                updated_at: now,
            };
            state.tasks.push(task.clone());
            Ok(task)
        }

        async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, ApiError> {
            let mut state = self.begin()?;
            let task = state
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(ApiError::Status {
                    status: 404,
                    message: "Task not found".to_string(),
                })?;
            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = description.clone();
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            task.updated_at = Utc::now();
            Ok(task.clone())
        }

        async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
            let mut state = self.begin()?;
            let index = state.tasks.iter().position(|t| t.id == id);
            match index {
                Some(index) => {
                    state.tasks.remove(index);
                    Ok(())
                }
                None => Err(ApiError::Status {
                    status: 404,
                    message: "Task not found".to_string(),
                }),
            }
        }
    }
}
