use crate::api::Backend;
use crate::models::{ProfilePatch, TaskDraft, TaskPatch, TaskPriority, TaskStatus};
use crate::parser::parse_title_input;
use crate::session::Session;
use crate::tasks::TaskList;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::ListState;
use std::io;

#[derive(Clone, Copy, PartialEq)]
pub enum Screen {
    Login,
    Register,
    Dashboard,
    Profile,
}

pub enum InputMode {
    Normal,
    Editing,
    Insert,
    Search,
}

#[derive(Clone, Copy, PartialEq)]
pub enum ActiveInput {
    Title,
    Description,
    Status,
    Priority,
}

#[derive(Clone, Copy, PartialEq, Default)]
pub enum AuthField {
    #[default]
    Email,
    Username,
    Password,
    Confirm,
}

#[derive(Clone, Copy, PartialEq, Default)]
pub enum ProfileField {
    #[default]
    Username,
    Email,
    AvatarPath,
    CurrentPassword,
    NewPassword,
    ConfirmPassword,
}

#[derive(Default)]
pub struct AuthForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm: String,
    pub active: AuthField,
    pub error: Option<String>,
}

impl AuthForm {
    fn field_mut(&mut self) -> &mut String {
        match self.active {
            AuthField::Email => &mut self.email,
            AuthField::Username => &mut self.username,
            AuthField::Password => &mut self.password,
            AuthField::Confirm => &mut self.confirm,
        }
    }

    fn cycle(&mut self, screen: Screen, forward: bool) {
        let order: &[AuthField] = match screen {
            Screen::Register => &[
                AuthField::Email,
                AuthField::Username,
                AuthField::Password,
                AuthField::Confirm,
            ],
            _ => &[AuthField::Email, AuthField::Password],
        };
        let at = order.iter().position(|f| *f == self.active).unwrap_or(0);
        let next = if forward {
            (at + 1) % order.len()
        } else {
            (at + order.len() - 1) % order.len()
        };
        self.active = order[next];
    }
}

pub struct TaskForm {
    pub editing: Option<i64>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub active: ActiveInput,
    pub error: Option<String>,
}

impl Default for TaskForm {
    fn default() -> TaskForm {
        TaskForm {
            editing: None,
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            active: ActiveInput::Title,
            error: None,
        }
    }
}

#[derive(Default)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub avatar_path: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub active: ProfileField,
    pub message: Option<String>,
    pub error: Option<String>,
    pub avatar_bytes: Option<usize>,
}

impl ProfileForm {
    fn field_mut(&mut self) -> &mut String {
        match self.active {
            ProfileField::Username => &mut self.username,
            ProfileField::Email => &mut self.email,
            ProfileField::AvatarPath => &mut self.avatar_path,
            ProfileField::CurrentPassword => &mut self.current_password,
            ProfileField::NewPassword => &mut self.new_password,
            ProfileField::ConfirmPassword => &mut self.confirm_password,
        }
    }

    fn cycle(&mut self, forward: bool) {
        const ORDER: [ProfileField; 6] = [
            ProfileField::Username,
            ProfileField::Email,
            ProfileField::AvatarPath,
            ProfileField::CurrentPassword,
            ProfileField::NewPassword,
            ProfileField::ConfirmPassword,
        ];
        let at = ORDER.iter().position(|f| *f == self.active).unwrap_or(0);
        let next = if forward {
            (at + 1) % ORDER.len()
        } else {
            (at + ORDER.len() - 1) % ORDER.len()
        };
        self.active = ORDER[next];
    }
}

pub struct App<B: Backend> {
    pub session: Session<B>,
    pub tasks: TaskList<B>,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub state: ListState,
    pub auth_form: AuthForm,
    pub task_form: TaskForm,
    pub profile_form: ProfileForm,
    pub status_line: Option<String>,
}

impl<B: Backend> App<B> {
    pub fn new(session: Session<B>, tasks: TaskList<B>) -> App<B> {
        let screen = if session.is_authenticated() {
            Screen::Dashboard
        } else {
            Screen::Login
        };
        App {
            session,
            tasks,
            screen,
            input_mode: InputMode::Normal,
            state: ListState::default(),
            auth_form: AuthForm::default(),
            task_form: TaskForm::default(),
            profile_form: ProfileForm::default(),
            status_line: None,
        }
    }

    pub fn select_first(&mut self) {
        if self.tasks.tasks().is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.tasks.tasks().len();
        match self.state.selected() {
            Some(_) if len == 0 => self.state.select(None),
            Some(i) if i >= len => self.state.select(Some(len - 1)),
            None if len > 0 => self.state.select(Some(0)),
            _ => {}
        }
    }

    pub fn next(&mut self) {
        let len = self.tasks.tasks().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.tasks.tasks().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn selected_task_id(&self) -> Option<i64> {
        self.state
            .selected()
            .and_then(|i| self.tasks.get(i))
            .map(|t| t.id)
    }

    async fn reload_tasks(&mut self) {
        self.tasks.reload().await;
        self.clamp_selection();
        if self.state.selected().is_none() {
            self.select_first();
        }
    }

    async fn enter_dashboard(&mut self) {
        self.auth_form = AuthForm::default();
        self.screen = Screen::Dashboard;
        self.input_mode = InputMode::Normal;
        self.reload_tasks().await;
        self.select_first();
    }

    fn enter_login(&mut self) {
        self.auth_form = AuthForm::default();
        self.screen = Screen::Login;
        self.input_mode = InputMode::Normal;
    }

    fn open_profile(&mut self) {
        let (username, email) = match self.session.user() {
            Some(user) => (user.username.clone(), user.email.clone()),
            None => (String::new(), String::new()),
        };
        self.profile_form = ProfileForm {
            username,
            email,
            avatar_bytes: self.session.store().read_avatar().map(|b| b.len()),
            ..ProfileForm::default()
        };
        self.screen = Screen::Profile;
        self.input_mode = InputMode::Editing;
    }

    pub async fn handle_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        self.status_line = None;
        match self.screen {
            Screen::Login | Screen::Register => self.handle_auth_input(key).await,
            Screen::Dashboard => self.handle_dashboard_input(key).await,
            Screen::Profile => {
                self.handle_profile_input(key).await;
                Ok(false)
            }
        }
    }

    async fn handle_auth_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('r') => {
                    self.auth_form = AuthForm::default();
                    self.screen = Screen::Register;
                }
                KeyCode::Char('l') => self.enter_login(),
                _ => {}
            }
            return Ok(false);
        }
        match key.code {
            KeyCode::Esc => return Ok(true),
            KeyCode::Tab | KeyCode::Down => {
                let screen = self.screen;
                self.auth_form.cycle(screen, true);
            }
            KeyCode::BackTab | KeyCode::Up => {
                let screen = self.screen;
                self.auth_form.cycle(screen, false);
            }
            KeyCode::Char(c) => self.auth_form.field_mut().push(c),
            KeyCode::Backspace => {
                self.auth_form.field_mut().pop();
            }
            KeyCode::Enter => {
                if self.screen == Screen::Login {
                    self.submit_login().await;
                } else {
                    self.submit_register().await;
                }
            }
            _ => {}
        }
        Ok(false)
    }

    async fn submit_login(&mut self) {
        let email = self.auth_form.email.trim().to_string();
        let password = self.auth_form.password.clone();
        if email.is_empty() || password.is_empty() {
            self.auth_form.error = Some("Email and password are required".to_string());
            return;
        }
        match self.session.login(&email, &password).await {
            Ok(()) => self.enter_dashboard().await,
            Err(err) => self.auth_form.error = Some(err.to_string()),
        }
    }

    async fn submit_register(&mut self) {
        let email = self.auth_form.email.trim().to_string();
        let username = self.auth_form.username.trim().to_string();
        if !email.contains('@') {
            self.auth_form.error = Some("Please enter a valid email".to_string());
            return;
        }
        if username.len() < 3 {
            self.auth_form.error = Some("Username must be at least 3 characters".to_string());
            return;
        }
        if self.auth_form.password.len() < 8 {
            self.auth_form.error = Some("Password must be at least 8 characters".to_string());
            return;
        }
        if self.auth_form.password != self.auth_form.confirm {
            self.auth_form.error = Some("Passwords do not match".to_string());
            return;
        }
        let password = self.auth_form.password.clone();
        match self.session.register(&email, &username, &password).await {
            Ok(()) => self.enter_dashboard().await,
            Err(err) => self.auth_form.error = Some(err.to_string()),
        }
    }

    async fn handle_dashboard_input(&mut self, key: KeyEvent) -> io::Result<bool> {
        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Char('j') => self.next(),
                KeyCode::Char('k') => self.previous(),
                KeyCode::Char('a') => {
                    self.task_form = TaskForm::default();
                    self.input_mode = InputMode::Editing;
                }
                KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form(),
                KeyCode::Char('d') => self.delete_selected().await,
                KeyCode::Char('f') => {
                    self.tasks.criteria.status = self.tasks.criteria.status.next();
                    self.reload_tasks().await;
                }
                KeyCode::Char('/') => self.input_mode = InputMode::Search,
                KeyCode::Char('r') => self.reload_tasks().await,
                KeyCode::Char('p') => self.open_profile(),
                KeyCode::Char('o') => {
                    self.session.logout();
                    self.tasks.clear();
                    self.state.select(None);
                    self.enter_login();
                }
                _ => {}
            },

            InputMode::Search => match key.code {
                KeyCode::Char(c) => {
                    self.tasks.criteria.search.push(c);
                    self.reload_tasks().await;
                }
                KeyCode::Backspace => {
                    self.tasks.criteria.search.pop();
                    self.reload_tasks().await;
                }
                KeyCode::Esc | KeyCode::Enter => self.input_mode = InputMode::Normal,
                _ => {}
            },

            InputMode::Editing => match key.code {
                KeyCode::Char('i') => {
                    if matches!(
                        self.task_form.active,
                        ActiveInput::Title | ActiveInput::Description
                    ) {
                        self.input_mode = InputMode::Insert;
                    }
                }
                KeyCode::Tab => {
                    self.task_form.active = match self.task_form.active {
                        ActiveInput::Title => ActiveInput::Description,
                        ActiveInput::Description => ActiveInput::Status,
                        ActiveInput::Status => ActiveInput::Priority,
                        ActiveInput::Priority => ActiveInput::Title,
                    };
                }
                KeyCode::Char(' ') | KeyCode::Char('l') => match self.task_form.active {
                    ActiveInput::Status => self.task_form.status = self.task_form.status.next(),
                    ActiveInput::Priority => {
                        self.task_form.priority = self.task_form.priority.next()
                    }
                    _ => {}
                },
                KeyCode::Enter => self.submit_task_form().await,
                KeyCode::Esc => {
                    self.task_form = TaskForm::default();
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },

            InputMode::Insert => match key.code {
                KeyCode::Char(c) => match self.task_form.active {
                    ActiveInput::Title => self.task_form.title.push(c),
                    ActiveInput::Description => self.task_form.description.push(c),
                    _ => {}
                },
                KeyCode::Backspace => match self.task_form.active {
                    ActiveInput::Title => {
                        self.task_form.title.pop();
                    }
                    ActiveInput::Description => {
                        self.task_form.description.pop();
                    }
                    _ => {}
                },
                KeyCode::Esc => self.input_mode = InputMode::Editing,
                _ => {}
            },
        }
        Ok(false)
    }

    fn open_edit_form(&mut self) {
        let task = match self.state.selected().and_then(|i| self.tasks.get(i)) {
            Some(task) => task,
            None => return,
        };
        self.task_form = TaskForm {
            editing: Some(task.id),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            active: ActiveInput::Title,
            error: None,
        };
        self.input_mode = InputMode::Editing;
    }

    async fn submit_task_form(&mut self) {
        if self.task_form.title.trim().is_empty() {
            self.task_form.error = Some("Title is required".to_string());
            return;
        }
        let result = match self.task_form.editing {
            None => {
                let parsed = parse_title_input(&self.task_form.title);
                let draft = TaskDraft {
                    title: parsed.title,
                    description: self.task_form.description.clone(),
                    status: self.task_form.status,
                    priority: parsed.priority.unwrap_or(self.task_form.priority),
                };
                self.tasks.create(draft).await
            }
            Some(id) => {
                let patch = TaskPatch {
                    title: Some(self.task_form.title.clone()),
                    description: Some(self.task_form.description.clone()),
                    status: Some(self.task_form.status),
                    priority: Some(self.task_form.priority),
                };
                self.tasks.update(id, patch).await
            }
        };
        match result {
            Ok(()) => {
                let created = self.task_form.editing.is_none();
                self.task_form = TaskForm::default();
                self.input_mode = InputMode::Normal;
                if created {
                    self.select_first();
                }
            }
            Err(err) => self.task_form.error = Some(err.to_string()),
        }
    }

    async fn delete_selected(&mut self) {
        let id = match self.selected_task_id() {
            Some(id) => id,
            None => return,
        };
        if let Err(err) = self.tasks.delete(id).await {
            self.status_line = Some(format!("Delete failed: {}", err));
        }
        self.clamp_selection();
    }

    async fn handle_profile_input(&mut self, key: KeyEvent) {
        match self.input_mode {
            InputMode::Insert => match key.code {
                KeyCode::Char(c) => self.profile_form.field_mut().push(c),
                KeyCode::Backspace => {
                    self.profile_form.field_mut().pop();
                }
                KeyCode::Esc => self.input_mode = InputMode::Editing,
                _ => {}
            },
            _ => match key.code {
                KeyCode::Char('i') => self.input_mode = InputMode::Insert,
                KeyCode::Tab | KeyCode::Down => self.profile_form.cycle(true),
                KeyCode::BackTab | KeyCode::Up => self.profile_form.cycle(false),
                KeyCode::Enter => self.submit_profile_form().await,
                KeyCode::Esc => {
                    self.screen = Screen::Dashboard;
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
    }

    async fn submit_profile_form(&mut self) {
        self.profile_form.message = None;
        self.profile_form.error = None;
        match self.profile_form.active {
            ProfileField::Username | ProfileField::Email => self.save_profile().await,
            ProfileField::AvatarPath => self.import_avatar(),
            _ => self.submit_password_change().await,
        }
    }

    async fn save_profile(&mut self) {
        let username = self.profile_form.username.trim().to_string();
        let email = self.profile_form.email.trim().to_string();
        if username.len() < 3 {
            self.profile_form.error = Some("Username must be at least 3 characters".to_string());
            return;
        }
        if !email.contains('@') {
            self.profile_form.error = Some("Please enter a valid email".to_string());
            return;
        }
        let patch = ProfilePatch {
            username: Some(username),
            email: Some(email),
        };
        match self.session.update_profile(&patch).await {
            Ok(()) => self.profile_form.message = Some("Profile updated!".to_string()),
            Err(err) => self.profile_form.error = Some(err.to_string()),
        }
    }

    async fn submit_password_change(&mut self) {
        if self.profile_form.new_password != self.profile_form.confirm_password {
            self.profile_form.error = Some("Passwords do not match".to_string());
            return;
        }
        let current = self.profile_form.current_password.clone();
        let new = self.profile_form.new_password.clone();
        match self.session.change_password(&current, &new).await {
            Ok(ack) => {
                self.profile_form.message = Some(ack.message);
                self.profile_form.current_password.clear();
                self.profile_form.new_password.clear();
                self.profile_form.confirm_password.clear();
            }
            Err(err) => self.profile_form.error = Some(err.to_string()),
        }
    }

    /// Avatar images live only on this machine; the server never sees
    /// them.
    fn import_avatar(&mut self) {
        let path = self.profile_form.avatar_path.trim().to_string();
        if path.is_empty() {
            self.profile_form.error = Some("Enter a path to an image file".to_string());
            return;
        }
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.profile_form.error = Some(format!("Could not read {}: {}", path, err));
                return;
            }
        };
        match self.session.store().save_avatar(&bytes) {
            Ok(()) => {
                self.profile_form.avatar_bytes = Some(bytes.len());
                self.profile_form.message = Some("Avatar saved".to_string());
            }
            Err(err) => self.profile_form.error = Some(err.to_string()),
        }
    }
}
