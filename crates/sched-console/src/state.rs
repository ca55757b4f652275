use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::TableState;
use sched_core::{
    DashCommand, DashEvent, Dashboard, Mutation, MutationOutcome, NewTaskForm, Resource, Task,
};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Tasks,
    LastRuns,
    Heights,
}

impl View {
    pub const ALL: [View; 3] = [View::Tasks, View::LastRuns, View::Heights];

    pub fn title(self) -> &'static str {
        match self {
            View::Tasks => "Tasks",
            View::LastRuns => "Last Runs",
            View::Heights => "Last Heights",
        }
    }

    pub fn next(self) -> Self {
        match self {
            View::Tasks => View::LastRuns,
            View::LastRuns => View::Heights,
            View::Heights => View::Tasks,
        }
    }

    fn resource(self) -> Resource {
        match self {
            View::Tasks => Resource::Tasks,
            View::LastRuns => Resource::LastRuns,
            View::Heights => Resource::LastHeights,
        }
    }
}

/// Column ordering of the task table. Never touches store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Server,
    TaskId,
    Network,
    Kind,
    Enabled,
}

impl SortMode {
    pub fn label(self) -> &'static str {
        match self {
            SortMode::Server => "server",
            SortMode::TaskId => "task",
            SortMode::Network => "network",
            SortMode::Kind => "kind",
            SortMode::Enabled => "enabled",
        }
    }

    fn next(self) -> Self {
        match self {
            SortMode::Server => SortMode::TaskId,
            SortMode::TaskId => SortMode::Network,
            SortMode::Network => SortMode::Kind,
            SortMode::Kind => SortMode::Enabled,
            SortMode::Enabled => SortMode::Server,
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortMode::Server => Ordering::Equal,
            SortMode::TaskId => a.task_id.cmp(&b.task_id),
            SortMode::Network => (&a.network, &a.chain_id).cmp(&(&b.network, &b.chain_id)),
            SortMode::Kind => a.kind.as_str().cmp(b.kind.as_str()),
            SortMode::Enabled => b.enabled.cmp(&a.enabled),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    TaskId,
    Kind,
    Network,
    ChainId,
    Interval,
    HeightFrom,
    HeightTo,
}

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::TaskId => "Task ID",
            FormField::Kind => "Kind",
            FormField::Network => "Network",
            FormField::ChainId => "Chain ID",
            FormField::Interval => "Interval",
            FormField::HeightFrom => "Height from",
            FormField::HeightTo => "Height to",
        }
    }
}

/// Add-task modal.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    pub form: NewTaskForm,
    pub field: FormField,
    pub error: Option<String>,
}

impl FormState {
    /// Fields shown for the current kind; height bounds only for range sync.
    pub fn fields(&self) -> Vec<FormField> {
        let mut fields = vec![
            FormField::TaskId,
            FormField::Kind,
            FormField::Network,
            FormField::ChainId,
            FormField::Interval,
        ];
        if self.form.kind.is_range_sync() {
            fields.push(FormField::HeightFrom);
            fields.push(FormField::HeightTo);
        }
        fields
    }

    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::TaskId => self.form.task_id.clone(),
            FormField::Kind => self.form.kind.to_string(),
            FormField::Network => self.form.network.clone(),
            FormField::ChainId => self.form.chain_id.clone(),
            FormField::Interval => self.form.interval.clone(),
            FormField::HeightFrom => self.form.height_from.clone(),
            FormField::HeightTo => self.form.height_to.clone(),
        }
    }

    fn buffer(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::TaskId => Some(&mut self.form.task_id),
            FormField::Kind => None,
            FormField::Network => Some(&mut self.form.network),
            FormField::ChainId => Some(&mut self.form.chain_id),
            FormField::Interval => Some(&mut self.form.interval),
            FormField::HeightFrom => Some(&mut self.form.height_from),
            FormField::HeightTo => Some(&mut self.form.height_to),
        }
    }

    fn move_field(&mut self, delta: isize) {
        let fields = self.fields();
        let current = fields
            .iter()
            .position(|field| *field == self.field)
            .unwrap_or(0) as isize;
        let len = fields.len() as isize;
        let next = (current + delta).rem_euclid(len);
        self.field = fields[next as usize];
    }
}

#[derive(Debug, Clone, Default)]
pub enum Overlay {
    #[default]
    None,
    Help,
    Form(FormState),
    ConfirmDelete(Task),
}

pub struct App {
    pub dashboard: Dashboard,
    pub view: View,
    pub overlay: Overlay,
    pub tasks_state: TableState,
    pub runs_state: TableState,
    pub heights_state: TableState,
    pub sort: SortMode,
    pub sort_desc: bool,
    pub status_note: Option<String>,
    pub base_url: String,
    pub refresh_secs: u64,
    should_quit: bool,
    outbox: Vec<DashCommand>,
}

impl App {
    pub fn new(dashboard: Dashboard, base_url: String, refresh_secs: u64) -> Self {
        Self {
            dashboard,
            view: View::Tasks,
            overlay: Overlay::None,
            tasks_state: TableState::default(),
            runs_state: TableState::default(),
            heights_state: TableState::default(),
            sort: SortMode::Server,
            sort_desc: false,
            status_note: None,
            base_url,
            refresh_secs,
            should_quit: false,
            outbox: Vec::new(),
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn start(&mut self) {
        let commands = self.dashboard.start();
        self.outbox.extend(commands);
    }

    /// Commands queued since the last call, for the runtime to execute.
    pub fn take_commands(&mut self) -> Vec<DashCommand> {
        std::mem::take(&mut self.outbox)
    }

    fn push(&mut self, command: Option<DashCommand>) {
        if let Some(command) = command {
            debug!(event = "command_queued", ?command);
            self.outbox.push(command);
        }
    }

    pub fn apply_event(&mut self, event: DashEvent) {
        if let DashEvent::MutationSettled {
            mutation,
            result: Ok(MutationOutcome::Applied),
        } = &event
        {
            self.status_note = Some(format!("{} {}: ok", mutation.label(), mutation.task_id()));
        } else if let DashEvent::MutationSettled { .. } = &event {
            self.status_note = None;
        }
        let follow_up = self.dashboard.apply(event);
        self.outbox.extend(follow_up);
        self.clamp_selections();
    }

    pub fn on_auto_refresh_tick(&mut self) {
        let command = self.dashboard.on_auto_refresh_tick();
        self.push(command);
    }

    /// Task rows in display order.
    pub fn visible_tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.dashboard.tasks().items().iter().collect();
        if self.sort != SortMode::Server {
            tasks.sort_by(|a, b| self.sort.compare(a, b));
        }
        if self.sort_desc {
            tasks.reverse();
        }
        tasks
    }

    pub fn selected_task(&self) -> Option<Task> {
        let idx = self.tasks_state.selected()?;
        self.visible_tasks().get(idx).map(|task| (*task).clone())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        match std::mem::take(&mut self.overlay) {
            Overlay::None => self.handle_view_key(key),
            Overlay::Help => {
                if !matches!(
                    key.code,
                    KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Enter
                ) {
                    self.overlay = Overlay::Help;
                }
            }
            Overlay::ConfirmDelete(task) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.request(Mutation::delete(&task));
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.status_note = Some("delete cancelled".to_string());
                }
                _ => self.overlay = Overlay::ConfirmDelete(task),
            },
            Overlay::Form(form) => self.handle_form_key(form, key),
        }
    }

    fn handle_view_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.overlay = Overlay::Help,
            KeyCode::Char('1') => self.view = View::Tasks,
            KeyCode::Char('2') => self.view = View::LastRuns,
            KeyCode::Char('3') => self.view = View::Heights,
            KeyCode::Tab => self.view = self.view.next(),
            KeyCode::Char('r') => {
                let command = self.dashboard.refresh(self.view.resource());
                self.push(command);
            }
            KeyCode::Char('n') => self.overlay = Overlay::Form(FormState::default()),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            _ => match self.view {
                View::Tasks => self.handle_tasks_key(key),
                View::LastRuns => self.handle_runs_key(key),
                View::Heights => {}
            },
        }
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                if let Some(task) = self.selected_task() {
                    let command = self.dashboard.select_task(&task);
                    self.push(command);
                    self.runs_state.select(None);
                    self.view = View::LastRuns;
                }
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_task() {
                    self.request(Mutation::toggle(&task));
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.selected_task() {
                    self.overlay = Overlay::ConfirmDelete(task);
                }
            }
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.status_note = Some(format!("sort: {}", self.sort.label()));
            }
            KeyCode::Char('S') => {
                self.sort_desc = !self.sort_desc;
            }
            _ => {}
        }
    }

    fn handle_runs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('a') => {
                let on = self.dashboard.toggle_auto_refresh();
                self.status_note = Some(if on {
                    format!("auto-refresh every {}s", self.refresh_secs)
                } else {
                    "auto-refresh off".to_string()
                });
            }
            KeyCode::Char(']') => {
                let command = self.dashboard.next_page();
                self.push(command);
                self.runs_state.select(None);
            }
            KeyCode::Char('[') => {
                let command = self.dashboard.prev_page();
                self.push(command);
                self.runs_state.select(None);
            }
            KeyCode::Esc => self.view = View::Tasks,
            _ => {}
        }
    }

    fn handle_form_key(&mut self, mut form: FormState, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => return,
            KeyCode::Tab | KeyCode::Down => form.move_field(1),
            KeyCode::BackTab | KeyCode::Up => form.move_field(-1),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ')
                if form.field == FormField::Kind =>
            {
                form.form.kind = form.form.kind.next();
            }
            KeyCode::Enter => match form.form.validate() {
                Ok(request) => {
                    self.request(Mutation::Add(request));
                    return;
                }
                Err(err) => form.error = Some(err.to_string()),
            },
            KeyCode::Backspace => {
                if let Some(buffer) = form.buffer() {
                    buffer.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(buffer) = form.buffer() {
                    buffer.push(ch);
                }
            }
            _ => {}
        }
        self.overlay = Overlay::Form(form);
    }

    fn request(&mut self, mutation: Mutation) {
        match self.dashboard.request_mutation(mutation) {
            Ok(command) => {
                if let DashCommand::Mutate(mutation) = &command {
                    self.status_note =
                        Some(format!("{} {}...", mutation.label(), mutation.task_id()));
                }
                self.outbox.push(command);
            }
            Err(busy) => self.status_note = Some(busy.to_string()),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (state, len) = match self.view {
            View::Tasks => (&mut self.tasks_state, self.dashboard.tasks().items().len()),
            View::LastRuns => (&mut self.runs_state, self.dashboard.last_runs().items().len()),
            View::Heights => (
                &mut self.heights_state,
                self.dashboard.last_heights().items().len(),
            ),
        };
        if len == 0 {
            state.select(None);
            return;
        }
        let current = state.selected().map(|idx| idx as isize).unwrap_or(-1);
        let next = (current + delta).rem_euclid(len as isize);
        state.select(Some(next as usize));
    }

    fn clamp_selections(&mut self) {
        clamp(&mut self.tasks_state, self.dashboard.tasks().items().len());
        clamp(&mut self.runs_state, self.dashboard.last_runs().items().len());
        clamp(
            &mut self.heights_state,
            self.dashboard.last_heights().items().len(),
        );
    }
}

fn clamp(state: &mut TableState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(idx) if idx >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{FetchTicket, TaskKind};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn task(task_id: &str, network: &str, enabled: bool) -> Task {
        serde_json::from_value(serde_json::json!({
            "id": format!("uuid-{task_id}"),
            "task_id": task_id,
            "network": network,
            "chain_id": "main",
            "enabled": enabled
        }))
        .expect("task")
    }

    fn loaded_app() -> App {
        let mut app = App::new(Dashboard::default(), "http://test".into(), 60);
        app.start();
        let ticket: FetchTicket = app
            .take_commands()
            .into_iter()
            .find_map(|cmd| match cmd {
                DashCommand::FetchTasks(ticket) => Some(ticket),
                _ => None,
            })
            .expect("tasks fetch");
        app.apply_event(DashEvent::TasksLoaded {
            ticket,
            result: Ok(vec![task("b", "skale", true), task("a", "cosmos", false)]),
        });
        app
    }

    #[test]
    fn enter_selects_task_and_fetches_run_log() {
        let mut app = loaded_app();
        assert_eq!(app.tasks_state.selected(), Some(0));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.view, View::LastRuns);
        let commands = app.take_commands();
        let Some(DashCommand::FetchLastRuns { query, .. }) = commands.first() else {
            panic!("expected run log fetch, got {commands:?}");
        };
        assert_eq!(query.key.task_id, "b");
        assert_eq!(query.key.network, "skale");
    }

    #[test]
    fn toggle_uses_schedule_id() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Char('e')));

        assert_eq!(
            app.take_commands(),
            vec![DashCommand::Mutate(Mutation::Enable {
                schedule_id: "uuid-a".into(),
                task_id: "a".into(),
            })]
        );
        assert_eq!(app.status_note.as_deref(), Some("enable a..."));
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('d')));
        assert!(matches!(app.overlay, Overlay::ConfirmDelete(_)));
        app.handle_key(key(KeyCode::Char('x')));
        assert!(matches!(app.overlay, Overlay::ConfirmDelete(_)));
        app.handle_key(key(KeyCode::Char('n')));
        assert!(app.take_commands().is_empty());

        app.handle_key(key(KeyCode::Char('d')));
        app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(
            app.take_commands(),
            vec![DashCommand::Mutate(Mutation::Delete {
                task_id: "b".into()
            })]
        );
    }

    #[test]
    fn second_mutation_is_refused_until_settled() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('e')));
        app.take_commands();
        app.handle_key(key(KeyCode::Char('e')));

        assert!(app.take_commands().is_empty());
        assert_eq!(
            app.status_note.as_deref(),
            Some("disable b is still in flight")
        );

        app.apply_event(DashEvent::MutationSettled {
            mutation: Mutation::disable(&task("b", "skale", true)),
            result: Ok(MutationOutcome::Applied),
        });
        assert_eq!(app.status_note.as_deref(), Some("disable b: ok"));
        assert!(matches!(
            app.take_commands().as_slice(),
            [DashCommand::FetchTasks(_)]
        ));
    }

    #[test]
    fn sorting_is_view_local() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('s')));
        let ids: Vec<&str> = app.visible_tasks().iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let stored: Vec<&str> = app
            .dashboard
            .tasks()
            .items()
            .iter()
            .map(|t| t.task_id.as_str())
            .collect();
        assert_eq!(stored, vec!["b", "a"]);

        app.handle_key(key(KeyCode::Char('S')));
        let ids: Vec<&str> = app.visible_tasks().iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn form_validates_before_submitting() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('n')));
        type_text(&mut app, "range-1");
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Right));
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "cosmos");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "hub");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "30");
        app.handle_key(key(KeyCode::Enter));

        let Overlay::Form(form) = &app.overlay else {
            panic!("form should stay open");
        };
        assert_eq!(form.form.kind, TaskKind::SyncRange);
        assert!(form.error.as_deref().unwrap_or("").contains("invalid interval"));
        assert!(app.take_commands().is_empty());

        type_text(&mut app, "s");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "5");
        app.handle_key(key(KeyCode::Tab));
        type_text(&mut app, "9");
        app.handle_key(key(KeyCode::Enter));

        assert!(matches!(app.overlay, Overlay::None));
        let commands = app.take_commands();
        let [DashCommand::Mutate(Mutation::Add(request))] = commands.as_slice() else {
            panic!("expected add, got {commands:?}");
        };
        assert_eq!(request.task_id, "range-1");
        assert_eq!(request.interval, "30s");
        assert!(request.config.is_some());
    }

    #[test]
    fn form_hides_heights_for_lastdata() {
        let mut form = FormState::default();
        assert_eq!(form.fields().len(), 5);
        form.move_field(-1);
        assert_eq!(form.field, FormField::Interval);
        form.form.kind = TaskKind::SyncRange;
        assert_eq!(form.fields().last(), Some(&FormField::HeightTo));
    }

    #[test]
    fn auto_refresh_toggle_and_tick() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Enter));
        let ticket = match app.take_commands().pop() {
            Some(DashCommand::FetchLastRuns { ticket, .. }) => ticket,
            other => panic!("unexpected {other:?}"),
        };
        app.apply_event(DashEvent::LastRunsLoaded {
            ticket,
            result: Ok(Vec::new()),
        });

        app.on_auto_refresh_tick();
        assert!(app.take_commands().is_empty());

        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.status_note.as_deref(), Some("auto-refresh every 60s"));
        app.on_auto_refresh_tick();
        assert!(matches!(
            app.take_commands().as_slice(),
            [DashCommand::FetchLastRuns { .. }]
        ));
    }

    #[test]
    fn view_keys_and_quit() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('3')));
        assert_eq!(app.view, View::Heights);
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.view, View::Tasks);
        app.handle_key(key(KeyCode::Char('?')));
        app.handle_key(key(KeyCode::Char('q')));
        assert!(!app.should_quit());
        app.handle_key(key(KeyCode::Char('q')));
        assert!(app.should_quit());
    }

    #[test]
    fn refresh_key_invalidates_current_view() {
        let mut app = loaded_app();
        app.handle_key(key(KeyCode::Char('r')));
        assert!(matches!(
            app.take_commands().as_slice(),
            [DashCommand::FetchTasks(_)]
        ));
        assert!(app.dashboard.tasks().is_fetching());
    }
}
