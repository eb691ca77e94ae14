use egui::{Color32, RichText};
use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::action::{ActionKind, Script, StepForm};
use crate::error::{AutomatorError, Result};
use crate::executor::{test_action, PlaybackExecutor, PlaybackOptions};
use crate::generator::{generate, Preview, SettingsForm};
use crate::injector::{EnigoInjector, InputInjector};
use crate::script_file;
use crate::status::{StatusLog, StatusSink};

const CURSOR_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target { Start, Play, Step }

// -------------- UI State --------------
pub struct AppState {
    settings: SettingsForm,
    replace_existing: bool,
    script: Script,
    selected: Option<usize>,
    step_form: StepForm,
    loop_count: String,
    loop_interval: String,
    file_path: String,
    preview: Option<String>,
    cursor: (i32, i32),
    last_cursor_poll: Option<Instant>,

    injector: EnigoInjector,
    executor: Arc<PlaybackExecutor>,
    status: StatusLog,
}

impl AppState {
    pub fn new(injector: EnigoInjector, executor: Arc<PlaybackExecutor>) -> Self {
        Self {
            settings: SettingsForm::default(),
            replace_existing: true,
            script: Script::new(),
            selected: None,
            step_form: StepForm::default(),
            loop_count: "1".to_owned(),
            loop_interval: "2".to_owned(),
            file_path: String::new(),
            preview: None,
            cursor: (0, 0),
            last_cursor_poll: None,
            injector,
            executor,
            status: StatusLog::default(),
        }
    }

    fn report_error(&self, err: &AutomatorError) {
        tracing::warn!(error = %err, "operation failed");
        self.status.report(format!("error: {err}"));
    }

    fn handle<T>(&self, result: Result<T>) {
        if let Err(e) = result {
            self.report_error(&e);
        }
    }

    fn capture_position(&mut self, target: Target) -> Result<()> {
        let (x, y) = self.injector.current_position()?;
        let (fx, fy) = match target {
            Target::Start => (&mut self.settings.start_x, &mut self.settings.start_y),
            Target::Play => (&mut self.settings.play_x, &mut self.settings.play_y),
            Target::Step => (&mut self.step_form.x, &mut self.step_form.y),
        };
        *fx = x.to_string();
        *fy = y.to_string();
        if target != Target::Step {
            self.status.report(format!("{target:?} position set to ({x}, {y})").to_lowercase());
        }
        Ok(())
    }

    fn generate(&mut self) -> Result<usize> {
        let settings = self.settings.parse()?;
        let actions = generate(&settings)?;
        if self.replace_existing {
            self.script.clear();
            self.selected = None;
        }
        let added = actions.len();
        self.script.extend(actions);
        self.status.report(format!("generated {added} steps ({} courses)", settings.course_count));
        Ok(added)
    }

    fn open_preview(&mut self) -> Result<()> {
        let preview = Preview::new(&self.settings.parse()?)?;
        self.preview = Some(preview.to_string());
        Ok(())
    }

    fn add_step(&mut self) -> Result<()> {
        let action = self.step_form.parse()?;
        self.status.report(format!("added step: {}", action.description));
        self.script.push(action);
        self.step_form.reset();
        Ok(())
    }

    fn update_selected(&mut self) -> Result<()> {
        let index = self.selected_index()?;
        let action = self.step_form.parse()?;
        self.script.replace(index, action)?;
        self.status.report(format!("updated step {}", index + 1));
        Ok(())
    }

    fn selected_index(&self) -> Result<usize> {
        self.selected.ok_or(AutomatorError::IndexOutOfRange { index: self.script.len(), len: self.script.len() })
    }

    fn delete_selected(&mut self) -> Result<()> {
        let index = self.selected_index()?;
        let removed = self.script.remove(index)?;
        self.selected = None;
        self.status.report(format!("deleted step {}: {}", index + 1, removed.description));
        Ok(())
    }

    fn test_selected(&mut self) -> Result<()> {
        let index = self.selected_index()?;
        test_action(&self.script, index, &mut self.injector, &self.status)
    }

    fn playback_options(&self) -> Result<PlaybackOptions> {
        let loop_count = self.loop_count.trim().parse::<u32>()
            .map_err(|_| AutomatorError::invalid(format!("loop count: '{}' is not a whole number", self.loop_count.trim())))?;
        let loop_interval_secs = self.loop_interval.trim().parse::<f64>()
            .map_err(|_| AutomatorError::invalid(format!("loop interval: '{}' is not a number", self.loop_interval.trim())))?;
        let options = PlaybackOptions { loop_count, loop_interval_secs };
        options.validate()?;
        Ok(options)
    }

    fn execute(&mut self) -> Result<()> {
        if self.script.is_empty() {
            return Err(AutomatorError::NoStepsAvailable);
        }
        if self.executor.is_running() {
            return Err(AutomatorError::AlreadyRunning);
        }
        let options = self.playback_options()?;
        let sink: Arc<dyn StatusSink> = Arc::new(self.status.clone());
        self.executor.start(&self.script, options, self.injector, sink)
    }

    fn stop(&mut self) {
        if self.executor.stop() {
            self.status.report("stop requested");
        }
    }

    fn clear(&mut self) {
        self.script.clear();
        self.selected = None;
        self.status.report("cleared all steps");
    }

    fn save(&mut self) -> Result<PathBuf> {
        let path = match self.file_path.trim() {
            "" => {
                let dir = std::env::current_dir().map_err(|source| AutomatorError::Io { path: PathBuf::from("."), source })?;
                script_file::save_timestamped(&dir, &self.script, &self.settings)?
            }
            p => {
                let path = PathBuf::from(p);
                script_file::save(&path, &self.script, &self.settings)?;
                path
            }
        };
        self.file_path = path.display().to_string();
        self.status.report(format!("script saved to {}", path.display()));
        Ok(path)
    }

    fn load(&mut self) -> Result<()> {
        let path = PathBuf::from(self.file_path.trim());
        if path.as_os_str().is_empty() {
            return Err(AutomatorError::invalid("enter the path of a script file to load"));
        }
        let loaded = script_file::load(&path)?;
        self.status.report(format!("loaded {} steps from {}", loaded.script.len(), path.display()));
        self.script = loaded.script;
        self.settings = loaded.settings;
        self.selected = None;
        Ok(())
    }

    /// Collects a finished run so its worker thread is released. The worker already posted the outcome.
    fn poll_run(&mut self) {
        match self.executor.try_join() {
            Some(Ok(report)) => tracing::debug!(?report, "run collected"),
            Some(Err(e)) => tracing::debug!(error = %e, "failed run collected"),
            None => {}
        }
    }

    fn poll_cursor(&mut self) {
        if self.executor.is_running() {
            return;
        }
        if self.last_cursor_poll.is_some_and(|t| t.elapsed() < CURSOR_POLL) {
            return;
        }
        self.last_cursor_poll = Some(Instant::now());
        if let Ok(pos) = self.injector.current_position() {
            self.cursor = pos;
        }
    }
}

fn field(ui: &mut egui::Ui, label: &str, value: &mut String) {
    ui.label(label);
    ui.add(egui::TextEdit::singleline(value).desired_width(64.0));
}

impl AppState {
    fn generator_ui(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label("Course layout");
            egui::Grid::new("generator").num_columns(8).show(ui, |ui| {
                field(ui, "Start X", &mut self.settings.start_x);
                field(ui, "Start Y", &mut self.settings.start_y);
                field(ui, "Play X", &mut self.settings.play_x);
                field(ui, "Play Y", &mut self.settings.play_y);
                ui.end_row();
                field(ui, "X interval", &mut self.settings.interval_x);
                field(ui, "Y interval", &mut self.settings.interval_y);
                field(ui, "Courses", &mut self.settings.course_count);
                field(ui, "Video (s)", &mut self.settings.video_duration);
                ui.end_row();
            });
            ui.horizontal(|ui| {
                if ui.button("Use cursor as start").clicked() {
                    let r = self.capture_position(Target::Start);
                    self.handle(r);
                }
                if ui.button("Use cursor as play").clicked() {
                    let r = self.capture_position(Target::Play);
                    self.handle(r);
                }
                ui.checkbox(&mut self.replace_existing, "Replace existing steps");
                if ui.button("Generate steps").clicked() {
                    let r = self.generate();
                    self.handle(r);
                }
                if ui.button("Preview").clicked() {
                    let r = self.open_preview();
                    self.handle(r);
                }
            });
        });
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        let running = self.executor.is_running();
        ui.horizontal(|ui| {
            if ui.add_enabled(!running, egui::Button::new("Execute")).clicked() {
                let r = self.execute();
                self.handle(r);
            }
            if ui.button("Stop").clicked() { self.stop(); }
            if ui.add_enabled(!running, egui::Button::new("Clear")).clicked() { self.clear(); }
            if ui.button("Test selected").clicked() {
                let r = self.test_selected();
                self.handle(r);
            }
            ui.separator();
            field(ui, "Loops", &mut self.loop_count);
            field(ui, "Loop interval (s)", &mut self.loop_interval);
            let state = if running { RichText::new("Running").color(Color32::LIGHT_GREEN) } else { RichText::new("Idle") };
            ui.label(state);
        });
    }

    fn steps_ui(&mut self, ui: &mut egui::Ui) {
        let running = self.executor.is_running();
        let current = self.executor.current_index();
        egui::ScrollArea::vertical().max_height(240.0).show(ui, |ui| {
            egui::Grid::new("steps").striped(true).num_columns(6).show(ui, |ui| {
                for heading in ["#", "Type", "X", "Y", "Wait (s)", "Description"] {
                    ui.strong(heading);
                }
                ui.end_row();

                let mut clicked = None;
                for (i, action) in self.script.iter().enumerate() {
                    let label = if running && i == current { format!("▶ {}", i + 1) } else { (i + 1).to_string() };
                    if ui.selectable_label(self.selected == Some(i), label).clicked() {
                        clicked = Some(i);
                    }
                    ui.label(action.kind.label());
                    ui.label(action.x.to_string());
                    ui.label(action.y.to_string());
                    ui.label(action.wait_seconds.to_string());
                    ui.label(action.description.as_str());
                    ui.end_row();
                }
                if clicked.is_some() {
                    self.selected = clicked;
                }
            });
        });
    }

    fn editor_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            egui::ComboBox::from_id_source("step_kind")
                .selected_text(self.step_form.kind.label())
                .show_ui(ui, |ui| {
                    for kind in ActionKind::ALL {
                        ui.selectable_value(&mut self.step_form.kind, kind, kind.label());
                    }
                });
            field(ui, "X", &mut self.step_form.x);
            field(ui, "Y", &mut self.step_form.y);
            field(ui, "Wait (s)", &mut self.step_form.wait);
            ui.label("Description");
            ui.add(egui::TextEdit::singleline(&mut self.step_form.description).desired_width(160.0));
            if ui.button("Use cursor").clicked() {
                let r = self.capture_position(Target::Step);
                self.handle(r);
            }
            if ui.button("Add step").clicked() {
                let r = self.add_step();
                self.handle(r);
            }
            if ui.button("Update selected").clicked() {
                let r = self.update_selected();
                self.handle(r);
            }
            if ui.button("Delete selected").clicked() {
                let r = self.delete_selected();
                self.handle(r);
            }
        });
    }

    fn file_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Script file");
            ui.add(egui::TextEdit::singleline(&mut self.file_path).hint_text("blank = timestamped name").desired_width(320.0));
            if ui.button("Save").clicked() {
                let r = self.save();
                self.handle(r);
            }
            if ui.button("Load").clicked() {
                let r = self.load();
                self.handle(r);
            }
        });
    }

    fn preview_window(&mut self, ctx: &egui::Context) {
        let Some(text) = self.preview.as_deref() else { return };
        let mut open = true;
        egui::Window::new("Step preview").open(&mut open).default_size([500.0, 600.0]).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.monospace(text);
            });
        });
        if !open {
            self.preview = None;
        }
    }
}

impl eframe::App for AppState {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_run();
        self.poll_cursor();
        ctx.request_repaint_after(CURSOR_POLL);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.heading("Course Autoplay");
            ui.monospace(format!("Cursor  X: {}, Y: {}", self.cursor.0, self.cursor.1));
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            let line = self.status.latest().map(|l| l.to_string()).unwrap_or_else(|| "ready".to_owned());
            ui.label(line);
            ui.collapsing("History", |ui| {
                egui::ScrollArea::vertical().max_height(120.0).stick_to_bottom(true).show(ui, |ui| {
                    for message in self.status.messages() {
                        ui.small(message);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.generator_ui(ui);
            ui.separator();
            self.controls_ui(ui);
            ui.separator();
            self.steps_ui(ui);
            ui.separator();
            self.editor_ui(ui);
            ui.separator();
            self.file_ui(ui);
        });

        self.preview_window(ctx);
    }
}

/// Opens the window and blocks until it is closed.
pub fn run(injector: EnigoInjector, executor: Arc<PlaybackExecutor>) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([950.0, 700.0])
            .with_min_inner_size([720.0, 520.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Course Autoplay",
        options,
        Box::new(move |_cc| Box::new(AppState::new(injector, executor))),
    )
}
