//! Main window and eframe integration

use crate::integration::UiConfig;
use crate::ui::components::{InputBar, MessageList};
use crate::ui::state::AppState;
use crate::ui::theme::Theme;
use egui::{self, CentralPanel, Key, RichText, TopBottomPanel, ViewportCommand};
use std::time::Duration;
use tracing::info;

pub struct DeskpalApp {
    state: AppState,
    theme: Theme,
    config: UiConfig,
    quitting: bool,
}

impl DeskpalApp {
    pub fn new(cc: &eframe::CreationContext<'_>, state: AppState, config: UiConfig) -> Self {
        let theme = Theme::dark();
        theme.apply(&cc.egui_ctx);
        Self::from_state(state.with_repaint(cc.egui_ctx.clone()), config)
    }

    /// Build without a native window, e.g. inside a test harness
    pub fn from_state(state: AppState, config: UiConfig) -> Self {
        Self {
            state,
            theme: Theme::dark(),
            config,
            quitting: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    /// Exit for real, cancelling whatever is still running
    pub fn quit(&mut self, ctx: &egui::Context) {
        info!("Quit requested");
        self.quitting = true;
        self.state.cancel_all();
        ctx.send_viewport_cmd(ViewportCommand::Close);
    }

    /// One frame of the window
    pub fn ui(&mut self, ctx: &egui::Context) {
        self.state.poll_events();
        self.handle_keys(ctx);
        self.handle_close(ctx);

        self.show_header(ctx);
        self.show_input_area(ctx);
        self.show_content(ctx);

        // Stage changes of running jobs do not all trigger a repaint
        if self.state.pending_count() > 0 {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        // Only claimed while a recording is waiting, so the text cursor still moves otherwise
        if self.state.awaiting_trigger() && ctx.input(|i| i.key_pressed(Key::ArrowRight)) {
            self.state.press_trigger();
        }
    }

    fn handle_close(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if self.config.minimize_on_close && !self.quitting {
            info!("Close requested, minimising instead");
            ctx.send_viewport_cmd(ViewportCommand::CancelClose);
            ctx.send_viewport_cmd(ViewportCommand::Minimized(true));
        } else {
            self.state.cancel_all();
        }
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        let mut quit_clicked = false;
        TopBottomPanel::top("header")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_secondary)
                    .inner_margin(self.theme.spacing_sm),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(&self.config.title)
                            .heading()
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let quit = ui.button("Quit").on_hover_text("Exit the application");
                        quit.widget_info(|| {
                            egui::WidgetInfo::labeled(egui::WidgetType::Button, true, "Quit")
                        });
                        quit_clicked = quit.clicked();

                        let clear = ui.button("🗑").on_hover_text("Clear chat");
                        clear.widget_info(|| {
                            egui::WidgetInfo::labeled(egui::WidgetType::Button, true, "Clear chat")
                        });
                        if clear.clicked() {
                            self.state.clear_chat();
                        }

                        if let Some(avg) = self.state.average_latency() {
                            ui.label(
                                RichText::new(format!("~{:.1}s", avg.as_secs_f32()))
                                    .small()
                                    .color(self.theme.text_muted),
                            )
                            .on_hover_text("Average reply time");
                        }
                        let pending = self.state.pending_count();
                        if pending > 0 {
                            ui.label(
                                RichText::new(format!("{} pending", pending))
                                    .small()
                                    .color(self.theme.warning),
                            );
                        }
                    });
                });
            });

        if quit_clicked {
            self.quit(ctx);
        }
    }

    fn show_input_area(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("input_area")
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing_sm),
            )
            .show(ctx, |ui| {
                InputBar::new(&mut self.state, &self.theme).show(ui);
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        let scroll = self.state.take_scroll_request();
        CentralPanel::default()
            .frame(
                egui::Frame::none()
                    .fill(self.theme.bg_primary)
                    .inner_margin(self.theme.spacing_sm),
            )
            .show(ctx, |ui| {
                MessageList::new(self.state.transcript(), &self.theme)
                    .scroll_to_bottom(scroll)
                    .show(ui);
            });
    }
}

impl eframe::App for DeskpalApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Deskpal shutting down");
        self.state.shutdown();
    }
}
