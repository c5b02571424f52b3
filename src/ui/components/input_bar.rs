//! Input row: message field, Send, Voice and Talk

use crate::integration::VoiceStage;
use crate::ui::state::{AppState, InteractionKind};
use crate::ui::theme::Theme;
use egui::{self, Key, RichText, Vec2};

pub struct InputBar<'a> {
    state: &'a mut AppState,
    theme: &'a Theme,
}

impl<'a> InputBar<'a> {
    pub fn new(state: &'a mut AppState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing_sm)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    self.show_text_input(ui);
                    self.show_send_button(ui);
                });
                ui.horizontal(|ui| {
                    self.show_voice_buttons(ui);
                });
            });
    }

    fn show_text_input(&mut self, ui: &mut egui::Ui) {
        // Leave room for the Send button
        let width = (ui.available_width() - 72.0).max(80.0);
        let text_edit = egui::TextEdit::singleline(&mut self.state.input_text)
            .hint_text("Type a message...")
            .desired_width(width)
            .margin(egui::Margin::symmetric(8.0, 6.0))
            .id(egui::Id::new("message_input"));

        let response = ui.add(text_edit);
        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::TextEdit, true, "Message input")
        });

        // Single-line edits give up focus on Enter
        if response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
            self.state.submit_text();
            response.request_focus();
        }
    }

    fn show_send_button(&mut self, ui: &mut egui::Ui) {
        let enabled = !self.state.input_text.trim().is_empty();
        let button = egui::Button::new(RichText::new("Send").color(egui::Color32::WHITE))
            .min_size(Vec2::new(60.0, 30.0))
            .rounding(self.theme.button_rounding)
            .fill(if enabled {
                self.theme.primary
            } else {
                self.theme.bg_tertiary
            });

        let response = ui.add_enabled(enabled, button);
        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::Button, enabled, "Send message")
        });
        if response.clicked() {
            self.state.submit_text();
        }
    }

    fn show_voice_buttons(&mut self, ui: &mut egui::Ui) {
        let voice = ui
            .add(egui::Button::new("🎤 Voice").rounding(self.theme.button_rounding))
            .on_hover_text("Start a spoken question");
        voice.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::Button, true, "Voice message")
        });
        if voice.clicked() {
            self.state.submit_voice();
        }

        let waiting = self.state.awaiting_trigger();
        let talk = ui
            .add_enabled(
                waiting,
                egui::Button::new("Talk").rounding(self.theme.button_rounding),
            )
            .on_hover_text("Start recording (→)");
        talk.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::Button, waiting, "Talk"));
        if talk.clicked() {
            self.state.press_trigger();
        }

        if self.state.has_pending(InteractionKind::Voice) {
            let (text, color) = match self.state.voice_stage() {
                Some(VoiceStage::Recording) => ("● recording", self.theme.error),
                Some(stage) => (stage.label(), self.theme.warning),
                None => ("starting", self.theme.text_muted),
            };
            ui.label(RichText::new(text).small().color(color));
        }
    }
}
