//! Transcript pane

use crate::messages::{Speaker, TranscriptEntry};
use crate::ui::theme::Theme;
use egui::{self, Align, Color32, RichText};

pub struct MessageList<'a> {
    entries: &'a [TranscriptEntry],
    theme: &'a Theme,
    scroll_to_bottom: bool,
}

impl<'a> MessageList<'a> {
    pub fn new(entries: &'a [TranscriptEntry], theme: &'a Theme) -> Self {
        Self {
            entries,
            theme,
            scroll_to_bottom: false,
        }
    }

    /// Scroll the newest entry into view this frame
    pub fn scroll_to_bottom(mut self, scroll: bool) -> Self {
        self.scroll_to_bottom = scroll;
        self
    }

    pub fn show(self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .id_salt("transcript")
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add_space(self.theme.spacing_sm);

                if self.entries.is_empty() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(80.0);
                        ui.label(
                            RichText::new("Type a message or press Voice to talk.")
                                .color(self.theme.text_muted),
                        );
                    });
                }

                let last = self.entries.len().saturating_sub(1);
                for (index, entry) in self.entries.iter().enumerate() {
                    let response = self.show_entry(ui, entry);
                    if self.scroll_to_bottom && index == last {
                        response.scroll_to_me(Some(Align::BOTTOM));
                    }
                    ui.add_space(self.theme.spacing_sm);
                }
            });
    }

    fn show_entry(&self, ui: &mut egui::Ui, entry: &TranscriptEntry) -> egui::Response {
        let (align, fill, color) = match entry.speaker {
            Speaker::You => (Align::RIGHT, self.theme.user_bubble, Color32::WHITE),
            Speaker::Assistant => (
                Align::LEFT,
                self.theme.assistant_bubble,
                self.theme.text_primary,
            ),
            Speaker::System => (Align::Center, Color32::TRANSPARENT, self.theme.text_muted),
        };

        ui.with_layout(egui::Layout::top_down(align), |ui| {
            ui.label(
                RichText::new(format!(
                    "{}  {}",
                    entry.speaker.label(),
                    entry.timestamp.with_timezone(&chrono::Local).format("%H:%M")
                ))
                .small()
                .color(self.theme.text_muted),
            );

            let max_width = ui.available_width() * 0.8;
            egui::Frame::none()
                .fill(fill)
                .rounding(self.theme.bubble_rounding)
                .inner_margin(egui::Margin::symmetric(10.0, 6.0))
                .show(ui, |ui| {
                    ui.set_max_width(max_width);
                    let text = RichText::new(&entry.text).color(color);
                    let text = if entry.speaker == Speaker::System {
                        text.italics()
                    } else {
                        text
                    };
                    let response = ui.label(text);
                    let label = entry.formatted();
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &label)
                    });
                    response
                })
                .inner
        })
        .inner
    }
}
