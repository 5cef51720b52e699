//! Form field component for user input

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::forms::FormErrors;
use crate::tui::{traits::FormHandler, ui::Styles};

/// Type of form field
#[derive(Debug, Clone, PartialEq)]
pub enum FormFieldType {
    Text,
    /// YYYY-MM-DD text input
    Date,
    /// Fixed options cycled with ←/→
    Choice,
}

/// Individual form field
#[derive(Debug, Clone)]
pub struct FormField {
    /// Name used by validation errors
    pub key: &'static str,
    pub label: String,
    pub value: String,
    pub placeholder: String,
    pub field_type: FormFieldType,
    pub is_focused: bool,
    /// Cursor position in characters
    pub cursor_position: usize,
    pub options: Vec<String>,
    pub validation_error: Option<String>,
}

impl FormField {
    pub fn new(key: &'static str, label: &str, field_type: FormFieldType) -> Self {
        Self {
            key,
            label: label.to_string(),
            value: String::new(),
            placeholder: String::new(),
            field_type,
            is_focused: false,
            cursor_position: 0,
            options: Vec::new(),
            validation_error: None,
        }
    }

    pub fn text(key: &'static str, label: &str) -> Self {
        Self::new(key, label, FormFieldType::Text)
    }

    pub fn date(key: &'static str, label: &str) -> Self {
        Self::new(key, label, FormFieldType::Date).with_placeholder("YYYY-MM-DD")
    }

    pub fn choice(key: &'static str, label: &str, options: Vec<String>) -> Self {
        let mut field = Self::new(key, label, FormFieldType::Choice);
        field.options = options;
        field
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self.cursor_position = value.chars().count();
        self
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert_char(&mut self, c: char) {
        if self.field_type == FormFieldType::Choice {
            return;
        }
        let index = self.byte_index();
        self.value.insert(index, c);
        self.cursor_position += 1;
        self.validation_error = None;
    }

    pub fn delete_char(&mut self) {
        if self.field_type == FormFieldType::Choice || self.cursor_position == 0 {
            return;
        }
        self.cursor_position -= 1;
        let index = self.byte_index();
        self.value.remove(index);
        self.validation_error = None;
    }

    /// ← moves the cursor, or selects the previous option of a choice
    pub fn move_left(&mut self) {
        if self.field_type == FormFieldType::Choice {
            self.cycle_option(false);
        } else if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    /// → moves the cursor, or selects the next option of a choice
    pub fn move_right(&mut self) {
        if self.field_type == FormFieldType::Choice {
            self.cycle_option(true);
        } else if self.cursor_position < self.value.chars().count() {
            self.cursor_position += 1;
        }
    }

    fn cycle_option(&mut self, forward: bool) {
        if self.options.is_empty() {
            return;
        }
        let len = self.options.len();
        let next = match self.options.iter().position(|o| *o == self.value) {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        self.value = self.options[next].clone();
        self.cursor_position = self.value.chars().count();
        self.validation_error = None;
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Render the form field
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let showing_placeholder = self.value.is_empty() && !self.placeholder.is_empty();
        let display_text = if showing_placeholder {
            self.placeholder.clone()
        } else if self.field_type == FormFieldType::Choice {
            format!("◀ {} ▶", self.value)
        } else {
            self.value.clone()
        };

        let border_style = if self.validation_error.is_some() {
            Styles::error()
        } else if self.is_focused {
            Styles::active_border()
        } else {
            Styles::inactive_border()
        };

        let title = match &self.validation_error {
            Some(error) => format!("{} - {}", self.label, error),
            None => self.label.clone(),
        };

        let text_style = if showing_placeholder {
            Styles::inactive()
        } else {
            Styles::default()
        };

        let paragraph = Paragraph::new(display_text).style(text_style).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border_style),
        );
        f.render_widget(paragraph, area);

        if self.is_focused && self.field_type != FormFieldType::Choice {
            let before: String = self.value.chars().take(self.cursor_position).collect();
            let cursor_x = area.x + 1 + before.width() as u16;
            if cursor_x < area.x + area.width.saturating_sub(1) {
                f.set_cursor(cursor_x, area.y + 1);
            }
        }
    }
}

/// Form container that manages multiple fields
#[derive(Debug, Clone)]
pub struct Form {
    pub title: String,
    pub fields: Vec<FormField>,
    pub current_field: usize,
}

impl Form {
    pub fn new(title: &str, fields: Vec<FormField>) -> Self {
        let mut form = Self {
            title: title.to_string(),
            fields,
            current_field: 0,
        };
        form.update_focus();
        form
    }

    fn update_focus(&mut self) {
        for (i, field) in self.fields.iter_mut().enumerate() {
            field.is_focused = i == self.current_field;
        }
    }

    pub fn field(&self, key: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.key == key)
    }

    /// Value of a field, empty when the key is unknown
    pub fn value(&self, key: &str) -> String {
        self.field(key).map(|f| f.value.clone()).unwrap_or_default()
    }

    pub fn get_current_field_mut(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.current_field)
    }

    /// Attach validation errors to their fields and focus the first one
    pub fn set_errors(&mut self, errors: &FormErrors) {
        for field in &mut self.fields {
            field.validation_error = errors.get(field.key).map(str::to_string);
        }
        if let Some(first) = self.fields.iter().position(|f| f.validation_error.is_some()) {
            self.set_current_field(first);
        }
    }

    pub fn error_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.validation_error.is_some())
            .count()
    }

    pub fn move_left(&mut self) {
        if let Some(field) = self.get_current_field_mut() {
            field.move_left();
        }
    }

    pub fn move_right(&mut self) {
        if let Some(field) = self.get_current_field_mut() {
            field.move_right();
        }
    }

    /// Render as a popup over `area`
    pub fn render(&self, f: &mut Frame, area: Rect) {
        let height = (self.fields.len() as u16 * 3 + 4).min(area.height);
        let width = area.width.saturating_mul(7) / 10;
        let popup = Rect::new(
            area.x + (area.width.saturating_sub(width)) / 2,
            area.y + (area.height.saturating_sub(height)) / 2,
            width,
            height,
        );
        f.render_widget(Clear, popup);

        let block = Block::default()
            .title(format!("{} (Enter: save, Esc: cancel)", self.title))
            .borders(Borders::ALL)
            .border_style(Styles::active_border());
        let inner = block.inner(popup);
        f.render_widget(block, popup);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints(
                self.fields
                    .iter()
                    .map(|_| Constraint::Length(3))
                    .chain(std::iter::once(Constraint::Min(0)))
                    .collect::<Vec<_>>(),
            )
            .split(inner);

        for (field, chunk) in self.fields.iter().zip(chunks.iter()) {
            field.render(f, *chunk);
        }
    }
}

impl FormHandler for Form {
    fn get_current_field(&self) -> usize {
        self.current_field
    }

    fn set_current_field(&mut self, field: usize) {
        if field < self.fields.len() {
            self.current_field = field;
            self.update_focus();
        }
    }

    fn get_field_count(&self) -> usize {
        self.fields.len()
    }

    fn handle_char_input(&mut self, c: char) {
        if let Some(field) = self.get_current_field_mut() {
            field.insert_char(c);
        }
    }

    fn handle_backspace(&mut self) {
        if let Some(field) = self.get_current_field_mut() {
            field.delete_char();
        }
    }
}
