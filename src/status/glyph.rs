// src/status/glyph.rs

use crossterm::style::{Color, Stylize};

use crate::types::RunState;

/// The one-character indicator a status line shows for a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGlyph {
    pub symbol: char,
    pub color: Color,
}

impl StatusGlyph {
    pub fn for_state(state: RunState) -> Self {
        match state {
            RunState::Idle => Self {
                symbol: '○',
                color: Color::DarkGrey,
            },
            RunState::Running => Self {
                symbol: '●',
                color: Color::Yellow,
            },
            RunState::Succeeded => Self {
                symbol: '●',
                color: Color::Green,
            },
            RunState::Failed => Self {
                symbol: '●',
                color: Color::Red,
            },
        }
    }

    /// The glyph as a string, with ANSI colour when `colored` is set.
    pub fn render(&self, colored: bool) -> String {
        if colored {
            self.symbol.to_string().with(self.color).to_string()
        } else {
            self.symbol.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_have_distinct_colors() {
        let colors: Vec<Color> = [
            RunState::Idle,
            RunState::Running,
            RunState::Succeeded,
            RunState::Failed,
        ]
        .into_iter()
        .map(|s| StatusGlyph::for_state(s).color)
        .collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn plain_render_has_no_escape_codes() {
        let plain = StatusGlyph::for_state(RunState::Failed).render(false);
        assert_eq!(plain, "●");
        let colored = StatusGlyph::for_state(RunState::Failed).render(true);
        assert!(colored.contains('●'));
    }
}
