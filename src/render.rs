use std::io::{self, Write};

use crate::game::Snapshot;

/// Sink for simulation frames. The simulation never calls this itself;
/// whoever drives it decides when to draw.
pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot) -> io::Result<()>;
}

/// Draws the board as text: `@` head, `o` body, `*` food, `.` empty.
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

pub fn draw(snapshot: &Snapshot) -> String {
    let rows = snapshot.height.max(0) as usize;
    let cols = snapshot.width.max(0) as usize;
    let mut frame = String::with_capacity(rows.checked_mul(cols + 1).unwrap_or(0) + 32);

    frame.push_str(&format!("Score: {}{}\n", snapshot.score, if snapshot.game_over { "  GAME OVER" } else { "" }));
    for z in 0..snapshot.height {
        for x in 0..snapshot.width {
            let cell = (x, z);
            let glyph = if cell == snapshot.head {
                '@'
            } else if snapshot.snake.contains(&cell) {
                'o'
            } else if cell == snapshot.food {
                '*'
            } else {
                '.'
            };
            frame.push(glyph);
        }
        frame.push('\n');
    }

    frame
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        self.out.write_all(draw(snapshot).as_bytes())?;
        self.out.flush()
    }
}
