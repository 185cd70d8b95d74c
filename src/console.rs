//! Append-only console buffer with scroll-position-aware autoscroll.

/// How close to the bottom (in rows) the view may be and still count as
/// "following" the output.
pub const SCROLL_TOLERANCE: usize = 3;

pub struct Console {
    lines: Vec<String>,
    /// Top visible row.
    scroll: usize,
    /// Rows currently visible; 0 until the first layout pass.
    viewport: usize,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            scroll: 0,
            viewport: 0,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    /// Called by the frontend on every layout pass.
    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport = rows;
        self.scroll = self.scroll.min(self.max_scroll());
    }

    /// Append one line in arrival order. The view snaps to the bottom only
    /// when it was already at (or near) the bottom before the append, so an
    /// operator reading scrollback is not yanked away.
    pub fn append(&mut self, raw: &str) {
        let follow = self.at_bottom();
        self.lines.push(sanitize_line(raw));
        if follow {
            self.scroll_to_bottom();
        }
    }

    pub fn at_bottom(&self) -> bool {
        // An unmeasured view has nowhere to scroll to yet.
        if self.viewport == 0 {
            return true;
        }
        self.scroll + self.viewport + SCROLL_TOLERANCE >= self.lines.len()
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = (self.scroll + rows).min(self.max_scroll());
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.scroll = 0;
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

/// Output lines are opaque text, never markup. Control bytes and ANSI escape
/// sequences are stripped so a hostile or binary-ish payload cannot drive the
/// terminal; everything else passes through literally.
pub fn sanitize_line(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => {
                // CSI sequence: consume through its final byte. A lone ESC
                // is dropped.
                if chars.peek() == Some(&'[') {
                    chars.next();
                    for d in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&d) {
                            break;
                        }
                    }
                }
            }
            '\t' => out.push(c),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
