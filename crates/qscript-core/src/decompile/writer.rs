//! Block-aware text writer for translated script bodies.
//!
//! Output is line oriented. A stack of open blocks decides how deep each line
//! is indented, and indentation is only written once the first fragment of a
//! line arrives, so a closing keyword that pops its block first lands at the
//! same depth as the line that opened it.

use tracing::warn;

/// How a fragment behaves with respect to its neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fragment {
    /// Names, values and keywords
    Word,
    /// Binds to the following word (`$`)
    Prefix,
    /// `(` and `[`
    Open,
    /// `)` and `]`
    Close,
    /// `{` and `\{`
    BlockOpen,
    /// `}`
    BlockClose,
    /// Binds both sides (`.`, `::`)
    Joiner,
    /// `,`
    Separator,
    /// Operators that carry their own surrounding spaces
    Spaced,
}

impl Fragment {
    /// Returns true if a space belongs between `previous` and `self`
    fn spaced_after(self, previous: Fragment) -> bool {
        use Fragment::*;

        match self {
            Word | Prefix | Open | BlockOpen => matches!(
                previous,
                Word | Close | BlockOpen | BlockClose | Separator
            ),
            BlockClose => matches!(previous, Word | Close | BlockClose),
            Close | Joiner | Separator | Spaced => false,
        }
    }
}

/// Kinds of nested block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Block {
    Struct,
    Array,
    Loop,
    If,
    Switch,
    Case,
}

/// Accumulates the text of one script body
#[derive(Debug)]
pub(crate) struct ScriptWriter<'a> {
    out: String,
    indent_str: &'a str,
    base_depth: usize,
    blocks: Vec<Block>,
    line_start: bool,
    previous: Option<Fragment>,
}

impl<'a> ScriptWriter<'a> {
    /// Creates a writer whose lines sit `base_depth` levels deep
    pub(crate) fn new(indent_str: &'a str, base_depth: usize) -> Self {
        Self {
            out: String::new(),
            indent_str,
            base_depth,
            blocks: Vec::new(),
            line_start: false,
            previous: None,
        }
    }

    /// Current indentation depth for new lines
    pub(crate) fn depth(&self) -> usize {
        self.base_depth + self.blocks.len()
    }

    /// Innermost open block
    pub(crate) fn top(&self) -> Option<Block> {
        self.blocks.last().copied()
    }

    /// Appends a fragment at the current depth
    pub(crate) fn push(&mut self, kind: Fragment, text: &str) {
        self.push_at(self.depth(), kind, text);
    }

    /// Appends a fragment one level shallower than the current depth if it
    /// starts a line (`else` inside an `if` block)
    pub(crate) fn push_outdented(&mut self, kind: Fragment, text: &str) {
        self.push_at(self.depth().saturating_sub(1), kind, text);
    }

    fn push_at(&mut self, depth: usize, kind: Fragment, text: &str) {
        let text = if self.line_start {
            self.line_start = false;
            for _ in 0..depth {
                self.out.push_str(self.indent_str);
            }
            text.trim_start()
        } else {
            if let Some(previous) = self.previous {
                if kind.spaced_after(previous) && !self.out.ends_with(char::is_whitespace) {
                    self.out.push(' ');
                }
            }
            text
        };

        self.out.push_str(text);
        self.previous = Some(kind);
    }

    /// Ends the current line
    pub(crate) fn newline(&mut self) {
        let kept = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(kept);
        self.out.push('\n');
        self.line_start = true;
        self.previous = None;
    }

    /// Opens a nested block
    pub(crate) fn open(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Closes the innermost block if it has the given kind
    pub(crate) fn close(&mut self, block: Block) -> bool {
        if self.top() == Some(block) {
            self.blocks.pop();
            return true;
        }
        warn!("Closing {:?} block, but innermost block is {:?}", block, self.top());
        false
    }

    /// Returns the body with trailing whitespace removed
    pub(crate) fn finish(self) -> String {
        if !self.blocks.is_empty() {
            warn!("Script body ended with {} open block(s)", self.blocks.len());
        }
        self.out.trim_end().to_string()
    }
}
