use std::time::Duration;

use tracing::{debug, trace};

use crate::panel::Panel;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where the reader is.
///
/// `current_panel_index` is 1-based. `last_page_seen` is the page the cached
/// panel list was resolved for; when it differs from `current_page` the list
/// is stale and must be looked up again before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavigationState {
    pub current_page: u32,
    pub current_panel_index: usize,
    pub last_page_seen: u32,
}

/// Direction of a navigation step in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
}

impl Step {
    /// Page delta requested from the host when the step crosses a page.
    pub fn page_delta(self) -> i32 {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    ViewingPanel { page: u32, index: usize },
    /// A page change was requested and the host has not settled yet.
    Turning { from_page: u32, step: Step },
}

/// What a step would do, computed before any state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to another panel on the same page.
    Panel { page: u32, index: usize },
    /// The step runs off the page; the host must turn it.
    TurnPage { step: Step },
}

/// Result of entering a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Panel { page: u32, index: usize },
    NoPanels { page: u32 },
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Rate limit for navigation steps.
///
/// Acquiring the guard arms it until `now + window`; attempts before that
/// expire are refused. Refused attempts are dropped, never queued.
#[derive(Debug, Clone, Copy)]
pub struct DebounceGuard {
    window: Duration,
    expires_at: Option<Duration>,
}

impl DebounceGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            expires_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_armed(&self, now: Duration) -> bool {
        self.expires_at.is_some_and(|t| now < t)
    }

    pub fn try_acquire(&mut self, now: Duration) -> bool {
        if self.is_armed(now) {
            return false;
        }
        self.expires_at = Some(now + self.window);
        true
    }

    pub fn clear(&mut self) {
        self.expires_at = None;
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// State machine over `(page, panel index)`.
///
/// The cursor only plans and records moves. Looking up panels, rendering and
/// talking to the host are the owner's job, which lets the owner leave the
/// state untouched when a render fails.
#[derive(Debug, Clone)]
pub struct NavigationCursor {
    state: CursorState,
    nav: NavigationState,
    panels: Vec<Panel>,
    guard: DebounceGuard,
}

impl NavigationCursor {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: CursorState::Idle,
            nav: NavigationState::default(),
            panels: Vec::new(),
            guard: DebounceGuard::new(debounce),
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn navigation(&self) -> NavigationState {
        self.nav
    }

    /// Panels of the page the list was last resolved for.
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn is_turning(&self) -> bool {
        matches!(self.state, CursorState::Turning { .. })
    }

    /// Whether the cached panel list belongs to a different page than the
    /// one the host reports.
    pub fn is_stale(&self) -> bool {
        self.nav.current_page != self.nav.last_page_seen
    }

    /// The panel at a 1-based index on the current list.
    pub fn panel(&self, index: usize) -> Option<&Panel> {
        index.checked_sub(1).and_then(|i| self.panels.get(i))
    }

    /// The panel one step ahead on the same page, if any.
    pub fn next_panel(&self) -> Option<(u32, usize, Panel)> {
        match self.state {
            CursorState::ViewingPanel { page, index } => {
                self.panel(index + 1).map(|p| (page, index + 1, *p))
            }
            _ => None,
        }
    }

    /// Arm the debounce guard. Returns `false` while it is still armed.
    pub fn acquire_guard(&mut self, now: Duration) -> bool {
        let acquired = self.guard.try_acquire(now);
        if !acquired {
            trace!("Navigation step debounced");
        }
        acquired
    }

    /// Replace the panel list with a freshly resolved one for `page` and land
    /// on its first panel (or its last when `from_end`).
    pub fn enter_page(&mut self, page: u32, panels: Vec<Panel>, from_end: bool) -> Landing {
        self.nav.current_page = page;
        self.nav.last_page_seen = page;
        self.panels = panels;

        if self.panels.is_empty() {
            debug!(page, "Page has no panels");
            self.state = CursorState::Idle;
            self.nav.current_panel_index = 0;
            return Landing::NoPanels { page };
        }

        let index = if from_end { self.panels.len() } else { 1 };
        self.state = CursorState::ViewingPanel { page, index };
        self.nav.current_panel_index = index;
        debug!(page, index, count = self.panels.len(), "Entered page");
        Landing::Panel { page, index }
    }

    /// Plan a step, arming the debounce guard.
    ///
    /// Returns `None` when the step is dropped: the cursor is idle, a page
    /// turn is still settling, or the guard is armed. Nothing else changes
    /// until the owner commits the transition.
    pub fn begin_step(&mut self, step: Step, now: Duration) -> Option<Transition> {
        let CursorState::ViewingPanel { page, index } = self.state else {
            trace!(?step, state = ?self.state, "Step ignored");
            return None;
        };
        if !self.acquire_guard(now) {
            return None;
        }

        let count = self.panels.len();
        let transition = match step {
            Step::Forward if index < count => Transition::Panel {
                page,
                index: index + 1,
            },
            Step::Backward if index > 1 => Transition::Panel {
                page,
                index: index - 1,
            },
            _ => Transition::TurnPage { step },
        };
        debug!(?step, page, index, ?transition, "Planned step");
        Some(transition)
    }

    /// Record a move to another panel on the current page.
    pub fn commit_panel(&mut self, index: usize) {
        if let CursorState::ViewingPanel { page, .. } = self.state {
            debug_assert!(index >= 1 && index <= self.panels.len());
            self.state = CursorState::ViewingPanel { page, index };
            self.nav.current_panel_index = index;
        }
    }

    /// Record that the host was asked to turn the page.
    pub fn begin_turn(&mut self, step: Step) {
        if let CursorState::ViewingPanel { page, .. } = self.state {
            self.state = CursorState::Turning {
                from_page: page,
                step,
            };
        }
    }

    /// Give up on a page turn that never happened and stay where we were.
    pub fn abandon_turn(&mut self) {
        if let CursorState::Turning { from_page, .. } = self.state {
            self.nav.current_page = from_page;
            self.state = CursorState::ViewingPanel {
                page: from_page,
                index: self.nav.current_panel_index.max(1),
            };
        }
    }

    /// The host reports that `page` is now showing.
    pub fn confirm_page(&mut self, page: u32) {
        self.nav.current_page = page;
    }

    pub fn close(&mut self) {
        self.state = CursorState::Idle;
        self.guard.clear();
    }
}
