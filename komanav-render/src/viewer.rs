use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use komanav_core::{
    Clock, CursorState, DocumentPanelData, FsSource, Landing, MetadataSource, NavigationCursor,
    NavigationState, PaddingConfig, Panel, PanelIndex, ReadingDirection, Step, SystemClock,
    TapAction, TapZones, Timers, Transition,
};

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::gateway::{DocumentHost, RenderGateway, RenderSettings};
use crate::preload::PreloadCache;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing, tap-zone, padding and output settings for a viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Minimum time between two accepted navigation steps.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay between asking the host to turn the page and reading it back.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Delay between a display and rendering the next panel ahead of time.
    #[serde(default = "default_preload_delay_ms")]
    pub preload_delay_ms: u64,
    /// Settle checks to repeat while the host still shows the old page.
    #[serde(default = "default_max_settle_retries")]
    pub max_settle_retries: u32,
    #[serde(default)]
    pub tap_zones: TapZones,
    #[serde(default)]
    pub padding: PaddingConfig,
    #[serde(default)]
    pub render: RenderSettings,
}

fn default_debounce_ms() -> u64 {
    200
}
fn default_settle_ms() -> u64 {
    300
}
fn default_preload_delay_ms() -> u64 {
    50
}
fn default_max_settle_retries() -> u32 {
    3
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            settle_ms: default_settle_ms(),
            preload_delay_ms: default_preload_delay_ms(),
            max_settle_retries: default_max_settle_retries(),
            tap_zones: TapZones::default(),
            padding: PaddingConfig::default(),
            render: RenderSettings::default(),
        }
    }
}

impl ViewerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn preload_delay(&self) -> Duration {
        Duration::from_millis(self.preload_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Events and tasks
// ---------------------------------------------------------------------------

/// Outcome of an interaction or a timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Dropped: debounced, mid-turn, or the viewer is closed.
    Ignored,
    Displayed {
        page: u32,
        index: usize,
        from_preload: bool,
    },
    /// The host accepted a page turn; the new page is read back on settle.
    PageTurnRequested { step: Step },
    /// The host refused to turn past the first or last page.
    DocumentBoundary { step: Step },
    /// The page reached has no panels. The viewer closes right after.
    NoPanels { page: u32 },
    RenderFailed { page: u32, index: usize },
    Preloaded { page: u32, index: usize },
    /// The host never moved off `page`; the cursor stays there.
    TurnAbandoned { page: u32 },
    Closed,
}

/// Deferred continuation. Each carries the generation it was scheduled
/// under and is dropped if the session has moved on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerTask {
    Settle { generation: u64, attempt: u32 },
    Populate { generation: u64 },
}

impl ViewerTask {
    pub fn generation(&self) -> u64 {
        match *self {
            Self::Settle { generation, .. } | Self::Populate { generation } => generation,
        }
    }
}

/// The panel image currently on screen. Owned by the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedPanel {
    pub page: u32,
    pub index: usize,
    pub image: RenderBuffer,
}

// ---------------------------------------------------------------------------
// Capability interface
// ---------------------------------------------------------------------------

/// What a host UI needs from a panel view.
pub trait PanelView {
    /// Render the panel under the cursor, replacing the displayed image.
    fn render(&mut self) -> crate::Result<ViewerEvent>;

    /// A tap at `x_fraction` of the screen width.
    fn on_tap(&mut self, x_fraction: f64) -> ViewerEvent;

    fn on_close(&mut self) -> ViewerEvent;
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A panel-by-panel reading session over one document.
///
/// Owns the metadata cache, the cursor, the preload slot and the timer queue
/// and is dropped when the reader leaves panel view. Everything runs on the
/// caller's thread: deferred work is queued on [`Timers`] and executed by
/// [`PanelViewer::tick`].
pub struct PanelViewer<H, S = FsSource, C = SystemClock> {
    document: PathBuf,
    host: H,
    index: PanelIndex<S>,
    data: Arc<DocumentPanelData>,
    clock: C,
    config: ViewerConfig,
    gateway: RenderGateway,
    cursor: NavigationCursor,
    preload: PreloadCache,
    timers: Timers<ViewerTask>,
    /// Bumped on every display, page turn, foreign page change and close.
    generation: u64,
    open: bool,
    direction: ReadingDirection,
    displayed: Option<DisplayedPanel>,
}

impl<H, S, C> PanelViewer<H, S, C>
where
    H: DocumentHost,
    S: MetadataSource,
    C: Clock,
{
    /// Start a session on the page the host is showing.
    ///
    /// Fails with [`komanav_core::CoreError::MetadataNotFound`] when the
    /// document has no panel metadata, so the host can stay in page view,
    /// and with [`RenderError::NoPanels`] when the current page has none.
    /// Nothing is rendered until [`PanelView::render`] is called.
    pub fn open(
        document: impl AsRef<Path>,
        host: H,
        source: S,
        clock: C,
        config: ViewerConfig,
    ) -> crate::Result<Self> {
        let document = document.as_ref().to_path_buf();
        let mut index = PanelIndex::new(source);
        let data = index.load(&document)?;

        if let DocumentPanelData::Chapters(chapters) = data.as_ref() {
            let covered = chapters.covered_pages();
            let page_count = host.page_count();
            if covered != page_count {
                warn!(
                    covered,
                    page_count, "Chapter page totals do not match the document"
                );
            }
        }

        let gateway = RenderGateway::new(config.render.clone(), config.padding.clone());
        let mut viewer = Self {
            document,
            host,
            index,
            data,
            clock,
            cursor: NavigationCursor::new(config.debounce()),
            config,
            gateway,
            preload: PreloadCache::new(),
            timers: Timers::new(),
            generation: 0,
            open: true,
            direction: ReadingDirection::default(),
            displayed: None,
        };

        let page = viewer.host.current_page();
        if let Landing::NoPanels { page } = viewer.land_on(page, false) {
            return Err(RenderError::NoPanels { page });
        }
        info!(
            document = %viewer.document.display(),
            page,
            direction = ?viewer.direction,
            "Panel view opened"
        );
        Ok(viewer)
    }

    // -- Accessors ----------------------------------------------------------

    pub fn document(&self) -> &Path {
        &self.document
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn navigation(&self) -> NavigationState {
        self.cursor.navigation()
    }

    pub fn cursor_state(&self) -> CursorState {
        self.cursor.state()
    }

    pub fn reading_direction(&self) -> ReadingDirection {
        self.direction
    }

    pub fn displayed(&self) -> Option<&DisplayedPanel> {
        self.displayed.as_ref()
    }

    /// `(page, index)` held by the preload slot.
    pub fn preload_slot(&self) -> Option<(u32, usize)> {
        self.preload.slot_index()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn gateway(&self) -> &RenderGateway {
        &self.gateway
    }

    /// Panels of the page the cursor last resolved.
    pub fn panels(&self) -> &[Panel] {
        self.cursor.panels()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn panel_index(&self) -> &PanelIndex<S> {
        &self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_tasks(&self) -> usize {
        self.timers.len()
    }

    /// When [`PanelViewer::tick`] next has work to do.
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.timers.next_due()
    }

    // -- Interaction --------------------------------------------------------

    pub fn forward(&mut self) -> ViewerEvent {
        self.step(Step::Forward)
    }

    pub fn backward(&mut self) -> ViewerEvent {
        self.step(Step::Backward)
    }

    /// The host reports that `page` is now showing.
    ///
    /// During a requested turn this only records the page; the pending
    /// settle picks it up. Otherwise the reader moved the page by other
    /// means, so queued work and the preload slot are discarded and the next
    /// step re-resolves panels.
    pub fn on_page_changed(&mut self, page: u32) {
        if !self.open {
            return;
        }
        if self.cursor.is_turning() {
            self.cursor.confirm_page(page);
            return;
        }
        if page != self.cursor.navigation().current_page {
            debug!(page, "Page changed outside panel navigation");
            self.cursor.confirm_page(page);
            self.preload.invalidate();
            self.bump_generation();
        }
    }

    /// Run every continuation that is due and return what happened.
    pub fn tick(&mut self) -> Vec<ViewerEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        while let Some(task) = self.timers.pop_due(now) {
            if !self.is_live(&task) {
                trace!(?task, current = self.generation, "Dropped stale task");
                continue;
            }
            match task {
                ViewerTask::Settle { attempt, .. } => self.settle(attempt, now, &mut events),
                ViewerTask::Populate { .. } => {
                    if let Some(event) = self.populate() {
                        events.push(event);
                    }
                }
            }
        }
        events
    }

    pub fn close(&mut self) -> ViewerEvent {
        if !self.open {
            return ViewerEvent::Ignored;
        }
        self.open = false;
        self.bump_generation();
        self.timers.clear();
        self.preload.invalidate();
        self.cursor.close();
        self.displayed = None;
        info!(document = %self.document.display(), "Panel view closed");
        ViewerEvent::Closed
    }

    // -- Internals ----------------------------------------------------------

    fn is_live(&self, task: &ViewerTask) -> bool {
        self.open && task.generation() == self.generation
    }

    fn bump_generation(&mut self) {
        self.generation += 1;
        let current = self.generation;
        self.timers.retain(|t| t.generation() == current);
    }

    fn resolve_panels(&mut self, page: u32) -> Vec<Panel> {
        let data = Arc::clone(&self.data);
        let name = self.host.page_name(page);
        self.index.panels_for_page(&data, page, name.as_deref())
    }

    /// Resolve panels for `page` and put the cursor on its first or last one.
    fn land_on(&mut self, page: u32, from_end: bool) -> Landing {
        let panels = self.resolve_panels(page);
        let data = Arc::clone(&self.data);
        self.direction = self.index.reading_direction(&data, page);
        self.preload.invalidate();
        self.cursor.enter_page(page, panels, from_end)
    }

    fn step(&mut self, step: Step) -> ViewerEvent {
        if !self.open {
            return ViewerEvent::Ignored;
        }
        if self.cursor.is_turning() {
            trace!(?step, "Step dropped while the page settles");
            return ViewerEvent::Ignored;
        }
        let now = self.clock.now();

        self.sync_host_page();
        if self.cursor.is_stale() {
            if !self.cursor.acquire_guard(now) {
                return ViewerEvent::Ignored;
            }
            let page = self.cursor.navigation().current_page;
            debug!(page, "Re-resolving panels for a page changed elsewhere");
            return match self.land_on(page, step == Step::Backward) {
                Landing::Panel { page, index } => self.display(page, index, false),
                Landing::NoPanels { page } => self.finish_without_panels(page),
            };
        }

        match self.cursor.begin_step(step, now) {
            None => ViewerEvent::Ignored,
            Some(Transition::Panel { page, index }) => {
                let event = self.display(page, index, step == Step::Forward);
                if matches!(event, ViewerEvent::Displayed { .. }) {
                    self.cursor.commit_panel(index);
                }
                event
            }
            Some(Transition::TurnPage { step }) => self.turn(step, now),
        }
    }

    /// Pick up a page change the host made without telling us.
    fn sync_host_page(&mut self) {
        let host_page = self.host.current_page();
        if host_page != self.cursor.navigation().current_page {
            self.on_page_changed(host_page);
        }
    }

    fn turn(&mut self, step: Step, now: Duration) -> ViewerEvent {
        if !self.host.turn_page(step.page_delta()) {
            debug!(?step, "Host refused page turn");
            return ViewerEvent::DocumentBoundary { step };
        }
        self.preload.invalidate();
        self.cursor.begin_turn(step);
        self.bump_generation();
        self.timers.schedule(
            now + self.config.settle(),
            ViewerTask::Settle {
                generation: self.generation,
                attempt: 0,
            },
        );
        debug!(?step, "Page turn requested");
        ViewerEvent::PageTurnRequested { step }
    }

    fn settle(&mut self, attempt: u32, now: Duration, events: &mut Vec<ViewerEvent>) {
        let CursorState::Turning { from_page, step } = self.cursor.state() else {
            return;
        };
        let page = self.host.current_page();
        if page == from_page {
            if attempt < self.config.max_settle_retries {
                trace!(attempt, "Host has not turned yet");
                self.timers.schedule(
                    now + self.config.settle(),
                    ViewerTask::Settle {
                        generation: self.generation,
                        attempt: attempt + 1,
                    },
                );
            } else {
                warn!(page, attempts = attempt + 1, "Page turn never happened");
                self.cursor.abandon_turn();
                self.bump_generation();
                self.timers.schedule(
                    now + self.config.preload_delay(),
                    ViewerTask::Populate {
                        generation: self.generation,
                    },
                );
                events.push(ViewerEvent::TurnAbandoned { page });
            }
            return;
        }

        self.cursor.confirm_page(page);
        self.bump_generation();
        match self.land_on(page, step == Step::Backward) {
            Landing::Panel { page, index } => events.push(self.display(page, index, false)),
            Landing::NoPanels { page } => {
                events.push(ViewerEvent::NoPanels { page });
                events.push(self.close());
            }
        }
    }

    fn finish_without_panels(&mut self, page: u32) -> ViewerEvent {
        self.close();
        ViewerEvent::NoPanels { page }
    }

    /// Put `(page, index)` on screen, taking the preload slot when allowed
    /// and it matches. On failure nothing about the display changes.
    fn display(&mut self, page: u32, index: usize, use_preload: bool) -> ViewerEvent {
        let preloaded = if use_preload {
            self.preload.consume(page, index)
        } else {
            self.preload.invalidate();
            None
        };
        let from_preload = preloaded.is_some();

        let image = match preloaded {
            Some(image) => image,
            None => {
                let Some(panel) = self.cursor.panel(index).copied() else {
                    return ViewerEvent::RenderFailed { page, index };
                };
                match self.gateway.render_panel(&mut self.host, page, &panel) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!(page, index, error = %e, "Panel render failed");
                        return ViewerEvent::RenderFailed { page, index };
                    }
                }
            }
        };

        debug!(page, index, from_preload, "Displaying panel");
        self.displayed = Some(DisplayedPanel { page, index, image });
        self.bump_generation();
        self.timers.schedule(
            self.clock.now() + self.config.preload_delay(),
            ViewerTask::Populate {
                generation: self.generation,
            },
        );
        ViewerEvent::Displayed {
            page,
            index,
            from_preload,
        }
    }

    fn populate(&mut self) -> Option<ViewerEvent> {
        self.preload.invalidate();
        let (page, index, panel) = self.cursor.next_panel()?;
        self.preload
            .populate(&self.gateway, &mut self.host, page, index, &panel)
            .then_some(ViewerEvent::Preloaded { page, index })
    }
}

impl<H, S, C> PanelView for PanelViewer<H, S, C>
where
    H: DocumentHost,
    S: MetadataSource,
    C: Clock,
{
    fn render(&mut self) -> crate::Result<ViewerEvent> {
        if !self.open {
            return Err(RenderError::Closed);
        }
        if !self.cursor.is_turning() {
            self.sync_host_page();
            if self.cursor.is_stale() {
                let page = self.cursor.navigation().current_page;
                debug!(page, "Re-resolving panels before rendering");
                if let Landing::NoPanels { page } = self.land_on(page, false) {
                    self.close();
                    return Err(RenderError::NoPanels { page });
                }
            }
        }
        match self.cursor.state() {
            CursorState::ViewingPanel { page, index } => match self.display(page, index, true) {
                ViewerEvent::RenderFailed { page, .. } => Err(RenderError::RenderFailed { page }),
                event => Ok(event),
            },
            CursorState::Turning { .. } => Ok(ViewerEvent::Ignored),
            CursorState::Idle => Err(RenderError::NoPanels {
                page: self.cursor.navigation().current_page,
            }),
        }
    }

    fn on_tap(&mut self, x_fraction: f64) -> ViewerEvent {
        match self.config.tap_zones.classify(x_fraction, self.direction) {
            TapAction::Forward => self.forward(),
            TapAction::Backward => self.backward(),
            TapAction::Close => self.close(),
        }
    }

    fn on_close(&mut self) -> ViewerEvent {
        self.close()
    }
}
