//! Subcommand implementations.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use komanav_core::{
    Clock, CursorState, FsSource, ManualClock, MetadataSource, PanelIndex, SystemClock,
};
use komanav_render::{
    export_png, DocumentHost, PanelExportMetadata, PanelView, PanelViewer, RenderGateway,
    ViewerEvent,
};

use crate::host::ImageDirHost;
use crate::preferences::AppPreferences;

pub type CommandResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

/// Print every page's reading direction, panel count and padded pixel rects.
pub fn inspect(document: &Path, prefs: &AppPreferences) -> CommandResult {
    let host = ImageDirHost::open(document, &prefs.page_extensions, 1)?;
    let mut index = PanelIndex::from_fs();
    let data = index.load(document)?;
    let gateway = RenderGateway::new(
        prefs.viewer.render.clone(),
        prefs.viewer.padding.clone(),
    );

    for page in 1..=host.page_count() {
        let name = host.page_name(page);
        let panels = index.panels_for_page(&data, page, name.as_deref());
        let direction = index.reading_direction(&data, page);
        println!(
            "page {page:>4}  {:<24} {direction:?}  {} panel(s)",
            name.as_deref().unwrap_or("-"),
            panels.len()
        );
        let Some((w, h)) = host.page_size(page) else {
            continue;
        };
        for (i, panel) in panels.iter().enumerate() {
            let rect = gateway.panel_rect(panel, w, h);
            println!(
                "    #{:<3} x={:>8.1} y={:>8.1} w={:>8.1} h={:>8.1}",
                i + 1,
                rect.x,
                rect.y,
                rect.w,
                rect.h
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

/// Walk forward through the document from `start_page` and write every
/// displayed panel as a PNG. Returns the number of files written.
pub fn export(
    document: &Path,
    out: Option<&Path>,
    start_page: u32,
    prefs: &AppPreferences,
) -> Result<usize, Box<dyn Error>> {
    let out_dir = out.map(Path::to_path_buf).unwrap_or_else(|| prefs.export_directory());
    fs::create_dir_all(&out_dir)?;

    let host = ImageDirHost::open(document, &prefs.page_extensions, start_page)?;
    let clock = ManualClock::new();
    let mut viewer = PanelViewer::open(
        document,
        host,
        FsSource,
        clock.clone(),
        prefs.viewer.clone(),
    )?;

    viewer.render()?;
    let mut written = write_displayed(&viewer, &out_dir)?;

    loop {
        clock.advance(viewer.config().debounce());
        let mut events = viewer.tick();
        events.push(viewer.forward());
        events.extend(settle_turn(&mut viewer, &clock));

        let mut done = false;
        for event in events {
            debug!(?event, "Export step");
            match event {
                ViewerEvent::Displayed { .. } => written += write_displayed(&viewer, &out_dir)?,
                ViewerEvent::RenderFailed { page, index } => {
                    warn!(page, index, "Stopping export at a panel that failed to render");
                    done = true;
                }
                ViewerEvent::DocumentBoundary { .. }
                | ViewerEvent::NoPanels { .. }
                | ViewerEvent::TurnAbandoned { .. }
                | ViewerEvent::Closed => done = true,
                _ => {}
            }
        }
        if done || !viewer.is_open() {
            break;
        }
    }

    viewer.close();
    info!(written, out = %out_dir.display(), "Export finished");
    Ok(written)
}

/// Jump virtual time to each pending wakeup until a page turn resolves.
fn settle_turn<H, S>(
    viewer: &mut PanelViewer<H, S, ManualClock>,
    clock: &ManualClock,
) -> Vec<ViewerEvent>
where
    H: DocumentHost,
    S: MetadataSource,
{
    let mut events = Vec::new();
    while viewer.is_open() && matches!(viewer.cursor_state(), CursorState::Turning { .. }) {
        let Some(due) = viewer.next_wakeup() else {
            break;
        };
        clock.set(due);
        events.extend(viewer.tick());
    }
    events
}

fn write_displayed<H, S, C>(
    viewer: &PanelViewer<H, S, C>,
    out_dir: &Path,
) -> Result<usize, Box<dyn Error>>
where
    H: DocumentHost,
    S: MetadataSource,
    C: Clock,
{
    let Some(shown) = viewer.displayed() else {
        return Ok(0);
    };
    let Some(panel) = shown.index.checked_sub(1).and_then(|i| viewer.panels().get(i)) else {
        return Ok(0);
    };
    let request = viewer
        .gateway()
        .request_for(viewer.host(), shown.page, panel)?;

    let path = panel_file(out_dir, shown.page, shown.index);
    let metadata = PanelExportMetadata {
        document: viewer.document().display().to_string(),
        page: shown.page,
        panel_index: shown.index,
        rect: request.rect,
        zoom: request.zoom,
        reading_direction: viewer.reading_direction(),
    };
    export_png(&shown.image, &path, &metadata)?;
    info!(page = shown.page, index = shown.index, path = %path.display(), "Wrote panel");
    Ok(1)
}

/// `p0003_02.png` for page 3, panel 2.
pub fn panel_file(out_dir: &Path, page: u32, index: usize) -> PathBuf {
    out_dir.join(format!("p{page:04}_{index:02}.png"))
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

/// Feed taps through a live viewer in real time and print every event.
pub fn replay(document: &Path, taps: &[f64], start_page: u32, prefs: &AppPreferences) -> CommandResult {
    let host = ImageDirHost::open(document, &prefs.page_extensions, start_page)?;
    let clock = SystemClock::new();
    let mut viewer = PanelViewer::open(document, host, FsSource, clock, prefs.viewer.clone())?;
    let interval = Duration::from_millis(prefs.replay_interval_ms);

    println!("{:?}", viewer.render()?);
    for &x in taps {
        thread::sleep(interval);
        for event in viewer.tick() {
            println!("{event:?}");
        }
        println!("tap {x:.2} -> {:?}", viewer.on_tap(x));

        while viewer.is_open() && matches!(viewer.cursor_state(), CursorState::Turning { .. }) {
            let Some(due) = viewer.next_wakeup() else {
                break;
            };
            thread::sleep(due.saturating_sub(clock.now()));
            for event in viewer.tick() {
                println!("{event:?}");
            }
        }
        if !viewer.is_open() {
            break;
        }
    }

    let nav = viewer.navigation();
    println!(
        "final: page {} panel {} (open: {})",
        nav.current_page,
        nav.current_panel_index,
        viewer.is_open()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_walks_every_panel() {
        let root = std::env::temp_dir().join("komanav_export_walk");
        let _ = fs::remove_dir_all(&root);
        let document = root.join("vol1");
        fs::create_dir_all(&document).unwrap();
        for name in ["001.png", "002.png"] {
            image::RgbaImage::from_pixel(40, 60, image::Rgba([30, 60, 90, 255]))
                .save(document.join(name))
                .unwrap();
        }
        fs::write(
            root.join("vol1.json"),
            r#"{"reading_direction": "ltr", "pages": [
                {"page": 1, "panels": [{"x":0,"y":0,"w":1,"h":0.5},{"x":0,"y":0.5,"w":1,"h":0.5}]},
                {"page": 2, "panels": [{"x":0.1,"y":0.1,"w":0.8,"h":0.8}]}
            ]}"#,
        )
        .unwrap();

        let mut prefs = AppPreferences::default();
        prefs.viewer.render.screen_width = 80;
        prefs.viewer.render.screen_height = 120;
        let out = root.join("out");

        let written = export(&document, Some(&out), 1, &prefs).unwrap();
        assert_eq!(written, 3);
        assert!(panel_file(&out, 1, 2).exists());
        assert!(panel_file(&out, 2, 1).exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn panel_files_sort_in_reading_order() {
        let dir = Path::new("/out");
        assert_eq!(panel_file(dir, 3, 2), PathBuf::from("/out/p0003_02.png"));
        assert!(panel_file(dir, 2, 10) < panel_file(dir, 3, 1));
    }
}
