use markstream::selection::selected_text;
use markstream::{
    AttributedChar, Attributes, Entrance, GlyphSurface, HostError, LayoutStyle, MenuAnchor, Measure,
    Outcome, ParseOptions, ParseWorker, Point, PointerEvent, SelectionHost, SelectionRange, Size,
    StreamView,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[derive(Default)]
struct FakeSurface {
    created: Vec<(usize, char, Entrance)>,
    destroyed: usize,
}

impl GlyphSurface for FakeSurface {
    type Handle = char;

    fn create_unit(&mut self, index: usize, item: &AttributedChar, entrance: Entrance) -> char {
        let glyph = item.glyph.unwrap_or('?');
        self.created.push((index, glyph, entrance));
        glyph
    }

    fn destroy_unit(&mut self, _handle: char) {
        self.destroyed += 1;
    }
}

#[derive(Default)]
struct RecordingHost {
    menus: Vec<MenuAnchor>,
    copied: Vec<String>,
    scroll_suspended: bool,
}

impl SelectionHost for RecordingHost {
    fn suspend_scrolling(&mut self) {
        self.scroll_suspended = true;
    }

    fn resume_scrolling(&mut self) {
        self.scroll_suspended = false;
    }

    fn present_menu(&mut self, anchor: MenuAnchor) -> Result<(), HostError> {
        self.menus.push(anchor);
        Ok(())
    }

    fn hide_menu(&mut self) {}

    fn copy_to_clipboard(&mut self, text: &str) -> Result<(), HostError> {
        self.copied.push(text.to_string());
        Ok(())
    }
}

/// 8x16 glyphs; headings are 24 tall.
struct FakeMeasure;

impl Measure for FakeMeasure {
    fn unit_size(&self, _index: usize, item: &AttributedChar) -> Size {
        let height = if item.attributes.is_heading() { 24.0 } else { 16.0 };
        Size::new(8.0, height)
    }

    fn text_size(&self, text: &str, _attributes: &Attributes) -> Size {
        Size::new(8.0 * text.chars().count() as f32, 16.0)
    }
}

fn style() -> LayoutStyle {
    LayoutStyle {
        base_line_height: 16.0,
        line_spacing: 1.0,
        line_gap: 0.0,
        heading_gap: 0.0,
        ..LayoutStyle::default()
    }
}

fn new_view() -> StreamView<FakeSurface, RecordingHost> {
    StreamView::new(
        FakeSurface::default(),
        RecordingHost::default(),
        ParseOptions::default(),
        style(),
    )
}

/// Center of the unit at `index` in the current layout.
fn center_of(view: &StreamView<FakeSurface, RecordingHost>, index: usize) -> Point {
    view.rects()[index].center()
}

#[test]
fn streamed_chunks_only_create_new_units() {
    let document = "# Title\nSome **bold** words and a [link](https://example.com).\n- one\n- two";
    let mut view = new_view();

    let chars: Vec<char> = document.chars().collect();
    for end in (4..=chars.len()).step_by(4).chain([chars.len()]) {
        let prefix: String = chars[..end].iter().collect();
        view.update_text(&prefix);
    }

    let final_units: String = view.units().iter().collect();
    assert_eq!(
        final_units,
        "TitleSome bold words and a link.onetwo"
    );
    assert_eq!(
        view.surface().created.len() - view.surface().destroyed,
        view.units().len()
    );
    assert!(view
        .surface()
        .created
        .iter()
        .skip(2)
        .all(|&(_, _, entrance)| entrance == Entrance::Animated));
}

#[test]
fn worker_results_feed_the_view() {
    let mut worker = ParseWorker::spawn(ParseOptions::default()).expect("spawn worker");
    let mut view = new_view();

    worker.submit("hello ").expect("submit");
    worker.submit("hello *world*").expect("submit");
    let parsed = worker
        .wait_latest(Duration::from_secs(5))
        .expect("worker alive")
        .expect("parsed in time");
    view.apply_parsed(parsed.sequence);

    assert_eq!(view.units().iter().collect::<String>(), "hello world");
    assert!(view.sequence()[6].attributes.italic);
}

#[test]
fn select_drag_and_copy_across_lines() {
    let mut view = new_view();
    view.update_text("alpha beta\ngamma delta");
    view.relayout(400.0, &FakeMeasure);
    assert_eq!(view.rects().len(), 21);
    assert_eq!(view.rects()[10].origin, Point::new(0.0, 16.0));

    let press = center_of(&view, 7);
    view.handle_pointer(PointerEvent::LongPress(press)).expect("long press");
    assert_eq!(view.session().range(), Some(SelectionRange::new(6, 4)));

    view.handle_pointer(PointerEvent::DragBegan(press)).expect("drag began");
    assert!(view.session().host().scroll_suspended);
    let target = center_of(&view, 12);
    view.handle_pointer(PointerEvent::DragChanged(target)).expect("drag changed");
    view.handle_pointer(PointerEvent::DragEnded(target)).expect("drag ended");
    assert!(!view.session().host().scroll_suspended);
    assert_eq!(view.session().host().menus.len(), 2);

    let range = view.session().range().expect("selection kept");
    assert_eq!(range, SelectionRange::new(7, 6));
    assert_eq!(selected_text(range, view.sequence()), "eta\ngam");

    let selection = view.selection_view().expect("visible selection");
    assert_eq!(selection.highlights.len(), 2);
    assert_eq!(selection.start_handle, Point::new(56.0, 0.0));
    assert_eq!(selection.end_handle, Point::new(24.0, 32.0));
    assert_eq!(selection.menu.first_line.min_x(), 56.0);
    assert_eq!(selection.menu.last_line.max_y(), 32.0);

    let copied = view.copy_selection().expect("copy");
    assert_eq!(copied.as_deref(), Some("eta\ngam"));
    assert_eq!(view.session().host().copied, vec!["eta\ngam".to_string()]);
    assert!(!view.session().has_selection());
}

#[test]
fn tapping_a_link_reports_it() {
    let mut view = new_view();
    view.update_text("go to [docs](https://docs.rs) now");
    view.relayout(400.0, &FakeMeasure);
    let outcome = view
        .handle_pointer(PointerEvent::Tap(center_of(&view, 7)))
        .expect("tap");
    assert_eq!(outcome, Outcome::Link("https://docs.rs".into()));
}

#[test]
fn new_text_drops_selection() {
    let mut view = new_view();
    view.update_text("stream of text");
    view.relayout(400.0, &FakeMeasure);
    view.handle_pointer(PointerEvent::LongPress(center_of(&view, 1)))
        .expect("long press");
    assert!(view.session().has_selection());

    view.update_text("stream of text that keeps going");
    assert!(!view.session().has_selection());
    assert!(view.needs_layout());
    assert!(view.relayout(400.0, &FakeMeasure));
    assert_eq!(view.rects().len(), 31);
}
