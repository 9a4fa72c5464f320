use crate::screen::Screen;

/// Presentation capability for the display buffer.
///
/// The machine calls [`DisplaySink::render`] once per completed draw
/// instruction and [`DisplaySink::clear`] whenever the buffer is blanked,
/// keeping the interpreter core free of any windowing or event-loop
/// technology.
pub trait DisplaySink {
    /// Present the current display buffer.
    fn render(&mut self, screen: &Screen);

    /// Blank the presentation surface.
    fn clear(&mut self);
}

/// A sink that discards everything, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn render(&mut self, _screen: &Screen) {}

    fn clear(&mut self) {}
}
