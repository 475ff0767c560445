//! Cancellable on-screen rendering
//!
//! Changing page or zoom starts a new render; any render still in flight
//! becomes stale and must not reach the screen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::compositor::{composite_page, BlurSettings};
use crate::coords::Viewport;
use crate::edits::Edit;
use crate::error::RenderError;
use crate::font::FontBook;
use crate::render::PageRenderer;
use crate::surface::Surface;

/// Handle to one render. Cloning shares the same cancellation flag.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    generation: u64,
    active: Arc<AtomicBool>,
}

impl RenderTicket {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self) -> Result<(), RenderError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(RenderError::Cancelled)
        }
    }
}

/// Tracks the single render allowed to be current
#[derive(Debug, Default)]
pub struct RenderSlot {
    next_generation: u64,
    current: Option<RenderTicket>,
}

impl RenderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a render, cancelling whichever one was current
    pub fn begin(&mut self) -> RenderTicket {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        let ticket = RenderTicket::new(generation);
        self.current = Some(ticket.clone());
        ticket
    }

    pub fn cancel(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        self.current
            .as_ref()
            .map(|t| t.generation == ticket.generation && t.is_active())
            .unwrap_or(false)
    }
}

/// Render a page and overlay its edits, giving up as soon as `ticket` is cancelled
pub async fn render_view<'a, R>(
    renderer: &R,
    page: u32,
    viewport: &Viewport,
    edits: impl IntoIterator<Item = &'a Edit>,
    fonts: &FontBook,
    blur: &BlurSettings,
    ticket: &RenderTicket,
) -> Result<Surface, RenderError>
where
    R: PageRenderer + ?Sized,
{
    ticket.ensure_active()?;
    let mut surface = renderer.render_page(page, viewport).await?;

    // The rasterizer may have taken a while; drop stale results
    ticket.ensure_active()?;
    composite_page(&mut surface, viewport, edits, fonts, blur)?;

    tracing::debug!(page, generation = ticket.generation(), "Rendered view");
    Ok(surface)
}
