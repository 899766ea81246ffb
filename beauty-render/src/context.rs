//! Thread-confined graphics context
//!
//! A context is created on the render thread, installed as that thread's
//! current context, and disposed when the thread's [`ContextGuard`] drops.
//! Nothing outside the render thread can reach it.

use crate::error::RenderError;
use beauty_video::{I420Buffer, TextureBuffer};
use std::cell::RefCell;

/// Native graphics context (EGL/GL or equivalent) bound to one thread
pub trait GraphicsContext {
    /// Block until all submitted GPU work has completed
    fn finish(&mut self);

    /// Read a texture back into planar memory.
    ///
    /// Returns `None` when the backend cannot read this texture.
    fn download_i420(&mut self, texture: &TextureBuffer) -> Option<I420Buffer>;

    /// Destroy the context. Called exactly once, on the owning thread.
    fn dispose(&mut self);
}

/// Creates the graphics context on the render thread
pub trait ContextFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn GraphicsContext>, RenderError>;
}

impl<F> ContextFactory for F
where
    F: Fn() -> Result<Box<dyn GraphicsContext>, RenderError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn GraphicsContext>, RenderError> {
        self()
    }
}

thread_local! {
    static CURRENT_CONTEXT: RefCell<Option<Box<dyn GraphicsContext>>> = const { RefCell::new(None) };
}

/// Run `f` against the context current on this thread.
///
/// Fails with [`RenderError::NoContext`] off the render thread, after the
/// context was disposed, or when called re-entrantly from inside another
/// `with_context` closure.
pub fn with_context<R>(f: impl FnOnce(&mut dyn GraphicsContext) -> R) -> Result<R, RenderError> {
    CURRENT_CONTEXT.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| RenderError::NoContext)?;
        match slot.as_mut() {
            Some(context) => Ok(f(context.as_mut())),
            None => Err(RenderError::NoContext),
        }
    })
}

/// True when a context is current on the calling thread
pub fn has_current_context() -> bool {
    CURRENT_CONTEXT.with(|slot| slot.try_borrow().map(|s| s.is_some()).unwrap_or(true))
}

/// Owns the current context for the lifetime of the render thread.
///
/// Dropping the guard disposes the context on every exit path, including
/// unwinding out of a panicking job.
pub struct ContextGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ContextGuard {
    /// Create a context with `factory` and make it current on this thread
    pub fn acquire(factory: &dyn ContextFactory) -> Result<Self, RenderError> {
        let context = factory.create()?;
        CURRENT_CONTEXT.with(|slot| *slot.borrow_mut() = Some(context));
        Ok(Self {
            _not_send: std::marker::PhantomData,
        })
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let context = CURRENT_CONTEXT.with(|slot| slot.borrow_mut().take());
        if let Some(mut context) = context {
            context.dispose();
            log::info!("graphics context disposed");
        }
    }
}
