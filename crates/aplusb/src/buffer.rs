//! Typed device buffers with the transfer state tracked in the type.
//!
//! `Queued` buffers are allocated but hold undefined contents, `InFlight`
//! buffers have a copy or a kernel pending on them, `Ready` buffers can be
//! bound as kernel input or read back.

use crate::{ClError, During, Result};

use bytemuck::Pod;
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    event::Event,
    memory::{Buffer, CL_MEM_READ_ONLY, CL_MEM_READ_WRITE, CL_MEM_WRITE_ONLY},
    types::{cl_mem_flags, CL_NON_BLOCKING},
};
use std::{marker::PhantomData, ptr};
use tracing::debug;

// ─── Typestate markers ───────────────────────────────────────────────
mod sealed {
    pub trait Sealed {}
}

pub trait State: sealed::Sealed {}

pub struct Queued;
impl sealed::Sealed for Queued {}
impl State for Queued {}

pub struct InFlight;
impl sealed::Sealed for InFlight {}
impl State for InFlight {}

pub struct Ready;
impl sealed::Sealed for Ready {}
impl State for Ready {}

/// How kernels may touch the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn flags(self) -> cl_mem_flags {
        match self {
            Access::ReadOnly => CL_MEM_READ_ONLY,
            Access::WriteOnly => CL_MEM_WRITE_ONLY,
            Access::ReadWrite => CL_MEM_READ_WRITE,
        }
    }
}

// ─── Buffer ──────────────────────────────────────────────────────────
pub struct GpuBuffer<T, S> {
    buf: Buffer<T>,
    len: usize,
    access: Access,
    _state: PhantomData<S>,
}

impl<T, S> std::fmt::Debug for GpuBuffer<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("len", &self.len)
            .field("access", &self.access)
            .field("state", &std::any::type_name::<S>())
            .finish()
    }
}

impl<T, S> GpuBuffer<T, S> {
    fn into_state<N>(self) -> GpuBuffer<T, N> {
        GpuBuffer {
            buf: self.buf,
            len: self.len,
            access: self.access,
            _state: PhantomData,
        }
    }

    fn check_len(&self, host: usize) -> Result<()> {
        if host != self.len {
            return Err(ClError::LengthMismatch { host, device: self.len });
        }
        Ok(())
    }

    /// The underlying OpenCL buffer, e.g. for binding as a kernel argument.
    #[inline(always)]
    pub fn raw(&self) -> &Buffer<T> {
        &self.buf
    }

    /// Number of elements (not bytes).
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

// ── Queued ───────────────────────────────────────────────────────────
impl<T: Pod> GpuBuffer<T, Queued> {
    /// Allocates `len` elements on the device; contents are undefined.
    pub fn new(ctx: &Context, access: Access, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ClError::InvalidSize(len));
        }
        let buf = Buffer::<T>::create(ctx, access.flags(), len, ptr::null_mut())
            .during("creating buffer")?;
        debug!(
            len,
            bytes = len * std::mem::size_of::<T>(),
            ?access,
            "allocated device buffer"
        );
        Ok(Self {
            buf,
            len,
            access,
            _state: PhantomData,
        })
    }

    /// Allocates and uploads `host` in one step, waiting for the copy.
    pub fn from_slice(
        ctx: &Context,
        queue: &CommandQueue,
        access: Access,
        host: &[T],
    ) -> Result<GpuBuffer<T, Ready>> {
        let (in_flight, guard) = Self::new(ctx, access, host.len())?.enqueue_write(queue, host)?;
        in_flight.into_ready(guard)
    }

    /// Non-blocking host → device copy. `host` stays borrowed until the
    /// returned guard is waited on or dropped.
    pub fn enqueue_write<'h>(
        mut self,
        queue: &CommandQueue,
        host: &'h [T],
    ) -> Result<(GpuBuffer<T, InFlight>, GpuEventGuard<'h>)> {
        self.check_len(host.len())?;
        let evt = queue
            .enqueue_write_buffer(&mut self.buf, CL_NON_BLOCKING, 0, host, &[])
            .during("enqueueing buffer write")?;
        Ok((self.into_state(), GpuEventGuard::new(evt)))
    }

    /// Hands the buffer to a kernel that fills it.
    ///
    /// Pair it with the kernel's event via [`GpuBuffer::into_ready`].
    #[inline(always)]
    pub fn launch(self) -> GpuBuffer<T, InFlight> {
        self.into_state()
    }
}

// ── InFlight ─────────────────────────────────────────────────────────
impl<T> GpuBuffer<T, InFlight> {
    /// Waits for the pending command and makes the contents readable.
    pub fn into_ready(self, guard: GpuEventGuard<'_>) -> Result<GpuBuffer<T, Ready>> {
        guard.wait()?;
        Ok(self.into_state())
    }
}

// ── Ready → Host (D2H) ───────────────────────────────────────────────
impl<T: Pod> GpuBuffer<T, Ready> {
    /// Non-blocking device → host copy into `host_out`.
    pub fn enqueue_read<'h>(
        &mut self,
        queue: &CommandQueue,
        host_out: &'h mut [T],
    ) -> Result<GpuEventGuard<'h>> {
        self.check_len(host_out.len())?;
        let evt = queue
            .enqueue_read_buffer(&mut self.buf, CL_NON_BLOCKING, 0, host_out, &[])
            .during("enqueueing buffer read")?;
        Ok(GpuEventGuard::new(evt))
    }
}

// ── Guard (waits on drop) ────────────────────────────────────────────

/// Owns a pending event and the host memory it touches.
///
/// Dropping the guard blocks until the command completes, so the borrowed
/// host slice can't be freed under a running copy. Leaking it with
/// `mem::forget` skips that wait.
pub struct GpuEventGuard<'h> {
    evt: Option<Event>,
    _host: PhantomData<&'h ()>,
}

impl GpuEventGuard<'static> {
    /// Wraps a kernel event that borrows no host memory.
    pub fn from_event(evt: Event) -> Self {
        GpuEventGuard::new(evt)
    }
}

impl<'h> GpuEventGuard<'h> {
    fn new(evt: Event) -> Self {
        Self {
            evt: Some(evt),
            _host: PhantomData,
        }
    }

    /// Blocks until the command completes and returns its event, e.g. for
    /// reading profiling counters.
    pub fn wait(mut self) -> Result<Event> {
        let Some(evt) = self.evt.take() else {
            unreachable!("event is only taken by wait or drop");
        };
        evt.wait().during("waiting for event")?;
        Ok(evt)
    }
}

impl Drop for GpuEventGuard<'_> {
    fn drop(&mut self) {
        if let Some(evt) = self.evt.take() {
            let _ = evt.wait();
        }
    }
}
