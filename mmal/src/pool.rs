// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-capacity buffer pools.
//!
//! A [`Pool`] owns N buffer allocations and two queues: *empty* buffers ready
//! to be acquired by a producer, and *full* buffers completed by a port and
//! waiting for the consumer. Every buffer is, at any instant, in exactly one
//! of four places: the empty queue, the full queue, held by the caller, or in
//! flight at a port. [`Pool::stats`] reports all four under one lock.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{Buffer, Error, Result, queue::Queue};

/// Upper bound on the payload memory of a single pool.
pub const MAX_POOL_MEMORY: usize = 256 * 1024 * 1024;

/// Consistent snapshot of where a pool's buffers are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub capacity: usize,
    pub payload_size: usize,
    pub empty: usize,
    pub full: usize,
    /// Acquired by the caller and not yet sent or released.
    pub held: usize,
    /// Handed to a port and not yet returned.
    pub in_flight: usize,
}

impl PoolStats {
    /// Returns the number of buffers accounted for; always equals `capacity`.
    pub fn total(&self) -> usize {
        self.empty + self.full + self.held + self.in_flight
    }
}

struct PoolState {
    empty: Queue<mmal_sys::BufferHeader>,
    full: Queue<mmal_sys::BufferHeader>,
    held: usize,
    in_flight: usize,
    enabled_ports: usize,
    enabled_outputs: usize,
    error: Option<mmal_sys::Status>,
    capacity: usize,
    payload_size: usize,
}

struct PoolInner {
    id: Uuid,
    state: Mutex<PoolState>,
    empty_ready: Condvar,
    full_ready: Condvar,
}

/// A fixed set of buffers plus the queues used to exchange them with ports.
///
/// `Pool` is a cheap handle; clones refer to the same pool.
///
/// # Examples
///
/// ```
/// use mmal::Pool;
///
/// # fn main() -> Result<(), mmal::Error> {
/// let pool = Pool::new(4, 1024)?;
/// let buffer = pool.acquire_empty()?;
/// assert_eq!(buffer.capacity(), 1024);
/// assert_eq!(pool.stats().held, 1);
/// buffer.release();
/// assert_eq!(pool.stats().empty, 4);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

fn check_size(count: usize, payload_size: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::InvalidParameter(
            "a pool needs at least one buffer".to_string(),
        ));
    }
    match count.checked_mul(payload_size) {
        Some(total) if total <= MAX_POOL_MEMORY => Ok(()),
        _ => Err(Error::ResourceExhausted),
    }
}

fn allocate(owner: u128, count: usize, payload_size: usize) -> Queue<mmal_sys::BufferHeader> {
    let mut empty = Queue::with_capacity(count);
    for slot in 0..count {
        empty.push(mmal_sys::BufferHeader::with_capacity(
            owner,
            slot as u32,
            payload_size,
        ));
    }
    empty
}

impl Pool {
    /// Allocates a pool of `count` buffers of `payload_size` bytes each.
    ///
    /// Most callers create pools through [`crate::Port::create_pool`] or
    /// [`crate::Connection::create_pool`] so the pool is attached to a port.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `count` is zero
    /// - [`Error::ResourceExhausted`] if the pool would exceed [`MAX_POOL_MEMORY`]
    pub fn new(count: usize, payload_size: usize) -> Result<Self> {
        check_size(count, payload_size)?;
        let id = Uuid::new_v4();
        debug!(pool = %id, count, payload_size, "Creating buffer pool");
        Ok(Self {
            inner: Arc::new(PoolInner {
                id,
                state: Mutex::new(PoolState {
                    empty: allocate(id.as_u128(), count, payload_size),
                    full: Queue::with_capacity(count),
                    held: 0,
                    in_flight: 0,
                    enabled_ports: 0,
                    enabled_outputs: 0,
                    error: None,
                    capacity: count,
                    payload_size,
                }),
                empty_ready: Condvar::new(),
                full_ready: Condvar::new(),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    pub fn payload_size(&self) -> usize {
        self.inner.state.lock().payload_size
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            capacity: state.capacity,
            payload_size: state.payload_size,
            empty: state.empty.len(),
            full: state.full.len(),
            held: state.held,
            in_flight: state.in_flight,
        }
    }

    /// Reallocates every buffer with a new count and size.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if any buffer is held, in flight or waiting
    ///   in the full queue
    /// - [`Error::InvalidParameter`] / [`Error::ResourceExhausted`] as for [`Pool::new`]
    pub fn resize(&self, count: usize, payload_size: usize) -> Result<()> {
        check_size(count, payload_size)?;
        let mut state = self.inner.state.lock();
        if state.held != 0 || state.in_flight != 0 || !state.full.is_empty() {
            return Err(Error::InvalidState(format!(
                "cannot resize pool with {} held, {} in flight and {} full buffers",
                state.held,
                state.in_flight,
                state.full.len()
            )));
        }
        debug!(pool = %self.inner.id, count, payload_size, "Resizing buffer pool");
        state.empty = allocate(self.inner.id.as_u128(), count, payload_size);
        state.full = Queue::with_capacity(count);
        state.capacity = count;
        state.payload_size = payload_size;
        Ok(())
    }

    /// Takes an empty buffer, waiting as long as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aborted`] if [`Pool::abort`] is called while waiting.
    pub fn acquire_empty(&self) -> Result<Buffer> {
        self.acquire_empty_until(None)
    }

    /// Takes an empty buffer, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no buffer became available in time
    /// - [`Error::Aborted`] if the wait was interrupted
    pub fn acquire_empty_timeout(&self, timeout: Duration) -> Result<Buffer> {
        self.acquire_empty_until(Some(Instant::now() + timeout))
    }

    /// Takes an empty buffer if one is available right now.
    pub fn try_acquire_empty(&self) -> Option<Buffer> {
        let mut state = self.inner.state.lock();
        let header = state.empty.pop()?;
        state.held += 1;
        Some(Buffer::new(header, self.clone()))
    }

    fn acquire_empty_until(&self, deadline: Option<Instant>) -> Result<Buffer> {
        let mut state = self.inner.state.lock();
        let epoch = state.empty.epoch();
        let mut timed_out = false;
        loop {
            if let Some(header) = state.empty.pop() {
                state.held += 1;
                return Ok(Buffer::new(header, self.clone()));
            }
            if state.empty.epoch() != epoch {
                return Err(Error::Aborted);
            }
            if timed_out {
                return Err(Error::Timeout);
            }
            match deadline {
                Some(deadline) => {
                    timed_out = self
                        .inner
                        .empty_ready
                        .wait_until(&mut state, deadline)
                        .timed_out();
                }
                None => self.inner.empty_ready.wait(&mut state),
            }
        }
    }

    /// Takes the next buffer completed by a port, waiting as long as needed.
    ///
    /// Buffers come out in the order the port completed them.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if no port using this pool is enabled, or
    ///   only input ports are and no completed buffer is left
    /// - [`Error::Aborted`] if the port is flushed or disabled while waiting
    /// - the driver failure, if the owning component reported an error event
    pub fn acquire_full(&self) -> Result<Buffer> {
        self.acquire_full_until(None)
    }

    /// Like [`Pool::acquire_full`] but gives up with [`Error::Timeout`] after `timeout`.
    pub fn acquire_full_timeout(&self, timeout: Duration) -> Result<Buffer> {
        self.acquire_full_until(Some(Instant::now() + timeout))
    }

    /// Takes a completed buffer if one is available right now.
    ///
    /// # Errors
    ///
    /// Fails as [`Pool::acquire_full`] does, except that an empty queue yields `Ok(None)`.
    pub fn try_acquire_full(&self) -> Result<Option<Buffer>> {
        let mut state = self.inner.state.lock();
        Self::check_full_ready(&state)?;
        Ok(state.full.pop().map(|header| {
            state.held += 1;
            Buffer::new(header, self.clone())
        }))
    }

    fn check_full_ready(state: &PoolState) -> Result<()> {
        if let Some(status) = state.error {
            return Err(Error::from_failure(status));
        }
        if state.enabled_ports == 0 {
            return Err(Error::InvalidState(
                "no enabled port is attached to this pool".to_string(),
            ));
        }
        if state.enabled_outputs == 0 && state.full.is_empty() {
            return Err(Error::InvalidState(
                "no enabled output port fills this pool".to_string(),
            ));
        }
        Ok(())
    }

    fn acquire_full_until(&self, deadline: Option<Instant>) -> Result<Buffer> {
        let mut state = self.inner.state.lock();
        let epoch = state.full.epoch();
        let mut timed_out = false;
        loop {
            if state.full.epoch() != epoch {
                return Err(Error::Aborted);
            }
            Self::check_full_ready(&state)?;
            if let Some(header) = state.full.pop() {
                state.held += 1;
                trace!(pool = %self.inner.id, slot = header.slot, length = header.length, "Acquired full buffer");
                return Ok(Buffer::new(header, self.clone()));
            }
            if timed_out {
                return Err(Error::Timeout);
            }
            match deadline {
                Some(deadline) => {
                    timed_out = self
                        .inner
                        .full_ready
                        .wait_until(&mut state, deadline)
                        .timed_out();
                }
                None => self.inner.full_ready.wait(&mut state),
            }
        }
    }

    /// Returns a held buffer to this pool's empty queue.
    ///
    /// Equivalent to [`Buffer::release`], but checks the buffer belongs here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `buffer` came from another pool.
    /// The buffer is still returned to the pool it came from.
    pub fn release(&self, buffer: Buffer) -> Result<()> {
        if !Arc::ptr_eq(&self.inner, &buffer.pool().inner) {
            return Err(Error::InvalidParameter(format!(
                "buffer belongs to pool {}, not {}",
                buffer.pool().id(),
                self.inner.id
            )));
        }
        buffer.release();
        Ok(())
    }

    /// Wakes every blocked acquire with [`Error::Aborted`].
    pub fn abort(&self) {
        let mut state = self.inner.state.lock();
        state.empty.abort();
        state.full.abort();
        self.inner.empty_ready.notify_all();
        self.inner.full_ready.notify_all();
    }

    /// Fails with the failure reported by the owning component, if any.
    pub(crate) fn check_error(&self) -> Result<()> {
        match self.inner.state.lock().error {
            Some(status) => Err(Error::from_failure(status)),
            None => Ok(()),
        }
    }

    /// Returns `true` if `header` was allocated by this pool.
    pub(crate) fn owns(&self, header: &mmal_sys::BufferHeader) -> bool {
        header.owner == self.inner.id.as_u128()
    }

    /// Held buffer dropped or released by the caller.
    pub(crate) fn put_back(&self, mut header: mmal_sys::BufferHeader) {
        header.reset();
        let mut state = self.inner.state.lock();
        state.held = state.held.saturating_sub(1);
        state.empty.push(header);
        self.inner.empty_ready.notify_one();
    }

    /// Held buffer about to be handed to a port.
    pub(crate) fn mark_in_flight(&self) {
        let mut state = self.inner.state.lock();
        state.held = state.held.saturating_sub(1);
        state.in_flight += 1;
    }

    /// Moves every empty buffer in flight, for priming a tunnel.
    pub(crate) fn take_all_empty(&self) -> Vec<mmal_sys::BufferHeader> {
        let mut state = self.inner.state.lock();
        let headers: Vec<_> = state.empty.drain().collect();
        state.in_flight += headers.len();
        headers
    }

    /// In-flight buffer completed by an output port.
    pub(crate) fn complete_full(&self, header: mmal_sys::BufferHeader) {
        let mut state = self.inner.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.full.push(header);
        self.inner.full_ready.notify_one();
    }

    /// In-flight buffer returned unused or consumed by an input port.
    pub(crate) fn complete_empty(&self, mut header: mmal_sys::BufferHeader) {
        header.reset();
        let mut state = self.inner.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.empty.push(header);
        self.inner.empty_ready.notify_one();
    }

    pub(crate) fn port_enabled(&self, output: bool) {
        let mut state = self.inner.state.lock();
        state.enabled_ports += 1;
        if output {
            state.enabled_outputs += 1;
        }
    }

    /// Once the last port is disabled, stale full buffers go back to the empty queue.
    pub(crate) fn port_disabled(&self, output: bool) {
        let mut state = self.inner.state.lock();
        state.enabled_ports = state.enabled_ports.saturating_sub(1);
        if output {
            state.enabled_outputs = state.enabled_outputs.saturating_sub(1);
        }
        if state.enabled_ports == 0 {
            Self::recycle_full(&mut state, self.inner.id);
        }
        state.full.abort();
        self.inner.full_ready.notify_all();
        self.inner.empty_ready.notify_all();
    }

    /// Discards completed data and clears any reported failure.
    pub(crate) fn flush(&self) {
        let mut state = self.inner.state.lock();
        Self::recycle_full(&mut state, self.inner.id);
        state.error = None;
        state.full.abort();
        self.inner.full_ready.notify_all();
        self.inner.empty_ready.notify_all();
    }

    fn recycle_full(state: &mut PoolState, id: Uuid) {
        let stale: Vec<_> = state.full.drain().collect();
        if !stale.is_empty() {
            debug!(pool = %id, count = stale.len(), "Discarding unconsumed full buffers");
        }
        for mut header in stale {
            header.reset();
            state.empty.push(header);
        }
    }

    /// Fails every current and future full acquire until the next flush.
    pub(crate) fn set_error(&self, status: mmal_sys::Status) {
        let mut state = self.inner.state.lock();
        if state.error.is_none() {
            warn!(pool = %self.inner.id, status = mmal_sys::status_name(status), "Pool marked as failed");
        }
        state.error = Some(status);
        self.inner.full_ready.notify_all();
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn conservation_across_acquire_and_release() {
        let pool = Pool::new(4, 64).unwrap();
        let a = pool.acquire_empty().unwrap();
        let b = pool.try_acquire_empty().unwrap();
        let stats = pool.stats();
        assert_eq!((stats.empty, stats.held), (2, 2));
        assert_eq!(stats.total(), 4);
        a.release();
        pool.release(b).unwrap();
        assert_eq!(pool.stats().empty, 4);
    }

    #[test]
    fn non_blocking_acquire_on_exhausted_pool() {
        let pool = Pool::new(1, 8).unwrap();
        let held = pool.try_acquire_empty();
        assert!(held.is_some());
        assert!(pool.try_acquire_empty().is_none());
    }

    #[test]
    fn release_into_wrong_pool_is_rejected() {
        let first = Pool::new(1, 8).unwrap();
        let second = Pool::new(1, 8).unwrap();
        let buffer = first.acquire_empty().unwrap();
        assert!(matches!(
            second.release(buffer),
            Err(Error::InvalidParameter(_))
        ));
        // The buffer still went home.
        assert_eq!(first.stats().empty, 1);
        assert_eq!(second.stats().empty, 1);
    }

    #[test]
    fn empty_timeout() {
        let pool = Pool::new(1, 8).unwrap();
        let _held = pool.acquire_empty().unwrap();
        assert!(matches!(
            pool.acquire_empty_timeout(Duration::from_millis(20)),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn blocked_empty_acquire_wakes_on_release() {
        let pool = Pool::new(1, 8).unwrap();
        let held = pool.acquire_empty().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire_empty().map(|b| b.capacity()))
        };
        thread::sleep(Duration::from_millis(20));
        held.release();
        assert_eq!(waiter.join().unwrap().unwrap(), 8);
    }

    #[test]
    fn abort_interrupts_waiters() {
        let pool = Pool::new(1, 8).unwrap();
        let _held = pool.acquire_empty().unwrap();
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire_empty().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(20));
        pool.abort();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Aborted)));
    }

    #[test]
    fn full_acquire_fails_closed_without_enabled_port() {
        let pool = Pool::new(2, 8).unwrap();
        assert!(matches!(pool.acquire_full(), Err(Error::InvalidState(_))));
        assert!(matches!(pool.try_acquire_full(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn full_acquire_needs_an_enabled_output() {
        let pool = Pool::new(2, 8).unwrap();
        pool.port_enabled(false);
        assert!(matches!(
            pool.acquire_full_timeout(Duration::from_secs(5)),
            Err(Error::InvalidState(_))
        ));

        pool.port_enabled(true);
        let (_, mut header) = pool.try_acquire_empty().unwrap().into_parts();
        pool.mark_in_flight();
        header.length = 4;
        pool.complete_full(header);
        pool.port_disabled(true);
        // Buffers completed before the output went away can still be taken.
        assert_eq!(pool.try_acquire_full().unwrap().unwrap().length(), 4);
        assert!(matches!(pool.try_acquire_full(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn pool_error_surfaces_until_flush() {
        let pool = Pool::new(2, 8).unwrap();
        pool.port_enabled(true);
        pool.set_error(mmal_sys::MMAL_EIO);
        assert!(matches!(
            pool.acquire_full_timeout(Duration::from_millis(10)),
            Err(Error::Driver(mmal_sys::MMAL_EIO))
        ));
        pool.flush();
        assert!(matches!(
            pool.acquire_full_timeout(Duration::from_millis(10)),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn resize_requires_every_buffer_home() {
        let pool = Pool::new(2, 8).unwrap();
        let held = pool.acquire_empty().unwrap();
        assert!(matches!(pool.resize(3, 16), Err(Error::InvalidState(_))));
        held.release();
        pool.resize(3, 16).unwrap();
        let stats = pool.stats();
        assert_eq!((stats.capacity, stats.payload_size, stats.empty), (3, 16, 3));
    }

    #[test]
    fn memory_limit() {
        assert!(matches!(
            Pool::new(2, MAX_POOL_MEMORY),
            Err(Error::ResourceExhausted)
        ));
        assert!(matches!(
            Pool::new(usize::MAX, 2),
            Err(Error::ResourceExhausted)
        ));
        assert!(matches!(Pool::new(0, 8), Err(Error::InvalidParameter(_))));
    }
}
