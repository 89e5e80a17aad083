//! Cancellation for scheduled playback work: CancellationToken + generation guard.
//! A deadline task that loses a race with `stop`/`start` must never act on
//! the newer session, so every task carries the generation it was armed for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

/// Issues generations for scheduled tasks. Advancing cancels every task
/// armed for an older generation.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
}

impl TaskGeneration {
    pub fn new() -> Self {
        Self {
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancel all current tasks, advance the generation and return a guard for it.
    pub fn cancel_and_advance(&self) -> GenerationGuard {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let new_root = CancellationToken::new();
        let child = new_root.child_token();
        *token_guard = new_root;
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationGuard {
            generation: Arc::clone(&self.generation),
            my_generation: gen,
            token: child,
        }
    }

    /// Cancel all current tasks and advance so that no existing guard stays current.
    pub fn cancel_all(&self) -> u64 {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        *token_guard = CancellationToken::new();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskGeneration {
    fn drop(&mut self) {
        self.current_token.read().cancel();
    }
}

/// Held by a scheduled task; checked before the task acts.
#[derive(Clone)]
pub struct GenerationGuard {
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
}

impl GenerationGuard {
    /// True while no newer generation has been issued.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True if the task should still act (not cancelled and still current).
    #[inline]
    pub fn should_continue(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_invalidates_older_guards() {
        let gens = TaskGeneration::new();
        let first = gens.cancel_and_advance();
        assert!(first.should_continue());

        let second = gens.cancel_and_advance();
        assert!(first.is_cancelled());
        assert!(!first.is_current());
        assert!(second.should_continue());
        assert_eq!(second.my_generation(), 2);
    }

    #[test]
    fn cancel_all_leaves_nothing_current() {
        let gens = TaskGeneration::new();
        let guard = gens.cancel_and_advance();
        let gen = gens.cancel_all();
        assert_eq!(gen, gens.current_generation());
        assert!(!guard.should_continue());
    }

    #[test]
    fn dropping_cancels_outstanding_tokens() {
        let gens = TaskGeneration::new();
        let guard = gens.cancel_and_advance();
        drop(gens);
        assert!(guard.is_cancelled());
    }
}
